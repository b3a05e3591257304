use async_trait::async_trait;
use tracing::info;
use url::Url;

pub mod config;
pub mod extract;
pub mod fetch;
pub mod frontier;
pub mod links;
pub mod oracle;
pub mod sink;
pub mod utils;

mod data;
mod error;

pub use config::Settings;
pub use data::{ExtractionCandidate, IngestPayload, JobRecord, MAX_DESCRIPTION_CHARS};
pub use error::{CrawlerError, FetchError, OracleError, PageOutcome, Rejection};

use extract::FieldExtractor;
use fetch::TieredFetcher;
use frontier::{CrawlSummary, DomainCrawler};

/// One way of turning a URL into markup.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Politeness wait before a fetch. Not counted against the fetch timeout.
    async fn pace(&self) {}

    async fn fetch(&self, url: &Url) -> Result<String, FetchError>;

    /// Releases whatever the source holds open. Called once at shutdown.
    async fn shutdown(&self) {}
}

/// Best-effort structured guess for a page. Never fails: anything that goes
/// wrong comes back as an empty guess.
#[async_trait]
pub trait Oracle: Send + Sync {
    async fn guess(&self, markup: &str, page_url: &Url) -> ExtractionCandidate;
}

/// Downstream consumer of accepted records.
#[async_trait]
pub trait Ingest: Send {
    /// `true` when the record was accepted.
    async fn push(&mut self, record: JobRecord) -> bool;
}

/// Crawls every seed domain in order, one isolated pass per seed.
pub async fn run_crawler(
    seeds: &[Url],
    fetcher: &TieredFetcher,
    extractor: &FieldExtractor,
    sink: &mut dyn Ingest,
    settings: &Settings,
) -> Result<CrawlSummary, CrawlerError> {
    settings.validate()?;
    if seeds.is_empty() {
        return Err(CrawlerError::Config("No starting URLs found".to_string()));
    }

    let mut summary = CrawlSummary::default();
    for (idx, seed) in seeds.iter().enumerate() {
        info!("[{}/{}] Crawling domain {}", idx + 1, seeds.len(), seed);
        let report = DomainCrawler::new(seed.clone(), fetcher, extractor, settings)
            .run(sink)
            .await;
        info!(
            "Found {} jobs from {} ({} pages)",
            report.jobs_found, report.domain, report.pages_crawled
        );
        summary.domains.push(report);
    }

    info!(
        "Crawl finished: {} jobs over {} pages",
        summary.jobs_found(),
        summary.pages_crawled()
    );
    Ok(summary)
}

//! Breadth-first crawl of a single domain.

use scraper::Html;
use std::collections::{HashSet, VecDeque};
use std::fmt;
use tracing::{debug, info, warn};
use url::Url;

use crate::extract::FieldExtractor;
use crate::fetch::TieredFetcher;
use crate::links::LinkClassifier;
use crate::{utils, Ingest, PageOutcome, Rejection, Settings};

/// Queue and history of one domain pass. Never shared between passes.
#[derive(Debug)]
pub struct CrawlState {
    frontier: VecDeque<Url>,
    visited: HashSet<Url>,
    pages_crawled: usize,
    frontier_cap: usize,
}

impl CrawlState {
    /// The seed is queued and already counts as visited.
    pub fn new(seed: Url, frontier_cap: usize) -> Self {
        let mut visited = HashSet::new();
        visited.insert(seed.clone());
        Self {
            frontier: VecDeque::from([seed]),
            visited,
            pages_crawled: 0,
            frontier_cap,
        }
    }

    pub fn pop(&mut self) -> Option<Url> {
        self.frontier.pop_front()
    }

    /// Enqueues links that were never seen while the frontier has room. A link
    /// is marked visited when it is admitted. Returns how many got in.
    pub fn admit(&mut self, links: impl IntoIterator<Item = Url>) -> usize {
        let mut admitted = 0;
        for link in links {
            if self.frontier.len() >= self.frontier_cap {
                break;
            }
            if self.visited.insert(link.clone()) {
                self.frontier.push_back(link);
                admitted += 1;
            }
        }
        admitted
    }

    pub fn visited(&self) -> &HashSet<Url> {
        &self.visited
    }

    pub fn pending(&self) -> usize {
        self.frontier.len()
    }

    pub fn pages_crawled(&self) -> usize {
        self.pages_crawled
    }

    pub fn mark_crawled(&mut self) {
        self.pages_crawled += 1;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainReport {
    pub domain: String,
    pub jobs_found: usize,
    pub pages_crawled: usize,
    pub skipped: usize,
    /// Pages where a mandatory field was still missing after extraction.
    pub incomplete: usize,
    /// Records the sink refused.
    pub push_failed: usize,
}

impl fmt::Display for DomainReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Domain          : {}", self.domain)?;
        writeln!(f, "Jobs            : {}", self.jobs_found)?;
        writeln!(f, "Pages           : {}", self.pages_crawled)?;
        writeln!(f, "Skipped         : {}", self.skipped)?;
        writeln!(f, "Incomplete      : {}", self.incomplete)?;
        write!(f, "Push Failed     : {}", self.push_failed)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlSummary {
    pub domains: Vec<DomainReport>,
}

impl CrawlSummary {
    pub fn jobs_found(&self) -> usize {
        self.domains.iter().map(|d| d.jobs_found).sum()
    }

    pub fn pages_crawled(&self) -> usize {
        self.domains.iter().map(|d| d.pages_crawled).sum()
    }
}

/// Drives one domain pass over borrowed, process-wide collaborators.
pub struct DomainCrawler<'a> {
    fetcher: &'a TieredFetcher,
    extractor: &'a FieldExtractor,
    links: LinkClassifier,
    settings: &'a Settings,
    state: CrawlState,
    report: DomainReport,
}

impl<'a> DomainCrawler<'a> {
    pub fn new(
        seed: Url,
        fetcher: &'a TieredFetcher,
        extractor: &'a FieldExtractor,
        settings: &'a Settings,
    ) -> Self {
        let report = DomainReport {
            domain: seed.host_str().unwrap_or_default().to_string(),
            ..Default::default()
        };
        Self {
            fetcher,
            extractor,
            links: LinkClassifier::new(settings.max_links_per_page),
            settings,
            state: CrawlState::new(seed, settings.frontier_cap),
            report,
        }
    }

    /// Crawls until the frontier runs dry or the page budget is spent.
    pub async fn run(mut self, sink: &mut dyn Ingest) -> DomainReport {
        info!("Starting crawl for {}", self.report.domain);

        let budget = self.settings.max_pages_per_domain;
        while self.state.pages_crawled() < budget {
            let url = match self.state.pop() {
                Some(url) => url,
                None => break,
            };

            match self.process_page(&url, sink).await {
                PageOutcome::Job => self.report.jobs_found += 1,
                PageOutcome::NoJob(Rejection::ExtractionIncomplete) => self.report.incomplete += 1,
                PageOutcome::NoJob(Rejection::PushFailure) => self.report.push_failed += 1,
                PageOutcome::Skipped => self.report.skipped += 1,
            }
            self.state.mark_crawled();

            if self.state.pending() > 0 && self.state.pages_crawled() < budget {
                tokio::time::sleep(utils::jitter(self.settings.pace_min, self.settings.pace_max))
                    .await;
            }
        }

        self.report.pages_crawled = self.state.pages_crawled();
        self.report
    }

    async fn process_page(&mut self, url: &Url, sink: &mut dyn Ingest) -> PageOutcome {
        let html = match self.fetcher.fetch(url).await {
            Some(html) => html,
            None => {
                warn!("Skipping {}: no tier could retrieve it", url);
                return PageOutcome::Skipped;
            }
        };

        let outcome = match self.extractor.extract(&html, url).await {
            Some(record) => {
                let title = record.title.clone();
                if sink.push(record).await {
                    info!("Job found and pushed: {}", title);
                    PageOutcome::Job
                } else {
                    warn!("Failed to push job: {}", title);
                    PageOutcome::NoJob(Rejection::PushFailure)
                }
            }
            None => PageOutcome::NoJob(Rejection::ExtractionIncomplete),
        };

        let links = {
            let doc = Html::parse_document(&html);
            self.links.extract_links(&doc, url, self.state.visited())
        };
        let admitted = self.state.admit(links);
        debug!(
            "{} new links from {} (pending {})",
            admitted,
            url,
            self.state.pending()
        );

        outcome
    }
}

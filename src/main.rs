use clap::Parser;
use job_posting_crawler::config::{self, Cli, Settings};
use job_posting_crawler::extract::FieldExtractor;
use job_posting_crawler::fetch::http::HttpSource;
use job_posting_crawler::fetch::TieredFetcher;
use job_posting_crawler::oracle::{NoOracle, OllamaOracle};
use job_posting_crawler::sink::ApiSink;
use job_posting_crawler::{run_crawler, CrawlerError, Oracle};
use tracing::{info, warn};
use tracing_error::ErrorLayer;
use tracing_subscriber::prelude::*;

fn build_fetcher(settings: &Settings) -> Result<TieredFetcher, CrawlerError> {
    let http = HttpSource::new(
        settings.fetch_timeout,
        settings.request_delay_min,
        settings.request_delay_max,
    )?;
    let fetcher = TieredFetcher::new(Box::new(http), settings.fetch_timeout)
        .with_thin_threshold(settings.thin_threshold);

    #[cfg(feature = "headless")]
    let fetcher = if settings.render {
        fetcher.with_rendered(Box::new(
            job_posting_crawler::fetch::browser::BrowserSource::new(settings.fetch_timeout),
        ))
    } else {
        fetcher
    };

    #[cfg(not(feature = "headless"))]
    if settings.render {
        warn!("Built without the `headless` feature, crawling with static fetches only");
    }

    Ok(fetcher)
}

fn build_oracle(settings: &Settings) -> Result<Box<dyn Oracle>, CrawlerError> {
    if !settings.oracle_enabled {
        return Ok(Box::new(NoOracle));
    }
    let oracle = OllamaOracle::new(
        settings.oracle_url.clone(),
        settings.oracle_model.as_str(),
        settings.oracle_timeout,
    )?;
    Ok(Box::new(oracle))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| {
                "info,html5ever=error,selectors=error,hyper=warn,reqwest=info,chromiumoxide=warn"
                    .into()
            }),
        )
        .with(ErrorLayer::default())
        .init();

    let cli = Cli::parse();
    if cli.init && config::write_example_seeds(&cli.urls)? {
        info!("Created example {}", cli.urls.display());
    }

    let settings = cli.settings();
    settings.validate()?;
    let seeds = config::load_seeds(&cli.urls)?;

    let fetcher = build_fetcher(&settings)?;
    let extractor = FieldExtractor::new(build_oracle(&settings)?);
    let mut sink = ApiSink::new(settings.ingest_url.clone(), settings.ingest_timeout)?;

    let result = run_crawler(&seeds, &fetcher, &extractor, &mut sink, &settings).await;
    fetcher.shutdown().await;

    let summary = result?;
    for report in &summary.domains {
        info!("\n{}", report);
    }
    if !sink.failed().is_empty() {
        warn!("{} jobs were rejected by the ingestion endpoint", sink.failed().len());
    }
    sink.flush(&settings.output)?;

    Ok(())
}

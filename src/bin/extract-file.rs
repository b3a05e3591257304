use clap::Parser;
use job_posting_crawler::extract::FieldExtractor;
use job_posting_crawler::oracle::{NoOracle, OllamaOracle, DEFAULT_ORACLE_MODEL, DEFAULT_ORACLE_URL};
use job_posting_crawler::Oracle;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Runs the field extractor over a saved page.
#[derive(Parser, Debug)]
struct Args {
    /// Saved HTML file
    file: PathBuf,

    /// URL the page was fetched from, used to resolve relative links
    #[arg(long, default_value = "https://example.com/jobs/1")]
    page_url: Url,

    /// Ask the extraction model for missing fields
    #[arg(long)]
    oracle: bool,

    #[arg(long, default_value = DEFAULT_ORACLE_URL)]
    oracle_url: Url,

    #[arg(long, default_value = DEFAULT_ORACLE_MODEL)]
    oracle_model: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("LOG_LEVEL")
                .unwrap_or_else(|_| "info,html5ever=error,selectors=error".into()),
        )
        .init();

    let args = Args::parse();
    let html = std::fs::read_to_string(&args.file)?;

    let oracle: Box<dyn Oracle> = if args.oracle {
        Box::new(OllamaOracle::new(
            args.oracle_url,
            args.oracle_model,
            Duration::from_secs(60),
        )?)
    } else {
        Box::new(NoOracle)
    };

    match FieldExtractor::new(oracle).extract(&html, &args.page_url).await {
        Some(record) => {
            println!("{}", record);
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        None => println!("No job posting found in {}", args.file.display()),
    }
    Ok(())
}

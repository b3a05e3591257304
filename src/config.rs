use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::fetch::DEFAULT_THIN_THRESHOLD;
use crate::links::DEFAULT_MAX_LINKS;
use crate::oracle::{DEFAULT_ORACLE_MODEL, DEFAULT_ORACLE_URL};
use crate::sink::DEFAULT_INGEST_URL;
use crate::CrawlerError;

const EXAMPLE_SEEDS: [&str; 5] = [
    "https://remoteok.com/remote-dev-jobs",
    "https://weworkremotely.com/remote-jobs",
    "https://stackoverflow.com/jobs",
    "https://jobs.lever.co/",
    "https://boards.greenhouse.io/",
];

/// Seed file layout: `{ "urls": [...] }`.
#[derive(Debug, Serialize, Deserialize)]
pub struct SeedFile {
    pub urls: Vec<String>,
}

/// Reads the seed URLs. Any problem here is fatal for the run.
pub fn load_seeds(path: &Path) -> Result<Vec<Url>, CrawlerError> {
    let raw = std::fs::read_to_string(path).map_err(|source| CrawlerError::SeedFile {
        path: path.to_path_buf(),
        source,
    })?;
    parse_seeds(&raw)
}

pub fn parse_seeds(raw: &str) -> Result<Vec<Url>, CrawlerError> {
    let seeds: SeedFile = serde_json::from_str(raw)
        .map_err(|err| CrawlerError::Config(format!("invalid seed file: {}", err)))?;

    if seeds.urls.is_empty() {
        return Err(CrawlerError::Config("No starting URLs found".to_string()));
    }

    seeds
        .urls
        .iter()
        .map(|raw| {
            let url = Url::parse(raw.trim())
                .map_err(|err| CrawlerError::Config(format!("invalid seed URL {:?}: {}", raw, err)))?;
            match url.scheme() {
                "http" | "https" if url.host_str().is_some() => Ok(url),
                _ => Err(CrawlerError::Config(format!("seed URL {:?} is not http(s)", raw))),
            }
        })
        .collect()
}

/// Writes the example seed list unless the file already exists. Returns
/// whether a file was created.
pub fn write_example_seeds(path: &Path) -> Result<bool, CrawlerError> {
    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == ErrorKind::AlreadyExists => return Ok(false),
        Err(err) => return Err(err.into()),
    };
    let seeds = SeedFile {
        urls: EXAMPLE_SEEDS.iter().map(ToString::to_string).collect(),
    };
    file.write_all(serde_json::to_string_pretty(&seeds)?.as_bytes())?;
    Ok(true)
}

/// Every tunable of a run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub max_pages_per_domain: usize,
    pub frontier_cap: usize,
    pub max_links_per_page: usize,
    pub fetch_timeout: Duration,
    pub request_delay_min: Duration,
    pub request_delay_max: Duration,
    pub pace_min: Duration,
    pub pace_max: Duration,
    pub thin_threshold: usize,
    pub render: bool,
    pub oracle_enabled: bool,
    pub oracle_url: Url,
    pub oracle_model: String,
    pub oracle_timeout: Duration,
    pub ingest_url: Url,
    pub ingest_timeout: Duration,
    pub output: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_pages_per_domain: 30,
            frontier_cap: 50,
            max_links_per_page: DEFAULT_MAX_LINKS,
            fetch_timeout: Duration::from_secs(30),
            request_delay_min: Duration::from_secs(3),
            request_delay_max: Duration::from_secs(5),
            pace_min: Duration::from_secs(2),
            pace_max: Duration::from_secs(5),
            thin_threshold: DEFAULT_THIN_THRESHOLD,
            render: true,
            oracle_enabled: true,
            oracle_url: Url::parse(DEFAULT_ORACLE_URL).expect("Invalid default oracle URL"),
            oracle_model: DEFAULT_ORACLE_MODEL.to_string(),
            oracle_timeout: Duration::from_secs(60),
            ingest_url: Url::parse(DEFAULT_INGEST_URL).expect("Invalid default ingest URL"),
            ingest_timeout: Duration::from_secs(30),
            output: PathBuf::from("scraped_jobs.json"),
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), CrawlerError> {
        if self.max_pages_per_domain == 0 {
            return Err(CrawlerError::Config("max pages per domain must be positive".into()));
        }
        if self.frontier_cap == 0 || self.max_links_per_page == 0 {
            return Err(CrawlerError::Config("frontier and link caps must be positive".into()));
        }
        if self.pace_min.is_zero() || self.pace_max < self.pace_min {
            return Err(CrawlerError::Config(format!(
                "pacing delay must be non-zero and ordered, got {:?}..{:?}",
                self.pace_min, self.pace_max
            )));
        }
        if self.fetch_timeout.is_zero() || self.oracle_timeout.is_zero() || self.ingest_timeout.is_zero() {
            return Err(CrawlerError::Config("timeouts must be positive".into()));
        }
        if self.request_delay_max < self.request_delay_min || self.request_delay_max >= self.fetch_timeout {
            return Err(CrawlerError::Config(format!(
                "request delay {:?}..{:?} must be ordered and shorter than the fetch timeout {:?}",
                self.request_delay_min, self.request_delay_max, self.fetch_timeout
            )));
        }
        Ok(())
    }
}

/// Crawl job boards starting from a list of seed URLs.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// JSON file with the seed URLs
    #[arg(long, default_value = "urls.json")]
    pub urls: PathBuf,

    /// Create an example seed file if it does not exist yet
    #[arg(long)]
    pub init: bool,

    /// Where the accepted jobs are written at the end of the run
    #[arg(long, default_value = "scraped_jobs.json")]
    pub output: PathBuf,

    #[arg(long, default_value_t = 30)]
    pub max_pages: usize,

    /// Page fetch timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,

    /// Minimum delay before each static request, in seconds
    #[arg(long, default_value_t = 3)]
    pub delay: u64,

    /// Static pages shorter than this many characters are fetched again rendered
    #[arg(long, default_value_t = DEFAULT_THIN_THRESHOLD)]
    pub thin_threshold: usize,

    /// Never fall back to the headless browser
    #[arg(long)]
    pub no_render: bool,

    /// Shortest pause between two pages of a domain, in seconds
    #[arg(long, default_value_t = 2)]
    pub pace_min: u64,

    /// Longest pause between two pages of a domain, in seconds
    #[arg(long, default_value_t = 5)]
    pub pace_max: u64,

    /// Never consult the extraction model
    #[arg(long)]
    pub no_oracle: bool,

    #[arg(long, default_value = DEFAULT_ORACLE_URL)]
    pub oracle_url: Url,

    #[arg(long, default_value = DEFAULT_ORACLE_MODEL)]
    pub oracle_model: String,

    /// Extraction model timeout in seconds
    #[arg(long, default_value_t = 60)]
    pub oracle_timeout: u64,

    #[arg(long, default_value = DEFAULT_INGEST_URL)]
    pub ingest_url: Url,

    /// Ingestion request timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub ingest_timeout: u64,
}

impl Cli {
    pub fn settings(&self) -> Settings {
        let delay = Duration::from_secs(self.delay);
        Settings {
            max_pages_per_domain: self.max_pages,
            fetch_timeout: Duration::from_secs(self.timeout),
            request_delay_min: delay,
            request_delay_max: delay + Duration::from_secs(2),
            pace_min: Duration::from_secs(self.pace_min),
            pace_max: Duration::from_secs(self.pace_max),
            thin_threshold: self.thin_threshold,
            render: !self.no_render,
            oracle_enabled: !self.no_oracle,
            oracle_url: self.oracle_url.clone(),
            oracle_model: self.oracle_model.clone(),
            oracle_timeout: Duration::from_secs(self.oracle_timeout),
            ingest_url: self.ingest_url.clone(),
            ingest_timeout: Duration::from_secs(self.ingest_timeout),
            output: self.output.clone(),
            ..Settings::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_parse_seeds_keeps_order() {
        let seeds = parse_seeds(r#"{"urls": ["https://b.example.com/jobs", "https://a.example.com"]}"#)
            .unwrap();
        assert_eq!(
            seeds.iter().map(Url::as_str).collect::<Vec<_>>(),
            vec!["https://b.example.com/jobs", "https://a.example.com/"]
        );
    }

    #[test]
    fn test_bad_seed_files_are_config_failures() {
        for raw in [
            "not json",
            r#"{"links": []}"#,
            r#"{"urls": []}"#,
            r#"{"urls": ["/relative/path"]}"#,
            r#"{"urls": ["ftp://example.com"]}"#,
        ] {
            assert!(
                matches!(parse_seeds(raw), Err(CrawlerError::Config(_))),
                "{} should be rejected",
                raw
            );
        }
    }

    #[test]
    fn test_missing_seed_file() {
        let dir = TempDir::new().unwrap();
        let err = load_seeds(&dir.path().join("urls.json")).unwrap_err();
        assert!(matches!(err, CrawlerError::SeedFile { .. }));
    }

    #[test]
    fn test_example_seeds_written_once() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("urls.json");

        assert!(write_example_seeds(&path).unwrap());
        std::fs::write(&path, r#"{"urls": ["https://example.com/jobs"]}"#).unwrap();
        assert!(!write_example_seeds(&path).unwrap());

        assert_eq!(load_seeds(&path).unwrap().len(), 1);
    }

    #[test]
    fn test_example_seeds_are_valid() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("urls.json");
        write_example_seeds(&path).unwrap();
        assert_eq!(load_seeds(&path).unwrap().len(), EXAMPLE_SEEDS.len());
    }

    #[test]
    fn test_settings_validation() {
        assert!(Settings::default().validate().is_ok());

        let no_pacing = Settings {
            pace_min: Duration::ZERO,
            ..Settings::default()
        };
        assert!(no_pacing.validate().is_err());

        let no_budget = Settings {
            max_pages_per_domain: 0,
            ..Settings::default()
        };
        assert!(no_budget.validate().is_err());
    }

    #[test]
    fn test_request_delay_must_fit_in_fetch_timeout() {
        let slow_pacing = Settings {
            fetch_timeout: Duration::from_millis(300),
            request_delay_min: Duration::from_millis(300),
            request_delay_max: Duration::from_millis(500),
            ..Settings::default()
        };
        assert!(matches!(slow_pacing.validate(), Err(CrawlerError::Config(_))));

        for args in [
            vec!["job-posting-crawler", "--delay", "30"],
            vec!["job-posting-crawler", "--timeout", "3", "--delay", "3"],
        ] {
            let settings = Cli::try_parse_from(args).unwrap().settings();
            assert!(settings.validate().is_err());
        }
    }

    #[test]
    fn test_cli_tunes_pacing_and_timeouts() {
        let cli = Cli::try_parse_from([
            "job-posting-crawler",
            "--thin-threshold",
            "400",
            "--pace-min",
            "1",
            "--pace-max",
            "3",
            "--oracle-timeout",
            "90",
            "--ingest-timeout",
            "10",
        ])
        .unwrap();
        let settings = cli.settings();

        assert_eq!(settings.thin_threshold, 400);
        assert_eq!(settings.pace_min, Duration::from_secs(1));
        assert_eq!(settings.pace_max, Duration::from_secs(3));
        assert_eq!(settings.oracle_timeout, Duration::from_secs(90));
        assert_eq!(settings.ingest_timeout, Duration::from_secs(10));
        assert!(settings.validate().is_ok());

        let no_pacing = Cli::try_parse_from(["job-posting-crawler", "--pace-min", "0"]).unwrap();
        assert!(no_pacing.settings().validate().is_err());
    }

    #[test]
    fn test_cli_maps_to_settings() {
        let cli = Cli::try_parse_from([
            "job-posting-crawler",
            "--max-pages",
            "5",
            "--delay",
            "1",
            "--no-render",
        ])
        .unwrap();
        let settings = cli.settings();

        assert_eq!(settings.max_pages_per_domain, 5);
        assert_eq!(settings.request_delay_min, Duration::from_secs(1));
        assert_eq!(settings.request_delay_max, Duration::from_secs(3));
        assert!(!settings.render);
        assert!(settings.oracle_enabled);
        assert_eq!(settings.frontier_cap, 50);
        assert_eq!(settings.ingest_url.as_str(), DEFAULT_INGEST_URL);
    }
}

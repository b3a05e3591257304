use async_trait::async_trait;
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::{error, info, warn};
use url::Url;

use crate::data::{IngestPayload, JobRecord};
use crate::{CrawlerError, Ingest};

pub const DEFAULT_INGEST_URL: &str = "http://localhost:8080/jobs";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing was accumulated; no file was touched.
    Empty,
    Written(usize),
}

/// Pushes records to the ingestion endpoint and keeps the accepted ones for
/// the end-of-run JSON file.
#[derive(Debug)]
pub struct ApiSink {
    client: reqwest::Client,
    endpoint: Url,
    records: Vec<JobRecord>,
    failed: Vec<JobRecord>,
}

impl ApiSink {
    pub fn new(endpoint: Url, timeout: Duration) -> Result<Self, CrawlerError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| CrawlerError::Config(format!("ingest client: {}", err)))?;
        Ok(Self {
            client,
            endpoint,
            records: vec![],
            failed: vec![],
        })
    }

    /// Records the endpoint accepted.
    pub fn records(&self) -> &[JobRecord] {
        &self.records
    }

    /// Records the endpoint rejected. They are never pushed again nor flushed.
    pub fn failed(&self) -> &[JobRecord] {
        &self.failed
    }

    /// Writes the accepted records as one JSON array, atomically.
    pub fn flush(&self, destination: &Path) -> Result<FlushOutcome, CrawlerError> {
        if self.records.is_empty() {
            warn!("No jobs to save");
            return Ok(FlushOutcome::Empty);
        }

        let json = serde_json::to_string_pretty(&self.records)?;
        write_atomic(destination, json.as_bytes())?;
        info!(
            "Saved {} jobs to {}",
            self.records.len(),
            destination.display()
        );
        Ok(FlushOutcome::Written(self.records.len()))
    }
}

#[async_trait]
impl Ingest for ApiSink {
    async fn push(&mut self, record: JobRecord) -> bool {
        let sent = self
            .client
            .post(self.endpoint.clone())
            .json(&IngestPayload::from(&record))
            .send()
            .await
            .and_then(|response| response.error_for_status());

        match sent {
            Ok(_) => {
                info!("Successfully pushed job '{}' to API", record.title);
                self.records.push(record);
                true
            }
            Err(err) => {
                error!("API request failed for '{}': {}", record.title, err);
                self.failed.push(record);
                false
            }
        }
    }
}

/// Temp file in the destination directory, then a rename over the target.
fn write_atomic(destination: &Path, content: &[u8]) -> Result<(), std::io::Error> {
    let dir = match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.flush()?;
    tmp.as_file().sync_all()?;
    tmp.persist(destination).map_err(|err| err.error)?;
    Ok(())
}

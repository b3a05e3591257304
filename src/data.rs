use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Descriptions longer than this are cut, for both extraction passes.
pub const MAX_DESCRIPTION_CHARS: usize = 2000;

/// A job posting. The crawl builds these through
/// [`ExtractionCandidate::finish`], which guarantees a non-empty `title` and
/// `description`; records built or deserialized elsewhere are not checked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    #[serde(rename = "job_title")]
    pub title: String,
    #[serde(rename = "job_description")]
    pub description: String,
    #[serde(rename = "job_location")]
    pub location: Option<String>,
    pub apply_url: Url,
    pub company_image: Option<Url>,
    pub date_posted: Option<NaiveDateTime>,
}

impl fmt::Display for JobRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Title           : {}", self.title)?;
        writeln!(
            f,
            "Location        : {}",
            self.location.as_deref().unwrap_or("None")
        )?;
        writeln!(f, "Apply URL       : {}", self.apply_url)?;

        if let Some(d) = self.company_image.as_ref() {
            writeln!(f, "Company Image   : {}", d)?;
        } else {
            writeln!(f, "Company Image   : None")?;
        };

        if let Some(d) = self.date_posted.as_ref() {
            writeln!(f, "Date Posted     : {}", d)?;
        } else {
            writeln!(f, "Date Posted     : None")?;
        };

        writeln!(f, "Description     : ")?;
        for line in self.description.lines() {
            writeln!(f, "> {}", line)?;
        }

        Ok(())
    }
}

/// The partially filled record while a page is being extracted. Also the
/// normalized shape of an oracle guess.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionCandidate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub apply_url: Option<Url>,
    pub company_image: Option<Url>,
    pub date_posted: Option<NaiveDateTime>,
}

impl ExtractionCandidate {
    /// True when a field the oracle is consulted for is still empty.
    pub fn needs_oracle(&self) -> bool {
        self.title.is_none() || self.description.is_none() || self.location.is_none()
    }

    /// Fills every still-empty field from `guess`. Fields already set are kept.
    pub fn merge_missing(&mut self, guess: ExtractionCandidate) {
        self.title = self.title.take().or(guess.title);
        self.description = self.description.take().or(guess.description);
        self.location = self.location.take().or(guess.location);
        self.apply_url = self.apply_url.take().or(guess.apply_url);
        self.company_image = self.company_image.take().or(guess.company_image);
        self.date_posted = self.date_posted.take().or(guess.date_posted);
    }

    /// Turns the candidate into a record, or `None` when a mandatory field is
    /// missing. A missing apply link falls back to the page itself.
    pub fn finish(self, page_url: &Url) -> Option<JobRecord> {
        let title = non_empty(self.title)?;
        let description = non_empty(self.description)?;

        Some(JobRecord {
            title,
            description,
            location: non_empty(self.location),
            apply_url: self.apply_url.unwrap_or_else(|| page_url.clone()),
            company_image: self.company_image,
            date_posted: self.date_posted,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Body accepted by the ingestion endpoint. It carries no location.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct IngestPayload<'a> {
    pub job_title: &'a str,
    pub job_description: &'a str,
    pub apply_url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_image: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_posted: Option<NaiveDateTime>,
}

impl<'a> From<&'a JobRecord> for IngestPayload<'a> {
    fn from(record: &'a JobRecord) -> Self {
        IngestPayload {
            job_title: &record.title,
            job_description: &record.description,
            apply_url: record.apply_url.as_str(),
            company_image: record.company_image.as_ref().map(Url::as_str),
            date_posted: record.date_posted,
        }
    }
}

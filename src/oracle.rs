use async_trait::async_trait;
use lazy_regex::regex_captures;
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;
use tracing::{debug, error};
use url::Url;

use crate::data::{ExtractionCandidate, MAX_DESCRIPTION_CHARS};
use crate::error::{CrawlerError, OracleError};
use crate::{utils, Oracle};

pub const DEFAULT_ORACLE_URL: &str = "http://localhost:11434/api/chat";
pub const DEFAULT_ORACLE_MODEL: &str = "gemma3";

/// Oracle that is never consulted; every guess is empty.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOracle;

#[async_trait]
impl Oracle for NoOracle {
    async fn guess(&self, _markup: &str, _page_url: &Url) -> ExtractionCandidate {
        ExtractionCandidate::default()
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: Option<ChatMessage>,
}

/// Asks a chat-completion endpoint (Ollama wire format) for the fields of a
/// job posting.
#[derive(Debug, Clone)]
pub struct OllamaOracle {
    client: reqwest::Client,
    endpoint: Url,
    model: String,
}

impl OllamaOracle {
    pub fn new(endpoint: Url, model: impl Into<String>, timeout: Duration) -> Result<Self, CrawlerError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| CrawlerError::Config(format!("oracle client: {}", err)))?;
        Ok(Self {
            client,
            endpoint,
            model: model.into(),
        })
    }

    async fn ask(&self, markup: &str, page_url: &Url) -> Result<RawGuess, OracleError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt(markup, page_url),
            }],
            stream: false,
        };

        let response: ChatResponse = self
            .client
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let content = response.message.ok_or(OracleError::MissingContent)?.content;
        debug!("Oracle replied {} chars for {}", content.len(), page_url);
        parse_reply(&content)
    }
}

#[async_trait]
impl Oracle for OllamaOracle {
    async fn guess(&self, markup: &str, page_url: &Url) -> ExtractionCandidate {
        match self.ask(markup, page_url).await {
            Ok(raw) => raw.normalize(page_url),
            Err(err) => {
                error!("Oracle failed for {}: {}", page_url, err);
                ExtractionCandidate::default()
            }
        }
    }
}

fn prompt(markup: &str, page_url: &Url) -> String {
    format!(
        r#"The HTML below comes from {url} and may contain a job posting.
Extract these fields:
- job_title: the main heading of the posting
- job_description: the text describing the role, its responsibilities and requirements
- job_location: where the job is based, e.g. "Remote" or "London, UK"
- apply_url: the link or button target used to apply; the page URL if there is none
- company_image: the URL of the company logo, if any
- date_posted: when the job was posted, as YYYY-MM-DD when possible or "N days ago"

Answer with a single JSON object using exactly those keys. Use null for anything you cannot find.

HTML:
{markup}"#,
        url = page_url,
        markup = markup
    )
}

/// The oracle's answer before normalization. Non-string values are dropped.
#[derive(Debug, Default, PartialEq, Eq, Deserialize)]
pub(crate) struct RawGuess {
    #[serde(default, deserialize_with = "string_or_none")]
    job_title: Option<String>,
    #[serde(default, deserialize_with = "string_or_none")]
    job_description: Option<String>,
    #[serde(default, deserialize_with = "string_or_none")]
    job_location: Option<String>,
    #[serde(default, deserialize_with = "string_or_none")]
    apply_url: Option<String>,
    #[serde(default, deserialize_with = "string_or_none")]
    company_image: Option<String>,
    #[serde(default, deserialize_with = "string_or_none")]
    date_posted: Option<String>,
}

fn string_or_none<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(match serde_json::Value::deserialize(d)? {
        serde_json::Value::String(s) => Some(s),
        _ => None,
    })
}

impl RawGuess {
    /// Resolves links against the page and parses the date.
    pub(crate) fn normalize(self, page_url: &Url) -> ExtractionCandidate {
        let text = |s: Option<String>| s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());

        ExtractionCandidate {
            title: text(self.job_title),
            description: text(self.job_description)
                .map(|d| utils::truncate_chars(&d, MAX_DESCRIPTION_CHARS)),
            location: text(self.job_location),
            apply_url: text(self.apply_url).and_then(|u| utils::resolve_url(page_url, &u)),
            company_image: text(self.company_image).and_then(|u| utils::resolve_url(page_url, &u)),
            date_posted: text(self.date_posted).and_then(|d| utils::parse_date(&d)),
        }
    }
}

/// Parses the model reply, tolerating a surrounding Markdown code fence.
pub(crate) fn parse_reply(content: &str) -> Result<RawGuess, OracleError> {
    let content = content.trim();
    let json = match regex_captures!(r"(?s)^```(?:json)?\s*(.*?)\s*```$", content) {
        Some((_, inner)) => inner,
        None => content,
    };
    Ok(serde_json::from_str(json)?)
}

use async_trait::async_trait;
use rand::seq::SliceRandom;
use rand::Rng;
use reqwest::header::{self, HeaderMap, HeaderValue};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::{utils, CrawlerError, FetchError, PageSource};

const USER_AGENTS: [&str; 6] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_4_1) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4.1 Safari/605.1.15",
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:124.0) Gecko/20100101 Firefox/124.0",
];

const REFERER: &str = "https://www.google.com/";

/// Plain HTTP retrieval over one shared client.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::Client,
    delay_min: Duration,
    delay_max: Duration,
}

impl HttpSource {
    /// `pace` waits a random `[delay_min, delay_max]`; `timeout` bounds the
    /// request alone.
    pub fn new(timeout: Duration, delay_min: Duration, delay_max: Duration) -> Result<Self, CrawlerError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8"),
        );
        headers.insert(header::ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
        headers.insert(header::UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| CrawlerError::Config(format!("http client: {}", err)))?;

        Ok(Self {
            client,
            delay_min,
            delay_max,
        })
    }
}

#[async_trait]
impl PageSource for HttpSource {
    async fn pace(&self) {
        tokio::time::sleep(utils::jitter(self.delay_min, self.delay_max)).await;
    }

    async fn fetch(&self, url: &Url) -> Result<String, FetchError> {
        let (user_agent, with_referer) = {
            let mut rng = rand::thread_rng();
            let user_agent = USER_AGENTS.choose(&mut rng).copied().unwrap_or(USER_AGENTS[0]);
            (user_agent, rng.gen_bool(0.5))
        };

        let mut request = self
            .client
            .get(url.clone())
            .header(header::USER_AGENT, user_agent);
        if with_referer {
            request = request.header(header::REFERER, REFERER);
        }

        debug!("Visit {}", url);
        let response = request.send().await?.error_for_status()?;
        Ok(response.text().await?)
    }
}

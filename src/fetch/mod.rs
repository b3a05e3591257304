//! Two-tier page retrieval: a plain HTTP fetch first, a rendering browser
//! when the plain result is missing or looks like an unrendered shell.

pub mod http;

#[cfg(feature = "headless")]
pub mod browser;

use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::{FetchError, PageSource};

/// Static pages shorter than this (in characters) are re-fetched rendered.
pub const DEFAULT_THIN_THRESHOLD: usize = 1000;

/// Placeholder text that marks a page whose content is filled in by scripts.
const LOADING_MARKER: &str = "loading";

/// Extra room for the rendered tier on top of the fetch timeout. The tier
/// bounds its own page work and still has to close the page afterwards.
pub const RENDERED_GRACE: Duration = Duration::from_secs(10);

pub struct TieredFetcher {
    primary: Box<dyn PageSource>,
    rendered: Option<Box<dyn PageSource>>,
    thin_threshold: usize,
    timeout: Duration,
}

impl TieredFetcher {
    pub fn new(primary: Box<dyn PageSource>, timeout: Duration) -> Self {
        Self {
            primary,
            rendered: None,
            thin_threshold: DEFAULT_THIN_THRESHOLD,
            timeout,
        }
    }

    pub fn with_rendered(mut self, rendered: Box<dyn PageSource>) -> Self {
        self.rendered = Some(rendered);
        self
    }

    pub fn with_thin_threshold(mut self, thin_threshold: usize) -> Self {
        self.thin_threshold = thin_threshold;
        self
    }

    /// Markup for `url`, or `None` when every tier failed. Escalates to the
    /// rendered tier at most once.
    pub async fn fetch(&self, url: &Url) -> Option<String> {
        info!("Fetching: {}", url);
        let primary = self.attempt(self.primary.as_ref(), url, self.timeout).await;

        let rendered = match self.rendered.as_deref() {
            Some(rendered) => rendered,
            None => return primary.ok(),
        };

        match primary {
            Err(err) => {
                warn!("Static fetch failed for {}: {}", url, err);
                info!("Trying rendered fetch for {}", url);
                self.attempt(rendered, url, self.rendered_limit()).await.ok()
            }
            Ok(html) if looks_unrendered(&html, self.thin_threshold) => {
                info!("Page seems script-rendered, retrying rendered for {}", url);
                match self.attempt(rendered, url, self.rendered_limit()).await {
                    Ok(full) if full.chars().count() > html.chars().count() => Some(full),
                    _ => Some(html),
                }
            }
            Ok(html) => Some(html),
        }
    }

    fn rendered_limit(&self) -> Duration {
        self.timeout + RENDERED_GRACE
    }

    /// Paces, then fetches under `limit`. The pacing wait is not timed.
    async fn attempt(
        &self,
        source: &dyn PageSource,
        url: &Url,
        limit: Duration,
    ) -> Result<String, FetchError> {
        source.pace().await;
        let result = bounded(limit, source.fetch(url)).await;
        if let Err(err) = &result {
            debug!("Fetch of {} failed: {}", url, err);
        }
        result
    }

    /// Releases both tiers. Safe to call whatever the crawl outcome was.
    pub async fn shutdown(&self) {
        self.primary.shutdown().await;
        if let Some(rendered) = &self.rendered {
            rendered.shutdown().await;
        }
    }
}

async fn bounded<W>(limit: Duration, work: W) -> Result<String, FetchError>
where
    W: Future<Output = Result<String, FetchError>>,
{
    tokio::time::timeout(limit, work)
        .await
        .unwrap_or(Err(FetchError::Timeout))
}

/// Runs `work` under `limit`, then `cleanup` on every path, timeout included.
pub async fn bounded_then<W, F, C>(limit: Duration, work: W, cleanup: F) -> Result<String, FetchError>
where
    W: Future<Output = Result<String, FetchError>>,
    F: FnOnce() -> C,
    C: Future<Output = ()>,
{
    let result = bounded(limit, work).await;
    cleanup().await;
    result
}

/// Coarse check for pages whose content has not been rendered yet. Tunable
/// through the threshold; legitimately short static pages also trip it.
pub fn looks_unrendered(html: &str, thin_threshold: usize) -> bool {
    html.chars().count() < thin_threshold || html.to_lowercase().contains(LOADING_MARKER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Scripted {
        reply: Result<String, FetchError>,
        pace: Duration,
        delay: Duration,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl PageSource for Scripted {
        async fn pace(&self) {
            tokio::time::sleep(self.pace).await;
        }

        async fn fetch(&self, _url: &Url) -> Result<String, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.reply.clone()
        }
    }

    fn scripted(reply: Result<String, FetchError>) -> (Box<dyn PageSource>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let source = Scripted {
            reply,
            pace: Duration::ZERO,
            delay: Duration::ZERO,
            calls: calls.clone(),
        };
        (Box::new(source), calls)
    }

    fn page(len: usize) -> String {
        format!("<html><body>{}</body></html>", "a".repeat(len))
    }

    fn url() -> Url {
        Url::parse("https://example.com/jobs").unwrap()
    }

    fn tiers(
        primary: Result<String, FetchError>,
        rendered: Result<String, FetchError>,
    ) -> (TieredFetcher, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let (primary, primary_calls) = scripted(primary);
        let (rendered, rendered_calls) = scripted(rendered);
        let fetcher = TieredFetcher::new(primary, Duration::from_secs(5)).with_rendered(rendered);
        (fetcher, primary_calls, rendered_calls)
    }

    #[tokio::test]
    async fn test_substantial_static_page_is_not_escalated() {
        let (fetcher, primary, rendered) = tiers(Ok(page(2000)), Ok(page(5000)));

        assert_eq!(fetcher.fetch(&url()).await, Some(page(2000)));
        assert_eq!(primary.load(Ordering::SeqCst), 1);
        assert_eq!(rendered.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_thin_page_is_superseded_by_longer_render() {
        let (fetcher, _, rendered) = tiers(Ok(page(10)), Ok(page(3000)));

        assert_eq!(fetcher.fetch(&url()).await, Some(page(3000)));
        assert_eq!(rendered.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_render_must_be_strictly_longer() {
        let (fetcher, _, _) = tiers(Ok(page(10)), Ok(page(10).replace('a', "b")));
        assert_eq!(fetcher.fetch(&url()).await, Some(page(10)));

        let (fetcher, _, _) = tiers(Ok(page(10)), Err(FetchError::Browser("crashed".into())));
        assert_eq!(fetcher.fetch(&url()).await, Some(page(10)));
    }

    #[tokio::test]
    async fn test_loading_marker_escalates_once() {
        let shell = format!("<div>Loading jobs...</div>{}", "x".repeat(2000));
        let (fetcher, primary, rendered) = tiers(Ok(shell), Ok(page(4000)));

        assert_eq!(fetcher.fetch(&url()).await, Some(page(4000)));
        assert_eq!(primary.load(Ordering::SeqCst), 1);
        assert_eq!(rendered.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_static_falls_back_to_render() {
        let (fetcher, _, rendered) = tiers(Err(FetchError::Status(403)), Ok(page(50)));

        // A short rendered result is still better than nothing.
        assert_eq!(fetcher.fetch(&url()).await, Some(page(50)));
        assert_eq!(rendered.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_both_tiers_failing_is_none() {
        let (fetcher, _, _) = tiers(
            Err(FetchError::Network("refused".into())),
            Err(FetchError::Unavailable),
        );
        assert_eq!(fetcher.fetch(&url()).await, None);
    }

    #[tokio::test]
    async fn test_without_rendered_tier_static_result_stands() {
        let (primary, _) = scripted(Ok(page(10)));
        let fetcher = TieredFetcher::new(primary, Duration::from_secs(5));
        assert_eq!(fetcher.fetch(&url()).await, Some(page(10)));

        let (primary, _) = scripted(Err(FetchError::Status(500)));
        let fetcher = TieredFetcher::new(primary, Duration::from_secs(5));
        assert_eq!(fetcher.fetch(&url()).await, None);
    }

    #[tokio::test]
    async fn test_slow_tier_times_out() {
        let calls = Arc::new(AtomicUsize::new(0));
        let slow = Scripted {
            reply: Ok(page(2000)),
            pace: Duration::ZERO,
            delay: Duration::from_millis(500),
            calls,
        };
        let fetcher = TieredFetcher::new(Box::new(slow), Duration::from_millis(20));
        assert_eq!(fetcher.fetch(&url()).await, None);
    }

    #[tokio::test]
    async fn test_pacing_wait_is_not_timed() {
        let calls = Arc::new(AtomicUsize::new(0));
        let polite = Scripted {
            reply: Ok(page(2000)),
            pace: Duration::from_millis(200),
            delay: Duration::ZERO,
            calls: calls.clone(),
        };
        let fetcher = TieredFetcher::new(Box::new(polite), Duration::from_millis(50));

        assert_eq!(fetcher.fetch(&url()).await, Some(page(2000)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rendered_tier_gets_extra_time() {
        let (primary, _) = scripted(Ok(page(10)));
        let slow_render = Scripted {
            reply: Ok(page(3000)),
            pace: Duration::ZERO,
            delay: Duration::from_millis(100),
            calls: Arc::new(AtomicUsize::new(0)),
        };
        let fetcher = TieredFetcher::new(primary, Duration::from_millis(20))
            .with_rendered(Box::new(slow_render));

        assert_eq!(fetcher.fetch(&url()).await, Some(page(3000)));
    }

    #[tokio::test]
    async fn test_cleanup_runs_when_work_times_out() {
        let cleaned = Arc::new(AtomicUsize::new(0));
        let result = bounded_then(
            Duration::from_millis(20),
            async {
                tokio::time::sleep(Duration::from_millis(500)).await;
                Ok(page(10))
            },
            || async {
                cleaned.fetch_add(1, Ordering::SeqCst);
            },
        )
        .await;

        assert_eq!(result, Err(FetchError::Timeout));
        assert_eq!(cleaned.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cleanup_runs_after_success() {
        let cleaned = Arc::new(AtomicUsize::new(0));
        let result = bounded_then(
            Duration::from_secs(1),
            async { Ok(page(10)) },
            || async {
                cleaned.fetch_add(1, Ordering::SeqCst);
            },
        )
        .await;

        assert_eq!(result, Ok(page(10)));
        assert_eq!(cleaned.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_looks_unrendered() {
        assert!(looks_unrendered("<html></html>", DEFAULT_THIN_THRESHOLD));
        assert!(looks_unrendered(
            &format!("{}LOADING", "x".repeat(3000)),
            DEFAULT_THIN_THRESHOLD
        ));
        assert!(!looks_unrendered(&page(1000), DEFAULT_THIN_THRESHOLD));
    }
}

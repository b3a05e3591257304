use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::Page;
use futures::StreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use url::Url;

use super::bounded_then;
use crate::{utils, FetchError, PageSource};

const BROWSER_ARGS: [&str; 6] = [
    "--disable-blink-features=AutomationControlled",
    "--disable-dev-shm-usage",
    "--disable-extensions",
    "--disable-gpu",
    "--no-sandbox",
    "--window-size=1920,1080",
];

const HIDE_WEBDRIVER: &str =
    "Object.defineProperty(navigator, 'webdriver', { get: () => undefined })";
const SCROLL_TO_BOTTOM: &str = "window.scrollTo(0, document.body.scrollHeight);";

const BODY_WAIT: Duration = Duration::from_secs(10);
const BODY_POLL: Duration = Duration::from_millis(250);
const SETTLE_MIN: Duration = Duration::from_secs(2);
const SETTLE_MAX: Duration = Duration::from_secs(4);
const AFTER_SCROLL: Duration = Duration::from_secs(1);

struct Engine {
    browser: Browser,
    handler: JoinHandle<()>,
}

/// Rendered retrieval through one lazily launched headless Chromium, reused
/// for every page. A failed launch disables the tier for the rest of the run.
pub struct BrowserSource {
    engine: Mutex<Option<Engine>>,
    disabled: AtomicBool,
    render_timeout: Duration,
}

impl BrowserSource {
    /// `render_timeout` bounds the work on one page; the page is closed
    /// whether or not it expires.
    pub fn new(render_timeout: Duration) -> Self {
        Self {
            engine: Mutex::new(None),
            disabled: AtomicBool::new(false),
            render_timeout,
        }
    }
}

async fn launch() -> Result<Engine, FetchError> {
    let config = BrowserConfig::builder()
        .args(BROWSER_ARGS)
        .build()
        .map_err(FetchError::Browser)?;
    let (browser, mut handler) = Browser::launch(config)
        .await
        .map_err(|err| FetchError::Browser(err.to_string()))?;
    let handler = tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if event.is_err() {
                break;
            }
        }
    });
    info!("Headless browser launched");
    Ok(Engine { browser, handler })
}

async fn render(page: &Page, url: &Url) -> Result<String, FetchError> {
    let cdp = |err: chromiumoxide::error::CdpError| FetchError::Browser(err.to_string());

    // Registered before navigation so it runs ahead of the site's own scripts.
    if let Err(err) = page
        .execute(AddScriptToEvaluateOnNewDocumentParams::new(HIDE_WEBDRIVER))
        .await
    {
        debug!("Could not hide webdriver flag: {}", err);
    }
    page.goto(url.as_str()).await.map_err(cdp)?;

    let started = Instant::now();
    while page.find_element("body").await.is_err() {
        if started.elapsed() > BODY_WAIT {
            return Err(FetchError::Timeout);
        }
        tokio::time::sleep(BODY_POLL).await;
    }

    tokio::time::sleep(utils::jitter(SETTLE_MIN, SETTLE_MAX)).await;
    page.evaluate(SCROLL_TO_BOTTOM).await.map_err(cdp)?;
    tokio::time::sleep(AFTER_SCROLL).await;

    page.content().await.map_err(cdp)
}

#[async_trait]
impl PageSource for BrowserSource {
    async fn fetch(&self, url: &Url) -> Result<String, FetchError> {
        if self.disabled.load(Ordering::Relaxed) {
            return Err(FetchError::Unavailable);
        }

        let mut engine = self.engine.lock().await;
        if engine.is_none() {
            match launch().await {
                Ok(launched) => *engine = Some(launched),
                Err(err) => {
                    error!("Failed to launch headless browser: {}", err);
                    self.disabled.store(true, Ordering::Relaxed);
                    return Err(FetchError::Unavailable);
                }
            }
        }
        let browser = &engine.as_ref().ok_or(FetchError::Unavailable)?.browser;

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|err| FetchError::Browser(err.to_string()))?;
        bounded_then(self.render_timeout, render(&page, url), || async {
            if let Err(err) = page.clone().close().await {
                warn!("Failed to close page for {}: {}", url, err);
            }
        })
        .await
    }

    async fn shutdown(&self) {
        if let Some(mut engine) = self.engine.lock().await.take() {
            if let Err(err) = engine.browser.close().await {
                warn!("Failed to close headless browser: {}", err);
            }
            let _ = engine.browser.wait().await;
            engine.handler.abort();
            info!("Headless browser closed");
        }
    }
}

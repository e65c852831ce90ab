//! Page rendering capability for JavaScript-heavy bid platforms.
//!
//! Validators talk to a [`PageRenderer`] rather than to Chrome directly, so
//! the browser-backed platforms can be exercised against fixtures.
//!
//! [`ChromeRenderer`] keeps a single headless Chrome process alive across
//! rows and opens a fresh tab per render. If the process dies it is
//! relaunched on the next request. All calls block; run them on a blocking
//! thread from async code.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::BrowserConfig;

/// How long an idle Chrome connection is kept open. Rows validated over plain
/// HTTP can leave the browser quiet for a long time.
const IDLE_BROWSER_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    #[error("Failed to launch headless Chrome: {0}")]
    Launch(String),

    #[error("Failed to create browser tab: {0}")]
    Tab(String),

    #[error("Failed to load {url}: {reason}")]
    Navigation { url: String, reason: String },

    #[error("Failed to get page content for {url}: {reason}")]
    Content { url: String, reason: String },
}

/// What to load and what to wait for.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderRequest {
    pub url: String,
    /// CSS selectors; rendering waits until any one of them matches.
    pub wait_for: Vec<String>,
    pub wait_timeout: Duration,
    /// Fixed pause after load (and after the wait, if any).
    pub settle_delay: Duration,
}

impl RenderRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            wait_for: Vec::new(),
            wait_timeout: Duration::ZERO,
            settle_delay: Duration::ZERO,
        }
    }

    pub fn wait_for_any(mut self, selectors: &[&str], timeout: Duration) -> Self {
        self.wait_for = selectors.iter().map(|s| s.to_string()).collect();
        self.wait_timeout = timeout;
        self
    }

    pub fn settle(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPage {
    pub final_url: String,
    pub html: String,
    /// None of the awaited selectors appeared before the timeout.
    pub wait_timed_out: bool,
}

pub trait PageRenderer: Send + Sync {
    fn render(&self, request: &RenderRequest) -> Result<RenderedPage, RenderError>;
}

/// Headless Chrome via `headless_chrome`.
pub struct ChromeRenderer {
    config: BrowserConfig,
    browser: Mutex<Option<headless_chrome::Browser>>,
}

impl ChromeRenderer {
    /// Chrome is not launched until the first render.
    pub fn new(config: BrowserConfig) -> Self {
        Self {
            config,
            browser: Mutex::new(None),
        }
    }

    fn launch(&self) -> Result<headless_chrome::Browser, RenderError> {
        // Sandboxing is unavailable inside most containers
        let is_container = std::env::var("RFP_LINK_VALIDATOR_CONTAINER").is_ok()
            || std::path::Path::new("/.dockerenv").exists();

        let chrome_path: Option<PathBuf> = self
            .config
            .chrome_path
            .clone()
            .or_else(|| std::env::var("CHROME_PATH").ok())
            .map(PathBuf::from);

        let options = headless_chrome::LaunchOptions::default_builder()
            .headless(true)
            .sandbox(self.config.sandbox && !is_container)
            .path(chrome_path)
            .idle_browser_timeout(IDLE_BROWSER_TIMEOUT)
            .args(vec![OsStr::new("--disable-gpu"), OsStr::new("--disable-dev-shm-usage")])
            .build()
            .map_err(|e| RenderError::Launch(format!("invalid launch options: {}", e)))?;

        info!("Launching headless Chrome (sandbox: {})", self.config.sandbox && !is_container);
        headless_chrome::Browser::new(options).map_err(|e| RenderError::Launch(e.to_string()))
    }

    fn open_tab(&self, slot: &mut Option<headless_chrome::Browser>) -> Result<Arc<headless_chrome::Tab>, RenderError> {
        if let Some(browser) = slot.as_ref() {
            match browser.new_tab() {
                Ok(tab) => return Ok(tab),
                Err(e) => {
                    warn!("Browser connection lost ({}), relaunching", e);
                    *slot = None;
                }
            }
        }

        let browser = self.launch()?;
        let tab = browser.new_tab().map_err(|e| RenderError::Tab(e.to_string()))?;
        *slot = Some(browser);
        Ok(tab)
    }
}

impl PageRenderer for ChromeRenderer {
    fn render(&self, request: &RenderRequest) -> Result<RenderedPage, RenderError> {
        // A panic mid-render poisons the lock; drop that browser and start clean.
        let mut slot = self.browser.lock().unwrap_or_else(|poisoned| {
            let mut inner = poisoned.into_inner();
            *inner = None;
            inner
        });

        let tab = self.open_tab(&mut slot)?;
        let result = drive_tab(&tab, request);
        if let Err(e) = tab.close(false) {
            debug!("Failed to close tab for {}: {}", request.url, e);
        }
        result
    }
}

fn drive_tab(tab: &headless_chrome::Tab, request: &RenderRequest) -> Result<RenderedPage, RenderError> {
    let url = &request.url;

    tab.navigate_to(url).map_err(|e| RenderError::Navigation {
        url: url.clone(),
        reason: e.to_string(),
    })?;
    tab.wait_until_navigated().map_err(|e| RenderError::Navigation {
        url: url.clone(),
        reason: e.to_string(),
    })?;

    let mut wait_timed_out = false;
    if !request.wait_for.is_empty() {
        let selector = request.wait_for.join(", ");
        if let Err(e) = tab.wait_for_element_with_custom_timeout(&selector, request.wait_timeout) {
            debug!("Waiting for '{}' on {} ended: {}", selector, url, e);
            wait_timed_out = true;
        }
    }

    if !request.settle_delay.is_zero() {
        std::thread::sleep(request.settle_delay);
    }

    let html = tab.get_content().map_err(|e| RenderError::Content {
        url: url.clone(),
        reason: e.to_string(),
    })?;

    Ok(RenderedPage {
        final_url: tab.get_url(),
        html,
        wait_timed_out,
    })
}

/// Canned response for one URL in a [`FixtureRenderer`].
#[derive(Debug, Clone)]
pub enum Fixture {
    Page { html: String, final_url: Option<String> },
    Fail(String),
}

/// Deterministic renderer backed by in-memory pages.
///
/// A request waits "successfully" when any awaited selector matches the
/// fixture HTML; otherwise the page is returned with `wait_timed_out` set.
/// Unknown URLs fail like an unreachable host.
#[derive(Default)]
pub struct FixtureRenderer {
    pages: HashMap<String, Fixture>,
    requests: Mutex<Vec<RenderRequest>>,
}

impl FixtureRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.pages.insert(
            url.into(),
            Fixture::Page {
                html: html.into(),
                final_url: None,
            },
        );
        self
    }

    /// Page that ends up at a different URL than requested.
    pub fn with_redirected_page(
        mut self,
        url: impl Into<String>,
        final_url: impl Into<String>,
        html: impl Into<String>,
    ) -> Self {
        self.pages.insert(
            url.into(),
            Fixture::Page {
                html: html.into(),
                final_url: Some(final_url.into()),
            },
        );
        self
    }

    pub fn with_failure(mut self, url: impl Into<String>, reason: impl Into<String>) -> Self {
        self.pages.insert(url.into(), Fixture::Fail(reason.into()));
        self
    }

    /// Every request seen so far, in order.
    pub fn requests(&self) -> Vec<RenderRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn requested_urls(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.url).collect()
    }
}

impl PageRenderer for FixtureRenderer {
    fn render(&self, request: &RenderRequest) -> Result<RenderedPage, RenderError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        match self.pages.get(&request.url) {
            Some(Fixture::Page { html, final_url }) => Ok(RenderedPage {
                final_url: final_url.clone().unwrap_or_else(|| request.url.clone()),
                html: html.clone(),
                wait_timed_out: !request.wait_for.is_empty() && !any_selector_matches(html, &request.wait_for),
            }),
            Some(Fixture::Fail(reason)) => Err(RenderError::Navigation {
                url: request.url.clone(),
                reason: reason.clone(),
            }),
            None => Err(RenderError::Navigation {
                url: request.url.clone(),
                reason: "net::ERR_NAME_NOT_RESOLVED".to_string(),
            }),
        }
    }
}

fn any_selector_matches(html: &str, selectors: &[String]) -> bool {
    let document = scraper::Html::parse_document(html);
    selectors.iter().any(|s| match scraper::Selector::parse(s) {
        Ok(selector) => document.select(&selector).next().is_some(),
        Err(_) => false,
    })
}

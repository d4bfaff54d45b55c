//! Browser automation seam used by the login flow.
//!
//! The login sequencer only talks to [`BrowserDriver`]; a [`BrowserLauncher`]
//! decides which engine backs it. With the `webdriver` feature enabled the
//! default launcher drives Chrome (or Firefox as a fallback) through their
//! W3C WebDriver servers.

mod user_agent;
#[cfg(feature = "webdriver")]
pub mod webdriver;

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{Instant, sleep};

use crate::error::{AuthError, Result};

pub use user_agent::{USER_AGENTS, random_user_agent};

/// Bound applied to every wait unless the caller picks another.
pub const DEFAULT_WAIT: Duration = Duration::from_secs(10);

/// Interval between two polls of a wait condition.
pub const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// One network request observed by the browser, with its response if one arrived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedRequest {
    /// Engine-specific request id, needed to fetch the response body.
    pub id: Option<String>,
    pub method: String,
    pub url: String,
    pub status: Option<u16>,
    /// `Location` header of the response.
    pub location: Option<String>,
}

impl CapturedRequest {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: None,
            method: method.into(),
            url: url.into(),
            status: None,
            location: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_response(mut self, status: u16, location: Option<&str>) -> Self {
        self.status = Some(status);
        self.location = location.map(str::to_string);
        self
    }

    pub fn has_response(&self) -> bool {
        self.status.is_some()
    }

    /// Whether the response sent the browser elsewhere. Redirects carry no body.
    pub fn is_redirect(&self) -> bool {
        self.location.is_some() || matches!(self.status, Some(300..=399))
    }
}

/// A controllable browser instance.
///
/// Selectors are CSS selectors. All waits are bounded and report
/// [`AuthError::ElementTimeout`] or [`AuthError::RequestTimeout`] when the
/// bound expires.
#[async_trait]
pub trait BrowserDriver: Send {
    async fn navigate(&mut self, url: &str) -> Result<()>;

    /// Click the first element matching `selector`.
    async fn click(&mut self, selector: &str) -> Result<()>;

    /// Type into the first element matching `selector`.
    async fn type_text(&mut self, selector: &str, text: &str) -> Result<()>;

    /// Whether any element matching `selector` is displayed.
    async fn is_visible(&mut self, selector: &str) -> Result<bool>;

    /// Whether any element matching `selector` is displayed and enabled.
    async fn is_clickable(&mut self, selector: &str) -> Result<bool>;

    /// Rendered text of every element matching `selector`. Hidden elements yield "".
    async fn element_texts(&mut self, selector: &str) -> Result<Vec<String>>;

    /// Requests seen since the last [`clear_captured_requests`](Self::clear_captured_requests), oldest first.
    async fn captured_requests(&mut self) -> Result<Vec<CapturedRequest>>;

    async fn clear_captured_requests(&mut self) -> Result<()>;

    /// Body of the response to a captured request.
    async fn response_body(&mut self, request: &CapturedRequest) -> Result<String>;

    async fn close(&mut self) -> Result<()>;

    async fn wait_visible(&mut self, selector: &str, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.is_visible(selector).await? {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(AuthError::ElementTimeout {
                    selector: selector.to_string(),
                });
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    async fn wait_clickable(&mut self, selector: &str, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.is_clickable(selector).await? {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(AuthError::ElementTimeout {
                    selector: selector.to_string(),
                });
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    /// Newest captured request whose URL contains `pattern` and which has a response.
    async fn wait_for_request(
        &mut self,
        pattern: &str,
        timeout: Duration,
    ) -> Result<CapturedRequest> {
        let deadline = Instant::now() + timeout;
        loop {
            let found = self
                .captured_requests()
                .await?
                .into_iter()
                .rev()
                .find(|request| request.url.contains(pattern) && request.has_response());
            if let Some(request) = found {
                return Ok(request);
            }
            if Instant::now() >= deadline {
                return Err(AuthError::RequestTimeout {
                    pattern: pattern.to_string(),
                });
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    /// `Location` of the newest response to a request matching `pattern`, "" if it had none.
    async fn last_redirect_location(&mut self, pattern: &str, timeout: Duration) -> Result<String> {
        let request = self.wait_for_request(pattern, timeout).await?;
        Ok(request.location.unwrap_or_default())
    }
}

/// Starts browser instances for login attempts.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self, headless: bool) -> Result<Box<dyn BrowserDriver>>;
}

/// Launcher for builds without a browser engine.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableLauncher;

#[async_trait]
impl BrowserLauncher for UnavailableLauncher {
    async fn launch(&self, _headless: bool) -> Result<Box<dyn BrowserDriver>> {
        Err(AuthError::BrowserUnavailable(
            "built without the webdriver feature".to_string(),
        ))
    }
}

/// The launcher this build supports.
#[cfg(feature = "webdriver")]
pub fn default_launcher(accept_insecure_certs: bool) -> Box<dyn BrowserLauncher> {
    Box::new(webdriver::WebDriverLauncher::from_env(accept_insecure_certs))
}

/// The launcher this build supports.
#[cfg(not(feature = "webdriver"))]
pub fn default_launcher(_accept_insecure_certs: bool) -> Box<dyn BrowserLauncher> {
    Box::new(UnavailableLauncher)
}

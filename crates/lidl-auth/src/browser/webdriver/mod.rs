//! [`BrowserDriver`] backed by chromedriver or geckodriver.
//!
//! Chrome is tried first. Its traffic is read from the `performance` log and
//! response bodies come from DevTools. Firefox reports traffic as WebDriver
//! BiDi events but cannot hand out response bodies.

mod bidi;
mod engine;
mod network;
mod protocol;

use std::sync::Arc;

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use parking_lot::Mutex;
use serde_json::json;
use tracing::{debug, info, warn};

pub use engine::{Engine, NetworkSource};

use self::bidi::BidiCapture;
use self::engine::DriverProcess;
use self::network::NetworkLog;
use self::protocol::{CommandError, WebDriverClient};
use crate::browser::{BrowserDriver, BrowserLauncher, CapturedRequest, random_user_agent};
use crate::error::{AuthError, Result};

/// Launches Chrome, falling back to Firefox.
#[derive(Debug, Clone)]
pub struct WebDriverLauncher {
    chromedriver: String,
    geckodriver: String,
    accept_insecure_certs: bool,
}

impl WebDriverLauncher {
    pub fn new(
        chromedriver: impl Into<String>,
        geckodriver: impl Into<String>,
        accept_insecure_certs: bool,
    ) -> Self {
        Self {
            chromedriver: chromedriver.into(),
            geckodriver: geckodriver.into(),
            accept_insecure_certs,
        }
    }

    /// Driver binaries from `LIDL_PLUS_CHROMEDRIVER` / `LIDL_PLUS_GECKODRIVER`, else from `PATH`.
    pub fn from_env(accept_insecure_certs: bool) -> Self {
        let binary = |engine: Engine| {
            std::env::var(engine.driver_env()).unwrap_or_else(|_| engine.default_driver().to_string())
        };
        Self::new(
            binary(Engine::Chrome),
            binary(Engine::Firefox),
            accept_insecure_certs,
        )
    }

    fn binary(&self, engine: Engine) -> &str {
        match engine {
            Engine::Chrome => &self.chromedriver,
            Engine::Firefox => &self.geckodriver,
        }
    }

    async fn start(&self, engine: Engine, headless: bool) -> Result<WebDriverBrowser> {
        let http = reqwest::Client::new();
        let (driver, mut client) = DriverProcess::start(engine, self.binary(engine), &http).await?;

        let user_agent = random_user_agent();
        let capabilities = engine.capabilities(user_agent, headless, self.accept_insecure_certs);
        let granted = client
            .new_session(capabilities)
            .await
            .map_err(|e| AuthError::BrowserUnavailable(format!("{}: {}", engine, e)))?;

        let network = Arc::new(Mutex::new(NetworkLog::default()));
        let mut browser = WebDriverBrowser {
            engine,
            client,
            driver,
            network: network.clone(),
            bidi: None,
        };
        if engine.network_source() == NetworkSource::Bidi {
            let capture = match granted["webSocketUrl"].as_str() {
                Some(url) => BidiCapture::connect(url, network).await,
                None => Err(AuthError::BrowserUnavailable(format!(
                    "{} did not grant a BiDi websocket",
                    engine
                ))),
            };
            match capture {
                Ok(capture) => browser.bidi = Some(capture),
                Err(e) => {
                    if let Err(close_error) = browser.close().await {
                        debug!(error = %close_error, "Failed to close browser");
                    }
                    return Err(e);
                }
            }
        }

        info!(%engine, port = browser.driver.port(), headless, "Browser started");
        Ok(browser)
    }
}

#[async_trait]
impl BrowserLauncher for WebDriverLauncher {
    async fn launch(&self, headless: bool) -> Result<Box<dyn BrowserDriver>> {
        let chrome_error = match self.start(Engine::Chrome, headless).await {
            Ok(browser) => return Ok(Box::new(browser)),
            Err(e) => e,
        };
        warn!(error = %chrome_error, "Chrome unavailable, falling back to Firefox");

        match self.start(Engine::Firefox, headless).await {
            Ok(browser) => Ok(Box::new(browser)),
            Err(firefox_error) => Err(AuthError::BrowserUnavailable(format!(
                "chrome: {}; firefox: {}",
                chrome_error, firefox_error
            ))),
        }
    }
}

/// One WebDriver session plus the driver process hosting it.
#[derive(Debug)]
pub struct WebDriverBrowser {
    engine: Engine,
    client: WebDriverClient,
    driver: DriverProcess,
    network: Arc<Mutex<NetworkLog>>,
    /// Event reader filling `network` for BiDi engines.
    bidi: Option<BidiCapture>,
}

impl WebDriverBrowser {
    pub fn engine(&self) -> Engine {
        self.engine
    }

    async fn first_element(&self, selector: &str) -> Result<String> {
        self.client
            .find_elements(selector)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AuthError::Browser(format!("No element matches '{}'", selector)))
    }

    /// Whether any match is displayed (and enabled if required). Detached elements count as "not yet".
    async fn any_element(&self, selector: &str, require_enabled: bool) -> Result<bool> {
        for element in self.client.find_elements(selector).await? {
            let ready = match self.client.is_displayed(&element).await {
                Ok(true) if require_enabled => self.client.is_enabled(&element).await,
                other => other,
            };
            match ready {
                Ok(true) => return Ok(true),
                Ok(false) => {}
                Err(e) if e.is_stale() => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(false)
    }

    /// Pull pending log entries. BiDi events arrive on their own.
    async fn sync_network(&mut self) -> Result<()> {
        if self.engine.network_source() != NetworkSource::PerformanceLog {
            return Ok(());
        }
        let entries = self.client.log_entries("performance").await?;
        self.network.lock().ingest(&entries);
        Ok(())
    }
}

#[async_trait]
impl BrowserDriver for WebDriverBrowser {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        debug!("Navigating to authorization page");
        self.client.navigate(url).await?;
        Ok(())
    }

    async fn click(&mut self, selector: &str) -> Result<()> {
        let element = self.first_element(selector).await?;
        self.client.click(&element).await?;
        Ok(())
    }

    async fn type_text(&mut self, selector: &str, text: &str) -> Result<()> {
        let element = self.first_element(selector).await?;
        self.client.send_keys(&element, text).await?;
        Ok(())
    }

    async fn is_visible(&mut self, selector: &str) -> Result<bool> {
        self.any_element(selector, false).await
    }

    async fn is_clickable(&mut self, selector: &str) -> Result<bool> {
        self.any_element(selector, true).await
    }

    async fn element_texts(&mut self, selector: &str) -> Result<Vec<String>> {
        let mut texts = Vec::new();
        for element in self.client.find_elements(selector).await? {
            match self.client.text(&element).await {
                Ok(text) => texts.push(text),
                Err(e) if e.is_stale() => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(texts)
    }

    async fn captured_requests(&mut self) -> Result<Vec<CapturedRequest>> {
        self.sync_network().await?;
        Ok(self.network.lock().requests().to_vec())
    }

    async fn clear_captured_requests(&mut self) -> Result<()> {
        // Drain first so older entries do not reappear on the next read
        self.sync_network().await?;
        self.network.lock().clear();
        Ok(())
    }

    async fn response_body(&mut self, request: &CapturedRequest) -> Result<String> {
        let id = request.id.as_deref().ok_or_else(|| {
            AuthError::Browser(format!("Request to {} has no id", request.url))
        })?;
        if self.engine.network_source() != NetworkSource::PerformanceLog {
            return Err(AuthError::Browser(format!(
                "{} cannot read response bodies",
                self.engine
            )));
        }

        let value = self
            .client
            .cdp("Network.getResponseBody", json!({ "requestId": id }))
            .await?;
        let body = value["body"].as_str().unwrap_or_default();
        if value["base64Encoded"].as_bool().unwrap_or(false) {
            let bytes = STANDARD
                .decode(body)
                .map_err(|e| AuthError::Browser(format!("Invalid response body encoding: {}", e)))?;
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        } else {
            Ok(body.to_string())
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.bidi = None;
        let result = self.client.delete_session().await;
        self.driver.stop().await;
        result.map_err(|e: CommandError| e.into())
    }
}

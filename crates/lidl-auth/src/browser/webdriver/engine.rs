//! Browser engines and their driver processes.

use std::fmt;
use std::net::TcpListener;
use std::process::Stdio;
use std::time::Duration;

use serde_json::{Value, json};
use tokio::process::{Child, Command};
use tokio::time::{Instant, sleep};
use tracing::debug;

use super::protocol::WebDriverClient;
use crate::browser::POLL_INTERVAL;
use crate::error::{AuthError, Result};

/// How long a freshly spawned driver gets to report ready.
const DRIVER_STARTUP: Duration = Duration::from_secs(10);

/// Mobile viewport the login UI is rendered in.
const VIEWPORT_WIDTH: u32 = 390;
const VIEWPORT_HEIGHT: u32 = 844;
const PIXEL_RATIO: f64 = 3.0;

/// Channel a browser's network traffic is captured from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkSource {
    /// chromedriver's `performance` log, polled. Response bodies via DevTools.
    PerformanceLog,
    /// WebDriver BiDi events pushed over the session's websocket. No bodies.
    Bidi,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Engine {
    Chrome,
    Firefox,
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Engine::Chrome => write!(f, "chrome"),
            Engine::Firefox => write!(f, "firefox"),
        }
    }
}

impl Engine {
    /// Environment variable overriding the driver binary.
    pub fn driver_env(&self) -> &'static str {
        match self {
            Engine::Chrome => "LIDL_PLUS_CHROMEDRIVER",
            Engine::Firefox => "LIDL_PLUS_GECKODRIVER",
        }
    }

    pub fn default_driver(&self) -> &'static str {
        match self {
            Engine::Chrome => "chromedriver",
            Engine::Firefox => "geckodriver",
        }
    }

    fn port_args(&self, port: u16, websocket_port: Option<u16>) -> Vec<String> {
        match self {
            Engine::Chrome => vec![format!("--port={}", port)],
            Engine::Firefox => {
                let mut args = vec!["--port".to_string(), port.to_string()];
                if let Some(websocket_port) = websocket_port {
                    args.push("--websocket-port".to_string());
                    args.push(websocket_port.to_string());
                }
                args
            }
        }
    }

    /// Where the engine reports network traffic.
    pub fn network_source(&self) -> NetworkSource {
        match self {
            Engine::Chrome => NetworkSource::PerformanceLog,
            Engine::Firefox => NetworkSource::Bidi,
        }
    }

    /// `alwaysMatch` capabilities for a new session.
    pub fn capabilities(&self, user_agent: &str, headless: bool, accept_insecure_certs: bool) -> Value {
        match self {
            Engine::Chrome => {
                let mut args = vec![
                    "--no-sandbox".to_string(),
                    "--disable-dev-shm-usage".to_string(),
                    format!("--window-size={},{}", VIEWPORT_WIDTH, VIEWPORT_HEIGHT),
                ];
                if headless {
                    args.push("--headless=new".to_string());
                }
                json!({
                    "browserName": "chrome",
                    "acceptInsecureCerts": accept_insecure_certs,
                    "goog:loggingPrefs": { "performance": "ALL" },
                    "goog:chromeOptions": {
                        "args": args,
                        "mobileEmulation": {
                            "userAgent": user_agent,
                            "deviceMetrics": {
                                "width": VIEWPORT_WIDTH,
                                "height": VIEWPORT_HEIGHT,
                                "pixelRatio": PIXEL_RATIO,
                            },
                        },
                        "perfLoggingPrefs": { "enableNetwork": true, "enablePage": false },
                    },
                })
            }
            Engine::Firefox => {
                let mut args = vec![
                    format!("--width={}", VIEWPORT_WIDTH),
                    format!("--height={}", VIEWPORT_HEIGHT),
                ];
                if headless {
                    args.push("-headless".to_string());
                }
                json!({
                    "browserName": "firefox",
                    "acceptInsecureCerts": accept_insecure_certs,
                    "webSocketUrl": true,
                    "moz:firefoxOptions": {
                        "args": args,
                        "prefs": { "general.useragent.override": user_agent },
                    },
                })
            }
        }
    }
}

/// A running chromedriver/geckodriver. Killed when dropped.
#[derive(Debug)]
pub(crate) struct DriverProcess {
    child: Child,
    port: u16,
}

impl DriverProcess {
    /// Spawn the driver on a free local port and wait until it accepts sessions.
    pub(crate) async fn start(
        engine: Engine,
        binary: &str,
        http: &reqwest::Client,
    ) -> Result<(Self, WebDriverClient)> {
        let port = free_port()?;
        let websocket_port = match engine.network_source() {
            NetworkSource::Bidi => Some(free_port()?),
            NetworkSource::PerformanceLog => None,
        };
        debug!(%engine, binary, port, ?websocket_port, "Starting browser driver");

        let child = Command::new(binary)
            .args(engine.port_args(port, websocket_port))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AuthError::BrowserUnavailable(format!("{}: {}", binary, e)))?;
        let mut process = Self { child, port };

        let client = WebDriverClient::new(http.clone(), port);
        let deadline = Instant::now() + DRIVER_STARTUP;
        loop {
            if client.ready().await {
                return Ok((process, client));
            }
            if let Ok(Some(status)) = process.child.try_wait() {
                return Err(AuthError::BrowserUnavailable(format!(
                    "{} exited with {}",
                    binary, status
                )));
            }
            if Instant::now() >= deadline {
                process.stop().await;
                return Err(AuthError::BrowserUnavailable(format!(
                    "{} did not become ready",
                    binary
                )));
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    pub(crate) fn port(&self) -> u16 {
        self.port
    }

    pub(crate) async fn stop(&mut self) {
        if let Err(e) = self.child.kill().await {
            debug!(error = %e, "Driver already gone");
        }
    }
}

fn free_port() -> Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0")
        .map_err(|e| AuthError::BrowserUnavailable(format!("no free local port: {}", e)))?;
    let port = listener
        .local_addr()
        .map_err(|e| AuthError::BrowserUnavailable(format!("no free local port: {}", e)))?
        .port();
    Ok(port)
}

//! Minimal W3C WebDriver client: only the commands the login flow issues.

use std::time::Duration;

use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::AuthError;

/// Key under which W3C drivers return element references.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Per-command HTTP timeout. Page loads are bounded by the driver itself.
const COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

/// Failure of a single WebDriver command.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CommandError {
    #[error("driver unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{error}: {message}")]
    Protocol { error: String, message: String },

    #[error("unexpected driver response: {0}")]
    Shape(String),
}

impl CommandError {
    /// The element went away between lookup and use.
    pub(crate) fn is_stale(&self) -> bool {
        matches!(self, CommandError::Protocol { error, .. }
            if error == "stale element reference" || error == "no such element")
    }
}

impl From<CommandError> for AuthError {
    fn from(e: CommandError) -> Self {
        AuthError::Browser(e.to_string())
    }
}

type CommandResult<T> = std::result::Result<T, CommandError>;

#[derive(Debug, Deserialize)]
struct Envelope {
    value: Value,
}

#[derive(Debug, Deserialize)]
struct ErrorValue {
    error: String,
    #[serde(default)]
    message: String,
}

/// HTTP client bound to one driver process and, once created, one session.
#[derive(Debug, Clone)]
pub(crate) struct WebDriverClient {
    http: reqwest::Client,
    base_url: String,
    session_id: Option<String>,
}

impl WebDriverClient {
    pub(crate) fn new(http: reqwest::Client, port: u16) -> Self {
        Self {
            http,
            base_url: format!("http://127.0.0.1:{}", port),
            session_id: None,
        }
    }

    fn session_path(&self, path: &str) -> CommandResult<String> {
        let id = self
            .session_id
            .as_deref()
            .ok_or_else(|| CommandError::Shape("no active session".to_string()))?;
        Ok(format!("/session/{}{}", id, path))
    }

    async fn command(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<Value>,
    ) -> CommandResult<Value> {
        let mut request = self
            .http
            .request(method, format!("{}{}", self.base_url, path))
            .timeout(COMMAND_TIMEOUT);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();
        let envelope: Envelope = response
            .json()
            .await
            .map_err(|e| CommandError::Shape(format!("{} ({})", e, status)))?;

        if status.is_success() {
            return Ok(envelope.value);
        }

        match serde_json::from_value::<ErrorValue>(envelope.value) {
            Ok(err) => Err(CommandError::Protocol {
                error: err.error,
                message: err.message,
            }),
            Err(_) => Err(CommandError::Shape(format!("HTTP {}", status))),
        }
    }

    async fn session_command(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<Value>,
    ) -> CommandResult<Value> {
        let path = self.session_path(path)?;
        self.command(method, &path, body).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Driver
    // ─────────────────────────────────────────────────────────────────────────

    /// Whether the driver accepts new sessions.
    pub(crate) async fn ready(&self) -> bool {
        match self.command(reqwest::Method::GET, "/status", None).await {
            Ok(value) => value["ready"].as_bool().unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Start a session and return the capabilities the driver granted.
    pub(crate) async fn new_session(&mut self, capabilities: Value) -> CommandResult<Value> {
        let value = self
            .command(
                reqwest::Method::POST,
                "/session",
                Some(json!({ "capabilities": { "alwaysMatch": capabilities } })),
            )
            .await?;
        let id = value["sessionId"]
            .as_str()
            .ok_or_else(|| CommandError::Shape("new session without sessionId".to_string()))?;
        self.session_id = Some(id.to_string());
        Ok(value["capabilities"].clone())
    }

    pub(crate) async fn delete_session(&mut self) -> CommandResult<()> {
        if self.session_id.is_none() {
            return Ok(());
        }
        self.session_command(reqwest::Method::DELETE, "", None)
            .await?;
        self.session_id = None;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Navigation and elements
    // ─────────────────────────────────────────────────────────────────────────

    pub(crate) async fn navigate(&self, url: &str) -> CommandResult<()> {
        self.session_command(reqwest::Method::POST, "/url", Some(json!({ "url": url })))
            .await?;
        Ok(())
    }

    /// References of all elements matching a CSS selector; empty when none match.
    pub(crate) async fn find_elements(&self, selector: &str) -> CommandResult<Vec<String>> {
        let value = self
            .session_command(
                reqwest::Method::POST,
                "/elements",
                Some(json!({ "using": "css selector", "value": selector })),
            )
            .await?;
        let elements = value
            .as_array()
            .ok_or_else(|| CommandError::Shape("elements is not an array".to_string()))?;
        Ok(elements
            .iter()
            .filter_map(|element| element[ELEMENT_KEY].as_str().map(str::to_string))
            .collect())
    }

    async fn element_flag(&self, element: &str, property: &str) -> CommandResult<bool> {
        let value = self
            .session_command(
                reqwest::Method::GET,
                &format!("/element/{}/{}", element, property),
                None,
            )
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    pub(crate) async fn is_displayed(&self, element: &str) -> CommandResult<bool> {
        self.element_flag(element, "displayed").await
    }

    pub(crate) async fn is_enabled(&self, element: &str) -> CommandResult<bool> {
        self.element_flag(element, "enabled").await
    }

    pub(crate) async fn click(&self, element: &str) -> CommandResult<()> {
        self.session_command(
            reqwest::Method::POST,
            &format!("/element/{}/click", element),
            Some(json!({})),
        )
        .await?;
        Ok(())
    }

    pub(crate) async fn send_keys(&self, element: &str, text: &str) -> CommandResult<()> {
        self.session_command(
            reqwest::Method::POST,
            &format!("/element/{}/value", element),
            Some(json!({ "text": text })),
        )
        .await?;
        Ok(())
    }

    pub(crate) async fn text(&self, element: &str) -> CommandResult<String> {
        let value = self
            .session_command(
                reqwest::Method::GET,
                &format!("/element/{}/text", element),
                None,
            )
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Chrome extensions
    // ─────────────────────────────────────────────────────────────────────────

    /// Drain the entries of a browser log (chromedriver's `performance` log).
    pub(crate) async fn log_entries(&self, log_type: &str) -> CommandResult<Vec<Value>> {
        let value = self
            .session_command(
                reqwest::Method::POST,
                "/se/log",
                Some(json!({ "type": log_type })),
            )
            .await?;
        match value {
            Value::Array(entries) => Ok(entries),
            Value::Null => Ok(Vec::new()),
            other => Err(CommandError::Shape(format!("log is not an array: {}", other))),
        }
    }

    /// Run a Chrome DevTools Protocol command.
    pub(crate) async fn cdp(&self, cmd: &str, params: Value) -> CommandResult<Value> {
        self.session_command(
            reqwest::Method::POST,
            "/goog/cdp/execute",
            Some(json!({ "cmd": cmd, "params": params })),
        )
        .await
    }
}

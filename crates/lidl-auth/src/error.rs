//! Error types for the login flow and token lifecycle.

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Errors that can occur while logging in or authorizing requests.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Provider metadata could not be fetched or was incomplete.
    #[error("Discovery error: {0}")]
    Discovery(String),

    /// Neither supported browser engine could be started.
    #[error(
        "Can't connect to web browser ({0}). Install Chrome or Chromium with chromedriver, or Firefox with geckodriver"
    )]
    BrowserUnavailable(String),

    /// Caller supplied a value the login flow does not support.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A bounded wait for a page element expired.
    #[error("Timed out waiting for element '{selector}'")]
    ElementTimeout { selector: String },

    /// A bounded wait for a captured network request expired.
    #[error("Timed out waiting for a request matching '{pattern}'")]
    RequestTimeout { pattern: String },

    /// The provider rendered a validation message (wrong credentials, bad code, ...).
    #[error("{0}")]
    LoginRejected(String),

    /// Updated legal terms were shown and auto-accept is disabled.
    #[error("{0}")]
    LegalTerms(String),

    /// The legal terms screen kept coming back.
    #[error("Legal terms screen shown {shown} times in one login")]
    UnexpectedInterstitialLoop { shown: u32 },

    /// Login finished but no authorization code could be found in the redirects.
    #[error("Login finished without an authorization code")]
    MissingAuthorizationCode,

    /// Token endpoint rejected the grant or answered with something unreadable.
    #[error("Token exchange failed ({status}): {message}")]
    TokenExchange { status: u16, message: String },

    /// An authenticated call was attempted with no credential material.
    #[error("You need to login!")]
    MissingLogin,

    /// The login's cancellation token fired before it finished.
    #[error("Login aborted")]
    Aborted,

    /// WebDriver protocol failure.
    #[error("Browser error: {0}")]
    Browser(String),

    /// Network/HTTP error.
    #[error("Network error: {0}")]
    Network(String),
}

impl AuthError {
    /// Check if this error came from an expired bounded wait.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            AuthError::ElementTimeout { .. } | AuthError::RequestTimeout { .. }
        )
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(e: reqwest::Error) -> Self {
        AuthError::Network(e.to_string())
    }
}

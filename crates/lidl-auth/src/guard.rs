//! Gate consulted before every authenticated API call.

use chrono::{DateTime, Utc};
use reqwest::header::{ACCEPT_LANGUAGE, AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use tracing::info;

use crate::error::{AuthError, Result};
use crate::provider::{APP_ID, APP_VERSION, OPERATING_SYSTEM};
use crate::session::Session;
use crate::token::{Grant, TokenExchanger};

/// Whether the session has to go through a refresh grant before use.
pub fn needs_refresh(session: &Session, now: DateTime<Utc>) -> bool {
    if session.access_token.is_empty() {
        return !session.refresh_token.is_empty();
    }
    match session.expires_at {
        Some(expires_at) => now >= expires_at,
        None => false,
    }
}

/// Refreshes expired sessions and produces the resource API headers.
#[derive(Debug, Clone)]
pub struct SessionGuard {
    exchanger: TokenExchanger,
}

impl SessionGuard {
    pub fn new(exchanger: TokenExchanger) -> Self {
        Self { exchanger }
    }

    pub fn exchanger(&self) -> &TokenExchanger {
        &self.exchanger
    }

    /// Headers for an authenticated call, refreshing the access token first if needed.
    pub async fn authorized_headers(&self, session: &mut Session) -> Result<HeaderMap> {
        if needs_refresh(session, self.exchanger.clock().now()) {
            info!("Access token missing or expired, refreshing");
            self.exchanger.exchange(session, Grant::RefreshToken).await?;
        }

        if session.access_token.is_empty() {
            return Err(AuthError::MissingLogin);
        }

        app_headers(session)
    }
}

fn app_headers(session: &Session) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        header_value(&format!("Bearer {}", session.access_token()))?,
    );
    headers.insert(
        HeaderName::from_static("app-version"),
        HeaderValue::from_static(APP_VERSION),
    );
    headers.insert(
        HeaderName::from_static("operating-system"),
        HeaderValue::from_static(OPERATING_SYSTEM),
    );
    headers.insert(HeaderName::from_static("app"), HeaderValue::from_static(APP_ID));
    headers.insert(ACCEPT_LANGUAGE, header_value(session.language())?);
    Ok(headers)
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|_| AuthError::InvalidArgument("Value is not usable as an HTTP header".to_string()))
}

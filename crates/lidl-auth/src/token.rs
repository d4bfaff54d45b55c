//! Authorization-code and refresh-token exchanges against the token endpoint.

use serde::Deserialize;
use tracing::{debug, info};

use crate::clock::SharedClock;
use crate::error::{AuthError, Result};
use crate::provider::ProviderConfig;
use crate::session::Session;

/// Tokens returned from the token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    /// Lifetime of the access token in seconds.
    pub expires_in: i64,
}

/// Grant sent to the token endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Grant {
    /// Redeem the code of a finished login, proving possession of the session's PKCE verifier.
    AuthorizationCode { code: String },
    /// Trade the session's refresh token for a new access token.
    RefreshToken,
}

/// Performs token exchanges and writes the result into a [`Session`].
#[derive(Debug, Clone)]
pub struct TokenExchanger {
    http: reqwest::Client,
    provider: ProviderConfig,
    clock: SharedClock,
}

impl TokenExchanger {
    pub fn new(http: reqwest::Client, provider: ProviderConfig, clock: SharedClock) -> Self {
        Self {
            http,
            provider,
            clock,
        }
    }

    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    /// Run one exchange. On failure the session's tokens are left as they were.
    pub async fn exchange(&self, session: &mut Session, grant: Grant) -> Result<()> {
        let (grant_type, form): (&str, Vec<(&str, String)>) = match grant {
            Grant::AuthorizationCode { code } => {
                let verifier = session.take_verifier().ok_or_else(|| {
                    AuthError::InvalidArgument(
                        "No login in progress: build the authorization URL before exchanging a code"
                            .to_string(),
                    )
                })?;
                let form = vec![
                    ("grant_type", "authorization_code".to_string()),
                    ("code", code),
                    ("redirect_uri", self.provider.redirect_uri.clone()),
                    ("code_verifier", verifier),
                ];
                ("authorization_code", form)
            }
            Grant::RefreshToken => {
                if session.refresh_token.is_empty() {
                    return Err(AuthError::MissingLogin);
                }
                let form = vec![
                    ("grant_type", "refresh_token".to_string()),
                    ("refresh_token", session.refresh_token.clone()),
                ];
                ("refresh_token", form)
            }
        };
        debug!(grant_type, "Requesting tokens");

        let response = self
            .http
            .post(self.provider.token_url())
            .basic_auth(&self.provider.client_id, Some(&self.provider.client_secret))
            .form(&form)
            .send()
            .await
            .map_err(|e| AuthError::Network(format!("Token request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AuthError::TokenExchange {
                status: status.as_u16(),
                message: error_text,
            });
        }

        let tokens: TokenResponse =
            response
                .json()
                .await
                .map_err(|e| AuthError::TokenExchange {
                    status: status.as_u16(),
                    message: format!("Failed to parse token response: {}", e),
                })?;

        if tokens.access_token.is_empty() {
            return Err(AuthError::TokenExchange {
                status: status.as_u16(),
                message: "Token response has an empty access_token".to_string(),
            });
        }

        session.apply_tokens(tokens, self.clock.now());
        info!(expires_at = ?session.expires_at(), "Access token updated");
        Ok(())
    }
}

//! Authorization URL construction for the PKCE login.

use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::error::{AuthError, Result};
use crate::pkce::PkceChallenge;
use crate::provider::ProviderConfig;
use crate::session::Session;

/// The part of the OpenID provider metadata the login needs.
#[derive(Debug, Deserialize)]
struct ProviderMetadata {
    authorization_endpoint: String,
}

/// Builds (and caches) the authorization URL of a login attempt.
#[derive(Debug, Clone)]
pub struct Registrar {
    http: reqwest::Client,
    provider: ProviderConfig,
}

impl Registrar {
    pub fn new(http: reqwest::Client, provider: ProviderConfig) -> Self {
        Self { http, provider }
    }

    /// Authorization URL for the session's current login attempt.
    ///
    /// The first call fetches provider metadata and generates a PKCE pair;
    /// later calls return the cached URL so an in-flight verifier is never
    /// replaced.
    pub async fn authorization_url(&self, session: &mut Session) -> Result<String> {
        if let Some(url) = &session.authorization_url {
            return Ok(url.clone());
        }

        let endpoint = match &session.authorization_endpoint {
            Some(endpoint) => endpoint.clone(),
            None => {
                let endpoint = self.discover().await?;
                session.authorization_endpoint = Some(endpoint.clone());
                endpoint
            }
        };

        let pkce = PkceChallenge::generate();
        let url = build_authorization_url(
            &self.provider,
            &endpoint,
            &pkce.challenge,
            session.country(),
            session.language(),
        )?;

        session.pkce = Some(pkce);
        session.authorization_url = Some(url.clone());
        Ok(url)
    }

    async fn discover(&self) -> Result<String> {
        let url = self.provider.discovery_url();
        debug!(%url, "Fetching provider metadata");

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| AuthError::Discovery(format!("{}: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(AuthError::Discovery(format!(
                "{} returned {}",
                url,
                response.status()
            )));
        }

        let metadata: ProviderMetadata = response
            .json()
            .await
            .map_err(|e| AuthError::Discovery(format!("Failed to parse provider metadata: {}", e)))?;

        Ok(metadata.authorization_endpoint)
    }
}

/// Build the authorization URL for the Lidl Plus app client.
pub fn build_authorization_url(
    provider: &ProviderConfig,
    authorization_endpoint: &str,
    challenge: &str,
    country: &str,
    language: &str,
) -> Result<String> {
    let mut url = Url::parse(authorization_endpoint).map_err(|e| {
        AuthError::Discovery(format!(
            "Invalid authorization endpoint '{}': {}",
            authorization_endpoint, e
        ))
    })?;

    url.query_pairs_mut()
        .append_pair("client_id", &provider.client_id)
        .append_pair("response_type", "code")
        .append_pair("scope", &provider.scope)
        .append_pair("redirect_uri", &provider.redirect_uri)
        .append_pair("code_challenge", challenge)
        .append_pair("code_challenge_method", PkceChallenge::METHOD)
        .append_pair("Country", country)
        .append_pair("language", &format!("{}-{}", language, country));

    Ok(url.into())
}

//! Main client implementation.

use std::sync::Arc;
use std::time::Duration;

use lidl_auth::{Authenticator, ProviderConfig};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use crate::api::{CouponsApi, TicketsApi};
use crate::error::{Error, Result};

/// Default timeout for requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Lidl Plus API client.
///
/// Every call goes through the wrapped [`Authenticator`], which refreshes the
/// access token when it has expired.
///
/// # Example
///
/// ```no_run
/// use lidl_auth::Authenticator;
/// use lidl_client::LidlClient;
///
/// # async fn example() -> lidl_client::Result<()> {
/// let auth = Authenticator::builder("DE", "de")
///     .refresh_token("stored-refresh-token")
///     .build()?;
/// let client = LidlClient::builder(auth).build()?;
///
/// let receipts = client.tickets().list(false).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct LidlClient {
    /// Inner shared state.
    inner: Arc<ClientInner>,
}

/// Inner client state (shared across clones).
pub(crate) struct ClientInner {
    pub(crate) http: reqwest::Client,
    pub(crate) provider: ProviderConfig,
    pub(crate) country: String,
    pub(crate) timeout: Duration,
    /// Single writer of the session's tokens.
    pub(crate) auth: Mutex<Authenticator>,
}

impl LidlClient {
    /// Create a new client builder.
    pub fn builder(auth: Authenticator) -> ClientBuilder {
        ClientBuilder::new(auth)
    }

    /// Country code all resource paths are scoped to.
    pub fn country(&self) -> &str {
        &self.inner.country
    }

    /// Current refresh token (may have been rotated by a refresh).
    pub async fn refresh_token(&self) -> String {
        self.inner.auth.lock().await.refresh_token().to_string()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // API accessors
    // ─────────────────────────────────────────────────────────────────────────

    /// Access the receipts API.
    pub fn tickets(&self) -> TicketsApi {
        TicketsApi::new(self.clone())
    }

    /// Access the coupons API.
    pub fn coupons(&self) -> CouponsApi {
        CouponsApi::new(self.clone())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internal HTTP methods
    // ─────────────────────────────────────────────────────────────────────────

    /// Receipt API URL for a path below the country.
    pub(crate) fn ticket_url(&self, path: &str) -> String {
        format!(
            "{}/{}/{}",
            self.inner.provider.ticket_api.trim_end_matches('/'),
            self.inner.country,
            path.trim_start_matches('/')
        )
    }

    /// Coupon API URL for an API version and a path below the country.
    pub(crate) fn coupon_url(&self, version: &str, path: &str) -> String {
        let base = format!(
            "{}/{}/{}",
            self.inner.provider.coupons_api.trim_end_matches('/'),
            version,
            self.inner.country
        );
        if path.is_empty() {
            base
        } else {
            format!("{}/{}", base, path.trim_start_matches('/'))
        }
    }

    /// Make a GET request.
    pub(crate) async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self.send(Method::GET, url, &[]).await?;
        Ok(response.json().await?)
    }

    /// Make a GET request with query parameters.
    pub(crate) async fn get_with_query<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let response = self.send(Method::GET, url, query).await?;
        Ok(response.json().await?)
    }

    /// Make a body-less request whose response may be empty.
    pub(crate) async fn call(&self, method: Method, url: &str) -> Result<Value> {
        let response = self.send(method, url, &[]).await?;
        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&body)?)
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<reqwest::Response> {
        let headers = self.inner.auth.lock().await.authorized_headers().await?;
        debug!(%method, url, "API request");

        let response = self
            .inner
            .http
            .request(method, url)
            .headers(headers)
            .query(query)
            .timeout(self.inner.timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(self.extract_error(response).await);
        }
        Ok(response)
    }

    /// Extract an error from a failed response.
    async fn extract_error(&self, response: reqwest::Response) -> Error {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let message = if body.trim().is_empty() {
            format!("HTTP {}", status)
        } else {
            body
        };

        match status {
            401 => Error::Auth(message),
            404 => Error::NotFound(message),
            _ => Error::Api { status, message },
        }
    }
}

impl std::fmt::Debug for LidlClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LidlClient")
            .field("country", &self.inner.country)
            .field("ticket_api", &self.inner.provider.ticket_api)
            .field("coupons_api", &self.inner.provider.coupons_api)
            .finish()
    }
}

/// Builder for creating a LidlClient.
#[derive(Debug)]
pub struct ClientBuilder {
    auth: Authenticator,
    timeout: Duration,
    accept_invalid_certs: bool,
}

impl ClientBuilder {
    /// Create a new builder with defaults.
    pub fn new(auth: Authenticator) -> Self {
        Self {
            auth,
            timeout: DEFAULT_TIMEOUT,
            accept_invalid_certs: false,
        }
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Skip TLS certificate verification.
    pub fn accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<LidlClient> {
        let country = self.auth.session().country().to_string();
        if country.is_empty() {
            return Err(Error::Config("country is required".to_string()));
        }

        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(self.accept_invalid_certs)
            .build()?;

        Ok(LidlClient {
            inner: Arc::new(ClientInner {
                http,
                provider: self.auth.provider().clone(),
                country,
                timeout: self.timeout,
                auth: Mutex::new(self.auth),
            }),
        })
    }
}

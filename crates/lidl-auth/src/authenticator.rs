//! Entry point tying the login flow and token lifecycle to one [`Session`].

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::HeaderMap;
use tracing::info;

use crate::browser::BrowserLauncher;
use crate::clock::{SharedClock, SystemClock};
use crate::error::{AuthError, Result};
use crate::guard::SessionGuard;
use crate::login::{Credentials, LoginOptions, LoginSequencer, TwoFactorMethod, VerificationPrompt};
use crate::provider::ProviderConfig;
use crate::registrar::Registrar;
use crate::session::Session;
use crate::token::{Grant, TokenExchanger};

/// Timeout of discovery and token requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Owns a [`Session`] and every component allowed to change it.
///
/// # Example
///
/// ```no_run
/// use lidl_auth::Authenticator;
///
/// # async fn example() -> lidl_auth::Result<()> {
/// let mut auth = Authenticator::builder("DE", "de")
///     .refresh_token("stored-refresh-token")
///     .build()?;
///
/// let headers = auth.authorized_headers().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Authenticator {
    session: Session,
    provider: ProviderConfig,
    registrar: Registrar,
    guard: SessionGuard,
}

impl Authenticator {
    pub fn builder(country: &str, language: &str) -> AuthenticatorBuilder {
        AuthenticatorBuilder::new(country, language)
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn provider(&self) -> &ProviderConfig {
        &self.provider
    }

    pub fn refresh_token(&self) -> &str {
        self.session.refresh_token()
    }

    /// A valid access token, refreshing it first if it expired.
    pub async fn token(&mut self) -> Result<String> {
        self.guard.authorized_headers(&mut self.session).await?;
        Ok(self.session.access_token().to_string())
    }

    /// Headers for a resource API call, refreshing the access token first if it expired.
    pub async fn authorized_headers(&mut self) -> Result<HeaderMap> {
        self.guard.authorized_headers(&mut self.session).await
    }

    /// Authorization URL of the current login attempt (built on first use).
    pub async fn authorization_url(&mut self) -> Result<String> {
        self.registrar.authorization_url(&mut self.session).await
    }

    /// Log in through the browser and exchange the resulting code for tokens.
    pub async fn login(
        &mut self,
        launcher: &dyn BrowserLauncher,
        credentials: &Credentials,
        options: &LoginOptions,
        prompt: &dyn VerificationPrompt,
    ) -> Result<()> {
        let method: TwoFactorMethod = options.two_factor.parse()?;
        let url = self.authorization_url().await?;

        info!(country = %self.session.country(), "Starting browser login");
        let code = LoginSequencer::new(&self.provider, options, method)
            .run(launcher, &url, credentials, prompt)
            .await?;
        if code.is_empty() {
            return Err(AuthError::MissingAuthorizationCode);
        }

        self.exchange_code(code).await?;
        info!("Login succeeded");
        Ok(())
    }

    /// Redeem an authorization code obtained for [`authorization_url`](Self::authorization_url).
    pub async fn exchange_code(&mut self, code: impl Into<String>) -> Result<()> {
        self.guard
            .exchanger()
            .exchange(
                &mut self.session,
                Grant::AuthorizationCode { code: code.into() },
            )
            .await
    }

    /// Force a refresh grant regardless of expiry.
    pub async fn refresh(&mut self) -> Result<()> {
        self.guard
            .exchanger()
            .exchange(&mut self.session, Grant::RefreshToken)
            .await
    }
}

/// Builder for an [`Authenticator`].
#[derive(Debug)]
pub struct AuthenticatorBuilder {
    country: String,
    language: String,
    refresh_token: Option<String>,
    provider: ProviderConfig,
    clock: SharedClock,
    timeout: Duration,
    accept_invalid_certs: bool,
}

impl AuthenticatorBuilder {
    pub fn new(country: &str, language: &str) -> Self {
        Self {
            country: country.to_string(),
            language: language.to_string(),
            refresh_token: None,
            provider: ProviderConfig::default(),
            clock: Arc::new(SystemClock),
            timeout: DEFAULT_TIMEOUT,
            accept_invalid_certs: false,
        }
    }

    /// Start from a previously issued refresh token.
    pub fn refresh_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.refresh_token = (!token.is_empty()).then_some(token);
        self
    }

    pub fn provider(mut self, provider: ProviderConfig) -> Self {
        self.provider = provider;
        self
    }

    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Skip TLS certificate verification.
    pub fn accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    pub fn build(self) -> Result<Authenticator> {
        let http = reqwest::Client::builder()
            .timeout(self.timeout)
            .danger_accept_invalid_certs(self.accept_invalid_certs)
            .build()?;

        let mut session = Session::new(&self.country, &self.language);
        if let Some(token) = self.refresh_token {
            session = session.with_refresh_token(token);
        }

        Ok(Authenticator {
            session,
            registrar: Registrar::new(http.clone(), self.provider.clone()),
            guard: SessionGuard::new(TokenExchanger::new(
                http,
                self.provider.clone(),
                self.clock,
            )),
            provider: self.provider,
        })
    }
}

//! In-memory credential state for one Lidl Plus account.

use chrono::{DateTime, Duration, Utc};

use crate::pkce::PkceChallenge;
use crate::token::TokenResponse;

/// Country, language and token state of a logged-in (or logging-in) user.
///
/// Token fields are only written by the token exchanger; the authorization
/// URL and PKCE verifier are only written by the registrar.
#[derive(Clone)]
pub struct Session {
    country: String,
    language: String,
    pub(crate) access_token: String,
    pub(crate) refresh_token: String,
    pub(crate) expires_at: Option<DateTime<Utc>>,
    pub(crate) pkce: Option<PkceChallenge>,
    pub(crate) authorization_endpoint: Option<String>,
    pub(crate) authorization_url: Option<String>,
}

impl Session {
    pub fn new(country: &str, language: &str) -> Self {
        Self {
            country: country.trim().to_uppercase(),
            language: language.trim().to_lowercase(),
            access_token: String::new(),
            refresh_token: String::new(),
            expires_at: None,
            pkce: None,
            authorization_endpoint: None,
            authorization_url: None,
        }
    }

    /// Start from a refresh token obtained earlier, skipping the browser login.
    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = refresh_token.into();
        self
    }

    pub fn country(&self) -> &str {
        &self.country
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// Current access token, empty until the first exchange.
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn refresh_token(&self) -> &str {
        &self.refresh_token
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Whether any token is available to authorize with.
    pub fn has_credentials(&self) -> bool {
        !self.access_token.is_empty() || !self.refresh_token.is_empty()
    }

    /// Whether a login attempt is in flight (URL built, code not yet exchanged).
    pub fn has_pending_login(&self) -> bool {
        self.pkce.is_some()
    }

    pub(crate) fn apply_tokens(&mut self, tokens: TokenResponse, now: DateTime<Utc>) {
        self.expires_at = Some(now + Duration::seconds(tokens.expires_in));
        self.access_token = tokens.access_token;
        if !tokens.refresh_token.is_empty() {
            self.refresh_token = tokens.refresh_token;
        }
    }

    /// Hand out the verifier for a code exchange. The login attempt is over
    /// afterwards, so the cached URL goes with it.
    pub(crate) fn take_verifier(&mut self) -> Option<String> {
        self.authorization_url = None;
        self.pkce.take().map(|pkce| pkce.verifier)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("country", &self.country)
            .field("language", &self.language)
            .field("has_access_token", &!self.access_token.is_empty())
            .field("has_refresh_token", &!self.refresh_token.is_empty())
            .field("expires_at", &self.expires_at)
            .field("pending_login", &self.pkce.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_normalizes_case() {
        let session = Session::new("de", "DE");
        assert_eq!(session.country(), "DE");
        assert_eq!(session.language(), "de");
        assert!(!session.has_credentials());
        assert!(session.expires_at().is_none());
    }

    #[test]
    fn test_with_refresh_token() {
        let session = Session::new("AT", "de").with_refresh_token("R");
        assert_eq!(session.refresh_token(), "R");
        assert!(session.access_token().is_empty());
        assert!(session.has_credentials());
    }

    #[test]
    fn test_apply_tokens_keeps_refresh_token_when_omitted() {
        let now = Utc::now();
        let mut session = Session::new("DE", "de").with_refresh_token("old");
        session.apply_tokens(
            TokenResponse {
                access_token: "A".to_string(),
                refresh_token: String::new(),
                expires_in: 60,
            },
            now,
        );
        assert_eq!(session.access_token(), "A");
        assert_eq!(session.refresh_token(), "old");
        assert_eq!(session.expires_at(), Some(now + Duration::seconds(60)));
    }

    #[test]
    fn test_take_verifier_ends_login_attempt() {
        let mut session = Session::new("DE", "de");
        session.pkce = Some(PkceChallenge::from_verifier("v"));
        session.authorization_url = Some("https://example.test/authorize".to_string());
        assert!(session.has_pending_login());

        assert_eq!(session.take_verifier().as_deref(), Some("v"));
        assert!(!session.has_pending_login());
        assert!(session.authorization_url.is_none());
        assert!(session.take_verifier().is_none());
    }

    #[test]
    fn test_debug_hides_tokens() {
        let session = Session::new("DE", "de").with_refresh_token("very-secret");
        assert!(!format!("{:?}", session).contains("very-secret"));
    }
}

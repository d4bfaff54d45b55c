//! Headless OAuth 2.0 PKCE login and token lifecycle for Lidl Plus.
//!
//! The Lidl identity provider only issues tokens to its mobile app. This
//! crate logs in the way the app does: it drives a headless browser through
//! the provider's login pages, picks the authorization code out of the
//! redirect traffic and exchanges it for tokens, which are then refreshed
//! transparently before every API call.
//!
//! # Components
//!
//! - [`registrar`]: PKCE pair and authorization URL, cached per login attempt
//! - [`browser`]: browser automation seam, plus the WebDriver engine (feature `webdriver`)
//! - [`login`]: state machine walking the login, two-factor and legal terms pages
//! - [`token`]: authorization-code and refresh-token exchanges
//! - [`guard`]: refresh-on-expiry gate producing the resource API headers
//! - [`authenticator`]: owns a [`Session`] and exposes all of the above

pub mod authenticator;
pub mod browser;
pub mod clock;
pub mod error;
pub mod guard;
pub mod login;
pub mod pkce;
pub mod provider;
pub mod registrar;
pub mod session;
pub mod token;

pub use authenticator::{Authenticator, AuthenticatorBuilder};
pub use browser::{
    BrowserDriver, BrowserLauncher, CapturedRequest, UnavailableLauncher, default_launcher,
};
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use error::{AuthError, Result};
pub use guard::SessionGuard;
pub use login::{
    CallbackScan, Credentials, LoginOptions, LoginSequencer, TwoFactorMethod, VerificationPrompt,
};
pub use pkce::PkceChallenge;
pub use provider::ProviderConfig;
pub use registrar::Registrar;
pub use session::Session;
pub use token::{Grant, TokenExchanger, TokenResponse};
pub use tokio_util::sync::CancellationToken;

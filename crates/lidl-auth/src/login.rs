//! The login state machine driving the provider's web UI.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::browser::{
    BrowserDriver, BrowserLauncher, CapturedRequest, DEFAULT_WAIT, POLL_INTERVAL,
};
use crate::error::{AuthError, Result};
use crate::provider::ProviderConfig;

/// CSS selectors of the provider's login pages.
pub mod selectors {
    pub const WELCOME_LOGIN: &str = "#button_welcome_login";
    pub const EMAIL_OR_PHONE: &str = "[name=\"EmailOrPhone\"]";
    pub const SUBMIT_EMAIL: &str = "#button_btn_submit_email";
    pub const PASSWORD: &str = "#field_Password";
    pub const SUBMIT_PASSWORD: &str = "#button_submit";
    pub const VERIFICATION_CODE: &str = "[name=\"VerificationCode\"]";
    pub const VERIFY_NEXT: &str = ".role_next";
    pub const INPUT_ERROR: &str = ".input-error-message";
    pub const TERMS_CHECKBOX: &str = "#checkbox_Accepted";
    pub const TERMS_TITLE: &str = "h2";
    pub const TERMS_SUBMIT: &str = "button";
}

/// Legal terms screens tolerated in one login before giving up.
pub const MAX_LEGAL_TERMS_SCREENS: u32 = 3;

const CALLBACK_PATH: &str = "/connect/authorize/callback";

/// Reads of the login response body before it counts as unavailable.
const BODY_ATTEMPTS: u32 = 4;

static APP_ERRORS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"app-errors="\{[^:]*?:.(.*?).\}""#).expect("APP_ERRORS should compile")
});

static AUTHORIZATION_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"code=([0-9A-F]+)").expect("AUTHORIZATION_CODE should compile"));

// ─────────────────────────────────────────────────────────────────────────────
// Inputs
// ─────────────────────────────────────────────────────────────────────────────

/// Channel the provider sends the one-time verification code through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TwoFactorMethod {
    Phone,
    Email,
}

impl TwoFactorMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            TwoFactorMethod::Phone => "phone",
            TwoFactorMethod::Email => "email",
        }
    }
}

impl fmt::Display for TwoFactorMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TwoFactorMethod {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "phone" => Ok(TwoFactorMethod::Phone),
            "email" => Ok(TwoFactorMethod::Email),
            other => Err(AuthError::InvalidArgument(format!(
                "Unknown 2fa-mode \"{}\" - Only \"phone\" or \"email\" supported",
                other
            ))),
        }
    }
}

/// Username (phone number or email) and password of the account.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Knobs of one login attempt.
#[derive(Debug, Clone)]
pub struct LoginOptions {
    /// "phone" or "email". Validated before the browser starts.
    pub two_factor: String,
    pub headless: bool,
    pub accept_legal_terms: bool,
    /// Bound of every element and request wait.
    pub timeout: Duration,
    /// Cancels the attempt. The browser is still closed.
    pub cancellation: CancellationToken,
}

impl Default for LoginOptions {
    fn default() -> Self {
        Self {
            two_factor: TwoFactorMethod::Phone.as_str().to_string(),
            headless: true,
            accept_legal_terms: true,
            timeout: DEFAULT_WAIT,
            cancellation: CancellationToken::new(),
        }
    }
}

/// Asks the user for the verification code the provider just sent.
#[async_trait]
pub trait VerificationPrompt: Send + Sync {
    async fn verification_code(&self, method: TwoFactorMethod) -> Result<String>;
}

#[async_trait]
impl<F> VerificationPrompt for F
where
    F: Fn(TwoFactorMethod) -> String + Send + Sync,
{
    async fn verification_code(&self, method: TwoFactorMethod) -> Result<String> {
        Ok(self(method))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// State machine
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
enum LoginState {
    Start,
    WelcomeScreen,
    CredentialEntry,
    PasswordEntry,
    TwoFactor,
    CallbackInspection,
    LegalTerms,
    Succeeded(String),
}

/// Result of scanning captured `/connect` traffic for the app callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackScan {
    Code(String),
    LegalTerms,
    NoMatch,
}

/// Drives one browser through the login pages.
#[derive(Debug)]
pub struct LoginSequencer<'a> {
    provider: &'a ProviderConfig,
    options: &'a LoginOptions,
    method: TwoFactorMethod,
}

impl<'a> LoginSequencer<'a> {
    pub fn new(
        provider: &'a ProviderConfig,
        options: &'a LoginOptions,
        method: TwoFactorMethod,
    ) -> Self {
        Self {
            provider,
            options,
            method,
        }
    }

    /// Log in and return the authorization code ("" if none was found).
    ///
    /// The browser is closed on every exit path, cancellation included.
    pub async fn run(
        &self,
        launcher: &dyn BrowserLauncher,
        authorization_url: &str,
        credentials: &Credentials,
        prompt: &dyn VerificationPrompt,
    ) -> Result<String> {
        let mut browser = launcher.launch(self.options.headless).await?;
        let outcome = tokio::select! {
            outcome = self.drive(browser.as_mut(), authorization_url, credentials, prompt) => outcome,
            _ = self.options.cancellation.cancelled() => {
                info!("Login aborted");
                Err(AuthError::Aborted)
            }
        };
        if let Err(e) = browser.close().await {
            warn!(error = %e, "Failed to close browser");
        }
        outcome
    }

    async fn drive(
        &self,
        browser: &mut dyn BrowserDriver,
        authorization_url: &str,
        credentials: &Credentials,
        prompt: &dyn VerificationPrompt,
    ) -> Result<String> {
        let timeout = self.options.timeout;
        let connect = self.provider.connect_prefix();
        let mut legal_terms_shown = 0;
        let mut state = LoginState::Start;

        loop {
            debug!(?state, "Login state");
            state = match state {
                LoginState::Start => {
                    browser.navigate(authorization_url).await?;
                    LoginState::WelcomeScreen
                }
                LoginState::WelcomeScreen => {
                    browser.wait_visible(selectors::WELCOME_LOGIN, timeout).await?;
                    browser.click(selectors::WELCOME_LOGIN).await?;
                    LoginState::CredentialEntry
                }
                LoginState::CredentialEntry => {
                    browser.wait_visible(selectors::EMAIL_OR_PHONE, timeout).await?;
                    browser
                        .type_text(selectors::EMAIL_OR_PHONE, &credentials.username)
                        .await?;
                    self.submit(browser, selectors::SUBMIT_EMAIL, None).await?;
                    let phone_exists = self.provider.phone_exists_prefix();
                    self.submit(browser, selectors::SUBMIT_EMAIL, Some(&phone_exists))
                        .await?;
                    LoginState::PasswordEntry
                }
                LoginState::PasswordEntry => {
                    browser.wait_clickable(selectors::PASSWORD, timeout).await?;
                    browser
                        .type_text(selectors::PASSWORD, &credentials.password)
                        .await?;
                    self.submit(browser, selectors::SUBMIT_PASSWORD, None).await?;

                    let response = browser
                        .wait_for_request(&self.provider.account_login_prefix(), timeout)
                        .await?;
                    if let Some(message) = login_page_error(browser, &response).await {
                        return Err(AuthError::LoginRejected(message));
                    }

                    let location = response.location.unwrap_or_default();
                    if location.contains(CALLBACK_PATH) {
                        LoginState::CallbackInspection
                    } else {
                        LoginState::TwoFactor
                    }
                }
                LoginState::TwoFactor => {
                    let method = format!(".{}", self.method);
                    info!(method = %self.method, "Two-factor verification required");
                    browser.wait_visible(&method, timeout).await?;
                    browser.click(&format!("{} button", method)).await?;

                    let code = prompt.verification_code(self.method).await?;
                    browser
                        .wait_visible(selectors::VERIFICATION_CODE, timeout)
                        .await?;
                    browser
                        .type_text(selectors::VERIFICATION_CODE, code.trim())
                        .await?;
                    self.submit(browser, selectors::VERIFY_NEXT, None).await?;
                    LoginState::CallbackInspection
                }
                LoginState::CallbackInspection => {
                    browser.wait_for_request(&connect, timeout).await?;
                    match scan_callback(&browser.captured_requests().await?, &connect) {
                        CallbackScan::Code(code) => LoginState::Succeeded(code),
                        CallbackScan::LegalTerms => LoginState::LegalTerms,
                        CallbackScan::NoMatch => LoginState::Succeeded(String::new()),
                    }
                }
                LoginState::LegalTerms => {
                    legal_terms_shown += 1;
                    if legal_terms_shown > MAX_LEGAL_TERMS_SCREENS {
                        return Err(AuthError::UnexpectedInterstitialLoop {
                            shown: legal_terms_shown,
                        });
                    }

                    if !self.options.accept_legal_terms {
                        browser.wait_visible(selectors::TERMS_TITLE, timeout).await?;
                        let title = browser
                            .element_texts(selectors::TERMS_TITLE)
                            .await?
                            .into_iter()
                            .find(|text| !text.trim().is_empty())
                            .unwrap_or_else(|| "Legal terms were updated".to_string());
                        return Err(AuthError::LegalTerms(title.trim().to_string()));
                    }

                    info!("Accepting updated legal terms");
                    browser.wait_visible(selectors::TERMS_CHECKBOX, timeout).await?;
                    browser.clear_captured_requests().await?;
                    browser.click(selectors::TERMS_CHECKBOX).await?;
                    browser.click(selectors::TERMS_SUBMIT).await?;
                    LoginState::CallbackInspection
                }
                LoginState::Succeeded(code) => {
                    info!(has_code = !code.is_empty(), "Login flow finished");
                    return Ok(code);
                }
            };
        }
    }

    /// Click a submit button, then surface any inline validation message.
    ///
    /// With `request` set, also waits for the matching request to be answered.
    async fn submit(
        &self,
        browser: &mut dyn BrowserDriver,
        selector: &str,
        request: Option<&str>,
    ) -> Result<()> {
        browser.clear_captured_requests().await?;
        browser.click(selector).await?;

        if let Some(pattern) = request {
            if let Err(e) = browser.wait_for_request(pattern, self.options.timeout).await {
                // A rejected form never sends the request
                if e.is_timeout() {
                    check_input_error(browser).await?;
                }
                return Err(e);
            }
        }

        check_input_error(browser).await
    }
}

async fn check_input_error(browser: &mut dyn BrowserDriver) -> Result<()> {
    let texts = browser.element_texts(selectors::INPUT_ERROR).await?;
    match texts.into_iter().find(|text| !text.trim().is_empty()) {
        Some(text) => Err(AuthError::LoginRejected(text.trim().to_string())),
        None => Ok(()),
    }
}

/// Rejection message of a re-rendered login page.
///
/// Redirects have no body to inspect. A body that cannot be read counts as
/// no message.
async fn login_page_error(
    browser: &mut dyn BrowserDriver,
    response: &CapturedRequest,
) -> Option<String> {
    if response.is_redirect() {
        return None;
    }

    let mut attempt = 1;
    loop {
        match browser.response_body(response).await {
            Ok(body) => return extract_app_error(&body),
            Err(e) if attempt >= BODY_ATTEMPTS => {
                debug!(error = %e, url = %response.url, "Login response body unavailable");
                return None;
            }
            Err(_) => {
                attempt += 1;
                sleep(POLL_INTERVAL).await;
            }
        }
    }
}

/// Validation message embedded in the login response's `app-errors` attribute.
pub fn extract_app_error(body: &str) -> Option<String> {
    let body = unescape_html(body);
    APP_ERRORS
        .captures(&body)
        .and_then(|captures| captures.get(1))
        .map(|message| message.as_str().to_string())
        .filter(|message| !message.is_empty())
}

fn unescape_html(text: &str) -> String {
    text.replace("&quot;", "\"")
        .replace("&#34;", "\"")
        .replace("&#x22;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

/// Scan `/connect` traffic newest first for the authorization code or a legal terms redirect.
pub fn scan_callback(requests: &[CapturedRequest], connect_prefix: &str) -> CallbackScan {
    for request in requests.iter().rev() {
        if !request.url.contains(connect_prefix) {
            continue;
        }
        let location = request.location.as_deref().unwrap_or_default();
        if location.contains("legalTerms") {
            return CallbackScan::LegalTerms;
        }
        if let Some(code) = AUTHORIZATION_CODE
            .captures(location)
            .and_then(|captures| captures.get(1))
        {
            return CallbackScan::Code(code.as_str().to_string());
        }
    }
    CallbackScan::NoMatch
}

//! CLI command handlers.

pub mod auth;
pub mod coupon;
pub mod receipt;

use std::future::Future;

use anyhow::Result;
use lidl_auth::{
    AuthError, Authenticator, CancellationToken, Credentials, LoginOptions, default_launcher,
};
use lidl_client::LidlClient;
use lidl_config::LidlConfig;
use serde::Serialize;
use tracing::debug;

use crate::Cli;
use crate::prompt::{self, StdinVerificationPrompt};

/// Shared context for all commands: CLI flags layered over the config file.
#[derive(Clone)]
pub struct Context {
    pub country: Option<String>,
    pub language: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub two_factor: String,
    pub refresh_token: Option<String>,
    pub skip_verify: bool,
    pub headless: bool,
    pub accept_legal_terms: bool,
    /// Cancelled on Ctrl-C.
    pub cancellation: CancellationToken,
}

impl Context {
    /// Flag (or its environment variable) wins over the config file.
    pub fn resolve(cli: &Cli, config: LidlConfig, cancellation: CancellationToken) -> Self {
        let non_empty = |value: &Option<String>| value.clone().filter(|v| !v.trim().is_empty());

        Self {
            country: non_empty(&cli.country).or(config.country),
            language: non_empty(&cli.language).or(config.language),
            user: non_empty(&cli.user).or(config.user),
            password: non_empty(&cli.password),
            two_factor: cli
                .two_factor
                .clone()
                .or(config.two_factor)
                .unwrap_or_else(|| "phone".to_string()),
            refresh_token: non_empty(&cli.refresh_token),
            skip_verify: cli.skip_verify,
            headless: !cli.debug && config.headless.unwrap_or(true),
            accept_legal_terms: !cli.not_accept_legal_terms
                && config.accept_legal_terms.unwrap_or(true),
            cancellation,
        }
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("country", &self.country)
            .field("language", &self.language)
            .field("user", &self.user)
            .field("two_factor", &self.two_factor)
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("skip_verify", &self.skip_verify)
            .field("headless", &self.headless)
            .field("accept_legal_terms", &self.accept_legal_terms)
            .field("cancelled", &self.cancellation.is_cancelled())
            .finish()
    }
}

/// Build an authenticated client, logging in through the browser unless a
/// refresh token was given. Missing values are prompted for.
pub async fn connect(ctx: &Context) -> Result<LidlClient> {
    let language = match &ctx.language {
        Some(language) => language.clone(),
        None => interruptible(ctx, prompt::line("Enter your language (de, en, ...): ")).await?,
    };
    let country = match &ctx.country {
        Some(country) => country.clone(),
        None => interruptible(ctx, prompt::line("Enter your country (DE, AT, ...): ")).await?,
    };

    let builder = Authenticator::builder(&country, &language).accept_invalid_certs(ctx.skip_verify);

    let auth = if let Some(token) = &ctx.refresh_token {
        debug!("Using refresh token");
        builder.refresh_token(token).build()?
    } else {
        let username = match &ctx.user {
            Some(user) => user.clone(),
            None => {
                interruptible(
                    ctx,
                    prompt::line("Enter your lidl plus username (phone number): "),
                )
                .await?
            }
        };
        let password = match &ctx.password {
            Some(password) => password.clone(),
            None => {
                interruptible(ctx, prompt::password("Enter your lidl plus password: ")).await?
            }
        };

        let mut auth = builder.build()?;
        let options = LoginOptions {
            two_factor: ctx.two_factor.clone(),
            headless: ctx.headless,
            accept_legal_terms: ctx.accept_legal_terms,
            cancellation: ctx.cancellation.clone(),
            ..Default::default()
        };
        let launcher = default_launcher(ctx.skip_verify);
        auth.login(
            launcher.as_ref(),
            &Credentials::new(username, password),
            &options,
            &StdinVerificationPrompt,
        )
        .await?;
        auth
    };

    Ok(LidlClient::builder(auth)
        .accept_invalid_certs(ctx.skip_verify)
        .build()?)
}

/// Await a prompt unless Ctrl-C comes first.
async fn interruptible<T>(ctx: &Context, prompt: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::select! {
        value = prompt => value,
        _ = ctx.cancellation.cancelled() => Err(AuthError::Aborted.into()),
    }
}

/// Process exit code and message for login failures the user can act on.
pub fn exit_status(error: &anyhow::Error) -> Option<(i32, String)> {
    let auth = error.downcast_ref::<AuthError>().or_else(|| {
        error
            .downcast_ref::<lidl_client::Error>()
            .and_then(|e| match e {
                lidl_client::Error::Login(auth) => Some(auth),
                _ => None,
            })
    })?;

    match auth {
        AuthError::BrowserUnavailable(_) => Some((
            101,
            "Can't connect to web browser. Please install Chrome, Chromium or Firefox".to_string(),
        )),
        AuthError::LoginRejected(message) => Some((102, format!("Login failed - {}", message))),
        AuthError::LegalTerms(title) => {
            Some((103, format!("Legal terms not accepted - {}", title)))
        }
        _ => None,
    }
}

/// Print a value as JSON indented by four spaces.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", to_json(value)?);
    Ok(())
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    value.serialize(&mut serializer)?;
    Ok(String::from_utf8(out)?)
}

//! Interactive stdin prompts.
//!
//! Reads run on the blocking pool. Dropping a prompt future abandons the
//! read without cancelling it, so the thread stays blocked on stdin until the
//! process exits.

use std::io::{BufRead, Write};

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use lidl_auth::{AuthError, TwoFactorMethod, VerificationPrompt};

/// Print `message` and read one trimmed line from stdin.
pub async fn line(message: &str) -> Result<String> {
    let message = message.to_string();
    tokio::task::spawn_blocking(move || read_line(&message))
        .await
        .context("prompt task failed")?
        .map_err(Into::into)
}

/// Read a password without echoing it.
pub async fn password(message: &str) -> Result<String> {
    let message = message.to_string();
    tokio::task::spawn_blocking(move || rpassword::prompt_password(message))
        .await
        .context("prompt task failed")?
        .context("failed to read password")
}

fn read_line(message: &str) -> std::io::Result<String> {
    let mut stdout = std::io::stdout();
    stdout.write_all(message.as_bytes())?;
    stdout.flush()?;

    let mut input = String::new();
    std::io::stdin().lock().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

/// Asks for the verification code on stdin.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdinVerificationPrompt;

#[async_trait]
impl VerificationPrompt for StdinVerificationPrompt {
    async fn verification_code(&self, method: TwoFactorMethod) -> lidl_auth::Result<String> {
        let message = format!("Enter the verify code you received via {}: ", method);
        tokio::task::spawn_blocking(move || read_line(&message))
            .await
            .map_err(|e| AuthError::Browser(format!("verification prompt failed: {}", e)))?
            .map_err(|e| AuthError::Browser(format!("failed to read verification code: {}", e)))
    }
}

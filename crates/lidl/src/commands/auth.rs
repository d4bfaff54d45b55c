//! Auth command - log in and print the refresh token.

use anyhow::Result;

use super::Context;

/// Run the auth command.
pub async fn run(ctx: &Context) -> Result<()> {
    let client = super::connect(ctx).await?;
    println!("{}", refresh_token_banner(&client.refresh_token().await));
    Ok(())
}

/// The token between two dashed rules as wide as the token.
fn refresh_token_banner(token: &str) -> String {
    const LABEL: &str = "refresh token";
    let half = (token.chars().count() as i64 - LABEL.len() as i64).div_euclid(2);
    let left = "-".repeat(half.max(0) as usize);
    let right = "-".repeat((half - 1).max(0) as usize);
    let rule = "-".repeat(token.chars().count());
    format!("{left} {LABEL} {right}\n{token}\n{rule}")
}

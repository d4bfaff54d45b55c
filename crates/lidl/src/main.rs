//! lidl-plus - Lidl Plus receipts and coupons from the command line
//!
//! Main entry point for the `lidl-plus` CLI.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod prompt;

use commands::{auth, coupon, receipt};

/// How long an interrupted command gets to close its browser.
const ABORT_GRACE: Duration = Duration::from_secs(10);

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Lidl Plus API
#[derive(Parser)]
#[command(name = "lidl-plus")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Country (DE, BE, NL, AT, ...)
    #[arg(short, long, global = true, value_name = "CC")]
    pub country: Option<String>,

    /// Language (de, en, fr, it, ...)
    #[arg(short, long, global = true, value_name = "LANG")]
    pub language: Option<String>,

    /// Lidl Plus login username
    #[arg(short, long, global = true)]
    pub user: Option<String>,

    /// Lidl Plus login password
    #[arg(short, long, global = true, value_name = "XXX")]
    pub password: Option<String>,

    /// Two factor auth method
    #[arg(long = "2fa", global = true, value_parser = ["phone", "email"])]
    pub two_factor: Option<String>,

    /// Refresh token to authenticate
    #[arg(
        short,
        long,
        global = true,
        value_name = "TOKEN",
        env = "LIDL_PLUS_REFRESH_TOKEN",
        hide_env_values = true
    )]
    pub refresh_token: Option<String>,

    /// Skip SSL verification
    #[arg(long, global = true)]
    pub skip_verify: bool,

    /// Do not auto accept legal terms updates
    #[arg(long, global = true)]
    pub not_accept_legal_terms: bool,

    /// Debug mode (visible browser, debug logs)
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Config file to use instead of the discovered ones
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Authenticate and print the refresh token
    Auth,

    /// Output the latest receipt as JSON
    Receipt(receipt::ReceiptArgs),

    /// Output or activate coupons
    Coupon(coupon::CouponArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Console (human-readable) + rotating JSON file
    let filter = if cli.debug {
        "lidl=debug,lidl_auth=debug,lidl_client=debug,lidl_config=debug,info"
    } else {
        "lidl=info,lidl_auth=info,lidl_client=info,lidl_config=info,warn"
    };

    let log_dir = lidl_config::xdg_config_dir()
        .map(|d| d.join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"));
    let file_appender = tracing_appender::rolling::daily(&log_dir, "lidl-plus.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "lidl=trace,lidl_auth=trace,lidl_client=trace,lidl_config=trace,info",
                )),
        )
        .init();

    let loaded = match &cli.config {
        Some(path) => lidl_config::load_config_file(path)?,
        None => {
            let loaded = lidl_config::load_config(None)?;
            for warning in &loaded.warnings {
                eprintln!("warning: {}", warning);
            }
            loaded.config
        }
    };

    let cancellation = lidl_auth::CancellationToken::new();
    let ctx = commands::Context::resolve(&cli, loaded, cancellation.clone());

    let run = dispatch(cli.command, &ctx);
    tokio::pin!(run);
    let result = tokio::select! {
        result = &mut run => result,
        _ = tokio::signal::ctrl_c() => {
            cancellation.cancel();
            tokio::select! {
                _ = tokio::time::timeout(ABORT_GRACE, &mut run) => {}
                _ = tokio::signal::ctrl_c() => {}
            }
            println!("Aborted.");
            drop(guard);
            // Abandoned stdin reads would block runtime shutdown
            std::process::exit(0);
        }
    };

    if let Err(error) = &result
        && let Some((code, message)) = commands::exit_status(error)
    {
        println!("{}", message);
        drop(guard);
        std::process::exit(code);
    }
    result
}

async fn dispatch(command: Commands, ctx: &commands::Context) -> Result<()> {
    match command {
        Commands::Auth => auth::run(ctx).await,
        Commands::Receipt(args) => receipt::run(args, ctx).await,
        Commands::Coupon(args) => coupon::run(args, ctx).await,
    }
}

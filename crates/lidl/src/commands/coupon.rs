//! Coupon command - print coupons or activate every eligible one.

use anyhow::Result;
use chrono::Utc;
use clap::Args;
use tracing::info;

use super::{Context, print_json};

/// Arguments for the coupon command.
#[derive(Args, Debug)]
pub struct CouponArgs {
    /// Activate all coupons
    #[arg(short, long)]
    pub all: bool,
}

/// Run the coupon command.
pub async fn run(args: CouponArgs, ctx: &Context) -> Result<()> {
    let client = super::connect(ctx).await?;
    let response = client.coupons().list().await?;
    if !args.all {
        return print_json(&response);
    }

    let now = Utc::now();
    let mut activated = 0;
    for coupon in response.coupons().filter(|c| c.is_activatable(now)) {
        println!("activating coupon: {}", coupon.title);
        client.coupons().activate(&coupon.id).await?;
        activated += 1;
    }
    info!(activated, "Coupon activation finished");
    println!("Activated {} coupons", activated);
    Ok(())
}

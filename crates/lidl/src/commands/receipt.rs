//! Receipt command - print receipts as JSON.

use anyhow::Result;
use clap::Args;

use super::{Context, print_json};

/// Arguments for the receipt command.
#[derive(Args, Debug)]
pub struct ReceiptArgs {
    /// Fetch all receipts
    #[arg(short, long)]
    pub all: bool,
}

/// Run the receipt command.
pub async fn run(args: ReceiptArgs, ctx: &Context) -> Result<()> {
    let client = super::connect(ctx).await?;
    let tickets = client.tickets();
    let summaries = tickets.list(false).await?;

    if args.all {
        let mut receipts = Vec::with_capacity(summaries.len());
        for summary in &summaries {
            receipts.push(tickets.get(&summary.id).await?);
        }
        return print_json(&receipts);
    }

    match summaries.first() {
        Some(latest) => print_json(&tickets.get(&latest.id).await?),
        None => {
            println!("No receipts found.");
            Ok(())
        }
    }
}

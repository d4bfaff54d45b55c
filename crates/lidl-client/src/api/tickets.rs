//! Receipts API.

use serde_json::Value;
use tracing::debug;

use crate::client::LidlClient;
use crate::error::Result;
use crate::types::{TicketPage, TicketSummary};

/// Receipts API client.
pub struct TicketsApi {
    client: LidlClient,
}

impl TicketsApi {
    pub(crate) fn new(client: LidlClient) -> Self {
        Self { client }
    }

    /// List all receipts, newest first, walking every page.
    ///
    /// `only_favorite` is sent with every page since `totalCount` counts favorites only.
    pub async fn list(&self, only_favorite: bool) -> Result<Vec<TicketSummary>> {
        let first = self.page(1, only_favorite).await?;
        let last_page = first.last_page();
        debug!(total = first.total_count, last_page, "Listing receipts");

        let mut tickets = first.tickets;
        for page in 2..=last_page {
            tickets.extend(self.page(page, only_favorite).await?.tickets);
        }
        Ok(tickets)
    }

    /// Fetch one page of the receipt list.
    pub async fn page(&self, page: u64, only_favorite: bool) -> Result<TicketPage> {
        let query = [
            ("pageNumber", page.to_string()),
            ("onlyFavorite", only_favorite.to_string()),
        ];
        self.client
            .get_with_query(&self.client.ticket_url("tickets"), &query)
            .await
    }

    /// Get the full receipt by ID.
    pub async fn get(&self, id: &str) -> Result<Value> {
        self.client
            .get(&self.client.ticket_url(&format!("tickets/{}", id)))
            .await
    }
}

//! Coupons API.

use reqwest::Method;
use serde_json::Value;

use crate::client::LidlClient;
use crate::error::Result;
use crate::types::CouponsResponse;

/// Coupons API client.
pub struct CouponsApi {
    client: LidlClient,
}

impl CouponsApi {
    pub(crate) fn new(client: LidlClient) -> Self {
        Self { client }
    }

    /// List all coupons, grouped in sections.
    pub async fn list(&self) -> Result<CouponsResponse> {
        self.client.get(&self.client.coupon_url("v2", "")).await
    }

    /// Activate a coupon by ID.
    pub async fn activate(&self, id: &str) -> Result<Value> {
        self.client
            .call(Method::POST, &self.activation_url(id))
            .await
    }

    /// Deactivate a coupon by ID.
    pub async fn deactivate(&self, id: &str) -> Result<Value> {
        self.client
            .call(Method::DELETE, &self.activation_url(id))
            .await
    }

    fn activation_url(&self, id: &str) -> String {
        self.client.coupon_url("v1", &format!("{}/activation", id))
    }
}

//! Typed client for the Lidl Plus receipt and coupon APIs.
//!
//! Authentication is delegated to [`lidl_auth::Authenticator`]: log in (or
//! start from a refresh token) first, then hand the authenticator to the
//! client. Expired access tokens are refreshed before each call.
//!
//! # Example
//!
//! ```no_run
//! use chrono::Utc;
//! use lidl_auth::Authenticator;
//! use lidl_client::{LidlClient, Result};
//!
//! # async fn example() -> Result<()> {
//! let auth = Authenticator::builder("DE", "de")
//!     .refresh_token("stored-refresh-token")
//!     .build()?;
//! let client = LidlClient::builder(auth).build()?;
//!
//! // Latest receipt
//! if let Some(summary) = client.tickets().list(false).await?.first() {
//!     let receipt = client.tickets().get(&summary.id).await?;
//!     println!("{}", receipt);
//! }
//!
//! // Activate everything that can be activated
//! let coupons = client.coupons().list().await?;
//! for coupon in coupons.coupons().filter(|c| c.is_activatable(Utc::now())) {
//!     client.coupons().activate(&coupon.id).await?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # API Coverage
//!
//! - **Tickets**: Paginated receipt list, single receipt
//! - **Coupons**: List, activate, deactivate

pub mod api;
pub mod client;
pub mod error;
pub mod types;

pub use client::{ClientBuilder, LidlClient};
pub use error::{Error, Result};
pub use types::*;

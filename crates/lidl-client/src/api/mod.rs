//! API endpoint implementations.

mod coupons;
mod tickets;

pub use coupons::CouponsApi;
pub use tickets::TicketsApi;

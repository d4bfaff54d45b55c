//! Response types of the receipt and coupon APIs.
//!
//! Only the fields this crate acts on are typed; everything else is kept in
//! `extra` so printed output loses nothing.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ─────────────────────────────────────────────────────────────────────────────
// Tickets
// ─────────────────────────────────────────────────────────────────────────────

/// One page of the receipt list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketPage {
    #[serde(default)]
    pub tickets: Vec<TicketSummary>,
    #[serde(default)]
    pub total_count: u64,
    /// Page size used by the server.
    #[serde(default)]
    pub size: u64,
}

impl TicketPage {
    /// Last page number to request. Follows the app in asking for one page
    /// too many when `total_count` is a multiple of `size`.
    pub fn last_page(&self) -> u64 {
        if self.size == 0 {
            1
        } else {
            self.total_count / self.size + 1
        }
    }
}

/// Receipt as listed; the full receipt comes from `tickets().get(id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketSummary {
    pub id: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Coupons
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CouponsResponse {
    #[serde(default)]
    pub sections: Vec<CouponSection>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CouponsResponse {
    pub fn coupons(&self) -> impl Iterator<Item = &Coupon> {
        self.sections.iter().flat_map(|section| section.coupons.iter())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CouponSection {
    #[serde(default)]
    pub coupons: Vec<Coupon>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub is_activated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_validity_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_validity_date: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Coupon {
    /// Whether the coupon can be activated at `now`: not yet activated and inside its validity window.
    ///
    /// Coupons with a missing or unreadable validity date are never activatable.
    pub fn is_activatable(&self, now: DateTime<Utc>) -> bool {
        if self.is_activated {
            return false;
        }
        let (Some(start), Some(end)) = (
            self.start_validity_date.as_deref().and_then(parse_date),
            self.end_validity_date.as_deref().and_then(parse_date),
        ) else {
            return false;
        };
        start <= now && end >= now
    }
}

/// ISO 8601 timestamp, with or without offset. Naive timestamps are taken as UTC.
fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(date) = DateTime::parse_from_rfc3339(value) {
        return Some(date.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|date| date.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn coupon(activated: bool, start: Option<&str>, end: Option<&str>) -> Coupon {
        Coupon {
            id: "c1".to_string(),
            title: "10% off".to_string(),
            is_activated: activated,
            start_validity_date: start.map(str::to_string),
            end_validity_date: end.map(str::to_string),
            extra: Map::new(),
        }
    }

    #[test]
    fn test_is_activatable() {
        let now = Utc.with_ymd_and_hms(2024, 5, 15, 12, 0, 0).unwrap();
        let start = Some("2024-05-13T00:00:00+02:00");
        let end = Some("2024-05-19T23:59:59+02:00");

        assert!(coupon(false, start, end).is_activatable(now));
        assert!(!coupon(true, start, end).is_activatable(now));
        assert!(!coupon(false, Some("2024-05-16T00:00:00"), end).is_activatable(now));
        assert!(!coupon(false, start, Some("2024-05-15T11:59:59Z")).is_activatable(now));
        assert!(!coupon(false, None, end).is_activatable(now));
        assert!(!coupon(false, start, Some("next week")).is_activatable(now));
    }

    #[test]
    fn test_validity_bounds_are_inclusive() {
        let now = Utc.with_ymd_and_hms(2024, 5, 15, 12, 0, 0).unwrap();
        let edge = Some("2024-05-15T12:00:00");
        assert!(coupon(false, edge, edge).is_activatable(now));
    }

    #[test]
    fn test_last_page() {
        let page = |total_count, size| TicketPage {
            tickets: Vec::new(),
            total_count,
            size,
        };
        assert_eq!(page(25, 10).last_page(), 3);
        assert_eq!(page(30, 10).last_page(), 4);
        assert_eq!(page(5, 10).last_page(), 1);
        assert_eq!(page(0, 0).last_page(), 1);
    }

    #[test]
    fn test_coupons_keep_unknown_fields() {
        let json = serde_json::json!({
            "sections": [{
                "name": "Favourites",
                "coupons": [{
                    "id": "c1",
                    "title": "Coffee",
                    "isActivated": false,
                    "startValidityDate": "2024-05-13T00:00:00",
                    "endValidityDate": "2024-05-19T23:59:59",
                    "discount": { "title": "-20%" }
                }]
            }]
        });

        let response: CouponsResponse = serde_json::from_value(json).unwrap();
        let coupon = response.coupons().next().unwrap();
        assert_eq!(coupon.title, "Coffee");
        assert_eq!(coupon.extra["discount"]["title"], "-20%");

        let back = serde_json::to_value(&response).unwrap();
        assert_eq!(back["sections"][0]["name"], "Favourites");
        assert_eq!(back["sections"][0]["coupons"][0]["isActivated"], false);
    }
}

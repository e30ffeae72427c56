// 💸 Movement Entity - a financial transaction (sale, purchase, ...)
//
// A movement always references:
// - a Person (counterpart)
// - a MovementType (what kind of transaction)
// - a MovementStatus (where it is in its lifecycle)
//
// The *_name fields are joined in by the server for display and are
// never written back.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

use super::page::{normalize_search, DEFAULT_PER_PAGE};

// ============================================================================
// MOVEMENT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movement {
    pub movement_id: i64,
    pub movement_date: NaiveDate,
    pub person_id: i64,
    pub total_amount: f64,
    #[serde(default)]
    pub discount: f64,
    #[serde(default)]
    pub addition: f64,
    #[serde(default)]
    pub total_items: f64,
    #[serde(default)]
    pub description: Option<String>,
    pub movement_type_id: i64,
    pub movement_status_id: i64,
    #[serde(default)]
    pub license_id: Option<i64>,
    #[serde(default)]
    pub is_template: bool,
    pub created_at: DateTime<Utc>,

    /// Set when the movement was cancelled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancel_reason: Option<String>,

    // Joined (read-only)
    #[serde(default)]
    pub person_name: String,
    #[serde(default)]
    pub movement_type_name: String,
    #[serde(default)]
    pub movement_status_name: String,
}

impl Movement {
    /// Amount actually due: items + addition - discount
    pub fn net_amount(&self) -> f64 {
        self.total_items + self.addition - self.discount
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_reason.is_some()
    }
}

/// Create/update payload for a movement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementInput {
    pub movement_date: NaiveDate,
    pub person_id: i64,
    pub total_amount: f64,
    #[serde(default)]
    pub discount: f64,
    #[serde(default)]
    pub addition: f64,
    #[serde(default)]
    pub total_items: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub movement_type_id: i64,
    pub movement_status_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_id: Option<i64>,
    #[serde(default)]
    pub is_template: bool,
}

/// Body of POST /movements/{id}/cancel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelMovement {
    pub reason: String,
}

// ============================================================================
// LIST FILTER
// ============================================================================

/// Filters accepted by GET /movements
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementFilter {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    /// Status name (exact, case-insensitive)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub movement_type_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub movement_status_id: Option<i64>,
}

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    DEFAULT_PER_PAGE
}

impl Default for MovementFilter {
    fn default() -> Self {
        MovementFilter {
            page: 1,
            limit: DEFAULT_PER_PAGE,
            search: None,
            start_date: None,
            end_date: None,
            status: None,
            movement_type_id: None,
            movement_status_id: None,
        }
    }
}

impl MovementFilter {
    pub fn page(mut self, page: u32, limit: u32) -> Self {
        self.page = page.max(1);
        self.limit = limit.max(1);
        self
    }

    pub fn search(mut self, search: Option<&str>) -> Self {
        self.search = normalize_search(search);
        self
    }

    /// Restrict to a period relative to `today`
    pub fn period(mut self, period: Period, today: NaiveDate) -> Self {
        let (start, end) = period.date_range(today);
        self.start_date = start;
        self.end_date = end;
        self
    }

    pub fn status(mut self, status: Option<&str>) -> Self {
        self.status = normalize_search(status);
        self
    }

    /// Query-string pairs; dates as YYYY-MM-DD
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![
            ("page".to_string(), self.page.to_string()),
            ("limit".to_string(), self.limit.to_string()),
        ];
        if let Some(search) = &self.search {
            pairs.push(("search".to_string(), search.clone()));
        }
        if let Some(start) = self.start_date {
            pairs.push(("startDate".to_string(), start.format("%Y-%m-%d").to_string()));
        }
        if let Some(end) = self.end_date {
            pairs.push(("endDate".to_string(), end.format("%Y-%m-%d").to_string()));
        }
        if let Some(status) = &self.status {
            pairs.push(("status".to_string(), status.clone()));
        }
        if let Some(type_id) = self.movement_type_id {
            pairs.push(("movementTypeId".to_string(), type_id.to_string()));
        }
        if let Some(status_id) = self.movement_status_id {
            pairs.push(("movementStatusId".to_string(), status_id.to_string()));
        }
        pairs
    }
}

// ============================================================================
// PERIOD
// ============================================================================

/// Quick date-range presets for the movement list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    /// No date restriction
    All,
    Today,
    /// Last 7 days including today
    Week,
    /// From the 1st of the current month
    Month,
}

impl Period {
    /// (start, end) inclusive; None on both sides for All
    pub fn date_range(&self, today: NaiveDate) -> (Option<NaiveDate>, Option<NaiveDate>) {
        match self {
            Period::All => (None, None),
            Period::Today => (Some(today), Some(today)),
            Period::Week => (Some(today - Duration::days(7)), Some(today)),
            Period::Month => (today.with_day(1), Some(today)),
        }
    }
}

impl FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" | "" => Ok(Period::All),
            "today" => Ok(Period::Today),
            "week" => Ok(Period::Week),
            "month" => Ok(Period::Month),
            other => Err(format!("unknown period: {}", other)),
        }
    }
}

// ============================================================================
// METRICS
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatusTotals {
    pub count: usize,
    pub total_amount: f64,
}

/// Summary over a set of movements (usually the loaded page)
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MovementMetrics {
    pub count: usize,
    pub total_amount: f64,
    /// Keyed by status name
    pub by_status: BTreeMap<String, StatusTotals>,
    /// Keyed by type name
    pub by_type: BTreeMap<String, StatusTotals>,
}

impl MovementMetrics {
    pub fn from_movements(movements: &[Movement]) -> Self {
        let mut metrics = MovementMetrics::default();

        for movement in movements {
            metrics.count += 1;
            metrics.total_amount += movement.total_amount;

            let status = metrics
                .by_status
                .entry(movement.movement_status_name.clone())
                .or_default();
            status.count += 1;
            status.total_amount += movement.total_amount;

            let kind = metrics
                .by_type
                .entry(movement.movement_type_name.clone())
                .or_default();
            kind.count += 1;
            kind.total_amount += movement.total_amount;
        }

        metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn movement(id: i64, amount: f64, status: &str, kind: &str) -> Movement {
        serde_json::from_value(json!({
            "movement_id": id,
            "movement_date": "2024-06-10",
            "person_id": 1,
            "total_amount": amount,
            "total_items": amount,
            "movement_type_id": 1,
            "movement_status_id": 1,
            "created_at": "2024-06-10T12:00:00Z",
            "movement_status_name": status,
            "movement_type_name": kind
        }))
        .unwrap()
    }

    #[test]
    fn test_movement_defaults() {
        let m = movement(1, 100.0, "Pending", "Sale");
        assert_eq!(m.discount, 0.0);
        assert!(!m.is_template);
        assert!(!m.is_cancelled());
        assert_eq!(m.net_amount(), 100.0);
    }

    #[test]
    fn test_period_date_range() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();

        assert_eq!(Period::All.date_range(today), (None, None));
        assert_eq!(Period::Today.date_range(today), (Some(today), Some(today)));
        assert_eq!(
            Period::Week.date_range(today),
            (NaiveDate::from_ymd_opt(2024, 6, 8), Some(today))
        );
        assert_eq!(
            Period::Month.date_range(today),
            (NaiveDate::from_ymd_opt(2024, 6, 1), Some(today))
        );
    }

    #[test]
    fn test_period_parse() {
        assert_eq!("Week".parse::<Period>(), Ok(Period::Week));
        assert_eq!("".parse::<Period>(), Ok(Period::All));
        assert!("year".parse::<Period>().is_err());
    }

    #[test]
    fn test_filter_pairs() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        let filter = MovementFilter::default()
            .page(2, 5)
            .search(Some("acme"))
            .period(Period::Today, today)
            .status(Some("Pending"));

        let pairs = filter.to_pairs();
        assert!(pairs.contains(&("page".to_string(), "2".to_string())));
        assert!(pairs.contains(&("limit".to_string(), "5".to_string())));
        assert!(pairs.contains(&("search".to_string(), "acme".to_string())));
        assert!(pairs.contains(&("startDate".to_string(), "2024-06-15".to_string())));
        assert!(pairs.contains(&("endDate".to_string(), "2024-06-15".to_string())));
        assert!(pairs.contains(&("status".to_string(), "Pending".to_string())));
    }

    #[test]
    fn test_metrics() {
        let movements = vec![
            movement(1, 100.0, "Pending", "Sale"),
            movement(2, 50.0, "Pending", "Purchase"),
            movement(3, 25.0, "Confirmed", "Sale"),
        ];

        let metrics = MovementMetrics::from_movements(&movements);
        assert_eq!(metrics.count, 3);
        assert_eq!(metrics.total_amount, 175.0);
        assert_eq!(metrics.by_status["Pending"].count, 2);
        assert_eq!(metrics.by_status["Pending"].total_amount, 150.0);
        assert_eq!(metrics.by_type["Sale"].total_amount, 125.0);
    }
}

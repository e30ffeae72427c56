// 🚦 Movement Status - lifecycle stage of a movement (Pending, Confirmed, ...)
//
// Statuses are ordered by display_order. A final status (e.g. Cancelled)
// ends the lifecycle of the movements that carry it.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementStatus {
    pub movement_status_id: i64,
    pub status_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub display_order: i64,
    /// Optional restriction to one movement type
    #[serde(default)]
    pub movement_type_id: Option<i64>,
    #[serde(default)]
    pub is_final: bool,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// Create/update payload
///
/// On create `status_name` is required; on update every absent field is
/// left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MovementStatusInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_order: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub movement_type_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_final: Option<bool>,
}

impl MovementStatusInput {
    pub fn named(status_name: &str) -> Self {
        MovementStatusInput {
            status_name: Some(status_name.to_string()),
            ..Default::default()
        }
    }
}

// 🏷️ Movement Type - kind of movement (Sale, Purchase, ...)

use serde::{Deserialize, Serialize};

/// How many records reference a type (read-only, computed by the server)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementTypeCount {
    #[serde(default)]
    pub movements: u64,
    #[serde(default)]
    pub movement_statuses: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementType {
    pub movement_type_id: i64,
    pub type_name: String,
    #[serde(default = "default_active")]
    pub active: bool,
    /// Missing counts are reported as zero
    #[serde(rename = "_count", default)]
    pub count: MovementTypeCount,
}

fn default_active() -> bool {
    true
}

impl MovementType {
    /// A type still referenced by movements should not be removed
    pub fn is_in_use(&self) -> bool {
        self.count.movements > 0
    }
}

/// Create/update payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementTypeInput {
    pub type_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_count_defaults_to_zero() {
        let kind: MovementType = serde_json::from_value(json!({
            "movement_type_id": 1,
            "type_name": "Sale"
        }))
        .unwrap();

        assert_eq!(kind.count, MovementTypeCount::default());
        assert!(!kind.is_in_use());
    }

    #[test]
    fn test_count_wire_name() {
        let kind: MovementType = serde_json::from_value(json!({
            "movement_type_id": 1,
            "type_name": "Sale",
            "_count": { "movements": 4 }
        }))
        .unwrap();

        assert_eq!(kind.count.movements, 4);
        assert_eq!(kind.count.movement_statuses, 0);
        assert!(kind.is_in_use());
    }
}

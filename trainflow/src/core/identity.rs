//! Run identity for namespacing pipeline executions.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::utils::timestamps::{format_run_timestamp, iso_timestamp};

/// Identifies one end-to-end run.
///
/// The timestamp names the artifact directory of the run; the UUID
/// correlates log lines and reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunIdentity {
    /// Unique ID for this run.
    pub pipeline_run_id: Uuid,
    /// Directory-safe timestamp (`%m_%d_%Y_%H_%M_%S`).
    pub timestamp: String,
    /// When the run was created (ISO 8601).
    pub started_at: String,
}

impl RunIdentity {
    /// Creates a new identity stamped with the current local time.
    #[must_use]
    pub fn new() -> Self {
        Self::at(Local::now())
    }

    /// Creates an identity for a specific instant.
    #[must_use]
    pub fn at(instant: DateTime<Local>) -> Self {
        Self {
            pipeline_run_id: Uuid::new_v4(),
            timestamp: format_run_timestamp(&instant),
            started_at: iso_timestamp(),
        }
    }

    /// Creates an identity with a fixed timestamp string.
    #[must_use]
    pub fn with_timestamp(timestamp: impl Into<String>) -> Self {
        Self {
            pipeline_run_id: Uuid::new_v4(),
            timestamp: timestamp.into(),
            started_at: iso_timestamp(),
        }
    }

    /// Converts to a dictionary with string values.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert(
            "pipeline_run_id".to_string(),
            serde_json::json!(self.pipeline_run_id.to_string()),
        );
        map.insert("timestamp".to_string(), serde_json::json!(self.timestamp));
        map.insert("started_at".to_string(), serde_json::json!(self.started_at));
        map
    }
}

impl Default for RunIdentity {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamp_format() {
        let instant = Local.with_ymd_and_hms(2026, 3, 7, 9, 5, 1).unwrap();
        let identity = RunIdentity::at(instant);
        assert_eq!(identity.timestamp, "03_07_2026_09_05_01");
    }

    #[test]
    fn test_run_ids_are_unique() {
        let a = RunIdentity::with_timestamp("t");
        let b = RunIdentity::with_timestamp("t");
        assert_ne!(a.pipeline_run_id, b.pipeline_run_id);
    }

    #[test]
    fn test_run_identity_to_dict() {
        let identity = RunIdentity::with_timestamp("01_02_2026_03_04_05");
        let dict = identity.to_dict();
        assert_eq!(dict["timestamp"], "01_02_2026_03_04_05");
        assert!(dict.contains_key("pipeline_run_id"));
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;

/// The weather snapshot shared between the phone and the watch.
///
/// Temperatures are already formatted for display by the producer; the
/// watch never converts units or re-formats them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRecord {
    /// Publish time in milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub temp_max_display: String,
    pub temp_min_display: String,
    /// OpenWeatherMap condition code.
    pub condition_code: i32,
}

impl SyncRecord {
    pub fn new(
        timestamp: i64,
        temp_max_display: impl Into<String>,
        temp_min_display: impl Into<String>,
        condition_code: i32,
    ) -> Self {
        Self {
            timestamp,
            temp_max_display: temp_max_display.into(),
            temp_min_display: temp_min_display.into(),
            condition_code,
        }
    }
}

impl fmt::Display for SyncRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} (condition {}) at {}",
            self.temp_max_display, self.temp_min_display, self.condition_code, self.timestamp
        )
    }
}

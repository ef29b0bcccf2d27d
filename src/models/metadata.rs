use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Descriptive metadata written into the LD header and the
/// event/venue/vehicle records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogMetadata {
    pub driver: String,
    pub vehicle_id: String,
    pub vehicle_weight: u32,
    pub vehicle_type: String,
    pub vehicle_comment: String,
    pub venue_name: String,
    pub event_name: String,
    pub event_session: String,
    pub long_comment: String,
    pub short_comment: String,
    pub datetime: NaiveDateTime,
}

impl Default for LogMetadata {
    fn default() -> Self {
        Self {
            driver: String::new(),
            vehicle_id: String::new(),
            vehicle_weight: 0,
            vehicle_type: String::new(),
            vehicle_comment: String::new(),
            venue_name: String::new(),
            event_name: String::new(),
            event_session: String::new(),
            long_comment: String::new(),
            short_comment: String::new(),
            datetime: Local::now().naive_local(),
        }
    }
}

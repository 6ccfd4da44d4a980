//! Value types shared across the monitoring run.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single bookable appointment as rendered on the calendar.
///
/// `time` is the four-digit 24h label (`HHMM`) read from the day's slot table.
/// The label is taken verbatim from the page and is not checked for clock validity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AvailableSlot {
    pub month: String,
    pub day: u32,
    pub time: String,
}

impl AvailableSlot {
    pub fn new(month: impl Into<String>, day: u32, time: impl Into<String>) -> Self {
        Self {
            month: month.into(),
            day,
            time: time.into(),
        }
    }

    /// `HHMM` rendered as `HH:MM`.
    pub fn formatted_time(&self) -> String {
        match (self.time.get(..2), self.time.get(2..)) {
            (Some(hours), Some(minutes)) => format!("{}:{}", hours, minutes),
            _ => self.time.clone(),
        }
    }
}

impl fmt::Display for AvailableSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} on {} at {}>", self.month, self.day, self.time)
    }
}

/// Everything one calendar walk produced.
#[derive(Debug, Clone, Default)]
pub struct SlotsCheckResult {
    pub slots: Vec<AvailableSlot>,
    /// PNG images, one per calendar page visited.
    pub screenshots: Vec<Vec<u8>>,
}

impl SlotsCheckResult {
    /// A result for a page that showed the "no dates" marker straight away.
    pub fn empty(screenshot: Vec<u8>) -> Self {
        Self {
            slots: Vec::new(),
            screenshots: vec![screenshot],
        }
    }
}

/// Browser launch knobs. Only fields that are set are forwarded to the launcher.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DriverParameters {
    pub headless: Option<bool>,
    pub scale_factor: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formatted_time() {
        let slot = AvailableSlot::new("May 2024", 3, "0930");
        assert_eq!(slot.formatted_time(), "09:30");
    }

    #[test]
    fn test_slot_dict_round_trip() {
        let slot = AvailableSlot::new("June 2024", 17, "1415");
        let value = serde_json::to_value(&slot).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"month": "June 2024", "day": 17, "time": "1415"})
        );
        let back: AvailableSlot = serde_json::from_value(value).unwrap();
        assert_eq!(back, slot);
    }

    #[test]
    fn test_structural_equality() {
        assert_eq!(
            AvailableSlot::new("May", 1, "0900"),
            AvailableSlot::new("May", 1, "0900")
        );
        assert_ne!(
            AvailableSlot::new("May", 1, "0900"),
            AvailableSlot::new("May", 1, "1000")
        );
    }
}

//! The record of what the previous run saw.

use crate::core::error::Result;
use crate::core::models::AvailableSlot;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Persisted run state. Keys written by other tools or newer versions are
/// kept in `extra` and written back untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    #[serde(default)]
    pub available_slots: Vec<AvailableSlot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl RunState {
    /// The state to persist after a run: new slots and time, everything else carried over.
    pub fn updated(&self, slots: Vec<AvailableSlot>, timestamp: f64) -> RunState {
        RunState {
            available_slots: slots,
            timestamp: Some(timestamp),
            extra: self.extra.clone(),
        }
    }
}

pub trait StateStore: Send + Sync {
    fn load(&self) -> Result<RunState>;
    fn save(&self, state: &RunState) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct JsonFileStateStore {
    path: PathBuf,
}

impl JsonFileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl StateStore for JsonFileStateStore {
    fn load(&self) -> Result<RunState> {
        if !self.path.exists() {
            return Ok(RunState::default());
        }
        let contents = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    fn save(&self, state: &RunState) -> Result<()> {
        fs::write(&self.path, serde_json::to_string(state)?)?;
        Ok(())
    }
}

//! Core library for slot-sentry: drives a visa booking site in a real browser,
//! reads the open appointment slots and reports changes to a Telegram chat.

pub mod browser;
pub mod captcha;
pub mod core;
pub mod notify;
pub mod orchestrator;
pub mod persistence;
pub mod service;
pub mod slots;

pub use crate::core::config::Config;
pub use crate::core::error::{AppError, Result};
pub use crate::core::models::{AvailableSlot, DriverParameters, SlotsCheckResult};
pub use crate::orchestrator::{CheckOrchestrator, RunOutcome, RunReport, RunSettings, Services};

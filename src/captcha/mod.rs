//! Bot-challenge handling: detection on the page and token solving.

pub mod anticaptcha;
pub mod gate;

pub use anticaptcha::AntiCaptchaClient;
pub use gate::{CaptchaGate, GateState};

use crate::core::error::Result;
use async_trait::async_trait;

/// What a solving service needs to produce a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub website_url: String,
    pub site_key: String,
}

/// Turns a challenge into a response token.
#[async_trait]
pub trait CaptchaSolver: Send + Sync {
    async fn solve(&self, challenge: &Challenge) -> Result<String>;
}

/// Hands out a preset token, or fails, and remembers every challenge.
#[cfg(test)]
pub struct FixedSolver {
    token: Option<String>,
    challenges: parking_lot::Mutex<Vec<Challenge>>,
}

#[cfg(test)]
impl FixedSolver {
    pub fn token(token: &str) -> Self {
        Self {
            token: Some(token.to_string()),
            challenges: parking_lot::Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            token: None,
            challenges: parking_lot::Mutex::new(Vec::new()),
        }
    }

    pub fn challenges(&self) -> Vec<Challenge> {
        self.challenges.lock().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl CaptchaSolver for FixedSolver {
    async fn solve(&self, challenge: &Challenge) -> Result<String> {
        self.challenges.lock().push(challenge.clone());
        self.token.clone().ok_or_else(|| {
            crate::core::error::AppError::CaptchaSolve(
                "solving service returned no solution".into(),
            )
        })
    }
}

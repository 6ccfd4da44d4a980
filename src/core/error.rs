//! Defines the custom error types for the slot-sentry application.

use fantoccini::error::{CmdError, NewSessionError};
use std::io;
use thiserror::Error;
use url::ParseError as UrlParseError;

/// The primary error type for a monitoring run.
#[derive(Error, Debug)]
pub enum AppError {
    /// Missing or invalid configuration. Raised before any browser work starts.
    #[error("Configuration Error: {0}")]
    Config(String),

    /// Error initializing necessary components (driver service, clients).
    #[error("Initialization Error: {0}")]
    Initialization(String),

    /// Error related to file input/output operations.
    #[error("IO Error: {0}")]
    Io(#[from] io::Error),

    /// Error during JSON serialization or deserialization.
    #[error("JSON Error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error parsing a URL.
    #[error("URL Parsing Error: {0}")]
    UrlParse(#[from] UrlParseError),

    /// Error making HTTP requests via reqwest.
    #[error("HTTP Request Error: {0}")]
    Request(#[from] reqwest::Error),

    /// Error decoding or encoding a screenshot.
    #[error("Image Error: {0}")]
    Image(#[from] image::ImageError),

    /// A page element required to proceed was not present.
    #[error("Element Not Found: {0}")]
    ElementNotFound(String),

    /// An element was present but its content did not have the expected shape.
    #[error("Unexpected Page Layout: {0}")]
    PageLayout(String),

    /// The captcha challenge could not be prepared for solving.
    #[error("Captcha Setup Error: {0}")]
    CaptchaSetup(String),

    /// The captcha solving service failed to produce a token.
    #[error("Captcha Solve Error: {0}")]
    CaptchaSolve(String),

    /// Data that is expected to show up shortly was not there yet.
    #[error("Transient Extraction Failure: {0}")]
    TransientExtraction(String),

    /// Error connecting to the WebDriver instance.
    #[error("WebDriver Connection Error: {0}")]
    WebDriverConnection(String),

    /// Error executing a command via WebDriver (Fantoccini).
    #[error("WebDriver Command Error: {0}")]
    WebDriverCmd(String),

    /// The notification channel rejected a request.
    #[error("Notification Error: {0}")]
    Notification(String),

    /// The intercepting proxy could not be started or stopped.
    #[error("Proxy Error: {0}")]
    Proxy(String),

    /// An underlying error that doesn't fit other categories, using anyhow.
    #[error("Generic Error: {0}")]
    Generic(#[from] anyhow::Error),
}

impl AppError {
    /// Errors that come from the captcha path. Cookies are not persisted after these.
    pub fn is_captcha_related(&self) -> bool {
        matches!(self, AppError::CaptchaSetup(_) | AppError::CaptchaSolve(_))
    }
}

impl From<CmdError> for AppError {
    fn from(err: CmdError) -> Self {
        if err.is_miss() {
            AppError::ElementNotFound(err.to_string())
        } else {
            AppError::WebDriverCmd(err.to_string())
        }
    }
}

impl From<NewSessionError> for AppError {
    fn from(err: NewSessionError) -> Self {
        AppError::WebDriverConnection(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

//! Lifecycle of the local WebDriver server (geckodriver or chromedriver).

use crate::core::config::DriverKind;
use crate::core::error::{AppError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::Duration;
use tokio::time::sleep;

/// Checks the configured WebDriver executable location.
pub fn detect_driver_path(driver_path: &Path) -> Result<PathBuf> {
    let path = if driver_path.is_absolute() {
        driver_path.to_path_buf()
    } else {
        std::env::current_dir()?.join(driver_path)
    };

    if path.exists() && path.is_file() {
        tracing::info!(target: "webdriver", "Using WebDriver executable: {}", path.display());
        Ok(path)
    } else {
        Err(AppError::Initialization(format!(
            "WebDriver executable '{}' not found or is not a file",
            driver_path.display()
        )))
    }
}

fn port_args(kind: DriverKind, port: u16) -> Vec<String> {
    match kind {
        DriverKind::Firefox => vec!["--port".to_string(), port.to_string()],
        DriverKind::Chrome => vec![format!("--port={}", port)],
    }
}

fn log_file_name(kind: DriverKind) -> &'static str {
    match kind {
        DriverKind::Firefox => "geckodriver.log",
        DriverKind::Chrome => "chromedriver.log",
    }
}

/// Checks if the WebDriver server answers on `/status`.
pub async fn is_responsive(port: u16) -> bool {
    match reqwest::Client::new()
        .get(format!("http://localhost:{}/status", port))
        .timeout(Duration::from_secs(2))
        .send()
        .await
    {
        Ok(response) => response.status().is_success(),
        Err(_) => false,
    }
}

/// A running WebDriver server owned by the current run. Killed on drop.
#[derive(Debug)]
pub struct DriverService {
    child: Option<Child>,
    port: u16,
    log_file: PathBuf,
}

impl DriverService {
    pub async fn start(driver_path: &Path, kind: DriverKind, port: u16) -> Result<Self> {
        let driver_path = detect_driver_path(driver_path)?;
        let log_file = PathBuf::from(log_file_name(kind));

        if is_responsive(port).await {
            return Err(AppError::Initialization(format!(
                "Port {} is already serving a WebDriver; stop it or change webdriver_port",
                port
            )));
        }

        tracing::info!(target: "webdriver", "Starting WebDriver at {}", driver_path.display());

        let log_file_handle = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)?;

        let child = Command::new(&driver_path)
            .args(port_args(kind, port))
            .stdout(Stdio::from(log_file_handle.try_clone()?))
            .stderr(Stdio::from(log_file_handle))
            .spawn()?;

        let mut service = DriverService {
            child: Some(child),
            port,
            log_file,
        };

        // Give it a moment to start
        for _ in 0..10 {
            sleep(Duration::from_millis(500)).await;
            if is_responsive(port).await {
                tracing::info!(
                    target: "webdriver",
                    "WebDriver started successfully on port {}",
                    port
                );
                return Ok(service);
            }
            if service.has_exited() {
                break;
            }
        }

        tracing::error!(
            target: "webdriver",
            "WebDriver started but is not responsive (logs at {})",
            service.log_file.display()
        );
        service.stop();
        Err(AppError::Initialization(format!(
            "WebDriver started but is not responding at http://localhost:{}",
            port
        )))
    }

    pub fn url(&self) -> String {
        format!("http://localhost:{}", self.port)
    }

    fn has_exited(&mut self) -> bool {
        match self.child.as_mut().map(|c| c.try_wait()) {
            Some(Ok(Some(status))) => {
                tracing::error!(target: "webdriver", "WebDriver exited early with {}", status);
                true
            }
            Some(Ok(None)) => false,
            Some(Err(_)) | None => true,
        }
    }

    pub fn stop(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };
        tracing::debug!(target: "webdriver", "Stopping WebDriver (PID: {})", child.id());
        if let Err(e) = child.kill() {
            tracing::warn!(target: "webdriver", "Failed to kill WebDriver: {}", e);
        }
        let _ = child.wait();
        tracing::debug!(target: "webdriver", "WebDriver stopped");
    }

    /// Gets the recent lines of the WebDriver log file.
    pub fn logs(&self, lines: usize) -> Result<String> {
        let content = fs::read_to_string(&self.log_file)?;
        let log_lines: Vec<&str> = content.lines().collect();
        let start_idx = log_lines.len().saturating_sub(lines);
        Ok(log_lines[start_idx..].join("\n"))
    }
}

impl Drop for DriverService {
    fn drop(&mut self) {
        self.stop();
    }
}

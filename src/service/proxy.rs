//! Hosts the intercepting proxy (mitmdump) that rewrites the booking page
//! before the browser renders it.

use crate::browser::driver::ProxyAddress;
use crate::core::config::ProxySettings;
use crate::core::error::{AppError, Result};
use parking_lot::Mutex;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

const WATCH_INTERVAL: Duration = Duration::from_secs(1);

/// The proxy lifecycle as seen by the orchestrator.
pub trait InterceptingProxy: Send {
    fn start(&mut self) -> Result<ProxyAddress>;
    fn stop(&mut self);
}

pub struct ProxyHost {
    settings: ProxySettings,
    log_path: PathBuf,
    child: Arc<Mutex<Option<Child>>>,
    watcher: Option<JoinHandle<()>>,
}

impl ProxyHost {
    pub fn new(settings: ProxySettings) -> Self {
        Self {
            settings,
            log_path: PathBuf::from("mitmdump.log"),
            child: Arc::new(Mutex::new(None)),
            watcher: None,
        }
    }

    pub fn with_log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = path.into();
        self
    }

    fn args(&self) -> Vec<String> {
        vec![
            "-s".to_string(),
            self.settings.script_path.display().to_string(),
            "--anticache".to_string(),
            "--listen-port".to_string(),
            self.settings.port.to_string(),
        ]
    }

    pub fn is_running(&self) -> bool {
        self.child.lock().is_some()
    }

    /// Polls the proxy process and logs if it died. Does not restart it:
    /// a dead proxy shows up as failing browser operations.
    fn spawn_watcher(&self) -> JoinHandle<()> {
        let child = Arc::clone(&self.child);
        let log_path = self.log_path.clone();
        tokio::spawn(async move {
            loop {
                {
                    let mut guard = child.lock();
                    let Some(process) = guard.as_mut() else {
                        break;
                    };
                    match process.try_wait() {
                        Ok(Some(status)) => {
                            tracing::error!(
                                target: "proxy",
                                "mitmdump has exited with {} (logs at {})",
                                status,
                                log_path.display()
                            );
                            break;
                        }
                        Ok(None) => {}
                        Err(e) => {
                            tracing::warn!(target: "proxy", "Failed to poll mitmdump: {}", e);
                            break;
                        }
                    }
                }
                tokio::time::sleep(WATCH_INTERVAL).await;
            }
        })
    }
}

impl InterceptingProxy for ProxyHost {
    fn start(&mut self) -> Result<ProxyAddress> {
        if self.is_running() {
            return Err(AppError::Proxy("already started".to_string()));
        }

        let log_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)?;

        let process = Command::new(&self.settings.command)
            .args(self.args())
            .stdout(Stdio::from(log_file.try_clone()?))
            .stderr(Stdio::from(log_file))
            .spawn()
            .map_err(|e| {
                AppError::Proxy(format!("failed to spawn '{}': {}", self.settings.command, e))
            })?;

        tracing::info!(
            target: "proxy",
            "mitmdump started (PID {}) on port {}",
            process.id(),
            self.settings.port
        );
        *self.child.lock() = Some(process);
        self.watcher = Some(self.spawn_watcher());

        Ok(ProxyAddress::localhost(self.settings.port))
    }

    fn stop(&mut self) {
        let Some(mut process) = self.child.lock().take() else {
            tracing::warn!(target: "proxy", "stop request issued, but proxy is not running");
            return;
        };

        tracing::info!(target: "proxy", "stopping mitmdump...");
        if let Err(e) = process.kill() {
            tracing::warn!(target: "proxy", "Failed to kill mitmdump: {}", e);
        }
        let _ = process.wait();
        if let Some(watcher) = self.watcher.take() {
            watcher.abort();
        }
        tracing::info!(target: "proxy", "stopped");
    }
}

impl Drop for ProxyHost {
    fn drop(&mut self) {
        if self.is_running() {
            self.stop();
        }
    }
}

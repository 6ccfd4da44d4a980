//! One complete check: proxy, browser, booking flow, diff, notification and
//! persistence, with diagnostics on failure and unconditional teardown.

use crate::browser::artifacts::ArtifactStore;
use crate::browser::driver::{BrowserLauncher, PageDriver, ScriptArg};
use crate::browser::navigator::{PageNavigator, ScreenshotMode};
use crate::browser::selectors::DiagnosticsSelectors;
use crate::browser::webdriver;
use crate::captcha::{CaptchaGate, CaptchaSolver};
use crate::core::config::{Config, SchedulingConfig};
use crate::core::error::{AppError, Result};
use crate::core::models::DriverParameters;
use crate::core::retry::Sleeper;
use crate::notify::{compose, status_text, Notifier};
use crate::persistence::{CookieJar, StateStore};
use crate::service::proxy::InterceptingProxy;
use crate::slots::booking::BookingFlow;
use crate::slots::diff::snapshot;
use chrono::{FixedOffset, Utc};
use std::time::Duration;

pub const BOT_TEST_URL: &str = "https://bot.sannysoft.com/";
const BOT_TEST_LINGER: Duration = Duration::from_secs(10);
const SCROLL_INTO_VIEW_SCRIPT: &str = "arguments[0].scrollIntoView(true);";

/// Per-run knobs derived from the configuration and the command line.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub scheduling: SchedulingConfig,
    pub status_message_id: Option<i64>,
    pub status_offset: FixedOffset,
    pub driver_params: DriverParameters,
    pub screenshot_mode: ScreenshotMode,
    pub settle_delay: Duration,
}

impl RunSettings {
    pub fn from_config(config: &Config, driver_params: DriverParameters) -> Result<Self> {
        let telegram = config.require_telegram()?;
        Ok(Self {
            scheduling: config.require_scheduling()?.clone(),
            status_message_id: telegram.status_message_id,
            status_offset: config.status_offset,
            driver_params,
            screenshot_mode: webdriver::screenshot_mode(config.driver_kind, driver_params),
            settle_delay: Duration::from_millis(300),
        })
    }
}

/// Borrowed collaborators that outlive a single run.
#[derive(Clone, Copy)]
pub struct Services<'r> {
    pub notifier: &'r dyn Notifier,
    pub store: &'r dyn StateStore,
    pub solver: Option<&'r dyn CaptchaSolver>,
    pub sleeper: &'r dyn Sleeper,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub slots: usize,
    pub notified: bool,
    pub status_updated: bool,
}

/// Result of one iteration of the monitor loop. Failures are values here, not errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Success(RunReport),
    Failure(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonitorSummary {
    pub succeeded: usize,
    pub failed: usize,
}

pub struct CheckOrchestrator<'r, L: BrowserLauncher, P: InterceptingProxy> {
    settings: RunSettings,
    launcher: L,
    proxy: P,
    services: Services<'r>,
    artifacts: ArtifactStore,
    cookies: CookieJar,
}

fn now_epoch_seconds() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}

impl<'r, L: BrowserLauncher, P: InterceptingProxy> CheckOrchestrator<'r, L, P> {
    pub fn new(
        settings: RunSettings,
        launcher: L,
        proxy: P,
        services: Services<'r>,
        artifacts: ArtifactStore,
        cookies: CookieJar,
    ) -> Self {
        Self {
            settings,
            launcher,
            proxy,
            services,
            artifacts,
            cookies,
        }
    }

    fn navigator<'d>(&'d self, driver: &'d L::Driver) -> PageNavigator<'d, L::Driver> {
        PageNavigator::new(driver, &self.artifacts, self.settings.screenshot_mode)
            .with_settle_delay(self.settings.settle_delay)
    }

    /// Runs one check. The browser and the proxy are released whatever happens.
    pub async fn run_once(&mut self) -> Result<RunReport> {
        tracing::debug!(target: "orchestrator", "starting");
        let mut driver = None;

        let result = self.run_stages(&mut driver).await;

        if let Err(e) = &result {
            if let Some(driver) = &driver {
                self.diagnose_failure(driver, e).await;
            }
            tracing::error!(target: "orchestrator", "An error occurred: {}", e);
        }

        tracing::debug!(target: "orchestrator", "closing driver...");
        if let Some(driver) = driver {
            if let Err(e) = driver.close().await {
                tracing::warn!(target: "orchestrator", "Failed to close the browser: {}", e);
            }
        }
        tracing::debug!(target: "orchestrator", "stopping proxy...");
        self.proxy.stop();

        result
    }

    /// Like [`run_once`](Self::run_once), with the error turned into an outcome.
    pub async fn run_isolated(&mut self) -> RunOutcome {
        match self.run_once().await {
            Ok(report) => RunOutcome::Success(report),
            Err(e) => RunOutcome::Failure(e.to_string()),
        }
    }

    /// Repeats the check every `period`. A failed run never ends the loop.
    /// With `max_runs` set the loop returns after that many runs.
    pub async fn monitor(&mut self, period: Duration, max_runs: Option<usize>) -> MonitorSummary {
        let mut summary = MonitorSummary::default();
        let mut run = 0usize;
        loop {
            run += 1;
            match self.run_isolated().await {
                RunOutcome::Success(report) => {
                    summary.succeeded += 1;
                    tracing::info!(
                        target: "orchestrator",
                        "Run {} finished: {} slots, notified: {}",
                        run,
                        report.slots,
                        report.notified
                    );
                }
                RunOutcome::Failure(reason) => {
                    summary.failed += 1;
                    tracing::warn!(target: "orchestrator", "Run {} failed: {}", run, reason);
                }
            }
            if max_runs.is_some_and(|max| run >= max) {
                return summary;
            }
            tracing::debug!(target: "orchestrator", "Next check in {}s", period.as_secs());
            self.services.sleeper.sleep(period).await;
        }
    }

    async fn run_stages(&mut self, slot: &mut Option<L::Driver>) -> Result<RunReport> {
        let proxy = self.proxy.start()?;
        let driver: &L::Driver = slot.insert(
            self.launcher
                .launch(self.settings.driver_params, Some(proxy))
                .await?,
        );
        let nav = self.navigator(driver);
        let url = &self.settings.scheduling.url;

        tracing::info!(target: "orchestrator", "loading cookies...");
        // cookies can only be set for the domain currently open
        nav.goto(url).await?;
        self.replay_cookies(driver).await;
        tracing::info!(target: "orchestrator", "loaded cookies");

        let state = self.services.store.load()?;
        let mut gate = CaptchaGate::new(self.services.solver, self.services.sleeper);
        let result = BookingFlow::new(&nav, &self.settings.scheduling)
            .check_available_slots(&mut gate)
            .await?;

        let previous = snapshot(&state.available_slots);
        let notified = match compose(&previous, &result.slots, &result.screenshots, url) {
            Some(notification) => {
                tracing::info!(target: "orchestrator", "notifying about state change");
                notification.deliver(self.services.notifier).await?;
                true
            }
            None => {
                tracing::debug!(target: "orchestrator", "State did not change, do not notify");
                false
            }
        };

        let status_updated = self.update_status().await;

        self.services
            .store
            .save(&state.updated(result.slots.clone(), now_epoch_seconds()))?;
        tracing::info!(target: "orchestrator", "check completed");

        tracing::info!(target: "orchestrator", "saving cookies");
        self.save_cookies(driver).await?;
        tracing::info!(target: "orchestrator", "cookies saved");

        Ok(RunReport {
            slots: result.slots.len(),
            notified,
            status_updated,
        })
    }

    /// Unreadable cookie files and rejected cookies are logged and skipped.
    async fn replay_cookies(&self, driver: &L::Driver) {
        let cookies = match self.cookies.load(Utc::now().timestamp()) {
            Ok(cookies) => cookies,
            Err(e) => {
                tracing::warn!(
                    target: "orchestrator",
                    "Ignoring cookies file {}: {}",
                    self.cookies.path().display(),
                    e
                );
                return;
            }
        };
        for cookie in cookies {
            let name = cookie.name.clone();
            if let Err(e) = driver.add_cookie(cookie).await {
                tracing::warn!(target: "orchestrator", "Cookie '{}' rejected: {}", name, e);
            }
        }
    }

    async fn save_cookies(&self, driver: &L::Driver) -> Result<()> {
        let cookies = driver.cookies().await?;
        self.cookies.save(&cookies)
    }

    /// Edits the pinned status message. Never fails the run.
    async fn update_status(&self) -> bool {
        let Some(message_id) = self.settings.status_message_id else {
            return false;
        };
        let now = Utc::now().with_timezone(&self.settings.status_offset);
        match self
            .services
            .notifier
            .edit_text(message_id, &status_text(now))
            .await
        {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    target: "orchestrator",
                    "Failed to update the status message: {}",
                    e
                );
                false
            }
        }
    }

    /// Captures the page and keeps the cookies unless a challenge is in the way.
    async fn diagnose_failure(&self, driver: &L::Driver, error: &AppError) {
        let nav = self.navigator(driver);
        nav.checkpoint("error").await;

        let challenge_present = match CaptchaGate::detect(&nav).await {
            Ok(present) => present,
            Err(e) => {
                tracing::warn!(
                    target: "orchestrator",
                    "Could not check for a captcha screen: {}",
                    e
                );
                true
            }
        };
        if challenge_present || error.is_captcha_related() {
            tracing::info!(
                target: "orchestrator",
                "not saving cookies, captcha challenge is active"
            );
            return;
        }

        tracing::info!(
            target: "orchestrator",
            "saving cookies after the error, no captcha screen is present"
        );
        if let Err(e) = self.save_cookies(driver).await {
            tracing::warn!(target: "orchestrator", "Failed to save cookies: {}", e);
        }
    }
}

/// Opens a public bot-detection page and saves what it reports, table by table.
pub async fn bot_test<L: BrowserLauncher>(
    launcher: &L,
    params: DriverParameters,
    screenshot_mode: ScreenshotMode,
    artifacts: &ArtifactStore,
    sleeper: &dyn Sleeper,
) -> Result<()> {
    let driver = launcher.launch(params, None).await?;
    let result = capture_bot_test(&driver, params, screenshot_mode, artifacts, sleeper).await;
    if let Err(e) = driver.close().await {
        tracing::warn!(target: "orchestrator", "Failed to close the browser: {}", e);
    }
    result
}

async fn capture_bot_test<D: PageDriver>(
    driver: &D,
    params: DriverParameters,
    screenshot_mode: ScreenshotMode,
    artifacts: &ArtifactStore,
    sleeper: &dyn Sleeper,
) -> Result<()> {
    let nav = PageNavigator::new(driver, artifacts, screenshot_mode);
    nav.goto(BOT_TEST_URL).await?;
    nav.checkpoint("bot-test").await;

    for (i, table) in nav.find_all(DiagnosticsSelectors::table()).await?.into_iter().enumerate() {
        driver
            .execute(SCROLL_INTO_VIEW_SCRIPT, vec![ScriptArg::Element(table.clone())])
            .await?;
        let png = nav.element_screenshot(&table).await?;
        let path = artifacts.save_screenshot(&format!("bot-test-table-{}", i), &png)?;
        tracing::debug!(target: "orchestrator", "Saved {}", path.display());
    }

    if params.headless == Some(false) {
        tracing::info!(target: "orchestrator", "waiting 10 seconds before exit...");
        sleeper.sleep(BOT_TEST_LINGER).await;
    }
    Ok(())
}

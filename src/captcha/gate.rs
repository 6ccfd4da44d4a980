//! Detects the bot-challenge interstitial and gets past it, either through
//! a solving service or by giving a human operator time to do it.

use crate::browser::driver::{PageDriver, ScriptArg};
use crate::browser::navigator::PageNavigator;
use crate::browser::selectors::CaptchaSelectors;
use crate::captcha::{CaptchaSolver, Challenge};
use crate::core::error::{AppError, Result};
use crate::core::retry::{RetryPolicy, Sleeper};
use std::time::Duration;
use url::Url;

/// The widget iframe is attached some time after the interstitial renders.
const SITE_KEY_RETRY: RetryPolicy = RetryPolicy::new(3, Duration::from_secs(5));
const MANUAL_WAIT: Duration = Duration::from_secs(60);
const MANUAL_WAIT_STEP: Duration = Duration::from_secs(10);

const SET_IFRAME_RESPONSE_SCRIPT: &str =
    "arguments[0].setAttribute('data-hcaptcha-response', arguments[1])";
const SET_TEXT_CONTENT_SCRIPT: &str = "arguments[0].textContent = arguments[1]";
const INVOKE_CALLBACK_SCRIPT: &str = "window[hcaptchaHandle.callback](arguments[0])";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    NotChecked,
    CheckedClear,
    ChallengeDetected,
    Solved,
}

/// Reads the `sitekey` parameter from the fragment of a widget iframe URL.
pub fn site_key_from_src(src: &str) -> Option<String> {
    let url = Url::parse(src).ok()?;
    let fragment = url.fragment()?;
    url::form_urlencoded::parse(fragment.as_bytes())
        .find(|(key, _)| key == "sitekey")
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

pub struct CaptchaGate<'s> {
    solver: Option<&'s dyn CaptchaSolver>,
    sleeper: &'s dyn Sleeper,
    state: GateState,
}

impl<'s> CaptchaGate<'s> {
    /// Without a solver the gate falls back to waiting for a human.
    pub fn new(solver: Option<&'s dyn CaptchaSolver>, sleeper: &'s dyn Sleeper) -> Self {
        Self {
            solver,
            sleeper,
            state: GateState::NotChecked,
        }
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    /// True when the challenge interstitial is the current page.
    pub async fn detect<D: PageDriver>(nav: &PageNavigator<'_, D>) -> Result<bool> {
        Ok(nav.find(CaptchaSelectors::challenge_heading()).await?.is_some())
    }

    /// Checks the current page and deals with a challenge if there is one.
    ///
    /// The manual path returns once the wait is over, whether or not the
    /// challenge was cleared; the state then stays `ChallengeDetected`.
    pub async fn pass<D: PageDriver>(&mut self, nav: &PageNavigator<'_, D>) -> Result<GateState> {
        if !Self::detect(nav).await? {
            self.state = GateState::CheckedClear;
            return Ok(self.state);
        }
        self.state = GateState::ChallengeDetected;

        match self.solver {
            Some(solver) => {
                self.solve_with(solver, nav).await?;
                self.state = GateState::Solved;
            }
            None => self.wait_for_operator().await,
        }
        Ok(self.state)
    }

    async fn solve_with<D: PageDriver>(
        &self,
        solver: &dyn CaptchaSolver,
        nav: &PageNavigator<'_, D>,
    ) -> Result<()> {
        tracing::info!(target: "captcha", "Solving captcha with the solving service...");
        let website_url = nav.driver().current_url().await?;

        let site_key = SITE_KEY_RETRY
            .run(self.sleeper, "captcha site key extraction", move || read_site_key(nav))
            .await
            .map_err(|e| {
                AppError::CaptchaSetup(format!(
                    "no site key after {} attempts: {}",
                    SITE_KEY_RETRY.attempts, e
                ))
            })?;
        tracing::debug!(target: "captcha", "Site key: {}", site_key);

        let token = solver
            .solve(&Challenge {
                website_url,
                site_key,
            })
            .await?;
        tracing::info!(target: "captcha", "Retrieved captcha token ({} chars)", token.len());

        inject_token(nav, &token).await
    }

    async fn wait_for_operator(&self) {
        tracing::warn!(
            target: "captcha",
            "Detected captcha screen, adding {} seconds of wait time. Solve the captcha manually \
             (disable headless mode if required), the cookies will be saved for the next session",
            MANUAL_WAIT.as_secs()
        );
        let mut left = MANUAL_WAIT;
        while !left.is_zero() {
            tracing::warn!(target: "captcha", "{} seconds left...", left.as_secs());
            let step = MANUAL_WAIT_STEP.min(left);
            self.sleeper.sleep(step).await;
            left -= step;
        }
    }
}

async fn read_site_key<D: PageDriver>(nav: &PageNavigator<'_, D>) -> Result<String> {
    let iframes = nav.find_all(CaptchaSelectors::iframe()).await?;
    let iframe = iframes.first().ok_or_else(|| {
        AppError::TransientExtraction("captcha iframe is not attached yet".to_string())
    })?;
    let src = nav.driver().attr(iframe, "src").await?.unwrap_or_default();
    site_key_from_src(&src).ok_or_else(|| {
        AppError::TransientExtraction(format!("no sitekey in iframe src '{}'", src))
    })
}

/// Writes the token wherever the widget looks for it, then fires the widget callback.
async fn inject_token<D: PageDriver>(nav: &PageNavigator<'_, D>, token: &str) -> Result<()> {
    let driver = nav.driver();

    tracing::debug!(target: "captcha", "Inserting the token into the iframe attributes");
    for iframe in nav.find_all(CaptchaSelectors::iframe()).await? {
        driver
            .execute(
                SET_IFRAME_RESPONSE_SCRIPT,
                vec![ScriptArg::Element(iframe), ScriptArg::Text(token.to_string())],
            )
            .await?;
    }

    tracing::debug!(target: "captcha", "Inserting the token into the response textarea");
    for textarea in nav.find_all(CaptchaSelectors::response_textarea()).await? {
        driver
            .execute(
                SET_TEXT_CONTENT_SCRIPT,
                vec![ScriptArg::Element(textarea), ScriptArg::Text(token.to_string())],
            )
            .await?;
    }

    tracing::debug!(target: "captcha", "Executing the widget callback");
    driver
        .execute(INVOKE_CALLBACK_SCRIPT, vec![ScriptArg::Text(token.to_string())])
        .await?;
    Ok(())
}

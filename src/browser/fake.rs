//! Scripted stand-in for the booking site, used by unit tests.

use crate::browser::driver::{BrowserLauncher, PageDriver, ProxyAddress, ScriptArg};
use crate::browser::selectors::{
    BookingSelectors, CalendarSelectors, CaptchaSelectors, DiagnosticsSelectors,
};
use crate::core::error::{AppError, Result};
use crate::core::models::DriverParameters;
use crate::persistence::cookies::CookieRecord;
use async_trait::async_trait;
use fantoccini::Locator;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;

pub const SITE_KEY: &str = "site-key-123";
pub const END_MARKER: &str = "No date(s) available for appointment";
pub const FAKE_PNG: &[u8] = b"\x89PNG-page";

#[derive(Debug, Clone)]
pub struct FakeMonth {
    pub label: String,
    pub days: Vec<(u32, Vec<String>)>,
    pub message: Option<String>,
}

impl FakeMonth {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            days: Vec::new(),
            message: None,
        }
    }

    pub fn day(mut self, day: u32, times: &[&str]) -> Self {
        self.days
            .push((day, times.iter().map(|t| t.to_string()).collect()));
        self
    }

    pub fn with_message(mut self, message: &str) -> Self {
        self.message = Some(message.to_string());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FakeElement {
    CaptchaHeading,
    Iframe(usize),
    ResponseTextarea,
    ScheduleLink,
    CityPicker,
    CategoryPicker,
    SubmitButton,
    Input(String),
    ConfirmationPicker,
    Message,
    Calendar,
    CalendarHeader,
    OpenDay(u32),
    DayLink(u32),
    SlotTable,
    SlotRow(usize),
    BackButton,
    NextMonth,
    Table(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub enum FakePage {
    Blank,
    Captcha,
    Welcome,
    CityForm,
    CategoryForm,
    ApplicantForm,
    Notice(String),
    Calendar(usize),
    Day(usize, u32),
    End,
    BotTest,
}

#[derive(Debug)]
struct FakeState {
    page: FakePage,
    url: Option<String>,
    months: Vec<FakeMonth>,
    with_city: bool,
    captcha_pending: bool,
    /// `find_all(iframe)` calls on the challenge page before the widget shows up.
    iframe_delay: usize,
    iframe_lookups: usize,
    before_form_message: Option<String>,
    after_form_message: Option<String>,
    next_month_link: bool,
    end_marker: bool,
    garbled_days: bool,
    fail_click_on: Option<FakeElement>,
    opened_days: Vec<u32>,
    selected: Vec<(FakeElement, String)>,
    typed: Vec<(String, String)>,
    executed: Vec<(String, Vec<String>)>,
    visited: Vec<String>,
    cookies: Vec<CookieRecord>,
    closed: bool,
    launches: Vec<(DriverParameters, Option<ProxyAddress>)>,
}

/// Cheap to clone: clones share the same page state.
#[derive(Debug, Clone)]
pub struct FakeSite {
    state: Arc<Mutex<FakeState>>,
}

impl FakeSite {
    fn with_state(page: FakePage, months: Vec<FakeMonth>) -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeState {
                page,
                url: None,
                months,
                with_city: false,
                captcha_pending: false,
                iframe_delay: 0,
                iframe_lookups: 0,
                before_form_message: None,
                after_form_message: None,
                next_month_link: true,
                end_marker: true,
                garbled_days: false,
                fail_click_on: None,
                opened_days: Vec::new(),
                selected: Vec::new(),
                typed: Vec::new(),
                executed: Vec::new(),
                visited: Vec::new(),
                cookies: Vec::new(),
                closed: false,
                launches: Vec::new(),
            })),
        }
    }

    /// A site already showing the first month of `months`.
    pub fn calendar(months: Vec<FakeMonth>) -> Self {
        Self::with_state(FakePage::Calendar(0), months)
    }

    /// A site that has to be navigated to, starting from the welcome page.
    pub fn booking(months: Vec<FakeMonth>) -> Self {
        Self::with_state(FakePage::Blank, months)
    }

    pub fn with_city(self) -> Self {
        self.state.lock().with_city = true;
        self
    }

    /// The first page load shows the challenge; the widget appears after `iframe_delay` lookups.
    pub fn with_captcha(self, iframe_delay: usize) -> Self {
        {
            let mut state = self.state.lock();
            state.captcha_pending = true;
            state.iframe_delay = iframe_delay;
        }
        self
    }

    pub fn with_message_before_form(self, message: &str) -> Self {
        self.state.lock().before_form_message = Some(message.to_string());
        self
    }

    pub fn with_message_after_form(self, message: &str) -> Self {
        self.state.lock().after_form_message = Some(message.to_string());
        self
    }

    pub fn with_cookies(self, cookies: Vec<CookieRecord>) -> Self {
        self.state.lock().cookies = cookies;
        self
    }

    pub fn failing_click_on(self, element: FakeElement) -> Self {
        self.state.lock().fail_click_on = Some(element);
        self
    }

    pub fn remove_next_month_link(&self) {
        self.state.lock().next_month_link = false;
    }

    pub fn suppress_end_marker(&self) {
        self.state.lock().end_marker = false;
    }

    pub fn garble_day_cells(&self) {
        self.state.lock().garbled_days = true;
    }

    pub fn page(&self) -> FakePage {
        self.state.lock().page.clone()
    }

    pub fn opened_days(&self) -> Vec<u32> {
        self.state.lock().opened_days.clone()
    }

    pub fn selected(&self) -> Vec<(FakeElement, String)> {
        self.state.lock().selected.clone()
    }

    pub fn typed(&self) -> Vec<(String, String)> {
        self.state.lock().typed.clone()
    }

    pub fn executed(&self) -> Vec<(String, Vec<String>)> {
        self.state.lock().executed.clone()
    }

    pub fn visited(&self) -> Vec<String> {
        self.state.lock().visited.clone()
    }

    pub fn cookie_names(&self) -> Vec<String> {
        self.state.lock().cookies.iter().map(|c| c.name.clone()).collect()
    }

    pub fn iframe_lookups(&self) -> usize {
        self.state.lock().iframe_lookups
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn launches(&self) -> Vec<(DriverParameters, Option<ProxyAddress>)> {
        self.state.lock().launches.clone()
    }

    fn not_found(locator: Locator<'_>) -> AppError {
        AppError::ElementNotFound(format!("no such element: {:?}", locator))
    }
}

fn when(present: bool, element: FakeElement) -> Vec<FakeElement> {
    if present {
        vec![element]
    } else {
        vec![]
    }
}

impl FakeState {
    fn month(&self, index: usize) -> Option<&FakeMonth> {
        self.months.get(index)
    }

    fn message_text(&self) -> Option<String> {
        match &self.page {
            FakePage::Notice(text) => Some(text.clone()),
            FakePage::End if self.end_marker => Some(END_MARKER.to_string()),
            FakePage::Calendar(index) => self.month(*index).and_then(|m| m.message.clone()),
            _ => None,
        }
    }

    fn resolve(&mut self, locator: Locator<'_>) -> Vec<FakeElement> {
        let page = self.page.clone();
        let on = |expected: &FakePage| &page == expected;

        if locator == CaptchaSelectors::challenge_heading() {
            return when(on(&FakePage::Captcha), FakeElement::CaptchaHeading);
        }
        if locator == CaptchaSelectors::iframe() {
            if !on(&FakePage::Captcha) {
                return vec![];
            }
            self.iframe_lookups += 1;
            return if self.iframe_lookups > self.iframe_delay {
                vec![FakeElement::Iframe(0), FakeElement::Iframe(1)]
            } else {
                vec![]
            };
        }
        if locator == CaptchaSelectors::response_textarea() {
            return when(on(&FakePage::Captcha), FakeElement::ResponseTextarea);
        }
        if locator == BookingSelectors::schedule_link() {
            return when(on(&FakePage::Welcome), FakeElement::ScheduleLink);
        }
        if locator == BookingSelectors::city_picker() {
            return when(on(&FakePage::CityForm), FakeElement::CityPicker);
        }
        if locator == BookingSelectors::category_picker() {
            return when(on(&FakePage::CategoryForm), FakeElement::CategoryPicker);
        }
        if locator == BookingSelectors::submit_button() {
            return match page {
                FakePage::CityForm | FakePage::CategoryForm | FakePage::ApplicantForm => {
                    vec![FakeElement::SubmitButton]
                }
                _ => vec![],
            };
        }
        for input in [
            BookingSelectors::given_name(),
            BookingSelectors::surname(),
            BookingSelectors::contact_number(),
            BookingSelectors::email(),
        ] {
            if locator == input {
                let Locator::Id(id) = input else { unreachable!() };
                return if on(&FakePage::ApplicantForm) {
                    vec![FakeElement::Input(id.to_string())]
                } else {
                    vec![]
                };
            }
        }
        if locator == BookingSelectors::confirmation_picker() {
            return when(on(&FakePage::ApplicantForm), FakeElement::ConfirmationPicker);
        }
        if locator == BookingSelectors::message() {
            return when(self.message_text().is_some(), FakeElement::Message);
        }
        if locator == CalendarSelectors::calendar() {
            return match page {
                FakePage::Calendar(_) => vec![FakeElement::Calendar],
                _ => vec![],
            };
        }
        if locator == CalendarSelectors::slot_table() {
            return when(matches!(page, FakePage::Day(..)), FakeElement::SlotTable);
        }
        if locator == CalendarSelectors::back_button() {
            return match page {
                FakePage::Day(..) => vec![FakeElement::BackButton],
                _ => vec![],
            };
        }
        if locator == CalendarSelectors::next_month() {
            return match page {
                FakePage::Calendar(_) if self.next_month_link => vec![FakeElement::NextMonth],
                _ => vec![],
            };
        }
        if locator == DiagnosticsSelectors::table() && on(&FakePage::BotTest) {
            return vec![FakeElement::Table(0), FakeElement::Table(1)];
        }
        vec![]
    }

    fn resolve_in(&self, parent: &FakeElement, locator: Locator<'_>) -> Vec<FakeElement> {
        match (parent, &self.page) {
            (FakeElement::Calendar, FakePage::Calendar(index)) => {
                if locator == CalendarSelectors::row() {
                    vec![FakeElement::CalendarHeader]
                } else if locator == CalendarSelectors::open_day() {
                    self.month(*index)
                        .map(|m| m.days.iter().map(|(d, _)| FakeElement::OpenDay(*d)).collect())
                        .unwrap_or_default()
                } else {
                    vec![]
                }
            }
            (FakeElement::OpenDay(day), FakePage::Calendar(_))
                if locator == CalendarSelectors::day_link() =>
            {
                vec![FakeElement::DayLink(*day)]
            }
            (FakeElement::SlotTable, FakePage::Day(index, day))
                if locator == CalendarSelectors::row() =>
            {
                let count = self.times(*index, *day).len();
                (0..=count).map(FakeElement::SlotRow).collect()
            }
            _ => vec![],
        }
    }

    fn times(&self, index: usize, day: u32) -> Vec<String> {
        self.month(index)
            .and_then(|m| m.days.iter().find(|(d, _)| *d == day))
            .map(|(_, times)| times.clone())
            .unwrap_or_default()
    }

    fn text(&self, element: &FakeElement) -> Result<String> {
        let stale = || AppError::WebDriverCmd(format!("stale element reference: {:?}", element));
        match (element, &self.page) {
            (FakeElement::CaptchaHeading, _) => {
                Ok("Checking if the site connection is secure".to_string())
            }
            (FakeElement::Message, _) => self.message_text().ok_or_else(stale),
            (FakeElement::CalendarHeader, FakePage::Calendar(index)) => Ok(format!(
                "<<\n{}\n>>",
                self.month(*index).map(|m| m.label.as_str()).unwrap_or_default()
            )),
            (FakeElement::OpenDay(day), FakePage::Calendar(_)) => {
                if self.garbled_days {
                    Ok(format!("{}*", day))
                } else {
                    Ok(day.to_string())
                }
            }
            (FakeElement::SlotRow(0), FakePage::Day(..)) => Ok("Time".to_string()),
            (FakeElement::SlotRow(row), FakePage::Day(index, day)) => self
                .times(*index, *day)
                .get(row - 1)
                .cloned()
                .ok_or_else(stale),
            _ => Ok(String::new()),
        }
    }

    fn click(&mut self, element: &FakeElement) -> Result<()> {
        if self.fail_click_on.as_ref() == Some(element) {
            return Err(AppError::WebDriverCmd(format!(
                "element click intercepted: {:?}",
                element
            )));
        }
        let next = match (element, &self.page) {
            (FakeElement::ScheduleLink, FakePage::Welcome) => {
                if self.with_city {
                    FakePage::CityForm
                } else {
                    FakePage::CategoryForm
                }
            }
            (FakeElement::SubmitButton, FakePage::CityForm) => FakePage::CategoryForm,
            (FakeElement::SubmitButton, FakePage::CategoryForm) => match &self.before_form_message {
                Some(message) => FakePage::Notice(message.clone()),
                None => FakePage::ApplicantForm,
            },
            (FakeElement::SubmitButton, FakePage::ApplicantForm) => match &self.after_form_message {
                Some(message) => FakePage::Notice(message.clone()),
                None if self.months.is_empty() => FakePage::End,
                None => FakePage::Calendar(0),
            },
            (FakeElement::DayLink(day), FakePage::Calendar(index)) => {
                self.opened_days.push(*day);
                FakePage::Day(*index, *day)
            }
            (FakeElement::BackButton, FakePage::Day(index, _)) => FakePage::Calendar(*index),
            (FakeElement::NextMonth, FakePage::Calendar(index)) => {
                if index + 1 < self.months.len() {
                    FakePage::Calendar(index + 1)
                } else {
                    FakePage::End
                }
            }
            (element, page) => {
                return Err(AppError::WebDriverCmd(format!(
                    "stale element reference: {:?} on {:?}",
                    element, page
                )))
            }
        };
        self.page = next;
        Ok(())
    }
}

#[async_trait]
impl PageDriver for FakeSite {
    type Element = FakeElement;

    async fn goto(&self, url: &str) -> Result<()> {
        let mut state = self.state.lock();
        state.visited.push(url.to_string());
        state.url = Some(url.to_string());
        state.page = if url.contains("sannysoft") {
            FakePage::BotTest
        } else if state.captcha_pending {
            FakePage::Captcha
        } else {
            FakePage::Welcome
        };
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.state.lock().url.clone().unwrap_or_else(|| "about:blank".to_string()))
    }

    async fn source(&self) -> Result<String> {
        Ok(format!("<html><!-- {:?} --></html>", self.state.lock().page))
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        Ok(FAKE_PNG.to_vec())
    }

    async fn find(&self, locator: Locator<'_>) -> Result<FakeElement> {
        self.state
            .lock()
            .resolve(locator)
            .into_iter()
            .next()
            .ok_or_else(|| Self::not_found(locator))
    }

    async fn find_all(&self, locator: Locator<'_>) -> Result<Vec<FakeElement>> {
        Ok(self.state.lock().resolve(locator))
    }

    async fn find_in(&self, parent: &FakeElement, locator: Locator<'_>) -> Result<FakeElement> {
        self.state
            .lock()
            .resolve_in(parent, locator)
            .into_iter()
            .next()
            .ok_or_else(|| Self::not_found(locator))
    }

    async fn find_all_in(
        &self,
        parent: &FakeElement,
        locator: Locator<'_>,
    ) -> Result<Vec<FakeElement>> {
        Ok(self.state.lock().resolve_in(parent, locator))
    }

    async fn text(&self, element: &FakeElement) -> Result<String> {
        self.state.lock().text(element)
    }

    async fn attr(&self, element: &FakeElement, name: &str) -> Result<Option<String>> {
        Ok(match (element, name) {
            (FakeElement::Iframe(i), "src") => Some(format!(
                "https://newassets.hcaptcha.com/captcha/v1/static/hcaptcha.html#frame=checkbox&id={}&sitekey={}",
                i, SITE_KEY
            )),
            _ => None,
        })
    }

    async fn click(&self, element: &FakeElement) -> Result<()> {
        self.state.lock().click(element)
    }

    async fn send_keys(&self, element: &FakeElement, text: &str) -> Result<()> {
        match element {
            FakeElement::Input(id) => {
                self.state.lock().typed.push((id.clone(), text.to_string()));
                Ok(())
            }
            other => Err(AppError::WebDriverCmd(format!("element not interactable: {:?}", other))),
        }
    }

    async fn select_by_label(&self, element: &FakeElement, label: &str) -> Result<()> {
        self.state.lock().selected.push((element.clone(), label.to_string()));
        Ok(())
    }

    async fn element_screenshot(&self, element: &FakeElement) -> Result<Vec<u8>> {
        let state = self.state.lock();
        Ok(format!("{:?}@{:?}", element, state.page).into_bytes())
    }

    async fn execute(&self, script: &str, args: Vec<ScriptArg<FakeElement>>) -> Result<Value> {
        let mut state = self.state.lock();
        let texts: Vec<String> = args
            .iter()
            .map(|arg| match arg {
                ScriptArg::Element(e) => format!("{:?}", e),
                ScriptArg::Text(t) => t.clone(),
            })
            .collect();
        state.executed.push((script.to_string(), texts));

        if script.contains("getBoundingClientRect") {
            return Ok(json!([0, 0, 100, 50, 800, 600]));
        }
        if script.contains("hcaptchaHandle.callback") && state.page == FakePage::Captcha {
            state.captcha_pending = false;
            state.page = FakePage::Welcome;
        }
        Ok(Value::Null)
    }

    async fn cookies(&self) -> Result<Vec<CookieRecord>> {
        Ok(self.state.lock().cookies.clone())
    }

    async fn add_cookie(&self, cookie: CookieRecord) -> Result<()> {
        let mut state = self.state.lock();
        if state.url.is_none() {
            return Err(AppError::WebDriverCmd("invalid cookie domain".to_string()));
        }
        state.cookies.retain(|c| c.name != cookie.name);
        state.cookies.push(cookie);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.state.lock().closed = true;
        Ok(())
    }
}

#[async_trait]
impl BrowserLauncher for FakeSite {
    type Driver = FakeSite;

    async fn launch(
        &self,
        params: DriverParameters,
        proxy: Option<ProxyAddress>,
    ) -> Result<FakeSite> {
        self.state.lock().launches.push((params, proxy));
        Ok(self.clone())
    }
}

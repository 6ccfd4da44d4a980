//! The page sequence from the booking site's landing page to its calendar.

use crate::browser::driver::PageDriver;
use crate::browser::navigator::PageNavigator;
use crate::browser::selectors::BookingSelectors;
use crate::captcha::CaptchaGate;
use crate::core::config::SchedulingConfig;
use crate::core::error::Result;
use crate::core::models::SlotsCheckResult;
use crate::slots::calendar::CalendarWalker;
use crate::slots::markers;

/// Values typed into the applicant form. The site only needs them to show
/// the calendar, so they are placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicantDetails {
    pub given_name: String,
    pub surname: String,
    pub contact_number: String,
    pub email: String,
    pub confirmation: String,
}

impl Default for ApplicantDetails {
    fn default() -> Self {
        Self {
            given_name: "GIVENNAME".to_string(),
            surname: "SURNAME".to_string(),
            contact_number: "79170000000".to_string(),
            email: "tracker@example.com".to_string(),
            confirmation: "I confirm the above statement".to_string(),
        }
    }
}

pub struct BookingFlow<'n, 'a, D: PageDriver> {
    nav: &'n PageNavigator<'a, D>,
    scheduling: &'n SchedulingConfig,
    applicant: ApplicantDetails,
}

impl<'n, 'a, D: PageDriver> BookingFlow<'n, 'a, D> {
    pub fn new(nav: &'n PageNavigator<'a, D>, scheduling: &'n SchedulingConfig) -> Self {
        Self {
            nav,
            scheduling,
            applicant: ApplicantDetails::default(),
        }
    }

    pub fn with_applicant(mut self, applicant: ApplicantDetails) -> Self {
        self.applicant = applicant;
        self
    }

    /// Walks from the landing page to the calendar and reads every month.
    ///
    /// A "no dates" marker before or right after the applicant form ends the
    /// check early with no slots and a screenshot of that page.
    pub async fn check_available_slots(
        &self,
        gate: &mut CaptchaGate<'_>,
    ) -> Result<SlotsCheckResult> {
        let nav = self.nav;

        nav.goto(&self.scheduling.url).await?;
        nav.checkpoint("loaded").await;

        gate.pass(nav).await?;

        nav.click_required(BookingSelectors::schedule_link(), "schedule appointment link")
            .await?;
        nav.checkpoint("schedule-clicked").await;

        if let Some(city) = &self.scheduling.city {
            nav.select_by_visible_text(BookingSelectors::city_picker(), city, "city picker")
                .await?;
            nav.click_required(BookingSelectors::submit_button(), "city submit button")
                .await?;
            nav.checkpoint("city-submitted").await;
        }

        nav.select_by_visible_text(
            BookingSelectors::category_picker(),
            &self.scheduling.category,
            "visa category picker",
        )
        .await?;
        nav.click_required(BookingSelectors::submit_button(), "category continue button")
            .await?;
        nav.checkpoint("before-calendar").await;

        if markers::no_dates_marker_present(nav).await? {
            return self.no_slots().await;
        }
        tracing::debug!(
            target: "calendar",
            "Looks like there are some slots, getting the calendar"
        );

        self.fill_applicant_form().await?;
        nav.checkpoint("calendar").await;

        // the marker can also show up once the form is submitted
        if markers::no_dates_marker_present(nav).await? {
            return self.no_slots().await;
        }

        let result = CalendarWalker::new(nav).walk().await?;
        tracing::debug!(target: "calendar", "Available slots: {:?}", result.slots);
        Ok(result)
    }

    async fn fill_applicant_form(&self) -> Result<()> {
        let nav = self.nav;
        let applicant = &self.applicant;

        nav.type_text(BookingSelectors::given_name(), &applicant.given_name, "given name")
            .await?;
        nav.type_text(BookingSelectors::surname(), &applicant.surname, "surname")
            .await?;
        nav.type_text(
            BookingSelectors::contact_number(),
            &applicant.contact_number,
            "contact number",
        )
        .await?;
        nav.type_text(BookingSelectors::email(), &applicant.email, "email")
            .await?;
        nav.select_by_visible_text(
            BookingSelectors::confirmation_picker(),
            &applicant.confirmation,
            "confirmation picker",
        )
        .await?;
        nav.click_required(BookingSelectors::submit_button(), "applicant form submit button")
            .await
    }

    async fn no_slots(&self) -> Result<SlotsCheckResult> {
        tracing::info!(target: "calendar", "No slots found");
        Ok(SlotsCheckResult::empty(self.nav.page_screenshot().await?))
    }
}

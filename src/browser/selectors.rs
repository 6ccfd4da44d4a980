//! Element locators for the appointment booking site.

use fantoccini::Locator;

const CAPTCHA_HEADING_XPATH: &str =
    "//h2[contains(text(), \"Checking if the site connection is secure\")]";
const CAPTCHA_RESPONSE_XPATH: &str = "//textarea[@name = \"h-captcha-response\"]";

/// Pages before the calendar: welcome, centre, category and applicant form.
pub struct BookingSelectors;

impl BookingSelectors {
    pub fn schedule_link() -> Locator<'static> {
        Locator::LinkText("Schedule Appointment")
    }

    pub fn city_picker() -> Locator<'static> {
        Locator::Id("plhMain_cboVAC")
    }

    pub fn category_picker() -> Locator<'static> {
        Locator::Id("plhMain_cboVisaCategory")
    }

    pub fn submit_button() -> Locator<'static> {
        Locator::Id("plhMain_btnSubmit")
    }

    pub fn given_name() -> Locator<'static> {
        Locator::Id("plhMain_repAppVisaDetails_tbxFName_0")
    }

    pub fn surname() -> Locator<'static> {
        Locator::Id("plhMain_repAppVisaDetails_tbxLName_0")
    }

    pub fn contact_number() -> Locator<'static> {
        Locator::Id("plhMain_repAppVisaDetails_tbxContactNumber_0")
    }

    pub fn email() -> Locator<'static> {
        Locator::Id("plhMain_repAppVisaDetails_tbxEmailAddress_0")
    }

    pub fn confirmation_picker() -> Locator<'static> {
        Locator::Id("plhMain_cboConfirmation")
    }

    /// Status line that carries the "no dates" family of messages.
    pub fn message() -> Locator<'static> {
        Locator::Id("plhMain_lblMsg")
    }
}

/// The month calendar and the per-day slot table.
pub struct CalendarSelectors;

impl CalendarSelectors {
    pub fn calendar() -> Locator<'static> {
        Locator::Id("plhMain_cldAppointment")
    }

    pub fn row() -> Locator<'static> {
        Locator::Css("tr")
    }

    pub fn open_day() -> Locator<'static> {
        Locator::Css(".OpenDateAllocated")
    }

    pub fn day_link() -> Locator<'static> {
        Locator::Css("a")
    }

    pub fn slot_table() -> Locator<'static> {
        Locator::Id("plhMain_gvSlot")
    }

    pub fn back_button() -> Locator<'static> {
        Locator::Id("plhMain_btnBack")
    }

    pub fn next_month() -> Locator<'static> {
        Locator::LinkText(">>")
    }
}

/// The bot-challenge interstitial and its hCaptcha widget.
pub struct CaptchaSelectors;

impl CaptchaSelectors {
    pub fn challenge_heading() -> Locator<'static> {
        Locator::XPath(CAPTCHA_HEADING_XPATH)
    }

    pub fn iframe() -> Locator<'static> {
        Locator::Css("iframe")
    }

    pub fn response_textarea() -> Locator<'static> {
        Locator::XPath(CAPTCHA_RESPONSE_XPATH)
    }
}

/// The public bot-detection page used by `bot-test`.
pub struct DiagnosticsSelectors;

impl DiagnosticsSelectors {
    pub fn table() -> Locator<'static> {
        Locator::Css("table")
    }
}

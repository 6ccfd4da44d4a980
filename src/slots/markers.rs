//! Recognition of the site's "nothing to book" messages.

use crate::browser::driver::PageDriver;
use crate::browser::navigator::PageNavigator;
use crate::browser::selectors::BookingSelectors;
use crate::core::error::Result;
use once_cell::sync::Lazy;
use regex::Regex;

/// Every wording the site has used for "no dates", including its generic
/// application error which it shows once the calendar runs out.
static NO_DATES_MARKER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(No date\(s\) available for appointment)|",
        r"(No Appointment slots available)|",
        r"(No date\(s\) available for current month)|",
        r"(Error in the application, please contact admin)",
    ))
    .expect("no-dates marker pattern failed to compile. This is a bug.")
});

pub fn is_no_dates_message(text: &str) -> bool {
    NO_DATES_MARKER_RE.is_match(text)
}

/// Checks the page's status line. An absent status line means no marker.
pub async fn no_dates_marker_present<D: PageDriver>(nav: &PageNavigator<'_, D>) -> Result<bool> {
    Ok(nav
        .read_text_safe(BookingSelectors::message())
        .await?
        .map(|text| is_no_dates_message(&text))
        .unwrap_or(false))
}

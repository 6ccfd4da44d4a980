//! Walks the appointment calendar month by month and reads every open day.

use crate::browser::driver::PageDriver;
use crate::browser::navigator::PageNavigator;
use crate::browser::selectors::CalendarSelectors;
use crate::core::error::{AppError, Result};
use crate::core::models::{AvailableSlot, SlotsCheckResult};
use crate::slots::markers;
use std::collections::BTreeMap;

/// Upper bound on calendar pages per run, in case the site never shows an end marker.
const DEFAULT_MAX_PAGES: usize = 24;

/// Strips the pagination arrows from a calendar header.
pub fn month_label(header: &str) -> String {
    header
        .replace(">>", "")
        .replace("<<", "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse_day(text: &str) -> Result<u32> {
    text.trim()
        .parse::<u32>()
        .map_err(|_| AppError::PageLayout(format!("calendar day cell '{}' is not a number", text)))
}

pub struct CalendarWalker<'n, 'a, D: PageDriver> {
    nav: &'n PageNavigator<'a, D>,
    max_pages: usize,
}

impl<'n, 'a, D: PageDriver> CalendarWalker<'n, 'a, D> {
    pub fn new(nav: &'n PageNavigator<'a, D>) -> Self {
        Self {
            nav,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    /// Reads the current month and every following one.
    /// Expects the calendar to be the current view.
    pub async fn walk(&self) -> Result<SlotsCheckResult> {
        let mut result = SlotsCheckResult::default();

        for page in 1..=self.max_pages {
            let calendar = self
                .nav
                .find_required(CalendarSelectors::calendar(), "appointment calendar")
                .await?;
            result
                .screenshots
                .push(self.nav.element_screenshot(&calendar).await?);

            let month_slots = self.read_month().await?;
            tracing::debug!(target: "calendar", "page {}: {} slots", page, month_slots.len());
            result.slots.extend(month_slots);

            let Some(next_month) = self.nav.find(CalendarSelectors::next_month()).await? else {
                tracing::info!(target: "calendar", "No next-month control, calendar finished");
                return Ok(result);
            };
            self.nav.click(&next_month).await?;

            if self.is_end_of_data().await? {
                return Ok(result);
            }

            self.nav.checkpoint("calendar").await;
        }

        tracing::warn!(
            target: "calendar",
            "Stopped after {} calendar pages without an end-of-data marker",
            self.max_pages
        );
        Ok(result)
    }

    /// The end marker counts only on a page without open days.
    async fn is_end_of_data(&self) -> Result<bool> {
        if !markers::no_dates_marker_present(self.nav).await? {
            return Ok(false);
        }
        let open_days = match self.nav.find(CalendarSelectors::calendar()).await? {
            Some(calendar) => self
                .nav
                .find_all_in(&calendar, CalendarSelectors::open_day())
                .await?
                .len(),
            None => 0,
        };
        Ok(open_days == 0)
    }

    async fn read_month(&self) -> Result<Vec<AvailableSlot>> {
        let calendar = self
            .nav
            .find_required(CalendarSelectors::calendar(), "appointment calendar")
            .await?;
        let header = self
            .nav
            .find_all_in(&calendar, CalendarSelectors::row())
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::PageLayout("calendar has no header row".to_string()))?;
        let month = month_label(&self.nav.text(&header).await?);

        // Opening a day reloads the page, so element references go stale after
        // every visit. Visited days are tracked by number, never by position.
        let mut visited: BTreeMap<u32, Vec<String>> = BTreeMap::new();

        loop {
            let calendar = self
                .nav
                .find_required(CalendarSelectors::calendar(), "appointment calendar")
                .await?;
            let cells = self
                .nav
                .find_all_in(&calendar, CalendarSelectors::open_day())
                .await?;

            let mut next_day = None;
            for cell in cells {
                let day = parse_day(&self.nav.text(&cell).await?)?;
                if !visited.contains_key(&day) {
                    next_day = Some((day, cell));
                    break;
                }
            }
            let Some((day, cell)) = next_day else {
                break;
            };

            let link = self
                .nav
                .find_in(&cell, CalendarSelectors::day_link())
                .await?
                .ok_or_else(|| AppError::ElementNotFound(format!("link of day {}", day)))?;
            self.nav.click(&link).await?;

            let times = self.read_times().await?;
            tracing::debug!(target: "calendar", "{} {}: {} slots", day, month, times.len());

            self.nav
                .click_required(CalendarSelectors::back_button(), "back to calendar button")
                .await?;

            visited.insert(day, times);
        }

        let slots: Vec<AvailableSlot> = visited
            .into_iter()
            .flat_map(|(day, times)| {
                let month = month.clone();
                times
                    .into_iter()
                    .map(move |time| AvailableSlot::new(month.clone(), day, time))
            })
            .collect();
        if !slots.is_empty() {
            let listed: Vec<String> = slots
                .iter()
                .map(|slot| format!("{} {}", slot.day, slot.formatted_time()))
                .collect();
            tracing::debug!(target: "calendar", "{}: {}", month, listed.join(", "));
        }
        Ok(slots)
    }

    /// Time labels of the open day view. The first table row is the header.
    async fn read_times(&self) -> Result<Vec<String>> {
        let table = self
            .nav
            .find_required(CalendarSelectors::slot_table(), "time slot table")
            .await?;
        let rows = self.nav.find_all_in(&table, CalendarSelectors::row()).await?;

        let mut times = Vec::new();
        for row in rows.iter().skip(1) {
            let text = self.nav.text(row).await?;
            let text = text.trim();
            if !text.is_empty() {
                times.push(text.to_string());
            }
        }
        Ok(times)
    }
}

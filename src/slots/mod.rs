//! Slot discovery on the booking site and comparison between runs.

pub mod booking;
pub mod calendar;
pub mod diff;
pub mod markers;

pub use booking::{ApplicantDetails, BookingFlow};
pub use calendar::CalendarWalker;
pub use diff::{diff, has_additions, snapshot, MonthChange, SlotDiff, SlotSnapshot};

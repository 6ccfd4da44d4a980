//! What gets told to the chat when the set of open days changes.

pub mod telegram;

pub use telegram::TelegramNotifier;

use crate::core::error::Result;
use crate::core::models::AvailableSlot;
use crate::slots::diff::{diff, has_additions, snapshot, SlotSnapshot};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};

/// Longest text sent as-is. Longer texts are cut and marked.
pub const MAX_MESSAGE_CHARS: usize = 1000;
const CUT_MARKER: &str = " (cut)";

const FIRST_DISCOVERY_HEADLINE: &str = "🔥 Found available days!";
const CHANGED_HEADLINE: &str = "⚡ Available days changed!";
const NO_SLOTS_TEXT: &str = "🙅 No more slots available...";

/// A push channel able to post texts and image albums and to edit a posted message.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_text(&self, text: &str, silent: bool) -> Result<()>;
    /// Posts `images` as one album with `caption` under the first image.
    async fn send_album(&self, images: &[Vec<u8>], caption: &str, silent: bool) -> Result<()>;
    async fn edit_text(&self, message_id: i64, text: &str) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    Album {
        images: Vec<Vec<u8>>,
        caption: String,
        silent: bool,
    },
    Text {
        text: String,
        silent: bool,
    },
}

impl Notification {
    pub async fn deliver(&self, notifier: &dyn Notifier) -> Result<()> {
        match self {
            Notification::Album {
                images,
                caption,
                silent,
            } => notifier.send_album(images, caption, *silent).await,
            Notification::Text { text, silent } => notifier.send_text(text, *silent).await,
        }
    }
}

/// Cuts `text` to [`MAX_MESSAGE_CHARS`] characters, marking the cut.
pub fn truncate(text: &str) -> String {
    if text.chars().count() <= MAX_MESSAGE_CHARS {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(MAX_MESSAGE_CHARS).collect();
    cut.push_str(CUT_MARKER);
    cut
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        "slot"
    } else {
        "slots"
    }
}

/// Builds the message for a change from `previous` to the current run.
///
/// Returns `None` when the open days did not change. An album is silent
/// unless at least one day opened up.
pub fn compose(
    previous: &SlotSnapshot,
    slots: &[AvailableSlot],
    screenshots: &[Vec<u8>],
    scheduling_url: &str,
) -> Option<Notification> {
    let current = snapshot(slots);
    if *previous == current {
        return None;
    }

    if current.is_empty() {
        return Some(Notification::Text {
            text: NO_SLOTS_TEXT.to_string(),
            silent: false,
        });
    }

    let changes = diff(previous, &current);
    let mut description = String::new();
    for (month, change) in &changes {
        for day in &change.removed {
            description.push_str(&format!("❌ {} {}\n", day, month));
        }
        for day in &change.added {
            let count = slots
                .iter()
                .filter(|slot| &slot.month == month && slot.day == *day)
                .count();
            description.push_str(&format!(
                "🟢 {} {} ({} {})\n",
                day,
                month,
                count,
                plural(count)
            ));
        }
    }

    let headline = if previous.is_empty() {
        FIRST_DISCOVERY_HEADLINE
    } else {
        CHANGED_HEADLINE
    };
    let text = truncate(&format!(
        "{}\n\n{}\n{}",
        headline, description, scheduling_url
    ));
    let silent = !has_additions(&changes);

    if screenshots.is_empty() {
        tracing::warn!(target: "notify", "No calendar screenshots, sending the change as text");
        return Some(Notification::Text { text, silent });
    }
    Some(Notification::Album {
        images: screenshots.to_vec(),
        caption: text,
        silent,
    })
}

/// Text for the pinned status message.
pub fn status_text(now: DateTime<FixedOffset>) -> String {
    format!(
        "⚡ Last checked at {} (UTC{})",
        now.format("%H:%M on %b %d"),
        now.offset()
    )
}

#[cfg(test)]
#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Text { text: String, silent: bool },
    Album { images: usize, caption: String, silent: bool },
    Edit { message_id: i64, text: String },
}

/// Records everything it is asked to send. Edits can be made to fail.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: parking_lot::Mutex<Vec<Sent>>,
    fail_edits: bool,
}

#[cfg(test)]
impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_edits() -> Self {
        Self {
            fail_edits: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_text(&self, text: &str, silent: bool) -> Result<()> {
        self.sent.lock().push(Sent::Text {
            text: text.to_string(),
            silent,
        });
        Ok(())
    }

    async fn send_album(&self, images: &[Vec<u8>], caption: &str, silent: bool) -> Result<()> {
        self.sent.lock().push(Sent::Album {
            images: images.len(),
            caption: caption.to_string(),
            silent,
        });
        Ok(())
    }

    async fn edit_text(&self, message_id: i64, text: &str) -> Result<()> {
        if self.fail_edits {
            return Err(crate::core::error::AppError::Notification(
                "Bad Request: message to edit not found".to_string(),
            ));
        }
        self.sent.lock().push(Sent::Edit {
            message_id,
            text: text.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const URL: &str = "https://visa.example.org/booking";

    fn shots(n: usize) -> Vec<Vec<u8>> {
        (0..n).map(|i| vec![i as u8]).collect()
    }

    #[test]
    fn test_unchanged_days_send_nothing() {
        let slots = vec![AvailableSlot::new("May", 1, "0900")];
        // a different time on the same day is not a change
        let previous = snapshot(&[AvailableSlot::new("May", 1, "1500")]);
        assert_eq!(compose(&previous, &slots, &shots(1), URL), None);
        assert_eq!(compose(&SlotSnapshot::new(), &[], &[], URL), None);
    }

    #[test]
    fn test_first_discovery_album() {
        let slots = vec![
            AvailableSlot::new("May 2024", 3, "0900"),
            AvailableSlot::new("May 2024", 3, "0930"),
            AvailableSlot::new("May 2024", 10, "1100"),
        ];
        let notification = compose(&SlotSnapshot::new(), &slots, &shots(2), URL).unwrap();
        assert_eq!(
            notification,
            Notification::Album {
                images: shots(2),
                caption: format!(
                    "🔥 Found available days!\n\n🟢 3 May 2024 (2 slots)\n🟢 10 May 2024 (1 slot)\n\n{}",
                    URL
                ),
                silent: false,
            }
        );
    }

    #[test]
    fn test_removals_only_are_silent() {
        let previous = snapshot(&[
            AvailableSlot::new("May", 1, "0900"),
            AvailableSlot::new("May", 2, "0900"),
        ]);
        let slots = vec![AvailableSlot::new("May", 2, "0900")];
        let Some(Notification::Album { caption, silent, .. }) =
            compose(&previous, &slots, &shots(1), URL)
        else {
            panic!("expected an album");
        };
        assert!(silent);
        assert!(caption.starts_with("⚡ Available days changed!\n\n❌ 1 May\n"));
    }

    #[test]
    fn test_removed_lines_come_before_added() {
        let previous = snapshot(&[AvailableSlot::new("May", 1, "0900")]);
        let slots = vec![AvailableSlot::new("May", 4, "0900")];
        let Some(Notification::Album { caption, silent, .. }) =
            compose(&previous, &slots, &shots(1), URL)
        else {
            panic!("expected an album");
        };
        assert!(!silent);
        assert!(caption.contains("❌ 1 May\n🟢 4 May (1 slot)\n"));
    }

    #[test]
    fn test_everything_gone_is_plain_text() {
        let previous = snapshot(&[AvailableSlot::new("May", 1, "0900")]);
        assert_eq!(
            compose(&previous, &[], &shots(1), URL),
            Some(Notification::Text {
                text: "🙅 No more slots available...".to_string(),
                silent: false,
            })
        );
    }

    #[test]
    fn test_missing_screenshots_fall_back_to_text() {
        let slots = vec![AvailableSlot::new("May", 1, "0900")];
        let notification = compose(&SlotSnapshot::new(), &slots, &[], URL).unwrap();
        assert!(matches!(notification, Notification::Text { silent: false, .. }));
    }

    #[test]
    fn test_truncation_marks_the_cut() {
        let short = "a".repeat(MAX_MESSAGE_CHARS);
        assert_eq!(truncate(&short), short);

        let long = "🟢".repeat(MAX_MESSAGE_CHARS + 5);
        let cut = truncate(&long);
        assert!(cut.ends_with(" (cut)"));
        assert_eq!(cut.chars().count(), MAX_MESSAGE_CHARS + " (cut)".len());
    }

    #[test]
    fn test_long_change_list_is_truncated() {
        let slots: Vec<AvailableSlot> = (0..200)
            .map(|i| AvailableSlot::new(format!("Month {}", i), 1, "0900"))
            .collect();
        let Some(Notification::Album { caption, .. }) =
            compose(&SlotSnapshot::new(), &slots, &shots(1), URL)
        else {
            panic!("expected an album");
        };
        assert!(caption.ends_with(" (cut)"));
        assert!(!caption.contains(URL));
    }

    #[test]
    fn test_status_text_uses_offset() {
        let offset = FixedOffset::east_opt(3 * 3600).unwrap();
        let now = offset.with_ymd_and_hms(2024, 5, 7, 9, 5, 0).unwrap();
        assert_eq!(
            status_text(now),
            "⚡ Last checked at 09:05 on May 07 (UTC+03:00)"
        );
    }

    #[tokio::test]
    async fn test_deliver_routes_by_kind() {
        let notifier = RecordingNotifier::new();
        Notification::Album {
            images: shots(3),
            caption: "c".to_string(),
            silent: true,
        }
        .deliver(&notifier)
        .await
        .unwrap();
        Notification::Text {
            text: "t".to_string(),
            silent: false,
        }
        .deliver(&notifier)
        .await
        .unwrap();

        assert_eq!(
            notifier.sent(),
            vec![
                Sent::Album {
                    images: 3,
                    caption: "c".to_string(),
                    silent: true
                },
                Sent::Text {
                    text: "t".to_string(),
                    silent: false
                },
            ]
        );
    }
}

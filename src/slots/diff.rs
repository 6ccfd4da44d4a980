//! Month/day snapshots of slot lists and the difference between two of them.
//!
//! Month labels are the site's own strings and are ordered lexically
//! ("April 2025" sorts before "March 2025"). Nothing downstream relies on
//! calendar order, so the labels are left as rendered.

use crate::core::models::AvailableSlot;
use std::collections::{BTreeMap, BTreeSet};

/// Month label -> distinct open days.
pub type SlotSnapshot = BTreeMap<String, BTreeSet<u32>>;

/// Changes of one month. Both lists are sorted ascending.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonthChange {
    pub added: Vec<u32>,
    pub removed: Vec<u32>,
}

/// Month label -> changes. Months without changes are absent.
pub type SlotDiff = BTreeMap<String, MonthChange>;

/// Groups slots by month, keeping each day once.
pub fn snapshot(slots: &[AvailableSlot]) -> SlotSnapshot {
    let mut result = SlotSnapshot::new();
    for slot in slots {
        result
            .entry(slot.month.clone())
            .or_default()
            .insert(slot.day);
    }
    result
}

/// Computes what changed from `baseline` to `current`.
pub fn diff(baseline: &SlotSnapshot, current: &SlotSnapshot) -> SlotDiff {
    let empty = BTreeSet::new();
    let mut result = SlotDiff::new();

    for (month, days) in baseline {
        let now = current.get(month).unwrap_or(&empty);
        let removed: Vec<u32> = days.difference(now).copied().collect();
        if !removed.is_empty() {
            result.entry(month.clone()).or_default().removed = removed;
        }
    }

    for (month, days) in current {
        let before = baseline.get(month).unwrap_or(&empty);
        let added: Vec<u32> = days.difference(before).copied().collect();
        if !added.is_empty() {
            result.entry(month.clone()).or_default().added = added;
        }
    }

    result
}

/// True when at least one day opened up.
pub fn has_additions(diff: &SlotDiff) -> bool {
    diff.values().any(|change| !change.added.is_empty())
}

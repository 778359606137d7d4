//! Sliding-window migration.
//!
//! A stored plan covers "today, today+1, today+2" as of the last time it was
//! written. When the day rolls forward, the days that fell behind are turned
//! into archive records and the window is rebuilt around the new today,
//! carrying over whatever was already planned for the overlapping days.

use crate::plan::{ArchiveRecord, DateKey, PlanDays, PlanId, PlanWindow, WINDOW_DAYS};

/// Result of one migration pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
	/// Past days outside the new window, in ascending date order.
	pub archived: Vec<ArchiveRecord>,
	/// The live window for `today`.
	pub window: PlanWindow,
	/// Days on or after `today` that are not in the new window. Neither
	/// archived nor kept; only reported so the caller can log them.
	pub dropped: Vec<DateKey>,
}

impl Migration {
	/// True when the window content is exactly what was stored and nothing left it.
	pub fn is_noop(&self, old: &PlanDays) -> bool {
		self.archived.is_empty() && self.dropped.is_empty() && self.window.to_days() == *old
	}
}

/// The three window days starting at `reference`.
pub fn compute_window(reference: DateKey) -> [DateKey; WINDOW_DAYS] {
	std::array::from_fn(|i| reference.plus_days(i as u64))
}

/// Moves `old` onto the window starting at `today`.
pub fn migrate(plan_id: &PlanId, old: &PlanDays, today: DateKey) -> Migration {
	let keys = compute_window(today);

	let mut archived = Vec::new();
	let mut dropped = Vec::new();
	for (key, slots) in old {
		if keys.contains(key) {
			continue;
		}
		if *key < today {
			archived.push(ArchiveRecord { plan_id: plan_id.clone(), date: *key, meals: slots.clone() });
		} else {
			dropped.push(*key);
		}
	}

	let window = PlanWindow::filled(today, |key| old.get(&key).cloned().unwrap_or_default());

	Migration { archived, window, dropped }
}

//! Plan operations: the load-time sync that rolls the window forward, and the
//! edits made on top of the live window.

use anyhow::{bail, Context, Result};

use crate::clock::Clock;
use crate::legacy::PlanShape;
use crate::plan::{ArchiveRecord, DateKey, MealCategory, PlanDays, PlanId, PlanWindow};
use crate::store::{AppendOutcome, ArchiveStore, PlanStore, StoreError};
use crate::window::migrate;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
	pub window: PlanWindow,
	/// Days newly written to history.
	pub archived: Vec<DateKey>,
	/// Days whose history entry already existed from an interrupted run.
	pub already_archived: Vec<DateKey>,
	/// Future days outside the window that were discarded.
	pub dropped: Vec<DateKey>,
	/// Stored plan used the fixed-label layout and was rewritten.
	pub upgraded: bool,
	/// The stored plan was rewritten.
	pub written: bool,
}

impl SyncReport {
	pub fn rolled_forward(&self) -> bool {
		!self.archived.is_empty() || !self.already_archived.is_empty()
	}
}

pub struct Planner<'a, S, C: ?Sized> {
	store: &'a S,
	clock: &'a C,
}

impl<'a, S, C> Planner<'a, S, C>
where
	S: PlanStore + ArchiveStore,
	C: Clock + ?Sized,
{
	pub fn new(store: &'a S, clock: &'a C) -> Self {
		Self { store, clock }
	}

	pub fn today(&self) -> DateKey {
		self.clock.today()
	}

	/// Reads the plan, archives days that fell behind and stores the window
	/// for today. Safe to rerun after a failure part way through.
	pub fn sync(&self, plan: &PlanId) -> Result<SyncReport> {
		let today = self.clock.today();
		let (shape, found) = match self.store.read(plan) {
			Ok(shape) => (shape, true),
			Err(StoreError::NotFound(_)) => {
				tracing::debug!(plan = %plan, "no stored plan; starting empty");
				(PlanShape::DateKeyed(PlanDays::new()), false)
			}
			Err(e) => return Err(e).with_context(|| format!("read plan {}", plan)),
		};
		let upgraded = shape.is_legacy();
		let old = shape.into_days();
		let migration = migrate(plan, &old, today);

		for day in &migration.dropped {
			tracing::warn!(plan = %plan, %day, %today, "discarding future day outside the window");
		}

		let mut archived = Vec::new();
		let mut already_archived = Vec::new();
		for record in &migration.archived {
			let outcome = self.store.append(record).with_context(|| format!("archive {}", record.id()))?;
			match outcome {
				AppendOutcome::Appended => archived.push(record.date),
				AppendOutcome::AlreadyArchived => {
					tracing::info!(id = %record.id(), "history entry already present");
					already_archived.push(record.date);
				}
			}
		}

		let written = found && (upgraded || !migration.is_noop(&old));
		if written {
			self.store.write(plan, &migration.window).with_context(|| format!("write plan {}", plan))?;
			tracing::info!(plan = %plan, start = %today, archived = archived.len(), "plan window moved");
		}

		Ok(SyncReport {
			window: migration.window,
			archived,
			already_archived,
			dropped: migration.dropped,
			upgraded,
			written,
		})
	}

	/// Sets one meal slot. `date` must be inside today's window.
	pub fn set_meal(&self, plan: &PlanId, date: DateKey, category: MealCategory, text: &str) -> Result<PlanWindow> {
		let mut window = self.sync(plan)?.window;
		let keys = window.keys();
		let Some(slots) = window.get_mut(date) else {
			bail!("{} is outside the current plan ({} to {})", date, keys[0], keys[keys.len() - 1]);
		};
		slots.set(category, text.trim());
		self.store.write(plan, &window).with_context(|| format!("write plan {}", plan))?;
		Ok(window)
	}

	/// Deletes the stored plan. History is kept. Returns false if nothing was stored.
	pub fn clear(&self, plan: &PlanId) -> Result<bool> {
		match self.store.delete(plan) {
			Ok(()) => Ok(true),
			Err(StoreError::NotFound(_)) => Ok(false),
			Err(e) => Err(e).with_context(|| format!("delete plan {}", plan)),
		}
	}

	/// Archived days of `plan`, most recent first.
	pub fn history(&self, plan: &PlanId) -> Result<Vec<ArchiveRecord>> {
		let mut records = self.store.list(plan).with_context(|| format!("read history of {}", plan))?;
		records.sort_by(|a, b| b.date.cmp(&a.date));
		Ok(records)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::clock::FixedClock;
	use crate::legacy::LegacyPlan;
	use crate::plan::{key, DaySlots};
	use crate::store::memory::MemoryStore;

	fn plan() -> PlanId {
		"abc123".parse().unwrap()
	}

	fn dinner(text: &str) -> DaySlots {
		DaySlots { dinner: text.into(), ..Default::default() }
	}

	#[test]
	fn first_sync_shows_empty_window_without_writing() {
		let store = MemoryStore::default();
		let clock = FixedClock(key("2024-01-01"));
		let report = Planner::new(&store, &clock).sync(&plan()).unwrap();
		assert_eq!(report.window, PlanWindow::empty(key("2024-01-01")));
		assert!(!report.written);
		assert!(!report.rolled_forward());
		assert_eq!(store.plan_writes.get(), 0);
	}

	#[test]
	fn next_day_archives_and_second_sync_is_a_noop() {
		let store = MemoryStore::default();
		let day1 = FixedClock(key("2024-06-10"));
		let planner = Planner::new(&store, &day1);
		planner.set_meal(&plan(), key("2024-06-10"), MealCategory::Breakfast, "toast").unwrap();
		planner.set_meal(&plan(), key("2024-06-11"), MealCategory::Lunch, " soup ").unwrap();

		let day2 = FixedClock(key("2024-06-11"));
		let planner = Planner::new(&store, &day2);
		let report = planner.sync(&plan()).unwrap();
		assert_eq!(report.archived, vec![key("2024-06-10")]);
		assert!(report.written);
		assert_eq!(report.window.get(key("2024-06-11")).unwrap().lunch, "soup");

		let writes = store.plan_writes.get();
		let again = planner.sync(&plan()).unwrap();
		assert!(again.archived.is_empty() && again.already_archived.is_empty());
		assert!(!again.written);
		assert_eq!(again.window, report.window);
		assert_eq!(store.plan_writes.get(), writes);

		let history = planner.history(&plan()).unwrap();
		assert_eq!(history.len(), 1);
		assert_eq!(history[0].meals.breakfast, "toast");
	}

	#[test]
	fn interrupted_sync_recovers_without_double_archiving() {
		let store = MemoryStore::default();
		store.plans.borrow_mut().insert(
			plan(),
			PlanShape::DateKeyed([(key("2024-06-08"), dinner("a")), (key("2024-06-09"), dinner("b"))].into_iter().collect()),
		);
		let clock = FixedClock(key("2024-06-10"));
		let planner = Planner::new(&store, &clock);

		store.fail_plan_writes.set(true);
		assert!(planner.sync(&plan()).is_err());
		assert_eq!(store.archive.borrow().len(), 2);

		store.fail_plan_writes.set(false);
		let report = planner.sync(&plan()).unwrap();
		assert!(report.archived.is_empty());
		assert_eq!(report.already_archived, vec![key("2024-06-08"), key("2024-06-09")]);
		assert!(report.written);
		assert_eq!(store.archive.borrow().len(), 2);
	}

	#[test]
	fn archive_failure_leaves_stored_plan_alone() {
		let store = MemoryStore::default();
		let old: PlanDays = [(key("2024-06-09"), dinner("stew"))].into_iter().collect();
		store.plans.borrow_mut().insert(plan(), PlanShape::DateKeyed(old.clone()));
		store.fail_archive.set(true);
		let clock = FixedClock(key("2024-06-10"));
		assert!(Planner::new(&store, &clock).sync(&plan()).is_err());
		assert_eq!(store.plans.borrow()[&plan()], PlanShape::DateKeyed(old));
	}

	#[test]
	fn legacy_plan_is_upgraded_on_sync() {
		let store = MemoryStore::default();
		let legacy = LegacyPlan {
			dates: [Some(key("2024-06-10")), Some(key("2024-06-11")), Some(key("2024-06-12"))],
			days: [dinner("x"), dinner("y"), dinner("z")],
		};
		store.plans.borrow_mut().insert(plan(), PlanShape::Legacy(legacy));
		let clock = FixedClock(key("2024-06-10"));
		let report = Planner::new(&store, &clock).sync(&plan()).unwrap();
		assert!(report.upgraded && report.written);
		assert!(!report.rolled_forward());
		assert!(matches!(store.plans.borrow()[&plan()], PlanShape::DateKeyed(_)));
		assert_eq!(report.window.get(key("2024-06-12")).unwrap().dinner, "z");
	}

	#[test]
	fn set_meal_outside_window_fails() {
		let store = MemoryStore::default();
		let clock = FixedClock(key("2024-06-10"));
		let planner = Planner::new(&store, &clock);
		let err = planner.set_meal(&plan(), key("2024-06-13"), MealCategory::Dinner, "late").unwrap_err();
		assert!(err.to_string().contains("outside the current plan"));
		assert!(planner.set_meal(&plan(), key("2024-06-09"), MealCategory::Dinner, "early").is_err());
		assert_eq!(store.plan_writes.get(), 0);
	}

	#[test]
	fn clear_keeps_history() {
		let store = MemoryStore::default();
		let day1 = FixedClock(key("2024-06-10"));
		Planner::new(&store, &day1).set_meal(&plan(), key("2024-06-10"), MealCategory::Dinner, "curry").unwrap();
		let day2 = FixedClock(key("2024-06-11"));
		let planner = Planner::new(&store, &day2);
		planner.sync(&plan()).unwrap();

		assert!(planner.clear(&plan()).unwrap());
		assert!(!planner.clear(&plan()).unwrap());
		assert_eq!(planner.history(&plan()).unwrap().len(), 1);
		assert!(planner.sync(&plan()).unwrap().window.iter().all(|(_, s)| s.is_empty()));
	}

	#[test]
	fn history_is_newest_first() {
		let store = MemoryStore::default();
		let old: PlanDays = ["2024-05-01", "2024-05-03", "2024-05-02"].into_iter().map(|d| (key(d), dinner(d))).collect();
		store.plans.borrow_mut().insert(plan(), PlanShape::DateKeyed(old));
		let clock = FixedClock(key("2024-06-01"));
		let planner = Planner::new(&store, &clock);
		planner.sync(&plan()).unwrap();
		let dates: Vec<_> = planner.history(&plan()).unwrap().into_iter().map(|r| r.date).collect();
		assert_eq!(dates, vec![key("2024-05-03"), key("2024-05-02"), key("2024-05-01")]);
	}

	#[test]
	fn file_backed_plan_rolls_forward() {
		let dir = tempfile::tempdir().unwrap();
		let store = crate::store::FileStore::open(dir.path()).unwrap();
		std::fs::write(
			dir.path().join("plans/abc123.json"),
			r#"{"dates":{"day1":"2024-06-10","day2":"2024-06-11","day3":"2024-06-12"},"day1":{"breakfast":"toast"},"day2":{"lunch":"soup"},"day3":{"dinner":"rice"}}"#,
		)
		.unwrap();

		let clock = FixedClock(key("2024-06-11"));
		let planner = Planner::new(&store, &clock);
		let report = planner.sync(&plan()).unwrap();
		assert!(report.upgraded);
		assert_eq!(report.archived, vec![key("2024-06-10")]);
		assert!(dir.path().join("daily_history/archive-abc123-2024-06-10.json").exists());

		let raw: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(dir.path().join("plans/abc123.json")).unwrap()).unwrap();
		assert!(raw.get("dates").is_none());
		assert_eq!(raw["2024-06-11"]["lunch"], "soup");
		assert_eq!(raw["2024-06-13"]["breakfast"], "");

		let again = planner.sync(&plan()).unwrap();
		assert!(!again.written && !again.rolled_forward());
		assert_eq!(planner.history(&plan()).unwrap()[0].meals.breakfast, "toast");
	}

	#[test]
	fn torn_history_file_does_not_lose_the_day() {
		let dir = tempfile::tempdir().unwrap();
		let store = crate::store::FileStore::open(dir.path()).unwrap();
		std::fs::write(dir.path().join("plans/abc123.json"), r#"{"2024-06-10":{"dinner":"curry"},"2024-06-11":{},"2024-06-12":{}}"#).unwrap();
		std::fs::write(dir.path().join("daily_history/archive-abc123-2024-06-10.json"), "").unwrap();

		let clock = FixedClock(key("2024-06-11"));
		let planner = Planner::new(&store, &clock);
		let report = planner.sync(&plan()).unwrap();
		assert_eq!(report.archived, vec![key("2024-06-10")]);
		assert!(report.already_archived.is_empty());
		let history = planner.history(&plan()).unwrap();
		assert_eq!(history.len(), 1);
		assert_eq!(history[0].meals.dinner, "curry");
	}
}

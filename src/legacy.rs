//! Stored plan document shapes.
//!
//! Older plans were saved with fixed labels (`day1`..`day3`) and a separate
//! `dates` object; current plans are keyed directly by ISO date. Both are read
//! into a [`PlanShape`] and flattened to [`PlanDays`] before migration.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::plan::{DateKey, DaySlots, PlanDays, WINDOW_DAYS};

const LEGACY_LABELS: [&str; WINDOW_DAYS] = ["day1", "day2", "day3"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanShape {
	Legacy(LegacyPlan),
	DateKeyed(PlanDays),
}

/// A fixed-label plan. A missing date means that label could not be keyed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LegacyPlan {
	pub dates: [Option<DateKey>; WINDOW_DAYS],
	pub days: [DaySlots; WINDOW_DAYS],
}

impl PlanShape {
	/// Detects the shape of a stored document. A top-level `dates` object
	/// marks the fixed-label layout.
	pub fn from_document(doc: &Value) -> Self {
		let Some(obj) = doc.as_object() else {
			tracing::warn!("plan document is not an object; treating as empty");
			return PlanShape::DateKeyed(PlanDays::new());
		};
		match obj.get("dates") {
			Some(Value::Object(dates)) => PlanShape::Legacy(LegacyPlan::from_parts(dates, obj)),
			_ => PlanShape::DateKeyed(date_keyed(obj)),
		}
	}

	pub fn is_legacy(&self) -> bool {
		matches!(self, PlanShape::Legacy(_))
	}

	pub fn into_days(self) -> PlanDays {
		match self {
			PlanShape::Legacy(plan) => normalize(&plan),
			PlanShape::DateKeyed(days) => days,
		}
	}
}

impl LegacyPlan {
	fn from_parts(dates: &Map<String, Value>, doc: &Map<String, Value>) -> Self {
		let dates = LEGACY_LABELS.map(|label| dates.get(label).and_then(legacy_date));
		let days = LEGACY_LABELS.map(|label| doc.get(label).map(slots_or_empty).unwrap_or_default());
		Self { dates, days }
	}
}

/// Converts a fixed-label plan to date keys. Labels without a stored date are
/// placed relative to the first label that has one; if none has a date the
/// plan cannot be keyed and comes back empty.
pub fn normalize(plan: &LegacyPlan) -> PlanDays {
	let start = plan.dates.iter().enumerate().find_map(|(i, d)| d.and_then(|d| d.minus_days(i as u64)));
	let Some(start) = start else {
		if plan.days.iter().any(|d| !d.is_empty()) {
			tracing::warn!("legacy plan has meals but no dates; dropping it");
		}
		return PlanDays::new();
	};

	let mut out = PlanDays::new();
	for (i, slots) in plan.days.iter().enumerate() {
		let key = plan.dates[i].unwrap_or_else(|| start.plus_days(i as u64));
		out.entry(key).or_insert_with(|| slots.clone());
	}
	out
}

fn legacy_date(v: &Value) -> Option<DateKey> {
	// Older clients stored full ISO timestamps here.
	let s = v.as_str()?;
	let day = s.split('T').next().unwrap_or(s);
	match day.parse() {
		Ok(k) => Some(k),
		Err(err) => {
			tracing::warn!(value = s, %err, "unreadable legacy plan date");
			None
		}
	}
}

fn slots_or_empty(v: &Value) -> DaySlots {
	DaySlots::deserialize(v).unwrap_or_else(|err| {
		tracing::warn!(%err, "malformed meal slots; using empty day");
		DaySlots::default()
	})
}

fn date_keyed(obj: &Map<String, Value>) -> PlanDays {
	obj.iter()
		.filter_map(|(k, v)| match k.parse::<DateKey>() {
			Ok(key) => Some((key, slots_or_empty(v))),
			Err(_) => {
				tracing::trace!(field = k.as_str(), "skipping non-date field");
				None
			}
		})
		.collect()
}

//! Plan data model: date keys, per-day meal slots, the 3-day window and
//! archive records.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{Days, NaiveDate};
use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Number of consecutive days a plan covers.
pub const WINDOW_DAYS: usize = 3;

/// Headroom kept at both ends of the calendar so window and legacy anchor
/// arithmetic stays in range.
const EDGE_DAYS: u64 = (WINDOW_DAYS - 1) as u64;

const PLAN_ID_LEN: usize = 6;
const PLAN_ID_CHARS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParseError {
	#[error("invalid date: {0} (expected YYYY-MM-DD)")]
	Date(String),
	#[error("invalid plan id: {0:?} (use letters, digits, '-' or '_')")]
	PlanId(String),
	#[error("invalid meal: {0} (expected breakfast, lunch or dinner)")]
	Category(String),
}

/// A calendar day. Compared and stored by day, never by timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateKey(NaiveDate);

impl DateKey {
	/// Dates closer than two days to either end of chrono's calendar are
	/// clamped inward.
	pub fn new(date: NaiveDate) -> Self {
		Self(date.clamp(first_day(), last_day()))
	}

	pub fn date(self) -> NaiveDate {
		self.0
	}

	/// The day `n` days after this one, saturating at the end of the calendar.
	pub fn plus_days(self, n: u64) -> Self {
		Self(self.0.checked_add_days(Days::new(n)).unwrap_or(NaiveDate::MAX))
	}

	/// The day `n` days before this one, if the calendar reaches that far.
	pub fn minus_days(self, n: u64) -> Option<Self> {
		self.0.checked_sub_days(Days::new(n)).map(Self)
	}
}

fn first_day() -> NaiveDate {
	NaiveDate::MIN.checked_add_days(Days::new(EDGE_DAYS)).unwrap_or(NaiveDate::MIN)
}

fn last_day() -> NaiveDate {
	NaiveDate::MAX.checked_sub_days(Days::new(EDGE_DAYS)).unwrap_or(NaiveDate::MAX)
}

impl From<NaiveDate> for DateKey {
	fn from(date: NaiveDate) -> Self {
		Self::new(date)
	}
}

impl fmt::Display for DateKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0.format("%Y-%m-%d"))
	}
}

impl FromStr for DateKey {
	type Err = ParseError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d") {
			Ok(d) if (first_day()..=last_day()).contains(&d) => Ok(Self(d)),
			_ => Err(ParseError::Date(s.to_string())),
		}
	}
}

impl Serialize for DateKey {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.collect_str(self)
	}
}

impl<'de> Deserialize<'de> for DateKey {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let s = String::deserialize(deserializer)?;
		s.parse().map_err(serde::de::Error::custom)
	}
}

/// Breakfast, lunch or dinner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealCategory {
	Breakfast,
	Lunch,
	Dinner,
}

impl MealCategory {
	pub const ALL: [MealCategory; 3] = [MealCategory::Breakfast, MealCategory::Lunch, MealCategory::Dinner];

	pub fn as_str(self) -> &'static str {
		match self {
			MealCategory::Breakfast => "breakfast",
			MealCategory::Lunch => "lunch",
			MealCategory::Dinner => "dinner",
		}
	}
}

impl fmt::Display for MealCategory {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for MealCategory {
	type Err = ParseError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_lowercase().as_str() {
			"breakfast" | "b" | "morning" => Ok(MealCategory::Breakfast),
			"lunch" | "l" | "noon" => Ok(MealCategory::Lunch),
			"dinner" | "d" | "evening" | "supper" => Ok(MealCategory::Dinner),
			_ => Err(ParseError::Category(s.to_string())),
		}
	}
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
	Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// The three free-text meal fields of one day. Absent fields are empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaySlots {
	#[serde(default, deserialize_with = "null_as_empty")]
	pub breakfast: String,
	#[serde(default, deserialize_with = "null_as_empty")]
	pub lunch: String,
	#[serde(default, deserialize_with = "null_as_empty")]
	pub dinner: String,
}

impl DaySlots {
	pub fn get(&self, category: MealCategory) -> &str {
		match category {
			MealCategory::Breakfast => &self.breakfast,
			MealCategory::Lunch => &self.lunch,
			MealCategory::Dinner => &self.dinner,
		}
	}

	pub fn set(&mut self, category: MealCategory, text: impl Into<String>) {
		let text = text.into();
		match category {
			MealCategory::Breakfast => self.breakfast = text,
			MealCategory::Lunch => self.lunch = text,
			MealCategory::Dinner => self.dinner = text,
		}
	}

	pub fn is_empty(&self) -> bool {
		self.breakfast.is_empty() && self.lunch.is_empty() && self.dinner.is_empty()
	}
}

/// Identifier of one plan; also names its catalog and history.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PlanId(String);

impl PlanId {
	/// A fresh 6-character id from `[0-9a-z]`.
	pub fn generate() -> Self {
		let mut rng = rand::thread_rng();
		let id = (0..PLAN_ID_LEN)
			.map(|_| PLAN_ID_CHARS[rng.gen_range(0..PLAN_ID_CHARS.len())] as char)
			.collect();
		Self(id)
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for PlanId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl FromStr for PlanId {
	type Err = ParseError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let s = s.trim();
		if is_safe_id(s) {
			Ok(Self(s.to_string()))
		} else {
			Err(ParseError::PlanId(s.to_string()))
		}
	}
}

impl TryFrom<String> for PlanId {
	type Error = ParseError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		value.parse()
	}
}

impl From<PlanId> for String {
	fn from(id: PlanId) -> Self {
		id.0
	}
}

/// Non-empty and limited to ASCII letters, digits, `-` and `_`, so it can name a file.
pub fn is_safe_id(s: &str) -> bool {
	!s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// A stored plan as read back: any number of days, possibly stale.
pub type PlanDays = BTreeMap<DateKey, DaySlots>;

/// Exactly three consecutive days starting at `start()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanWindow {
	days: [(DateKey, DaySlots); WINDOW_DAYS],
}

impl PlanWindow {
	/// A window of empty days starting at `start`.
	pub fn empty(start: DateKey) -> Self {
		Self::filled(start, |_| DaySlots::default())
	}

	/// Builds the window starting at `start`, asking `fill` for each day.
	pub fn filled(start: DateKey, mut fill: impl FnMut(DateKey) -> DaySlots) -> Self {
		let days = std::array::from_fn(|i| {
			let key = start.plus_days(i as u64);
			(key, fill(key))
		});
		Self { days }
	}

	pub fn start(&self) -> DateKey {
		self.days[0].0
	}

	pub fn keys(&self) -> [DateKey; WINDOW_DAYS] {
		std::array::from_fn(|i| self.days[i].0)
	}

	pub fn contains(&self, key: DateKey) -> bool {
		self.days.iter().any(|(k, _)| *k == key)
	}

	pub fn get(&self, key: DateKey) -> Option<&DaySlots> {
		self.days.iter().find(|(k, _)| *k == key).map(|(_, s)| s)
	}

	pub fn get_mut(&mut self, key: DateKey) -> Option<&mut DaySlots> {
		self.days.iter_mut().find(|(k, _)| *k == key).map(|(_, s)| s)
	}

	pub fn iter(&self) -> impl Iterator<Item = (DateKey, &DaySlots)> {
		self.days.iter().map(|(k, s)| (*k, s))
	}

	pub fn to_days(&self) -> PlanDays {
		self.days.iter().cloned().collect()
	}
}

/// One day's meals after the day left the window. Never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveRecord {
	pub plan_id: PlanId,
	pub date: DateKey,
	pub meals: DaySlots,
}

impl ArchiveRecord {
	/// Deterministic storage id, so archiving the same day twice is a no-op.
	pub fn id(&self) -> String {
		archive_id(&self.plan_id, self.date)
	}
}

pub fn archive_id(plan_id: &PlanId, date: DateKey) -> String {
	format!("archive-{}-{}", plan_id, date)
}

#[cfg(test)]
pub(crate) fn key(s: &str) -> DateKey {
	s.parse().expect("test date")
}

use chrono::Local;

use crate::plan::DateKey;

/// Source of "today".
pub trait Clock {
	fn today(&self) -> DateKey;
}

/// Local wall-clock date.
pub struct SystemClock;

impl Clock for SystemClock {
	fn today(&self) -> DateKey {
		DateKey::new(Local::now().date_naive())
	}
}

/// A clock pinned to one day; lets callers plan "as of" another date.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateKey);

impl Clock for FixedClock {
	fn today(&self) -> DateKey {
		self.0
	}
}

//! Persistence collaborators and their JSON-file backend.
//!
//! Layout under the data directory:
//!
//! ```text
//! plans/{planId}.json                        date-keyed plan + lastUpdated
//! daily_history/archive-{planId}-{date}.json one archived day, never rewritten
//! meals/{mealId}.json                        catalog entries
//! ```

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::catalog::Meal;
use crate::legacy::PlanShape;
use crate::plan::{is_safe_id, ArchiveRecord, PlanDays, PlanId, PlanWindow};

const PLANS_DIR: &str = "plans";
const HISTORY_DIR: &str = "daily_history";
const MEALS_DIR: &str = "meals";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
	#[error("not found: {0}")]
	NotFound(String),
	#[error("{path}: {source}")]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},
	#[error("cannot parse {path}: {source}")]
	Parse {
		path: PathBuf,
		#[source]
		source: serde_json::Error,
	},
	#[error("invalid record id: {0:?}")]
	InvalidId(String),
	#[error("{0}")]
	Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
	Appended,
	AlreadyArchived,
}

pub trait PlanStore {
	/// The stored document for `plan`, or `NotFound` on first use.
	fn read(&self, plan: &PlanId) -> Result<PlanShape, StoreError>;
	/// Replaces the stored document and stamps `lastUpdated`.
	fn write(&self, plan: &PlanId, window: &PlanWindow) -> Result<(), StoreError>;
	fn delete(&self, plan: &PlanId) -> Result<(), StoreError>;
}

pub trait ArchiveStore {
	/// Stores `record` under its deterministic id. An id that already exists
	/// is left untouched.
	fn append(&self, record: &ArchiveRecord) -> Result<AppendOutcome, StoreError>;
	fn list(&self, plan: &PlanId) -> Result<Vec<ArchiveRecord>, StoreError>;
}

pub trait MealStore {
	fn get(&self, id: &str) -> Result<Meal, StoreError>;
	fn put(&self, meal: &Meal) -> Result<(), StoreError>;
	fn remove(&self, id: &str) -> Result<(), StoreError>;
	fn list(&self, plan: &PlanId) -> Result<Vec<Meal>, StoreError>;
}

#[derive(Serialize)]
struct PlanDocument {
	#[serde(flatten)]
	days: PlanDays,
	#[serde(rename = "lastUpdated")]
	last_updated: DateTime<Utc>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredArchive {
	#[serde(flatten)]
	record: ArchiveRecord,
	archived_at: DateTime<Utc>,
}

/// All stores backed by JSON files under one root directory.
#[derive(Debug, Clone)]
pub struct FileStore {
	root: PathBuf,
}

impl FileStore {
	pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let root = root.into();
		for sub in [PLANS_DIR, HISTORY_DIR, MEALS_DIR] {
			let dir = root.join(sub);
			fs::create_dir_all(&dir).map_err(|source| StoreError::Io { path: dir.clone(), source })?;
		}
		tracing::debug!(root = %root.display(), "opened file store");
		Ok(Self { root })
	}

	pub fn root(&self) -> &Path {
		&self.root
	}

	fn plan_path(&self, plan: &PlanId) -> PathBuf {
		self.root.join(PLANS_DIR).join(format!("{}.json", plan))
	}

	fn archive_path(&self, id: &str) -> PathBuf {
		self.root.join(HISTORY_DIR).join(format!("{}.json", id))
	}

	fn meal_path(&self, id: &str) -> Result<PathBuf, StoreError> {
		if !is_safe_id(id) {
			return Err(StoreError::InvalidId(id.to_string()));
		}
		Ok(self.root.join(MEALS_DIR).join(format!("{}.json", id)))
	}
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
	let text = match fs::read_to_string(path) {
		Ok(t) => t,
		Err(e) if e.kind() == ErrorKind::NotFound => return Err(StoreError::NotFound(path.display().to_string())),
		Err(source) => return Err(StoreError::Io { path: path.to_path_buf(), source }),
	};
	serde_json::from_str(&text).map_err(|source| StoreError::Parse { path: path.to_path_buf(), source })
}

/// Writes `value` to a temp file in the target's directory. Nothing is
/// visible at `path` until the returned file is persisted.
fn stage_json<T: Serialize>(path: &Path, value: &T) -> Result<NamedTempFile, StoreError> {
	let io_err = |source: std::io::Error| StoreError::Io { path: path.to_path_buf(), source };
	let json = serde_json::to_string_pretty(value).map_err(|source| StoreError::Parse { path: path.to_path_buf(), source })?;
	let dir = path.parent().unwrap_or_else(|| Path::new("."));
	let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
	tmp.write_all(format!("{}\n", json).as_bytes()).map_err(io_err)?;
	tmp.as_file().sync_all().map_err(io_err)?;
	Ok(tmp)
}

/// Replaces `path` in one rename, so a failed write leaves the old content.
fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
	stage_json(path, value)?
		.persist(path)
		.map_err(|err| StoreError::Io { path: path.to_path_buf(), source: err.error })?;
	Ok(())
}

fn remove_file(path: &Path) -> Result<(), StoreError> {
	match fs::remove_file(path) {
		Ok(()) => Ok(()),
		Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NotFound(path.display().to_string())),
		Err(source) => Err(StoreError::Io { path: path.to_path_buf(), source }),
	}
}

/// Parses every `*.json` file in `dir`, skipping (and logging) unreadable ones.
fn read_dir_json<T: DeserializeOwned>(dir: &Path) -> Result<Vec<T>, StoreError> {
	let entries = fs::read_dir(dir).map_err(|source| StoreError::Io { path: dir.to_path_buf(), source })?;
	let mut out = Vec::new();
	for entry in entries {
		let entry = entry.map_err(|source| StoreError::Io { path: dir.to_path_buf(), source })?;
		let path = entry.path();
		if path.extension().and_then(|e| e.to_str()) != Some("json") {
			continue;
		}
		match read_json(&path) {
			Ok(v) => out.push(v),
			Err(err) => tracing::warn!(%err, "skipping unreadable record"),
		}
	}
	Ok(out)
}

impl PlanStore for FileStore {
	fn read(&self, plan: &PlanId) -> Result<PlanShape, StoreError> {
		let doc: serde_json::Value = read_json(&self.plan_path(plan))?;
		Ok(PlanShape::from_document(&doc))
	}

	fn write(&self, plan: &PlanId, window: &PlanWindow) -> Result<(), StoreError> {
		let doc = PlanDocument { days: window.to_days(), last_updated: Utc::now() };
		write_json(&self.plan_path(plan), &doc)?;
		tracing::debug!(plan = %plan, start = %window.start(), "plan written");
		Ok(())
	}

	fn delete(&self, plan: &PlanId) -> Result<(), StoreError> {
		remove_file(&self.plan_path(plan))
	}
}

impl ArchiveStore for FileStore {
	fn append(&self, record: &ArchiveRecord) -> Result<AppendOutcome, StoreError> {
		let path = self.archive_path(&record.id());
		let stored = StoredArchive { record: record.clone(), archived_at: Utc::now() };
		let err = match stage_json(&path, &stored)?.persist_noclobber(&path) {
			Ok(_) => return Ok(AppendOutcome::Appended),
			Err(err) if err.error.kind() == ErrorKind::AlreadyExists => err,
			Err(err) => return Err(StoreError::Io { path, source: err.error }),
		};
		// An existing record is kept; a torn one left by an older write is replaced.
		match read_json::<StoredArchive>(&path) {
			Ok(_) => Ok(AppendOutcome::AlreadyArchived),
			Err(StoreError::Parse { source, .. }) => {
				tracing::warn!(path = %path.display(), %source, "replacing unreadable archive record");
				err.file.persist(&path).map_err(|e| StoreError::Io { path: path.clone(), source: e.error })?;
				Ok(AppendOutcome::Appended)
			}
			Err(other) => Err(other),
		}
	}

	fn list(&self, plan: &PlanId) -> Result<Vec<ArchiveRecord>, StoreError> {
		let stored: Vec<StoredArchive> = read_dir_json(&self.root.join(HISTORY_DIR))?;
		Ok(stored.into_iter().map(|s| s.record).filter(|r| &r.plan_id == plan).collect())
	}
}

impl MealStore for FileStore {
	fn get(&self, id: &str) -> Result<Meal, StoreError> {
		read_json(&self.meal_path(id)?)
	}

	fn put(&self, meal: &Meal) -> Result<(), StoreError> {
		write_json(&self.meal_path(&meal.id)?, meal)
	}

	fn remove(&self, id: &str) -> Result<(), StoreError> {
		remove_file(&self.meal_path(id)?)
	}

	fn list(&self, plan: &PlanId) -> Result<Vec<Meal>, StoreError> {
		let meals: Vec<Meal> = read_dir_json(&self.root.join(MEALS_DIR))?;
		Ok(meals.into_iter().filter(|m| &m.plan_id == plan).collect())
	}
}

//! Configuration, data directory and current-plan resolution.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::plan::PlanId;

pub const DATA_DIR_ENV: &str = "MP_DATA_DIR";
pub const PLAN_ID_ENV: &str = "MP_PLAN_ID";

const CONFIG_FILE: &str = "config.json";
const CURRENT_PLAN_FILE: &str = "current_plan";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
	/// Where plans, history and meals are stored.
	pub data_dir: Option<PathBuf>,
	/// Plan to use when none is given and none was used before.
	pub plan_id: Option<PlanId>,
	/// Base URL for `mp share`; the link is `{base}?id={planId}`.
	pub share_base_url: Option<String>,
}

fn project_dirs() -> Result<ProjectDirs> {
	ProjectDirs::from("dev", "local", "meal_planner").context("cannot resolve project dirs")
}

pub fn default_config_path() -> Result<PathBuf> {
	Ok(project_dirs()?.config_dir().join(CONFIG_FILE))
}

/// Loads the config file. A missing file gives defaults; an unreadable one
/// is logged and also gives defaults.
pub fn load_config(path: &Path) -> Config {
	let text = match fs::read_to_string(path) {
		Ok(t) => t,
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Config::default(),
		Err(e) => {
			tracing::warn!("failed to read config from {}: {}", path.display(), e);
			return Config::default();
		}
	};
	match serde_json::from_str(&text) {
		Ok(cfg) => cfg,
		Err(e) => {
			tracing::warn!("failed to parse config from {}: {}; using defaults", path.display(), e);
			Config::default()
		}
	}
}

impl Config {
	/// `MP_DATA_DIR`, then `dataDir` from the config, then the platform data dir.
	pub fn data_dir(&self) -> Result<PathBuf> {
		let dir = match std::env::var_os(DATA_DIR_ENV).filter(|v| !v.is_empty()) {
			Some(v) => PathBuf::from(v),
			None => match &self.data_dir {
				Some(d) => d.clone(),
				None => project_dirs()?.data_dir().to_path_buf(),
			},
		};
		fs::create_dir_all(&dir).with_context(|| format!("create data dir {}", dir.display()))?;
		Ok(dir)
	}

	pub fn share_link(&self, plan: &PlanId) -> Option<String> {
		self.share_base_url.as_ref().map(|base| format!("{}?id={}", base, plan))
	}
}

pub fn read_current_plan(data_dir: &Path) -> Option<PlanId> {
	let path = data_dir.join(CURRENT_PLAN_FILE);
	let text = fs::read_to_string(&path).ok()?;
	match text.parse() {
		Ok(id) => Some(id),
		Err(err) => {
			tracing::warn!(path = %path.display(), %err, "ignoring unreadable current plan");
			None
		}
	}
}

pub fn write_current_plan(data_dir: &Path, plan: &PlanId) -> Result<()> {
	let path = data_dir.join(CURRENT_PLAN_FILE);
	fs::write(&path, format!("{}\n", plan)).with_context(|| format!("write {}", path.display()))
}

/// Picks the plan to work on and remembers it for the next run.
///
/// Order: `explicit` (flag or env), the remembered plan, the configured plan,
/// a freshly generated id.
pub fn resolve_plan_id(explicit: Option<PlanId>, config: &Config, data_dir: &Path) -> Result<PlanId> {
	let plan = match explicit.or_else(|| read_current_plan(data_dir)).or_else(|| config.plan_id.clone()) {
		Some(p) => p,
		None => {
			let p = PlanId::generate();
			tracing::info!(plan = %p, "generated new plan id");
			p
		}
	};
	write_current_plan(data_dir, &plan)?;
	Ok(plan)
}

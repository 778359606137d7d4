use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use meal_planner::catalog::{Catalog, MealDraft};
use meal_planner::clock::{Clock, FixedClock, SystemClock};
use meal_planner::config::{self, Config};
use meal_planner::plan::{DateKey, MealCategory, PlanId};
use meal_planner::planner::{Planner, SyncReport};
use meal_planner::store::FileStore;
use meal_planner::view;

#[derive(Parser)]
#[command(
	name = "mp",
	version,
	about = "Rolling 3-day meal planner",
	long_about = "Plans breakfast, lunch and dinner for today and the next two days.\n\nWhen the day changes, past days are saved to history and the plan moves\nforward, keeping anything already planned for the days that remain.\nA meal catalog per plan feeds suggestions for each meal.",
	after_help = "Examples:\n  mp show\n  mp set dinner curry rice\n  mp set -d 2025-11-05 lunch soba\n  mp history\n  mp meal add -c lunch -c dinner -m \"freezes well\" Curry\n  mp meal suggest -c dinner\n  mp --id family show\n  mp share"
)]
struct Cli {
	/// Plan id (default: the last plan used)
	#[arg(long = "id", global = true, env = config::PLAN_ID_ENV)]
	plan_id: Option<PlanId>,
	/// Treat this date YYYY-MM-DD as today
	#[arg(long = "today", global = true)]
	today: Option<DateKey>,
	/// Config file (default: platform config dir)
	#[arg(long = "config", global = true)]
	config: Option<PathBuf>,
	#[command(subcommand)]
	action: Action,
}

#[derive(Subcommand)]
enum Action {
	/// Show the 3-day plan
	Show,
	/// Set one meal for a day in the plan (default today)
	Set {
		/// breakfast, lunch or dinner
		meal: MealCategory,
		/// Meal text; empty clears the slot
		text: Vec<String>,
		/// Date YYYY-MM-DD (default: today)
		#[arg(short = 'd', long = "date")]
		date: Option<DateKey>,
	},
	/// Delete the stored plan (history is kept)
	Clear {
		/// Do not ask for confirmation
		#[arg(short = 'y', long = "yes")]
		yes: bool,
	},
	/// Move the plan to today and archive past days
	Sync,
	/// Show archived days, newest first
	History {
		/// Show at most N days
		#[arg(short = 'n', long = "limit")]
		limit: Option<usize>,
	},
	/// Manage the meal catalog
	Meal {
		#[command(subcommand)]
		cmd: MealCmd,
	},
	/// Start a new plan with a fresh id
	New,
	/// Print the plan id (and link) to share this plan
	Share,
	/// Print the current plan id
	Id,
}

#[derive(Subcommand)]
enum MealCmd {
	/// Add a meal to the catalog
	Add {
		/// Meal name
		name: Vec<String>,
		/// Category (repeat for several)
		#[arg(short = 'c', long = "category", required = true)]
		categories: Vec<MealCategory>,
		/// Free-text memo
		#[arg(short = 'm', long = "memo", default_value = "")]
		memo: String,
	},
	/// Edit a meal; omitted fields keep their value
	Edit {
		id: String,
		#[arg(short = 'n', long = "name")]
		name: Option<String>,
		#[arg(short = 'c', long = "category")]
		categories: Vec<MealCategory>,
		#[arg(short = 'm', long = "memo")]
		memo: Option<String>,
	},
	/// Remove a meal from the catalog
	Rm { id: String },
	/// List catalog meals
	List,
	/// Show meal names by category
	Suggest {
		#[arg(short = 'c', long = "category")]
		category: Option<MealCategory>,
	},
}

fn main() -> Result<()> {
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
		.with_writer(std::io::stderr)
		.init();

	let cli = Cli::parse();
	let config_path = match cli.config {
		Some(p) => p,
		None => config::default_config_path()?,
	};
	let config = config::load_config(&config_path);
	let data_dir = config.data_dir()?;
	let store = FileStore::open(&data_dir).with_context(|| format!("open data dir {}", data_dir.display()))?;

	let clock: Box<dyn Clock> = match cli.today {
		Some(d) => Box::new(FixedClock(d)),
		None => Box::new(SystemClock),
	};

	let plan = config::resolve_plan_id(cli.plan_id, &config, &data_dir)?;
	let planner = Planner::new(&store, clock.as_ref());

	match cli.action {
		Action::Show => {
			let report = planner.sync(&plan)?;
			report_sync(&report);
			print_plan(&plan, &report, planner.today());
		}
		Action::Set { meal, text, date } => {
			let date = date.unwrap_or_else(|| planner.today());
			planner.set_meal(&plan, date, meal, &text.join(" "))?;
			success(&format!("Saved {} for {} (plan {})", meal, date, plan));
		}
		Action::Clear { yes } => {
			if !yes && !confirm(&format!("Clear plan {}? This cannot be undone.", plan))? {
				info("Nothing cleared");
				return Ok(());
			}
			if planner.clear(&plan)? {
				success(&format!("Cleared plan {}", plan));
			} else {
				info(&format!("Plan {} has nothing stored", plan));
			}
		}
		Action::Sync => {
			let report = planner.sync(&plan)?;
			report_sync(&report);
			if !report.written {
				info(&format!("Plan {} is up to date", plan));
			}
		}
		Action::History { limit } => {
			planner.sync(&plan)?;
			let mut records = planner.history(&plan)?;
			if records.is_empty() {
				info("No history yet");
				return Ok(());
			}
			if let Some(n) = limit {
				records.truncate(n);
			}
			print!("{}", view::render_history(&records));
		}
		Action::Meal { cmd } => meal_command(Catalog::new(&store, plan), cmd)?,
		Action::Share => share(&plan, &config)?,
		Action::Id => println!("{}", plan),
		Action::New => {
			let fresh = PlanId::generate();
			config::write_current_plan(&data_dir, &fresh)?;
			success(&format!("Started new plan {} (was {})", fresh, plan));
		}
	}
	Ok(())
}

fn meal_command(catalog: Catalog<'_, FileStore>, cmd: MealCmd) -> Result<()> {
	match cmd {
		MealCmd::Add { name, categories, memo } => {
			let meal = catalog.add(MealDraft { name: name.join(" "), categories, memo })?;
			success(&format!("Added {} ({})", meal.name, meal.id));
		}
		MealCmd::Edit { id, name, categories, memo } => {
			let current = catalog.get(&id)?;
			let draft = MealDraft {
				name: name.unwrap_or(current.name),
				categories: if categories.is_empty() { current.categories } else { categories },
				memo: memo.unwrap_or(current.memo),
			};
			let meal = catalog.update(&id, draft)?;
			success(&format!("Updated {}", meal.name));
		}
		MealCmd::Rm { id } => {
			catalog.remove(&id)?;
			success(&format!("Removed {}", id));
		}
		MealCmd::List => {
			let meals = catalog.list()?;
			if meals.is_empty() {
				info("No meals yet; add one with `mp meal add`");
			} else {
				print!("{}", view::render_meals(&meals));
			}
		}
		MealCmd::Suggest { category } => {
			print!("{}", view::render_suggestions(&catalog.suggestions()?, category));
		}
	}
	Ok(())
}

fn print_plan(plan: &PlanId, report: &SyncReport, today: DateKey) {
	println!("{}", format!("Plan {}", plan).bold());
	print!("{}", view::render_window(&report.window, today));
}

fn report_sync(report: &SyncReport) {
	if report.upgraded {
		info("Converted plan to the date-keyed layout");
	}
	if report.rolled_forward() {
		let n = report.archived.len() + report.already_archived.len();
		info(&format!("Dates moved forward; {} past day(s) saved to history", n));
	}
	if !report.dropped.is_empty() {
		let days = report.dropped.iter().map(|d| d.to_string()).collect::<Vec<_>>().join(", ");
		warning(&format!("Discarded days beyond the plan: {}", days));
	}
}

fn share(plan: &PlanId, config: &Config) -> Result<()> {
	let text = config.share_link(plan).unwrap_or_else(|| plan.to_string());
	println!("{}", text);
	let tools: [(&str, &[&str]); 3] = [("wl-copy", &[]), ("xclip", &["-selection", "clipboard"]), ("pbcopy", &[])];
	for (tool, args) in tools {
		if which::which(tool).is_err() {
			continue;
		}
		let mut child = Command::new(tool).args(args).stdin(Stdio::piped()).spawn().with_context(|| format!("run {}", tool))?;
		if let Some(stdin) = child.stdin.as_mut() {
			stdin.write_all(text.as_bytes()).with_context(|| format!("write to {}", tool))?;
		}
		let status = child.wait().with_context(|| format!("wait for {}", tool))?;
		if status.success() {
			success("Copied to clipboard");
		} else {
			tracing::warn!(tool, %status, "clipboard tool failed");
		}
		return Ok(());
	}
	Ok(())
}

fn confirm(question: &str) -> Result<bool> {
	print!("{} [y/N] ", question);
	std::io::stdout().flush().context("flush stdout")?;
	let mut answer = String::new();
	std::io::stdin().read_line(&mut answer).context("read answer")?;
	match answer.trim().to_lowercase().as_str() {
		"y" | "yes" => Ok(true),
		"" | "n" | "no" => Ok(false),
		other => bail!("unrecognized answer: {}", other),
	}
}

fn success(msg: &str) {
	println!("{}", msg.green());
}

fn info(msg: &str) {
	println!("{}", msg.blue());
}

fn warning(msg: &str) {
	println!("{}", msg.yellow());
}

//! Plain-text rendering of plans, history and the catalog.

use std::fmt::Write;

use crate::catalog::{Meal, Suggestions};
use crate::plan::{ArchiveRecord, DateKey, DaySlots, MealCategory, PlanWindow};

const EMPTY_SLOT: &str = "-";

pub fn day_label(date: DateKey, today: DateKey) -> String {
	let mut label = format!("{} {}", date.date().format("%a"), date);
	if date == today {
		label.push_str(" (today)");
	}
	label
}

fn slot(text: &str) -> &str {
	if text.is_empty() { EMPTY_SLOT } else { text }
}

fn write_slots(out: &mut String, slots: &DaySlots, indent: &str) {
	for cat in MealCategory::ALL {
		let _ = writeln!(out, "{}{:<9} {}", indent, cat.as_str(), slot(slots.get(cat)));
	}
}

pub fn render_window(window: &PlanWindow, today: DateKey) -> String {
	let mut out = String::new();
	for (i, (date, slots)) in window.iter().enumerate() {
		if i > 0 {
			out.push('\n');
		}
		let _ = writeln!(out, "# {}", day_label(date, today));
		write_slots(&mut out, slots, "  ");
	}
	out
}

pub fn render_history(records: &[ArchiveRecord]) -> String {
	let mut out = String::new();
	for rec in records {
		let _ = writeln!(out, "{} {}", rec.date.date().format("%a"), rec.date);
		write_slots(&mut out, &rec.meals, "  ");
	}
	out
}

pub fn render_meals(meals: &[Meal]) -> String {
	let mut out = String::new();
	for meal in meals {
		let cats = meal.categories.iter().map(|c| c.as_str()).collect::<Vec<_>>().join(",");
		let _ = writeln!(out, "{}  {} [{}]", meal.id, meal.name, cats);
		if !meal.memo.is_empty() {
			let _ = writeln!(out, "     ↳ {}", meal.memo);
		}
	}
	out
}

pub fn render_suggestions(s: &Suggestions, only: Option<MealCategory>) -> String {
	let mut out = String::new();
	for cat in MealCategory::ALL {
		if only.is_some_and(|o| o != cat) {
			continue;
		}
		let names = s.get(cat);
		let list = if names.is_empty() { EMPTY_SLOT.to_string() } else { names.join(", ") };
		let _ = writeln!(out, "{:<9} {}", cat.as_str(), list);
	}
	out
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::plan::key;

	#[test]
	fn window_marks_today_and_empty_slots() {
		let mut w = PlanWindow::empty(key("2024-06-10"));
		w.get_mut(key("2024-06-11")).unwrap().set(MealCategory::Lunch, "soup");
		let text = render_window(&w, key("2024-06-10"));
		assert!(text.starts_with("# Mon 2024-06-10 (today)\n  breakfast -\n"));
		assert!(text.contains("# Tue 2024-06-11\n  breakfast -\n  lunch     soup\n"));
		assert_eq!(text.matches("# ").count(), 3);
	}

	#[test]
	fn history_lists_each_day() {
		let rec = ArchiveRecord {
			plan_id: "abc".parse().unwrap(),
			date: key("2024-06-09"),
			meals: DaySlots { dinner: "rice".into(), ..Default::default() },
		};
		assert_eq!(render_history(&[rec]), "Sun 2024-06-09\n  breakfast -\n  lunch     -\n  dinner    rice\n");
	}
}

//! Reusable meal catalog, owned by a plan id, and the per-category name
//! suggestions offered when filling in slots.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::plan::{MealCategory, PlanId};
use crate::store::{MealStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
	#[error("meal name must not be empty")]
	EmptyName,
	#[error("pick at least one of breakfast, lunch or dinner")]
	NoCategory,
	#[error("no meal with id {0}")]
	UnknownMeal(String),
	#[error(transparent)]
	Store(StoreError),
}

impl From<StoreError> for CatalogError {
	fn from(err: StoreError) -> Self {
		match err {
			StoreError::NotFound(id) | StoreError::InvalidId(id) => CatalogError::UnknownMeal(id),
			other => CatalogError::Store(other),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "MealRecord")]
pub struct Meal {
	pub id: String,
	pub plan_id: PlanId,
	pub name: String,
	pub categories: Vec<MealCategory>,
	pub memo: String,
	pub created_at: Option<DateTime<Utc>>,
	pub updated_at: Option<DateTime<Utc>>,
}

/// On-disk form; older entries carry a single `category` and `userId`.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MealRecord {
	id: String,
	#[serde(alias = "userId")]
	plan_id: PlanId,
	name: String,
	#[serde(default)]
	categories: Option<Vec<String>>,
	#[serde(default)]
	category: Option<String>,
	#[serde(default)]
	memo: Option<String>,
	#[serde(default)]
	created_at: Option<DateTime<Utc>>,
	#[serde(default)]
	updated_at: Option<DateTime<Utc>>,
}

impl From<MealRecord> for Meal {
	fn from(r: MealRecord) -> Self {
		let raw = r.categories.unwrap_or_else(|| r.category.into_iter().collect());
		// unknown labels are ignored rather than failing the whole entry
		let categories = normalize_categories(raw.iter().filter_map(|c| c.parse().ok()));
		Meal {
			id: r.id,
			plan_id: r.plan_id,
			name: r.name,
			categories,
			memo: r.memo.unwrap_or_default(),
			created_at: r.created_at,
			updated_at: r.updated_at,
		}
	}
}

fn normalize_categories(it: impl IntoIterator<Item = MealCategory>) -> Vec<MealCategory> {
	it.into_iter().collect::<BTreeSet<_>>().into_iter().collect()
}

/// Distinct catalog names per category, sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Suggestions(BTreeMap<MealCategory, Vec<String>>);

impl Suggestions {
	pub fn get(&self, category: MealCategory) -> &[String] {
		self.0.get(&category).map(Vec::as_slice).unwrap_or(&[])
	}
}

/// Validated input for adding or editing a meal.
#[derive(Debug, Clone, Default)]
pub struct MealDraft {
	pub name: String,
	pub categories: Vec<MealCategory>,
	pub memo: String,
}

impl MealDraft {
	fn validate(self) -> Result<MealDraft, CatalogError> {
		let name = self.name.trim().to_string();
		if name.is_empty() {
			return Err(CatalogError::EmptyName);
		}
		let categories = normalize_categories(self.categories);
		if categories.is_empty() {
			return Err(CatalogError::NoCategory);
		}
		Ok(MealDraft { name, categories, memo: self.memo.trim().to_string() })
	}
}

pub struct Catalog<'a, S: MealStore> {
	store: &'a S,
	plan: PlanId,
}

impl<'a, S: MealStore> Catalog<'a, S> {
	pub fn new(store: &'a S, plan: PlanId) -> Self {
		Self { store, plan }
	}

	pub fn add(&self, draft: MealDraft) -> Result<Meal, CatalogError> {
		let draft = draft.validate()?;
		let now = Utc::now();
		let meal = Meal {
			id: uuid::Uuid::new_v4().to_string(),
			plan_id: self.plan.clone(),
			name: draft.name,
			categories: draft.categories,
			memo: draft.memo,
			created_at: Some(now),
			updated_at: Some(now),
		};
		self.store.put(&meal)?;
		tracing::info!(plan = %self.plan, id = %meal.id, "meal added");
		Ok(meal)
	}

	pub fn update(&self, id: &str, draft: MealDraft) -> Result<Meal, CatalogError> {
		let draft = draft.validate()?;
		let mut meal = self.get(id)?;
		meal.name = draft.name;
		meal.categories = draft.categories;
		meal.memo = draft.memo;
		meal.updated_at = Some(Utc::now());
		self.store.put(&meal)?;
		tracing::info!(plan = %self.plan, id, "meal updated");
		Ok(meal)
	}

	/// A meal of this plan; other plans' meals are reported as unknown.
	pub fn get(&self, id: &str) -> Result<Meal, CatalogError> {
		let meal = self.store.get(id).map_err(|err| match err {
			StoreError::NotFound(_) | StoreError::InvalidId(_) => CatalogError::UnknownMeal(id.to_string()),
			other => CatalogError::Store(other),
		})?;
		if meal.plan_id != self.plan {
			return Err(CatalogError::UnknownMeal(id.to_string()));
		}
		Ok(meal)
	}

	pub fn remove(&self, id: &str) -> Result<(), CatalogError> {
		self.get(id)?;
		self.store.remove(id)?;
		tracing::info!(plan = %self.plan, id, "meal removed");
		Ok(())
	}

	pub fn list(&self) -> Result<Vec<Meal>, CatalogError> {
		let mut meals = self.store.list(&self.plan)?;
		meals.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
		Ok(meals)
	}

	pub fn suggestions(&self) -> Result<Suggestions, CatalogError> {
		let mut by_cat: BTreeMap<MealCategory, BTreeSet<String>> = BTreeMap::new();
		for meal in self.store.list(&self.plan)? {
			for cat in &meal.categories {
				by_cat.entry(*cat).or_default().insert(meal.name.clone());
			}
		}
		Ok(Suggestions(by_cat.into_iter().map(|(k, v)| (k, v.into_iter().collect())).collect()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::store::memory::MemoryStore;
	use crate::store::FileStore;

	fn plan(s: &str) -> PlanId {
		s.parse().unwrap()
	}

	fn draft(name: &str, cats: &[MealCategory]) -> MealDraft {
		MealDraft { name: name.into(), categories: cats.to_vec(), memo: String::new() }
	}

	#[test]
	fn add_requires_name_and_category() {
		let store = MemoryStore::default();
		let cat = Catalog::new(&store, plan("abc"));
		assert!(matches!(cat.add(draft("  ", &[MealCategory::Lunch])), Err(CatalogError::EmptyName)));
		assert!(matches!(cat.add(draft("curry", &[])), Err(CatalogError::NoCategory)));
		assert!(store.meals.borrow().is_empty());
	}

	#[test]
	fn add_update_remove() {
		let store = MemoryStore::default();
		let cat = Catalog::new(&store, plan("abc"));
		let meal = cat.add(draft(" curry ", &[MealCategory::Dinner, MealCategory::Lunch, MealCategory::Dinner])).unwrap();
		assert_eq!(meal.name, "curry");
		assert_eq!(meal.categories, vec![MealCategory::Lunch, MealCategory::Dinner]);

		let updated = cat.update(&meal.id, MealDraft { name: "katsu curry".into(), categories: vec![MealCategory::Dinner], memo: " spicy ".into() }).unwrap();
		assert_eq!(updated.id, meal.id);
		assert_eq!(updated.created_at, meal.created_at);
		assert_eq!(updated.memo, "spicy");
		assert_eq!(cat.get(&meal.id).unwrap().name, "katsu curry");

		cat.remove(&meal.id).unwrap();
		assert!(matches!(cat.remove(&meal.id), Err(CatalogError::UnknownMeal(_))));
	}

	#[test]
	fn meals_of_other_plans_are_invisible() {
		let store = MemoryStore::default();
		let mine = Catalog::new(&store, plan("mine"));
		let theirs = Catalog::new(&store, plan("theirs"));
		let meal = theirs.add(draft("pho", &[MealCategory::Lunch])).unwrap();
		assert!(mine.list().unwrap().is_empty());
		assert!(matches!(mine.get(&meal.id), Err(CatalogError::UnknownMeal(_))));
		assert!(matches!(mine.remove(&meal.id), Err(CatalogError::UnknownMeal(_))));
		assert_eq!(theirs.list().unwrap().len(), 1);
	}

	#[test]
	fn suggestions_group_distinct_names() {
		let store = MemoryStore::default();
		let cat = Catalog::new(&store, plan("abc"));
		cat.add(draft("toast", &[MealCategory::Breakfast])).unwrap();
		cat.add(draft("onigiri", &[MealCategory::Breakfast, MealCategory::Lunch])).unwrap();
		cat.add(draft("onigiri", &[MealCategory::Lunch])).unwrap();
		let s = cat.suggestions().unwrap();
		assert_eq!(s.get(MealCategory::Breakfast), ["onigiri".to_string(), "toast".to_string()]);
		assert_eq!(s.get(MealCategory::Lunch), ["onigiri".to_string()]);
		assert!(s.get(MealCategory::Dinner).is_empty());
	}

	#[test]
	fn single_category_entries_still_load() {
		let dir = tempfile::tempdir().unwrap();
		let store = FileStore::open(dir.path()).unwrap();
		std::fs::write(
			dir.path().join("meals/m1.json"),
			r#"{"id":"m1","userId":"abc","name":"miso soup","category":"breakfast","memo":null}"#,
		)
		.unwrap();
		std::fs::write(
			dir.path().join("meals/m2.json"),
			r#"{"id":"m2","planId":"abc","name":"gyoza","categories":["dinner","snack"]}"#,
		)
		.unwrap();
		std::fs::write(
			dir.path().join("meals/m3.json"),
			r#"{"id":"m3","planId":"abc","name":"water","categories":[],"category":"lunch"}"#,
		)
		.unwrap();
		let cat = Catalog::new(&store, plan("abc"));
		let meals = cat.list().unwrap();
		assert_eq!(meals.iter().map(|m| m.name.as_str()).collect::<Vec<_>>(), vec!["gyoza", "miso soup", "water"]);
		assert!(meals[2].categories.is_empty());
		assert_eq!(meals[0].categories, vec![MealCategory::Dinner]);
		assert_eq!(meals[1].categories, vec![MealCategory::Breakfast]);
		assert_eq!(meals[1].memo, "");
		let s = cat.suggestions().unwrap();
		assert_eq!(s.get(MealCategory::Breakfast), ["miso soup".to_string()]);
		assert!(s.get(MealCategory::Lunch).is_empty());
	}

	#[test]
	fn path_like_meal_ids_are_unknown() {
		let dir = tempfile::tempdir().unwrap();
		let store = FileStore::open(dir.path()).unwrap();
		std::fs::write(dir.path().join("plans/abc.json"), "{}").unwrap();
		let cat = Catalog::new(&store, plan("abc"));
		assert!(matches!(cat.get("../plans/abc"), Err(CatalogError::UnknownMeal(_))));
		assert!(matches!(cat.remove("../plans/abc"), Err(CatalogError::UnknownMeal(_))));
		assert!(dir.path().join("plans/abc.json").exists());
	}

	#[test]
	fn meals_persist_through_file_store() {
		let dir = tempfile::tempdir().unwrap();
		let store = FileStore::open(dir.path()).unwrap();
		let cat = Catalog::new(&store, plan("abc"));
		let meal = cat.add(draft("tempura", &[MealCategory::Dinner])).unwrap();
		let reopened = FileStore::open(dir.path()).unwrap();
		assert_eq!(Catalog::new(&reopened, plan("abc")).get(&meal.id).unwrap(), meal);
	}
}

use std::path::Path;

use crate::costing::{self, OverheadShare, ProductCost, RecipeCost};
use crate::db::Database;
use crate::error::StoreResult;
use crate::models::{
    AnalysisGroup, ExportData, ImportSummary, Ingredient, LineKind, NewIngredient, NewProduct,
    NewRecipe, Product, Recipe, RecipeLine, Setting,
};
use crate::prefs::AppState;

/// Embedding facade over the store and the costing routines.
///
/// One value owns the database handle; callers on other threads should wrap
/// it themselves. The CLI talks to `Database` directly, this is for hosts
/// that want a single flat entry point.
pub struct BakeryService {
    db: Database,
}

impl BakeryService {
    pub fn new(db_path: &str) -> StoreResult<Self> {
        let db = Database::open(Path::new(db_path))?;
        Ok(Self { db })
    }

    pub fn new_in_memory() -> StoreResult<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self { db })
    }

    #[must_use]
    pub fn database(&self) -> &Database {
        &self.db
    }

    // --- Ingredients ---

    pub fn add_ingredient(&self, ingredient: &NewIngredient) -> StoreResult<Ingredient> {
        self.db.insert_ingredient(ingredient)
    }

    pub fn get_ingredient(&self, id: i64) -> StoreResult<Ingredient> {
        self.db.get_ingredient_by_id(id)
    }

    pub fn find_ingredient(&self, name: &str) -> StoreResult<Option<Ingredient>> {
        self.db.find_ingredient_by_name(name)
    }

    pub fn list_ingredients(&self, search: Option<&str>) -> StoreResult<Vec<Ingredient>> {
        self.db.list_ingredients(search)
    }

    pub fn set_ingredient_purchase(
        &self,
        id: i64,
        unit: &str,
        quantity_g: f64,
        price: f64,
    ) -> StoreResult<Ingredient> {
        self.db.set_ingredient_purchase(id, unit, quantity_g, price)
    }

    pub fn set_ingredient_yield(&self, id: i64, default_yield: f64) -> StoreResult<Ingredient> {
        self.db.set_ingredient_yield(id, default_yield)
    }

    pub fn set_ingredient_whole_unit(
        &self,
        id: i64,
        cost_by_whole_unit: bool,
        standard_weight_in_grams: Option<f64>,
    ) -> StoreResult<Ingredient> {
        self.db
            .set_ingredient_whole_unit(id, cost_by_whole_unit, standard_weight_in_grams)
    }

    pub fn delete_ingredient(&self, id: i64) -> StoreResult<bool> {
        self.db.delete_ingredient(id)
    }

    // --- Recipes ---

    pub fn create_recipe(&self, recipe: &NewRecipe) -> StoreResult<Recipe> {
        self.db.create_recipe(recipe)
    }

    pub fn get_recipe(&self, id: i64) -> StoreResult<Recipe> {
        self.db.get_recipe_by_id(id)
    }

    pub fn list_recipes(&self) -> StoreResult<Vec<Recipe>> {
        self.db.list_recipes()
    }

    pub fn add_recipe_line(&self, recipe_id: i64, line: RecipeLine) -> StoreResult<Recipe> {
        self.db.add_recipe_line(recipe_id, line)
    }

    pub fn remove_recipe_line(
        &self,
        recipe_id: i64,
        kind: LineKind,
        target_id: i64,
    ) -> StoreResult<bool> {
        self.db.remove_recipe_line(recipe_id, kind, target_id)
    }

    pub fn set_recipe_notes(&self, recipe_id: i64, notes: Option<&str>) -> StoreResult<()> {
        self.db.set_recipe_notes(recipe_id, notes)
    }

    pub fn delete_recipe(&self, id: i64) -> StoreResult<bool> {
        self.db.delete_recipe(id)
    }

    pub fn recipe_cost(&self, recipe_id: i64) -> StoreResult<RecipeCost> {
        costing::recipe_cost(&self.db, recipe_id)
    }

    // --- Products & groups ---

    pub fn add_product(&self, product: &NewProduct) -> StoreResult<Product> {
        self.db.insert_product(product)
    }

    pub fn list_products(&self) -> StoreResult<Vec<Product>> {
        self.db.list_products()
    }

    pub fn set_product(
        &self,
        id: i64,
        weight: Option<f64>,
        price: Option<f64>,
    ) -> StoreResult<Product> {
        self.db.set_product(id, weight, price)
    }

    pub fn delete_product(&self, id: i64) -> StoreResult<bool> {
        self.db.delete_product(id)
    }

    pub fn product_cost(&self, product_id: i64) -> StoreResult<ProductCost> {
        costing::product_cost(&self.db, product_id)
    }

    pub fn create_group(&self, name: &str, group_type: Option<&str>) -> StoreResult<AnalysisGroup> {
        self.db.create_analysis_group(name, group_type)
    }

    pub fn list_groups(&self) -> StoreResult<Vec<AnalysisGroup>> {
        self.db.list_analysis_groups()
    }

    pub fn add_group_product(&self, group_id: i64, product_id: i64) -> StoreResult<bool> {
        self.db.add_group_product(group_id, product_id)
    }

    pub fn remove_group_product(&self, group_id: i64, product_id: i64) -> StoreResult<bool> {
        self.db.remove_group_product(group_id, product_id)
    }

    pub fn delete_group(&self, id: i64) -> StoreResult<bool> {
        self.db.delete_analysis_group(id)
    }

    pub fn allocate_overhead(
        &self,
        group_id: i64,
        overhead: f64,
    ) -> StoreResult<Vec<OverheadShare>> {
        costing::allocate_overhead(&self.db, group_id, overhead)
    }

    // --- Settings & preferences ---

    pub fn get_setting(&self, key: &str) -> StoreResult<Option<String>> {
        self.db.get_setting(key)
    }

    pub fn set_setting(&self, key: &str, value: &str) -> StoreResult<()> {
        self.db.set_setting(key, value)
    }

    pub fn list_settings(&self) -> StoreResult<Vec<Setting>> {
        self.db.list_settings()
    }

    pub fn load_app_state(&self) -> StoreResult<AppState> {
        AppState::load(&self.db)
    }

    // --- Backup ---

    pub fn export_all(&self, app_version: &str) -> StoreResult<ExportData> {
        self.db.export_all(app_version)
    }

    pub fn import_all(&self, data: &ExportData) -> StoreResult<ImportSummary> {
        self.db.import_all(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_facade_round_trip() {
        let service = BakeryService::new_in_memory().unwrap();
        let flour = service
            .add_ingredient(&NewIngredient {
                name: "flour".to_string(),
                purchase_unit: "kg".to_string(),
                purchase_quantity: 1000.0,
                purchase_price: 30.0,
                default_yield: None,
                cost_by_whole_unit: None,
                standard_weight_in_grams: None,
            })
            .unwrap();
        let dough = service
            .create_recipe(&NewRecipe {
                name: "dough".to_string(),
                is_sub_recipe: false,
                notes: None,
            })
            .unwrap();
        service
            .add_recipe_line(
                dough.id,
                RecipeLine {
                    kind: LineKind::Ingredient,
                    id: flour.id,
                    quantity_in_grams: 500.0,
                },
            )
            .unwrap();

        let cost = service.recipe_cost(dough.id).unwrap();
        assert_eq!(cost.lines.len(), 1);
        assert!((cost.total_cost - 15.0).abs() < 1e-9);
    }
}

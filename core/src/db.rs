//! The versioned local store: open/upgrade engine and collection CRUD.
//!
//! On open, the persisted schema version stamp (`PRAGMA user_version`) is
//! compared against the registry in [`crate::schema`] and every missing
//! version is applied in ascending order (structural diff against the
//! previous snapshot, then the version's upgrade callback) inside a single
//! transaction. A fresh store is created directly at the latest snapshot
//! and never replays historical migrations.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use rusqlite::{Connection, OptionalExtension, Transaction, params};

use crate::error::{StoreError, StoreResult};
use crate::models::{
    AnalysisGroup, ExportData, ImportSummary, Ingredient, LineKind, NewIngredient, NewProduct,
    NewRecipe, Product, Recipe, RecipeLine, Setting, derive_cost_per_gram, validate_line_quantity,
    validate_purchase, validate_yield,
};
use crate::schema::{self, CollectionDecl, VersionDecl};

#[derive(Debug)]
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (and if necessary create or upgrade) the store at `path`.
    ///
    /// Returns only once the store is fully at the latest schema version;
    /// no reads or writes are possible before that because this `Database`
    /// value is the only handle to the collections.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let mut conn = Connection::open(path)?;
        migrate(&mut conn, schema::history())?;
        Ok(Database { conn })
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        let mut conn = Connection::open_in_memory()?;
        migrate(&mut conn, schema::history())?;
        Ok(Database { conn })
    }

    #[cfg(test)]
    pub(crate) fn open_in_memory_with(history: &[VersionDecl]) -> StoreResult<Self> {
        let mut conn = Connection::open_in_memory()?;
        migrate(&mut conn, history)?;
        Ok(Database { conn })
    }

    #[cfg(test)]
    pub(crate) fn open_with(path: &Path, history: &[VersionDecl]) -> StoreResult<Self> {
        let mut conn = Connection::open(path)?;
        migrate(&mut conn, history)?;
        Ok(Database { conn })
    }

    #[cfg(test)]
    pub(crate) fn upgrade_with(&mut self, history: &[VersionDecl]) -> StoreResult<()> {
        migrate(&mut self.conn, history)
    }

    #[cfg(test)]
    pub(crate) fn raw(&self) -> &Connection {
        &self.conn
    }

    /// The currently stamped schema version.
    pub fn schema_version(&self) -> StoreResult<i64> {
        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;
        Ok(version)
    }

    // --- Ingredients ---

    fn ingredient_from_row(row: &rusqlite::Row) -> rusqlite::Result<Ingredient> {
        Ok(Ingredient {
            id: row.get(0)?,
            name: row.get(1)?,
            purchase_unit: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
            purchase_quantity: row.get::<_, Option<f64>>(3)?.unwrap_or_default(),
            purchase_price: row.get::<_, Option<f64>>(4)?.unwrap_or_default(),
            cost_per_gram: row.get::<_, Option<f64>>(5)?.unwrap_or_default(),
            // Legacy stores can carry an explicit 0 here; anything
            // non-positive reads as full yield to keep costs finite.
            default_yield: match row.get::<_, Option<f64>>(6)? {
                Some(y) if y > 0.0 => y,
                _ => 100.0,
            },
            cost_by_whole_unit: row.get::<_, Option<i64>>(7)?.unwrap_or(0) != 0,
            standard_weight_in_grams: row.get(8)?,
        })
    }

    // Upgraded stores carry columns in historical order (and sometimes
    // extra unindexed leftovers), so every query names its columns.
    const INGREDIENT_COLS: &'static str = "id, name, purchase_unit, purchase_quantity, \
         purchase_price, cost_per_gram, default_yield, cost_by_whole_unit, \
         standard_weight_in_grams";

    pub fn insert_ingredient(&self, ingredient: &NewIngredient) -> StoreResult<Ingredient> {
        validate_purchase(ingredient.purchase_quantity, ingredient.purchase_price)?;
        let default_yield = ingredient.default_yield.unwrap_or(100.0);
        validate_yield(default_yield)?;
        if self.find_ingredient_by_name(&ingredient.name)?.is_some() {
            return Err(StoreError::constraint(format!(
                "ingredient '{}' already exists",
                ingredient.name
            )));
        }
        let cost_per_gram =
            derive_cost_per_gram(ingredient.purchase_quantity, ingredient.purchase_price);
        self.conn.execute(
            "INSERT INTO ingredients (name, purchase_unit, purchase_quantity, purchase_price, \
             cost_per_gram, default_yield, cost_by_whole_unit, standard_weight_in_grams) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                ingredient.name,
                ingredient.purchase_unit,
                ingredient.purchase_quantity,
                ingredient.purchase_price,
                cost_per_gram,
                default_yield,
                i64::from(ingredient.cost_by_whole_unit.unwrap_or(false)),
                ingredient.standard_weight_in_grams,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_ingredient_by_id(id)
    }

    pub fn get_ingredient_by_id(&self, id: i64) -> StoreResult<Ingredient> {
        let sql = format!(
            "SELECT {} FROM ingredients WHERE id = ?1",
            Self::INGREDIENT_COLS
        );
        self.conn
            .query_row(&sql, params![id], Self::ingredient_from_row)
            .optional()?
            .ok_or_else(|| StoreError::not_found("ingredient", id.to_string()))
    }

    pub fn find_ingredient_by_name(&self, name: &str) -> StoreResult<Option<Ingredient>> {
        let sql = format!(
            "SELECT {} FROM ingredients WHERE name = ?1",
            Self::INGREDIENT_COLS
        );
        Ok(self
            .conn
            .query_row(&sql, params![name], Self::ingredient_from_row)
            .optional()?)
    }

    pub fn get_ingredient_by_name(&self, name: &str) -> StoreResult<Ingredient> {
        self.find_ingredient_by_name(name)?
            .ok_or_else(|| StoreError::not_found("ingredient", name))
    }

    pub fn list_ingredients(&self, search: Option<&str>) -> StoreResult<Vec<Ingredient>> {
        if let Some(query) = search {
            let pattern = format!("%{}%", escape_like(query));
            let sql = format!(
                "SELECT {} FROM ingredients WHERE name LIKE ?1 ESCAPE '\\' ORDER BY name",
                Self::INGREDIENT_COLS
            );
            let mut stmt = self.conn.prepare(&sql)?;
            let rows = stmt.query_map(params![pattern], Self::ingredient_from_row)?;
            return Ok(rows.collect::<Result<Vec<_>, _>>()?);
        }
        let sql = format!(
            "SELECT {} FROM ingredients ORDER BY name",
            Self::INGREDIENT_COLS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], Self::ingredient_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Update an ingredient's purchase info and re-derive `cost_per_gram`.
    pub fn set_ingredient_purchase(
        &self,
        id: i64,
        unit: &str,
        quantity_g: f64,
        price: f64,
    ) -> StoreResult<Ingredient> {
        validate_purchase(quantity_g, price)?;
        let cost_per_gram = derive_cost_per_gram(quantity_g, price);
        let updated = self.conn.execute(
            "UPDATE ingredients SET purchase_unit = ?1, purchase_quantity = ?2, \
             purchase_price = ?3, cost_per_gram = ?4 WHERE id = ?5",
            params![unit, quantity_g, price, cost_per_gram, id],
        )?;
        if updated == 0 {
            return Err(StoreError::not_found("ingredient", id.to_string()));
        }
        self.get_ingredient_by_id(id)
    }

    pub fn set_ingredient_yield(&self, id: i64, default_yield: f64) -> StoreResult<Ingredient> {
        validate_yield(default_yield)?;
        let updated = self.conn.execute(
            "UPDATE ingredients SET default_yield = ?1 WHERE id = ?2",
            params![default_yield, id],
        )?;
        if updated == 0 {
            return Err(StoreError::not_found("ingredient", id.to_string()));
        }
        self.get_ingredient_by_id(id)
    }

    pub fn set_ingredient_whole_unit(
        &self,
        id: i64,
        cost_by_whole_unit: bool,
        standard_weight_in_grams: Option<f64>,
    ) -> StoreResult<Ingredient> {
        if cost_by_whole_unit {
            match standard_weight_in_grams {
                Some(w) if w > 0.0 => {}
                _ => {
                    return Err(StoreError::constraint(
                        "whole-unit costing requires a positive standard weight in grams",
                    ));
                }
            }
        }
        let updated = self.conn.execute(
            "UPDATE ingredients SET cost_by_whole_unit = ?1, standard_weight_in_grams = ?2 \
             WHERE id = ?3",
            params![i64::from(cost_by_whole_unit), standard_weight_in_grams, id],
        )?;
        if updated == 0 {
            return Err(StoreError::not_found("ingredient", id.to_string()));
        }
        self.get_ingredient_by_id(id)
    }

    pub fn delete_ingredient(&self, id: i64) -> StoreResult<bool> {
        if let Some(recipe) = self.line_reference_user(LineKind::Ingredient, id)? {
            return Err(StoreError::constraint(format!(
                "ingredient is used by recipe '{recipe}'"
            )));
        }
        let deleted = self
            .conn
            .execute("DELETE FROM ingredients WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }

    // --- Recipes ---

    fn recipe_from_row(row: &rusqlite::Row) -> rusqlite::Result<(Recipe, Option<String>)> {
        let raw_lines: Option<String> = row.get(3)?;
        let recipe = Recipe {
            id: row.get(0)?,
            name: row.get(1)?,
            is_sub_recipe: row.get::<_, Option<i64>>(2)?.unwrap_or(0) != 0,
            lines: Vec::new(),
            notes: row.get(4)?,
        };
        Ok((recipe, raw_lines))
    }

    const RECIPE_COLS: &'static str = "id, name, is_sub_recipe, ingredients_list, notes";

    fn decode_recipe((mut recipe, raw_lines): (Recipe, Option<String>)) -> StoreResult<Recipe> {
        if let Some(raw) = raw_lines {
            recipe.lines = serde_json::from_str(&raw)?;
        }
        Ok(recipe)
    }

    pub fn create_recipe(&self, recipe: &NewRecipe) -> StoreResult<Recipe> {
        if self.find_recipe_by_name(&recipe.name)?.is_some() {
            return Err(StoreError::constraint(format!(
                "recipe '{}' already exists",
                recipe.name
            )));
        }
        self.conn.execute(
            "INSERT INTO recipes (name, is_sub_recipe, ingredients_list, notes) \
             VALUES (?1, ?2, '[]', ?3)",
            params![recipe.name, i64::from(recipe.is_sub_recipe), recipe.notes],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_recipe_by_id(id)
    }

    pub fn get_recipe_by_id(&self, id: i64) -> StoreResult<Recipe> {
        let sql = format!("SELECT {} FROM recipes WHERE id = ?1", Self::RECIPE_COLS);
        let row = self
            .conn
            .query_row(&sql, params![id], Self::recipe_from_row)
            .optional()?
            .ok_or_else(|| StoreError::not_found("recipe", id.to_string()))?;
        Self::decode_recipe(row)
    }

    pub fn find_recipe_by_name(&self, name: &str) -> StoreResult<Option<Recipe>> {
        let sql = format!("SELECT {} FROM recipes WHERE name = ?1", Self::RECIPE_COLS);
        let row = self
            .conn
            .query_row(&sql, params![name], Self::recipe_from_row)
            .optional()?;
        row.map(Self::decode_recipe).transpose()
    }

    pub fn get_recipe_by_name(&self, name: &str) -> StoreResult<Recipe> {
        self.find_recipe_by_name(name)?
            .ok_or_else(|| StoreError::not_found("recipe", name))
    }

    pub fn list_recipes(&self) -> StoreResult<Vec<Recipe>> {
        let sql = format!("SELECT {} FROM recipes ORDER BY name", Self::RECIPE_COLS);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], Self::recipe_from_row)?;
        rows.map(|row| Self::decode_recipe(row?))
            .collect::<StoreResult<Vec<_>>>()
    }

    /// Append a line to a recipe's ingredient list.
    ///
    /// Sub-recipe lines must reference a recipe flagged `is_sub_recipe` and
    /// must not create a reference cycle.
    pub fn add_recipe_line(&self, recipe_id: i64, line: RecipeLine) -> StoreResult<Recipe> {
        validate_line_quantity(line.quantity_in_grams)?;
        let mut recipe = self.get_recipe_by_id(recipe_id)?;
        match line.kind {
            LineKind::Ingredient => {
                self.get_ingredient_by_id(line.id)?;
            }
            LineKind::Recipe => {
                let target = self.get_recipe_by_id(line.id)?;
                if !target.is_sub_recipe {
                    return Err(StoreError::constraint(format!(
                        "recipe '{}' is not flagged as a sub-recipe",
                        target.name
                    )));
                }
                if line.id == recipe_id || self.reaches_recipe(line.id, recipe_id)? {
                    return Err(StoreError::constraint(format!(
                        "adding '{}' would create a recipe cycle",
                        target.name
                    )));
                }
            }
        }
        recipe.lines.push(line);
        self.write_recipe_lines(recipe_id, &recipe.lines)?;
        Ok(recipe)
    }

    /// Remove the line referencing (`kind`, `target_id`). Returns whether a
    /// line was removed.
    pub fn remove_recipe_line(
        &self,
        recipe_id: i64,
        kind: LineKind,
        target_id: i64,
    ) -> StoreResult<bool> {
        let mut recipe = self.get_recipe_by_id(recipe_id)?;
        let before = recipe.lines.len();
        recipe
            .lines
            .retain(|l| !(l.kind == kind && l.id == target_id));
        if recipe.lines.len() == before {
            return Ok(false);
        }
        self.write_recipe_lines(recipe_id, &recipe.lines)?;
        Ok(true)
    }

    pub fn set_recipe_notes(&self, recipe_id: i64, notes: Option<&str>) -> StoreResult<()> {
        let updated = self.conn.execute(
            "UPDATE recipes SET notes = ?1 WHERE id = ?2",
            params![notes, recipe_id],
        )?;
        if updated == 0 {
            return Err(StoreError::not_found("recipe", recipe_id.to_string()));
        }
        Ok(())
    }

    pub fn delete_recipe(&self, id: i64) -> StoreResult<bool> {
        if let Some(user) = self.line_reference_user(LineKind::Recipe, id)? {
            return Err(StoreError::constraint(format!(
                "recipe is used as a sub-recipe by '{user}'"
            )));
        }
        let product: Option<String> = self
            .conn
            .query_row(
                "SELECT name FROM products WHERE recipe_id = ?1 LIMIT 1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(product) = product {
            return Err(StoreError::constraint(format!(
                "recipe is used by product '{product}'"
            )));
        }
        let deleted = self
            .conn
            .execute("DELETE FROM recipes WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }

    fn write_recipe_lines(&self, recipe_id: i64, lines: &[RecipeLine]) -> StoreResult<()> {
        self.conn.execute(
            "UPDATE recipes SET ingredients_list = ?1 WHERE id = ?2",
            params![serde_json::to_string(lines)?, recipe_id],
        )?;
        Ok(())
    }

    /// Whether the sub-recipe graph starting at `from` reaches `target`.
    fn reaches_recipe(&self, from: i64, target: i64) -> StoreResult<bool> {
        let mut seen = HashSet::new();
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            if id == target {
                return Ok(true);
            }
            if !seen.insert(id) {
                continue;
            }
            let recipe = self.get_recipe_by_id(id)?;
            for line in &recipe.lines {
                if line.kind == LineKind::Recipe {
                    stack.push(line.id);
                }
            }
        }
        Ok(false)
    }

    /// Find a recipe whose line list references (`kind`, `target_id`).
    fn line_reference_user(&self, kind: LineKind, target_id: i64) -> StoreResult<Option<String>> {
        for recipe in self.list_recipes()? {
            if recipe
                .lines
                .iter()
                .any(|l| l.kind == kind && l.id == target_id)
            {
                return Ok(Some(recipe.name));
            }
        }
        Ok(None)
    }

    // --- Settings ---

    pub fn set_setting(&self, key: &str, value: &str) -> StoreResult<()> {
        self.conn.execute(
            "INSERT INTO settings (key, value) VALUES (?1, ?2) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn get_setting(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self
            .conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?)
    }

    pub fn delete_setting(&self, key: &str) -> StoreResult<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM settings WHERE key = ?1", params![key])?;
        Ok(deleted > 0)
    }

    pub fn list_settings(&self) -> StoreResult<Vec<Setting>> {
        let mut stmt = self
            .conn
            .prepare("SELECT key, value FROM settings ORDER BY key")?;
        let rows = stmt.query_map([], |row| {
            Ok(Setting {
                key: row.get(0)?,
                value: row.get(1)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    // --- Products ---

    fn product_from_row(row: &rusqlite::Row) -> rusqlite::Result<Product> {
        Ok(Product {
            id: row.get(0)?,
            name: row.get(1)?,
            recipe_id: row.get::<_, Option<i64>>(2)?.unwrap_or_default(),
            weight: row.get::<_, Option<f64>>(3)?.unwrap_or_default(),
            price: row.get::<_, Option<f64>>(4)?.unwrap_or_default(),
        })
    }

    const PRODUCT_COLS: &'static str = "id, name, recipe_id, weight, price";

    pub fn insert_product(&self, product: &NewProduct) -> StoreResult<Product> {
        if product.weight <= 0.0 {
            return Err(StoreError::constraint(
                "product weight must be greater than 0",
            ));
        }
        if product.price < 0.0 {
            return Err(StoreError::constraint("product price must not be negative"));
        }
        self.get_recipe_by_id(product.recipe_id)?;
        if self.find_product_by_name(&product.name)?.is_some() {
            return Err(StoreError::constraint(format!(
                "product '{}' already exists",
                product.name
            )));
        }
        self.conn.execute(
            "INSERT INTO products (name, recipe_id, weight, price) VALUES (?1, ?2, ?3, ?4)",
            params![product.name, product.recipe_id, product.weight, product.price],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_product_by_id(id)
    }

    pub fn get_product_by_id(&self, id: i64) -> StoreResult<Product> {
        let sql = format!("SELECT {} FROM products WHERE id = ?1", Self::PRODUCT_COLS);
        self.conn
            .query_row(&sql, params![id], Self::product_from_row)
            .optional()?
            .ok_or_else(|| StoreError::not_found("product", id.to_string()))
    }

    pub fn find_product_by_name(&self, name: &str) -> StoreResult<Option<Product>> {
        let sql = format!("SELECT {} FROM products WHERE name = ?1", Self::PRODUCT_COLS);
        Ok(self
            .conn
            .query_row(&sql, params![name], Self::product_from_row)
            .optional()?)
    }

    pub fn get_product_by_name(&self, name: &str) -> StoreResult<Product> {
        self.find_product_by_name(name)?
            .ok_or_else(|| StoreError::not_found("product", name))
    }

    pub fn list_products(&self) -> StoreResult<Vec<Product>> {
        let sql = format!("SELECT {} FROM products ORDER BY name", Self::PRODUCT_COLS);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], Self::product_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn set_product(
        &self,
        id: i64,
        weight: Option<f64>,
        price: Option<f64>,
    ) -> StoreResult<Product> {
        let current = self.get_product_by_id(id)?;
        let weight = weight.unwrap_or(current.weight);
        let price = price.unwrap_or(current.price);
        if weight <= 0.0 {
            return Err(StoreError::constraint(
                "product weight must be greater than 0",
            ));
        }
        if price < 0.0 {
            return Err(StoreError::constraint("product price must not be negative"));
        }
        self.conn.execute(
            "UPDATE products SET weight = ?1, price = ?2 WHERE id = ?3",
            params![weight, price, id],
        )?;
        self.get_product_by_id(id)
    }

    pub fn delete_product(&self, id: i64) -> StoreResult<bool> {
        for group in self.list_analysis_groups()? {
            if group.products.contains(&id) {
                return Err(StoreError::constraint(format!(
                    "product is referenced by analysis group '{}'",
                    group.name
                )));
            }
        }
        let deleted = self
            .conn
            .execute("DELETE FROM products WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }

    // --- Analysis groups ---

    fn group_from_row(row: &rusqlite::Row) -> rusqlite::Result<(AnalysisGroup, Option<String>)> {
        let raw_products: Option<String> = row.get(3)?;
        let group = AnalysisGroup {
            id: row.get(0)?,
            name: row.get(1)?,
            group_type: row
                .get::<_, Option<String>>(2)?
                .unwrap_or_else(|| "general".to_string()),
            products: Vec::new(),
        };
        Ok((group, raw_products))
    }

    const GROUP_COLS: &'static str = "id, name, group_type, products";

    fn decode_group(
        (mut group, raw_products): (AnalysisGroup, Option<String>),
    ) -> StoreResult<AnalysisGroup> {
        if let Some(raw) = raw_products {
            group.products = serde_json::from_str(&raw)?;
        }
        Ok(group)
    }

    pub fn create_analysis_group(
        &self,
        name: &str,
        group_type: Option<&str>,
    ) -> StoreResult<AnalysisGroup> {
        if self.find_analysis_group_by_name(name)?.is_some() {
            return Err(StoreError::constraint(format!(
                "analysis group '{name}' already exists"
            )));
        }
        self.conn.execute(
            "INSERT INTO analysis_groups (name, group_type, products) VALUES (?1, ?2, '[]')",
            params![name, group_type.unwrap_or("general")],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_analysis_group_by_id(id)
    }

    pub fn get_analysis_group_by_id(&self, id: i64) -> StoreResult<AnalysisGroup> {
        let sql = format!(
            "SELECT {} FROM analysis_groups WHERE id = ?1",
            Self::GROUP_COLS
        );
        let row = self
            .conn
            .query_row(&sql, params![id], Self::group_from_row)
            .optional()?
            .ok_or_else(|| StoreError::not_found("analysis group", id.to_string()))?;
        Self::decode_group(row)
    }

    pub fn find_analysis_group_by_name(&self, name: &str) -> StoreResult<Option<AnalysisGroup>> {
        let sql = format!(
            "SELECT {} FROM analysis_groups WHERE name = ?1",
            Self::GROUP_COLS
        );
        let row = self
            .conn
            .query_row(&sql, params![name], Self::group_from_row)
            .optional()?;
        row.map(Self::decode_group).transpose()
    }

    pub fn get_analysis_group_by_name(&self, name: &str) -> StoreResult<AnalysisGroup> {
        self.find_analysis_group_by_name(name)?
            .ok_or_else(|| StoreError::not_found("analysis group", name))
    }

    pub fn list_analysis_groups(&self) -> StoreResult<Vec<AnalysisGroup>> {
        let sql = format!(
            "SELECT {} FROM analysis_groups ORDER BY name",
            Self::GROUP_COLS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], Self::group_from_row)?;
        rows.map(|row| Self::decode_group(row?))
            .collect::<StoreResult<Vec<_>>>()
    }

    /// Add a product reference to a group. Returns false if it was already
    /// a member.
    pub fn add_group_product(&self, group_id: i64, product_id: i64) -> StoreResult<bool> {
        self.get_product_by_id(product_id)?;
        let mut group = self.get_analysis_group_by_id(group_id)?;
        if group.products.contains(&product_id) {
            return Ok(false);
        }
        group.products.push(product_id);
        self.write_group_products(group_id, &group.products)?;
        Ok(true)
    }

    pub fn remove_group_product(&self, group_id: i64, product_id: i64) -> StoreResult<bool> {
        let mut group = self.get_analysis_group_by_id(group_id)?;
        let before = group.products.len();
        group.products.retain(|&id| id != product_id);
        if group.products.len() == before {
            return Ok(false);
        }
        self.write_group_products(group_id, &group.products)?;
        Ok(true)
    }

    pub fn delete_analysis_group(&self, id: i64) -> StoreResult<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM analysis_groups WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }

    fn write_group_products(&self, group_id: i64, products: &[i64]) -> StoreResult<()> {
        self.conn.execute(
            "UPDATE analysis_groups SET products = ?1 WHERE id = ?2",
            params![serde_json::to_string(products)?, group_id],
        )?;
        Ok(())
    }

    // --- Backup ---

    pub fn export_all(&self, app_version: &str) -> StoreResult<ExportData> {
        Ok(ExportData {
            app_version: app_version.to_string(),
            schema_version: self.schema_version()?,
            exported_at: chrono::Local::now().to_rfc3339(),
            ingredients: self.list_ingredients(None)?,
            recipes: self.list_recipes()?,
            settings: self.list_settings()?,
            products: self.list_products()?,
            analysis_groups: self.list_analysis_groups()?,
        })
    }

    /// Merge a backup into this store, keyed by name. Generated ids are not
    /// stable across stores, so every cross-record reference is remapped
    /// through the name-matched records.
    pub fn import_all(&self, data: &ExportData) -> StoreResult<ImportSummary> {
        let mut summary = ImportSummary::default();

        let mut ingredient_ids: HashMap<i64, i64> = HashMap::new();
        for ing in &data.ingredients {
            if let Some(existing) = self.find_ingredient_by_name(&ing.name)? {
                self.conn.execute(
                    "UPDATE ingredients SET purchase_unit = ?1, purchase_quantity = ?2, \
                     purchase_price = ?3, cost_per_gram = ?4, default_yield = ?5, \
                     cost_by_whole_unit = ?6, standard_weight_in_grams = ?7 WHERE id = ?8",
                    params![
                        ing.purchase_unit,
                        ing.purchase_quantity,
                        ing.purchase_price,
                        ing.cost_per_gram,
                        ing.default_yield,
                        i64::from(ing.cost_by_whole_unit),
                        ing.standard_weight_in_grams,
                        existing.id,
                    ],
                )?;
                ingredient_ids.insert(ing.id, existing.id);
                summary.ingredients_updated += 1;
            } else {
                let created = self.insert_ingredient(&NewIngredient {
                    name: ing.name.clone(),
                    purchase_unit: ing.purchase_unit.clone(),
                    purchase_quantity: ing.purchase_quantity,
                    purchase_price: ing.purchase_price,
                    default_yield: Some(ing.default_yield),
                    cost_by_whole_unit: Some(ing.cost_by_whole_unit),
                    standard_weight_in_grams: ing.standard_weight_in_grams,
                })?;
                ingredient_ids.insert(ing.id, created.id);
                summary.ingredients_added += 1;
            }
        }

        // Recipes land in two passes: shells first so that sub-recipe
        // references can be remapped regardless of ordering in the backup.
        let mut recipe_ids: HashMap<i64, i64> = HashMap::new();
        for recipe in &data.recipes {
            if let Some(existing) = self.find_recipe_by_name(&recipe.name)? {
                recipe_ids.insert(recipe.id, existing.id);
                summary.recipes_updated += 1;
            } else {
                let created = self.create_recipe(&NewRecipe {
                    name: recipe.name.clone(),
                    is_sub_recipe: recipe.is_sub_recipe,
                    notes: recipe.notes.clone(),
                })?;
                recipe_ids.insert(recipe.id, created.id);
                summary.recipes_added += 1;
            }
        }
        for recipe in &data.recipes {
            let target = recipe_ids[&recipe.id];
            let lines = recipe
                .lines
                .iter()
                .map(|line| {
                    let mapped = match line.kind {
                        LineKind::Ingredient => ingredient_ids.get(&line.id),
                        LineKind::Recipe => recipe_ids.get(&line.id),
                    }
                    .ok_or_else(|| {
                        StoreError::Corrupt(format!(
                            "backup recipe '{}' references an unknown {} id {}",
                            recipe.name, line.kind, line.id
                        ))
                    })?;
                    Ok(RecipeLine {
                        kind: line.kind,
                        id: *mapped,
                        quantity_in_grams: line.quantity_in_grams,
                    })
                })
                .collect::<StoreResult<Vec<_>>>()?;
            self.conn.execute(
                "UPDATE recipes SET is_sub_recipe = ?1, notes = ?2 WHERE id = ?3",
                params![i64::from(recipe.is_sub_recipe), recipe.notes, target],
            )?;
            self.write_recipe_lines(target, &lines)?;
        }

        for setting in &data.settings {
            self.set_setting(&setting.key, &setting.value)?;
            summary.settings_written += 1;
        }

        let mut product_ids: HashMap<i64, i64> = HashMap::new();
        for product in &data.products {
            let recipe_id = *recipe_ids.get(&product.recipe_id).ok_or_else(|| {
                StoreError::Corrupt(format!(
                    "backup product '{}' references an unknown recipe id {}",
                    product.name, product.recipe_id
                ))
            })?;
            if let Some(existing) = self.find_product_by_name(&product.name)? {
                self.conn.execute(
                    "UPDATE products SET recipe_id = ?1, weight = ?2, price = ?3 WHERE id = ?4",
                    params![recipe_id, product.weight, product.price, existing.id],
                )?;
                product_ids.insert(product.id, existing.id);
                summary.products_updated += 1;
            } else {
                let created = self.insert_product(&NewProduct {
                    name: product.name.clone(),
                    recipe_id,
                    weight: product.weight,
                    price: product.price,
                })?;
                product_ids.insert(product.id, created.id);
                summary.products_added += 1;
            }
        }

        for group in &data.analysis_groups {
            let members = group
                .products
                .iter()
                .map(|id| {
                    product_ids.get(id).copied().ok_or_else(|| {
                        StoreError::Corrupt(format!(
                            "backup group '{}' references an unknown product id {id}",
                            group.name
                        ))
                    })
                })
                .collect::<StoreResult<Vec<_>>>()?;
            let target = if let Some(existing) = self.find_analysis_group_by_name(&group.name)? {
                self.conn.execute(
                    "UPDATE analysis_groups SET group_type = ?1 WHERE id = ?2",
                    params![group.group_type, existing.id],
                )?;
                summary.groups_updated += 1;
                existing.id
            } else {
                let created = self.create_analysis_group(&group.name, Some(&group.group_type))?;
                summary.groups_added += 1;
                created.id
            };
            self.write_group_products(target, &members)?;
        }

        Ok(summary)
    }
}

// --- Upgrade engine ---

/// Bring `conn` to the last version declared in `history`.
///
/// The structural steps, the upgrade callbacks and the version stamps all
/// run in one transaction: either every intervening version
/// commits or the store stays exactly where it was.
fn migrate(conn: &mut Connection, history: &[VersionDecl]) -> StoreResult<()> {
    let Some(latest) = history.last().map(|d| d.version) else {
        return Ok(());
    };
    let on_disk: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    if on_disk > latest {
        return Err(StoreError::VersionDowngrade { on_disk, latest });
    }
    if on_disk == latest {
        return Ok(());
    }

    let tx = conn.transaction()?;

    // A brand new store is created directly at the latest snapshot; the
    // historical upgrade callbacks only ever run against data that predates
    // them.
    if on_disk == 0 && store_is_empty(&tx)? {
        let decl = &history[history.len() - 1];
        for coll in decl.collections {
            create_collection(&tx, coll)?;
        }
        tx.pragma_update(None, "user_version", latest)?;
        tx.commit()?;
        return Ok(());
    }

    let mut prev = history.iter().rev().find(|d| d.version <= on_disk);
    for decl in history.iter().filter(|d| d.version > on_disk) {
        apply_structure(&tx, prev, decl)?;
        if let Some(upgrade) = decl.upgrade {
            upgrade(&tx).map_err(|e| StoreError::UpgradeTransform {
                version: decl.version,
                message: e.to_string(),
            })?;
        }
        tx.pragma_update(None, "user_version", decl.version)?;
        prev = Some(decl);
    }
    tx.commit()?;
    Ok(())
}

fn store_is_empty(tx: &Transaction<'_>) -> StoreResult<bool> {
    let tables: i64 = tx.query_row(
        "SELECT count(*) FROM sqlite_master WHERE type = 'table'",
        [],
        |row| row.get(0),
    )?;
    Ok(tables == 0)
}

/// Apply the structural difference between the previous snapshot and `decl`.
fn apply_structure(
    tx: &Transaction<'_>,
    prev: Option<&VersionDecl>,
    decl: &VersionDecl,
) -> StoreResult<()> {
    for coll in decl.collections {
        let old = prev.and_then(|p| p.collections.iter().find(|c| c.name == coll.name));
        match old {
            None => create_collection(tx, coll)?,
            Some(old) => {
                for field in coll.fields {
                    if !old.has_field(field.name) {
                        tx.execute_batch(&format!(
                            "ALTER TABLE {} ADD COLUMN {} {}",
                            coll.name,
                            field.name,
                            field.ty.sql()
                        ))?;
                        create_index(tx, coll.name, field.name)?;
                    }
                }
                for field in old.fields {
                    if !coll.has_field(field.name) {
                        // Index removed; the column and its data stay.
                        tx.execute_batch(&format!(
                            "DROP INDEX IF EXISTS {}",
                            index_name(coll.name, field.name)
                        ))?;
                    }
                }
            }
        }
    }
    if let Some(prev) = prev {
        for old in prev.collections {
            if !decl.collections.iter().any(|c| c.name == old.name) {
                // Tombstone: the collection and its data are gone for good.
                tx.execute_batch(&format!("DROP TABLE IF EXISTS {}", old.name))?;
            }
        }
    }
    Ok(())
}

fn create_collection(tx: &Transaction<'_>, coll: &CollectionDecl) -> StoreResult<()> {
    let mut sql = format!(
        "CREATE TABLE {} (id INTEGER PRIMARY KEY AUTOINCREMENT, {} {} NOT NULL",
        coll.name,
        coll.key.name,
        coll.key.ty.sql()
    );
    for field in coll.fields {
        sql.push_str(&format!(", {} {}", field.name, field.ty.sql()));
    }
    sql.push_str(");");
    tx.execute_batch(&sql)?;
    tx.execute_batch(&format!(
        "CREATE UNIQUE INDEX {} ON {} ({})",
        index_name(coll.name, coll.key.name),
        coll.name,
        coll.key.name
    ))?;
    for field in coll.fields {
        create_index(tx, coll.name, field.name)?;
    }
    Ok(())
}

fn create_index(tx: &Transaction<'_>, table: &str, field: &str) -> StoreResult<()> {
    tx.execute_batch(&format!(
        "CREATE INDEX {} ON {table} ({field})",
        index_name(table, field)
    ))?;
    Ok(())
}

fn index_name(table: &str, field: &str) -> String {
    format!("idx_{table}_{field}")
}

fn escape_like(query: &str) -> String {
    query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LineKind, NewIngredient, NewProduct, NewRecipe, RecipeLine};
    use crate::schema::{ColumnType, FieldDecl};

    fn flour() -> NewIngredient {
        NewIngredient {
            name: "flour".to_string(),
            purchase_unit: "kg".to_string(),
            purchase_quantity: 1000.0,
            purchase_price: 30.0,
            default_yield: None,
            cost_by_whole_unit: None,
            standard_weight_in_grams: None,
        }
    }

    /// Open an in-memory store migrated only through version `v`.
    fn db_at(v: i64) -> Database {
        Database::open_in_memory_with(&schema::history()[..v as usize]).unwrap()
    }

    fn raw_version(db: &Database) -> i64 {
        db.schema_version().unwrap()
    }

    // Synthetic two-version histories for engine-level tests.

    const ITEMS_V1: CollectionDecl = CollectionDecl {
        name: "items",
        key: FieldDecl {
            name: "name",
            ty: ColumnType::Text,
        },
        fields: &[FieldDecl {
            name: "value",
            ty: ColumnType::Real,
        }],
    };

    const ITEMS_V2: CollectionDecl = CollectionDecl {
        name: "items",
        key: FieldDecl {
            name: "name",
            ty: ColumnType::Text,
        },
        fields: &[
            FieldDecl {
                name: "value",
                ty: ColumnType::Real,
            },
            FieldDecl {
                name: "doubled",
                ty: ColumnType::Real,
            },
        ],
    };

    fn doubler_poison_fails(tx: &Transaction<'_>) -> StoreResult<()> {
        let rows: Vec<(i64, String, f64)> = {
            let mut stmt = tx.prepare("SELECT id, name, value FROM items ORDER BY id")?;
            let mapped = stmt.query_map([], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })?;
            mapped.collect::<Result<Vec<_>, _>>()?
        };
        for (id, name, value) in rows {
            if name == "poison" {
                return Err(StoreError::constraint("poison record"));
            }
            tx.execute(
                "UPDATE items SET doubled = ?1 WHERE id = ?2",
                params![value * 2.0, id],
            )?;
        }
        Ok(())
    }

    fn must_not_run(_tx: &Transaction<'_>) -> StoreResult<()> {
        Err(StoreError::constraint("callback ran on a fresh install"))
    }

    static DOUBLER_HISTORY: [VersionDecl; 2] = [
        VersionDecl {
            version: 1,
            collections: &[ITEMS_V1],
            upgrade: None,
        },
        VersionDecl {
            version: 2,
            collections: &[ITEMS_V2],
            upgrade: Some(doubler_poison_fails),
        },
    ];

    static GUARDED_HISTORY: [VersionDecl; 2] = [
        VersionDecl {
            version: 1,
            collections: &[ITEMS_V1],
            upgrade: None,
        },
        VersionDecl {
            version: 2,
            collections: &[ITEMS_V2],
            upgrade: Some(must_not_run),
        },
    ];

    // --- Open / upgrade engine ---

    #[test]
    fn test_fresh_install_skips_historical_callbacks() {
        // The v2 callback errors unconditionally; a fresh install must jump
        // straight to the latest snapshot without invoking it.
        let db = Database::open_in_memory_with(&GUARDED_HISTORY).unwrap();
        assert_eq!(raw_version(&db), 2);
        db.conn
            .execute("INSERT INTO items (name, value) VALUES ('a', 1.0)", [])
            .unwrap();
    }

    #[test]
    fn test_fresh_install_opens_at_latest() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(raw_version(&db), schema::LATEST_VERSION);
        let ing = db.insert_ingredient(&flour()).unwrap();
        assert_eq!(ing.default_yield, 100.0);
        assert!(!ing.cost_by_whole_unit);
        assert_eq!(ing.standard_weight_in_grams, None);
        assert!((ing.cost_per_gram - 0.03).abs() < 1e-12);
    }

    #[test]
    fn test_reopen_at_latest_runs_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crumb.db");
        {
            let db = Database::open(&path).unwrap();
            db.insert_ingredient(&flour()).unwrap();
        }
        let db = Database::open(&path).unwrap();
        assert_eq!(raw_version(&db), schema::LATEST_VERSION);
        assert_eq!(db.list_ingredients(None).unwrap().len(), 1);
    }

    #[test]
    fn test_upgrade_from_each_historical_version() {
        for v in 1..schema::LATEST_VERSION {
            let mut db = db_at(v);
            db.conn
                .execute(
                    "INSERT INTO ingredients (name, purchase_unit, purchase_quantity, purchase_price) \
                     VALUES ('flour', 'kg', 1000.0, 30.0)",
                    [],
                )
                .unwrap();
            if (9..=11).contains(&v) {
                db.conn
                    .execute("INSERT INTO analysis_groups (name) VALUES ('legacy')", [])
                    .unwrap();
            }
            db.upgrade_with(schema::history()).unwrap();
            assert_eq!(raw_version(&db), schema::LATEST_VERSION, "from v{v}");

            let ing = db.get_ingredient_by_name("flour").unwrap();
            assert_eq!(ing.default_yield, 100.0, "from v{v}");
            assert!(!ing.cost_by_whole_unit, "from v{v}");
            assert_eq!(ing.standard_weight_in_grams, None, "from v{v}");

            // Groups created before the v12 tombstone never resurrect.
            assert!(db.list_analysis_groups().unwrap().is_empty(), "from v{v}");
        }
    }

    #[test]
    fn test_v7_flour_gains_v8_defaults() {
        let mut db = db_at(7);
        db.conn
            .execute("INSERT INTO ingredients (name) VALUES ('flour')", [])
            .unwrap();
        db.upgrade_with(schema::history()).unwrap();
        let ing = db.get_ingredient_by_name("flour").unwrap();
        assert_eq!(ing.standard_weight_in_grams, None);
        assert_eq!(ing.default_yield, 100.0);
        assert!(!ing.cost_by_whole_unit);
    }

    #[test]
    fn test_v1_cost_per_gram_derived_on_upgrade() {
        let mut db = db_at(1);
        db.conn
            .execute(
                "INSERT INTO ingredients (name, purchase_unit, purchase_quantity, purchase_price) \
                 VALUES ('butter', 'g', 500.0, 60.0)",
                [],
            )
            .unwrap();
        db.upgrade_with(schema::history()).unwrap();
        let ing = db.get_ingredient_by_name("butter").unwrap();
        assert!((ing.cost_per_gram - 0.12).abs() < 1e-12);
    }

    #[test]
    fn test_v4_rewrites_legacy_line_entries() {
        let mut db = db_at(3);
        db.conn
            .execute(
                "INSERT INTO ingredients (name, purchase_unit, purchase_quantity, purchase_price, cost_per_gram) \
                 VALUES ('flour', 'kg', 1000.0, 30.0, 0.03)",
                [],
            )
            .unwrap();
        db.conn
            .execute(
                "INSERT INTO recipes (name, is_sub_recipe, ingredients_list) \
                 VALUES ('dough', 0, '[{\"name\":\"flour\",\"quantity\":500}]')",
                [],
            )
            .unwrap();
        db.upgrade_with(schema::history()).unwrap();

        let recipe = db.get_recipe_by_name("dough").unwrap();
        let flour_id = db.get_ingredient_by_name("flour").unwrap().id;
        assert_eq!(
            recipe.lines,
            vec![RecipeLine {
                kind: LineKind::Ingredient,
                id: flour_id,
                quantity_in_grams: 500.0,
            }]
        );
    }

    #[test]
    fn test_v4_unknown_ingredient_fails_whole_upgrade() {
        let mut db = db_at(3);
        db.conn
            .execute(
                "INSERT INTO recipes (name, is_sub_recipe, ingredients_list) \
                 VALUES ('dough', 0, '[{\"name\":\"ghost\",\"quantity\":10}]')",
                [],
            )
            .unwrap();
        let err = db.upgrade_with(schema::history()).unwrap_err();
        match err {
            StoreError::UpgradeTransform { version, .. } => assert_eq!(version, 4),
            other => panic!("expected UpgradeTransform, got {other:?}"),
        }
        // Rolled back wholesale: stamp untouched, data untouched.
        assert_eq!(raw_version(&db), 3);
        let raw: String = db
            .conn
            .query_row(
                "SELECT ingredients_list FROM recipes WHERE name = 'dough'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(raw, "[{\"name\":\"ghost\",\"quantity\":10}]");
    }

    #[test]
    fn test_downgrade_is_fatal() {
        let mut db = Database::open_in_memory().unwrap();
        db.conn.pragma_update(None, "user_version", 99).unwrap();
        let err = db.upgrade_with(schema::history()).unwrap_err();
        match err {
            StoreError::VersionDowngrade { on_disk, latest } => {
                assert_eq!(on_disk, 99);
                assert_eq!(latest, schema::LATEST_VERSION);
            }
            other => panic!("expected VersionDowngrade, got {other:?}"),
        }
    }

    #[test]
    fn test_downgrade_on_file_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crumb.db");
        {
            let db = Database::open(&path).unwrap();
            db.conn.pragma_update(None, "user_version", 99).unwrap();
        }
        let err = Database::open(&path).unwrap_err();
        assert!(matches!(err, StoreError::VersionDowngrade { .. }));
    }

    #[test]
    fn test_callback_failure_rolls_back_partial_rewrites() {
        let mut db = Database::open_in_memory_with(&DOUBLER_HISTORY[..1]).unwrap();
        db.conn
            .execute("INSERT INTO items (name, value) VALUES ('a', 2.0)", [])
            .unwrap();
        db.conn
            .execute("INSERT INTO items (name, value) VALUES ('poison', 3.0)", [])
            .unwrap();

        // 'a' is rewritten before 'poison' fails; the rollback must undo it.
        let err = db.upgrade_with(&DOUBLER_HISTORY).unwrap_err();
        assert!(matches!(
            err,
            StoreError::UpgradeTransform { version: 2, .. }
        ));
        assert_eq!(raw_version(&db), 1);
        // The structural step rolled back too: no `doubled` column remains.
        assert!(db.conn.prepare("SELECT doubled FROM items").is_err());
        let value: f64 = db
            .conn
            .query_row("SELECT value FROM items WHERE name = 'a'", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(value, 2.0);
    }

    #[test]
    fn test_tombstoned_groups_do_not_resurrect() {
        let mut db = db_at(11);
        db.conn
            .execute(
                "INSERT INTO analysis_groups (name, group_type, products) \
                 VALUES ('cakes', 'general', '[1]')",
                [],
            )
            .unwrap();
        db.upgrade_with(schema::history()).unwrap();
        assert!(db.list_analysis_groups().unwrap().is_empty());
        // The recreated collection is usable.
        let group = db.create_analysis_group("cakes", None).unwrap();
        assert_eq!(group.group_type, "general");
    }

    #[test]
    fn test_v11_retarget_keeps_old_recipe_references_unmigrated() {
        let mut db = db_at(10);
        db.conn
            .execute(
                "INSERT INTO analysis_groups (name, recipes, group_type) \
                 VALUES ('breads', '[1,2]', 'general')",
                [],
            )
            .unwrap();
        db.upgrade_with(&schema::history()[..11]).unwrap();

        // The shipped history never rewrote recipe references to products;
        // the old column survives unindexed and `products` stays NULL.
        let (recipes, products): (Option<String>, Option<String>) = db
            .conn
            .query_row(
                "SELECT recipes, products FROM analysis_groups WHERE name = 'breads'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(recipes.as_deref(), Some("[1,2]"));
        assert_eq!(products, None);

        let dropped: i64 = db
            .conn
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE type = 'index' \
                 AND name = 'idx_analysis_groups_recipes'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(dropped, 0);
    }

    #[test]
    fn test_v10_groups_gain_default_type() {
        let mut db = db_at(9);
        db.conn
            .execute(
                "INSERT INTO analysis_groups (name, recipes) VALUES ('breads', '[1]')",
                [],
            )
            .unwrap();
        db.upgrade_with(&schema::history()[..10]).unwrap();
        let group_type: String = db
            .conn
            .query_row(
                "SELECT group_type FROM analysis_groups WHERE name = 'breads'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(group_type, "general");
    }

    #[test]
    fn test_v13_products_keep_recipe_reference() {
        let mut db = db_at(11);
        db.conn
            .execute(
                "INSERT INTO products (name, recipe, weight, price) \
                 VALUES ('loaf', 7, 250.0, 3.5)",
                [],
            )
            .unwrap();
        db.upgrade_with(schema::history()).unwrap();

        // The reference moved to the renamed column.
        let product = db.get_product_by_name("loaf").unwrap();
        assert_eq!(product.recipe_id, 7);
        // The old column keeps its value, unindexed.
        let old: i64 = db
            .conn
            .query_row(
                "SELECT recipe FROM products WHERE name = 'loaf'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(old, 7);
    }

    #[test]
    fn test_file_upgrade_from_v7() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crumb.db");
        {
            let db = Database::open_with(&path, &schema::history()[..7]).unwrap();
            db.conn
                .execute("INSERT INTO ingredients (name) VALUES ('flour')", [])
                .unwrap();
        }
        let db = Database::open(&path).unwrap();
        assert_eq!(raw_version(&db), schema::LATEST_VERSION);
        let ing = db.get_ingredient_by_name("flour").unwrap();
        assert_eq!(ing.default_yield, 100.0);
        assert!(!ing.cost_by_whole_unit);
        assert_eq!(ing.standard_weight_in_grams, None);
    }

    // --- Ingredients ---

    #[test]
    fn test_duplicate_ingredient_name_rejected() {
        let db = Database::open_in_memory().unwrap();
        db.insert_ingredient(&flour()).unwrap();
        let err = db.insert_ingredient(&flour()).unwrap_err();
        assert!(matches!(err, StoreError::Constraint(_)));
    }

    #[test]
    fn test_zero_yield_reads_as_full_yield() {
        let db = Database::open_in_memory().unwrap();
        let ing = db.insert_ingredient(&flour()).unwrap();
        // Writes validate yield, but an old store may carry a raw 0.
        db.conn
            .execute(
                "UPDATE ingredients SET default_yield = 0 WHERE id = ?1",
                params![ing.id],
            )
            .unwrap();
        let ing = db.get_ingredient_by_id(ing.id).unwrap();
        assert_eq!(ing.default_yield, 100.0);
        assert!(crate::costing::ingredient_cost(&ing, 100.0).is_finite());
    }

    #[test]
    fn test_insert_ingredient_validates_purchase() {
        let db = Database::open_in_memory().unwrap();
        let mut bad = flour();
        bad.purchase_quantity = 0.0;
        assert!(matches!(
            db.insert_ingredient(&bad),
            Err(StoreError::Constraint(_))
        ));
    }

    #[test]
    fn test_set_ingredient_purchase_rederives_cost() {
        let db = Database::open_in_memory().unwrap();
        let ing = db.insert_ingredient(&flour()).unwrap();
        let updated = db
            .set_ingredient_purchase(ing.id, "kg", 2000.0, 50.0)
            .unwrap();
        assert!((updated.cost_per_gram - 0.025).abs() < 1e-12);
    }

    #[test]
    fn test_set_ingredient_whole_unit_requires_weight() {
        let db = Database::open_in_memory().unwrap();
        let ing = db.insert_ingredient(&flour()).unwrap();
        assert!(matches!(
            db.set_ingredient_whole_unit(ing.id, true, None),
            Err(StoreError::Constraint(_))
        ));
        let updated = db
            .set_ingredient_whole_unit(ing.id, true, Some(60.0))
            .unwrap();
        assert!(updated.cost_by_whole_unit);
        assert_eq!(updated.standard_weight_in_grams, Some(60.0));
    }

    #[test]
    fn test_list_ingredients_search() {
        let db = Database::open_in_memory().unwrap();
        db.insert_ingredient(&flour()).unwrap();
        let mut sugar = flour();
        sugar.name = "sugar".to_string();
        db.insert_ingredient(&sugar).unwrap();

        assert_eq!(db.list_ingredients(None).unwrap().len(), 2);
        let found = db.list_ingredients(Some("flo")).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "flour");
        assert!(db.list_ingredients(Some("salt")).unwrap().is_empty());
    }

    #[test]
    fn test_delete_ingredient_in_use_rejected() {
        let db = Database::open_in_memory().unwrap();
        let ing = db.insert_ingredient(&flour()).unwrap();
        let recipe = db
            .create_recipe(&NewRecipe {
                name: "dough".to_string(),
                is_sub_recipe: false,
                notes: None,
            })
            .unwrap();
        db.add_recipe_line(
            recipe.id,
            RecipeLine {
                kind: LineKind::Ingredient,
                id: ing.id,
                quantity_in_grams: 500.0,
            },
        )
        .unwrap();

        assert!(matches!(
            db.delete_ingredient(ing.id),
            Err(StoreError::Constraint(_))
        ));
        db.remove_recipe_line(recipe.id, LineKind::Ingredient, ing.id)
            .unwrap();
        assert!(db.delete_ingredient(ing.id).unwrap());
    }

    // --- Recipes ---

    fn make_recipe(db: &Database, name: &str, is_sub: bool) -> Recipe {
        db.create_recipe(&NewRecipe {
            name: name.to_string(),
            is_sub_recipe: is_sub,
            notes: None,
        })
        .unwrap()
    }

    #[test]
    fn test_recipe_lines_roundtrip() {
        let db = Database::open_in_memory().unwrap();
        let ing = db.insert_ingredient(&flour()).unwrap();
        let recipe = make_recipe(&db, "dough", false);
        db.add_recipe_line(
            recipe.id,
            RecipeLine {
                kind: LineKind::Ingredient,
                id: ing.id,
                quantity_in_grams: 500.0,
            },
        )
        .unwrap();

        let loaded = db.get_recipe_by_name("dough").unwrap();
        assert_eq!(loaded.lines.len(), 1);
        assert_eq!(loaded.lines[0].id, ing.id);
        assert_eq!(loaded.lines[0].quantity_in_grams, 500.0);
    }

    #[test]
    fn test_add_line_rejects_non_sub_recipe() {
        let db = Database::open_in_memory().unwrap();
        let plain = make_recipe(&db, "plain", false);
        let parent = make_recipe(&db, "parent", false);
        let err = db
            .add_recipe_line(
                parent.id,
                RecipeLine {
                    kind: LineKind::Recipe,
                    id: plain.id,
                    quantity_in_grams: 100.0,
                },
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::Constraint(_)));
    }

    #[test]
    fn test_add_line_rejects_cycles() {
        let db = Database::open_in_memory().unwrap();
        let a = db
            .create_recipe(&NewRecipe {
                name: "a".to_string(),
                is_sub_recipe: true,
                notes: None,
            })
            .unwrap();
        let b = db
            .create_recipe(&NewRecipe {
                name: "b".to_string(),
                is_sub_recipe: true,
                notes: None,
            })
            .unwrap();
        db.add_recipe_line(
            a.id,
            RecipeLine {
                kind: LineKind::Recipe,
                id: b.id,
                quantity_in_grams: 100.0,
            },
        )
        .unwrap();

        // b → a would close the loop a → b → a.
        let err = db
            .add_recipe_line(
                b.id,
                RecipeLine {
                    kind: LineKind::Recipe,
                    id: a.id,
                    quantity_in_grams: 100.0,
                },
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::Constraint(_)));

        // Self-reference is the trivial cycle.
        let err = db
            .add_recipe_line(
                a.id,
                RecipeLine {
                    kind: LineKind::Recipe,
                    id: a.id,
                    quantity_in_grams: 100.0,
                },
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::Constraint(_)));
    }

    #[test]
    fn test_delete_recipe_guards() {
        let db = Database::open_in_memory().unwrap();
        let sub = db
            .create_recipe(&NewRecipe {
                name: "poolish".to_string(),
                is_sub_recipe: true,
                notes: None,
            })
            .unwrap();
        let parent = make_recipe(&db, "baguette", false);
        db.add_recipe_line(
            parent.id,
            RecipeLine {
                kind: LineKind::Recipe,
                id: sub.id,
                quantity_in_grams: 200.0,
            },
        )
        .unwrap();
        assert!(matches!(
            db.delete_recipe(sub.id),
            Err(StoreError::Constraint(_))
        ));

        db.insert_product(&NewProduct {
            name: "baguette-250".to_string(),
            recipe_id: parent.id,
            weight: 250.0,
            price: 3.5,
        })
        .unwrap();
        assert!(matches!(
            db.delete_recipe(parent.id),
            Err(StoreError::Constraint(_))
        ));
    }

    #[test]
    fn test_recipe_notes() {
        let db = Database::open_in_memory().unwrap();
        let recipe = make_recipe(&db, "dough", false);
        db.set_recipe_notes(recipe.id, Some("rest 20 min")).unwrap();
        assert_eq!(
            db.get_recipe_by_id(recipe.id).unwrap().notes.as_deref(),
            Some("rest 20 min")
        );
        db.set_recipe_notes(recipe.id, None).unwrap();
        assert_eq!(db.get_recipe_by_id(recipe.id).unwrap().notes, None);
    }

    // --- Settings ---

    #[test]
    fn test_settings_last_write_wins() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.get_setting("user-selected-theme").unwrap(), None);
        db.set_setting("user-selected-theme", "light").unwrap();
        db.set_setting("user-selected-theme", "dark").unwrap();
        assert_eq!(
            db.get_setting("user-selected-theme").unwrap().as_deref(),
            Some("dark")
        );
        assert!(db.delete_setting("user-selected-theme").unwrap());
        assert!(!db.delete_setting("user-selected-theme").unwrap());
    }

    // --- Products & groups ---

    fn seed_product(db: &Database) -> Product {
        let recipe = make_recipe(db, "baguette", false);
        db.insert_product(&NewProduct {
            name: "baguette-250".to_string(),
            recipe_id: recipe.id,
            weight: 250.0,
            price: 3.5,
        })
        .unwrap()
    }

    #[test]
    fn test_product_requires_existing_recipe() {
        let db = Database::open_in_memory().unwrap();
        let err = db
            .insert_product(&NewProduct {
                name: "ghost".to_string(),
                recipe_id: 42,
                weight: 100.0,
                price: 1.0,
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[test]
    fn test_set_product_partial_update() {
        let db = Database::open_in_memory().unwrap();
        let product = seed_product(&db);
        let updated = db.set_product(product.id, None, Some(4.0)).unwrap();
        assert_eq!(updated.weight, 250.0);
        assert_eq!(updated.price, 4.0);
        assert!(matches!(
            db.set_product(product.id, Some(0.0), None),
            Err(StoreError::Constraint(_))
        ));
    }

    #[test]
    fn test_group_membership() {
        let db = Database::open_in_memory().unwrap();
        let product = seed_product(&db);
        let group = db.create_analysis_group("breads", None).unwrap();
        assert_eq!(group.group_type, "general");

        assert!(db.add_group_product(group.id, product.id).unwrap());
        assert!(!db.add_group_product(group.id, product.id).unwrap());
        assert_eq!(
            db.get_analysis_group_by_id(group.id).unwrap().products,
            vec![product.id]
        );

        // Referenced products cannot be deleted out from under the group.
        assert!(matches!(
            db.delete_product(product.id),
            Err(StoreError::Constraint(_))
        ));
        assert!(db.remove_group_product(group.id, product.id).unwrap());
        assert!(db.delete_product(product.id).unwrap());
    }

    // --- Backup ---

    #[test]
    fn test_export_import_remaps_references() {
        let source = Database::open_in_memory().unwrap();
        let ing = source.insert_ingredient(&flour()).unwrap();
        let sub = source
            .create_recipe(&NewRecipe {
                name: "poolish".to_string(),
                is_sub_recipe: true,
                notes: None,
            })
            .unwrap();
        source
            .add_recipe_line(
                sub.id,
                RecipeLine {
                    kind: LineKind::Ingredient,
                    id: ing.id,
                    quantity_in_grams: 200.0,
                },
            )
            .unwrap();
        let parent = source
            .create_recipe(&NewRecipe {
                name: "baguette".to_string(),
                is_sub_recipe: false,
                notes: Some("shape tight".to_string()),
            })
            .unwrap();
        source
            .add_recipe_line(
                parent.id,
                RecipeLine {
                    kind: LineKind::Recipe,
                    id: sub.id,
                    quantity_in_grams: 300.0,
                },
            )
            .unwrap();
        let product = source
            .insert_product(&NewProduct {
                name: "baguette-250".to_string(),
                recipe_id: parent.id,
                weight: 250.0,
                price: 3.5,
            })
            .unwrap();
        let group = source.create_analysis_group("breads", None).unwrap();
        source.add_group_product(group.id, product.id).unwrap();
        source.set_setting("user-selected-theme", "dark").unwrap();

        let data = source.export_all("0.1.0").unwrap();

        // Pre-seed the target so imported ids cannot line up with the
        // source's; every reference must go through the remap.
        let target = Database::open_in_memory().unwrap();
        let mut butter = flour();
        butter.name = "butter".to_string();
        target.insert_ingredient(&butter).unwrap();

        let summary = target.import_all(&data).unwrap();
        assert_eq!(summary.ingredients_added, 1);
        assert_eq!(summary.recipes_added, 2);
        assert_eq!(summary.products_added, 1);
        assert_eq!(summary.groups_added, 1);
        assert_eq!(summary.settings_written, 1);

        let new_flour = target.get_ingredient_by_name("flour").unwrap();
        let new_sub = target.get_recipe_by_name("poolish").unwrap();
        assert_eq!(new_sub.lines[0].id, new_flour.id);
        let new_parent = target.get_recipe_by_name("baguette").unwrap();
        assert_eq!(new_parent.lines[0].kind, LineKind::Recipe);
        assert_eq!(new_parent.lines[0].id, new_sub.id);
        let new_product = target.get_product_by_name("baguette-250").unwrap();
        assert_eq!(new_product.recipe_id, new_parent.id);
        let new_group = target.get_analysis_group_by_name("breads").unwrap();
        assert_eq!(new_group.products, vec![new_product.id]);
        assert_eq!(
            target.get_setting("user-selected-theme").unwrap().as_deref(),
            Some("dark")
        );
    }
}

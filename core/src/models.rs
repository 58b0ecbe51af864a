use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// A purchasable ingredient with derived per-gram cost.
///
/// `cost_per_gram` is derived from the purchase quantity and price and is
/// recomputed whenever those change; it is never entered directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ingredient {
    pub id: i64,
    pub name: String,
    pub purchase_unit: String,
    /// Purchase size converted to grams (e.g. "1 kg" → 1000).
    pub purchase_quantity: f64,
    pub purchase_price: f64,
    pub cost_per_gram: f64,
    /// Usable fraction of the purchased quantity, in percent (0, 100].
    pub default_yield: f64,
    /// When set, cost is charged in whole standard-weight units (eggs,
    /// gelatin sheets) rather than by exact grams.
    pub cost_by_whole_unit: bool,
    pub standard_weight_in_grams: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct NewIngredient {
    pub name: String,
    pub purchase_unit: String,
    pub purchase_quantity: f64,
    pub purchase_price: f64,
    /// Defaults to 100 when omitted.
    pub default_yield: Option<f64>,
    /// Defaults to false when omitted.
    pub cost_by_whole_unit: Option<bool>,
    pub standard_weight_in_grams: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineKind {
    Ingredient,
    Recipe,
}

impl std::fmt::Display for LineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LineKind::Ingredient => write!(f, "ingredient"),
            LineKind::Recipe => write!(f, "recipe"),
        }
    }
}

/// One entry of a recipe's ingredient list: a reference to an ingredient or
/// to a sub-recipe, plus the quantity used.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecipeLine {
    pub kind: LineKind,
    pub id: i64,
    pub quantity_in_grams: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipe {
    pub id: i64,
    pub name: String,
    /// Whether this recipe may be used as an ingredient line in another
    /// recipe. References must not form a cycle.
    pub is_sub_recipe: bool,
    pub lines: Vec<RecipeLine>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewRecipe {
    pub name: String,
    pub is_sub_recipe: bool,
    pub notes: Option<String>,
}

/// A flat key → value preference entry. Last write wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Setting {
    pub key: String,
    pub value: String,
}

/// A sellable item: a recipe portioned at a weight and sold at a price.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub recipe_id: i64,
    pub weight: f64,
    pub price: f64,
}

#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub recipe_id: i64,
    pub weight: f64,
    pub price: f64,
}

/// A named grouping of products used for aggregate reporting (overhead
/// allocation, group summaries).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisGroup {
    pub id: i64,
    pub name: String,
    pub group_type: String,
    pub products: Vec<i64>,
}

// --- Backup ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportData {
    pub app_version: String,
    pub schema_version: i64,
    pub exported_at: String,
    pub ingredients: Vec<Ingredient>,
    pub recipes: Vec<Recipe>,
    pub settings: Vec<Setting>,
    pub products: Vec<Product>,
    pub analysis_groups: Vec<AnalysisGroup>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportSummary {
    pub ingredients_added: usize,
    pub ingredients_updated: usize,
    pub recipes_added: usize,
    pub recipes_updated: usize,
    pub settings_written: usize,
    pub products_added: usize,
    pub products_updated: usize,
    pub groups_added: usize,
    pub groups_updated: usize,
}

// --- Validation ---

pub fn validate_purchase(quantity_g: f64, price: f64) -> StoreResult<()> {
    if quantity_g <= 0.0 {
        return Err(StoreError::constraint(
            "purchase quantity must be greater than 0",
        ));
    }
    if price < 0.0 {
        return Err(StoreError::constraint("purchase price must not be negative"));
    }
    Ok(())
}

pub fn validate_yield(default_yield: f64) -> StoreResult<()> {
    if default_yield <= 0.0 || default_yield > 100.0 {
        return Err(StoreError::constraint(format!(
            "yield must be a percentage in (0, 100], got {default_yield}"
        )));
    }
    Ok(())
}

pub fn validate_line_quantity(quantity_in_grams: f64) -> StoreResult<()> {
    if quantity_in_grams <= 0.0 {
        return Err(StoreError::constraint(
            "line quantity must be greater than 0 grams",
        ));
    }
    Ok(())
}

/// Compute the derived per-gram cost for an ingredient purchase.
#[must_use]
pub fn derive_cost_per_gram(quantity_g: f64, price: f64) -> f64 {
    if quantity_g > 0.0 { price / quantity_g } else { 0.0 }
}

/// Convert a quantity in the given unit to grams.
///
/// Returns `(grams, is_approximate)`; volume units assume water density and
/// are flagged approximate. Returns `None` for unknown units.
#[must_use]
pub fn convert_to_grams(quantity: f64, unit: &str) -> Option<(f64, bool)> {
    let (factor, approx) = match unit.to_lowercase().as_str() {
        "g" | "gram" | "grams" => (1.0, false),
        "kg" => (1000.0, false),
        "lb" | "lbs" => (453.592, false),
        "oz" => (28.3495, false),
        "ml" => (1.0, true),
        "l" | "litre" | "liter" => (1000.0, true),
        "tbsp" => (15.0, true),
        "tsp" => (5.0, true),
        _ => return None,
    };
    Some((quantity * factor, approx))
}

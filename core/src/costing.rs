//! Cost arithmetic over the stored collections.
//!
//! All quantities are grams and all money values are plain `f64` in the
//! user's currency. Costs are computed on demand from the current store
//! contents; nothing here is persisted.

use std::collections::HashSet;

use serde::Serialize;

use crate::db::Database;
use crate::error::{StoreError, StoreResult};
use crate::models::{Ingredient, LineKind};

/// Cost of one resolved recipe line.
#[derive(Debug, Clone, Serialize)]
pub struct LineCost {
    pub kind: LineKind,
    pub id: i64,
    pub name: String,
    pub quantity_in_grams: f64,
    pub cost: f64,
}

/// Full cost breakdown of a recipe, sub-recipes resolved recursively.
#[derive(Debug, Clone, Serialize)]
pub struct RecipeCost {
    pub recipe_id: i64,
    pub name: String,
    pub total_cost: f64,
    pub total_weight_in_grams: f64,
    /// `total_cost / total_weight_in_grams`, 0 for an empty recipe.
    pub cost_per_gram: f64,
    pub lines: Vec<LineCost>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductCost {
    pub product_id: i64,
    pub name: String,
    pub weight_in_grams: f64,
    pub price: f64,
    /// Product weight priced at the recipe's per-gram cost.
    pub unit_cost: f64,
    pub margin: f64,
}

/// One product's slice of an allocated overhead.
#[derive(Debug, Clone, Serialize)]
pub struct OverheadShare {
    pub product_id: i64,
    pub name: String,
    pub weight_in_grams: f64,
    pub share: f64,
}

/// Cost of consuming `quantity_in_grams` of an ingredient.
///
/// The yield percentage inflates the consumed quantity (at 90% yield,
/// using 90 g means buying 100 g). Whole-unit ingredients are charged in
/// whole standard-weight units, rounded up.
#[must_use]
pub fn ingredient_cost(ingredient: &Ingredient, quantity_in_grams: f64) -> f64 {
    let consumed = quantity_in_grams / (ingredient.default_yield / 100.0);
    match (
        ingredient.cost_by_whole_unit,
        ingredient.standard_weight_in_grams,
    ) {
        (true, Some(unit)) if unit > 0.0 => {
            let units = (consumed / unit).ceil();
            units * unit * ingredient.cost_per_gram
        }
        _ => consumed * ingredient.cost_per_gram,
    }
}

/// Cost a recipe, resolving sub-recipe lines at the sub-recipe's per-gram
/// cost.
///
/// Writes already reject cyclic references, but stores upgraded from old
/// versions are not revalidated, so the walk keeps its own visited set and
/// fails cleanly instead of recursing forever.
pub fn recipe_cost(db: &Database, recipe_id: i64) -> StoreResult<RecipeCost> {
    cost_recipe(db, recipe_id, &mut HashSet::new())
}

fn cost_recipe(db: &Database, recipe_id: i64, visited: &mut HashSet<i64>) -> StoreResult<RecipeCost> {
    if !visited.insert(recipe_id) {
        return Err(StoreError::constraint(format!(
            "recipe {recipe_id} is part of a sub-recipe cycle"
        )));
    }
    let recipe = db.get_recipe_by_id(recipe_id)?;

    let mut lines = Vec::with_capacity(recipe.lines.len());
    let mut total_cost = 0.0;
    let mut total_weight = 0.0;
    for line in &recipe.lines {
        let (name, cost) = match line.kind {
            LineKind::Ingredient => {
                let ingredient = db.get_ingredient_by_id(line.id)?;
                let cost = ingredient_cost(&ingredient, line.quantity_in_grams);
                (ingredient.name, cost)
            }
            LineKind::Recipe => {
                let sub = cost_recipe(db, line.id, visited)?;
                let cost = sub.cost_per_gram * line.quantity_in_grams;
                (sub.name, cost)
            }
        };
        total_cost += cost;
        total_weight += line.quantity_in_grams;
        lines.push(LineCost {
            kind: line.kind,
            id: line.id,
            name,
            quantity_in_grams: line.quantity_in_grams,
            cost,
        });
    }
    visited.remove(&recipe_id);

    let cost_per_gram = if total_weight > 0.0 {
        total_cost / total_weight
    } else {
        0.0
    };
    Ok(RecipeCost {
        recipe_id,
        name: recipe.name,
        total_cost,
        total_weight_in_grams: total_weight,
        cost_per_gram,
        lines,
    })
}

pub fn product_cost(db: &Database, product_id: i64) -> StoreResult<ProductCost> {
    let product = db.get_product_by_id(product_id)?;
    let recipe = recipe_cost(db, product.recipe_id)?;
    let unit_cost = product.weight * recipe.cost_per_gram;
    Ok(ProductCost {
        product_id: product.id,
        name: product.name,
        weight_in_grams: product.weight,
        price: product.price,
        unit_cost,
        margin: product.price - unit_cost,
    })
}

/// Units to sell before a fixed overhead is covered.
///
/// `None` when the margin per unit is zero or negative; no volume covers
/// the overhead then.
#[must_use]
pub fn break_even_units(overhead: f64, margin_per_unit: f64) -> Option<f64> {
    if margin_per_unit <= 0.0 {
        None
    } else {
        Some((overhead / margin_per_unit).ceil())
    }
}

/// Split a fixed overhead across a group's products, proportionally to
/// unit weight. An empty group gets an empty allocation.
pub fn allocate_overhead(
    db: &Database,
    group_id: i64,
    overhead: f64,
) -> StoreResult<Vec<OverheadShare>> {
    let group = db.get_analysis_group_by_id(group_id)?;
    let mut products = Vec::with_capacity(group.products.len());
    let mut total_weight = 0.0;
    for product_id in &group.products {
        let product = db.get_product_by_id(*product_id)?;
        total_weight += product.weight;
        products.push(product);
    }
    if total_weight <= 0.0 {
        return Ok(Vec::new());
    }
    Ok(products
        .into_iter()
        .map(|p| OverheadShare {
            product_id: p.id,
            name: p.name,
            weight_in_grams: p.weight,
            share: overhead * p.weight / total_weight,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewIngredient, NewProduct, NewRecipe, RecipeLine};

    fn ingredient(name: &str, quantity: f64, price: f64) -> NewIngredient {
        NewIngredient {
            name: name.to_string(),
            purchase_unit: "g".to_string(),
            purchase_quantity: quantity,
            purchase_price: price,
            default_yield: None,
            cost_by_whole_unit: None,
            standard_weight_in_grams: None,
        }
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_ingredient_cost_yield_adjustment() {
        let db = Database::open_in_memory().unwrap();
        let flour = db.insert_ingredient(&ingredient("flour", 1000.0, 30.0)).unwrap();
        // 100% yield: exact grams.
        assert!(close(ingredient_cost(&flour, 100.0), 3.0));

        let flour = db.set_ingredient_yield(flour.id, 90.0).unwrap();
        // Using 90 g at 90% yield means buying 100 g.
        assert!(close(ingredient_cost(&flour, 90.0), 3.0));
    }

    #[test]
    fn test_ingredient_cost_whole_unit_rounding() {
        let db = Database::open_in_memory().unwrap();
        // 10 eggs at 60 g, 3.00 for the box.
        let egg = db.insert_ingredient(&ingredient("egg", 600.0, 3.0)).unwrap();
        let egg = db.set_ingredient_whole_unit(egg.id, true, Some(60.0)).unwrap();

        // 90 g needs two whole eggs.
        assert!(close(ingredient_cost(&egg, 90.0), 0.6));
        // Exactly one egg's worth stays one egg.
        assert!(close(ingredient_cost(&egg, 60.0), 0.3));
    }

    #[test]
    fn test_recipe_cost_resolves_sub_recipes() {
        let db = Database::open_in_memory().unwrap();
        let flour = db.insert_ingredient(&ingredient("flour", 1000.0, 30.0)).unwrap();
        let water = db.insert_ingredient(&ingredient("water", 1000.0, 0.0)).unwrap();

        let poolish = db
            .create_recipe(&NewRecipe {
                name: "poolish".to_string(),
                is_sub_recipe: true,
                notes: None,
            })
            .unwrap();
        db.add_recipe_line(
            poolish.id,
            RecipeLine {
                kind: LineKind::Ingredient,
                id: flour.id,
                quantity_in_grams: 100.0,
            },
        )
        .unwrap();
        db.add_recipe_line(
            poolish.id,
            RecipeLine {
                kind: LineKind::Ingredient,
                id: water.id,
                quantity_in_grams: 100.0,
            },
        )
        .unwrap();

        let baguette = db
            .create_recipe(&NewRecipe {
                name: "baguette".to_string(),
                is_sub_recipe: false,
                notes: None,
            })
            .unwrap();
        db.add_recipe_line(
            baguette.id,
            RecipeLine {
                kind: LineKind::Ingredient,
                id: flour.id,
                quantity_in_grams: 400.0,
            },
        )
        .unwrap();
        db.add_recipe_line(
            baguette.id,
            RecipeLine {
                kind: LineKind::Recipe,
                id: poolish.id,
                quantity_in_grams: 200.0,
            },
        )
        .unwrap();

        // poolish: 3.00 for 200 g, 0.015/g. baguette: 400 g flour (12.00)
        // plus 200 g poolish (3.00) over 600 g total.
        let cost = recipe_cost(&db, baguette.id).unwrap();
        assert!(close(cost.total_cost, 15.0));
        assert!(close(cost.total_weight_in_grams, 600.0));
        assert!(close(cost.cost_per_gram, 0.025));
        assert_eq!(cost.lines.len(), 2);
        assert_eq!(cost.lines[1].name, "poolish");
        assert!(close(cost.lines[1].cost, 3.0));
    }

    #[test]
    fn test_recipe_cost_rejects_legacy_cycle() {
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

        // Plant a cycle behind the API's back, as an old store might carry.
        for (from, to) in [(a.id, b.id), (b.id, a.id)] {
            db.raw()
                .execute(
                    "UPDATE recipes SET ingredients_list = ?1 WHERE id = ?2",
                    rusqlite::params![
                        format!("[{{\"kind\":\"recipe\",\"id\":{to},\"quantity_in_grams\":100.0}}]"),
                        from
                    ],
                )
                .unwrap();
        }

        let err = recipe_cost(&db, a.id).unwrap_err();
        assert!(matches!(err, StoreError::Constraint(_)));
    }

    #[test]
    fn test_product_cost_and_break_even() {
        let db = Database::open_in_memory().unwrap();
        let flour = db.insert_ingredient(&ingredient("flour", 1000.0, 30.0)).unwrap();
        let dough = db
            .create_recipe(&NewRecipe {
                name: "dough".to_string(),
                is_sub_recipe: false,
                notes: None,
            })
            .unwrap();
        db.add_recipe_line(
            dough.id,
            RecipeLine {
                kind: LineKind::Ingredient,
                id: flour.id,
                quantity_in_grams: 500.0,
            },
        )
        .unwrap();
        let product = db
            .insert_product(&NewProduct {
                name: "loaf".to_string(),
                recipe_id: dough.id,
                weight: 250.0,
                price: 3.5,
            })
            .unwrap();

        // Recipe per-gram cost is 15.00 / 500 g = 0.03, so the 250 g loaf
        // costs 7.50 and sells at a loss.
        let cost = product_cost(&db, product.id).unwrap();
        assert!(close(cost.unit_cost, 7.5));
        assert!(close(cost.margin, -4.0));
        assert_eq!(break_even_units(100.0, cost.margin), None);

        db.set_product(product.id, None, Some(10.0)).unwrap();
        let cost = product_cost(&db, product.id).unwrap();
        assert!(close(cost.margin, 2.5));
        assert_eq!(break_even_units(100.0, cost.margin), Some(40.0));
        assert_eq!(break_even_units(99.0, cost.margin), Some(40.0));
    }

    #[test]
    fn test_allocate_overhead_by_weight() {
        let db = Database::open_in_memory().unwrap();
        let flour = db.insert_ingredient(&ingredient("flour", 1000.0, 30.0)).unwrap();
        let dough = db
            .create_recipe(&NewRecipe {
                name: "dough".to_string(),
                is_sub_recipe: false,
                notes: None,
            })
            .unwrap();
        db.add_recipe_line(
            dough.id,
            RecipeLine {
                kind: LineKind::Ingredient,
                id: flour.id,
                quantity_in_grams: 500.0,
            },
        )
        .unwrap();
        let small = db
            .insert_product(&NewProduct {
                name: "roll".to_string(),
                recipe_id: dough.id,
                weight: 100.0,
                price: 1.5,
            })
            .unwrap();
        let large = db
            .insert_product(&NewProduct {
                name: "loaf".to_string(),
                recipe_id: dough.id,
                weight: 300.0,
                price: 4.0,
            })
            .unwrap();
        let group = db.create_analysis_group("breads", None).unwrap();
        db.add_group_product(group.id, small.id).unwrap();
        db.add_group_product(group.id, large.id).unwrap();

        let shares = allocate_overhead(&db, group.id, 100.0).unwrap();
        assert_eq!(shares.len(), 2);
        assert!(close(shares[0].share, 25.0));
        assert!(close(shares[1].share, 75.0));
        assert!(close(shares.iter().map(|s| s.share).sum::<f64>(), 100.0));

        let empty = db.create_analysis_group("cakes", None).unwrap();
        assert!(allocate_overhead(&db, empty.id, 100.0).unwrap().is_empty());
    }
}

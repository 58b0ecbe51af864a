use anyhow::{Result, bail};
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use crumb_core::db::Database;
use crumb_core::models::{Ingredient, NewIngredient};

use super::helpers::{json_error, parse_quantity, truncate};

pub(crate) fn cmd_ingredient_add(
    db: &Database,
    name: &str,
    quantity: &str,
    price: f64,
    default_yield: Option<f64>,
    json: bool,
) -> Result<()> {
    let (grams, unit) = parse_quantity(quantity)?;
    let ingredient = db.insert_ingredient(&NewIngredient {
        name: name.to_string(),
        purchase_unit: unit,
        purchase_quantity: grams,
        purchase_price: price,
        default_yield,
        cost_by_whole_unit: None,
        standard_weight_in_grams: None,
    })?;

    if json {
        println!("{}", serde_json::to_string_pretty(&ingredient)?);
    } else {
        let id = ingredient.id;
        let cpg = ingredient.cost_per_gram;
        println!("Added ingredient: {name} (id: {id}, {cpg:.4}/g)");
    }
    Ok(())
}

pub(crate) fn cmd_ingredient_list(db: &Database, search: Option<&str>, json: bool) -> Result<()> {
    let ingredients = db.list_ingredients(search)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&ingredients)?);
        return Ok(());
    }

    if ingredients.is_empty() {
        println!("No ingredients found.");
        return Ok(());
    }
    print_ingredient_table(&ingredients);
    Ok(())
}

pub(crate) fn cmd_ingredient_show(db: &Database, name: &str, json: bool) -> Result<()> {
    let ingredient = db.get_ingredient_by_name(name)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&ingredient)?);
        return Ok(());
    }

    let qty = ingredient.purchase_quantity;
    let unit = &ingredient.purchase_unit;
    let price = ingredient.purchase_price;
    let cpg = ingredient.cost_per_gram;
    let yld = ingredient.default_yield;
    println!("=== {name} ===");
    println!("  Purchase: {qty:.0}g ({unit}) for {price:.2}");
    println!("  Cost: {cpg:.4}/g  |  Yield: {yld:.0}%");
    if ingredient.cost_by_whole_unit {
        let w = ingredient.standard_weight_in_grams.unwrap_or(0.0);
        println!("  Costed in whole units of {w:.0}g");
    }
    Ok(())
}

pub(crate) fn cmd_ingredient_set_price(
    db: &Database,
    name: &str,
    quantity: &str,
    price: f64,
    json: bool,
) -> Result<()> {
    let (grams, unit) = parse_quantity(quantity)?;
    let ingredient = db.get_ingredient_by_name(name)?;
    let updated = db.set_ingredient_purchase(ingredient.id, &unit, grams, price)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&updated)?);
    } else {
        let cpg = updated.cost_per_gram;
        println!("Updated {name}: {grams:.0}g for {price:.2} ({cpg:.4}/g)");
    }
    Ok(())
}

pub(crate) fn cmd_ingredient_set_yield(
    db: &Database,
    name: &str,
    default_yield: f64,
    json: bool,
) -> Result<()> {
    let ingredient = db.get_ingredient_by_name(name)?;
    let updated = db.set_ingredient_yield(ingredient.id, default_yield)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&updated)?);
    } else {
        println!("Updated {name}: yield {default_yield:.0}%");
    }
    Ok(())
}

pub(crate) fn cmd_ingredient_set_standard_weight(
    db: &Database,
    name: &str,
    weight: Option<f64>,
    clear: bool,
    json: bool,
) -> Result<()> {
    let ingredient = db.get_ingredient_by_name(name)?;
    let updated = if clear {
        db.set_ingredient_whole_unit(ingredient.id, false, None)?
    } else {
        let Some(weight) = weight else {
            bail!("Give a standard weight in grams, or --clear to go back to per-gram costing");
        };
        db.set_ingredient_whole_unit(ingredient.id, true, Some(weight))?
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&updated)?);
    } else if updated.cost_by_whole_unit {
        let w = updated.standard_weight_in_grams.unwrap_or(0.0);
        println!("{name} is now costed in whole units of {w:.0}g");
    } else {
        println!("{name} is back to exact per-gram costing");
    }
    Ok(())
}

pub(crate) fn cmd_ingredient_delete(db: &Database, name: &str, json: bool) -> Result<()> {
    let ingredient = db.get_ingredient_by_name(name)?;
    if db.delete_ingredient(ingredient.id)? {
        if json {
            println!("{}", serde_json::json!({ "deleted": name }));
        } else {
            println!("Deleted ingredient: {name}");
        }
        Ok(())
    } else {
        if json {
            println!("{}", json_error(&format!("Ingredient '{name}' not found")));
        } else {
            eprintln!("Ingredient '{name}' not found");
        }
        process::exit(2);
    }
}

fn print_ingredient_table(ingredients: &[Ingredient]) {
    #[derive(Tabled)]
    struct IngredientRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Purchase")]
        purchase: String,
        #[tabled(rename = "Price")]
        price: String,
        #[tabled(rename = "Cost/g")]
        cost_per_gram: String,
        #[tabled(rename = "Yield %")]
        default_yield: String,
        #[tabled(rename = "Whole unit")]
        whole_unit: String,
    }

    let rows: Vec<IngredientRow> = ingredients
        .iter()
        .map(|i| IngredientRow {
            id: i.id,
            name: truncate(&i.name, 30),
            purchase: format!("{:.0}g ({})", i.purchase_quantity, i.purchase_unit),
            price: format!("{:.2}", i.purchase_price),
            cost_per_gram: format!("{:.4}", i.cost_per_gram),
            default_yield: format!("{:.0}", i.default_yield),
            whole_unit: match (i.cost_by_whole_unit, i.standard_weight_in_grams) {
                (true, Some(w)) => format!("{w:.0}g"),
                _ => "-".to_string(),
            },
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(3..6)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

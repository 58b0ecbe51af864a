use anyhow::Result;
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use crumb_core::costing;
use crumb_core::db::Database;
use crumb_core::models::NewProduct;

use super::helpers::{format_money, json_error, truncate};

pub(crate) fn cmd_product_add(
    db: &Database,
    name: &str,
    recipe_name: &str,
    weight: f64,
    price: f64,
    json: bool,
) -> Result<()> {
    let recipe = db.get_recipe_by_name(recipe_name)?;
    let product = db.insert_product(&NewProduct {
        name: name.to_string(),
        recipe_id: recipe.id,
        weight,
        price,
    })?;

    if json {
        println!("{}", serde_json::to_string_pretty(&product)?);
    } else {
        let id = product.id;
        println!("Added product: {name} (id: {id}, {weight:.0}g of {recipe_name} at {price:.2})");
    }
    Ok(())
}

pub(crate) fn cmd_product_list(db: &Database, json: bool) -> Result<()> {
    let products = db.list_products()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&products)?);
        return Ok(());
    }

    if products.is_empty() {
        println!("No products yet. Add one with: crumb product add <name> <recipe> <weight> <price>");
        return Ok(());
    }

    #[derive(Tabled)]
    struct ProductRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Recipe")]
        recipe: String,
        #[tabled(rename = "Weight")]
        weight: String,
        #[tabled(rename = "Price")]
        price: String,
        #[tabled(rename = "Unit cost")]
        unit_cost: String,
        #[tabled(rename = "Margin")]
        margin: String,
    }

    let mut rows = Vec::with_capacity(products.len());
    for p in &products {
        let recipe = db.get_recipe_by_id(p.recipe_id)?;
        let cost = costing::product_cost(db, p.id)?;
        rows.push(ProductRow {
            id: p.id,
            name: truncate(&p.name, 30),
            recipe: truncate(&recipe.name, 25),
            weight: format!("{:.0}g", p.weight),
            price: format_money(p.price),
            unit_cost: format_money(cost.unit_cost),
            margin: format_money(cost.margin),
        });
    }

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(3..7)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    Ok(())
}

pub(crate) fn cmd_product_show(db: &Database, name: &str, json: bool) -> Result<()> {
    let product = db.get_product_by_name(name)?;
    let cost = costing::product_cost(db, product.id)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&cost)?);
        return Ok(());
    }

    let recipe = db.get_recipe_by_id(product.recipe_id)?;
    let recipe_name = &recipe.name;
    let weight = product.weight;
    let price = format_money(product.price);
    let unit_cost = format_money(cost.unit_cost);
    let margin = format_money(cost.margin);
    println!("=== {name} ===");
    println!("  {weight:.0}g of {recipe_name}, sold at {price}");
    println!("  Unit cost: {unit_cost}  |  Margin: {margin}");
    Ok(())
}

pub(crate) fn cmd_product_set(
    db: &Database,
    name: &str,
    weight: Option<f64>,
    price: Option<f64>,
    json: bool,
) -> Result<()> {
    let product = db.get_product_by_name(name)?;
    let updated = db.set_product(product.id, weight, price)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&updated)?);
    } else {
        let w = updated.weight;
        let p = format_money(updated.price);
        println!("Updated {name}: {w:.0}g at {p}");
    }
    Ok(())
}

pub(crate) fn cmd_product_break_even(
    db: &Database,
    name: &str,
    overhead: f64,
    json: bool,
) -> Result<()> {
    let product = db.get_product_by_name(name)?;
    let cost = costing::product_cost(db, product.id)?;
    let units = costing::break_even_units(overhead, cost.margin);

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "product": name,
                "overhead": overhead,
                "margin_per_unit": cost.margin,
                "break_even_units": units,
            }))?
        );
        return Ok(());
    }

    let margin = format_money(cost.margin);
    match units {
        Some(units) => {
            println!("{name}: sell {units:.0} units to cover {overhead:.2} (margin {margin}/unit)");
        }
        None => {
            println!("{name} has no positive margin ({margin}/unit); no volume covers {overhead:.2}");
        }
    }
    Ok(())
}

pub(crate) fn cmd_product_delete(db: &Database, name: &str, json: bool) -> Result<()> {
    let product = db.get_product_by_name(name)?;
    if db.delete_product(product.id)? {
        if json {
            println!("{}", serde_json::json!({ "deleted": name }));
        } else {
            println!("Deleted product: {name}");
        }
        Ok(())
    } else {
        if json {
            println!("{}", json_error(&format!("Product '{name}' not found")));
        } else {
            eprintln!("Product '{name}' not found");
        }
        process::exit(2);
    }
}

use anyhow::Result;
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use crumb_core::costing;
use crumb_core::db::Database;
use crumb_core::models::{LineKind, NewRecipe, RecipeLine};

use super::helpers::{format_money, json_error, parse_quantity, truncate};

pub(crate) fn cmd_recipe_create(
    db: &Database,
    name: &str,
    sub_recipe: bool,
    notes: Option<&str>,
    json: bool,
) -> Result<()> {
    let recipe = db.create_recipe(&NewRecipe {
        name: name.to_string(),
        is_sub_recipe: sub_recipe,
        notes: notes.map(ToString::to_string),
    })?;

    if json {
        println!("{}", serde_json::to_string_pretty(&recipe)?);
    } else {
        let id = recipe.id;
        println!("Created recipe: {name} (id: {id})");
        println!("Add lines with: crumb recipe add-line \"{name}\" <ingredient> <quantity>");
    }
    Ok(())
}

pub(crate) fn cmd_recipe_add_line(
    db: &Database,
    recipe_name: &str,
    target_name: &str,
    quantity: &str,
    sub_recipe: bool,
    json: bool,
) -> Result<()> {
    let recipe = db.get_recipe_by_name(recipe_name)?;
    let (grams, _unit) = parse_quantity(quantity)?;

    let (kind, target_id) = if sub_recipe {
        (LineKind::Recipe, db.get_recipe_by_name(target_name)?.id)
    } else {
        (LineKind::Ingredient, db.get_ingredient_by_name(target_name)?.id)
    };

    let updated = db.add_recipe_line(
        recipe.id,
        RecipeLine {
            kind,
            id: target_id,
            quantity_in_grams: grams,
        },
    )?;

    if json {
        println!("{}", serde_json::to_string_pretty(&updated)?);
    } else {
        println!("Added {grams:.0}g of {target_name} to {recipe_name}");
    }
    Ok(())
}

pub(crate) fn cmd_recipe_remove_line(
    db: &Database,
    recipe_name: &str,
    target_name: &str,
    sub_recipe: bool,
    json: bool,
) -> Result<()> {
    let recipe = db.get_recipe_by_name(recipe_name)?;
    let (kind, target_id) = if sub_recipe {
        (LineKind::Recipe, db.get_recipe_by_name(target_name)?.id)
    } else {
        (LineKind::Ingredient, db.get_ingredient_by_name(target_name)?.id)
    };

    if db.remove_recipe_line(recipe.id, kind, target_id)? {
        if json {
            println!("{}", serde_json::json!({ "removed": target_name }));
        } else {
            println!("Removed {target_name} from {recipe_name}");
        }
        Ok(())
    } else {
        if json {
            println!(
                "{}",
                json_error(&format!("'{target_name}' is not a line of '{recipe_name}'"))
            );
        } else {
            eprintln!("'{target_name}' is not a line of '{recipe_name}'");
        }
        process::exit(2);
    }
}

pub(crate) fn cmd_recipe_set_notes(
    db: &Database,
    recipe_name: &str,
    notes: Option<&str>,
    json: bool,
) -> Result<()> {
    let recipe = db.get_recipe_by_name(recipe_name)?;
    db.set_recipe_notes(recipe.id, notes)?;

    if json {
        let updated = db.get_recipe_by_id(recipe.id)?;
        println!("{}", serde_json::to_string_pretty(&updated)?);
    } else if notes.is_some() {
        println!("Updated notes for {recipe_name}");
    } else {
        println!("Cleared notes for {recipe_name}");
    }
    Ok(())
}

pub(crate) fn cmd_recipe_show(db: &Database, recipe_name: &str, json: bool) -> Result<()> {
    let recipe = db.get_recipe_by_name(recipe_name)?;
    let cost = costing::recipe_cost(db, recipe.id)?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "recipe": recipe,
                "cost": cost,
            }))?
        );
        return Ok(());
    }

    let total_w = cost.total_weight_in_grams;
    let total_c = format_money(cost.total_cost);
    let cpg = cost.cost_per_gram;
    println!("=== {recipe_name} ===");
    if recipe.is_sub_recipe {
        println!("  (usable as a sub-recipe)");
    }
    println!("  Total: {total_w:.0}g for {total_c} ({cpg:.4}/g)\n");

    println!("  LINES:");
    for line in &cost.lines {
        let name = &line.name;
        let qty = line.quantity_in_grams;
        let line_cost = format_money(line.cost);
        let marker = match line.kind {
            LineKind::Ingredient => "",
            LineKind::Recipe => " (sub-recipe)",
        };
        println!("    {name}{marker} | {qty:.0}g | {line_cost}");
    }

    if let Some(notes) = &recipe.notes {
        println!("\n  NOTES: {notes}");
    }
    Ok(())
}

pub(crate) fn cmd_recipe_list(db: &Database, json: bool) -> Result<()> {
    let recipes = db.list_recipes()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&recipes)?);
        return Ok(());
    }

    if recipes.is_empty() {
        println!("No recipes yet. Create one with: crumb recipe create <name>");
        return Ok(());
    }

    #[derive(Tabled)]
    struct RecipeRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Sub-recipe")]
        sub: String,
        #[tabled(rename = "Lines")]
        lines: usize,
        #[tabled(rename = "Weight")]
        weight: String,
    }

    let rows: Vec<RecipeRow> = recipes
        .iter()
        .map(|r| RecipeRow {
            id: r.id,
            name: truncate(&r.name, 30),
            sub: if r.is_sub_recipe { "yes" } else { "-" }.to_string(),
            lines: r.lines.len(),
            weight: format!(
                "{:.0}g",
                r.lines.iter().map(|l| l.quantity_in_grams).sum::<f64>()
            ),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(3..5)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    Ok(())
}

pub(crate) fn cmd_recipe_cost(db: &Database, recipe_name: &str, json: bool) -> Result<()> {
    let recipe = db.get_recipe_by_name(recipe_name)?;
    let cost = costing::recipe_cost(db, recipe.id)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&cost)?);
        return Ok(());
    }

    #[derive(Tabled)]
    struct LineRow {
        #[tabled(rename = "Line")]
        name: String,
        #[tabled(rename = "Kind")]
        kind: String,
        #[tabled(rename = "Quantity")]
        quantity: String,
        #[tabled(rename = "Cost")]
        cost: String,
    }

    let rows: Vec<LineRow> = cost
        .lines
        .iter()
        .map(|l| LineRow {
            name: truncate(&l.name, 30),
            kind: l.kind.to_string(),
            quantity: format!("{:.0}g", l.quantity_in_grams),
            cost: format_money(l.cost),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(2..4)).with(Alignment::right()))
        .to_string();
    println!("{table}");

    let total_c = format_money(cost.total_cost);
    let total_w = cost.total_weight_in_grams;
    let cpg = cost.cost_per_gram;
    println!("Total: {total_c} for {total_w:.0}g ({cpg:.4}/g)");
    Ok(())
}

pub(crate) fn cmd_recipe_delete(db: &Database, recipe_name: &str, json: bool) -> Result<()> {
    let recipe = db.get_recipe_by_name(recipe_name)?;
    if db.delete_recipe(recipe.id)? {
        if json {
            println!("{}", serde_json::json!({ "deleted": recipe_name }));
        } else {
            println!("Deleted recipe: {recipe_name}");
        }
        Ok(())
    } else {
        if json {
            println!("{}", json_error(&format!("Recipe '{recipe_name}' not found")));
        } else {
            eprintln!("Recipe '{recipe_name}' not found");
        }
        process::exit(2);
    }
}

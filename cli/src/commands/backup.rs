use anyhow::{Context, Result};
use std::path::Path;

use crumb_core::db::Database;
use crumb_core::models::ExportData;

pub(crate) fn cmd_backup_export(db: &Database, output: Option<&Path>) -> Result<()> {
    let data = db.export_all(env!("CARGO_PKG_VERSION"))?;
    let json = serde_json::to_string_pretty(&data)?;

    match output {
        Some(path) => {
            std::fs::write(path, &json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            let ingredients = data.ingredients.len();
            let recipes = data.recipes.len();
            let products = data.products.len();
            eprintln!(
                "Exported {ingredients} ingredients, {recipes} recipes, {products} products to {}",
                path.display()
            );
        }
        None => println!("{json}"),
    }
    Ok(())
}

pub(crate) fn cmd_backup_import(db: &Database, file: &Path, json: bool) -> Result<()> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let data: ExportData =
        serde_json::from_str(&raw).with_context(|| format!("Invalid export file: {}", file.display()))?;

    let summary = db.import_all(&data)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    let ing_a = summary.ingredients_added;
    let ing_u = summary.ingredients_updated;
    let rec_a = summary.recipes_added;
    let rec_u = summary.recipes_updated;
    let prod_a = summary.products_added;
    let prod_u = summary.products_updated;
    let grp_a = summary.groups_added;
    let grp_u = summary.groups_updated;
    let set_w = summary.settings_written;
    println!("Import complete:");
    println!("  Ingredients: {ing_a} added, {ing_u} updated");
    println!("  Recipes:     {rec_a} added, {rec_u} updated");
    println!("  Products:    {prod_a} added, {prod_u} updated");
    println!("  Groups:      {grp_a} added, {grp_u} updated");
    println!("  Settings:    {set_w} written");
    Ok(())
}

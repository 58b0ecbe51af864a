use anyhow::Result;
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use crumb_core::costing;
use crumb_core::db::Database;

use super::helpers::{format_money, json_error, truncate};

pub(crate) fn cmd_group_create(
    db: &Database,
    name: &str,
    group_type: Option<&str>,
    json: bool,
) -> Result<()> {
    let group = db.create_analysis_group(name, group_type)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&group)?);
    } else {
        let id = group.id;
        let kind = &group.group_type;
        println!("Created group: {name} (id: {id}, type: {kind})");
    }
    Ok(())
}

pub(crate) fn cmd_group_add_product(
    db: &Database,
    group_name: &str,
    product_name: &str,
    json: bool,
) -> Result<()> {
    let group = db.get_analysis_group_by_name(group_name)?;
    let product = db.get_product_by_name(product_name)?;

    if db.add_group_product(group.id, product.id)? {
        if json {
            println!("{}", serde_json::json!({ "added": product_name }));
        } else {
            println!("Added {product_name} to {group_name}");
        }
    } else if json {
        println!("{}", serde_json::json!({ "added": serde_json::Value::Null }));
    } else {
        println!("{product_name} is already in {group_name}");
    }
    Ok(())
}

pub(crate) fn cmd_group_remove_product(
    db: &Database,
    group_name: &str,
    product_name: &str,
    json: bool,
) -> Result<()> {
    let group = db.get_analysis_group_by_name(group_name)?;
    let product = db.get_product_by_name(product_name)?;

    if db.remove_group_product(group.id, product.id)? {
        if json {
            println!("{}", serde_json::json!({ "removed": product_name }));
        } else {
            println!("Removed {product_name} from {group_name}");
        }
        Ok(())
    } else {
        if json {
            println!(
                "{}",
                json_error(&format!("'{product_name}' is not in '{group_name}'"))
            );
        } else {
            eprintln!("'{product_name}' is not in '{group_name}'");
        }
        process::exit(2);
    }
}

pub(crate) fn cmd_group_show(db: &Database, name: &str, json: bool) -> Result<()> {
    let group = db.get_analysis_group_by_name(name)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&group)?);
        return Ok(());
    }

    let kind = &group.group_type;
    let count = group.products.len();
    println!("=== {name} ===");
    println!("  Type: {kind}  |  Products: {count}\n");
    for product_id in &group.products {
        let product = db.get_product_by_id(*product_id)?;
        let cost = costing::product_cost(db, product.id)?;
        let pname = &product.name;
        let price = format_money(product.price);
        let margin = format_money(cost.margin);
        println!("    {pname} | {price} | margin {margin}");
    }
    Ok(())
}

pub(crate) fn cmd_group_list(db: &Database, json: bool) -> Result<()> {
    let groups = db.list_analysis_groups()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&groups)?);
        return Ok(());
    }

    if groups.is_empty() {
        println!("No groups yet. Create one with: crumb group create <name>");
        return Ok(());
    }

    #[derive(Tabled)]
    struct GroupRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Type")]
        group_type: String,
        #[tabled(rename = "Products")]
        products: usize,
    }

    let rows: Vec<GroupRow> = groups
        .iter()
        .map(|g| GroupRow {
            id: g.id,
            name: truncate(&g.name, 30),
            group_type: g.group_type.clone(),
            products: g.products.len(),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(3..4)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    Ok(())
}

pub(crate) fn cmd_group_allocate(
    db: &Database,
    name: &str,
    overhead: f64,
    json: bool,
) -> Result<()> {
    let group = db.get_analysis_group_by_name(name)?;
    let shares = costing::allocate_overhead(db, group.id, overhead)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&shares)?);
        return Ok(());
    }

    if shares.is_empty() {
        println!("Group '{name}' has no products to allocate across.");
        return Ok(());
    }

    #[derive(Tabled)]
    struct ShareRow {
        #[tabled(rename = "Product")]
        name: String,
        #[tabled(rename = "Weight")]
        weight: String,
        #[tabled(rename = "Share")]
        share: String,
    }

    let rows: Vec<ShareRow> = shares
        .iter()
        .map(|s| ShareRow {
            name: truncate(&s.name, 30),
            weight: format!("{:.0}g", s.weight_in_grams),
            share: format_money(s.share),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..3)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    println!("Allocated {overhead:.2} across {name} by product weight");
    Ok(())
}

pub(crate) fn cmd_group_delete(db: &Database, name: &str, json: bool) -> Result<()> {
    let group = db.get_analysis_group_by_name(name)?;
    if db.delete_analysis_group(group.id)? {
        if json {
            println!("{}", serde_json::json!({ "deleted": name }));
        } else {
            println!("Deleted group: {name}");
        }
        Ok(())
    } else {
        if json {
            println!("{}", json_error(&format!("Group '{name}' not found")));
        } else {
            eprintln!("Group '{name}' not found");
        }
        process::exit(2);
    }
}

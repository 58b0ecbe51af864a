use anyhow::Result;
use std::process;
use tabled::{Table, Tabled, settings::Style};

use crumb_core::db::Database;

use super::helpers::{json_error, truncate};

pub(crate) fn cmd_setting_get(db: &Database, key: &str, json: bool) -> Result<()> {
    match db.get_setting(key)? {
        Some(value) => {
            if json {
                println!("{}", serde_json::json!({ "key": key, "value": value }));
            } else {
                println!("{value}");
            }
            Ok(())
        }
        None => {
            if json {
                println!("{}", json_error(&format!("Setting '{key}' not set")));
            } else {
                eprintln!("Setting '{key}' not set");
            }
            process::exit(2);
        }
    }
}

pub(crate) fn cmd_setting_set(db: &Database, key: &str, value: &str, json: bool) -> Result<()> {
    db.set_setting(key, value)?;
    if json {
        println!("{}", serde_json::json!({ "key": key, "value": value }));
    } else {
        println!("{key} = {value}");
    }
    Ok(())
}

pub(crate) fn cmd_setting_list(db: &Database, json: bool) -> Result<()> {
    let settings = db.list_settings()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&settings)?);
        return Ok(());
    }

    if settings.is_empty() {
        println!("No settings stored.");
        return Ok(());
    }

    #[derive(Tabled)]
    struct SettingRow {
        #[tabled(rename = "Key")]
        key: String,
        #[tabled(rename = "Value")]
        value: String,
    }

    let rows: Vec<SettingRow> = settings
        .iter()
        .map(|s| SettingRow {
            key: s.key.clone(),
            value: truncate(&s.value, 50),
        })
        .collect();

    let table = Table::new(&rows).with(Style::rounded()).to_string();
    println!("{table}");
    Ok(())
}

pub(crate) fn cmd_setting_delete(db: &Database, key: &str, json: bool) -> Result<()> {
    if db.delete_setting(key)? {
        if json {
            println!("{}", serde_json::json!({ "deleted": key }));
        } else {
            println!("Deleted setting: {key}");
        }
        Ok(())
    } else {
        if json {
            println!("{}", json_error(&format!("Setting '{key}' not set")));
        } else {
            eprintln!("Setting '{key}' not set");
        }
        process::exit(2);
    }
}

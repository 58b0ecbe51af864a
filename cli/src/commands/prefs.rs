use anyhow::Result;

use crumb_core::db::Database;
use crumb_core::prefs::{AppMode, AppState, Font, Theme};

pub(crate) fn cmd_prefs_show(db: &Database, json: bool) -> Result<()> {
    let state = AppState::load(db)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&state)?);
        return Ok(());
    }

    let mode = state.mode;
    let theme = state.theme;
    let font = state.font;
    println!("Mode: {mode}  |  Theme: {theme}  |  Font: {font}");
    if state.welcome_dismissed {
        println!("Advance-mode welcome: dismissed");
    }
    Ok(())
}

pub(crate) fn cmd_prefs_set_theme(db: &Database, theme: &str, json: bool) -> Result<()> {
    let theme: Theme = theme.parse()?;
    let mut state = AppState::load(db)?;
    state.set_theme(db, theme)?;

    if json {
        println!("{}", serde_json::json!({ "theme": theme.as_str() }));
    } else {
        println!("Theme set to {theme}");
    }
    Ok(())
}

pub(crate) fn cmd_prefs_set_font(db: &Database, font: &str, json: bool) -> Result<()> {
    let font: Font = font.parse()?;
    let mut state = AppState::load(db)?;
    state.set_font(db, font)?;

    if json {
        println!("{}", serde_json::json!({ "font": font.as_str() }));
    } else {
        println!("Font set to {font}");
    }
    Ok(())
}

pub(crate) fn cmd_prefs_set_mode(db: &Database, mode: &str, json: bool) -> Result<()> {
    let mode: AppMode = mode.parse()?;
    let mut state = AppState::load(db)?;
    state.set_mode(db, mode)?;

    if json {
        println!(
            "{}",
            serde_json::json!({ "mode": mode.as_str(), "show_welcome": state.show_welcome })
        );
        return Ok(());
    }

    println!("Mode set to {mode}");
    if state.show_welcome {
        println!();
        println!("Welcome to advance mode! Products, groups and overhead tooling");
        println!("are now available. Dismiss this message for good with:");
        println!("  crumb prefs dismiss-welcome");
    }
    Ok(())
}

pub(crate) fn cmd_prefs_dismiss_welcome(db: &Database, json: bool) -> Result<()> {
    let mut state = AppState::load(db)?;
    state.dismiss_welcome(db)?;

    if json {
        println!("{}", serde_json::json!({ "welcome_dismissed": true }));
    } else {
        println!("Advance-mode welcome dismissed.");
    }
    Ok(())
}

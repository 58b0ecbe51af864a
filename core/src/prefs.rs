//! User preferences persisted in the settings collection.
//!
//! Preferences live as flat key/value settings under stable keys and are
//! loaded into an explicit [`AppState`] value that the front end owns and
//! passes around. Unknown persisted values fall back to the defaults
//! instead of failing the load; strict parsing is reserved for values the
//! user types in.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::db::Database;
use crate::error::{StoreError, StoreResult};

pub const APP_MODE_KEY: &str = "user-app-mode";
pub const THEME_KEY: &str = "user-selected-theme";
pub const FONT_KEY: &str = "user-selected-font";
pub const WELCOME_DISMISSED_KEY: &str = "advance-welcome-dismissed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AppMode {
    /// Ingredients and recipes only.
    #[default]
    Basic,
    /// Adds products, analysis groups and overhead tooling.
    Advance,
}

impl AppMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AppMode::Basic => "basic",
            AppMode::Advance => "advance",
        }
    }

    fn from_stored(value: Option<&str>) -> Self {
        match value {
            Some("advance") => AppMode::Advance,
            _ => AppMode::Basic,
        }
    }
}

impl fmt::Display for AppMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppMode {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "basic" => Ok(AppMode::Basic),
            "advance" => Ok(AppMode::Advance),
            other => Err(StoreError::constraint(format!(
                "unknown app mode '{other}' (expected 'basic' or 'advance')"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    #[must_use]
    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    fn from_stored(value: Option<&str>) -> Self {
        match value {
            Some("dark") => Theme::Dark,
            _ => Theme::Light,
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(StoreError::constraint(format!(
                "unknown theme '{other}' (expected 'light' or 'dark')"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Font {
    #[default]
    Sarabun,
    Mali,
}

impl Font {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Font::Sarabun => "sarabun",
            Font::Mali => "mali",
        }
    }

    fn from_stored(value: Option<&str>) -> Self {
        match value {
            Some("mali") => Font::Mali,
            _ => Font::Sarabun,
        }
    }
}

impl fmt::Display for Font {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Font {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sarabun" => Ok(Font::Sarabun),
            "mali" => Ok(Font::Mali),
            other => Err(StoreError::constraint(format!(
                "unknown font '{other}' (expected 'sarabun' or 'mali')"
            ))),
        }
    }
}

/// The loaded preference state. Mutations go through the methods so that
/// the persisted settings and the in-memory value stay in sync.
#[derive(Debug, Clone, Serialize)]
pub struct AppState {
    pub mode: AppMode,
    pub theme: Theme,
    pub font: Font,
    /// Once set the advance-mode welcome never shows again.
    pub welcome_dismissed: bool,
    /// Session-only flag raised on the first switch into advance mode.
    /// Never persisted.
    #[serde(skip)]
    pub show_welcome: bool,
}

impl AppState {
    pub fn load(db: &Database) -> StoreResult<Self> {
        Ok(AppState {
            mode: AppMode::from_stored(db.get_setting(APP_MODE_KEY)?.as_deref()),
            theme: Theme::from_stored(db.get_setting(THEME_KEY)?.as_deref()),
            font: Font::from_stored(db.get_setting(FONT_KEY)?.as_deref()),
            welcome_dismissed: db.get_setting(WELCOME_DISMISSED_KEY)?.as_deref() == Some("true"),
            show_welcome: false,
        })
    }

    pub fn set_mode(&mut self, db: &Database, mode: AppMode) -> StoreResult<()> {
        if self.mode == AppMode::Basic && mode == AppMode::Advance && !self.welcome_dismissed {
            self.show_welcome = true;
        }
        if mode == AppMode::Basic {
            self.show_welcome = false;
        }
        self.mode = mode;
        db.set_setting(APP_MODE_KEY, mode.as_str())
    }

    pub fn set_theme(&mut self, db: &Database, theme: Theme) -> StoreResult<()> {
        self.theme = theme;
        db.set_setting(THEME_KEY, theme.as_str())
    }

    pub fn toggle_theme(&mut self, db: &Database) -> StoreResult<Theme> {
        let next = self.theme.toggled();
        self.set_theme(db, next)?;
        Ok(next)
    }

    pub fn set_font(&mut self, db: &Database, font: Font) -> StoreResult<()> {
        self.font = font;
        db.set_setting(FONT_KEY, font.as_str())
    }

    pub fn dismiss_welcome(&mut self, db: &Database) -> StoreResult<()> {
        self.welcome_dismissed = true;
        self.show_welcome = false;
        db.set_setting(WELCOME_DISMISSED_KEY, "true")
    }
}

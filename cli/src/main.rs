mod commands;
mod config;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::process;

use crate::commands::{
    cmd_backup_export, cmd_backup_import, cmd_group_add_product, cmd_group_allocate,
    cmd_group_create, cmd_group_delete, cmd_group_list, cmd_group_remove_product, cmd_group_show,
    cmd_ingredient_add, cmd_ingredient_delete, cmd_ingredient_list, cmd_ingredient_set_price,
    cmd_ingredient_set_standard_weight, cmd_ingredient_set_yield, cmd_ingredient_show,
    cmd_prefs_dismiss_welcome, cmd_prefs_set_font, cmd_prefs_set_mode, cmd_prefs_set_theme,
    cmd_prefs_show, cmd_product_add, cmd_product_break_even, cmd_product_delete, cmd_product_list,
    cmd_product_set, cmd_product_show, cmd_recipe_add_line, cmd_recipe_cost, cmd_recipe_create,
    cmd_recipe_delete, cmd_recipe_list, cmd_recipe_remove_line, cmd_recipe_set_notes,
    cmd_recipe_show, cmd_setting_delete, cmd_setting_get, cmd_setting_list, cmd_setting_set,
};
use crate::config::Config;
use crumb_core::db::Database;

#[derive(Parser)]
#[command(
    name = "crumb",
    version,
    about = "A bakery cost calculator CLI",
    long_about = "\n\n   ██████╗██████╗ ██╗   ██╗███╗   ███╗██████╗
  ██╔════╝██╔══██╗██║   ██║████╗ ████║██╔══██╗
  ██║     ██████╔╝██║   ██║██╔████╔██║██████╔╝
  ██║     ██╔══██╗██║   ██║██║╚██╔╝██║██╔══██╗
  ╚██████╗██║  ██║╚██████╔╝██║ ╚═╝ ██║██████╔╝
   ╚═════╝╚═╝  ╚═╝ ╚═════╝ ╚═╝     ╚═╝╚═════╝
        know what your bakes cost.
"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage purchasable ingredients
    Ingredient {
        #[command(subcommand)]
        command: IngredientCommands,
    },
    /// Manage recipes and their ingredient lines
    Recipe {
        #[command(subcommand)]
        command: RecipeCommands,
    },
    /// Manage sellable products (a recipe at a weight and a price)
    Product {
        #[command(subcommand)]
        command: ProductCommands,
    },
    /// Group products for overhead allocation and reporting
    Group {
        #[command(subcommand)]
        command: GroupCommands,
    },
    /// Read and write raw key/value settings
    Setting {
        #[command(subcommand)]
        command: SettingCommands,
    },
    /// App preferences (mode, theme, font)
    Prefs {
        #[command(subcommand)]
        command: PrefsCommands,
    },
    /// Export and import the whole store as JSON
    Backup {
        #[command(subcommand)]
        command: BackupCommands,
    },
}

#[derive(Subcommand)]
enum IngredientCommands {
    /// Add an ingredient with its purchase size and price
    Add {
        /// Ingredient name (unique)
        name: String,
        /// Purchase size (e.g. "1kg", "500g", "1 lb")
        quantity: String,
        /// Purchase price
        price: f64,
        /// Usable percentage of the purchase, (0, 100] (default: 100)
        #[arg(long = "yield")]
        default_yield: Option<f64>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List/search ingredients
    List {
        /// Filter by name substring
        #[arg(short, long)]
        search: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one ingredient
    Show {
        /// Ingredient name
        name: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change the purchase size and price (re-derives cost per gram)
    SetPrice {
        /// Ingredient name
        name: String,
        /// Purchase size (e.g. "1kg", "500g")
        quantity: String,
        /// Purchase price
        price: f64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change the yield percentage
    SetYield {
        /// Ingredient name
        name: String,
        /// Usable percentage, (0, 100]
        #[arg(value_name = "PERCENT")]
        default_yield: f64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Cost in whole units of a standard weight (eggs, gelatin sheets)
    SetStandardWeight {
        /// Ingredient name
        name: String,
        /// Standard weight of one unit in grams
        weight: Option<f64>,
        /// Go back to exact per-gram costing
        #[arg(long, conflicts_with = "weight")]
        clear: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete an ingredient (refused while recipes use it)
    Delete {
        /// Ingredient name
        name: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum RecipeCommands {
    /// Create an empty recipe
    Create {
        /// Recipe name (unique)
        name: String,
        /// Allow this recipe to be used as a line in other recipes
        #[arg(long)]
        sub_recipe: bool,
        /// Free-form notes
        #[arg(long)]
        notes: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add an ingredient (or sub-recipe) line
    AddLine {
        /// Recipe name
        recipe: String,
        /// Ingredient name, or recipe name with --sub-recipe
        ingredient: String,
        /// Quantity (e.g. "500g", "1.5 kg")
        quantity: String,
        /// The line references a sub-recipe instead of an ingredient
        #[arg(long)]
        sub_recipe: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove a line
    RemoveLine {
        /// Recipe name
        recipe: String,
        /// Ingredient name, or recipe name with --sub-recipe
        ingredient: String,
        /// The line references a sub-recipe instead of an ingredient
        #[arg(long)]
        sub_recipe: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Set or clear the notes
    SetNotes {
        /// Recipe name
        recipe: String,
        /// New notes (omit to clear)
        notes: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a recipe's lines and cost
    Show {
        /// Recipe name
        recipe: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List all recipes
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Full cost breakdown, sub-recipes resolved
    Cost {
        /// Recipe name
        recipe: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a recipe (refused while referenced)
    Delete {
        /// Recipe name
        recipe: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ProductCommands {
    /// Add a product backed by a recipe
    Add {
        /// Product name (unique)
        name: String,
        /// Backing recipe name
        recipe: String,
        /// Sold weight in grams
        weight: f64,
        /// Selling price
        price: f64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List all products
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a product with its cost and margin
    Show {
        /// Product name
        name: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change weight and/or price
    Set {
        /// Product name
        name: String,
        /// New sold weight in grams
        #[arg(long)]
        weight: Option<f64>,
        /// New selling price
        #[arg(long)]
        price: Option<f64>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Units to sell before a fixed overhead is covered
    BreakEven {
        /// Product name
        name: String,
        /// Fixed overhead to cover
        overhead: f64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a product (refused while grouped)
    Delete {
        /// Product name
        name: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum GroupCommands {
    /// Create an analysis group
    Create {
        /// Group name (unique)
        name: String,
        /// Group type label (default: general)
        #[arg(long = "type")]
        group_type: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add a product to a group
    AddProduct {
        /// Group name
        group: String,
        /// Product name
        product: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove a product from a group
    RemoveProduct {
        /// Group name
        group: String,
        /// Product name
        product: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a group and its products
    Show {
        /// Group name
        name: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List all groups
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Split a fixed overhead across the group by product weight
    Allocate {
        /// Group name
        name: String,
        /// Fixed overhead to allocate
        overhead: f64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a group (its products stay)
    Delete {
        /// Group name
        name: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum SettingCommands {
    /// Read one setting
    Get {
        /// Setting key
        key: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Write one setting (last write wins)
    Set {
        /// Setting key
        key: String,
        /// Setting value
        value: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List all settings
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete one setting
    Delete {
        /// Setting key
        key: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum PrefsCommands {
    /// Show the current preferences
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Set the theme: light or dark
    SetTheme {
        /// Theme name
        theme: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Set the font: sarabun or mali
    SetFont {
        /// Font name
        font: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Set the app mode: basic or advance
    SetMode {
        /// Mode name
        mode: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Permanently dismiss the advance-mode welcome
    DismissWelcome {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum BackupCommands {
    /// Write the whole store as JSON
    Export {
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<std::path::PathBuf>,
    },
    /// Merge a JSON export into the store (matched by name)
    Import {
        /// Path to the export file
        file: std::path::PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

#[allow(clippy::too_many_lines)]
fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let db = Database::open(&config.db_path)?;

    match cli.command {
        Commands::Ingredient { command } => match command {
            IngredientCommands::Add {
                name,
                quantity,
                price,
                default_yield,
                json,
            } => cmd_ingredient_add(&db, &name, &quantity, price, default_yield, json),
            IngredientCommands::List { search, json } => {
                cmd_ingredient_list(&db, search.as_deref(), json)
            }
            IngredientCommands::Show { name, json } => cmd_ingredient_show(&db, &name, json),
            IngredientCommands::SetPrice {
                name,
                quantity,
                price,
                json,
            } => cmd_ingredient_set_price(&db, &name, &quantity, price, json),
            IngredientCommands::SetYield {
                name,
                default_yield,
                json,
            } => cmd_ingredient_set_yield(&db, &name, default_yield, json),
            IngredientCommands::SetStandardWeight {
                name,
                weight,
                clear,
                json,
            } => cmd_ingredient_set_standard_weight(&db, &name, weight, clear, json),
            IngredientCommands::Delete { name, json } => cmd_ingredient_delete(&db, &name, json),
        },
        Commands::Recipe { command } => match command {
            RecipeCommands::Create {
                name,
                sub_recipe,
                notes,
                json,
            } => cmd_recipe_create(&db, &name, sub_recipe, notes.as_deref(), json),
            RecipeCommands::AddLine {
                recipe,
                ingredient,
                quantity,
                sub_recipe,
                json,
            } => cmd_recipe_add_line(&db, &recipe, &ingredient, &quantity, sub_recipe, json),
            RecipeCommands::RemoveLine {
                recipe,
                ingredient,
                sub_recipe,
                json,
            } => cmd_recipe_remove_line(&db, &recipe, &ingredient, sub_recipe, json),
            RecipeCommands::SetNotes {
                recipe,
                notes,
                json,
            } => cmd_recipe_set_notes(&db, &recipe, notes.as_deref(), json),
            RecipeCommands::Show { recipe, json } => cmd_recipe_show(&db, &recipe, json),
            RecipeCommands::List { json } => cmd_recipe_list(&db, json),
            RecipeCommands::Cost { recipe, json } => cmd_recipe_cost(&db, &recipe, json),
            RecipeCommands::Delete { recipe, json } => cmd_recipe_delete(&db, &recipe, json),
        },
        Commands::Product { command } => match command {
            ProductCommands::Add {
                name,
                recipe,
                weight,
                price,
                json,
            } => cmd_product_add(&db, &name, &recipe, weight, price, json),
            ProductCommands::List { json } => cmd_product_list(&db, json),
            ProductCommands::Show { name, json } => cmd_product_show(&db, &name, json),
            ProductCommands::Set {
                name,
                weight,
                price,
                json,
            } => cmd_product_set(&db, &name, weight, price, json),
            ProductCommands::BreakEven {
                name,
                overhead,
                json,
            } => cmd_product_break_even(&db, &name, overhead, json),
            ProductCommands::Delete { name, json } => cmd_product_delete(&db, &name, json),
        },
        Commands::Group { command } => match command {
            GroupCommands::Create {
                name,
                group_type,
                json,
            } => cmd_group_create(&db, &name, group_type.as_deref(), json),
            GroupCommands::AddProduct {
                group,
                product,
                json,
            } => cmd_group_add_product(&db, &group, &product, json),
            GroupCommands::RemoveProduct {
                group,
                product,
                json,
            } => cmd_group_remove_product(&db, &group, &product, json),
            GroupCommands::Show { name, json } => cmd_group_show(&db, &name, json),
            GroupCommands::List { json } => cmd_group_list(&db, json),
            GroupCommands::Allocate {
                name,
                overhead,
                json,
            } => cmd_group_allocate(&db, &name, overhead, json),
            GroupCommands::Delete { name, json } => cmd_group_delete(&db, &name, json),
        },
        Commands::Setting { command } => match command {
            SettingCommands::Get { key, json } => cmd_setting_get(&db, &key, json),
            SettingCommands::Set { key, value, json } => cmd_setting_set(&db, &key, &value, json),
            SettingCommands::List { json } => cmd_setting_list(&db, json),
            SettingCommands::Delete { key, json } => cmd_setting_delete(&db, &key, json),
        },
        Commands::Prefs { command } => match command {
            PrefsCommands::Show { json } => cmd_prefs_show(&db, json),
            PrefsCommands::SetTheme { theme, json } => cmd_prefs_set_theme(&db, &theme, json),
            PrefsCommands::SetFont { font, json } => cmd_prefs_set_font(&db, &font, json),
            PrefsCommands::SetMode { mode, json } => cmd_prefs_set_mode(&db, &mode, json),
            PrefsCommands::DismissWelcome { json } => cmd_prefs_dismiss_welcome(&db, json),
        },
        Commands::Backup { command } => match command {
            BackupCommands::Export { output } => cmd_backup_export(&db, output.as_deref()),
            BackupCommands::Import { file, json } => cmd_backup_import(&db, &file, json),
        },
    }
}

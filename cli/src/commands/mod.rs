mod backup;
mod group;
mod helpers;
mod ingredient;
mod prefs;
mod product;
mod recipe;
mod settings;

pub(crate) use backup::{cmd_backup_export, cmd_backup_import};
pub(crate) use group::{
    cmd_group_add_product, cmd_group_allocate, cmd_group_create, cmd_group_delete, cmd_group_list,
    cmd_group_remove_product, cmd_group_show,
};
pub(crate) use ingredient::{
    cmd_ingredient_add, cmd_ingredient_delete, cmd_ingredient_list, cmd_ingredient_set_price,
    cmd_ingredient_set_standard_weight, cmd_ingredient_set_yield, cmd_ingredient_show,
};
pub(crate) use prefs::{
    cmd_prefs_dismiss_welcome, cmd_prefs_set_font, cmd_prefs_set_mode, cmd_prefs_set_theme,
    cmd_prefs_show,
};
pub(crate) use product::{
    cmd_product_add, cmd_product_break_even, cmd_product_delete, cmd_product_list,
    cmd_product_set, cmd_product_show,
};
pub(crate) use recipe::{
    cmd_recipe_add_line, cmd_recipe_cost, cmd_recipe_create, cmd_recipe_delete, cmd_recipe_list,
    cmd_recipe_remove_line, cmd_recipe_set_notes, cmd_recipe_show,
};
pub(crate) use settings::{cmd_setting_delete, cmd_setting_get, cmd_setting_list, cmd_setting_set};

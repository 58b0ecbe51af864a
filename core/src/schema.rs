//! Schema version registry.
//!
//! Every schema version the product has ever shipped is declared here, in
//! ascending order, as a full snapshot of the collections and their indexed
//! fields at that version, not as a diff. The upgrade engine in [`crate::db`]
//! computes the structural change between consecutive snapshots and replays
//! the missing steps on open. A version declaration is immutable once
//! shipped: a user's store may still be at that version, and the upgrade
//! path is the diff from their stamped version to the latest.
//!
//! Field semantics mirror the index-declaration model of the store this
//! schema history originated in (IndexedDB):
//! - adding a field adds a column and an index;
//! - removing a field from a declaration drops only the index; the column
//!   and its data survive unindexed;
//! - a collection absent from a version that the previous version declared
//!   is a tombstone: the table and its data are dropped;
//! - a collection reintroduced after a tombstone starts empty.
//!
//! Declaring a field never validates or migrates existing values; value
//! rewrites are the job of the per-version upgrade callbacks below.

use rusqlite::{Transaction, params};
use serde_json::Value;

use crate::error::{StoreError, StoreResult};

/// A one-time data-rewrite routine bound to a specific version transition.
///
/// Callbacks run inside the upgrade transaction, only when a persisted
/// installation crosses the transition, never on fresh installs and never on
/// re-open at the same version. They are written check-before-set so that a
/// double application would be harmless.
pub type UpgradeFn = fn(&Transaction<'_>) -> StoreResult<()>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Real,
    Text,
}

impl ColumnType {
    #[must_use]
    pub fn sql(self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Text => "TEXT",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldDecl {
    pub name: &'static str,
    pub ty: ColumnType,
}

/// A collection at one schema version: a generated integer id, a unique key
/// field, and the indexed fields.
#[derive(Clone, Copy, Debug)]
pub struct CollectionDecl {
    pub name: &'static str,
    pub key: FieldDecl,
    pub fields: &'static [FieldDecl],
}

impl CollectionDecl {
    pub(crate) fn has_field(&self, name: &str) -> bool {
        self.key.name == name || self.fields.iter().any(|f| f.name == name)
    }
}

/// One shipped schema version: the complete set of collections at that
/// version plus an optional data-rewrite callback.
#[derive(Clone, Copy)]
pub struct VersionDecl {
    pub version: i64,
    pub collections: &'static [CollectionDecl],
    pub upgrade: Option<UpgradeFn>,
}

const fn field(name: &'static str, ty: ColumnType) -> FieldDecl {
    FieldDecl { name, ty }
}

const NAME_KEY: FieldDecl = field("name", ColumnType::Text);

// --- Collection snapshots ---

const INGREDIENTS_V1: CollectionDecl = CollectionDecl {
    name: "ingredients",
    key: NAME_KEY,
    fields: &[
        field("purchase_unit", ColumnType::Text),
        field("purchase_quantity", ColumnType::Real),
        field("purchase_price", ColumnType::Real),
    ],
};

const INGREDIENTS_V2: CollectionDecl = CollectionDecl {
    name: "ingredients",
    key: NAME_KEY,
    fields: &[
        field("purchase_unit", ColumnType::Text),
        field("purchase_quantity", ColumnType::Real),
        field("purchase_price", ColumnType::Real),
        field("cost_per_gram", ColumnType::Real),
    ],
};

const INGREDIENTS_V8: CollectionDecl = CollectionDecl {
    name: "ingredients",
    key: NAME_KEY,
    fields: &[
        field("purchase_unit", ColumnType::Text),
        field("purchase_quantity", ColumnType::Real),
        field("purchase_price", ColumnType::Real),
        field("cost_per_gram", ColumnType::Real),
        field("default_yield", ColumnType::Real),
        field("cost_by_whole_unit", ColumnType::Integer),
        field("standard_weight_in_grams", ColumnType::Real),
    ],
};

const RECIPES_V3: CollectionDecl = CollectionDecl {
    name: "recipes",
    key: NAME_KEY,
    fields: &[
        field("is_sub_recipe", ColumnType::Integer),
        field("ingredients_list", ColumnType::Text),
    ],
};

const RECIPES_V6: CollectionDecl = CollectionDecl {
    name: "recipes",
    key: NAME_KEY,
    fields: &[
        field("is_sub_recipe", ColumnType::Integer),
        field("ingredients_list", ColumnType::Text),
        field("notes", ColumnType::Text),
    ],
};

const SETTINGS_V5: CollectionDecl = CollectionDecl {
    name: "settings",
    key: field("key", ColumnType::Text),
    fields: &[field("value", ColumnType::Text)],
};

const ANALYSIS_GROUPS_V9: CollectionDecl = CollectionDecl {
    name: "analysis_groups",
    key: NAME_KEY,
    fields: &[field("recipes", ColumnType::Text)],
};

const ANALYSIS_GROUPS_V10: CollectionDecl = CollectionDecl {
    name: "analysis_groups",
    key: NAME_KEY,
    fields: &[
        field("recipes", ColumnType::Text),
        field("group_type", ColumnType::Text),
    ],
};

// v11 retargeted groups from recipes to products by swapping the indexed
// field. Existing rows were not rewritten: the `recipes` column keeps its
// data unindexed and `products` stays NULL. That is the shipped history,
// reproduced here as-is rather than patched with an invented migration.
const ANALYSIS_GROUPS_V11: CollectionDecl = CollectionDecl {
    name: "analysis_groups",
    key: NAME_KEY,
    fields: &[
        field("group_type", ColumnType::Text),
        field("products", ColumnType::Text),
    ],
};

const ANALYSIS_GROUPS_V13: CollectionDecl = CollectionDecl {
    name: "analysis_groups",
    key: NAME_KEY,
    fields: &[
        field("group_type", ColumnType::Text),
        field("products", ColumnType::Text),
    ],
};

const PRODUCTS_V11: CollectionDecl = CollectionDecl {
    name: "products",
    key: NAME_KEY,
    fields: &[
        field("recipe", ColumnType::Integer),
        field("weight", ColumnType::Real),
        field("price", ColumnType::Real),
    ],
};

const PRODUCTS_V13: CollectionDecl = CollectionDecl {
    name: "products",
    key: NAME_KEY,
    fields: &[
        field("recipe_id", ColumnType::Integer),
        field("weight", ColumnType::Real),
        field("price", ColumnType::Real),
    ],
};

// --- Version history ---

pub const LATEST_VERSION: i64 = 13;

static HISTORY: [VersionDecl; 13] = [
    VersionDecl {
        version: 1,
        collections: &[INGREDIENTS_V1],
        upgrade: None,
    },
    VersionDecl {
        version: 2,
        collections: &[INGREDIENTS_V2],
        upgrade: Some(upgrade_v2_derive_cost_per_gram),
    },
    VersionDecl {
        version: 3,
        collections: &[INGREDIENTS_V2, RECIPES_V3],
        upgrade: None,
    },
    // Structure unchanged; the line-entry data format changed from
    // name-keyed objects to id references.
    VersionDecl {
        version: 4,
        collections: &[INGREDIENTS_V2, RECIPES_V3],
        upgrade: Some(upgrade_v4_rewrite_recipe_lines),
    },
    VersionDecl {
        version: 5,
        collections: &[INGREDIENTS_V2, RECIPES_V3, SETTINGS_V5],
        upgrade: None,
    },
    VersionDecl {
        version: 6,
        collections: &[INGREDIENTS_V2, RECIPES_V6, SETTINGS_V5],
        upgrade: None,
    },
    // Identical re-declaration; data-only normalization pass.
    VersionDecl {
        version: 7,
        collections: &[INGREDIENTS_V2, RECIPES_V6, SETTINGS_V5],
        upgrade: Some(upgrade_v7_normalize_sub_recipe_flag),
    },
    VersionDecl {
        version: 8,
        collections: &[INGREDIENTS_V8, RECIPES_V6, SETTINGS_V5],
        upgrade: Some(upgrade_v8_ingredient_defaults),
    },
    VersionDecl {
        version: 9,
        collections: &[INGREDIENTS_V8, RECIPES_V6, SETTINGS_V5, ANALYSIS_GROUPS_V9],
        upgrade: None,
    },
    VersionDecl {
        version: 10,
        collections: &[INGREDIENTS_V8, RECIPES_V6, SETTINGS_V5, ANALYSIS_GROUPS_V10],
        upgrade: Some(upgrade_v10_default_group_type),
    },
    VersionDecl {
        version: 11,
        collections: &[
            INGREDIENTS_V8,
            RECIPES_V6,
            SETTINGS_V5,
            ANALYSIS_GROUPS_V11,
            PRODUCTS_V11,
        ],
        upgrade: None,
    },
    // analysis_groups tombstoned.
    VersionDecl {
        version: 12,
        collections: &[INGREDIENTS_V8, RECIPES_V6, SETTINGS_V5, PRODUCTS_V11],
        upgrade: None,
    },
    VersionDecl {
        version: 13,
        collections: &[
            INGREDIENTS_V8,
            RECIPES_V6,
            SETTINGS_V5,
            PRODUCTS_V13,
            ANALYSIS_GROUPS_V13,
        ],
        upgrade: Some(upgrade_v13_product_recipe_id),
    },
];

/// The full shipped version history, ascending.
#[must_use]
pub fn history() -> &'static [VersionDecl] {
    &HISTORY
}

// --- Upgrade callbacks ---

/// v1 → v2: derive `cost_per_gram` for every ingredient that predates the
/// field. Row-by-row to bound memory on large stores.
fn upgrade_v2_derive_cost_per_gram(tx: &Transaction<'_>) -> StoreResult<()> {
    let ids: Vec<i64> = {
        let mut stmt = tx.prepare("SELECT id FROM ingredients WHERE cost_per_gram IS NULL")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        rows.collect::<Result<Vec<_>, _>>()?
    };
    for id in ids {
        let (quantity, price): (Option<f64>, Option<f64>) = tx.query_row(
            "SELECT purchase_quantity, purchase_price FROM ingredients WHERE id = ?1",
            params![id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        if let (Some(q), Some(p)) = (quantity, price) {
            if q > 0.0 {
                tx.execute(
                    "UPDATE ingredients SET cost_per_gram = ?1 WHERE id = ?2",
                    params![p / q, id],
                )?;
            }
        }
    }
    Ok(())
}

/// v3 → v4: rewrite legacy name-keyed line entries
/// (`{"name": "flour", "quantity": 500}`) into id references
/// (`{"kind": "ingredient", "id": 3, "quantity_in_grams": 500.0}`).
///
/// Entries already in the new shape are left alone. A legacy entry naming
/// an ingredient that no longer exists fails the whole upgrade: a partially
/// rewritten store would be worse than a loud failure.
fn upgrade_v4_rewrite_recipe_lines(tx: &Transaction<'_>) -> StoreResult<()> {
    let ids: Vec<i64> = {
        let mut stmt = tx.prepare("SELECT id FROM recipes WHERE ingredients_list IS NOT NULL")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        rows.collect::<Result<Vec<_>, _>>()?
    };
    for id in ids {
        let raw: String = tx.query_row(
            "SELECT ingredients_list FROM recipes WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )?;
        let entries: Vec<Value> = serde_json::from_str(&raw)?;
        let mut changed = false;
        let mut rewritten = Vec::with_capacity(entries.len());
        for entry in entries {
            if entry.get("kind").is_some() {
                rewritten.push(entry);
                continue;
            }
            let name = entry
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    StoreError::Corrupt(format!("recipe {id} has an unrecognized line entry"))
                })?
                .to_string();
            let quantity = entry
                .get("quantity")
                .and_then(Value::as_f64)
                .unwrap_or(0.0);
            let ingredient_id: i64 = tx
                .query_row(
                    "SELECT id FROM ingredients WHERE name = ?1",
                    params![name],
                    |row| row.get(0),
                )
                .map_err(|_| StoreError::not_found("ingredient", &name))?;
            rewritten.push(serde_json::json!({
                "kind": "ingredient",
                "id": ingredient_id,
                "quantity_in_grams": quantity,
            }));
            changed = true;
        }
        if changed {
            tx.execute(
                "UPDATE recipes SET ingredients_list = ?1 WHERE id = ?2",
                params![serde_json::to_string(&rewritten)?, id],
            )?;
        }
    }
    Ok(())
}

/// v6 → v7: normalize `is_sub_recipe` to 0/1. Early releases stored the
/// flag loosely; cost resolution needs it boolean.
fn upgrade_v7_normalize_sub_recipe_flag(tx: &Transaction<'_>) -> StoreResult<()> {
    tx.execute_batch(
        "UPDATE recipes SET is_sub_recipe = 0 WHERE is_sub_recipe IS NULL;
         UPDATE recipes SET is_sub_recipe = 1 WHERE is_sub_recipe NOT IN (0, 1);",
    )?;
    Ok(())
}

/// v7 → v8: introduce `default_yield` (100), `cost_by_whole_unit` (false)
/// and `standard_weight_in_grams` (null) on every existing ingredient.
/// The WHERE guards make a re-application a no-op.
fn upgrade_v8_ingredient_defaults(tx: &Transaction<'_>) -> StoreResult<()> {
    tx.execute_batch(
        "UPDATE ingredients SET default_yield = 100.0 WHERE default_yield IS NULL;
         UPDATE ingredients SET cost_by_whole_unit = 0 WHERE cost_by_whole_unit IS NULL;",
    )?;
    Ok(())
}

/// v9 → v10: introduce `group_type` with the "general" default.
fn upgrade_v10_default_group_type(tx: &Transaction<'_>) -> StoreResult<()> {
    tx.execute_batch(
        "UPDATE analysis_groups SET group_type = 'general' WHERE group_type IS NULL;",
    )?;
    Ok(())
}

/// v12 → v13: products renamed their recipe reference from `recipe` to
/// `recipe_id`; copy the old values across where not already set.
fn upgrade_v13_product_recipe_id(tx: &Transaction<'_>) -> StoreResult<()> {
    tx.execute_batch(
        "UPDATE products SET recipe_id = recipe WHERE recipe_id IS NULL AND recipe IS NOT NULL;",
    )?;
    Ok(())
}

//! Embedded versioned store and cost arithmetic for the `crumb` bakery
//! costing tools. The database schema carries its full version history;
//! opening a store replays any versions it is missing.

pub mod costing;
pub mod db;
pub mod error;
pub mod models;
pub mod prefs;
pub mod schema;
pub mod service;

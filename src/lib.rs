//! EVE Online industry planner
//!
//! Expands a blueprint's recipe tree into the raw materials it consumes and
//! finds the cheapest set of compressed ores that refines into them.

pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod logging;
pub mod models;
pub mod optimizer;
pub mod resolver;
pub mod sample;

pub use catalog::{Catalog, CatalogBuilder, OreRecord};
pub use config::{DemandScope, PlannerConfig};
pub use error::{PlanError, PlanResult};
pub use models::{DemandVector, ItemId, ItemQuantity, OrePlan, SolveOutcome};
pub use optimizer::OrePlanner;
pub use resolver::Resolver;

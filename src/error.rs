//! Planning errors

use thiserror::Error;

use crate::models::ItemId;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PlanError {
    #[error("item {0} is not in the catalog")]
    UnknownItem(ItemId),

    #[error("blueprint {0} is not in the catalog")]
    UnknownBlueprint(ItemId),

    #[error("item {item} is manufacturable but its source blueprint {blueprint} is missing")]
    MissingSourceBlueprint { item: ItemId, blueprint: ItemId },

    #[error("recipe depth exceeded {depth} while expanding blueprint {blueprint} - possible cycle")]
    RecipeCycleSuspected { blueprint: ItemId, depth: usize },

    #[error("ore solver failed: {0}")]
    Solver(String),
}

pub type PlanResult<T> = std::result::Result<T, PlanError>;

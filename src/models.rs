//! Data models for items, blueprints, ores and planning results

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Type id of a catalog item. Blueprints and ores share the id space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub u32);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for ItemId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// `quantity` units of `item`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemQuantity {
    pub item: ItemId,
    pub quantity: u64,
}

impl ItemQuantity {
    pub fn new(item: impl Into<ItemId>, quantity: u64) -> Self {
        Self {
            item: item.into(),
            quantity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    pub group_id: Option<u32>,
    /// Static base price
    pub price: f64,
    /// Market average, when a price file has been imported
    pub average_price: Option<f64>,
    pub adjusted_price: Option<f64>,
    pub manufacturable: bool,
    pub source_blueprint: Option<ItemId>,
    pub reprocessed_from_ore: bool,
}

impl Item {
    pub fn new(id: impl Into<ItemId>, name: impl Into<String>, price: f64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            group_id: None,
            price,
            average_price: None,
            adjusted_price: None,
            manufacturable: false,
            source_blueprint: None,
            reprocessed_from_ore: false,
        }
    }

    /// Price used for valuing quantities: market average, else base price
    pub fn market_price(&self) -> f64 {
        self.average_price.unwrap_or(self.price)
    }
}

/// The manufacturing activity of a blueprint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManufacturingJob {
    pub time_s: u32,
    /// Flat recipe, in stored order
    pub materials: Vec<ItemQuantity>,
    pub products: Vec<ItemQuantity>,
}

impl ManufacturingJob {
    /// A job needs at least one material and one product to be usable
    pub fn is_valid(&self) -> bool {
        !self.materials.is_empty() && !self.products.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Blueprint {
    pub id: ItemId,
    pub job: ManufacturingJob,
}

/// A compressed ore and what one unit refines into.
///
/// Yield quantities are in hundredths of a refined unit per ore unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ore {
    pub id: ItemId,
    pub price: f64,
    pub yields: Vec<ItemQuantity>,
}

impl Ore {
    /// Raw yield figure for `material`, 0 when the ore does not refine into it
    pub fn yield_of(&self, material: ItemId) -> u64 {
        self.yields
            .iter()
            .find(|y| y.item == material)
            .map_or(0, |y| y.quantity)
    }
}

/// A blueprint's materials split by whether they recurse into another blueprint
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    pub components: Vec<ItemQuantity>,
    pub raw_materials: Vec<ItemQuantity>,
}

/// Raw material id -> total units required
pub type DemandVector = BTreeMap<ItemId, u64>;

/// Result of a successful ore solve
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OrePlan {
    /// Ore id -> units to buy, zero entries omitted
    pub purchases: BTreeMap<ItemId, u64>,
    /// Refined material id -> surplus units
    pub leftovers: BTreeMap<ItemId, u64>,
    /// Sum of purchase units times ore unit price
    pub total_cost: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SolveOutcome {
    Solved(OrePlan),
    /// No integer ore combination covers the demand
    Infeasible,
}

impl SolveOutcome {
    pub fn plan(&self) -> Option<&OrePlan> {
        match self {
            SolveOutcome::Solved(plan) => Some(plan),
            SolveOutcome::Infeasible => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MaterialKind {
    Raw,
    Component,
}

/// A node of an expanded recipe tree
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaterialNode {
    pub item: ItemId,
    pub name: String,
    pub quantity: u64,
    pub kind: MaterialKind,
    /// Materials of the component's own blueprint, empty for raw materials
    pub children: Vec<MaterialNode>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn market_price_falls_back_to_base_price() {
        let mut item = Item::new(34, "Tritanium", 4.0);
        assert_eq!(item.market_price(), 4.0);

        item.average_price = Some(3.75);
        item.adjusted_price = Some(3.9);
        assert_eq!(item.market_price(), 3.75);
    }

    #[test]
    fn job_validity_needs_materials_and_products() {
        let mut job = ManufacturingJob::default();
        assert!(!job.is_valid());

        job.materials.push(ItemQuantity::new(34, 10));
        assert!(!job.is_valid());

        job.products.push(ItemQuantity::new(587, 1));
        assert!(job.is_valid());
    }

    #[test]
    fn ore_yield_lookup() {
        let ore = Ore {
            id: ItemId(62516),
            price: 10.0,
            yields: vec![ItemQuantity::new(34, 400), ItemQuantity::new(35, 25)],
        };
        assert_eq!(ore.yield_of(ItemId(34)), 400);
        assert_eq!(ore.yield_of(ItemId(36)), 0);
    }

    #[test]
    fn item_id_serializes_as_plain_number() {
        let json = serde_json::to_string(&ItemQuantity::new(34, 2)).unwrap();
        assert_eq!(json, r#"{"item":34,"quantity":2}"#);
    }
}

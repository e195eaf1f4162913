//! Reference data catalog
//!
//! Records go into a [`CatalogBuilder`] as they are read from storage. Calling
//! [`CatalogBuilder::finalize`] runs the one-time cross-reference pass and
//! returns an immutable [`Catalog`] that can be shared between threads.

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use tracing::{debug, warn};

use crate::error::{PlanError, PlanResult};
use crate::models::{Blueprint, Classification, Item, ItemId, ItemQuantity, Ore};
use crate::resolver;

/// An ore as stored, before its price is resolved against the item table
#[derive(Debug, Clone, PartialEq)]
pub struct OreRecord {
    pub id: ItemId,
    /// Overrides the item's price when set
    pub price: Option<f64>,
    pub yields: Vec<ItemQuantity>,
}

#[derive(Debug, Default)]
pub struct CatalogBuilder {
    items: HashMap<ItemId, Item>,
    blueprints: HashMap<ItemId, Blueprint>,
    ores: HashMap<ItemId, OreRecord>,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_item(&mut self, item: Item) -> &mut Self {
        self.items.insert(item.id, item);
        self
    }

    pub fn add_blueprint(&mut self, blueprint: Blueprint) -> &mut Self {
        self.blueprints.insert(blueprint.id, blueprint);
        self
    }

    pub fn add_ore(&mut self, ore: OreRecord) -> &mut Self {
        self.ores.insert(ore.id, ore);
        self
    }

    /// Drop unusable records, link products to their blueprints and freeze.
    pub fn finalize(self) -> Catalog {
        let CatalogBuilder {
            mut items,
            mut blueprints,
            ores,
        } = self;

        let mut blueprint_ids: Vec<ItemId> = blueprints.keys().copied().collect();
        blueprint_ids.sort();

        let mut kept = HashMap::new();
        let mut claimed: HashSet<ItemId> = HashSet::new();

        for id in blueprint_ids {
            let Some(blueprint) = blueprints.remove(&id) else {
                continue;
            };

            if !blueprint.job.is_valid() {
                warn!(blueprint = %id, "blueprint has no materials or no products, removing");
                continue;
            }

            if let Some(missing) = blueprint
                .job
                .products
                .iter()
                .find(|p| !items.contains_key(&p.item))
            {
                warn!(
                    blueprint = %id,
                    product = %missing.item,
                    "blueprint produces an item that is not in the catalog, removing"
                );
                continue;
            }

            for product in &blueprint.job.products {
                // Lowest blueprint id wins when several produce the same item
                if claimed.insert(product.item) {
                    if let Some(item) = items.get_mut(&product.item) {
                        item.manufacturable = true;
                        item.source_blueprint = Some(id);
                    }
                }
            }

            kept.insert(id, blueprint);
        }

        let mut resolved_ores = Vec::with_capacity(ores.len());
        for (id, record) in ores {
            let Some(item) = items.get(&id) else {
                warn!(ore = %id, "ore has no item record, removing");
                continue;
            };
            let price = record.price.unwrap_or(item.price);
            if !price.is_finite() || price < 0.0 {
                warn!(ore = %id, price, "ore has an unusable price, removing");
                continue;
            }
            resolved_ores.push(Ore {
                id,
                price,
                yields: record.yields,
            });
        }
        // Solver columns follow ore id order
        resolved_ores.sort_by_key(|o| o.id);

        for ore in &resolved_ores {
            for product in &ore.yields {
                if let Some(item) = items.get_mut(&product.item) {
                    item.reprocessed_from_ore = true;
                }
            }
        }

        debug!(
            items = items.len(),
            blueprints = kept.len(),
            ores = resolved_ores.len(),
            "catalog finalized"
        );

        let classifications = kept.keys().map(|id| (*id, OnceLock::new())).collect();

        Catalog {
            items,
            blueprints: kept,
            ores: resolved_ores,
            classifications,
        }
    }
}

/// Immutable reference data shared by the resolver and the ore planner
#[derive(Debug)]
pub struct Catalog {
    items: HashMap<ItemId, Item>,
    blueprints: HashMap<ItemId, Blueprint>,
    ores: Vec<Ore>,
    classifications: HashMap<ItemId, OnceLock<Classification>>,
}

impl Catalog {
    pub fn item(&self, id: ItemId) -> Option<&Item> {
        self.items.get(&id)
    }

    pub fn require_item(&self, id: ItemId) -> PlanResult<&Item> {
        self.item(id).ok_or(PlanError::UnknownItem(id))
    }

    pub fn blueprint(&self, id: ItemId) -> Option<&Blueprint> {
        self.blueprints.get(&id)
    }

    pub fn require_blueprint(&self, id: ItemId) -> PlanResult<&Blueprint> {
        self.blueprint(id).ok_or(PlanError::UnknownBlueprint(id))
    }

    /// All blueprints ordered by id
    pub fn blueprints(&self) -> Vec<&Blueprint> {
        let mut list: Vec<&Blueprint> = self.blueprints.values().collect();
        list.sort_by_key(|b| b.id);
        list
    }

    /// All ores ordered by id
    pub fn ores(&self) -> &[Ore] {
        &self.ores
    }

    /// Display name of an item, falling back to its id
    pub fn name_of(&self, id: ItemId) -> String {
        match self.item(id) {
            Some(item) if !item.name.is_empty() => item.name.clone(),
            _ => format!("#{}", id),
        }
    }

    /// The blueprint that manufactures `item`
    pub fn source_blueprint(&self, item: &Item) -> PlanResult<&Blueprint> {
        item.source_blueprint
            .and_then(|id| self.blueprint(id))
            .ok_or(PlanError::MissingSourceBlueprint {
                item: item.id,
                blueprint: item.source_blueprint.unwrap_or(item.id),
            })
    }

    /// Component/raw split of a blueprint's materials, computed on first use
    pub fn classification(&self, blueprint: ItemId) -> PlanResult<&Classification> {
        let cell = self
            .classifications
            .get(&blueprint)
            .ok_or(PlanError::UnknownBlueprint(blueprint))?;

        if let Some(classified) = cell.get() {
            return Ok(classified);
        }

        let job = &self.require_blueprint(blueprint)?.job;
        let classified = resolver::classify(&job.materials, self)?;
        // Another thread may have won the race, either value is identical
        Ok(cell.get_or_init(|| classified))
    }

    /// Find a blueprint by numeric id, blueprint name or product name
    pub fn find_blueprint(&self, query: &str) -> Option<&Blueprint> {
        if let Ok(id) = query.trim().parse::<u32>() {
            if let Some(bp) = self.blueprint(ItemId(id)) {
                return Some(bp);
            }
            return self
                .item(ItemId(id))
                .and_then(|item| item.source_blueprint)
                .and_then(|bp| self.blueprint(bp));
        }

        let wanted = query.trim().to_lowercase();
        let named = |id: ItemId| {
            self.item(id)
                .is_some_and(|item| item.name.to_lowercase() == wanted)
        };

        self.blueprints().into_iter().find(|bp| {
            named(bp.id) || bp.job.products.iter().any(|p| named(p.item))
        })
    }
}

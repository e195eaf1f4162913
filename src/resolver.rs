//! Recursive blueprint expansion
//!
//! Splits recipes into components and raw materials, and walks the component
//! tree down to the raw materials a target blueprint ultimately consumes.

use crate::catalog::Catalog;
use crate::config::PlannerConfig;
use crate::error::{PlanError, PlanResult};
use crate::models::{
    Blueprint, Classification, DemandVector, Item, ItemId, ItemQuantity, ManufacturingJob,
    MaterialKind, MaterialNode,
};

/// Partition `materials` by whether each one has its own blueprint.
///
/// Order within each half follows the input order.
pub fn classify(materials: &[ItemQuantity], catalog: &Catalog) -> PlanResult<Classification> {
    let mut classified = Classification::default();

    for material in materials {
        let item = catalog.require_item(material.item)?;
        if item.manufacturable {
            classified.components.push(*material);
        } else {
            classified.raw_materials.push(*material);
        }
    }

    Ok(classified)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolver {
    max_depth: usize,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::from_config(&PlannerConfig::default())
    }
}

impl Resolver {
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    pub fn from_config(config: &PlannerConfig) -> Self {
        Self::new(config.max_depth)
    }

    /// Total raw materials needed for `multiplier` runs of `blueprint`
    pub fn raw_material_demand(
        &self,
        catalog: &Catalog,
        blueprint: ItemId,
        multiplier: u64,
    ) -> PlanResult<DemandVector> {
        let classified = catalog.classification(blueprint)?;
        let mut demand = DemandVector::new();
        self.accumulate(catalog, blueprint, classified, multiplier, 0, &mut demand)?;
        Ok(demand)
    }

    /// Same as [`Resolver::raw_material_demand`] for a job that is not
    /// registered in the catalog
    pub fn job_demand(
        &self,
        catalog: &Catalog,
        owner: ItemId,
        job: &ManufacturingJob,
        multiplier: u64,
    ) -> PlanResult<DemandVector> {
        let classified = classify(&job.materials, catalog)?;
        let mut demand = DemandVector::new();
        self.accumulate(catalog, owner, &classified, multiplier, 0, &mut demand)?;
        Ok(demand)
    }

    fn accumulate(
        &self,
        catalog: &Catalog,
        blueprint: ItemId,
        classified: &Classification,
        multiplier: u64,
        depth: usize,
        demand: &mut DemandVector,
    ) -> PlanResult<()> {
        if depth > self.max_depth {
            return Err(PlanError::RecipeCycleSuspected {
                blueprint,
                depth: self.max_depth,
            });
        }

        for raw in &classified.raw_materials {
            let total = demand.entry(raw.item).or_default();
            *total = total.saturating_add(raw.quantity.saturating_mul(multiplier));
        }

        for component in &classified.components {
            let source = self.component_source(catalog, component.item)?;
            let sub = catalog.classification(source.id)?;
            self.accumulate(
                catalog,
                source.id,
                sub,
                multiplier.saturating_mul(component.quantity),
                depth + 1,
                demand,
            )?;
        }

        Ok(())
    }

    /// Expanded recipe tree for `runs` runs of `blueprint`
    pub fn material_tree(
        &self,
        catalog: &Catalog,
        blueprint: ItemId,
        runs: u64,
    ) -> PlanResult<MaterialNode> {
        let bp = catalog.require_blueprint(blueprint)?;
        let product = bp.job.products.first().map_or(bp.id, |p| p.item);
        let produced = bp.job.products.first().map_or(1, |p| p.quantity);

        Ok(MaterialNode {
            item: product,
            name: catalog.name_of(product),
            quantity: produced.saturating_mul(runs),
            kind: MaterialKind::Component,
            children: self.tree_children(catalog, bp, runs, 0)?,
        })
    }

    fn tree_children(
        &self,
        catalog: &Catalog,
        blueprint: &Blueprint,
        multiplier: u64,
        depth: usize,
    ) -> PlanResult<Vec<MaterialNode>> {
        if depth > self.max_depth {
            return Err(PlanError::RecipeCycleSuspected {
                blueprint: blueprint.id,
                depth: self.max_depth,
            });
        }

        let classified = catalog.classification(blueprint.id)?;
        let mut children = Vec::with_capacity(blueprint.job.materials.len());

        for raw in &classified.raw_materials {
            children.push(MaterialNode {
                item: raw.item,
                name: catalog.name_of(raw.item),
                quantity: raw.quantity.saturating_mul(multiplier),
                kind: MaterialKind::Raw,
                children: Vec::new(),
            });
        }

        for component in &classified.components {
            let quantity = component.quantity.saturating_mul(multiplier);
            let source = self.component_source(catalog, component.item)?;
            children.push(MaterialNode {
                item: component.item,
                name: catalog.name_of(component.item),
                quantity,
                kind: MaterialKind::Component,
                children: self.tree_children(catalog, source, quantity, depth + 1)?,
            });
        }

        Ok(children)
    }

    fn component_source<'a>(&self, catalog: &'a Catalog, item: ItemId) -> PlanResult<&'a Blueprint> {
        let item = catalog.require_item(item)?;
        catalog.source_blueprint(item)
    }
}

/// Format a material tree as an indented listing
pub fn format_material_tree(node: &MaterialNode, indent: usize) -> String {
    let mut output = String::new();
    let prefix = "  ".repeat(indent);

    match node.kind {
        MaterialKind::Raw => {
            output.push_str(&format!("{}- {} x{}\n", prefix, node.name, node.quantity));
        }
        MaterialKind::Component => {
            output.push_str(&format!("{}+ {} x{}\n", prefix, node.name, node.quantity));
            for child in &node.children {
                output.push_str(&format_material_tree(child, indent + 1));
            }
        }
    }

    output
}

/// One priced line of a [`DemandSummary`]
#[derive(Debug, Clone, PartialEq)]
pub struct DemandLine {
    pub name: String,
    pub quantity: u64,
    /// Market average when known, else base price
    pub unit_price: f64,
    /// Some ore refines into this material
    pub from_ore: bool,
}

/// Raw material totals of a blueprint, priced for display
#[derive(Debug)]
pub struct DemandSummary {
    pub blueprint: String,
    pub raw_materials: Vec<DemandLine>,
}

impl DemandSummary {
    pub fn total_value(&self) -> f64 {
        self.raw_materials
            .iter()
            .map(|line| line.quantity as f64 * line.unit_price)
            .sum()
    }
}

pub fn summarize_demand(catalog: &Catalog, blueprint: ItemId, demand: &DemandVector) -> DemandSummary {
    let raw_materials = demand
        .iter()
        .map(|(id, quantity)| {
            let item = catalog.item(*id);
            DemandLine {
                name: catalog.name_of(*id),
                quantity: *quantity,
                unit_price: item.map_or(0.0, Item::market_price),
                from_ore: item.is_some_and(|i| i.reprocessed_from_ore),
            }
        })
        .collect();

    DemandSummary {
        blueprint: catalog.name_of(blueprint),
        raw_materials,
    }
}

impl std::fmt::Display for DemandSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Raw materials: {} ===", self.blueprint)?;

        if self.raw_materials.is_empty() {
            writeln!(f, "  (none)")?;
            return Ok(());
        }

        writeln!(f, "{:<32} {:>14} {:>16}", "Material", "Quantity", "Value (ISK)")?;
        writeln!(f, "{}", "-".repeat(64))?;
        for line in &self.raw_materials {
            let marker = if line.from_ore { " *" } else { "" };
            writeln!(
                f,
                "{:<32} {:>14} {:>16.2}",
                format!("{}{}", line.name, marker),
                line.quantity,
                line.quantity as f64 * line.unit_price
            )?;
        }
        writeln!(f)?;
        writeln!(f, "Total value: {:.2} ISK", self.total_value())?;
        if self.raw_materials.iter().any(|line| line.from_ore) {
            writeln!(f, "* refined from ore")?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogBuilder, OreRecord};

    const TRITANIUM: u32 = 34;
    const PYERITE: u32 = 35;
    const PLATE: u32 = 1000;
    const PLATE_BP: u32 = 1001;
    const HULL: u32 = 2000;
    const HULL_BP: u32 = 2001;

    fn blueprint(id: u32, materials: &[(u32, u64)], product: u32) -> Blueprint {
        Blueprint {
            id: ItemId(id),
            job: ManufacturingJob {
                time_s: 300,
                materials: materials.iter().map(|&(m, q)| ItemQuantity::new(m, q)).collect(),
                products: vec![ItemQuantity::new(product, 1)],
            },
        }
    }

    /// Hull needs 3 plates and 5 pyerite; a plate needs 2 tritanium
    fn hull_catalog() -> Catalog {
        let mut builder = CatalogBuilder::new();
        builder
            .add_item(Item::new(TRITANIUM, "Tritanium", 4.0))
            .add_item(Item::new(PYERITE, "Pyerite", 10.0))
            .add_item(Item::new(PLATE, "Plate", 0.0))
            .add_item(Item::new(HULL, "Hull", 0.0))
            .add_blueprint(blueprint(PLATE_BP, &[(TRITANIUM, 2)], PLATE))
            .add_blueprint(blueprint(HULL_BP, &[(PLATE, 3), (PYERITE, 5)], HULL));
        builder.finalize()
    }

    #[test]
    fn classify_splits_components_from_raw() {
        let catalog = hull_catalog();
        let classified = catalog.classification(ItemId(HULL_BP)).unwrap();

        assert_eq!(classified.components, vec![ItemQuantity::new(PLATE, 3)]);
        assert_eq!(classified.raw_materials, vec![ItemQuantity::new(PYERITE, 5)]);
    }

    #[test]
    fn classify_is_stable_across_calls() {
        let catalog = hull_catalog();
        let first = catalog.classification(ItemId(HULL_BP)).unwrap().clone();
        let second = catalog.classification(ItemId(HULL_BP)).unwrap();
        assert_eq!(&first, second);

        let job = &catalog.blueprint(ItemId(HULL_BP)).unwrap().job;
        assert_eq!(classify(&job.materials, &catalog).unwrap(), first);
    }

    #[test]
    fn classify_rejects_unknown_material() {
        let catalog = hull_catalog();
        let materials = [ItemQuantity::new(TRITANIUM, 1), ItemQuantity::new(777, 1)];
        assert_eq!(
            classify(&materials, &catalog).unwrap_err(),
            PlanError::UnknownItem(ItemId(777))
        );
    }

    #[test]
    fn demand_multiplies_through_components() {
        let catalog = hull_catalog();
        let demand = Resolver::default()
            .raw_material_demand(&catalog, ItemId(HULL_BP), 1)
            .unwrap();

        assert_eq!(demand.get(&ItemId(TRITANIUM)), Some(&6));
        assert_eq!(demand.get(&ItemId(PYERITE)), Some(&5));
        assert_eq!(demand.len(), 2);
    }

    #[test]
    fn demand_scales_with_multiplier() {
        let catalog = hull_catalog();
        let demand = Resolver::default()
            .raw_material_demand(&catalog, ItemId(HULL_BP), 4)
            .unwrap();

        assert_eq!(demand[&ItemId(TRITANIUM)], 24);
        assert_eq!(demand[&ItemId(PYERITE)], 20);
    }

    #[test]
    fn raw_only_blueprint_demand_is_its_recipe() {
        let catalog = hull_catalog();
        let demand = Resolver::default()
            .raw_material_demand(&catalog, ItemId(PLATE_BP), 1)
            .unwrap();

        assert!(catalog.classification(ItemId(PLATE_BP)).unwrap().components.is_empty());
        assert_eq!(demand.into_iter().collect::<Vec<_>>(), vec![(ItemId(TRITANIUM), 2)]);
    }

    #[test]
    fn empty_job_has_empty_demand() {
        let catalog = hull_catalog();
        let demand = Resolver::default()
            .job_demand(&catalog, ItemId(9), &ManufacturingJob::default(), 1)
            .unwrap();
        assert!(demand.is_empty());
    }

    #[test]
    fn repeated_raw_material_is_summed() {
        let catalog = hull_catalog();
        let job = ManufacturingJob {
            time_s: 1,
            materials: vec![
                ItemQuantity::new(TRITANIUM, 1),
                ItemQuantity::new(PLATE, 1),
                ItemQuantity::new(TRITANIUM, 4),
            ],
            products: vec![],
        };
        let demand = Resolver::default().job_demand(&catalog, ItemId(9), &job, 1).unwrap();
        assert_eq!(demand[&ItemId(TRITANIUM)], 7);
    }

    #[test]
    fn cyclic_recipes_trip_depth_guard() {
        let mut builder = CatalogBuilder::new();
        builder
            .add_item(Item::new(10, "Chicken", 0.0))
            .add_item(Item::new(20, "Egg", 0.0))
            .add_blueprint(blueprint(11, &[(20, 1)], 10))
            .add_blueprint(blueprint(21, &[(10, 2)], 20));
        let catalog = builder.finalize();

        let err = Resolver::new(8)
            .raw_material_demand(&catalog, ItemId(11), 1)
            .unwrap_err();
        assert!(matches!(err, PlanError::RecipeCycleSuspected { depth: 8, .. }));

        let err = Resolver::new(8).material_tree(&catalog, ItemId(11), 1).unwrap_err();
        assert!(matches!(err, PlanError::RecipeCycleSuspected { .. }));
    }

    #[test]
    fn stale_manufacturable_flag_is_missing_source() {
        let mut builder = CatalogBuilder::new();
        let mut part = Item::new(50, "Part", 0.0);
        part.manufacturable = true;
        part.source_blueprint = Some(ItemId(51));
        builder
            .add_item(part)
            .add_item(Item::new(60, "Gadget", 0.0))
            .add_blueprint(blueprint(61, &[(50, 1)], 60));
        let catalog = builder.finalize();

        assert_eq!(
            Resolver::default()
                .raw_material_demand(&catalog, ItemId(61), 1)
                .unwrap_err(),
            PlanError::MissingSourceBlueprint {
                item: ItemId(50),
                blueprint: ItemId(51),
            }
        );
    }

    #[test]
    fn material_tree_nests_components() {
        let catalog = hull_catalog();
        let tree = Resolver::default()
            .material_tree(&catalog, ItemId(HULL_BP), 2)
            .unwrap();

        assert_eq!(tree.name, "Hull");
        assert_eq!(tree.quantity, 2);
        assert_eq!(tree.children.len(), 2);

        let pyerite = &tree.children[0];
        assert_eq!((pyerite.kind, pyerite.quantity), (MaterialKind::Raw, 10));

        let plates = &tree.children[1];
        assert_eq!((plates.kind, plates.quantity), (MaterialKind::Component, 6));
        assert_eq!(plates.children[0].name, "Tritanium");
        assert_eq!(plates.children[0].quantity, 12);

        let text = format_material_tree(&tree, 0);
        assert_eq!(
            text,
            "+ Hull x2\n  - Pyerite x10\n  + Plate x6\n    - Tritanium x12\n"
        );
    }

    #[test]
    fn summary_prices_raw_materials() {
        let catalog = hull_catalog();
        let demand = Resolver::default()
            .raw_material_demand(&catalog, ItemId(HULL_BP), 1)
            .unwrap();
        let summary = summarize_demand(&catalog, ItemId(HULL_BP), &demand);

        // 6 tritanium at 4 + 5 pyerite at 10
        assert_eq!(summary.total_value(), 74.0);
        assert!(summary.to_string().contains("Tritanium"));
        assert!(!summary.to_string().contains("refined from ore"));
    }

    #[test]
    fn summary_uses_market_price_and_marks_ore_minerals() {
        let mut tritanium = Item::new(TRITANIUM, "Tritanium", 4.0);
        tritanium.average_price = Some(3.5);
        let mut builder = CatalogBuilder::new();
        builder
            .add_item(tritanium)
            .add_item(Item::new(PYERITE, "Pyerite", 10.0))
            .add_item(Item::new(PLATE, "Plate", 0.0))
            .add_item(Item::new(62516, "Compressed Veldspar", 18.0))
            .add_blueprint(blueprint(PLATE_BP, &[(TRITANIUM, 2), (PYERITE, 1)], PLATE))
            .add_ore(OreRecord {
                id: ItemId(62516),
                price: None,
                yields: vec![ItemQuantity::new(TRITANIUM, 400)],
            });
        let catalog = builder.finalize();

        let demand = Resolver::default()
            .raw_material_demand(&catalog, ItemId(PLATE_BP), 10)
            .unwrap();
        let summary = summarize_demand(&catalog, ItemId(PLATE_BP), &demand);

        // 20 tritanium at 3.5 + 10 pyerite at 10
        assert_eq!(summary.total_value(), 170.0);
        let tritanium = &summary.raw_materials[0];
        assert_eq!((tritanium.unit_price, tritanium.from_ore), (3.5, true));
        assert!(!summary.raw_materials[1].from_ore);

        let text = summary.to_string();
        assert!(text.contains("Tritanium *"));
        assert!(text.contains("* refined from ore"));
    }
}

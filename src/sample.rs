//! Built-in sample catalog for trying the planner without a static data export

use anyhow::Result;
use rusqlite::Connection;

use crate::catalog::{CatalogBuilder, OreRecord};
use crate::db;
use crate::models::{Blueprint, Item, ItemId, ItemQuantity, ManufacturingJob};

pub const TRITANIUM: ItemId = ItemId(34);
pub const PYERITE: ItemId = ItemId(35);
pub const MEXALLON: ItemId = ItemId(36);
pub const ISOGEN: ItemId = ItemId(37);
pub const NOCXIUM: ItemId = ItemId(38);

pub const RIFTER_BLUEPRINT: ItemId = ItemId(691);
pub const CAPITAL_ARMOR_PLATES_BLUEPRINT: ItemId = ItemId(21018);
pub const CAPITAL_CONSTRUCTION_PARTS_BLUEPRINT: ItemId = ItemId(21038);
pub const MOROS_BLUEPRINT: ItemId = ItemId(19725);

pub struct SampleData {
    pub items: Vec<Item>,
    pub blueprints: Vec<Blueprint>,
    pub ores: Vec<OreRecord>,
}

fn list(entries: &[(u32, u64)]) -> Vec<ItemQuantity> {
    entries.iter().map(|&(id, q)| ItemQuantity::new(id, q)).collect()
}

fn blueprint(id: u32, time_s: u32, materials: &[(u32, u64)], product: u32) -> Blueprint {
    Blueprint {
        id: ItemId(id),
        job: ManufacturingJob {
            time_s,
            materials: list(materials),
            products: list(&[(product, 1)]),
        },
    }
}

pub fn sample_data() -> SampleData {
    let items = vec![
        Item::new(34, "Tritanium", 4.0),
        Item::new(35, "Pyerite", 10.0),
        Item::new(36, "Mexallon", 50.0),
        Item::new(37, "Isogen", 60.0),
        Item::new(38, "Nocxium", 400.0),
        Item::new(587, "Rifter", 450_000.0),
        Item::new(691, "Rifter Blueprint", 2_500_000.0),
        Item::new(21017, "Capital Armor Plates", 0.0),
        Item::new(21018, "Capital Armor Plates Blueprint", 0.0),
        Item::new(21037, "Capital Construction Parts", 0.0),
        Item::new(21038, "Capital Construction Parts Blueprint", 0.0),
        Item::new(19724, "Moros", 0.0),
        Item::new(19725, "Moros Blueprint", 0.0),
        Item::new(62516, "Compressed Veldspar", 18.0),
        Item::new(62520, "Compressed Scordite", 25.0),
        Item::new(62524, "Compressed Pyroxeres", 35.0),
        Item::new(62528, "Compressed Plagioclase", 40.0),
        Item::new(62532, "Compressed Omber", 70.0),
        Item::new(62536, "Compressed Kernite", 95.0),
        Item::new(62540, "Compressed Jaspet", 250.0),
    ];

    let blueprints = vec![
        blueprint(
            691,
            6000,
            &[(34, 32000), (35, 6000), (36, 2500), (37, 500)],
            587,
        ),
        blueprint(
            21018,
            9000,
            &[(34, 40000), (35, 12000), (36, 3000), (37, 600), (38, 150)],
            21017,
        ),
        blueprint(21038, 9000, &[(34, 30000), (36, 5000), (38, 200)], 21037),
        blueprint(
            19725,
            250_000,
            &[(21017, 10), (21037, 8), (34, 500_000), (35, 50_000)],
            19724,
        ),
    ];

    let ore = |id: u32, yields: &[(u32, u64)]| OreRecord {
        id: ItemId(id),
        price: None,
        yields: list(yields),
    };
    let ores = vec![
        ore(62516, &[(34, 400)]),
        ore(62520, &[(34, 150), (35, 90)]),
        ore(62524, &[(35, 90), (36, 30)]),
        ore(62528, &[(34, 175), (36, 70)]),
        ore(62532, &[(35, 90), (37, 75)]),
        ore(62536, &[(36, 60), (37, 120)]),
        ore(62540, &[(36, 150), (38, 50)]),
    ];

    SampleData {
        items,
        blueprints,
        ores,
    }
}

pub fn sample_catalog() -> CatalogBuilder {
    let data = sample_data();
    let mut builder = CatalogBuilder::new();
    for item in data.items {
        builder.add_item(item);
    }
    for blueprint in data.blueprints {
        builder.add_blueprint(blueprint);
    }
    for ore in data.ores {
        builder.add_ore(ore);
    }
    builder
}

/// Replace the database contents with the sample catalog
pub fn load_sample_data(conn: &Connection) -> Result<usize> {
    let data = sample_data();
    let tx = conn.unchecked_transaction()?;

    db::clear_catalog_data(&tx)?;
    for item in &data.items {
        db::upsert_item(&tx, item)?;
    }
    for blueprint in &data.blueprints {
        db::upsert_blueprint(&tx, blueprint)?;
    }
    for ore in &data.ores {
        db::upsert_ore(&tx, ore)?;
    }

    tx.commit()?;
    Ok(data.blueprints.len())
}

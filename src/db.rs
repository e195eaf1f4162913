//! Database schema and operations

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params};

use crate::catalog::{CatalogBuilder, OreRecord};
use crate::models::{Blueprint, Item, ItemId, ItemQuantity, ManufacturingJob};

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Every type referenced by a blueprint or an ore
        CREATE TABLE IF NOT EXISTS items (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            group_id INTEGER,
            base_price REAL NOT NULL DEFAULT 0,
            -- From an imported market price file
            average_price REAL,
            adjusted_price REAL
        );

        -- Manufacturing activity of a blueprint
        CREATE TABLE IF NOT EXISTS blueprints (
            id INTEGER PRIMARY KEY,
            time_s INTEGER NOT NULL DEFAULT 0
        );

        -- Recipe inputs; position keeps the stored requirement order
        CREATE TABLE IF NOT EXISTS blueprint_materials (
            blueprint_id INTEGER NOT NULL,
            position INTEGER NOT NULL,
            item_id INTEGER NOT NULL,
            quantity INTEGER NOT NULL,
            PRIMARY KEY (blueprint_id, position)
        );

        CREATE TABLE IF NOT EXISTS blueprint_products (
            blueprint_id INTEGER NOT NULL,
            item_id INTEGER NOT NULL,
            quantity INTEGER NOT NULL,
            PRIMARY KEY (blueprint_id, item_id)
        );

        -- Compressed ores; price overrides the item's base price when set
        CREATE TABLE IF NOT EXISTS ores (
            id INTEGER PRIMARY KEY,
            price REAL
        );

        -- Refined output per ore unit, in hundredths
        CREATE TABLE IF NOT EXISTS ore_yields (
            ore_id INTEGER NOT NULL,
            material_id INTEGER NOT NULL,
            quantity INTEGER NOT NULL,
            PRIMARY KEY (ore_id, material_id)
        );

        CREATE INDEX IF NOT EXISTS idx_blueprint_products_item ON blueprint_products(item_id);
        CREATE INDEX IF NOT EXISTS idx_ore_yields_material ON ore_yields(material_id);
        "#,
    )?;
    Ok(())
}

/// Insert or update an item; stored market prices survive when the item has none
pub fn upsert_item(conn: &Connection, item: &Item) -> Result<()> {
    conn.execute(
        "INSERT INTO items (id, name, group_id, base_price, average_price, adjusted_price)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            group_id = excluded.group_id,
            base_price = excluded.base_price,
            average_price = COALESCE(excluded.average_price, items.average_price),
            adjusted_price = COALESCE(excluded.adjusted_price, items.adjusted_price)",
        params![
            item.id.0,
            item.name,
            item.group_id,
            item.price,
            item.average_price,
            item.adjusted_price
        ],
    )?;
    Ok(())
}

/// Record market prices for a stored item. Returns false when the item is unknown.
pub fn set_market_price(
    conn: &Connection,
    id: ItemId,
    average_price: Option<f64>,
    adjusted_price: Option<f64>,
) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE items SET average_price = ?2, adjusted_price = ?3 WHERE id = ?1",
        params![id.0, average_price, adjusted_price],
    )?;
    Ok(updated > 0)
}

/// Insert or replace a blueprint with its materials and products
pub fn upsert_blueprint(conn: &Connection, blueprint: &Blueprint) -> Result<()> {
    let id = blueprint.id.0;
    conn.execute(
        "INSERT OR REPLACE INTO blueprints (id, time_s) VALUES (?1, ?2)",
        params![id, blueprint.job.time_s],
    )?;
    conn.execute("DELETE FROM blueprint_materials WHERE blueprint_id = ?1", [id])?;
    conn.execute("DELETE FROM blueprint_products WHERE blueprint_id = ?1", [id])?;

    for (position, material) in blueprint.job.materials.iter().enumerate() {
        conn.execute(
            "INSERT INTO blueprint_materials (blueprint_id, position, item_id, quantity)
             VALUES (?1, ?2, ?3, ?4)",
            params![id, position as i64, material.item.0, material.quantity as i64],
        )?;
    }

    for product in &blueprint.job.products {
        conn.execute(
            "INSERT OR REPLACE INTO blueprint_products (blueprint_id, item_id, quantity)
             VALUES (?1, ?2, ?3)",
            params![id, product.item.0, product.quantity as i64],
        )?;
    }

    Ok(())
}

/// Insert or replace an ore with its yields
pub fn upsert_ore(conn: &Connection, ore: &OreRecord) -> Result<()> {
    let id = ore.id.0;
    conn.execute(
        "INSERT OR REPLACE INTO ores (id, price) VALUES (?1, ?2)",
        params![id, ore.price],
    )?;
    conn.execute("DELETE FROM ore_yields WHERE ore_id = ?1", [id])?;

    for product in &ore.yields {
        conn.execute(
            "INSERT OR REPLACE INTO ore_yields (ore_id, material_id, quantity) VALUES (?1, ?2, ?3)",
            params![id, product.item.0, product.quantity as i64],
        )?;
    }

    Ok(())
}

/// Clear all catalog data (for re-import)
pub fn clear_catalog_data(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        DELETE FROM ore_yields;
        DELETE FROM ores;
        DELETE FROM blueprint_products;
        DELETE FROM blueprint_materials;
        DELETE FROM blueprints;
        DELETE FROM items;
        "#,
    )?;
    Ok(())
}

/// A stored quantity column; negative values mean a corrupt row
fn quantity(row: &rusqlite::Row<'_>, index: usize) -> rusqlite::Result<u64> {
    let value: i64 = row.get(index)?;
    u64::try_from(value).map_err(|_| rusqlite::Error::IntegralValueOutOfRange(index, value))
}

/// Read every stored record into a catalog builder
pub fn load_catalog(conn: &Connection) -> Result<CatalogBuilder> {
    let mut builder = CatalogBuilder::new();

    let mut stmt = conn.prepare(
        "SELECT id, name, group_id, base_price, average_price, adjusted_price FROM items",
    )?;
    let rows = stmt.query_map([], |row| {
        let mut item = Item::new(row.get::<_, u32>(0)?, row.get::<_, String>(1)?, row.get(3)?);
        item.group_id = row.get(2)?;
        item.average_price = row.get(4)?;
        item.adjusted_price = row.get(5)?;
        Ok(item)
    })?;
    for row in rows {
        builder.add_item(row.context("Failed to read item")?);
    }

    let mut stmt = conn.prepare("SELECT id, time_s FROM blueprints")?;
    let blueprints: Vec<(u32, u32)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<rusqlite::Result<_>>()?;

    let mut materials_stmt = conn.prepare(
        "SELECT item_id, quantity FROM blueprint_materials WHERE blueprint_id = ?1 ORDER BY position",
    )?;
    let mut products_stmt = conn.prepare(
        "SELECT item_id, quantity FROM blueprint_products WHERE blueprint_id = ?1 ORDER BY item_id",
    )?;

    for (id, time_s) in blueprints {
        let materials = materials_stmt
            .query_map([id], |row| {
                Ok(ItemQuantity::new(row.get::<_, u32>(0)?, quantity(row, 1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()
            .with_context(|| format!("Failed to read materials of blueprint {}", id))?;
        let products = products_stmt
            .query_map([id], |row| {
                Ok(ItemQuantity::new(row.get::<_, u32>(0)?, quantity(row, 1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()
            .with_context(|| format!("Failed to read products of blueprint {}", id))?;

        builder.add_blueprint(Blueprint {
            id: ItemId(id),
            job: ManufacturingJob {
                time_s,
                materials,
                products,
            },
        });
    }

    let mut stmt = conn.prepare("SELECT id, price FROM ores")?;
    let ores: Vec<(u32, Option<f64>)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<rusqlite::Result<_>>()?;

    let mut yields_stmt = conn.prepare(
        "SELECT material_id, quantity FROM ore_yields WHERE ore_id = ?1 ORDER BY material_id",
    )?;
    for (id, price) in ores {
        let yields = yields_stmt
            .query_map([id], |row| {
                Ok(ItemQuantity::new(row.get::<_, u32>(0)?, quantity(row, 1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()
            .with_context(|| format!("Failed to read yields of ore {}", id))?;

        builder.add_ore(OreRecord {
            id: ItemId(id),
            price,
            yields,
        });
    }

    Ok(builder)
}

/// A blueprint listing row
#[derive(Debug, Clone, PartialEq)]
pub struct BlueprintListing {
    pub id: ItemId,
    pub name: String,
    pub product: String,
}

/// List blueprints, optionally filtered by a case-insensitive name fragment
pub fn list_blueprints(conn: &Connection, filter: Option<&str>) -> Result<Vec<BlueprintListing>> {
    let pattern = format!("%{}%", filter.unwrap_or(""));
    let mut stmt = conn.prepare(
        "SELECT b.id, COALESCE(bi.name, ''), COALESCE(pi.name, '')
         FROM blueprints b
         LEFT JOIN items bi ON bi.id = b.id
         LEFT JOIN blueprint_products bp ON bp.blueprint_id = b.id
         LEFT JOIN items pi ON pi.id = bp.item_id
         WHERE COALESCE(bi.name, '') LIKE ?1 OR COALESCE(pi.name, '') LIKE ?1
         GROUP BY b.id
         ORDER BY bi.name, b.id",
    )?;

    let rows = stmt.query_map([pattern], |row| {
        Ok(BlueprintListing {
            id: ItemId(row.get(0)?),
            name: row.get(1)?,
            product: row.get(2)?,
        })
    })?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

/// Name of an item, if stored
pub fn item_name(conn: &Connection, id: ItemId) -> Result<Option<String>> {
    let name = conn
        .query_row("SELECT name FROM items WHERE id = ?1", [id.0], |row| row.get(0))
        .optional()?;
    Ok(name)
}

/// (items, blueprints, ores) currently stored
pub fn counts(conn: &Connection) -> Result<(usize, usize, usize)> {
    let count = |table: &str| -> Result<usize> {
        let n: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?;
        Ok(n as usize)
    };
    Ok((count("items")?, count("blueprints")?, count("ores")?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    #[test]
    fn blueprint_round_trip_keeps_material_order() {
        let conn = memory_db();
        upsert_item(&conn, &Item::new(36, "Mexallon", 50.0)).unwrap();
        upsert_item(&conn, &Item::new(34, "Tritanium", 4.0)).unwrap();
        upsert_item(&conn, &Item::new(165, "Widget", 0.0)).unwrap();
        let blueprint = Blueprint {
            id: ItemId(681),
            job: ManufacturingJob {
                time_s: 600,
                materials: vec![ItemQuantity::new(36, 3), ItemQuantity::new(34, 86)],
                products: vec![ItemQuantity::new(165, 1)],
            },
        };
        upsert_blueprint(&conn, &blueprint).unwrap();
        // Re-inserting replaces, not duplicates
        upsert_blueprint(&conn, &blueprint).unwrap();

        let catalog = load_catalog(&conn).unwrap().finalize();
        assert_eq!(catalog.blueprint(ItemId(681)), Some(&blueprint));
        assert!(catalog.item(ItemId(165)).unwrap().manufacturable);
    }

    #[test]
    fn ore_price_override_survives_storage() {
        let conn = memory_db();
        upsert_item(&conn, &Item::new(34, "Tritanium", 4.0)).unwrap();
        upsert_item(&conn, &Item::new(62516, "Compressed Veldspar", 60.0)).unwrap();
        upsert_ore(
            &conn,
            &OreRecord {
                id: ItemId(62516),
                price: Some(42.0),
                yields: vec![ItemQuantity::new(34, 400)],
            },
        )
        .unwrap();

        let catalog = load_catalog(&conn).unwrap().finalize();
        assert_eq!(catalog.ores()[0].price, 42.0);
        assert_eq!(catalog.ores()[0].yields, vec![ItemQuantity::new(34, 400)]);
        assert_eq!(counts(&conn).unwrap(), (2, 0, 1));
    }

    #[test]
    fn market_prices_survive_item_reimport() {
        let conn = memory_db();
        upsert_item(&conn, &Item::new(34, "Tritanium", 4.0)).unwrap();
        assert!(set_market_price(&conn, ItemId(34), Some(3.5), Some(3.8)).unwrap());
        assert!(!set_market_price(&conn, ItemId(99), Some(1.0), None).unwrap());

        upsert_item(&conn, &Item::new(34, "Tritanium", 5.0)).unwrap();

        let catalog = load_catalog(&conn).unwrap().finalize();
        let tritanium = catalog.item(ItemId(34)).unwrap();
        assert_eq!(tritanium.price, 5.0);
        assert_eq!(tritanium.average_price, Some(3.5));
        assert_eq!(tritanium.adjusted_price, Some(3.8));
        assert_eq!(tritanium.market_price(), 3.5);
    }

    #[test]
    fn negative_stored_quantity_is_an_error() {
        let conn = memory_db();
        upsert_item(&conn, &Item::new(34, "Tritanium", 4.0)).unwrap();
        upsert_item(&conn, &Item::new(62516, "Compressed Veldspar", 60.0)).unwrap();
        conn.execute("INSERT INTO ores (id, price) VALUES (62516, NULL)", [])
            .unwrap();
        conn.execute(
            "INSERT INTO ore_yields (ore_id, material_id, quantity) VALUES (62516, 34, -400)",
            [],
        )
        .unwrap();

        let err = load_catalog(&conn).unwrap_err();
        assert!(format!("{:#}", err).contains("yields of ore 62516"));
    }

    #[test]
    fn clear_removes_everything() {
        let conn = memory_db();
        upsert_item(&conn, &Item::new(34, "Tritanium", 4.0)).unwrap();
        clear_catalog_data(&conn).unwrap();
        assert_eq!(counts(&conn).unwrap(), (0, 0, 0));
        assert_eq!(item_name(&conn, ItemId(34)).unwrap(), None);
    }
}

//! Static data export import
//!
//! Reads the JSONL files of an already extracted static data export and
//! stores the items, manufacturing blueprints and compressed ores the planner
//! needs. Market prices come from a separate JSON file.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use rusqlite::Connection;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::catalog::OreRecord;
use crate::db;
use crate::models::{Blueprint, Item, ItemId, ItemQuantity, ManufacturingJob};

const TYPES_JSONL: &str = "types.jsonl";
const BLUEPRINTS_JSONL: &str = "blueprints.jsonl";
const TYPE_MATERIALS_JSONL: &str = "typeMaterials.jsonl";
const GROUPS_JSONL: &str = "groups.jsonl";

/// Category holding every asteroid ore group
const ORE_CATEGORY_ID: u32 = 25;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LocalizedName {
    Plain(String),
    Localized(HashMap<String, String>),
}

impl LocalizedName {
    fn english(&self) -> String {
        match self {
            LocalizedName::Plain(name) => name.clone(),
            LocalizedName::Localized(names) => names.get("en").cloned().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SdeType {
    #[serde(rename = "_key")]
    id: u32,
    #[serde(rename = "groupID")]
    group_id: Option<u32>,
    name: Option<LocalizedName>,
    #[serde(rename = "basePrice")]
    base_price: Option<f64>,
    #[serde(default)]
    published: bool,
}

#[derive(Debug, Deserialize)]
struct SdeQuantity {
    #[serde(rename = "typeID")]
    type_id: u32,
    quantity: u64,
}

#[derive(Debug, Default, Deserialize)]
struct SdeManufacturing {
    #[serde(default)]
    time: u32,
    #[serde(default)]
    materials: Vec<SdeQuantity>,
    #[serde(default)]
    products: Vec<SdeQuantity>,
}

#[derive(Debug, Default, Deserialize)]
struct SdeActivities {
    manufacturing: Option<SdeManufacturing>,
}

#[derive(Debug, Deserialize)]
struct SdeBlueprint {
    #[serde(rename = "_key")]
    id: u32,
    #[serde(default)]
    activities: SdeActivities,
}

#[derive(Debug, Deserialize)]
struct SdeRefinedMaterial {
    #[serde(rename = "materialTypeID")]
    material_type_id: u32,
    quantity: u64,
}

#[derive(Debug, Deserialize)]
struct SdeTypeMaterials {
    #[serde(rename = "_key")]
    id: u32,
    #[serde(default)]
    materials: Vec<SdeRefinedMaterial>,
}

/// One entry of a market prices file
#[derive(Debug, Deserialize)]
struct MarketPrice {
    type_id: u32,
    average_price: Option<f64>,
    adjusted_price: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct SdeGroup {
    #[serde(rename = "_key")]
    id: u32,
    #[serde(rename = "categoryID")]
    category_id: Option<u32>,
}

/// Locate the JSONL files below `dir`, keyed by file name
pub fn find_data_files(dir: &Path) -> Result<HashMap<&'static str, PathBuf>> {
    let wanted = [TYPES_JSONL, BLUEPRINTS_JSONL, TYPE_MATERIALS_JSONL, GROUPS_JSONL];
    let mut found = HashMap::new();

    for entry in WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let filename = entry.file_name().to_str().unwrap_or("");
        if let Some(name) = wanted.iter().find(|w| **w == filename) {
            found.entry(*name).or_insert_with(|| entry.path().to_path_buf());
        }
    }

    for name in wanted {
        if !found.contains_key(name) {
            return Err(anyhow!("Could not find {} under {}", name, dir.display()));
        }
    }

    Ok(found)
}

/// Parse every non-empty line of a JSONL file
fn read_jsonl<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut records = Vec::new();

    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line).with_context(|| {
            format!("Failed to parse JSON in {} line {}", path.display(), index + 1)
        })?;
        records.push(record);
    }

    debug!(file = %path.display(), records = records.len(), "parsed");
    Ok(records)
}

fn quantities(list: &[SdeQuantity]) -> Vec<ItemQuantity> {
    list.iter()
        .map(|q| ItemQuantity::new(q.type_id, q.quantity))
        .collect()
}

/// Import a static data export directory into the database
pub fn extract_to_database(conn: &Connection, dir: &Path) -> Result<ExtractStats> {
    let mut stats = ExtractStats::default();

    info!("Scanning {} for static data files", dir.display());
    let files = find_data_files(dir)?;

    let ore_groups: HashSet<u32> = read_jsonl::<SdeGroup>(&files[GROUPS_JSONL])?
        .into_iter()
        .filter(|g| g.category_id == Some(ORE_CATEGORY_ID))
        .map(|g| g.id)
        .collect();

    let types: HashMap<u32, SdeType> = read_jsonl::<SdeType>(&files[TYPES_JSONL])?
        .into_iter()
        .map(|t| (t.id, t))
        .collect();
    info!("Loaded {} types", types.len());

    let published = |id: u32| types.get(&id).is_some_and(|t| t.published);

    let mut blueprints = Vec::new();
    for record in read_jsonl::<SdeBlueprint>(&files[BLUEPRINTS_JSONL])? {
        let Some(manufacturing) = record.activities.manufacturing else {
            stats.skipped_blueprints += 1;
            continue;
        };
        if !published(record.id) {
            stats.skipped_blueprints += 1;
            continue;
        }
        blueprints.push(Blueprint {
            id: ItemId(record.id),
            job: ManufacturingJob {
                time_s: manufacturing.time,
                materials: quantities(&manufacturing.materials),
                products: quantities(&manufacturing.products),
            },
        });
    }

    let mut ores = Vec::new();
    for record in read_jsonl::<SdeTypeMaterials>(&files[TYPE_MATERIALS_JSONL])? {
        let is_ore = types
            .get(&record.id)
            .is_some_and(|t| t.published && t.group_id.is_some_and(|g| ore_groups.contains(&g)));
        if !is_ore {
            stats.skipped_ores += 1;
            continue;
        }
        ores.push(OreRecord {
            id: ItemId(record.id),
            price: None,
            yields: record
                .materials
                .iter()
                .map(|m| ItemQuantity::new(m.material_type_id, m.quantity))
                .collect(),
        });
    }

    // Only types something refers to are worth storing
    let mut relevant: HashSet<u32> = HashSet::new();
    for blueprint in &blueprints {
        relevant.insert(blueprint.id.0);
        let job = &blueprint.job;
        relevant.extend(job.materials.iter().chain(&job.products).map(|q| q.item.0));
    }
    for ore in &ores {
        relevant.insert(ore.id.0);
        relevant.extend(ore.yields.iter().map(|q| q.item.0));
    }

    let tx = conn.unchecked_transaction()?;

    for id in &relevant {
        let Some(sde) = types.get(id) else {
            continue;
        };
        let mut item = Item::new(
            sde.id,
            sde.name.as_ref().map(LocalizedName::english).unwrap_or_default(),
            sde.base_price.unwrap_or(0.0),
        );
        item.group_id = sde.group_id;
        db::upsert_item(&tx, &item)?;
        stats.items += 1;
    }

    for blueprint in &blueprints {
        db::upsert_blueprint(&tx, blueprint)?;
        stats.blueprints += 1;
    }

    for ore in &ores {
        db::upsert_ore(&tx, ore)?;
        stats.ores += 1;
    }

    tx.commit()?;
    info!("{}", stats);

    Ok(stats)
}

/// Store market prices from a file in the public `markets/prices` format,
/// a JSON array of `{type_id, average_price, adjusted_price}` objects.
///
/// Only items already in the database are updated.
pub fn import_market_prices(conn: &Connection, path: &Path) -> Result<PriceStats> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let prices: Vec<MarketPrice> = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse market prices in {}", path.display()))?;

    let mut stats = PriceStats::default();
    let tx = conn.unchecked_transaction()?;

    for price in &prices {
        let known = db::set_market_price(
            &tx,
            ItemId(price.type_id),
            price.average_price,
            price.adjusted_price,
        )?;
        if known {
            stats.updated += 1;
        } else {
            stats.unknown += 1;
        }
    }

    tx.commit()?;
    info!("{}", stats);

    Ok(stats)
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct PriceStats {
    pub updated: usize,
    /// Entries for types the database does not hold
    pub unknown: usize,
}

impl std::fmt::Display for PriceStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Updated market prices of {} items ({} entries for unknown types)",
            self.updated, self.unknown
        )
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ExtractStats {
    pub items: usize,
    pub blueprints: usize,
    pub ores: usize,
    pub skipped_blueprints: usize,
    pub skipped_ores: usize,
}

impl std::fmt::Display for ExtractStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Imported {} items, {} blueprints, {} ores. Skipped: {} blueprints, {} non-ore materials",
            self.items, self.blueprints, self.ores, self.skipped_blueprints, self.skipped_ores
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn localized_names_prefer_english() {
        let name: LocalizedName = serde_json::from_str(r#"{"de": "Tritanium", "en": "Tritanium"}"#).unwrap();
        assert_eq!(name.english(), "Tritanium");

        let name: LocalizedName = serde_json::from_str(r#""Pyerite""#).unwrap();
        assert_eq!(name.english(), "Pyerite");
    }

    #[test]
    fn market_price_entries_may_lack_average() {
        let prices: Vec<MarketPrice> = serde_json::from_str(
            r#"[{"adjusted_price": 4.1, "average_price": 3.9, "type_id": 34},
                {"adjusted_price": 120.5, "type_id": 11399}]"#,
        )
        .unwrap();

        assert_eq!(prices[0].type_id, 34);
        assert_eq!(prices[0].average_price, Some(3.9));
        assert_eq!(prices[1].average_price, None);
        assert_eq!(prices[1].adjusted_price, Some(120.5));
    }

    #[test]
    fn blueprint_without_manufacturing_parses() {
        let bp: SdeBlueprint =
            serde_json::from_str(r#"{"_key": 1, "activities": {"research_time": {"time": 5}}}"#).unwrap();
        assert!(bp.activities.manufacturing.is_none());

        let bp: SdeBlueprint = serde_json::from_str(r#"{"_key": 2}"#).unwrap();
        assert!(bp.activities.manufacturing.is_none());
    }
}

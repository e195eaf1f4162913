//! EVE Online industry planner
//!
//! Raw material and compressed ore planning for manufacturing blueprints.

use std::path::PathBuf;

use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use rusqlite::Connection;

use industry_planner::catalog::Catalog;
use industry_planner::config::{DemandScope, PlannerConfig};
use industry_planner::models::{Blueprint, Item, ItemId, SolveOutcome};
use industry_planner::optimizer::OrePlanner;
use industry_planner::resolver::{self, Resolver};
use industry_planner::{db, extract, logging, sample};

#[derive(Parser)]
#[command(name = "industry-planner")]
#[command(about = "Raw material and compressed ore planner for EVE Online blueprints")]
struct Cli {
    /// Path to the SQLite database
    #[arg(short, long, default_value = "eve_industry.db")]
    database: PathBuf,

    /// Deepest component nesting before giving up on a recipe
    #[arg(long, default_value_t = 64)]
    max_depth: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import an extracted static data export directory and/or market prices
    Import {
        /// Directory containing types.jsonl, blueprints.jsonl, typeMaterials.jsonl and groups.jsonl
        source_dir: Option<PathBuf>,

        /// Market prices file (JSON array of type_id, average_price, adjusted_price)
        #[arg(long)]
        prices: Option<PathBuf>,

        /// Clear existing data before importing
        #[arg(long)]
        clear: bool,
    },

    /// Show the raw materials a blueprint needs
    Materials {
        /// Blueprint id, blueprint name or product name
        blueprint: String,

        /// Number of runs
        #[arg(short, long, default_value_t = 1)]
        runs: u64,

        /// Show the full component tree
        #[arg(short, long)]
        verbose: bool,
    },

    /// Find the cheapest compressed ores covering a blueprint
    Ores {
        /// Blueprint id, blueprint name or product name
        blueprint: String,

        /// Cover the whole component tree instead of the blueprint's own raw materials
        #[arg(long)]
        recursive: bool,

        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },

    /// List blueprints in the database
    ListBlueprints {
        /// Only show blueprints whose name or product contains this text
        #[arg(short, long)]
        filter: Option<String>,
    },

    /// Show details for a specific blueprint
    Blueprint {
        /// Blueprint id, blueprint name or product name
        blueprint: String,
    },

    /// Initialize empty database with schema
    Init,

    /// Load sample data for testing (without a static data export)
    LoadSample,
}

fn main() -> Result<()> {
    logging::init();
    let cli = Cli::parse();

    let conn = Connection::open(&cli.database)?;
    db::init_schema(&conn)?;

    let config = PlannerConfig {
        max_depth: cli.max_depth,
        ..PlannerConfig::default()
    };

    match cli.command {
        Commands::Import {
            source_dir,
            prices,
            clear,
        } => {
            if source_dir.is_none() && prices.is_none() {
                return Err(anyhow!("Nothing to import: give a data directory, --prices, or both"));
            }

            if clear {
                println!("Clearing existing data...");
                db::clear_catalog_data(&conn)?;
            }

            if let Some(dir) = source_dir {
                let stats = extract::extract_to_database(&conn, &dir)?;
                println!("\n{}", stats);
            }
            if let Some(file) = prices {
                let stats = extract::import_market_prices(&conn, &file)?;
                println!("{}", stats);
            }
        }

        Commands::Materials {
            blueprint,
            runs,
            verbose,
        } => {
            let catalog = load_catalog(&conn)?;
            let bp = find_blueprint(&catalog, &blueprint)?;
            let resolver = Resolver::from_config(&config);

            if verbose {
                let tree = resolver.material_tree(&catalog, bp.id, runs)?;
                println!("Component tree:\n");
                println!("{}", resolver::format_material_tree(&tree, 0));
            }

            let demand = resolver.raw_material_demand(&catalog, bp.id, runs)?;
            println!("{}", resolver::summarize_demand(&catalog, bp.id, &demand));
        }

        Commands::Ores {
            blueprint,
            recursive,
            json,
        } => {
            let catalog = load_catalog(&conn)?;
            let bp = find_blueprint(&catalog, &blueprint)?;
            let scope = if recursive {
                DemandScope::Recursive
            } else {
                DemandScope::Direct
            };
            let planner = OrePlanner::new(PlannerConfig { scope, ..config });

            let outcome = planner.solve(&catalog, bp.id)?;
            if json {
                let value = match &outcome {
                    SolveOutcome::Solved(plan) => serde_json::to_value(plan)?,
                    SolveOutcome::Infeasible => serde_json::json!({ "infeasible": true }),
                };
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                print_ore_plan(&catalog, bp, &outcome);
            }
        }

        Commands::ListBlueprints { filter } => {
            let blueprints = db::list_blueprints(&conn, filter.as_deref())?;
            if blueprints.is_empty() {
                println!("No blueprints in database. Run 'import' or 'load-sample' first.");
            } else {
                println!("{:>8}  {:<40} {}", "ID", "Blueprint", "Product");
                println!("{}", "-".repeat(80));
                for b in blueprints {
                    println!("{:>8}  {:<40} {}", b.id, b.name, b.product);
                }
            }
        }

        Commands::Blueprint { blueprint } => {
            let catalog = load_catalog(&conn)?;
            let bp = find_blueprint(&catalog, &blueprint)?;
            let classified = catalog.classification(bp.id)?;

            println!("Blueprint: {}", catalog.name_of(bp.id));
            println!("  ID: {}", bp.id);
            println!("  Time: {}s", bp.job.time_s);

            println!("  Products:");
            for p in &bp.job.products {
                println!("    {} x{}", catalog.name_of(p.item), p.quantity);
            }
            if !classified.raw_materials.is_empty() {
                println!("  Raw materials:");
                for m in &classified.raw_materials {
                    let from_ore = catalog.item(m.item).is_some_and(|i| i.reprocessed_from_ore);
                    println!(
                        "    {} x{}{}",
                        catalog.name_of(m.item),
                        m.quantity,
                        if from_ore { " (refined from ore)" } else { "" }
                    );
                }
            }
            if !classified.components.is_empty() {
                println!("  Components:");
                for c in &classified.components {
                    println!("    {} x{}", catalog.name_of(c.item), c.quantity);
                }
            }
        }

        Commands::Init => {
            let (items, blueprints, ores) = db::counts(&conn)?;
            println!("Database initialized at: {}", cli.database.display());
            println!("  {} items, {} blueprints, {} ores", items, blueprints, ores);
        }

        Commands::LoadSample => {
            let count = sample::load_sample_data(&conn)?;
            println!("Loaded {} sample blueprints", count);
        }
    }

    Ok(())
}

fn load_catalog(conn: &Connection) -> Result<Catalog> {
    Ok(db::load_catalog(conn)?.finalize())
}

fn find_blueprint<'a>(catalog: &'a Catalog, query: &str) -> Result<&'a Blueprint> {
    catalog
        .find_blueprint(query)
        .ok_or_else(|| anyhow!("Blueprint '{}' not found", query))
}

fn market_price(catalog: &Catalog, id: ItemId) -> f64 {
    catalog.item(id).map_or(0.0, Item::market_price)
}

fn print_ore_plan(catalog: &Catalog, bp: &Blueprint, outcome: &SolveOutcome) {
    let plan = match outcome {
        SolveOutcome::Solved(plan) => plan,
        SolveOutcome::Infeasible => {
            println!(
                "No combination of known ores covers the materials of {}",
                catalog.name_of(bp.id)
            );
            return;
        }
    };

    println!("=== Compressed ore for {} ===", catalog.name_of(bp.id));
    println!("{:<32} {:>12} {:>18}", "Ore", "Quantity", "Total price");
    println!("{}", "-".repeat(64));
    let mut market_total = 0.0;
    for (ore, quantity) in &plan.purchases {
        let subtotal = *quantity as f64 * market_price(catalog, *ore);
        market_total += subtotal;
        println!(
            "{:<32} {:>12} {:>18.2}",
            catalog.name_of(*ore),
            quantity,
            subtotal
        );
    }
    println!("\nMarket value: {:.2} ISK", market_total);
    println!("Optimized cost: {:.2} ISK", plan.total_cost);

    if plan.leftovers.is_empty() {
        return;
    }

    println!();
    println!("{:<32} {:>12} {:>18}", "Leftover material", "Quantity", "Total price");
    println!("{}", "-".repeat(64));
    for (material, quantity) in &plan.leftovers {
        println!(
            "{:<32} {:>12} {:>18.2}",
            catalog.name_of(*material),
            quantity,
            *quantity as f64 * market_price(catalog, *material)
        );
    }
}

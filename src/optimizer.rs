//! Compressed ore purchase optimizer
//!
//! Picks whole ore units so that refining them covers a raw material demand
//! at the lowest ore cost. One integer column per ore, one `>=` row per
//! demanded material, solved by branch and bound.

use std::collections::BTreeMap;

use good_lp::{
    Expression, ProblemVariables, ResolutionError, Solution, SolverModel, Variable, constraint,
    microlp, variable,
};
use tracing::debug;

use crate::catalog::Catalog;
use crate::config::{DemandScope, PlannerConfig};
use crate::error::{PlanError, PlanResult};
use crate::models::{ItemId, ItemQuantity, Ore, OrePlan, SolveOutcome};
use crate::resolver::Resolver;

/// microlp clamps unbounded integer columns to this value
const UNBOUNDED_UNITS: f64 = i32::MAX as f64;

/// One demanded material and the ores that refine into it
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintRow {
    pub material: ItemId,
    pub required: u64,
    /// (column index, refined units per ore unit)
    pub coefficients: Vec<(usize, f64)>,
}

/// Row-wise integer program over ore unit counts
#[derive(Debug, Clone, PartialEq)]
pub struct OreModel {
    /// Ore id of each column
    pub columns: Vec<ItemId>,
    /// Unit price of each column
    pub costs: Vec<f64>,
    pub rows: Vec<ConstraintRow>,
}

impl OreModel {
    pub fn build(ores: &[Ore], demand: &[ItemQuantity], yield_scale: f64) -> Self {
        let rows = demand
            .iter()
            .map(|requirement| ConstraintRow {
                material: requirement.item,
                required: requirement.quantity,
                coefficients: ores
                    .iter()
                    .enumerate()
                    .filter_map(|(col, ore)| match ore.yield_of(requirement.item) {
                        0 => None,
                        raw => Some((col, raw as f64 / yield_scale)),
                    })
                    .collect(),
            })
            .collect();

        Self {
            columns: ores.iter().map(|o| o.id).collect(),
            costs: ores.iter().map(|o| o.price).collect(),
            rows,
        }
    }

    /// A row that needs something no column can supply
    fn uncoverable_row(&self) -> Option<&ConstraintRow> {
        self.rows
            .iter()
            .find(|row| row.required > 0 && row.coefficients.is_empty())
    }
}

#[derive(Debug, Clone, Default)]
pub struct OrePlanner {
    config: PlannerConfig,
}

impl OrePlanner {
    pub fn new(config: PlannerConfig) -> Self {
        Self { config }
    }

    /// Cheapest ore purchase covering one run of `blueprint`
    pub fn solve(&self, catalog: &Catalog, blueprint: ItemId) -> PlanResult<SolveOutcome> {
        let rows = self.demand_rows(catalog, blueprint)?;
        self.solve_demand(catalog.ores(), &rows)
    }

    /// The demand the solve has to cover, one entry per distinct material.
    ///
    /// Direct scope keeps the blueprint's stored requirement order; recursive
    /// scope is ordered by material id.
    pub fn demand_rows(&self, catalog: &Catalog, blueprint: ItemId) -> PlanResult<Vec<ItemQuantity>> {
        match self.config.scope {
            DemandScope::Direct => {
                let classified = catalog.classification(blueprint)?;
                let mut rows: Vec<ItemQuantity> = Vec::new();
                for raw in &classified.raw_materials {
                    match rows.iter_mut().find(|r| r.item == raw.item) {
                        Some(row) => row.quantity += raw.quantity,
                        None => rows.push(*raw),
                    }
                }
                Ok(rows)
            }
            DemandScope::Recursive => {
                let demand = Resolver::from_config(&self.config)
                    .raw_material_demand(catalog, blueprint, 1)?;
                Ok(demand
                    .into_iter()
                    .map(|(item, quantity)| ItemQuantity { item, quantity })
                    .collect())
            }
        }
    }

    /// Cheapest ore purchase covering `demand`
    pub fn solve_demand(&self, ores: &[Ore], demand: &[ItemQuantity]) -> PlanResult<SolveOutcome> {
        if let Some(ore) = ores.iter().find(|o| !o.price.is_finite() || o.price < 0.0) {
            return Err(PlanError::Solver(format!(
                "ore {} has unusable price {}",
                ore.id, ore.price
            )));
        }

        let model = OreModel::build(ores, demand, self.config.yield_scale);

        if let Some(row) = model.uncoverable_row() {
            debug!(material = %row.material, "no ore refines into a required material");
            return Ok(SolveOutcome::Infeasible);
        }
        if model.rows.iter().all(|row| row.required == 0) {
            return Ok(SolveOutcome::Solved(OrePlan::default()));
        }

        let Some(values) = self.run_solver(&model)? else {
            return Ok(SolveOutcome::Infeasible);
        };
        let units = self.whole_units(&values)?;

        let mut plan = OrePlan::default();
        for ((ore, units), price) in model.columns.iter().zip(units).zip(&model.costs) {
            if units > 0 {
                plan.purchases.insert(*ore, units);
                plan.total_cost += units as f64 * price;
            }
        }
        plan.leftovers = self.leftovers(ores, &plan.purchases, demand);

        Ok(SolveOutcome::Solved(plan))
    }

    /// Solver column values as whole ore units.
    ///
    /// Rounds up so float slack never leaves a row short.
    fn whole_units(&self, values: &[f64]) -> PlanResult<Vec<u64>> {
        values
            .iter()
            .map(|&value| {
                if !value.is_finite() || value >= UNBOUNDED_UNITS {
                    return Err(PlanError::Solver(format!(
                        "solver returned an unbounded ore quantity {}",
                        value
                    )));
                }
                Ok((value - self.config.integrality_tolerance).ceil().max(0.0) as u64)
            })
            .collect()
    }

    /// Column values, or `None` when the program has no integer solution
    fn run_solver(&self, model: &OreModel) -> PlanResult<Option<Vec<f64>>> {
        debug!(
            columns = model.columns.len(),
            rows = model.rows.len(),
            "solving ore model"
        );

        let mut vars = ProblemVariables::new();
        let columns: Vec<Variable> = model
            .columns
            .iter()
            .map(|_| vars.add(variable().integer().min(0)))
            .collect();

        let objective: Expression = columns
            .iter()
            .zip(&model.costs)
            .map(|(var, cost)| *cost * *var)
            .sum();

        let mut problem = vars.minimise(objective).using(microlp);
        for row in &model.rows {
            let supplied: Expression = row
                .coefficients
                .iter()
                .map(|(col, coefficient)| *coefficient * columns[*col])
                .sum();
            let required = row.required as f64;
            problem = problem.with(constraint!(supplied >= required));
        }

        match problem.solve() {
            Ok(solution) => Ok(Some(columns.iter().map(|v| solution.value(*v)).collect())),
            Err(ResolutionError::Infeasible) => Ok(None),
            Err(err) => Err(PlanError::Solver(err.to_string())),
        }
    }

    /// Refined output beyond `demand`, including materials nobody asked for
    pub fn leftovers(
        &self,
        ores: &[Ore],
        purchases: &BTreeMap<ItemId, u64>,
        demand: &[ItemQuantity],
    ) -> BTreeMap<ItemId, u64> {
        let mut produced: BTreeMap<ItemId, f64> = BTreeMap::new();
        for ore in ores {
            let Some(&units) = purchases.get(&ore.id) else {
                continue;
            };
            for product in &ore.yields {
                *produced.entry(product.item).or_default() +=
                    units as f64 * product.quantity as f64 / self.config.yield_scale;
            }
        }

        produced
            .into_iter()
            .filter_map(|(material, total)| {
                let required = demand
                    .iter()
                    .filter(|d| d.item == material)
                    .map(|d| d.quantity as f64)
                    .sum::<f64>();
                let extra = total - required;
                (extra > self.config.leftover_threshold).then(|| (material, extra.round() as u64))
            })
            .collect()
    }
}

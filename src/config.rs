//! Planner settings

/// Which raw materials the ore solve has to cover
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DemandScope {
    /// Only the target blueprint's own raw materials
    #[default]
    Direct,
    /// The full recursive demand, including raw materials of every component
    Recursive,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannerConfig {
    /// Deepest component nesting before expansion gives up
    pub max_depth: usize,
    /// Ore yield figures are divided by this to get units per ore unit
    pub yield_scale: f64,
    /// Surplus at or below this is treated as rounding noise
    pub leftover_threshold: f64,
    /// Solver values within this of an integer are taken as that integer
    pub integrality_tolerance: f64,
    pub scope: DemandScope,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_depth: 64,
            yield_scale: 100.0,
            leftover_threshold: 0.5,
            integrality_tolerance: 1e-6,
            scope: DemandScope::Direct,
        }
    }
}

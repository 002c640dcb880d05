//! Engine tiers and the single dispatch point that runs them.

use crate::{bdd, dpll};
use featmodel_kernel::ValidationConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Engine {
    Bdd,
    Dpll,
}

impl Engine {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bdd => "bdd",
            Self::Dpll => "dpll",
        }
    }

    /// Tier for a problem of `num_vars` variables.
    pub fn select(num_vars: usize, config: &ValidationConfig) -> Self {
        if num_vars <= config.bdd_max_variables {
            Self::Bdd
        } else {
            Self::Dpll
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolveOutcome {
    /// The tier that produced the answer.
    pub engine: Engine,
    /// Model indexed by `var - 1`; `None` when unsatisfiable.
    pub assignment: Option<Vec<bool>>,
    pub warnings: Vec<String>,
}

impl SolveOutcome {
    pub fn is_sat(&self) -> bool {
        self.assignment.is_some()
    }
}

/// Solve with the tier the config selects for this size.
pub fn solve(num_vars: usize, clauses: &[Vec<i32>], config: &ValidationConfig) -> SolveOutcome {
    solve_with(Engine::select(num_vars, config), num_vars, clauses, config)
}

/// Solve with an explicit tier. A BDD that outgrows its node budget falls
/// back to DPLL.
pub fn solve_with(
    engine: Engine,
    num_vars: usize,
    clauses: &[Vec<i32>],
    config: &ValidationConfig,
) -> SolveOutcome {
    tracing::debug!(
        engine = engine.as_str(),
        variables = num_vars,
        clauses = clauses.len(),
        "solving"
    );
    match engine {
        Engine::Bdd => match bdd::solve(num_vars, clauses, config.bdd_node_limit) {
            Ok(assignment) => SolveOutcome {
                engine: Engine::Bdd,
                assignment,
                warnings: Vec::new(),
            },
            Err(err) => {
                tracing::warn!(limit = err.limit, "bdd node limit exceeded, falling back to dpll");
                SolveOutcome {
                    engine: Engine::Dpll,
                    assignment: dpll::solve(num_vars, clauses),
                    warnings: vec![format!("{err}; fell back to dpll")],
                }
            }
        },
        Engine::Dpll => SolveOutcome {
            engine: Engine::Dpll,
            assignment: dpll::solve(num_vars, clauses),
            warnings: Vec::new(),
        },
    }
}

/// Exact model count via the BDD; `None` when the diagram or the count
/// outgrows its bounds.
pub fn count(num_vars: usize, clauses: &[Vec<i32>], config: &ValidationConfig) -> Option<u128> {
    match bdd::count_models(num_vars, clauses, config.bdd_node_limit) {
        Ok(count) => count,
        Err(err) => {
            tracing::warn!(limit = err.limit, "model count unavailable");
            None
        }
    }
}

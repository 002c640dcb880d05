//! # featmodel-logic
//!
//! Boolean semantics of a feature model.
//!
//! A version's active rows are encoded into CNF, one variable per feature,
//! each clause tagged with the model rule it came from. Two engine tiers
//! decide satisfiability:
//!
//! - [`Engine::Bdd`]: reduced ordered BDD, used up to
//!   `validation.bdd_max_variables` variables; also counts configurations.
//! - [`Engine::Dpll`]: iterative DPLL, used above the threshold and as the
//!   fallback when the BDD outgrows its node budget.
//!
//! [`LogicalValidator`] is the entry point.

pub mod bdd;
pub mod dpll;
pub mod encode;
pub mod engine;
pub mod validator;

pub use encode::{
    Clause, ClauseOrigin, EncodedConstraint, EncodedGroup, GroupCounter, ModelEncoding, encode_model,
};
pub use engine::{Engine, SolveOutcome};
pub use validator::{
    ConfigurationVerdict, FeatureRef, LogicalValidator, ModelVerdict, VariabilityReport,
};

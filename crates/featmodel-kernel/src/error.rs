//! Fault taxonomy for feature-model operations.
//!
//! Faults are grouped by the layer that raises them. Every fault carries the
//! offending identifiers so callers can render a precise message without
//! re-querying the model.

use crate::model::VersionState;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub const FAULT_CLASS_MISSING_ROOT: &str = "structural.missing_root";
pub const FAULT_CLASS_MULTIPLE_ROOTS: &str = "structural.multiple_roots";
pub const FAULT_CLASS_ORPHAN: &str = "structural.orphan_feature";
pub const FAULT_CLASS_MULTIPLE_PARENTS: &str = "structural.multiple_parents";
pub const FAULT_CLASS_CYCLE: &str = "structural.cyclic_dependency";
pub const FAULT_CLASS_INVALID_RELATION: &str = "structural.invalid_relation";
pub const FAULT_CLASS_SELF_RELATION: &str = "structural.self_relation";
pub const FAULT_CLASS_DUPLICATE_RELATION: &str = "structural.duplicate_relation";
pub const FAULT_CLASS_GROUP_CARDINALITY: &str = "structural.group_cardinality";
pub const FAULT_CLASS_EMPTY_GROUP: &str = "structural.empty_group";
pub const FAULT_CLASS_DEAD_FEATURE: &str = "structural.dead_feature";
pub const FAULT_CLASS_INVALID_EXPRESSION: &str = "logical.invalid_expression";
pub const FAULT_CLASS_UNSATISFIABLE: &str = "logical.unsatisfiable";
pub const FAULT_CLASS_CONFLICTING_CONSTRAINTS: &str = "logical.conflicting_constraints";
pub const FAULT_CLASS_INVALID_CONFIGURATION: &str = "configuration.invalid";
pub const FAULT_CLASS_VERSION_TRANSITION: &str = "version.invalid_transition";
pub const FAULT_CLASS_VERSION_NOT_FOUND: &str = "version.not_found";
pub const FAULT_CLASS_VERSION_STORE: &str = "version.store";
pub const FAULT_CLASS_CONFIG: &str = "engine.config";
pub const FAULT_CLASS_DOCUMENT: &str = "engine.document";

fn cardinality_bound(max: &Option<u32>) -> String {
    max.map_or_else(|| "*".to_string(), |m| m.to_string())
}

/// Violations of the tree and reference invariants of a version.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StructuralFault {
    #[error("feature model has no root feature")]
    MissingRootFeature,

    #[error("feature model has {count} root features, exactly one is required")]
    MultipleRootFeatures { count: usize },

    #[error("feature '{name}' ({id}) is not reachable from the root")]
    OrphanFeature { id: Uuid, name: String },

    #[error("feature {id} is attached to {count} distinct parents")]
    MultipleParents { id: Uuid, count: usize },

    #[error("cyclic dependency between features: {}", .members.join(", "))]
    CyclicDependency { members: Vec<String> },

    #[error("invalid relation: {reason}")]
    InvalidRelation { reason: String },

    #[error("feature '{feature}' cannot relate to itself")]
    SelfRelation { feature: String },

    #[error("{kind} relation already exists: {source_feature} -> {target_feature}")]
    DuplicateRelation {
        kind: String,
        source_feature: String,
        target_feature: String,
    },

    #[error(
        "group {group} has invalid cardinality [{min}, {}] for {members} member(s)",
        cardinality_bound(.max)
    )]
    InvalidGroupCardinality {
        group: Uuid,
        min: u32,
        max: Option<u32>,
        members: usize,
    },

    #[error("group {group} has no member features")]
    EmptyGroup { group: Uuid },

    #[error("dead feature '{name}' ({id}) is unreachable from the root")]
    DeadFeatureDetected { id: Uuid, name: String },
}

impl StructuralFault {
    pub fn class(&self) -> &'static str {
        match self {
            Self::MissingRootFeature => FAULT_CLASS_MISSING_ROOT,
            Self::MultipleRootFeatures { .. } => FAULT_CLASS_MULTIPLE_ROOTS,
            Self::OrphanFeature { .. } => FAULT_CLASS_ORPHAN,
            Self::MultipleParents { .. } => FAULT_CLASS_MULTIPLE_PARENTS,
            Self::CyclicDependency { .. } => FAULT_CLASS_CYCLE,
            Self::InvalidRelation { .. } => FAULT_CLASS_INVALID_RELATION,
            Self::SelfRelation { .. } => FAULT_CLASS_SELF_RELATION,
            Self::DuplicateRelation { .. } => FAULT_CLASS_DUPLICATE_RELATION,
            Self::InvalidGroupCardinality { .. } => FAULT_CLASS_GROUP_CARDINALITY,
            Self::EmptyGroup { .. } => FAULT_CLASS_EMPTY_GROUP,
            Self::DeadFeatureDetected { .. } => FAULT_CLASS_DEAD_FEATURE,
        }
    }
}

/// Faults raised while reasoning about the boolean semantics of a model.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LogicalFault {
    #[error("invalid constraint expression '{expression}': {reason}")]
    InvalidConstraintExpression { expression: String, reason: String },

    #[error("feature model is unsatisfiable: {detail}")]
    UnsatisfiableModel { detail: String },

    #[error("constraints conflict: '{first}' and '{second}'")]
    ConflictingConstraints { first: String, second: String },
}

impl LogicalFault {
    pub fn class(&self) -> &'static str {
        match self {
            Self::InvalidConstraintExpression { .. } => FAULT_CLASS_INVALID_EXPRESSION,
            Self::UnsatisfiableModel { .. } => FAULT_CLASS_UNSATISFIABLE,
            Self::ConflictingConstraints { .. } => FAULT_CLASS_CONFLICTING_CONSTRAINTS,
        }
    }
}

/// Why a concrete selection was rejected.
///
/// Feature references are rendered by name so the reason can be shown to a
/// modeller as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ConfigurationReason {
    /// The root, or a mandatory child of a selected parent, is deselected.
    MandatoryFeatureMissing {
        feature: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent: Option<String>,
    },
    /// A selected feature depends on a deselected one.
    RequiredFeatureMissing { feature: String, required: String },
    ExcludedFeaturesSelected { first: String, second: String },
    GroupCardinalityViolated {
        group: Uuid,
        parent: String,
        selected: usize,
        min: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<u32>,
    },
    UnknownFeature { id: Uuid },
    /// No single model rule isolates the conflict.
    Unspecified { detail: String },
}

impl fmt::Display for ConfigurationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MandatoryFeatureMissing {
                feature,
                parent: Some(parent),
            } => write!(
                f,
                "mandatory feature '{feature}' is missing (required by '{parent}')"
            ),
            Self::MandatoryFeatureMissing {
                feature,
                parent: None,
            } => write!(f, "root feature '{feature}' must be selected"),
            Self::RequiredFeatureMissing { feature, required } => {
                write!(f, "feature '{feature}' requires '{required}'")
            }
            Self::ExcludedFeaturesSelected { first, second } => {
                write!(f, "features '{first}' and '{second}' exclude each other")
            }
            Self::GroupCardinalityViolated {
                parent,
                selected,
                min,
                max,
                ..
            } => write!(
                f,
                "group under '{parent}' has {selected} selected member(s), expected [{min}, {}]",
                cardinality_bound(max)
            ),
            Self::UnknownFeature { id } => write!(f, "feature {id} is not part of this version"),
            Self::Unspecified { detail } => f.write_str(detail),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationFault {
    #[error("invalid configuration: {reason}")]
    InvalidConfiguration { reason: ConfigurationReason },
}

impl ConfigurationFault {
    pub fn reason(&self) -> &ConfigurationReason {
        match self {
            Self::InvalidConfiguration { reason } => reason,
        }
    }
}

/// Lifecycle and lookup faults raised by the version store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VersionStateFault {
    #[error("cannot {operation}: version is in state '{current}', but '{required}' is required")]
    InvalidVersionTransition {
        current: VersionState,
        required: VersionState,
        operation: String,
    },

    #[error("version not found: {0}")]
    VersionNotFound(String),

    #[error("feature model not found: {0}")]
    ModelNotFound(Uuid),

    #[error("{kind} not found in version: {id}")]
    EntityNotFound { kind: &'static str, id: Uuid },

    #[error("{kind} {id} references {target}, which is not part of the source version")]
    UnresolvedReference {
        kind: &'static str,
        id: Uuid,
        target: Uuid,
    },

    #[error("invalid edit: {0}")]
    InvalidEdit(String),
}

impl VersionStateFault {
    pub fn class(&self) -> &'static str {
        match self {
            Self::InvalidVersionTransition { .. } => FAULT_CLASS_VERSION_TRANSITION,
            Self::VersionNotFound(_) | Self::ModelNotFound(_) => FAULT_CLASS_VERSION_NOT_FOUND,
            Self::EntityNotFound { .. }
            | Self::UnresolvedReference { .. }
            | Self::InvalidEdit(_) => FAULT_CLASS_VERSION_STORE,
        }
    }
}

/// Any fault an engine operation can raise.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeatureModelError {
    #[error(transparent)]
    Structural(#[from] StructuralFault),

    #[error(transparent)]
    Logical(#[from] LogicalFault),

    #[error(transparent)]
    Configuration(#[from] ConfigurationFault),

    #[error(transparent)]
    VersionState(#[from] VersionStateFault),

    #[error("invalid engine config: {0}")]
    Config(String),

    #[error("unknown feature: {0}")]
    UnknownFeature(String),

    #[error("invalid model document: {0}")]
    Document(String),
}

impl FeatureModelError {
    /// Stable machine-readable class, suitable for JSON reports.
    pub fn class(&self) -> &'static str {
        match self {
            Self::Structural(fault) => fault.class(),
            Self::Logical(fault) => fault.class(),
            Self::Configuration(_) => FAULT_CLASS_INVALID_CONFIGURATION,
            Self::VersionState(fault) => fault.class(),
            Self::Config(_) => FAULT_CLASS_CONFIG,
            Self::UnknownFeature(_) | Self::Document(_) => FAULT_CLASS_DOCUMENT,
        }
    }
}

pub type Result<T, E = FeatureModelError> = std::result::Result<T, E>;

/// Severity of an analysis finding.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Minor,
    Major,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Minor => "minor",
            Self::Major => "major",
            Self::Critical => "critical",
        }
    }
}

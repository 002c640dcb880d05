//! # featmodel-kernel
//!
//! Shared vocabulary for the feature-model engine: records, faults and the
//! structures every analysis builds on.
//!
//! ## Architecture
//!
//! ```text
//! VersionContents       ← flat Feature / FeatureGroup / FeatureRelation / Constraint rows
//!     │
//! FeatureTree           ← id-indexed arena with a children index
//!     │
//! VariableMapping       ← stable feature-id ↔ 1-based variable ordinals
//!     │
//! Expr                  ← parsed constraint text, convertible to CNF
//!     │
//! TreeBuilder           ← nested name-sorted views, statistics, snapshots
//! ```
//!
//! Nothing here performs I/O except the explicit `load` helpers on
//! [`EngineConfig`] and [`ModelDocument`].

pub mod builder;
pub mod config;
pub mod document;
pub mod error;
pub mod expr;
pub mod mapping;
pub mod model;
pub mod tree;
pub mod view;

pub use builder::ModelBuilder;
pub use config::{AnalysisConfig, EngineConfig, GenerationConfig, ImpactWeights, ValidationConfig};
pub use document::ModelDocument;
pub use error::{
    ConfigurationFault, ConfigurationReason, FeatureModelError, LogicalFault, Result, Severity,
    StructuralFault, VersionStateFault,
};
pub use expr::{
    ConstraintShape, Expr, NameResolver, Operators, expression_name, parse_expression,
};
pub use mapping::VariableMapping;
pub use model::{
    Audit, Constraint, Feature, FeatureGroup, FeatureKind, FeatureLiteral, FeatureModel,
    FeatureModelVersion, FeatureRelation, GroupKind, RelationKind, VersionContents, VersionState,
};
pub use tree::FeatureTree;
pub use view::{
    GroupInfo, ModelStatistics, RelationView, SnapshotMapping, SnapshotMetadata, SnapshotModel,
    TreeBuilder, TreeNode, VersionSnapshot,
};

//! # featmodel-analysis
//!
//! Topology-level reasoning over one feature-model version:
//!
//! - [`StructuralAnalyzer`]: tree shape, reference integrity, cycles,
//!   feature impact and complexity metrics, plus the batch `analyze` entry
//!   point that turns findings into severity-ranked issues.
//! - [`ConfigurationGenerator`]: breadth-first configuration generation
//!   under the GREEDY and RANDOM strategies.

pub mod generator;
pub mod structural;

pub use generator::{
    ConfigurationGenerator, GenerationOptions, GenerationResult, GenerationStrategy,
};
pub use structural::{
    AnalysisKind, ComplexityMetrics, CycleScope, FeatureImpact, StructuralAnalysisResult,
    StructuralAnalyzer, StructuralIssue,
};

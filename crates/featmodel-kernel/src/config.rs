//! Engine tuning knobs, loadable from TOML.
//!
//! ```toml
//! [validation]
//! bdd_max_variables = 24
//!
//! [generation]
//! max_iterations = 1000
//! greedy_seed = 7
//!
//! [analysis]
//! max_depth_warning = 10
//!
//! [impact]
//! constraint_weight = 2
//! ```
//!
//! Every field is optional; missing sections fall back to defaults.

use crate::error::FeatureModelError;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub validation: ValidationConfig,
    pub generation: GenerationConfig,
    pub analysis: AnalysisConfig,
    pub impact: ImpactWeights,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Models with at most this many variables use the BDD engine.
    pub bdd_max_variables: usize,
    /// Upper bound on BDD nodes before falling back to DPLL.
    pub bdd_node_limit: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            bdd_max_variables: 24,
            bdd_node_limit: 200_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub max_iterations: usize,
    pub greedy_seed: u64,
    /// Inclusion probability for an optional leaf under GREEDY.
    pub leaf_probability: f64,
    /// Inclusion probability for an optional feature with few children.
    pub narrow_probability: f64,
    /// Inclusion probability for an optional feature with many children.
    pub wide_probability: f64,
    /// Child count at or below which a feature counts as narrow.
    pub narrow_child_limit: usize,
    pub random_probability: f64,
    pub default_batch_size: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            greedy_seed: 7,
            leaf_probability: 0.3,
            narrow_probability: 0.6,
            wide_probability: 0.8,
            narrow_child_limit: 2,
            random_probability: 0.5,
            default_batch_size: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub max_depth_warning: usize,
    pub constraint_density_warning: f64,
    /// Fraction of the model a feature's subtree must exceed to be flagged.
    pub high_impact_ratio: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_depth_warning: 10,
            constraint_density_warning: 1.0,
            high_impact_ratio: 0.3,
        }
    }
}

/// Weights of the impact score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImpactWeights {
    pub constraint_weight: usize,
}

impl Default for ImpactWeights {
    fn default() -> Self {
        Self {
            constraint_weight: 2,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, FeatureModelError> {
        let config: Self =
            toml::from_str(raw).map_err(|e| FeatureModelError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, FeatureModelError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| FeatureModelError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&raw)
    }

    fn validate(&self) -> Result<(), FeatureModelError> {
        let g = &self.generation;
        for (name, p) in [
            ("leaf_probability", g.leaf_probability),
            ("narrow_probability", g.narrow_probability),
            ("wide_probability", g.wide_probability),
            ("random_probability", g.random_probability),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(FeatureModelError::Config(format!(
                    "generation.{name} must be within [0, 1], got {p}"
                )));
            }
        }
        if g.max_iterations == 0 {
            return Err(FeatureModelError::Config(
                "generation.max_iterations must be greater than zero".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.analysis.high_impact_ratio) {
            return Err(FeatureModelError::Config(format!(
                "analysis.high_impact_ratio must be within [0, 1], got {}",
                self.analysis.high_impact_ratio
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            [generation]
            greedy_seed = 99

            [impact]
            constraint_weight = 5
            "#,
        )
        .expect("config should parse");
        assert_eq!(config.generation.greedy_seed, 99);
        assert_eq!(config.generation.max_iterations, 1000);
        assert_eq!(config.impact.constraint_weight, 5);
        assert_eq!(config.validation.bdd_max_variables, 24);
    }

    #[test]
    fn rejects_out_of_range_probability() {
        let err = EngineConfig::from_toml_str("[generation]\nleaf_probability = 1.5\n")
            .expect_err("probability above one must fail");
        assert!(err.to_string().contains("leaf_probability"));
    }

    #[test]
    fn empty_document_is_default() {
        let config = EngineConfig::from_toml_str("").expect("empty config should parse");
        assert_eq!(config, EngineConfig::default());
    }
}

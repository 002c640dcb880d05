//! Satisfiability checks over one version's rows.

use crate::encode::{ClauseOrigin, ModelEncoding, encode_model};
use crate::engine::{self, Engine};
use featmodel_kernel::{
    ConfigurationFault, ConfigurationReason, ConstraintShape, FeatureKind, FeatureModelError,
    LogicalFault, ValidationConfig, VersionContents,
};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

const HIERARCHY_LABEL: &str = "feature hierarchy";

/// Result of a whole-model satisfiability check.
#[derive(Debug, Clone, Serialize)]
pub struct ModelVerdict {
    pub is_valid: bool,
    pub engine: Engine,
    pub variables: usize,
    pub clauses: usize,
    /// One satisfying assignment, keyed by feature id.
    pub assignment: BTreeMap<Uuid, bool>,
    /// Features set in that assignment, in variable order.
    pub selected: Vec<Uuid>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigurationVerdict {
    pub is_valid: bool,
    pub selected: Vec<Uuid>,
    pub checked_clauses: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeatureRef {
    pub id: Uuid,
    pub name: String,
}

/// Features whose selection is fixed across every valid configuration.
#[derive(Debug, Clone, Default, Serialize)]
pub struct VariabilityReport {
    /// Selected in every configuration.
    pub core: Vec<FeatureRef>,
    /// Selected in no configuration.
    pub dead: Vec<FeatureRef>,
    /// Optional by kind, yet core.
    pub false_optional: Vec<FeatureRef>,
}

pub struct LogicalValidator<'a> {
    contents: &'a VersionContents,
    config: ValidationConfig,
}

impl<'a> LogicalValidator<'a> {
    pub fn new(contents: &'a VersionContents) -> Self {
        Self {
            contents,
            config: ValidationConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ValidationConfig) -> Self {
        self.config = config;
        self
    }

    pub fn encode(&self) -> Result<ModelEncoding, LogicalFault> {
        encode_model(self.contents)
    }

    /// Check that at least one configuration satisfies every rule.
    pub fn validate_feature_model(&self) -> Result<ModelVerdict, FeatureModelError> {
        let encoding = self.encode()?;
        let clauses = encoding.literal_lists();
        let outcome = engine::solve(encoding.num_vars(), &clauses, &self.config);
        let Some(model) = outcome.assignment else {
            tracing::debug!(engine = outcome.engine.as_str(), "model is unsatisfiable");
            return Err(LogicalFault::UnsatisfiableModel {
                detail: format!(
                    "no configuration satisfies {} clause(s) over {} feature(s)",
                    clauses.len(),
                    encoding.feature_vars()
                ),
            }
            .into());
        };

        let mut assignment = BTreeMap::new();
        let mut selected = Vec::new();
        for (var, id) in encoding.mapping.iter() {
            let value = model.get(var as usize - 1).copied().unwrap_or(false);
            assignment.insert(id, value);
            if value {
                selected.push(id);
            }
        }
        Ok(ModelVerdict {
            is_valid: true,
            engine: outcome.engine,
            variables: encoding.num_vars(),
            clauses: clauses.len(),
            assignment,
            selected,
            warnings: outcome.warnings,
        })
    }

    /// Check a concrete selection; every feature not listed is deselected.
    ///
    /// A rejected selection is diagnosed by the first model rule it breaks,
    /// in encoding order.
    pub fn validate_configuration(
        &self,
        selected: &[Uuid],
    ) -> Result<ConfigurationVerdict, FeatureModelError> {
        let encoding = self.encode()?;
        let mut assignment = vec![false; encoding.num_vars()];
        for id in selected {
            let Some(var) = encoding.var(*id) else {
                return Err(invalid(ConfigurationReason::UnknownFeature { id: *id }));
            };
            assignment[var as usize - 1] = true;
        }
        encoding.complete_assignment(&mut assignment);

        if let Some(violated) = encoding
            .clauses
            .iter()
            .find(|clause| !clause.is_satisfied_by(&assignment))
        {
            let reason = diagnose(&encoding, &violated.origin, &assignment);
            tracing::debug!(%reason, "configuration rejected");
            return Err(invalid(reason));
        }

        let mut ordered: Vec<Uuid> = Vec::new();
        for (var, id) in encoding.mapping.iter() {
            if assignment[var as usize - 1] {
                ordered.push(id);
            }
        }
        Ok(ConfigurationVerdict {
            is_valid: true,
            selected: ordered,
            checked_clauses: encoding.clauses.len(),
        })
    }

    /// Isolate the cross-tree rules that make the model unsatisfiable.
    ///
    /// `Ok(())` when the model is satisfiable. Otherwise single relations
    /// and constraints are tried against the hierarchy first, then pairs.
    pub fn find_conflicting_constraints(&self) -> Result<(), FeatureModelError> {
        let encoding = self.encode()?;
        let num_vars = encoding.num_vars();
        let sat = |clauses: &[Vec<i32>]| engine::solve(num_vars, clauses, &self.config).is_sat();

        if sat(&encoding.literal_lists()) {
            return Ok(());
        }
        let hierarchy = encoding.literal_lists_where(|origin| !origin.is_cross_tree());
        if !sat(&hierarchy) {
            return Err(LogicalFault::UnsatisfiableModel {
                detail: "the feature hierarchy alone is unsatisfiable".to_string(),
            }
            .into());
        }

        let items = encoding.cross_tree_items();
        let with_items = |picked: &[Uuid]| -> Vec<Vec<i32>> {
            let mut clauses = hierarchy.clone();
            clauses.extend(encoding.literal_lists_where(|origin| {
                origin
                    .cross_tree_item()
                    .is_some_and(|item| picked.contains(&item))
            }));
            clauses
        };

        for item in &items {
            if !sat(&with_items(&[*item])) {
                return Err(LogicalFault::ConflictingConstraints {
                    first: encoding.item_label(*item),
                    second: HIERARCHY_LABEL.to_string(),
                }
                .into());
            }
        }
        for (i, first) in items.iter().enumerate() {
            for second in &items[i + 1..] {
                if !sat(&with_items(&[*first, *second])) {
                    return Err(LogicalFault::ConflictingConstraints {
                        first: encoding.item_label(*first),
                        second: encoding.item_label(*second),
                    }
                    .into());
                }
            }
        }
        Err(LogicalFault::UnsatisfiableModel {
            detail: format!(
                "no single cross-tree rule or pair of rules isolates the conflict among {}",
                items.len()
            ),
        }
        .into())
    }

    /// Core, dead and false-optional features.
    pub fn analyze_variability(&self) -> Result<VariabilityReport, FeatureModelError> {
        let encoding = self.encode()?;
        let num_vars = encoding.num_vars();
        let base = encoding.literal_lists();
        let Some(witness) = engine::solve(num_vars, &base, &self.config).assignment else {
            return Err(LogicalFault::UnsatisfiableModel {
                detail: "variability is undefined for an unsatisfiable model".to_string(),
            }
            .into());
        };

        let forced_unsat = |lit: i32| {
            let mut clauses = base.clone();
            clauses.push(vec![lit]);
            !engine::solve(num_vars, &clauses, &self.config).is_sat()
        };

        let mut report = VariabilityReport::default();
        for (var, id) in encoding.mapping.iter() {
            let lit = var as i32;
            let feature = FeatureRef {
                id,
                name: encoding.name(id),
            };
            // A witness value rules out the opposite verdict without a solve.
            if witness[var as usize - 1] {
                if forced_unsat(-lit) {
                    let optional = self
                        .contents
                        .feature(id)
                        .is_some_and(|f| f.kind == FeatureKind::Optional && !f.is_root());
                    if optional {
                        report.false_optional.push(feature.clone());
                    }
                    report.core.push(feature);
                }
            } else if forced_unsat(lit) {
                report.dead.push(feature);
            }
        }
        tracing::debug!(
            core = report.core.len(),
            dead = report.dead.len(),
            false_optional = report.false_optional.len(),
            "variability analyzed"
        );
        Ok(report)
    }

    /// Number of valid configurations, if the BDD can represent it.
    pub fn count_configurations(&self) -> Result<Option<u128>, FeatureModelError> {
        let encoding = self.encode()?;
        Ok(engine::count(
            encoding.num_vars(),
            &encoding.literal_lists(),
            &self.config,
        ))
    }
}

fn invalid(reason: ConfigurationReason) -> FeatureModelError {
    ConfigurationFault::InvalidConfiguration { reason }.into()
}

fn diagnose(
    encoding: &ModelEncoding,
    origin: &ClauseOrigin,
    assignment: &[bool],
) -> ConfigurationReason {
    let name = |id: Uuid| encoding.name(id);
    match *origin {
        ClauseOrigin::Root { feature } => ConfigurationReason::MandatoryFeatureMissing {
            feature: name(feature),
            parent: None,
        },
        ClauseOrigin::Mandatory { parent, child } => ConfigurationReason::MandatoryFeatureMissing {
            feature: name(child),
            parent: Some(name(parent)),
        },
        ClauseOrigin::Optional { parent, child } => ConfigurationReason::RequiredFeatureMissing {
            feature: name(child),
            required: name(parent),
        },
        ClauseOrigin::GroupMember { parent, member, .. } => {
            ConfigurationReason::RequiredFeatureMissing {
                feature: name(member),
                required: name(parent),
            }
        }
        ClauseOrigin::GroupAtLeast { group, parent }
        | ClauseOrigin::GroupExclusion { group, parent, .. }
        | ClauseOrigin::GroupAtMost { group, parent }
        | ClauseOrigin::GroupCounter { group, parent } => {
            let (selected, min, max) = match encoding.groups.get(&group) {
                Some(g) => {
                    let picked: BTreeSet<Uuid> = g
                        .members
                        .iter()
                        .copied()
                        .filter(|m| {
                            encoding
                                .var(*m)
                                .is_some_and(|v| assignment[v as usize - 1])
                        })
                        .collect();
                    (picked.len(), g.min, g.max)
                }
                None => (0, 0, None),
            };
            ConfigurationReason::GroupCardinalityViolated {
                group,
                parent: name(parent),
                selected,
                min,
                max,
            }
        }
        ClauseOrigin::Requires { source, target, .. } => {
            ConfigurationReason::RequiredFeatureMissing {
                feature: name(source),
                required: name(target),
            }
        }
        ClauseOrigin::Excludes { first, second, .. } => {
            ConfigurationReason::ExcludedFeaturesSelected {
                first: name(first),
                second: name(second),
            }
        }
        ClauseOrigin::Constraint { constraint } => match encoding.constraints.get(&constraint) {
            Some(encoded) => match encoded.shape {
                ConstraintShape::Requires { source, target } => {
                    ConfigurationReason::RequiredFeatureMissing {
                        feature: name(source),
                        required: name(target),
                    }
                }
                ConstraintShape::Excludes { first, second } => {
                    ConfigurationReason::ExcludedFeaturesSelected {
                        first: name(first),
                        second: name(second),
                    }
                }
                ConstraintShape::General => ConfigurationReason::Unspecified {
                    detail: format!("constraint '{}' is violated", encoded.label),
                },
            },
            None => ConfigurationReason::Unspecified {
                detail: format!("constraint {constraint} is violated"),
            },
        },
    }
}

//! Structural analysis: tree shape, reference integrity, cycles, impact and
//! complexity metrics.
//!
//! Everything here is topological. Boolean reasoning (core and dead features
//! under the constraints) lives in `featmodel-logic`.

use featmodel_kernel::expr::{expr_from_cnf, normalize_name};
use featmodel_kernel::{
    AnalysisConfig, ConstraintShape, Feature, FeatureModelError, FeatureTree, GroupKind,
    ImpactWeights, NameResolver, RelationKind, Severity, StructuralFault, VersionContents,
    parse_expression,
};
use regex::Regex;
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;
use uuid::Uuid;

pub const ISSUE_MISSING_ROOT: &str = "missing_root";
pub const ISSUE_DEAD_FEATURE: &str = "dead_feature";
pub const ISSUE_DUPLICATE_RELATION: &str = "duplicate_relation";
pub const ISSUE_DUPLICATE_CONSTRAINT: &str = "duplicate_constraint";
pub const ISSUE_REDUNDANT_REQUIRES: &str = "redundant_requires";
pub const ISSUE_IMPLICIT_RELATION: &str = "implicit_relation";
pub const ISSUE_HIGH_IMPACT: &str = "high_impact_feature";
pub const ISSUE_CYCLE: &str = "cyclic_dependency";
pub const ISSUE_HIGH_DEPTH: &str = "high_depth";
pub const ISSUE_HIGH_CONSTRAINT_DENSITY: &str = "high_constraint_density";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    DeadFeatures,
    Redundancies,
    ImplicitRelations,
    TransitiveDependencies,
    StronglyConnected,
    ComplexityMetrics,
}

impl AnalysisKind {
    pub const ALL: [Self; 6] = [
        Self::DeadFeatures,
        Self::Redundancies,
        Self::ImplicitRelations,
        Self::TransitiveDependencies,
        Self::StronglyConnected,
        Self::ComplexityMetrics,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DeadFeatures => "dead_features",
            Self::Redundancies => "redundancies",
            Self::ImplicitRelations => "implicit_relations",
            Self::TransitiveDependencies => "transitive_dependencies",
            Self::StronglyConnected => "strongly_connected",
            Self::ComplexityMetrics => "complexity_metrics",
        }
    }

    /// Accepts the snake_case tag, case-insensitively, with `-` for `_`.
    pub fn parse(raw: &str) -> Option<Self> {
        let tag = raw.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL.into_iter().find(|kind| kind.as_str() == tag)
    }
}

/// Edge set searched for cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleScope {
    /// parent → child edges
    Hierarchy,
    /// REQUIRES relations and REQUIRES-shaped constraints
    Requires,
}

impl CycleScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hierarchy => "hierarchy",
            Self::Requires => "requires",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructuralIssue {
    pub kind: String,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feature_id: Option<Uuid>,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
}

impl StructuralIssue {
    fn new(kind: &str, severity: Severity, description: String) -> Self {
        Self {
            kind: kind.to_string(),
            severity,
            feature_id: None,
            description,
            recommendation: None,
        }
    }

    fn on(mut self, feature_id: Uuid) -> Self {
        self.feature_id = Some(feature_id);
        self
    }

    fn recommend(mut self, text: &str) -> Self {
        self.recommendation = Some(text.to_string());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructuralAnalysisResult {
    pub kind: AnalysisKind,
    pub issues: Vec<StructuralIssue>,
    pub metrics: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComplexityMetrics {
    /// Hops from the root to the deepest feature.
    pub max_depth: usize,
    pub total_features: usize,
    pub leaf_features: usize,
    pub avg_branching_factor: f64,
    pub constraint_density: f64,
    pub total_constraints: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeatureImpact {
    pub feature_id: Uuid,
    pub name: String,
    pub direct_dependents: usize,
    pub transitive_dependents: usize,
    pub depth: usize,
    pub constraints_count: usize,
    pub impact_score: usize,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("whitespace regex must compile"))
}

/// Matches `feature`'s name, its underscored form or its id as a whole token.
fn mention_re(feature: &Feature) -> Option<Regex> {
    let mut spellings = vec![
        feature.name.trim().to_string(),
        normalize_name(&feature.name),
        feature.id.to_string(),
    ];
    spellings.retain(|s| !s.is_empty());
    spellings.dedup();
    let alternation = spellings
        .iter()
        .map(|s| regex::escape(s))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?:^|[^\w])(?:{alternation})(?:$|[^\w])")).ok()
}

fn into_metrics(value: Value) -> BTreeMap<String, Value> {
    match value {
        Value::Object(map) => map.into_iter().collect(),
        _ => BTreeMap::new(),
    }
}

/// Strongly connected components, iterative Tarjan.
///
/// Components come out in reverse topological order; members within one
/// component follow `nodes` order.
fn strongly_connected(nodes: &[Uuid], edges: &BTreeMap<Uuid, Vec<Uuid>>) -> Vec<Vec<Uuid>> {
    let position: BTreeMap<Uuid, usize> = nodes.iter().enumerate().map(|(i, id)| (*id, i)).collect();
    let mut index_of: BTreeMap<Uuid, usize> = BTreeMap::new();
    let mut low: BTreeMap<Uuid, usize> = BTreeMap::new();
    let mut on_stack: BTreeSet<Uuid> = BTreeSet::new();
    let mut stack: Vec<Uuid> = Vec::new();
    let mut components = Vec::new();
    let mut next_index = 0usize;

    for &start in nodes {
        if index_of.contains_key(&start) {
            continue;
        }
        let mut call: Vec<(Uuid, usize)> = Vec::new();
        index_of.insert(start, next_index);
        low.insert(start, next_index);
        next_index += 1;
        stack.push(start);
        on_stack.insert(start);
        call.push((start, 0));

        while let Some(&(node, pos)) = call.last() {
            let successors = edges.get(&node).map(Vec::as_slice).unwrap_or(&[]);
            if let Some(&next) = successors.get(pos) {
                if let Some(top) = call.last_mut() {
                    top.1 += 1;
                }
                if !position.contains_key(&next) {
                    continue;
                }
                match index_of.get(&next) {
                    None => {
                        index_of.insert(next, next_index);
                        low.insert(next, next_index);
                        next_index += 1;
                        stack.push(next);
                        on_stack.insert(next);
                        call.push((next, 0));
                    }
                    Some(&next_index_seen) if on_stack.contains(&next) => {
                        let lowered = low[&node].min(next_index_seen);
                        low.insert(node, lowered);
                    }
                    Some(_) => {}
                }
                continue;
            }

            call.pop();
            if let Some(&(parent, _)) = call.last() {
                let lowered = low[&parent].min(low[&node]);
                low.insert(parent, lowered);
            }
            if low[&node] == index_of[&node] {
                let mut component = Vec::new();
                while let Some(member) = stack.pop() {
                    on_stack.remove(&member);
                    component.push(member);
                    if member == node {
                        break;
                    }
                }
                component.sort_by_key(|id| position.get(id).copied().unwrap_or(usize::MAX));
                components.push(component);
            }
        }
    }
    components
}

pub struct StructuralAnalyzer<'a> {
    contents: &'a VersionContents,
    tree: FeatureTree<'a>,
    config: AnalysisConfig,
}

impl<'a> StructuralAnalyzer<'a> {
    pub fn new(contents: &'a VersionContents) -> Self {
        Self {
            contents,
            tree: FeatureTree::new(&contents.features),
            config: AnalysisConfig::default(),
        }
    }

    pub fn with_config(mut self, config: AnalysisConfig) -> Self {
        self.config = config;
        self
    }

    pub fn tree(&self) -> &FeatureTree<'a> {
        &self.tree
    }

    fn name(&self, id: Uuid) -> String {
        self.contents.feature_name(id)
    }

    /// Exactly one root, every feature reachable from it, one parent each.
    pub fn validate_tree_structure(&self) -> Result<(), StructuralFault> {
        let root = match self.tree.roots() {
            [] => return Err(StructuralFault::MissingRootFeature),
            [only] => *only,
            many => {
                return Err(StructuralFault::MultipleRootFeatures { count: many.len() });
            }
        };

        let reachable = self.tree.reachable_from(root);
        if let Some(orphan) = self.tree.features().find(|f| !reachable.contains(&f.id)) {
            return Err(StructuralFault::OrphanFeature {
                id: orphan.id,
                name: orphan.name.clone(),
            });
        }

        let mut parents: BTreeMap<Uuid, BTreeSet<Option<Uuid>>> = BTreeMap::new();
        for feature in self.contents.active_features() {
            parents.entry(feature.id).or_default().insert(feature.parent_id);
        }
        for id in self.tree.ids() {
            let count = parents.get(id).map_or(0, BTreeSet::len);
            if count > 1 {
                return Err(StructuralFault::MultipleParents { id: *id, count });
            }
        }
        Ok(())
    }

    fn unreachable_from_first_root(&self) -> Option<Vec<Uuid>> {
        let root = self.tree.roots().first()?;
        let reachable = self.tree.reachable_from(*root);
        Some(
            self.tree
                .ids()
                .iter()
                .copied()
                .filter(|id| !reachable.contains(id))
                .collect(),
        )
    }

    /// Every feature not reachable from the first root, in list order.
    pub fn detect_orphan_features(&self) -> Vec<Uuid> {
        self.unreachable_from_first_root().unwrap_or_default()
    }

    pub fn detect_dead_features(&self) -> Result<Vec<StructuralFault>, StructuralFault> {
        let dead = self
            .unreachable_from_first_root()
            .ok_or(StructuralFault::MissingRootFeature)?;
        Ok(dead
            .into_iter()
            .map(|id| StructuralFault::DeadFeatureDetected {
                id,
                name: self.name(id),
            })
            .collect())
    }

    /// Reference and cardinality faults of relations and groups.
    pub fn integrity_faults(&self) -> Vec<StructuralFault> {
        let mut faults = Vec::new();

        let mut seen: BTreeSet<(Uuid, Uuid, RelationKind)> = BTreeSet::new();
        for relation in self.contents.active_relations() {
            let missing = [relation.source_id, relation.target_id]
                .into_iter()
                .find(|id| !self.tree.contains(*id));
            if let Some(missing) = missing {
                faults.push(StructuralFault::InvalidRelation {
                    reason: format!(
                        "{} relation {} references missing feature {missing}",
                        relation.kind.as_str(),
                        relation.id
                    ),
                });
                continue;
            }
            if relation.source_id == relation.target_id {
                faults.push(StructuralFault::SelfRelation {
                    feature: self.name(relation.source_id),
                });
                continue;
            }
            if !seen.insert((relation.source_id, relation.target_id, relation.kind)) {
                faults.push(StructuralFault::DuplicateRelation {
                    kind: relation.kind.as_str().to_string(),
                    source_feature: self.name(relation.source_id),
                    target_feature: self.name(relation.target_id),
                });
            }
        }

        let active_groups: BTreeSet<Uuid> = self.contents.active_groups().map(|g| g.id).collect();
        for feature in self.tree.features() {
            if let Some(group) = feature.group_id {
                if !active_groups.contains(&group) {
                    faults.push(StructuralFault::InvalidRelation {
                        reason: format!(
                            "feature '{}' belongs to missing group {group}",
                            feature.name
                        ),
                    });
                }
            }
        }

        for group in self.contents.active_groups() {
            if !self.tree.contains(group.parent_feature_id) {
                faults.push(StructuralFault::InvalidRelation {
                    reason: format!(
                        "group {} has missing parent feature {}",
                        group.id, group.parent_feature_id
                    ),
                });
                continue;
            }
            let members: Vec<&Feature> = self.contents.group_members(group.id).collect();
            if members.is_empty() {
                faults.push(StructuralFault::EmptyGroup { group: group.id });
                continue;
            }
            for member in &members {
                if member.parent_id != Some(group.parent_feature_id) {
                    faults.push(StructuralFault::InvalidRelation {
                        reason: format!(
                            "group member '{}' is not a child of '{}'",
                            member.name,
                            self.name(group.parent_feature_id)
                        ),
                    });
                }
            }
            let (min, max) = (group.min_cardinality, group.max_cardinality);
            let n = members.len();
            let valid = match group.kind {
                GroupKind::Xor => min == 1 && max.is_none_or(|m| m == 1),
                GroupKind::Or => {
                    (min as usize) <= n
                        && max.is_none_or(|m| min <= m && (m as usize) <= n && m > 0)
                }
            };
            if !valid {
                faults.push(StructuralFault::InvalidGroupCardinality {
                    group: group.id,
                    min,
                    max,
                    members: n,
                });
            }
        }
        faults
    }

    pub fn validate_integrity(&self) -> Result<(), StructuralFault> {
        match self.integrity_faults().into_iter().next() {
            Some(fault) => Err(fault),
            None => Ok(()),
        }
    }

    fn requires_edges(&self) -> Vec<(Uuid, Uuid)> {
        let mut edges: Vec<(Uuid, Uuid)> = self
            .contents
            .active_relations()
            .filter(|r| r.kind == RelationKind::Requires)
            .map(|r| (r.source_id, r.target_id))
            .collect();
        let resolver = NameResolver::new(self.contents.active_features());
        for constraint in self.contents.active_constraints() {
            let shape = match &constraint.expr_cnf {
                Some(cnf) => expr_from_cnf(cnf).map(|e| e.shape()),
                None => parse_expression(&constraint.expr_text, &resolver)
                    .ok()
                    .map(|e| e.shape()),
            };
            if let Some(ConstraintShape::Requires { source, target }) = shape {
                edges.push((source, target));
            }
        }
        edges
    }

    /// Components of the `scope` graph that form a cycle.
    pub fn cycles(&self, scope: CycleScope) -> Vec<Vec<Uuid>> {
        let mut edges: BTreeMap<Uuid, Vec<Uuid>> = BTreeMap::new();
        match scope {
            CycleScope::Hierarchy => {
                for feature in self.tree.features() {
                    if let Some(parent) = feature.parent_id {
                        edges.entry(parent).or_default().push(feature.id);
                    }
                }
            }
            CycleScope::Requires => {
                for (source, target) in self.requires_edges() {
                    edges.entry(source).or_default().push(target);
                }
            }
        }
        strongly_connected(self.tree.ids(), &edges)
            .into_iter()
            .filter(|component| match component.as_slice() {
                [single] => edges.get(single).is_some_and(|out| out.contains(single)),
                _ => true,
            })
            .collect()
    }

    pub fn detect_cycles(&self, scope: CycleScope) -> Result<(), StructuralFault> {
        match self.cycles(scope).into_iter().next() {
            Some(component) => Err(StructuralFault::CyclicDependency {
                members: component.into_iter().map(|id| self.name(id)).collect(),
            }),
            None => Ok(()),
        }
    }

    pub fn complexity_metrics(&self) -> ComplexityMetrics {
        let total_features = self.tree.len();
        let mut leaf_features = 0;
        let mut total_children = 0;
        for id in self.tree.ids() {
            let children = self
                .tree
                .children(*id)
                .iter()
                .filter(|c| self.tree.contains(**c))
                .count();
            if children == 0 {
                leaf_features += 1;
            }
            total_children += children;
        }
        let total_constraints = self.contents.active_constraints().count();
        let ratio = |n: usize| {
            if total_features == 0 {
                0.0
            } else {
                round2(n as f64 / total_features as f64)
            }
        };
        ComplexityMetrics {
            max_depth: self.tree.max_depth(),
            total_features,
            leaf_features,
            avg_branching_factor: ratio(total_children),
            constraint_density: ratio(total_constraints),
            total_constraints,
        }
    }

    /// How much of the model hangs off `feature_id`.
    pub fn calculate_feature_impact(
        &self,
        feature_id: Uuid,
        weights: ImpactWeights,
    ) -> Result<FeatureImpact, FeatureModelError> {
        let feature = self
            .tree
            .get(feature_id)
            .ok_or_else(|| FeatureModelError::UnknownFeature(feature_id.to_string()))?;
        let direct_dependents = self
            .tree
            .children(feature_id)
            .iter()
            .filter(|c| self.tree.contains(**c))
            .count();
        let transitive_dependents = self.tree.descendants(feature_id).len();
        let constraints_count = match mention_re(feature) {
            Some(re) => self
                .contents
                .active_constraints()
                .filter(|c| re.is_match(&c.expr_text))
                .count(),
            None => 0,
        };
        Ok(FeatureImpact {
            feature_id,
            name: feature.name.clone(),
            direct_dependents,
            transitive_dependents,
            depth: self.tree.depth(feature_id),
            constraints_count,
            impact_score: transitive_dependents + weights.constraint_weight * constraints_count,
        })
    }

    /// Run the requested analyses in order.
    pub fn analyze(&self, kinds: &[AnalysisKind]) -> Vec<StructuralAnalysisResult> {
        kinds
            .iter()
            .map(|kind| {
                let (issues, metrics) = match kind {
                    AnalysisKind::DeadFeatures => self.dead_feature_issues(),
                    AnalysisKind::Redundancies => self.redundancy_issues(),
                    AnalysisKind::ImplicitRelations => self.implicit_relation_issues(),
                    AnalysisKind::TransitiveDependencies => self.transitive_issues(),
                    AnalysisKind::StronglyConnected => self.cycle_issues(),
                    AnalysisKind::ComplexityMetrics => self.complexity_issues(),
                };
                tracing::debug!(kind = kind.as_str(), issues = issues.len(), "analysis finished");
                StructuralAnalysisResult {
                    kind: *kind,
                    issues,
                    metrics,
                }
            })
            .collect()
    }

    fn dead_feature_issues(&self) -> (Vec<StructuralIssue>, BTreeMap<String, Value>) {
        let total = self.tree.len();
        let Some(dead) = self.unreachable_from_first_root() else {
            let issue = StructuralIssue::new(
                ISSUE_MISSING_ROOT,
                Severity::Critical,
                "feature model has no root feature".to_string(),
            )
            .recommend("mark exactly one feature as the root");
            let metrics = json!({"total_features": total, "reachable_features": 0, "dead_features": total});
            return (vec![issue], into_metrics(metrics));
        };
        let issues = dead
            .iter()
            .map(|id| {
                StructuralIssue::new(
                    ISSUE_DEAD_FEATURE,
                    Severity::Critical,
                    format!("feature '{}' is unreachable from the root", self.name(*id)),
                )
                .on(*id)
                .recommend("attach the feature to the tree or remove it")
            })
            .collect();
        let metrics = json!({
            "total_features": total,
            "reachable_features": total - dead.len(),
            "dead_features": dead.len(),
        });
        (issues, into_metrics(metrics))
    }

    fn redundancy_issues(&self) -> (Vec<StructuralIssue>, BTreeMap<String, Value>) {
        let mut issues = Vec::new();
        let (mut duplicate_relations, mut duplicate_constraints, mut redundant_requires) = (0, 0, 0);

        let mut seen = BTreeSet::new();
        for relation in self.contents.active_relations() {
            let source = self.name(relation.source_id);
            let target = self.name(relation.target_id);
            if !seen.insert((relation.source_id, relation.target_id, relation.kind)) {
                duplicate_relations += 1;
                issues.push(
                    StructuralIssue::new(
                        ISSUE_DUPLICATE_RELATION,
                        Severity::Minor,
                        format!(
                            "duplicate {} relation: '{source}' -> '{target}'",
                            relation.kind.as_str()
                        ),
                    )
                    .on(relation.target_id)
                    .recommend("remove the duplicate relation"),
                );
                continue;
            }
            if relation.kind == RelationKind::Requires
                && self.tree.ancestors(relation.source_id).contains(&relation.target_id)
            {
                redundant_requires += 1;
                issues.push(
                    StructuralIssue::new(
                        ISSUE_REDUNDANT_REQUIRES,
                        Severity::Minor,
                        format!("'{source}' requires its own ancestor '{target}'"),
                    )
                    .on(relation.source_id)
                    .recommend("review the relation; the tree already ties these features together"),
                );
            }
        }

        let mut texts = BTreeSet::new();
        for constraint in self.contents.active_constraints() {
            let text = whitespace_re()
                .replace_all(constraint.expr_text.trim(), " ")
                .into_owned();
            if !texts.insert(text.clone()) {
                duplicate_constraints += 1;
                issues.push(
                    StructuralIssue::new(
                        ISSUE_DUPLICATE_CONSTRAINT,
                        Severity::Minor,
                        format!("duplicate constraint: {text}"),
                    )
                    .recommend("remove the duplicate constraint"),
                );
            }
        }

        let metrics = json!({
            "duplicate_relations": duplicate_relations,
            "duplicate_constraints": duplicate_constraints,
            "redundant_requires": redundant_requires,
        });
        (issues, into_metrics(metrics))
    }

    fn implicit_relation_issues(&self) -> (Vec<StructuralIssue>, BTreeMap<String, Value>) {
        let mut issues = Vec::new();
        for (source, target) in self.requires_edges() {
            if source == target || !self.tree.contains(source) || !self.tree.contains(target) {
                continue;
            }
            let related = self.tree.ancestors(source).contains(&target)
                || self.tree.ancestors(target).contains(&source);
            if related {
                continue;
            }
            issues.push(
                StructuralIssue::new(
                    ISSUE_IMPLICIT_RELATION,
                    Severity::Minor,
                    format!(
                        "'{}' depends on '{}' across subtrees",
                        self.name(source),
                        self.name(target)
                    ),
                )
                .on(source)
                .recommend("make the dependency explicit in documentation or restructure the tree"),
            );
        }
        let metrics = json!({"implicit_relations_found": issues.len()});
        (issues, into_metrics(metrics))
    }

    fn transitive_issues(&self) -> (Vec<StructuralIssue>, BTreeMap<String, Value>) {
        let threshold = self.tree.len() as f64 * self.config.high_impact_ratio;
        let mut issues = Vec::new();
        let mut metrics = BTreeMap::new();
        for feature in self.tree.features() {
            let count = self.tree.descendants(feature.id).len();
            metrics.insert(feature.id.to_string(), json!(count));
            if count as f64 > threshold {
                issues.push(
                    StructuralIssue::new(
                        ISSUE_HIGH_IMPACT,
                        Severity::Major,
                        format!("feature '{}' affects {count} other features", feature.name),
                    )
                    .on(feature.id)
                    .recommend("consider splitting the feature to reduce coupling"),
                );
            }
        }
        (issues, metrics)
    }

    fn cycle_issues(&self) -> (Vec<StructuralIssue>, BTreeMap<String, Value>) {
        let mut issues = Vec::new();
        for scope in [CycleScope::Hierarchy, CycleScope::Requires] {
            for component in self.cycles(scope) {
                let names: Vec<String> = component.iter().map(|id| self.name(*id)).collect();
                let mut issue = StructuralIssue::new(
                    ISSUE_CYCLE,
                    Severity::Critical,
                    format!("cycle over {} edges: {}", scope.as_str(), names.join(", ")),
                )
                .recommend("break the cycle");
                if let Some(first) = component.first() {
                    issue = issue.on(*first);
                }
                issues.push(issue);
            }
        }
        let metrics = json!({"cycles_found": issues.len()});
        (issues, into_metrics(metrics))
    }

    fn complexity_issues(&self) -> (Vec<StructuralIssue>, BTreeMap<String, Value>) {
        let metrics = self.complexity_metrics();
        let mut issues = Vec::new();
        if metrics.max_depth > self.config.max_depth_warning {
            issues.push(
                StructuralIssue::new(
                    ISSUE_HIGH_DEPTH,
                    Severity::Minor,
                    format!("tree is very deep (depth={})", metrics.max_depth),
                )
                .recommend("consider flattening the hierarchy"),
            );
        }
        if metrics.constraint_density > self.config.constraint_density_warning {
            issues.push(
                StructuralIssue::new(
                    ISSUE_HIGH_CONSTRAINT_DENSITY,
                    Severity::Minor,
                    format!(
                        "high constraint density ({:.2})",
                        metrics.constraint_density
                    ),
                )
                .recommend("review whether some constraints can be simplified"),
            );
        }
        let value = serde_json::to_value(&metrics).unwrap_or(Value::Null);
        (issues, into_metrics(value))
    }
}

//! Boolean encoding of a feature model.
//!
//! Every clause records the model rule that produced it. Diagnosis reads the
//! origin of the first violated clause; DIMACS export selects and orders
//! clauses by origin.
//!
//! OR-group bounds beyond "at least one" go through a sequential counter
//! whose registers are numbered after the feature variables.

use featmodel_kernel::expr::expr_from_cnf;
use featmodel_kernel::{
    ConstraintShape, FeatureLiteral, FeatureKind, FeatureTree, GroupKind, LogicalFault,
    NameResolver, RelationKind, VariableMapping, VersionContents, parse_expression,
};
use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

/// The rule a clause encodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum ClauseOrigin {
    Root { feature: Uuid },
    /// `parent ⇒ child`
    Mandatory { parent: Uuid, child: Uuid },
    /// `child ⇒ parent`
    Optional { parent: Uuid, child: Uuid },
    /// `member ⇒ parent`
    GroupMember { group: Uuid, parent: Uuid, member: Uuid },
    GroupAtLeast { group: Uuid, parent: Uuid },
    GroupExclusion { group: Uuid, parent: Uuid, first: Uuid, second: Uuid },
    GroupAtMost { group: Uuid, parent: Uuid },
    /// Definition of a counter register over the group's members.
    GroupCounter { group: Uuid, parent: Uuid },
    Requires { relation: Uuid, source: Uuid, target: Uuid },
    Excludes { relation: Uuid, first: Uuid, second: Uuid },
    Constraint { constraint: Uuid },
}

impl ClauseOrigin {
    /// Whether the clause comes from a relation or textual constraint.
    pub fn is_cross_tree(&self) -> bool {
        matches!(
            self,
            Self::Requires { .. } | Self::Excludes { .. } | Self::Constraint { .. }
        )
    }

    /// Id of the relation or constraint row behind a cross-tree clause.
    pub fn cross_tree_item(&self) -> Option<Uuid> {
        match self {
            Self::Requires { relation, .. } | Self::Excludes { relation, .. } => Some(*relation),
            Self::Constraint { constraint } => Some(*constraint),
            _ => None,
        }
    }

    pub fn group(&self) -> Option<Uuid> {
        match self {
            Self::GroupMember { group, .. }
            | Self::GroupAtLeast { group, .. }
            | Self::GroupExclusion { group, .. }
            | Self::GroupAtMost { group, .. }
            | Self::GroupCounter { group, .. } => Some(*group),
            _ => None,
        }
    }
}

/// Disjunction of signed 1-based variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Clause {
    pub literals: Vec<i32>,
    pub origin: ClauseOrigin,
}

impl Clause {
    /// Whether the clause holds under a total assignment (index = var - 1).
    pub fn is_satisfied_by(&self, assignment: &[bool]) -> bool {
        self.literals.iter().any(|lit| {
            let value = assignment
                .get(lit.unsigned_abs() as usize - 1)
                .copied()
                .unwrap_or(false);
            value == (*lit > 0)
        })
    }
}

/// A parsed textual constraint.
#[derive(Debug, Clone)]
pub struct EncodedConstraint {
    pub id: Uuid,
    pub label: String,
    pub shape: ConstraintShape,
}

/// Group parameters as encoded (XOR is always `[1, 1]`).
#[derive(Debug, Clone)]
pub struct EncodedGroup {
    pub id: Uuid,
    pub kind: GroupKind,
    pub parent: Uuid,
    pub members: Vec<Uuid>,
    pub min: u32,
    pub max: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct ModelEncoding {
    pub mapping: VariableMapping,
    pub clauses: Vec<Clause>,
    pub names: BTreeMap<Uuid, String>,
    pub groups: BTreeMap<Uuid, EncodedGroup>,
    pub constraints: BTreeMap<Uuid, EncodedConstraint>,
    pub relation_labels: BTreeMap<Uuid, String>,
    /// Cardinality counters, numbered after the feature variables.
    pub counters: Vec<GroupCounter>,
}

impl ModelEncoding {
    /// Feature variables plus counter registers.
    pub fn num_vars(&self) -> usize {
        self.mapping.len() + self.counters.iter().map(GroupCounter::len).sum::<usize>()
    }

    pub fn feature_vars(&self) -> usize {
        self.mapping.len()
    }

    /// Set every counter register from the feature values already in
    /// `assignment`.
    pub fn complete_assignment(&self, assignment: &mut [bool]) {
        for counter in &self.counters {
            counter.fill(assignment);
        }
    }

    pub fn name(&self, id: Uuid) -> String {
        self.names
            .get(&id)
            .cloned()
            .unwrap_or_else(|| id.to_string())
    }

    /// Human label of the relation or constraint row `id`.
    pub fn item_label(&self, id: Uuid) -> String {
        self.relation_labels
            .get(&id)
            .cloned()
            .or_else(|| self.constraints.get(&id).map(|c| c.label.clone()))
            .unwrap_or_else(|| id.to_string())
    }

    /// Literal lists of every clause.
    pub fn literal_lists(&self) -> Vec<Vec<i32>> {
        self.clauses.iter().map(|c| c.literals.clone()).collect()
    }

    /// Literal lists of clauses whose origin passes `keep`.
    pub fn literal_lists_where(&self, keep: impl Fn(&ClauseOrigin) -> bool) -> Vec<Vec<i32>> {
        self.clauses
            .iter()
            .filter(|c| keep(&c.origin))
            .map(|c| c.literals.clone())
            .collect()
    }

    /// Cross-tree row ids in clause order, deduplicated.
    pub fn cross_tree_items(&self) -> Vec<Uuid> {
        let mut items: Vec<Uuid> = Vec::new();
        for clause in &self.clauses {
            if let Some(item) = clause.origin.cross_tree_item() {
                if !items.contains(&item) {
                    items.push(item);
                }
            }
        }
        items
    }

    pub fn var(&self, id: Uuid) -> Option<i32> {
        self.mapping.var(id).map(|v| v as i32)
    }
}

/// Sequential counter over a group's members.
///
/// Register `(i, j)` holds exactly when at least `j` of the first `i`
/// members are selected, for `1 <= j <= min(i, width)`. The registers are
/// fully determined by the members, so they never change a model count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupCounter {
    pub group: Uuid,
    members: Vec<i32>,
    width: usize,
    /// First register variable of each row `i` (index `i - 1`).
    rows: Vec<i32>,
    next: i32,
}

#[derive(Debug, Clone, Copy)]
enum Bit {
    Const(bool),
    Var(i32),
}

impl Bit {
    fn not(self) -> Self {
        match self {
            Self::Const(value) => Self::Const(!value),
            Self::Var(var) => Self::Var(-var),
        }
    }
}

/// Clause over `bits`; `None` when a constant already satisfies it.
fn bit_clause(bits: &[Bit]) -> Option<Vec<i32>> {
    let mut literals = Vec::with_capacity(bits.len());
    for bit in bits {
        match *bit {
            Bit::Const(true) => return None,
            Bit::Const(false) => {}
            Bit::Var(lit) => literals.push(lit),
        }
    }
    Some(literals)
}

impl GroupCounter {
    fn new(group: Uuid, members: Vec<i32>, width: usize, first_var: i32) -> Self {
        let width = width.min(members.len());
        let mut rows = Vec::with_capacity(members.len());
        let mut next = first_var;
        for i in 1..=members.len() {
            rows.push(next);
            next += i.min(width) as i32;
        }
        Self {
            group,
            members,
            width,
            rows,
            next,
        }
    }

    /// Number of register variables.
    pub fn len(&self) -> usize {
        self.rows.first().map_or(0, |first| (self.next - first) as usize)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn register(&self, i: usize, j: usize) -> Bit {
        if j == 0 {
            Bit::Const(true)
        } else if j > i || j > self.width {
            Bit::Const(false)
        } else {
            Bit::Var(self.rows[i - 1] + j as i32 - 1)
        }
    }

    /// "At least `count` members selected", for `count <= width`.
    fn at_least(&self, count: usize) -> Bit {
        self.register(self.members.len(), count)
    }

    fn definitions(&self) -> Vec<Vec<i32>> {
        let mut clauses = Vec::new();
        for (index, member) in self.members.iter().enumerate() {
            let i = index + 1;
            let x = Bit::Var(*member);
            for j in 1..=i.min(self.width) {
                let r = self.register(i, j);
                let kept = self.register(i - 1, j);
                let below = self.register(i - 1, j - 1);
                clauses.extend(
                    [
                        bit_clause(&[kept.not(), r]),
                        bit_clause(&[x.not(), below.not(), r]),
                        bit_clause(&[r.not(), kept, x]),
                        bit_clause(&[r.not(), kept, below]),
                    ]
                    .into_iter()
                    .flatten(),
                );
            }
        }
        clauses
    }

    fn fill(&self, assignment: &mut [bool]) {
        let value = |assignment: &[bool], lit: i32| {
            assignment
                .get(lit.unsigned_abs() as usize - 1)
                .copied()
                .unwrap_or(false)
        };
        let mut selected = 0;
        for (index, member) in self.members.iter().enumerate() {
            let i = index + 1;
            if value(assignment, *member) {
                selected += 1;
            }
            for j in 1..=i.min(self.width) {
                if let Bit::Var(var) = self.register(i, j) {
                    if let Some(slot) = assignment.get_mut(var as usize - 1) {
                        *slot = selected >= j;
                    }
                }
            }
        }
    }
}

struct Encoder {
    mapping: VariableMapping,
    clauses: Vec<Clause>,
    counters: Vec<GroupCounter>,
    next_var: i32,
}

impl Encoder {
    fn lit(&self, id: Uuid, positive: bool) -> Option<i32> {
        let var = self.mapping.var(id)? as i32;
        Some(if positive { var } else { -var })
    }

    fn push(&mut self, literals: Option<Vec<i32>>, origin: ClauseOrigin) {
        if let Some(literals) = literals {
            self.clauses.push(Clause { literals, origin });
        }
    }

    fn implication(&mut self, from: Uuid, to: Uuid, origin: ClauseOrigin) {
        let clause = self
            .lit(from, false)
            .zip(self.lit(to, true))
            .map(|(a, b)| vec![a, b]);
        self.push(clause, origin);
    }

    /// Allocate a counter of `width` registers per row and emit its
    /// definition clauses.
    fn counter(&mut self, group: Uuid, parent: Uuid, members: &[i32], width: usize) -> usize {
        let counter = GroupCounter::new(group, members.to_vec(), width, self.next_var);
        self.next_var = counter.next;
        for literals in counter.definitions() {
            self.push(Some(literals), ClauseOrigin::GroupCounter { group, parent });
        }
        self.counters.push(counter);
        self.counters.len() - 1
    }
}

/// Encode the active rows of one version.
pub fn encode_model(contents: &VersionContents) -> Result<ModelEncoding, LogicalFault> {
    let tree = FeatureTree::new(&contents.features);
    let mapping = VariableMapping::from_features(&contents.features);
    let next_var = mapping.len() as i32 + 1;
    let mut enc = Encoder {
        mapping,
        clauses: Vec::new(),
        counters: Vec::new(),
        next_var,
    };

    for root in tree.roots() {
        let lit = enc.lit(*root, true).map(|l| vec![l]);
        enc.push(lit, ClauseOrigin::Root { feature: *root });
    }

    let groups: BTreeMap<Uuid, EncodedGroup> = contents
        .active_groups()
        .map(|group| {
            let (min, max) = match group.kind {
                GroupKind::Xor => (1, Some(1)),
                GroupKind::Or => (group.min_cardinality, group.max_cardinality),
            };
            let members = contents.group_members(group.id).map(|f| f.id).collect();
            (
                group.id,
                EncodedGroup {
                    id: group.id,
                    kind: group.kind,
                    parent: group.parent_feature_id,
                    members,
                    min,
                    max,
                },
            )
        })
        .collect();

    for feature in tree.features() {
        let Some(parent) = feature.parent_id else {
            continue;
        };
        let grouped = feature
            .group_id
            .and_then(|id| groups.get(&id))
            .map(|g| g.id);
        match (grouped, feature.kind) {
            (Some(group), _) => enc.implication(
                feature.id,
                parent,
                ClauseOrigin::GroupMember {
                    group,
                    parent,
                    member: feature.id,
                },
            ),
            (None, FeatureKind::Mandatory) => enc.implication(
                parent,
                feature.id,
                ClauseOrigin::Mandatory {
                    parent,
                    child: feature.id,
                },
            ),
            (None, FeatureKind::Optional) => enc.implication(
                feature.id,
                parent,
                ClauseOrigin::Optional {
                    parent,
                    child: feature.id,
                },
            ),
        }
    }

    for group in contents.active_groups() {
        let Some(encoded) = groups.get(&group.id) else {
            continue;
        };
        let Some(guard) = enc.lit(encoded.parent, false) else {
            continue;
        };
        let members: Vec<i32> = encoded
            .members
            .iter()
            .filter_map(|m| enc.lit(*m, true))
            .collect();
        let n = members.len();
        let min = encoded.min as usize;
        let at_least = ClauseOrigin::GroupAtLeast {
            group: group.id,
            parent: encoded.parent,
        };
        let at_most = ClauseOrigin::GroupAtMost {
            group: group.id,
            parent: encoded.parent,
        };
        // Bounds that need counting share one counter wide enough for both.
        let bounded_max = match (group.kind, encoded.max) {
            (GroupKind::Or, Some(max)) if (max as usize) < n => Some(max as usize),
            _ => None,
        };
        let counted_min = (min > 1 && min <= n).then_some(min);
        let counter = match (counted_min, bounded_max) {
            (None, None) => None,
            (low, high) => {
                let width = low.unwrap_or(0).max(high.map_or(0, |max| max + 1));
                Some(enc.counter(group.id, encoded.parent, &members, width))
            }
        };

        if min > n {
            enc.push(Some(vec![guard]), at_least);
        } else if min == 1 {
            let mut literals = vec![guard];
            literals.extend(&members);
            enc.push(Some(literals), at_least);
        } else if let (Some(min), Some(index)) = (counted_min, counter) {
            let reached = enc.counters[index].at_least(min);
            enc.push(bit_clause(&[Bit::Var(guard), reached]), at_least);
        }

        if group.kind == GroupKind::Xor {
            for (i, first) in encoded.members.iter().enumerate() {
                for second in &encoded.members[i + 1..] {
                    let clause = enc
                        .lit(*first, false)
                        .zip(enc.lit(*second, false))
                        .map(|(a, b)| vec![guard, a, b]);
                    enc.push(
                        clause,
                        ClauseOrigin::GroupExclusion {
                            group: group.id,
                            parent: encoded.parent,
                            first: *first,
                            second: *second,
                        },
                    );
                }
            }
        } else if let (Some(max), Some(index)) = (bounded_max, counter) {
            let exceeded = enc.counters[index].at_least(max + 1);
            enc.push(bit_clause(&[Bit::Var(guard), exceeded.not()]), at_most);
        }
    }

    let mut relation_labels = BTreeMap::new();
    for relation in contents.active_relations() {
        let source = contents.feature_name(relation.source_id);
        let target = contents.feature_name(relation.target_id);
        match relation.kind {
            RelationKind::Requires => {
                relation_labels.insert(relation.id, format!("{source} REQUIRES {target}"));
                enc.implication(
                    relation.source_id,
                    relation.target_id,
                    ClauseOrigin::Requires {
                        relation: relation.id,
                        source: relation.source_id,
                        target: relation.target_id,
                    },
                );
            }
            RelationKind::Excludes => {
                relation_labels.insert(relation.id, format!("{source} EXCLUDES {target}"));
                let clause = enc
                    .lit(relation.source_id, false)
                    .zip(enc.lit(relation.target_id, false))
                    .map(|(a, b)| vec![a, b]);
                enc.push(
                    clause,
                    ClauseOrigin::Excludes {
                        relation: relation.id,
                        first: relation.source_id,
                        second: relation.target_id,
                    },
                );
            }
        }
    }

    let resolver = NameResolver::new(&contents.features);
    let mut constraints = BTreeMap::new();
    for constraint in contents.active_constraints() {
        let (cnf, shape) = match &constraint.expr_cnf {
            Some(cnf) => {
                let shape = expr_from_cnf(cnf)
                    .map(|e| e.shape())
                    .unwrap_or(ConstraintShape::General);
                (cnf.clone(), shape)
            }
            None => {
                let expr = parse_expression(&constraint.expr_text, &resolver)?;
                (expr.to_cnf(), expr.shape())
            }
        };
        for clause in &cnf {
            let literals: Option<Vec<i32>> = clause
                .iter()
                .map(|lit: &FeatureLiteral| enc.lit(lit.feature_id, !lit.negated))
                .collect();
            let Some(literals) = literals else {
                return Err(LogicalFault::InvalidConstraintExpression {
                    expression: constraint.expr_text.clone(),
                    reason: "clause references a feature outside this version".to_string(),
                });
            };
            enc.push(
                Some(literals),
                ClauseOrigin::Constraint {
                    constraint: constraint.id,
                },
            );
        }
        constraints.insert(
            constraint.id,
            EncodedConstraint {
                id: constraint.id,
                label: constraint.label().to_string(),
                shape,
            },
        );
    }

    let names = tree.features().map(|f| (f.id, f.name.clone())).collect();
    Ok(ModelEncoding {
        mapping: enc.mapping,
        clauses: enc.clauses,
        names,
        groups,
        constraints,
        relation_labels,
        counters: enc.counters,
    })
}

//! Edit requests and their application to a staged clone.
//!
//! Every id in a request is given in terms of the source version and is
//! remapped through the clone's [`IdMap`]. A failing edit leaves nothing
//! behind: the staged rows are dropped with the draft.

use crate::clone::IdMap;
use chrono::{DateTime, Utc};
use featmodel_kernel::{
    Audit, Constraint, Expr, Feature, FeatureGroup, FeatureKind, FeatureModelError,
    FeatureRelation, FeatureTree, GroupKind, NameResolver, Operators, RelationKind, Result,
    StructuralFault, VersionContents, VersionStateFault, expression_name, parse_expression,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewFeature {
    pub name: String,
    pub kind: FeatureKind,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
    #[serde(default)]
    pub group_id: Option<Uuid>,
    #[serde(default)]
    pub resource_id: Option<Uuid>,
    #[serde(default)]
    pub properties: BTreeMap<String, serde_json::Value>,
}

impl NewFeature {
    pub fn root(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FeatureKind::Mandatory,
            parent_id: None,
            group_id: None,
            resource_id: None,
            properties: BTreeMap::new(),
        }
    }

    pub fn child(name: impl Into<String>, kind: FeatureKind, parent_id: Uuid) -> Self {
        Self {
            kind,
            parent_id: Some(parent_id),
            ..Self::root(name)
        }
    }

    pub fn in_group(mut self, group_id: Uuid) -> Self {
        self.group_id = Some(group_id);
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }
}

/// Partial feature update. `None` leaves a field as it is; the nested
/// `Option`s distinguish "clear" from "keep".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureUpdate {
    pub name: Option<String>,
    pub kind: Option<FeatureKind>,
    pub parent_id: Option<Option<Uuid>>,
    pub group_id: Option<Option<Uuid>>,
    pub resource_id: Option<Option<Uuid>>,
    pub properties: Option<BTreeMap<String, serde_json::Value>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewGroup {
    pub kind: GroupKind,
    pub parent_feature_id: Uuid,
    pub min_cardinality: u32,
    pub max_cardinality: Option<u32>,
    /// Existing children of the parent that join the group.
    #[serde(default)]
    pub members: Vec<Uuid>,
}

impl NewGroup {
    pub fn xor(parent_feature_id: Uuid, members: &[Uuid]) -> Self {
        Self {
            kind: GroupKind::Xor,
            parent_feature_id,
            min_cardinality: 1,
            max_cardinality: Some(1),
            members: members.to_vec(),
        }
    }

    pub fn or(parent_feature_id: Uuid, members: &[Uuid]) -> Self {
        Self {
            kind: GroupKind::Or,
            max_cardinality: None,
            ..Self::xor(parent_feature_id, members)
        }
    }

    pub fn with_cardinality(mut self, min: u32, max: Option<u32>) -> Self {
        self.min_cardinality = min;
        self.max_cardinality = max;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupUpdate {
    /// Switching kind resets the cardinality to the kind's default unless
    /// explicit bounds are given as well.
    pub kind: Option<GroupKind>,
    pub min_cardinality: Option<u32>,
    pub max_cardinality: Option<Option<u32>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewConstraint {
    #[serde(default)]
    pub name: Option<String>,
    pub expression: String,
}

impl NewConstraint {
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            name: None,
            expression: expression.into(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintUpdate {
    pub name: Option<Option<String>>,
    pub expression: Option<String>,
}

fn invalid(message: impl Into<String>) -> FeatureModelError {
    VersionStateFault::InvalidEdit(message.into()).into()
}

fn not_found(kind: &'static str, id: Uuid) -> FeatureModelError {
    VersionStateFault::EntityNotFound { kind, id }.into()
}

/// Whether a constraint mentions any of `features`.
fn mentions_any(
    constraint: &Constraint,
    resolver: &NameResolver,
    features: &BTreeSet<Uuid>,
) -> bool {
    match &constraint.expr_cnf {
        Some(clauses) => clauses
            .iter()
            .flatten()
            .any(|literal| features.contains(&literal.feature_id)),
        None => parse_expression(&constraint.expr_text, resolver)
            .map(|expr| expr.features().iter().any(|id| features.contains(id)))
            .unwrap_or(false),
    }
}

/// A staged clone with one change being applied.
pub(crate) struct Draft<'a> {
    contents: VersionContents,
    id_map: IdMap,
    version_id: Uuid,
    actor: &'a str,
    at: DateTime<Utc>,
}

impl<'a> Draft<'a> {
    pub(crate) fn new(
        contents: VersionContents,
        id_map: IdMap,
        version_id: Uuid,
        actor: &'a str,
    ) -> Self {
        Self {
            contents,
            id_map,
            version_id,
            actor,
            at: Utc::now(),
        }
    }

    pub(crate) fn into_parts(self) -> (VersionContents, IdMap) {
        (self.contents, self.id_map)
    }

    fn feature_id(&self, source_id: Uuid) -> Result<Uuid> {
        self.id_map
            .feature(source_id)
            .ok_or_else(|| not_found("feature", source_id))
    }

    fn group_id(&self, source_id: Uuid) -> Result<Uuid> {
        self.id_map
            .group(source_id)
            .ok_or_else(|| not_found("group", source_id))
    }

    fn feature_mut(&mut self, id: Uuid) -> Result<&mut Feature> {
        self.contents
            .features
            .iter_mut()
            .find(|f| f.id == id && f.is_active())
            .ok_or_else(|| not_found("feature", id))
    }

    fn group_mut(&mut self, id: Uuid) -> Result<&mut FeatureGroup> {
        self.contents
            .groups
            .iter_mut()
            .find(|g| g.id == id && g.is_active())
            .ok_or_else(|| not_found("group", id))
    }

    fn ensure_unique_name(&self, name: &str, except: Option<Uuid>) -> Result<()> {
        if name.trim().is_empty() {
            return Err(invalid("feature name must not be empty"));
        }
        let taken = self
            .contents
            .active_features()
            .any(|f| f.name == name && Some(f.id) != except);
        if taken {
            return Err(invalid(format!("feature name '{name}' is already used in this version")));
        }
        Ok(())
    }

    /// The group must hang off the feature's parent.
    fn ensure_group_fits(&self, group_id: Uuid, parent_id: Option<Uuid>) -> Result<()> {
        let group = self
            .contents
            .group(group_id)
            .ok_or_else(|| not_found("group", group_id))?;
        if Some(group.parent_feature_id) != parent_id {
            return Err(invalid(format!(
                "group {group_id} belongs to '{}', not to the feature's parent",
                self.contents.feature_name(group.parent_feature_id)
            )));
        }
        Ok(())
    }

    pub(crate) fn add_feature(&mut self, spec: NewFeature) -> Result<Uuid> {
        let parent_id = spec.parent_id.map(|p| self.feature_id(p)).transpose()?;
        let group_id = spec.group_id.map(|g| self.group_id(g)).transpose()?;
        if let Some(group_id) = group_id {
            self.ensure_group_fits(group_id, parent_id)?;
        }
        self.ensure_unique_name(&spec.name, None)?;

        let mut feature = Feature::new(self.version_id, spec.name, spec.kind);
        feature.parent_id = parent_id;
        feature.group_id = group_id;
        feature.resource_id = spec.resource_id;
        feature.properties = spec.properties;
        feature.audit = Audit::created(self.actor);
        let id = feature.id;
        self.contents.features.push(feature);
        Ok(id)
    }

    pub(crate) fn update_feature(
        &mut self,
        source_id: Uuid,
        update: FeatureUpdate,
    ) -> Result<Uuid> {
        let id = self.feature_id(source_id)?;
        let (current_parent, current_group) = self
            .contents
            .feature(id)
            .map(|f| (f.parent_id, f.group_id))
            .ok_or_else(|| not_found("feature", source_id))?;

        let parent = match update.parent_id {
            Some(Some(p)) if p == source_id => {
                return Err(invalid("a feature cannot be its own parent"));
            }
            Some(Some(p)) => {
                let parent = self.feature_id(p)?;
                let tree = FeatureTree::new(&self.contents.features);
                if tree.descendants(id).contains(&parent) {
                    return Err(invalid(format!(
                        "moving '{}' under its own descendant '{}' would create a cycle",
                        self.contents.feature_name(id),
                        self.contents.feature_name(parent)
                    )));
                }
                Some(parent)
            }
            Some(None) => None,
            None => current_parent,
        };
        let group = match update.group_id {
            Some(Some(g)) => Some(self.group_id(g)?),
            Some(None) => None,
            // A move drops the old membership.
            None if parent != current_parent => None,
            None => current_group,
        };
        if let Some(group) = group {
            self.ensure_group_fits(group, parent)?;
        }
        let mentioning = match &update.name {
            Some(name) => {
                self.ensure_unique_name(name, Some(id))?;
                self.text_constraints_mentioning(id)
            }
            None => Vec::new(),
        };

        let actor = self.actor.to_string();
        let feature = self.feature_mut(id)?;
        if let Some(name) = update.name {
            feature.name = name;
        }
        if let Some(kind) = update.kind {
            feature.kind = kind;
        }
        if let Some(resource_id) = update.resource_id {
            feature.resource_id = resource_id;
        }
        if let Some(properties) = update.properties {
            feature.properties = properties;
        }
        feature.parent_id = parent;
        feature.group_id = group;
        feature.audit.updated_by = Some(actor);
        self.rewrite_constraints(mentioning);
        Ok(id)
    }

    /// Text-only constraints that mention `id`, parsed against the current names.
    fn text_constraints_mentioning(&self, id: Uuid) -> Vec<(Uuid, Expr)> {
        let resolver = NameResolver::new(&self.contents.features);
        self.contents
            .active_constraints()
            .filter(|c| c.expr_cnf.is_none())
            .filter_map(|c| {
                let expr = parse_expression(&c.expr_text, &resolver).ok()?;
                expr.features().contains(&id).then_some((c.id, expr))
            })
            .collect()
    }

    /// Re-render parsed constraints under the features' current names.
    fn rewrite_constraints(&mut self, parsed: Vec<(Uuid, Expr)>) {
        if parsed.is_empty() {
            return;
        }
        let names: BTreeMap<Uuid, String> = self
            .contents
            .active_features()
            .map(|f| (f.id, expression_name(&f.name)))
            .collect();
        let name_of = |id: Uuid| names.get(&id).cloned().unwrap_or_else(|| id.to_string());
        let actor = self.actor;
        for (constraint_id, expr) in parsed {
            let text = expr.render(&Operators::SYMBOLIC, &name_of);
            if let Some(constraint) = self
                .contents
                .constraints
                .iter_mut()
                .find(|c| c.id == constraint_id)
            {
                tracing::debug!(
                    constraint = %constraint_id,
                    before = %constraint.expr_text,
                    after = %text,
                    "constraint text follows rename"
                );
                constraint.expr_text = text;
                constraint.audit.updated_by = Some(actor.to_string());
            }
        }
    }

    /// Soft-delete a feature with its subtree and everything that refers to it.
    pub(crate) fn delete_feature(&mut self, source_id: Uuid) -> Result<Uuid> {
        let id = self.feature_id(source_id)?;
        let removed: BTreeSet<Uuid> = {
            let tree = FeatureTree::new(&self.contents.features);
            std::iter::once(id).chain(tree.descendants(id)).collect()
        };
        let resolver = NameResolver::new(&self.contents.features);
        let doomed_constraints: BTreeSet<Uuid> = self
            .contents
            .active_constraints()
            .filter(|c| mentions_any(c, &resolver, &removed))
            .map(|c| c.id)
            .collect();
        let doomed_groups: BTreeSet<Uuid> = self
            .contents
            .active_groups()
            .filter(|g| removed.contains(&g.parent_feature_id))
            .map(|g| g.id)
            .collect();

        let (actor, at) = (self.actor, self.at);
        let mut counts = (0usize, 0usize, 0usize);
        for feature in self.contents.features.iter_mut().filter(|f| f.is_active()) {
            if removed.contains(&feature.id) {
                feature.audit.soft_delete(actor, at);
            } else if feature.group_id.is_some_and(|g| doomed_groups.contains(&g)) {
                feature.group_id = None;
                feature.audit.updated_by = Some(actor.to_string());
            }
        }
        for group in self.contents.groups.iter_mut().filter(|g| g.is_active()) {
            if doomed_groups.contains(&group.id) {
                group.audit.soft_delete(actor, at);
                counts.0 += 1;
            }
        }
        for relation in self.contents.relations.iter_mut().filter(|r| r.is_active()) {
            if removed.contains(&relation.source_id) || removed.contains(&relation.target_id) {
                relation.audit.soft_delete(actor, at);
                counts.1 += 1;
            }
        }
        for constraint in self.contents.constraints.iter_mut().filter(|c| c.is_active()) {
            if doomed_constraints.contains(&constraint.id) {
                constraint.audit.soft_delete(actor, at);
                counts.2 += 1;
            }
        }
        tracing::debug!(
            feature = %id,
            features = removed.len(),
            groups = counts.0,
            relations = counts.1,
            constraints = counts.2,
            "cascaded feature delete"
        );
        Ok(id)
    }

    pub(crate) fn add_group(&mut self, spec: NewGroup) -> Result<Uuid> {
        let parent = self.feature_id(spec.parent_feature_id)?;
        let members = spec
            .members
            .iter()
            .map(|m| self.feature_id(*m))
            .collect::<Result<Vec<_>>>()?;
        for member in &members {
            let feature = self
                .contents
                .feature(*member)
                .ok_or_else(|| not_found("feature", *member))?;
            if feature.parent_id != Some(parent) {
                return Err(invalid(format!(
                    "feature '{}' is not a child of '{}'",
                    feature.name,
                    self.contents.feature_name(parent)
                )));
            }
            if feature.group_id.is_some() {
                return Err(invalid(format!(
                    "feature '{}' already belongs to a group",
                    feature.name
                )));
            }
        }

        let mut group = match spec.kind {
            GroupKind::Xor => FeatureGroup::xor(self.version_id, parent),
            GroupKind::Or => FeatureGroup::or(self.version_id, parent),
        }
        .with_cardinality(spec.min_cardinality, spec.max_cardinality);
        group.audit = Audit::created(self.actor);
        let group_id = group.id;
        self.contents.groups.push(group);

        let actor = self.actor;
        for feature in self.contents.features.iter_mut() {
            if members.contains(&feature.id) {
                feature.group_id = Some(group_id);
                feature.audit.updated_by = Some(actor.to_string());
            }
        }
        Ok(group_id)
    }

    pub(crate) fn update_group(&mut self, source_id: Uuid, update: GroupUpdate) -> Result<Uuid> {
        let id = self.group_id(source_id)?;
        let actor = self.actor.to_string();
        let group = self.group_mut(id)?;
        let current = group.kind;
        if let Some(kind) = update.kind.filter(|k| *k != current) {
            group.kind = kind;
            (group.min_cardinality, group.max_cardinality) = match kind {
                GroupKind::Xor => (1, Some(1)),
                GroupKind::Or => (1, None),
            };
        }
        if let Some(min) = update.min_cardinality {
            group.min_cardinality = min;
        }
        if let Some(max) = update.max_cardinality {
            group.max_cardinality = max;
        }
        if group.max_cardinality.is_some_and(|max| max < group.min_cardinality) {
            return Err(invalid(format!(
                "group {source_id}: minimum {} exceeds maximum",
                group.min_cardinality
            )));
        }
        group.audit.updated_by = Some(actor);
        Ok(id)
    }

    /// Soft-delete a group; its members stay as plain children.
    pub(crate) fn delete_group(&mut self, source_id: Uuid) -> Result<Uuid> {
        let id = self.group_id(source_id)?;
        let (actor, at) = (self.actor, self.at);
        self.group_mut(id)?.audit.soft_delete(actor, at);
        for feature in self.contents.features.iter_mut() {
            if feature.group_id == Some(id) {
                feature.group_id = None;
                feature.audit.updated_by = Some(actor.to_string());
            }
        }
        Ok(id)
    }

    pub(crate) fn add_relation(
        &mut self,
        kind: RelationKind,
        source: Uuid,
        target: Uuid,
    ) -> Result<Uuid> {
        let endpoint = |label: &str, id: Uuid| {
            self.id_map.feature(id).ok_or_else(|| StructuralFault::InvalidRelation {
                reason: format!("{label} feature {id} is not part of the source version"),
            })
        };
        let source_id = endpoint("source", source)?;
        let target_id = endpoint("target", target)?;
        if source_id == target_id {
            return Err(StructuralFault::SelfRelation {
                feature: self.contents.feature_name(source_id),
            }
            .into());
        }
        let duplicate = self
            .contents
            .active_relations()
            .any(|r| r.kind == kind && r.source_id == source_id && r.target_id == target_id);
        if duplicate {
            return Err(StructuralFault::DuplicateRelation {
                kind: kind.as_str().to_string(),
                source_feature: self.contents.feature_name(source_id),
                target_feature: self.contents.feature_name(target_id),
            }
            .into());
        }

        let mut relation = FeatureRelation::new(self.version_id, kind, source_id, target_id);
        relation.audit = Audit::created(self.actor);
        let id = relation.id;
        self.contents.relations.push(relation);
        Ok(id)
    }

    pub(crate) fn delete_relation(&mut self, source_id: Uuid) -> Result<Uuid> {
        let id = self
            .id_map
            .relation(source_id)
            .ok_or_else(|| not_found("relation", source_id))?;
        let (actor, at) = (self.actor, self.at);
        let relation = self
            .contents
            .relations
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| not_found("relation", source_id))?;
        relation.audit.soft_delete(actor, at);
        Ok(id)
    }

    fn check_expression(&self, text: &str) -> Result<()> {
        parse_expression(text, &NameResolver::new(&self.contents.features))?;
        Ok(())
    }

    pub(crate) fn add_constraint(&mut self, spec: NewConstraint) -> Result<Uuid> {
        self.check_expression(&spec.expression)?;
        let mut constraint = Constraint::new(self.version_id, spec.expression);
        constraint.name = spec.name;
        constraint.audit = Audit::created(self.actor);
        let id = constraint.id;
        self.contents.constraints.push(constraint);
        Ok(id)
    }

    pub(crate) fn update_constraint(
        &mut self,
        source_id: Uuid,
        update: ConstraintUpdate,
    ) -> Result<Uuid> {
        let id = self
            .id_map
            .constraint(source_id)
            .ok_or_else(|| not_found("constraint", source_id))?;
        if let Some(text) = &update.expression {
            self.check_expression(text)?;
        }
        let actor = self.actor.to_string();
        let constraint = self
            .contents
            .constraints
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| not_found("constraint", source_id))?;
        if let Some(text) = update.expression {
            constraint.expr_text = text;
            constraint.expr_cnf = None;
        }
        if let Some(name) = update.name {
            constraint.name = name;
        }
        constraint.audit.updated_by = Some(actor);
        Ok(id)
    }

    pub(crate) fn delete_constraint(&mut self, source_id: Uuid) -> Result<Uuid> {
        let id = self
            .id_map
            .constraint(source_id)
            .ok_or_else(|| not_found("constraint", source_id))?;
        let (actor, at) = (self.actor, self.at);
        let constraint = self
            .contents
            .constraints
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| not_found("constraint", source_id))?;
        constraint.audit.soft_delete(actor, at);
        Ok(id)
    }
}

//! Feature-model records: the flat rows every engine operation consumes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use crate::view::VersionSnapshot;

/// Whether a feature must be selected together with its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeatureKind {
    Mandatory,
    Optional,
}

impl FeatureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mandatory => "mandatory",
            Self::Optional => "optional",
        }
    }
}

/// Decision construct over a feature's children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GroupKind {
    /// Exactly one member.
    #[serde(alias = "ALTERNATIVE")]
    Xor,
    /// At least one member.
    Or,
}

impl GroupKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Xor => "xor",
            Self::Or => "or",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationKind {
    Requires,
    Excludes,
}

impl RelationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Requires => "requires",
            Self::Excludes => "excludes",
        }
    }
}

/// Lifecycle state of a version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VersionState {
    Draft,
    Published,
    Archived,
}

impl VersionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
            Self::Archived => "archived",
        }
    }
}

impl fmt::Display for VersionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_active() -> bool {
    true
}

/// Soft-delete flag and actor bookkeeping carried by every row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Audit {
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
}

impl Default for Audit {
    fn default() -> Self {
        Self {
            is_active: true,
            deleted_at: None,
            created_by: None,
            updated_by: None,
        }
    }
}

impl Audit {
    pub fn created(actor: &str) -> Self {
        Self {
            created_by: Some(actor.to_string()),
            ..Self::default()
        }
    }

    /// Mark the row logically deleted.
    pub fn soft_delete(&mut self, actor: &str, at: DateTime<Utc>) {
        self.is_active = false;
        self.deleted_at = Some(at);
        self.updated_by = Some(actor.to_string());
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub id: Uuid,
    pub name: String,
    pub kind: FeatureKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Uuid>,
    #[serde(default)]
    pub version_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<Uuid>,
    /// Linked external resource (document, component, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, serde_json::Value>,
    #[serde(flatten)]
    pub audit: Audit,
}

impl Feature {
    pub fn new(version_id: Uuid, name: impl Into<String>, kind: FeatureKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            kind,
            parent_id: None,
            version_id,
            group_id: None,
            resource_id: None,
            properties: BTreeMap::new(),
            audit: Audit::default(),
        }
    }

    pub fn with_parent(mut self, parent_id: Uuid) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn in_group(mut self, group_id: Uuid) -> Self {
        self.group_id = Some(group_id);
        self
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn is_active(&self) -> bool {
        self.audit.is_active
    }
}

fn default_min_cardinality() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureGroup {
    pub id: Uuid,
    pub kind: GroupKind,
    #[serde(default = "default_min_cardinality")]
    pub min_cardinality: u32,
    /// `None` means unbounded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_cardinality: Option<u32>,
    pub parent_feature_id: Uuid,
    #[serde(default)]
    pub version_id: Uuid,
    #[serde(flatten)]
    pub audit: Audit,
}

impl FeatureGroup {
    /// Exactly-one group, cardinality `[1, 1]`.
    pub fn xor(version_id: Uuid, parent_feature_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: GroupKind::Xor,
            min_cardinality: 1,
            max_cardinality: Some(1),
            parent_feature_id,
            version_id,
            audit: Audit::default(),
        }
    }

    /// At-least-one group, cardinality `[1, *]`.
    pub fn or(version_id: Uuid, parent_feature_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: GroupKind::Or,
            min_cardinality: 1,
            max_cardinality: None,
            parent_feature_id,
            version_id,
            audit: Audit::default(),
        }
    }

    pub fn with_cardinality(mut self, min: u32, max: Option<u32>) -> Self {
        self.min_cardinality = min;
        self.max_cardinality = max;
        self
    }

    pub fn is_active(&self) -> bool {
        self.audit.is_active
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRelation {
    pub id: Uuid,
    pub kind: RelationKind,
    pub source_id: Uuid,
    pub target_id: Uuid,
    #[serde(default)]
    pub version_id: Uuid,
    #[serde(flatten)]
    pub audit: Audit,
}

impl FeatureRelation {
    pub fn new(version_id: Uuid, kind: RelationKind, source_id: Uuid, target_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            source_id,
            target_id,
            version_id,
            audit: Audit::default(),
        }
    }

    pub fn requires(version_id: Uuid, source_id: Uuid, target_id: Uuid) -> Self {
        Self::new(version_id, RelationKind::Requires, source_id, target_id)
    }

    pub fn excludes(version_id: Uuid, source_id: Uuid, target_id: Uuid) -> Self {
        Self::new(version_id, RelationKind::Excludes, source_id, target_id)
    }

    pub fn is_active(&self) -> bool {
        self.audit.is_active
    }

    pub fn touches(&self, feature_id: Uuid) -> bool {
        self.source_id == feature_id || self.target_id == feature_id
    }
}

/// One literal of a precompiled constraint clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FeatureLiteral {
    pub feature_id: Uuid,
    #[serde(default)]
    pub negated: bool,
}

impl FeatureLiteral {
    pub fn pos(feature_id: Uuid) -> Self {
        Self {
            feature_id,
            negated: false,
        }
    }

    pub fn neg(feature_id: Uuid) -> Self {
        Self {
            feature_id,
            negated: true,
        }
    }
}

/// Free-text cross-tree constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub expr_text: String,
    /// When present, used verbatim instead of parsing `expr_text`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expr_cnf: Option<Vec<Vec<FeatureLiteral>>>,
    #[serde(default)]
    pub version_id: Uuid,
    #[serde(flatten)]
    pub audit: Audit,
}

impl Constraint {
    pub fn new(version_id: Uuid, expr_text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: None,
            expr_text: expr_text.into(),
            expr_cnf: None,
            version_id,
            audit: Audit::default(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.audit.is_active
    }

    /// Name if set, otherwise the expression text.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.expr_text)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureModel {
    pub id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl FeatureModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureModelVersion {
    pub id: Uuid,
    pub model_id: Uuid,
    pub version_number: u32,
    pub state: VersionState,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<VersionSnapshot>,
}

/// The flat entity lists of one materialized version.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VersionContents {
    #[serde(default)]
    pub features: Vec<Feature>,
    #[serde(default)]
    pub groups: Vec<FeatureGroup>,
    #[serde(default)]
    pub relations: Vec<FeatureRelation>,
    #[serde(default)]
    pub constraints: Vec<Constraint>,
}

impl VersionContents {
    /// Copy of the contents with soft-deleted rows dropped.
    pub fn active(&self) -> Self {
        Self {
            features: self.active_features().cloned().collect(),
            groups: self.active_groups().cloned().collect(),
            relations: self.active_relations().cloned().collect(),
            constraints: self.active_constraints().cloned().collect(),
        }
    }

    pub fn active_features(&self) -> impl Iterator<Item = &Feature> {
        self.features.iter().filter(|f| f.is_active())
    }

    pub fn active_groups(&self) -> impl Iterator<Item = &FeatureGroup> {
        self.groups.iter().filter(|g| g.is_active())
    }

    pub fn active_relations(&self) -> impl Iterator<Item = &FeatureRelation> {
        self.relations.iter().filter(|r| r.is_active())
    }

    pub fn active_constraints(&self) -> impl Iterator<Item = &Constraint> {
        self.constraints.iter().filter(|c| c.is_active())
    }

    pub fn feature(&self, id: Uuid) -> Option<&Feature> {
        self.active_features().find(|f| f.id == id)
    }

    pub fn feature_by_name(&self, name: &str) -> Option<&Feature> {
        self.active_features().find(|f| f.name == name)
    }

    pub fn group(&self, id: Uuid) -> Option<&FeatureGroup> {
        self.active_groups().find(|g| g.id == id)
    }

    /// Active features whose group reference points at `group_id`.
    pub fn group_members(&self, group_id: Uuid) -> impl Iterator<Item = &Feature> {
        self.active_features()
            .filter(move |f| f.group_id == Some(group_id))
    }

    /// Active groups parented by `feature_id`.
    pub fn groups_of(&self, feature_id: Uuid) -> impl Iterator<Item = &FeatureGroup> {
        self.active_groups()
            .filter(move |g| g.parent_feature_id == feature_id)
    }

    /// Display name of a feature, falling back to its id.
    pub fn feature_name(&self, id: Uuid) -> String {
        self.feature(id)
            .map(|f| f.name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    pub fn feature_count(&self) -> usize {
        self.active_features().count()
    }
}

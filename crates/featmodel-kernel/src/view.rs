//! Read-side views: the nested name-sorted tree, aggregate statistics and
//! the publish-time snapshot record.

use crate::mapping::VariableMapping;
use crate::model::{FeatureKind, GroupKind, RelationKind, VersionContents};
use crate::tree::FeatureTree;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupInfo {
    pub id: Uuid,
    pub kind: GroupKind,
    pub min_cardinality: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_cardinality: Option<u32>,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    pub id: Uuid,
    pub name: String,
    pub kind: FeatureKind,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, serde_json::Value>,
    /// Group this feature is a member of.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<GroupInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<Uuid>,
    pub depth: usize,
    pub is_leaf: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    /// Number of nodes in this subtree, including `self`.
    pub fn size(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(node.children.iter());
        }
        count
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationView {
    pub id: Uuid,
    pub kind: RelationKind,
    pub source: String,
    pub target: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelStatistics {
    pub total_features: usize,
    pub mandatory_features: usize,
    pub optional_features: usize,
    /// Levels from the root down (root alone is 1).
    pub max_depth: usize,
    pub total_groups: usize,
    pub xor_groups: usize,
    pub or_groups: usize,
    pub total_relations: usize,
    pub requires_relations: usize,
    pub excludes_relations: usize,
    pub total_constraints: usize,
    pub complexity_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotModel {
    pub id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMapping {
    pub uuid_to_int: BTreeMap<String, u32>,
    pub int_to_uuid: BTreeMap<u32, String>,
}

impl From<&VariableMapping> for SnapshotMapping {
    fn from(mapping: &VariableMapping) -> Self {
        let (uuid_to_int, int_to_uuid) = mapping.to_tables();
        Self {
            uuid_to_int,
            int_to_uuid,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    pub total_features: usize,
    pub total_relations: usize,
    pub total_constraints: usize,
    pub total_groups: usize,
}

/// Immutable artifact written once when a version is published.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionSnapshot {
    pub version_number: u32,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub feature_model: SnapshotModel,
    pub mapping: SnapshotMapping,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tree: Option<TreeNode>,
    pub statistics: ModelStatistics,
    pub metadata: SnapshotMetadata,
    /// SHA-256 over the canonical JSON of tree and mapping.
    pub content_digest: String,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn describe_group(kind: GroupKind, min: u32, max: Option<u32>, members: usize) -> String {
    match (kind, max) {
        (GroupKind::Xor, _) => format!("exactly one of {members} alternatives"),
        (GroupKind::Or, Some(max)) => format!("between {min} and {max} of {members} options"),
        (GroupKind::Or, None) => format!("at least {min} of {members} options"),
    }
}

/// Builds presentation views over one version's active rows.
pub struct TreeBuilder<'a> {
    contents: &'a VersionContents,
    tree: FeatureTree<'a>,
}

impl<'a> TreeBuilder<'a> {
    pub fn new(contents: &'a VersionContents) -> Self {
        Self {
            contents,
            tree: FeatureTree::new(&contents.features),
        }
    }

    pub fn tree(&self) -> &FeatureTree<'a> {
        &self.tree
    }

    fn group_info(&self, group_id: Option<Uuid>) -> Option<GroupInfo> {
        let group = self.contents.group(group_id?)?;
        let members = self.contents.group_members(group.id).count();
        Some(GroupInfo {
            id: group.id,
            kind: group.kind,
            min_cardinality: group.min_cardinality,
            max_cardinality: group.max_cardinality,
            description: describe_group(
                group.kind,
                group.min_cardinality,
                group.max_cardinality,
                members,
            ),
        })
    }

    /// Nested tree from the single root, children sorted by name.
    ///
    /// Built bottom-up over the pre-order walk, so no recursion is needed.
    pub fn build_tree(&self) -> Option<TreeNode> {
        let walk = self.tree.walk_sorted();
        let root_id = walk.first().map(|(_, f)| f.id)?;
        let mut built: BTreeMap<Uuid, TreeNode> = BTreeMap::new();

        for (depth, feature) in walk.iter().rev() {
            let children: Vec<TreeNode> = self
                .tree
                .sorted_children(feature.id)
                .into_iter()
                .filter_map(|child| built.remove(&child.id))
                .collect();
            built.insert(
                feature.id,
                TreeNode {
                    id: feature.id,
                    name: feature.name.clone(),
                    kind: feature.kind,
                    properties: feature.properties.clone(),
                    group: self.group_info(feature.group_id),
                    resource_id: feature.resource_id,
                    depth: *depth,
                    is_leaf: children.is_empty(),
                    children,
                },
            );
        }

        built.remove(&root_id)
    }

    pub fn relation_views(&self) -> Vec<RelationView> {
        self.contents
            .active_relations()
            .map(|relation| {
                let source = self.contents.feature_name(relation.source_id);
                let target = self.contents.feature_name(relation.target_id);
                let description = match relation.kind {
                    RelationKind::Requires => format!("'{source}' requires '{target}'"),
                    RelationKind::Excludes => {
                        format!("'{source}' and '{target}' cannot be selected together")
                    }
                };
                RelationView {
                    id: relation.id,
                    kind: relation.kind,
                    source,
                    target,
                    description,
                }
            })
            .collect()
    }

    pub fn statistics(&self) -> ModelStatistics {
        let total_features = self.tree.len();
        let mandatory_features = self
            .tree
            .features()
            .filter(|f| f.kind == FeatureKind::Mandatory)
            .count();
        let groups: Vec<_> = self.contents.active_groups().collect();
        let relations: Vec<_> = self.contents.active_relations().collect();
        let total_constraints = self.contents.active_constraints().count();
        let max_depth = self.tree.level_count();

        let complexity_score = round2(
            total_features as f64 * 0.5
                + relations.len() as f64 * 2.0
                + total_constraints as f64 * 3.0
                + groups.len() as f64 * 1.5
                + max_depth as f64,
        );

        ModelStatistics {
            total_features,
            mandatory_features,
            optional_features: total_features - mandatory_features,
            max_depth,
            total_groups: groups.len(),
            xor_groups: groups.iter().filter(|g| g.kind == GroupKind::Xor).count(),
            or_groups: groups.iter().filter(|g| g.kind == GroupKind::Or).count(),
            total_relations: relations.len(),
            requires_relations: relations
                .iter()
                .filter(|r| r.kind == RelationKind::Requires)
                .count(),
            excludes_relations: relations
                .iter()
                .filter(|r| r.kind == RelationKind::Excludes)
                .count(),
            total_constraints,
            complexity_score,
        }
    }

    pub fn metadata(&self) -> SnapshotMetadata {
        SnapshotMetadata {
            total_features: self.tree.len(),
            total_relations: self.contents.active_relations().count(),
            total_constraints: self.contents.active_constraints().count(),
            total_groups: self.contents.active_groups().count(),
        }
    }
}

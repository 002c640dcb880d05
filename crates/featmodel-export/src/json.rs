//! JSON export and the matching import.
//!
//! The document nests features under their parents (children sorted by
//! name) and refers to features by name everywhere else, so it reads well
//! and survives id regeneration. Group membership is carried on each member
//! as a `ref` local to the document.

use crate::error::ExportError;
use crate::session::ExportSession;
use featmodel_kernel::{
    Constraint, Feature, FeatureGroup, FeatureKind, FeatureModel, FeatureRelation, GroupKind,
    ModelDocument, RelationKind, VersionContents, VersionState,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonModel {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<VersionState>,
    pub tree: Option<JsonNode>,
    #[serde(default)]
    pub relations: Vec<JsonRelation>,
    #[serde(default)]
    pub constraints: Vec<JsonConstraint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonNode {
    pub name: String,
    pub kind: FeatureKind,
    #[serde(default)]
    pub properties: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<JsonGroup>,
    #[serde(default)]
    pub children: Vec<JsonNode>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonGroup {
    #[serde(rename = "ref")]
    pub group_ref: u32,
    pub kind: GroupKind,
    pub min: u32,
    #[serde(default)]
    pub max: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonRelation {
    pub source: String,
    pub target: String,
    pub kind: RelationKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonConstraint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub expression: String,
}

fn json_node(
    session: &ExportSession<'_>,
    feature: &Feature,
    refs: &mut BTreeMap<Uuid, u32>,
) -> JsonNode {
    let group = feature
        .group_id
        .and_then(|gid| session.contents().group(gid))
        .filter(|g| g.is_active())
        .map(|g| {
            let next = refs.len() as u32 + 1;
            JsonGroup {
                group_ref: *refs.entry(g.id).or_insert(next),
                kind: g.kind,
                min: g.min_cardinality,
                max: g.max_cardinality,
            }
        });
    let children = session
        .tree()
        .sorted_children(feature.id)
        .into_iter()
        .map(|child| json_node(session, child, refs))
        .collect();
    JsonNode {
        name: feature.name.clone(),
        kind: feature.kind,
        properties: feature.properties.clone(),
        group,
        children,
    }
}

pub fn to_model(session: &ExportSession<'_>) -> JsonModel {
    let contents = session.contents();
    let mut refs = BTreeMap::new();
    let tree = session.root().map(|root| json_node(session, root, &mut refs));
    let exported = tree.as_ref().map_or(0, count_nodes);
    if exported < session.tree().len() {
        tracing::warn!(
            exported,
            total = session.tree().len(),
            "features unreachable from the root are not part of the json tree"
        );
    }
    JsonModel {
        name: session.model().name.clone(),
        description: session.model().description.clone(),
        version: session.version_number(),
        status: session.state(),
        tree,
        relations: contents
            .active_relations()
            .map(|r| JsonRelation {
                source: session.name(r.source_id),
                target: session.name(r.target_id),
                kind: r.kind,
            })
            .collect(),
        constraints: contents
            .active_constraints()
            .map(|c| JsonConstraint {
                name: c.name.clone(),
                expression: c.expr_text.clone(),
            })
            .collect(),
    }
}

fn count_nodes(root: &JsonNode) -> usize {
    let mut count = 0;
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        count += 1;
        stack.extend(node.children.iter());
    }
    count
}

pub fn export(session: &ExportSession<'_>) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(&to_model(session))?)
}

/// Rebuild flat rows from a JSON export. Every id is fresh.
pub fn import_json(raw: &str) -> Result<ModelDocument, ExportError> {
    let doc: JsonModel = serde_json::from_str(raw)?;
    let version_id = Uuid::new_v4();
    let mut contents = VersionContents::default();
    let mut ids: BTreeMap<String, Uuid> = BTreeMap::new();
    let mut groups: BTreeMap<(Uuid, u32), Uuid> = BTreeMap::new();

    let mut stack: Vec<(&JsonNode, Option<Uuid>)> = doc.tree.iter().map(|n| (n, None)).collect();
    while let Some((node, parent)) = stack.pop() {
        let mut feature = Feature::new(version_id, node.name.clone(), node.kind);
        feature.parent_id = parent;
        feature.properties = node.properties.clone();
        if ids.insert(node.name.clone(), feature.id).is_some() {
            return Err(ExportError::Import(format!(
                "feature name '{}' appears more than once",
                node.name
            )));
        }
        if let Some(spec) = node.group {
            let Some(parent) = parent else {
                return Err(ExportError::Import(format!(
                    "root feature '{}' cannot be a group member",
                    node.name
                )));
            };
            let group_id = match groups.get(&(parent, spec.group_ref)) {
                Some(id) => *id,
                None => {
                    let group = match spec.kind {
                        GroupKind::Xor => FeatureGroup::xor(version_id, parent),
                        GroupKind::Or => FeatureGroup::or(version_id, parent)
                            .with_cardinality(spec.min, spec.max),
                    };
                    let id = group.id;
                    groups.insert((parent, spec.group_ref), id);
                    contents.groups.push(group);
                    id
                }
            };
            feature.group_id = Some(group_id);
        }
        let id = feature.id;
        contents.features.push(feature);
        stack.extend(node.children.iter().rev().map(|child| (child, Some(id))));
    }

    let lookup = |name: &str| {
        ids.get(name)
            .copied()
            .ok_or_else(|| ExportError::Import(format!("relation references unknown feature '{name}'")))
    };
    for relation in &doc.relations {
        let source = lookup(&relation.source)?;
        let target = lookup(&relation.target)?;
        contents
            .relations
            .push(FeatureRelation::new(version_id, relation.kind, source, target));
    }
    for constraint in &doc.constraints {
        let mut row = Constraint::new(version_id, constraint.expression.clone());
        row.name = constraint.name.clone();
        contents.constraints.push(row);
    }

    let mut model = FeatureModel::new(doc.name);
    model.description = doc.description;
    tracing::debug!(
        model = %model.name,
        features = contents.features.len(),
        groups = contents.groups.len(),
        "imported json model"
    );
    Ok(ModelDocument {
        model,
        version_number: doc.version,
        version_id: Some(version_id),
        contents,
    })
}

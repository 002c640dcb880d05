//! Canonical publish-time snapshots.

use chrono::{DateTime, Utc};
use featmodel_kernel::{
    FeatureModel, FeatureModelError, FeatureModelVersion, SnapshotMapping, SnapshotModel,
    TreeBuilder, TreeNode, VariableMapping, VersionContents, VersionSnapshot,
};
use serde::Serialize;
use sha2::{Digest, Sha256};

#[derive(Serialize)]
struct DigestInput<'a> {
    tree: &'a Option<TreeNode>,
    mapping: &'a SnapshotMapping,
}

/// SHA-256 over the canonical JSON of tree and mapping, hex encoded.
///
/// Object keys are emitted in sorted order, so equal content always hashes
/// to the same digest.
pub fn content_digest(
    tree: &Option<TreeNode>,
    mapping: &SnapshotMapping,
) -> Result<String, FeatureModelError> {
    let canonical = serde_json::to_value(DigestInput { tree, mapping })
        .and_then(|value| serde_json::to_vec(&value))
        .map_err(|e| FeatureModelError::Document(e.to_string()))?;
    let mut hasher = Sha256::new();
    hasher.update(&canonical);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Whether a stored snapshot still matches its recorded digest.
pub fn verify_snapshot(snapshot: &VersionSnapshot) -> Result<bool, FeatureModelError> {
    Ok(content_digest(&snapshot.tree, &snapshot.mapping)? == snapshot.content_digest)
}

/// Build the snapshot of `version` from its active rows.
pub fn build_snapshot(
    model: &FeatureModel,
    version: &FeatureModelVersion,
    contents: &VersionContents,
    at: DateTime<Utc>,
) -> Result<VersionSnapshot, FeatureModelError> {
    let active = contents.active();
    let builder = TreeBuilder::new(&active);
    let mapping = SnapshotMapping::from(&VariableMapping::from_features(&active.features));
    let tree = builder.build_tree();
    let content_digest = content_digest(&tree, &mapping)?;

    Ok(VersionSnapshot {
        version_number: version.version_number,
        created_at: at,
        created_by: version.created_by.clone(),
        feature_model: SnapshotModel {
            id: model.id,
            name: model.name.clone(),
            description: model.description.clone(),
        },
        mapping,
        tree,
        statistics: builder.statistics(),
        metadata: builder.metadata(),
        content_digest,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use featmodel_kernel::{ModelBuilder, VersionState};
    use uuid::Uuid;

    fn version(model: &FeatureModel) -> FeatureModelVersion {
        FeatureModelVersion {
            id: Uuid::new_v4(),
            model_id: model.id,
            version_number: 3,
            state: VersionState::Draft,
            created_by: "alice".to_string(),
            created_at: Utc::now(),
            published_at: None,
            snapshot: None,
        }
    }

    #[test]
    fn snapshot_carries_mapping_tree_and_totals() {
        let model = FeatureModel::new("Car");
        let contents = ModelBuilder::new()
            .root("Car")
            .mandatory("Engine", "Car")
            .optional("Radio", "Car")
            .requires("Radio", "Engine")
            .build()
            .expect("model");
        let snapshot =
            build_snapshot(&model, &version(&model), &contents, Utc::now()).expect("snapshot");

        assert_eq!(snapshot.version_number, 3);
        assert_eq!(snapshot.created_by, "alice");
        assert_eq!(snapshot.feature_model.name, "Car");
        let root = contents.features[0].id.to_string();
        assert_eq!(snapshot.mapping.uuid_to_int.get(&root), Some(&1));
        assert_eq!(snapshot.mapping.int_to_uuid.get(&1), Some(&root));
        assert_eq!(snapshot.tree.as_ref().map(TreeNode::size), Some(3));
        assert_eq!(snapshot.metadata.total_features, 3);
        assert_eq!(snapshot.metadata.total_relations, 1);
        assert_eq!(snapshot.statistics.max_depth, 2);
        assert_eq!(snapshot.content_digest.len(), 64);
        assert!(verify_snapshot(&snapshot).expect("digest"));
    }

    #[test]
    fn digest_ignores_time_but_tracks_content() {
        let model = FeatureModel::new("Car");
        let mut contents = ModelBuilder::new()
            .root("Car")
            .optional("Radio", "Car")
            .build()
            .expect("model");
        let v = version(&model);
        let first = build_snapshot(&model, &v, &contents, Utc::now()).expect("snapshot");
        let second = build_snapshot(&model, &v, &contents, Utc::now()).expect("snapshot");
        assert_eq!(first.content_digest, second.content_digest);

        contents.features[1].name = "Stereo".to_string();
        let renamed = build_snapshot(&model, &v, &contents, Utc::now()).expect("snapshot");
        assert_ne!(first.content_digest, renamed.content_digest);

        let mut tampered = first.clone();
        tampered.mapping.int_to_uuid.insert(9, "x".to_string());
        assert!(!verify_snapshot(&tampered).expect("digest"));
    }
}

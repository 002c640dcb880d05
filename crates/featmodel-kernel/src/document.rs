//! On-disk model document: one feature model plus one version's rows.

use crate::error::FeatureModelError;
use crate::model::{FeatureModel, VersionContents};
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDocument {
    pub model: FeatureModel,
    #[serde(default = "default_version_number")]
    pub version_number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_id: Option<Uuid>,
    #[serde(flatten)]
    pub contents: VersionContents,
}

fn default_version_number() -> u32 {
    1
}

impl ModelDocument {
    pub fn new(model: FeatureModel, contents: VersionContents) -> Self {
        Self {
            model,
            version_number: 1,
            version_id: None,
            contents,
        }
    }

    /// Parse and stamp every row with the document's version id.
    pub fn from_json_str(raw: &str) -> Result<Self, FeatureModelError> {
        let mut doc: Self =
            serde_json::from_str(raw).map_err(|e| FeatureModelError::Document(e.to_string()))?;
        let version_id = *doc.version_id.get_or_insert_with(Uuid::new_v4);
        doc.stamp_version(version_id);
        Ok(doc)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, FeatureModelError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| FeatureModelError::Document(format!("{}: {e}", path.display())))?;
        let doc = Self::from_json_str(&raw)?;
        tracing::debug!(
            path = %path.display(),
            model = %doc.model.name,
            features = doc.contents.features.len(),
            "loaded model document"
        );
        Ok(doc)
    }

    pub fn to_json_pretty(&self) -> Result<String, FeatureModelError> {
        serde_json::to_string_pretty(self).map_err(|e| FeatureModelError::Document(e.to_string()))
    }

    fn stamp_version(&mut self, version_id: Uuid) {
        let c = &mut self.contents;
        c.features.iter_mut().for_each(|f| f.version_id = version_id);
        c.groups.iter_mut().for_each(|g| g.version_id = version_id);
        c.relations.iter_mut().for_each(|r| r.version_id = version_id);
        c.constraints.iter_mut().for_each(|k| k.version_id = version_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_stamps_version_on_rows() {
        let raw = r#"{
            "model": {"id": "00000000-0000-0000-0000-0000000000aa", "name": "Car"},
            "features": [
                {"id": "00000000-0000-0000-0000-000000000001", "name": "Car", "kind": "MANDATORY"},
                {"id": "00000000-0000-0000-0000-000000000002", "name": "Radio", "kind": "OPTIONAL",
                 "parent_id": "00000000-0000-0000-0000-000000000001"}
            ],
            "constraints": [
                {"id": "00000000-0000-0000-0000-0000000000c1", "expr_text": "Radio REQUIRES Car"}
            ]
        }"#;
        let doc = ModelDocument::from_json_str(raw).expect("document should parse");
        let version_id = doc.version_id.expect("version id assigned");
        assert_eq!(doc.version_number, 1);
        assert!(doc.contents.features.iter().all(|f| f.version_id == version_id));
        assert_eq!(doc.contents.constraints[0].version_id, version_id);
        assert!(doc.contents.groups.is_empty());
    }

    #[test]
    fn malformed_document_is_rejected() {
        let err = ModelDocument::from_json_str("{\"model\": 3}").expect_err("must fail");
        assert!(matches!(err, FeatureModelError::Document(_)));
    }
}

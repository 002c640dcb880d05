//! In-memory version store.
//!
//! The store is a plain value owned by the caller. It holds models, version
//! rows with their entity lists, and the highest version number ever
//! allocated per model so a discarded number is never handed out again.

use featmodel_kernel::{FeatureModel, FeatureModelVersion, VersionContents};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Errors raised while persisting or loading a store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// One version row together with its entity lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredVersion {
    pub version: FeatureModelVersion,
    pub contents: VersionContents,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VersionStore {
    #[serde(default)]
    models: BTreeMap<Uuid, FeatureModel>,
    #[serde(default)]
    versions: BTreeMap<Uuid, StoredVersion>,
    /// Highest number ever allocated, per model.
    #[serde(default)]
    allocated: BTreeMap<Uuid, u32>,
}

impl VersionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(raw: &str) -> Result<Self, StoreError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn to_json_pretty(&self) -> Result<String, StoreError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| StoreError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let store = Self::from_json_str(&raw)?;
        tracing::debug!(
            path = %path.display(),
            models = store.models.len(),
            versions = store.versions.len(),
            "loaded version store"
        );
        Ok(store)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), StoreError> {
        let path = path.as_ref();
        let mut raw = self.to_json_pretty()?;
        raw.push('\n');
        std::fs::write(path, raw).map_err(|source| StoreError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Insert or replace a model by id. Returns the previous value if present.
    pub fn upsert_model(&mut self, model: FeatureModel) -> Option<FeatureModel> {
        self.models.insert(model.id, model)
    }

    pub fn model(&self, id: Uuid) -> Option<&FeatureModel> {
        self.models.get(&id)
    }

    pub fn models(&self) -> impl Iterator<Item = &FeatureModel> {
        self.models.values()
    }

    pub fn get(&self, version_id: Uuid) -> Option<&StoredVersion> {
        self.versions.get(&version_id)
    }

    pub(crate) fn get_mut(&mut self, version_id: Uuid) -> Option<&mut StoredVersion> {
        self.versions.get_mut(&version_id)
    }

    /// Number the next version of `model_id` will receive.
    pub fn next_version_number(&self, model_id: Uuid) -> u32 {
        let allocated = self.allocated.get(&model_id).copied().unwrap_or(0);
        let present = self
            .versions
            .values()
            .filter(|v| v.version.model_id == model_id)
            .map(|v| v.version.version_number)
            .max()
            .unwrap_or(0);
        allocated.max(present) + 1
    }

    /// Commit a fully staged version. Its number becomes permanently used.
    pub(crate) fn insert(&mut self, stored: StoredVersion) {
        let model_id = stored.version.model_id;
        let number = stored.version.version_number;
        let highest = self.allocated.entry(model_id).or_insert(0);
        *highest = (*highest).max(number);
        self.versions.insert(stored.version.id, stored);
    }

    pub(crate) fn remove(&mut self, version_id: Uuid) -> Option<StoredVersion> {
        self.versions.remove(&version_id)
    }

    /// Versions of one model in ascending number order.
    pub fn versions_of(&self, model_id: Uuid) -> Vec<&StoredVersion> {
        let mut versions: Vec<&StoredVersion> = self
            .versions
            .values()
            .filter(|v| v.version.model_id == model_id)
            .collect();
        versions.sort_by_key(|v| v.version.version_number);
        versions
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use featmodel_kernel::VersionState;

    fn stored(model_id: Uuid, number: u32) -> StoredVersion {
        StoredVersion {
            version: FeatureModelVersion {
                id: Uuid::new_v4(),
                model_id,
                version_number: number,
                state: VersionState::Draft,
                created_by: "alice".to_string(),
                created_at: Utc::now(),
                published_at: None,
                snapshot: None,
            },
            contents: VersionContents::default(),
        }
    }

    #[test]
    fn removed_numbers_stay_allocated() {
        let model = FeatureModel::new("Car");
        let mut store = VersionStore::new();
        store.upsert_model(model.clone());
        assert_eq!(store.next_version_number(model.id), 1);

        let first = stored(model.id, 1);
        let first_id = first.version.id;
        store.insert(first);
        store.insert(stored(model.id, 2));
        assert_eq!(store.next_version_number(model.id), 3);

        store.remove(first_id);
        let versions = store.versions_of(model.id);
        assert_eq!(versions.len(), 1);
        assert_eq!(versions[0].version.version_number, 2);
        assert_eq!(store.next_version_number(model.id), 3);
    }

    #[test]
    fn store_survives_json_round_trip() {
        let model = FeatureModel::new("Car");
        let mut store = VersionStore::new();
        store.upsert_model(model.clone());
        let version = stored(model.id, 4);
        store.insert(version.clone());
        store.remove(version.version.id);

        let raw = store.to_json_pretty().expect("store should serialize");
        let back = VersionStore::from_json_str(&raw).expect("store should parse");
        assert_eq!(back, store);
        assert_eq!(back.next_version_number(model.id), 5);
    }
}

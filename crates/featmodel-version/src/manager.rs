//! Version lifecycle over a [`VersionStore`].

use crate::clone::{IdMap, stage_clone};
use crate::edit::{
    ConstraintUpdate, Draft, FeatureUpdate, GroupUpdate, NewConstraint, NewFeature, NewGroup,
};
use crate::snapshot::build_snapshot;
use crate::store::{StoredVersion, VersionStore};
use chrono::Utc;
use featmodel_analysis::{CycleScope, StructuralAnalyzer};
use featmodel_kernel::{
    EngineConfig, FeatureModel, FeatureModelError, FeatureModelVersion, LogicalFault,
    ModelDocument, RelationKind, Result, VersionContents, VersionState, VersionStateFault,
};
use featmodel_logic::LogicalValidator;
use serde::Serialize;
use uuid::Uuid;

/// Result of a clone-then-apply edit.
#[derive(Debug, Clone, Serialize)]
pub struct EditOutcome {
    /// The new DRAFT holding the change.
    pub version: FeatureModelVersion,
    /// Id of the touched entity, in the new version.
    pub entity_id: Uuid,
    pub id_map: IdMap,
}

fn require_state(
    version: &FeatureModelVersion,
    required: VersionState,
    operation: &str,
) -> Result<()> {
    if version.state != required {
        return Err(VersionStateFault::InvalidVersionTransition {
            current: version.state,
            required,
            operation: operation.to_string(),
        }
        .into());
    }
    Ok(())
}

#[derive(Debug, Clone, Default)]
pub struct VersionManager {
    store: VersionStore,
    config: EngineConfig,
}

impl VersionManager {
    pub fn new(store: VersionStore) -> Self {
        Self {
            store,
            config: EngineConfig::default(),
        }
    }

    /// Engine settings used by the publish gate.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn store(&self) -> &VersionStore {
        &self.store
    }

    pub fn into_store(self) -> VersionStore {
        self.store
    }

    pub fn register_model(&mut self, model: FeatureModel) -> Uuid {
        let id = model.id;
        self.store.upsert_model(model);
        id
    }

    pub fn model(&self, id: Uuid) -> Result<&FeatureModel> {
        self.store
            .model(id)
            .ok_or_else(|| VersionStateFault::ModelNotFound(id).into())
    }

    fn stored(&self, version_id: Uuid) -> Result<&StoredVersion> {
        self.store
            .get(version_id)
            .ok_or_else(|| VersionStateFault::VersionNotFound(version_id.to_string()).into())
    }

    pub fn version(&self, version_id: Uuid) -> Result<&FeatureModelVersion> {
        Ok(&self.stored(version_id)?.version)
    }

    pub fn version_by_number(&self, model_id: Uuid, number: u32) -> Result<&FeatureModelVersion> {
        self.store
            .versions_of(model_id)
            .into_iter()
            .map(|stored| &stored.version)
            .find(|v| v.version_number == number)
            .ok_or_else(|| {
                VersionStateFault::VersionNotFound(format!("version {number} of model {model_id}"))
                    .into()
            })
    }

    /// Highest-numbered version of a model, optionally restricted to a state.
    pub fn latest_version(
        &self,
        model_id: Uuid,
        state: Option<VersionState>,
    ) -> Option<&FeatureModelVersion> {
        self.store
            .versions_of(model_id)
            .into_iter()
            .rev()
            .map(|stored| &stored.version)
            .find(|v| state.is_none_or(|s| v.state == s))
    }

    pub fn versions(&self, model_id: Uuid) -> Vec<&FeatureModelVersion> {
        self.store
            .versions_of(model_id)
            .into_iter()
            .map(|stored| &stored.version)
            .collect()
    }

    /// Active rows of a version.
    pub fn contents(&self, version_id: Uuid) -> Result<VersionContents> {
        Ok(self.stored(version_id)?.contents.active())
    }

    /// Model document of a version, for export and analysis.
    pub fn document(&self, version_id: Uuid) -> Result<ModelDocument> {
        let stored = self.stored(version_id)?;
        let model = self.model(stored.version.model_id)?;
        Ok(ModelDocument {
            model: model.clone(),
            version_number: stored.version.version_number,
            version_id: Some(version_id),
            contents: stored.contents.active(),
        })
    }

    fn commit(
        &mut self,
        model_id: Uuid,
        version_id: Uuid,
        contents: VersionContents,
        actor: &str,
    ) -> FeatureModelVersion {
        let version = FeatureModelVersion {
            id: version_id,
            model_id,
            version_number: self.store.next_version_number(model_id),
            state: VersionState::Draft,
            created_by: actor.to_string(),
            created_at: Utc::now(),
            published_at: None,
            snapshot: None,
        };
        tracing::debug!(
            model = %model_id,
            version = version.version_number,
            features = contents.feature_count(),
            "committed draft"
        );
        self.store.insert(StoredVersion {
            version: version.clone(),
            contents,
        });
        version
    }

    /// Empty DRAFT, used for a model's first version.
    pub fn create_initial_version(
        &mut self,
        model_id: Uuid,
        actor: &str,
    ) -> Result<FeatureModelVersion> {
        self.model(model_id)?;
        Ok(self.commit(model_id, Uuid::new_v4(), VersionContents::default(), actor))
    }

    /// New DRAFT holding a copy of the source version's active rows.
    pub fn create_version(
        &mut self,
        source_version: Uuid,
        actor: &str,
    ) -> Result<FeatureModelVersion> {
        let stored = self.stored(source_version)?;
        let model_id = stored.version.model_id;
        let version_id = Uuid::new_v4();
        let (contents, _) = stage_clone(&stored.contents, version_id)?;
        Ok(self.commit(model_id, version_id, contents, actor))
    }

    /// New DRAFT built from a document's rows. Registers the model when it
    /// is not known yet.
    pub fn import_document(
        &mut self,
        doc: &ModelDocument,
        actor: &str,
    ) -> Result<FeatureModelVersion> {
        if self.store.model(doc.model.id).is_none() {
            self.register_model(doc.model.clone());
        }
        let version_id = Uuid::new_v4();
        let (contents, _) = stage_clone(&doc.contents, version_id)?;
        Ok(self.commit(doc.model.id, version_id, contents, actor))
    }

    /// Remove an unpublished draft. Its number is not handed out again.
    pub fn discard_draft(&mut self, version_id: Uuid) -> Result<FeatureModelVersion> {
        require_state(self.version(version_id)?, VersionState::Draft, "discard draft")?;
        let removed = self
            .store
            .remove(version_id)
            .ok_or_else(|| VersionStateFault::VersionNotFound(version_id.to_string()))?;
        tracing::debug!(
            version = removed.version.version_number,
            "discarded draft"
        );
        Ok(removed.version)
    }

    fn edit<F>(&mut self, source: Uuid, actor: &str, apply: F) -> Result<EditOutcome>
    where
        F: FnOnce(&mut Draft<'_>) -> Result<Uuid>,
    {
        let stored = self.stored(source)?;
        let model_id = stored.version.model_id;
        let version_id = Uuid::new_v4();
        let (contents, id_map) = stage_clone(&stored.contents, version_id)?;

        let mut draft = Draft::new(contents, id_map, version_id, actor);
        let entity_id = apply(&mut draft)?;
        let (contents, id_map) = draft.into_parts();
        let version = self.commit(model_id, version_id, contents, actor);
        Ok(EditOutcome {
            version,
            entity_id,
            id_map,
        })
    }

    pub fn add_feature(
        &mut self,
        source: Uuid,
        feature: NewFeature,
        actor: &str,
    ) -> Result<EditOutcome> {
        self.edit(source, actor, |draft| draft.add_feature(feature))
    }

    pub fn update_feature(
        &mut self,
        source: Uuid,
        feature_id: Uuid,
        update: FeatureUpdate,
        actor: &str,
    ) -> Result<EditOutcome> {
        self.edit(source, actor, |draft| draft.update_feature(feature_id, update))
    }

    /// Soft-deletes the feature, its subtree, groups parented inside it and
    /// every relation or constraint that mentions a removed feature.
    pub fn delete_feature(
        &mut self,
        source: Uuid,
        feature_id: Uuid,
        actor: &str,
    ) -> Result<EditOutcome> {
        self.edit(source, actor, |draft| draft.delete_feature(feature_id))
    }

    pub fn add_group(&mut self, source: Uuid, group: NewGroup, actor: &str) -> Result<EditOutcome> {
        self.edit(source, actor, |draft| draft.add_group(group))
    }

    pub fn update_group(
        &mut self,
        source: Uuid,
        group_id: Uuid,
        update: GroupUpdate,
        actor: &str,
    ) -> Result<EditOutcome> {
        self.edit(source, actor, |draft| draft.update_group(group_id, update))
    }

    pub fn delete_group(
        &mut self,
        source: Uuid,
        group_id: Uuid,
        actor: &str,
    ) -> Result<EditOutcome> {
        self.edit(source, actor, |draft| draft.delete_group(group_id))
    }

    pub fn add_relation(
        &mut self,
        source: Uuid,
        kind: RelationKind,
        from: Uuid,
        to: Uuid,
        actor: &str,
    ) -> Result<EditOutcome> {
        self.edit(source, actor, |draft| draft.add_relation(kind, from, to))
    }

    pub fn delete_relation(
        &mut self,
        source: Uuid,
        relation_id: Uuid,
        actor: &str,
    ) -> Result<EditOutcome> {
        self.edit(source, actor, |draft| draft.delete_relation(relation_id))
    }

    pub fn add_constraint(
        &mut self,
        source: Uuid,
        constraint: NewConstraint,
        actor: &str,
    ) -> Result<EditOutcome> {
        self.edit(source, actor, |draft| draft.add_constraint(constraint))
    }

    pub fn update_constraint(
        &mut self,
        source: Uuid,
        constraint_id: Uuid,
        update: ConstraintUpdate,
        actor: &str,
    ) -> Result<EditOutcome> {
        self.edit(source, actor, |draft| draft.update_constraint(constraint_id, update))
    }

    pub fn delete_constraint(
        &mut self,
        source: Uuid,
        constraint_id: Uuid,
        actor: &str,
    ) -> Result<EditOutcome> {
        self.edit(source, actor, |draft| draft.delete_constraint(constraint_id))
    }

    /// Structural and logical checks a draft must pass before publishing.
    pub fn check_publishable(&self, contents: &VersionContents) -> Result<()> {
        let active = contents.active();
        let analyzer = StructuralAnalyzer::new(&active).with_config(self.config.analysis.clone());
        analyzer.detect_cycles(CycleScope::Hierarchy)?;
        analyzer.validate_tree_structure()?;
        analyzer.validate_integrity()?;

        let validator = LogicalValidator::new(&active).with_config(self.config.validation.clone());
        match validator.validate_feature_model() {
            Ok(_) => Ok(()),
            Err(FeatureModelError::Logical(LogicalFault::UnsatisfiableModel { detail })) => {
                // Prefer naming the rules that clash.
                validator.find_conflicting_constraints()?;
                Err(LogicalFault::UnsatisfiableModel { detail }.into())
            }
            Err(err) => Err(err),
        }
    }

    /// DRAFT → PUBLISHED. A failed gate leaves the draft as it was.
    pub fn publish(&mut self, version_id: Uuid) -> Result<FeatureModelVersion> {
        let stored = self.stored(version_id)?;
        require_state(&stored.version, VersionState::Draft, "publish version")?;
        let model = self.model(stored.version.model_id)?;

        if let Err(err) = self.check_publishable(&stored.contents) {
            tracing::warn!(
                version = stored.version.version_number,
                fault = err.class(),
                "publish rejected: {err}"
            );
            return Err(err);
        }
        let now = Utc::now();
        let snapshot = build_snapshot(model, &stored.version, &stored.contents, now)?;

        let entry = self
            .store
            .get_mut(version_id)
            .ok_or_else(|| VersionStateFault::VersionNotFound(version_id.to_string()))?;
        entry.version.state = VersionState::Published;
        entry.version.published_at = Some(now);
        entry.version.snapshot = Some(snapshot);
        tracing::debug!(
            version = entry.version.version_number,
            digest = entry
                .version
                .snapshot
                .as_ref()
                .map(|s| s.content_digest.as_str()),
            "published version"
        );
        Ok(entry.version.clone())
    }

    fn transition(
        &mut self,
        version_id: Uuid,
        required: VersionState,
        next: VersionState,
        operation: &str,
    ) -> Result<FeatureModelVersion> {
        require_state(self.version(version_id)?, required, operation)?;
        let entry = self
            .store
            .get_mut(version_id)
            .ok_or_else(|| VersionStateFault::VersionNotFound(version_id.to_string()))?;
        entry.version.state = next;
        tracing::debug!(version = entry.version.version_number, state = %next, "{operation}");
        Ok(entry.version.clone())
    }

    /// PUBLISHED → ARCHIVED.
    pub fn archive(&mut self, version_id: Uuid) -> Result<FeatureModelVersion> {
        self.transition(
            version_id,
            VersionState::Published,
            VersionState::Archived,
            "archive version",
        )
    }

    /// ARCHIVED → PUBLISHED.
    pub fn restore(&mut self, version_id: Uuid) -> Result<FeatureModelVersion> {
        self.transition(
            version_id,
            VersionState::Archived,
            VersionState::Published,
            "restore version",
        )
    }
}

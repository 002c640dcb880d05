//! Name-keyed construction of version contents.
//!
//! Used by fixtures and tests. Names must be unique
//! within one builder; references to unknown names are collected and
//! reported by [`ModelBuilder::build`].

use crate::error::FeatureModelError;
use crate::model::{
    Constraint, Feature, FeatureGroup, FeatureKind, FeatureRelation, RelationKind,
    VersionContents,
};
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct ModelBuilder {
    version_id: Uuid,
    contents: VersionContents,
    ids: BTreeMap<String, Uuid>,
    unknown: Vec<String>,
}

impl Default for ModelBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelBuilder {
    pub fn new() -> Self {
        Self::for_version(Uuid::new_v4())
    }

    pub fn for_version(version_id: Uuid) -> Self {
        Self {
            version_id,
            contents: VersionContents::default(),
            ids: BTreeMap::new(),
            unknown: Vec::new(),
        }
    }

    pub fn version_id(&self) -> Uuid {
        self.version_id
    }

    /// Id assigned to `name`, if it was added.
    pub fn id(&self, name: &str) -> Option<Uuid> {
        self.ids.get(name).copied()
    }

    fn lookup(&mut self, name: &str) -> Option<Uuid> {
        let found = self.id(name);
        if found.is_none() {
            self.unknown.push(name.to_string());
        }
        found
    }

    fn push_feature(&mut self, feature: Feature) -> Uuid {
        let id = feature.id;
        self.ids.insert(feature.name.clone(), id);
        self.contents.features.push(feature);
        id
    }

    pub fn root(mut self, name: &str) -> Self {
        let feature = Feature::new(self.version_id, name, FeatureKind::Mandatory);
        self.push_feature(feature);
        self
    }

    pub fn feature(mut self, name: &str, kind: FeatureKind, parent: &str) -> Self {
        if let Some(parent_id) = self.lookup(parent) {
            let feature = Feature::new(self.version_id, name, kind).with_parent(parent_id);
            self.push_feature(feature);
        }
        self
    }

    pub fn mandatory(self, name: &str, parent: &str) -> Self {
        self.feature(name, FeatureKind::Mandatory, parent)
    }

    pub fn optional(self, name: &str, parent: &str) -> Self {
        self.feature(name, FeatureKind::Optional, parent)
    }

    fn group(mut self, mut group: FeatureGroup, members: &[&str]) -> Self {
        group.version_id = self.version_id;
        let group_id = group.id;
        let parent_id = group.parent_feature_id;
        self.contents.groups.push(group);
        for member in members {
            let feature = Feature::new(self.version_id, *member, FeatureKind::Optional)
                .with_parent(parent_id)
                .in_group(group_id);
            self.push_feature(feature);
        }
        self
    }

    /// Exactly-one group of fresh optional members under `parent`.
    pub fn xor(mut self, parent: &str, members: &[&str]) -> Self {
        match self.lookup(parent) {
            Some(parent_id) => {
                let group = FeatureGroup::xor(self.version_id, parent_id);
                self.group(group, members)
            }
            None => self,
        }
    }

    /// At-least-one group of fresh optional members under `parent`.
    pub fn or(self, parent: &str, members: &[&str]) -> Self {
        self.or_bounded(parent, members, 1, None)
    }

    pub fn or_bounded(mut self, parent: &str, members: &[&str], min: u32, max: Option<u32>) -> Self {
        match self.lookup(parent) {
            Some(parent_id) => {
                let group =
                    FeatureGroup::or(self.version_id, parent_id).with_cardinality(min, max);
                self.group(group, members)
            }
            None => self,
        }
    }

    pub fn relation(mut self, kind: RelationKind, source: &str, target: &str) -> Self {
        let source_id = self.lookup(source);
        let target_id = self.lookup(target);
        if let (Some(source_id), Some(target_id)) = (source_id, target_id) {
            self.contents.relations.push(FeatureRelation::new(
                self.version_id,
                kind,
                source_id,
                target_id,
            ));
        }
        self
    }

    pub fn requires(self, source: &str, target: &str) -> Self {
        self.relation(RelationKind::Requires, source, target)
    }

    pub fn excludes(self, source: &str, target: &str) -> Self {
        self.relation(RelationKind::Excludes, source, target)
    }

    /// Textual constraint; parsed later, against the final feature set.
    pub fn constraint(mut self, text: &str) -> Self {
        self.contents
            .constraints
            .push(Constraint::new(self.version_id, text));
        self
    }

    pub fn build(self) -> Result<VersionContents, FeatureModelError> {
        if let Some(name) = self.unknown.first() {
            return Err(FeatureModelError::UnknownFeature(name.clone()));
        }
        Ok(self.contents)
    }
}

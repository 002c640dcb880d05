//! Staged two-pass cloning of a version's rows.
//!
//! Pass one assigns a fresh id to every active row and records the old→new
//! mapping per entity kind. Pass two copies the rows and rewrites every
//! internal reference through the completed maps. Nothing is written to the
//! store here; the caller commits the staged rows in one step.

use featmodel_kernel::{
    Constraint, Feature, FeatureGroup, FeatureLiteral, FeatureRelation, VersionContents,
    VersionStateFault,
};
use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Old-id → new-id maps of one clone, per entity kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IdMap {
    pub features: BTreeMap<Uuid, Uuid>,
    pub groups: BTreeMap<Uuid, Uuid>,
    pub relations: BTreeMap<Uuid, Uuid>,
    pub constraints: BTreeMap<Uuid, Uuid>,
}

impl IdMap {
    pub fn feature(&self, old: Uuid) -> Option<Uuid> {
        self.features.get(&old).copied()
    }

    pub fn group(&self, old: Uuid) -> Option<Uuid> {
        self.groups.get(&old).copied()
    }

    pub fn relation(&self, old: Uuid) -> Option<Uuid> {
        self.relations.get(&old).copied()
    }

    pub fn constraint(&self, old: Uuid) -> Option<Uuid> {
        self.constraints.get(&old).copied()
    }

    pub fn len(&self) -> usize {
        self.features.len() + self.groups.len() + self.relations.len() + self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn fresh_ids(ids: impl Iterator<Item = Uuid>) -> BTreeMap<Uuid, Uuid> {
    ids.map(|old| (old, Uuid::new_v4())).collect()
}

fn remap(
    map: &BTreeMap<Uuid, Uuid>,
    kind: &'static str,
    row: Uuid,
    target: Uuid,
) -> Result<Uuid, VersionStateFault> {
    map.get(&target)
        .copied()
        .ok_or(VersionStateFault::UnresolvedReference {
            kind,
            id: row,
            target,
        })
}

/// Clone the active rows of `source` into `version_id`.
pub fn stage_clone(
    source: &VersionContents,
    version_id: Uuid,
) -> Result<(VersionContents, IdMap), VersionStateFault> {
    let map = IdMap {
        features: fresh_ids(source.active_features().map(|f| f.id)),
        groups: fresh_ids(source.active_groups().map(|g| g.id)),
        relations: fresh_ids(source.active_relations().map(|r| r.id)),
        constraints: fresh_ids(source.active_constraints().map(|c| c.id)),
    };

    let mut staged = VersionContents::default();

    for feature in source.active_features() {
        let parent_id = feature
            .parent_id
            .map(|parent| remap(&map.features, "feature", feature.id, parent))
            .transpose()?;
        let group_id = feature
            .group_id
            .map(|group| remap(&map.groups, "feature", feature.id, group))
            .transpose()?;
        staged.features.push(Feature {
            id: map.features[&feature.id],
            parent_id,
            group_id,
            version_id,
            ..feature.clone()
        });
    }

    for group in source.active_groups() {
        staged.groups.push(FeatureGroup {
            id: map.groups[&group.id],
            parent_feature_id: remap(&map.features, "group", group.id, group.parent_feature_id)?,
            version_id,
            ..group.clone()
        });
    }

    for relation in source.active_relations() {
        staged.relations.push(FeatureRelation {
            id: map.relations[&relation.id],
            source_id: remap(&map.features, "relation", relation.id, relation.source_id)?,
            target_id: remap(&map.features, "relation", relation.id, relation.target_id)?,
            version_id,
            ..relation.clone()
        });
    }

    for constraint in source.active_constraints() {
        let expr_cnf = match &constraint.expr_cnf {
            Some(clauses) => Some(
                clauses
                    .iter()
                    .map(|clause| {
                        clause
                            .iter()
                            .map(|literal| {
                                Ok(FeatureLiteral {
                                    feature_id: remap(
                                        &map.features,
                                        "constraint",
                                        constraint.id,
                                        literal.feature_id,
                                    )?,
                                    negated: literal.negated,
                                })
                            })
                            .collect::<Result<Vec<_>, VersionStateFault>>()
                    })
                    .collect::<Result<Vec<_>, VersionStateFault>>()?,
            ),
            None => None,
        };
        staged.constraints.push(Constraint {
            id: map.constraints[&constraint.id],
            expr_cnf,
            version_id,
            ..constraint.clone()
        });
    }

    tracing::debug!(
        %version_id,
        features = staged.features.len(),
        groups = staged.groups.len(),
        relations = staged.relations.len(),
        constraints = staged.constraints.len(),
        "staged clone"
    );
    Ok((staged, map))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use featmodel_kernel::ModelBuilder;

    fn sample() -> VersionContents {
        ModelBuilder::new()
            .root("Car")
            .mandatory("Engine", "Car")
            .xor("Engine", &["Petrol", "Electric"])
            .optional("Radio", "Car")
            .requires("Radio", "Electric")
            .constraint("Radio EXCLUDES Petrol")
            .build()
            .expect("model")
    }

    #[test]
    fn clone_rewrites_every_reference() {
        let source = sample();
        let version_id = Uuid::new_v4();
        let (staged, map) = stage_clone(&source, version_id).expect("clone");

        assert_eq!(staged.features.len(), source.features.len());
        assert_eq!(map.len(), 5 + 1 + 1 + 1);
        let ids: Vec<Uuid> = staged.features.iter().map(|f| f.id).collect();
        for feature in &staged.features {
            assert_eq!(feature.version_id, version_id);
            assert!(!source.features.iter().any(|f| f.id == feature.id));
            if let Some(parent) = feature.parent_id {
                assert!(ids.contains(&parent));
            }
            if let Some(group) = feature.group_id {
                assert!(staged.group(group).is_some());
            }
        }
        let relation = &staged.relations[0];
        assert_eq!(
            Some(relation.source_id),
            map.feature(source.relations[0].source_id)
        );
        assert!(ids.contains(&relation.target_id));
        assert_eq!(
            Some(staged.groups[0].parent_feature_id),
            map.feature(source.groups[0].parent_feature_id)
        );
    }

    #[test]
    fn soft_deleted_rows_are_not_cloned() {
        let mut source = sample();
        let radio = source
            .features
            .iter_mut()
            .find(|f| f.name == "Radio")
            .expect("radio");
        radio.audit.soft_delete("bob", Utc::now());
        let radio_id = radio.id;
        source.relations[0].audit.soft_delete("bob", Utc::now());
        source.constraints[0].audit.soft_delete("bob", Utc::now());

        let (staged, map) = stage_clone(&source, Uuid::new_v4()).expect("clone");
        assert_eq!(staged.features.len(), 4);
        assert!(map.feature(radio_id).is_none());
        assert!(staged.relations.is_empty());
        assert!(staged.constraints.is_empty());
    }

    #[test]
    fn precompiled_cnf_is_remapped() {
        let mut source = sample();
        let radio = source.feature_by_name("Radio").expect("radio").id;
        let petrol = source.feature_by_name("Petrol").expect("petrol").id;
        source.constraints[0].expr_cnf =
            Some(vec![vec![FeatureLiteral::neg(radio), FeatureLiteral::neg(petrol)]]);

        let (staged, map) = stage_clone(&source, Uuid::new_v4()).expect("clone");
        let clause = &staged.constraints[0].expr_cnf.as_ref().expect("cnf kept")[0];
        assert_eq!(clause[0], FeatureLiteral::neg(map.feature(radio).expect("mapped")));
        assert_eq!(clause[1], FeatureLiteral::neg(map.feature(petrol).expect("mapped")));
    }

    #[test]
    fn dangling_reference_fails_the_whole_clone() {
        let mut source = sample();
        let ghost = Uuid::new_v4();
        source.relations[0].target_id = ghost;
        let relation_id = source.relations[0].id;

        let err = stage_clone(&source, Uuid::new_v4()).expect_err("ghost target");
        assert_eq!(
            err,
            VersionStateFault::UnresolvedReference {
                kind: "relation",
                id: relation_id,
                target: ghost,
            }
        );
    }

    #[test]
    fn reference_to_soft_deleted_parent_is_unresolved() {
        let mut source = sample();
        let engine = source
            .features
            .iter_mut()
            .find(|f| f.name == "Engine")
            .expect("engine");
        engine.audit.soft_delete("bob", Utc::now());
        let err =
            stage_clone(&source, Uuid::new_v4()).expect_err("children point at a deleted row");
        assert!(matches!(err, VersionStateFault::UnresolvedReference { .. }));
    }
}

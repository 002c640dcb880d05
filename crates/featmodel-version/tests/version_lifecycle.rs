use featmodel_kernel::{
    FeatureKind, FeatureModel, FeatureModelError, FeatureModelVersion, GroupKind, LogicalFault,
    ModelBuilder, ModelDocument, RelationKind, StructuralFault, VersionState, VersionStateFault,
};
use featmodel_version::{
    ConstraintUpdate, FeatureUpdate, GroupUpdate, NewConstraint, NewFeature, NewGroup,
    VersionManager, VersionStore, verify_snapshot,
};
use uuid::Uuid;

const ACTOR: &str = "alice";

fn car_document() -> ModelDocument {
    let contents = ModelBuilder::new()
        .root("Car")
        .mandatory("Engine", "Car")
        .xor("Engine", &["Petrol", "Electric"])
        .optional("Radio", "Car")
        .requires("Radio", "Electric")
        .constraint("Radio EXCLUDES Petrol")
        .build()
        .expect("model");
    ModelDocument::new(FeatureModel::new("Car"), contents)
}

fn seeded() -> (VersionManager, FeatureModelVersion) {
    let mut manager = VersionManager::new(VersionStore::new());
    let version = manager
        .import_document(&car_document(), ACTOR)
        .expect("import");
    (manager, version)
}

fn feature_id(manager: &VersionManager, version: Uuid, name: &str) -> Uuid {
    manager
        .contents(version)
        .expect("contents")
        .feature_by_name(name)
        .unwrap_or_else(|| panic!("feature {name} missing"))
        .id
}

#[test]
fn first_version_is_built_edit_by_edit() {
    let mut manager = VersionManager::new(VersionStore::new());
    let model_id = manager.register_model(FeatureModel::new("Phone"));
    let v1 = manager
        .create_initial_version(model_id, ACTOR)
        .expect("initial");
    assert_eq!(v1.version_number, 1);
    assert_eq!(v1.state, VersionState::Draft);

    let v2 = manager
        .add_feature(v1.id, NewFeature::root("Phone"), ACTOR)
        .expect("root");
    let root = v2.entity_id;
    let v3 = manager
        .add_feature(
            v2.version.id,
            NewFeature::child("Screen", FeatureKind::Mandatory, root),
            ACTOR,
        )
        .expect("screen");
    // The edit input names the parent by its id in the source version.
    let root_in_v3 = v3.id_map.feature(root).expect("root carried over");
    let v4 = manager
        .add_feature(
            v3.version.id,
            NewFeature::child("Camera", FeatureKind::Optional, root_in_v3),
            ACTOR,
        )
        .expect("camera");

    assert_eq!(v4.version.version_number, 4);
    assert!(manager.contents(v1.id).expect("v1").features.is_empty());
    assert_eq!(manager.contents(v3.version.id).expect("v3").features.len(), 2);
    let v4_contents = manager.contents(v4.version.id).expect("v4");
    assert_eq!(v4_contents.features.len(), 3);
    let camera = v4_contents.feature(v4.entity_id).expect("camera row");
    assert_eq!(camera.audit.created_by.as_deref(), Some(ACTOR));
    assert!(v4_contents.features.iter().all(|f| f.version_id == v4.version.id));

    let published = manager.publish(v4.version.id).expect("publish");
    assert_eq!(published.state, VersionState::Published);
}

#[test]
fn clone_keeps_feature_count_and_closed_references() {
    let (mut manager, v1) = seeded();
    let v2 = manager.create_version(v1.id, "bob").expect("clone");
    assert_eq!(v2.version_number, 2);
    assert_eq!(v2.created_by, "bob");

    let source = manager.contents(v1.id).expect("v1");
    let clone = manager.contents(v2.id).expect("v2");
    assert_eq!(clone.features.len(), source.feature_count());
    assert_eq!(clone.groups.len(), 1);
    for feature in &clone.features {
        if let Some(parent) = feature.parent_id {
            assert!(clone.feature(parent).is_some());
        }
        if let Some(group) = feature.group_id {
            assert!(clone.group(group).is_some());
        }
        assert!(source.feature(feature.id).is_none());
    }
    for relation in &clone.relations {
        assert!(clone.feature(relation.source_id).is_some());
        assert!(clone.feature(relation.target_id).is_some());
    }
}

#[test]
fn publish_writes_a_verifiable_snapshot_once() {
    let (mut manager, v1) = seeded();
    let published = manager.publish(v1.id).expect("publish");
    let snapshot = published.snapshot.as_ref().expect("snapshot written");
    assert!(published.published_at.is_some());
    assert_eq!(snapshot.version_number, 1);
    assert_eq!(snapshot.feature_model.name, "Car");
    assert_eq!(snapshot.mapping.int_to_uuid.len(), 5);
    assert_eq!(snapshot.metadata.total_constraints, 1);
    assert!(verify_snapshot(snapshot).expect("digest"));

    let again = manager.publish(v1.id).expect_err("already published");
    assert_eq!(
        again,
        FeatureModelError::VersionState(VersionStateFault::InvalidVersionTransition {
            current: VersionState::Published,
            required: VersionState::Draft,
            operation: "publish version".to_string(),
        })
    );

    // Edits on a published version land in a new draft.
    let radio = feature_id(&manager, v1.id, "Radio");
    let edit = manager
        .update_feature(
            v1.id,
            radio,
            FeatureUpdate {
                name: Some("Stereo".to_string()),
                ..FeatureUpdate::default()
            },
            ACTOR,
        )
        .expect("rename");
    assert_eq!(edit.version.state, VersionState::Draft);
    assert!(manager.contents(v1.id).expect("v1").feature_by_name("Radio").is_some());
    assert_eq!(
        manager.version(v1.id).expect("v1").snapshot.as_ref(),
        Some(snapshot)
    );

    let renamed = manager.contents(edit.version.id).expect("draft");
    assert_eq!(renamed.constraints[0].expr_text, "!(Stereo & Petrol)");
    manager
        .publish(edit.version.id)
        .expect("renamed draft still publishes");
}

#[test]
fn rename_keeps_constraints_resolvable_for_later_edits() {
    let (mut manager, v1) = seeded();
    let radio = feature_id(&manager, v1.id, "Radio");
    let renamed = manager
        .update_feature(
            v1.id,
            radio,
            FeatureUpdate {
                name: Some("Sound System".to_string()),
                ..FeatureUpdate::default()
            },
            ACTOR,
        )
        .expect("rename");
    let draft = manager.contents(renamed.version.id).expect("draft");
    assert_eq!(draft.constraints[0].expr_text, "!(Sound System & Petrol)");

    // The cascade still finds the constraint through the new name.
    let deleted = manager
        .delete_feature(renamed.version.id, renamed.entity_id, ACTOR)
        .expect("delete");
    let active = manager.contents(deleted.version.id).expect("contents");
    assert!(active.constraints.is_empty());
    assert!(active.relations.is_empty());
    manager.publish(deleted.version.id).expect("publishable");
}

#[test]
fn failed_publish_leaves_the_draft_untouched() {
    let mut manager = VersionManager::new(VersionStore::new());
    let contents = ModelBuilder::new()
        .root("A")
        .root("B")
        .build()
        .expect("model");
    let doc = ModelDocument::new(FeatureModel::new("Twin"), contents);
    let draft = manager.import_document(&doc, ACTOR).expect("import");

    let err = manager.publish(draft.id).expect_err("two roots");
    assert_eq!(
        err,
        FeatureModelError::Structural(StructuralFault::MultipleRootFeatures { count: 2 })
    );
    let after = manager.version(draft.id).expect("still there");
    assert_eq!(after, &draft);
    assert!(after.snapshot.is_none());
}

#[test]
fn unsatisfiable_draft_names_the_conflicting_rule() {
    let mut manager = VersionManager::new(VersionStore::new());
    let contents = ModelBuilder::new()
        .root("R")
        .mandatory("A", "R")
        .mandatory("B", "R")
        .constraint("A EXCLUDES B")
        .build()
        .expect("model");
    let draft = manager
        .import_document(&ModelDocument::new(FeatureModel::new("M"), contents), ACTOR)
        .expect("import");

    let err = manager.publish(draft.id).expect_err("unsat");
    assert!(matches!(
        err,
        FeatureModelError::Logical(LogicalFault::ConflictingConstraints { ref first, .. })
            if first.contains("A EXCLUDES B")
    ));
    assert_eq!(
        manager.version(draft.id).expect("draft").state,
        VersionState::Draft
    );
}

#[test]
fn lifecycle_transitions_are_forward_only() {
    let (mut manager, v1) = seeded();
    let err = manager.archive(v1.id).expect_err("draft cannot be archived");
    assert!(matches!(
        err,
        FeatureModelError::VersionState(VersionStateFault::InvalidVersionTransition {
            current: VersionState::Draft,
            required: VersionState::Published,
            ..
        })
    ));
    assert!(manager.restore(v1.id).is_err());

    manager.publish(v1.id).expect("publish");
    let archived = manager.archive(v1.id).expect("archive");
    assert_eq!(archived.state, VersionState::Archived);
    assert!(manager.publish(v1.id).is_err());
    assert!(manager.discard_draft(v1.id).is_err());

    let restored = manager.restore(v1.id).expect("restore");
    assert_eq!(restored.state, VersionState::Published);
    assert!(restored.snapshot.is_some());
}

#[test]
fn version_numbers_are_never_reused() {
    let (mut manager, v1) = seeded();
    let model_id = v1.model_id;
    let v2 = manager.create_version(v1.id, ACTOR).expect("v2");
    let v3 = manager.create_version(v1.id, ACTOR).expect("v3");
    manager.discard_draft(v3.id).expect("discard");
    manager.discard_draft(v2.id).expect("discard");

    let v4 = manager.create_version(v1.id, ACTOR).expect("v4");
    assert_eq!(v4.version_number, 4);
    let numbers: Vec<u32> = manager
        .versions(model_id)
        .iter()
        .map(|v| v.version_number)
        .collect();
    assert_eq!(numbers, vec![1, 4]);

    let err = manager
        .version_by_number(model_id, 2)
        .expect_err("discarded");
    assert!(matches!(
        err,
        FeatureModelError::VersionState(VersionStateFault::VersionNotFound(_))
    ));
    assert!(manager.version(v2.id).is_err());
}

#[test]
fn latest_version_honours_state_filter() {
    let (mut manager, v1) = seeded();
    let model_id = v1.model_id;
    manager.publish(v1.id).expect("publish");
    let v2 = manager.create_version(v1.id, ACTOR).expect("v2");

    assert_eq!(manager.latest_version(model_id, None).map(|v| v.id), Some(v2.id));
    assert_eq!(
        manager
            .latest_version(model_id, Some(VersionState::Published))
            .map(|v| v.id),
        Some(v1.id)
    );
    assert!(
        manager
            .latest_version(model_id, Some(VersionState::Archived))
            .is_none()
    );
    assert!(manager.latest_version(Uuid::new_v4(), None).is_none());
}

#[test]
fn deleting_a_feature_cascades_and_stays_publishable() {
    let (mut manager, v1) = seeded();
    let engine = feature_id(&manager, v1.id, "Engine");
    let outcome = manager
        .delete_feature(v1.id, engine, "bob")
        .expect("delete");

    let store = manager.store();
    let raw = &store.get(outcome.version.id).expect("stored").contents;
    let deleted = raw
        .features
        .iter()
        .find(|f| f.id == outcome.entity_id)
        .expect("row kept");
    assert!(!deleted.is_active());
    assert!(deleted.audit.deleted_at.is_some());
    assert_eq!(deleted.audit.updated_by.as_deref(), Some("bob"));

    let active = manager.contents(outcome.version.id).expect("contents");
    let names: Vec<&str> = active.features.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["Car", "Radio"]);
    assert!(active.groups.is_empty());
    assert!(active.relations.is_empty());
    assert!(active.constraints.is_empty());

    // The source version is unchanged.
    assert_eq!(manager.contents(v1.id).expect("v1").features.len(), 5);
    manager.publish(outcome.version.id).expect("cascade keeps the draft valid");
}

#[test]
fn group_edits() {
    let (mut manager, v1) = seeded();
    let group = manager.contents(v1.id).expect("v1").groups[0].id;

    let widened = manager
        .update_group(
            v1.id,
            group,
            GroupUpdate {
                kind: Some(GroupKind::Or),
                ..GroupUpdate::default()
            },
            ACTOR,
        )
        .expect("xor to or");
    let contents = manager.contents(widened.version.id).expect("contents");
    let row = contents.group(widened.entity_id).expect("group");
    assert_eq!((row.kind, row.min_cardinality, row.max_cardinality), (GroupKind::Or, 1, None));

    let bad = manager.update_group(
        v1.id,
        group,
        GroupUpdate {
            min_cardinality: Some(2),
            ..GroupUpdate::default()
        },
        ACTOR,
    );
    assert!(matches!(
        bad,
        Err(FeatureModelError::VersionState(VersionStateFault::InvalidEdit(_)))
    ));

    let dropped = manager.delete_group(v1.id, group, ACTOR).expect("delete group");
    let contents = manager.contents(dropped.version.id).expect("contents");
    assert!(contents.groups.is_empty());
    assert!(contents.features.iter().all(|f| f.group_id.is_none()));
    assert_eq!(contents.features.len(), 5);
}

#[test]
fn new_group_requires_children_of_its_parent() {
    let (mut manager, v1) = seeded();
    let car = feature_id(&manager, v1.id, "Car");
    let radio = feature_id(&manager, v1.id, "Radio");
    let petrol = feature_id(&manager, v1.id, "Petrol");

    let added = manager
        .add_group(v1.id, NewGroup::or(car, &[radio]), ACTOR)
        .expect("or group over radio");
    let contents = manager.contents(added.version.id).expect("contents");
    assert_eq!(contents.group_members(added.entity_id).count(), 1);

    let err = manager
        .add_group(v1.id, NewGroup::or(car, &[petrol]), ACTOR)
        .expect_err("petrol is a grandchild");
    assert!(matches!(
        err,
        FeatureModelError::VersionState(VersionStateFault::InvalidEdit(ref msg))
            if msg.contains("Petrol")
    ));
}

#[test]
fn relation_edits_are_checked() {
    let (mut manager, v1) = seeded();
    let radio = feature_id(&manager, v1.id, "Radio");
    let electric = feature_id(&manager, v1.id, "Electric");
    let petrol = feature_id(&manager, v1.id, "Petrol");
    let before = manager.store().len();

    let self_loop = manager.add_relation(v1.id, RelationKind::Excludes, radio, radio, ACTOR);
    assert!(matches!(
        self_loop,
        Err(FeatureModelError::Structural(StructuralFault::SelfRelation { ref feature }))
            if feature == "Radio"
    ));
    let duplicate = manager.add_relation(v1.id, RelationKind::Requires, radio, electric, ACTOR);
    assert!(matches!(
        duplicate,
        Err(FeatureModelError::Structural(StructuralFault::DuplicateRelation { .. }))
    ));
    let foreign = manager.add_relation(v1.id, RelationKind::Requires, radio, Uuid::new_v4(), ACTOR);
    assert!(matches!(
        foreign,
        Err(FeatureModelError::Structural(StructuralFault::InvalidRelation { .. }))
    ));
    assert_eq!(manager.store().len(), before);

    let added = manager
        .add_relation(v1.id, RelationKind::Excludes, petrol, radio, ACTOR)
        .expect("excludes");
    let relation_in_v1 = manager.contents(v1.id).expect("v1").relations[0].id;
    let removed = manager
        .delete_relation(
            added.version.id,
            added.id_map.relation(relation_in_v1).expect("mapped"),
            ACTOR,
        )
        .expect("delete");
    let contents = manager.contents(removed.version.id).expect("contents");
    assert_eq!(contents.relations.len(), 1);
    assert_eq!(contents.relations[0].kind, RelationKind::Excludes);
}

#[test]
fn constraint_edits_parse_against_the_version() {
    let (mut manager, v1) = seeded();
    let number_before = manager.store().next_version_number(v1.model_id);

    let err = manager
        .add_constraint(v1.id, NewConstraint::new("Radio REQUIRES Turbo"), ACTOR)
        .expect_err("unknown feature");
    assert!(matches!(
        err,
        FeatureModelError::Logical(LogicalFault::InvalidConstraintExpression { .. })
    ));
    assert_eq!(manager.store().next_version_number(v1.model_id), number_before);

    let added = manager
        .add_constraint(
            v1.id,
            NewConstraint::new("Radio => Engine").named("radio needs engine"),
            ACTOR,
        )
        .expect("add");
    let contents = manager.contents(added.version.id).expect("contents");
    let row = contents
        .active_constraints()
        .find(|c| c.id == added.entity_id)
        .expect("row");
    assert_eq!(row.label(), "radio needs engine");

    let changed = manager
        .update_constraint(
            added.version.id,
            added.entity_id,
            ConstraintUpdate {
                expression: Some("Radio => Electric".to_string()),
                name: Some(None),
            },
            ACTOR,
        )
        .expect("update");
    let contents = manager.contents(changed.version.id).expect("contents");
    let row = contents
        .active_constraints()
        .find(|c| c.id == changed.entity_id)
        .expect("row");
    assert_eq!(row.label(), "Radio => Electric");

    let dropped = manager
        .delete_constraint(changed.version.id, changed.entity_id, ACTOR)
        .expect("delete");
    assert_eq!(
        manager
            .contents(dropped.version.id)
            .expect("contents")
            .constraints
            .len(),
        1
    );
}

#[test]
fn feature_updates_reject_cycles() {
    let (mut manager, v1) = seeded();
    let engine = feature_id(&manager, v1.id, "Engine");
    let petrol = feature_id(&manager, v1.id, "Petrol");

    let own_parent = manager.update_feature(
        v1.id,
        engine,
        FeatureUpdate {
            parent_id: Some(Some(engine)),
            ..FeatureUpdate::default()
        },
        ACTOR,
    );
    assert!(matches!(
        own_parent,
        Err(FeatureModelError::VersionState(VersionStateFault::InvalidEdit(_)))
    ));

    let under_child = manager.update_feature(
        v1.id,
        engine,
        FeatureUpdate {
            parent_id: Some(Some(petrol)),
            ..FeatureUpdate::default()
        },
        ACTOR,
    );
    assert!(matches!(
        under_child,
        Err(FeatureModelError::VersionState(VersionStateFault::InvalidEdit(ref msg)))
            if msg.contains("cycle")
    ));

    let missing = manager.delete_feature(v1.id, Uuid::new_v4(), ACTOR);
    assert!(matches!(
        missing,
        Err(FeatureModelError::VersionState(VersionStateFault::EntityNotFound {
            kind: "feature",
            ..
        }))
    ));
}

#[test]
fn moving_a_feature_drops_its_group_membership() {
    let (mut manager, v1) = seeded();
    let car = feature_id(&manager, v1.id, "Car");
    let petrol = feature_id(&manager, v1.id, "Petrol");

    let moved = manager
        .update_feature(
            v1.id,
            petrol,
            FeatureUpdate {
                parent_id: Some(Some(car)),
                ..FeatureUpdate::default()
            },
            ACTOR,
        )
        .expect("move");
    let contents = manager.contents(moved.version.id).expect("contents");
    let row = contents.feature(moved.entity_id).expect("petrol");
    assert_eq!(row.parent_id, moved.id_map.feature(car));
    assert!(row.group_id.is_none());
}

#[test]
fn document_of_a_version_round_trips_through_import() {
    let (mut manager, v1) = seeded();
    let doc = manager.document(v1.id).expect("document");
    assert_eq!(doc.version_id, Some(v1.id));
    assert_eq!(doc.contents.features.len(), 5);

    let reimported = manager.import_document(&doc, ACTOR).expect("import");
    assert_eq!(reimported.model_id, v1.model_id);
    assert_eq!(reimported.version_number, 2);
}

//! Integration tests: run the validator over fixture models.
//!
//! Each fixture in tests/fixtures/ has:
//! - case.json: a model document plus configurations to check (by name)
//! - expect.json: the expected verdicts, counts and diagnoses
//!
//! Feature references in the expectations are names, so a fixture reads
//! the way a modeller would state it.

use featmodel_kernel::{FeatureModelError, ModelDocument, VersionContents};
use featmodel_logic::{FeatureRef, LogicalValidator};
use serde_json::{Value, json};
use std::path::PathBuf;
use uuid::Uuid;

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn read_json(path: &PathBuf) -> Value {
    let raw = std::fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("failed to read {}: {e}", path.display()));
    serde_json::from_str(&raw).unwrap_or_else(|e| panic!("failed to parse {}: {e}", path.display()))
}

fn ids_for(contents: &VersionContents, names: &Value) -> Vec<Uuid> {
    names
        .as_array()
        .expect("configuration must be an array of names")
        .iter()
        .map(|name| {
            let name = name.as_str().expect("feature name must be a string");
            contents
                .feature_by_name(name)
                .unwrap_or_else(|| panic!("unknown feature in fixture: {name}"))
                .id
        })
        .collect()
}

fn names(refs: &[FeatureRef]) -> Vec<&str> {
    refs.iter().map(|f| f.name.as_str()).collect()
}

fn run_fixture(name: &str) {
    let dir = fixtures_dir().join(name);
    let case = read_json(&dir.join("case.json"));
    let expected = read_json(&dir.join("expect.json"));

    let doc = ModelDocument::from_json_str(&case["document"].to_string())
        .unwrap_or_else(|e| panic!("fixture {name} has an invalid document: {e}"));
    let validator = LogicalValidator::new(&doc.contents);

    let model = validator.validate_feature_model();
    let conflict = match validator.find_conflicting_constraints() {
        Ok(()) => Value::Null,
        Err(err) => json!({"class": err.class(), "message": err.to_string()}),
    };
    let variability = match validator.analyze_variability() {
        Ok(report) => json!({
            "core": names(&report.core),
            "dead": names(&report.dead),
            "false_optional": names(&report.false_optional),
        }),
        Err(_) => Value::Null,
    };
    let count = validator
        .count_configurations()
        .expect("fixture encodes")
        .map(|c| c as u64);

    let configurations: Vec<Value> = case["configurations"]
        .as_array()
        .map(|list| list.as_slice())
        .unwrap_or_default()
        .iter()
        .map(|names| {
            let ids = ids_for(&doc.contents, names);
            match validator.validate_configuration(&ids) {
                Ok(_) => json!({"valid": true, "reason": null}),
                Err(FeatureModelError::Configuration(fault)) => {
                    json!({"valid": false, "reason": fault.reason()})
                }
                Err(other) => panic!("fixture {name}: unexpected fault {other}"),
            }
        })
        .collect();

    let result = json!({
        "is_valid": model.is_ok(),
        "fault_class": model.as_ref().err().map(|e| e.class()),
        "conflict": conflict,
        "count": count,
        "variability": variability,
        "configurations": configurations,
    });

    assert_eq!(
        result,
        expected,
        "\n\nFixture: {name}\n\nGot:\n{}\n\nExpected:\n{}\n",
        serde_json::to_string_pretty(&result).expect("result serializes"),
        serde_json::to_string_pretty(&expected).expect("expectation serializes"),
    );
}

#[test]
fn car_with_alternative_transmissions() {
    run_fixture("car_alternatives");
}

#[test]
fn excludes_between_mandatory_features() {
    run_fixture("unsat_excludes");
}

#[test]
fn bounded_or_group_cardinality() {
    run_fixture("bounded_or_group");
}

#[test]
fn dead_and_false_optional_features() {
    run_fixture("dead_features");
}

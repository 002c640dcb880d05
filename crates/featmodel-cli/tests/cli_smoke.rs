use serde_json::Value;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

struct TempDirGuard {
    path: PathBuf,
}

impl TempDirGuard {
    fn new(prefix: &str) -> Self {
        let unique = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be after unix epoch")
            .as_nanos();
        let path = std::env::temp_dir().join(format!(
            "fmctl-{prefix}-{}-{unique}",
            std::process::id()
        ));
        fs::create_dir_all(&path).expect("temp dir should be created");
        Self { path }
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempDirGuard {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

const CAR_MODEL: &str = r#"{
  "model": {"id": "00000000-0000-0000-0000-0000000000aa", "name": "Car"},
  "features": [
    {"id": "00000000-0000-0000-0000-000000000001", "name": "Car", "kind": "MANDATORY"},
    {"id": "00000000-0000-0000-0000-000000000002", "name": "Engine", "kind": "MANDATORY",
     "parent_id": "00000000-0000-0000-0000-000000000001"},
    {"id": "00000000-0000-0000-0000-000000000003", "name": "Petrol", "kind": "OPTIONAL",
     "parent_id": "00000000-0000-0000-0000-000000000002",
     "group_id": "00000000-0000-0000-0000-0000000000b1"},
    {"id": "00000000-0000-0000-0000-000000000004", "name": "Electric", "kind": "OPTIONAL",
     "parent_id": "00000000-0000-0000-0000-000000000002",
     "group_id": "00000000-0000-0000-0000-0000000000b1"},
    {"id": "00000000-0000-0000-0000-000000000005", "name": "Radio", "kind": "OPTIONAL",
     "parent_id": "00000000-0000-0000-0000-000000000001"}
  ],
  "groups": [
    {"id": "00000000-0000-0000-0000-0000000000b1", "kind": "XOR",
     "parent_feature_id": "00000000-0000-0000-0000-000000000002"}
  ],
  "constraints": [
    {"id": "00000000-0000-0000-0000-0000000000c1", "expr_text": "Radio REQUIRES Electric"}
  ]
}"#;

const CONTRADICTION: &str = r#"{
  "model": {"id": "00000000-0000-0000-0000-0000000000ab", "name": "Broken"},
  "features": [
    {"id": "00000000-0000-0000-0000-000000000011", "name": "Root", "kind": "MANDATORY"},
    {"id": "00000000-0000-0000-0000-000000000012", "name": "A", "kind": "MANDATORY",
     "parent_id": "00000000-0000-0000-0000-000000000011"},
    {"id": "00000000-0000-0000-0000-000000000013", "name": "B", "kind": "MANDATORY",
     "parent_id": "00000000-0000-0000-0000-000000000011"}
  ],
  "constraints": [
    {"id": "00000000-0000-0000-0000-0000000000c2", "expr_text": "A EXCLUDES B"}
  ]
}"#;

fn write_model(dir: &TempDirGuard, name: &str, raw: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, raw).expect("model should be written");
    path
}

fn run_fmctl<I, S>(args: I) -> Output
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let bin = env!("CARGO_BIN_EXE_fmctl");
    Command::new(bin)
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("fmctl command should execute")
}

fn assert_success(output: &Output) {
    if !output.status.success() {
        panic!(
            "command failed with status {:?}\nstdout:\n{}\nstderr:\n{}",
            output.status.code(),
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr),
        );
    }
}

fn assert_exit_code(output: &Output, expected: i32) {
    if output.status.code() != Some(expected) {
        panic!(
            "expected exit code {expected}, got {:?}\nstdout:\n{}\nstderr:\n{}",
            output.status.code(),
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr),
        );
    }
}

fn parse_json_stdout(output: &Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("stdout should be valid JSON")
}

fn names(value: &Value) -> Vec<String> {
    value
        .as_array()
        .expect("array")
        .iter()
        .map(|v| v.as_str().expect("name").to_string())
        .collect()
}

#[test]
fn validate_reports_satisfiable_model() {
    let tmp = TempDirGuard::new("validate");
    let model = write_model(&tmp, "car.json", CAR_MODEL);

    let output = run_fmctl([
        OsStr::new("validate"),
        model.as_os_str(),
        OsStr::new("--json"),
    ]);
    assert_success(&output);
    let payload = parse_json_stdout(&output);
    assert_eq!(payload["valid"], true);
    assert_eq!(payload["model"], "Car");
    assert_eq!(payload["feature_count"], 5);
    assert!(names(&payload["witness"]).contains(&"Engine".to_string()));
}

#[test]
fn validate_names_the_conflicting_constraint() {
    let tmp = TempDirGuard::new("validate-unsat");
    let model = write_model(&tmp, "broken.json", CONTRADICTION);

    let output = run_fmctl([
        OsStr::new("validate"),
        model.as_os_str(),
        OsStr::new("--json"),
    ]);
    assert_exit_code(&output, 1);
    let payload = parse_json_stdout(&output);
    assert_eq!(payload["valid"], false);
    let message = payload["message"].as_str().expect("message");
    assert!(message.contains("A EXCLUDES B"), "message: {message}");
}

#[test]
fn missing_model_file_exits_with_input_error() {
    let tmp = TempDirGuard::new("missing");
    let model = tmp.path().join("absent.json");

    let output = run_fmctl([OsStr::new("validate"), model.as_os_str()]);
    assert_exit_code(&output, 2);
    assert!(String::from_utf8_lossy(&output.stderr).contains("error:"));
}

#[test]
fn check_config_accepts_and_rejects_selections() {
    let tmp = TempDirGuard::new("check-config");
    let model = write_model(&tmp, "car.json", CAR_MODEL);

    let accepted = run_fmctl([
        OsStr::new("check-config"),
        model.as_os_str(),
        OsStr::new("--select"),
        OsStr::new("Car,Engine,Electric,Radio"),
        OsStr::new("--json"),
    ]);
    assert_success(&accepted);
    let payload = parse_json_stdout(&accepted);
    assert_eq!(payload["valid"], true);
    assert_eq!(names(&payload["selected"]).len(), 4);

    let rejected = run_fmctl([
        OsStr::new("check-config"),
        model.as_os_str(),
        OsStr::new("--select"),
        OsStr::new("Car,Engine,Petrol,Radio"),
        OsStr::new("--json"),
    ]);
    assert_exit_code(&rejected, 1);
    let payload = parse_json_stdout(&rejected);
    assert_eq!(payload["valid"], false);
    assert_eq!(payload["class"], "configuration.invalid");

    let unknown = run_fmctl([
        OsStr::new("check-config"),
        model.as_os_str(),
        OsStr::new("--select"),
        OsStr::new("Car,Turbo"),
    ]);
    assert_exit_code(&unknown, 2);
}

#[test]
fn export_dimacs_writes_legend_and_header() {
    let tmp = TempDirGuard::new("export");
    let model = write_model(&tmp, "car.json", CAR_MODEL);
    let target = tmp.path().join("car.dimacs");

    let output = run_fmctl([
        OsStr::new("export"),
        model.as_os_str(),
        OsStr::new("--format"),
        OsStr::new("dimacs"),
        OsStr::new("--output"),
        target.as_os_str(),
    ]);
    assert_success(&output);
    let text = fs::read_to_string(&target).expect("export should be written");
    assert!(text.contains("c 1 Car"));
    assert!(text.lines().any(|line| line.starts_with("p cnf 5 ")));

    let unsupported = run_fmctl([
        OsStr::new("export"),
        model.as_os_str(),
        OsStr::new("--format"),
        OsStr::new("pdf"),
    ]);
    assert_exit_code(&unsupported, 2);
}

#[test]
fn generate_greedy_selects_root_and_mandatory_children() {
    let tmp = TempDirGuard::new("generate");
    let model = write_model(&tmp, "car.json", CAR_MODEL);

    let output = run_fmctl([
        OsStr::new("generate"),
        model.as_os_str(),
        OsStr::new("--json"),
    ]);
    assert_success(&output);
    let payload = parse_json_stdout(&output);
    assert_eq!(payload["produced"], 1);
    let selected = names(&payload["configurations"][0]["selected"]);
    assert!(selected.contains(&"Car".to_string()));
    assert!(selected.contains(&"Engine".to_string()));
    let engines = selected
        .iter()
        .filter(|name| *name == "Petrol" || *name == "Electric")
        .count();
    assert_eq!(engines, 1);
}

#[test]
fn impact_counts_dependents() {
    let tmp = TempDirGuard::new("impact");
    let model = write_model(&tmp, "car.json", CAR_MODEL);

    let output = run_fmctl([
        OsStr::new("impact"),
        model.as_os_str(),
        OsStr::new("Engine"),
        OsStr::new("--json"),
    ]);
    assert_success(&output);
    let payload = parse_json_stdout(&output);
    assert_eq!(payload["name"], "Engine");
    assert_eq!(payload["direct_dependents"], 2);
    assert_eq!(payload["transitive_dependents"], 2);
}

#[test]
fn analyze_rejects_unknown_analysis_kind() {
    let tmp = TempDirGuard::new("analyze");
    let model = write_model(&tmp, "car.json", CAR_MODEL);

    let output = run_fmctl([
        OsStr::new("analyze"),
        model.as_os_str(),
        OsStr::new("--kind"),
        OsStr::new("complexity-metrics"),
        OsStr::new("--json"),
    ]);
    assert_success(&output);
    let payload = parse_json_stdout(&output);
    assert_eq!(payload["results"].as_array().map(Vec::len), Some(1));
    assert_eq!(payload["metrics"]["total_features"], 5);

    let unknown = run_fmctl([
        OsStr::new("analyze"),
        model.as_os_str(),
        OsStr::new("--kind"),
        OsStr::new("astrology"),
    ]);
    assert_exit_code(&unknown, 2);
}

#[test]
fn publish_persists_store_and_numbers_versions() {
    let tmp = TempDirGuard::new("publish");
    let model = write_model(&tmp, "car.json", CAR_MODEL);
    let store = tmp.path().join("store.json");

    let first = run_fmctl([
        OsStr::new("publish"),
        model.as_os_str(),
        OsStr::new("--store"),
        store.as_os_str(),
        OsStr::new("--json"),
    ]);
    assert_success(&first);
    let payload = parse_json_stdout(&first);
    assert_eq!(payload["version_number"], 1);
    assert_eq!(payload["state"], "published");
    let digest = payload["content_digest"].as_str().expect("digest").to_string();
    assert_eq!(digest.len(), 64);
    assert!(store.exists());

    let second = run_fmctl([
        OsStr::new("publish"),
        model.as_os_str(),
        OsStr::new("--store"),
        store.as_os_str(),
        OsStr::new("--json"),
    ]);
    assert_success(&second);
    let payload = parse_json_stdout(&second);
    assert_eq!(payload["version_number"], 2);
    // Each import gets fresh ids, so the mapping and its digest differ.
    assert_ne!(payload["content_digest"], digest.as_str());
}

#[test]
fn invalid_engine_config_exits_with_input_error() {
    let tmp = TempDirGuard::new("config");
    let model = write_model(&tmp, "car.json", CAR_MODEL);
    let config = tmp.path().join("engine.toml");
    fs::write(&config, "[generation]\nleaf_probability = 3.5\n").expect("config written");

    let output = run_fmctl([
        OsStr::new("validate"),
        model.as_os_str(),
        OsStr::new("--config"),
        config.as_os_str(),
    ]);
    assert_exit_code(&output, 2);
    assert!(String::from_utf8_lossy(&output.stderr).contains("invalid engine config"));
}

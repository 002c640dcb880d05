use featmodel_kernel::{EngineConfig, FeatureModelError, ModelDocument, VersionContents};
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

/// The model or selection was checked and rejected.
pub const EXIT_REJECTED: i32 = 1;
/// Input could not be read or parsed.
pub const EXIT_INPUT: i32 = 2;

pub fn exit_with(code: i32, message: impl std::fmt::Display) -> ! {
    eprintln!("error: {message}");
    std::process::exit(code);
}

pub fn load_document_or_exit(path: &str) -> ModelDocument {
    ModelDocument::load(path).unwrap_or_else(|e| exit_with(EXIT_INPUT, e))
}

pub fn load_config_or_exit(path: Option<&str>) -> EngineConfig {
    match path {
        Some(path) => EngineConfig::load(path).unwrap_or_else(|e| exit_with(EXIT_INPUT, e)),
        None => EngineConfig::default(),
    }
}

/// Resolve a feature by id or by name among the active rows.
pub fn resolve_feature_or_exit(contents: &VersionContents, raw: &str) -> Uuid {
    let found = match Uuid::parse_str(raw.trim()) {
        Ok(id) => contents.feature(id),
        Err(_) => contents.feature_by_name(raw.trim()),
    };
    match found {
        Some(feature) => feature.id,
        None => exit_with(EXIT_INPUT, format!("unknown feature: {raw}")),
    }
}

pub fn feature_name(contents: &VersionContents, id: Uuid) -> String {
    contents
        .feature(id)
        .map(|f| f.name.clone())
        .unwrap_or_else(|| id.to_string())
}

fn render_json(payload: &impl Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(payload).map_err(|e| format!("failed to serialize output: {e}"))
}

pub fn print_json(payload: &impl Serialize) {
    let text = render_json(payload).unwrap_or_else(|e| exit_with(EXIT_INPUT, e));
    println!("{text}");
}

/// Report a rejected verdict and exit with [`EXIT_REJECTED`].
pub fn reject(err: &FeatureModelError, json_output: bool) -> ! {
    if json_output {
        print_json(&json!({
            "valid": false,
            "class": err.class(),
            "message": err.to_string(),
        }));
    }
    exit_with(EXIT_REJECTED, err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn unserializable_output_is_an_error_not_a_panic() {
        let payload: BTreeMap<(u32, u32), u32> = BTreeMap::from([((1, 2), 3)]);
        let err = render_json(&payload).expect_err("tuple keys are not json object keys");
        assert!(err.starts_with("failed to serialize output"));
    }

    #[test]
    fn renders_pretty_json() {
        let text = render_json(&json!({ "valid": true })).expect("json");
        assert_eq!(text, "{\n  \"valid\": true\n}");
    }
}

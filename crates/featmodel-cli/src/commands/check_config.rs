use crate::support::{
    feature_name, load_document_or_exit, print_json, reject, resolve_feature_or_exit,
};
use featmodel_kernel::EngineConfig;
use featmodel_logic::LogicalValidator;
use serde_json::json;
use uuid::Uuid;

pub fn run(model: String, select: Vec<String>, config: &EngineConfig, json_output: bool) {
    let doc = load_document_or_exit(&model);
    let active = doc.contents.active();
    let selected: Vec<Uuid> = select
        .iter()
        .filter(|raw| !raw.trim().is_empty())
        .map(|raw| resolve_feature_or_exit(&active, raw))
        .collect();

    let verdict = LogicalValidator::new(&active)
        .with_config(config.validation.clone())
        .validate_configuration(&selected)
        .unwrap_or_else(|e| reject(&e, json_output));

    let names: Vec<String> = verdict
        .selected
        .iter()
        .map(|id| feature_name(&active, *id))
        .collect();
    if json_output {
        print_json(&json!({
            "valid": verdict.is_valid,
            "selected": names,
            "checked_clauses": verdict.checked_clauses,
        }));
    } else {
        println!("fmctl check-config {model}");
        println!("  Selected: {}", names.join(", "));
        println!("  Checked clauses: {}", verdict.checked_clauses);
        println!("  Valid: {}", if verdict.is_valid { "yes" } else { "no" });
    }
}

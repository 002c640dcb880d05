use crate::support::{feature_name, load_document_or_exit, print_json, reject};
use featmodel_analysis::{CycleScope, StructuralAnalyzer};
use featmodel_kernel::{EngineConfig, FeatureModelError, LogicalFault, StructuralFault};
use featmodel_logic::LogicalValidator;
use serde_json::json;

fn structural_gate(analyzer: &StructuralAnalyzer<'_>) -> Result<(), StructuralFault> {
    analyzer.detect_cycles(CycleScope::Hierarchy)?;
    analyzer.validate_tree_structure()?;
    analyzer.validate_integrity()
}

pub fn run(model: String, config: &EngineConfig, json_output: bool) {
    let doc = load_document_or_exit(&model);
    let active = doc.contents.active();

    let analyzer = StructuralAnalyzer::new(&active).with_config(config.analysis.clone());
    if let Err(fault) = structural_gate(&analyzer) {
        reject(&FeatureModelError::from(fault), json_output);
    }

    let validator = LogicalValidator::new(&active).with_config(config.validation.clone());
    let verdict = match validator.validate_feature_model() {
        Ok(verdict) => verdict,
        Err(FeatureModelError::Logical(LogicalFault::UnsatisfiableModel { detail })) => {
            let err = match validator.find_conflicting_constraints() {
                Err(conflict) => conflict,
                Ok(()) => LogicalFault::UnsatisfiableModel { detail }.into(),
            };
            reject(&err, json_output)
        }
        Err(err) => reject(&err, json_output),
    };

    let selected: Vec<String> = verdict
        .selected
        .iter()
        .map(|id| feature_name(&active, *id))
        .collect();

    if json_output {
        print_json(&json!({
            "valid": verdict.is_valid,
            "model": doc.model.name,
            "version_number": doc.version_number,
            "feature_count": active.features.len(),
            "engine": verdict.engine.as_str(),
            "variables": verdict.variables,
            "clauses": verdict.clauses,
            "witness": selected,
            "warnings": verdict.warnings,
        }));
    } else {
        println!("fmctl validate {model}");
        println!("  Model: {} (v{})", doc.model.name, doc.version_number);
        println!("  Features: {}", active.features.len());
        println!("  Valid: {}", if verdict.is_valid { "yes" } else { "no" });
        println!(
            "  Engine: {} ({} variables, {} clauses)",
            verdict.engine.as_str(),
            verdict.variables,
            verdict.clauses
        );
        println!("  Witness: {}", selected.join(", "));
        for warning in &verdict.warnings {
            println!("  Warning: {warning}");
        }
    }
}

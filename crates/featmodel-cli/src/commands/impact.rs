use crate::support::{load_document_or_exit, print_json, reject, resolve_feature_or_exit};
use featmodel_analysis::StructuralAnalyzer;
use featmodel_kernel::EngineConfig;

pub fn run(model: String, feature: String, config: &EngineConfig, json_output: bool) {
    let doc = load_document_or_exit(&model);
    let active = doc.contents.active();
    let feature_id = resolve_feature_or_exit(&active, &feature);

    let impact = StructuralAnalyzer::new(&active)
        .with_config(config.analysis.clone())
        .calculate_feature_impact(feature_id, config.impact)
        .unwrap_or_else(|e| reject(&e, json_output));

    if json_output {
        print_json(&impact);
    } else {
        println!("fmctl impact {} {}", model, impact.name);
        println!("  Depth: {}", impact.depth);
        println!("  Direct dependents: {}", impact.direct_dependents);
        println!("  Transitive dependents: {}", impact.transitive_dependents);
        println!("  Constraints mentioning it: {}", impact.constraints_count);
        println!("  Impact score: {}", impact.impact_score);
    }
}

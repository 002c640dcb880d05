use crate::support::{EXIT_INPUT, exit_with, load_document_or_exit, print_json, reject};
use featmodel_analysis::{AnalysisKind, StructuralAnalyzer};
use featmodel_kernel::EngineConfig;
use featmodel_logic::{FeatureRef, LogicalValidator};
use serde_json::json;

fn parse_kinds_or_exit(kinds: &[String]) -> Vec<AnalysisKind> {
    if kinds.is_empty() {
        return AnalysisKind::ALL.to_vec();
    }
    kinds
        .iter()
        .map(|raw| {
            AnalysisKind::parse(raw)
                .unwrap_or_else(|| exit_with(EXIT_INPUT, format!("unknown analysis: {raw}")))
        })
        .collect()
}

fn names(features: &[FeatureRef]) -> String {
    if features.is_empty() {
        return "-".to_string();
    }
    features
        .iter()
        .map(|f| f.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn run(
    model: String,
    kinds: Vec<String>,
    variability: bool,
    config: &EngineConfig,
    json_output: bool,
) {
    let kinds = parse_kinds_or_exit(&kinds);
    let doc = load_document_or_exit(&model);
    let active = doc.contents.active();

    let analyzer = StructuralAnalyzer::new(&active).with_config(config.analysis.clone());
    let results = analyzer.analyze(&kinds);
    let metrics = analyzer.complexity_metrics();

    let logical = if variability {
        let validator = LogicalValidator::new(&active).with_config(config.validation.clone());
        let report = validator
            .analyze_variability()
            .unwrap_or_else(|e| reject(&e, json_output));
        let count = validator
            .count_configurations()
            .unwrap_or_else(|e| reject(&e, json_output));
        Some((report, count))
    } else {
        None
    };

    if json_output {
        let mut payload = json!({
            "model": doc.model.name,
            "version_number": doc.version_number,
            "metrics": metrics,
            "results": results,
        });
        if let Some((report, count)) = &logical {
            payload["variability"] = json!(report);
            // Counts can exceed u64; keep them exact as strings.
            payload["configuration_count"] = json!(count.map(|n| n.to_string()));
        }
        print_json(&payload);
        return;
    }

    println!("fmctl analyze {model}");
    println!(
        "  Features: {} ({} leaves), depth {}",
        metrics.total_features, metrics.leaf_features, metrics.max_depth
    );
    println!(
        "  Constraints: {} (density {:.2})",
        metrics.total_constraints, metrics.constraint_density
    );
    for result in &results {
        println!("  {}: {} issue(s)", result.kind.as_str(), result.issues.len());
        for issue in &result.issues {
            println!(
                "    - [{}] {}: {}",
                issue.severity.as_str(),
                issue.kind,
                issue.description
            );
            if let Some(recommendation) = &issue.recommendation {
                println!("      {recommendation}");
            }
        }
    }
    if let Some((report, count)) = &logical {
        println!("  Core: {}", names(&report.core));
        println!("  Dead: {}", names(&report.dead));
        println!("  False optional: {}", names(&report.false_optional));
        match count {
            Some(n) => println!("  Configurations: {n}"),
            None => println!("  Configurations: not counted (model too large for the BDD)"),
        }
    }
}

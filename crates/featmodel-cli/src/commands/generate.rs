use crate::support::{
    EXIT_INPUT, EXIT_REJECTED, exit_with, feature_name, load_document_or_exit, print_json,
    resolve_feature_or_exit,
};
use featmodel_analysis::{
    ConfigurationGenerator, GenerationOptions, GenerationResult, GenerationStrategy,
};
use featmodel_kernel::{EngineConfig, VersionContents};
use serde_json::json;
use std::collections::BTreeMap;

pub struct Args {
    pub model: String,
    pub strategy: String,
    pub seed: Option<u64>,
    pub count: usize,
    pub diverse: bool,
    pub require: Vec<String>,
    pub exclude: Vec<String>,
    pub json: bool,
}

fn describe(contents: &VersionContents, result: &GenerationResult) -> serde_json::Value {
    let selected: Vec<String> = result
        .selected
        .iter()
        .map(|id| feature_name(contents, *id))
        .collect();
    json!({
        "success": result.success,
        "strategy": result.strategy,
        "degraded_to": result.degraded_to,
        "selected": selected,
        "score": result.score,
        "iterations": result.iterations,
        "errors": result.errors,
    })
}

pub fn run(args: Args, config: &EngineConfig) {
    let strategy = GenerationStrategy::parse(&args.strategy).unwrap_or_else(|| {
        exit_with(EXIT_INPUT, format!("unknown strategy: {}", args.strategy))
    });
    if args.count == 0 {
        exit_with(EXIT_INPUT, "--count must be at least 1");
    }
    let doc = load_document_or_exit(&args.model);
    let active = doc.contents.active();

    let mut partial = BTreeMap::new();
    for raw in args.require.iter().filter(|r| !r.trim().is_empty()) {
        partial.insert(resolve_feature_or_exit(&active, raw), true);
    }
    for raw in args.exclude.iter().filter(|r| !r.trim().is_empty()) {
        let id = resolve_feature_or_exit(&active, raw);
        if partial.insert(id, false) == Some(true) {
            exit_with(EXIT_INPUT, format!("{raw} is both required and excluded"));
        }
    }

    let generator = ConfigurationGenerator::new(&active).with_config(config.generation.clone());
    let results = if args.count == 1 {
        vec![generator.generate(&GenerationOptions {
            strategy,
            partial,
            max_iterations: None,
            seed: args.seed,
        })]
    } else {
        if !partial.is_empty() {
            exit_with(
                EXIT_INPUT,
                "--require/--exclude apply to a single configuration only",
            );
        }
        generator.generate_multiple(args.count, args.diverse, args.seed)
    };
    let produced = results.iter().filter(|r| r.success).count();

    if args.json {
        let described: Vec<_> = results.iter().map(|r| describe(&active, r)).collect();
        print_json(&json!({
            "requested": args.count,
            "produced": produced,
            "configurations": described,
        }));
    } else {
        println!("fmctl generate {} --strategy {}", args.model, strategy.as_str());
        for (index, result) in results.iter().enumerate() {
            let names: Vec<String> = result
                .selected
                .iter()
                .map(|id| feature_name(&active, *id))
                .collect();
            println!(
                "  [{}] {} score={:.2} iterations={}",
                index + 1,
                if result.success { "ok" } else { "failed" },
                result.score,
                result.iterations
            );
            if let Some(degraded) = result.degraded_to {
                println!("      ran as {}", degraded.as_str());
            }
            println!("      {}", names.join(", "));
            for error in &result.errors {
                println!("      error: {error}");
            }
        }
    }

    if produced == 0 {
        exit_with(EXIT_REJECTED, "no valid configuration was generated");
    }
}

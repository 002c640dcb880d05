use crate::support::{EXIT_INPUT, exit_with, load_document_or_exit, print_json, reject};
use featmodel_kernel::EngineConfig;
use featmodel_version::{VersionManager, VersionStore};
use serde_json::json;
use std::path::Path;

fn load_store_or_exit(path: Option<&str>) -> VersionStore {
    match path {
        Some(path) if Path::new(path).exists() => {
            VersionStore::load(path).unwrap_or_else(|e| exit_with(EXIT_INPUT, e))
        }
        _ => VersionStore::new(),
    }
}

fn save_store_or_exit(manager: &VersionManager, path: Option<&str>) {
    if let Some(path) = path {
        manager
            .store()
            .save(path)
            .unwrap_or_else(|e| exit_with(EXIT_INPUT, e));
    }
}

pub fn run(
    model: String,
    store: Option<String>,
    actor: String,
    config: &EngineConfig,
    json_output: bool,
) {
    let doc = load_document_or_exit(&model);
    let mut manager = VersionManager::new(load_store_or_exit(store.as_deref()))
        .with_config(config.clone());

    let draft = manager
        .import_document(&doc, &actor)
        .unwrap_or_else(|e| reject(&e, json_output));
    let published = manager.publish(draft.id);
    // A rejected draft is kept so it can be fixed and published later.
    save_store_or_exit(&manager, store.as_deref());
    let version = published.unwrap_or_else(|e| reject(&e, json_output));

    let digest = version
        .snapshot
        .as_ref()
        .map(|s| s.content_digest.clone())
        .unwrap_or_default();
    if json_output {
        print_json(&json!({
            "model_id": version.model_id,
            "version_id": version.id,
            "version_number": version.version_number,
            "state": version.state.to_string(),
            "published_at": version.published_at,
            "content_digest": digest,
            "statistics": version.snapshot.as_ref().map(|s| &s.statistics),
        }));
    } else {
        println!("fmctl publish {model}");
        println!("  Model: {} ({})", doc.model.name, version.model_id);
        println!("  Version: {} [{}]", version.version_number, version.state);
        println!("  Digest: {digest}");
        if let Some(path) = &store {
            println!("  Store: {path}");
        }
    }
}

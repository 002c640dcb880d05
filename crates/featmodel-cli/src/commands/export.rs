use crate::support::{EXIT_INPUT, EXIT_REJECTED, exit_with, load_document_or_exit};
use featmodel_export::{ExportFormat, export_document};
use std::fs;

pub fn run(model: String, format: String, output: Option<String>) {
    let format: ExportFormat = format.parse().unwrap_or_else(|e| exit_with(EXIT_INPUT, e));
    let doc = load_document_or_exit(&model);
    let mut text = export_document(&doc, format).unwrap_or_else(|e| {
        exit_with(EXIT_REJECTED, format!("{} ({})", e, e.class()))
    });
    if !text.ends_with('\n') {
        text.push('\n');
    }

    match output {
        Some(path) => {
            fs::write(&path, &text)
                .unwrap_or_else(|e| exit_with(EXIT_INPUT, format!("failed to write {path}: {e}")));
            tracing::info!(%path, format = format.as_str(), bytes = text.len(), "export written");
        }
        None => print!("{text}"),
    }
}

//! # featmodel-export
//!
//! Writes one feature-model version in the formats product-line tooling
//! reads. An [`ExportSession`] fixes the feature ↔ variable mapping for the
//! call, so every format numbers features the same way.
//!
//! | Format | Notes |
//! |---|---|
//! | FeatureIDE XML | `and`/`alt`/`or` decomposition, `<rule>` constraints |
//! | SPLOT XML | SXFM tree, constraints as CNF clauses |
//! | TVL | nested `group` blocks, rules in the root body |
//! | DIMACS | hierarchy and relations only |
//! | JSON | nested tree; [`import_json`] reads it back |
//! | UVL | `features` / `constraints` sections |
//! | DOT, Mermaid | diagrams |

pub mod diagram;
pub mod dimacs;
pub mod error;
pub mod format;
pub mod json;
pub mod session;
pub mod text;
pub mod xml;

pub use dimacs::DimacsCnf;
pub use error::ExportError;
pub use format::ExportFormat;
pub use json::{JsonModel, import_json};
pub use session::ExportSession;

use featmodel_kernel::ModelDocument;

/// Export a loaded document in one call.
pub fn export_document(doc: &ModelDocument, format: ExportFormat) -> Result<String, ExportError> {
    ExportSession::from_document(doc).export(format)
}

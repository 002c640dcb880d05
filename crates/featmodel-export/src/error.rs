//! Export failures.

use thiserror::Error;

pub const FAULT_CLASS_UNSUPPORTED_FORMAT: &str = "export.unsupported_format";
pub const FAULT_CLASS_XML: &str = "export.xml";
pub const FAULT_CLASS_JSON: &str = "export.json";
pub const FAULT_CLASS_IMPORT: &str = "export.import";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("unsupported export format: {0}")]
    UnsupportedExportFormat(String),

    #[error("xml write failed: {0}")]
    Xml(String),

    #[error("json encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    /// The JSON document parsed but cannot be turned back into rows.
    #[error("cannot import model: {0}")]
    Import(String),
}

impl ExportError {
    pub fn xml(err: impl std::fmt::Display) -> Self {
        Self::Xml(err.to_string())
    }

    pub fn class(&self) -> &'static str {
        match self {
            Self::UnsupportedExportFormat(_) => FAULT_CLASS_UNSUPPORTED_FORMAT,
            Self::Xml(_) => FAULT_CLASS_XML,
            Self::Json(_) => FAULT_CLASS_JSON,
            Self::Import(_) => FAULT_CLASS_IMPORT,
        }
    }
}

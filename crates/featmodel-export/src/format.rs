use crate::error::ExportError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Every supported output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    /// FeatureIDE `model.xml`.
    #[serde(rename = "xml")]
    FeatureIde,
    /// SPLOT / SXFM.
    SplotXml,
    Tvl,
    Dimacs,
    Json,
    Uvl,
    Dot,
    Mermaid,
}

impl ExportFormat {
    pub const ALL: [Self; 8] = [
        Self::FeatureIde,
        Self::SplotXml,
        Self::Tvl,
        Self::Dimacs,
        Self::Json,
        Self::Uvl,
        Self::Dot,
        Self::Mermaid,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FeatureIde => "xml",
            Self::SplotXml => "splot_xml",
            Self::Tvl => "tvl",
            Self::Dimacs => "dimacs",
            Self::Json => "json",
            Self::Uvl => "uvl",
            Self::Dot => "dot",
            Self::Mermaid => "mermaid",
        }
    }

    pub fn file_extension(&self) -> &'static str {
        match self {
            Self::FeatureIde | Self::SplotXml => "xml",
            Self::Tvl => "tvl",
            Self::Dimacs => "dimacs",
            Self::Json => "json",
            Self::Uvl => "uvl",
            Self::Dot => "dot",
            Self::Mermaid => "mmd",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let tag = raw.trim().to_ascii_lowercase().replace('-', "_");
        let format = match tag.as_str() {
            "xml" | "featureide" | "featureide_xml" => Self::FeatureIde,
            "splot" | "splot_xml" | "sxfm" => Self::SplotXml,
            "tvl" => Self::Tvl,
            "dimacs" | "cnf" => Self::Dimacs,
            "json" => Self::Json,
            "uvl" => Self::Uvl,
            "dot" | "graphviz" => Self::Dot,
            "mermaid" | "mmd" => Self::Mermaid,
            _ => return Err(ExportError::UnsupportedExportFormat(raw.to_string())),
        };
        Ok(format)
    }
}

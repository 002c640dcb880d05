//! Graphviz DOT and Mermaid flowcharts.

use crate::session::ExportSession;
use featmodel_kernel::{FeatureKind, RelationKind};

fn dot_escape(label: &str) -> String {
    label.replace('\\', "\\\\").replace('"', "\\\"")
}

fn mermaid_escape(label: &str) -> String {
    label.replace('"', "#quot;")
}

pub fn dot(session: &ExportSession<'_>) -> String {
    let mut lines = vec![
        "digraph FeatureModel {".to_string(),
        "  rankdir=TB;".to_string(),
        "  node [shape=box, style=rounded];".to_string(),
        format!("  label=\"{}\";", dot_escape(&session.model().name)),
        "  labelloc=t;".to_string(),
        String::new(),
    ];
    let walk = session.walk();

    for feature in &walk {
        let Some(var) = session.var(feature.id) else {
            continue;
        };
        let style = match feature.kind {
            FeatureKind::Mandatory => "fillcolor=lightblue, style=\"rounded,filled\"",
            FeatureKind::Optional => "fillcolor=white, style=\"rounded,filled,dashed\"",
        };
        lines.push(format!(
            "  f{var} [label=\"{}\", {style}];",
            dot_escape(&feature.name)
        ));
    }
    lines.push(String::new());

    for feature in &walk {
        let parent = feature.parent_id.and_then(|p| session.var(p));
        if let (Some(parent), Some(child)) = (parent, session.var(feature.id)) {
            lines.push(format!("  f{parent} -> f{child};"));
        }
    }
    for relation in session.contents().active_relations() {
        let (Some(source), Some(target)) = (session.var(relation.source_id), session.var(relation.target_id))
        else {
            continue;
        };
        let attrs = match relation.kind {
            RelationKind::Requires => "style=dashed, color=green, label=\"requires\"",
            RelationKind::Excludes => "style=dashed, color=red, label=\"excludes\", dir=none",
        };
        lines.push(format!("  f{source} -> f{target} [{attrs}];"));
    }

    lines.push("}".to_string());
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

pub fn mermaid(session: &ExportSession<'_>) -> String {
    let mut lines = vec!["graph TD".to_string()];
    let walk = session.walk();
    let mut mandatory = Vec::new();
    let mut optional = Vec::new();

    for feature in &walk {
        let Some(var) = session.var(feature.id) else {
            continue;
        };
        let label = mermaid_escape(&feature.name);
        match feature.kind {
            FeatureKind::Mandatory => {
                lines.push(format!("  f{var}[\"{label}\"]"));
                mandatory.push(format!("f{var}"));
            }
            FeatureKind::Optional => {
                lines.push(format!("  f{var}(\"{label}\")"));
                optional.push(format!("f{var}"));
            }
        }
    }
    lines.push(String::new());

    for feature in &walk {
        let parent = feature.parent_id.and_then(|p| session.var(p));
        let (Some(parent), Some(child)) = (parent, session.var(feature.id)) else {
            continue;
        };
        let arrow = match feature.kind {
            FeatureKind::Mandatory => "-->",
            FeatureKind::Optional => "-.->",
        };
        lines.push(format!("  f{parent} {arrow} f{child}"));
    }
    for relation in session.contents().active_relations() {
        let (Some(source), Some(target)) = (session.var(relation.source_id), session.var(relation.target_id))
        else {
            continue;
        };
        let arrow = match relation.kind {
            RelationKind::Requires => "==>|requires|",
            RelationKind::Excludes => "-.->|excludes|",
        };
        lines.push(format!("  f{source} {arrow} f{target}"));
    }

    lines.push(String::new());
    lines.push("  classDef mandatory fill:#e1f5ff,stroke:#01579b,stroke-width:2px".to_string());
    lines.push(
        "  classDef optional fill:#fff,stroke:#666,stroke-width:2px,stroke-dasharray: 5 5"
            .to_string(),
    );
    if !mandatory.is_empty() {
        lines.push(format!("  class {} mandatory", mandatory.join(",")));
    }
    if !optional.is_empty() {
        lines.push(format!("  class {} optional", optional.join(",")));
    }
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

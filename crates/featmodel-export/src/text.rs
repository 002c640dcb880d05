//! Textual variability languages: UVL and TVL.

use crate::session::{ExportSession, Rule};
use featmodel_kernel::expr::normalize_name;
use featmodel_kernel::{Feature, FeatureGroup, FeatureKind, GroupKind, Operators};

const INDENT: &str = "    ";

const TVL_OPERATORS: Operators = Operators {
    not: "!",
    and: " && ",
    or: " || ",
    implies: " -> ",
    iff: " <-> ",
};

fn indent(depth: usize) -> String {
    INDENT.repeat(depth)
}

/// Rendered cross-tree rules; unparsable text comes back as `Err`.
fn rendered_rules(session: &ExportSession<'_>, ops: &Operators) -> Vec<Result<String, String>> {
    let name = |id| normalize_name(&session.name(id));
    session
        .rules()
        .into_iter()
        .map(|rule| match rule {
            Rule::Parsed(expr) => Ok(expr.render(ops, &name)),
            Rule::Opaque(text) => Err(text),
        })
        .collect()
}

fn uvl_group_keyword(group: &FeatureGroup) -> String {
    match (group.kind, group.min_cardinality, group.max_cardinality) {
        (GroupKind::Xor, _, _) => "alternative".to_string(),
        (GroupKind::Or, 1, None) => "or".to_string(),
        (GroupKind::Or, min, Some(max)) => format!("[{min}..{max}]"),
        (GroupKind::Or, min, None) => format!("[{min}..*]"),
    }
}

fn uvl_feature(session: &ExportSession<'_>, lines: &mut Vec<String>, feature: &Feature, depth: usize) {
    lines.push(format!("{}{}", indent(depth), normalize_name(&feature.name)));
    let layout = session.layout(feature.id);
    let (mandatory, optional): (Vec<&Feature>, Vec<&Feature>) = layout
        .ungrouped
        .iter()
        .copied()
        .partition(|child| child.kind == FeatureKind::Mandatory);

    let mut sections: Vec<(String, Vec<&Feature>)> = Vec::new();
    if !mandatory.is_empty() {
        sections.push(("mandatory".to_string(), mandatory));
    }
    if !optional.is_empty() {
        sections.push(("optional".to_string(), optional));
    }
    for (group, members) in layout.groups {
        sections.push((uvl_group_keyword(group), members));
    }

    for (keyword, children) in sections {
        lines.push(format!("{}{keyword}", indent(depth + 1)));
        for child in children {
            uvl_feature(session, lines, child, depth + 2);
        }
    }
}

/// Universal Variability Language.
pub fn uvl(session: &ExportSession<'_>) -> String {
    let mut lines = vec![
        format!("namespace {}", normalize_name(&session.model().name)),
        String::new(),
        "features".to_string(),
    ];
    if let Some(root) = session.root() {
        uvl_feature(session, &mut lines, root, 1);
    }

    let rules = rendered_rules(session, &Operators::SYMBOLIC);
    if !rules.is_empty() {
        lines.push(String::new());
        lines.push("constraints".to_string());
        for rule in rules {
            match rule {
                Ok(expr) => lines.push(format!("{INDENT}{expr}")),
                Err(text) => lines.push(format!("{INDENT}// unparsed: {text}")),
            }
        }
    }
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

enum TvlChild<'a> {
    Feature { feature: &'a Feature, optional: bool },
    /// Stand-in parent for a group that cannot be the feature's only decomposition.
    Group { name: String, group: &'a FeatureGroup, members: Vec<&'a Feature> },
}

fn tvl_cardinality(group: &FeatureGroup) -> String {
    match (group.kind, group.min_cardinality, group.max_cardinality) {
        (GroupKind::Xor, _, _) => "oneOf".to_string(),
        (GroupKind::Or, 1, None) => "someOf".to_string(),
        (GroupKind::Or, min, Some(max)) => format!("[{min}..{max}]"),
        (GroupKind::Or, min, None) => format!("[{min}..*]"),
    }
}

fn tvl_group(
    session: &ExportSession<'_>,
    lines: &mut Vec<String>,
    cardinality: &str,
    children: Vec<TvlChild<'_>>,
    depth: usize,
) {
    lines.push(format!("{}group {cardinality} {{", indent(depth)));
    let last = children.len().saturating_sub(1);
    for (i, child) in children.into_iter().enumerate() {
        let comma = if i < last { "," } else { "" };
        match child {
            TvlChild::Feature { feature, optional } => {
                let prefix = if optional { "opt " } else { "" };
                tvl_feature(session, lines, feature, prefix, &[], depth + 1, comma);
            }
            TvlChild::Group { name, group, members } => {
                lines.push(format!("{}{name} {{", indent(depth + 1)));
                let members = members
                    .into_iter()
                    .map(|feature| TvlChild::Feature { feature, optional: false })
                    .collect();
                tvl_group(session, lines, &tvl_cardinality(group), members, depth + 2);
                lines.push(format!("{}}}{comma}", indent(depth + 1)));
            }
        }
    }
    lines.push(format!("{}}}", indent(depth)));
}

fn tvl_feature(
    session: &ExportSession<'_>,
    lines: &mut Vec<String>,
    feature: &Feature,
    prefix: &str,
    body: &[String],
    depth: usize,
    comma: &str,
) {
    let name = normalize_name(&feature.name);
    let mut layout = session.layout(feature.id);
    if layout.is_empty() && body.is_empty() {
        lines.push(format!("{}{prefix}{name}{comma}", indent(depth)));
        return;
    }
    lines.push(format!("{}{prefix}{name} {{", indent(depth)));
    if layout.ungrouped.is_empty() && layout.groups.len() == 1 {
        if let Some((group, members)) = layout.groups.pop() {
            let members = members
                .into_iter()
                .map(|feature| TvlChild::Feature { feature, optional: false })
                .collect();
            tvl_group(session, lines, &tvl_cardinality(group), members, depth + 1);
        }
    } else if !layout.is_empty() {
        let mut children: Vec<TvlChild<'_>> = layout
            .ungrouped
            .iter()
            .copied()
            .map(|child| TvlChild::Feature {
                feature: child,
                optional: child.kind == FeatureKind::Optional,
            })
            .collect();
        for (n, (group, members)) in layout.groups.into_iter().enumerate() {
            children.push(TvlChild::Group {
                name: format!("{name}_group{}", n + 1),
                group,
                members,
            });
        }
        tvl_group(session, lines, "allOf", children, depth + 1);
    }
    for line in body {
        lines.push(format!("{}{line}", indent(depth + 1)));
    }
    lines.push(format!("{}}}{comma}", indent(depth)));
}

/// Textual Variability Language. Cross-tree rules sit in the root's body.
pub fn tvl(session: &ExportSession<'_>) -> String {
    let body: Vec<String> = rendered_rules(session, &TVL_OPERATORS)
        .into_iter()
        .map(|rule| match rule {
            Ok(expr) => format!("{expr};"),
            Err(text) => format!("// unparsed: {text}"),
        })
        .collect();
    let mut lines = Vec::new();
    match session.root() {
        Some(root) => tvl_feature(session, &mut lines, root, "root ", &body, 0, ""),
        None => lines.push("// empty feature model".to_string()),
    }
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

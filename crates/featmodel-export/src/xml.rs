//! XML encoders: FeatureIDE `model.xml` and SPLOT (SXFM).

use crate::error::ExportError;
use crate::session::{ExportSession, Rule};
use featmodel_kernel::{Expr, Feature, FeatureGroup, FeatureKind, GroupKind};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use std::io::Cursor;
use uuid::Uuid;

type XmlWriter = Writer<Cursor<Vec<u8>>>;

fn write(writer: &mut XmlWriter, event: Event<'_>) -> Result<(), ExportError> {
    writer.write_event(event).map_err(ExportError::xml)
}

fn start(writer: &mut XmlWriter, tag: &str, attrs: &[(&str, &str)]) -> Result<(), ExportError> {
    let mut elem = BytesStart::new(tag);
    for attr in attrs {
        elem.push_attribute(*attr);
    }
    write(writer, Event::Start(elem))
}

fn empty(writer: &mut XmlWriter, tag: &str, attrs: &[(&str, &str)]) -> Result<(), ExportError> {
    let mut elem = BytesStart::new(tag);
    for attr in attrs {
        elem.push_attribute(*attr);
    }
    write(writer, Event::Empty(elem))
}

fn end(writer: &mut XmlWriter, tag: &str) -> Result<(), ExportError> {
    write(writer, Event::End(BytesEnd::new(tag)))
}

fn text_element(writer: &mut XmlWriter, tag: &str, text: &str) -> Result<(), ExportError> {
    start(writer, tag, &[])?;
    write(writer, Event::Text(BytesText::new(text)))?;
    end(writer, tag)
}

fn new_writer() -> Result<XmlWriter, ExportError> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
    write(
        &mut writer,
        Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)),
    )?;
    Ok(writer)
}

fn finish(writer: XmlWriter) -> Result<String, ExportError> {
    let mut out = String::from_utf8(writer.into_inner().into_inner()).map_err(ExportError::xml)?;
    out.push('\n');
    Ok(out)
}

fn group_tag(kind: GroupKind) -> &'static str {
    match kind {
        GroupKind::Xor => "alt",
        GroupKind::Or => "or",
    }
}

/// FeatureIDE element of a feature: `and`, `alt`, `or` by how its children
/// are grouped, `feature` for a leaf.
///
/// FeatureIDE allows one decomposition per feature. When a feature mixes
/// plain children with groups, or has several groups, each group becomes an
/// abstract child named `<feature>_group<n>`.
fn featureide_feature(
    session: &ExportSession<'_>,
    writer: &mut XmlWriter,
    feature: &Feature,
) -> Result<(), ExportError> {
    let layout = session.layout(feature.id);
    let mandatory = if feature.kind == FeatureKind::Mandatory { "true" } else { "false" };
    let single_group = match layout.groups.as_slice() {
        [only] if layout.ungrouped.is_empty() => Some(only),
        _ => None,
    };
    let tag = match single_group {
        Some((group, _)) => group_tag(group.kind),
        None if layout.is_empty() => "feature",
        None => "and",
    };

    let attrs = [("name", feature.name.as_str()), ("mandatory", mandatory)];
    if layout.is_empty() && feature.properties.is_empty() {
        return empty(writer, tag, &attrs);
    }
    start(writer, tag, &attrs)?;
    for (key, value) in &feature.properties {
        let value = match value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        empty(writer, "property", &[("key", key.as_str()), ("value", value.as_str())])?;
    }
    match single_group {
        Some((_, members)) => {
            for member in members {
                featureide_feature(session, writer, member)?;
            }
        }
        None => {
            for child in &layout.ungrouped {
                featureide_feature(session, writer, child)?;
            }
            for (n, (group, members)) in layout.groups.iter().enumerate() {
                let name = format!("{}_group{}", feature.name, n + 1);
                start(
                    writer,
                    group_tag(group.kind),
                    &[("name", name.as_str()), ("abstract", "true"), ("mandatory", "true")],
                )?;
                for member in members {
                    featureide_feature(session, writer, member)?;
                }
                end(writer, group_tag(group.kind))?;
            }
        }
    }
    end(writer, tag)
}

fn featureide_expr(
    session: &ExportSession<'_>,
    writer: &mut XmlWriter,
    expr: &Expr,
) -> Result<(), ExportError> {
    let (tag, operands): (&str, Vec<&Expr>) = match expr {
        Expr::Var(id) => return text_element(writer, "var", &session.name(*id)),
        Expr::Not(inner) => ("not", vec![inner.as_ref()]),
        Expr::And(a, b) => ("conj", vec![a.as_ref(), b.as_ref()]),
        Expr::Or(a, b) => ("disj", vec![a.as_ref(), b.as_ref()]),
        Expr::Implies(a, b) => ("imp", vec![a.as_ref(), b.as_ref()]),
        Expr::Iff(a, b) => ("eq", vec![a.as_ref(), b.as_ref()]),
    };
    start(writer, tag, &[])?;
    for operand in operands {
        featureide_expr(session, writer, operand)?;
    }
    end(writer, tag)
}

pub fn featureide(session: &ExportSession<'_>) -> Result<String, ExportError> {
    let mut writer = new_writer()?;
    let model = session.model();
    start(&mut writer, "featureModel", &[])?;

    start(&mut writer, "properties", &[])?;
    empty(&mut writer, "property", &[("key", "name"), ("value", model.name.as_str())])?;
    if let Some(description) = &model.description {
        empty(
            &mut writer,
            "property",
            &[("key", "description"), ("value", description.as_str())],
        )?;
    }
    let version = session.version_number().to_string();
    empty(&mut writer, "property", &[("key", "version"), ("value", version.as_str())])?;
    end(&mut writer, "properties")?;

    match session.root() {
        Some(root) => {
            start(&mut writer, "struct", &[])?;
            featureide_feature(session, &mut writer, root)?;
            end(&mut writer, "struct")?;
        }
        None => empty(&mut writer, "struct", &[])?,
    }

    let rules = session.rules();
    if !rules.is_empty() {
        start(&mut writer, "constraints", &[])?;
        for rule in &rules {
            start(&mut writer, "rule", &[])?;
            match rule {
                Rule::Parsed(expr) => featureide_expr(session, &mut writer, expr)?,
                Rule::Opaque(text) => text_element(&mut writer, "description", text)?,
            }
            end(&mut writer, "rule")?;
        }
        end(&mut writer, "constraints")?;
    }

    end(&mut writer, "featureModel")?;
    finish(writer)
}

fn splot_id(session: &ExportSession<'_>, id: Uuid) -> String {
    session
        .var(id)
        .map_or_else(|| format!("_{}", id.simple()), |v| format!("_f{v}"))
}

fn splot_cardinality(group: &FeatureGroup) -> String {
    let (min, max) = match group.kind {
        GroupKind::Xor => (1, Some(1)),
        GroupKind::Or => (group.min_cardinality, group.max_cardinality),
    };
    let max = max.map_or_else(|| "*".to_string(), |m| m.to_string());
    format!("[{min},{max}]")
}

/// SXFM tree lines: `:r` root, `:m` mandatory, `:o` optional, `:g` group
/// with cardinality, `:` group member. One tab per level.
fn splot_feature(
    session: &ExportSession<'_>,
    lines: &mut Vec<String>,
    feature: &Feature,
    marker: &str,
    depth: usize,
    groups_seen: &mut usize,
) {
    lines.push(format!(
        "{}{marker} {} ({})",
        "\t".repeat(depth),
        feature.name,
        splot_id(session, feature.id)
    ));
    let layout = session.layout(feature.id);
    for child in &layout.ungrouped {
        let marker = match child.kind {
            FeatureKind::Mandatory => ":m",
            FeatureKind::Optional => ":o",
        };
        splot_feature(session, lines, child, marker, depth + 1, groups_seen);
    }
    for (group, members) in &layout.groups {
        *groups_seen += 1;
        lines.push(format!(
            "{}:g (_g{}) {}",
            "\t".repeat(depth + 1),
            groups_seen,
            splot_cardinality(group)
        ));
        for member in members {
            splot_feature(session, lines, member, ":", depth + 2, groups_seen);
        }
    }
}

/// Cross-tree rules as SXFM clauses, `~` for negation.
fn splot_constraints(session: &ExportSession<'_>) -> Vec<String> {
    let mut lines = Vec::new();
    for rule in session.rules() {
        let Rule::Parsed(expr) = rule else {
            continue;
        };
        for mut clause in expr.to_cnf() {
            if clause.is_empty() {
                continue;
            }
            clause.sort_by_key(|lit| session.var(lit.feature_id));
            let literals: Vec<String> = clause
                .iter()
                .map(|lit| {
                    let id = splot_id(session, lit.feature_id);
                    if lit.negated { format!("~{id}") } else { id }
                })
                .collect();
            lines.push(format!("C{}: {}", lines.len() + 1, literals.join(" or ")));
        }
    }
    lines
}

fn text_block(lines: &[String]) -> String {
    let mut block = String::from("\n");
    for line in lines {
        block.push_str(line);
        block.push('\n');
    }
    block
}

pub fn splot(session: &ExportSession<'_>) -> Result<String, ExportError> {
    let mut writer = new_writer()?;
    start(
        &mut writer,
        "feature_model",
        &[("name", session.model().name.as_str())],
    )?;

    let mut tree = Vec::new();
    if let Some(root) = session.root() {
        splot_feature(session, &mut tree, root, ":r", 0, &mut 0);
    }
    start(&mut writer, "feature_tree", &[])?;
    write(&mut writer, Event::Text(BytesText::new(&text_block(&tree))))?;
    end(&mut writer, "feature_tree")?;

    start(&mut writer, "constraints", &[])?;
    let constraints = splot_constraints(session);
    write(
        &mut writer,
        Event::Text(BytesText::new(&text_block(&constraints))),
    )?;
    end(&mut writer, "constraints")?;

    end(&mut writer, "feature_model")?;
    finish(writer)
}

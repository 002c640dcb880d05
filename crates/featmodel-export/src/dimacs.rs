//! DIMACS CNF.
//!
//! Clause order is fixed: root unit, mandatory edges, XOR groups (at least
//! one, then pairwise exclusions), REQUIRES, EXCLUDES. OR groups and textual
//! constraints are not part of this encoding. A mandatory group member
//! keeps its parent edge here and is flagged with a `c Note:` header line.

use crate::session::ExportSession;
use featmodel_kernel::{FeatureKind, GroupKind, RelationKind};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DimacsCnf {
    pub model: String,
    pub version: u32,
    /// `(variable, feature name)` in ascending variable order.
    pub legend: Vec<(u32, String)>,
    pub clauses: Vec<Vec<i32>>,
    /// Header remarks on rules read differently from the validator.
    pub notes: Vec<String>,
}

impl DimacsCnf {
    pub fn num_vars(&self) -> usize {
        self.legend.len()
    }

    pub fn render(&self) -> String {
        let mut lines = vec![
            format!("c Feature Model: {}", self.model),
            format!("c Version: {}", self.version),
            format!("c Variables: {}", self.num_vars()),
            format!("c Clauses: {}", self.clauses.len()),
        ];
        lines.extend(self.notes.iter().map(|note| format!("c Note: {note}")));
        lines.extend(self.legend.iter().map(|(var, name)| format!("c {var} {name}")));
        lines.push(format!("p cnf {} {}", self.num_vars(), self.clauses.len()));
        for clause in &self.clauses {
            let mut line: Vec<String> = clause.iter().map(i32::to_string).collect();
            line.push("0".to_string());
            lines.push(line.join(" "));
        }
        let mut out = lines.join("\n");
        out.push('\n');
        out
    }
}

pub fn encode(session: &ExportSession<'_>) -> DimacsCnf {
    let contents = session.contents();
    let var = |id| session.var(id).map(|v| v as i32);
    let mut clauses: Vec<Vec<i32>> = Vec::new();
    let mut notes = Vec::new();

    if let Some(root) = session.root().and_then(|f| var(f.id)) {
        clauses.push(vec![root]);
    }

    for feature in session.tree().features() {
        if feature.kind != FeatureKind::Mandatory {
            continue;
        }
        if let (Some(parent), Some(child)) = (feature.parent_id.and_then(var), var(feature.id)) {
            clauses.push(vec![-parent, child]);
            // The validator encodes a group member through its group only.
            let grouped = feature
                .group_id
                .is_some_and(|id| contents.active_groups().any(|g| g.id == id));
            if grouped {
                tracing::warn!(
                    feature = %feature.name,
                    "mandatory group member keeps its parent edge in dimacs"
                );
                notes.push(format!(
                    "{} is a mandatory group member; clause {} {} forces it with its parent",
                    feature.name, -parent, child
                ));
            }
        }
    }

    for group in contents.active_groups().filter(|g| g.kind == GroupKind::Xor) {
        let Some(parent) = var(group.parent_feature_id) else {
            continue;
        };
        let members: Vec<i32> = contents
            .group_members(group.id)
            .filter_map(|f| var(f.id))
            .collect();
        if members.is_empty() {
            tracing::warn!(group = %group.id, "xor group without members left out of dimacs");
            continue;
        }
        let mut at_least = vec![-parent];
        at_least.extend(&members);
        clauses.push(at_least);
        for (i, first) in members.iter().enumerate() {
            for second in &members[i + 1..] {
                clauses.push(vec![-parent, -first, -second]);
            }
        }
    }

    for kind in [RelationKind::Requires, RelationKind::Excludes] {
        for relation in contents.active_relations().filter(|r| r.kind == kind) {
            let (Some(source), Some(target)) = (var(relation.source_id), var(relation.target_id))
            else {
                continue;
            };
            clauses.push(match kind {
                RelationKind::Requires => vec![-source, target],
                RelationKind::Excludes => vec![-source, -target],
            });
        }
    }

    let legend = session
        .mapping()
        .iter()
        .map(|(v, id)| (v, session.name(id)))
        .collect();
    DimacsCnf {
        model: session.model().name.clone(),
        version: session.version_number(),
        legend,
        clauses,
        notes,
    }
}

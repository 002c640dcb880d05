//! One export call: the version being written plus the id mapping every
//! encoder shares.

use crate::error::ExportError;
use crate::format::ExportFormat;
use crate::{diagram, dimacs, json, text, xml};
use featmodel_kernel::expr::expr_from_cnf;
use featmodel_kernel::{
    Constraint, Expr, Feature, FeatureGroup, FeatureModel, FeatureTree, ModelDocument,
    NameResolver, RelationKind, VariableMapping, VersionContents, VersionState, parse_expression,
};
use uuid::Uuid;

/// A cross-tree rule ready for rendering.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Rule {
    Parsed(Expr),
    /// Constraint text that does not parse; encoders that can carry free
    /// text keep it, the rest skip it.
    Opaque(String),
}

/// How a feature's children are arranged, each list sorted by name.
pub(crate) struct ChildLayout<'a> {
    pub ungrouped: Vec<&'a Feature>,
    pub groups: Vec<(&'a FeatureGroup, Vec<&'a Feature>)>,
}

impl ChildLayout<'_> {
    pub fn is_empty(&self) -> bool {
        self.ungrouped.is_empty() && self.groups.is_empty()
    }
}

pub struct ExportSession<'a> {
    model: &'a FeatureModel,
    version_number: u32,
    state: Option<VersionState>,
    contents: &'a VersionContents,
    tree: FeatureTree<'a>,
    mapping: VariableMapping,
    resolver: NameResolver,
}

impl<'a> ExportSession<'a> {
    pub fn new(model: &'a FeatureModel, version_number: u32, contents: &'a VersionContents) -> Self {
        Self {
            model,
            version_number,
            state: None,
            contents,
            tree: FeatureTree::new(&contents.features),
            mapping: VariableMapping::from_features(&contents.features),
            resolver: NameResolver::new(contents.active_features()),
        }
    }

    pub fn from_document(doc: &'a ModelDocument) -> Self {
        Self::new(&doc.model, doc.version_number, &doc.contents)
    }

    /// Record the lifecycle state; only the JSON encoder reports it.
    pub fn with_state(mut self, state: VersionState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn export(&self, format: ExportFormat) -> Result<String, ExportError> {
        let output = match format {
            ExportFormat::FeatureIde => xml::featureide(self)?,
            ExportFormat::SplotXml => xml::splot(self)?,
            ExportFormat::Tvl => text::tvl(self),
            ExportFormat::Dimacs => dimacs::encode(self).render(),
            ExportFormat::Json => json::export(self)?,
            ExportFormat::Uvl => text::uvl(self),
            ExportFormat::Dot => diagram::dot(self),
            ExportFormat::Mermaid => diagram::mermaid(self),
        };
        tracing::debug!(
            format = format.as_str(),
            model = %self.model.name,
            version = self.version_number,
            bytes = output.len(),
            "exported feature model"
        );
        Ok(output)
    }

    /// Parse a textual tag, then export.
    pub fn export_tag(&self, tag: &str) -> Result<String, ExportError> {
        self.export(tag.parse()?)
    }

    pub fn mapping(&self) -> &VariableMapping {
        &self.mapping
    }

    pub(crate) fn model(&self) -> &FeatureModel {
        self.model
    }

    pub(crate) fn version_number(&self) -> u32 {
        self.version_number
    }

    pub(crate) fn state(&self) -> Option<VersionState> {
        self.state
    }

    pub(crate) fn contents(&self) -> &'a VersionContents {
        self.contents
    }

    pub(crate) fn tree(&self) -> &FeatureTree<'a> {
        &self.tree
    }

    /// First feature without a parent, in list order.
    pub(crate) fn root(&self) -> Option<&'a Feature> {
        self.tree.roots().first().and_then(|id| self.tree.get(*id))
    }

    pub(crate) fn name(&self, id: Uuid) -> String {
        self.contents.feature_name(id)
    }

    pub(crate) fn var(&self, id: Uuid) -> Option<u32> {
        self.mapping.var(id)
    }

    /// Every feature, depth-first from the root with name-sorted children,
    /// then whatever the root does not reach in list order.
    pub(crate) fn walk(&self) -> Vec<&'a Feature> {
        let mut out: Vec<&'a Feature> = Vec::with_capacity(self.tree.len());
        let mut stack: Vec<&'a Feature> = self.root().into_iter().collect();
        let mut seen = std::collections::BTreeSet::new();
        while let Some(feature) = stack.pop() {
            if !seen.insert(feature.id) {
                continue;
            }
            out.push(feature);
            let children = self.tree.sorted_children(feature.id);
            stack.extend(children.into_iter().rev());
        }
        for feature in self.tree.features() {
            if seen.insert(feature.id) {
                out.push(feature);
            }
        }
        out
    }

    pub(crate) fn layout(&self, feature_id: Uuid) -> ChildLayout<'a> {
        let children = self.tree.sorted_children(feature_id);
        let groups: Vec<&'a FeatureGroup> = self
            .contents
            .active_groups()
            .filter(|g| g.parent_feature_id == feature_id)
            .collect();
        let mut layout = ChildLayout {
            ungrouped: Vec::new(),
            groups: groups.iter().map(|g| (*g, Vec::new())).collect(),
        };
        for child in children {
            let slot = child
                .group_id
                .and_then(|gid| layout.groups.iter().position(|(g, _)| g.id == gid));
            match slot {
                Some(index) => layout.groups[index].1.push(child),
                None => layout.ungrouped.push(child),
            }
        }
        layout.groups.retain(|(_, members)| !members.is_empty());
        layout
    }

    pub(crate) fn constraint_expr(&self, constraint: &Constraint) -> Option<Expr> {
        match &constraint.expr_cnf {
            Some(cnf) => expr_from_cnf(cnf),
            None => parse_expression(&constraint.expr_text, &self.resolver).ok(),
        }
    }

    /// Relations as expressions, then constraints.
    pub(crate) fn rules(&self) -> Vec<Rule> {
        let mut rules = Vec::new();
        for relation in self.contents.active_relations() {
            if !self.tree.contains(relation.source_id) || !self.tree.contains(relation.target_id) {
                tracing::warn!(relation = %relation.id, "skipping relation with a missing endpoint");
                continue;
            }
            let (source, target) = (Expr::var(relation.source_id), Expr::var(relation.target_id));
            rules.push(Rule::Parsed(match relation.kind {
                RelationKind::Requires => Expr::implies(source, target),
                RelationKind::Excludes => Expr::not(Expr::and(source, target)),
            }));
        }
        for constraint in self.contents.active_constraints() {
            match self.constraint_expr(constraint) {
                Some(expr) => rules.push(Rule::Parsed(expr)),
                None => {
                    tracing::warn!(
                        constraint = %constraint.id,
                        text = %constraint.expr_text,
                        "constraint does not parse; exporting as text"
                    );
                    rules.push(Rule::Opaque(constraint.expr_text.clone()));
                }
            }
        }
        rules
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use featmodel_kernel::ModelBuilder;

    #[test]
    fn layout_splits_groups_from_plain_children() {
        let contents = ModelBuilder::new()
            .root("Car")
            .optional("Radio", "Car")
            .mandatory("Body", "Car")
            .xor("Car", &["Petrol", "Electric"])
            .build()
            .expect("model");
        let model = FeatureModel::new("Car");
        let session = ExportSession::new(&model, 1, &contents);
        let root = session.root().expect("root");
        let layout = session.layout(root.id);
        let plain: Vec<&str> = layout.ungrouped.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(plain, vec!["Body", "Radio"]);
        assert_eq!(layout.groups.len(), 1);
        let members: Vec<&str> = layout.groups[0].1.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(members, vec!["Electric", "Petrol"]);
    }

    #[test]
    fn walk_visits_sorted_preorder_then_strays() {
        let mut contents = ModelBuilder::new()
            .root("R")
            .optional("B", "R")
            .optional("A", "R")
            .optional("A1", "A")
            .build()
            .expect("model");
        let stray = Feature::new(contents.features[0].version_id, "Stray", featmodel_kernel::FeatureKind::Optional)
            .with_parent(Uuid::new_v4());
        contents.features.push(stray);
        let model = FeatureModel::new("M");
        let session = ExportSession::new(&model, 1, &contents);
        let names: Vec<&str> = session.walk().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["R", "A", "A1", "B", "Stray"]);
    }

    #[test]
    fn unparsable_constraints_stay_as_text() {
        let contents = ModelBuilder::new()
            .root("R")
            .optional("A", "R")
            .requires("A", "R")
            .constraint("A => Missing")
            .build()
            .expect("model");
        let model = FeatureModel::new("M");
        let session = ExportSession::new(&model, 1, &contents);
        let rules = session.rules();
        assert!(matches!(rules[0], Rule::Parsed(Expr::Implies(..))));
        assert_eq!(rules[1], Rule::Opaque("A => Missing".to_string()));
    }
}

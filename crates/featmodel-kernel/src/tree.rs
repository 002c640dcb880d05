//! Arena view over a version's features.
//!
//! Features are held in an id-indexed map with an explicit children index,
//! so traversal never chases owned pointers and tolerates corrupted parent
//! data (cycles, dangling parents) without recursion.

use crate::model::Feature;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct FeatureTree<'a> {
    features: BTreeMap<Uuid, &'a Feature>,
    order: Vec<Uuid>,
    children: BTreeMap<Uuid, Vec<Uuid>>,
    roots: Vec<Uuid>,
}

impl<'a> FeatureTree<'a> {
    /// Index the active features, preserving list order.
    pub fn new<I>(features: I) -> Self
    where
        I: IntoIterator<Item = &'a Feature>,
    {
        let mut index = BTreeMap::new();
        let mut order = Vec::new();
        for feature in features.into_iter().filter(|f| f.is_active()) {
            if index.insert(feature.id, feature).is_none() {
                order.push(feature.id);
            }
        }

        let mut children: BTreeMap<Uuid, Vec<Uuid>> = BTreeMap::new();
        let mut roots = Vec::new();
        for id in &order {
            match index[id].parent_id {
                Some(parent) => children.entry(parent).or_default().push(*id),
                None => roots.push(*id),
            }
        }

        Self {
            features: index,
            order,
            children,
            roots,
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn get(&self, id: Uuid) -> Option<&'a Feature> {
        self.features.get(&id).copied()
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.features.contains_key(&id)
    }

    /// Features in their original list order.
    pub fn features(&self) -> impl Iterator<Item = &'a Feature> + '_ {
        self.order.iter().map(|id| self.features[id])
    }

    pub fn ids(&self) -> &[Uuid] {
        &self.order
    }

    /// Every feature without a parent reference.
    pub fn roots(&self) -> &[Uuid] {
        &self.roots
    }

    /// The root, when exactly one exists.
    pub fn root(&self) -> Option<&'a Feature> {
        match self.roots.as_slice() {
            [only] => self.get(*only),
            _ => None,
        }
    }

    /// Child ids in list order. Includes children whose parent is unknown
    /// to the tree only when queried by that dangling parent id.
    pub fn children(&self, id: Uuid) -> &[Uuid] {
        self.children.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Children sorted by name, then id for stability.
    pub fn sorted_children(&self, id: Uuid) -> Vec<&'a Feature> {
        let mut kids: Vec<&'a Feature> = self
            .children(id)
            .iter()
            .filter_map(|child| self.get(*child))
            .collect();
        kids.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        kids
    }

    pub fn is_leaf(&self, id: Uuid) -> bool {
        self.children(id).is_empty()
    }

    pub fn parent(&self, id: Uuid) -> Option<&'a Feature> {
        self.get(id)
            .and_then(|f| f.parent_id)
            .and_then(|parent| self.get(parent))
    }

    /// Forward breadth-first traversal from `start`; includes `start`.
    pub fn reachable_from(&self, start: Uuid) -> BTreeSet<Uuid> {
        let mut seen = BTreeSet::new();
        if !self.contains(start) {
            return seen;
        }
        let mut queue = VecDeque::from([start]);
        seen.insert(start);
        while let Some(current) = queue.pop_front() {
            for child in self.children(current) {
                if self.contains(*child) && seen.insert(*child) {
                    queue.push_back(*child);
                }
            }
        }
        seen
    }

    /// Ids reachable from the single root; empty when the root is ambiguous.
    pub fn reachable_from_root(&self) -> BTreeSet<Uuid> {
        self.root()
            .map(|root| self.reachable_from(root.id))
            .unwrap_or_default()
    }

    /// All descendants of `id` in breadth-first order, excluding `id`.
    pub fn descendants(&self, id: Uuid) -> Vec<Uuid> {
        let mut seen = BTreeSet::from([id]);
        let mut out = Vec::new();
        let mut queue = VecDeque::from([id]);
        while let Some(current) = queue.pop_front() {
            for child in self.children(current) {
                if self.contains(*child) && seen.insert(*child) {
                    out.push(*child);
                    queue.push_back(*child);
                }
            }
        }
        out
    }

    /// Ancestor chain from the parent upwards. Stops at a repeated id.
    pub fn ancestors(&self, id: Uuid) -> Vec<Uuid> {
        let mut chain = Vec::new();
        let mut seen = BTreeSet::from([id]);
        let mut current = self.get(id).and_then(|f| f.parent_id);
        while let Some(parent) = current {
            if !seen.insert(parent) || !self.contains(parent) {
                break;
            }
            chain.push(parent);
            current = self.get(parent).and_then(|f| f.parent_id);
        }
        chain
    }

    /// Hops from `id` up to its topmost ancestor (root depth is 0).
    pub fn depth(&self, id: Uuid) -> usize {
        self.ancestors(id).len()
    }

    /// Deepest hop count over all features.
    pub fn max_depth(&self) -> usize {
        self.order.iter().map(|id| self.depth(*id)).max().unwrap_or(0)
    }

    /// Number of levels below and including the root (root alone is 1).
    pub fn level_count(&self) -> usize {
        let Some(root) = self.root() else {
            return 0;
        };
        let mut levels = 0;
        let mut frontier = vec![root.id];
        let mut seen = BTreeSet::from([root.id]);
        while !frontier.is_empty() {
            levels += 1;
            let mut next = Vec::new();
            for id in frontier {
                for child in self.children(id) {
                    if self.contains(*child) && seen.insert(*child) {
                        next.push(*child);
                    }
                }
            }
            frontier = next;
        }
        levels
    }

    /// Depth-first pre-order from the root, children sorted by name.
    pub fn walk_sorted(&self) -> Vec<(usize, &'a Feature)> {
        let Some(root) = self.root() else {
            return Vec::new();
        };
        let mut out = Vec::new();
        let mut seen = BTreeSet::new();
        let mut stack = vec![(0usize, root)];
        while let Some((depth, feature)) = stack.pop() {
            if !seen.insert(feature.id) {
                continue;
            }
            out.push((depth, feature));
            for child in self.sorted_children(feature.id).into_iter().rev() {
                stack.push((depth + 1, child));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FeatureKind;

    fn chain() -> Vec<Feature> {
        let v = Uuid::new_v4();
        let root = Feature::new(v, "Root", FeatureKind::Mandatory);
        let b = Feature::new(v, "B", FeatureKind::Optional).with_parent(root.id);
        let a = Feature::new(v, "A", FeatureKind::Mandatory).with_parent(root.id);
        let leaf = Feature::new(v, "Leaf", FeatureKind::Optional).with_parent(a.id);
        vec![root, b, a, leaf]
    }

    #[test]
    fn indexes_roots_children_and_depths() {
        let features = chain();
        let tree = FeatureTree::new(&features);
        let root = tree.root().expect("single root");
        assert_eq!(root.name, "Root");
        assert_eq!(tree.children(root.id).len(), 2);
        assert_eq!(tree.depth(features[3].id), 2);
        assert_eq!(tree.max_depth(), 2);
        assert_eq!(tree.level_count(), 3);
        assert_eq!(tree.descendants(root.id).len(), 3);
        assert!(tree.is_leaf(features[3].id));
    }

    #[test]
    fn sorted_walk_visits_children_by_name() {
        let features = chain();
        let tree = FeatureTree::new(&features);
        let names: Vec<&str> = tree
            .walk_sorted()
            .into_iter()
            .map(|(_, f)| f.name.as_str())
            .collect();
        assert_eq!(names, vec!["Root", "A", "Leaf", "B"]);
    }

    #[test]
    fn parent_cycle_does_not_loop() {
        let v = Uuid::new_v4();
        let mut a = Feature::new(v, "A", FeatureKind::Optional);
        let b = Feature::new(v, "B", FeatureKind::Optional).with_parent(a.id);
        a.parent_id = Some(b.id);
        let features = vec![a.clone(), b.clone()];
        let tree = FeatureTree::new(&features);

        assert!(tree.roots().is_empty());
        assert!(tree.root().is_none());
        assert_eq!(tree.ancestors(a.id), vec![b.id]);
        assert_eq!(tree.descendants(a.id), vec![b.id]);
        assert!(tree.reachable_from_root().is_empty());
    }
}

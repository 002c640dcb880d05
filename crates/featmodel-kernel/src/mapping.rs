//! Stable feature-id to small-integer mapping.
//!
//! Variables are assigned 1-based ordinals over the version's feature list
//! order. The same mapping backs SAT encoding, DIMACS export and snapshots,
//! so a variable number means the same feature everywhere in one session.

use crate::model::Feature;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableMapping {
    uuid_to_int: BTreeMap<Uuid, u32>,
    int_to_uuid: BTreeMap<u32, Uuid>,
}

impl VariableMapping {
    /// Assign ordinals to active features in list order.
    pub fn from_features<'a, I>(features: I) -> Self
    where
        I: IntoIterator<Item = &'a Feature>,
    {
        let mut mapping = Self::default();
        for feature in features.into_iter().filter(|f| f.is_active()) {
            if mapping.uuid_to_int.contains_key(&feature.id) {
                continue;
            }
            let var = mapping.int_to_uuid.len() as u32 + 1;
            mapping.uuid_to_int.insert(feature.id, var);
            mapping.int_to_uuid.insert(var, feature.id);
        }
        mapping
    }

    pub fn len(&self) -> usize {
        self.int_to_uuid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.int_to_uuid.is_empty()
    }

    pub fn var(&self, id: Uuid) -> Option<u32> {
        self.uuid_to_int.get(&id).copied()
    }

    pub fn feature(&self, var: u32) -> Option<Uuid> {
        self.int_to_uuid.get(&var).copied()
    }

    /// `(variable, feature id)` pairs in ascending variable order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, Uuid)> + '_ {
        self.int_to_uuid.iter().map(|(var, id)| (*var, *id))
    }

    /// String-keyed maps as stored in snapshots.
    pub fn to_tables(&self) -> (BTreeMap<String, u32>, BTreeMap<u32, String>) {
        let uuid_to_int = self
            .uuid_to_int
            .iter()
            .map(|(id, var)| (id.to_string(), *var))
            .collect();
        let int_to_uuid = self
            .int_to_uuid
            .iter()
            .map(|(var, id)| (*var, id.to_string()))
            .collect();
        (uuid_to_int, int_to_uuid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FeatureKind;

    #[test]
    fn ordinals_follow_list_order_and_skip_inactive() {
        let v = Uuid::new_v4();
        let root = Feature::new(v, "Root", FeatureKind::Mandatory);
        let mut dropped = Feature::new(v, "Dropped", FeatureKind::Optional).with_parent(root.id);
        dropped.audit.is_active = false;
        let kept = Feature::new(v, "Kept", FeatureKind::Optional).with_parent(root.id);

        let features = [root.clone(), dropped.clone(), kept.clone()];
        let mapping = VariableMapping::from_features(&features);

        assert_eq!(mapping.len(), 2);
        assert_eq!(mapping.var(root.id), Some(1));
        assert_eq!(mapping.var(kept.id), Some(2));
        assert_eq!(mapping.var(dropped.id), None);
        assert_eq!(mapping.feature(2), Some(kept.id));

        let (forward, backward) = mapping.to_tables();
        assert_eq!(forward[&root.id.to_string()], 1);
        assert_eq!(backward[&2], kept.id.to_string());
    }
}

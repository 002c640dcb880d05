//! Configuration generation.
//!
//! Breadth-first expansion from the root: a selected feature's mandatory
//! children are always selected, optional children by strategy, and each
//! group it parents gets a member choice that respects its cardinality.
//! Cross-tree rules are not consulted; pass the result through the logical
//! validator when they matter.

use featmodel_kernel::{
    Feature, FeatureKind, FeatureTree, GenerationConfig, GroupKind, VersionContents,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GenerationStrategy {
    /// Child-count heuristic with a fixed seed; repeatable.
    Greedy,
    Random,
    /// Accepted for compatibility; runs as [`GenerationStrategy::Greedy`].
    BeamSearch,
}

impl GenerationStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Greedy => "GREEDY",
            Self::Random => "RANDOM",
            Self::BeamSearch => "BEAM_SEARCH",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "GREEDY" => Some(Self::Greedy),
            "RANDOM" => Some(Self::Random),
            "BEAM_SEARCH" | "BEAM" => Some(Self::BeamSearch),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOptions {
    pub strategy: GenerationStrategy,
    /// Decisions the result must keep.
    pub partial: BTreeMap<Uuid, bool>,
    /// Overrides `generation.max_iterations`.
    pub max_iterations: Option<usize>,
    /// Overrides the strategy's seed. RANDOM without a seed draws from entropy.
    pub seed: Option<u64>,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            strategy: GenerationStrategy::Greedy,
            partial: BTreeMap::new(),
            max_iterations: None,
            seed: None,
        }
    }
}

impl GenerationOptions {
    pub fn with_strategy(strategy: GenerationStrategy) -> Self {
        Self {
            strategy,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationResult {
    pub success: bool,
    pub strategy: GenerationStrategy,
    /// Strategy actually run, when it differs from the requested one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degraded_to: Option<GenerationStrategy>,
    pub configuration: BTreeMap<Uuid, bool>,
    pub selected: Vec<Uuid>,
    /// Selected features over all features.
    pub score: f64,
    pub iterations: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl GenerationResult {
    fn failed(strategy: GenerationStrategy, error: String) -> Self {
        Self {
            success: false,
            strategy,
            degraded_to: None,
            configuration: BTreeMap::new(),
            selected: Vec::new(),
            score: 0.0,
            iterations: 0,
            errors: vec![error],
        }
    }

    pub fn selected_set(&self) -> BTreeSet<Uuid> {
        self.selected.iter().copied().collect()
    }
}

pub struct ConfigurationGenerator<'a> {
    contents: &'a VersionContents,
    tree: FeatureTree<'a>,
    config: GenerationConfig,
}

impl<'a> ConfigurationGenerator<'a> {
    pub fn new(contents: &'a VersionContents) -> Self {
        Self {
            contents,
            tree: FeatureTree::new(&contents.features),
            config: GenerationConfig::default(),
        }
    }

    pub fn with_config(mut self, config: GenerationConfig) -> Self {
        self.config = config;
        self
    }

    pub fn generate(&self, options: &GenerationOptions) -> GenerationResult {
        let (run_as, degraded_to) = match options.strategy {
            GenerationStrategy::BeamSearch => {
                tracing::warn!("beam search is not implemented; running greedy");
                (GenerationStrategy::Greedy, Some(GenerationStrategy::Greedy))
            }
            other => (other, None),
        };
        let mut rng = match (run_as, options.seed) {
            (_, Some(seed)) => ChaCha8Rng::seed_from_u64(seed),
            (GenerationStrategy::Random, None) => ChaCha8Rng::from_entropy(),
            _ => ChaCha8Rng::seed_from_u64(self.config.greedy_seed),
        };
        let max_iterations = options.max_iterations.unwrap_or(self.config.max_iterations);

        let mut result = self.expand(run_as, &options.partial, max_iterations, &mut rng);
        result.strategy = options.strategy;
        result.degraded_to = degraded_to;
        tracing::debug!(
            strategy = options.strategy.as_str(),
            success = result.success,
            selected = result.selected.len(),
            iterations = result.iterations,
            "configuration generated"
        );
        result
    }

    /// Fill in every undecided feature around `partial` with the greedy heuristic.
    pub fn complete_partial_configuration(&self, partial: &BTreeMap<Uuid, bool>) -> GenerationResult {
        self.generate(&GenerationOptions {
            partial: partial.clone(),
            ..GenerationOptions::default()
        })
    }

    /// Up to `count` RANDOM configurations; with `diverse`, no two share the
    /// same selected set. Gives up after `3 * count` attempts.
    pub fn generate_multiple(
        &self,
        count: usize,
        diverse: bool,
        seed: Option<u64>,
    ) -> Vec<GenerationResult> {
        let mut results = Vec::new();
        let mut seen: BTreeSet<BTreeSet<Uuid>> = BTreeSet::new();
        for attempt in 0..count.saturating_mul(3) {
            if results.len() >= count {
                break;
            }
            let options = GenerationOptions {
                strategy: GenerationStrategy::Random,
                seed: seed.map(|s| s.wrapping_add(attempt as u64)),
                ..GenerationOptions::default()
            };
            let result = self.generate(&options);
            if !result.success {
                continue;
            }
            if diverse && !seen.insert(result.selected_set()) {
                continue;
            }
            results.push(result);
        }
        if results.len() < count {
            tracing::debug!(
                requested = count,
                produced = results.len(),
                "fewer configurations than requested"
            );
        }
        results
    }

    fn inclusion_probability(&self, strategy: GenerationStrategy, feature: &Feature) -> f64 {
        if strategy == GenerationStrategy::Random {
            return self.config.random_probability;
        }
        match self.tree.children(feature.id).len() {
            0 => self.config.leaf_probability,
            n if n <= self.config.narrow_child_limit => self.config.narrow_probability,
            _ => self.config.wide_probability,
        }
    }

    fn expand(
        &self,
        strategy: GenerationStrategy,
        partial: &BTreeMap<Uuid, bool>,
        max_iterations: usize,
        rng: &mut ChaCha8Rng,
    ) -> GenerationResult {
        let Some(root) = self.tree.roots().first().and_then(|id| self.tree.get(*id)) else {
            return GenerationResult::failed(strategy, "feature model has no root feature".to_string());
        };
        if partial.get(&root.id) == Some(&false) {
            return GenerationResult::failed(
                strategy,
                format!("root feature '{}' cannot be deselected", root.name),
            );
        }

        let mut errors = Vec::new();
        let mut decided: BTreeMap<Uuid, bool> = BTreeMap::new();
        for (id, value) in partial {
            if self.tree.contains(*id) {
                decided.insert(*id, *value);
            } else {
                errors.push(format!("unknown feature in partial configuration: {id}"));
            }
        }
        decided.insert(root.id, true);

        let mut selected = vec![root.id];
        let mut queue = VecDeque::from([root.id]);
        let mut iterations = 0;

        while let Some(current) = queue.pop_front() {
            if iterations >= max_iterations {
                tracing::warn!(max_iterations, "generation stopped at the iteration limit");
                errors.push(format!("stopped after {max_iterations} iterations"));
                break;
            }
            iterations += 1;

            let children = self.tree.sorted_children(current);
            let mut select = |id: Uuid, decided: &mut BTreeMap<Uuid, bool>| {
                decided.insert(id, true);
                selected.push(id);
                queue.push_back(id);
            };

            for child in children.iter().filter(|c| c.group_id.is_none()) {
                let choice = match decided.get(&child.id) {
                    Some(value) => *value,
                    None => match child.kind {
                        FeatureKind::Mandatory => true,
                        FeatureKind::Optional => {
                            rng.gen_bool(self.inclusion_probability(strategy, child))
                        }
                    },
                };
                if choice {
                    select(child.id, &mut decided);
                } else {
                    decided.insert(child.id, false);
                }
            }

            for group in self
                .contents
                .active_groups()
                .filter(|g| g.parent_feature_id == current)
            {
                let members: Vec<&Feature> = children
                    .iter()
                    .copied()
                    .filter(|c| c.group_id == Some(group.id))
                    .collect();
                let chosen = self.choose_members(
                    strategy,
                    group.kind,
                    (group.min_cardinality, group.max_cardinality),
                    &members,
                    &decided,
                    rng,
                );
                for member in &members {
                    if chosen.contains(&member.id) {
                        select(member.id, &mut decided);
                    } else {
                        decided.insert(member.id, false);
                    }
                }
            }
        }

        for (id, value) in partial {
            if *value && self.tree.contains(*id) && !selected.contains(id) {
                selected.push(*id);
            }
        }

        let configuration = self
            .tree
            .ids()
            .iter()
            .map(|id| (*id, selected.contains(id)))
            .collect();
        let score = if self.tree.is_empty() {
            0.0
        } else {
            selected.len() as f64 / self.tree.len() as f64
        };
        GenerationResult {
            success: true,
            strategy,
            degraded_to: None,
            configuration,
            selected,
            score,
            iterations,
            errors,
        }
    }

    fn choose_members(
        &self,
        strategy: GenerationStrategy,
        kind: GroupKind,
        (min, max): (u32, Option<u32>),
        members: &[&Feature],
        decided: &BTreeMap<Uuid, bool>,
        rng: &mut ChaCha8Rng,
    ) -> BTreeSet<Uuid> {
        let forced: BTreeSet<Uuid> = members
            .iter()
            .filter(|m| decided.get(&m.id) == Some(&true))
            .map(|m| m.id)
            .collect();
        let open: Vec<&Feature> = members
            .iter()
            .copied()
            .filter(|m| !decided.contains_key(&m.id))
            .collect();

        match kind {
            GroupKind::Xor => {
                if !forced.is_empty() || open.is_empty() {
                    return forced;
                }
                let pick = open[rng.gen_range(0..open.len())];
                BTreeSet::from([pick.id])
            }
            GroupKind::Or => {
                let mut chosen = forced;
                for member in &open {
                    if rng.gen_bool(self.inclusion_probability(strategy, member)) {
                        chosen.insert(member.id);
                    }
                }
                for member in &open {
                    if chosen.len() >= min as usize {
                        break;
                    }
                    chosen.insert(member.id);
                }
                if let Some(max) = max {
                    // Drop free picks from the end until the upper bound holds.
                    for member in open.iter().rev() {
                        if chosen.len() <= max as usize {
                            break;
                        }
                        chosen.remove(&member.id);
                    }
                }
                chosen
            }
        }
    }
}

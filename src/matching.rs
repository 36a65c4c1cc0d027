//! Keys shared by a template and a verification sample.

use std::collections::HashMap;
use std::hash::Hash;

use crate::features::{FeatureKey, FeatureKind, FeatureMap, Features, KeyPair};

/// Hold-time keys present in both samples, in template order.
pub fn matching_keys(template: &Features, verification: &Features) -> Vec<String> {
    intersect_in_order(&template.hold_times, &verification.hold_times)
}

/// Interval-time pairs present in both samples, in template order.
pub fn matching_interval_keys(template: &Features, verification: &Features) -> Vec<KeyPair> {
    intersect_in_order(&template.interval_times, &verification.interval_times)
}

fn intersect_in_order<K, V, W>(template: &FeatureMap<K, V>, other: &FeatureMap<K, W>) -> Vec<K>
where
    K: Eq + Hash + Clone,
{
    template
        .keys()
        .filter(|key| other.contains_key(*key))
        .cloned()
        .collect()
}

/// Both match sets, computed once, with their positions indexed.
#[derive(Clone, Debug, Default)]
pub struct MatchIndex {
    hold: Vec<String>,
    interval: Vec<KeyPair>,
    hold_positions: HashMap<String, usize>,
    interval_positions: HashMap<KeyPair, usize>,
}

impl MatchIndex {
    pub fn build(template: &Features, verification: &Features) -> Self {
        let hold = matching_keys(template, verification);
        let interval = matching_interval_keys(template, verification);

        Self {
            hold_positions: positions(&hold),
            interval_positions: positions(&interval),
            hold,
            interval,
        }
    }

    pub fn hold_keys(&self) -> &[String] {
        &self.hold
    }

    pub fn interval_keys(&self) -> &[KeyPair] {
        &self.interval
    }

    /// Matched keys of one kind, in template order.
    pub fn keys(&self, kind: FeatureKind) -> Vec<FeatureKey> {
        match kind {
            FeatureKind::HoldTime => self.hold.iter().cloned().map(FeatureKey::Hold).collect(),
            FeatureKind::IntervalTime => self
                .interval
                .iter()
                .cloned()
                .map(FeatureKey::Interval)
                .collect(),
        }
    }

    pub fn count(&self, kind: FeatureKind) -> usize {
        match kind {
            FeatureKind::HoldTime => self.hold.len(),
            FeatureKind::IntervalTime => self.interval.len(),
        }
    }

    /// Index of `key` in its match list.
    pub fn position(&self, key: &FeatureKey) -> Option<usize> {
        match key {
            FeatureKey::Hold(key) => self.hold_positions.get(key).copied(),
            FeatureKey::Interval(pair) => self.interval_positions.get(pair).copied(),
        }
    }

    pub fn contains(&self, key: &FeatureKey) -> bool {
        self.position(key).is_some()
    }
}

fn positions<K: Eq + Hash + Clone>(keys: &[K]) -> HashMap<K, usize> {
    let mut map = HashMap::with_capacity(keys.len());
    for (i, key) in keys.iter().enumerate() {
        map.entry(key.clone()).or_insert(i);
    }
    map
}

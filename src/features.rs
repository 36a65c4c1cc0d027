//! Timing features derived from a session: the unique key set, adjacent key
//! pairs, key hold times (KHT) and key interval times (KIT).

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::hash::Hash;
use std::path::Path;

use itertools::Itertools;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::debug;

use crate::error::LoadError;
use crate::session::{is_csv_path, is_interrupt, Action, KeyEvent, Session};
use crate::util::{mean, paired_differences};

/// Which feature family a key or a score refers to.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, strum_macros::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    #[strum(to_string = "hold time")]
    HoldTime,
    #[strum(to_string = "interval time")]
    IntervalTime,
}

impl FeatureKind {
    pub fn from_interval_flag(use_interval: bool) -> Self {
        if use_interval {
            FeatureKind::IntervalTime
        } else {
            FeatureKind::HoldTime
        }
    }
}

/// Two keys typed one after the other.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct KeyPair(pub String, pub String);

impl KeyPair {
    pub fn new(first: impl Into<String>, second: impl Into<String>) -> Self {
        Self(first.into(), second.into())
    }

    pub fn first(&self) -> &str {
        &self.0
    }

    pub fn second(&self) -> &str {
        &self.1
    }
}

impl fmt::Display for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.0, self.1)
    }
}

/// A key in either feature map: a single key for hold times, a pair for
/// interval times.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureKey {
    Hold(String),
    Interval(KeyPair),
}

impl FeatureKey {
    pub fn kind(&self) -> FeatureKind {
        match self {
            FeatureKey::Hold(_) => FeatureKind::HoldTime,
            FeatureKey::Interval(_) => FeatureKind::IntervalTime,
        }
    }
}

impl fmt::Display for FeatureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureKey::Hold(key) => f.write_str(key),
            FeatureKey::Interval(pair) => pair.fmt(f),
        }
    }
}

impl From<&str> for FeatureKey {
    fn from(key: &str) -> Self {
        FeatureKey::Hold(key.to_string())
    }
}

impl From<String> for FeatureKey {
    fn from(key: String) -> Self {
        FeatureKey::Hold(key)
    }
}

impl From<KeyPair> for FeatureKey {
    fn from(pair: KeyPair) -> Self {
        FeatureKey::Interval(pair)
    }
}

/// The four interval modes between the first and second key of a pair.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct IntervalTimes {
    pub press_press: f64,
    pub press_release: f64,
    pub release_press: f64,
    pub release_release: f64,
}

impl IntervalTimes {
    /// Components in press-press, press-release, release-press,
    /// release-release order.
    pub fn components(&self) -> [f64; 4] {
        [
            self.press_press,
            self.press_release,
            self.release_press,
            self.release_release,
        ]
    }
}

/// Insertion-ordered map with hashed lookup. Serializes as a list of
/// `[key, value]` entries so tuple keys survive JSON.
#[derive(Clone, Debug)]
pub struct FeatureMap<K, V> {
    entries: Vec<(K, V)>,
    index: HashMap<K, usize>,
}

impl<K: Eq + Hash + Clone, V> FeatureMap<K, V> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Builds a map keeping the first value seen for each key.
    pub fn from_entries(entries: impl IntoIterator<Item = (K, V)>) -> Self {
        let mut map = Self::new();
        for (key, value) in entries {
            map.insert(key, value);
        }
        map
    }

    /// Inserts a new key. Returns `false` and leaves the map unchanged if the
    /// key is already present.
    pub fn insert(&mut self, key: K, value: V) -> bool {
        if self.index.contains_key(&key) {
            return false;
        }
        self.index.insert(key.clone(), self.entries.len());
        self.entries.push((key, value));
        true
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.index.get(key).map(|&i| &self.entries[i].1)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.index.contains_key(key)
    }
}

impl<K, V> FeatureMap<K, V> {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.iter().map(|(key, _)| key)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.iter().map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries.iter().map(|(key, value)| (key, value))
    }
}

impl<K: Eq + Hash + Clone, V> Default for FeatureMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: PartialEq, V: PartialEq> PartialEq for FeatureMap<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl<K: Eq + Hash + Clone, V> FromIterator<(K, V)> for FeatureMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::from_entries(iter)
    }
}

impl<K: Serialize, V: Serialize> Serialize for FeatureMap<K, V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.entries.serialize(serializer)
    }
}

impl<'de, K, V> Deserialize<'de> for FeatureMap<K, V>
where
    K: Deserialize<'de> + Eq + Hash + Clone,
    V: Deserialize<'de>,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Vec::<(K, V)>::deserialize(deserializer).map(Self::from_entries)
    }
}

pub type HoldTimes = FeatureMap<String, f64>;
pub type IntervalTimeMap = FeatureMap<KeyPair, IntervalTimes>;

/// Everything extracted from one session. This is also the stored profile
/// format: it round-trips through JSON unchanged.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Features {
    pub unique_keys: Vec<String>,
    pub key_pairs: Vec<KeyPair>,
    pub hold_times: HoldTimes,
    pub interval_times: IntervalTimeMap,
}

impl Features {
    pub fn extract(events: &[KeyEvent]) -> Self {
        let unique_keys = unique_keys(events);
        let key_pairs = key_pairs(&unique_keys);
        let hold_times = hold_times(events, &unique_keys);
        let interval_times = interval_times(events, &key_pairs);
        debug!(
            events = events.len(),
            unique_keys = unique_keys.len(),
            key_pairs = key_pairs.len(),
            hold_times = hold_times.len(),
            interval_times = interval_times.len(),
            "extracted features"
        );

        Self {
            unique_keys,
            key_pairs,
            hold_times,
            interval_times,
        }
    }

    pub fn len(&self, kind: FeatureKind) -> usize {
        match kind {
            FeatureKind::HoldTime => self.hold_times.len(),
            FeatureKind::IntervalTime => self.interval_times.len(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(data: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(data)
    }
}

/// Loads features from a `.csv` recording or a `.json` profile.
pub fn load_features<P: AsRef<Path>>(path: P) -> Result<Features, LoadError> {
    let path = path.as_ref();
    if is_csv_path(path) {
        return Session::load(path).map(Session::into_features);
    }

    let data = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let features = Features::from_json(&data)?;
    debug!(path = %path.display(), "loaded feature profile");
    Ok(features)
}

/// Keys seen an even number of times, in first-occurrence order. An odd count
/// means a press or release went unrecorded, so the key is left out.
pub fn unique_keys(events: &[KeyEvent]) -> Vec<String> {
    let keys = || events.iter().map(|e| e.key.as_str()).filter(|k| !is_interrupt(k));
    let counts = keys().counts();

    keys()
        .unique()
        .filter(|key| counts[key] % 2 == 0)
        .map(str::to_string)
        .collect()
}

/// Adjacent pairs over the unique keys: `[a, b, c]` gives `(a, b), (b, c)`.
pub fn key_pairs(unique_keys: &[String]) -> Vec<KeyPair> {
    unique_keys
        .iter()
        .tuple_windows()
        .map(|(first, second)| KeyPair::new(first.as_str(), second.as_str()))
        .collect()
}

/// Mean hold time per key. Timestamps are taken in recording order
/// regardless of action and differenced two at a time.
pub fn hold_times(events: &[KeyEvent], unique_keys: &[String]) -> HoldTimes {
    let mut timestamps: HashMap<&str, Vec<f64>> = HashMap::new();
    for event in events {
        timestamps
            .entry(event.key.as_str())
            .or_default()
            .push(event.timestamp);
    }

    unique_keys
        .iter()
        .filter_map(|key| {
            let held = paired_differences(timestamps.get(key.as_str())?);
            mean(&held).map(|hold| (key.clone(), hold))
        })
        .collect()
}

#[derive(Default)]
struct ActionTimes {
    presses: Vec<f64>,
    releases: Vec<f64>,
}

/// Interval times per pair from whole-session averages of each key's press
/// and release timestamps.
pub fn interval_times(events: &[KeyEvent], pairs: &[KeyPair]) -> IntervalTimeMap {
    let mut by_key: HashMap<&str, ActionTimes> = HashMap::new();
    for event in events {
        let times = by_key.entry(event.key.as_str()).or_default();
        match event.action {
            Action::Press => times.presses.push(event.timestamp),
            Action::Release => times.releases.push(event.timestamp),
        }
    }
    let averages = |key: &str| {
        let times = by_key.get(key)?;
        Some((mean(&times.presses)?, mean(&times.releases)?))
    };

    pairs
        .iter()
        .filter_map(|pair| {
            let Some(((first_press, first_release), (second_press, second_release))) =
                averages(pair.first()).zip(averages(pair.second()))
            else {
                debug!(pair = %pair, "pair lacks a press or release, no interval time");
                return None;
            };

            let times = IntervalTimes {
                press_press: second_press - first_press,
                press_release: second_release - first_press,
                // Same expression as release_release; recorded profiles depend on it.
                release_press: second_release - first_release,
                release_release: second_release - first_release,
            };
            Some((pair.clone(), times))
        })
        .collect()
}

//! Verification strategies.
//!
//! Every strategy compares a verification sample against a template over the
//! keys the two share, and exposes the same three operations through
//! [`KeystrokeVerifier`]. The set of strategies is closed: [`Verifier`] holds
//! exactly one of them.

mod absolute;
mod relative;
mod similarity;

pub use absolute::AbsoluteVerifier;
pub use relative::{Disorder, RelativeVerifier};
pub use similarity::SimilarityVerifier;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::VerifyError;
use crate::features::{FeatureKey, FeatureKind, Features, IntervalTimes, KeyPair};
use crate::matching::MatchIndex;
use crate::session::Session;

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum VerifierKind {
    Absolute,
    Relative,
    Similarity,
}

impl VerifierKind {
    pub const ALL: [VerifierKind; 3] = [
        VerifierKind::Absolute,
        VerifierKind::Relative,
        VerifierKind::Similarity,
    ];
}

impl FromStr for VerifierKind {
    type Err = VerifyError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        let normalized = name.trim().to_ascii_lowercase();
        let normalized = normalized.strip_suffix(" verifier").unwrap_or(&normalized);
        match normalized {
            "absolute" => Ok(VerifierKind::Absolute),
            "relative" => Ok(VerifierKind::Relative),
            "similarity" => Ok(VerifierKind::Similarity),
            _ => Err(VerifyError::InvalidVerifier(name.to_string())),
        }
    }
}

/// How the four interval components combine into one verdict.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntervalGate {
    /// Only the press-press component decides.
    #[default]
    Leading,
    /// Every component has to pass.
    All,
}

impl IntervalGate {
    pub fn admits(
        self,
        template: &IntervalTimes,
        verification: &IntervalTimes,
        check: impl Fn(f64, f64) -> bool,
    ) -> bool {
        let mut components = template
            .components()
            .into_iter()
            .zip(verification.components());
        match self {
            IntervalGate::Leading => components.next().is_some_and(|(t, v)| check(t, v)),
            IntervalGate::All => components.all(|(t, v)| check(t, v)),
        }
    }
}

/// Receives keys that were skipped while collecting valid keys.
pub trait SkipReporter: fmt::Debug {
    fn key_skipped(&self, key: &FeatureKey, error: &VerifyError);
}

/// Reports skipped keys as `tracing` warnings.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingReporter;

impl SkipReporter for TracingReporter {
    fn key_skipped(&self, key: &FeatureKey, error: &VerifyError) {
        warn!(key = %key, "skipping key: {error}");
    }
}

static TRACING_REPORTER: TracingReporter = TracingReporter;

/// Valid keys of one kind, plus how many matched keys could not be judged.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ValidKeys {
    pub kind: FeatureKind,
    pub keys: Vec<FeatureKey>,
    pub skipped: usize,
}

impl ValidKeys {
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// State shared by every strategy: the two feature sets, their matches, the
/// threshold and where skipped keys are reported.
#[derive(Debug)]
pub struct VerifierCore<'a> {
    template: &'a Features,
    verification: &'a Features,
    threshold: f64,
    matches: MatchIndex,
    reporter: &'a dyn SkipReporter,
}

impl<'a> VerifierCore<'a> {
    pub fn new(template: &'a Features, verification: &'a Features, threshold: f64) -> Self {
        Self {
            template,
            verification,
            threshold,
            matches: MatchIndex::build(template, verification),
            reporter: &TRACING_REPORTER,
        }
    }

    pub fn template(&self) -> &'a Features {
        self.template
    }

    pub fn verification(&self) -> &'a Features {
        self.verification
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn matches(&self) -> &MatchIndex {
        &self.matches
    }

    pub fn reporter(&self) -> &dyn SkipReporter {
        self.reporter
    }

    fn set_threshold(&mut self, threshold: f64) {
        self.threshold = threshold;
    }

    fn set_reporter(&mut self, reporter: &'a dyn SkipReporter) {
        self.reporter = reporter;
    }

    /// Template and verification hold times for a matched key.
    pub fn hold_latencies(&self, key: &str) -> Result<(f64, f64), VerifyError> {
        let not_found = || VerifyError::KeyNotFound(FeatureKey::from(key));
        if !self.matches.contains(&FeatureKey::from(key)) {
            return Err(not_found());
        }
        let template = self.template.hold_times.get(key).ok_or_else(not_found)?;
        let verification = self.verification.hold_times.get(key).ok_or_else(not_found)?;
        Ok((*template, *verification))
    }

    /// Template and verification interval times for a matched pair.
    pub fn interval_latencies(
        &self,
        pair: &KeyPair,
    ) -> Result<(IntervalTimes, IntervalTimes), VerifyError> {
        let not_found = || VerifyError::KeyNotFound(FeatureKey::Interval(pair.clone()));
        if !self.matches.contains(&FeatureKey::Interval(pair.clone())) {
            return Err(not_found());
        }
        let template = self.template.interval_times.get(pair).ok_or_else(not_found)?;
        let verification = self
            .verification
            .interval_times
            .get(pair)
            .ok_or_else(not_found)?;
        Ok((*template, *verification))
    }
}

pub trait KeystrokeVerifier {
    fn kind(&self) -> VerifierKind;

    fn core(&self) -> &VerifierCore<'_>;

    /// Whether one matched key agrees with the template. The key's variant
    /// selects hold-time or interval-time mode.
    fn is_key_valid(&self, key: &FeatureKey) -> Result<bool, VerifyError>;

    fn threshold(&self) -> f64 {
        self.core().threshold()
    }

    /// Matched keys of `kind` that are valid. Keys whose timings cannot be
    /// looked up are reported and counted as skipped; any other error aborts.
    fn find_all_valid_keys(&self, kind: FeatureKind) -> Result<ValidKeys, VerifyError> {
        let core = self.core();
        let mut valid = ValidKeys {
            kind,
            keys: Vec::new(),
            skipped: 0,
        };

        for key in core.matches().keys(kind) {
            match self.is_key_valid(&key) {
                Ok(true) => valid.keys.push(key),
                Ok(false) => {}
                Err(error @ VerifyError::KeyNotFound(_)) => {
                    core.reporter().key_skipped(&key, &error);
                    valid.skipped += 1;
                }
                Err(error) => return Err(error),
            }
        }
        Ok(valid)
    }

    /// `1 - valid / matched`: 0.0 when every matched key is valid.
    fn score(&self, kind: FeatureKind) -> Result<f64, VerifyError> {
        let total = self.core().matches().count(kind);
        if total == 0 {
            return Err(VerifyError::DivisionByZero(kind));
        }
        let valid = self.find_all_valid_keys(kind)?;
        Ok(1.0 - valid.len() as f64 / total as f64)
    }
}

/// One of the three supported strategies.
#[derive(Debug)]
pub enum Verifier<'a> {
    Absolute(AbsoluteVerifier<'a>),
    Relative(RelativeVerifier<'a>),
    Similarity(SimilarityVerifier<'a>),
}

impl<'a> Verifier<'a> {
    pub fn new(
        kind: VerifierKind,
        template: &'a Features,
        verification: &'a Features,
        threshold: f64,
    ) -> Self {
        match kind {
            VerifierKind::Absolute => {
                AbsoluteVerifier::from_features(template, verification, threshold).into()
            }
            VerifierKind::Relative => {
                RelativeVerifier::from_features(template, verification, threshold).into()
            }
            VerifierKind::Similarity => {
                SimilarityVerifier::from_features(template, verification, threshold).into()
            }
        }
    }

    pub fn from_sessions(
        kind: VerifierKind,
        template: &'a Session,
        verification: &'a Session,
        threshold: f64,
    ) -> Self {
        Self::new(kind, template.features(), verification.features(), threshold)
    }

    /// Builds a verifier from its name, rejecting anything but the three
    /// known strategies.
    pub fn from_name(
        name: &str,
        template: &'a Features,
        verification: &'a Features,
        threshold: f64,
    ) -> Result<Self, VerifyError> {
        Ok(Self::new(name.parse()?, template, verification, threshold))
    }

    /// Interval gate for strategies that judge components; the relative
    /// strategy judges the whole session and ignores it.
    pub fn with_interval_gate(self, gate: IntervalGate) -> Self {
        match self {
            Verifier::Absolute(v) => v.with_interval_gate(gate).into(),
            Verifier::Similarity(v) => v.with_interval_gate(gate).into(),
            relative @ Verifier::Relative(_) => relative,
        }
    }

    pub fn with_reporter(mut self, reporter: &'a dyn SkipReporter) -> Self {
        self.core_mut().set_reporter(reporter);
        self
    }

    pub fn set_threshold(&mut self, threshold: f64) {
        self.core_mut().set_threshold(threshold);
    }

    fn core_mut(&mut self) -> &mut VerifierCore<'a> {
        match self {
            Verifier::Absolute(v) => &mut v.core,
            Verifier::Relative(v) => &mut v.core,
            Verifier::Similarity(v) => &mut v.core,
        }
    }

    fn inner(&self) -> &dyn KeystrokeVerifier {
        match self {
            Verifier::Absolute(v) => v,
            Verifier::Relative(v) => v,
            Verifier::Similarity(v) => v,
        }
    }
}

impl KeystrokeVerifier for Verifier<'_> {
    fn kind(&self) -> VerifierKind {
        self.inner().kind()
    }

    fn core(&self) -> &VerifierCore<'_> {
        match self {
            Verifier::Absolute(v) => v.core(),
            Verifier::Relative(v) => v.core(),
            Verifier::Similarity(v) => v.core(),
        }
    }

    fn is_key_valid(&self, key: &FeatureKey) -> Result<bool, VerifyError> {
        self.inner().is_key_valid(key)
    }

    fn find_all_valid_keys(&self, kind: FeatureKind) -> Result<ValidKeys, VerifyError> {
        self.inner().find_all_valid_keys(kind)
    }

    fn score(&self, kind: FeatureKind) -> Result<f64, VerifyError> {
        self.inner().score(kind)
    }
}

impl<'a> From<AbsoluteVerifier<'a>> for Verifier<'a> {
    fn from(v: AbsoluteVerifier<'a>) -> Self {
        Verifier::Absolute(v)
    }
}

impl<'a> From<RelativeVerifier<'a>> for Verifier<'a> {
    fn from(v: RelativeVerifier<'a>) -> Self {
        Verifier::Relative(v)
    }
}

impl<'a> From<SimilarityVerifier<'a>> for Verifier<'a> {
    fn from(v: SimilarityVerifier<'a>) -> Self {
        Verifier::Similarity(v)
    }
}

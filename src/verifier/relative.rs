use std::cell::OnceCell;

use tracing::debug;

use super::{KeystrokeVerifier, SkipReporter, VerifierCore, VerifierKind};
use crate::error::VerifyError;
use crate::features::{FeatureKey, FeatureKind, Features};
use crate::session::Session;

/// Degree of disorder of the matched keys against the template ordering.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Disorder {
    /// Sum of the distances of every matched key.
    pub degree: usize,
    /// `(n² − 1) / 2` for `n` template keys.
    pub max_degree: f64,
}

impl Disorder {
    pub fn absolute(&self, kind: FeatureKind) -> Result<f64, VerifyError> {
        if self.max_degree <= 0.0 {
            return Err(VerifyError::DivisionByZero(kind));
        }
        Ok(self.degree as f64 / self.max_degree)
    }
}

/// Judges the whole sample at once: every matched key gets the same verdict,
/// valid iff the absolute degree of disorder is below `threshold`.
#[derive(Debug)]
pub struct RelativeVerifier<'a> {
    pub(super) core: VerifierCore<'a>,
    hold_disorder: OnceCell<Disorder>,
    interval_disorder: OnceCell<Disorder>,
}

impl<'a> RelativeVerifier<'a> {
    pub fn new(template: &'a Session, verification: &'a Session, threshold: f64) -> Self {
        Self::from_features(template.features(), verification.features(), threshold)
    }

    pub fn from_features(
        template: &'a Features,
        verification: &'a Features,
        threshold: f64,
    ) -> Self {
        Self {
            core: VerifierCore::new(template, verification, threshold),
            hold_disorder: OnceCell::new(),
            interval_disorder: OnceCell::new(),
        }
    }

    pub fn with_reporter(mut self, reporter: &'a dyn SkipReporter) -> Self {
        self.core.set_reporter(reporter);
        self
    }

    /// Template keys sorted ascending by value. Interval pairs sort by their
    /// press-press time. Ties keep template order. Distances are taken from
    /// the matched-key list, so this order does not feed `degree`.
    pub fn canonical_order(&self, kind: FeatureKind) -> Vec<FeatureKey> {
        let template = self.core.template();
        match kind {
            FeatureKind::HoldTime => {
                let mut entries: Vec<_> = template.hold_times.iter().collect();
                entries.sort_by(|a, b| a.1.total_cmp(b.1));
                entries
                    .into_iter()
                    .map(|(key, _)| FeatureKey::Hold(key.clone()))
                    .collect()
            }
            FeatureKind::IntervalTime => {
                let mut entries: Vec<_> = template.interval_times.iter().collect();
                entries.sort_by(|a, b| a.1.press_press.total_cmp(&b.1.press_press));
                entries
                    .into_iter()
                    .map(|(pair, _)| FeatureKey::Interval(pair.clone()))
                    .collect()
            }
        }
    }

    /// Position of `key` in the matched-key list, counted from its start.
    pub fn find_distance(&self, key: &FeatureKey) -> Result<usize, VerifyError> {
        let in_template = match key {
            FeatureKey::Hold(key) => self.core.template().hold_times.contains_key(key),
            FeatureKey::Interval(pair) => self.core.template().interval_times.contains_key(pair),
        };
        if !in_template {
            return Err(VerifyError::KeyNotFound(key.clone()));
        }
        self.core
            .matches()
            .position(key)
            .ok_or_else(|| VerifyError::KeyNotFound(key.clone()))
    }

    /// Computed on first use per feature kind and cached afterwards.
    pub fn disorder(&self, kind: FeatureKind) -> Result<Disorder, VerifyError> {
        let cell = match kind {
            FeatureKind::HoldTime => &self.hold_disorder,
            FeatureKind::IntervalTime => &self.interval_disorder,
        };
        if let Some(disorder) = cell.get() {
            return Ok(*disorder);
        }
        let disorder = self.compute_disorder(kind)?;
        Ok(*cell.get_or_init(|| disorder))
    }

    pub fn degree_of_disorder(&self, kind: FeatureKind) -> Result<usize, VerifyError> {
        self.disorder(kind).map(|disorder| disorder.degree)
    }

    pub fn max_degree_of_disorder(&self, kind: FeatureKind) -> Result<f64, VerifyError> {
        self.disorder(kind).map(|disorder| disorder.max_degree)
    }

    pub fn absolute_degree_of_disorder(&self, kind: FeatureKind) -> Result<f64, VerifyError> {
        self.disorder(kind)?.absolute(kind)
    }

    fn compute_disorder(&self, kind: FeatureKind) -> Result<Disorder, VerifyError> {
        let degree = self
            .core
            .matches()
            .keys(kind)
            .iter()
            .map(|key| self.find_distance(key))
            .sum::<Result<usize, VerifyError>>()?;

        let n = self.core.template().len(kind) as f64;
        let disorder = Disorder {
            degree,
            max_degree: (n * n - 1.0) / 2.0,
        };
        debug!(kind = %kind, ?disorder, "computed degree of disorder");
        Ok(disorder)
    }
}

impl KeystrokeVerifier for RelativeVerifier<'_> {
    fn kind(&self) -> VerifierKind {
        VerifierKind::Relative
    }

    fn core(&self) -> &VerifierCore<'_> {
        &self.core
    }

    fn is_key_valid(&self, key: &FeatureKey) -> Result<bool, VerifyError> {
        if !self.core.matches().contains(key) {
            return Err(VerifyError::KeyNotFound(key.clone()));
        }
        let absolute = self.absolute_degree_of_disorder(key.kind())?;
        Ok(absolute < self.core.threshold())
    }
}

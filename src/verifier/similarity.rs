use super::{IntervalGate, KeystrokeVerifier, SkipReporter, VerifierCore, VerifierKind};
use crate::error::VerifyError;
use crate::features::{FeatureKey, Features};
use crate::session::Session;
use crate::util::population_std_dev;

/// Accepts a key when the population standard deviation of its template and
/// verification timings is at most `threshold` seconds.
#[derive(Debug)]
pub struct SimilarityVerifier<'a> {
    pub(super) core: VerifierCore<'a>,
    gate: IntervalGate,
}

impl<'a> SimilarityVerifier<'a> {
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
            gate: IntervalGate::default(),
        }
    }

    pub fn with_interval_gate(mut self, gate: IntervalGate) -> Self {
        self.gate = gate;
        self
    }

    pub fn with_reporter(mut self, reporter: &'a dyn SkipReporter) -> Self {
        self.core.set_reporter(reporter);
        self
    }

    pub fn standard_deviation(template: f64, verification: f64) -> f64 {
        population_std_dev(&[template, verification]).unwrap_or_default()
    }

    fn similar(&self, template: f64, verification: f64) -> bool {
        Self::standard_deviation(template, verification) <= self.core.threshold()
    }
}

impl KeystrokeVerifier for SimilarityVerifier<'_> {
    fn kind(&self) -> VerifierKind {
        VerifierKind::Similarity
    }

    fn core(&self) -> &VerifierCore<'_> {
        &self.core
    }

    fn is_key_valid(&self, key: &FeatureKey) -> Result<bool, VerifyError> {
        match key {
            FeatureKey::Hold(key) => {
                let (template, verification) = self.core.hold_latencies(key)?;
                Ok(self.similar(template, verification))
            }
            FeatureKey::Interval(pair) => {
                let (template, verification) = self.core.interval_latencies(pair)?;
                Ok(self
                    .gate
                    .admits(&template, &verification, |t, v| self.similar(t, v)))
            }
        }
    }
}

use super::{IntervalGate, KeystrokeVerifier, SkipReporter, VerifierCore, VerifierKind};
use crate::error::VerifyError;
use crate::features::{FeatureKey, Features};
use crate::session::Session;

/// Accepts a key when the larger of its two timings is at most `threshold`
/// times the smaller.
#[derive(Debug)]
pub struct AbsoluteVerifier<'a> {
    pub(super) core: VerifierCore<'a>,
    gate: IntervalGate,
}

impl<'a> AbsoluteVerifier<'a> {
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

    pub fn interval_gate(&self) -> IntervalGate {
        self.gate
    }

    /// `max / min` of the two timings, 1.0 when they are equal.
    pub fn ratio(template: f64, verification: f64) -> f64 {
        if template == verification {
            return 1.0;
        }
        template.max(verification) / template.min(verification)
    }

    fn within(&self, template: f64, verification: f64) -> bool {
        let ratio = Self::ratio(template, verification);
        (1.0..=self.core.threshold()).contains(&ratio)
    }
}

impl KeystrokeVerifier for AbsoluteVerifier<'_> {
    fn kind(&self) -> VerifierKind {
        VerifierKind::Absolute
    }

    fn core(&self) -> &VerifierCore<'_> {
        &self.core
    }

    fn is_key_valid(&self, key: &FeatureKey) -> Result<bool, VerifyError> {
        match key {
            FeatureKey::Hold(key) => {
                let (template, verification) = self.core.hold_latencies(key)?;
                Ok(self.within(template, verification))
            }
            FeatureKey::Interval(pair) => {
                let (template, verification) = self.core.interval_latencies(pair)?;
                Ok(self
                    .gate
                    .admits(&template, &verification, |t, v| self.within(t, v)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{FeatureKind, IntervalTimes, KeyPair};
    use crate::verifier::tests::{holds, RecordingReporter};

    #[test]
    fn identical_hold_times_are_valid_at_any_threshold() {
        let features = holds(&[("a", 0.137), ("b", 0.09)]);
        for threshold in [1.0, 1.5, 100.0] {
            let verifier = AbsoluteVerifier::from_features(&features, &features, threshold);
            assert_eq!(verifier.is_key_valid(&"a".into()), Ok(true));
            assert_eq!(verifier.is_key_valid(&"b".into()), Ok(true));
        }
    }

    #[test]
    fn close_samples_score_zero() {
        let template = holds(&[("a", 0.1), ("b", 0.2)]);
        let verification = holds(&[("a", 0.1), ("b", 0.25)]);
        let verifier = AbsoluteVerifier::from_features(&template, &verification, 2.0);

        let valid = verifier.find_all_valid_keys(FeatureKind::HoldTime).unwrap();
        assert_eq!(valid.keys, vec![FeatureKey::from("a"), "b".into()]);
        assert_eq!(valid.skipped, 0);
        assert_eq!(verifier.score(FeatureKind::HoldTime), Ok(0.0));
    }

    #[test]
    fn ratio_above_threshold_is_invalid() {
        let template = holds(&[("a", 0.1), ("b", 0.2), ("c", 0.3), ("d", 0.1)]);
        let verification = holds(&[("a", 0.35), ("b", 0.2), ("c", 0.3), ("d", 0.19)]);
        let verifier = AbsoluteVerifier::from_features(&template, &verification, 2.0);

        assert_eq!(verifier.is_key_valid(&"a".into()), Ok(false));
        assert_eq!(verifier.is_key_valid(&"d".into()), Ok(true));
        assert_eq!(verifier.score(FeatureKind::HoldTime), Ok(0.25));
    }

    #[test]
    fn ratio_is_symmetric() {
        assert_eq!(AbsoluteVerifier::ratio(0.2, 0.1), 2.0);
        assert_eq!(AbsoluteVerifier::ratio(0.1, 0.2), 2.0);
        assert_eq!(AbsoluteVerifier::ratio(0.0, 0.0), 1.0);
        assert!(AbsoluteVerifier::ratio(0.0, 0.1).is_infinite());
    }

    fn with_interval(features: &mut Features, pair: KeyPair, times: IntervalTimes) {
        features.interval_times = [(pair, times)].into_iter().collect();
    }

    #[test]
    fn interval_validity_follows_the_gate() {
        let pair = KeyPair::new("a", "b");
        let mut template = holds(&[("a", 0.1), ("b", 0.1)]);
        let mut verification = template.clone();
        with_interval(
            &mut template,
            pair.clone(),
            IntervalTimes {
                press_press: 0.2,
                press_release: 0.3,
                release_press: 0.2,
                release_release: 0.2,
            },
        );
        with_interval(
            &mut verification,
            pair.clone(),
            IntervalTimes {
                press_press: 0.25,
                press_release: 0.9,
                release_press: 0.2,
                release_release: 0.2,
            },
        );
        let key = FeatureKey::from(pair);

        let leading = AbsoluteVerifier::from_features(&template, &verification, 2.0);
        assert_eq!(leading.interval_gate(), IntervalGate::Leading);
        assert_eq!(leading.is_key_valid(&key), Ok(true));

        let strict = AbsoluteVerifier::from_features(&template, &verification, 2.0)
            .with_interval_gate(IntervalGate::All);
        assert_eq!(strict.is_key_valid(&key), Ok(false));
    }

    #[test]
    fn reporter_sees_nothing_when_all_keys_resolve() {
        let features = holds(&[("a", 0.1), ("b", 0.2), ("c", 0.3)]);
        let reporter = RecordingReporter::default();
        let verifier =
            AbsoluteVerifier::from_features(&features, &features, 2.0).with_reporter(&reporter);

        let valid = verifier.find_all_valid_keys(FeatureKind::IntervalTime).unwrap();
        assert_eq!(valid.len(), 2);
        assert!(reporter.skipped.borrow().is_empty());
    }

    #[test]
    fn builds_from_sessions() {
        let template = Session::new(vec![
            crate::session::KeyEvent::press("a", 0.0),
            crate::session::KeyEvent::release("a", 0.1),
        ]);
        let verifier = AbsoluteVerifier::new(&template, &template, 2.0);
        assert_eq!(verifier.kind(), VerifierKind::Absolute);
        assert_eq!(verifier.score(FeatureKind::HoldTime), Ok(0.0));
    }
}

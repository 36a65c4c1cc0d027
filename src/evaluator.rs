//! Pass/fail decisions over a verifier's per-key verdicts.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use crate::error::{Error, VerifyError};
use crate::features::{load_features, FeatureKey, FeatureKind, Features};
use crate::matching::{matching_interval_keys, matching_keys};
use crate::verifier::{IntervalGate, KeystrokeVerifier, ValidKeys, Verifier, VerifierKind};

/// Fraction of valid keys a majority decision has to exceed.
pub const MAJORITY: f64 = 0.50;

pub fn is_majority(percent: f64) -> bool {
    percent > MAJORITY
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Evaluation {
    pub kht_fraction: f64,
    pub kit_fraction: f64,
    pub threshold: f64,
    pub passed: bool,
}

/// Runs a verifier over both feature kinds and requires both valid fractions
/// to exceed its own threshold.
#[derive(Debug)]
pub struct Evaluator<'a> {
    verifier: Verifier<'a>,
    threshold: f64,
}

impl<'a> Evaluator<'a> {
    pub fn new(verifier: impl Into<Verifier<'a>>, threshold: f64) -> Self {
        Self {
            verifier: verifier.into(),
            threshold,
        }
    }

    /// Builds the named verifier. Fails with `InvalidVerifier` for names
    /// outside the supported strategies.
    pub fn from_name(
        name: &str,
        template: &'a Features,
        verification: &'a Features,
        verifier_threshold: f64,
        threshold: f64,
    ) -> Result<Self, VerifyError> {
        let verifier = Verifier::from_name(name, template, verification, verifier_threshold)?;
        Ok(Self::new(verifier, threshold))
    }

    pub fn verifier(&self) -> &Verifier<'a> {
        &self.verifier
    }

    pub fn switch_verifier(&mut self, verifier: impl Into<Verifier<'a>>) {
        self.verifier = verifier.into();
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn set_threshold(&mut self, threshold: f64) {
        self.threshold = threshold;
    }

    /// Valid hold-time keys and valid interval-time keys.
    pub fn extract_features(&self) -> Result<(ValidKeys, ValidKeys), VerifyError> {
        Ok((
            self.verifier.find_all_valid_keys(FeatureKind::HoldTime)?,
            self.verifier.find_all_valid_keys(FeatureKind::IntervalTime)?,
        ))
    }

    /// Compares the valid keys against match totals recomputed from the
    /// verifier's feature sets.
    pub fn evaluate(
        &self,
        kht_valid: &[FeatureKey],
        kit_valid: &[FeatureKey],
    ) -> Result<Evaluation, VerifyError> {
        let core = self.verifier.core();
        let total_kht = matching_keys(core.template(), core.verification()).len();
        let total_kit = matching_interval_keys(core.template(), core.verification()).len();

        let kht_fraction = fraction(kht_valid.len(), total_kht, FeatureKind::HoldTime)?;
        let kit_fraction = fraction(kit_valid.len(), total_kit, FeatureKind::IntervalTime)?;
        let passed = kht_fraction > self.threshold && kit_fraction > self.threshold;
        debug!(
            verifier = %self.verifier.kind(),
            kht_fraction,
            kit_fraction,
            passed,
            "evaluated sample"
        );

        Ok(Evaluation {
            kht_fraction,
            kit_fraction,
            threshold: self.threshold,
            passed,
        })
    }

    pub fn run(&self) -> Result<Evaluation, VerifyError> {
        let (kht, kit) = self.extract_features()?;
        self.evaluate(&kht.keys, &kit.keys)
    }
}

fn fraction(valid: usize, total: usize, kind: FeatureKind) -> Result<f64, VerifyError> {
    if total == 0 {
        return Err(VerifyError::DivisionByZero(kind));
    }
    Ok(valid as f64 / total as f64)
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct MajorityOutcome {
    pub valid: usize,
    pub total: usize,
    pub skipped: usize,
    pub percent: f64,
    pub majority: bool,
}

/// Majority decision for one verifier and one feature kind.
pub fn majority_outcome(
    verifier: &dyn KeystrokeVerifier,
    kind: FeatureKind,
) -> Result<MajorityOutcome, VerifyError> {
    let core = verifier.core();
    let total = match kind {
        FeatureKind::HoldTime => matching_keys(core.template(), core.verification()).len(),
        FeatureKind::IntervalTime => {
            matching_interval_keys(core.template(), core.verification()).len()
        }
    };
    let valid = verifier.find_all_valid_keys(kind)?;
    let percent = fraction(valid.len(), total, kind)?;

    Ok(MajorityOutcome {
        valid: valid.len(),
        total,
        skipped: valid.skipped,
        percent,
        majority: is_majority(percent),
    })
}

/// How to build the verifier for file and directory evaluation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EvaluationSettings {
    pub verifier: VerifierKind,
    pub threshold: f64,
    pub gate: IntervalGate,
    pub kind: FeatureKind,
}

pub fn evaluate_against_file<P: AsRef<Path>>(
    template: &Features,
    path: P,
    settings: &EvaluationSettings,
) -> Result<MajorityOutcome, Error> {
    let other = load_features(path.as_ref())?;
    let verifier = Verifier::new(settings.verifier, template, &other, settings.threshold)
        .with_interval_gate(settings.gate);
    Ok(majority_outcome(&verifier, settings.kind)?)
}

#[derive(Debug)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub outcome: Result<MajorityOutcome, Error>,
}

/// Evaluates every `.csv` and `.json` file in `dir`, sorted by path. A file
/// that fails to load or score is reported in its own outcome.
pub fn evaluate_against_directory<P: AsRef<Path>>(
    template: &Features,
    dir: P,
    settings: &EvaluationSettings,
) -> Result<Vec<FileOutcome>, Error> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(Error::NotADirectory(dir.to_path_buf()));
    }
    let io_error = |source: std::io::Error| Error::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_error)? {
        let path = entry.map_err(io_error)?.path();
        if path.is_file() && has_sample_extension(&path) {
            paths.push(path);
        } else {
            debug!(path = %path.display(), "skipping non-sample entry");
        }
    }
    paths.sort();

    let outcomes: Vec<FileOutcome> = paths
        .into_iter()
        .map(|path| {
            let outcome = evaluate_against_file(template, &path, settings);
            FileOutcome { path, outcome }
        })
        .collect();
    info!(
        dir = %dir.display(),
        files = outcomes.len(),
        failed = outcomes.iter().filter(|o| o.outcome.is_err()).count(),
        "evaluated directory"
    );
    Ok(outcomes)
}

fn has_sample_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv") || ext.eq_ignore_ascii_case("json"))
}

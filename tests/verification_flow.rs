use std::fs;
use std::path::{Path, PathBuf};

use assert_matches::assert_matches;
use keyprint::evaluator::{
    evaluate_against_directory, evaluate_against_file, majority_outcome, EvaluationSettings,
};
use keyprint::features::load_features;
use keyprint::verifier::IntervalGate;
use keyprint::{
    Error, Evaluator, FeatureKey, FeatureKind, KeyEvent, KeystrokeVerifier, LoadError, Session,
    Verifier, VerifierKind, VerifyError,
};
use proptest::prelude::*;
use tempfile::tempdir;

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn settings(verifier: VerifierKind, threshold: f64) -> EvaluationSettings {
    EvaluationSettings {
        verifier,
        threshold,
        gate: IntervalGate::Leading,
        kind: FeatureKind::HoldTime,
    }
}

#[test]
fn template_recording_drops_the_interrupt() {
    let session = Session::load(fixture("single_entry_template.csv")).unwrap();
    assert_eq!(session.len(), 8);
    assert_eq!(session.interrupts(), 1);

    let features = session.features();
    assert_eq!(features.unique_keys, vec!["'h'", "Key.shift", "'E'", "'y'"]);
    assert_eq!(features.key_pairs.len(), 3);
    assert_eq!(features.hold_times.len(), 4);
}

#[test]
fn single_entry_hold_time_is_exact() {
    let session = Session::load(fixture("single_entry_verification.csv")).unwrap();
    assert_eq!(session.interrupts(), 1);

    let features = session.features();
    assert_eq!(features.unique_keys, vec!["'a'"]);
    assert!(features.key_pairs.is_empty());
    assert_eq!(
        features.hold_times.get("'a'").copied(),
        Some(0.13029980659484863)
    );
}

#[test]
fn close_recordings_verify_on_every_hold_key() {
    let template = Session::load(fixture("template.csv")).unwrap();
    let verification = Session::load(fixture("verification.csv")).unwrap();
    let verifier = Verifier::from_sessions(VerifierKind::Absolute, &template, &verification, 2.0);

    let valid = verifier.find_all_valid_keys(FeatureKind::HoldTime).unwrap();
    assert_eq!(valid.len(), 8);
    assert_eq!(valid.skipped, 0);
    assert_eq!(verifier.score(FeatureKind::HoldTime).unwrap(), 0.0);

    // the only negative press-press interval shrinks, which never passes
    let pairs = verifier.find_all_valid_keys(FeatureKind::IntervalTime).unwrap();
    assert_eq!(pairs.len(), 6);
    assert!(!pairs
        .keys
        .contains(&FeatureKey::Interval(keyprint::KeyPair::new("'o'", "Key.space"))));
}

#[test]
fn evaluator_passes_owner_and_fails_impostor() {
    let template = load_features(fixture("template.csv")).unwrap();
    let owner = load_features(fixture("verification.csv")).unwrap();
    let impostor = load_features(fixture("impostor.csv")).unwrap();

    let evaluation = Evaluator::from_name("absolute", &template, &owner, 2.0, 0.5)
        .unwrap()
        .run()
        .unwrap();
    assert_eq!(evaluation.kht_fraction, 1.0);
    assert!(evaluation.passed);

    let evaluation = Evaluator::from_name("absolute", &template, &impostor, 2.0, 0.5)
        .unwrap()
        .run()
        .unwrap();
    assert_eq!(evaluation.kht_fraction, 0.25);
    assert!(!evaluation.passed);
}

#[test]
fn similarity_majority_needs_more_than_half() {
    let template = load_features(fixture("template.csv")).unwrap();
    let impostor = load_features(fixture("impostor.csv")).unwrap();
    let verifier = Verifier::new(VerifierKind::Similarity, &template, &impostor, 0.05);

    let outcome = majority_outcome(&verifier, FeatureKind::HoldTime).unwrap();
    assert_eq!(outcome.valid, 4);
    assert_eq!(outcome.total, 8);
    assert!(!outcome.majority);
}

#[test]
fn relative_verdict_follows_the_matched_key_count() {
    let template = Session::load(fixture("template.csv")).unwrap();
    let owner = Session::load(fixture("verification.csv")).unwrap();
    let impostor = Session::load(fixture("impostor.csv")).unwrap();

    // 8 matched hold keys: degree 0 + 1 + ... + 7 = 28 against (64 - 1) / 2
    for other in [&owner, &impostor] {
        let strict = Verifier::from_sessions(VerifierKind::Relative, &template, other, 0.5);
        assert_eq!(strict.score(FeatureKind::HoldTime).unwrap(), 1.0);

        let lenient = Verifier::from_sessions(VerifierKind::Relative, &template, other, 0.9);
        assert_eq!(lenient.score(FeatureKind::HoldTime).unwrap(), 0.0);
    }
}

#[test]
fn single_key_recording_has_no_degree_of_disorder() {
    let single = Session::load(fixture("single_entry_verification.csv")).unwrap();
    let verifier = Verifier::from_sessions(VerifierKind::Relative, &single, &single, 0.5);

    assert_eq!(
        verifier.score(FeatureKind::HoldTime),
        Err(VerifyError::DivisionByZero(FeatureKind::HoldTime))
    );
    assert_matches!(
        evaluate_against_file(
            single.features(),
            fixture("single_entry_verification.csv"),
            &settings(VerifierKind::Relative, 0.5)
        ),
        Err(Error::Verify(VerifyError::DivisionByZero(FeatureKind::HoldTime)))
    );
}

#[test]
fn disjoint_recordings_cannot_be_scored() {
    let template = load_features(fixture("template.csv")).unwrap();
    let single = load_features(fixture("single_entry_verification.csv")).unwrap();

    for kind in VerifierKind::ALL {
        let verifier = Verifier::new(kind, &template, &single, 1.0);
        assert_eq!(
            verifier.score(FeatureKind::HoldTime),
            Err(VerifyError::DivisionByZero(FeatureKind::HoldTime)),
            "{kind}"
        );
    }
}

#[test]
fn stored_profile_matches_the_recording() {
    let dir = tempdir().unwrap();
    let profile = dir.path().join("template.json");

    let recorded = load_features(fixture("template.csv")).unwrap();
    fs::write(&profile, recorded.to_json().unwrap()).unwrap();
    let stored = load_features(&profile).unwrap();
    assert_eq!(stored, recorded);

    let outcome = evaluate_against_file(
        &stored,
        fixture("verification.csv"),
        &settings(VerifierKind::Absolute, 2.0),
    )
    .unwrap();
    assert_eq!(outcome.percent, 1.0);
    assert!(outcome.majority);
}

#[test]
fn directory_evaluation_keeps_going_past_bad_files() {
    let dir = tempdir().unwrap();
    for name in ["impostor.csv", "malformed.csv", "verification.csv"] {
        fs::copy(fixture(name), dir.path().join(name)).unwrap();
    }
    fs::write(dir.path().join("notes.txt"), "not a sample").unwrap();

    let template = load_features(fixture("template.csv")).unwrap();
    let outcomes =
        evaluate_against_directory(&template, dir.path(), &settings(VerifierKind::Absolute, 2.0))
            .unwrap();

    let names: Vec<_> = outcomes
        .iter()
        .map(|o| o.path.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, ["impostor.csv", "malformed.csv", "verification.csv"]);

    assert_matches!(&outcomes[0].outcome, Ok(o) if !o.majority);
    assert_matches!(
        &outcomes[1].outcome,
        Err(Error::Load(LoadError::MalformedRecord { .. }))
    );
    assert_matches!(&outcomes[2].outcome, Ok(o) if o.majority);
}

#[test]
fn directory_evaluation_rejects_files() {
    let template = load_features(fixture("template.csv")).unwrap();
    assert_matches!(
        evaluate_against_directory(
            &template,
            fixture("template.csv"),
            &settings(VerifierKind::Absolute, 2.0)
        ),
        Err(Error::NotADirectory(_))
    );
}

fn typed_twice(keys: &[String]) -> Vec<KeyEvent> {
    keys.iter()
        .enumerate()
        .flat_map(|(i, key)| {
            let down = i as f64 * 0.2;
            [
                KeyEvent::press(key.clone(), down),
                KeyEvent::release(key.clone(), down + 0.05),
            ]
        })
        .collect()
}

fn key_set(min: usize) -> impl Strategy<Value = Vec<String>> {
    prop::collection::hash_set("[a-z]{1,3}", min..12)
        .prop_map(|keys| keys.into_iter().collect::<Vec<_>>())
}

proptest! {
    #[test]
    fn keys_typed_once_each_keep_their_order(keys in key_set(1)) {
        let session = Session::new(typed_twice(&keys));

        prop_assert_eq!(&session.features().unique_keys, &keys);
        prop_assert_eq!(session.features().key_pairs.len(), keys.len() - 1);
    }

    #[test]
    fn keys_with_odd_event_counts_are_dropped(keys in key_set(2)) {
        let mut events = typed_twice(&keys);
        events.push(KeyEvent::press(keys[0].clone(), 10.0));
        let session = Session::new(events);

        prop_assert!(!session.features().unique_keys.contains(&keys[0]));
        prop_assert_eq!(session.features().unique_keys.len(), keys.len() - 1);
    }

    #[test]
    fn identical_samples_are_fully_valid(keys in key_set(2)) {
        let session = Session::new(typed_twice(&keys));

        for kind in VerifierKind::ALL {
            let verifier = Verifier::from_sessions(kind, &session, &session, 2.0);
            prop_assert_eq!(verifier.score(FeatureKind::HoldTime).unwrap(), 0.0);
        }
    }
}

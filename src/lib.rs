// Library surface: feature extraction, matching and verification.
// The binary in main.rs is a thin driver over these modules.
pub mod app_dirs;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod features;
pub mod matching;
pub mod session;
pub mod util;
pub mod verifier;

pub use error::{Error, LoadError, VerifyError};
pub use evaluator::{Evaluation, Evaluator, MajorityOutcome};
pub use features::{FeatureKey, FeatureKind, Features, IntervalTimes, KeyPair};
pub use session::{Action, KeyEvent, Session};
pub use verifier::{
    AbsoluteVerifier, KeystrokeVerifier, RelativeVerifier, SimilarityVerifier, Verifier,
    VerifierKind,
};

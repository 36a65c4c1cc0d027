use crate::app_dirs::AppDirs;
use crate::features::Features;
use crate::verifier::{IntervalGate, Verifier, VerifierKind};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Defaults for verification runs. Every field can be overridden on the
/// command line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub verifier: VerifierKind,
    /// Largest accepted `max / min` timing ratio.
    pub absolute_threshold: f64,
    /// Absolute degree of disorder has to stay below this.
    pub relative_threshold: f64,
    /// Largest accepted standard deviation, in seconds.
    pub similarity_threshold: f64,
    /// Valid-key fraction both feature kinds have to exceed.
    pub evaluator_threshold: f64,
    pub interval_gate: IntervalGate,
    /// Fallback `tracing` filter when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            verifier: VerifierKind::Absolute,
            absolute_threshold: 2.0,
            relative_threshold: 0.5,
            similarity_threshold: 0.05,
            evaluator_threshold: 0.5,
            interval_gate: IntervalGate::Leading,
            log_level: "warn".to_string(),
        }
    }
}

impl Config {
    pub fn threshold_for(&self, kind: VerifierKind) -> f64 {
        match kind {
            VerifierKind::Absolute => self.absolute_threshold,
            VerifierKind::Relative => self.relative_threshold,
            VerifierKind::Similarity => self.similarity_threshold,
        }
    }

    /// Builds `kind` with `threshold`, or the configured one when `None`.
    pub fn build_verifier<'a>(
        &self,
        kind: VerifierKind,
        threshold: Option<f64>,
        template: &'a Features,
        verification: &'a Features,
    ) -> Verifier<'a> {
        let threshold = threshold.unwrap_or_else(|| self.threshold_for(kind));
        Verifier::new(kind, template, verification, threshold)
            .with_interval_gate(self.interval_gate)
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = AppDirs::config_path().unwrap_or_else(|| PathBuf::from("keyprint_config.json"));
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        match fs::read(&self.path) {
            Ok(bytes) => match serde_json::from_slice::<Config>(&bytes) {
                Ok(cfg) => cfg,
                Err(e) => {
                    debug!(path = %self.path.display(), "ignoring unreadable config: {e}");
                    Config::default()
                }
            },
            Err(_) => Config::default(),
        }
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg)?;
        fs::write(&self.path, data)
    }
}

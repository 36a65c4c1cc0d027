use clap::{Parser, Subcommand};
use keyprint::{
    config::{Config, ConfigStore, FileConfigStore},
    evaluator::{evaluate_against_directory, evaluate_against_file, EvaluationSettings, Evaluator},
    features::{load_features, FeatureKind},
    KeystrokeVerifier, VerifierKind,
};
use std::{error::Error, fs, path::PathBuf};
use tracing_subscriber::EnvFilter;

/// keystroke dynamics verification against a template sample
#[derive(Parser, Debug)]
#[clap(
    version,
    about,
    long_about = "Derives key hold and key interval timings from recorded key events and checks a verification sample against a template with an absolute, relative or similarity verifier."
)]
pub struct Cli {
    /// config file to read defaults from
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// print the extracted features of a recording as JSON
    Features {
        /// recording (.csv) or stored profile (.json)
        path: PathBuf,

        /// write the profile to this file instead of stdout
        #[clap(short, long)]
        out: Option<PathBuf>,
    },

    /// list the valid keys of a verification sample and its score
    Verify {
        template: PathBuf,
        verification: PathBuf,
        #[clap(flatten)]
        strategy: Strategy,

        /// compare key interval times instead of key hold times
        #[clap(long)]
        interval: bool,
    },

    /// require both hold and interval agreement above a threshold
    Evaluate {
        template: PathBuf,
        verification: PathBuf,
        #[clap(flatten)]
        strategy: Strategy,

        /// fraction of valid keys both feature kinds have to exceed
        #[clap(short, long)]
        evaluator_threshold: Option<f64>,
    },

    /// majority decision against a file or every sample in a directory
    Majority {
        template: PathBuf,
        target: PathBuf,
        #[clap(flatten)]
        strategy: Strategy,

        /// compare key interval times instead of key hold times
        #[clap(long)]
        interval: bool,
    },
}

#[derive(clap::Args, Debug)]
struct Strategy {
    /// absolute, relative or similarity (defaults to the configured verifier)
    #[clap(short, long)]
    verifier: Option<String>,

    /// verifier threshold (defaults to the configured one for the verifier)
    #[clap(short, long)]
    threshold: Option<f64>,
}

impl Strategy {
    fn kind(&self, cfg: &Config) -> Result<VerifierKind, keyprint::VerifyError> {
        match &self.verifier {
            Some(name) => name.parse(),
            None => Ok(cfg.verifier),
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let store = match &cli.config {
        Some(path) => FileConfigStore::with_path(path),
        None => FileConfigStore::new(),
    };
    let cfg = store.load();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    run(cli.command, &cfg)
}

fn run(command: Command, cfg: &Config) -> Result<(), Box<dyn Error>> {
    match command {
        Command::Features { path, out } => {
            let json = load_features(&path)?.to_json()?;
            match out {
                Some(out) => fs::write(out, json)?,
                None => println!("{json}"),
            }
        }
        Command::Verify {
            template,
            verification,
            strategy,
            interval,
        } => {
            let kind = strategy.kind(cfg)?;
            let template = load_features(&template)?;
            let verification = load_features(&verification)?;
            let verifier = cfg.build_verifier(kind, strategy.threshold, &template, &verification);
            let feature = FeatureKind::from_interval_flag(interval);

            let valid = verifier.find_all_valid_keys(feature)?;
            for key in &valid.keys {
                println!("valid {key}");
            }
            println!(
                "{kind} verifier: {} of {} {feature} keys valid, {} skipped",
                valid.len(),
                verifier.core().matches().count(feature),
                valid.skipped
            );
            println!("score {:.4}", verifier.score(feature)?);
        }
        Command::Evaluate {
            template,
            verification,
            strategy,
            evaluator_threshold,
        } => {
            let kind = strategy.kind(cfg)?;
            let template = load_features(&template)?;
            let verification = load_features(&verification)?;
            let verifier = cfg.build_verifier(kind, strategy.threshold, &template, &verification);
            let evaluator =
                Evaluator::new(verifier, evaluator_threshold.unwrap_or(cfg.evaluator_threshold));

            let evaluation = evaluator.run()?;
            println!("kht {:.4}", evaluation.kht_fraction);
            println!("kit {:.4}", evaluation.kit_fraction);
            println!("{}", if evaluation.passed { "PASS" } else { "FAIL" });
        }
        Command::Majority {
            template,
            target,
            strategy,
            interval,
        } => {
            let kind = strategy.kind(cfg)?;
            let settings = EvaluationSettings {
                verifier: kind,
                threshold: strategy.threshold.unwrap_or_else(|| cfg.threshold_for(kind)),
                gate: cfg.interval_gate,
                kind: FeatureKind::from_interval_flag(interval),
            };
            let template = load_features(&template)?;

            if target.is_dir() {
                for file in evaluate_against_directory(&template, &target, &settings)? {
                    match file.outcome {
                        Ok(outcome) => println!(
                            "{} {:.4} {}",
                            file.path.display(),
                            outcome.percent,
                            outcome.majority
                        ),
                        Err(e) => println!("{} error: {e}", file.path.display()),
                    }
                }
            } else {
                let outcome = evaluate_against_file(&template, &target, &settings)?;
                println!(
                    "{} {:.4} {}",
                    target.display(),
                    outcome.percent,
                    outcome.majority
                );
            }
        }
    }
    Ok(())
}

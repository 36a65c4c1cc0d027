//! Recorded key events and their loading from CSV.

use std::cell::OnceCell;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::LoadError;
use crate::features::Features;

/// Key name the recorder writes for ctrl+c. Interrupt events end a capture and
/// are never part of the typing sample.
pub const INTERRUPT_KEY: &str = "'\\x03'";

/// Header the recorder writes as the first row of every capture.
pub const CSV_HEADER: [&str; 3] = ["Press or Release", "Key", "Time"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    Press,
    Release,
}

impl Action {
    /// Parses the single-letter code used in recordings (`P` or `R`).
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim() {
            "P" => Some(Action::Press),
            "R" => Some(Action::Release),
            _ => None,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Action::Press => "P",
            Action::Release => "R",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KeyEvent {
    pub key: String,
    pub action: Action,
    /// Seconds, as recorded.
    pub timestamp: f64,
}

impl KeyEvent {
    pub fn new(key: impl Into<String>, action: Action, timestamp: f64) -> Self {
        Self {
            key: key.into(),
            action,
            timestamp,
        }
    }

    pub fn press(key: impl Into<String>, timestamp: f64) -> Self {
        Self::new(key, Action::Press, timestamp)
    }

    pub fn release(key: impl Into<String>, timestamp: f64) -> Self {
        Self::new(key, Action::Release, timestamp)
    }
}

pub fn is_interrupt(key: &str) -> bool {
    key == INTERRUPT_KEY || key == "\u{3}"
}

/// An immutable typing sample.
///
/// Features are derived lazily on first use and cached for the lifetime of the
/// session, so every verifier built over the same session shares one
/// extraction.
#[derive(Debug)]
pub struct Session {
    source: Option<PathBuf>,
    events: Vec<KeyEvent>,
    interrupts: usize,
    features: OnceCell<Features>,
}

impl Session {
    /// Builds a session from in-memory events, dropping interrupt events.
    pub fn new(events: Vec<KeyEvent>) -> Self {
        let total = events.len();
        let events: Vec<KeyEvent> = events
            .into_iter()
            .filter(|event| !is_interrupt(&event.key))
            .collect();

        Self {
            source: None,
            interrupts: total - events.len(),
            events,
            features: OnceCell::new(),
        }
    }

    /// Loads a recording from a `.csv` file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
        let path = path.as_ref();
        if !is_csv_path(path) {
            return Err(LoadError::NotCsv(path.to_path_buf()));
        }

        let file = File::open(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut session = Self::from_reader(file)?;
        debug!(
            path = %path.display(),
            events = session.events.len(),
            interrupts = session.interrupts,
            "loaded session"
        );
        session.source = Some(path.to_path_buf());
        Ok(session)
    }

    /// Parses CSV rows of `action,key,timestamp` after a header row.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, LoadError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers = csv_reader.headers()?;
        if headers.iter().map(str::trim).ne(CSV_HEADER) {
            debug!(?headers, "unexpected header row, reading columns as action,key,time");
        }

        let mut events = Vec::new();
        for record in csv_reader.records() {
            let record = record?;
            let line = record.position().map(|p| p.line()).unwrap_or_default();
            events.push(parse_record(&record, line)?);
        }

        Ok(Self::new(events))
    }

    /// Writes the retained events in the recording format, header first.
    pub fn to_writer<W: Write>(&self, writer: W) -> Result<(), LoadError> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(CSV_HEADER)?;
        for event in &self.events {
            let timestamp = event.timestamp.to_string();
            csv_writer.write_record([
                event.action.code(),
                event.key.as_str(),
                timestamp.as_str(),
            ])?;
        }
        csv_writer.flush().map_err(csv::Error::from)?;
        Ok(())
    }

    pub fn events(&self) -> &[KeyEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Path the session was loaded from, if any.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Number of interrupt events dropped while building the session.
    pub fn interrupts(&self) -> usize {
        self.interrupts
    }

    /// Every retained key name in recording order, repeats included.
    pub fn all_keys_pressed(&self) -> Vec<&str> {
        self.events.iter().map(|event| event.key.as_str()).collect()
    }

    /// Timing features, extracted on first call and cached afterwards.
    pub fn features(&self) -> &Features {
        self.features.get_or_init(|| Features::extract(&self.events))
    }

    pub fn into_features(self) -> Features {
        match self.features.into_inner() {
            Some(features) => features,
            None => Features::extract(&self.events),
        }
    }
}

pub fn is_csv_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
}

fn parse_record(record: &csv::StringRecord, line: u64) -> Result<KeyEvent, LoadError> {
    let malformed = |reason: String| LoadError::MalformedRecord { line, reason };

    if record.len() != 3 {
        return Err(malformed(format!("expected 3 fields, found {}", record.len())));
    }

    let action = Action::from_code(&record[0])
        .ok_or_else(|| malformed(format!("unknown action {:?}", &record[0])))?;
    let timestamp = record[2]
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|t| t.is_finite())
        .ok_or_else(|| malformed(format!("invalid timestamp {:?}", &record[2])))?;

    Ok(KeyEvent::new(&record[1], action, timestamp))
}

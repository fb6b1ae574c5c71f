//! The "TIME" Engine - Trajectory Store + Temporal Interpolator
//!
//! Reconstructs a continuous position from a sparse, irregularly sampled
//! recording:
//! - The store is built once from `(seconds, lat, lon)` records, sorted and
//!   re-based so the first sample sits at `t = 0`
//! - `position_at` returns a piecewise-linear position for any race time,
//!   clamped to the first/last sample outside the recorded range

use csv::{ReaderBuilder, StringRecord, Trim};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

/// A single timestamped geographic sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrajectorySample {
    /// Milliseconds relative to the first sample of the store
    pub time_ms: i64,

    /// Latitude in degrees
    pub lat: f64,

    /// Longitude in degrees
    pub lon: f64,
}

impl TrajectorySample {
    pub fn new(time_ms: i64, lat: f64, lon: f64) -> Self {
        Self { time_ms, lat, lon }
    }

    /// Creates a sample from a timestamp in seconds, rounded to the millisecond.
    pub fn from_seconds(time_secs: f64, lat: f64, lon: f64) -> Self {
        Self {
            time_ms: (time_secs * 1000.0).round() as i64,
            lat,
            lon,
        }
    }
}

/// Why a single trajectory record was rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("expected at least 3 fields, found {found}")]
    TooFewFields { found: usize },

    #[error("{field} is not a number: {value:?}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("{field} is not finite")]
    NonFinite { field: &'static str },

    #[error("unreadable record: {0}")]
    Malformed(String),
}

const FIELD_NAMES: [&str; 3] = ["time", "lat", "lon"];

fn parse_field(field: &'static str, raw: &str) -> Result<f64, ParseError> {
    let value: f64 = raw.trim().parse().map_err(|_| ParseError::InvalidNumber {
        field,
        value: raw.to_string(),
    })?;
    if !value.is_finite() {
        return Err(ParseError::NonFinite { field });
    }
    Ok(value)
}

/// Parses `time_secs, lat, lon[, ...]` fields into a sample.
///
/// Extra trailing fields are ignored.
pub fn parse_fields(fields: &[&str]) -> Result<TrajectorySample, ParseError> {
    if fields.len() < 3 {
        return Err(ParseError::TooFewFields {
            found: fields.len(),
        });
    }
    let time_secs = parse_field(FIELD_NAMES[0], fields[0])?;
    let lat = parse_field(FIELD_NAMES[1], fields[1])?;
    let lon = parse_field(FIELD_NAMES[2], fields[2])?;
    Ok(TrajectorySample::from_seconds(time_secs, lat, lon))
}

/// Parses one CSV record.
pub fn parse_record(record: &StringRecord) -> Result<TrajectorySample, ParseError> {
    let fields: Vec<&str> = record.iter().collect();
    parse_fields(&fields)
}

/// A record that was dropped while building a store.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedRecord {
    /// 1-based line number in the source
    pub line: u64,
    pub reason: ParseError,
}

/// Diagnostics from building a [`TrajectoryStore`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    /// Number of samples kept
    pub accepted: usize,

    /// Records dropped, with reasons
    pub skipped: Vec<SkippedRecord>,

    /// Set when the source itself could not be read (open or I/O failure)
    pub source_error: Option<String>,
}

impl LoadReport {
    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    /// True if every record parsed and the source was fully read.
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty() && self.source_error.is_none()
    }
}

/// Immutable, time-ordered trajectory.
///
/// Invariants once constructed:
/// - samples are sorted ascending by `time_ms` (ties keep input order)
/// - a non-empty store starts at `time_ms == 0`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrajectoryStore {
    samples: Vec<TrajectorySample>,
}

impl TrajectoryStore {
    /// Builds a store from raw samples, sorting and re-basing them to zero.
    pub fn new(mut samples: Vec<TrajectorySample>) -> Self {
        samples.sort_by_key(|s| s.time_ms);

        if let Some(start) = samples.first().map(|s| s.time_ms) {
            if start != 0 {
                for sample in &mut samples {
                    sample.time_ms = sample.time_ms.saturating_sub(start);
                }
            }
        }

        Self { samples }
    }

    /// A store with no trajectory.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Reads comma-delimited `(seconds, lat, lon)` records.
    ///
    /// Malformed records are skipped and listed in the report. An I/O error
    /// stops reading; whatever was parsed before it is kept.
    pub fn from_reader<R: Read>(reader: R) -> (Self, LoadReport) {
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(Trim::All)
            .quoting(false)
            .from_reader(reader);

        let mut raw = Vec::new();
        let mut report = LoadReport::default();
        let mut record = StringRecord::new();

        loop {
            match reader.read_record(&mut record) {
                Ok(false) => break,
                Ok(true) => {
                    let line = record.position().map(|p| p.line()).unwrap_or(0);
                    match parse_record(&record) {
                        Ok(sample) => raw.push(sample),
                        Err(reason) => {
                            debug!("Skipping trajectory record at line {}: {}", line, reason);
                            report.skipped.push(SkippedRecord { line, reason });
                        }
                    }
                }
                Err(e) if e.is_io_error() => {
                    warn!("Trajectory source failed after {} records: {}", raw.len(), e);
                    report.source_error = Some(e.to_string());
                    break;
                }
                Err(e) => {
                    let line = e.position().map(|p| p.line()).unwrap_or(0);
                    debug!("Skipping unreadable trajectory record at line {}: {}", line, e);
                    report.skipped.push(SkippedRecord {
                        line,
                        reason: ParseError::Malformed(e.to_string()),
                    });
                }
            }
        }

        let store = Self::new(raw);
        report.accepted = store.len();
        info!(
            "Loaded trajectory: {} samples, {} skipped, {:.1}s long",
            report.accepted,
            report.skipped_count(),
            store.duration_ms() as f64 / 1000.0
        );
        (store, report)
    }

    /// Reads records from in-memory lines.
    pub fn from_lines<'a, I>(lines: I) -> (Self, LoadReport)
    where
        I: IntoIterator<Item = &'a str>,
    {
        let text = lines.into_iter().collect::<Vec<_>>().join("\n");
        Self::from_reader(text.as_bytes())
    }

    /// Reads records from a file.
    ///
    /// An unopenable file yields an empty store; callers treat that as
    /// "no trajectory available".
    pub fn from_path<P: AsRef<Path>>(path: P) -> (Self, LoadReport) {
        let path = path.as_ref();
        match File::open(path) {
            Ok(file) => Self::from_reader(file),
            Err(e) => {
                warn!("Cannot open trajectory {}: {}", path.display(), e);
                let report = LoadReport {
                    source_error: Some(format!("{}: {}", path.display(), e)),
                    ..LoadReport::default()
                };
                (Self::empty(), report)
            }
        }
    }

    /// Read-only view of the ordered samples.
    pub fn samples(&self) -> &[TrajectorySample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Time of the last sample (0 for an empty store).
    pub fn duration_ms(&self) -> i64 {
        self.samples.last().map(|s| s.time_ms).unwrap_or(0)
    }

    /// Position at `query_ms` on the piecewise-linear trajectory.
    ///
    /// # Returns
    /// * `None` - the store is empty
    /// * the first sample, verbatim, for queries at or before the start
    /// * the last sample, verbatim, for queries past the end
    /// * otherwise the linear interpolation between the two bracketing
    ///   samples, stamped with `query_ms`
    pub fn position_at(&self, query_ms: i64) -> Option<TrajectorySample> {
        let last = self.samples.last()?;

        // First sample with time_ms >= query_ms
        let index = self.samples.partition_point(|s| s.time_ms < query_ms);

        if index == 0 {
            return self.samples.first().copied();
        }
        if index == self.samples.len() || query_ms >= last.time_ms {
            return Some(*last);
        }

        let prev = &self.samples[index - 1];
        let next = &self.samples[index];
        Some(interpolate(prev, next, query_ms))
    }
}

/// Linear interpolation between two samples.
///
/// A zero-length segment resolves to `prev`'s position.
pub fn interpolate(
    prev: &TrajectorySample,
    next: &TrajectorySample,
    query_ms: i64,
) -> TrajectorySample {
    let gap = next.time_ms - prev.time_ms;
    let elapsed = query_ms - prev.time_ms;

    let fraction = if gap == 0 {
        0.0
    } else {
        elapsed as f64 / gap as f64
    };

    TrajectorySample {
        time_ms: query_ms,
        lat: prev.lat + (next.lat - prev.lat) * fraction,
        lon: prev.lon + (next.lon - prev.lon) * fraction,
    }
}

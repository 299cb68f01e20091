//! Core types used throughout the watcher.
//!
//! This module defines the data flowing through one capture cycle (snapshots,
//! parsed tables, output records), the state carried between cycles, and the
//! error families each stage can report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Content fingerprint of a captured image (SHA-256 hex of the raw bytes)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex chars, enough to tell captures apart in logs
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A screen image captured from the device and stored locally
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Local path of the pulled image
    pub path: PathBuf,
    /// When the capture finished
    pub captured_at: DateTime<Utc>,
    /// Hash of the raw image bytes
    pub fingerprint: Fingerprint,
}

impl Snapshot {
    /// Path of a sibling artifact with the given extension (e.g. "txt")
    pub fn artifact_path(&self, extension: &str) -> PathBuf {
        self.path.with_extension(extension)
    }
}

/// Delimited text returned by the OCR service for one snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionResult {
    pub text: String,
}

impl ExtractionResult {
    pub fn line_count(&self) -> usize {
        self.text.lines().count()
    }
}

/// Header row plus data rows, as split from the OCR text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TabularData {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl TabularData {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Result of an over/under prop bet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BetOutcome {
    Over,
    Under,
}

impl BetOutcome {
    /// Accepts exactly "over" or "under", ignoring case and surrounding space
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "over" => Some(BetOutcome::Over),
            "under" => Some(BetOutcome::Under),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BetOutcome::Over => "Over",
            BetOutcome::Under => "Under",
        }
    }
}

/// One weekly quarterback stat line, shaped like the `qb_weekly_data` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputRecord {
    pub player: String,
    pub week: i32,
    pub opponent: String,
    pub passing_yards: i32,
    pub accuracy_pct: f64,
    pub comp_pct: f64,
    pub btt_rate: f64,
    pub twp_rate: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prop_line: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bet_result: Option<BetOutcome>,
}

/// What an upload attempt achieved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadOutcome {
    pub success: bool,
    /// Rows the store reported back; may be lower than the submitted count
    pub inserted_count: usize,
}

impl UploadOutcome {
    pub fn failed() -> Self {
        Self {
            success: false,
            inserted_count: 0,
        }
    }

    pub fn inserted(count: usize) -> Self {
        Self {
            success: true,
            inserted_count: count,
        }
    }
}

/// State carried from one cycle to the next. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleState {
    /// Fingerprint of the last image that was processed (or skipped as duplicate)
    pub last_fingerprint: Option<Fingerprint>,
    /// Number of cycles started so far
    pub cycle: u64,
}

impl CycleState {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Pipeline stage a cycle is in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStage {
    Idle,
    Capturing,
    Detecting,
    Extracting,
    Parsing,
    Mapping,
    Uploading,
}

impl CycleStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            CycleStage::Idle => "idle",
            CycleStage::Capturing => "capturing",
            CycleStage::Detecting => "detecting",
            CycleStage::Extracting => "extracting",
            CycleStage::Parsing => "parsing",
            CycleStage::Mapping => "mapping",
            CycleStage::Uploading => "uploading",
        }
    }
}

/// How a single cycle ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Capture or transfer failed; previous fingerprint kept
    CaptureFailed,
    /// Image identical to the previous one; duplicate deleted
    Unchanged,
    /// OCR returned nothing usable
    NoExtraction,
    /// OCR text had no data rows
    NoRows,
    /// No row survived schema mapping
    NoRecords,
    /// Records were accepted by the store
    Uploaded { submitted: usize, inserted: usize },
    /// Store rejected the batch or was unreachable
    UploadFailed { submitted: usize },
    /// Shutdown requested before the given stage started
    Cancelled { stage: CycleStage },
}

/// Fatal configuration problems, reported before the loop starts
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("store API key is not set (SUPABASE_ANON_KEY or [store].api_key)")]
    MissingStoreKey,

    #[error("OCR API key is not set (CLAUDE_API_KEY or [ocr].api_key)")]
    MissingOcrKey,

    #[error("OCR API key is still the placeholder value")]
    PlaceholderOcrKey,

    #[error("watch interval must be at least one second")]
    ZeroInterval,
}

/// Errors while talking to the device-control utility outside a capture
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("no connected devices found; start the emulator and try again")]
    NoDevices,

    #[error("multiple devices connected ({}); set ADB_DEVICE or --device", .0.join(", "))]
    Ambiguous(Vec<String>),

    #[error("device listing failed: {0}")]
    ListFailed(String),

    #[error("device utility not runnable: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that fail a capture (the cycle keeps its previous fingerprint)
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("{step} failed ({status}): {stderr}")]
    CommandFailed {
        step: &'static str,
        status: String,
        stderr: String,
    },

    #[error("capture produced no file at {0}")]
    MissingOutput(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the OCR service
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("OCR service error ({status}): {message}")]
    Service { status: u16, message: String },

    #[error("OCR request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected OCR response: {0}")]
    InvalidResponse(String),

    #[error("No content extracted")]
    NoContent,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the remote store
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("store error ({status}): {body}")]
    Service { status: u16, body: String },

    #[error("store request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected store response: {0}")]
    InvalidResponse(String),
}

/// Why a single row could not be mapped
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MappingError {
    #[error("missing required field {0}")]
    MissingField(&'static str),

    #[error("invalid value {value:?} for {field}")]
    InvalidValue { field: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bet_outcome_parse() {
        assert_eq!(BetOutcome::parse("OVER"), Some(BetOutcome::Over));
        assert_eq!(BetOutcome::parse(" under "), Some(BetOutcome::Under));
        assert_eq!(BetOutcome::parse("push"), None);
        assert_eq!(BetOutcome::parse("overs"), None);
    }

    #[test]
    fn test_output_record_omits_absent_optionals() {
        let record = OutputRecord {
            player: "Baker Mayfield".to_string(),
            week: 1,
            opponent: "@ATL".to_string(),
            passing_yards: 167,
            accuracy_pct: 53.1,
            comp_pct: 60.0,
            btt_rate: 5.0,
            twp_rate: 2.0,
            prop_line: None,
            bet_result: None,
        };

        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("prop_line").is_none());
        assert!(json.get("bet_result").is_none());
        assert_eq!(json["passing_yards"], 167);
    }

    #[test]
    fn test_output_record_serializes_bet_result_capitalized() {
        let record = OutputRecord {
            player: "Baker Mayfield".to_string(),
            week: 2,
            opponent: "@HOU".to_string(),
            passing_yards: 215,
            accuracy_pct: 65.8,
            comp_pct: 70.0,
            btt_rate: 4.0,
            twp_rate: 1.5,
            prop_line: Some(225.5),
            bet_result: Some(BetOutcome::Under),
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["bet_result"], "Under");
        assert_eq!(json["prop_line"], 225.5);
    }

    #[test]
    fn test_fingerprint_short() {
        let fp = Fingerprint::from_hex("0123456789abcdef0123");
        assert_eq!(fp.short(), "0123456789ab");
        assert_eq!(Fingerprint::from_hex("abc").short(), "abc");
    }

    #[test]
    fn test_snapshot_artifact_path() {
        let snapshot = Snapshot {
            path: PathBuf::from("/tmp/shots/pff_screenshot_1.png"),
            captured_at: Utc::now(),
            fingerprint: Fingerprint::from_hex("00"),
        };
        assert_eq!(
            snapshot.artifact_path("txt"),
            PathBuf::from("/tmp/shots/pff_screenshot_1.txt")
        );
    }

    #[test]
    fn test_ambiguous_devices_message() {
        let err = DeviceError::Ambiguous(vec!["emulator-5554".into(), "emulator-5556".into()]);
        assert!(err.to_string().contains("emulator-5554, emulator-5556"));
    }
}

//! Emulator Watcher - screen-to-database pipeline
//!
//! This crate periodically captures the screen of an Android device (usually
//! an emulator running a stats app), and turns the stat table on screen into
//! rows in a Supabase table:
//!
//! - **Capture**: `adb screencap` + `adb pull` into a local artifact directory
//! - **Change detection**: SHA-256 fingerprint of the raw image bytes
//! - **Extraction**: vision-model OCR returning tab-separated text
//! - **Parsing / mapping**: tolerant TSV parsing and alias-aware schema mapping
//! - **Upload**: PostgREST bulk insert
//!
//! # Architecture
//!
//! The [`Watcher`] owns one implementation of each seam ([`DeviceBridge`],
//! [`TableExtractor`], [`RecordSink`]) and runs strictly sequential cycles,
//! threading a [`CycleState`] from one cycle to the next.

pub mod capture;
pub mod change_detector;
pub mod config;
pub mod extractors;
pub mod mapper;
pub mod parser;
pub mod types;
pub mod upload;
pub mod watcher;

// Re-export commonly used types
pub use capture::{parse_device_list, select_device, AdbBridge, DeviceBridge};
pub use change_detector::{fingerprint_bytes, ChangeDetector, ChangeVerdict};
pub use config::Config;
pub use extractors::{TableExtractor, VisionClient};
pub use mapper::{map_row, map_rows, map_table, FieldRule, FIELD_RULES};
pub use parser::{parse_table, to_csv};
pub use types::{
    BetOutcome, CaptureError, ConfigError, CycleOutcome, CycleStage, CycleState, DeviceError,
    ExtractionError, ExtractionResult, Fingerprint, MappingError, OutputRecord, Snapshot,
    TabularData, UploadError, UploadOutcome,
};
pub use upload::{RecordSink, StoreClient};
pub use watcher::{Watcher, WatcherSettings};

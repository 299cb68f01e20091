//! Cycle orchestration for the watcher.
//!
//! One cycle walks capture → change detection → extraction → parsing →
//! mapping → upload, stopping early whenever a stage has nothing to hand on.
//! Cycles never overlap; the only state that survives a cycle is the
//! [`CycleState`] passed in and handed back by [`Watcher::run_cycle`].

use crate::capture::DeviceBridge;
use crate::change_detector::{ChangeDetector, ChangeVerdict};
use crate::config::WatchConfig;
use crate::extractors::TableExtractor;
use crate::mapper::map_table;
use crate::parser::{parse_table, to_csv};
use crate::types::{CycleOutcome, CycleStage, CycleState};
use crate::upload::RecordSink;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Loop settings resolved from configuration and device selection
#[derive(Debug, Clone)]
pub struct WatcherSettings {
    /// Serial of the device being watched
    pub device: String,
    /// Directory receiving screenshots and debug artifacts
    pub artifact_dir: PathBuf,
    /// Delay between cycles
    pub interval: Duration,
    pub change_detection: bool,
    pub write_csv: bool,
}

impl WatcherSettings {
    pub fn from_config(device: impl Into<String>, watch: &WatchConfig) -> Self {
        Self {
            device: device.into(),
            artifact_dir: watch.screenshot_dir.clone(),
            interval: watch.interval(),
            change_detection: watch.change_detection,
            write_csv: watch.write_csv,
        }
    }
}

/// Drives capture cycles against one device
pub struct Watcher<D, E, S> {
    settings: WatcherSettings,
    detector: ChangeDetector,
    bridge: D,
    extractor: E,
    sink: S,
}

impl<D, E, S> Watcher<D, E, S>
where
    D: DeviceBridge,
    E: TableExtractor,
    S: RecordSink,
{
    pub fn new(settings: WatcherSettings, bridge: D, extractor: E, sink: S) -> Self {
        Self {
            detector: ChangeDetector::new(settings.change_detection),
            settings,
            bridge,
            extractor,
            sink,
        }
    }

    pub fn settings(&self) -> &WatcherSettings {
        &self.settings
    }

    /// Run one full cycle starting from `state`
    ///
    /// Cancellation is only honoured before capture starts; once a frame is
    /// captured the cycle runs to completion. The returned state carries the
    /// fingerprint the next cycle compares against, and is only left untouched
    /// when nothing was captured.
    pub async fn run_cycle(
        &self,
        mut state: CycleState,
        cancel: &CancellationToken,
    ) -> (CycleState, CycleOutcome) {
        state.cycle += 1;
        info!("--- Cycle {} ---", state.cycle);

        if let Some(outcome) = check_cancelled(cancel, CycleStage::Capturing) {
            return (state, outcome);
        }
        enter(CycleStage::Capturing);
        info!("Capturing screenshot...");
        let path = self.snapshot_path(state.cycle);
        let snapshot = match self.bridge.capture(&self.settings.device, &path).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!("Failed to capture screenshot: {}", e);
                return (state, CycleOutcome::CaptureFailed);
            }
        };

        enter(CycleStage::Detecting);
        if self.detector.evaluate(&snapshot, state.last_fingerprint.as_ref())
            == ChangeVerdict::Unchanged
        {
            info!("No changes detected, skipping OCR");
            if let Err(e) = tokio::fs::remove_file(&snapshot.path).await {
                warn!("Failed to delete duplicate {}: {}", snapshot.path.display(), e);
            }
            state.last_fingerprint = Some(snapshot.fingerprint);
            return (state, CycleOutcome::Unchanged);
        }
        info!("New screenshot detected: {}", file_name(&snapshot.path));

        enter(CycleStage::Extracting);
        let extracted = self.extractor.extract(&snapshot).await;
        state.last_fingerprint = Some(snapshot.fingerprint.clone());

        let Some(extracted) = extracted else {
            warn!("Failed to extract data, skipping this cycle");
            return (state, CycleOutcome::NoExtraction);
        };

        let text_path = snapshot.artifact_path("txt");
        if write_artifact(&text_path, &extracted.text).await {
            debug!("Saved extracted text to: {}", file_name(&text_path));
        }

        enter(CycleStage::Parsing);
        let table = parse_table(&extracted.text, true);
        if table.is_empty() {
            warn!("No data rows parsed from extraction");
            return (state, CycleOutcome::NoRows);
        }
        info!(
            "Parsed {} rows with columns: {}",
            table.rows.len(),
            table.headers.join(", ")
        );

        if self.settings.write_csv {
            let csv_path = snapshot.artifact_path("csv");
            if write_artifact(&csv_path, &to_csv(&table)).await {
                debug!("Saved parsed table to: {}", file_name(&csv_path));
            }
        }

        enter(CycleStage::Mapping);
        let records = map_table(&table);
        if records.is_empty() {
            warn!("No valid data to send to database");
            return (state, CycleOutcome::NoRecords);
        }

        enter(CycleStage::Uploading);
        let submitted = records.len();
        let outcome = self.sink.upload(&records).await;
        let outcome = if outcome.success {
            info!("Data successfully uploaded ({} rows)", outcome.inserted_count);
            CycleOutcome::Uploaded {
                submitted,
                inserted: outcome.inserted_count,
            }
        } else {
            error!(
                "Failed to upload data; artifacts kept at {}",
                snapshot.path.display()
            );
            CycleOutcome::UploadFailed { submitted }
        };

        enter(CycleStage::Idle);
        (state, outcome)
    }

    /// Run cycles until `cancel` fires, sleeping the configured interval between them
    pub async fn run(&self, cancel: CancellationToken) -> CycleState {
        let mut state = CycleState::new();
        debug!(
            "Change detection {}",
            if self.detector.is_enabled() { "on" } else { "off" }
        );

        while !cancel.is_cancelled() {
            let (next, outcome) = self.run_cycle(state, &cancel).await;
            state = next;
            debug!("Cycle {} ended: {:?}", state.cycle, outcome);

            if cancel.is_cancelled() {
                break;
            }

            info!(
                "Waiting {} seconds until next check...",
                self.settings.interval.as_secs()
            );
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.settings.interval) => {}
            }
        }

        warn!("Watcher stopped");
        info!("Processed {} cycles", state.cycle);
        info!("Screenshots saved in: {}", self.settings.artifact_dir.display());
        state
    }

    fn snapshot_path(&self, cycle: u64) -> PathBuf {
        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        self.settings
            .artifact_dir
            .join(format!("pff_screenshot_{}_{}.png", timestamp, cycle))
    }
}

fn enter(stage: CycleStage) {
    debug!("Stage: {}", stage.as_str());
}

fn check_cancelled(cancel: &CancellationToken, stage: CycleStage) -> Option<CycleOutcome> {
    if cancel.is_cancelled() {
        info!("Shutdown requested before {}", stage.as_str());
        Some(CycleOutcome::Cancelled { stage })
    } else {
        None
    }
}

/// Best-effort artifact write; failures never stop the cycle
async fn write_artifact(path: &Path, contents: &str) -> bool {
    match tokio::fs::write(path, contents).await {
        Ok(()) => true,
        Err(e) => {
            warn!("Failed to write {}: {}", path.display(), e);
            false
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

//! Device screen capture through adb.
//!
//! The capture path takes a screenshot on the device, pulls it to the local
//! artifact directory and removes the device-side copy. Device listing and
//! selection live here too since they talk to the same utility.

use crate::change_detector::fingerprint_file;
use crate::types::{CaptureError, DeviceError, Snapshot};
use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use tokio::process::Command;
use tracing::{debug, info, trace, warn};

/// Source of screen snapshots
#[async_trait]
pub trait DeviceBridge: Send + Sync {
    /// Capture the device screen into `output_path`
    async fn capture(&self, device: &str, output_path: &Path) -> Result<Snapshot, CaptureError>;
}

/// adb-backed device bridge
pub struct AdbBridge {
    /// Path to the adb binary
    adb_path: PathBuf,
    /// Where screencap writes on the device
    remote_path: String,
}

impl AdbBridge {
    pub fn new(adb_path: impl Into<PathBuf>, remote_path: impl Into<String>) -> Self {
        Self {
            adb_path: adb_path.into(),
            remote_path: remote_path.into(),
        }
    }

    /// Run adb against a device (an empty serial lets adb pick)
    async fn run(&self, device: &str, args: &[&str]) -> std::io::Result<Output> {
        let mut command = Command::new(&self.adb_path);
        if !device.is_empty() {
            command.arg("-s").arg(device);
        }
        trace!("adb {:?} on {:?}", args, device);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
    }

    /// List serials of attached devices in the `device` state
    pub async fn list_devices(&self) -> Result<Vec<String>, DeviceError> {
        let output = Command::new(&self.adb_path)
            .arg("devices")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DeviceError::ListFailed(stderr.trim().to_string()));
        }

        Ok(parse_device_list(&String::from_utf8_lossy(&output.stdout)))
    }
}

impl Default for AdbBridge {
    fn default() -> Self {
        Self::new("adb", "/sdcard/pff_screenshot.png")
    }
}

#[async_trait]
impl DeviceBridge for AdbBridge {
    async fn capture(&self, device: &str, output_path: &Path) -> Result<Snapshot, CaptureError> {
        let remote = self.remote_path.as_str();

        let output = self.run(device, &["shell", "screencap", "-p", remote]).await?;
        check_status("screencap", &output)?;

        let local = output_path.to_string_lossy();
        let output = self.run(device, &["pull", remote, local.as_ref()]).await?;
        check_status("pull", &output)?;

        // Cleanup is best-effort
        match self.run(device, &["shell", "rm", remote]).await {
            Ok(out) if !out.status.success() => trace!("Device cleanup exited with {}", out.status),
            Err(e) => trace!("Device cleanup failed: {}", e),
            Ok(_) => {}
        }

        if !output_path.exists() {
            return Err(CaptureError::MissingOutput(output_path.to_path_buf()));
        }

        let snapshot = Snapshot {
            path: output_path.to_path_buf(),
            captured_at: Utc::now(),
            fingerprint: fingerprint_file(output_path).await?,
        };

        debug!(
            "Captured {} ({})",
            output_path.display(),
            snapshot.fingerprint.short()
        );
        Ok(snapshot)
    }
}

fn check_status(step: &'static str, output: &Output) -> Result<(), CaptureError> {
    if output.status.success() {
        return Ok(());
    }
    Err(CaptureError::CommandFailed {
        step,
        status: output.status.to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    })
}

/// Parse `adb devices` output into ready device serials
pub fn parse_device_list(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .skip(1)
        .filter_map(|line| {
            let mut parts = line.split('\t');
            let serial = parts.next()?.trim();
            let state = parts.next()?.trim();
            (state == "device" && !serial.is_empty()).then(|| serial.to_string())
        })
        .collect()
}

/// Pick the device to watch
///
/// A configured serial always wins. Otherwise exactly one attached device is
/// selected automatically; none or several is an error.
pub fn select_device(configured: Option<&str>, devices: &[String]) -> Result<String, DeviceError> {
    if let Some(serial) = configured {
        if !devices.iter().any(|d| d == serial) {
            warn!("Configured device {} is not in the attached list", serial);
        }
        return Ok(serial.to_string());
    }

    match devices {
        [] => Err(DeviceError::NoDevices),
        [only] => {
            info!("Auto-selected device: {}", only);
            Ok(only.clone())
        }
        many => Err(DeviceError::Ambiguous(many.to_vec())),
    }
}

//! Change detection using content fingerprints.
//!
//! Every capture is hashed over its raw bytes. When detection is enabled and
//! the hash matches the previous cycle's, the capture carries no new
//! information and the rest of the pipeline is skipped.

use crate::types::{Fingerprint, Snapshot};
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::{debug, trace};

/// Verdict for a new snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeVerdict {
    /// Image differs from the last one (or detection is off)
    Changed,
    /// Same bytes as the last processed image
    Unchanged,
}

/// Compares snapshot fingerprints across cycles
#[derive(Debug, Clone, Copy)]
pub struct ChangeDetector {
    enabled: bool,
}

impl ChangeDetector {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Decide whether the snapshot needs downstream work
    pub fn evaluate(&self, snapshot: &Snapshot, last: Option<&Fingerprint>) -> ChangeVerdict {
        if !self.enabled {
            trace!("Change detection disabled, treating {} as changed", snapshot.fingerprint.short());
            return ChangeVerdict::Changed;
        }

        match last {
            Some(prev) if *prev == snapshot.fingerprint => {
                debug!("Fingerprint {} unchanged", prev.short());
                ChangeVerdict::Unchanged
            }
            Some(prev) => {
                debug!(
                    "Fingerprint changed {} -> {}",
                    prev.short(),
                    snapshot.fingerprint.short()
                );
                ChangeVerdict::Changed
            }
            None => {
                trace!("First capture, marking as changed");
                ChangeVerdict::Changed
            }
        }
    }
}

impl Default for ChangeDetector {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Compute the SHA-256 fingerprint of raw image bytes
pub fn fingerprint_bytes(bytes: &[u8]) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    Fingerprint::from_hex(format!("{:x}", hasher.finalize()))
}

/// Fingerprint an image file on disk
pub async fn fingerprint_file(path: &Path) -> std::io::Result<Fingerprint> {
    let bytes = tokio::fs::read(path).await?;
    Ok(fingerprint_bytes(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::path::PathBuf;

    fn snapshot(bytes: &[u8]) -> Snapshot {
        Snapshot {
            path: PathBuf::from("shot.png"),
            captured_at: Utc::now(),
            fingerprint: fingerprint_bytes(bytes),
        }
    }

    #[test]
    fn test_identical_bytes_same_fingerprint() {
        let a = fingerprint_bytes(b"\x89PNG same pixels");
        let b = fingerprint_bytes(b"\x89PNG same pixels");
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn test_single_byte_difference_changes_fingerprint() {
        let a = fingerprint_bytes(b"\x89PNG pixels 0");
        let b = fingerprint_bytes(b"\x89PNG pixels 1");
        assert_ne!(a, b);
    }

    #[test]
    fn test_first_capture_is_changed() {
        let detector = ChangeDetector::new(true);
        assert_eq!(detector.evaluate(&snapshot(b"img"), None), ChangeVerdict::Changed);
    }

    #[test]
    fn test_same_capture_is_unchanged() {
        let detector = ChangeDetector::new(true);
        let last = fingerprint_bytes(b"img");
        assert_eq!(
            detector.evaluate(&snapshot(b"img"), Some(&last)),
            ChangeVerdict::Unchanged
        );
    }

    #[test]
    fn test_different_capture_is_changed() {
        let detector = ChangeDetector::new(true);
        let last = fingerprint_bytes(b"img-1");
        assert_eq!(
            detector.evaluate(&snapshot(b"img-2"), Some(&last)),
            ChangeVerdict::Changed
        );
    }

    #[test]
    fn test_disabled_detector_always_changed() {
        let detector = ChangeDetector::new(false);
        let last = fingerprint_bytes(b"img");
        assert_eq!(
            detector.evaluate(&snapshot(b"img"), Some(&last)),
            ChangeVerdict::Changed
        );
    }

    #[tokio::test]
    async fn test_fingerprint_file_matches_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shot.png");
        std::fs::write(&path, b"file bytes").unwrap();

        let fp = fingerprint_file(&path).await.unwrap();
        assert_eq!(fp, fingerprint_bytes(b"file bytes"));
    }
}

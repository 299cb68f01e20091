//! Table extraction from captured screenshots.
//!
//! The watcher only depends on the [`TableExtractor`] trait; the production
//! implementation is the vision-model client in [`vision`].

pub mod vision;

pub use vision::VisionClient;

use crate::types::{ExtractionError, ExtractionResult, Snapshot};
use async_trait::async_trait;
use tracing::{error, info, warn};

/// Instruction sent alongside every screenshot
pub const TABLE_PROMPT: &str = r#"Extract the data from this table image and format it as a tab-separated table.

Rules:
- Preserve all rows and columns exactly as shown
- Use tabs (\t) to separate columns
- Include the header row if present
- Do not add any explanation or commentary
- Output ONLY the extracted table data
- Maintain numerical precision
- Keep column alignment

Example output format:
Player\tWeek\tOpponent\tYards\tAccuracy
Baker Mayfield\t1\t@ATL\t167\t53.1
Baker Mayfield\t2\t@HOU\t215\t65.8

Now extract the table:"#;

/// Trait for services turning a table screenshot into tab-separated text
#[async_trait]
pub trait TableExtractor: Send + Sync {
    /// Run extraction, reporting every failure
    async fn extract_table(&self, snapshot: &Snapshot) -> Result<ExtractionResult, ExtractionError>;

    /// Run extraction, logging failures and collapsing them to `None`
    async fn extract(&self, snapshot: &Snapshot) -> Option<ExtractionResult> {
        match self.extract_table(snapshot).await {
            Ok(result) => {
                info!("Successfully extracted {} lines", result.line_count());
                Some(result)
            }
            Err(ExtractionError::NoContent) => {
                warn!("No data extracted from image");
                None
            }
            Err(ExtractionError::Service { status, message }) => {
                error!("OCR service error ({}): {}", status, message);
                None
            }
            Err(e) => {
                error!("Failed to extract data: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change_detector::fingerprint_bytes;
    use chrono::Utc;
    use std::path::PathBuf;

    struct Canned(fn() -> Result<ExtractionResult, ExtractionError>);

    #[async_trait]
    impl TableExtractor for Canned {
        async fn extract_table(&self, _: &Snapshot) -> Result<ExtractionResult, ExtractionError> {
            (self.0)()
        }
    }

    fn snapshot() -> Snapshot {
        Snapshot {
            path: PathBuf::from("shot.png"),
            captured_at: Utc::now(),
            fingerprint: fingerprint_bytes(b"x"),
        }
    }

    #[test]
    fn test_prompt_asks_for_tabs_and_header() {
        assert!(TABLE_PROMPT.contains("tab-separated"));
        assert!(TABLE_PROMPT.contains("Include the header row"));
        assert!(TABLE_PROMPT.contains("Maintain numerical precision"));
    }

    #[tokio::test]
    async fn test_extract_passes_text_through() {
        let extractor = Canned(|| {
            Ok(ExtractionResult {
                text: "Player\tWeek\nBaker Mayfield\t1".to_string(),
            })
        });
        let result = extractor.extract(&snapshot()).await.unwrap();
        assert_eq!(result.line_count(), 2);
    }

    #[tokio::test]
    async fn test_extract_collapses_errors() {
        let service = Canned(|| {
            Err(ExtractionError::Service {
                status: 529,
                message: "Overloaded".to_string(),
            })
        });
        assert!(service.extract(&snapshot()).await.is_none());

        let empty = Canned(|| Err(ExtractionError::NoContent));
        assert!(empty.extract(&snapshot()).await.is_none());
    }
}

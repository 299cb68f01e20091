//! Bulk insert of mapped records into the Supabase REST interface.

use crate::config::StoreConfig;
use crate::types::{OutputRecord, UploadError, UploadOutcome};
use async_trait::async_trait;
use tracing::{error, info, warn};

/// Destination for mapped records
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Insert the batch, returning how many rows the store accepted
    async fn insert(&self, records: &[OutputRecord]) -> Result<usize, UploadError>;

    /// Upload a batch, logging the result
    ///
    /// An empty batch is reported as a failure without touching the network.
    async fn upload(&self, records: &[OutputRecord]) -> UploadOutcome {
        if records.is_empty() {
            warn!("No data to send to the store");
            return UploadOutcome::failed();
        }

        info!("Sending {} records to the store...", records.len());
        match self.insert(records).await {
            Ok(inserted) => {
                if inserted < records.len() {
                    warn!(
                        "Store accepted {} of {} records",
                        inserted,
                        records.len()
                    );
                } else {
                    info!("Successfully inserted {} records", inserted);
                }
                UploadOutcome::inserted(inserted)
            }
            Err(e) => {
                error!("Failed to send data to the store: {}", e);
                UploadOutcome::failed()
            }
        }
    }
}

/// PostgREST client for one table
pub struct StoreClient {
    http: reqwest::Client,
    insert_url: String,
    api_key: String,
}

impl StoreClient {
    /// Build a client from configuration (the API key must already be validated)
    pub fn from_config(config: &StoreConfig) -> Result<Self, UploadError> {
        let http = reqwest::Client::builder().timeout(config.timeout()).build()?;
        Ok(Self::with_http(config, http))
    }

    /// Build a client around an existing HTTP client
    pub fn with_http(config: &StoreConfig, http: reqwest::Client) -> Self {
        Self {
            http,
            insert_url: format!(
                "{}/rest/v1/{}",
                config.url.trim_end_matches('/'),
                config.table
            ),
            api_key: config.api_key.as_deref().unwrap_or_default().trim().to_string(),
        }
    }

    pub fn insert_url(&self) -> &str {
        &self.insert_url
    }
}

#[async_trait]
impl RecordSink for StoreClient {
    async fn insert(&self, records: &[OutputRecord]) -> Result<usize, UploadError> {
        let response = self
            .http
            .post(&self.insert_url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header("Prefer", "return=representation")
            .json(records)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(UploadError::Service {
                status: status.as_u16(),
                body,
            });
        }

        let inserted: Vec<serde_json::Value> = serde_json::from_str(&body)
            .map_err(|e| UploadError::InvalidResponse(e.to_string()))?;
        Ok(inserted.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Sink that counts calls and reports a fixed result
    struct CountingSink {
        calls: AtomicUsize,
        accept: Option<usize>,
    }

    #[async_trait]
    impl RecordSink for CountingSink {
        async fn insert(&self, _records: &[OutputRecord]) -> Result<usize, UploadError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.accept.ok_or_else(|| UploadError::Service {
                status: 409,
                body: "duplicate key".to_string(),
            })
        }
    }

    fn record() -> OutputRecord {
        OutputRecord {
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
        }
    }

    #[tokio::test]
    async fn test_empty_upload_skips_insert() {
        let sink = CountingSink {
            calls: AtomicUsize::new(0),
            accept: Some(0),
        };
        assert_eq!(sink.upload(&[]).await, UploadOutcome::failed());
        assert_eq!(sink.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_partial_insert_is_success() {
        let sink = CountingSink {
            calls: AtomicUsize::new(0),
            accept: Some(1),
        };
        let outcome = sink.upload(&[record(), record()]).await;
        assert!(outcome.success);
        assert_eq!(outcome.inserted_count, 1);
    }

    #[tokio::test]
    async fn test_store_error_is_failure() {
        let sink = CountingSink {
            calls: AtomicUsize::new(0),
            accept: None,
        };
        assert_eq!(sink.upload(&[record()]).await, UploadOutcome::failed());
        assert_eq!(sink.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_insert_url() {
        let config = StoreConfig {
            url: "https://example.supabase.co/".to_string(),
            api_key: Some("anon \n".to_string()),
            ..StoreConfig::default()
        };
        let client = StoreClient::from_config(&config).unwrap();
        assert_eq!(
            client.insert_url(),
            "https://example.supabase.co/rest/v1/qb_weekly_data"
        );
        assert_eq!(client.api_key, "anon");
    }
}

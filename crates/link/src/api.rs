//! REST client for the print server's read endpoints.
//!
//! Wraps `GET /getprinterinfo` (full snapshot) and
//! `POST /refetchtimedata` (per-job timing) using [`reqwest`]. The API root
//! can be switched at runtime when the server endpoint is reconfigured.

use std::time::Duration;

use serde::Deserialize;
use tokio::sync::RwLock;

use printdeck_core::printer::Printer;
use printdeck_core::types::DbId;

/// HTTP request timeout for a single call to the print server.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client for the print server.
pub struct FarmApi {
    client: reqwest::Client,
    api_root: RwLock<String>,
}

/// Timing data returned by `POST /refetchtimedata`.
///
/// `total` is the estimated print duration in seconds. The other fields are
/// `isoformat()` strings, with `0001-01-01T00:00:00` meaning "not set".
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TimeData {
    #[serde(default)]
    pub total: f64,
    #[serde(default)]
    pub eta: Option<String>,
    #[serde(default)]
    pub timestart: Option<String>,
    #[serde(default)]
    pub pause: Option<String>,
}

/// Errors from the REST layer.
#[derive(Debug, thiserror::Error)]
pub enum FarmApiError {
    /// The HTTP request itself failed (network, DNS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The server returned a non-2xx status code.
    #[error("Print server error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },
}

impl FarmApi {
    /// Create a client rooted at `api_root`, e.g. `http://192.168.1.20:8000`.
    pub fn new(api_root: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Failed to build HTTP client, using defaults");
                reqwest::Client::new()
            });
        Self::with_client(client, api_root)
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, api_root: String) -> Self {
        Self {
            client,
            api_root: RwLock::new(api_root),
        }
    }

    pub async fn api_root(&self) -> String {
        self.api_root.read().await.clone()
    }

    /// Point subsequent requests at a new server root.
    pub async fn set_api_root(&self, api_root: String) {
        tracing::info!(%api_root, "Print server API root changed");
        *self.api_root.write().await = api_root;
    }

    /// Fetch every registered printer together with its queue.
    ///
    /// Sends `GET /getprinterinfo`.
    pub async fn get_printer_info(&self) -> Result<Vec<Printer>, FarmApiError> {
        let url = format!("{}/getprinterinfo", self.api_root().await);
        let response = self.client.get(url).send().await?;

        Self::parse_response(response).await
    }

    /// Fetch the timing of the job at the head of a printer's queue.
    ///
    /// Sends `POST /refetchtimedata` with `{printerid, jobid}`.
    pub async fn refetch_time(
        &self,
        printer_id: DbId,
        job_id: DbId,
    ) -> Result<TimeData, FarmApiError> {
        let body = serde_json::json!({
            "printerid": printer_id,
            "jobid": job_id,
        });

        let url = format!("{}/refetchtimedata", self.api_root().await);
        let response = self.client.post(url).json(&body).send().await?;

        Self::parse_response(response).await
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code, otherwise return a
    /// [`FarmApiError::ApiError`] with the status and body text.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, FarmApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(FarmApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, FarmApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_time_data() {
        let json = r#"{"total": 600, "eta": "2024-05-01T12:10:00",
            "timestart": "2024-05-01T12:00:00", "pause": "0001-01-01T00:00:00"}"#;
        let data: TimeData = serde_json::from_str(json).unwrap();
        assert_eq!(data.total, 600.0);
        assert_eq!(data.eta.as_deref(), Some("2024-05-01T12:10:00"));
        assert_eq!(data.pause.as_deref(), Some("0001-01-01T00:00:00"));
    }

    #[test]
    fn decode_time_data_with_missing_fields() {
        let data: TimeData = serde_json::from_str(r#"{"total": 12.5}"#).unwrap();
        assert_eq!(data.total, 12.5);
        assert!(data.eta.is_none());
        assert!(data.timestart.is_none());
    }

    #[tokio::test]
    async fn api_root_can_be_switched() {
        let api = FarmApi::new("http://127.0.0.1:8000".into());
        api.set_api_root("http://10.0.0.2:9000".into()).await;
        assert_eq!(api.api_root().await, "http://10.0.0.2:9000");
    }
}

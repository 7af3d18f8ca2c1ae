//! HTTP data provider for the metrics backend.
//!
//! Routes:
//! - `GET /data/{rule}/{g}/{start}/{end}[/{value}]`: bucket documents
//! - `GET /tabular/{rule}/{g}/{start}/{end}[/{value}]`: `{"data": [{time, value}]}`
//! - `GET /metadata/{rule}/{g}`: `{"values": [...]}`
//!
//! Path timestamps are `YYYY-MM-DDTHH:mm:ssZ`. The backend reports failures
//! as `{"error": "..."}` with a 4xx/5xx status.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, warn};

use metricboard_core::data::{parse_documents, parse_metadata, parse_points};
use metricboard_core::granularity::format_iso;
use metricboard_core::{BucketDocument, Granularity, RawPoint};

use crate::provider::{DataProvider, ProviderError};

pub struct HttpProvider {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl HttpProvider {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ProviderError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("metricboard/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProviderError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `/{route}/{rule}/{g}/{start}/{end}[/{value}]`
    fn window_url(
        &self,
        route: &str,
        rule_index: usize,
        granularity: Granularity,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        value_type: Option<&str>,
    ) -> String {
        let mut url = format!(
            "{}/{route}/{rule_index}/{}/{}/{}",
            self.base_url,
            granularity.code(),
            format_iso(start),
            format_iso(end),
        );
        if let Some(value) = value_type {
            url.push('/');
            url.push_str(&urlencoding::encode(value));
        }
        url
    }

    fn metadata_url(&self, rule_index: usize, granularity: Granularity) -> String {
        format!(
            "{}/metadata/{rule_index}/{}",
            self.base_url,
            granularity.code()
        )
    }

    /// GET `url` and decode the body as JSON, mapping non-2xx statuses to
    /// `ProviderError::Server` with the backend's `error` message.
    fn get_json(&self, url: &str) -> Result<Value, ProviderError> {
        debug!(url, "GET");
        let resp = self.client.get(url).send().map_err(|e| {
            warn!(url, error = %e, "request failed");
            ProviderError::Network(e.to_string())
        })?;

        let status = resp.status();
        let body = resp
            .text()
            .map_err(|e| ProviderError::Network(format!("failed to read response body: {e}")))?;

        if !status.is_success() {
            let message = error_message(&body).unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("unknown error")
                    .to_string()
            });
            warn!(url, status = status.as_u16(), %message, "backend returned an error");
            return Err(ProviderError::Server {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&body)
            .map_err(|e| ProviderError::ResponseFormat(format!("invalid JSON from {url}: {e}")))
    }

    fn documents(&self, url: &str, granularity: Granularity) -> Result<Vec<BucketDocument>, ProviderError> {
        let body = self.get_json(url)?;
        let batch = parse_documents(&body, granularity)?;
        if batch.skipped > 0 {
            warn!(url, skipped = batch.skipped, "skipped malformed bucket documents");
        }
        Ok(batch.documents)
    }
}

impl DataProvider for HttpProvider {
    fn name(&self) -> &str {
        "http"
    }

    fn fetch_bucketed(
        &self,
        rule_index: usize,
        granularity: Granularity,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<BucketDocument>, ProviderError> {
        let url = self.window_url("data", rule_index, granularity, start, end, None);
        self.documents(&url, granularity)
    }

    fn fetch_bucketed_by_value(
        &self,
        rule_index: usize,
        granularity: Granularity,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        value_type: &str,
    ) -> Result<Vec<BucketDocument>, ProviderError> {
        let url = self.window_url("data", rule_index, granularity, start, end, Some(value_type));
        self.documents(&url, granularity)
    }

    fn fetch_metadata(
        &self,
        rule_index: usize,
        granularity: Granularity,
    ) -> Result<Vec<String>, ProviderError> {
        let body = self.get_json(&self.metadata_url(rule_index, granularity))?;
        Ok(parse_metadata(&body)?)
    }

    fn fetch_tabular(
        &self,
        rule_index: usize,
        granularity: Granularity,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        value_type: Option<&str>,
    ) -> Result<Vec<RawPoint>, ProviderError> {
        let url = self.window_url("tabular", rule_index, granularity, start, end, value_type);
        let body = self.get_json(&url)?;
        Ok(parse_points(&body)?)
    }
}

/// The `error` field of a backend error body, if there is one.
fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    match value.get("error")? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

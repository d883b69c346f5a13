//! Client for the external log-aggregation backend.
//!
//! Scoring jobs emit their logs into a Loki-style backend; the API proxies
//! a single job's time-range query so callers never talk to the backend
//! directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

/// Maximum log lines returned per query.
pub const MAX_LOG_LINES: u32 = 1000;

/// One log line of a scoring job.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub line: String,
}

#[derive(Debug, Deserialize)]
struct QueryRangeResponse {
    data: QueryRangeData,
}

#[derive(Debug, Deserialize)]
struct QueryRangeData {
    result: Vec<StreamResult>,
}

#[derive(Debug, Deserialize)]
struct StreamResult {
    /// Pairs of (nanosecond timestamp, line).
    values: Vec<(String, String)>,
}

/// Thin query client for the log backend.
pub struct LogStream {
    client: reqwest::Client,
    base_url: String,
}

impl LogStream {
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    /// Fetch a job's log lines within `[start, end]`, oldest first.
    pub async fn job_logs(
        &self,
        job_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<LogEntry>, AppError> {
        let query = format!("{{job_id=\"{}\"}}", job_id);
        let start_ns = start.timestamp_nanos_opt().unwrap_or(0).to_string();
        let end_ns = end.timestamp_nanos_opt().unwrap_or(i64::MAX).to_string();
        let limit = limit.min(MAX_LOG_LINES).to_string();

        let response: QueryRangeResponse = self
            .client
            .get(format!(
                "{}/loki/api/v1/query_range",
                self.base_url.trim_end_matches('/')
            ))
            .query(&[
                ("query", query.as_str()),
                ("start", start_ns.as_str()),
                ("end", end_ns.as_str()),
                ("limit", limit.as_str()),
                ("direction", "forward"),
            ])
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Log backend request failed: {}", e)))?
            .error_for_status()
            .map_err(|e| AppError::Internal(format!("Log backend returned an error: {}", e)))?
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("Log backend response malformed: {}", e)))?;

        Ok(collect_entries(response))
    }
}

/// Flatten all streams into one ascending list of entries.
fn collect_entries(response: QueryRangeResponse) -> Vec<LogEntry> {
    let mut entries: Vec<LogEntry> = response
        .data
        .result
        .into_iter()
        .flat_map(|stream| stream.values)
        .filter_map(|(ts_ns, line)| {
            let nanos: i64 = ts_ns.parse().ok()?;
            let timestamp = DateTime::from_timestamp(
                nanos.div_euclid(1_000_000_000),
                nanos.rem_euclid(1_000_000_000) as u32,
            )?;
            Some(LogEntry { timestamp, line })
        })
        .collect();

    entries.sort_by_key(|entry| entry.timestamp);
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_entries_sorts_and_parses() {
        let raw = r#"{
            "data": {
                "result": [
                    {"values": [["1700000002000000000", "second"], ["1700000000000000000", "first"]]},
                    {"values": [["1700000001000000000", "between"]]}
                ]
            }
        }"#;
        let response: QueryRangeResponse = serde_json::from_str(raw).unwrap();
        let entries = collect_entries(response);

        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].line, "first");
        assert_eq!(entries[1].line, "between");
        assert_eq!(entries[2].line, "second");
    }

    #[test]
    fn test_collect_entries_skips_malformed_timestamps() {
        let raw = r#"{
            "data": {
                "result": [
                    {"values": [["not-a-number", "bad"], ["1700000000000000000", "good"]]}
                ]
            }
        }"#;
        let response: QueryRangeResponse = serde_json::from_str(raw).unwrap();
        let entries = collect_entries(response);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].line, "good");
    }
}

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One raw record as returned by a source for one page, before normalization.
/// The generic pipeline never interprets these fields beyond the `id` lookup;
/// source-specific shapes stay behind the fetcher boundary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawItem {
    pub fields: HashMap<String, serde_json::Value>,
}

impl RawItem {
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.fields.get(key)
    }
}

/// One bounded unit of data returned by a single fetch call.
#[derive(Debug, Clone, Default)]
pub struct RawPage {
    pub items: Vec<RawItem>,
}

/// Result of a single page-fetch attempt. Transport faults are data here,
/// not `Err` values: the driver treats every non-success variant the same way.
#[derive(Debug)]
pub enum FetchOutcome {
    Success(RawPage),
    HttpError(u16),
    Timeout,
    TransportError(String),
}

/// Normalized product record, unified across all sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub title: String,
    pub source: String,
    pub price: Option<f64>,
    pub category: Option<String>,
    pub processed_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    TimeoutAfterRetries,
    PipelineCrash,
}

/// Append-only record of a source that stopped abnormally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub endpoint: String,
    #[serde(rename = "error")]
    pub kind: ErrorKind,
    pub timestamp: String,
}

impl ErrorRecord {
    pub fn new(endpoint: &str, kind: ErrorKind) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            kind,
            timestamp: utc_timestamp(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub total_products: usize,
    pub processing_time_seconds: f64,
    /// `None` when no request was ever attempted (serialized as JSON null).
    pub success_rate: Option<f64>,
    pub sources: Vec<String>,
}

/// Final merged output handed to the output boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub summary: Summary,
    pub products: Vec<Product>,
    pub errors: Vec<ErrorRecord>,
}

pub fn utc_timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

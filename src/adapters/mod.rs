use crate::config::SourceDescriptor;
use crate::domain::model::{FetchOutcome, RawItem, RawPage, Report};
use crate::domain::ports::{SourceFetcher, Storage};
use crate::utils::error::Result;
use reqwest::Client;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Generic fetcher for JSON APIs that paginate with skip/limit or
/// page-number query parameters.
///
/// The endpoint is a template: `{skip}`, `{limit}` and `{page}` placeholders
/// are substituted per request, so both offset-based and page-based sources
/// fit without custom code. Source quirks (item array nesting, renamed
/// fields) are handled here and never leak into the pipeline.
pub struct JsonApiFetcher {
    client: Client,
    endpoint: String,
    page_size: u32,
    items_path: String,
    field_aliases: HashMap<String, String>,
}

impl JsonApiFetcher {
    pub fn new(descriptor: &SourceDescriptor) -> Self {
        Self {
            client: Client::new(),
            endpoint: descriptor.endpoint.clone(),
            page_size: descriptor.page_size,
            items_path: descriptor.items_path.clone(),
            field_aliases: descriptor.field_aliases.clone(),
        }
    }

    fn build_url(&self, page: u32) -> String {
        let skip = (page - 1) * self.page_size;
        self.endpoint
            .replace("{skip}", &skip.to_string())
            .replace("{limit}", &self.page_size.to_string())
            .replace("{page}", &page.to_string())
    }

    fn unwrap_items(&self, body: &serde_json::Value) -> Vec<RawItem> {
        let mut node = body;
        if !self.items_path.is_empty() {
            for key in self.items_path.split('.') {
                match node.get(key) {
                    Some(next) => node = next,
                    None => {
                        tracing::warn!(items_path = %self.items_path, "items path not found in response");
                        return Vec::new();
                    }
                }
            }
        }

        let Some(items) = node.as_array() else {
            return Vec::new();
        };

        items
            .iter()
            .filter_map(|value| value.as_object())
            .map(|object| {
                let mut fields = HashMap::new();
                for (key, value) in object {
                    let name = self.field_aliases.get(key).unwrap_or(key);
                    fields.insert(name.clone(), value.clone());
                }
                RawItem { fields }
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl SourceFetcher for JsonApiFetcher {
    async fn fetch_page(&self, page: u32) -> FetchOutcome {
        let url = self.build_url(page);
        tracing::debug!(%url, "requesting page");

        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => return FetchOutcome::Timeout,
            Err(e) => return FetchOutcome::TransportError(e.to_string()),
        };

        let status = response.status();
        if !status.is_success() {
            return FetchOutcome::HttpError(status.as_u16());
        }

        match response.json::<serde_json::Value>().await {
            Ok(body) => FetchOutcome::Success(RawPage {
                items: self.unwrap_items(&body),
            }),
            Err(e) => FetchOutcome::TransportError(e.to_string()),
        }
    }
}

/// Local filesystem output boundary.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: String,
}

impl LocalStorage {
    pub fn new(base_path: String) -> Self {
        Self { base_path }
    }
}

impl Storage for LocalStorage {
    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = Path::new(&self.base_path).join(path);

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(full_path, data)?;
        Ok(())
    }
}

/// Serializes the report and hands it to the output boundary. Returns the
/// file name written.
pub async fn write_report(
    storage: &impl Storage,
    report: &Report,
    file_name: &str,
) -> Result<String> {
    let data = serde_json::to_vec_pretty(report)?;
    storage.write_file(file_name, &data).await?;
    Ok(file_name.to_string())
}

use crate::config::PipelineConfig;
use crate::core::accumulator::Accumulator;
use crate::core::pool::WorkerPool;
use crate::domain::model::{utc_timestamp, ErrorKind, ErrorRecord, FetchOutcome, Product, RawItem};
use crate::domain::ports::SourceFetcher;
use std::sync::Arc;

/// Pairs a fetcher implementation with the identity the pipeline needs:
/// a display name and the prefix that keeps its ids globally unique.
#[derive(Clone)]
pub struct SourceSpec {
    pub name: String,
    pub id_prefix: String,
    pub fetcher: Arc<dyn SourceFetcher>,
}

/// Drives one source's pagination loop to exhaustion: fetches pages in
/// strictly increasing order, applies bounded retry with geometric backoff,
/// and hands each page's normalization to the shared worker pool.
pub struct SourceDriver {
    spec: SourceSpec,
    config: PipelineConfig,
    pool: WorkerPool,
    accumulator: Arc<Accumulator>,
}

impl SourceDriver {
    pub fn new(
        spec: SourceSpec,
        config: PipelineConfig,
        pool: WorkerPool,
        accumulator: Arc<Accumulator>,
    ) -> Self {
        Self {
            spec,
            config,
            pool,
            accumulator,
        }
    }

    /// Runs the source to completion. Never returns an error: every failure
    /// mode ends up as recorded data in the accumulator.
    pub async fn run(self) {
        tracing::info!(source = %self.spec.name, "starting source driver");
        self.paginate().await;
        tracing::info!(source = %self.spec.name, "source driver finished");
    }

    async fn paginate(&self) {
        let mut page: u32 = 1;
        let mut retry_count: u32 = 0;

        loop {
            let outcome = self.fetch_with_timeout(page).await;
            let raw_page = match outcome {
                FetchOutcome::Success(raw_page) => raw_page,
                failure => {
                    self.accumulator.record_failure(1);
                    tracing::warn!(
                        source = %self.spec.name,
                        page,
                        outcome = ?failure,
                        "page fetch failed"
                    );

                    if retry_count >= self.config.num_retries {
                        tracing::warn!(source = %self.spec.name, "retry budget exhausted");
                        self.accumulator.add_error(ErrorRecord::new(
                            &self.spec.name,
                            ErrorKind::TimeoutAfterRetries,
                        ));
                        return;
                    }
                    tokio::time::sleep(self.config.backoff_delay(retry_count)).await;
                    retry_count += 1;
                    continue;
                }
            };

            self.accumulator.record_success(1);
            // Deliberate asymmetry: once a source has succeeded, it only gets
            // a single fast retry before its failure budget counts as spent.
            retry_count = 1;

            if raw_page.items.is_empty() {
                tracing::debug!(source = %self.spec.name, page, "empty page, source exhausted");
                return;
            }

            self.dispatch_page(page, raw_page.items);
            tokio::time::sleep(self.config.request_delay()).await;
            page += 1;
        }
    }

    async fn fetch_with_timeout(&self, page: u32) -> FetchOutcome {
        match tokio::time::timeout(
            self.config.fetch_timeout(),
            self.spec.fetcher.fetch_page(page),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_) => FetchOutcome::Timeout,
        }
    }

    fn dispatch_page(&self, page: u32, items: Vec<RawItem>) {
        tracing::debug!(source = %self.spec.name, page, count = items.len(), "dispatching page");
        let source = self.spec.name.clone();
        let prefix = self.spec.id_prefix.clone();
        let accumulator = Arc::clone(&self.accumulator);
        self.pool.submit(async move {
            let batch = normalize_items(items, &source, &prefix);
            accumulator.add_products(batch);
        });
    }
}

/// Converts one page of raw items into the unified product shape. Items
/// without an `id` field are dropped (policy: such records are unusable, not
/// an error). Input order is preserved.
pub fn normalize_items(items: Vec<RawItem>, source: &str, id_prefix: &str) -> Vec<Product> {
    let mut result = Vec::with_capacity(items.len());
    for item in items {
        let id = match item.get("id") {
            Some(value) => format!("{}{}", id_prefix, json_value_to_string(value)),
            None => continue,
        };
        result.push(Product {
            id,
            title: item
                .get("title")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            source: source.to_string(),
            price: item.get("price").and_then(|v| v.as_f64()),
            category: item
                .get("category")
                .and_then(|v| v.as_str())
                .map(String::from),
            processed_at: utc_timestamp(),
        });
    }
    result
}

fn json_value_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::RawPage;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tokio::time::Instant;

    fn raw_item(pairs: &[(&str, serde_json::Value)]) -> RawItem {
        let mut fields = HashMap::new();
        for (key, value) in pairs {
            fields.insert(key.to_string(), value.clone());
        }
        RawItem { fields }
    }

    fn test_config() -> PipelineConfig {
        PipelineConfig {
            num_retries: 3,
            first_retry_delay_seconds: 0.2,
            retry_backoff_multiplier: 2.0,
            endpoint_delay_between_requests_seconds: 0.2,
            worker_thread_count: 4,
            timeout_seconds: 2.0,
        }
    }

    /// Returns a fixed set of pages, then empty pages forever.
    struct PagedFetcher {
        pages: Vec<Vec<RawItem>>,
    }

    #[async_trait]
    impl SourceFetcher for PagedFetcher {
        async fn fetch_page(&self, page: u32) -> FetchOutcome {
            let items = self
                .pages
                .get((page - 1) as usize)
                .cloned()
                .unwrap_or_default();
            FetchOutcome::Success(RawPage { items })
        }
    }

    /// Always fails with an HTTP error.
    struct FailingFetcher;

    #[async_trait]
    impl SourceFetcher for FailingFetcher {
        async fn fetch_page(&self, _page: u32) -> FetchOutcome {
            FetchOutcome::HttpError(404)
        }
    }

    /// Succeeds for the first `good_pages` fetches, then fails forever.
    struct FlakyFetcher {
        good_pages: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl SourceFetcher for FlakyFetcher {
        async fn fetch_page(&self, _page: u32) -> FetchOutcome {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.good_pages {
                FetchOutcome::Success(RawPage {
                    items: vec![raw_item(&[("id", serde_json::json!(call))])],
                })
            } else {
                FetchOutcome::HttpError(500)
            }
        }
    }

    async fn run_driver(
        fetcher: Arc<dyn SourceFetcher>,
        config: PipelineConfig,
    ) -> Arc<Accumulator> {
        let pool = WorkerPool::new(config.worker_thread_count);
        let accumulator = Arc::new(Accumulator::new());
        let spec = SourceSpec {
            name: "source".to_string(),
            id_prefix: "a.".to_string(),
            fetcher,
        };
        let driver = SourceDriver::new(spec, config, pool.clone(), Arc::clone(&accumulator));
        driver.run().await;
        pool.drain().await;
        accumulator
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_and_normalize_single_source() {
        let fetcher = Arc::new(PagedFetcher {
            pages: vec![vec![
                raw_item(&[
                    ("id", serde_json::json!(1)),
                    ("title", serde_json::json!("brown shirt")),
                    ("category", serde_json::json!("clothes")),
                ]),
                raw_item(&[
                    ("id", serde_json::json!(2)),
                    ("title", serde_json::json!("grey pants")),
                    ("category", serde_json::json!("clothes")),
                    ("price", serde_json::json!(25)),
                ]),
                raw_item(&[
                    ("id", serde_json::json!(3)),
                    ("title", serde_json::json!("blue hoodie")),
                    ("category", serde_json::json!("clothes")),
                    ("price", serde_json::json!(30)),
                ]),
                raw_item(&[
                    ("id", serde_json::json!(4)),
                    ("title", serde_json::json!("calculator")),
                    ("category", serde_json::json!("electronics")),
                    ("price", serde_json::json!(60)),
                ]),
            ]],
        });

        let state = run_driver(fetcher, test_config()).await.take();

        // One page of data plus the terminating empty page.
        assert_eq!(state.successful_requests, 2);
        assert_eq!(state.failed_requests, 0);
        assert!(state.errors.is_empty());

        assert_eq!(state.products.len(), 4);
        assert_eq!(state.products[0].id, "a.1");
        assert_eq!(state.products[0].title, "brown shirt");
        assert_eq!(state.products[0].source, "source");
        assert_eq!(state.products[0].category.as_deref(), Some("clothes"));
        assert_eq!(state.products[0].price, None);
        assert_eq!(state.products[1].price, Some(25.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_backoff_until_budget_exhausted() {
        let start = Instant::now();
        let state = run_driver(Arc::new(FailingFetcher), test_config())
            .await
            .take();
        let elapsed = start.elapsed();

        // 1 initial attempt + num_retries retries.
        assert_eq!(state.failed_requests, 4);
        assert_eq!(state.successful_requests, 0);
        assert!(state.products.is_empty());

        assert_eq!(state.errors.len(), 1);
        assert_eq!(state.errors[0].kind, ErrorKind::TimeoutAfterRetries);
        assert_eq!(state.errors[0].endpoint, "source");

        // Geometric backoff: 0.2 + 0.4 + 0.8 = 1.4s.
        assert!(
            elapsed >= Duration::from_millis(1300) && elapsed < Duration::from_millis(1500),
            "expected ~1.4s, got {:?}",
            elapsed
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_count_resets_to_one_after_success() {
        let fetcher = Arc::new(FlakyFetcher {
            good_pages: 1,
            calls: AtomicU32::new(0),
        });
        let state = run_driver(fetcher, test_config()).await.take();

        // After a success the retry count restarts at 1, not 0, so only
        // num_retries further attempts fit in the budget.
        assert_eq!(state.successful_requests, 1);
        assert_eq!(state.failed_requests, 3);
        assert_eq!(state.errors.len(), 1);
        assert_eq!(state.products.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_items_without_id_are_dropped() {
        let fetcher = Arc::new(PagedFetcher {
            pages: vec![vec![
                raw_item(&[("id", serde_json::json!(1)), ("title", serde_json::json!("kept"))]),
                raw_item(&[("title", serde_json::json!("no id, dropped"))]),
                raw_item(&[("id", serde_json::json!("abc"))]),
            ]],
        });
        let state = run_driver(fetcher, test_config()).await.take();

        assert_eq!(state.products.len(), 2);
        assert_eq!(state.products[0].id, "a.1");
        assert_eq!(state.products[1].id, "a.abc");
        // Absent optional fields get defined defaults.
        assert_eq!(state.products[1].title, "");
        assert_eq!(state.products[1].price, None);
        assert_eq!(state.products[1].category, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_fetch_times_out_and_counts_as_failure() {
        struct SlowFetcher;

        #[async_trait]
        impl SourceFetcher for SlowFetcher {
            async fn fetch_page(&self, _page: u32) -> FetchOutcome {
                tokio::time::sleep(Duration::from_secs(60)).await;
                FetchOutcome::Success(RawPage::default())
            }
        }

        let mut config = test_config();
        config.num_retries = 1;
        let state = run_driver(Arc::new(SlowFetcher), config).await.take();

        assert_eq!(state.failed_requests, 2);
        assert_eq!(state.errors.len(), 1);
        assert_eq!(state.errors[0].kind, ErrorKind::TimeoutAfterRetries);
    }
}

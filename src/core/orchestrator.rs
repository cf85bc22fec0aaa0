use crate::config::PipelineConfig;
use crate::core::accumulator::Accumulator;
use crate::core::driver::{SourceDriver, SourceSpec};
use crate::core::pool::WorkerPool;
use crate::domain::model::{ErrorKind, ErrorRecord, Report, Summary};
use std::sync::Arc;
use tokio::time::Instant;

/// Runs every configured source concurrently and merges the results.
///
/// There is no hard-failure exit path: a source that exhausts its retries or
/// crashes outright is reduced to error records and a lower success rate,
/// and the remaining sources run to completion regardless.
pub struct Orchestrator {
    config: PipelineConfig,
    sources: Vec<SourceSpec>,
    pool: WorkerPool,
}

impl Orchestrator {
    pub fn new(config: PipelineConfig, sources: Vec<SourceSpec>) -> Self {
        let pool = WorkerPool::new(config.worker_thread_count);
        Self {
            config,
            sources,
            pool,
        }
    }

    pub async fn run(self) -> Report {
        let started = Instant::now();
        let source_names: Vec<String> = self.sources.iter().map(|s| s.name.clone()).collect();
        tracing::info!(
            sources = self.sources.len(),
            workers = self.config.worker_thread_count,
            "starting aggregation run"
        );

        let mut drivers = Vec::with_capacity(self.sources.len());
        for spec in self.sources {
            let accumulator = Arc::new(Accumulator::new());
            let name = spec.name.clone();
            let driver = SourceDriver::new(
                spec,
                self.config.clone(),
                self.pool.clone(),
                Arc::clone(&accumulator),
            );
            let handle = tokio::spawn(driver.run());
            drivers.push((name, accumulator, handle));
        }

        let mut accumulators = Vec::with_capacity(drivers.len());
        for (name, accumulator, handle) in drivers {
            // A panicked driver becomes a recorded crash for that source;
            // the rest of the run is unaffected.
            if let Err(join_error) = handle.await {
                tracing::error!(source = %name, error = %join_error, "source driver crashed");
                accumulator.add_error(ErrorRecord::new(&name, ErrorKind::PipelineCrash));
            }
            accumulators.push(accumulator);
        }

        // Every driver has stopped submitting; wait out in-flight
        // normalization before reading any accumulator.
        self.pool.drain().await;

        let mut products = Vec::new();
        let mut errors = Vec::new();
        let mut successes: u64 = 0;
        let mut failures: u64 = 0;
        for accumulator in accumulators {
            let state = accumulator.take();
            products.extend(state.products);
            errors.extend(state.errors);
            successes += state.successful_requests;
            failures += state.failed_requests;
        }

        let elapsed = started.elapsed().as_secs_f64();
        tracing::info!(
            total_products = products.len(),
            successful_requests = successes,
            failed_requests = failures,
            elapsed_seconds = elapsed,
            "aggregation run complete"
        );

        Report {
            summary: Summary {
                total_products: products.len(),
                processing_time_seconds: elapsed,
                success_rate: success_rate(successes, failures),
                sources: source_names,
            },
            products,
            errors,
        }
    }
}

/// Undefined when nothing was ever attempted; reported as `None` instead of
/// dividing by zero.
pub fn success_rate(successes: u64, failures: u64) -> Option<f64> {
    let attempts = successes + failures;
    if attempts == 0 {
        return None;
    }
    Some(successes as f64 / attempts as f64)
}

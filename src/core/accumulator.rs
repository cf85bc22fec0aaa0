use crate::domain::model::{ErrorRecord, Product};
use std::sync::Mutex;

/// Everything one source accumulates over its run. Merged into the final
/// report once the driver and the pool drain have both finished.
#[derive(Debug, Clone, Default)]
pub struct AccumulatorState {
    pub products: Vec<Product>,
    pub errors: Vec<ErrorRecord>,
    pub successful_requests: u64,
    pub failed_requests: u64,
}

/// Thread-safe accumulator mutated concurrently by a source driver and the
/// normalization tasks it dispatches. Each operation is one short critical
/// section; the lock is never held across a fetch or a sleep.
#[derive(Debug, Default)]
pub struct Accumulator {
    state: Mutex<AccumulatorState>,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self, n: u64) {
        self.state.lock().unwrap().successful_requests += n;
    }

    pub fn record_failure(&self, n: u64) {
        self.state.lock().unwrap().failed_requests += n;
    }

    /// Appends a batch, preserving its internal order.
    pub fn add_products(&self, batch: Vec<Product>) {
        self.state.lock().unwrap().products.extend(batch);
    }

    pub fn add_error(&self, record: ErrorRecord) {
        self.state.lock().unwrap().errors.push(record);
    }

    pub fn snapshot(&self) -> AccumulatorState {
        self.state.lock().unwrap().clone()
    }

    /// Moves the accumulated state out, leaving the accumulator empty.
    /// Callers must ensure no writer is still in flight.
    pub fn take(&self) -> AccumulatorState {
        std::mem::take(&mut *self.state.lock().unwrap())
    }
}

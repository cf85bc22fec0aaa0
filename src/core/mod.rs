pub mod accumulator;
pub mod driver;
pub mod orchestrator;
pub mod pool;

pub use accumulator::{Accumulator, AccumulatorState};
pub use driver::{normalize_items, SourceDriver, SourceSpec};
pub use orchestrator::Orchestrator;
pub use pool::WorkerPool;

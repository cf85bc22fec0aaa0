pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use adapters::{JsonApiFetcher, LocalStorage};
pub use config::{PipelineConfig, SourceDescriptor};
pub use core::{orchestrator::Orchestrator, pool::WorkerPool};
pub use domain::model::{ErrorKind, ErrorRecord, FetchOutcome, Product, RawItem, RawPage, Report};
pub use utils::error::{EtlError, Result};

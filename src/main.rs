use anyhow::Context;
use clap::Parser;
use multi_source_etl::adapters::{self, JsonApiFetcher, LocalStorage};
use multi_source_etl::config::{AppConfig, CliConfig};
use multi_source_etl::core::{Orchestrator, SourceSpec};
use multi_source_etl::domain::ports::SourceFetcher;
use multi_source_etl::utils::{logger, validation::Validate};
use std::path::Path;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();
    logger::init_cli_logger(cli.verbose);

    tracing::info!("Starting multi-source-etl");

    let config = AppConfig::from_json_file(Path::new(&cli.config))
        .with_context(|| format!("failed to load config from {}", cli.config))?;
    config.validate().context("configuration validation failed")?;

    if config.sources.is_empty() {
        tracing::warn!("no sources configured; the report will be empty");
    }

    let sources: Vec<SourceSpec> = config
        .sources
        .iter()
        .map(|descriptor| SourceSpec {
            name: descriptor.name.clone(),
            id_prefix: descriptor.id_prefix.clone(),
            fetcher: Arc::new(JsonApiFetcher::new(descriptor)) as Arc<dyn SourceFetcher>,
        })
        .collect();

    let report = Orchestrator::new(config.pipeline, sources).run().await;

    let storage = LocalStorage::new(cli.output_path.clone());
    let file_name = adapters::write_report(&storage, &report, &cli.output_file)
        .await
        .context("failed to write report")?;

    tracing::info!(
        "✅ Done: {} products from {} sources in {:.2}s",
        report.summary.total_products,
        report.summary.sources.len(),
        report.summary.processing_time_seconds
    );
    if !report.errors.is_empty() {
        tracing::warn!("⚠️ {} source error(s) recorded in the report", report.errors.len());
    }
    println!("✅ Results written to {}/{}", cli.output_path, file_name);

    Ok(())
}

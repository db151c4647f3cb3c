use crate::config::RunConfig;
use crate::core::client::HttpLookupClient;
use crate::core::retry::RetryOrchestrator;
use crate::core::{batcher, classify, table};
use crate::domain::model::ValidationReport;
use crate::domain::ports::{LookupClient, Pipeline, Storage};
use crate::utils::error::{Result, ValidatorError};

/// Reads numbers, retrieves lookups with retries, writes the verdict table.
pub struct LookupPipeline<S: Storage, C: LookupClient> {
    storage: S,
    client: C,
    orchestrator: RetryOrchestrator,
    input_path: String,
    timestamp: String,
}

impl<S: Storage> LookupPipeline<S, HttpLookupClient> {
    pub fn new(storage: S, config: &RunConfig, input_path: impl Into<String>) -> Self {
        Self::with_client(storage, HttpLookupClient::new(config), config, input_path)
    }
}

impl<S: Storage, C: LookupClient> LookupPipeline<S, C> {
    pub fn with_client(
        storage: S,
        client: C,
        config: &RunConfig,
        input_path: impl Into<String>,
    ) -> Self {
        Self {
            storage,
            client,
            orchestrator: RetryOrchestrator::from_config(config),
            input_path: input_path.into(),
            timestamp: chrono::Local::now().format("%Y-%m-%d %H-%M-%S").to_string(),
        }
    }

    pub fn output_file_name(&self) -> String {
        format!("output_results-{}.csv", self.timestamp)
    }
}

#[async_trait::async_trait]
impl<S: Storage, C: LookupClient> Pipeline for LookupPipeline<S, C> {
    async fn extract(&self) -> Result<Vec<String>> {
        tracing::debug!("Reading input table {}", self.input_path);
        let data = self
            .storage
            .read_file(&self.input_path)
            .await
            .map_err(|e| ValidatorError::InputError {
                message: format!("cannot read {}: {}", self.input_path, e),
            })?;

        let raw = table::read_first_column(&data).map_err(|e| ValidatorError::InputError {
            message: format!("cannot parse {}: {}", self.input_path, e),
        })?;
        let numbers = batcher::dedupe(&raw);

        if numbers.is_empty() {
            return Err(ValidatorError::InputError {
                message: format!("no phone numbers in the first column of {}", self.input_path),
            });
        }

        tracing::info!(
            "Loaded {} numbers ({} unique) from {}",
            raw.len(),
            numbers.len(),
            self.input_path
        );
        Ok(numbers)
    }

    async fn transform(&self, numbers: Vec<String>) -> Result<ValidationReport> {
        let retrieval = self.orchestrator.retrieve(&self.client, &numbers).await;

        let mut stats = retrieval.stats;
        stats.rows_without_enrichment = retrieval
            .results
            .iter()
            .filter(|r| !r.is_complete())
            .count();
        let rows = classify::classify_all(&retrieval.results);

        tracing::info!(
            "Retrieved {} numbers in {} batches over {} rounds ({} batches dropped, {}/{} recovered individually, {} without enrichment)",
            stats.unique_numbers,
            stats.batches,
            stats.rounds_run,
            stats.dropped_batches,
            stats.tier2_recovered,
            stats.tier2_attempted,
            stats.rows_without_enrichment
        );

        Ok(ValidationReport { rows, stats })
    }

    async fn load(&self, report: ValidationReport) -> Result<String> {
        let data = table::write_rows(&report.rows)?;
        let file_name = self.output_file_name();

        tracing::debug!("Writing {} bytes to {}", data.len(), file_name);
        self.storage.write_file(&file_name, &data).await?;

        tracing::info!("📁 Saved {} records to {}", report.rows.len(), file_name);
        Ok(file_name)
    }
}

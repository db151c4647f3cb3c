use crate::domain::model::{Batch, RawResult, ValidationReport};
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// One request per batch. Any failure fails the whole batch.
#[async_trait]
pub trait LookupClient: Send + Sync {
    async fn lookup(&self, batch: &Batch) -> Result<Vec<RawResult>>;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<Vec<String>>;
    async fn transform(&self, numbers: Vec<String>) -> Result<ValidationReport>;
    async fn load(&self, report: ValidationReport) -> Result<String>;
}

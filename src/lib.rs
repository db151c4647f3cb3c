pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use crate::core::{
    client::HttpLookupClient, etl::ValidationEngine, pipeline::LookupPipeline,
    retry::RetryOrchestrator,
};
pub use config::{cli::LocalStorage, RunConfig};
pub use utils::error::{Result, ValidatorError};

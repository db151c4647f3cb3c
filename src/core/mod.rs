pub mod batcher;
pub mod classify;
pub mod client;
pub mod dispatch;
pub mod etl;
pub mod pipeline;
pub mod retry;
pub mod table;

pub use crate::domain::model::{Batch, BatchOutcome, OutputRow, RawResult, ValidationReport};
pub use crate::domain::ports::{LookupClient, Pipeline, Storage};
pub use crate::utils::error::Result;

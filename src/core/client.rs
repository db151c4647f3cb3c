use crate::config::RunConfig;
use crate::domain::model::{Batch, RawResult};
use crate::domain::ports::LookupClient;
use crate::utils::error::{Result, ValidatorError};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
struct LookupRequest<'a> {
    #[serde(rename = "inputNum")]
    input_num: &'a [String],
    license: &'a str,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    results: Option<Vec<RawResult>>,
}

/// POSTs each batch as JSON to the lookup endpoint.
pub struct HttpLookupClient {
    client: Client,
    endpoint: String,
    license: String,
}

impl HttpLookupClient {
    pub fn new(config: &RunConfig) -> Self {
        Self {
            client: Client::new(),
            endpoint: config.endpoint.clone(),
            license: config.license.clone(),
        }
    }
}

#[async_trait]
impl LookupClient for HttpLookupClient {
    async fn lookup(&self, batch: &Batch) -> Result<Vec<RawResult>> {
        let payload = LookupRequest {
            input_num: batch.numbers(),
            license: &self.license,
        };

        tracing::debug!("Posting {} numbers to {}", batch.len(), self.endpoint);
        let response = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        tracing::debug!("Lookup response status: {}", status);
        if !status.is_success() {
            return Err(ValidatorError::HttpStatusError {
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        let parsed: LookupResponse = serde_json::from_slice(&body)?;
        Ok(parsed.results.unwrap_or_default())
    }
}

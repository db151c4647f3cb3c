use crate::utils::error::ValidatorError;
use serde::{Deserialize, Deserializer, Serialize};

/// Ordered, non-empty group of numbers submitted in one lookup request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch(Vec<String>);

impl Batch {
    /// Returns `None` for an empty list, a batch is never empty.
    pub fn new(numbers: Vec<String>) -> Option<Self> {
        if numbers.is_empty() {
            None
        } else {
            Some(Self(numbers))
        }
    }

    pub fn single(number: impl Into<String>) -> Self {
        Self(vec![number.into()])
    }

    pub fn numbers(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_numbers(self) -> Vec<String> {
        self.0
    }
}

/// One record of the lookup service's `results` array.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawResult {
    #[serde(default, deserialize_with = "loose_string")]
    pub original: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub formatted_number: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub number_type: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub region_code: Option<String>,
    #[serde(default, rename = "telnyxData")]
    pub lookup_data: Option<LookupEnvelope>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LookupEnvelope {
    #[serde(default)]
    pub data: Option<Enrichment>,
}

/// Carrier, caller-name and portability data for a resolved number.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Enrichment {
    #[serde(default, deserialize_with = "loose_string")]
    pub country_code: Option<String>,
    #[serde(default)]
    pub carrier: Option<Carrier>,
    #[serde(default)]
    pub caller_name: Option<CallerName>,
    #[serde(default)]
    pub portability: Option<Portability>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Carrier {
    #[serde(default, deserialize_with = "loose_string")]
    pub name: Option<String>,
    #[serde(default, rename = "type", deserialize_with = "loose_string")]
    pub line_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallerName {
    #[serde(default, deserialize_with = "loose_string")]
    pub caller_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Portability {
    #[serde(default, deserialize_with = "loose_string")]
    pub city: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub state: Option<String>,
}

impl Enrichment {
    pub fn is_empty(&self) -> bool {
        self.country_code.is_none()
            && self.carrier.is_none()
            && self.caller_name.is_none()
            && self.portability.is_none()
    }
}

impl RawResult {
    /// Record for a number the service never answered.
    pub fn unanswered(number: impl Into<String>) -> Self {
        Self {
            original: Some(number.into()),
            ..Self::default()
        }
    }

    pub fn enrichment(&self) -> Option<&Enrichment> {
        self.lookup_data
            .as_ref()
            .and_then(|envelope| envelope.data.as_ref())
            .filter(|data| !data.is_empty())
    }

    /// A record is complete when it carries a non-empty enrichment payload.
    pub fn is_complete(&self) -> bool {
        self.enrichment().is_some()
    }
}

/// Accepts strings, numbers and booleans, rendering non-strings as text.
fn loose_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    True,
    False,
}

impl Verdict {
    pub fn is_valid(self) -> bool {
        self == Verdict::True
    }
}

/// Flattened output row. Field order is the column order of the output table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputRow {
    pub original: Option<String>,
    #[serde(rename = "isValid")]
    pub is_valid: Verdict,
    #[serde(rename = "formattedNumber")]
    pub formatted_number: Option<String>,
    #[serde(rename = "numberType")]
    pub number_type: Option<String>,
    #[serde(rename = "regionCode")]
    pub region_code: Option<String>,
    pub country_code: Option<String>,
    pub carrier_name: Option<String>,
    pub line_type: Option<String>,
    pub caller_name: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
}

pub const OUTPUT_COLUMNS: [&str; 11] = [
    "original",
    "isValid",
    "formattedNumber",
    "numberType",
    "regionCode",
    "country_code",
    "carrier_name",
    "line_type",
    "caller_name",
    "city",
    "state",
];

/// Result of one lookup call as seen by the retry orchestrator.
#[derive(Debug)]
pub enum BatchOutcome {
    Answered(Vec<RawResult>),
    Empty,
    Failed(ValidatorError),
}

impl BatchOutcome {
    pub fn from_results(results: Vec<RawResult>) -> Self {
        if results.is_empty() {
            BatchOutcome::Empty
        } else {
            BatchOutcome::Answered(results)
        }
    }

    /// Empty answers count as failures for retry purposes.
    pub fn is_failure(&self) -> bool {
        !matches!(self, BatchOutcome::Answered(_))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetrievalStats {
    pub unique_numbers: usize,
    pub batches: usize,
    pub rounds_run: usize,
    pub dropped_batches: usize,
    pub tier2_attempted: usize,
    pub tier2_recovered: usize,
    pub rows_without_enrichment: usize,
}

#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub rows: Vec<OutputRow>,
    pub stats: RetrievalStats,
}

use crate::utils::error::{Result, ValidatorError};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "https://phone.securenet.fun/api/v1/device/getvalidate";
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
pub const DEFAULT_THROTTLE_MIN_MS: u64 = 1000;
pub const DEFAULT_THROTTLE_MAX_MS: u64 = 2000;

/// Values for one run. Built once at startup and passed by reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub batch_size: usize,
    pub concurrency: usize,
    pub retries: usize,
    pub license: String,
    pub endpoint: String,
    pub timeout_seconds: u64,
    pub throttle_min_ms: u64,
    pub throttle_max_ms: u64,
}

#[derive(Default)]
struct RawEntries {
    batch_size: Option<usize>,
    concurrency: Option<usize>,
    retries: Option<usize>,
    license: Option<String>,
    endpoint: Option<String>,
    timeout_seconds: Option<u64>,
    throttle_min_ms: Option<u64>,
    throttle_max_ms: Option<u64>,
}

impl RunConfig {
    /// 從 key=value 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content =
            std::fs::read_to_string(&path).map_err(|e| ValidatorError::ConfigError {
                message: format!("cannot read {}: {}", path.as_ref().display(), e),
            })?;
        Self::from_kv_str(&content)
    }

    /// Parses `key=value` lines. Blank lines and `#` comments are skipped.
    pub fn from_kv_str(content: &str) -> Result<Self> {
        let content = Self::substitute_env_vars(content);
        let mut raw = RawEntries::default();

        for (index, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                tracing::warn!("Ignoring config line {} without '=': {}", index + 1, line);
                continue;
            };
            let (key, value) = (key.trim(), value.trim());

            match key {
                "batch_size" => raw.batch_size = Some(parse_value(key, value)?),
                "concurrency" => raw.concurrency = Some(parse_value(key, value)?),
                "retries" => raw.retries = Some(parse_value(key, value)?),
                "license" => raw.license = Some(value.to_string()),
                "endpoint" => raw.endpoint = Some(value.to_string()),
                "timeout_seconds" => raw.timeout_seconds = Some(parse_value(key, value)?),
                "throttle_min_ms" => raw.throttle_min_ms = Some(parse_value(key, value)?),
                "throttle_max_ms" => raw.throttle_max_ms = Some(parse_value(key, value)?),
                other => tracing::warn!("Ignoring unknown config key '{}'", other),
            }
        }

        let config = Self {
            batch_size: *validation::validate_required_field("batch_size", &raw.batch_size)?,
            concurrency: *validation::validate_required_field("concurrency", &raw.concurrency)?,
            retries: *validation::validate_required_field("retries", &raw.retries)?,
            license: validation::validate_required_field("license", &raw.license)?.clone(),
            endpoint: raw.endpoint.unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            timeout_seconds: raw.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECONDS),
            throttle_min_ms: raw.throttle_min_ms.unwrap_or(DEFAULT_THROTTLE_MIN_MS),
            throttle_max_ms: raw.throttle_max_ms.unwrap_or(DEFAULT_THROTTLE_MAX_MS),
        };
        config.validate()?;
        Ok(config)
    }

    /// 替換環境變數 (例如 ${PHONE_LICENSE})
    fn substitute_env_vars(content: &str) -> String {
        let re = Regex::new(r"\$\{([^}]+)\}").expect("static regex is valid");

        re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        })
        .into_owned()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn throttle_range(&self) -> (Duration, Duration) {
        (
            Duration::from_millis(self.throttle_min_ms),
            Duration::from_millis(self.throttle_max_ms),
        )
    }
}

fn parse_value<T: FromStr>(field: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| ValidatorError::InvalidConfigValueError {
            field: field.to_string(),
            value: value.to_string(),
            reason: "not a non-negative integer".to_string(),
        })
}

impl Validate for RunConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_positive_number("batch_size", self.batch_size, 1)?;
        validation::validate_positive_number("concurrency", self.concurrency, 1)?;
        validation::validate_non_empty_string("license", &self.license)?;
        if self.license.contains("${") {
            return Err(ValidatorError::InvalidConfigValueError {
                field: "license".to_string(),
                value: self.license.clone(),
                reason: "environment variable is not set".to_string(),
            });
        }
        validation::validate_url("endpoint", &self.endpoint)?;
        validation::validate_positive_number("timeout_seconds", self.timeout_seconds as usize, 1)?;
        validation::validate_ordered_range(
            "throttle_min_ms..throttle_max_ms",
            self.throttle_min_ms,
            self.throttle_max_ms,
        )?;
        Ok(())
    }
}

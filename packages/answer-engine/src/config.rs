//! Engine configuration loaded from environment variables.

use std::env;
use std::time::Duration;

use crate::error::{ConfigError, ConfigResult};
use crate::invoker::{Backoff, RetryPolicy};
use crate::providers::{brightdata, linkup};
use crate::security::SecretString;

/// Timing and retry knobs for one batch pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    /// Wait between status queries
    pub poll_interval: Duration,

    /// Result retrievals allowed while results are still assembling
    pub fetch_max_attempts: u32,

    /// Wait between retrievals while assembling
    pub fetch_retry_interval: Duration,

    pub submit_retry: RetryPolicy,
    pub poll_retry: RetryPolicy,
    pub fetch_retry: RetryPolicy,
    pub direct_retry: RetryPolicy,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        let step = Duration::from_secs(2);
        Self {
            poll_interval: Duration::from_secs(10),
            fetch_max_attempts: 20,
            fetch_retry_interval: Duration::from_secs(30),
            submit_retry: RetryPolicy::new(5, Backoff::Fixed(step)),
            poll_retry: RetryPolicy::new(2, Backoff::Fixed(step)),
            fetch_retry: RetryPolicy::new(5, Backoff::Linear(step)),
            direct_retry: RetryPolicy::new(5, Backoff::Linear(step)),
        }
    }
}

impl PipelineSettings {
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_fetch_schedule(mut self, max_attempts: u32, interval: Duration) -> Self {
        self.fetch_max_attempts = max_attempts;
        self.fetch_retry_interval = interval;
        self
    }

    /// Apply one policy to submission, fetch and direct calls.
    ///
    /// Status queries keep their own policy since a failed tick is simply retried
    /// on the next one.
    pub fn with_call_retry(mut self, policy: RetryPolicy) -> Self {
        self.submit_retry = policy;
        self.fetch_retry = policy;
        self.direct_retry = policy;
        self
    }

    pub fn with_poll_retry(mut self, policy: RetryPolicy) -> Self {
        self.poll_retry = policy;
        self
    }
}

/// Credentials, endpoints and tunables for every configured provider.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub brightdata_api_key: Option<SecretString>,
    pub brightdata_base_url: String,
    pub chatgpt_dataset_id: Option<String>,
    pub perplexity_dataset_id: Option<String>,
    pub gemini_dataset_id: Option<String>,
    pub linkup_api_key: Option<SecretString>,
    pub linkup_base_url: String,
    pub http_timeout: Duration,
    pub pipeline: PipelineSettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            brightdata_api_key: None,
            brightdata_base_url: brightdata::DEFAULT_BASE_URL.to_string(),
            chatgpt_dataset_id: None,
            perplexity_dataset_id: None,
            gemini_dataset_id: None,
            linkup_api_key: None,
            linkup_base_url: linkup::DEFAULT_BASE_URL.to_string(),
            http_timeout: Duration::from_secs(20 * 60),
            pipeline: PipelineSettings::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from the process environment.
    ///
    /// Does not read `.env`; binaries call `dotenvy::dotenv()` first.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<Self> {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::default();
        let base = &defaults.pipeline;

        let secs = |name: &'static str, default: Duration| -> ConfigResult<Duration> {
            match var(name) {
                None => Ok(default),
                Some(value) => value
                    .parse::<u64>()
                    .map(Duration::from_secs)
                    .map_err(|_| ConfigError::Invalid {
                        name,
                        value,
                        expected: "a whole number of seconds",
                    }),
            }
        };
        let positive_secs = |name: &'static str, default: Duration| -> ConfigResult<Duration> {
            match secs(name, default)? {
                d if d.is_zero() => Err(ConfigError::Invalid {
                    name,
                    value: var(name).unwrap_or_default(),
                    expected: "a positive whole number of seconds",
                }),
                d => Ok(d),
            }
        };
        let secret = |name: &str| {
            lookup(name)
                .map(|v| SecretString::new(v.trim()))
                .filter(|key| !key.is_empty())
        };
        let count = |name: &'static str, default: u32| -> ConfigResult<u32> {
            match var(name) {
                None => Ok(default),
                Some(value) => match value.parse::<u32>() {
                    Ok(n) if n > 0 => Ok(n),
                    _ => Err(ConfigError::Invalid {
                        name,
                        value,
                        expected: "a positive whole number",
                    }),
                },
            }
        };

        let max_retries = count("ANSWER_MAX_RETRIES", base.submit_retry.max_attempts)?;
        let retry_step = secs("ANSWER_RETRY_DELAY_SECS", Duration::from_secs(2))?;
        let poll_interval = positive_secs("ANSWER_POLL_INTERVAL_SECS", base.poll_interval)?;
        let fetch_attempts = count("ANSWER_FETCH_MAX_ATTEMPTS", base.fetch_max_attempts)?;
        let fetch_interval = positive_secs("ANSWER_FETCH_RETRY_SECS", base.fetch_retry_interval)?;

        let mut pipeline = base
            .clone()
            .with_poll_interval(poll_interval)
            .with_fetch_schedule(fetch_attempts, fetch_interval);
        pipeline.submit_retry = RetryPolicy::new(max_retries, Backoff::Fixed(retry_step));
        pipeline.fetch_retry = RetryPolicy::new(max_retries, Backoff::Linear(retry_step));
        pipeline.direct_retry = RetryPolicy::new(max_retries, Backoff::Linear(retry_step));

        let config = Self {
            brightdata_api_key: secret("BRIGHTDATA_API_KEY"),
            brightdata_base_url: var("BRIGHTDATA_BASE_URL").unwrap_or(defaults.brightdata_base_url),
            chatgpt_dataset_id: var("BRIGHTDATA_DATASET_ID"),
            perplexity_dataset_id: var("PERPLEXITY_DATASET_ID"),
            gemini_dataset_id: var("GEMINI_DATASET_ID"),
            linkup_api_key: secret("LINKUP_API_KEY"),
            linkup_base_url: var("LINKUP_BASE_URL").unwrap_or(defaults.linkup_base_url),
            http_timeout: positive_secs("ANSWER_HTTP_TIMEOUT_SECS", defaults.http_timeout)?,
            pipeline,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> ConfigResult<()> {
        let wants_brightdata = self.chatgpt_dataset_id.is_some()
            || self.perplexity_dataset_id.is_some()
            || self.gemini_dataset_id.is_some();
        if wants_brightdata && self.brightdata_api_key.is_none() {
            return Err(ConfigError::Missing("BRIGHTDATA_API_KEY"));
        }
        Ok(())
    }
}

// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::error::ConfigError;
use crate::sender::RetryConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// What `offer` does when the queue is full.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DropPolicy {
    /// Reject the new record.
    #[default]
    DropNewest,
    /// Evict the oldest queued record and accept the new one.
    DropOldest,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    None,
    Gzip,
}

/// Settings of a profiles pipeline. Every field has a default, so a partial
/// document deserializes into a usable configuration; call
/// [`PipelineConfig::validate`] before use.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub max_queue_size: usize,
    pub batch_max_records: usize,
    pub batch_timeout_ms: u64,
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
    /// Each backoff delay moves by up to this fraction of itself, in either
    /// direction.
    pub jitter_fraction: f64,
    /// Overall budget for exporting one batch, retries included.
    pub export_timeout_ms: u64,
    pub endpoint: String,
    pub drop_policy: DropPolicy,
    /// How many times `offer` retries a contended queue lock before dropping.
    pub offer_spin_limit: u32,
    pub compression: Compression,
    pub api_key: Option<String>,
    /// Extra headers sent with every request.
    pub headers: HashMap<String, String>,
}

impl PipelineConfig {
    pub const DEFAULT_ENDPOINT: &'static str = "http://localhost:4318/v1development/profiles";

    pub fn batch_timeout(&self) -> Duration {
        Duration::from_millis(self.batch_timeout_ms)
    }

    pub fn export_timeout(&self) -> Duration {
        Duration::from_millis(self.export_timeout_ms)
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::new()
            .max_retries(self.max_retries)
            .base_backoff(Duration::from_millis(self.base_backoff_ms))
            .max_backoff(Duration::from_millis(self.max_backoff_ms))
            .jitter_fraction(self.jitter_fraction)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_queue_size == 0 {
            return Err(ConfigError::Zero("max_queue_size"));
        }
        if self.batch_max_records == 0 {
            return Err(ConfigError::Zero("batch_max_records"));
        }
        if self.batch_timeout_ms == 0 {
            return Err(ConfigError::Zero("batch_timeout_ms"));
        }
        if self.export_timeout_ms == 0 {
            return Err(ConfigError::Zero("export_timeout_ms"));
        }
        if self.batch_max_records > self.max_queue_size {
            return Err(ConfigError::BatchLargerThanQueue {
                batch: self.batch_max_records,
                queue: self.max_queue_size,
            });
        }
        if self.base_backoff_ms > self.max_backoff_ms {
            return Err(ConfigError::BackoffRange {
                base: self.base_backoff_ms,
                max: self.max_backoff_ms,
            });
        }
        if !(0.0..=1.0).contains(&self.jitter_fraction) {
            return Err(ConfigError::Jitter(self.jitter_fraction.to_string()));
        }
        self.endpoint_uri()?;
        for name in self.headers.keys() {
            if http::HeaderName::from_bytes(name.as_bytes()).is_err() {
                return Err(ConfigError::Header { name: name.clone() });
            }
        }
        Ok(())
    }

    pub(crate) fn endpoint_uri(&self) -> Result<http::Uri, ConfigError> {
        let invalid = |reason: &str| ConfigError::Endpoint {
            url: self.endpoint.clone(),
            reason: reason.to_owned(),
        };
        let uri: http::Uri = self
            .endpoint
            .parse()
            .map_err(|e: http::uri::InvalidUri| invalid(&e.to_string()))?;
        match uri.scheme_str() {
            Some("http") | Some("https") => {}
            _ => return Err(invalid("scheme must be http or https")),
        }
        if uri.authority().is_none() {
            return Err(invalid("missing host"));
        }
        Ok(uri)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_queue_size: 2048,
            batch_max_records: 512,
            batch_timeout_ms: 1000,
            max_retries: 5,
            base_backoff_ms: 100,
            max_backoff_ms: 5000,
            jitter_fraction: 0.2,
            export_timeout_ms: 10_000,
            endpoint: Self::DEFAULT_ENDPOINT.to_owned(),
            drop_policy: DropPolicy::DropNewest,
            offer_spin_limit: 64,
            compression: Compression::None,
            api_key: None,
            headers: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = PipelineConfig::default();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.batch_timeout(), Duration::from_secs(1));
        assert_eq!(config.export_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn partial_json() {
        let config: PipelineConfig = serde_json::from_str(
            r#"{"max_queue_size": 16, "batch_max_records": 4, "drop_policy": "drop-oldest", "compression": "gzip"}"#,
        )
        .unwrap();
        assert_eq!(config.max_queue_size, 16);
        assert_eq!(config.batch_max_records, 4);
        assert_eq!(config.drop_policy, DropPolicy::DropOldest);
        assert_eq!(config.compression, Compression::Gzip);
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.endpoint, PipelineConfig::DEFAULT_ENDPOINT);
    }

    #[test]
    fn serde_roundtrip() {
        let config = PipelineConfig {
            api_key: Some("secret".to_owned()),
            headers: HashMap::from([("x-team".to_owned(), "profiling".to_owned())]),
            ..PipelineConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: PipelineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);
    }

    #[test]
    fn rejects_invalid_values() {
        let check = |config: PipelineConfig| config.validate().unwrap_err();

        assert_eq!(
            check(PipelineConfig {
                max_queue_size: 0,
                ..Default::default()
            }),
            ConfigError::Zero("max_queue_size")
        );
        assert_eq!(
            check(PipelineConfig {
                max_queue_size: 8,
                batch_max_records: 9,
                ..Default::default()
            }),
            ConfigError::BatchLargerThanQueue { batch: 9, queue: 8 }
        );
        assert_eq!(
            check(PipelineConfig {
                base_backoff_ms: 10,
                max_backoff_ms: 5,
                ..Default::default()
            }),
            ConfigError::BackoffRange { base: 10, max: 5 }
        );
        assert!(matches!(
            check(PipelineConfig {
                jitter_fraction: 1.5,
                ..Default::default()
            }),
            ConfigError::Jitter(_)
        ));
        assert!(matches!(
            check(PipelineConfig {
                endpoint: "ftp://collector/profiles".to_owned(),
                ..Default::default()
            }),
            ConfigError::Endpoint { .. }
        ));
        assert!(matches!(
            check(PipelineConfig {
                headers: HashMap::from([("bad header".to_owned(), "v".to_owned())]),
                ..Default::default()
            }),
            ConfigError::Header { .. }
        ));
    }
}

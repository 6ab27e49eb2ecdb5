//! Module: config
//! Responsibility: engine-wide execution knobs and their validation.
//! Does not own: per-operator settings, which travel on the plan nodes.

use crate::error::{ErrorOrigin, InternalError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_SCAN_BATCH_SIZE: usize = 64;
pub const DEFAULT_CANCEL_POLL_INTERVAL: usize = 128;
pub const DEFAULT_LOOKAHEAD_WAIT_MS: u64 = 10;

///
/// EngineConfig
///
/// Execution settings shared by every query context built from it.
/// Operators that carry their own value (a lookahead quantum on a lookup,
/// for instance) take precedence over the engine default.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Default number of in-flight prefetch lookups; `0` disables pipelining.
    pub lookahead_quantum: usize,

    /// Rows fetched from storage per scan refill.
    pub scan_batch_size: usize,

    /// Rows processed inside internal loops between cancellation polls.
    pub cancel_poll_interval: usize,

    /// Upper bound on one blocking wait for a prefetch result before the
    /// waiting cursor re-polls cancellation.
    pub lookahead_wait_ms: u64,

    pub query_timeout_ms: Option<u64>,
}

impl EngineConfig {
    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, InternalError> {
        let config: Self = serde_json::from_str(json).map_err(|err| {
            InternalError::invalid_argument(
                ErrorOrigin::Config,
                format!("invalid engine config: {err}"),
            )
        })?;
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), InternalError> {
        if self.scan_batch_size == 0 {
            return Err(InternalError::invalid_argument(
                ErrorOrigin::Config,
                "scan_batch_size must be positive",
            ));
        }
        if self.cancel_poll_interval == 0 {
            return Err(InternalError::invalid_argument(
                ErrorOrigin::Config,
                "cancel_poll_interval must be positive",
            ));
        }
        if self.lookahead_wait_ms == 0 {
            return Err(InternalError::invalid_argument(
                ErrorOrigin::Config,
                "lookahead_wait_ms must be positive",
            ));
        }

        Ok(())
    }

    #[must_use]
    pub fn query_timeout(&self) -> Option<Duration> {
        self.query_timeout_ms.map(Duration::from_millis)
    }

    #[must_use]
    pub const fn lookahead_wait(&self) -> Duration {
        Duration::from_millis(self.lookahead_wait_ms)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lookahead_quantum: 0,
            scan_batch_size: DEFAULT_SCAN_BATCH_SIZE,
            cancel_poll_interval: DEFAULT_CANCEL_POLL_INTERVAL,
            lookahead_wait_ms: DEFAULT_LOOKAHEAD_WAIT_MS,
            query_timeout_ms: None,
        }
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config = EngineConfig::from_json_str(r#"{ "lookahead_quantum": 4 }"#)
            .expect("partial config should parse");

        assert_eq!(config.lookahead_quantum, 4);
        assert_eq!(config.scan_batch_size, DEFAULT_SCAN_BATCH_SIZE);
        assert_eq!(config.query_timeout(), None);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = EngineConfig::from_json_str(r#"{ "lookahead": 4 }"#)
            .expect_err("unknown field should be rejected");

        assert!(err.is_invalid_argument());
        assert_eq!(err.origin, ErrorOrigin::Config);
    }

    #[test]
    fn zero_batch_size_fails_validation() {
        let err = EngineConfig::from_json_str(r#"{ "scan_batch_size": 0 }"#)
            .expect_err("zero batch size should fail validation");

        assert!(err.message.contains("scan_batch_size"));
    }

    #[test]
    fn timeout_converts_to_duration() {
        let config = EngineConfig {
            query_timeout_ms: Some(250),
            ..EngineConfig::default()
        };

        assert_eq!(config.query_timeout(), Some(Duration::from_millis(250)));
    }
}

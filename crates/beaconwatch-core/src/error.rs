//! Error taxonomy for the localization and presence engine.
//!
//! Every failure the core can produce is recoverable at the boundary:
//! a bad training sample or a malformed detection event is rejected and
//! reported, never fatal to the process. The HTTP layer downcasts
//! [`EngineError`] out of `anyhow::Error` to pick a status code.

use thiserror::Error;

/// Recoverable engine failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    /// Malformed training or query input: an empty field, or an RSSI
    /// vector whose dimensionality does not match the configured
    /// gateway count. Rejected synchronously, never persisted.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A prediction was requested against an empty fingerprint store.
    /// Callers should prompt for training rather than show a default.
    #[error("no fingerprint data available, train at least one spot first")]
    InsufficientData,

    /// A detection event referenced an employee or gateway that is not
    /// in the reference data. Logged and dropped; existing presence
    /// state is untouched.
    #[error("unknown {kind}: {value}")]
    UnknownEntity { kind: &'static str, value: String },
}

impl EngineError {
    pub fn validation(msg: impl Into<String>) -> Self {
        EngineError::Validation(msg.into())
    }

    pub fn unknown(kind: &'static str, value: impl Into<String>) -> Self {
        EngineError::UnknownEntity {
            kind,
            value: value.into(),
        }
    }
}

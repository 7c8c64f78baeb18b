//! Error types for HVPS operations.
//!
//! Protocol and marshaling failures are fatal to the in-flight operation and
//! propagate to the operation boundary; validation rejections are expected
//! business outcomes that the CLI reports to the operator without a backtrace.

use thiserror::Error;

/// Result type alias for HVPS operations.
pub type Result<T> = std::result::Result<T, HvpsError>;

/// Errors that can occur when talking to an HVPS crate.
#[derive(Error, Debug)]
pub enum HvpsError {
    /// Session creation failed (vendor init or address handling).
    #[error("failed to connect to '{device}': {reason}")]
    Connection { device: String, reason: String },

    /// A vendor call returned a non-zero status code. The code is surfaced
    /// verbatim; it is never retried automatically since the vendor library
    /// offers no idempotent-retry guarantee.
    #[error("{operation} failed with vendor code {code:#x}")]
    Protocol { code: i32, operation: &'static str },

    /// A request was refused by the bias-control policy. Expected outcome,
    /// not a fault.
    #[error(transparent)]
    Rejected(#[from] BiasRejection),

    /// The vendor handed back a value or buffer that does not match its own
    /// declared layout. Surfaced loudly rather than coerced to a default.
    #[error("decode anomaly: {what}")]
    DecodeAnomaly { what: String },

    /// No configured HVPS matches the requested device name.
    #[error("no HVPS named '{0}' is configured")]
    UnknownDevice(String),

    /// Several HVPS devices are configured and none was selected.
    #[error("several HVPS devices are configured; select one with --device")]
    AmbiguousDevice,

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("configuration error: {0}")]
    InvalidConfig(String),

    #[error("telemetry error: {0}")]
    Telemetry(#[from] paho_mqtt::Error),

    #[error("failed to encode snapshot: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Why a bias or unbias request was not carried out.
///
/// `AlreadyAtTarget` means "no change needed"; every other variant means the
/// request was refused before any vendor write was issued.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BiasRejection {
    #[error("refused: {requested} V exceeds the channel limit of {limit} V")]
    VoltageExceedsChannelLimit { requested: f32, limit: f32 },

    #[error("refused: {requested} V exceeds the crate limit of {limit} V")]
    VoltageExceedsCrateLimit { requested: f32, limit: f32 },

    #[error("no change needed: channel {channel} is already at {voltage} V")]
    AlreadyAtTarget { channel: u16, voltage: f32 },

    #[error("operator declined, nothing was changed")]
    UserDeclined,

    #[error("channel {channel} has no enabled entry in the configuration")]
    MissingChannelConfig { channel: u16 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_error_carries_code_and_operation() {
        let err = HvpsError::Protocol {
            code: 0x1002,
            operation: "CAENHV_GetChParam",
        };
        let msg = err.to_string();
        assert!(msg.contains("0x1002"));
        assert!(msg.contains("CAENHV_GetChParam"));
    }

    #[test]
    fn rejection_messages_distinguish_no_change_from_refusal() {
        let noop = BiasRejection::AlreadyAtTarget {
            channel: 3,
            voltage: 1500.0,
        };
        assert!(noop.to_string().starts_with("no change needed"));

        let refusal = BiasRejection::VoltageExceedsChannelLimit {
            requested: 4000.0,
            limit: 2500.0,
        };
        assert!(refusal.to_string().starts_with("refused"));
    }
}

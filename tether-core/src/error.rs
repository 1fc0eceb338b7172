//! Error types.
//!
//! Tracking and dispatch never fail. Errors only come from the typed edges of
//! the crate: turning arbitrary values into records, decoding properties into
//! Rust types, and loading configuration.

use thiserror::Error;

/// Errors produced by the reactive runtime.
#[derive(Debug, Error)]
pub enum ReactiveError {
    /// A value that is not a key/value record was offered for wrapping.
    #[error("expected a record-like value, found {found}")]
    NotARecord {
        /// Kind of the value that was offered.
        found: &'static str,
    },

    /// A whole state value could not be serialized into a record.
    #[error("failed to serialize state into a record")]
    Serialize(#[source] serde_json::Error),

    /// A value could not be encoded for the given property.
    #[error("failed to encode value for property `{key}`")]
    Encode {
        /// Property the value was meant for.
        key: String,
        /// Underlying serialization failure.
        #[source]
        source: serde_json::Error,
    },

    /// A property could not be decoded into the requested type.
    #[error("failed to decode property `{key}`")]
    Decode {
        /// Property whose value failed to decode.
        key: String,
        /// Underlying deserialization failure.
        #[source]
        source: serde_json::Error,
    },

    /// The runtime configuration failed validation.
    #[error("invalid runtime configuration: {0}")]
    InvalidConfig(String),

    /// The runtime configuration could not be parsed.
    #[error("failed to parse runtime configuration")]
    ConfigParse(#[source] serde_json::Error),
}

/// Result alias used throughout the crate.
pub type Result<T, E = ReactiveError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn decode_error_exposes_source() {
        let source = serde_json::from_str::<u32>("\"nope\"").unwrap_err();
        let err = ReactiveError::Decode {
            key: "count".into(),
            source,
        };

        assert_eq!(err.to_string(), "failed to decode property `count`");
        assert!(err.source().is_some());
    }

    #[test]
    fn not_a_record_names_the_kind() {
        let err = ReactiveError::NotARecord { found: "array" };
        assert_eq!(err.to_string(), "expected a record-like value, found array");
    }
}

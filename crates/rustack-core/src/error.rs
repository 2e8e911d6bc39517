//! Error types for the Rustack core.

/// Failures raised while validating shared identifiers and configuration.
#[derive(Debug, thiserror::Error)]
pub enum RustackError {
    /// An account id that is not a 12-digit number.
    #[error("invalid AWS account ID: {0} (must be 12-digit numeric string)")]
    InvalidAccountId(String),

    /// A `GATEWAY_LISTEN` value that is not a socket address.
    #[error("invalid gateway listen address {address:?}")]
    InvalidListenAddress {
        /// The rejected value.
        address: String,
        /// Why it failed to parse.
        #[source]
        source: std::net::AddrParseError,
    },
}

/// Convenience result type for Rustack operations.
pub type RustackResult<T> = Result<T, RustackError>;

//! Error types for the soundboard store crate.
//!
//! Every action surfaces failures through [`StoreError`]. "Wrong
//! credentials" is deliberately not an error: login reports it as a
//! boolean so the caller can show a form message without matching on
//! variants.

/// Unified error type for the soundboard client store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// An HTTP request to the auth or API service failed at the transport level.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// A response body or persisted value was not valid JSON.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A configured base URL or endpoint path could not be parsed.
    #[error("url parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// The access token is not a decodable JWT or lacks an `exp` claim.
    #[error("token decode failed: {reason}")]
    TokenDecode {
        /// What was wrong with the token.
        reason: String,
    },

    /// An operation that needs the access token ran while logged out.
    #[error("no access token stored")]
    MissingToken,

    /// The SQLite-backed key-value storage failed.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// A lock guarding in-memory state was poisoned by a panicking writer.
    #[error("{what} lock poisoned")]
    LockPoisoned {
        /// Which piece of state the lock guards.
        what: &'static str,
    },

    /// Configuration is missing or malformed.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// What is wrong with the configuration.
        reason: String,
    },

    /// I/O error (e.g. reading the config file).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, StoreError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

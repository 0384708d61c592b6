//! Error types for `pgsched-core`.
//!
//! Each error variant carries enough context to diagnose the problem without
//! a debugger. Variants never include key material or database passwords,
//! only variable names, file paths, and operation descriptions.

/// Errors from loading settings or building the database engine.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The database DSN was empty when the engine was requested.
    #[error("database DSN is required (set PG_DSN_APP)")]
    MissingDatabaseDsn,

    /// An integer environment variable could not be parsed.
    #[error("environment variable {var} must be a non-negative base-10 integer, got '{value}': {reason}")]
    InvalidInteger {
        var: &'static str,
        value: String,
        reason: String,
    },

    /// The database DSN was rejected by the connection pool.
    #[error("invalid database DSN: {reason}")]
    InvalidDsn { reason: String },

    /// The engine was requested outside a Tokio runtime.
    #[error("database engine requires a running Tokio runtime")]
    NoRuntime,

    /// A round trip to the database failed.
    #[error("database error: {reason}")]
    Database { reason: String },
}

/// Errors from decoding base64 key material.
#[derive(Debug, thiserror::Error)]
pub enum KeyFormatError {
    /// The key content is not valid base64.
    #[error("key is not valid base64: {reason}")]
    InvalidBase64 { reason: String },

    /// The decoded key has the wrong length.
    #[error("key must decode to exactly {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// The key file could not be read.
    #[error("failed to read key file '{path}': {reason}")]
    Io { path: String, reason: String },
}

/// Errors from sealed-box operations.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// Sealing the plaintext failed.
    #[error("sealed box encryption failed: {reason}")]
    Encryption { reason: String },

    /// The ciphertext could not be opened: wrong key, corrupted, tampered,
    /// or too short to hold the ephemeral key and tag.
    #[error("sealed box decryption failed: {reason}")]
    Decryption { reason: String },
}

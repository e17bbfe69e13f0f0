//! use certmint::error::CaError;

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, CaError>;

/// Represents errors that can occur while running the certificate authority.
///
/// `Generation` aborts construction of the authority when the root cannot be
/// created, and fails only the affected request when a server key cannot be.
/// `NotFound` and `Load` are recovered from by regenerating the root.
/// `Persistence` never fails an issuance; it is reported alongside the
/// issued certificate instead.
#[derive(Debug, Error, Clone)]
pub enum CaError {
    /// The storage directory or one of its subdirectories could not be created.
    #[error("Failed to initialize storage at {path}: {reason}")]
    StorageInit { path: String, reason: String },

    /// A stored artifact is absent or unreadable.
    #[error("Artifact not found: {0}")]
    NotFound(String),

    /// Persisted root material exists but could not be used.
    #[error("Failed to load root material: {0}")]
    Load(String),

    /// Generating a key pair failed, for the root or for a server
    /// certificate, or a new root could not be self-signed.
    #[error("Generation error: {0}")]
    Generation(String),

    /// Producing a signature failed.
    #[error("Signing error: {0}")]
    Signing(String),

    /// Saving certificate or key material failed.
    #[error("Failed to persist {path}: {reason}")]
    Persistence { path: String, reason: String },

    /// Error during data encoding.
    #[error("Failed to encode data: {0}")]
    EncodingError(String),

    /// Error during data decoding.
    #[error("Failed to decode data: {0}")]
    DecodingError(String),

    /// Error due to invalid input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A background issuance task did not complete.
    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl From<der::Error> for CaError {
    /// Converts a `der::Error` into a `CaError`.
    fn from(err: der::Error) -> Self {
        CaError::DecodingError(err.to_string())
    }
}

impl From<rsa::Error> for CaError {
    fn from(err: rsa::Error) -> Self {
        CaError::Signing(err.to_string())
    }
}

impl From<rsa::pkcs1::Error> for CaError {
    fn from(err: rsa::pkcs1::Error) -> Self {
        CaError::DecodingError(err.to_string())
    }
}

impl From<pkcs8::Error> for CaError {
    fn from(err: pkcs8::Error) -> Self {
        CaError::DecodingError(err.to_string())
    }
}

impl From<pkcs8::spki::Error> for CaError {
    fn from(err: pkcs8::spki::Error) -> Self {
        CaError::DecodingError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_error_does_not_assume_the_root() {
        let err = CaError::Generation("1024-bit RSA key: rng failure".to_string());
        assert_eq!(err.to_string(), "Generation error: 1024-bit RSA key: rng failure");
    }
}

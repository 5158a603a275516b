//! Error types for the quote cache.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CacheError>;

#[derive(Debug, Error)]
pub enum CacheError {
    /// Stored bytes could not be decoded. Callers treat this as a miss;
    /// the orchestrator deletes the offending entry so it cannot poison
    /// future reads.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// The warm tier could not be reached. Distinguishable from a plain
    /// miss so the orchestrator can degrade to hot-only operation.
    #[error("warm tier unavailable: {0}")]
    WarmTierUnavailable(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        CacheError::WarmTierUnavailable(err.to_string())
    }
}

/// Failures while encoding or decoding cached values. Always surfaced as a
/// typed error, never as garbage data.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("encode failed: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("decode failed: {0}")]
    Decode(#[from] bincode::error::DecodeError),

    #[error("compression failed: {0}")]
    Compression(#[from] std::io::Error),

    /// Envelope framing is missing, truncated, or inconsistent with its
    /// own metadata (e.g. decompressed length mismatch).
    #[error("corrupt envelope: {0}")]
    CorruptEnvelope(String),
}

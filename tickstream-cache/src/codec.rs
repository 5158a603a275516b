//! Value codec: bincode encoding with size-triggered gzip compression.
//!
//! Small quote payloads (the common case) are stored as-is; only payloads
//! above the configured threshold pay for compression. Metadata travels
//! with the bytes so decode can reverse whatever encode chose.

use crate::error::CodecError;
use crate::types::{QuotePayload, WarmEnvelope};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{Read, Write};

/// Result of an encode: the stored bytes plus the metadata required to
/// reverse the encoding.
#[derive(Debug, Clone)]
pub struct Encoded {
    pub bytes: Vec<u8>,
    pub compressed: bool,
    pub uncompressed_len: u32,
}

/// Deterministic, self-describing codec for cached payloads.
#[derive(Debug, Clone)]
pub struct Codec {
    compression_threshold: usize,
}

impl Codec {
    pub fn new(compression_threshold: usize) -> Self {
        Self {
            compression_threshold,
        }
    }

    /// Encode a payload, compressing only when the bincode output exceeds
    /// the threshold.
    pub fn encode(&self, payload: &QuotePayload) -> Result<Encoded, CodecError> {
        let raw = bincode::serde::encode_to_vec(payload, bincode::config::standard())?;
        let uncompressed_len = raw.len() as u32;

        if raw.len() <= self.compression_threshold {
            return Ok(Encoded {
                bytes: raw,
                compressed: false,
                uncompressed_len,
            });
        }

        let mut encoder = GzEncoder::new(Vec::with_capacity(raw.len() / 2), Compression::fast());
        encoder.write_all(&raw)?;
        let compressed = encoder.finish()?;

        Ok(Encoded {
            bytes: compressed,
            compressed: true,
            uncompressed_len,
        })
    }

    /// Decode bytes produced by [`Codec::encode`], transparently reversing
    /// compression when the metadata says it was applied.
    pub fn decode(
        &self,
        bytes: &[u8],
        compressed: bool,
        uncompressed_len: u32,
    ) -> Result<QuotePayload, CodecError> {
        let raw: Vec<u8>;
        let plain = if compressed {
            let mut decoder = GzDecoder::new(bytes);
            let mut out = Vec::with_capacity(uncompressed_len as usize);
            decoder.read_to_end(&mut out)?;
            if out.len() != uncompressed_len as usize {
                return Err(CodecError::CorruptEnvelope(format!(
                    "decompressed {} bytes, metadata says {}",
                    out.len(),
                    uncompressed_len
                )));
            }
            raw = out;
            raw.as_slice()
        } else {
            bytes
        };

        let (payload, _) =
            bincode::serde::decode_from_slice(plain, bincode::config::standard())?;
        Ok(payload)
    }

    /// Frame an envelope for warm tier storage.
    pub fn pack_envelope(&self, envelope: &WarmEnvelope) -> Result<Vec<u8>, CodecError> {
        Ok(bincode::serde::encode_to_vec(
            envelope,
            bincode::config::standard(),
        )?)
    }

    /// Parse a warm tier blob back into an envelope. Corrupt or truncated
    /// framing is a [`CodecError`], never silently bad data.
    pub fn unpack_envelope(&self, bytes: &[u8]) -> Result<WarmEnvelope, CodecError> {
        let (envelope, read): (WarmEnvelope, usize) =
            bincode::serde::decode_from_slice(bytes, bincode::config::standard())?;
        if read != bytes.len() {
            return Err(CodecError::CorruptEnvelope(format!(
                "{} trailing bytes after envelope",
                bytes.len() - read
            )));
        }
        Ok(envelope)
    }

    /// Decode the payload carried by an envelope.
    pub fn decode_envelope(&self, envelope: &WarmEnvelope) -> Result<QuotePayload, CodecError> {
        self.decode(
            &envelope.payload,
            envelope.compressed,
            envelope.uncompressed_len,
        )
    }
}

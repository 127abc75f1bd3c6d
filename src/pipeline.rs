//! Value pipeline: codec plus optional compression.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::Result;
use crate::util::codec;
use crate::util::Compressor;

/// Turns typed values into payload text and back.
///
/// Payloads carry no marker saying whether they were compressed, so the
/// `use_compression` flag given to [`decode_value`](Self::decode_value) must
/// match the one used by [`encode_value`](Self::encode_value).
#[derive(Debug, Clone, Copy, Default)]
pub struct ValuePipeline {
    compressor: Compressor,
}

impl ValuePipeline {
    /// Create a pipeline with a specific compressor
    pub fn new(compressor: Compressor) -> Self {
        Self { compressor }
    }

    /// Get the compressor used for compressed payloads
    pub fn compressor(&self) -> &Compressor {
        &self.compressor
    }

    /// Encode a value into a payload
    pub fn encode_value<T: Serialize + ?Sized>(&self, value: &T, use_compression: bool) -> Result<String> {
        let json = codec::encode(value)?;
        if !use_compression {
            return Ok(json);
        }

        let payload = self.compressor.compress(&json)?;
        if payload.len() > json.len() {
            debug!(
                "Compressed payload is larger than plain JSON ({} > {} bytes)",
                payload.len(),
                json.len()
            );
        }
        Ok(payload)
    }

    /// Decode a payload into a value
    pub fn decode_value<T: DeserializeOwned>(&self, payload: &str, use_compression: bool) -> Result<T> {
        if use_compression {
            let json = self.compressor.decompress(payload)?;
            codec::decode(&json)
        } else {
            codec::decode(payload)
        }
    }
}

use std::io::{Read, Write};

use base64::{engine::general_purpose::STANDARD, Engine};
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::{Error, Result};

/// Turns text into Base64(gzip(UTF-16LE)) and back.
///
/// The output stays printable so it can travel as a form field, but the
/// Base64 and gzip overhead makes it larger than the input for short text.
#[derive(Debug, Clone, Copy)]
pub struct Compressor {
    level: Compression,
}

impl Compressor {
    pub fn new(level: u32) -> Self {
        Self {
            level: Compression::new(level.min(9)),
        }
    }

    pub fn level(&self) -> u32 {
        self.level.level()
    }

    pub fn compress(&self, text: &str) -> Result<String> {
        let units: Vec<u8> = text.encode_utf16().flat_map(u16::to_le_bytes).collect();

        let mut encoder = GzEncoder::new(Vec::with_capacity(units.len() / 2), self.level);
        encoder
            .write_all(&units)
            .map_err(|e| Error::Compression(format!("gzip write failed: {}", e)))?;
        let compressed = encoder
            .finish()
            .map_err(|e| Error::Compression(format!("gzip finish failed: {}", e)))?;

        Ok(STANDARD.encode(compressed))
    }

    pub fn decompress(&self, encoded: &str) -> Result<String> {
        let compressed = STANDARD
            .decode(encoded)
            .map_err(|e| Error::Decompression(format!("invalid base64: {}", e)))?;

        // Every byte must belong to a gzip member; trailing data is an error
        let mut decoder = MultiGzDecoder::new(compressed.as_slice());
        let mut units = Vec::new();
        decoder
            .read_to_end(&mut units)
            .map_err(|e| Error::Decompression(format!("invalid gzip stream: {}", e)))?;

        if units.len() % 2 != 0 {
            return Err(Error::Decompression(format!(
                "odd byte count {} for UTF-16 text",
                units.len()
            )));
        }

        let code_units: Vec<u16> = units
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();

        String::from_utf16(&code_units)
            .map_err(|e| Error::Decompression(format!("invalid UTF-16: {}", e)))
    }
}

impl Default for Compressor {
    fn default() -> Self {
        Self {
            level: Compression::default(),
        }
    }
}

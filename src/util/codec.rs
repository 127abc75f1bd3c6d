//! JSON codec between typed values and payload text.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, Result};

/// Serialize `value` to compact JSON. Strings come out quoted.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(Error::Encoding)
}

/// Parse JSON text into `T`.
///
/// Unknown fields are ignored. Missing fields fail unless the target type
/// marks them `#[serde(default)]`.
pub fn decode<T: DeserializeOwned>(text: &str) -> Result<T> {
    serde_json::from_str(text).map_err(Error::Decoding)
}

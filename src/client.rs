//! Async store client for OpenKeyVal

use std::collections::BTreeMap;
use std::sync::Arc;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::pipeline::ValuePipeline;
use crate::transport::{HyperTransport, Transport};
use crate::util::Compressor;

/// Characters allowed unencoded in URI path segments per RFC 3986, minus `/`
/// so that a key always stays a single segment.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'!')
    .remove(b'$')
    .remove(b'&')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b'*')
    .remove(b'+')
    .remove(b',')
    .remove(b';')
    .remove(b'=')
    .remove(b':')
    .remove(b'@');

/// Percent-encode a key for use in a URI path.
fn encode_key(key: &str) -> String {
    utf8_percent_encode(key, PATH_SEGMENT).to_string()
}

/// Reject keys that cannot name a single path segment on read.
///
/// `.` and `..` are dot segments: they survive percent-encoding unchanged and
/// are normalised away by servers and proxies.
fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::InvalidRequest("Key must not be empty".to_string()));
    }
    if key == "." || key == ".." {
        return Err(Error::InvalidRequest(format!("Key '{}' is a dot segment", key)));
    }
    Ok(())
}

/// Async client for an OpenKeyVal service
///
/// Values are saved with a form POST to the base URL and read back with a
/// GET on `base_url + key`. Every value goes through a [`ValuePipeline`]:
/// JSON, then optionally gzip + Base64 when `use_compression` is set. The
/// same flag must be used to read a key as was used to write it.
///
/// The client holds no mutable state and is cheap to clone; clones share the
/// transport.
///
/// # Example
/// ```rust,no_run
/// use openkeyval::StoreClient;
///
/// #[tokio::main]
/// async fn main() -> Result<(), openkeyval::Error> {
///     let client = StoreClient::with_base_url("http://localhost:8080/")?;
///
///     client.save_string("loc-123", "Reno, NV, USA", false).await?;
///     let location = client.get_string("loc-123", false).await?;
///     assert_eq!(location, "Reno, NV, USA");
///
///     Ok(())
/// }
/// ```
pub struct StoreClient<T = HyperTransport> {
    base_url: Arc<str>,
    transport: Arc<T>,
    pipeline: ValuePipeline,
}

impl<T> Clone for StoreClient<T> {
    fn clone(&self) -> Self {
        Self {
            base_url: Arc::clone(&self.base_url),
            transport: Arc::clone(&self.transport),
            pipeline: self.pipeline,
        }
    }
}

impl StoreClient<HyperTransport> {
    /// Create a client for the public OpenKeyVal endpoint
    pub fn new() -> Result<Self> {
        Self::with_config(ClientConfig::default())
    }

    /// Create a client for a specific base URL
    ///
    /// # Errors
    /// Returns an error if the URL is not an http(s) URL
    pub fn with_base_url(base_url: &str) -> Result<Self> {
        Self::with_config(ClientConfig::with_base_url(base_url))
    }

    /// Create a new client with custom configuration
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        let transport = HyperTransport::new(config.timeout_ms)?;
        Self::with_transport_and_config(transport, config)
    }
}

impl<T: Transport> StoreClient<T> {
    /// Create a client over a caller-supplied transport
    pub fn with_transport(base_url: &str, transport: T) -> Result<Self> {
        Self::with_transport_and_config(transport, ClientConfig::with_base_url(base_url))
    }

    /// Create a client over a caller-supplied transport with custom configuration.
    ///
    /// `config.timeout_ms` is ignored here; deadlines belong to the transport.
    pub fn with_transport_and_config(transport: T, config: ClientConfig) -> Result<Self> {
        let base_url = config.normalized_base_url()?;
        debug!("Created store client for {}", base_url);

        Ok(Self {
            base_url: Arc::from(base_url),
            transport: Arc::new(transport),
            pipeline: ValuePipeline::new(Compressor::new(config.compression_level)),
        })
    }

    /// Get the base URL (always ends with `/`)
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get the value pipeline used by this client
    pub fn pipeline(&self) -> &ValuePipeline {
        &self.pipeline
    }

    /// Get the underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn key_url(&self, key: &str) -> String {
        format!("{}{}", self.base_url, encode_key(key))
    }

    /// Validate keys and encode values into form fields, sorted by key.
    pub(crate) fn encode_fields<I, K, V>(&self, entries: I, use_compression: bool) -> Result<Vec<(String, String)>>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Serialize,
    {
        let mut fields = BTreeMap::new();
        for (key, value) in entries {
            let key = key.as_ref();
            validate_key(key)?;
            let payload = self.pipeline.encode_value(&value, use_compression)?;
            fields.insert(key.to_string(), payload);
        }

        if fields.is_empty() {
            return Err(Error::InvalidRequest("Batch must contain at least one entry".to_string()));
        }
        Ok(fields.into_iter().collect())
    }

    /// Decode a fetched payload; an empty payload is an unset key.
    pub(crate) fn decode_optional<V: DeserializeOwned>(&self, payload: &str, use_compression: bool) -> Result<Option<V>> {
        if payload.is_empty() {
            return Ok(None);
        }
        self.pipeline.decode_value(payload, use_compression).map(Some)
    }

    pub(crate) async fn send_fields(&self, fields: Vec<(String, String)>) -> Result<String> {
        debug!("Saving {} key(s) to {}", fields.len(), self.base_url);
        self.transport.post_form(&self.base_url, &fields).await
    }

    pub(crate) async fn fetch_payload(&self, key: &str) -> Result<String> {
        validate_key(key)?;
        let payload = self.transport.get_text(&self.key_url(key)).await?;
        debug!("Fetched key {} ({} bytes)", key, payload.len());
        Ok(payload)
    }

    /// Store a value under a key
    ///
    /// # Returns
    /// The raw response body from the service
    ///
    /// # Example
    /// ```rust,no_run
    /// # use openkeyval::StoreClient;
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), openkeyval::Error> {
    /// # let client = StoreClient::new()?;
    /// let reply = client.save("scores", &vec![3, 1, 4], false).await?;
    /// println!("Service said: {}", reply);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn save<V: Serialize + ?Sized>(&self, key: &str, value: &V, use_compression: bool) -> Result<String> {
        let fields = self.encode_fields(std::iter::once((key, value)), use_compression)?;
        self.send_fields(fields).await
    }

    /// Store several values in a single request
    ///
    /// Duplicate keys collapse to the last value given. The batch is one
    /// POST, so it either succeeds or fails as a whole.
    ///
    /// # Example
    /// ```rust,no_run
    /// # use openkeyval::StoreClient;
    /// # use std::collections::HashMap;
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), openkeyval::Error> {
    /// # let client = StoreClient::new()?;
    /// let mut entries = HashMap::new();
    /// entries.insert("user-1", "Ada");
    /// entries.insert("user-2", "Grace");
    /// client.save_many(&entries, false).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn save_many<I, K, V>(&self, entries: I, use_compression: bool) -> Result<String>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Serialize,
    {
        let fields = self.encode_fields(entries, use_compression)?;
        self.send_fields(fields).await
    }

    /// Store a string value (convenience method; the string is still JSON-quoted)
    pub async fn save_string(&self, key: &str, value: &str, use_compression: bool) -> Result<String> {
        self.save(key, value, use_compression).await
    }

    /// Retrieve a value and decode it into `V`
    ///
    /// # Errors
    /// Transport errors, or a decoding/decompression error when the stored
    /// payload does not match `V` or `use_compression`. An unset key has an
    /// empty payload, which fails to decode; see
    /// [`get_optional`](Self::get_optional).
    pub async fn get<V: DeserializeOwned>(&self, key: &str, use_compression: bool) -> Result<V> {
        let payload = self.fetch_payload(key).await?;
        self.pipeline.decode_value(&payload, use_compression)
    }

    /// Retrieve a value, returning `None` when the key is unset
    pub async fn get_optional<V: DeserializeOwned>(&self, key: &str, use_compression: bool) -> Result<Option<V>> {
        let payload = self.fetch_payload(key).await?;
        self.decode_optional(&payload, use_compression)
    }

    /// Retrieve a string value; unset and deleted keys yield `""`
    ///
    /// # Example
    /// ```rust,no_run
    /// # use openkeyval::StoreClient;
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), openkeyval::Error> {
    /// # let client = StoreClient::new()?;
    /// let location = client.get_string("loc-123", false).await?;
    /// if location.is_empty() {
    ///     println!("No location stored");
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn get_string(&self, key: &str, use_compression: bool) -> Result<String> {
        Ok(self.get_optional(key, use_compression).await?.unwrap_or_default())
    }

    /// Delete a key by overwriting it with an empty string
    ///
    /// The service has no delete verb, so a later [`get_string`](Self::get_string)
    /// returns `""` rather than an error.
    pub async fn delete(&self, key: &str) -> Result<String> {
        self.save(key, "", false).await
    }
}

//! HTTP transport used by the store client

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use http::header::CONTENT_TYPE;
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::{Method, Request, Response, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client as HttpClient;
use hyper_util::rt::TokioExecutor;
use tracing::{debug, warn};

use crate::error::{Error, Result};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// The two HTTP operations the store client needs.
///
/// Implementations must be safe to share between concurrent calls.
#[async_trait]
pub trait Transport: Send + Sync {
    /// POST `fields` as a form-urlencoded body to `url` and return the response body
    async fn post_form(&self, url: &str, fields: &[(String, String)]) -> Result<String>;

    /// GET `url` and return the response body
    async fn get_text(&self, url: &str) -> Result<String>;
}

/// Encode form fields as `application/x-www-form-urlencoded`
pub fn encode_form(fields: &[(String, String)]) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(fields.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .finish()
}

/// Build a rustls ClientConfig verifying servers against the webpki roots.
fn build_tls_config() -> Result<rustls::ClientConfig> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());

    let mut roots = rustls::RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    Ok(rustls::ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| Error::Tls(e.to_string()))?
        .with_root_certificates(roots)
        .with_no_client_auth())
}

type HttpsConnector = hyper_rustls::HttpsConnector<HttpConnector>;

/// Transport over hyper, speaking HTTP/1.1 or HTTP/2, plaintext or TLS.
///
/// Idle connections are not pooled: every call opens its own connection and
/// releases it when the response body has been read.
#[derive(Clone)]
pub struct HyperTransport {
    http_client: HttpClient<HttpsConnector, Full<Bytes>>,
    timeout_ms: Option<u64>,
}

impl HyperTransport {
    /// Create a transport with an optional per-request deadline
    pub fn new(timeout_ms: Option<u64>) -> Result<Self> {
        let tls_config = build_tls_config()?;

        let https_connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_tls_config(tls_config)
            .https_or_http()
            .enable_http1()
            .enable_http2()
            .build();

        let http_client = HttpClient::builder(TokioExecutor::new())
            .pool_max_idle_per_host(0)
            .build(https_connector);

        Ok(Self {
            http_client,
            timeout_ms,
        })
    }

    /// Get the per-request deadline
    pub fn timeout_ms(&self) -> Option<u64> {
        self.timeout_ms
    }

    async fn request(&self, method: Method, url: &str, body: Option<String>) -> Result<String> {
        let uri: Uri = url
            .parse()
            .map_err(|e| Error::InvalidUrl(format!("Invalid request URL '{}': {}", url, e)))?;

        let mut builder = Request::builder().method(method.clone()).uri(uri);
        if body.is_some() {
            builder = builder.header(CONTENT_TYPE, FORM_CONTENT_TYPE);
        }

        let body = body.map(Bytes::from).unwrap_or_default();
        debug!("Sending request: {} {} ({} bytes)", method, url, body.len());

        let req = builder
            .body(Full::new(body))
            .map_err(|e| Error::InvalidUrl(format!("Failed to build request: {}", e)))?;

        let send = async {
            let response = self
                .http_client
                .request(req)
                .await
                .map_err(|e| Error::Connection(format!("Request failed: {}", e)))?;
            Self::read_response(response).await
        };

        match self.timeout_ms {
            Some(ms) => tokio::time::timeout(Duration::from_millis(ms), send)
                .await
                .map_err(|_| Error::Timeout(ms))?,
            None => send.await,
        }
    }

    async fn read_response(response: Response<Incoming>) -> Result<String> {
        let status = response.status();
        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| Error::Connection(format!("Failed to read body: {}", e)))?
            .to_bytes();
        let text = String::from_utf8_lossy(&body).into_owned();

        if !status.is_success() {
            warn!("Service answered {}", status);
            return Err(Error::Status {
                status: status.as_u16(),
                message: text,
            });
        }

        Ok(text)
    }
}

#[async_trait]
impl Transport for HyperTransport {
    async fn post_form(&self, url: &str, fields: &[(String, String)]) -> Result<String> {
        self.request(Method::POST, url, Some(encode_form(fields))).await
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        self.request(Method::GET, url, None).await
    }
}

//! A typed client for the OpenKeyVal HTTP key-value service
//!
//! Values of any serde-serializable type are stored as JSON text under a key,
//! optionally gzip-compressed and Base64-encoded so they stay printable in a
//! form POST. Reads are a plain GET on `base_url + key`.
//!
//! # Features
//! - Async client ([`StoreClient`]) and blocking client ([`BlockingStoreClient`])
//! - Optional gzip + Base64 compression per call
//! - Batched saves in a single request
//! - Pluggable [`Transport`] for tests and custom HTTP stacks
//!
//! Compression only pays off for large values: a short string grows once it
//! is gzipped and Base64-encoded.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use openkeyval::StoreClient;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize)]
//! struct PostInfo {
//!     post_id: u32,
//!     data: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), openkeyval::Error> {
//!     let client = StoreClient::new()?;
//!
//!     let post = PostInfo { post_id: 3, data: "Here is our test.".to_string() };
//!     client.save("post-3", &post, true).await?;
//!
//!     let post: PostInfo = client.get("post-3", true).await?;
//!     println!("{}: {}", post.post_id, post.data);
//!
//!     client.delete("post-3").await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs, rust_2018_idioms)]

pub mod blocking;
pub mod client;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod transport;
#[allow(missing_docs)]
pub mod util;

pub use blocking::BlockingStoreClient;
pub use client::StoreClient;
pub use config::ClientConfig;
pub use error::{Error, Result};
pub use pipeline::ValuePipeline;
pub use transport::{HyperTransport, Transport};
pub use util::Compressor;

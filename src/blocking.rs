//! Blocking store client
//!
//! Same operations as [`StoreClient`]. Values are encoded and decoded on the
//! calling thread; the HTTP exchange runs on a dedicated worker thread that
//! owns a current-thread tokio runtime. The calling thread only waits on a
//! channel, so the client works from plain threads, from
//! `tokio::task::spawn_blocking`, and can be created and dropped anywhere.
//! Calling it directly on an async worker thread stalls that thread for the
//! duration of the request, like any other blocking I/O.

use std::future::Future;
use std::pin::Pin;
use std::sync::mpsc as std_mpsc;
use std::thread::{self, JoinHandle};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::runtime::Builder;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::client::StoreClient;
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::transport::{HyperTransport, Transport};

type Task = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Thread driving the HTTP exchanges of one blocking client.
///
/// Dropping it closes the task queue and joins the thread, so the runtime is
/// always torn down outside of any async context.
struct Worker {
    tasks: Option<mpsc::UnboundedSender<Task>>,
    thread: Option<JoinHandle<()>>,
}

impl Worker {
    fn spawn() -> Result<Self> {
        let (tasks, mut queue) = mpsc::unbounded_channel::<Task>();
        let (ready_tx, ready_rx) = std_mpsc::channel::<Result<()>>();

        let thread = thread::Builder::new()
            .name("okv-blocking".to_string())
            .spawn(move || {
                let runtime = match Builder::new_current_thread().enable_all().build() {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        let _ = ready_tx.send(Err(Error::Runtime(format!("failed to create tokio runtime: {}", e))));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));

                runtime.block_on(async move {
                    while let Some(task) = queue.recv().await {
                        tokio::spawn(task);
                    }
                });
                debug!("Blocking worker stopped");
            })
            .map_err(|e| Error::Runtime(format!("failed to spawn worker thread: {}", e)))?;

        ready_rx
            .recv()
            .map_err(|_| Error::Runtime("worker thread exited during startup".to_string()))??;

        Ok(Self {
            tasks: Some(tasks),
            thread: Some(thread),
        })
    }

    fn submit(&self, task: Task) -> Result<()> {
        self.tasks
            .as_ref()
            .and_then(|tasks| tasks.send(task).ok())
            .ok_or_else(|| Error::Runtime("blocking worker has shut down".to_string()))
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        drop(self.tasks.take());
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Blocking worker thread panicked");
            }
        }
    }
}

/// Synchronous client for an OpenKeyVal service
///
/// # Example
/// ```rust,no_run
/// use openkeyval::BlockingStoreClient;
///
/// # fn main() -> Result<(), openkeyval::Error> {
/// let client = BlockingStoreClient::with_base_url("http://localhost:8080/")?;
/// client.save_string("loc-123", "Reno, NV, USA", true)?;
/// assert_eq!(client.get_string("loc-123", true)?, "Reno, NV, USA");
/// # Ok(())
/// # }
/// ```
pub struct BlockingStoreClient<T = HyperTransport> {
    inner: StoreClient<T>,
    worker: Worker,
}

impl BlockingStoreClient<HyperTransport> {
    /// Create a client for the public OpenKeyVal endpoint
    pub fn new() -> Result<Self> {
        Self::from_async(StoreClient::new()?)
    }

    /// Create a client for a specific base URL
    pub fn with_base_url(base_url: &str) -> Result<Self> {
        Self::from_async(StoreClient::with_base_url(base_url)?)
    }

    /// Create a new client with custom configuration
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        Self::from_async(StoreClient::with_config(config)?)
    }
}

impl<T: Transport + 'static> BlockingStoreClient<T> {
    /// Create a client over a caller-supplied transport
    pub fn with_transport(base_url: &str, transport: T) -> Result<Self> {
        Self::from_async(StoreClient::with_transport(base_url, transport)?)
    }

    /// Wrap an existing async client
    pub fn from_async(inner: StoreClient<T>) -> Result<Self> {
        let worker = Worker::spawn()?;
        debug!("Started blocking worker for {}", inner.base_url());
        Ok(Self { inner, worker })
    }

    /// Get the async client this one drives
    pub fn as_async(&self) -> &StoreClient<T> {
        &self.inner
    }

    /// Get the base URL (always ends with `/`)
    pub fn base_url(&self) -> &str {
        self.inner.base_url()
    }

    /// Run `exchange` on the worker thread and wait for its result
    fn execute<F, Fut, R>(&self, exchange: F) -> Result<R>
    where
        F: FnOnce(StoreClient<T>) -> Fut,
        Fut: Future<Output = Result<R>> + Send + 'static,
        R: Send + 'static,
    {
        let (reply_tx, reply_rx) = std_mpsc::channel();
        let future = exchange(self.inner.clone());
        self.worker.submit(Box::pin(async move {
            let _ = reply_tx.send(future.await);
        }))?;

        reply_rx
            .recv()
            .map_err(|_| Error::Runtime("blocking worker dropped the request".to_string()))?
    }

    fn fetch(&self, key: &str) -> Result<String> {
        let key = key.to_string();
        self.execute(move |client| async move { client.fetch_payload(&key).await })
    }

    /// Store a value under a key; see [`StoreClient::save`]
    pub fn save<V: Serialize + ?Sized>(&self, key: &str, value: &V, use_compression: bool) -> Result<String> {
        let fields = self.inner.encode_fields(std::iter::once((key, value)), use_compression)?;
        self.execute(move |client| async move { client.send_fields(fields).await })
    }

    /// Store several values in a single request; see [`StoreClient::save_many`]
    pub fn save_many<I, K, V>(&self, entries: I, use_compression: bool) -> Result<String>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Serialize,
    {
        let fields = self.inner.encode_fields(entries, use_compression)?;
        self.execute(move |client| async move { client.send_fields(fields).await })
    }

    /// Store a string value; see [`StoreClient::save_string`]
    pub fn save_string(&self, key: &str, value: &str, use_compression: bool) -> Result<String> {
        self.save(key, value, use_compression)
    }

    /// Retrieve and decode a value; see [`StoreClient::get`]
    pub fn get<V: DeserializeOwned>(&self, key: &str, use_compression: bool) -> Result<V> {
        let payload = self.fetch(key)?;
        self.inner.pipeline().decode_value(&payload, use_compression)
    }

    /// Retrieve a value or `None` for an unset key; see [`StoreClient::get_optional`]
    pub fn get_optional<V: DeserializeOwned>(&self, key: &str, use_compression: bool) -> Result<Option<V>> {
        let payload = self.fetch(key)?;
        self.inner.decode_optional(&payload, use_compression)
    }

    /// Retrieve a string value; see [`StoreClient::get_string`]
    pub fn get_string(&self, key: &str, use_compression: bool) -> Result<String> {
        Ok(self.get_optional(key, use_compression)?.unwrap_or_default())
    }

    /// Overwrite a key with an empty string; see [`StoreClient::delete`]
    pub fn delete(&self, key: &str) -> Result<String> {
        self.save(key, "", false)
    }
}

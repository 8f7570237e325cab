//! Shared HTTP client pool for image downloads.
//!
//! [`HttpPool`] wraps one `reqwest::Client` (keep-alive, redirects, timeout,
//! user agent) and a semaphore that caps concurrent in-flight downloads at
//! `max_connections`. Clones share the same client and the same cap.
//!
//! [`ResourceManager`] owns the process-wide slot: the first image request
//! creates the pool lazily, later requests reuse it, and shutdown closes it.
//! Creation happens under an async mutex so concurrent first requests still
//! produce exactly one pool.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use reqwest::redirect::Policy;
use tokio::sync::{Mutex, Semaphore};

use crate::config::HttpPoolConfig;
use crate::error::{EmbedError, EmbedResult};

#[derive(Debug)]
struct PoolInner {
    client: reqwest::Client,
    permits: Semaphore,
    config: HttpPoolConfig,
    generation: u64,
}

/// A cheaply clonable handle to the shared download client.
#[derive(Debug, Clone)]
pub struct HttpPool {
    inner: Arc<PoolInner>,
}

impl HttpPool {
    /// Build a pool from validated settings.
    pub fn new(config: &HttpPoolConfig) -> EmbedResult<Self> {
        Self::with_generation(config, 0)
    }

    fn with_generation(config: &HttpPoolConfig, generation: u64) -> EmbedResult<Self> {
        if !(config.timeout_secs.is_finite() && config.timeout_secs > 0.0) {
            return Err(EmbedError::Internal(format!(
                "HTTP client timeout must be positive, got {}",
                config.timeout_secs
            )));
        }
        if config.max_connections == 0 {
            return Err(EmbedError::Internal(
                "HTTP client max_connections must be at least 1".into(),
            ));
        }

        let redirect = if config.follow_redirects {
            Policy::limited(config.max_redirects)
        } else {
            Policy::none()
        };
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout())
            .pool_max_idle_per_host(config.max_keepalive_connections)
            .redirect(redirect)
            .build()
            .map_err(|e| EmbedError::Internal(format!("failed to build HTTP client: {e}")))?;

        tracing::info!(
            max_connections = config.max_connections,
            max_keepalive = config.max_keepalive_connections,
            timeout_secs = config.timeout_secs,
            generation,
            "http pool created"
        );

        Ok(Self {
            inner: Arc::new(PoolInner {
                client,
                permits: Semaphore::new(config.max_connections),
                config: config.clone(),
                generation,
            }),
        })
    }

    /// GET `url` and return the body. Waits for a connection slot first.
    /// Transport failures and non-2xx statuses are `Download` errors.
    pub async fn fetch(&self, url: &str) -> EmbedResult<Bytes> {
        let _permit = self
            .inner
            .permits
            .acquire()
            .await
            .map_err(|_| EmbedError::Download("HTTP client pool is closed".into()))?;

        let response = self
            .inner
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| describe_transport_error(url, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(EmbedError::Download(format!(
                "Failed to download image from URL: {url} (HTTP {})",
                status.as_u16()
            )));
        }

        response
            .bytes()
            .await
            .map_err(|e| describe_transport_error(url, &e))
    }

    /// Whether [`close`](Self::close) has run. Closed pools reject new fetches.
    pub fn is_closed(&self) -> bool {
        self.inner.permits.is_closed()
    }

    /// Stop handing out connection slots. In-flight fetches finish normally.
    pub fn close(&self) {
        self.inner.permits.close();
    }

    /// Connection slots currently free.
    pub fn available_permits(&self) -> usize {
        self.inner.permits.available_permits()
    }

    pub fn config(&self) -> &HttpPoolConfig {
        &self.inner.config
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.inner.client
    }

    /// Creation counter; a pool rebuilt after release gets a higher value.
    pub fn generation(&self) -> u64 {
        self.inner.generation
    }

    /// Whether two handles point at the same underlying pool.
    pub fn same_pool(&self, other: &HttpPool) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

fn describe_transport_error(url: &str, err: &reqwest::Error) -> EmbedError {
    let reason = if err.is_timeout() {
        "request timed out".to_string()
    } else if err.is_connect() {
        "connection failed".to_string()
    } else if err.is_redirect() {
        "too many redirects".to_string()
    } else {
        err.to_string()
    };
    EmbedError::Download(format!("Failed to download image from URL: {url} ({reason})"))
}

/// Owner of the lazily created process-wide pool.
#[derive(Debug)]
pub struct ResourceManager {
    config: HttpPoolConfig,
    slot: Mutex<Option<HttpPool>>,
    created: AtomicU64,
}

impl ResourceManager {
    pub fn new(config: HttpPoolConfig) -> Self {
        Self {
            config,
            slot: Mutex::new(None),
            created: AtomicU64::new(0),
        }
    }

    /// Return the live pool, creating it on first use. Idempotent.
    pub async fn acquire(&self) -> EmbedResult<HttpPool> {
        let mut slot = self.slot.lock().await;
        if let Some(pool) = slot.as_ref() {
            return Ok(pool.clone());
        }
        let generation = self.created.load(Ordering::Acquire);
        let pool = HttpPool::with_generation(&self.config, generation)?;
        self.created.fetch_add(1, Ordering::AcqRel);
        *slot = Some(pool.clone());
        Ok(pool)
    }

    /// Close and forget the pool. Returns whether one existed; a second call is a no-op.
    pub async fn release(&self) -> bool {
        let mut slot = self.slot.lock().await;
        match slot.take() {
            Some(pool) => {
                pool.close();
                tracing::info!(generation = pool.generation(), "http pool released");
                true
            }
            None => false,
        }
    }

    /// The live pool, without creating one.
    pub async fn current(&self) -> Option<HttpPool> {
        self.slot.lock().await.clone()
    }

    /// How many pools have been built over the manager's lifetime.
    pub fn pools_created(&self) -> u64 {
        self.created.load(Ordering::Acquire)
    }

    pub fn config(&self) -> &HttpPoolConfig {
        &self.config
    }
}

use redis::AsyncCommands;
use redis::Client;
use std::fmt::Display;
use tokio::sync::mpsc;

use crate::error::AppResult;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Audio feature vector of one track
    AudioFeatures(String),
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheKey::AudioFeatures(track_id) => write!(f, "features:{}", track_id),
        }
    }
}

/// Creates a Redis client for caching
pub fn create_redis_client(redis_url: &str) -> anyhow::Result<Client> {
    let client = Client::open(redis_url)?;
    Ok(client)
}

/// Pending write handed to the background writer
struct CacheWrite {
    key: String,
    value: String,
    ttl: u64,
}

/// Redis-backed JSON cache.
///
/// Reads go straight to Redis. Writes are queued and applied by a background
/// task so callers never wait on them.
#[derive(Clone)]
pub struct Cache {
    redis_client: Client,
    write_tx: mpsc::UnboundedSender<CacheWrite>,
}

/// Handle for stopping the background writer
pub struct CacheWriterHandle {
    shutdown_tx: mpsc::Sender<()>,
    writer: tokio::task::JoinHandle<()>,
}

impl CacheWriterHandle {
    /// Signals the writer, waits for queued writes to be flushed
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        if let Err(e) = self.writer.await {
            tracing::error!(error = %e, "Cache writer task panicked");
        }
    }
}

impl Cache {
    /// Creates the cache and spawns its writer task
    pub fn new(redis_client: Client) -> (Self, CacheWriterHandle) {
        let (write_tx, write_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let writer = tokio::spawn(Self::run_writer(redis_client.clone(), write_rx, shutdown_rx));

        (
            Self {
                redis_client,
                write_tx,
            },
            CacheWriterHandle {
                shutdown_tx,
                writer,
            },
        )
    }

    async fn run_writer(
        client: Client,
        mut write_rx: mpsc::UnboundedReceiver<CacheWrite>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        tracing::info!("Cache writer started");
        let mut failed: u64 = 0;

        loop {
            tokio::select! {
                Some(write) = write_rx.recv() => {
                    if let Err(e) = Self::apply(&client, write).await {
                        failed += 1;
                        tracing::warn!(error = %e, failed, "Cache write failed");
                    }
                }
                _ = shutdown_rx.recv() => {
                    // Stop accepting, then drain what is already queued
                    write_rx.close();
                    let mut flushed = 0usize;
                    while let Some(write) = write_rx.recv().await {
                        match Self::apply(&client, write).await {
                            Ok(()) => flushed += 1,
                            Err(e) => tracing::warn!(error = %e, "Cache write failed during shutdown"),
                        }
                    }
                    tracing::info!(flushed, failed, "Cache writer stopped");
                    break;
                }
            }
        }
    }

    async fn apply(client: &Client, write: CacheWrite) -> AppResult<()> {
        let mut conn = client.get_multiplexed_async_connection().await?;
        let _: () = conn.set_ex(write.key, write.value, write.ttl).await?;
        Ok(())
    }

    /// Fetches several keys in one round trip.
    ///
    /// The result lines up with `keys`; misses and undecodable entries are `None`.
    pub async fn get_many<T: serde::de::DeserializeOwned>(
        &self,
        keys: &[CacheKey],
    ) -> AppResult<Vec<Option<T>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let names: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let raw: Vec<Option<String>> = if names.len() == 1 {
            // MGET with a single key replies with a bare value
            vec![conn.get(&names[0]).await?]
        } else {
            conn.mget(&names).await?
        };

        Ok(raw
            .into_iter()
            .zip(names.iter())
            .map(|(value, name)| {
                value.and_then(|json| match serde_json::from_str(&json) {
                    Ok(decoded) => Some(decoded),
                    Err(e) => {
                        tracing::warn!(key = %name, error = %e, "Dropping undecodable cache entry");
                        None
                    }
                })
            })
            .collect())
    }

    /// Queues a write and returns immediately
    pub fn set_in_background<T: serde::Serialize>(&self, key: &CacheKey, value: &T, ttl: u64) {
        let value = match serde_json::to_string(value) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(key = %key, error = %e, "Cache serialization error");
                return;
            }
        };

        let write = CacheWrite {
            key: key.to_string(),
            value,
            ttl,
        };

        if self.write_tx.send(write).is_err() {
            tracing::warn!(key = %key, "Cache writer is gone, dropping write");
        }
    }
}

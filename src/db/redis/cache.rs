use redis::AsyncCommands;
use redis::Client;
use sha2::{Digest, Sha256};
use std::fmt::Display;
use tokio::sync::mpsc;

use crate::error::AppError;
use crate::error::AppResult;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Embedding of a text under a given model, keyed by a digest of both
    Embedding { model: String, digest: String },
}

impl CacheKey {
    /// Key for the embedding of `text` produced by `model`
    pub fn embedding(model: &str, text: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(model.as_bytes());
        hasher.update([0u8]);
        hasher.update(text.as_bytes());
        CacheKey::Embedding {
            model: model.to_lowercase(),
            digest: hex::encode(hasher.finalize()),
        }
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheKey::Embedding { model, digest } => write!(f, "embed:{}:{}", model, digest),
        }
    }
}

/// Creates a Redis client for caching
pub fn create_redis_client(redis_url: &str) -> anyhow::Result<Client> {
    let client = Client::open(redis_url)?;
    Ok(client)
}

struct PendingWrite {
    key: String,
    payload: String,
    ttl: u64,
}

/// Redis cache with fire-and-forget writes.
///
/// Reads go straight to Redis. Writes are queued on a channel and flushed by a
/// background task so callers never wait on them.
#[derive(Clone)]
pub struct Cache {
    redis_client: Client,
    write_tx: mpsc::UnboundedSender<PendingWrite>,
}

/// Stops the background writer after draining queued writes
pub struct CacheWriterHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: tokio::task::JoinHandle<()>,
}

impl CacheWriterHandle {
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Cache writer task panicked");
        }
        tracing::info!("Cache writer stopped");
    }
}

impl Cache {
    /// Spawns the writer task and returns the cache plus its shutdown handle
    pub fn new(redis_client: Client) -> (Self, CacheWriterHandle) {
        let (write_tx, write_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let client = redis_client.clone();
        let task = tokio::spawn(Self::run_writer(client, write_rx, shutdown_rx));

        (
            Self {
                redis_client,
                write_tx,
            },
            CacheWriterHandle { shutdown_tx, task },
        )
    }

    async fn run_writer(
        client: Client,
        mut write_rx: mpsc::UnboundedReceiver<PendingWrite>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        let mut failed = 0usize;

        loop {
            tokio::select! {
                Some(write) = write_rx.recv() => {
                    if let Err(e) = Self::write(&client, write).await {
                        failed += 1;
                        tracing::warn!(error = %e, failed, "Cache write failed");
                    }
                }
                Some(()) = shutdown_rx.recv() => {
                    // Close the channel so draining terminates once the queue is empty
                    write_rx.close();
                    while let Some(write) = write_rx.recv().await {
                        if let Err(e) = Self::write(&client, write).await {
                            tracing::warn!(error = %e, "Cache write failed during shutdown");
                        }
                    }
                    break;
                }
                else => break,
            }
        }
    }

    async fn write(client: &Client, write: PendingWrite) -> AppResult<()> {
        let mut conn = client.get_multiplexed_async_connection().await?;
        let _: () = conn.set_ex(write.key, write.payload, write.ttl).await?;
        Ok(())
    }

    /// Returns the cached value for `key`, `None` on a miss
    pub async fn get_from_cache<T: serde::de::DeserializeOwned>(
        &self,
        key: &CacheKey,
    ) -> AppResult<Option<T>> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let payload: Option<String> = conn.get(key.to_string()).await?;

        payload
            .map(|json| {
                serde_json::from_str(&json).map_err(|e| {
                    AppError::Internal(format!("Cache deserialization error for {}: {}", key, e))
                })
            })
            .transpose()
    }

    /// Queues a write without waiting for Redis
    pub fn set_in_background<T: serde::Serialize>(&self, key: &CacheKey, value: &T, ttl: u64) {
        let payload = match serde_json::to_string(value) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(error = %e, key = %key, "Cache serialization error");
                return;
            }
        };

        let write = PendingWrite {
            key: key.to_string(),
            payload,
            ttl,
        };

        if self.write_tx.send(write).is_err() {
            tracing::warn!(key = %key, "Cache writer stopped, dropping write");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_key_is_stable() {
        let a = CacheKey::embedding("all-MiniLM-L6-v2", "RRR. Two revolutionaries.");
        let b = CacheKey::embedding("all-MiniLM-L6-v2", "RRR. Two revolutionaries.");
        assert_eq!(a, b);
        assert_eq!(a.to_string(), b.to_string());
    }

    #[test]
    fn test_embedding_key_varies_by_text_and_model() {
        let base = CacheKey::embedding("model-a", "text");
        assert_ne!(base, CacheKey::embedding("model-a", "other text"));
        assert_ne!(base, CacheKey::embedding("model-b", "text"));
    }

    #[test]
    fn test_embedding_key_display() {
        let key = CacheKey::embedding("MiniLM", "hello");
        let rendered = key.to_string();
        assert!(rendered.starts_with("embed:minilm:"));
        // sha256 hex digest
        assert_eq!(rendered.len(), "embed:minilm:".len() + 64);
    }

    #[tokio::test]
    async fn test_write_after_shutdown_is_dropped() {
        // Never connects: the only queued write happens after the writer stopped
        let client = create_redis_client("redis://127.0.0.1:1").unwrap();
        let (cache, handle) = Cache::new(client);
        handle.shutdown().await;

        cache.set_in_background(&CacheKey::embedding("m", "t"), &vec![0.1f32], 60);
    }
}

//! Singleflight
//!
//! Deduplicates concurrent fetches for a key across both the in-process
//! boundary (many tasks in this instance) and the cross-process boundary
//! (many instances): a distributed lease (atomic create-if-absent with
//! TTL) plus an in-process registry of waiters. In-process followers
//! `subscribe()` to the leader's broadcast channel and wake immediately
//! when it finishes; cross-process followers have no such channel to
//! listen on, so they poll the leader's written result at 1 Hz.

use crate::kv::KvCache;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};

pub struct Singleflight {
    kv: KvCache,
    inflight: Mutex<HashMap<String, broadcast::Sender<()>>>,
}

impl Singleflight {
    pub fn new(kv: KvCache) -> Self {
        Self {
            kv,
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// Runs `fetch` at most once across concurrent callers on the same
    /// `key`, within `timeout`. In-process followers wake as soon as the
    /// leader's broadcast fires; cross-process followers poll the
    /// leader's written value. On timeout, degrade to direct execution.
    pub async fn get_or_fetch<T, F, Fut>(
        &self,
        key: &str,
        timeout: Duration,
        fetch: F,
    ) -> anyhow::Result<T>
    where
        T: serde::Serialize + serde::de::DeserializeOwned + Clone,
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = anyhow::Result<T>>,
    {
        let ttl_seconds = timeout.as_secs().max(1);

        if let Some(mut rx) = self.subscribe_if_inflight(key).await {
            if tokio::time::timeout(timeout, rx.recv()).await.is_ok() {
                if let Ok(Some(value)) = self.kv.get_json::<T>(key).await {
                    return Ok(value);
                }
            }
        }

        let lock_key = format!("lock:{key}");
        let lease_value = uuid::Uuid::new_v4().to_string();
        let acquired = self
            .kv
            .set_nx_ex(&lock_key, &lease_value, ttl_seconds)
            .await
            .unwrap_or(false);

        if acquired {
            let tx = self.register_inflight(key).await;
            let result = fetch().await;
            if let Ok(value) = &result {
                let _ = self.kv.setex_json(key, ttl_seconds as i64, value).await;
            }
            self.release_inflight(key, &tx).await;
            let _ = self.kv.del(&lock_key).await;
            return result;
        }

        // Not the leader and no in-process sender to subscribe to (the
        // leader is in another instance): poll the result key at 1 Hz.
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Ok(Some(value)) = self.kv.get_json::<T>(key).await {
                return Ok(value);
            }
            if tokio::time::Instant::now() >= deadline {
                break;
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }

        // Fallback: run directly, accepting possible duplication rather
        // than stalling the caller.
        fetch().await
    }

    async fn subscribe_if_inflight(&self, key: &str) -> Option<broadcast::Receiver<()>> {
        let guard = self.inflight.lock().await;
        guard.get(key).map(|tx| tx.subscribe())
    }

    async fn register_inflight(&self, key: &str) -> broadcast::Sender<()> {
        let mut guard = self.inflight.lock().await;
        let (tx, _rx) = broadcast::channel(1);
        guard.insert(key.to_string(), tx.clone());
        tx
    }

    async fn release_inflight(&self, key: &str, tx: &broadcast::Sender<()>) {
        let _ = tx.send(());
        let mut guard = self.inflight.lock().await;
        guard.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn single_caller_runs_fetch_once() {
        // Real tests against a live Redis are integration-level; this
        // exercises the pure fallback path when the KV lease can never
        // be acquired (simulated via an unreachable URL).
        let kv = KvCache::new("redis://127.0.0.1:1/").expect("client construction never touches the network");
        let sf = Singleflight::new(kv);

        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let result: anyhow::Result<i32> = sf
            .get_or_fetch("test-key", Duration::from_millis(50), || {
                let calls = calls_clone.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(42)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn release_inflight_removes_the_registry_entry_and_wakes_subscribers() {
        let kv = KvCache::new("redis://127.0.0.1:1/").expect("client construction never touches the network");
        let sf = Singleflight::new(kv);

        let tx = sf.register_inflight("k").await;
        let mut rx = sf.subscribe_if_inflight("k").await.expect("leader just registered");
        assert!(sf.subscribe_if_inflight("gone").await.is_none());

        sf.release_inflight("k", &tx).await;

        assert!(rx.recv().await.is_ok());
        assert!(sf.inflight.lock().await.is_empty());
    }
}

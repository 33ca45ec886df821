use crate::manager::CacheManager;
use cf_core::CoreError;
use std::any::Any;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::OnceCell;

type InflightCell<V> = Arc<OnceCell<Result<V, CoreError>>>;

impl CacheManager {
    fn inflight_cell<V: Clone + Send + Sync + 'static>(&self, namespace: &str, key: &str) -> InflightCell<V> {
        let mut table = self.inflight.lock().expect("inflight table lock poisoned");
        let slot = table
            .entry((namespace.to_string(), key.to_string()))
            .or_insert_with(|| Box::new(InflightCell::<V>::new(OnceCell::new())) as Box<dyn Any + Send + Sync>);
        slot.downcast_ref::<InflightCell<V>>()
            .expect("memoise called with a different value type for an in-flight key")
            .clone()
    }

    fn release_inflight<V: Clone + Send + Sync + 'static>(&self, namespace: &str, key: &str, cell: &InflightCell<V>) {
        let mut table = self.inflight.lock().expect("inflight table lock poisoned");
        let still_current = table
            .get(&(namespace.to_string(), key.to_string()))
            .and_then(|slot| slot.downcast_ref::<InflightCell<V>>())
            .map(|existing| Arc::ptr_eq(existing, cell))
            .unwrap_or(false);
        if still_current {
            table.remove(&(namespace.to_string(), key.to_string()));
        }
    }

    /// Concurrent calls with the same `(namespace, key)` share a single
    /// in-flight `compute`; losers await the winner's result instead of
    /// recomputing. A failed computation is not cached and
    /// every waiter observes the same failure.
    pub async fn memoise<V, F, Fut>(
        &self,
        namespace: &str,
        key: &str,
        ttl_ms: Option<u64>,
        bytes: u64,
        compute: F,
    ) -> Result<V, CoreError>
    where
        V: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, CoreError>>,
    {
        if let Some(cached) = self.get::<V>(namespace, key) {
            return Ok(cached);
        }

        let cell = self.inflight_cell::<V>(namespace, key);
        let result = cell
            .get_or_init(|| async {
                if let Some(cached) = self.get::<V>(namespace, key) {
                    return Ok(cached);
                }
                let outcome = compute().await;
                if let Ok(value) = &outcome {
                    self.set(namespace, key, value.clone(), ttl_ms, bytes);
                }
                outcome
            })
            .await
            .clone();
        self.release_inflight(namespace, key, &cell);
        result
    }

    /// Fills `namespace`'s entries from `items` unless already present
    ///. Entries are computed sequentially; a
    /// failed compute simply leaves that key unfilled.
    pub async fn preload<V, F, Fut>(&self, namespace: &str, items: Vec<(String, F)>, ttl_ms: Option<u64>, bytes: u64)
    where
        V: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, CoreError>>,
    {
        for (key, compute) in items {
            if self.get::<V>(namespace, &key).is_some() {
                continue;
            }
            if let Ok(value) = compute().await {
                self.set(namespace, &key, value, ttl_ms, bytes);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn concurrent_memoise_calls_share_one_computation() {
        let cache = Arc::new(CacheManager::new(CacheConfig::default()));
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .memoise("ai-move", "k", None, 4, || {
                        let calls = calls.clone();
                        async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                            Ok::<i32, CoreError>(7)
                        }
                    })
                    .await
            }));
        }
        let results = futures::future::join_all(handles).await;
        for r in results {
            assert_eq!(r.unwrap().unwrap(), 7);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn memoise_failure_is_not_cached_and_shared_by_all_waiters() {
        let cache = Arc::new(CacheManager::new(CacheConfig::default()));
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let cache = cache.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .memoise("ns", "k", None, 4, || {
                        let calls = calls.clone();
                        async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            Err::<i32, CoreError>(CoreError::TransientCompute("boom".into()))
                        }
                    })
                    .await
            }));
        }
        let results = futures::future::join_all(handles).await;
        for r in results {
            assert!(r.unwrap().is_err());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.get::<i32>("ns", "k"), None);
    }

    #[tokio::test]
    async fn preload_skips_keys_already_present() {
        let cache = CacheManager::new(CacheConfig::default());
        cache.set("ns", "a", 99i32, None, 4);
        let computed = Arc::new(AtomicUsize::new(0));
        let c = computed.clone();
        type BoxedFut = std::pin::Pin<Box<dyn Future<Output = Result<i32, CoreError>> + Send>>;
        cache
            .preload(
                "ns",
                vec![
                    ("a".to_string(), {
                        let c = c.clone();
                        Box::new(move || -> BoxedFut {
                            let c = c.clone();
                            Box::pin(async move {
                                c.fetch_add(1, Ordering::SeqCst);
                                Ok::<i32, CoreError>(1)
                            })
                        }) as Box<dyn FnOnce() -> BoxedFut>
                    }),
                    ("b".to_string(), {
                        Box::new(move || -> BoxedFut {
                            Box::pin(async move {
                                c.fetch_add(1, Ordering::SeqCst);
                                Ok::<i32, CoreError>(2)
                            })
                        }) as Box<dyn FnOnce() -> BoxedFut>
                    }),
                ],
                None,
                4,
            )
            .await;
        assert_eq!(cache.get::<i32>("ns", "a"), Some(99));
        assert_eq!(cache.get::<i32>("ns", "b"), Some(2));
        assert_eq!(computed.load(Ordering::SeqCst), 1);
    }
}

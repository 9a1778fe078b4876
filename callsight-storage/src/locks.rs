//! Per-entity refresh locks.
//!
//! One async mutex per [`EntityKey`], created on demand and dropped from the
//! registry once the last holder or waiter lets go. Refreshes for the same
//! entity queue behind each other; different entities never contend.

use callsight_core::EntityKey;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

type Registry = DashMap<EntityKey, Arc<Mutex<()>>>;

/// Registry of per-entity mutexes.
#[derive(Debug, Clone, Default)]
pub struct EntityLocks {
    inner: Arc<Registry>,
}

/// Exclusive access to one entity. Dropping it releases the lock and prunes
/// the registry entry when nobody else is queued on it.
#[derive(Debug)]
pub struct EntityGuard {
    guard: Option<OwnedMutexGuard<()>>,
    key: EntityKey,
    registry: Arc<Registry>,
}

impl Drop for EntityGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // The map's own reference is the only one left when nobody waits.
        self.registry
            .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

impl EntityLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`. Released when the guard drops.
    pub async fn acquire(&self, key: EntityKey) -> EntityGuard {
        let mutex = self
            .inner
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        EntityGuard {
            guard: Some(mutex.lock_owned().await),
            key,
            registry: Arc::clone(&self.inner),
        }
    }

    /// Number of entities currently locked or waited on.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_same_key_serializes() {
        let locks = EntityLocks::new();
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let locks = locks.clone();
            let active = active.clone();
            let peak = peak.clone();
            handles.push(tokio::spawn(async move {
                let _guard = locks.acquire(EntityKey::City(1)).await;
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            let _ = handle.await;
        }
        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_entry_survives_while_waiters_queue() {
        let locks = EntityLocks::new();
        let first = locks.acquire(EntityKey::City(7)).await;

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _second = locks.acquire(EntityKey::City(7)).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        drop(first);
        assert_eq!(locks.len(), 1);

        let _ = waiter.await;
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_registry_does_not_grow_with_entities() {
        let locks = EntityLocks::new();
        for id in 0..50 {
            let _guard = locks.acquire(EntityKey::City(id)).await;
            assert_eq!(locks.len(), 1);
        }
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_different_keys_do_not_block() {
        let locks = EntityLocks::new();
        let _city = locks.acquire(EntityKey::City(1)).await;
        let other = tokio::time::timeout(
            Duration::from_millis(100),
            locks.acquire(EntityKey::Agent(Uuid::nil())),
        )
        .await;
        assert!(other.is_ok());
    }
}

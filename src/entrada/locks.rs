//! Per-principal mutual exclusion.
//!
//! Two requests for the same principal would otherwise race on
//! create-versus-reset and the later reset silently invalidates the password
//! the earlier request is about to exchange.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockMap = Mutex<HashMap<String, Arc<AsyncMutex<()>>>>;

#[derive(Debug, Default)]
pub struct PrincipalLocks {
    inner: Arc<LockMap>,
}

impl PrincipalLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other request holds `principal`, then hold it until the
    /// returned guard is dropped.
    pub async fn acquire(&self, principal: &str) -> PrincipalGuard {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(map.entry(principal.to_string()).or_default())
        };

        // created before the wait so a cancelled waiter still cleans up
        let mut held = PrincipalGuard {
            key: principal.to_string(),
            locks: Arc::clone(&self.inner),
            guard: None,
        };
        held.guard = Some(lock.lock_owned().await);
        held
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[cfg(test)]
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug)]
pub struct PrincipalGuard {
    key: String,
    locks: Arc<LockMap>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for PrincipalGuard {
    fn drop(&mut self) {
        // release first so the strong count below only sees the map and waiters;
        // `guard` is empty when the wait was cancelled
        drop(self.guard.take());

        let mut map = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if map
            .get(&self.key)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            map.remove(&self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    #[tokio::test]
    async fn test_entry_removed_after_release() {
        let locks = PrincipalLocks::new();
        {
            let _guard = locks.acquire("a@example.com").await;
            assert_eq!(locks.len(), 1);
        }
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_distinct_principals_do_not_block() {
        let locks = PrincipalLocks::new();
        let _a = locks.acquire("a@example.com").await;
        let b = tokio::time::timeout(Duration::from_millis(200), locks.acquire("b@example.com"))
            .await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn test_same_principal_is_serialized() {
        let locks = Arc::new(PrincipalLocks::new());
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let locks = Arc::clone(&locks);
            let active = Arc::clone(&active);
            let peak = Arc::clone(&peak);
            handles.push(tokio::spawn(async move {
                let _guard = locks.acquire("same@example.com").await;
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            }));
        }

        for handle in handles {
            assert!(handle.await.is_ok());
        }

        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_waiter_leaves_no_entry() {
        let locks = Arc::new(PrincipalLocks::new());
        let holder = locks.acquire("same@example.com").await;

        let waiter = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _guard = locks.acquire("same@example.com").await;
            })
        };
        // let the waiter park on the lock
        tokio::time::sleep(Duration::from_millis(20)).await;

        drop(holder);
        waiter.abort();
        assert!(waiter.await.is_err_and(|e| e.is_cancelled()));

        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_waiter_cancelled_while_held() {
        let locks = Arc::new(PrincipalLocks::new());
        let holder = locks.acquire("same@example.com").await;

        let waiter = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _guard = locks.acquire("same@example.com").await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        waiter.abort();
        let _ = waiter.await;
        assert_eq!(locks.len(), 1);

        drop(holder);
        assert!(locks.is_empty());
    }
}

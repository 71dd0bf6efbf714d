// In crates/ledger/src/locks.rs

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Prune dead entries once the table grows past this many keys.
const PRUNE_THRESHOLD: usize = 1024;

/// A table of async mutexes, one per key, created on demand.
///
/// Holders of the same key run one at a time; different keys never contend.
/// Entries are weak, so a key's mutex disappears once nobody holds or waits on it.
#[derive(Debug)]
pub struct KeyedLocks<K> {
    slots: Mutex<HashMap<K, Weak<AsyncMutex<()>>>>,
}

impl<K> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until `key` is free and returns a guard that releases it on drop.
    pub async fn lock(&self, key: &K) -> OwnedMutexGuard<()> {
        let slot = {
            // The map is only touched while no await is pending, so a
            // poisoned guard still holds a consistent map.
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            if slots.len() >= PRUNE_THRESHOLD {
                slots.retain(|_, slot| slot.strong_count() > 0);
            }
            match slots.get(key).and_then(Weak::upgrade) {
                Some(slot) => slot,
                None => {
                    let slot = Arc::new(AsyncMutex::new(()));
                    slots.insert(key.clone(), Arc::downgrade(&slot));
                    slot
                }
            }
        };
        slot.lock_owned().await
    }

    /// Number of keys currently tracked, live or not yet pruned.
    pub fn tracked(&self) -> usize {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_key_is_exclusive() {
        let locks = Arc::new(KeyedLocks::<u32>::new());
        let guard = locks.lock(&7).await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.lock(&7).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .expect("contender should acquire after release")
            .unwrap();
    }

    #[tokio::test]
    async fn different_keys_do_not_contend() {
        let locks = KeyedLocks::<u32>::new();
        let _a = locks.lock(&1).await;
        let b = tokio::time::timeout(Duration::from_millis(100), locks.lock(&2)).await;
        assert!(b.is_ok());
        assert_eq!(locks.tracked(), 2);
    }
}

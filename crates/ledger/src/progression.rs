// In crates/ledger/src/progression.rs

use crate::locks::KeyedLocks;
use core_types::{Error, MAX_XP, Progression, Result, UserId};
use database::SharedStore;

/// Awards experience points and keeps the stored level in step with them.
pub struct ProgressionTracker {
    store: SharedStore,
    locks: KeyedLocks<UserId>,
}

impl ProgressionTracker {
    pub fn new(store: SharedStore) -> Self {
        Self {
            store,
            locks: KeyedLocks::new(),
        }
    }

    /// Adds `amount` points to the user's total and returns the new state.
    ///
    /// An award of zero writes nothing and reports the current state. An
    /// award that would push the total past [`MAX_XP`] is rejected as
    /// `InvalidOrder` and changes nothing.
    pub async fn award_xp(&self, user: UserId, amount: u64) -> Result<Progression> {
        let _guard = self.locks.lock(&user).await;

        let current = self.store.get_xp(user).await?;
        if amount == 0 {
            return Ok(Progression::from_xp(current));
        }

        let xp = current
            .checked_add(amount)
            .filter(|xp| *xp <= MAX_XP)
            .ok_or_else(|| Error::invalid_order(format!("xp award of {amount} exceeds the maximum of {MAX_XP}")))?;
        let progression = Progression::from_xp(xp);

        self.store
            .set_xp_and_level(user, progression.xp, progression.level)
            .await?;

        if progression.level > Progression::from_xp(current).level {
            tracing::info!(%user, xp, level = progression.level, "User levelled up");
        } else {
            tracing::debug!(%user, xp, amount, "Awarded xp");
        }

        Ok(progression)
    }

    pub async fn progression(&self, user: UserId) -> Result<Progression> {
        Ok(Progression::from_xp(self.store.get_xp(user).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use database::MemoryStore;
    use std::sync::Arc;

    fn tracker() -> (Arc<MemoryStore>, ProgressionTracker) {
        let store = Arc::new(MemoryStore::new());
        (store.clone(), ProgressionTracker::new(store))
    }

    #[tokio::test]
    async fn first_award_of_500_reaches_level_two() {
        let (store, tracker) = tracker();
        let progression = tracker.award_xp(UserId(1), 500).await.unwrap();

        assert_eq!(progression, Progression { xp: 500, level: 2 });
        assert_eq!(store.stored_level(UserId(1)).await, Some(2));
    }

    #[tokio::test]
    async fn awards_accumulate() {
        let (_, tracker) = tracker();
        tracker.award_xp(UserId(1), 300).await.unwrap();
        tracker.award_xp(UserId(1), 300).await.unwrap();
        let progression = tracker.award_xp(UserId(1), 1399).await.unwrap();

        assert_eq!(progression, Progression { xp: 1999, level: 4 });
        assert_eq!(tracker.progression(UserId(1)).await.unwrap(), progression);
    }

    #[tokio::test]
    async fn zero_award_is_a_no_op() {
        let (store, tracker) = tracker();
        let progression = tracker.award_xp(UserId(5), 0).await.unwrap();

        assert_eq!(progression, Progression { xp: 0, level: 1 });
        assert_eq!(store.stored_level(UserId(5)).await, None);
    }

    #[tokio::test]
    async fn award_past_the_maximum_is_rejected() {
        let (_, tracker) = tracker();
        tracker.award_xp(UserId(1), MAX_XP - 1).await.unwrap();
        let err = tracker.award_xp(UserId(1), 2).await.unwrap_err();
        assert!(matches!(err, Error::InvalidOrder { .. }));
        assert_eq!(tracker.progression(UserId(1)).await.unwrap().xp, MAX_XP - 1);

        let reached = tracker.award_xp(UserId(1), 1).await.unwrap();
        assert_eq!(reached.xp, MAX_XP);

        let err = tracker.award_xp(UserId(2), u64::MAX).await.unwrap_err();
        assert!(matches!(err, Error::InvalidOrder { .. }));
        assert_eq!(tracker.progression(UserId(2)).await.unwrap().xp, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_awards_are_all_counted() {
        let (_, tracker) = tracker();
        let tracker = Arc::new(tracker);

        let tasks: Vec<_> = (0..50)
            .map(|_| {
                let tracker = tracker.clone();
                tokio::spawn(async move { tracker.award_xp(UserId(3), 10).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(
            tracker.progression(UserId(3)).await.unwrap(),
            Progression { xp: 500, level: 2 }
        );
    }
}

//! Per-account serialization.
//!
//! Every write touching an account's cached balance holds that account's
//! lock. Multi-account writers acquire in ascending id order, so two
//! postings over overlapping accounts can never wait on each other in a
//! cycle. Locks are always taken *before* a DB transaction is opened.

use std::{
    collections::{BTreeSet, HashMap},
    sync::{Arc, Mutex, PoisonError},
};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

#[derive(Debug, Default)]
pub(crate) struct AccountLocks {
    inner: Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>,
}

/// Guards for a set of accounts; released on drop.
#[derive(Debug)]
pub(crate) struct AccountGuards {
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl AccountLocks {
    pub(crate) async fn acquire(&self, ids: impl IntoIterator<Item = Uuid>) -> AccountGuards {
        let ordered: BTreeSet<Uuid> = ids.into_iter().collect();
        let mutexes: Vec<Arc<AsyncMutex<()>>> = {
            let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            ordered
                .iter()
                .map(|id| Arc::clone(map.entry(*id).or_default()))
                .collect()
        };

        let mut guards = Vec::with_capacity(mutexes.len());
        for mutex in mutexes {
            guards.push(mutex.lock_owned().await);
        }
        AccountGuards { _guards: guards }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn disjoint_accounts_do_not_contend() {
        let locks = Arc::new(AccountLocks::default());
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let _held = locks.acquire([a]).await;
        let other = tokio::time::timeout(Duration::from_millis(200), locks.acquire([b])).await;
        assert!(other.is_ok());
    }

    #[tokio::test]
    async fn overlapping_sets_serialize() {
        let locks = Arc::new(AccountLocks::default());
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let held = locks.acquire([b, a]).await;
        let blocked = tokio::time::timeout(Duration::from_millis(50), locks.acquire([a])).await;
        assert!(blocked.is_err());

        drop(held);
        let granted = tokio::time::timeout(Duration::from_millis(200), locks.acquire([a, b])).await;
        assert!(granted.is_ok());
    }
}

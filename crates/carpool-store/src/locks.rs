//! In-process per-ride locks.
//!
//! Used by backends that have no row locking of their own. Each ride gets an
//! async mutex slot; acquiring it waits at most the configured timeout. A slot
//! lives only while someone holds or waits on it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use carpool_core::RideId;

use crate::error::{Result, StoreError};

/// Default wait for a ride lock.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(2);

/// Exclusive lock held on one ride.
///
/// Dropping the guard releases the lock and removes the slot from the table
/// when no other task is waiting on it.
#[derive(Debug)]
pub struct RideGuard {
    guard: Option<OwnedMutexGuard<()>>,
    ride_id: RideId,
    locks: RideLocks,
}

impl Drop for RideGuard {
    fn drop(&mut self) {
        self.guard.take();
        self.locks.forget(&self.ride_id);
    }
}

/// Table of per-ride lock slots.
#[derive(Debug, Clone, Default)]
pub struct RideLocks {
    slots: Arc<Mutex<HashMap<RideId, Arc<AsyncMutex<()>>>>>,
}

impl RideLocks {
    /// Create an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `ride_id`, waiting at most `timeout`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::LockTimeout` if the wait expires.
    pub async fn acquire(&self, ride_id: &RideId, timeout: Duration) -> Result<RideGuard> {
        let slot = Arc::clone(self.slots.lock().entry(*ride_id).or_default());

        match tokio::time::timeout(timeout, slot.lock_owned()).await {
            Ok(guard) => Ok(RideGuard {
                guard: Some(guard),
                ride_id: *ride_id,
                locks: self.clone(),
            }),
            Err(_) => {
                self.forget(ride_id);
                tracing::warn!(ride_id = %ride_id, ?timeout, "ride lock wait timed out");
                Err(StoreError::LockTimeout {
                    ride_id: ride_id.to_string(),
                })
            }
        }
    }

    /// Drop the slot for `ride_id` once nobody holds or waits on it.
    fn forget(&self, ride_id: &RideId) {
        let mut slots = self.slots.lock();
        if slots
            .get(ride_id)
            .is_some_and(|slot| Arc::strong_count(slot) == 1)
        {
            slots.remove(ride_id);
        }
    }

    /// Number of tracked slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    /// Whether no slot is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_acquire_times_out_while_held() {
        let locks = RideLocks::new();
        let ride = RideId::generate();

        let guard = locks.acquire(&ride, DEFAULT_LOCK_TIMEOUT).await.unwrap();
        let err = locks
            .acquire(&ride, Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::LockTimeout { .. }));

        drop(guard);
        assert!(locks.acquire(&ride, Duration::from_millis(20)).await.is_ok());
    }

    #[tokio::test]
    async fn different_rides_do_not_contend() {
        let locks = RideLocks::new();
        let _a = locks
            .acquire(&RideId::generate(), DEFAULT_LOCK_TIMEOUT)
            .await
            .unwrap();
        let _b = locks
            .acquire(&RideId::generate(), Duration::from_millis(20))
            .await
            .unwrap();
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test]
    async fn released_slot_is_removed() {
        let locks = RideLocks::new();
        let ride = RideId::generate();
        let guard = locks.acquire(&ride, DEFAULT_LOCK_TIMEOUT).await.unwrap();
        locks.forget(&ride);
        assert_eq!(locks.len(), 1);
        drop(guard);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn slot_survives_while_another_task_waits() {
        let locks = RideLocks::new();
        let ride = RideId::generate();
        let guard = locks.acquire(&ride, DEFAULT_LOCK_TIMEOUT).await.unwrap();

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move { locks.acquire(&ride, DEFAULT_LOCK_TIMEOUT).await })
        };
        tokio::task::yield_now().await;
        drop(guard);

        let second = waiter.await.unwrap().unwrap();
        assert_eq!(locks.len(), 1);
        drop(second);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn timed_out_wait_leaves_only_the_holder() {
        let locks = RideLocks::new();
        let ride = RideId::generate();
        let guard = locks.acquire(&ride, DEFAULT_LOCK_TIMEOUT).await.unwrap();
        assert!(locks.acquire(&ride, Duration::from_millis(20)).await.is_err());
        assert_eq!(locks.len(), 1);
        drop(guard);
        assert!(locks.is_empty());
    }
}

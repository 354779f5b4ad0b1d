//! In-process table of sagas currently being driven.
//!
//! Admits at most one execution per saga id and carries a cancellation
//! signal to it, so a backoff sleep can end early when a cancel arrives.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use uuid::Uuid;

/// Registry of live executions.
#[derive(Debug, Default)]
pub struct ActiveSagas {
    running: Mutex<HashMap<Uuid, watch::Sender<bool>>>,
}

impl ActiveSagas {
    pub fn new() -> Self {
        Self::default()
    }

    // Entries are plain inserts and removes; a poisoned map is still consistent.
    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, watch::Sender<bool>>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim `id` for one execution. `None` when it is already claimed.
    pub fn try_acquire(self: &Arc<Self>, id: Uuid) -> Option<ActiveGuard> {
        let mut running = self.lock();
        if running.contains_key(&id) {
            return None;
        }
        let (sender, receiver) = watch::channel(false);
        running.insert(id, sender);
        Some(ActiveGuard {
            id,
            active: Arc::clone(self),
            cancel: receiver,
        })
    }

    /// Wake the execution driving `id`. Returns false when none is attached.
    pub fn signal_cancel(&self, id: Uuid) -> bool {
        match self.lock().get(&id) {
            Some(sender) => {
                sender.send_replace(true);
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self, id: Uuid) -> bool {
        self.lock().contains_key(&id)
    }

    /// Number of live executions.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Claim on one saga id; released on drop.
#[derive(Debug)]
pub struct ActiveGuard {
    id: Uuid,
    active: Arc<ActiveSagas>,
    cancel: watch::Receiver<bool>,
}

impl ActiveGuard {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Receiver that flips to `true` when cancellation is signalled.
    pub fn cancel_signal(&mut self) -> &mut watch::Receiver<bool> {
        &mut self.cancel
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.active.lock().remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_claim_per_saga() {
        let active = Arc::new(ActiveSagas::new());
        let id = Uuid::new_v4();

        let guard = active.try_acquire(id).unwrap();
        assert_eq!(guard.id(), id);
        assert!(active.try_acquire(id).is_none());
        assert!(active.try_acquire(Uuid::new_v4()).is_some());
        assert!(active.is_active(id));

        drop(guard);
        assert!(!active.is_active(id));
        assert!(active.try_acquire(id).is_some());
    }

    #[tokio::test]
    async fn test_signal_reaches_guard() {
        let active = Arc::new(ActiveSagas::new());
        let id = Uuid::new_v4();
        assert!(!active.signal_cancel(id));

        let mut guard = active.try_acquire(id).unwrap();
        assert!(!*guard.cancel_signal().borrow());

        assert!(active.signal_cancel(id));
        guard.cancel_signal().wait_for(|cancelled| *cancelled).await.unwrap();
    }
}

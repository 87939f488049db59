//! Per-channel debouncing on tokio timers.
//!
//! Each `schedule` call supersedes whatever was pending on the same channel.
//! Only the action of the last call in a burst runs, after the channel has
//! been quiet for the full delay. Channels never affect one another.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

struct Pending {
    generation: u64,
    handle: JoinHandle<()>,
}

/// Debounce controller keyed by channel.
pub struct Debouncer<C> {
    pending: Arc<Mutex<HashMap<C, Pending>>>,
    next_generation: AtomicU64,
}

impl<C> Debouncer<C>
where
    C: Copy + Eq + Hash + Send + 'static,
{
    pub fn new() -> Self {
        Self {
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(1),
        }
    }

    /// Arm a timer for `channel`, cancelling the one already pending there.
    ///
    /// The action is never run synchronously, even with a zero delay. Once the
    /// timer fires the action is detached from the channel: a later `schedule`
    /// starts a new burst instead of aborting work already underway.
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule<F>(&self, channel: C, delay: Duration, action: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let pending = Arc::clone(&self.pending);

        let mut guard = lock(&self.pending);
        if let Some(previous) = guard.remove(&channel) {
            previous.handle.abort();
        }

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut guard = lock(&pending);
                match guard.get(&channel) {
                    Some(p) if p.generation == generation => {
                        guard.remove(&channel);
                    }
                    // Superseded between the timer firing and this check.
                    _ => return,
                }
            }
            action.await;
        });

        guard.insert(channel, Pending { generation, handle });
    }

    /// Drop the pending timer for `channel`, if any. Returns whether one was
    /// pending.
    pub fn cancel(&self, channel: C) -> bool {
        match lock(&self.pending).remove(&channel) {
            Some(p) => {
                p.handle.abort();
                true
            }
            None => false,
        }
    }

    /// Drop every pending timer.
    pub fn cancel_all(&self) {
        for (_, p) in lock(&self.pending).drain() {
            p.handle.abort();
        }
    }

    pub fn is_pending(&self, channel: C) -> bool {
        lock(&self.pending).contains_key(&channel)
    }
}

impl<C> Default for Debouncer<C>
where
    C: Copy + Eq + Hash + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<C> Drop for Debouncer<C> {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.pending.lock() {
            for (_, p) in guard.drain() {
                p.handle.abort();
            }
        }
    }
}

/// The map stays consistent even if a holder panicked, so poisoning is ignored.
fn lock<C>(m: &Mutex<HashMap<C, Pending>>) -> std::sync::MutexGuard<'_, HashMap<C, Pending>> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

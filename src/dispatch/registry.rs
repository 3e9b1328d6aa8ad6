//! Subscription registry for dispatching record batches by type.
//!
//! Callers register a callback per record type, optionally with a fire
//! limit. The receive loop hands each parse cycle's records to
//! [`SubscriptionRegistry::dispatch`], which groups them by type and
//! invokes every matching subscription once with the whole group.
//!
//! Dispatch is snapshot-then-mutate: matches are computed against a copy
//! of the list taken under the lock, callbacks run outside the lock, and
//! limit decrements/removals are applied afterwards. A callback may
//! subscribe or unsubscribe freely without skipping or double-firing a
//! sibling subscription in the same pass.

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::protocol::record::{Record, RecordType};

/// Shared callback invoked with all matching records from one cycle.
pub type Callback = Arc<dyn Fn(&[Record]) + Send + Sync>;

/// Handle identifying one subscription, for later removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

/// One registered callback.
struct Subscription {
    id: u64,
    record_type: RecordType,
    callback: Callback,
    /// Remaining fires; `None` means unlimited.
    remaining: Option<NonZeroU32>,
}

#[derive(Default)]
struct Inner {
    /// Registration order is dispatch order.
    subscriptions: Vec<Subscription>,
    next_id: u64,
}

/// Mutex-guarded, ordered subscription store shared between the receive
/// loop and caller contexts.
#[derive(Default)]
pub struct SubscriptionRegistry {
    inner: Mutex<Inner>,
}

impl SubscriptionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A poisoned lock only means a callback panicked; the list itself
        // is still consistent.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a callback for one record type.
    ///
    /// `limit` bounds how many dispatch cycles may fire this subscription;
    /// `None` means unlimited.
    pub fn subscribe<F>(
        &self,
        record_type: RecordType,
        callback: F,
        limit: Option<NonZeroU32>,
    ) -> SubscriptionId
    where
        F: Fn(&[Record]) + Send + Sync + 'static,
    {
        let mut inner = self.lock();
        inner.next_id += 1;
        let id = inner.next_id;
        inner.subscriptions.push(Subscription {
            id,
            record_type,
            callback: Arc::new(callback),
            remaining: limit,
        });
        SubscriptionId(id)
    }

    /// Remove a subscription. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut inner = self.lock();
        let before = inner.subscriptions.len();
        inner.subscriptions.retain(|s| s.id != id.0);
        inner.subscriptions.len() != before
    }

    /// Number of active subscriptions.
    pub fn len(&self) -> usize {
        self.lock().subscriptions.len()
    }

    /// True if no subscriptions are active.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dispatch one cycle's records to all matching subscriptions.
    ///
    /// Records are grouped by type in arrival order; each matching
    /// subscription's callback runs exactly once with its full group.
    pub fn dispatch(&self, records: &[Record]) {
        if records.is_empty() {
            return;
        }

        let mut groups: HashMap<RecordType, Vec<Record>> = HashMap::new();
        for record in records {
            groups
                .entry(record.record_type)
                .or_default()
                .push(record.clone());
        }

        // Snapshot under the lock; invoke outside it.
        let snapshot: Vec<(u64, RecordType, Callback)> = self
            .lock()
            .subscriptions
            .iter()
            .map(|s| (s.id, s.record_type, Arc::clone(&s.callback)))
            .collect();

        let mut fired = Vec::new();
        for (id, record_type, callback) in snapshot {
            if let Some(group) = groups.get(&record_type) {
                callback(group);
                fired.push(id);
            }
        }

        // Apply decrements and removals computed from the snapshot.
        let mut inner = self.lock();
        inner.subscriptions.retain_mut(|s| {
            if !fired.contains(&s.id) {
                return true;
            }
            match s.remaining {
                None => true,
                Some(remaining) => match NonZeroU32::new(remaining.get() - 1) {
                    Some(left) => {
                        s.remaining = Some(left);
                        true
                    }
                    None => false,
                },
            }
        });
    }
}

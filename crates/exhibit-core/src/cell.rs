//! Observable cells.
//!
//! An [`ObservableCell<T>`] holds a single value that is always defined and
//! broadcasts every assignment to its subscribers. It is the state backbone of
//! the exhibit: the power flag, the weather display text and the busy flag are
//! all cells.
//!
//! # Notification rules
//!
//! - `set` notifies unconditionally, even when the new value equals the old
//!   one. There is no dedup and no batching: two `set` calls produce two full
//!   notification passes.
//! - Subscribers run synchronously on the calling thread in subscription order.
//! - Subscribing replays the current value to the new subscriber once, before
//!   `subscribe` returns (use [`ObservableCell::subscribe_without_replay`] to
//!   opt out).
//! - Each pass iterates a snapshot of the subscriber list taken when `set` is
//!   called, and no lock is held while callbacks run. A callback may therefore
//!   `set`, `subscribe` or `unsubscribe` on the same cell: subscribers added
//!   mid-pass are skipped for that pass, subscribers removed mid-pass still
//!   receive it.
//!
//! # Example
//!
//! ```
//! use exhibit_core::ObservableCell;
//! use std::sync::{Arc, Mutex};
//!
//! let power_on = ObservableCell::new(false);
//! let seen = Arc::new(Mutex::new(Vec::new()));
//!
//! let seen_clone = seen.clone();
//! let subscription = power_on.subscribe_scoped(move |&on| {
//!     seen_clone.lock().unwrap().push(on);
//! });
//!
//! power_on.set(true);
//! subscription.dispose();
//! power_on.set(false);
//!
//! assert_eq!(*seen.lock().unwrap(), vec![false, true]);
//! ```

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use slotmap::{new_key_type, SlotMap};

use crate::logging::targets;

new_key_type! {
    /// Identifier of a single subscription on an [`ObservableCell`].
    pub struct SubscriptionId;
}

type Subscriber<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Subscribers keyed by id, each stamped with an insertion sequence number.
///
/// `SlotMap` reuses freed slots, so iterating it does not follow insertion
/// order once anything has been removed; snapshots sort by sequence instead.
struct Subscribers<T> {
    slots: SlotMap<SubscriptionId, (u64, Subscriber<T>)>,
    next_seq: u64,
}

impl<T> Subscribers<T> {
    fn new() -> Self {
        Self {
            slots: SlotMap::with_key(),
            next_seq: 0,
        }
    }

    fn insert(&mut self, subscriber: Subscriber<T>) -> SubscriptionId {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.slots.insert((seq, subscriber))
    }

    fn snapshot(&self) -> Vec<Subscriber<T>> {
        let mut entries: Vec<&(u64, Subscriber<T>)> = self.slots.values().collect();
        entries.sort_unstable_by_key(|(seq, _)| *seq);
        entries.into_iter().map(|(_, s)| s.clone()).collect()
    }
}

struct CellInner<T> {
    value: RwLock<T>,
    subscribers: Mutex<Subscribers<T>>,
}

impl<T> CellInner<T> {
    fn remove(&self, id: SubscriptionId) -> bool {
        self.subscribers.lock().slots.remove(id).is_some()
    }
}

/// A single-value container that notifies subscribers on every assignment.
///
/// # Thread Safety
///
/// `ObservableCell<T>` is `Send + Sync` when `T` is. Locks are only held while
/// reading or swapping the value and while snapshotting subscribers.
pub struct ObservableCell<T> {
    inner: Arc<CellInner<T>>,
}

impl<T: Clone + Send + Sync + 'static> ObservableCell<T> {
    /// Create a new cell holding `value`.
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(CellInner {
                value: RwLock::new(value),
                subscribers: Mutex::new(Subscribers::new()),
            }),
        }
    }

    /// Get the current value.
    pub fn get(&self) -> T {
        self.inner.value.read().clone()
    }

    /// Access the value through a closure without cloning.
    pub fn with<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        f(&self.inner.value.read())
    }

    /// Replace the value and notify every subscriber.
    pub fn set(&self, value: T) {
        *self.inner.value.write() = value.clone();
        self.notify(&value);
    }

    /// Replace the value and return the previous one, notifying subscribers.
    pub fn replace(&self, value: T) -> T {
        let old = std::mem::replace(&mut *self.inner.value.write(), value.clone());
        self.notify(&value);
        old
    }

    /// Apply `f` to the current value and store the result, notifying
    /// subscribers. Returns the new value.
    pub fn update<F>(&self, f: F) -> T
    where
        F: FnOnce(&T) -> T,
    {
        let value = {
            let mut current = self.inner.value.write();
            let next = f(&current);
            *current = next.clone();
            next
        };
        self.notify(&value);
        value
    }

    fn notify(&self, value: &T) {
        let snapshot = self.inner.subscribers.lock().snapshot();
        tracing::trace!(target: targets::CELL, subscriber_count = snapshot.len(), "notifying subscribers");
        for subscriber in snapshot {
            subscriber(value);
        }
    }

    /// Register a subscriber and immediately invoke it with the current value.
    pub fn subscribe<F>(&self, f: F) -> SubscriptionId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let subscriber: Subscriber<T> = Arc::new(f);
        let id = self.inner.subscribers.lock().insert(subscriber.clone());
        let current = self.get();
        subscriber(&current);
        id
    }

    /// Register a subscriber without the initial replay.
    pub fn subscribe_without_replay<F>(&self, f: F) -> SubscriptionId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.inner.subscribers.lock().insert(Arc::new(f))
    }

    /// Like [`subscribe`](Self::subscribe), but returns a guard that
    /// unsubscribes when dropped.
    pub fn subscribe_scoped<F>(&self, f: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = self.subscribe(f);
        self.guard(id)
    }

    fn guard(&self, id: SubscriptionId) -> Subscription {
        let cell: Weak<CellInner<T>> = Arc::downgrade(&self.inner);
        Subscription {
            dispose: Mutex::new(Some(Box::new(move || {
                if let Some(cell) = cell.upgrade() {
                    cell.remove(id);
                }
            }))),
        }
    }

    /// Remove a subscriber.
    ///
    /// Returns `false` if it was already removed; double removal is not an
    /// error.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.remove(id)
    }

    /// Remove every subscriber. Called by the owner when it is torn down.
    pub fn dispose_all(&self) {
        let removed = {
            let mut subscribers = self.inner.subscribers.lock();
            let count = subscribers.slots.len();
            subscribers.slots.clear();
            count
        };
        tracing::debug!(target: targets::CELL, removed, "disposed all subscribers");
    }

    /// Get the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().slots.len()
    }

    /// Get a read-only view of this cell for external observers.
    pub fn read_only(&self) -> ReadOnlyCell<T> {
        ReadOnlyCell {
            cell: Self {
                inner: self.inner.clone(),
            },
        }
    }
}

impl<T: Clone + Default + Send + Sync + 'static> Default for ObservableCell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Clone + fmt::Debug + Send + Sync + 'static> fmt::Debug for ObservableCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservableCell")
            .field("value", &self.get())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// A read-only handle onto an [`ObservableCell`].
///
/// External components receive this instead of the cell itself, so they can
/// observe and read but never write. Cloning shares the same underlying cell.
pub struct ReadOnlyCell<T> {
    cell: ObservableCell<T>,
}

impl<T: Clone + Send + Sync + 'static> ReadOnlyCell<T> {
    /// Get the current value.
    pub fn get(&self) -> T {
        self.cell.get()
    }

    /// Access the value through a closure without cloning.
    pub fn with<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        self.cell.with(f)
    }

    /// See [`ObservableCell::subscribe`].
    pub fn subscribe<F>(&self, f: F) -> SubscriptionId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.cell.subscribe(f)
    }

    /// See [`ObservableCell::subscribe_without_replay`].
    pub fn subscribe_without_replay<F>(&self, f: F) -> SubscriptionId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.cell.subscribe_without_replay(f)
    }

    /// See [`ObservableCell::subscribe_scoped`].
    pub fn subscribe_scoped<F>(&self, f: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.cell.subscribe_scoped(f)
    }

    /// See [`ObservableCell::unsubscribe`].
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.cell.unsubscribe(id)
    }
}

impl<T> Clone for ReadOnlyCell<T> {
    fn clone(&self) -> Self {
        Self {
            cell: ObservableCell {
                inner: self.cell.inner.clone(),
            },
        }
    }
}

impl<T: Clone + fmt::Debug + Send + Sync + 'static> fmt::Debug for ReadOnlyCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ReadOnlyCell").field(&self.get()).finish()
    }
}

/// A subscription handle that unsubscribes when dropped.
///
/// The handle is type-erased so owners can keep subscriptions to cells of
/// different value types in one collection. It holds only a weak reference to
/// the cell: disposing after the cell is gone is a no-op.
#[must_use = "dropping the subscription unsubscribes immediately"]
pub struct Subscription {
    dispose: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl Subscription {
    /// Unsubscribe now. Calling this more than once is a no-op.
    pub fn dispose(&self) {
        if let Some(dispose) = self.dispose.lock().take() {
            dispose();
        }
    }

    /// Check whether [`dispose`](Self::dispose) has already run.
    pub fn is_disposed(&self) -> bool {
        self.dispose.lock().is_none()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

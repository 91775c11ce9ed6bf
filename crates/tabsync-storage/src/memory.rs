//! In-process key-value store shared by several documents.
//!
//! A [`SharedStore`] is the underlying storage; each document talks to it
//! through its own [`StoreHandle`]. A mutation made through one handle is
//! announced to listeners registered through every *other* handle, which is
//! how a browser delivers storage events to sibling tabs.
//!
//! # Invariants
//!
//! 1. The writing handle never receives its own change events.
//! 2. Setting a key to its current value, or removing an absent key, emits
//!    no event.
//! 3. A write that would push the stored byte total past the quota fails
//!    with [`StorageError::QuotaExceeded`] and leaves the store unchanged.
//! 4. No borrow of the store is held while listeners run, so listeners may
//!    read or write the store.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use tabsync_reactive::Subscription;

use crate::area::StorageArea;
use crate::backend::{ChangeListener, StorageBackend, StorageChangeEvent, StoreId};
use crate::error::StorageError;

static NEXT_STORE_ID: AtomicU64 = AtomicU64::new(1);

/// One document's attachment to a [`SharedStore`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ContextId(u64);

struct Registered {
    id: u64,
    context: ContextId,
    listener: ChangeListener,
}

#[derive(Default)]
struct StoreState {
    entries: BTreeMap<String, String>,
    listeners: Vec<Registered>,
    next_listener: u64,
    next_context: u64,
    quota: Option<usize>,
    used: usize,
    writes: u64,
}

fn entry_size(key: &str, value: &str) -> usize {
    key.len() + value.len()
}

/// The underlying store. Clones share state.
#[derive(Clone)]
pub struct SharedStore {
    id: StoreId,
    area: StorageArea,
    state: Rc<RefCell<StoreState>>,
}

impl SharedStore {
    /// Create an empty, unbounded store.
    #[must_use]
    pub fn new(area: StorageArea) -> Self {
        Self::from_parts(area, BTreeMap::new(), None)
    }

    /// Create an empty store that rejects writes beyond `quota` bytes
    /// (key length plus value length, summed over all entries).
    #[must_use]
    pub fn with_quota(area: StorageArea, quota: usize) -> Self {
        Self::from_parts(area, BTreeMap::new(), Some(quota))
    }

    pub(crate) fn from_parts(
        area: StorageArea,
        entries: BTreeMap<String, String>,
        quota: Option<usize>,
    ) -> Self {
        let used = entries.iter().map(|(k, v)| entry_size(k, v)).sum();
        Self {
            id: StoreId(NEXT_STORE_ID.fetch_add(1, Ordering::Relaxed)),
            area,
            state: Rc::new(RefCell::new(StoreState {
                entries,
                quota,
                used,
                ..StoreState::default()
            })),
        }
    }

    /// Attach a new document to this store.
    #[must_use]
    pub fn attach(&self) -> StoreHandle {
        let mut state = self.state.borrow_mut();
        state.next_context += 1;
        StoreHandle {
            store: self.clone(),
            context: ContextId(state.next_context),
        }
    }

    #[must_use]
    pub fn id(&self) -> StoreId {
        self.id
    }

    #[must_use]
    pub fn area(&self) -> StorageArea {
        self.area
    }

    /// Read a raw entry without going through any document.
    #[must_use]
    pub fn peek(&self, key: &str) -> Option<String> {
        self.state.borrow().entries.get(key).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.borrow().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.borrow().entries.is_empty()
    }

    /// Sorted copy of all entries.
    #[must_use]
    pub fn entries(&self) -> Vec<(String, String)> {
        self.state
            .borrow()
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Accepted `set`/`remove`/`clear` calls since creation.
    #[must_use]
    pub fn write_count(&self) -> u64 {
        self.state.borrow().writes
    }

    /// Bytes currently stored.
    #[must_use]
    pub fn used_bytes(&self) -> usize {
        self.state.borrow().used
    }

    /// Byte limit set at creation, if any.
    #[must_use]
    pub fn quota(&self) -> Option<usize> {
        self.state.borrow().quota
    }

    /// Registered change listeners across all documents.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.state.borrow().listeners.len()
    }

    fn notify(&self, origin: ContextId, event: &StorageChangeEvent) {
        let targets: Vec<ChangeListener> = self
            .state
            .borrow()
            .listeners
            .iter()
            .filter(|r| r.context != origin)
            .map(|r| Rc::clone(&r.listener))
            .collect();
        tracing::trace!(
            store = %self.id,
            key = ?event.key,
            listeners = targets.len(),
            "storage change"
        );
        for listener in targets {
            listener(event);
        }
    }

    fn event(
        &self,
        key: Option<&str>,
        old_value: Option<String>,
        new_value: Option<String>,
    ) -> StorageChangeEvent {
        StorageChangeEvent {
            key: key.map(str::to_owned),
            old_value,
            new_value,
            area: self.area,
            store: self.id,
        }
    }
}

impl fmt::Debug for SharedStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("SharedStore")
            .field("id", &self.id)
            .field("area", &self.area)
            .field("entries", &state.entries.len())
            .field("listeners", &state.listeners.len())
            .finish()
    }
}

/// A document's view of a [`SharedStore`].
#[derive(Clone, Debug)]
pub struct StoreHandle {
    store: SharedStore,
    context: ContextId,
}

impl StoreHandle {
    #[must_use]
    pub fn context(&self) -> ContextId {
        self.context
    }

    #[must_use]
    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Remove every entry, announcing a keyless change event.
    pub fn clear(&self) {
        let had_entries = {
            let mut state = self.store.state.borrow_mut();
            state.writes += 1;
            let had = !state.entries.is_empty();
            state.entries.clear();
            state.used = 0;
            had
        };
        if had_entries {
            let event = self.store.event(None, None, None);
            self.store.notify(self.context, &event);
        }
    }
}

impl StorageBackend for StoreHandle {
    fn area(&self) -> StorageArea {
        self.store.area
    }

    fn store_id(&self) -> StoreId {
        self.store.id
    }

    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.store.peek(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let old = {
            let mut state = self.store.state.borrow_mut();
            let old = state.entries.get(key).cloned();
            let old_size = old.as_deref().map_or(0, |v| entry_size(key, v));
            let requested = state.used - old_size + entry_size(key, value);
            if let Some(quota) = state.quota {
                if requested > quota {
                    return Err(StorageError::QuotaExceeded {
                        key: key.to_owned(),
                        requested,
                        quota,
                    });
                }
            }
            state.writes += 1;
            if old.as_deref() == Some(value) {
                return Ok(());
            }
            state.used = requested;
            state.entries.insert(key.to_owned(), value.to_owned());
            old
        };
        let event = self.store.event(Some(key), old, Some(value.to_owned()));
        self.store.notify(self.context, &event);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let old = {
            let mut state = self.store.state.borrow_mut();
            state.writes += 1;
            let old = state.entries.remove(key);
            if let Some(v) = &old {
                state.used -= entry_size(key, v);
            }
            old
        };
        if old.is_some() {
            let event = self.store.event(Some(key), old, None);
            self.store.notify(self.context, &event);
        }
        Ok(())
    }

    fn listen(&self, listener: ChangeListener) -> Subscription {
        let id = {
            let mut state = self.store.state.borrow_mut();
            state.next_listener += 1;
            let id = state.next_listener;
            state.listeners.push(Registered {
                id,
                context: self.context,
                listener,
            });
            id
        };
        let weak: Weak<RefCell<StoreState>> = Rc::downgrade(&self.store.state);
        Subscription::on_drop(move || {
            if let Some(state) = weak.upgrade() {
                state.borrow_mut().listeners.retain(|r| r.id != id);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn recorder(handle: &StoreHandle) -> (Rc<RefCell<Vec<StorageChangeEvent>>>, Subscription) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let l = Rc::clone(&log);
        let sub = handle.listen(Rc::new(move |e: &StorageChangeEvent| {
            l.borrow_mut().push(e.clone());
        }));
        (log, sub)
    }

    #[test]
    fn writer_does_not_hear_itself() {
        let store = SharedStore::new(StorageArea::Local);
        let a = store.attach();
        let b = store.attach();
        let (a_log, _a_sub) = recorder(&a);
        let (b_log, _b_sub) = recorder(&b);

        a.set("theme", "\"dark\"").unwrap();

        assert!(a_log.borrow().is_empty());
        let b_events = b_log.borrow();
        assert_eq!(b_events.len(), 1);
        assert_eq!(b_events[0].key.as_deref(), Some("theme"));
        assert_eq!(b_events[0].old_value, None);
        assert_eq!(b_events[0].new_value.as_deref(), Some("\"dark\""));
        assert_eq!(b_events[0].store, store.id());
    }

    #[test]
    fn unchanged_set_and_absent_remove_are_silent() {
        let store = SharedStore::new(StorageArea::Session);
        let a = store.attach();
        let b = store.attach();
        let (b_log, _sub) = recorder(&b);

        a.set("k", "1").unwrap();
        a.set("k", "1").unwrap();
        a.remove("missing").unwrap();
        assert_eq!(b_log.borrow().len(), 1);
        assert_eq!(store.write_count(), 3);
    }

    #[test]
    fn remove_reports_old_value() {
        let store = SharedStore::new(StorageArea::Local);
        let a = store.attach();
        let b = store.attach();
        a.set("k", "old").unwrap();
        let (b_log, _sub) = recorder(&b);

        a.remove("k").unwrap();
        let events = b_log.borrow();
        assert_eq!(events[0].old_value.as_deref(), Some("old"));
        assert_eq!(events[0].new_value, None);
        assert!(store.peek("k").is_none());
    }

    #[test]
    fn quota_rejects_and_preserves_state() {
        let store = SharedStore::with_quota(StorageArea::Local, 8);
        let a = store.attach();
        a.set("k", "1234").unwrap();
        let err = a.set("k", "123456789").unwrap_err();
        assert!(matches!(err, StorageError::QuotaExceeded { quota: 8, .. }));
        assert_eq!(store.peek("k").as_deref(), Some("1234"));
        assert_eq!(store.used_bytes(), 5);
        assert_eq!(store.write_count(), 1);
    }

    #[test]
    fn dropping_subscription_unregisters() {
        let store = SharedStore::new(StorageArea::Local);
        let a = store.attach();
        let (_log, sub) = recorder(&a);
        assert_eq!(store.listener_count(), 1);
        drop(sub);
        assert_eq!(store.listener_count(), 0);
    }

    #[test]
    fn clear_emits_keyless_event() {
        let store = SharedStore::new(StorageArea::Local);
        let a = store.attach();
        let b = store.attach();
        a.set("x", "1").unwrap();
        let (b_log, _sub) = recorder(&b);
        a.clear();
        assert!(store.is_empty());
        assert_eq!(b_log.borrow()[0].key, None);
    }

    #[test]
    fn listener_may_write_during_notify() {
        let store = SharedStore::new(StorageArea::Local);
        let a = store.attach();
        let b = store.attach();
        let b_writer = b.clone();
        let _sub = b.listen(Rc::new(move |e: &StorageChangeEvent| {
            if e.key.as_deref() == Some("ping") {
                b_writer.set("pong", "1").unwrap();
            }
        }));
        a.set("ping", "1").unwrap();
        assert_eq!(store.peek("pong").as_deref(), Some("1"));
    }

    #[test]
    fn distinct_stores_have_distinct_ids() {
        let a = SharedStore::new(StorageArea::Local);
        let b = SharedStore::new(StorageArea::Local);
        assert_ne!(a.id(), b.id());
        assert_eq!(a.attach().store_id(), a.id());
    }
}

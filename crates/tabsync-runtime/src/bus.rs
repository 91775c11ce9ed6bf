//! Same-document event bus.
//!
//! Every cell bound to a key listens on a channel named by [`event_name`].
//! A write dispatches the new value on that channel; each listener decides
//! whether to adopt it.
//!
//! # Event Names
//!
//! `event_name(namespace, key, area)` yields
//! `"<namespace>-<key>-<area tag>-update"`, where `<area tag>` is
//! `localstorage` or `sessionstorage`. `%` and `-` inside the namespace and
//! key are escaped as `%25` and `%2D`, so the four dash-separated parts are
//! recoverable and two distinct `(namespace, key, area)` triples never share
//! a name.
//!
//! # Invariants
//!
//! 1. Dispatch reaches listeners in registration order.
//! 2. Listeners added or removed during a dispatch take effect on the next
//!    dispatch; no bus borrow is held while listeners run.
//! 3. A channel with no listeners is removed from the bus.
//! 4. A dispatch started from inside a listener supersedes the outer
//!    dispatch on the same channel: listeners the outer one has not reached
//!    yet only see the newer event.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use ahash::AHashMap;
use tabsync_reactive::Subscription;
use tabsync_storage::StorageArea;

/// Same-document broadcast payload.
///
/// `new_value` is the type-erased cell value; `None` means removed.
#[derive(Clone)]
pub struct BroadcastEvent {
    pub key: String,
    pub new_value: Option<Rc<dyn Any>>,
}

impl fmt::Debug for BroadcastEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BroadcastEvent")
            .field("key", &self.key)
            .field("removed", &self.new_value.is_none())
            .finish()
    }
}

pub type BroadcastListener = Rc<dyn Fn(&BroadcastEvent)>;

#[derive(Default)]
struct Channel {
    listeners: Vec<(u64, BroadcastListener)>,
    /// Sequence number of the newest dispatch on this channel.
    latest: u64,
}

#[derive(Default)]
struct BusState {
    channels: AHashMap<String, Channel>,
    next_id: u64,
    next_seq: u64,
}

/// Document-scoped event target. Clones share channels.
#[derive(Clone, Default)]
pub struct EventBus {
    state: Rc<RefCell<BusState>>,
}

fn escape(part: &str) -> String {
    part.replace('%', "%25").replace('-', "%2D")
}

/// Channel name for cells of `key` in `area` under `namespace`.
#[must_use]
pub fn event_name(namespace: &str, key: &str, area: StorageArea) -> String {
    format!(
        "{}-{}-{}-update",
        escape(namespace),
        escape(key),
        area.event_tag()
    )
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Listen on `name` until the returned subscription drops.
    pub fn listen(&self, name: impl Into<String>, listener: BroadcastListener) -> Subscription {
        let name = name.into();
        let id = {
            let mut state = self.state.borrow_mut();
            state.next_id += 1;
            let id = state.next_id;
            state
                .channels
                .entry(name.clone())
                .or_default()
                .listeners
                .push((id, listener));
            id
        };
        let weak: Weak<RefCell<BusState>> = Rc::downgrade(&self.state);
        Subscription::on_drop(move || {
            if let Some(state) = weak.upgrade() {
                let mut state = state.borrow_mut();
                if let Some(channel) = state.channels.get_mut(&name) {
                    channel.listeners.retain(|(lid, _)| *lid != id);
                    if channel.listeners.is_empty() {
                        state.channels.remove(&name);
                    }
                }
            }
        })
    }

    /// Deliver `event` to every listener on `name`. Returns how many ran.
    pub fn dispatch(&self, name: &str, event: &BroadcastEvent) -> usize {
        let (seq, targets) = {
            let mut state = self.state.borrow_mut();
            state.next_seq += 1;
            let seq = state.next_seq;
            let Some(channel) = state.channels.get_mut(name) else {
                return 0;
            };
            channel.latest = seq;
            let targets: Vec<BroadcastListener> =
                channel.listeners.iter().map(|(_, l)| Rc::clone(l)).collect();
            (seq, targets)
        };
        tracing::trace!(event = name, listeners = targets.len(), "dispatch");
        let mut delivered = 0;
        for listener in &targets {
            if !self.is_latest(name, seq) {
                tracing::trace!(event = name, delivered, "dispatch superseded");
                break;
            }
            listener(event);
            delivered += 1;
        }
        delivered
    }

    fn is_latest(&self, name: &str, seq: u64) -> bool {
        self.state
            .borrow()
            .channels
            .get(name)
            .is_some_and(|channel| channel.latest == seq)
    }

    #[must_use]
    pub fn listener_count(&self, name: &str) -> usize {
        self.state
            .borrow()
            .channels
            .get(name)
            .map_or(0, |channel| channel.listeners.len())
    }

    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.state.borrow().channels.len()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("channels", &self.channel_count())
            .finish()
    }
}

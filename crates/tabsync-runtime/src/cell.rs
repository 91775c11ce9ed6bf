//! Persistent, cross-document synchronized state cells.
//!
//! A [`SyncedCell<T>`] holds a value for one storage key. It is seeded from the
//! backend when created, persists every local write, and stays in step with
//!
//! - other cells on the same key in the same [`Document`], via the document's
//!   [`EventBus`](crate::EventBus), and
//! - cells on the same key in other documents attached to the same store,
//!   via the backend's change notifications.
//!
//! # Invariants
//!
//! 1. Once an update cycle finishes, the backend holds `serialize(value)` for
//!    the key, or no entry when the value is `None`. Recoverable failures
//!    (see [`SyncError`]) are the exception.
//! 2. A local write persists before observers run and before siblings are
//!    told, so anyone reacting sees a backend that already has the value.
//! 3. Values adopted from a sibling or another document are never written
//!    back (see [`echo`](crate::echo)).
//! 4. The cell seeds from the backend once, at creation.
//! 5. Dropping the last clone of a cell releases its bus and backend
//!    listeners.
//!
//! # Example
//!
//! ```
//! use tabsync_runtime::{CellOptions, Document, SyncConfig};
//! use tabsync_storage::{SharedStore, StorageArea};
//!
//! let local = SharedStore::new(StorageArea::Local);
//! let tab = Document::new(SyncConfig::default()).with_backend(local.attach());
//!
//! let count = tab.local_cell("count", CellOptions::json().default_value(0));
//! assert_eq!(count.read(), Some(0));
//!
//! count.set(5);
//! assert_eq!(local.peek("count").as_deref(), Some("5"));
//! ```

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tabsync_reactive::{EffectTiming, Observable, Subscription};
use tabsync_storage::{Codec, JsonCodec, StorageArea, StorageBackend, StorageChangeEvent};

use crate::adapter::{self, RawState, SaveOutcome};
use crate::bus::{BroadcastEvent, EventBus};
use crate::document::Document;
use crate::echo::{EchoGuard, Origin, PhaseGuard, SyncPhase};
use crate::error::{ErrorReporter, SyncError, log_reporter};

/// Value used when the backend has nothing for the key.
pub enum Initial<T> {
    Absent,
    Value(T),
    /// Evaluated once, only if needed.
    With(Box<dyn FnOnce() -> T>),
}

impl<T> Initial<T> {
    pub fn with(f: impl FnOnce() -> T + 'static) -> Self {
        Self::With(Box::new(f))
    }

    fn resolve(self) -> Option<T> {
        match self {
            Self::Absent => None,
            Self::Value(v) => Some(v),
            Self::With(f) => Some(f()),
        }
    }
}

impl<T> fmt::Debug for Initial<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => f.write_str("Absent"),
            Self::Value(_) => f.write_str("Value(..)"),
            Self::With(_) => f.write_str("With(..)"),
        }
    }
}

type Updater<T> = Box<dyn FnOnce(Option<&T>) -> Option<T>>;

/// Argument to [`SyncedCell::write`]: a new value, or a function of the
/// current one.
pub enum Update<T> {
    /// Replace the value; `None` removes it.
    Value(Option<T>),
    With(Updater<T>),
}

impl<T> Update<T> {
    pub fn with(f: impl FnOnce(Option<&T>) -> Option<T> + 'static) -> Self {
        Self::With(Box::new(f))
    }

    fn resolve(self, current: Option<&T>) -> Option<T> {
        match self {
            Self::Value(v) => v,
            Self::With(f) => f(current),
        }
    }
}

impl<T> From<T> for Update<T> {
    fn from(value: T) -> Self {
        Self::Value(Some(value))
    }
}

/// Per-cell options.
pub struct CellOptions<T> {
    initial: Initial<T>,
    codec: Rc<dyn Codec<T>>,
    reporter: Option<ErrorReporter>,
    timing: EffectTiming,
}

impl<T: Serialize + DeserializeOwned + 'static> CellOptions<T> {
    /// JSON codec, no initial value, log reporter, immediate notifications.
    #[must_use]
    pub fn json() -> Self {
        Self::with_codec(JsonCodec)
    }
}

impl<T: Serialize + DeserializeOwned + 'static> Default for CellOptions<T> {
    fn default() -> Self {
        Self::json()
    }
}

impl<T: 'static> CellOptions<T> {
    pub fn with_codec(codec: impl Codec<T> + 'static) -> Self {
        Self {
            initial: Initial::Absent,
            codec: Rc::new(codec),
            reporter: None,
            timing: EffectTiming::Immediate,
        }
    }

    #[must_use]
    pub fn initial(mut self, initial: Initial<T>) -> Self {
        self.initial = initial;
        self
    }

    #[must_use]
    pub fn default_value(self, value: T) -> Self {
        self.initial(Initial::Value(value))
    }

    #[must_use]
    pub fn default_with(self, f: impl FnOnce() -> T + 'static) -> Self {
        self.initial(Initial::with(f))
    }

    #[must_use]
    pub fn reporter(mut self, reporter: ErrorReporter) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// When observers registered with [`SyncedCell::subscribe`] run.
    #[must_use]
    pub fn timing(mut self, timing: EffectTiming) -> Self {
        self.timing = timing;
        self
    }
}

impl<T> fmt::Debug for CellOptions<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CellOptions")
            .field("initial", &self.initial)
            .field("custom_reporter", &self.reporter.is_some())
            .field("timing", &self.timing)
            .finish_non_exhaustive()
    }
}

struct CellInner<T> {
    key: String,
    area: StorageArea,
    event_name: String,
    backend: Option<Rc<dyn StorageBackend>>,
    bus: EventBus,
    codec: Rc<dyn Codec<T>>,
    reporter: ErrorReporter,
    timing: EffectTiming,
    broadcast_on_remove: bool,
    skip_redundant_writes: bool,
    value: Observable<Option<T>>,
    last_raw: RefCell<RawState>,
    echo: EchoGuard,
    phase: Cell<SyncPhase>,
    /// Bumped for every storage event this cell accepts.
    remote_epoch: Cell<u64>,
    links: RefCell<Vec<Subscription>>,
}

/// A value bound to one storage key, synchronized within and across
/// documents. Clones share the same cell.
pub struct SyncedCell<T> {
    inner: Rc<CellInner<T>>,
}

impl<T> Clone for SyncedCell<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Clone + PartialEq + 'static> SyncedCell<T> {
    pub(crate) fn open(
        document: &Document,
        area: StorageArea,
        key: impl Into<String>,
        options: CellOptions<T>,
    ) -> Self {
        let key = key.into();
        let CellOptions {
            initial,
            codec,
            reporter,
            timing,
        } = options;
        let reporter = reporter.unwrap_or_else(log_reporter);
        let backend = document.backend(area);
        if backend.is_none() {
            reporter(&SyncError::BackendUnavailable {
                key: key.clone(),
                area,
            });
        }
        let loaded = adapter::load(
            backend.as_deref(),
            &key,
            codec.as_ref(),
            || initial.resolve(),
            reporter.as_ref(),
        );
        tracing::debug!(key = %key, %area, seeded = ?loaded.raw, "opening cell");

        let config = document.config();
        let inner = Rc::new(CellInner {
            event_name: document.event_name(&key, area),
            key,
            area,
            backend,
            bus: document.bus().clone(),
            codec,
            reporter,
            timing,
            broadcast_on_remove: config.broadcast_on_remove,
            skip_redundant_writes: config.skip_redundant_writes,
            value: Observable::new(loaded.value),
            last_raw: RefCell::new(loaded.raw),
            echo: EchoGuard::default(),
            phase: Cell::new(SyncPhase::Idle),
            remote_epoch: Cell::new(0),
            links: RefCell::new(Vec::new()),
        });
        CellInner::attach(&inner);
        let seeded = inner.value.get();
        inner.persist_effect(seeded.as_ref());
        Self { inner }
    }

    /// Current value; `None` when absent or removed.
    #[must_use]
    pub fn read(&self) -> Option<T> {
        self.inner.value.get()
    }

    /// Borrow the current value for the duration of `f`.
    pub fn with<R>(&self, f: impl FnOnce(Option<&T>) -> R) -> R {
        self.inner.value.with(|v| f(v.as_ref()))
    }

    /// Apply an update, persist it, and announce it to same-document siblings.
    /// Other documents learn of it through the backend.
    ///
    /// The value is persisted even when it equals the current one, so a write
    /// that failed earlier can be retried. Unchanged text is not rewritten.
    pub fn write(&self, update: impl Into<Update<T>>) {
        let inner = &self.inner;
        let current = inner.value.get();
        let next = update.into().resolve(current.as_ref());
        inner.echo.reset();
        {
            let _phase = PhaseGuard::enter(&inner.phase, SyncPhase::Persisting);
            let mark = inner.mark();
            inner.persist_effect(next.as_ref());
            // Another document may have answered our write before it returned;
            // its value is now stored and already adopted here.
            if inner.superseded(mark) {
                tracing::debug!(key = %inner.key, "write superseded while persisting");
                return;
            }
            inner.value.set(next.clone());
        }
        // An observer may have written a newer value while we notified; that
        // write already broadcast itself.
        if inner.value.with(|v| *v == next) {
            inner.broadcast(next);
        }
    }

    pub fn set(&self, value: T) {
        self.write(Update::Value(Some(value)));
    }

    pub fn update(&self, f: impl FnOnce(Option<&T>) -> Option<T> + 'static) {
        self.write(Update::with(f));
    }

    /// Delete the backend entry and clear the value.
    ///
    /// Siblings in the same document are only told when the document's
    /// [`SyncConfig::broadcast_on_remove`](crate::SyncConfig) is set.
    pub fn remove(&self) {
        let inner = &self.inner;
        inner.echo.reset();
        let _phase = PhaseGuard::enter(&inner.phase, SyncPhase::Persisting);
        let mark = inner.mark();
        if let Some(backend) = &inner.backend {
            match backend.remove(&inner.key) {
                Ok(()) if inner.superseded(mark) => {
                    tracing::debug!(key = %inner.key, "remove superseded while persisting");
                    return;
                }
                Ok(()) => {
                    *inner.last_raw.borrow_mut() = RawState::Absent;
                }
                Err(source) => (inner.reporter)(&SyncError::Storage {
                    key: inner.key.clone(),
                    source,
                }),
            }
        }
        inner.value.set(None);
        if inner.broadcast_on_remove && inner.value.with(Option::is_none) {
            inner.broadcast(None);
        }
    }

    /// Register an observer for value changes. Runs immediately or through
    /// the cell's effect queue, per [`CellOptions::timing`].
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe(&self, on_change: impl Fn(Option<&T>) + 'static) -> Subscription {
        let on_change = Rc::new(on_change);
        let timing = self.inner.timing.clone();
        self.inner
            .value
            .subscribe(move |value: &Option<T>| match &timing {
                EffectTiming::Immediate => on_change(value.as_ref()),
                EffectTiming::Deferred(queue) => {
                    let on_change = Rc::clone(&on_change);
                    let value = value.clone();
                    queue.schedule(move || on_change(value.as_ref()));
                }
            })
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.inner.key
    }

    #[must_use]
    pub fn area(&self) -> StorageArea {
        self.inner.area
    }

    /// Same-document channel this cell listens and broadcasts on.
    #[must_use]
    pub fn event_name(&self) -> &str {
        &self.inner.event_name
    }

    #[must_use]
    pub fn phase(&self) -> SyncPhase {
        self.inner.phase.get()
    }

    /// Number of value changes since creation.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.value.version()
    }

    /// Whether this cell persists anywhere.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        self.inner.backend.is_some()
    }
}

impl<T: Clone + PartialEq + 'static> CellInner<T> {
    fn attach(this: &Rc<Self>) {
        let mut links = this.links.borrow_mut();

        let weak = Rc::downgrade(this);
        links.push(this.bus.listen(
            this.event_name.clone(),
            Rc::new(move |event: &BroadcastEvent| {
                if let Some(inner) = weak.upgrade() {
                    inner.on_broadcast(event);
                }
            }),
        ));

        if let Some(backend) = &this.backend {
            let weak = Rc::downgrade(this);
            links.push(backend.listen(Rc::new(move |event: &StorageChangeEvent| {
                if let Some(inner) = weak.upgrade() {
                    inner.on_storage_event(event);
                }
            })));
        }
    }

    /// Snapshot taken before touching the backend; see [`Self::superseded`].
    fn mark(&self) -> (u64, u64) {
        (self.value.version(), self.remote_epoch.get())
    }

    /// Whether the value changed, or another document wrote the key, since
    /// `mark` was taken.
    fn superseded(&self, mark: (u64, u64)) -> bool {
        self.mark() != mark
    }

    fn persist_effect(&self, value: Option<&T>) {
        if self.echo.take() {
            tracing::debug!(key = %self.key, phase = ?self.phase.get(), "skipping write of adopted value");
            return;
        }
        let outcome = adapter::save(
            self.backend.as_deref(),
            &self.key,
            value,
            self.codec.as_ref(),
            &self.last_raw,
            self.skip_redundant_writes,
            self.reporter.as_ref(),
        );
        if outcome != SaveOutcome::Unchanged {
            tracing::trace!(key = %self.key, ?outcome, "persisted");
        }
    }

    fn broadcast(&self, value: Option<T>) {
        let event = BroadcastEvent {
            key: self.key.clone(),
            new_value: value.map(|v| Rc::new(v) as Rc<dyn Any>),
        };
        self.bus.dispatch(&self.event_name, &event);
    }

    fn on_broadcast(&self, event: &BroadcastEvent) {
        if event.key != self.key {
            return;
        }
        let next = match &event.new_value {
            None => None,
            Some(payload) => match payload.downcast_ref::<T>() {
                Some(v) => Some(v.clone()),
                None => {
                    tracing::warn!(
                        key = %self.key,
                        "ignoring same-document update carrying a different value type"
                    );
                    return;
                }
            },
        };
        if self.value.with(|v| *v == next) {
            return;
        }
        let _phase = PhaseGuard::enter(&self.phase, SyncPhase::AdoptingLocal);
        self.echo.arm(Origin::SameDocument);
        self.persist_effect(next.as_ref());
        // The sender wrote with its own codec; don't assume the text.
        *self.last_raw.borrow_mut() = RawState::Unknown;
        self.value.set(next);
    }

    fn on_storage_event(&self, event: &StorageChangeEvent) {
        let Some(backend) = &self.backend else {
            return;
        };
        if event.area != self.area || event.store != backend.store_id() {
            return;
        }
        // A keyless event means the whole area was cleared.
        let raw = match event.key.as_deref() {
            Some(key) if key == self.key => event.new_value.clone(),
            Some(_) => return,
            None => None,
        };
        // A later write landed while this event was being delivered. Its own
        // notification (or a sibling's broadcast) carries the current value.
        if backend.get(&self.key).is_ok_and(|stored| stored != raw) {
            tracing::trace!(key = %self.key, "ignoring superseded storage event");
            return;
        }
        let next = match raw.as_deref() {
            None => None,
            Some(text) => match self.codec.parse(text) {
                Ok(v) => v,
                Err(source) => {
                    (self.reporter)(&SyncError::MalformedPersistedValue {
                        key: self.key.clone(),
                        source,
                    });
                    return;
                }
            },
        };
        self.remote_epoch.set(self.remote_epoch.get() + 1);
        *self.last_raw.borrow_mut() = match raw {
            Some(text) => RawState::Present(text),
            None => RawState::Absent,
        };
        if self.value.with(|v| *v == next) {
            return;
        }
        let _phase = PhaseGuard::enter(&self.phase, SyncPhase::AdoptingRemote);
        self.echo.arm(Origin::CrossDocument);
        self.persist_effect(next.as_ref());
        self.value.set(next);
    }
}

impl<T: fmt::Debug + Clone + PartialEq + 'static> fmt::Debug for SyncedCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncedCell")
            .field("key", &self.inner.key)
            .field("area", &self.inner.area)
            .field("value", &self.inner.value.get())
            .field("phase", &self.inner.phase.get())
            .finish()
    }
}

//! A document: one browsing context with its own event bus and storage
//! handles.
//!
//! Cells created from the same document share a bus, so a write in one is
//! adopted by the others. Documents attached to the same [`SharedStore`]
//! see each other's writes through the store's change events.

use std::fmt;
use std::rc::Rc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tabsync_storage::{SharedStore, StorageArea, StorageBackend};

use crate::bus::{self, EventBus};
use crate::cell::{CellOptions, SyncedCell};
use crate::config::SyncConfig;

pub struct Document {
    config: Rc<SyncConfig>,
    bus: EventBus,
    local: Option<Rc<dyn StorageBackend>>,
    session: Option<Rc<dyn StorageBackend>>,
}

impl Document {
    /// A document with no storage attached yet.
    #[must_use]
    pub fn new(config: SyncConfig) -> Self {
        Self {
            config: Rc::new(config),
            bus: EventBus::new(),
            local: None,
            session: None,
        }
    }

    /// Default config and no storage. Cells created here are memory-only.
    #[must_use]
    pub fn detached() -> Self {
        Self::new(SyncConfig::default())
    }

    /// Attach `backend` for its area, replacing any previous one.
    #[must_use]
    pub fn with_backend(mut self, backend: impl StorageBackend + 'static) -> Self {
        let backend: Rc<dyn StorageBackend> = Rc::new(backend);
        match backend.area() {
            StorageArea::Local => self.local = Some(backend),
            StorageArea::Session => self.session = Some(backend),
        }
        self
    }

    /// A document attached to both stores.
    #[must_use]
    pub fn attach(config: SyncConfig, local: &SharedStore, session: &SharedStore) -> Self {
        Self::new(config)
            .with_backend(local.attach())
            .with_backend(session.attach())
    }

    #[must_use]
    pub fn backend(&self, area: StorageArea) -> Option<Rc<dyn StorageBackend>> {
        match area {
            StorageArea::Local => self.local.clone(),
            StorageArea::Session => self.session.clone(),
        }
    }

    #[must_use]
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    #[must_use]
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn cell<T: Clone + PartialEq + 'static>(
        &self,
        area: StorageArea,
        key: impl Into<String>,
        options: CellOptions<T>,
    ) -> SyncedCell<T> {
        SyncedCell::open(self, area, key, options)
    }

    pub fn local_cell<T: Clone + PartialEq + 'static>(
        &self,
        key: impl Into<String>,
        options: CellOptions<T>,
    ) -> SyncedCell<T> {
        self.cell(StorageArea::Local, key, options)
    }

    pub fn session_cell<T: Clone + PartialEq + 'static>(
        &self,
        key: impl Into<String>,
        options: CellOptions<T>,
    ) -> SyncedCell<T> {
        self.cell(StorageArea::Session, key, options)
    }

    /// Shorthand for a JSON-encoded local cell with a default.
    pub fn json_cell<T>(&self, key: impl Into<String>, default: T) -> SyncedCell<T>
    where
        T: Clone + PartialEq + Serialize + DeserializeOwned + 'static,
    {
        self.local_cell(key, CellOptions::json().default_value(default))
    }

    /// Same-document channel name for `key` in `area`.
    #[must_use]
    pub fn event_name(&self, key: &str, area: StorageArea) -> String {
        bus::event_name(&self.config.namespace, key, area)
    }

    /// Live cells bound to `key` in `area` within this document.
    #[must_use]
    pub fn listener_count(&self, key: &str, area: StorageArea) -> usize {
        self.bus.listener_count(&self.event_name(key, area))
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::detached()
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("namespace", &self.config.namespace)
            .field("local", &self.local.as_ref().map(|b| b.store_id()))
            .field("session", &self.session.as_ref().map(|b| b.store_id()))
            .field("bus", &self.bus)
            .finish()
    }
}

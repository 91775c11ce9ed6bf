#![forbid(unsafe_code)]

//! tabsync: persistent state cells that stay in sync across every document
//! sharing a store.
//!
//! This crate re-exports the workspace crates and offers a [`prelude`].
//!
//! ```
//! use tabsync::prelude::*;
//!
//! let local = SharedStore::new(StorageArea::Local);
//! let session = SharedStore::new(StorageArea::Session);
//! let tab_a = Document::attach(SyncConfig::default(), &local, &session);
//! let tab_b = Document::attach(SyncConfig::default(), &local, &session);
//!
//! let theme_a = tab_a.json_cell("theme", String::from("light"));
//! let theme_b = tab_b.json_cell("theme", String::from("light"));
//!
//! theme_a.set("dark".into());
//! assert_eq!(theme_b.read().as_deref(), Some("dark"));
//! ```

pub use tabsync_reactive as reactive;
pub use tabsync_runtime as runtime;
pub use tabsync_storage as storage;

pub use tabsync_reactive::{BindingScope, EffectQueue, EffectTiming, Observable, Subscription};
pub use tabsync_runtime::{
    CellOptions, Document, ErrorReporter, Initial, SyncConfig, SyncError, SyncPhase, SyncedCell,
    Update,
};
pub use tabsync_storage::{
    Codec, CodecError, JsonCodec, SharedStore, StorageArea, StorageBackend, StorageError,
    StoreHandle,
};

pub mod prelude {
    pub use crate::{
        BindingScope, CellOptions, Document, EffectQueue, EffectTiming, Initial, SharedStore,
        StorageArea, Subscription, SyncConfig, SyncError, SyncedCell, Update,
    };
}

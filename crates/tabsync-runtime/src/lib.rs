#![forbid(unsafe_code)]

//! Persistent state cells kept in sync within a document and across
//! documents sharing a store.
//!
//! # Role in tabsync
//! `tabsync-runtime` ties the reactive primitives of `tabsync-reactive` to the
//! storage backends of `tabsync-storage`. A [`Document`] owns an event bus and
//! one backend per [`StorageArea`](tabsync_storage::StorageArea); cells created
//! from it persist their value and follow writes made anywhere else.
//!
//! # Key Components
//! - [`SyncedCell`]: the synchronized value.
//! - [`Document`]: the context cells live in.
//! - [`EventBus`]: same-document fan-out.
//! - [`adapter`]: load/save of one key through a codec.
//! - [`echo`]: the suppression state machine that keeps adopted values from
//!   being written back.
//! - [`SyncConfig`]: namespace and behavior switches.
//!
//! # Feature Flags
//! - `policy-config`: load [`SyncConfig`] from TOML or JSON.
//! - `tracing-json`: [`logging`] installs a JSON `tracing` subscriber.
//! - `state-persistence`: store snapshots (forwarded to `tabsync-storage`).

pub mod adapter;
pub mod bus;
pub mod cell;
pub mod config;
pub mod document;
pub mod echo;
pub mod error;
#[cfg(feature = "tracing-json")]
pub mod logging;

pub use bus::{BroadcastEvent, BroadcastListener, EventBus, event_name};
pub use cell::{CellOptions, Initial, SyncedCell, Update};
pub use config::{ConfigError, SyncConfig};
pub use document::Document;
pub use echo::{Origin, SyncPhase};
pub use error::{ErrorReporter, SyncError, log_reporter};

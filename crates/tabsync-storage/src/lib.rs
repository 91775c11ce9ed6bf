#![forbid(unsafe_code)]

//! Storage backends and codecs for tabsync cells.
//!
//! - [`StorageBackend`]: the key-value capability a cell persists to, with
//!   change notifications delivered to other documents only.
//! - [`SharedStore`] / [`StoreHandle`]: an in-process store shared by several
//!   documents, one handle per document.
//! - [`Codec`]: serializer/parser pair; [`JsonCodec`] is the default.
//!
//! With the `state-persistence` feature, a [`SharedStore`] can be saved to and
//! restored from a JSON file.

pub mod area;
pub mod backend;
pub mod codec;
pub mod error;
pub mod memory;
#[cfg(feature = "state-persistence")]
pub mod snapshot;

pub use area::StorageArea;
pub use backend::{ChangeListener, StorageBackend, StorageChangeEvent, StoreId};
pub use codec::{Codec, FnCodec, JsonCodec};
pub use error::{CodecError, StorageError};
pub use memory::{ContextId, SharedStore, StoreHandle};

//! The backend capability a cell persists to.

use std::fmt;
use std::rc::Rc;

use tabsync_reactive::Subscription;

use crate::area::StorageArea;
use crate::error::StorageError;

/// Identity of one underlying store.
///
/// Two handles onto the same store report the same id; handles onto
/// different stores never do, even when they serve the same area.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StoreId(pub u64);

impl fmt::Display for StoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "store#{}", self.0)
    }
}

/// Change notification delivered to every *other* context attached to a
/// store after a mutation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageChangeEvent {
    /// Mutated key; `None` when the whole area was cleared.
    pub key: Option<String>,
    pub old_value: Option<String>,
    /// New raw value; `None` when the key was removed.
    pub new_value: Option<String>,
    pub area: StorageArea,
    pub store: StoreId,
}

/// Listener for [`StorageChangeEvent`]s.
pub type ChangeListener = Rc<dyn Fn(&StorageChangeEvent)>;

/// Key-value storage as seen from one document.
///
/// Mutations made through a backend are announced to listeners registered by
/// other documents on the same store, never to the mutating document.
pub trait StorageBackend {
    fn area(&self) -> StorageArea;

    fn store_id(&self) -> StoreId;

    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Register for changes made by other documents. Dropping the returned
    /// subscription unregisters.
    fn listen(&self, listener: ChangeListener) -> Subscription;
}

impl fmt::Debug for dyn StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageBackend")
            .field("area", &self.area())
            .field("store", &self.store_id())
            .finish()
    }
}

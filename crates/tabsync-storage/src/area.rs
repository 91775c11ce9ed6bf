//! Storage areas: the durable store and the per-session store.

use std::fmt;

/// Which key-value area a backend serves.
///
/// Both areas expose the same operations; they differ only in lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(
    feature = "state-persistence",
    derive(serde::Serialize, serde::Deserialize)
)]
#[cfg_attr(feature = "state-persistence", serde(rename_all = "lowercase"))]
pub enum StorageArea {
    /// Survives across sessions.
    Local,
    /// Scoped to one browsing session.
    Session,
}

impl StorageArea {
    pub const ALL: [Self; 2] = [Self::Local, Self::Session];

    /// Tag used in same-document event names.
    #[must_use]
    pub const fn event_tag(self) -> &'static str {
        match self {
            Self::Local => "localstorage",
            Self::Session => "sessionstorage",
        }
    }

    #[must_use]
    pub const fn is_durable(self) -> bool {
        matches!(self, Self::Local)
    }
}

impl fmt::Display for StorageArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("local"),
            Self::Session => f.write_str("session"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_tags_are_distinct() {
        assert_ne!(
            StorageArea::Local.event_tag(),
            StorageArea::Session.event_tag()
        );
    }

    #[test]
    fn only_local_is_durable() {
        assert!(StorageArea::Local.is_durable());
        assert!(!StorageArea::Session.is_durable());
    }
}

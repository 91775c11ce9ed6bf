//! Recoverable synchronization failures and how they are reported.
//!
//! No operation on a [`SyncedCell`](crate::SyncedCell) returns an error.
//! Failures are handed to the cell's [`ErrorReporter`] and the cell carries
//! on with its in-memory value.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Recovery |
//! |---------|-------|----------|
//! | `BackendUnavailable` | No storage in this context | Memory-only cell |
//! | `MalformedPersistedValue` | Stored text fails to parse | Fallback value; remote events ignored |
//! | `Serialization` | Value cannot be encoded | Write skipped, stored text untouched |
//! | `Storage` | Quota exceeded, backend I/O | In-memory value stands |

use std::fmt;
use std::rc::Rc;

use tabsync_storage::{CodecError, StorageArea, StorageError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    BackendUnavailable { key: String, area: StorageArea },
    MalformedPersistedValue { key: String, source: CodecError },
    Serialization { key: String, source: CodecError },
    Storage { key: String, source: StorageError },
}

impl SyncError {
    /// Key of the cell that hit the failure.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::BackendUnavailable { key, .. }
            | Self::MalformedPersistedValue { key, .. }
            | Self::Serialization { key, .. }
            | Self::Storage { key, .. } => key,
        }
    }
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BackendUnavailable { key, area } => {
                write!(f, "{area} storage unavailable; '{key}' is memory-only")
            }
            Self::MalformedPersistedValue { key, source } => {
                write!(f, "malformed stored value for '{key}': {source}")
            }
            Self::Serialization { key, source } => {
                write!(f, "cannot serialize value for '{key}': {source}")
            }
            Self::Storage { key, source } => write!(f, "storage failure for '{key}': {source}"),
        }
    }
}

impl std::error::Error for SyncError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::BackendUnavailable { .. } => None,
            Self::MalformedPersistedValue { source, .. } | Self::Serialization { source, .. } => {
                Some(source)
            }
            Self::Storage { source, .. } => Some(source),
        }
    }
}

/// Receives every failure a cell recovers from. Never re-raises.
pub type ErrorReporter = Rc<dyn Fn(&SyncError)>;

/// Default reporter: logs through `tracing`.
#[must_use]
pub fn log_reporter() -> ErrorReporter {
    Rc::new(|err: &SyncError| match err {
        SyncError::BackendUnavailable { key, area } => {
            tracing::warn!(key = %key, area = %area, "{err}");
        }
        _ => tracing::error!(key = %err.key(), "{err}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;
    use std::sync::{Arc, Mutex};
    use tracing::field::{Field, Visit};
    use tracing::{Event, Level, Subscriber};
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<(Level, String)>>>);

    struct MessageVisitor(String);

    impl Visit for MessageVisitor {
        fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
            if field.name() == "message" {
                self.0 = format!("{value:?}");
            }
        }
    }

    impl<S: Subscriber> Layer<S> for Capture {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            let mut visitor = MessageVisitor(String::new());
            event.record(&mut visitor);
            self.0
                .lock()
                .unwrap()
                .push((*event.metadata().level(), visitor.0));
        }
    }

    #[test]
    fn display_names_key() {
        let err = SyncError::Storage {
            key: "count".into(),
            source: StorageError::QuotaExceeded {
                key: "count".into(),
                requested: 10,
                quota: 4,
            },
        };
        let text = err.to_string();
        assert!(text.contains("'count'"));
        assert!(text.contains("quota"));
        assert!(err.source().is_some());
        assert_eq!(err.key(), "count");
    }

    #[test]
    fn unavailable_has_no_source() {
        let err = SyncError::BackendUnavailable {
            key: "k".into(),
            area: StorageArea::Session,
        };
        assert!(err.source().is_none());
        assert!(err.to_string().starts_with("session storage unavailable"));
    }

    #[test]
    fn log_reporter_levels() {
        let capture = Capture::default();
        let subscriber = tracing_subscriber::registry().with(capture.clone());
        tracing::subscriber::with_default(subscriber, || {
            let report = log_reporter();
            report(&SyncError::BackendUnavailable {
                key: "a".into(),
                area: StorageArea::Local,
            });
            report(&SyncError::MalformedPersistedValue {
                key: "b".into(),
                source: CodecError::Parse("eof".into()),
            });
        });
        let events = capture.0.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].0, Level::WARN);
        assert_eq!(events[1].0, Level::ERROR);
        assert!(events[1].1.contains("malformed stored value for 'b'"));
    }
}

//! Persistence adapter: load and save one key through a codec.
//!
//! Neither operation fails outward. Problems go to the reporter and the
//! caller gets a usable value or an outcome to log.
//!
//! Malformed stored text yields the fallback value for both storage areas.

use std::cell::RefCell;

use tabsync_storage::{Codec, StorageBackend};

use crate::error::SyncError;

/// What this cell last knew the backend held for its key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RawState {
    /// Not known; the next save always writes.
    Unknown,
    Absent,
    Present(String),
}

#[derive(Debug)]
pub struct Loaded<T> {
    pub value: Option<T>,
    pub raw: RawState,
}

/// Read `key`, falling back when it is absent, `null`, or malformed.
pub fn load<T>(
    backend: Option<&dyn StorageBackend>,
    key: &str,
    codec: &dyn Codec<T>,
    fallback: impl FnOnce() -> Option<T>,
    report: &dyn Fn(&SyncError),
) -> Loaded<T> {
    let Some(backend) = backend else {
        return Loaded {
            value: fallback(),
            raw: RawState::Unknown,
        };
    };
    match backend.get(key) {
        Err(source) => {
            report(&SyncError::Storage {
                key: key.to_owned(),
                source,
            });
            Loaded {
                value: fallback(),
                raw: RawState::Unknown,
            }
        }
        Ok(None) => Loaded {
            value: fallback(),
            raw: RawState::Absent,
        },
        Ok(Some(raw)) => {
            let value = match codec.parse(&raw) {
                Ok(Some(value)) => Some(value),
                Ok(None) => fallback(),
                Err(source) => {
                    report(&SyncError::MalformedPersistedValue {
                        key: key.to_owned(),
                        source,
                    });
                    fallback()
                }
            };
            Loaded {
                value,
                raw: RawState::Present(raw),
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SaveOutcome {
    Written,
    Deleted,
    /// Backend already holds this text (or has no entry to delete).
    Unchanged,
    /// No backend in this context.
    Detached,
    /// Reported to the error reporter; backend untouched.
    Failed,
}

/// Write `value` (or delete when `None`) under `key`.
///
/// `last_raw` is updated before the backend call so that change events
/// raised while the write is in flight can overwrite it with newer text.
/// It is rolled back if the write fails.
pub fn save<T>(
    backend: Option<&dyn StorageBackend>,
    key: &str,
    value: Option<&T>,
    codec: &dyn Codec<T>,
    last_raw: &RefCell<RawState>,
    skip_redundant: bool,
    report: &dyn Fn(&SyncError),
) -> SaveOutcome {
    let Some(backend) = backend else {
        return SaveOutcome::Detached;
    };
    let next = match value {
        None => RawState::Absent,
        Some(value) => match codec.serialize(value) {
            Ok(text) => RawState::Present(text),
            Err(source) => {
                report(&SyncError::Serialization {
                    key: key.to_owned(),
                    source,
                });
                return SaveOutcome::Failed;
            }
        },
    };
    if skip_redundant && *last_raw.borrow() == next {
        return SaveOutcome::Unchanged;
    }
    let prev = last_raw.replace(next.clone());
    let result = match &next {
        RawState::Present(text) => backend.set(key, text).map(|()| SaveOutcome::Written),
        _ => backend.remove(key).map(|()| SaveOutcome::Deleted),
    };
    match result {
        Ok(outcome) => outcome,
        Err(source) => {
            *last_raw.borrow_mut() = prev;
            report(&SyncError::Storage {
                key: key.to_owned(),
                source,
            });
            SaveOutcome::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;
    use tabsync_storage::{JsonCodec, SharedStore, StorageArea, StorageError};

    fn collecting() -> (Rc<RefCell<Vec<SyncError>>>, impl Fn(&SyncError)) {
        let errors = Rc::new(RefCell::new(Vec::new()));
        let e = Rc::clone(&errors);
        (errors, move |err: &SyncError| e.borrow_mut().push(err.clone()))
    }

    #[test]
    fn load_absent_uses_fallback() {
        let store = SharedStore::new(StorageArea::Local);
        let handle = store.attach();
        let (errors, report) = collecting();
        let loaded = load::<u32>(Some(&handle), "n", &JsonCodec, || Some(3), &report);
        assert_eq!(loaded.value, Some(3));
        assert_eq!(loaded.raw, RawState::Absent);
        assert!(errors.borrow().is_empty());
    }

    #[test]
    fn load_malformed_reports_and_falls_back() {
        let store = SharedStore::new(StorageArea::Session);
        let handle = store.attach();
        handle.set("n", "{oops").unwrap();
        let (errors, report) = collecting();
        let loaded = load::<u32>(Some(&handle), "n", &JsonCodec, || Some(1), &report);
        assert_eq!(loaded.value, Some(1));
        assert_eq!(loaded.raw, RawState::Present("{oops".into()));
        assert!(matches!(
            errors.borrow()[0],
            SyncError::MalformedPersistedValue { .. }
        ));
    }

    #[test]
    fn load_null_text_is_absent() {
        let store = SharedStore::new(StorageArea::Local);
        let handle = store.attach();
        handle.set("n", "null").unwrap();
        let (_errors, report) = collecting();
        let loaded = load::<u32>(Some(&handle), "n", &JsonCodec, || Some(9), &report);
        assert_eq!(loaded.value, Some(9));
    }

    #[test]
    fn load_without_backend_evaluates_fallback() {
        let (_errors, report) = collecting();
        let loaded = load::<String>(None, "n", &JsonCodec, || Some("x".into()), &report);
        assert_eq!(loaded.value.as_deref(), Some("x"));
        assert_eq!(loaded.raw, RawState::Unknown);
    }

    #[test]
    fn save_skips_redundant_text() {
        let store = SharedStore::new(StorageArea::Local);
        let handle = store.attach();
        let raw = RefCell::new(RawState::Absent);
        let (_errors, report) = collecting();

        let first = save(Some(&handle), "n", Some(&5u32), &JsonCodec, &raw, true, &report);
        let second = save(Some(&handle), "n", Some(&5u32), &JsonCodec, &raw, true, &report);
        assert_eq!(first, SaveOutcome::Written);
        assert_eq!(second, SaveOutcome::Unchanged);
        assert_eq!(store.write_count(), 1);

        let forced = save(Some(&handle), "n", Some(&5u32), &JsonCodec, &raw, false, &report);
        assert_eq!(forced, SaveOutcome::Written);
        assert_eq!(store.write_count(), 2);
    }

    #[test]
    fn save_none_deletes() {
        let store = SharedStore::new(StorageArea::Local);
        let handle = store.attach();
        handle.set("n", "1").unwrap();
        let raw = RefCell::new(RawState::Present("1".into()));
        let (_errors, report) = collecting();
        let outcome = save::<u32>(Some(&handle), "n", None, &JsonCodec, &raw, true, &report);
        assert_eq!(outcome, SaveOutcome::Deleted);
        assert!(store.peek("n").is_none());
        assert_eq!(*raw.borrow(), RawState::Absent);
    }

    #[test]
    fn quota_failure_rolls_back_raw_state() {
        let store = SharedStore::with_quota(StorageArea::Local, 4);
        let handle = store.attach();
        let raw = RefCell::new(RawState::Absent);
        let (errors, report) = collecting();
        let outcome = save(
            Some(&handle),
            "n",
            Some(&"too long".to_string()),
            &JsonCodec,
            &raw,
            true,
            &report,
        );
        assert_eq!(outcome, SaveOutcome::Failed);
        assert_eq!(*raw.borrow(), RawState::Absent);
        assert!(matches!(
            &errors.borrow()[0],
            SyncError::Storage {
                source: StorageError::QuotaExceeded { .. },
                ..
            }
        ));
    }

    #[test]
    fn save_without_backend_is_detached() {
        let raw = RefCell::new(RawState::Unknown);
        let (_errors, report) = collecting();
        let outcome = save(None, "n", Some(&1u8), &JsonCodec, &raw, true, &report);
        assert_eq!(outcome, SaveOutcome::Detached);
    }
}

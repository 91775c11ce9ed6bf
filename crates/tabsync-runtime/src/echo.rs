//! Echo suppression.
//!
//! A value that reached a cell from outside (another document through the
//! backend, or a sibling cell through the bus) is already in the backend.
//! Writing it back would be redundant, and for the cross-document path would
//! announce the same value to every other document again.
//!
//! Each cell walks a small state machine:
//!
//! ```text
//!            write()/remove()               storage event             bus event
//! IDLE ───────────────────▶ PERSISTING   IDLE ─────▶ ADOPTING_REMOTE   IDLE ─────▶ ADOPTING_LOCAL
//!   ▲                            │          ▲               │            ▲              │
//!   └────────────────────────────┘          └───────────────┘            └──────────────┘
//! ```
//!
//! Adopting a value arms one of two one-shot flags. The persistence step
//! that follows takes both flags, skips the write if either was armed, and
//! leaves both cleared, all within the same update cycle.

use std::cell::Cell;

/// Where a cell currently is in its update cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SyncPhase {
    #[default]
    Idle,
    /// Handling a local `write()` or `remove()`.
    Persisting,
    /// Adopting a value written by another document.
    AdoptingRemote,
    /// Adopting a value broadcast by a sibling cell in this document.
    AdoptingLocal,
}

/// Path a value change arrived on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Origin {
    CrossDocument,
    SameDocument,
}

/// The two one-shot suppression flags.
#[derive(Debug, Default)]
pub(crate) struct EchoGuard {
    from_cross_document: Cell<bool>,
    from_same_document: Cell<bool>,
}

impl EchoGuard {
    pub(crate) fn arm(&self, origin: Origin) {
        match origin {
            Origin::CrossDocument => self.from_cross_document.set(true),
            Origin::SameDocument => self.from_same_document.set(true),
        }
    }

    /// Read and clear both flags. `true` means skip the write.
    pub(crate) fn take(&self) -> bool {
        let cross = self.from_cross_document.replace(false);
        let same = self.from_same_document.replace(false);
        cross || same
    }

    pub(crate) fn reset(&self) {
        self.from_cross_document.set(false);
        self.from_same_document.set(false);
    }

    #[cfg(test)]
    pub(crate) fn is_armed(&self) -> bool {
        self.from_cross_document.get() || self.from_same_document.get()
    }
}

/// Holds a phase for the duration of a scope and restores the previous one
/// on drop (`Idle` unless a nested update is running).
pub(crate) struct PhaseGuard<'a> {
    slot: &'a Cell<SyncPhase>,
    prev: SyncPhase,
}

impl<'a> PhaseGuard<'a> {
    pub(crate) fn enter(slot: &'a Cell<SyncPhase>, phase: SyncPhase) -> Self {
        let prev = slot.replace(phase);
        Self { slot, prev }
    }
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        self.slot.set(self.prev);
    }
}

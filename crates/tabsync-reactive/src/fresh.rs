#![forbid(unsafe_code)]

//! A shared reference that always holds the latest committed value.
//!
//! Long-lived callbacks capture a [`FreshRef`] instead of the value itself, so
//! they observe whatever the owner committed most recently.

use std::cell::RefCell;
use std::rc::Rc;

use crate::effect::EffectTiming;

/// Shared slot refreshed on every [`commit`](FreshRef::commit).
#[derive(Debug)]
pub struct FreshRef<T> {
    slot: Rc<RefCell<T>>,
    timing: EffectTiming,
}

impl<T> Clone for FreshRef<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Rc::clone(&self.slot),
            timing: self.timing.clone(),
        }
    }
}

impl<T: 'static> FreshRef<T> {
    #[must_use]
    pub fn new(value: T, timing: EffectTiming) -> Self {
        Self {
            slot: Rc::new(RefCell::new(value)),
            timing,
        }
    }

    /// Store `value`, immediately or at the next flush depending on timing.
    pub fn commit(&self, value: T) {
        let slot = Rc::clone(&self.slot);
        self.timing.run(move || *slot.borrow_mut() = value);
    }

    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.slot.borrow())
    }
}

impl<T: Clone + 'static> FreshRef<T> {
    #[must_use]
    pub fn get(&self) -> T {
        self.slot.borrow().clone()
    }
}

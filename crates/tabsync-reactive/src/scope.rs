#![forbid(unsafe_code)]

//! Lifecycle management for listener registrations owned by a UI component.
//!
//! A component that observes several cells collects the returned
//! [`Subscription`]s in a [`BindingScope`]. When the component is torn down
//! the scope drops and every registration is released, whichever exit path
//! was taken.
//!
//! # Invariants
//!
//! 1. Subscriptions are released in reverse registration order on drop.
//! 2. After drop, no callbacks from this scope will fire.
//! 3. `clear()` releases all subscriptions immediately (reusable scope).

use std::fmt;

use crate::observable::{Observable, Subscription};

/// Collects subscriptions for a logical scope (e.g., a widget).
#[derive(Default)]
pub struct BindingScope {
    subscriptions: Vec<Subscription>,
}

impl BindingScope {
    /// Create an empty binding scope.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold `sub` until the scope is dropped or cleared.
    pub fn hold(&mut self, sub: Subscription) -> &mut Self {
        self.subscriptions.push(sub);
        self
    }

    /// Subscribe to an observable within this scope.
    pub fn subscribe<T: Clone + PartialEq + 'static>(
        &mut self,
        source: &Observable<T>,
        callback: impl Fn(&T) + 'static,
    ) -> &mut Self {
        let sub = source.subscribe(callback);
        self.hold(sub)
    }

    /// Number of held subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Release all subscriptions now. The scope stays usable.
    pub fn clear(&mut self) {
        while let Some(sub) = self.subscriptions.pop() {
            drop(sub);
        }
    }
}

impl Drop for BindingScope {
    fn drop(&mut self) {
        self.clear();
    }
}

impl fmt::Debug for BindingScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingScope")
            .field("len", &self.subscriptions.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    #[test]
    fn scope_drop_releases_subscriptions() {
        let obs = Observable::new(0);
        let seen = Rc::new(Cell::new(0));
        {
            let mut scope = BindingScope::new();
            let s = Rc::clone(&seen);
            scope.subscribe(&obs, move |v| s.set(*v));
            obs.set(1);
            assert_eq!(seen.get(), 1);
        }
        obs.set(99);
        assert_eq!(seen.get(), 1, "callback should not fire after scope dropped");
    }

    #[test]
    fn scope_releases_in_reverse_order() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let mut scope = BindingScope::new();
        for i in 0..3 {
            let o = Rc::clone(&order);
            scope.hold(Subscription::on_drop(move || o.borrow_mut().push(i)));
        }
        drop(scope);
        assert_eq!(*order.borrow(), vec![2, 1, 0]);
    }

    #[test]
    fn scope_reusable_after_clear() {
        let obs = Observable::new(0);
        let mut scope = BindingScope::new();

        let first = Rc::new(Cell::new(false));
        let f = Rc::clone(&first);
        scope.subscribe(&obs, move |_| f.set(true));
        scope.clear();
        assert!(scope.is_empty());

        let second = Rc::new(Cell::new(false));
        let s = Rc::clone(&second);
        scope.subscribe(&obs, move |_| s.set(true));

        obs.set(1);
        assert!(!first.get());
        assert!(second.get());
        assert_eq!(scope.len(), 1);
    }

    #[test]
    fn scope_debug_format() {
        let mut scope = BindingScope::new();
        let obs = Observable::new(0);
        scope.subscribe(&obs, |_| {}).subscribe(&obs, |_| {});
        assert!(format!("{scope:?}").contains("len: 2"));
    }
}

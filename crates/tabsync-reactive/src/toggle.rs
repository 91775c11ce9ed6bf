#![forbid(unsafe_code)]

//! Cycle through a fixed list of states.

/// Index into a fixed, non-empty list that advances and wraps on `toggle()`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CycleToggle<T> {
    states: Vec<T>,
    index: usize,
}

impl<T> CycleToggle<T> {
    /// Start at the first state. Returns `None` for an empty list.
    #[must_use]
    pub fn new(states: Vec<T>) -> Option<Self> {
        if states.is_empty() {
            None
        } else {
            Some(Self { states, index: 0 })
        }
    }

    #[must_use]
    pub fn current(&self) -> &T {
        &self.states[self.index]
    }

    /// Advance to the next state, wrapping to the first.
    pub fn toggle(&mut self) -> &T {
        self.index = (self.index + 1) % self.states.len();
        self.current()
    }

    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Always `false`; construction rejects empty lists.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn empty_list_rejected() {
        assert!(CycleToggle::<u8>::new(Vec::new()).is_none());
    }

    #[test]
    fn toggles_and_wraps() {
        let mut t = CycleToggle::new(vec!["off", "low", "high"]).unwrap();
        assert_eq!(*t.current(), "off");
        assert_eq!(*t.toggle(), "low");
        assert_eq!(*t.toggle(), "high");
        assert_eq!(*t.toggle(), "off");
        assert_eq!(t.index(), 0);
    }

    #[test]
    fn single_state_stays_put() {
        let mut t = CycleToggle::new(vec![true]).unwrap();
        assert!(*t.toggle());
        assert_eq!(t.len(), 1);
    }

    proptest! {
        #[test]
        fn index_tracks_toggle_count(len in 1usize..16, presses in 0usize..64) {
            let mut t = CycleToggle::new((0..len).collect::<Vec<_>>()).unwrap();
            for _ in 0..presses {
                t.toggle();
            }
            prop_assert_eq!(t.index(), presses % len);
            prop_assert_eq!(*t.current(), presses % len);
        }
    }
}

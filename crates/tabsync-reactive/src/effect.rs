#![forbid(unsafe_code)]

//! Effect timing: run a side effect now, or defer it to the caller's
//! rendering phase.
//!
//! Hosts with a live document apply effects synchronously (before the next
//! paint). Hosts without one, such as a pre-render pass, queue effects and
//! flush them once output has been produced.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

type Effect = Box<dyn FnOnce()>;

/// FIFO queue of deferred effects. Clones share one queue.
#[derive(Clone, Default)]
pub struct EffectQueue {
    pending: Rc<RefCell<VecDeque<Effect>>>,
}

impl EffectQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `effect` for the next flush.
    pub fn schedule(&self, effect: impl FnOnce() + 'static) {
        self.pending.borrow_mut().push_back(Box::new(effect));
    }

    /// Run queued effects in order, including any scheduled while flushing.
    ///
    /// Returns the number of effects run.
    pub fn flush(&self) -> usize {
        let mut ran = 0;
        loop {
            let next = self.pending.borrow_mut().pop_front();
            match next {
                Some(effect) => {
                    effect();
                    ran += 1;
                }
                None => return ran,
            }
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.borrow().is_empty()
    }
}

impl fmt::Debug for EffectQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectQueue")
            .field("pending", &self.len())
            .finish()
    }
}

/// When an effect runs relative to the mutation that triggered it.
#[derive(Clone, Debug, Default)]
pub enum EffectTiming {
    /// Run synchronously, inside the triggering call.
    #[default]
    Immediate,
    /// Queue on the given queue; runs on [`EffectQueue::flush`].
    Deferred(EffectQueue),
}

impl EffectTiming {
    /// Immediate when a document is present, deferred onto `queue` otherwise.
    #[must_use]
    pub fn for_context(has_document: bool, queue: &EffectQueue) -> Self {
        if has_document {
            Self::Immediate
        } else {
            Self::Deferred(queue.clone())
        }
    }

    pub fn run(&self, effect: impl FnOnce() + 'static) {
        match self {
            Self::Immediate => effect(),
            Self::Deferred(queue) => queue.schedule(effect),
        }
    }

    #[must_use]
    pub fn is_deferred(&self) -> bool {
        matches!(self, Self::Deferred(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn immediate_runs_inline() {
        let hit = Rc::new(Cell::new(false));
        let h = Rc::clone(&hit);
        EffectTiming::Immediate.run(move || h.set(true));
        assert!(hit.get());
    }

    #[test]
    fn deferred_waits_for_flush() {
        let queue = EffectQueue::new();
        let timing = EffectTiming::Deferred(queue.clone());
        let hit = Rc::new(Cell::new(0));
        let h = Rc::clone(&hit);
        timing.run(move || h.set(h.get() + 1));
        assert_eq!(hit.get(), 0);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.flush(), 1);
        assert_eq!(hit.get(), 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn flush_drains_effects_scheduled_during_flush() {
        let queue = EffectQueue::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        let q = queue.clone();
        let o = Rc::clone(&order);
        queue.schedule(move || {
            o.borrow_mut().push(1);
            let o2 = Rc::clone(&o);
            q.schedule(move || o2.borrow_mut().push(2));
        });
        assert_eq!(queue.flush(), 2);
        assert_eq!(*order.borrow(), vec![1, 2]);
    }

    #[test]
    fn for_context_picks_strategy() {
        let queue = EffectQueue::new();
        assert!(!EffectTiming::for_context(true, &queue).is_deferred());
        assert!(EffectTiming::for_context(false, &queue).is_deferred());
    }
}

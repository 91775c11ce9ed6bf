#![forbid(unsafe_code)]

//! Reactive building blocks for tabsync.
//!
//! - [`Observable`]: a shared, version-tracked value with change callbacks.
//! - [`Subscription`]: RAII guard that unsubscribes on drop.
//! - [`BindingScope`]: holds a component's subscriptions and releases them
//!   together.
//! - [`EffectTiming`] / [`EffectQueue`]: run an effect now or defer it to the
//!   caller's rendering phase.
//! - [`FreshRef`]: a slot that always holds the latest committed value.
//! - [`CycleToggle`]: step through a fixed list of states.
//!
//! Everything here is single-threaded (`Rc<RefCell<..>>`).

pub mod effect;
pub mod fresh;
pub mod observable;
pub mod scope;
pub mod toggle;

pub use effect::{EffectQueue, EffectTiming};
pub use fresh::FreshRef;
pub use observable::{Observable, Subscription};
pub use scope::BindingScope;
pub use toggle::CycleToggle;

//! Callback plumbing: the pending-notifier list and the one-sided
//! value/termination AND-gate.

use core::cell::RefCell;
use derive_more::Debug;
use std::collections::VecDeque;
use tracing::debug;

/// Ordered list of pending callbacks, each taking a reference to `A`.
///
/// Callbacks are invoked in insertion order and each exactly once.
#[must_use]
#[derive(Debug)]
pub struct NotifierList<A: ?Sized> {
    #[debug("{} pending", entries.len())]
    entries: VecDeque<Box<dyn FnOnce(&A)>>,
}

impl<A: ?Sized> NotifierList<A> {
    /// Empty list.
    pub fn new() -> Self {
        Self {
            entries: VecDeque::new(),
        }
    }

    /// Append a callback.
    pub fn push_back(&mut self, notifier: impl FnOnce(&A) + 'static) {
        self.entries.push_back(Box::new(notifier));
    }

    /// Number of pending callbacks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` if nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Detach the oldest pending callback.
    ///
    /// Lets an owner that keeps the list behind a `RefCell` invoke callbacks
    /// one at a time without holding the borrow across the call.
    pub fn pop_front(&mut self) -> Option<Box<dyn FnOnce(&A)>> {
        self.entries.pop_front()
    }

    /// Invoke every pending callback with `arg` and leave the list empty.
    pub fn flush(&mut self, arg: &A) {
        while let Some(notifier) = self.entries.pop_front() {
            notifier(arg);
        }
    }
}

impl<A: ?Sized> Default for NotifierList<A> {
    fn default() -> Self {
        Self::new()
    }
}

/// Where the value handed to a [`OneSidedWaitTdNotifier`] comes from.
#[derive(Debug)]
pub enum PendingValue<T> {
    /// A copy taken when the value was produced.
    Copied(T),
    /// A move out of the producer's storage, performed only when the
    /// notifier fires.
    Steal(#[debug(skip)] Box<dyn FnOnce() -> T>),
}

impl<T> PendingValue<T> {
    fn take(self) -> (T, bool) {
        match self {
            Self::Copied(value) => (value, false),
            Self::Steal(steal) => (steal(), true),
        }
    }
}

#[derive(Debug)]
enum GateState<T> {
    BothWaiting,
    WaitingForTd(PendingValue<T>),
    Fired,
}

/// Joins "the value of this location was produced" and "termination of the
/// computation instance was detected" into one notification of the parent.
///
/// Notifying the parent on dataflow alone would let the parent detect its own
/// termination and be torn down before this child; teardown must be bottom
/// up. The value must be set before termination is detected, since detection
/// only succeeds once all dataflow is accounted for.
#[derive(Debug)]
pub struct OneSidedWaitTdNotifier<T> {
    state: RefCell<GateState<T>>,
    #[debug(skip)]
    notifier: RefCell<Option<Box<dyn FnOnce(T)>>>,
}

impl<T> OneSidedWaitTdNotifier<T> {
    /// Gate that calls `notifier` once both signals arrived.
    pub fn new(notifier: impl FnOnce(T) + 'static) -> Self {
        Self {
            state: RefCell::new(GateState::BothWaiting),
            notifier: RefCell::new(Some(Box::new(notifier))),
        }
    }

    /// Record the produced value.
    ///
    /// # Panics
    /// If a value was already set or the gate already fired.
    pub fn set_value(&self, value: PendingValue<T>) {
        let mut state = self.state.borrow_mut();
        match &*state {
            GateState::BothWaiting => {}
            GateState::WaitingForTd(_) => {
                panic!("OneSidedWaitTdNotifier::set_value: value set twice")
            }
            GateState::Fired => panic!("OneSidedWaitTdNotifier::set_value: already fired"),
        }
        *state = GateState::WaitingForTd(value);
    }

    /// Record that termination was detected and fire.
    ///
    /// # Panics
    /// If the value was not set yet or the gate already fired.
    pub fn notify_td(&self) {
        let previous = self.state.replace(GateState::Fired);
        let value = match previous {
            GateState::WaitingForTd(value) => value,
            GateState::BothWaiting => panic!("data flow not available and TD succeeded"),
            GateState::Fired => panic!("OneSidedWaitTdNotifier::notify_td: already fired"),
        };
        let notifier = self
            .notifier
            .borrow_mut()
            .take()
            .expect("OneSidedWaitTdNotifier::notify_td: [1]");
        let (value, stolen) = value.take();
        debug!(stolen, "one-sided result notifier fired");
        notifier(value);
    }

    /// `true` once the parent was notified.
    #[must_use]
    pub fn fired(&self) -> bool {
        matches!(*self.state.borrow(), GateState::Fired)
    }

    /// `true` while a value is held waiting for termination detection.
    #[must_use]
    pub fn value_set(&self) -> bool {
        matches!(*self.state.borrow(), GateState::WaitingForTd(_))
    }
}

/// Void counterpart of [`OneSidedWaitTdNotifier`]: there is no dataflow to
/// wait for, so the notification hangs directly off termination detection.
#[derive(Debug)]
pub struct VoidWaitTdNotifier {
    #[debug("{}", if notifier.borrow().is_some() { "armed" } else { "fired" })]
    notifier: RefCell<Option<Box<dyn FnOnce()>>>,
}

impl VoidWaitTdNotifier {
    /// Gate that calls `notifier` when termination is detected.
    pub fn new(notifier: impl FnOnce() + 'static) -> Self {
        Self {
            notifier: RefCell::new(Some(Box::new(notifier))),
        }
    }

    /// Record that termination was detected and fire.
    ///
    /// # Panics
    /// If the gate already fired.
    pub fn notify_td(&self) {
        let notifier = self
            .notifier
            .borrow_mut()
            .take()
            .expect("VoidWaitTdNotifier::notify_td: already fired");
        debug!("one-sided void notifier fired");
        notifier();
    }

    /// `true` once the parent was notified.
    #[must_use]
    pub fn fired(&self) -> bool {
        self.notifier.borrow().is_none()
    }
}

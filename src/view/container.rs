use crate::{
    edge::ConsumerEdges,
    graph::TaskGraph,
    notifier::NotifierList,
    rmi::Location,
    types::{ConsumerHandle, Handle, Index, IndexMap, IndexSet},
};
use core::{
    cell::{Cell, Ref, RefCell},
    mem,
};
use derive_more::Debug;
use rustc_hash::FxBuildHasher;
use std::rc::Rc;
use tracing::{debug, trace, warn};

/// One location's produced value, buffered until every consumer has it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueEntry<T> {
    index: Index,
    value: T,
}

impl<T> ValueEntry<T> {
    const fn new(index: Index, value: T) -> Self {
        Self { index, value }
    }

    /// Index (producing location) of the value.
    #[must_use]
    pub const fn index(&self) -> Index {
        self.index
    }

    /// The buffered value.
    #[must_use]
    pub const fn value(&self) -> &T {
        &self.value
    }
}

/// Retirement state of a [`ResultContainer`].
///
/// Retirement may be requested while a notification flush iterates the
/// container; it then waits until the last hold is released.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Lifecycle {
    /// Live, no flush in progress.
    Active,
    /// `holds` flushes in progress.
    Held {
        /// Number of nested holds.
        holds: usize,
    },
    /// Retirement requested during a flush; happens when the last hold ends.
    Orphaned {
        /// Number of nested holds.
        holds: usize,
    },
    /// Retired: unregistered, buffer and pending notifiers released.
    Retired,
}

/// Per-location storage of a computation instance's result.
///
/// Its lifetime is not tied to the computation instance: it lives as long as
/// the result is referenced by [`ResultView`](super::ResultView)s, which may be
/// plugged into consumers created long after the producer finished.
///
/// Consumers find the container through the object directory of its location
/// (see [`handle`](Self::handle)) and register with
/// [`request_flow`](Self::request_flow).
#[derive(Debug)]
pub struct ResultContainer<T> {
    location: Location,
    handle: Handle,
    #[debug(skip)]
    graph: Rc<dyn TaskGraph>,
    successor_count: usize,
    is_one_sided: bool,
    /// Number of `request_flow` calls on the stack.
    flow_depth: Cell<usize>,
    state: RefCell<ContainerState<T>>,
}

#[derive(Debug)]
struct ContainerState<T> {
    /// Views outside any consumer that may still be plugged into one.
    plug_ref_count: usize,
    /// Views held inside consumers or internal tasks.
    tg_ref_count: usize,
    consumers: Vec<ConsumerHandle>,
    values: Vec<ValueEntry<T>>,
    /// Every index `receive_value` was called for, buffered or not.
    received: IndexSet<Index>,
    notifiers: IndexMap<Index, NotifierList<T>>,
    pg_complete: bool,
    lifecycle: Lifecycle,
}

struct FlowDepth<'a>(&'a Cell<usize>);

impl<'a> FlowDepth<'a> {
    fn enter(depth: &'a Cell<usize>) -> Self {
        depth.set(depth.get() + 1);
        Self(depth)
    }

    fn is_outermost(&self) -> bool {
        self.0.get() == 1
    }
}

impl Drop for FlowDepth<'_> {
    fn drop(&mut self) {
        self.0.set(self.0.get() - 1);
    }
}

/// Defers retirement of the container for its scope.
struct Hold<'a, T>(&'a ResultContainer<T>);

impl<'a, T> Hold<'a, T> {
    fn new(container: &'a ResultContainer<T>) -> Self {
        container.start_hold();
        Self(container)
    }
}

impl<T> Drop for Hold<'_, T> {
    fn drop(&mut self) {
        self.0.stop_hold();
    }
}

impl<T: Clone + 'static> ResultContainer<T> {
    /// Create the container and register it on the graph's location.
    ///
    /// The plug count starts at one, accounting for the view that is about to
    /// own the container.
    pub(super) fn create(is_one_sided: bool, graph: Rc<dyn TaskGraph>) -> Rc<Self> {
        let location = graph.location().clone();
        let handle = location.runtime().allocate_handle();
        let container = Rc::new(Self {
            successor_count: graph.num_successors(),
            location,
            handle,
            graph,
            is_one_sided,
            flow_depth: Cell::new(0),
            state: RefCell::new(ContainerState {
                plug_ref_count: 1,
                tg_ref_count: 0,
                consumers: Vec::new(),
                values: Vec::new(),
                received: IndexSet::with_hasher(FxBuildHasher),
                notifiers: IndexMap::with_hasher(FxBuildHasher),
                pg_complete: false,
                lifecycle: Lifecycle::Active,
            }),
        });
        container.location.register_at(handle, container.clone());
        debug!(
            location = container.location.id(),
            %handle,
            successors = container.successor_count,
            one_sided = is_one_sided,
            "result container created"
        );
        container
    }

    /// Receive this location's value from the result task.
    ///
    /// Every consumer known so far gets the value immediately. Unless the
    /// container is one-sided and all consumers are known, the value is also
    /// buffered for the consumers still to come. Continuations registered
    /// through [`request_notify`](Self::request_notify) then run.
    ///
    /// # Panics
    /// If a value for `index` was already received.
    pub fn receive_value(&self, index: Index, value: &T) {
        if self.is_retired() {
            debug!(handle = %self.handle, index, "value for a retired result container dropped");
            return;
        }
        let first = self.state.borrow_mut().received.insert(index);
        assert!(
            first,
            "ResultContainer::receive_value: value for index {index} set twice"
        );
        let _hold = Hold::new(self);

        // Consumers may register while values are in flight; keep iterating
        // until the ones added meanwhile are served too.
        let mut position = 0;
        while let Some(consumer) = self.consumer_at(position) {
            self.flow(consumer, index, value.clone());
            position += 1;
        }

        if self.is_one_sided && self.consumer_count() == self.successor_count {
            trace!(handle = %self.handle, index, "all consumers known, value not buffered");
        } else {
            trace!(handle = %self.handle, index, "value buffered");
            self.state
                .borrow_mut()
                .values
                .push(ValueEntry::new(index, value.clone()));
        }

        let notifiers = self.state.borrow_mut().notifiers.shift_remove(&index);
        if let Some(mut notifiers) = notifiers {
            notifiers.flush(value);
        }
    }

    /// Register a consumer and forward the buffered values to it.
    ///
    /// Once the last expected consumer is known, the outermost call on the
    /// stack frees the buffer (one-sided containers) and pulses termination
    /// detection, which may have been waiting on this registration.
    ///
    /// # Panics
    /// If all `successor_count` consumers are already known.
    pub fn request_flow(&self, consumer: ConsumerHandle) {
        assert!(
            !self.is_retired(),
            "ResultContainer::request_flow: container {} is retired",
            self.handle
        );
        let depth = FlowDepth::enter(&self.flow_depth);
        let _hold = Hold::new(self);
        let buffered = {
            let mut state = self.state.borrow_mut();
            assert!(
                state.consumers.len() < self.successor_count,
                "ResultContainer::request_flow: invalid successor count specification \
                 ({} consumers of {} expected already known)",
                state.consumers.len(),
                self.successor_count
            );
            state.consumers.push(consumer);
            state.values.len()
        };
        debug!(
            handle = %self.handle,
            %consumer,
            consumers = self.consumer_count(),
            successors = self.successor_count,
            buffered,
            "flow requested"
        );

        // Values buffered after this point already reached the consumer
        // through `receive_value`.
        for position in 0..buffered {
            let Some(entry) = self.buffered_at(position) else {
                break;
            };
            self.flow(consumer, entry.index, entry.value);
        }

        if self.consumer_count() == self.successor_count && depth.is_outermost() {
            if self.is_one_sided {
                self.erase_values();
            }
            debug!(handle = %self.handle, "all consumers known, pulsing terminator");
            self.graph.pulse_terminator();
        }
    }

    /// Run `notifier` with the value of `index` as soon as it is available:
    /// now if it is buffered, otherwise when `receive_value` delivers it.
    ///
    /// # Panics
    /// If the container is retired, or the value of `index` was already
    /// received but is no longer buffered (it went straight to the consumers,
    /// or the buffer was freed once all of them were known).
    pub fn request_notify(&self, index: Index, notifier: impl FnOnce(&T) + 'static) {
        assert!(
            !self.is_retired(),
            "ResultContainer::request_notify: container {} is retired",
            self.handle
        );
        if self.available(index) {
            let value = self.get_element(index);
            let _hold = Hold::new(self);
            notifier(&value);
            return;
        }
        let mut state = self.state.borrow_mut();
        assert!(
            !state.received.contains(&index),
            "ResultContainer::request_notify: value {index} was received and is no longer readable"
        );
        state.notifiers.entry(index).or_default().push_back(notifier);
    }

    /// Copy of the buffered value of `index`.
    ///
    /// # Panics
    /// If no value is buffered for `index`.
    #[must_use]
    pub fn get_element(&self, index: Index) -> T {
        self.get_reference(index).clone()
    }

    /// Result of `f` applied to the buffered value of `index`.
    ///
    /// # Panics
    /// If no value is buffered for `index`.
    pub fn apply_get<R>(&self, index: Index, f: impl FnOnce(&T) -> R) -> R {
        let value = self.get_element(index);
        f(&value)
    }

    fn flow(&self, consumer: ConsumerHandle, index: Index, value: T) {
        let dest = self.location.id();
        let target = consumer.handle();
        // Tell the consumer this location is the producer of `index`; a
        // persistent computation instance did so on its first invocation.
        if !self.graph.called_before() {
            self.location
                .async_rmi::<dyn ConsumerEdges<T>, _>(dest, target, move |edges| {
                    edges.add_producer(index);
                });
        }
        self.location
            .async_rmi::<dyn ConsumerEdges<T>, _>(dest, target, move |edges| {
                edges.set_element(index, value);
            });
    }

    fn buffered_at(&self, position: usize) -> Option<ValueEntry<T>> {
        self.state.borrow().values.get(position).cloned()
    }
}

impl<T> ResultContainer<T> {
    /// Borrow the buffered value of `index`.
    ///
    /// The borrow must end before anything can reach the container again.
    ///
    /// # Panics
    /// If no value is buffered for `index`.
    pub fn get_reference(&self, index: Index) -> Ref<'_, T> {
        Ref::map(self.state.borrow(), |state| {
            &state
                .values
                .iter()
                .find(|entry| entry.index == index)
                .unwrap_or_else(|| {
                    panic!("ResultContainer::get_reference: out value {index} not set")
                })
                .value
        })
    }

    /// Is a value for `index` buffered.
    #[must_use]
    pub fn available(&self, index: Index) -> bool {
        self.state
            .borrow()
            .values
            .iter()
            .any(|entry| entry.index == index)
    }

    /// Has global termination of the computation instance been observed.
    #[must_use]
    pub fn available_all(&self) -> bool {
        self.state.borrow().pg_complete
    }

    /// Record that termination of the computation instance was detected.
    pub fn notify_td(&self) {
        self.state.borrow_mut().pg_complete = true;
    }

    /// Prepare for another invocation of a persistent computation instance:
    /// forget the completion and the values of the previous one.
    pub fn reset(&self) {
        let values = {
            let mut state = self.state.borrow_mut();
            state.pg_complete = false;
            state.received.clear();
            mem::take(&mut state.values)
        };
        trace!(handle = %self.handle, dropped = values.len(), "result container reset");
    }

    /// Are consumers still expected to register.
    #[must_use]
    pub fn has_outstanding_consumers(&self) -> bool {
        self.consumer_count() < self.successor_count
    }

    /// Account for a new view of the container.
    pub fn increment_ref_count(&self, is_plug: bool, is_transitioned: bool) {
        let mut state = self.state.borrow_mut();
        if is_plug {
            state.plug_ref_count += 1;
        } else {
            state.tg_ref_count += 1;
        }
        trace!(
            handle = %self.handle,
            is_plug,
            is_transitioned,
            plug = state.plug_ref_count,
            tg = state.tg_ref_count,
            "result view reference added"
        );
    }

    /// Release a view of the container and return the combined number of
    /// views left. The caller retires the container (see
    /// [`try_delete`](Self::try_delete)) when this reaches zero.
    ///
    /// # Panics
    /// If the pool of `is_plug` is already empty.
    pub fn decrement_ref_count(&self, is_plug: bool) -> usize {
        let mut state = self.state.borrow_mut();
        let pool = if is_plug {
            &mut state.plug_ref_count
        } else {
            &mut state.tg_ref_count
        };
        *pool = pool
            .checked_sub(1)
            .expect("ResultContainer::decrement_ref_count: negative reference count");
        trace!(
            handle = %self.handle,
            is_plug,
            plug = state.plug_ref_count,
            tg = state.tg_ref_count,
            "result view reference released"
        );
        state.plug_ref_count + state.tg_ref_count
    }

    /// Retire the container, or mark it orphaned if a flush holds it.
    ///
    /// # Panics
    /// If the container is already retired.
    pub fn try_delete(&self) {
        let lifecycle = {
            let mut state = self.state.borrow_mut();
            state.lifecycle = match state.lifecycle {
                Lifecycle::Active => Lifecycle::Retired,
                Lifecycle::Held { holds } | Lifecycle::Orphaned { holds } => {
                    Lifecycle::Orphaned { holds }
                }
                Lifecycle::Retired => {
                    panic!("ResultContainer::try_delete: {} retired twice", self.handle)
                }
            };
            state.lifecycle
        };
        if lifecycle == Lifecycle::Retired {
            self.retire();
        } else {
            trace!(handle = %self.handle, "retirement deferred until flush completes");
        }
    }

    /// Delay retirement until the matching [`stop_hold`](Self::stop_hold).
    ///
    /// # Panics
    /// If the container is retired.
    pub fn start_hold(&self) {
        let mut state = self.state.borrow_mut();
        state.lifecycle = match state.lifecycle {
            Lifecycle::Active => Lifecycle::Held { holds: 1 },
            Lifecycle::Held { holds } => Lifecycle::Held { holds: holds + 1 },
            Lifecycle::Orphaned { holds } => Lifecycle::Orphaned { holds: holds + 1 },
            Lifecycle::Retired => {
                panic!("ResultContainer::start_hold: {} is retired", self.handle)
            }
        };
    }

    /// Release a hold; retire the container if it was orphaned meanwhile and
    /// this was the last hold.
    ///
    /// # Panics
    /// If no hold is active.
    pub fn stop_hold(&self) {
        let lifecycle = {
            let mut state = self.state.borrow_mut();
            state.lifecycle = match state.lifecycle {
                Lifecycle::Held { holds: 1 } => Lifecycle::Active,
                Lifecycle::Held { holds } => Lifecycle::Held { holds: holds - 1 },
                Lifecycle::Orphaned { holds: 1 } => Lifecycle::Retired,
                Lifecycle::Orphaned { holds } => Lifecycle::Orphaned { holds: holds - 1 },
                Lifecycle::Active | Lifecycle::Retired => {
                    panic!("ResultContainer::stop_hold: {} is not held", self.handle)
                }
            };
            state.lifecycle
        };
        if lifecycle == Lifecycle::Retired {
            self.retire();
        }
    }

    fn retire(&self) {
        let (values, notifiers, received) = {
            let mut state = self.state.borrow_mut();
            debug_assert_eq!(state.lifecycle, Lifecycle::Retired, "ResultContainer::retire: [1]");
            (
                mem::take(&mut state.values),
                mem::take(&mut state.notifiers),
                state.received.len(),
            )
        };
        if !self.is_one_sided && received == 0 {
            warn!(handle = %self.handle, "result container retired without a value");
        }
        let unregistered = self.location.unregister(self.handle);
        assert!(unregistered, "ResultContainer::retire: [2]");
        debug!(
            location = self.location.id(),
            handle = %self.handle,
            dropped_values = values.len(),
            dropped_notifiers = notifiers.len(),
            "result container retired"
        );
    }

    fn erase_values(&self) {
        let values = mem::take(&mut self.state.borrow_mut().values);
        trace!(handle = %self.handle, erased = values.len(), "value buffer freed");
    }

    fn consumer_at(&self, position: usize) -> Option<ConsumerHandle> {
        self.state.borrow().consumers.get(position).copied()
    }

    /// Object-directory handle consumers address `request_flow` to.
    #[must_use]
    pub const fn handle(&self) -> Handle {
        self.handle
    }

    pub(super) const fn location(&self) -> &Location {
        &self.location
    }

    /// Number of consumers expected.
    #[must_use]
    pub const fn successor_count(&self) -> usize {
        self.successor_count
    }

    /// Number of consumers registered so far.
    #[must_use]
    pub fn consumer_count(&self) -> usize {
        self.state.borrow().consumers.len()
    }

    /// Number of buffered values.
    #[must_use]
    pub fn buffered_len(&self) -> usize {
        self.state.borrow().values.len()
    }

    /// Was the container created for a one-sided computation instance.
    #[must_use]
    pub const fn is_one_sided(&self) -> bool {
        self.is_one_sided
    }

    /// Current retirement state.
    #[must_use]
    pub fn lifecycle(&self) -> Lifecycle {
        self.state.borrow().lifecycle
    }

    /// Has the container been retired.
    #[must_use]
    pub fn is_retired(&self) -> bool {
        self.lifecycle() == Lifecycle::Retired
    }

    /// `(plug, tg)` reference counts.
    #[must_use]
    pub fn ref_counts(&self) -> (usize, usize) {
        let state = self.state.borrow();
        (state.plug_ref_count, state.tg_ref_count)
    }
}

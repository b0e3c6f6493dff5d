//! Per-computation-instance setup of result storage and of the notification
//! flow from the result task to the container and to the parent.
//!
//! Three variants, chosen at the type level:
//! - [`ScalarResultManager`]: a typed result, one value per location.
//! - [`SpannedResultManager`]: a typed result of an instance spanning every
//!   location of its context; persistent across repeated invocations.
//! - [`VoidResultManager`]: no result value at all.

use crate::{
    edge::{EdgeInfoHolder, EdgeStorage},
    graph::{CompletionSink, TaskGraph, VoidCompletionSink},
    notifier::{OneSidedWaitTdNotifier, PendingValue, VoidWaitTdNotifier},
    types::{Index, TaskId},
    view::{ResultAccessor, ResultView},
};
use core::cell::RefCell;
use derive_more::Debug;
use std::rc::Rc;
use tracing::debug;

/// The closed set of result-manager variants.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ResultKind {
    /// Typed result of a non-spanned computation instance.
    Scalar,
    /// Typed result of a spanned (collective, persistent) instance.
    Spanned,
    /// No result value.
    Void,
}

/// Sets up the result of one computation instance on one location.
///
/// Call order: [`apply`](Self::apply), then
/// [`set_result_impl`](Self::set_result_impl) for the designated result task,
/// then, for one-sided instances,
/// [`set_os_result_notifier`](Self::set_os_result_notifier), whose returned
/// notifier must be told when termination is detected.
pub trait ResultManager {
    /// Value type flowing on the result task's edge.
    type Edge;
    /// What [`apply`](Self::apply) hands back to the caller.
    type Result;
    /// What leaves the computation instance.
    type Final;
    /// Notifier tying the parent's notification to termination detection.
    type Notifier;
    /// Variant of this manager.
    const KIND: ResultKind;

    /// Create the result storage for `graph` on its location.
    fn apply(&mut self, graph: &Rc<dyn TaskGraph>, one_sided: bool) -> Self::Result;

    /// Designate `task_id` as the task producing the value of `index`.
    fn set_result_impl(
        &mut self,
        index: Index,
        task_id: TaskId,
        graph: &Rc<dyn TaskGraph>,
        edges: &dyn EdgeStorage<Self::Edge>,
    );

    /// Tie the notification of the parent to termination detection of this
    /// computation instance.
    fn set_os_result_notifier(
        &mut self,
        graph: &Rc<dyn TaskGraph>,
        result: &Self::Result,
    ) -> Rc<Self::Notifier>;

    /// Transform the result on its way out of the computation instance.
    fn finalize_result(&self, result: Self::Result) -> Self::Final;

    /// Are consumers of the result still expected to register.
    fn has_outstanding_consumers(&self) -> bool;

    /// Prepare for another invocation of a persistent computation instance.
    fn reset(&mut self);

    /// Variant of this manager.
    fn kind(&self) -> ResultKind {
        Self::KIND
    }
}

/// Send `call` to the parent of `graph`, from location 0 only.
///
/// # Panics
/// If the parent handle does not resolve to an `S` on this location.
fn notify_parent<S>(graph: &dyn TaskGraph, call: impl FnOnce(&S) + 'static)
where
    S: ?Sized + 'static,
{
    let location = graph.location();
    if location.id() != 0 {
        return;
    }
    let parent = graph.parent_handle();
    assert!(
        location.resolve::<S>(parent).is_some(),
        "Failed parent pg handle resolution ({parent})"
    );
    debug!(task_id = graph.task_id().get(), %parent, "notifying parent");
    location.async_rmi::<S, _>(graph.parent_location(), parent, call);
}

type ResultNotifier<T> = Rc<dyn Fn(Index, &T)>;

/// Result manager of a non-spanned computation instance with a typed result.
#[derive(Debug)]
pub struct ScalarResultManager<T> {
    /// Called when the result task of this location finishes.
    #[debug("{}", if result_notifier.borrow().is_some() { "installed" } else { "unset" })]
    result_notifier: Rc<RefCell<Option<ResultNotifier<T>>>>,
    /// Internal edge serving the outgoing edge, for moving the value out on
    /// exit.
    out_edge_info: Rc<RefCell<EdgeInfoHolder<T>>>,
}

impl<T> ScalarResultManager<T> {
    /// Manager with nothing set up yet.
    #[must_use]
    pub fn new() -> Self {
        Self {
            result_notifier: Rc::new(RefCell::new(None)),
            out_edge_info: Rc::new(RefCell::new(EdgeInfoHolder::new())),
        }
    }

    fn install(&self, notifier: impl Fn(Index, &T) + 'static) {
        *self.result_notifier.borrow_mut() = Some(Rc::new(notifier));
    }
}

impl<T> Default for ScalarResultManager<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + 'static> ResultManager for ScalarResultManager<T> {
    type Edge = T;
    type Result = ResultAccessor<T>;
    type Final = ResultAccessor<T>;
    type Notifier = OneSidedWaitTdNotifier<T>;
    const KIND: ResultKind = ResultKind::Scalar;

    fn apply(&mut self, graph: &Rc<dyn TaskGraph>, one_sided: bool) -> ResultAccessor<T> {
        let view = ResultView::new(one_sided, graph.clone());
        if !one_sided {
            let container = view.container().clone();
            self.install(move |index, value: &T| container.receive_value(index, value));
        }
        view.into_accessor(graph.location().id() as Index)
    }

    fn set_result_impl(
        &mut self,
        _index: Index,
        task_id: TaskId,
        graph: &Rc<dyn TaskGraph>,
        edges: &dyn EdgeStorage<T>,
    ) {
        graph.count_task();
        let result_notifier = self.result_notifier.clone();
        let tg = graph.clone();
        let edge_info = edges.set_result(
            task_id,
            Box::new(move |value: &T| {
                let notifier = result_notifier
                    .borrow()
                    .clone()
                    .expect("ScalarResultManager: result notifier not installed");
                notifier(tg.location().id() as Index, value);
                tg.result_processed();
            }),
        );
        self.out_edge_info.borrow_mut().set(edge_info);
    }

    /// The parent receives the value once both the value and termination are
    /// in. If no other local reader needs the value and it is stored inline,
    /// it is moved out of the producer's storage, and only when the notifier
    /// fires: after termination detection all local readers have completed.
    fn set_os_result_notifier(
        &mut self,
        graph: &Rc<dyn TaskGraph>,
        _result: &ResultAccessor<T>,
    ) -> Rc<OneSidedWaitTdNotifier<T>> {
        let tg = graph.clone();
        let gate = Rc::new(OneSidedWaitTdNotifier::new(move |value: T| {
            let (task_id, has_successors) = (tg.task_id(), tg.has_successors());
            notify_parent::<dyn CompletionSink<T>>(&*tg, move |parent| {
                parent.processed_remote(task_id, has_successors, value);
            });
        }));

        let out_edge_info = self.out_edge_info.clone();
        let value_gate = gate.clone();
        self.install(move |_index, value: &T| {
            let pending = {
                let holder = out_edge_info.borrow();
                if holder.stealable() {
                    let storage = holder.version_storage().clone();
                    PendingValue::Steal(Box::new(move || storage.steal()))
                } else {
                    PendingValue::Copied(value.clone())
                }
            };
            value_gate.set_value(pending);
        });
        gate
    }

    fn finalize_result(&self, result: ResultAccessor<T>) -> ResultAccessor<T> {
        result
    }

    fn has_outstanding_consumers(&self) -> bool {
        false
    }

    fn reset(&mut self) {}
}

/// Result manager of a spanned computation instance.
///
/// The instance may be invoked repeatedly; every invocation after the first
/// reuses the view (and container) created by the first.
#[derive(Debug)]
pub struct SpannedResultManager<T> {
    result: ResultView<T>,
}

impl<T> SpannedResultManager<T> {
    /// Manager with nothing set up yet.
    pub const fn new() -> Self {
        Self {
            result: ResultView::null(),
        }
    }

    /// The view created by the first [`apply`](ResultManager::apply).
    pub const fn result(&self) -> &ResultView<T> {
        &self.result
    }
}

impl<T> Default for SpannedResultManager<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + 'static> ResultManager for SpannedResultManager<T> {
    type Edge = T;
    type Result = ResultView<T>;
    type Final = ResultView<T>;
    type Notifier = VoidWaitTdNotifier;
    const KIND: ResultKind = ResultKind::Spanned;

    /// Values held by user code through the returned view are invalidated by
    /// the next invocation (see [`reset`](ResultManager::reset)).
    ///
    /// # Panics
    /// On a first invocation that is not one-sided.
    fn apply(&mut self, graph: &Rc<dyn TaskGraph>, one_sided: bool) -> ResultView<T> {
        if graph.called_before() {
            assert!(
                !self.result.is_null(),
                "SpannedResultManager::apply: repeated invocation without a first one"
            );
            return self.result.clone();
        }
        assert!(
            one_sided,
            "SpannedResultManager::apply: collective port-based paragraphs are not supported"
        );
        let view = ResultView::new(one_sided, graph.clone());

        // Notifications from the edge storage are unordered: termination
        // detection of the graph may otherwise delete it before the result
        // callback below has called `result_processed`.
        graph.start_hold();

        self.result.clone_from(&view);
        view
    }

    fn set_result_impl(
        &mut self,
        index: Index,
        task_id: TaskId,
        graph: &Rc<dyn TaskGraph>,
        edges: &dyn EdgeStorage<T>,
    ) {
        graph.count_task();
        let container = self.result.container().clone();
        let tg = graph.clone();
        let _ = edges.set_result(
            task_id,
            Box::new(move |value: &T| {
                container.receive_value(index, value);
                tg.result_processed();
            }),
        );
    }

    /// Consumers receive the value point to point and its flow is accounted
    /// for by global termination detection, so the parent is notified on
    /// termination alone, and told there are no successors to serve.
    fn set_os_result_notifier(
        &mut self,
        graph: &Rc<dyn TaskGraph>,
        result: &ResultView<T>,
    ) -> Rc<VoidWaitTdNotifier> {
        let view = result.clone();
        let tg = graph.clone();
        Rc::new(VoidWaitTdNotifier::new(move || {
            view.container().notify_td();
            let task_id = tg.task_id();
            notify_parent::<dyn VoidCompletionSink>(&*tg, move |parent| {
                parent.processed_remote_void(task_id, false);
            });
        }))
    }

    fn finalize_result(&self, result: ResultView<T>) -> ResultView<T> {
        result
    }

    fn has_outstanding_consumers(&self) -> bool {
        self.result.container().has_outstanding_consumers()
    }

    fn reset(&mut self) {
        self.result.container().reset();
    }
}

/// Result manager of a computation instance without a result value.
///
/// The result task produces an integer placeholder that is discarded on exit.
#[derive(Debug, Default, Copy, Clone)]
pub struct VoidResultManager;

impl ResultManager for VoidResultManager {
    type Edge = ();
    type Result = usize;
    type Final = ();
    type Notifier = VoidWaitTdNotifier;
    const KIND: ResultKind = ResultKind::Void;

    fn apply(&mut self, _graph: &Rc<dyn TaskGraph>, _one_sided: bool) -> usize {
        0
    }

    /// # Panics
    /// Always: a void computation instance has no result task.
    fn set_result_impl(
        &mut self,
        _index: Index,
        _task_id: TaskId,
        _graph: &Rc<dyn TaskGraph>,
        _edges: &dyn EdgeStorage<()>,
    ) {
        panic!("VoidResultManager::set_result_impl: set result called on void return paragraph");
    }

    fn set_os_result_notifier(
        &mut self,
        graph: &Rc<dyn TaskGraph>,
        _result: &usize,
    ) -> Rc<VoidWaitTdNotifier> {
        let tg = graph.clone();
        Rc::new(VoidWaitTdNotifier::new(move || {
            let (task_id, has_successors) = (tg.task_id(), tg.has_successors());
            notify_parent::<dyn VoidCompletionSink>(&*tg, move |parent| {
                parent.processed_remote_void(task_id, has_successors);
            });
        }))
    }

    fn finalize_result(&self, _result: usize) {}

    fn has_outstanding_consumers(&self) -> bool {
        false
    }

    fn reset(&mut self) {}
}

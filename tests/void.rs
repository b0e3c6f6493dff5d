#![allow(missing_docs)]

mod common;

use common::{MockEdges, MockGraph, runtime, tid, void_parent};
use pgresult::{
    config::DeliveryMode,
    manager::{ResultKind, ResultManager, VoidResultManager},
};

#[test]
fn parent_is_notified_on_termination() {
    let rt = runtime(1, DeliveryMode::Deferred);
    let (parent, parent_handle) = void_parent(&rt.location(0));
    let graph = MockGraph::new(rt.location(0), 2, parent_handle);
    let tg = graph.dyn_graph();

    let mut manager = VoidResultManager;
    assert_eq!(manager.kind(), ResultKind::Void);
    let result = manager.apply(&tg, true);
    assert_eq!(result, 0);
    let gate = manager.set_os_result_notifier(&tg, &result);
    rt.run_until_idle().unwrap();
    assert!(parent.void.borrow().is_empty());

    gate.notify_td();
    assert!(gate.fired());
    rt.run_until_idle().unwrap();
    assert_eq!(*parent.void.borrow(), vec![(tid(3), true)]);
    manager.finalize_result(result);
    assert!(!manager.has_outstanding_consumers());
}

#[test]
#[should_panic(expected = "void return paragraph")]
fn void_result_has_no_result_task() {
    let rt = runtime(1, DeliveryMode::Deferred);
    let graph = MockGraph::new(rt.location(0), 0, rt.allocate_handle());
    let edges = MockEdges::<()>::new(false, true);
    VoidResultManager.set_result_impl(0, tid(1), &graph.dyn_graph(), &edges);
}

#[test]
#[should_panic(expected = "already fired")]
fn void_notifier_fires_once() {
    let rt = runtime(1, DeliveryMode::Eager);
    let (_parent, parent_handle) = void_parent(&rt.location(0));
    let graph = MockGraph::new(rt.location(0), 0, parent_handle);
    let gate = VoidResultManager.set_os_result_notifier(&graph.dyn_graph(), &0);
    gate.notify_td();
    gate.notify_td();
}

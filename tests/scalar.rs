#![allow(missing_docs)]

mod common;

use common::{MockEdges, MockGraph, runtime, tid, typed_parent};
use pgresult::{
    config::DeliveryMode,
    manager::{ResultKind, ResultManager, ScalarResultManager},
};

#[test]
fn parent_is_notified_once_value_and_termination_are_in() {
    let rt = runtime(1, DeliveryMode::Deferred);
    let loc = rt.location(0);
    let (parent, parent_handle) = typed_parent(&loc);
    let graph = MockGraph::new(loc, 1, parent_handle);
    let tg = graph.dyn_graph();
    let edges = MockEdges::<u32>::new(false, true);

    let mut manager = ScalarResultManager::<u32>::new();
    assert_eq!(manager.kind(), ResultKind::Scalar);
    let result = manager.apply(&tg, true);
    manager.set_result_impl(0, tid(1), &tg, &edges);
    assert_eq!(graph.counted.get(), 1);
    assert_eq!(edges.result_task.get(), Some(tid(1)));
    let gate = manager.set_os_result_notifier(&tg, &result);

    edges.complete(5);
    assert_eq!(graph.processed.get(), 1);
    assert!(gate.value_set());
    rt.run_until_idle().unwrap();
    assert!(parent.typed.borrow().is_empty());

    gate.notify_td();
    rt.run_until_idle().unwrap();
    assert_eq!(*parent.typed.borrow(), vec![(tid(3), true, 5)]);
    assert_eq!(edges.storage.steals.get(), 0);
    assert_eq!(edges.read(), Some(5));

    let result = manager.finalize_result(result);
    assert!(!result.is_null());
    assert!(!manager.has_outstanding_consumers());
}

#[test]
fn stealable_value_is_moved_out_only_after_termination() {
    let rt = runtime(1, DeliveryMode::Deferred);
    let loc = rt.location(0);
    let (parent, parent_handle) = typed_parent(&loc);
    let graph = MockGraph::new(loc, 0, parent_handle);
    let tg = graph.dyn_graph();
    let edges = MockEdges::<u32>::new(true, true);

    let mut manager = ScalarResultManager::<u32>::new();
    let result = manager.apply(&tg, true);
    manager.set_result_impl(0, tid(1), &tg, &edges);
    let gate = manager.set_os_result_notifier(&tg, &result);

    edges.complete(8);
    // Another local task may still read the value until termination.
    assert_eq!(edges.read(), Some(8));
    assert_eq!(edges.storage.steals.get(), 0);

    gate.notify_td();
    assert_eq!(edges.storage.steals.get(), 1);
    assert_eq!(edges.read(), None);
    rt.run_until_idle().unwrap();
    assert_eq!(*parent.typed.borrow(), vec![(tid(3), false, 8)]);
}

#[test]
fn indirect_storage_is_copied() {
    let rt = runtime(1, DeliveryMode::Eager);
    let loc = rt.location(0);
    let (parent, parent_handle) = typed_parent(&loc);
    let graph = MockGraph::new(loc, 0, parent_handle);
    let tg = graph.dyn_graph();
    let edges = MockEdges::<u32>::new(true, false);

    let mut manager = ScalarResultManager::<u32>::new();
    let result = manager.apply(&tg, true);
    manager.set_result_impl(0, tid(1), &tg, &edges);
    let gate = manager.set_os_result_notifier(&tg, &result);
    edges.complete(2);
    gate.notify_td();

    assert!(gate.fired());
    assert_eq!(edges.storage.steals.get(), 0);
    assert_eq!(*parent.typed.borrow(), vec![(tid(3), false, 2)]);
}

#[test]
fn only_location_zero_notifies_the_parent() {
    let rt = runtime(2, DeliveryMode::Deferred);
    let (parent, parent_handle) = typed_parent(&rt.location(0));
    let graph = MockGraph::new(rt.location(1), 0, parent_handle);
    let tg = graph.dyn_graph();
    let edges = MockEdges::<u32>::new(false, true);

    let mut manager = ScalarResultManager::<u32>::new();
    let result = manager.apply(&tg, true);
    assert_eq!(result.index(), 1);
    manager.set_result_impl(1, tid(1), &tg, &edges);
    let gate = manager.set_os_result_notifier(&tg, &result);
    edges.complete(4);
    let sent = rt.messages_sent();
    gate.notify_td();

    assert!(gate.fired());
    assert_eq!(rt.messages_sent(), sent);
    rt.run_until_idle().unwrap();
    assert!(parent.typed.borrow().is_empty());
}

#[test]
fn collective_result_is_stored_in_the_container() {
    let rt = runtime(2, DeliveryMode::Deferred);
    let parent_handle = rt.allocate_handle();
    let graph = MockGraph::new(rt.location(1), 0, parent_handle);
    let tg = graph.dyn_graph();
    let edges = MockEdges::<u32>::new(false, true);

    let mut manager = ScalarResultManager::<u32>::new();
    let result = manager.apply(&tg, false);
    manager.set_result_impl(1, tid(1), &tg, &edges);
    assert!(!result.available());

    edges.complete(9);
    assert!(result.available());
    assert_eq!(result.get(), 9);
    assert_eq!(result.view().container().buffered_len(), 1);
    assert_eq!(graph.processed.get(), 1);
}

#[test]
#[should_panic(expected = "data flow not available and TD succeeded")]
fn termination_before_value_is_fatal() {
    let rt = runtime(1, DeliveryMode::Deferred);
    let loc = rt.location(0);
    let (_parent, parent_handle) = typed_parent(&loc);
    let graph = MockGraph::new(loc, 0, parent_handle);
    let tg = graph.dyn_graph();
    let edges = MockEdges::<u32>::new(false, true);

    let mut manager = ScalarResultManager::<u32>::new();
    let result = manager.apply(&tg, true);
    manager.set_result_impl(0, tid(1), &tg, &edges);
    manager.set_os_result_notifier(&tg, &result).notify_td();
}

#[test]
#[should_panic(expected = "Failed parent pg handle resolution")]
fn unresolvable_parent_is_fatal() {
    let rt = runtime(1, DeliveryMode::Deferred);
    let graph = MockGraph::new(rt.location(0), 0, rt.allocate_handle());
    let tg = graph.dyn_graph();
    let edges = MockEdges::<u32>::new(false, true);

    let mut manager = ScalarResultManager::<u32>::new();
    let result = manager.apply(&tg, true);
    manager.set_result_impl(0, tid(1), &tg, &edges);
    let gate = manager.set_os_result_notifier(&tg, &result);
    edges.complete(1);
    gate.notify_td();
}

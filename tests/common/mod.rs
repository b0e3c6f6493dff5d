#![allow(dead_code)]

use core::{
    cell::{Cell, RefCell},
    num::NonZeroU16,
};
use pgresult::{
    config::{Config, DeliveryMode},
    edge::{ConsumerEdges, EdgeEntry, EdgeStorage, OutEdgeInfo, VersionStorage},
    graph::{CompletionSink, TaskGraph, VoidCompletionSink},
    rmi::{Location, Runtime},
    types::{ConsumerHandle, Handle, Index, LocationId, TaskId},
};
use std::rc::Rc;
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn tid(x: u16) -> TaskId {
    NonZeroU16::new(x).unwrap()
}

pub fn runtime(num_locations: LocationId, delivery: DeliveryMode) -> Runtime {
    init_tracing();
    Runtime::new(Config::new(num_locations).with_delivery(delivery)).unwrap()
}

/// Task graph representative recording every call the result machinery makes.
pub struct MockGraph {
    pub location: Location,
    pub successors: usize,
    pub task_id: TaskId,
    pub parent: Handle,
    pub parent_location: LocationId,
    pub called_before: Cell<bool>,
    pub pulses: Cell<u32>,
    pub counted: Cell<u32>,
    pub processed: Cell<u32>,
    pub holds: Cell<u32>,
}

impl MockGraph {
    pub fn new(location: Location, successors: usize, parent: Handle) -> Rc<Self> {
        Rc::new(Self {
            location,
            successors,
            task_id: tid(3),
            parent,
            parent_location: 0,
            called_before: Cell::new(false),
            pulses: Cell::new(0),
            counted: Cell::new(0),
            processed: Cell::new(0),
            holds: Cell::new(0),
        })
    }

    pub fn dyn_graph(self: &Rc<Self>) -> Rc<dyn TaskGraph> {
        self.clone()
    }
}

impl TaskGraph for MockGraph {
    fn location(&self) -> &Location {
        &self.location
    }

    fn has_successors(&self) -> bool {
        self.successors > 0
    }

    fn num_successors(&self) -> usize {
        self.successors
    }

    fn task_id(&self) -> TaskId {
        self.task_id
    }

    fn parent_handle(&self) -> Handle {
        self.parent
    }

    fn parent_location(&self) -> LocationId {
        self.parent_location
    }

    fn pulse_terminator(&self) {
        self.pulses.set(self.pulses.get() + 1);
    }

    fn count_task(&self) {
        self.counted.set(self.counted.get() + 1);
    }

    fn result_processed(&self) {
        self.processed.set(self.processed.get() + 1);
    }

    fn start_hold(&self) {
        self.holds.set(self.holds.get() + 1);
    }

    fn called_before(&self) -> bool {
        self.called_before.get()
    }
}

pub struct Entry {
    pub stealable: Cell<bool>,
}

impl EdgeEntry for Entry {
    fn out_edge_stealable(&self) -> bool {
        self.stealable.get()
    }
}

pub struct Storage<T> {
    pub value: RefCell<Option<T>>,
    pub direct: bool,
    pub steals: Cell<u32>,
}

impl<T> VersionStorage<T> for Storage<T> {
    fn is_direct_storage(&self) -> bool {
        self.direct
    }

    fn steal(&self) -> T {
        self.steals.set(self.steals.get() + 1);
        self.value.borrow_mut().take().expect("value already moved out")
    }
}

/// Edge storage of the producing computation instance with a single result
/// task.
pub struct MockEdges<T> {
    pub entry: Rc<Entry>,
    pub storage: Rc<Storage<T>>,
    pub result_task: Cell<Option<TaskId>>,
    callback: RefCell<Option<Box<dyn FnOnce(&T)>>>,
}

impl<T: Clone + 'static> MockEdges<T> {
    pub fn new(stealable: bool, direct: bool) -> Self {
        Self {
            entry: Rc::new(Entry {
                stealable: Cell::new(stealable),
            }),
            storage: Rc::new(Storage {
                value: RefCell::new(None),
                direct,
                steals: Cell::new(0),
            }),
            result_task: Cell::new(None),
            callback: RefCell::new(None),
        }
    }

    /// Complete the result task with `value`.
    pub fn complete(&self, value: T) {
        *self.storage.value.borrow_mut() = Some(value.clone());
        let callback = self
            .callback
            .borrow_mut()
            .take()
            .expect("no result task designated");
        callback(&value);
    }

    /// Local read of the stored value, as another task of the producer would.
    pub fn read(&self) -> Option<T> {
        self.storage.value.borrow().clone()
    }
}

impl<T: 'static> EdgeStorage<T> for MockEdges<T> {
    fn set_result(&self, task_id: TaskId, callback: Box<dyn FnOnce(&T)>) -> OutEdgeInfo<T> {
        self.result_task.set(Some(task_id));
        *self.callback.borrow_mut() = Some(callback);
        OutEdgeInfo {
            entry: self.entry.clone(),
            version_storage: self.storage.clone(),
        }
    }
}

/// Parent computation instance collecting completion notifications.
pub struct MockParent<T> {
    pub typed: RefCell<Vec<(TaskId, bool, T)>>,
    pub void: RefCell<Vec<(TaskId, bool)>>,
}

impl<T> MockParent<T> {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            typed: RefCell::new(Vec::new()),
            void: RefCell::new(Vec::new()),
        })
    }
}

impl<T> CompletionSink<T> for MockParent<T> {
    fn processed_remote(&self, task_id: TaskId, has_successors: bool, value: T) {
        self.typed.borrow_mut().push((task_id, has_successors, value));
    }
}

impl<T> VoidCompletionSink for MockParent<T> {
    fn processed_remote_void(&self, task_id: TaskId, has_successors: bool) {
        self.void.borrow_mut().push((task_id, has_successors));
    }
}

pub fn typed_parent(location: &Location) -> (Rc<MockParent<u32>>, Handle) {
    let parent = MockParent::new();
    let handle = location.register::<dyn CompletionSink<u32>>(parent.clone());
    (parent, handle)
}

pub fn void_parent(location: &Location) -> (Rc<MockParent<u32>>, Handle) {
    let parent = MockParent::new();
    let handle = location.register::<dyn VoidCompletionSink>(parent.clone());
    (parent, handle)
}

/// Consuming computation instance's edge storage.
#[derive(Default)]
pub struct Recorder {
    pub producers: RefCell<Vec<Index>>,
    pub elements: RefCell<Vec<(Index, u32)>>,
}

impl ConsumerEdges<u32> for Recorder {
    fn add_producer(&self, index: Index) {
        self.producers.borrow_mut().push(index);
    }

    fn set_element(&self, index: Index, value: u32) {
        self.elements.borrow_mut().push((index, value));
    }
}

pub fn consumer(location: &Location) -> (Rc<Recorder>, ConsumerHandle) {
    let recorder = Rc::new(Recorder::default());
    let handle = location.register::<dyn ConsumerEdges<u32>>(recorder.clone());
    (recorder, handle.into())
}

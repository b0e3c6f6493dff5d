//! Contracts of the edge/version storage the result machinery plugs into,
//! and the holder keeping a reference to the producing task's out-edge.

use crate::types::{Index, TaskId};
use derive_more::Debug;
use std::rc::Rc;

/// Edge storage of the producing computation instance.
pub trait EdgeStorage<T> {
    /// Designate `task_id` as the task whose value is this location's
    /// result. `callback` runs with the value once the task completes.
    ///
    /// Returns the out-edge entry and version storage of the task.
    fn set_result(&self, task_id: TaskId, callback: Box<dyn FnOnce(&T)>) -> OutEdgeInfo<T>;
}

/// Edge entry of the producing task.
pub trait EdgeEntry {
    /// No other local consumer still needs the value stored on this edge.
    fn out_edge_stealable(&self) -> bool;
}

/// Version storage backing an edge entry.
pub trait VersionStorage<T> {
    /// The value is stored inline, so moving it out is possible.
    fn is_direct_storage(&self) -> bool;
    /// Move the value out of the storage.
    fn steal(&self) -> T;
}

/// Edge storage of a consuming computation instance, reached only through
/// asynchronous invocations.
pub trait ConsumerEdges<T> {
    /// Announce that the sending location will produce `index`.
    fn add_producer(&self, index: Index);
    /// Deliver the value of `index`.
    fn set_element(&self, index: Index, value: T);
}

/// Out-edge entry and version storage of a result task.
#[derive(Debug)]
pub struct OutEdgeInfo<T> {
    /// Edge entry of the task.
    #[debug(skip)]
    pub entry: Rc<dyn EdgeEntry>,
    /// Version storage of the task's value.
    #[debug(skip)]
    pub version_storage: Rc<dyn VersionStorage<T>>,
}

impl<T> Clone for OutEdgeInfo<T> {
    fn clone(&self) -> Self {
        Self {
            entry: self.entry.clone(),
            version_storage: self.version_storage.clone(),
        }
    }
}

/// References the internal edge that serves the outgoing edge of the
/// computation instance, so the value can be moved out on exit instead of
/// copied.
#[derive(Debug)]
pub struct EdgeInfoHolder<T> {
    edge_info: Option<OutEdgeInfo<T>>,
}

impl<T> EdgeInfoHolder<T> {
    /// Holder with nothing set.
    #[must_use]
    pub const fn new() -> Self {
        Self { edge_info: None }
    }

    /// # Panics
    /// If the holder was already initialized.
    pub fn set(&mut self, edge_info: OutEdgeInfo<T>) {
        assert!(
            self.edge_info.is_none(),
            "EdgeInfoHolder::set: found already initialized state"
        );
        self.edge_info = Some(edge_info);
    }

    /// Has `set` been called.
    #[must_use]
    pub const fn is_set(&self) -> bool {
        self.edge_info.is_some()
    }

    /// # Panics
    /// If the holder is uninitialized.
    #[must_use]
    pub fn entry(&self) -> &Rc<dyn EdgeEntry> {
        &self.info("uninitialized entry").entry
    }

    /// # Panics
    /// If the holder is uninitialized.
    #[must_use]
    pub fn version_storage(&self) -> &Rc<dyn VersionStorage<T>> {
        &self.info("uninitialized version storage").version_storage
    }

    /// The value may be moved out: no other local consumer needs it and it
    /// is stored inline.
    ///
    /// # Panics
    /// If the holder is uninitialized.
    #[must_use]
    pub fn stealable(&self) -> bool {
        self.entry().out_edge_stealable() && self.version_storage().is_direct_storage()
    }

    fn info(&self, what: &str) -> &OutEdgeInfo<T> {
        self.edge_info
            .as_ref()
            .unwrap_or_else(|| panic!("EdgeInfoHolder: {what}"))
    }
}

impl<T> Default for EdgeInfoHolder<T> {
    fn default() -> Self {
        Self::new()
    }
}

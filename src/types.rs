use core::num::{NonZeroU16, NonZeroU32};
use derive_more::{Display, From};
use indexmap::{IndexMap as _IndexMap, IndexSet as _IndexSet};
use rustc_hash::FxBuildHasher;
use std::collections::HashMap as _HashMap;

/// Identifier of a location (one participant of a computation instance).
///
/// Locations of a runtime are numbered densely from zero.
pub type LocationId = u32;

/// Index of a result element.
///
/// A computation instance produces one value per location, so the index of a
/// value is the id of the location that produced it.
pub type Index = usize;

/// Identifier of a computation instance as a task of its parent task graph.
///
/// Compact `NonZeroU16`, matching the id space of tasks within one graph.
pub type TaskId = NonZeroU16;

/// Opaque handle under which an object is registered in a location's object
/// directory.
///
/// Handles are allocated per runtime, so the same handle can name the
/// per-location representatives of one distributed object on every location.
#[derive(Debug, Display, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[display("H{_0}")]
#[repr(transparent)]
pub struct Handle(NonZeroU32);

impl Handle {
    pub(crate) const fn new(raw: NonZeroU32) -> Self {
        Self(raw)
    }

    /// Raw numeric value of the handle.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0.get()
    }
}

/// Remote reference to a consuming computation's per-location edge storage.
///
/// Only ever used as the destination of asynchronous deliveries; it is never
/// resolved on the producing side.
#[derive(Debug, Display, From, Copy, Clone, PartialEq, Eq, Hash)]
#[display("consumer({_0})")]
#[repr(transparent)]
pub struct ConsumerHandle(Handle);

impl ConsumerHandle {
    /// Object-directory handle of the consumer's edge storage.
    #[must_use]
    pub const fn handle(self) -> Handle {
        self.0
    }
}

pub(crate) type HashMap<K, V> = _HashMap<K, V, FxBuildHasher>;
/// `IndexMap` type with fast hasher.
pub type IndexMap<K, V> = _IndexMap<K, V, FxBuildHasher>;
pub(crate) type IndexSet<T> = _IndexSet<T, FxBuildHasher>;

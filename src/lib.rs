//! Result propagation and lifetime management for distributed task graphs.
//!
//! A computation instance (task graph) runs on a set of locations, each
//! producing one value. Other computation instances, created later and
//! possibly elsewhere, consume that result. This crate keeps the produced
//! values alive exactly as long as something may still read them, and routes
//! them to every consumer exactly once:
//! - A [`ResultContainer`](view::ResultContainer) per location buffers the
//!   local value until all expected consumers registered, and forwards it to
//!   each of them.
//! - [`ResultView`](view::ResultView)s reference-count the container,
//!   distinguishing views that may still be plugged into a new consumer from
//!   views held inside consumers.
//! - [`ResultManager`](manager::ResultManager)s wire a computation instance's
//!   result task to its container, and tie the notification of the parent to
//!   both the value and global termination detection.
//!
//! Key modules:
//! - `rmi`: the in-process substrate of locations, object directories and
//!   asynchronous invocations everything else communicates through.
//! - `view`: containers, views and accessors.
//! - `manager`: scalar, spanned and void result managers.
//! - `notifier`: pending-callback lists and the value/termination gates.
//! - `edge`, `graph`: contracts of the surrounding task-graph runtime.
//!
//! All state is per location and single threaded. Handlers may re-enter the
//! container that sent a message (for example a consumer registering while a
//! value is being forwarded to it); no borrow of internal state is held across
//! a send.

/// Runtime configuration.
///
/// Exposes `Config`, fixing the number of locations and the delivery
/// discipline of the substrate.
pub mod config;
/// Contracts of the producer's and consumers' edge storage.
///
/// Also holds `EdgeInfoHolder`, which lets a one-sided result be moved out of
/// the producer's storage instead of copied.
pub mod edge;
/// Error types of configuration and message delivery.
pub mod error;
/// Contracts of the surrounding task-graph runtime: the per-location task
/// graph representative and the parent's completion sinks.
pub mod graph;
/// Result managers wiring a computation instance's result task to its
/// storage and to the notification of its parent.
pub mod manager;
/// Callback lists and the one-sided termination gates.
pub mod notifier;
/// The in-process remote-invocation substrate.
pub mod rmi;
/// Core types used across the crate (ids, handles, hash-map aliases).
pub mod types;
/// Result containers, views and accessors.
///
/// Implements the reference-counted lifetime of a result and its flow to
/// consumers.
pub mod view;

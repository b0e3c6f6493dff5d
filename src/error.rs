use crate::types::{Handle, LocationId};
use thiserror::Error;

/// Error returned by `Config::validate` and `Runtime::new` for a
/// configuration that cannot describe a runtime.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    /// The runtime must have at least one location.
    #[error("runtime must have at least one location")]
    NoLocations,
}

/// Error kind for messages the substrate could not deliver.
///
/// The substrate never retries; a message that cannot be delivered indicates
/// that the sender used a stale or foreign handle.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RmiError {
    /// The destination location does not exist.
    #[error("no such location {location}")]
    NoSuchLocation {
        /// Destination of the message.
        location: LocationId,
    },
    /// Nothing is registered under the handle on the destination location.
    #[error("handle {handle} is not registered on location {location}")]
    UnknownHandle {
        /// Destination of the message.
        location: LocationId,
        /// Target handle of the message.
        handle: Handle,
    },
    /// The object registered under the handle has a different type than the
    /// one the message was addressed to.
    #[error("object {handle} on location {location} is not a `{expected}`")]
    TypeMismatch {
        /// Destination of the message.
        location: LocationId,
        /// Target handle of the message.
        handle: Handle,
        /// Type the sender expected.
        expected: &'static str,
    },
}

//! In-process remote-invocation substrate.
//!
//! Every location owns an object directory mapping [`Handle`]s to objects.
//! [`Location::async_rmi`] posts a message naming a destination location, a
//! handle and the member call to perform; a single event loop drains the
//! message queue, resolving the handle on the destination and running the
//! call. There is no shared-memory concurrency: all locations are driven from
//! the thread that owns the [`Runtime`], and handlers may freely send further
//! messages or poll the runtime themselves.

use crate::{
    config::{Config, DeliveryMode},
    error::{ConfigError, RmiError},
    types::{Handle, HashMap, LocationId},
};
use core::{
    any::{Any, type_name},
    cell::{Cell, RefCell},
    num::NonZeroU32,
};
use derive_more::Debug;
use rustc_hash::FxBuildHasher;
use std::{collections::VecDeque, rc::Rc};
use tracing::trace;

/// A set of locations sharing one message queue.
///
/// Cloning is cheap: clones refer to the same runtime.
#[derive(Debug, Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

#[derive(Debug)]
struct RuntimeInner {
    config: Config,
    #[debug(skip)]
    directories: Vec<Directory>,
    #[debug(skip)]
    queue: RefCell<VecDeque<Message>>,
    next_handle: Cell<u32>,
    sent: Cell<u64>,
    delivered: Cell<u64>,
    /// First delivery failure observed while draining inside a send.
    deferred_error: RefCell<Option<RmiError>>,
}

type Directory = RefCell<HashMap<Handle, Box<dyn Any>>>;

struct Message {
    source: LocationId,
    dest: LocationId,
    handle: Handle,
    deliver: Box<dyn FnOnce(&Runtime) -> Result<(), RmiError>>,
}

/// One location of a [`Runtime`].
///
/// The execution context handed to objects living on that location; it is
/// what they use to register themselves and to send messages.
#[derive(Debug, Clone)]
pub struct Location {
    id: LocationId,
    runtime: Runtime,
}

impl Runtime {
    /// Create a runtime with `config.num_locations` empty locations.
    ///
    /// # Errors
    /// If the configuration is invalid.
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        config.validate()?;
        let directories = (0..config.num_locations)
            .map(|_| RefCell::new(HashMap::with_hasher(FxBuildHasher)))
            .collect();
        Ok(Self {
            inner: Rc::new(RuntimeInner {
                config,
                directories,
                queue: RefCell::new(VecDeque::new()),
                next_handle: Cell::new(1),
                sent: Cell::new(0),
                delivered: Cell::new(0),
                deferred_error: RefCell::new(None),
            }),
        })
    }

    /// The configuration the runtime was built with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Number of locations.
    #[must_use]
    pub fn num_locations(&self) -> LocationId {
        self.inner.config.num_locations
    }

    /// Execution context of location `id`.
    ///
    /// # Panics
    /// If `id` is not a location of this runtime.
    #[must_use]
    pub fn location(&self, id: LocationId) -> Location {
        assert!(
            id < self.num_locations(),
            "Runtime::location: no location {id} in a runtime of {}",
            self.num_locations()
        );
        Location {
            id,
            runtime: self.clone(),
        }
    }

    /// Allocate a handle that is unused on every location.
    ///
    /// # Panics
    /// If the handle space is exhausted.
    pub fn allocate_handle(&self) -> Handle {
        let raw = self.inner.next_handle.get();
        self.inner.next_handle.set(
            raw.checked_add(1)
                .expect("Runtime::allocate_handle: handle space exhausted"),
        );
        Handle::new(NonZeroU32::new(raw).expect("Runtime::allocate_handle: [1]"))
    }

    /// Is anything registered under `handle` on `location`.
    #[must_use]
    pub fn is_registered(&self, location: LocationId, handle: Handle) -> bool {
        self.inner
            .directories
            .get(location as usize)
            .is_some_and(|dir| dir.borrow().contains_key(&handle))
    }

    /// Number of messages waiting to be delivered.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inner.queue.borrow().len()
    }

    /// Total number of messages sent so far.
    #[must_use]
    pub fn messages_sent(&self) -> u64 {
        self.inner.sent.get()
    }

    /// Total number of messages delivered so far. Messages whose target
    /// could not be resolved do not count.
    #[must_use]
    pub fn messages_delivered(&self) -> u64 {
        self.inner.delivered.get()
    }

    /// Deliver at most one queued message.
    ///
    /// Returns `false` if the queue was empty.
    ///
    /// # Errors
    /// If the message (or one delivered eagerly earlier) could not be
    /// delivered.
    pub fn poll_once(&self) -> Result<bool, RmiError> {
        if let Some(err) = self.inner.deferred_error.borrow_mut().take() {
            return Err(err);
        }
        let Some(message) = self.inner.queue.borrow_mut().pop_front() else {
            return Ok(false);
        };
        self.deliver(message)?;
        Ok(true)
    }

    /// Deliver messages until the queue is empty, including the ones sent by
    /// the handlers themselves.
    ///
    /// Returns the number of messages delivered.
    ///
    /// # Errors
    /// On the first message that could not be delivered.
    pub fn run_until_idle(&self) -> Result<usize, RmiError> {
        let mut count = 0usize;
        while self.poll_once()? {
            count += 1;
        }
        Ok(count)
    }

    fn deliver(&self, message: Message) -> Result<(), RmiError> {
        let Message {
            source,
            dest,
            handle,
            deliver,
        } = message;
        trace!(source, dest, %handle, "rmi deliver");
        deliver(self)?;
        self.inner.delivered.set(self.inner.delivered.get() + 1);
        Ok(())
    }

    fn enqueue(&self, message: Message) {
        self.inner.sent.set(self.inner.sent.get() + 1);
        self.inner.queue.borrow_mut().push_back(message);
        if self.inner.config.delivery == DeliveryMode::Eager {
            self.drain_eagerly();
        }
    }

    /// Drain the queue from inside a send. Delivery failures cannot be
    /// reported to the sender, so the first one is kept for the next poll.
    fn drain_eagerly(&self) {
        loop {
            let Some(message) = self.inner.queue.borrow_mut().pop_front() else {
                return;
            };
            if let Err(err) = self.deliver(message) {
                self.inner.deferred_error.borrow_mut().get_or_insert(err);
            }
        }
    }

    fn directory(&self, location: LocationId) -> Result<&Directory, RmiError> {
        self.inner
            .directories
            .get(location as usize)
            .ok_or(RmiError::NoSuchLocation { location })
    }

    fn resolve_on<O: ?Sized + 'static>(
        &self,
        location: LocationId,
        handle: Handle,
    ) -> Result<Rc<O>, RmiError> {
        let directory = self.directory(location)?.borrow();
        let object = directory
            .get(&handle)
            .ok_or(RmiError::UnknownHandle { location, handle })?;
        object
            .downcast_ref::<Rc<O>>()
            .cloned()
            .ok_or(RmiError::TypeMismatch {
                location,
                handle,
                expected: type_name::<O>(),
            })
    }
}

impl Location {
    /// Id of this location.
    #[must_use]
    pub const fn id(&self) -> LocationId {
        self.id
    }

    /// Runtime this location belongs to.
    #[must_use]
    pub const fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// Register `object` under a freshly allocated handle.
    ///
    /// Messages reach the object only when addressed to exactly the type `O`
    /// it was registered as; register trait objects (`Rc<dyn Trait>`) to
    /// receive messages addressed to the trait.
    pub fn register<O: ?Sized + 'static>(&self, object: Rc<O>) -> Handle {
        let handle = self.runtime.allocate_handle();
        self.register_at(handle, object);
        handle
    }

    /// Register `object` under `handle`, typically one allocated with
    /// [`Runtime::allocate_handle`] and shared by every location.
    ///
    /// # Panics
    /// If something is already registered under `handle` here.
    pub fn register_at<O: ?Sized + 'static>(&self, handle: Handle, object: Rc<O>) {
        let directory = self
            .runtime
            .directory(self.id)
            .expect("Location::register_at: [1]");
        let previous = directory.borrow_mut().insert(handle, Box::new(object));
        assert!(
            previous.is_none(),
            "Location::register_at: handle {handle} already registered on location {}",
            self.id
        );
    }

    /// Remove the registration under `handle`. Returns whether there was one.
    pub fn unregister(&self, handle: Handle) -> bool {
        // The removed object is dropped after the directory borrow ends, so
        // its destructor may touch the directory again.
        let removed = self
            .runtime
            .directory(self.id)
            .expect("Location::unregister: [1]")
            .borrow_mut()
            .remove(&handle);
        removed.is_some()
    }

    /// Resolve `handle` to the local object registered as `O`.
    #[must_use]
    pub fn resolve<O: ?Sized + 'static>(&self, handle: Handle) -> Option<Rc<O>> {
        self.runtime.resolve_on(self.id, handle).ok()
    }

    /// Asynchronously invoke `call` on the object registered as `O` under
    /// `handle` on location `dest`.
    ///
    /// Fire-and-forget. Depending on the runtime's [`DeliveryMode`] the call
    /// runs on a later poll or before this function returns.
    pub fn async_rmi<O, F>(&self, dest: LocationId, handle: Handle, call: F)
    where
        O: ?Sized + 'static,
        F: FnOnce(&O) + 'static,
    {
        trace!(source = self.id, dest, %handle, object = type_name::<O>(), "async_rmi");
        let deliver = move |runtime: &Runtime| {
            let object = runtime.resolve_on::<O>(dest, handle)?;
            call(&object);
            Ok(())
        };
        self.runtime.enqueue(Message {
            source: self.id,
            dest,
            handle,
            deliver: Box::new(deliver),
        });
    }

    /// Run one iteration of the event loop.
    ///
    /// # Errors
    /// See [`Runtime::poll_once`].
    pub fn poll(&self) -> Result<bool, RmiError> {
        self.runtime.poll_once()
    }
}

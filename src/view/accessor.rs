use crate::{types::Index, view::ResultView};
use derive_more::Debug;

/// Deferred reference to one element of a [`ResultView`].
///
/// Created on demand and never stored by the container. Reading through it
/// drives the event loop until the value shows up.
#[must_use]
#[derive(Debug, Clone)]
pub struct ResultAccessor<T> {
    view: ResultView<T>,
    index: Index,
}

impl<T> ResultAccessor<T> {
    pub(super) const fn new(view: ResultView<T>, index: Index) -> Self {
        Self { view, index }
    }

    /// Index of the referenced element.
    #[must_use]
    pub const fn index(&self) -> Index {
        self.index
    }

    /// The view the accessor reads through.
    #[must_use]
    pub const fn view(&self) -> &ResultView<T> {
        &self.view
    }

    /// Does the accessor refer to no value at all.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        self.view.is_null()
    }

    /// Is the referenced value available on this location.
    #[must_use]
    pub fn available(&self) -> bool {
        self.view.available(self.index)
    }
}

impl<T: Clone + 'static> ResultAccessor<T> {
    /// Run `notifier` once the referenced value is available.
    pub fn request_notify(&self, notifier: impl FnOnce(&T) + 'static) {
        self.view.request_notify(self.index, notifier);
    }

    /// Apply `f` to the referenced value, polling the event loop until the
    /// value is available.
    ///
    /// # Panics
    /// If the event loop runs dry while the value is still missing, or a
    /// message polled meanwhile cannot be delivered.
    pub fn apply_get<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let container = self.view.container();
        while !container.available(self.index) {
            match container.location().poll() {
                Ok(true) => {}
                Ok(false) => panic!(
                    "ResultAccessor::apply_get: value {} of {} can no longer arrive",
                    self.index,
                    container.handle()
                ),
                Err(err) => panic!("ResultAccessor::apply_get: {err}"),
            }
        }
        container.apply_get(self.index, f)
    }

    /// Copy of the referenced value, see [`apply_get`](Self::apply_get).
    #[must_use]
    pub fn get(&self) -> T {
        self.apply_get(T::clone)
    }
}

mod accessor;
mod container;

pub use crate::view::{
    accessor::ResultAccessor,
    container::{Lifecycle, ResultContainer, ValueEntry},
};
use crate::{graph::TaskGraph, types::Index};
use core::cell::Ref;
use derive_more::Debug;
use std::rc::Rc;

/// Whether a copy of a view is made while a computation instance is being
/// constructed.
///
/// Passed explicitly along the construction path of a consumer so that
/// copies made there can be told apart from copies made anywhere else.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum ConstructionPhase {
    /// Ordinary execution.
    #[default]
    Running,
    /// A consumer computation instance is being initialized and is taking
    /// the view as one of its inputs.
    Initializing,
}

/// Reference-counted handle to a computation instance's
/// [`ResultContainer`] on one location.
///
/// A view is a *plug* while it lives outside any consumer and may still be
/// plugged into one, creating a new successor. Copying a plug while a consumer
/// is being initialized yields a *transitioned* view: the consumer's own
/// reference, which must not count as another plug. Copies made by a
/// consumer's internal task replication then inherit the non-plug status.
///
/// The container is retired when the last view referencing it is dropped.
#[must_use]
#[derive(Debug)]
pub struct ResultView<T> {
    container: Option<Rc<ResultContainer<T>>>,
    is_plug: bool,
    is_transitioned: bool,
}

impl<T> ResultView<T> {
    /// The null view, referencing no container.
    pub const fn null() -> Self {
        Self {
            container: None,
            is_plug: false,
            is_transitioned: false,
        }
    }

    /// Copy the view during `phase`, updating the container's reference
    /// counts.
    pub fn copy_in(&self, phase: ConstructionPhase) -> Self {
        let initializing = phase == ConstructionPhase::Initializing;
        let copy = Self {
            container: self.container.clone(),
            is_plug: self.is_plug && !initializing,
            is_transitioned: self.is_plug && initializing,
        };
        if let Some(container) = &copy.container {
            container.increment_ref_count(copy.is_plug, copy.is_transitioned);
        }
        copy
    }

    /// `true` for a default-constructed view.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        self.container.is_none()
    }

    /// Can the view be plugged into a consumer.
    #[must_use]
    pub const fn is_plug(&self) -> bool {
        self.is_plug
    }

    /// Is the view a consumer's reference to the result.
    #[must_use]
    pub const fn is_transitioned(&self) -> bool {
        self.is_transitioned
    }

    /// The referenced container.
    ///
    /// # Panics
    /// If the view is null.
    #[must_use]
    pub fn container(&self) -> &Rc<ResultContainer<T>> {
        self.container
            .as_ref()
            .expect("ResultView::container: null result view")
    }

    /// Do both views reference the same container.
    #[must_use]
    pub fn same_container(&self, other: &Self) -> bool {
        match (&self.container, &other.container) {
            (Some(lhs), Some(rhs)) => Rc::ptr_eq(lhs, rhs),
            (None, None) => true,
            _ => false,
        }
    }

    /// Is a value for `index` available in the container.
    #[must_use]
    pub fn available(&self, index: Index) -> bool {
        self.container().available(index)
    }

    /// Borrow the value of `index`.
    ///
    /// # Panics
    /// If the view is null or the value is not available.
    pub fn get_reference(&self, index: Index) -> Ref<'_, T> {
        self.container().get_reference(index)
    }
}

impl<T: Clone + 'static> ResultView<T> {
    /// The plug created together with a new container for `graph`'s location.
    pub(crate) fn new(is_one_sided: bool, graph: Rc<dyn TaskGraph>) -> Self {
        Self {
            container: Some(ResultContainer::create(is_one_sided, graph)),
            is_plug: true,
            is_transitioned: false,
        }
    }

    /// Deferred reference to the element `index`.
    pub fn at(&self, index: Index) -> ResultAccessor<T> {
        ResultAccessor::new(self.clone(), index)
    }

    /// Deferred reference to the element `index`, consuming the view.
    pub fn into_accessor(self, index: Index) -> ResultAccessor<T> {
        ResultAccessor::new(self, index)
    }

    /// Copy of the value of `index`.
    ///
    /// # Panics
    /// If the view is null or the value is not available.
    #[must_use]
    pub fn get_element(&self, index: Index) -> T {
        self.container().get_element(index)
    }

    /// Register a continuation to run once the value of `index` is
    /// available. Lets consumers set up their dependence on this result.
    pub fn request_notify(&self, index: Index, notifier: impl FnOnce(&T) + 'static) {
        self.container().request_notify(index, notifier);
    }
}

impl<T> Clone for ResultView<T> {
    fn clone(&self) -> Self {
        self.copy_in(ConstructionPhase::Running)
    }

    /// Re-home the view onto `source`'s container.
    fn clone_from(&mut self, source: &Self) {
        if let Some(container) = &source.container {
            container.increment_ref_count(source.is_plug, false);
        }
        let previous = core::mem::replace(&mut self.container, source.container.clone());
        if let Some(previous) = previous {
            if previous.decrement_ref_count(self.is_plug) == 0 {
                previous.try_delete();
            }
        }
        self.is_plug = source.is_plug;
        self.is_transitioned = false;
    }
}

impl<T> Drop for ResultView<T> {
    fn drop(&mut self) {
        let Some(container) = self.container.take() else {
            return;
        };
        if container.decrement_ref_count(self.is_plug) == 0 {
            container.try_delete();
        }
    }
}

impl<T> Default for ResultView<T> {
    fn default() -> Self {
        Self::null()
    }
}

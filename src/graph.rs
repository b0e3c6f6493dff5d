use crate::{
    rmi::Location,
    types::{Handle, LocationId, TaskId},
};

/// The per-location representative of the task graph (computation instance)
/// whose result is being managed.
///
/// Implemented by the surrounding runtime; this crate only calls into it.
pub trait TaskGraph {
    /// Execution context of the location this representative lives on.
    fn location(&self) -> &Location;
    /// Does any other computation instance consume this one's result.
    fn has_successors(&self) -> bool;
    /// Number of computation instances consuming this one's result.
    fn num_successors(&self) -> usize;
    /// Id of this computation instance as a task of its parent.
    fn task_id(&self) -> TaskId;
    /// Handle of the parent computation instance.
    fn parent_handle(&self) -> Handle;
    /// Location of the parent representative to notify on completion.
    fn parent_location(&self) -> LocationId;
    /// Re-evaluate termination detection; an awaited event may have occurred.
    fn pulse_terminator(&self);
    /// Account for one more task whose completion termination detection must
    /// observe.
    fn count_task(&self);
    /// The result task's value was handed to the result machinery.
    fn result_processed(&self);
    /// Defer deletion of the task graph until it is released by its own
    /// termination logic.
    fn start_hold(&self);
    /// Is this a repeated invocation of a persistent computation instance.
    fn called_before(&self) -> bool;
}

/// Receiver of a typed one-sided completion notification: the parent task
/// graph, which stores the value on the edge of the child task.
pub trait CompletionSink<T> {
    /// The child `task_id` terminated with `value`.
    fn processed_remote(&self, task_id: TaskId, has_successors: bool, value: T);
}

/// Receiver of a one-sided completion notification without a payload.
pub trait VoidCompletionSink {
    /// The child `task_id` terminated.
    fn processed_remote_void(&self, task_id: TaskId, has_successors: bool);
}

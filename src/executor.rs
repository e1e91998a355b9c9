pub mod lifecycle;
mod parallel;
mod result;
mod single;
mod task;

pub use parallel::ParallelExecutor;
pub use result::ExecutionResult;
pub use single::SingleThreadExecutor;
pub use task::TaskWrapper;

use crate::plan::ExecutionPlan;
use std::num::NonZeroUsize;
use std::sync::{Arc, Weak};

/// Configuration shared by every executor variant.
#[derive(Debug, Clone, Copy)]
pub struct ExecutorConfig {
    /// Number of worker threads. `0` selects the machine's available
    /// parallelism; `1` selects the single-threaded reference
    /// behaviour.
    pub thread_count: usize,
    /// Whether to record per-step callback durations into the result.
    pub collect_timing: bool,
    /// Whether the first failed step requests a stop, cancelling every
    /// task that has not begun executing. When disabled, independent
    /// paths keep running.
    pub abort_on_failure: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            thread_count: 1,
            collect_timing: false,
            abort_on_failure: true,
        }
    }
}

impl ExecutorConfig {
    /// Resolves `thread_count` to a concrete worker count,
    /// substituting the machine's available parallelism for `0`.
    #[must_use]
    pub fn resolved_thread_count(&self) -> usize {
        match self.thread_count {
            0 => std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1),
            n => n,
        }
    }
}

/// A runner for [`ExecutionPlan`]s.
///
/// `execute` never fails: every outcome, including user-code failures
/// and cooperative stops, is carried inside the returned
/// [`ExecutionResult`]. `request_stop` may be called from any thread
/// while an execution is in flight; running tasks are not preempted,
/// tasks that have not begun executing settle as cancelled, and
/// `execute` returns once outstanding tasks have drained.
pub trait Executor: Send + Sync {
    /// Runs the plan to completion (or to a cooperative stop) and
    /// reports the outcome.
    fn execute(&self, plan: &ExecutionPlan) -> ExecutionResult;

    /// Requests a cooperative stop, visible to all workers.
    fn request_stop(&self);

    /// Returns `true` once a stop has been requested.
    fn stop_requested(&self) -> bool;
}

/// The queue-side interface a [`TaskWrapper`] reports to.
///
/// Wrappers hold only a [`Weak`] reference to their scheduler while the
/// executor owns the wrappers strongly; this one-directional ownership
/// breaks the cycle between "executor owns tasks" and "tasks enqueue on
/// the executor".
pub trait Scheduler: Send + Sync {
    /// Returns `true` once a stop has been requested.
    fn stop_requested(&self) -> bool;

    /// Adds a task that just became ready to the ready queue.
    fn enqueue(&self, task: Arc<TaskWrapper>);

    /// Records that a task reached a terminal state.
    fn notify_completion(&self, task: &TaskWrapper);
}

/// Creates an executor for the given configuration: the
/// single-threaded reference implementation for `thread_count == 1`,
/// the shared-queue parallel implementation otherwise.
pub fn new_executor(config: ExecutorConfig) -> Arc<dyn Executor> {
    if config.thread_count == 1 {
        Arc::new(SingleThreadExecutor::new(config))
    } else {
        Arc::new(ParallelExecutor::new(config))
    }
}

/// Constructs one wrapper per plan step, wired to the given scheduler.
pub(crate) fn build_wrappers(
    plan: &ExecutionPlan,
    scheduler: Weak<dyn Scheduler>,
) -> Vec<Arc<TaskWrapper>> {
    (0..plan.step_count())
        .map(|step_idx| {
            Arc::new(TaskWrapper::new(
                Arc::clone(&plan.steps[step_idx]),
                step_idx,
                plan.step_tokens[step_idx],
                plan.predecessor_counts[step_idx],
                scheduler.clone(),
            ))
        })
        .collect()
}

/// Connects every wrapper to its successors according to the plan.
pub(crate) fn wire_successors(wrappers: &[Arc<TaskWrapper>], plan: &ExecutionPlan) {
    for (step_idx, successor_indices) in plan.successors.iter().enumerate() {
        for &successor_idx in successor_indices {
            wrappers[step_idx].add_successor(Arc::downgrade(&wrappers[successor_idx]));
        }
    }
}

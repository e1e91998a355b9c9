use crate::executor::lifecycle::{LifecycleCell, TaskState};
use crate::executor::Scheduler;
use crate::step::{Step, StepError};
use crate::sync::{AtomicU64, Ordering};
use crate::types::{StepIdx, Token};
use derive_more::Debug;
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

/// Per-task runtime object: wraps one step handle for a single
/// execution run.
///
/// The wrapper carries the task's [`LifecycleCell`], a weak reference to
/// the scheduler it reports to, and weak references to its successor
/// wrappers. Ownership of every wrapper is anchored in the executor
/// alone; the weak back- and cross-references keep the
/// wrapper–executor–wrapper triangle from ever forming a strong cycle.
///
/// When the wrapped step finishes, [`run`](Self::run) decrements each
/// successor's predecessor counter and enqueues those that become
/// ready, so readiness cascades through the graph without central
/// coordination.
#[must_use]
#[derive(Debug)]
pub struct TaskWrapper {
    #[debug(skip)]
    step: Arc<dyn Step>,
    step_idx: StepIdx,
    token: Token,
    #[debug(skip)]
    scheduler: Weak<dyn Scheduler>,
    #[debug(skip)]
    successors: Mutex<Vec<Weak<TaskWrapper>>>,
    lifecycle: LifecycleCell,
    #[debug(skip)]
    failure: Mutex<Option<StepError>>,
    duration_nanos: AtomicU64,
}

impl TaskWrapper {
    /// Creates a wrapper for one step of a plan.
    pub fn new(
        step: Arc<dyn Step>,
        step_idx: StepIdx,
        token: Token,
        predecessor_count: usize,
        scheduler: Weak<dyn Scheduler>,
    ) -> Self {
        Self {
            step,
            step_idx,
            token,
            scheduler,
            successors: Mutex::new(Vec::new()),
            lifecycle: LifecycleCell::new(predecessor_count),
            failure: Mutex::new(None),
            duration_nanos: AtomicU64::new(0),
        }
    }

    /// Registers a successor. Must happen during wiring, before
    /// execution starts; the successor list is immutable afterwards.
    pub fn add_successor(&self, successor: Weak<TaskWrapper>) {
        self.successors.lock().push(successor);
    }

    /// Returns the wrapped step handle.
    #[must_use]
    pub fn step(&self) -> &Arc<dyn Step> {
        &self.step
    }

    /// Returns the step index within the plan.
    #[must_use]
    pub fn step_idx(&self) -> StepIdx {
        self.step_idx
    }

    /// Returns the authorization token granted to this step.
    #[must_use]
    pub fn token(&self) -> Token {
        self.token
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> TaskState {
        self.lifecycle.state()
    }

    /// Returns `true` once every predecessor has settled.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.lifecycle.is_ready()
    }

    /// Records the completion of one predecessor; see
    /// [`LifecycleCell::decrement_predecessors`].
    pub fn decrement_predecessor_count(&self) -> bool {
        self.lifecycle.decrement_predecessors()
    }

    /// `Ready → Queued`; returns `true` if this call made the
    /// transition.
    pub fn mark_queued(&self) -> bool {
        self.lifecycle.try_queue()
    }

    /// Cancels the task unless it is already executing or terminal.
    pub fn cancel(&self) -> bool {
        self.lifecycle.try_cancel()
    }

    /// Takes the failure captured by a failed execution, if any.
    pub fn take_failure(&self) -> Option<StepError> {
        self.failure.lock().take()
    }

    /// Returns how long the step's callback ran, or zero if it has not
    /// completed.
    #[must_use]
    pub fn duration(&self) -> Duration {
        Duration::from_nanos(self.duration_nanos.load(Ordering::Acquire))
    }

    /// Executes the task: the full lifecycle from pickup to completion
    /// notification.
    ///
    /// 1. If the scheduler is gone, return silently; if stop was
    ///    requested, cancel and notify completion.
    /// 2. `Queued → Executing`; a lost race means someone else settled
    ///    this task, so only notify completion.
    /// 3. Run the step's callback inside a panic guard; record
    ///    success, or capture the failure.
    /// 4. Record the callback duration.
    /// 5. Decrement every live successor's predecessor counter and
    ///    enqueue those that become ready.
    /// 6. Notify the scheduler of completion.
    pub fn run(&self) {
        let Some(scheduler) = self.scheduler.upgrade() else {
            return;
        };
        if scheduler.stop_requested() {
            self.lifecycle.try_cancel();
            scheduler.notify_completion(self);
            return;
        }

        if !self.lifecycle.try_execute() {
            scheduler.notify_completion(self);
            return;
        }

        let started = Instant::now();
        let outcome = catch_unwind(AssertUnwindSafe(|| self.step.execute()));
        let elapsed = started.elapsed();

        match outcome {
            Ok(Ok(())) => self.lifecycle.finish(true),
            Ok(Err(error)) => {
                *self.failure.lock() = Some(error);
                self.lifecycle.finish(false);
            }
            Err(payload) => {
                *self.failure.lock() = Some(StepError::new(panic_message(payload.as_ref())));
                self.lifecycle.finish(false);
            }
        }

        self.duration_nanos
            .store(clamp_nanos(elapsed), Ordering::Release);

        self.notify_successors(scheduler.as_ref());
        scheduler.notify_completion(self);
    }

    fn notify_successors(&self, scheduler: &dyn Scheduler) {
        let successors = self.successors.lock();
        for weak in successors.iter() {
            let Some(successor) = weak.upgrade() else {
                continue;
            };
            if successor.decrement_predecessor_count() && successor.mark_queued() {
                scheduler.enqueue(Arc::clone(&successor));
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "step panicked".to_owned()
    }
}

fn clamp_nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

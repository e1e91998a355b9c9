use crate::executor::lifecycle::TaskState;
use crate::executor::result::{assemble_result, ExecutionResult};
use crate::executor::task::TaskWrapper;
use crate::executor::{build_wrappers, wire_successors, Executor, ExecutorConfig, Scheduler};
use crate::plan::ExecutionPlan;
use crate::sync::{AtomicBool, AtomicUsize, Ordering};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::{Arc, Weak};
use std::time::Instant;
use tracing::{debug, trace};

/// The multi-worker executor: a shared, condition-guarded ready queue
/// drained by `thread_count` workers.
///
/// Workers cooperatively pop tasks and run them; a worker that finds
/// the queue empty sleeps on the condition variable unless no task is
/// in flight anywhere, in which case no further work can materialise
/// and every worker drains out. `execute` returns once all reachable
/// tasks have settled. Tasks themselves hold no locks while the user
/// callback runs; all shared mutation goes through the task atomics or
/// the queue's mutex.
#[must_use]
pub struct ParallelExecutor {
    config: ExecutorConfig,
    shared: Arc<Shared>,
}

struct Shared {
    stop: AtomicBool,
    completed: AtomicUsize,
    abort_on_failure: bool,
    queue: Mutex<WorkQueue>,
    available: Condvar,
}

struct WorkQueue {
    ready: VecDeque<Arc<TaskWrapper>>,
    in_flight: usize,
}

impl ParallelExecutor {
    /// Creates the executor; the worker count is resolved from
    /// `config.thread_count` at `execute` time (`0` = available
    /// parallelism).
    pub fn new(config: ExecutorConfig) -> Self {
        Self {
            config,
            shared: Arc::new(Shared {
                stop: AtomicBool::new(false),
                completed: AtomicUsize::new(0),
                abort_on_failure: config.abort_on_failure,
                queue: Mutex::new(WorkQueue {
                    ready: VecDeque::new(),
                    in_flight: 0,
                }),
                available: Condvar::new(),
            }),
        }
    }
}

impl Executor for ParallelExecutor {
    fn execute(&self, plan: &ExecutionPlan) -> ExecutionResult {
        let started = Instant::now();

        {
            let mut queue = self.shared.queue.lock();
            queue.ready.clear();
            queue.in_flight = 0;
        }
        self.shared.completed.store(0, Ordering::Release);

        if plan.step_count() == 0 {
            return ExecutionResult {
                success: true,
                stopped: self.stop_requested(),
                total_duration: started.elapsed(),
                step_durations: self.config.collect_timing.then(Vec::new),
                ..ExecutionResult::default()
            };
        }

        let worker_count = self.config.resolved_thread_count().max(1);
        debug!(
            steps = plan.step_count(),
            workers = worker_count,
            "parallel execution start"
        );

        let scheduler_arc: Arc<dyn Scheduler> = self.shared.clone();
        let scheduler: Weak<dyn Scheduler> = Arc::downgrade(&scheduler_arc);
        let wrappers = build_wrappers(plan, scheduler);
        wire_successors(&wrappers, plan);

        {
            let mut queue = self.shared.queue.lock();
            for task in &wrappers {
                if task.is_ready() && task.mark_queued() {
                    queue.ready.push_back(Arc::clone(task));
                }
            }
        }

        let shared = &self.shared;
        std::thread::scope(|scope| {
            for _ in 0..worker_count {
                scope.spawn(|| worker_loop(shared));
            }
        });

        let stopped = self.stop_requested();
        let result = assemble_result(
            &wrappers,
            stopped,
            self.config.collect_timing,
            started.elapsed(),
        );
        debug!(summary = %result.summary(), "parallel execution done");
        result
    }

    fn request_stop(&self) {
        self.shared.stop.store(true, Ordering::Release);
        self.shared.available.notify_all();
    }

    fn stop_requested(&self) -> bool {
        self.shared.stop.load(Ordering::Acquire)
    }
}

/// Pops and runs tasks until the queue is empty and nothing is in
/// flight.
///
/// Any blocking here is bounded: the waiting worker is woken either by
/// an `enqueue` from a running task or by the final completion leaving
/// the queue empty with nothing in flight.
fn worker_loop(shared: &Shared) {
    let mut queue = shared.queue.lock();
    loop {
        if let Some(task) = queue.ready.pop_front() {
            queue.in_flight += 1;
            drop(queue);

            task.run();

            queue = shared.queue.lock();
            queue.in_flight -= 1;
            if queue.ready.is_empty() && queue.in_flight == 0 {
                // Nothing left and nobody can produce more: wake every
                // sleeping worker so they can drain out.
                shared.available.notify_all();
            } else if !queue.ready.is_empty() {
                shared.available.notify_one();
            }
        } else if queue.in_flight == 0 {
            return;
        } else {
            shared.available.wait(&mut queue);
        }
    }
}

impl Scheduler for Shared {
    fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    fn enqueue(&self, task: Arc<TaskWrapper>) {
        trace!(step = task.step_idx(), "task ready");
        self.queue.lock().ready.push_back(task);
        self.available.notify_one();
    }

    fn notify_completion(&self, task: &TaskWrapper) {
        self.completed.fetch_add(1, Ordering::AcqRel);
        if self.abort_on_failure && task.state() == TaskState::Failed {
            self.stop.store(true, Ordering::Release);
            self.available.notify_all();
        }
    }
}

use crate::executor::lifecycle::TaskState;
use crate::executor::result::{assemble_result, ExecutionResult};
use crate::executor::task::TaskWrapper;
use crate::executor::{build_wrappers, wire_successors, Executor, ExecutorConfig, Scheduler};
use crate::plan::ExecutionPlan;
use crate::sync::{AtomicBool, AtomicUsize, Ordering};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::{Arc, Weak};
use std::time::Instant;
use tracing::{debug, trace};

/// The single-threaded reference executor.
///
/// Tasks run one at a time, popped from a FIFO ready queue on the
/// calling thread. Because a finishing task enqueues its newly-ready
/// successors, the loop drains the whole DAG; it exits early only when
/// a stop is observed, in which case every task that has not executed
/// settles as cancelled.
///
/// `execute` is meant to be called from one thread at a time;
/// [`request_stop`](Executor::request_stop) may be called from any
/// thread.
#[must_use]
pub struct SingleThreadExecutor {
    config: ExecutorConfig,
    shared: Arc<Shared>,
}

struct Shared {
    stop: AtomicBool,
    completed: AtomicUsize,
    abort_on_failure: bool,
    ready_queue: Mutex<VecDeque<Arc<TaskWrapper>>>,
}

impl SingleThreadExecutor {
    /// Creates the executor. `config.thread_count` is ignored; this
    /// variant always runs on the calling thread.
    pub fn new(config: ExecutorConfig) -> Self {
        Self {
            config,
            shared: Arc::new(Shared {
                stop: AtomicBool::new(false),
                completed: AtomicUsize::new(0),
                abort_on_failure: config.abort_on_failure,
                ready_queue: Mutex::new(VecDeque::new()),
            }),
        }
    }
}

impl Executor for SingleThreadExecutor {
    fn execute(&self, plan: &ExecutionPlan) -> ExecutionResult {
        let started = Instant::now();

        // Per-run state. The stop flag is deliberately left alone; it
        // belongs to the caller.
        self.shared.ready_queue.lock().clear();
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

        debug!(steps = plan.step_count(), "single-threaded execution start");

        let scheduler_arc: Arc<dyn Scheduler> = self.shared.clone();
        let scheduler: Weak<dyn Scheduler> = Arc::downgrade(&scheduler_arc);
        let wrappers = build_wrappers(plan, scheduler);
        wire_successors(&wrappers, plan);

        for task in &wrappers {
            if task.is_ready() && task.mark_queued() {
                self.shared.ready_queue.lock().push_back(Arc::clone(task));
            }
        }

        loop {
            if self.shared.stop.load(Ordering::Acquire) {
                break;
            }
            let Some(task) = self.shared.ready_queue.lock().pop_front() else {
                break;
            };
            task.run();
        }

        let stopped = self.stop_requested();
        let result = assemble_result(
            &wrappers,
            stopped,
            self.config.collect_timing,
            started.elapsed(),
        );
        debug!(summary = %result.summary(), "single-threaded execution done");
        result
    }

    fn request_stop(&self) {
        self.shared.stop.store(true, Ordering::Release);
    }

    fn stop_requested(&self) -> bool {
        self.shared.stop.load(Ordering::Acquire)
    }
}

impl Scheduler for Shared {
    fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    fn enqueue(&self, task: Arc<TaskWrapper>) {
        trace!(step = task.step_idx(), "task ready");
        self.ready_queue.lock().push_back(task);
    }

    fn notify_completion(&self, task: &TaskWrapper) {
        self.completed.fetch_add(1, Ordering::AcqRel);
        if self.abort_on_failure && task.state() == TaskState::Failed {
            self.stop.store(true, Ordering::Release);
        }
    }
}

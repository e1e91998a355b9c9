use crate::sync::{AtomicU8, AtomicUsize, Ordering};

/// Lifecycle state of one task.
///
/// States advance monotonically along
/// `NotReady → Ready → Queued → Executing → Succeeded | Failed`, with a
/// one-way exit `NotReady | Ready | Queued → Cancelled`. A state is
/// never revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TaskState {
    /// Predecessors are still outstanding.
    NotReady = 0,
    /// All predecessors settled; not yet queued.
    Ready = 1,
    /// In the ready queue, awaiting a worker.
    Queued = 2,
    /// A worker is running the step's callback.
    Executing = 3,
    /// The callback returned successfully.
    Succeeded = 4,
    /// The callback failed; the error is captured in the wrapper.
    Failed = 5,
    /// The task was abandoned before executing.
    Cancelled = 6,
}

impl TaskState {
    /// Returns `true` for `Succeeded`, `Failed` and `Cancelled`.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::NotReady,
            1 => Self::Ready,
            2 => Self::Queued,
            3 => Self::Executing,
            4 => Self::Succeeded,
            5 => Self::Failed,
            6 => Self::Cancelled,
            _ => unreachable!("TaskState::from_u8: {raw}"),
        }
    }
}

/// The atomic heart of a task wrapper: its lifecycle state and its
/// outstanding-predecessor counter.
///
/// Every transition is a compare-and-swap that reports whether the
/// calling thread effected the change, so concurrent readiness cascades
/// cannot double-enqueue a task and no state is ever revisited. The
/// cell is separate from the wrapper so the protocol can be
/// model-checked in isolation.
#[derive(Debug)]
pub struct LifecycleCell {
    state: AtomicU8,
    predecessors_remaining: AtomicUsize,
}

impl LifecycleCell {
    /// Creates a cell with the given number of outstanding
    /// predecessors. A task without predecessors starts out `Ready`.
    #[must_use]
    pub fn new(predecessor_count: usize) -> Self {
        let initial = if predecessor_count == 0 {
            TaskState::Ready
        } else {
            TaskState::NotReady
        };
        Self {
            state: AtomicU8::new(initial as u8),
            predecessors_remaining: AtomicUsize::new(predecessor_count),
        }
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> TaskState {
        TaskState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Returns `true` once every predecessor has settled.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.predecessors_remaining.load(Ordering::Acquire) == 0
    }

    /// Records the completion of one predecessor.
    ///
    /// Exactly one call observes the counter reach zero; that call also
    /// moves the state from `NotReady` to `Ready` and returns `true`.
    /// All other calls return `false`.
    pub fn decrement_predecessors(&self) -> bool {
        let previous = self.predecessors_remaining.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(previous > 0, "LifecycleCell::decrement_predecessors: [1]");
        previous == 1 && self.transition(TaskState::NotReady, TaskState::Ready)
    }

    /// `Ready → Queued`. Returns `true` if this call made the
    /// transition.
    pub fn try_queue(&self) -> bool {
        self.transition(TaskState::Ready, TaskState::Queued)
    }

    /// `Queued → Executing`. Returns `true` if this call made the
    /// transition.
    pub fn try_execute(&self) -> bool {
        self.transition(TaskState::Queued, TaskState::Executing)
    }

    /// `Executing → Succeeded | Failed`. Only the worker that won
    /// [`try_execute`](Self::try_execute) may call this.
    pub fn finish(&self, success: bool) {
        let terminal = if success {
            TaskState::Succeeded
        } else {
            TaskState::Failed
        };
        let moved = self.transition(TaskState::Executing, terminal);
        debug_assert!(moved, "LifecycleCell::finish: [1]");
    }

    /// `NotReady | Ready | Queued → Cancelled`. Returns `true` if this
    /// call cancelled the task; `false` if it was already executing or
    /// terminal.
    pub fn try_cancel(&self) -> bool {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            match TaskState::from_u8(current) {
                TaskState::NotReady | TaskState::Ready | TaskState::Queued => {}
                _ => return false,
            }
            match self.state.compare_exchange(
                current,
                TaskState::Cancelled as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(observed) => current = observed,
            }
        }
    }

    fn transition(&self, expected: TaskState, desired: TaskState) -> bool {
        self.state
            .compare_exchange(
                expected as u8,
                desired as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}

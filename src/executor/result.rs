use crate::executor::lifecycle::TaskState;
use crate::executor::task::TaskWrapper;
use crate::types::StepIdx;
use std::sync::Arc;
use std::time::Duration;

/// Outcome of running an execution plan.
///
/// The executor never raises from `execute`; everything an embedder
/// needs to know about a run is carried here. `error_messages` is
/// parallel to `failed_steps`. Per-step durations are present only when
/// the executor was configured to collect timing.
#[derive(Debug, Clone, Default)]
pub struct ExecutionResult {
    /// `true` if every step completed successfully.
    pub success: bool,
    /// `true` if a cooperative stop was requested during the run.
    pub stopped: bool,
    /// Steps whose callback failed (or that were found stuck in a
    /// non-settling state).
    pub failed_steps: Vec<StepIdx>,
    /// Human-readable failure descriptions, parallel to
    /// `failed_steps`.
    pub error_messages: Vec<String>,
    /// Steps that never began executing.
    pub cancelled_steps: Vec<StepIdx>,
    /// Steps that completed successfully.
    pub completed_steps: Vec<StepIdx>,
    /// Wall-clock duration of the whole run. Always reported.
    pub total_duration: Duration,
    /// Callback duration per step, indexed by [`StepIdx`]; zero for
    /// steps that did not complete. `None` unless timing collection
    /// was enabled.
    pub step_durations: Option<Vec<Duration>>,
}

impl ExecutionResult {
    /// Renders a one-line outcome summary for logging.
    #[must_use]
    pub fn summary(&self) -> String {
        let verdict = if self.success {
            "execution succeeded"
        } else if self.stopped {
            "execution stopped by request"
        } else {
            "execution failed"
        };
        format!(
            "{verdict} (completed={}, failed={}, cancelled={})",
            self.completed_steps.len(),
            self.failed_steps.len(),
            self.cancelled_steps.len()
        )
    }
}

/// Classifies every wrapper's final state into the result buckets.
///
/// A task found still `Executing` indicates a scheduling invariant was
/// broken; it is recorded as failed with an "unknown state" message
/// rather than dropped.
pub(crate) fn assemble_result(
    wrappers: &[Arc<TaskWrapper>],
    stopped: bool,
    collect_timing: bool,
    total_duration: Duration,
) -> ExecutionResult {
    let mut result = ExecutionResult {
        stopped,
        total_duration,
        step_durations: collect_timing.then(|| vec![Duration::ZERO; wrappers.len()]),
        ..ExecutionResult::default()
    };

    for task in wrappers {
        let step_idx = task.step_idx();
        match task.state() {
            TaskState::Succeeded => {
                result.completed_steps.push(step_idx);
                if let Some(durations) = &mut result.step_durations {
                    durations[step_idx] = task.duration();
                }
            }
            TaskState::Failed => {
                result.failed_steps.push(step_idx);
                let message = task
                    .take_failure()
                    .map_or_else(|| "unknown error".to_owned(), |error| error.to_string());
                result.error_messages.push(message);
            }
            TaskState::Executing => {
                result.failed_steps.push(step_idx);
                result
                    .error_messages
                    .push("task stuck in unknown state".to_owned());
            }
            TaskState::Cancelled | TaskState::NotReady | TaskState::Ready | TaskState::Queued => {
                result.cancelled_steps.push(step_idx);
            }
        }
    }

    result.success = result.failed_steps.is_empty() && result.cancelled_steps.is_empty();
    result
}

use crate::graph::export::DataInfo;
use crate::step::{Data, Step};
use crate::types::{DataIdx, StepIdx, Token, Usage};
use derive_more::Debug;
use std::sync::Arc;

/// Immutable execution plan produced by
/// [`GraphBuilder::build`](crate::builder::GraphBuilder::build).
///
/// Contains everything an executor needs to run a validated graph:
/// the step handles in index order, one data handle per field
/// equivalence class, predecessor counts and deduplicated successor
/// lists derived from the combined step links, the per-step access
/// rights, and the authorization tokens (token 0 is reserved for the
/// graph; steps hold `1..=N`).
///
/// The plan shares ownership of the steps and data objects with every
/// holder; execution state lives outside of it (in the per-run task
/// wrappers), so one plan may be executed repeatedly.
#[must_use]
#[derive(Debug)]
pub struct ExecutionPlan {
    /// Step handles, indexed by [`StepIdx`].
    #[debug(skip)]
    pub steps: Vec<Arc<dyn Step>>,
    /// Data handles, indexed by [`DataIdx`]; one per field equivalence
    /// class.
    #[debug(skip)]
    pub data_objects: Vec<Arc<dyn Data>>,
    /// Number of distinct predecessors of each step. Steps with count 0
    /// are immediately ready.
    pub predecessor_counts: Vec<usize>,
    /// Deduplicated successor lists: `successors[s]` holds every step
    /// that must wait for `s`, each exactly once.
    pub successors: Vec<Vec<StepIdx>>,
    /// Authorization token of each step.
    pub step_tokens: Vec<Token>,
    /// Token reserved for graph-level operations.
    pub graph_token: Token,
    /// Per step: the data objects it may access and with which usage.
    pub step_access_rights: Vec<Vec<(DataIdx, Usage)>>,
    /// Descriptors of every data object, for reference during
    /// execution.
    pub data_infos: Vec<DataInfo>,
}

impl ExecutionPlan {
    /// Returns the number of steps in the plan.
    #[must_use]
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Returns the number of data objects in the plan.
    #[must_use]
    pub fn data_count(&self) -> usize {
        self.data_objects.len()
    }

    /// Returns the indices of every step with no predecessors.
    #[must_use]
    pub fn initial_ready_steps(&self) -> Vec<StepIdx> {
        self.predecessor_counts
            .iter()
            .enumerate()
            .filter(|&(_, &count)| count == 0)
            .map(|(step, _)| step)
            .collect()
    }
}

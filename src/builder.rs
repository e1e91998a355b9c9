use crate::error::GraphError;
use crate::graph::diagnostics::GraphDiagnostics;
use crate::graph::GraphCore;
use crate::plan::ExecutionPlan;
use crate::registry::HandleRegistry;
use crate::step::{Data, Field, Step};
use crate::types::{DataIdx, IndexSet, StepIdx, Token, TrustLevel, Usage};
use derive_more::Debug;
use std::sync::Arc;
use tracing::debug;

/// Bridges user step and field handles to the index-keyed
/// [`GraphCore`] and materializes an [`ExecutionPlan`].
///
/// The builder owns the core and two [`HandleRegistry`]s which
/// deduplicate handles by address: registering the same step or field
/// twice is a no-op, and any handle reachable from a link or a field is
/// registered on first sight.
///
/// Workflow:
/// 1. [`add_step`](Self::add_step) registers a step and all fields it
///    exposes.
/// 2. [`link_steps`](Self::link_steps) /
///    [`link_fields`](Self::link_fields) add ordering constraints and
///    data-identity declarations.
/// 3. [`build`](Self::build) seals the graph, validates it, and
///    produces the plan. `build` consumes the builder.
///
/// Not thread-safe; callers synchronize externally.
#[must_use]
#[derive(Debug)]
pub struct GraphBuilder {
    core: GraphCore,
    #[debug(skip)]
    steps: HandleRegistry<dyn Step>,
    #[debug(skip)]
    fields: HandleRegistry<dyn Field>,
}

impl GraphBuilder {
    /// Creates a builder.
    ///
    /// With `eager_validation` the underlying core rejects CRD and
    /// cycle violations at the offending call; otherwise they surface at
    /// [`build`](Self::build) (or through
    /// [`diagnostics`](Self::diagnostics)).
    pub fn new(eager_validation: bool) -> Self {
        Self {
            core: GraphCore::new(eager_validation),
            steps: HandleRegistry::new(),
            fields: HandleRegistry::new(),
        }
    }

    /// Returns the number of registered steps.
    #[must_use]
    pub fn step_count(&self) -> usize {
        self.core.step_count()
    }

    /// Returns the number of registered fields.
    #[must_use]
    pub fn field_count(&self) -> usize {
        self.core.field_count()
    }

    /// Registers a step and every field it exposes.
    ///
    /// Re-adding an already-known step is a no-op (its fields are still
    /// re-offered to the field registry, where duplicates are no-ops as
    /// well).
    ///
    /// # Errors
    /// Any [`GraphError`] the core raises while registering, e.g. an
    /// eager CRD violation among the step's own fields.
    pub fn add_step(&mut self, step: &Arc<dyn Step>) -> Result<(), GraphError> {
        let step_idx = self.steps.insert(step);
        if step_idx == self.core.step_count() {
            self.core.add_step(step_idx)?;
        }
        for field in step.fields() {
            self.add_field(&field)?;
        }
        Ok(())
    }

    /// Registers a field, registering its owning step first if needed.
    ///
    /// The owning step is always taken from the field handle itself, so
    /// a field can never be recorded against the wrong step.
    ///
    /// # Errors
    /// Any [`GraphError`] the core raises while registering.
    pub fn add_field(&mut self, field: &Arc<dyn Field>) -> Result<(), GraphError> {
        let step = field.step();
        let step_idx = self.steps.insert(&step);
        if step_idx == self.core.step_count() {
            self.core.add_step(step_idx)?;
        }
        let field_idx = self.fields.insert(field);
        if field_idx == self.core.field_count() {
            self.core
                .add_field(step_idx, field_idx, field.type_tag(), field.usage())?;
        }
        Ok(())
    }

    /// Adds an explicit ordering constraint between two steps,
    /// registering unknown handles on the way.
    ///
    /// # Errors
    /// Any [`GraphError`] the core raises, e.g.
    /// [`GraphError::CycleDetected`].
    pub fn link_steps(
        &mut self,
        before: &Arc<dyn Step>,
        after: &Arc<dyn Step>,
        trust: TrustLevel,
    ) -> Result<(), GraphError> {
        self.add_step(before)?;
        self.add_step(after)?;
        let before_idx = self
            .steps
            .find(before)
            .expect("GraphBuilder::link_steps: [1]");
        let after_idx = self
            .steps
            .find(after)
            .expect("GraphBuilder::link_steps: [2]");
        self.core.link_steps(before_idx, after_idx, trust)
    }

    /// Declares that two fields refer to the same data object,
    /// registering unknown handles on the way.
    ///
    /// # Errors
    /// Any [`GraphError`] the core raises, e.g.
    /// [`GraphError::TypeMismatch`] or an eager CRD violation.
    pub fn link_fields(
        &mut self,
        first: &Arc<dyn Field>,
        second: &Arc<dyn Field>,
        trust: TrustLevel,
    ) -> Result<(), GraphError> {
        self.add_field(first)?;
        self.add_field(second)?;
        let first_idx = self
            .fields
            .find(first)
            .expect("GraphBuilder::link_fields: [1]");
        let second_idx = self
            .fields
            .find(second)
            .expect("GraphBuilder::link_fields: [2]");
        self.core.link_fields(first_idx, second_idx, trust)
    }

    /// Runs a validation pass without building.
    ///
    /// With `treat_as_sealed`, a data object lacking a Create field is
    /// reported as an error instead of a warning.
    #[must_use]
    pub fn diagnostics(&self, treat_as_sealed: bool) -> GraphDiagnostics {
        self.core.get_diagnostics(treat_as_sealed)
    }

    /// Seals the graph, validates it, and composes the execution plan.
    ///
    /// Consumes the builder; a built graph is finished with.
    ///
    /// # Errors
    /// [`GraphError::ValidationFailed`] carrying the full diagnostics
    /// report if the sealed validation pass finds errors.
    pub fn build(self) -> Result<ExecutionPlan, GraphError> {
        let diagnostics = self.core.get_diagnostics(true);
        if !diagnostics.is_valid() {
            return Err(GraphError::ValidationFailed { diagnostics });
        }

        let exported = self.core.export_graph()?;
        let step_count = self.core.step_count();

        let steps: Vec<Arc<dyn Step>> = (0..step_count)
            .map(|step_idx| {
                self.steps
                    .at(step_idx)
                    .expect("GraphBuilder::build: [1]")
            })
            .collect();

        // One concrete data handle per data object, taken from any
        // member field of its class.
        let data_objects: Vec<Arc<dyn Data>> = exported
            .data_infos
            .iter()
            .map(|info| {
                let (_, field_idx, _) = *info
                    .field_usages
                    .first()
                    .expect("GraphBuilder::build: [2]");
                self.fields
                    .at(field_idx)
                    .expect("GraphBuilder::build: [3]")
                    .data()
            })
            .collect();

        // Repeated edges constrain execution only once.
        let distinct_links: IndexSet<(StepIdx, StepIdx)> =
            exported.combined_step_links.iter().copied().collect();
        let mut predecessor_counts = vec![0usize; step_count];
        let mut successors: Vec<Vec<StepIdx>> = vec![Vec::new(); step_count];
        for &(before, after) in &distinct_links {
            predecessor_counts[after] += 1;
            successors[before].push(after);
        }

        let mut step_access_rights: Vec<Vec<(DataIdx, Usage)>> = vec![Vec::new(); step_count];
        for info in &exported.data_infos {
            for &(step_idx, _, usage) in &info.field_usages {
                step_access_rights[step_idx].push((info.data_idx, usage));
            }
        }

        let graph_token = 0;
        let step_tokens: Vec<Token> = (1..=step_count).collect();

        debug!(
            steps = step_count,
            data_objects = data_objects.len(),
            links = distinct_links.len(),
            "built execution plan"
        );

        Ok(ExecutionPlan {
            steps,
            data_objects,
            predecessor_counts,
            successors,
            step_tokens,
            graph_token,
            step_access_rights,
            data_infos: exported.data_infos,
        })
    }
}

use crate::graph::diagnostics::GraphDiagnostics;
use crate::types::{FieldIdx, StepIdx};
use thiserror::Error;

/// Error raised by [`GraphCore`](crate::graph::GraphCore) mutations and
/// by [`GraphBuilder::build`](crate::builder::GraphBuilder::build).
///
/// Index and type errors are raised at the offending call site in both
/// validation modes. The CRD and cycle variants are raised at the call
/// site only in eager mode; in deferred mode the same conditions surface
/// as diagnostics, and at build time as [`ValidationFailed`]
/// (Self::ValidationFailed) carrying the full report.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GraphError {
    /// A step index did not match the expected registration sequence or
    /// referenced a step that does not exist.
    #[error("step index {index} is invalid; the graph has {step_count} steps")]
    InvalidStepIndex {
        /// The offending index.
        index: StepIdx,
        /// The step count at the time of the call.
        step_count: usize,
    },
    /// A step index was registered a second time.
    #[error("step index {index} already exists")]
    DuplicateStepIndex {
        /// The offending index.
        index: StepIdx,
    },
    /// A field index did not match the expected registration sequence or
    /// referenced a field that does not exist.
    #[error("field index {index} is invalid; the graph has {field_count} fields")]
    InvalidFieldIndex {
        /// The offending index.
        index: FieldIdx,
        /// The field count at the time of the call.
        field_count: usize,
    },
    /// A field index was registered a second time.
    #[error("field index {index} already exists")]
    DuplicateFieldIndex {
        /// The offending index.
        index: FieldIdx,
    },
    /// Two fields with different value types were linked.
    #[error("cannot link fields {first} and {second}: value types differ")]
    TypeMismatch {
        /// The first linked field.
        first: FieldIdx,
        /// The second linked field.
        second: FieldIdx,
    },
    /// Linking would give one data object more than one Create field.
    #[error("link would give one data object multiple Create fields: {fields:?}")]
    MultipleCreate {
        /// Every Create field of the would-be merged class.
        fields: Vec<FieldIdx>,
    },
    /// Linking would give one data object more than one Destroy field.
    #[error("link would give one data object multiple Destroy fields: {fields:?}")]
    MultipleDestroy {
        /// Every Destroy field of the would-be merged class.
        fields: Vec<FieldIdx>,
    },
    /// Linking would give one step conflicting usages of one data
    /// object. Multiple Reads are the only permitted combination.
    #[error("step {step} would hold conflicting usages of one data object via fields {fields:?}")]
    UnsafeSelfAliasing {
        /// The step with conflicting usages.
        step: StepIdx,
        /// Its fields in the would-be merged class.
        fields: Vec<FieldIdx>,
    },
    /// An ordering constraint would close a cycle.
    #[error("ordering step {before} before step {after} would create a cycle")]
    CycleDetected {
        /// Source of the offending edge.
        before: StepIdx,
        /// Target of the offending edge.
        after: StepIdx,
    },
    /// The graph was exported while it still had validation errors.
    #[error("cannot export a graph with unresolved validation errors")]
    InvalidState,
    /// Build-time validation found errors. Carries the complete report
    /// for programmatic inspection.
    #[error("graph validation failed\n{diagnostics}")]
    ValidationFailed {
        /// The full diagnostics report.
        diagnostics: GraphDiagnostics,
    },
}

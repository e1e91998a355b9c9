//! Build-and-run engine for typed task graphs with Create/Read/Destroy
//! (CRD) data semantics.
//!
//! This crate lets a user declaratively register *steps* (units of
//! work) and *fields* (each step's typed access to a logical data
//! object), optionally add explicit step-ordering links, and then
//! validate and execute the resulting graph. The engine's contract:
//! every data object has exactly one producer, any number of readers,
//! and at most one destroyer; execution order is derived from these
//! semantics; any input whose combined explicit and implicit
//! constraints would form a cycle or violate the CRD rules is refused;
//! and the resulting directed acyclic task graph runs with its
//! dependencies respected, single-threaded or in parallel.
//!
//! Key modules:
//! - `builder`: the [`GraphBuilder`](builder::GraphBuilder) entry
//!   point, mapping user handles to indices and emitting an execution
//!   plan.
//! - `graph`: the index-keyed [`GraphCore`](graph::GraphCore) with
//!   eager or deferred validation, structured diagnostics with blame
//!   ranking, and graph export.
//! - `plan`: the immutable [`ExecutionPlan`](plan::ExecutionPlan).
//! - `executor`: the [`Executor`](executor::Executor) interface with a
//!   single-threaded reference implementation and a shared-queue
//!   parallel implementation, plus the per-task lifecycle machinery.
//! - `step`: the boundary traits user code implements
//!   ([`Step`](step::Step), [`Field`](step::Field),
//!   [`Data`](step::Data)).
//! - `union_find`, `value_box`, `identity_key`, `registry`: the
//!   supporting structures (iterable disjoint-set, type-erased value
//!   box, address-identity key, strong/weak handle registry).
//!
//! Quick start:
//! 1. Implement [`Step`](step::Step) (with its
//!    [`Field`](step::Field)s and [`Data`](step::Data)) for your work
//!    units.
//! 2. Register everything with a
//!    [`GraphBuilder`](builder::GraphBuilder), linking fields that
//!    refer to the same data and adding any explicit ordering.
//! 3. Call [`build`](builder::GraphBuilder::build) to validate and
//!    obtain a plan, then run it through
//!    [`new_executor`](executor::new_executor).
//!
//! A graph that fails to build surfaces one
//! [`ValidationFailed`](error::GraphError::ValidationFailed) error
//! enumerating every problem, with the structured diagnostics attached
//! for programmatic inspection. A graph that runs never raises:
//! failures, cancellations and timings are carried in the
//! [`ExecutionResult`](executor::ExecutionResult).

/// The [`GraphBuilder`](builder::GraphBuilder) bridging user handles to
/// the index-keyed core and composing execution plans.
pub mod builder;
/// Hard-failure taxonomy of graph construction and building.
pub mod error;
/// Executors, the task-wrapper lifecycle machinery, and execution
/// results.
pub mod executor;
/// The index-keyed graph core: incremental state, validation,
/// diagnostics, export.
pub mod graph;
/// Non-owning address-identity keys.
pub mod identity_key;
/// The immutable execution plan.
pub mod plan;
/// Insertion-ordered handle registry with strong/weak storage
/// switching.
pub mod registry;
/// Boundary traits implemented by user step, field and data types.
pub mod step;
mod sync;
/// Index aliases, CRD usage and trust-level enums, link records.
pub mod types;
/// Iterable disjoint-set with O(class size) member enumeration.
pub mod union_find;
/// Shared-ownership type-erased value container.
pub mod value_box;

pub use builder::GraphBuilder;
pub use error::GraphError;
pub use executor::{new_executor, ExecutionResult, Executor, ExecutorConfig};
pub use plan::ExecutionPlan;
pub use step::{Data, Field, Step, StepError};
pub use types::{DataIdx, FieldIdx, StepIdx, Token, TrustLevel, Usage};

use crate::types::{Token, Usage};
use crate::value_box::ValueBox;
use core::any::TypeId;
use std::error::Error;
use std::sync::Arc;
use thiserror::Error as ThisError;

/// Structured failure value produced by user step code.
///
/// Replaces in-band unwinding as the failure signal: the executor
/// captures a `StepError` into the task's failure slot and carries its
/// message into the execution result, so failures cross worker threads
/// as plain values.
#[derive(Debug, ThisError)]
#[error("{message}")]
pub struct StepError {
    message: String,
    #[source]
    source: Option<Box<dyn Error + Send + Sync>>,
}

impl StepError {
    /// Creates a failure with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Attaches an underlying cause.
    #[must_use]
    pub fn with_source(mut self, source: impl Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Returns the failure message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// A unit of work in the graph.
///
/// Steps are registered once with the
/// [`GraphBuilder`](crate::builder::GraphBuilder); their declared
/// [`fields`](Self::fields) are read a single time at registration. At
/// run time the executor invokes [`execute`](Self::execute) once all of
/// the step's predecessors have settled; the call may block for I/O but
/// must not mutate the graph or wait on another task of the same plan.
pub trait Step: Send + Sync {
    /// Runs the step's work. Returning `Err` marks the task as failed;
    /// the error never propagates to other tasks.
    fn execute(&self) -> Result<(), StepError>;

    /// The fields this step owns, in declaration order.
    fn fields(&self) -> Vec<Arc<dyn Field>>;

    /// The implementing type's name, for diagnostics and logs.
    fn class_name(&self) -> &str;

    /// A human-readable display name.
    fn friendly_name(&self) -> String {
        self.class_name().to_owned()
    }

    /// A name unique among the steps of one graph.
    fn unique_name(&self) -> String {
        self.class_name().to_owned()
    }
}

/// A step's typed access to one logical data object.
///
/// A field binds its owning step, a concrete data handle, a type tag
/// covariant with the stored value type, and a CRD [`Usage`]. Fields are
/// immutable after registration.
pub trait Field: Send + Sync {
    /// The step this field belongs to.
    fn step(&self) -> Arc<dyn Step>;

    /// The concrete data object this field accesses.
    fn data(&self) -> Arc<dyn Data>;

    /// Type tag of the value flowing through this field. Fields linked
    /// into one equivalence class must agree on it; the usual
    /// implementation is `TypeId::of::<T>()` for the value type `T`.
    fn type_tag(&self) -> TypeId;

    /// How this field accesses the data object.
    fn usage(&self) -> Usage;
}

/// A logical data object shared by the fields of one equivalence class.
///
/// Access is authorized by the [`Token`] the execution plan assigned to
/// the calling step. Thread-safety contract: `set_value` (Create) and
/// `remove_value` (Destroy) calls are exclusive by construction of the
/// plan's ordering edges; `get_value` (Read) calls may run concurrently
/// with one another, so implementations need at most a reader-writer
/// discipline.
pub trait Data: Send + Sync {
    /// Stores the produced value. Called by the creating step.
    fn set_value(&self, token: Token, value: ValueBox) -> Result<(), StepError>;

    /// Returns the current value. Called by reading steps.
    fn get_value(&self, token: Token) -> Result<ValueBox, StepError>;

    /// Consumes the value. Called by the destroying step.
    fn remove_value(&self, token: Token) -> Result<ValueBox, StepError>;
}

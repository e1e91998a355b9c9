use derive_more::Display;
use indexmap::{IndexMap as _IndexMap, IndexSet as _IndexSet};
use rustc_hash::FxBuildHasher;
use std::collections::{HashMap as _HashMap, HashSet as _HashSet};

/// Index of a step (a unit of work) in the graph.
///
/// Steps are densely numbered in registration order, starting from 0.
/// The alias exists for clarity in API signatures, not for compile-time
/// type safety.
pub type StepIdx = usize;

/// Index of a field (a step's typed access to one data object).
///
/// Fields are densely numbered in registration order, starting from 0.
pub type FieldIdx = usize;

/// Index of a data object in an exported graph.
///
/// Data objects emerge from field equivalence classes at export time and
/// are densely numbered in discovery order. Fields that are linked
/// together share the same `DataIdx`.
pub type DataIdx = usize;

/// Opaque authorization value granted to each step for accessing its
/// declared data objects. Token 0 is reserved for the graph itself;
/// steps receive tokens `1..=N`.
pub type Token = usize;

/// How a field accesses its data object.
///
/// The usage values are totally ordered: `Create < Read < Destroy`. Any
/// two distinct usages of the same data object by different steps impose
/// an implicit execution-order edge from the lower usage to the higher
/// one. Each data object must have exactly one `Create` (enforced when
/// the graph is sealed), may have any number of `Read`s, and at most one
/// `Destroy`.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Usage {
    /// Produces the data object. Exactly one per data object.
    Create,
    /// Reads the data object. Reads of the same data may run concurrently.
    Read,
    /// Consumes the data object. At most one per data object; ordered
    /// after every reader.
    Destroy,
}

/// Confidence assigned to a user-issued link, used only for ranking
/// diagnostic blame.
///
/// When validation detects an issue, the links touching it are reported
/// ordered by trust ascending, so the least-trusted links are suspected
/// first. Trust never affects whether a graph is valid.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TrustLevel {
    /// Most likely to be blamed when issues are detected.
    Low,
    /// Moderate confidence.
    Middle,
    /// Least likely to be blamed.
    High,
}

/// An explicit execution-order constraint between two steps, as issued
/// by the user: `before` must complete before `after` may start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepLink {
    /// The step that must execute first.
    pub before: StepIdx,
    /// The step that must execute after.
    pub after: StepIdx,
    /// Blame-ranking hint for this link.
    pub trust: TrustLevel,
}

/// A user-issued declaration that two fields refer to the same data
/// object, uniting their equivalence classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldLink {
    /// The first linked field.
    pub first: FieldIdx,
    /// The second linked field.
    pub second: FieldIdx,
    /// Blame-ranking hint for this link.
    pub trust: TrustLevel,
}

pub(crate) type HashMap<K, V> = _HashMap<K, V, FxBuildHasher>;
pub(crate) type HashSet<T> = _HashSet<T, FxBuildHasher>;
/// `IndexMap` type with fast hasher.
pub type IndexMap<K, V> = _IndexMap<K, V, FxBuildHasher>;
pub(crate) type IndexSet<T> = _IndexSet<T, FxBuildHasher>;

pub mod diagnostics;
pub mod export;

use crate::error::GraphError;
use crate::types::{FieldIdx, FieldLink, HashSet, IndexMap, StepIdx, StepLink, TrustLevel, Usage};
use crate::union_find::IterableUnionFind;
use core::any::TypeId;
use std::collections::VecDeque;

/// Index-keyed core of the task graph.
///
/// `GraphCore` maintains steps (units of work), fields (typed data
/// access points), explicit step-ordering links, and field equivalence
/// classes, validating the Create/Read/Destroy invariants either eagerly
/// on every mutation or deferred until a diagnostics pass.
///
/// The caller manages the actual step and field objects externally
/// (typically in a [`HandleRegistry`](crate::registry::HandleRegistry))
/// and passes dense indices here; indices must be registered
/// sequentially starting from 0. The usual driver is
/// [`GraphBuilder`](crate::builder::GraphBuilder).
///
/// Construction workflow:
/// 1. [`add_step`](Self::add_step) for each unit of work,
/// 2. [`add_field`](Self::add_field) for each step's data access,
/// 3. [`link_steps`](Self::link_steps) for explicit ordering,
/// 4. [`link_fields`](Self::link_fields) to declare that two fields
///    refer to the same data object (which induces implicit ordering
///    from their usages: `Create < Read < Destroy`),
/// 5. [`get_diagnostics`](Self::get_diagnostics) /
///    [`export_graph`](Self::export_graph).
///
/// In eager mode the CRD and cycle violations a single mutation can
/// introduce are rejected at the call site, leaving the state exactly as
/// it was before the call. In deferred mode only index and type errors
/// are raised eagerly; everything else is reported by the diagnostics
/// pass.
///
/// Not thread-safe; callers synchronize externally. Reads through
/// `&self` are safe in the absence of concurrent writers.
#[must_use]
#[derive(Debug)]
pub struct GraphCore {
    eager_validation: bool,
    /// Field indices owned by each step. Indexed by step.
    step_fields: Vec<Vec<FieldIdx>>,
    /// Owning step of each field. Indexed by field.
    field_owner_step: Vec<StepIdx>,
    /// Value type tag of each field. Indexed by field.
    field_types: Vec<TypeId>,
    /// Usage of each field. Indexed by field.
    field_usages: Vec<Usage>,
    /// Explicit step links in insertion order. Duplicates permitted;
    /// each contributes independently to blame ranking.
    explicit_step_links: Vec<StepLink>,
    /// Field links in insertion order, including redundant links kept
    /// for blame bookkeeping.
    field_links: Vec<FieldLink>,
    /// Field equivalence classes.
    field_classes: IterableUnionFind<usize>,
    /// Step successor adjacency. Populated only in eager mode, where it
    /// backs the incremental cycle checks.
    step_successors: Vec<Vec<StepIdx>>,
}

impl GraphCore {
    /// Creates an empty graph core.
    ///
    /// With `eager_validation`, every mutation is checked against the
    /// CRD and acyclicity invariants at the call site; otherwise those
    /// checks are deferred to [`get_diagnostics`](Self::get_diagnostics)
    /// and [`export_graph`](Self::export_graph).
    pub fn new(eager_validation: bool) -> Self {
        Self {
            eager_validation,
            step_fields: Vec::new(),
            field_owner_step: Vec::new(),
            field_types: Vec::new(),
            field_usages: Vec::new(),
            explicit_step_links: Vec::new(),
            field_links: Vec::new(),
            field_classes: IterableUnionFind::new(),
            step_successors: Vec::new(),
        }
    }

    /// Returns the number of registered steps.
    #[must_use]
    pub fn step_count(&self) -> usize {
        self.step_fields.len()
    }

    /// Returns the number of registered fields.
    #[must_use]
    pub fn field_count(&self) -> usize {
        self.field_owner_step.len()
    }

    /// Returns `true` if this core validates eagerly.
    #[must_use]
    pub fn is_eager(&self) -> bool {
        self.eager_validation
    }

    /// Registers the next step.
    ///
    /// `step_idx` must equal the current [`step_count`](Self::step_count).
    ///
    /// # Errors
    /// [`GraphError::DuplicateStepIndex`] if the index was registered
    /// before, [`GraphError::InvalidStepIndex`] if it skips ahead.
    pub fn add_step(&mut self, step_idx: StepIdx) -> Result<(), GraphError> {
        let step_count = self.step_count();
        if step_idx != step_count {
            if step_idx < step_count {
                return Err(GraphError::DuplicateStepIndex { index: step_idx });
            }
            return Err(GraphError::InvalidStepIndex {
                index: step_idx,
                step_count,
            });
        }
        self.step_fields.push(Vec::new());
        self.step_successors.push(Vec::new());
        Ok(())
    }

    /// Registers the next field for an existing step.
    ///
    /// `field_idx` must equal the current
    /// [`field_count`](Self::field_count). The field starts out as a
    /// singleton equivalence class.
    ///
    /// # Errors
    /// [`GraphError::InvalidStepIndex`] if `step_idx` does not exist,
    /// [`GraphError::DuplicateFieldIndex`] /
    /// [`GraphError::InvalidFieldIndex`] on a bad field index.
    pub fn add_field(
        &mut self,
        step_idx: StepIdx,
        field_idx: FieldIdx,
        type_tag: TypeId,
        usage: Usage,
    ) -> Result<(), GraphError> {
        self.check_step_index(step_idx)?;
        let field_count = self.field_count();
        if field_idx != field_count {
            if field_idx < field_count {
                return Err(GraphError::DuplicateFieldIndex { index: field_idx });
            }
            return Err(GraphError::InvalidFieldIndex {
                index: field_idx,
                field_count,
            });
        }

        self.step_fields[step_idx].push(field_idx);
        self.field_owner_step.push(step_idx);
        self.field_types.push(type_tag);
        self.field_usages.push(usage);
        let class = self
            .field_classes
            .make_set()
            .expect("GraphCore::add_field: [1]");
        assert_eq!(class, field_idx, "GraphCore::add_field: [2]");
        Ok(())
    }

    /// Records an explicit ordering constraint: `before` must complete
    /// before `after` starts.
    ///
    /// Duplicate links are permitted and contribute independently to
    /// blame ranking.
    ///
    /// # Errors
    /// [`GraphError::InvalidStepIndex`] on a bad index.
    /// [`GraphError::CycleDetected`] on a self-loop (both modes), or in
    /// eager mode when `after` already reaches `before`.
    pub fn link_steps(
        &mut self,
        before: StepIdx,
        after: StepIdx,
        trust: TrustLevel,
    ) -> Result<(), GraphError> {
        self.check_step_index(before)?;
        self.check_step_index(after)?;
        if before == after {
            return Err(GraphError::CycleDetected { before, after });
        }
        if self.eager_validation && self.reaches(after, before, &[]) {
            return Err(GraphError::CycleDetected { before, after });
        }

        self.explicit_step_links.push(StepLink {
            before,
            after,
            trust,
        });
        if self.eager_validation {
            self.step_successors[before].push(after);
        }
        Ok(())
    }

    /// Declares that two fields refer to the same data object, uniting
    /// their equivalence classes.
    ///
    /// A self-link is a no-op. Linking fields already in one class
    /// records the redundant link (for blame bookkeeping) and returns.
    ///
    /// In eager mode the merge is vetted first: the combined class may
    /// hold at most one Create and one Destroy; every step touching the
    /// merged class must do so with a single usage or all-Read usages;
    /// and none of the implicit edges induced across the two classes may
    /// close a cycle. On any violation the state is left exactly as it
    /// was before the call.
    ///
    /// # Errors
    /// [`GraphError::InvalidFieldIndex`] on a bad index,
    /// [`GraphError::TypeMismatch`] if the value types differ (both
    /// modes), and in eager mode [`GraphError::MultipleCreate`],
    /// [`GraphError::MultipleDestroy`],
    /// [`GraphError::UnsafeSelfAliasing`] or
    /// [`GraphError::CycleDetected`].
    pub fn link_fields(
        &mut self,
        first: FieldIdx,
        second: FieldIdx,
        trust: TrustLevel,
    ) -> Result<(), GraphError> {
        self.check_field_index(first)?;
        self.check_field_index(second)?;
        if first == second {
            return Ok(());
        }
        if self.field_types[first] != self.field_types[second] {
            return Err(GraphError::TypeMismatch { first, second });
        }

        let link = FieldLink {
            first,
            second,
            trust,
        };

        if self
            .field_classes
            .same_class(first, second)
            .expect("GraphCore::link_fields: [1]")
        {
            self.field_links.push(link);
            return Ok(());
        }

        let induced = if self.eager_validation {
            self.vet_merge(first, second)?
        } else {
            Vec::new()
        };

        for &(from, to) in &induced {
            self.step_successors[from].push(to);
        }
        self.field_classes
            .unite(first, second)
            .expect("GraphCore::link_fields: [2]");
        self.field_links.push(link);
        Ok(())
    }

    /// Checks a class merge against the CRD and acyclicity invariants
    /// without mutating anything, returning the implicit edges the merge
    /// induces across the two classes.
    fn vet_merge(
        &self,
        first: FieldIdx,
        second: FieldIdx,
    ) -> Result<Vec<(StepIdx, StepIdx)>, GraphError> {
        let members_one = self
            .field_classes
            .class_members(first)
            .expect("GraphCore::vet_merge: [1]");
        let members_two = self
            .field_classes
            .class_members(second)
            .expect("GraphCore::vet_merge: [2]");

        let mut creates = Vec::new();
        let mut destroys = Vec::new();
        let mut step_usages: IndexMap<StepIdx, Vec<FieldIdx>> = IndexMap::default();
        for &field in members_one.iter().chain(&members_two) {
            match self.field_usages[field] {
                Usage::Create => creates.push(field),
                Usage::Destroy => destroys.push(field),
                Usage::Read => {}
            }
            step_usages
                .entry(self.field_owner_step[field])
                .or_default()
                .push(field);
        }

        if creates.len() > 1 {
            return Err(GraphError::MultipleCreate { fields: creates });
        }
        if destroys.len() > 1 {
            return Err(GraphError::MultipleDestroy { fields: destroys });
        }
        for (&step, fields) in &step_usages {
            if fields.len() > 1
                && fields
                    .iter()
                    .any(|&field| self.field_usages[field] != Usage::Read)
            {
                return Err(GraphError::UnsafeSelfAliasing {
                    step,
                    fields: fields.clone(),
                });
            }
        }

        // Implicit edges arise only across the two classes; edges inside
        // each class were vetted when those links were made.
        let mut induced = Vec::new();
        for &a in &members_one {
            for &b in &members_two {
                let step_a = self.field_owner_step[a];
                let step_b = self.field_owner_step[b];
                if step_a == step_b {
                    continue;
                }
                let (from, to) = match self.field_usages[a].cmp(&self.field_usages[b]) {
                    core::cmp::Ordering::Less => (step_a, step_b),
                    core::cmp::Ordering::Greater => (step_b, step_a),
                    core::cmp::Ordering::Equal => continue,
                };
                if self.reaches(to, from, &induced) {
                    return Err(GraphError::CycleDetected {
                        before: from,
                        after: to,
                    });
                }
                induced.push((from, to));
            }
        }

        Ok(induced)
    }

    /// Breadth-first reachability over the successor adjacency plus a
    /// set of extra candidate edges. Only meaningful in eager mode,
    /// where the adjacency is maintained.
    fn reaches(&self, from: StepIdx, to: StepIdx, extra: &[(StepIdx, StepIdx)]) -> bool {
        if from == to {
            return true;
        }
        let mut visited: HashSet<StepIdx> = HashSet::default();
        let mut queue = VecDeque::new();
        visited.insert(from);
        queue.push_back(from);
        while let Some(step) = queue.pop_front() {
            let direct = self.step_successors[step].iter().copied();
            let extras = extra
                .iter()
                .filter(|&&(source, _)| source == step)
                .map(|&(_, target)| target);
            for successor in direct.chain(extras) {
                if successor == to {
                    return true;
                }
                if visited.insert(successor) {
                    queue.push_back(successor);
                }
            }
        }
        false
    }

    /// Collects the implicit step links a class induces: the
    /// Create→Read, Create→Destroy and Read→Destroy cross products,
    /// skipping pairs on one step.
    fn implicit_links_of_class(&self, members: &[FieldIdx], out: &mut Vec<(StepIdx, StepIdx)>) {
        let mut create_steps = Vec::new();
        let mut read_steps = Vec::new();
        let mut destroy_steps = Vec::new();
        for &field in members {
            let step = self.field_owner_step[field];
            match self.field_usages[field] {
                Usage::Create => create_steps.push(step),
                Usage::Read => read_steps.push(step),
                Usage::Destroy => destroy_steps.push(step),
            }
        }

        for &create in &create_steps {
            for &read in &read_steps {
                if create != read {
                    out.push((create, read));
                }
            }
        }
        for &create in &create_steps {
            for &destroy in &destroy_steps {
                if create != destroy {
                    out.push((create, destroy));
                }
            }
        }
        for &read in &read_steps {
            for &destroy in &destroy_steps {
                if read != destroy {
                    out.push((read, destroy));
                }
            }
        }
    }

    /// Groups every field by its equivalence-class root, in field
    /// discovery order.
    fn equivalence_classes(&self) -> IndexMap<FieldIdx, Vec<FieldIdx>> {
        let mut classes: IndexMap<FieldIdx, Vec<FieldIdx>> = IndexMap::default();
        for field in 0..self.field_count() {
            let root = self
                .field_classes
                .class_root(field)
                .expect("GraphCore::equivalence_classes: [1]");
            classes.entry(root).or_default().push(field);
        }
        classes
    }

    fn check_step_index(&self, step_idx: StepIdx) -> Result<(), GraphError> {
        if step_idx >= self.step_count() {
            return Err(GraphError::InvalidStepIndex {
                index: step_idx,
                step_count: self.step_count(),
            });
        }
        Ok(())
    }

    fn check_field_index(&self, field_idx: FieldIdx) -> Result<(), GraphError> {
        if field_idx >= self.field_count() {
            return Err(GraphError::InvalidFieldIndex {
                index: field_idx,
                field_count: self.field_count(),
            });
        }
        Ok(())
    }
}

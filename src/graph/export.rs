use crate::error::GraphError;
use crate::graph::GraphCore;
use crate::types::{DataIdx, FieldIdx, StepIdx, Usage};
use core::any::TypeId;
use tracing::debug;

/// A data object of an exported graph: its dense index, its value type
/// tag, and every field access to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataInfo {
    /// Dense index of the data object, assigned in discovery order.
    pub data_idx: DataIdx,
    /// Value type flowing through the data object. All member fields
    /// share it.
    pub type_tag: TypeId,
    /// Every `(step, field, usage)` access record of the data object.
    pub field_usages: Vec<(StepIdx, FieldIdx, Usage)>,
}

/// A snapshot of a validated graph's computed structure.
///
/// Produced by [`GraphCore::export_graph`] once the sealed validation
/// pass finds no errors. Fields that were linked together share one
/// [`DataIdx`]; the step links spell out every execution-order
/// constraint, explicit and implicit, for downstream plan composition.
///
/// The structure is plain data: once constructed it is never modified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedGraph {
    /// `(field, data object)` association; every field appears exactly
    /// once.
    pub field_data_pairs: Vec<(FieldIdx, DataIdx)>,
    /// Per data object: type tag and access records.
    pub data_infos: Vec<DataInfo>,
    /// Explicit step links as recorded, duplicates included.
    pub explicit_step_links: Vec<(StepIdx, StepIdx)>,
    /// Step links derived from CRD usage ordering, one per qualifying
    /// cross product of each data object's accesses.
    pub implicit_step_links: Vec<(StepIdx, StepIdx)>,
    /// Concatenation of the explicit and implicit links.
    pub combined_step_links: Vec<(StepIdx, StepIdx)>,
}

impl GraphCore {
    /// Exports the computed graph structure.
    ///
    /// Runs the sealed validation pass first
    /// (`get_diagnostics(true)`) and refuses to export while errors
    /// remain. Data object indices are assigned densely in field
    /// discovery order.
    ///
    /// # Errors
    /// [`GraphError::InvalidState`] if validation errors exist.
    pub fn export_graph(&self) -> Result<ExportedGraph, GraphError> {
        let diagnostics = self.get_diagnostics(true);
        if !diagnostics.is_valid() {
            return Err(GraphError::InvalidState);
        }

        let classes = self.equivalence_classes();

        // Dense data indices in discovery order: the classes map was
        // itself built by walking fields in index order.
        let mut field_data_pairs = Vec::with_capacity(self.field_count());
        let mut data_infos = Vec::with_capacity(classes.len());
        for (data_idx, members) in classes.values().enumerate() {
            let mut field_usages = Vec::with_capacity(members.len());
            for &field in members {
                field_usages.push((
                    self.field_owner_step[field],
                    field,
                    self.field_usages[field],
                ));
            }
            data_infos.push(DataInfo {
                data_idx,
                type_tag: self.field_types[members[0]],
                field_usages,
            });
            for &field in members {
                field_data_pairs.push((field, data_idx));
            }
        }
        field_data_pairs.sort_unstable_by_key(|&(field, _)| field);

        let explicit_step_links: Vec<(StepIdx, StepIdx)> = self
            .explicit_step_links
            .iter()
            .map(|link| (link.before, link.after))
            .collect();

        let mut implicit_step_links = Vec::new();
        for members in classes.values() {
            self.implicit_links_of_class(members, &mut implicit_step_links);
        }

        let mut combined_step_links =
            Vec::with_capacity(explicit_step_links.len() + implicit_step_links.len());
        combined_step_links.extend_from_slice(&explicit_step_links);
        combined_step_links.extend_from_slice(&implicit_step_links);

        debug!(
            steps = self.step_count(),
            fields = self.field_count(),
            data_objects = data_infos.len(),
            explicit_links = explicit_step_links.len(),
            implicit_links = implicit_step_links.len(),
            "exported graph"
        );

        Ok(ExportedGraph {
            field_data_pairs,
            data_infos,
            explicit_step_links,
            implicit_step_links,
            combined_step_links,
        })
    }
}

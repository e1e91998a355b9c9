use crate::graph::GraphCore;
use crate::types::{FieldIdx, HashSet, IndexMap, StepIdx, Usage};
use core::fmt;
use derive_more::Display;
use std::collections::VecDeque;

/// Severity of a diagnostic item.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DiagnosticSeverity {
    /// Non-blocking issue that may indicate a problem.
    Warning,
    /// Blocking issue that prevents graph export.
    Error,
}

/// Category of a diagnostic item.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticCategory {
    /// The combined step ordering contains a cycle.
    Cycle,
    /// More than one Create field for one data object.
    MultipleCreate,
    /// More than one Destroy field for one data object.
    MultipleDestroy,
    /// One step holds incompatible usages of one data object.
    UnsafeSelfAliasing,
    /// A data object has no Create field. The one seal-sensitive
    /// category: a Warning while the graph is under construction, an
    /// Error once it is sealed for export.
    MissingCreate,
    /// A step with no fields and no explicit links.
    OrphanStep,
    /// A created data object that is never read or destroyed.
    UnusedData,
}

/// One issue detected during graph validation.
///
/// The blame lists rank the links suspected of causing the issue, by
/// trust ascending: the least-trusted links come first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticItem {
    /// Whether the issue blocks export.
    pub severity: DiagnosticSeverity,
    /// What kind of issue this is.
    pub category: DiagnosticCategory,
    /// Human-readable description.
    pub message: String,
    /// Steps involved in the issue, if any.
    pub involved_steps: Vec<StepIdx>,
    /// Fields involved in the issue, if any.
    pub involved_fields: Vec<FieldIdx>,
    /// Indices into the explicit step links, most suspect first.
    pub blamed_step_links: Vec<usize>,
    /// Indices into the field links, most suspect first.
    pub blamed_field_links: Vec<usize>,
}

/// The aggregate result of a validation pass over a [`GraphCore`].
///
/// Errors block export; warnings do not. Produced by
/// [`GraphCore::get_diagnostics`]; once returned, the report is an
/// immutable snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphDiagnostics {
    errors: Vec<DiagnosticItem>,
    warnings: Vec<DiagnosticItem>,
}

impl GraphDiagnostics {
    /// Returns `true` if any blocking issue was found.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Returns `true` if any non-blocking issue was found.
    #[must_use]
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Returns `true` if the graph may be exported (no errors;
    /// warnings are allowed).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// All blocking issues, in detection order.
    #[must_use]
    pub fn errors(&self) -> &[DiagnosticItem] {
        &self.errors
    }

    /// All non-blocking issues, in detection order.
    #[must_use]
    pub fn warnings(&self) -> &[DiagnosticItem] {
        &self.warnings
    }

    /// Every item, errors first.
    #[must_use]
    pub fn all_items(&self) -> Vec<DiagnosticItem> {
        let mut out = Vec::with_capacity(self.errors.len() + self.warnings.len());
        out.extend_from_slice(&self.errors);
        out.extend_from_slice(&self.warnings);
        out
    }

    fn push(&mut self, item: DiagnosticItem) {
        match item.severity {
            DiagnosticSeverity::Error => self.errors.push(item),
            DiagnosticSeverity::Warning => self.warnings.push(item),
        }
    }
}

impl fmt::Display for GraphDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} error(s), {} warning(s)",
            self.errors.len(),
            self.warnings.len()
        )?;
        for item in self.all_items() {
            write!(f, "\n  {}[{}]: {}", item.severity, item.category, item.message)?;
        }
        Ok(())
    }
}

impl GraphCore {
    /// Runs a full validation pass and returns the report. Never
    /// mutates the graph; two consecutive calls return logically equal
    /// results.
    ///
    /// `treat_as_sealed` flips the severity of the one seal-sensitive
    /// category: a data object without a Create field is a Warning while
    /// the graph is still under construction and an Error once the graph
    /// is inspected with intent to emit an execution plan. Every other
    /// category has fixed severity.
    pub fn get_diagnostics(&self, treat_as_sealed: bool) -> GraphDiagnostics {
        let mut report = GraphDiagnostics::default();
        let classes = self.equivalence_classes();

        // Usage constraints, per equivalence class.
        for members in classes.values() {
            let mut creates = Vec::new();
            let mut destroys = Vec::new();
            let mut step_usages: IndexMap<StepIdx, Vec<FieldIdx>> = IndexMap::default();
            for &field in members {
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
                report.push(DiagnosticItem {
                    severity: DiagnosticSeverity::Error,
                    category: DiagnosticCategory::MultipleCreate,
                    message: "data object has multiple Create fields".to_owned(),
                    involved_steps: creates
                        .iter()
                        .map(|&field| self.field_owner_step[field])
                        .collect(),
                    involved_fields: creates.clone(),
                    blamed_step_links: Vec::new(),
                    blamed_field_links: self.field_link_blame(&creates),
                });
            }

            if destroys.len() > 1 {
                report.push(DiagnosticItem {
                    severity: DiagnosticSeverity::Error,
                    category: DiagnosticCategory::MultipleDestroy,
                    message: "data object has multiple Destroy fields".to_owned(),
                    involved_steps: destroys
                        .iter()
                        .map(|&field| self.field_owner_step[field])
                        .collect(),
                    involved_fields: destroys.clone(),
                    blamed_step_links: Vec::new(),
                    blamed_field_links: self.field_link_blame(&destroys),
                });
            }

            for (&step, fields) in &step_usages {
                if fields.len() > 1
                    && fields
                        .iter()
                        .any(|&field| self.field_usages[field] != Usage::Read)
                {
                    report.push(DiagnosticItem {
                        severity: DiagnosticSeverity::Error,
                        category: DiagnosticCategory::UnsafeSelfAliasing,
                        message: format!(
                            "step {step} holds incompatible usages of one data object"
                        ),
                        involved_steps: vec![step],
                        involved_fields: fields.clone(),
                        blamed_step_links: Vec::new(),
                        blamed_field_links: self.field_link_blame(fields),
                    });
                }
            }

            if creates.is_empty() {
                let severity = if treat_as_sealed {
                    DiagnosticSeverity::Error
                } else {
                    DiagnosticSeverity::Warning
                };
                report.push(DiagnosticItem {
                    severity,
                    category: DiagnosticCategory::MissingCreate,
                    message: "data object has no Create field".to_owned(),
                    involved_steps: members
                        .iter()
                        .map(|&field| self.field_owner_step[field])
                        .collect(),
                    involved_fields: members.clone(),
                    blamed_step_links: Vec::new(),
                    blamed_field_links: self.field_link_blame(members),
                });
            }
        }

        // Orphan steps: neither fields nor explicit links.
        let mut step_has_link = vec![false; self.step_count()];
        for link in &self.explicit_step_links {
            step_has_link[link.before] = true;
            step_has_link[link.after] = true;
        }
        for step in 0..self.step_count() {
            if self.step_fields[step].is_empty() && !step_has_link[step] {
                report.push(DiagnosticItem {
                    severity: DiagnosticSeverity::Warning,
                    category: DiagnosticCategory::OrphanStep,
                    message: format!("step {step} has no fields and no links"),
                    involved_steps: vec![step],
                    involved_fields: Vec::new(),
                    blamed_step_links: Vec::new(),
                    blamed_field_links: Vec::new(),
                });
            }
        }

        // Unused data: a lone Create that nothing reads or destroys.
        // A lone Read or Destroy is already reported as MissingCreate.
        for members in classes.values() {
            if let [field] = members[..] {
                if self.field_usages[field] == Usage::Create {
                    let step = self.field_owner_step[field];
                    report.push(DiagnosticItem {
                        severity: DiagnosticSeverity::Warning,
                        category: DiagnosticCategory::UnusedData,
                        message: format!(
                            "data object created by step {step} is never read or destroyed"
                        ),
                        involved_steps: vec![step],
                        involved_fields: vec![field],
                        blamed_step_links: Vec::new(),
                        blamed_field_links: Vec::new(),
                    });
                }
            }
        }

        // Cycle detection over the combined edge set, via Kahn draining.
        if self.step_count() > 0 {
            let mut combined: Vec<(StepIdx, StepIdx)> = self
                .explicit_step_links
                .iter()
                .map(|link| (link.before, link.after))
                .collect();
            for members in classes.values() {
                self.implicit_links_of_class(members, &mut combined);
            }

            let mut in_degree = vec![0usize; self.step_count()];
            let mut successors: Vec<Vec<StepIdx>> = vec![Vec::new(); self.step_count()];
            for &(before, after) in &combined {
                successors[before].push(after);
                in_degree[after] += 1;
            }

            let mut ready: VecDeque<StepIdx> = (0..self.step_count())
                .filter(|&step| in_degree[step] == 0)
                .collect();
            let mut processed = 0usize;
            while let Some(step) = ready.pop_front() {
                processed += 1;
                for &successor in &successors[step] {
                    in_degree[successor] -= 1;
                    if in_degree[successor] == 0 {
                        ready.push_back(successor);
                    }
                }
            }

            if processed < self.step_count() {
                let involved_steps: Vec<StepIdx> = (0..self.step_count())
                    .filter(|&step| in_degree[step] > 0)
                    .collect();
                let blamed_step_links = self.step_link_blame(&involved_steps);
                report.push(DiagnosticItem {
                    severity: DiagnosticSeverity::Error,
                    category: DiagnosticCategory::Cycle,
                    message: "cycle detected in step ordering".to_owned(),
                    involved_steps,
                    involved_fields: Vec::new(),
                    blamed_step_links,
                    blamed_field_links: Vec::new(),
                });
            }
        }

        report
    }

    /// Ranks the field links touching any of the involved fields, by
    /// trust ascending.
    fn field_link_blame(&self, involved_fields: &[FieldIdx]) -> Vec<usize> {
        let involved: HashSet<FieldIdx> = involved_fields.iter().copied().collect();
        let mut blamed: Vec<usize> = self
            .field_links
            .iter()
            .enumerate()
            .filter(|(_, link)| involved.contains(&link.first) || involved.contains(&link.second))
            .map(|(index, _)| index)
            .collect();
        blamed.sort_by_key(|&index| self.field_links[index].trust);
        blamed
    }

    /// Ranks the explicit step links lying entirely inside the involved
    /// step set, by trust ascending.
    fn step_link_blame(&self, involved_steps: &[StepIdx]) -> Vec<usize> {
        let involved: HashSet<StepIdx> = involved_steps.iter().copied().collect();
        let mut blamed: Vec<usize> = self
            .explicit_step_links
            .iter()
            .enumerate()
            .filter(|(_, link)| involved.contains(&link.before) && involved.contains(&link.after))
            .map(|(index, _)| index)
            .collect();
        blamed.sort_by_key(|&index| self.explicit_step_links[index].trust);
        blamed
    }
}

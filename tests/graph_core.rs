use crd_graph::error::GraphError;
use crd_graph::graph::diagnostics::{DiagnosticCategory, DiagnosticSeverity};
use crd_graph::graph::GraphCore;
use crd_graph::types::{TrustLevel, Usage};
use std::any::TypeId;

fn int_tag() -> TypeId {
    TypeId::of::<i32>()
}

fn string_tag() -> TypeId {
    TypeId::of::<String>()
}

fn sorted(mut values: Vec<usize>) -> Vec<usize> {
    values.sort_unstable();
    values
}

// ---------------------------------------------------------------------------
// Registration sequencing
// ---------------------------------------------------------------------------

#[test]
fn steps_register_sequentially() {
    let mut core = GraphCore::new(false);
    core.add_step(0).unwrap();
    core.add_step(1).unwrap();
    assert_eq!(core.step_count(), 2);

    assert!(matches!(
        core.add_step(1),
        Err(GraphError::DuplicateStepIndex { index: 1 })
    ));
    assert!(matches!(
        core.add_step(5),
        Err(GraphError::InvalidStepIndex { index: 5, .. })
    ));
}

#[test]
fn fields_register_sequentially_under_existing_steps() {
    let mut core = GraphCore::new(false);
    core.add_step(0).unwrap();
    core.add_field(0, 0, int_tag(), Usage::Create).unwrap();
    assert_eq!(core.field_count(), 1);

    assert!(matches!(
        core.add_field(3, 1, int_tag(), Usage::Read),
        Err(GraphError::InvalidStepIndex { index: 3, .. })
    ));
    assert!(matches!(
        core.add_field(0, 0, int_tag(), Usage::Read),
        Err(GraphError::DuplicateFieldIndex { index: 0 })
    ));
    assert!(matches!(
        core.add_field(0, 4, int_tag(), Usage::Read),
        Err(GraphError::InvalidFieldIndex { index: 4, .. })
    ));
}

// ---------------------------------------------------------------------------
// Step linking
// ---------------------------------------------------------------------------

#[test]
fn link_steps_checks_bounds() {
    let mut core = GraphCore::new(false);
    core.add_step(0).unwrap();
    assert!(matches!(
        core.link_steps(0, 1, TrustLevel::High),
        Err(GraphError::InvalidStepIndex { index: 1, .. })
    ));
    assert!(matches!(
        core.link_steps(2, 0, TrustLevel::High),
        Err(GraphError::InvalidStepIndex { index: 2, .. })
    ));
}

#[test]
fn self_loop_fails_in_both_modes() {
    for eager in [false, true] {
        let mut core = GraphCore::new(eager);
        core.add_step(0).unwrap();
        assert!(matches!(
            core.link_steps(0, 0, TrustLevel::Middle),
            Err(GraphError::CycleDetected { before: 0, after: 0 })
        ));
    }
}

#[test]
fn eager_mode_rejects_a_closing_step_link() {
    let mut core = GraphCore::new(true);
    core.add_step(0).unwrap();
    core.add_step(1).unwrap();
    core.add_step(2).unwrap();
    core.link_steps(0, 1, TrustLevel::Middle).unwrap();
    core.link_steps(1, 2, TrustLevel::Middle).unwrap();
    assert!(matches!(
        core.link_steps(2, 0, TrustLevel::Middle),
        Err(GraphError::CycleDetected { before: 2, after: 0 })
    ));
    // The rejected link left no trace.
    assert!(core.get_diagnostics(false).is_valid());
}

#[test]
fn deferred_mode_records_a_cycle_for_diagnostics() {
    // Two steps linked both ways.
    let mut core = GraphCore::new(false);
    core.add_step(0).unwrap();
    core.add_step(1).unwrap();
    core.link_steps(0, 1, TrustLevel::Middle).unwrap();
    core.link_steps(1, 0, TrustLevel::Middle).unwrap();

    let report = core.get_diagnostics(false);
    assert!(report.has_errors());
    assert_eq!(report.errors().len(), 1);
    let item = &report.errors()[0];
    assert_eq!(item.category, DiagnosticCategory::Cycle);
    assert_eq!(item.severity, DiagnosticSeverity::Error);
    assert_eq!(sorted(item.involved_steps.clone()), vec![0, 1]);
    assert_eq!(item.blamed_step_links.len(), 2);

    assert!(matches!(core.export_graph(), Err(GraphError::InvalidState)));
}

// ---------------------------------------------------------------------------
// Field linking
// ---------------------------------------------------------------------------

#[test]
fn self_link_is_a_no_op() {
    let mut core = GraphCore::new(true);
    core.add_step(0).unwrap();
    core.add_field(0, 0, int_tag(), Usage::Create).unwrap();
    core.link_fields(0, 0, TrustLevel::High).unwrap();
    assert!(core.get_diagnostics(false).is_valid());
}

#[test]
fn linking_different_types_fails_in_both_modes() {
    for eager in [false, true] {
        let mut core = GraphCore::new(eager);
        core.add_step(0).unwrap();
        core.add_step(1).unwrap();
        core.add_field(0, 0, int_tag(), Usage::Create).unwrap();
        core.add_field(1, 1, string_tag(), Usage::Read).unwrap();
        assert!(matches!(
            core.link_fields(0, 1, TrustLevel::High),
            Err(GraphError::TypeMismatch { first: 0, second: 1 })
        ));
    }
}

#[test]
fn linking_twice_is_observationally_idempotent() {
    let mut core = GraphCore::new(true);
    core.add_step(0).unwrap();
    core.add_step(1).unwrap();
    core.add_field(0, 0, int_tag(), Usage::Create).unwrap();
    core.add_field(1, 1, int_tag(), Usage::Read).unwrap();
    core.link_fields(0, 1, TrustLevel::High).unwrap();
    core.link_fields(0, 1, TrustLevel::Low).unwrap();
    core.link_fields(1, 0, TrustLevel::Low).unwrap();

    let exported = core.export_graph().unwrap();
    assert_eq!(exported.data_infos.len(), 1);
    assert_eq!(exported.implicit_step_links, vec![(0, 1)]);
}

#[test]
fn eager_mode_rejects_a_second_create_synchronously() {
    // A Create-Read pair already linked, then a second Create joins.
    let mut core = GraphCore::new(true);
    for step in 0..3 {
        core.add_step(step).unwrap();
    }
    core.add_field(0, 0, int_tag(), Usage::Create).unwrap();
    core.add_field(1, 1, int_tag(), Usage::Read).unwrap();
    core.add_field(2, 2, int_tag(), Usage::Create).unwrap();
    core.link_fields(0, 1, TrustLevel::High).unwrap();

    let err = core.link_fields(1, 2, TrustLevel::High).unwrap_err();
    match err {
        GraphError::MultipleCreate { fields } => assert_eq!(sorted(fields), vec![0, 2]),
        other => panic!("expected MultipleCreate, got {other:?}"),
    }

    // State prior to the raise is unchanged: fields 1 and 2 are still
    // in different classes, and the sealed pass only reports the lone
    // Create of field 2.
    let report = core.get_diagnostics(true);
    assert!(report.is_valid());
    let exported = core.export_graph().unwrap();
    assert_eq!(exported.data_infos.len(), 2);
}

#[test]
fn eager_mode_rejects_a_second_destroy() {
    let mut core = GraphCore::new(true);
    for step in 0..3 {
        core.add_step(step).unwrap();
    }
    core.add_field(0, 0, int_tag(), Usage::Create).unwrap();
    core.add_field(1, 1, int_tag(), Usage::Destroy).unwrap();
    core.add_field(2, 2, int_tag(), Usage::Destroy).unwrap();
    core.link_fields(0, 1, TrustLevel::High).unwrap();
    assert!(matches!(
        core.link_fields(1, 2, TrustLevel::High),
        Err(GraphError::MultipleDestroy { .. })
    ));
}

#[test]
fn eager_mode_rejects_self_aliasing() {
    let mut core = GraphCore::new(true);
    core.add_step(0).unwrap();
    core.add_field(0, 0, int_tag(), Usage::Create).unwrap();
    core.add_field(0, 1, int_tag(), Usage::Read).unwrap();
    let err = core.link_fields(0, 1, TrustLevel::Middle).unwrap_err();
    match err {
        GraphError::UnsafeSelfAliasing { step, fields } => {
            assert_eq!(step, 0);
            assert_eq!(sorted(fields), vec![0, 1]);
        }
        other => panic!("expected UnsafeSelfAliasing, got {other:?}"),
    }
}

#[test]
fn eager_mode_allows_multiple_reads_on_one_step() {
    let mut core = GraphCore::new(true);
    core.add_step(0).unwrap();
    core.add_step(1).unwrap();
    core.add_field(0, 0, int_tag(), Usage::Create).unwrap();
    core.add_field(1, 1, int_tag(), Usage::Read).unwrap();
    core.add_field(1, 2, int_tag(), Usage::Read).unwrap();
    core.link_fields(0, 1, TrustLevel::High).unwrap();
    core.link_fields(1, 2, TrustLevel::High).unwrap();
    assert!(core.get_diagnostics(true).is_valid());
}

#[test]
fn eager_mode_rejects_an_induced_edge_that_closes_a_cycle() {
    // An accepted explicit 1 -> 0 link, then a field link whose
    // induced 0 -> 1 edge would close the loop.
    let mut core = GraphCore::new(true);
    core.add_step(0).unwrap();
    core.add_step(1).unwrap();
    core.add_field(0, 0, int_tag(), Usage::Create).unwrap();
    core.add_field(1, 1, int_tag(), Usage::Destroy).unwrap();
    core.link_steps(1, 0, TrustLevel::Low).unwrap();

    assert!(matches!(
        core.link_fields(0, 1, TrustLevel::High),
        Err(GraphError::CycleDetected { before: 0, after: 1 })
    ));
}

// ---------------------------------------------------------------------------
// Deferred diagnostics
// ---------------------------------------------------------------------------

#[test]
fn deferred_mode_reports_self_aliasing() {
    // One step holding Create and Read of the same data.
    let mut core = GraphCore::new(false);
    core.add_step(0).unwrap();
    core.add_field(0, 0, int_tag(), Usage::Create).unwrap();
    core.add_field(0, 1, int_tag(), Usage::Read).unwrap();
    core.link_fields(0, 1, TrustLevel::Middle).unwrap();

    let report = core.get_diagnostics(false);
    let aliasing: Vec<_> = report
        .errors()
        .iter()
        .filter(|item| item.category == DiagnosticCategory::UnsafeSelfAliasing)
        .collect();
    assert_eq!(aliasing.len(), 1);
    assert_eq!(aliasing[0].involved_steps, vec![0]);
    assert_eq!(sorted(aliasing[0].involved_fields.clone()), vec![0, 1]);
}

#[test]
fn deferred_mode_reports_multiple_creates_transitively() {
    let mut core = GraphCore::new(false);
    for step in 0..3 {
        core.add_step(step).unwrap();
    }
    core.add_field(0, 0, int_tag(), Usage::Create).unwrap();
    core.add_field(1, 1, int_tag(), Usage::Read).unwrap();
    core.add_field(2, 2, int_tag(), Usage::Create).unwrap();
    core.link_fields(0, 1, TrustLevel::High).unwrap();
    core.link_fields(1, 2, TrustLevel::Low).unwrap();

    let report = core.get_diagnostics(false);
    let multiple: Vec<_> = report
        .errors()
        .iter()
        .filter(|item| item.category == DiagnosticCategory::MultipleCreate)
        .collect();
    assert_eq!(multiple.len(), 1);
    assert_eq!(sorted(multiple[0].involved_fields.clone()), vec![0, 2]);
    assert_eq!(sorted(multiple[0].involved_steps.clone()), vec![0, 2]);
}

#[test]
fn missing_create_severity_depends_on_sealing() {
    let mut core = GraphCore::new(false);
    core.add_step(0).unwrap();
    core.add_field(0, 0, int_tag(), Usage::Read).unwrap();

    let relaxed = core.get_diagnostics(false);
    assert!(relaxed.is_valid());
    assert_eq!(relaxed.warnings().len(), 1);
    assert_eq!(
        relaxed.warnings()[0].category,
        DiagnosticCategory::MissingCreate
    );

    let sealed = core.get_diagnostics(true);
    assert!(!sealed.is_valid());
    assert_eq!(sealed.errors().len(), 1);
    assert_eq!(
        sealed.errors()[0].category,
        DiagnosticCategory::MissingCreate
    );
}

#[test]
fn singleton_destroy_is_missing_create_too() {
    let mut core = GraphCore::new(false);
    core.add_step(0).unwrap();
    core.add_field(0, 0, int_tag(), Usage::Destroy).unwrap();
    let sealed = core.get_diagnostics(true);
    assert_eq!(sealed.errors().len(), 1);
    assert_eq!(
        sealed.errors()[0].category,
        DiagnosticCategory::MissingCreate
    );
}

#[test]
fn orphan_step_is_a_warning() {
    let mut core = GraphCore::new(false);
    core.add_step(0).unwrap();
    core.add_step(1).unwrap();
    core.add_field(1, 0, int_tag(), Usage::Create).unwrap();

    let report = core.get_diagnostics(false);
    let orphans: Vec<_> = report
        .warnings()
        .iter()
        .filter(|item| item.category == DiagnosticCategory::OrphanStep)
        .collect();
    assert_eq!(orphans.len(), 1);
    assert_eq!(orphans[0].involved_steps, vec![0]);
}

#[test]
fn linked_step_is_not_an_orphan() {
    let mut core = GraphCore::new(false);
    core.add_step(0).unwrap();
    core.add_step(1).unwrap();
    core.link_steps(0, 1, TrustLevel::High).unwrap();
    let report = core.get_diagnostics(false);
    assert!(report
        .warnings()
        .iter()
        .all(|item| item.category != DiagnosticCategory::OrphanStep));
}

#[test]
fn lone_create_is_unused_data() {
    let mut core = GraphCore::new(false);
    core.add_step(0).unwrap();
    core.add_field(0, 0, int_tag(), Usage::Create).unwrap();

    let report = core.get_diagnostics(true);
    assert!(report.is_valid());
    assert_eq!(report.warnings().len(), 1);
    let item = &report.warnings()[0];
    assert_eq!(item.category, DiagnosticCategory::UnusedData);
    assert_eq!(item.involved_steps, vec![0]);
    assert_eq!(item.involved_fields, vec![0]);
}

#[test]
fn implicit_usage_ordering_can_close_a_cycle() {
    // Data A: created by 0, destroyed by 1. Data B: created by 1,
    // destroyed by 0. The induced edges 0 -> 1 and 1 -> 0 conflict.
    let mut core = GraphCore::new(false);
    core.add_step(0).unwrap();
    core.add_step(1).unwrap();
    core.add_field(0, 0, int_tag(), Usage::Create).unwrap();
    core.add_field(1, 1, int_tag(), Usage::Destroy).unwrap();
    core.add_field(1, 2, int_tag(), Usage::Create).unwrap();
    core.add_field(0, 3, int_tag(), Usage::Destroy).unwrap();
    core.link_fields(0, 1, TrustLevel::High).unwrap();
    core.link_fields(2, 3, TrustLevel::High).unwrap();

    let report = core.get_diagnostics(false);
    let cycles: Vec<_> = report
        .errors()
        .iter()
        .filter(|item| item.category == DiagnosticCategory::Cycle)
        .collect();
    assert_eq!(cycles.len(), 1);
    assert_eq!(sorted(cycles[0].involved_steps.clone()), vec![0, 1]);
}

#[test]
fn diagnostics_is_pure() {
    let mut core = GraphCore::new(false);
    core.add_step(0).unwrap();
    core.add_step(1).unwrap();
    core.add_field(0, 0, int_tag(), Usage::Create).unwrap();
    core.add_field(1, 1, int_tag(), Usage::Read).unwrap();
    core.link_fields(0, 1, TrustLevel::Middle).unwrap();
    core.link_steps(1, 0, TrustLevel::Low).unwrap();

    let first = core.get_diagnostics(true);
    let second = core.get_diagnostics(true);
    assert_eq!(first, second);
}

// ---------------------------------------------------------------------------
// Blame ranking
// ---------------------------------------------------------------------------

#[test]
fn cycle_blame_orders_step_links_by_trust() {
    let mut core = GraphCore::new(false);
    core.add_step(0).unwrap();
    core.add_step(1).unwrap();
    core.link_steps(0, 1, TrustLevel::High).unwrap();
    core.link_steps(1, 0, TrustLevel::Low).unwrap();

    let report = core.get_diagnostics(false);
    let cycle = &report.errors()[0];
    assert_eq!(cycle.category, DiagnosticCategory::Cycle);
    // Link 1 carries Low trust, so it is suspected first.
    assert_eq!(cycle.blamed_step_links, vec![1, 0]);
}

#[test]
fn usage_blame_orders_field_links_by_trust() {
    let mut core = GraphCore::new(false);
    for step in 0..3 {
        core.add_step(step).unwrap();
    }
    core.add_field(0, 0, int_tag(), Usage::Create).unwrap();
    core.add_field(1, 1, int_tag(), Usage::Create).unwrap();
    core.add_field(2, 2, int_tag(), Usage::Read).unwrap();
    core.link_fields(0, 2, TrustLevel::High).unwrap();
    core.link_fields(1, 2, TrustLevel::Low).unwrap();

    let report = core.get_diagnostics(false);
    let multiple: Vec<_> = report
        .errors()
        .iter()
        .filter(|item| item.category == DiagnosticCategory::MultipleCreate)
        .collect();
    assert_eq!(multiple.len(), 1);
    // Both links touch an involved Create field; the Low-trust one
    // leads.
    assert_eq!(multiple[0].blamed_field_links, vec![1, 0]);
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

#[test]
fn export_assigns_data_indices_in_discovery_order() {
    let mut core = GraphCore::new(false);
    for step in 0..3 {
        core.add_step(step).unwrap();
    }
    core.add_field(0, 0, int_tag(), Usage::Create).unwrap();
    core.add_field(1, 1, string_tag(), Usage::Create).unwrap();
    core.add_field(2, 2, int_tag(), Usage::Read).unwrap();
    core.link_fields(0, 2, TrustLevel::High).unwrap();

    let exported = core.export_graph().unwrap();
    assert_eq!(exported.field_data_pairs, vec![(0, 0), (1, 1), (2, 0)]);
    assert_eq!(exported.data_infos.len(), 2);
    assert_eq!(exported.data_infos[0].type_tag, int_tag());
    assert_eq!(exported.data_infos[1].type_tag, string_tag());
    assert_eq!(
        sorted(
            exported.data_infos[0]
                .field_usages
                .iter()
                .map(|&(_, field, _)| field)
                .collect()
        ),
        vec![0, 2]
    );
}

#[test]
fn export_emits_explicit_implicit_and_combined_links() {
    // Create(0) -> Read(1) -> Destroy(2) plus one explicit 0 -> 2.
    let mut core = GraphCore::new(false);
    for step in 0..3 {
        core.add_step(step).unwrap();
    }
    core.add_field(0, 0, int_tag(), Usage::Create).unwrap();
    core.add_field(1, 1, int_tag(), Usage::Read).unwrap();
    core.add_field(2, 2, int_tag(), Usage::Destroy).unwrap();
    core.link_fields(0, 1, TrustLevel::High).unwrap();
    core.link_fields(1, 2, TrustLevel::High).unwrap();
    core.link_steps(0, 2, TrustLevel::Middle).unwrap();

    let exported = core.export_graph().unwrap();
    assert_eq!(exported.explicit_step_links, vec![(0, 2)]);
    assert_eq!(
        sorted(exported.implicit_step_links.iter().map(|&(a, b)| a * 10 + b).collect()),
        vec![1, 2, 12],
    );
    assert_eq!(
        exported.combined_step_links.len(),
        exported.explicit_step_links.len() + exported.implicit_step_links.len()
    );
}

#[test]
fn export_emits_one_implicit_link_per_data_object() {
    // Two data objects, each created by step 0 and read by step 1. The
    // export keeps both induced links; collapsing repeats is plan
    // composition's job.
    let mut core = GraphCore::new(false);
    core.add_step(0).unwrap();
    core.add_step(1).unwrap();
    core.add_field(0, 0, int_tag(), Usage::Create).unwrap();
    core.add_field(1, 1, int_tag(), Usage::Read).unwrap();
    core.add_field(0, 2, int_tag(), Usage::Create).unwrap();
    core.add_field(1, 3, int_tag(), Usage::Read).unwrap();
    core.link_fields(0, 1, TrustLevel::High).unwrap();
    core.link_fields(2, 3, TrustLevel::High).unwrap();

    let exported = core.export_graph().unwrap();
    assert_eq!(exported.implicit_step_links, vec![(0, 1), (0, 1)]);
    assert_eq!(exported.data_infos.len(), 2);
}

#[test]
fn empty_graph_exports_cleanly() {
    let core = GraphCore::new(false);
    let report = core.get_diagnostics(true);
    assert!(report.is_valid());
    assert!(!report.has_warnings());
    let exported = core.export_graph().unwrap();
    assert!(exported.field_data_pairs.is_empty());
    assert!(exported.combined_step_links.is_empty());
}

//! Integration tests for project hierarchy replication planning

use tableau_workbook_migrator::plan_passes;
use tableau_workbook_migrator::tableau::types::ProjectItem;

fn project(id: &str, name: &str, parent: Option<&str>) -> ProjectItem {
    ProjectItem {
        id: id.to_string(),
        name: name.to_string(),
        parent_project_id: parent.map(|p| p.to_string()),
        description: None,
    }
}

/// A realistic site layout: three roots, nested folders under two of them.
fn sample_site() -> Vec<ProjectItem> {
    vec![
        project("p-fin", "Finance", None),
        project("p-mkt", "Marketing", None),
        project("p-ops", "Operations", None),
        project("p-fin-q", "Quarterly", Some("p-fin")),
        project("p-fin-q-arch", "Archive", Some("p-fin-q")),
        project("p-mkt-camp", "Campaigns", Some("p-mkt")),
    ]
}

#[test]
fn test_every_source_project_gets_planned() {
    let projects = sample_site();
    let plan = plan_passes(&projects);

    assert_eq!(plan.planned_count(), projects.len());
    assert!(plan.stalled.is_empty());
}

#[test]
fn test_parents_precede_children() {
    let projects = sample_site();
    let plan = plan_passes(&projects);

    // Flatten to creation order and check each parent comes first
    let order: Vec<&str> = plan
        .passes
        .iter()
        .flatten()
        .map(|p| p.id.as_str())
        .collect();
    let position =
        |id: &str| order.iter().position(|o| *o == id).expect("project missing from plan");

    assert!(position("p-fin") < position("p-fin-q"));
    assert!(position("p-fin-q") < position("p-fin-q-arch"));
    assert!(position("p-mkt") < position("p-mkt-camp"));
}

#[test]
fn test_independent_top_level_terminates_in_one_pass() {
    let projects = vec![
        project("p-1", "Alpha", None),
        project("p-2", "Beta", None),
    ];

    let plan = plan_passes(&projects);
    assert_eq!(plan.passes.len(), 1);
    assert_eq!(plan.passes[0].len(), 2);
}

#[test]
fn test_unresolvable_parent_is_reported_not_looped() {
    let mut projects = sample_site();
    projects.push(project("p-lost", "Lost", Some("p-deleted")));

    let plan = plan_passes(&projects);
    assert_eq!(plan.stalled.len(), 1);
    assert_eq!(plan.stalled[0].id, "p-lost");
    // Everything else still gets planned
    assert_eq!(plan.planned_count(), sample_site().len());
}

#[test]
fn test_stalled_subtree_does_not_block_siblings() {
    let projects = vec![
        project("p-root", "Root", None),
        project("p-ok", "Fine", Some("p-root")),
        project("p-orphan", "Orphan", Some("p-gone")),
        project("p-orphan-child", "OrphanChild", Some("p-orphan")),
    ];

    let plan = plan_passes(&projects);
    assert_eq!(plan.planned_count(), 2);
    assert_eq!(plan.stalled.len(), 2);
}

//! Project hierarchy replication planning.
//!
//! Replicating a project tree needs parents created before children. The
//! planner splits the source projects into creation passes and reports the
//! projects whose parent never resolves, so the caller can log and stop
//! instead of looping forever on orphans or cycles.

use crate::tableau::types::ProjectItem;
use std::collections::HashSet;

/// Creation order for replicating a project tree.
pub struct HierarchyPlan<'a> {
    /// Passes in creation order: pass 0 holds the top-level projects, each
    /// later pass only holds projects whose parent appears in an earlier
    /// pass.
    pub passes: Vec<Vec<&'a ProjectItem>>,
    /// Projects whose parent never resolved.
    pub stalled: Vec<&'a ProjectItem>,
}

impl HierarchyPlan<'_> {
    /// Number of projects that can be created.
    pub fn planned_count(&self) -> usize {
        self.passes.iter().map(|pass| pass.len()).sum()
    }
}

/// Split projects into creation passes.
pub fn plan_passes(projects: &[ProjectItem]) -> HierarchyPlan<'_> {
    let mut created: HashSet<&str> = HashSet::new();
    let mut passes: Vec<Vec<&ProjectItem>> = Vec::new();

    let top_level: Vec<&ProjectItem> = projects
        .iter()
        .filter(|p| p.parent_project_id.is_none())
        .collect();
    for project in &top_level {
        created.insert(project.id.as_str());
    }
    if !top_level.is_empty() {
        passes.push(top_level);
    }

    let mut remaining: Vec<&ProjectItem> = projects
        .iter()
        .filter(|p| p.parent_project_id.is_some())
        .collect();

    while !remaining.is_empty() {
        let (ready, blocked): (Vec<&ProjectItem>, Vec<&ProjectItem>) =
            remaining.into_iter().partition(|p| {
                p.parent_project_id
                    .as_deref()
                    .map(|id| created.contains(id))
                    .unwrap_or(false)
            });

        if ready.is_empty() {
            return HierarchyPlan {
                passes,
                stalled: blocked,
            };
        }

        for project in &ready {
            created.insert(project.id.as_str());
        }
        passes.push(ready);
        remaining = blocked;
    }

    HierarchyPlan {
        passes,
        stalled: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(id: &str, name: &str, parent: Option<&str>) -> ProjectItem {
        ProjectItem {
            id: id.to_string(),
            name: name.to_string(),
            parent_project_id: parent.map(|p| p.to_string()),
            description: None,
        }
    }

    #[test]
    fn test_independent_top_level_single_pass() {
        let projects = vec![
            project("p-1", "Finance", None),
            project("p-2", "Marketing", None),
            project("p-3", "Operations", None),
        ];

        let plan = plan_passes(&projects);
        assert_eq!(plan.passes.len(), 1);
        assert_eq!(plan.passes[0].len(), 3);
        assert!(plan.stalled.is_empty());
    }

    #[test]
    fn test_deep_chain_one_pass_per_level() {
        let projects = vec![
            project("p-3", "Grandchild", Some("p-2")),
            project("p-1", "Root", None),
            project("p-2", "Child", Some("p-1")),
        ];

        let plan = plan_passes(&projects);
        assert_eq!(plan.passes.len(), 3);
        assert_eq!(plan.passes[0][0].id, "p-1");
        assert_eq!(plan.passes[1][0].id, "p-2");
        assert_eq!(plan.passes[2][0].id, "p-3");
        assert!(plan.stalled.is_empty());
    }

    #[test]
    fn test_orphan_child_stalls() {
        let projects = vec![
            project("p-1", "Root", None),
            project("p-9", "Orphan", Some("missing-parent")),
        ];

        let plan = plan_passes(&projects);
        assert_eq!(plan.planned_count(), 1);
        assert_eq!(plan.stalled.len(), 1);
        assert_eq!(plan.stalled[0].id, "p-9");
    }

    #[test]
    fn test_orphan_subtree_stalls_entirely() {
        // A child of an orphan can never resolve either
        let projects = vec![
            project("p-1", "Root", None),
            project("p-9", "Orphan", Some("missing-parent")),
            project("p-10", "OrphanChild", Some("p-9")),
        ];

        let plan = plan_passes(&projects);
        assert_eq!(plan.planned_count(), 1);
        assert_eq!(plan.stalled.len(), 2);
    }

    #[test]
    fn test_every_project_accounted_for() {
        let projects = vec![
            project("p-1", "Root", None),
            project("p-2", "A", Some("p-1")),
            project("p-3", "B", Some("p-1")),
            project("p-4", "A1", Some("p-2")),
            project("p-9", "Orphan", Some("missing")),
        ];

        let plan = plan_passes(&projects);
        assert_eq!(plan.planned_count() + plan.stalled.len(), projects.len());
    }

    #[test]
    fn test_empty_input() {
        let plan = plan_passes(&[]);
        assert!(plan.passes.is_empty());
        assert!(plan.stalled.is_empty());
    }

    #[test]
    fn test_cycle_detected_as_stalled() {
        let projects = vec![
            project("p-1", "A", Some("p-2")),
            project("p-2", "B", Some("p-1")),
        ];

        let plan = plan_passes(&projects);
        assert_eq!(plan.planned_count(), 0);
        assert_eq!(plan.stalled.len(), 2);
    }
}

//! Dependency graph and readiness rules.
//!
//! Design:
//! - Forward edges: task -> tasks it depends on (waits for)
//! - Reverse edges: task -> tasks that depend on it (waiting tasks)
//! - Invariant: edges and reverse_edges must be kept in sync

use std::collections::{HashMap, HashSet};

use super::record::TaskRecord;
use crate::domain::{FailedDependencyAction, TaskId, TaskState};

/// Dependency graph for tracking task dependencies.
///
/// This graph maintains both forward and reverse edges for efficient lookups:
/// - `edges`: TaskId -> Set of TaskIds it depends on
/// - `reverse_edges`: TaskId -> Set of TaskIds waiting for it
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    edges: HashMap<TaskId, HashSet<TaskId>>,

    /// Enables O(1) lookup: "who is waiting for this task?"
    reverse_edges: HashMap<TaskId, HashSet<TaskId>>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    Gray,
    Black,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a dependency: `task` depends on `depends_on`.
    ///
    /// add_dependency(B, A) means "B waits for A".
    pub fn add_dependency(&mut self, task: &TaskId, depends_on: &TaskId) {
        self.edges
            .entry(task.clone())
            .or_default()
            .insert(depends_on.clone());
        self.reverse_edges
            .entry(depends_on.clone())
            .or_default()
            .insert(task.clone());
    }

    /// Register every dependency of `task` at once.
    pub fn add_task<'a>(&mut self, task: &TaskId, depends_on: impl IntoIterator<Item = &'a TaskId>) {
        for dep in depends_on {
            self.add_dependency(task, dep);
        }
    }

    /// Tasks waiting for `task`, sorted by ID.
    ///
    /// Returns every waiter, even those that still have other dependencies.
    pub fn get_waiting_tasks(&self, task: &TaskId) -> Vec<TaskId> {
        let mut waiting: Vec<TaskId> = self
            .reverse_edges
            .get(task)
            .map(|w| w.iter().cloned().collect())
            .unwrap_or_default();
        waiting.sort();
        waiting
    }

    /// Dependencies of `task`, sorted by ID.
    pub fn get_dependencies(&self, task: &TaskId) -> Vec<TaskId> {
        let mut deps: Vec<TaskId> = self
            .edges
            .get(task)
            .map(|d| d.iter().cloned().collect())
            .unwrap_or_default();
        deps.sort();
        deps
    }

    /// Find a cycle, returned as a closed path (`[A, B, A]`), or `None` for a DAG.
    ///
    /// Three-color DFS: a gray node reached again is on the current path.
    /// Start points are visited in ID order so the result is deterministic.
    pub fn detect_cycle(&self) -> Option<Vec<TaskId>> {
        let mut colors: HashMap<TaskId, Color> = HashMap::new();
        let mut path: Vec<TaskId> = Vec::new();

        let mut starts: Vec<&TaskId> = self.edges.keys().collect();
        starts.sort();
        for start in starts {
            if colors.contains_key(start) {
                continue;
            }
            if let Some(cycle) = self.dfs_cycle(start, &mut colors, &mut path) {
                return Some(cycle);
            }
        }
        None
    }

    fn dfs_cycle(
        &self,
        node: &TaskId,
        colors: &mut HashMap<TaskId, Color>,
        path: &mut Vec<TaskId>,
    ) -> Option<Vec<TaskId>> {
        colors.insert(node.clone(), Color::Gray);
        path.push(node.clone());

        for dep in self.get_dependencies(node) {
            match colors.get(&dep) {
                Some(Color::Gray) => {
                    let from = path.iter().position(|p| *p == dep).unwrap_or(0);
                    let mut cycle = path[from..].to_vec();
                    cycle.push(dep);
                    return Some(cycle);
                }
                Some(Color::Black) => {}
                None => {
                    if let Some(cycle) = self.dfs_cycle(&dep, colors, path) {
                        return Some(cycle);
                    }
                }
            }
        }

        colors.insert(node.clone(), Color::Black);
        path.pop();
        None
    }
}

/// Status of a candidate's dependencies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    /// Some dependency is still pending or running.
    Waiting,

    /// Every dependency completed successfully (or there are none).
    Satisfied,

    /// Every dependency is terminal and these did not succeed.
    Failed { failed: Vec<TaskId> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitReason {
    Dependency,
    StartTime,
}

/// What the admission cycle should do with a pending task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Wait(WaitReason),
    Run,
    Cancel { failed: Vec<TaskId> },
    Disable { failed: Vec<TaskId> },
}

pub struct DependencyResolver;

impl DependencyResolver {
    /// `state_of` reports the current state of a task; `None` means the
    /// task is unknown, which counts as a failed dependency.
    pub fn readiness(
        dependencies: &[TaskId],
        state_of: impl Fn(&TaskId) -> Option<TaskState>,
    ) -> Readiness {
        let mut failed = Vec::new();
        for dep in dependencies {
            match state_of(dep) {
                Some(state) if !state.is_terminal() => return Readiness::Waiting,
                Some(state) if state.is_successful() => {}
                _ => failed.push(dep.clone()),
            }
        }
        if failed.is_empty() {
            Readiness::Satisfied
        } else {
            Readiness::Failed { failed }
        }
    }

    pub fn admission(
        record: &TaskRecord,
        now: i64,
        state_of: impl Fn(&TaskId) -> Option<TaskState>,
    ) -> Admission {
        let time_gate = || {
            if record.start_time_reached(now) {
                Admission::Run
            } else {
                Admission::Wait(WaitReason::StartTime)
            }
        };

        match Self::readiness(record.dependency_ids(), state_of) {
            Readiness::Waiting => Admission::Wait(WaitReason::Dependency),
            Readiness::Satisfied => time_gate(),
            Readiness::Failed { failed } => match record.failed_dependency_action() {
                FailedDependencyAction::Cancel => Admission::Cancel { failed },
                FailedDependencyAction::Disable => Admission::Disable { failed },
                FailedDependencyAction::Process => time_gate(),
            },
        }
    }

    /// First dependency that `is_known` rejects.
    pub fn first_unknown<'a>(
        dependencies: &'a [TaskId],
        is_known: impl Fn(&TaskId) -> bool,
    ) -> Option<&'a TaskId> {
        dependencies.iter().find(|dep| !is_known(dep))
    }
}

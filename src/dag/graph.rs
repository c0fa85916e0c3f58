// src/dag/graph.rs

use std::collections::{BTreeSet, HashMap, HashSet};

use petgraph::graphmap::DiGraphMap;
use tracing::debug;

use crate::dag::registry::{TaskAction, TaskBody, TaskRegistry, first_cycle};
use crate::engine::TaskName;
use crate::errors::ConfigError;

/// Internal node structure: stores immediate deps and dependents.
#[derive(Clone)]
struct RunNode {
    order: usize,
    /// `None` for series composites, which only join their last stage.
    action: Option<TaskAction>,
    deps: BTreeSet<TaskName>,
    dependents: BTreeSet<TaskName>,
}

/// The tasks one invocation will run, with series composites lowered into
/// plain ordering edges.
///
/// Every task in the closure of stage *k+1* of a series depends on every
/// member of stage *k* and inherits the composite's own prerequisites. The
/// composite itself depends on its last stage. A prerequisite is not added
/// to a task it already (transitively) depends on.
#[derive(Clone)]
pub struct RunGraph {
    target: TaskName,
    nodes: HashMap<TaskName, RunNode>,
}

impl std::fmt::Debug for RunGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let edges: Vec<(&str, Vec<&str>)> = self
            .tasks()
            .map(|t| (t, self.dependencies_of(t).map(String::as_str).collect()))
            .collect();
        f.debug_struct("RunGraph")
            .field("target", &self.target)
            .field("edges", &edges)
            .finish()
    }
}

impl RunGraph {
    /// Expand `target` and its transitive dependencies.
    pub fn expand(registry: &TaskRegistry, target: &str) -> Result<Self, ConfigError> {
        registry.resolve(target)?;

        let mut lowering = Lowering {
            registry,
            nodes: HashMap::new(),
            visited: HashSet::new(),
            closures: HashMap::new(),
        };
        lowering.lower(target, &BTreeSet::new())?;

        let mut nodes = lowering.nodes;
        let edges: Vec<(TaskName, TaskName)> = nodes
            .iter()
            .flat_map(|(name, node)| node.deps.iter().map(move |d| (d.clone(), name.clone())))
            .collect();
        for (dep, task) in edges {
            if let Some(node) = nodes.get_mut(&dep) {
                node.dependents.insert(task);
            }
        }

        debug!(target, nodes = nodes.len(), "expanded run graph");

        Ok(Self {
            target: target.to_string(),
            nodes,
        })
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// All task names in registration order.
    pub fn tasks(&self) -> impl Iterator<Item = &str> {
        let mut names: Vec<&String> = self.nodes.keys().collect();
        names.sort_by_key(|n| self.order_of(n));
        names.into_iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Registration order of a node, `usize::MAX` if unknown.
    pub fn order_of(&self, name: &str) -> usize {
        self.nodes.get(name).map(|n| n.order).unwrap_or(usize::MAX)
    }

    pub fn action_of(&self, name: &str) -> Option<&TaskAction> {
        self.nodes.get(name).and_then(|n| n.action.as_ref())
    }

    /// Whether the node is a series composite (nothing to execute).
    pub fn is_composite(&self, name: &str) -> bool {
        self.nodes.get(name).is_some_and(|n| n.action.is_none())
    }

    /// Immediate run-graph dependencies of a task.
    pub fn dependencies_of(&self, name: &str) -> impl Iterator<Item = &TaskName> {
        self.nodes.get(name).into_iter().flat_map(|n| n.deps.iter())
    }

    /// Immediate run-graph dependents of a task.
    pub fn dependents_of(&self, name: &str) -> impl Iterator<Item = &TaskName> {
        self.nodes
            .get(name)
            .into_iter()
            .flat_map(|n| n.dependents.iter())
    }

    /// Kahn's algorithm in waves: each wave holds every node whose
    /// dependencies are all in earlier waves, in registration order.
    ///
    /// Fails with `CyclicDependency` naming the members of a cycle.
    pub fn waves(&self) -> Result<Vec<Vec<TaskName>>, ConfigError> {
        let mut in_degree: HashMap<&str, usize> = self
            .nodes
            .iter()
            .map(|(name, node)| (name.as_str(), node.deps.len()))
            .collect();

        let mut waves = Vec::new();
        let mut remaining = self.nodes.len();

        loop {
            let mut wave: Vec<&str> = in_degree
                .iter()
                .filter(|(_, deg)| **deg == 0)
                .map(|(name, _)| *name)
                .collect();
            if wave.is_empty() {
                break;
            }
            wave.sort_by_key(|n| self.order_of(n));

            for name in &wave {
                in_degree.remove(name);
                for dependent in self.dependents_of(name) {
                    if let Some(deg) = in_degree.get_mut(dependent.as_str()) {
                        *deg = deg.saturating_sub(1);
                    }
                }
            }
            remaining -= wave.len();
            waves.push(wave.into_iter().map(str::to_string).collect());
        }

        if remaining > 0 {
            let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
            for name in in_degree.keys() {
                graph.add_node(*name);
            }
            for name in in_degree.keys() {
                for dep in self.dependencies_of(name) {
                    if in_degree.contains_key(dep.as_str()) {
                        graph.add_edge(dep.as_str(), *name, ());
                    }
                }
            }
            let members = first_cycle(&graph, |n| self.order_of(n)).unwrap_or_else(|| {
                let mut stuck: Vec<TaskName> =
                    in_degree.keys().map(|s| s.to_string()).collect();
                stuck.sort_by_key(|n| self.order_of(n));
                stuck
            });
            return Err(ConfigError::CyclicDependency { members });
        }

        Ok(waves)
    }

    /// Everything that (transitively) depends on `name`.
    pub fn transitive_dependents(&self, name: &str) -> BTreeSet<TaskName> {
        let mut seen = BTreeSet::new();
        let mut stack: Vec<&TaskName> = self.dependents_of(name).collect();
        while let Some(current) = stack.pop() {
            if seen.insert(current.clone()) {
                stack.extend(self.dependents_of(current));
            }
        }
        seen
    }
}

struct Lowering<'r> {
    registry: &'r TaskRegistry,
    nodes: HashMap<TaskName, RunNode>,
    visited: HashSet<(TaskName, Vec<TaskName>)>,
    closures: HashMap<TaskName, BTreeSet<TaskName>>,
}

impl Lowering<'_> {
    fn lower(&mut self, name: &str, prereqs: &BTreeSet<TaskName>) -> Result<(), ConfigError> {
        let key = (name.to_string(), prereqs.iter().cloned().collect::<Vec<_>>());
        if !self.visited.insert(key) {
            return Ok(());
        }

        let registry = self.registry;
        let def = registry.resolve(name)?;

        let mut own_deps: BTreeSet<TaskName> = def.deps().iter().cloned().collect();
        for prereq in prereqs {
            if !self.closure(prereq).contains(name) {
                own_deps.insert(prereq.clone());
            }
        }

        match def.body() {
            TaskBody::Action(_) => {
                for dep in def.deps() {
                    self.lower(dep, prereqs)?;
                }
            }
            TaskBody::Series(stages) => {
                let mut stage_prereqs = prereqs.clone();
                for stage in stages {
                    for member in stage {
                        self.lower(member, &stage_prereqs)?;
                    }
                    stage_prereqs = prereqs.iter().chain(stage.iter()).cloned().collect();
                }
                if let Some(last) = stages.last() {
                    own_deps.extend(last.iter().cloned());
                }
            }
        }

        let node = self.nodes.entry(name.to_string()).or_insert_with(|| RunNode {
            order: def.order(),
            action: def.action().cloned(),
            deps: BTreeSet::new(),
            dependents: BTreeSet::new(),
        });
        node.deps.extend(own_deps);
        Ok(())
    }

    fn closure(&mut self, name: &str) -> &BTreeSet<TaskName> {
        let registry = self.registry;
        self.closures
            .entry(name.to_string())
            .or_insert_with(|| registry.closure_of(name))
    }
}

// src/dag/registry.rs

//! Named task definitions and their declared dependencies.
//!
//! The registry is built once at start-up and then shared immutably with
//! the runtime (`Arc<TaskRegistry>`). Every registration is validated
//! immediately, so a registry that exists is always acyclic.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use petgraph::algo::tarjan_scc;
use petgraph::graphmap::DiGraphMap;
use tracing::debug;

use crate::engine::TaskName;
use crate::errors::{ConfigError, TaskError};

/// The work a task performs. Runs on the blocking worker pool.
pub type TaskAction = Arc<dyn Fn() -> Result<(), TaskError> + Send + Sync>;

/// What a registered task does when it is its turn.
#[derive(Clone)]
pub enum TaskBody {
    /// Run an action once all dependencies succeeded.
    Action(TaskAction),
    /// Run the stages one after the other. Members of one stage run
    /// concurrently. A composite has no action of its own.
    Series(Vec<Vec<TaskName>>),
}

impl fmt::Debug for TaskBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskBody::Action(_) => f.write_str("Action(..)"),
            TaskBody::Series(stages) => f.debug_tuple("Series").field(stages).finish(),
        }
    }
}

/// Input to [`TaskRegistry::register_batch`].
#[derive(Debug, Clone)]
pub struct TaskSpec {
    pub name: TaskName,
    pub deps: Vec<TaskName>,
    pub body: TaskBody,
}

impl TaskSpec {
    pub fn action(name: impl Into<TaskName>, deps: Vec<TaskName>, action: TaskAction) -> Self {
        Self {
            name: name.into(),
            deps,
            body: TaskBody::Action(action),
        }
    }

    pub fn series(name: impl Into<TaskName>, stages: Vec<Vec<TaskName>>) -> Self {
        Self {
            name: name.into(),
            deps: Vec::new(),
            body: TaskBody::Series(stages),
        }
    }

    /// Every task name referenced here: declared dependencies and
    /// series members.
    fn references(&self) -> impl Iterator<Item = &TaskName> {
        let members: &[Vec<TaskName>] = match &self.body {
            TaskBody::Series(stages) => stages,
            TaskBody::Action(_) => &[],
        };
        self.deps.iter().chain(members.iter().flatten())
    }
}

/// A registered task.
#[derive(Debug, Clone)]
pub struct TaskDef {
    name: TaskName,
    deps: Vec<TaskName>,
    body: TaskBody,
    order: usize,
}

impl TaskDef {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared dependencies, in declaration order.
    pub fn deps(&self) -> &[TaskName] {
        &self.deps
    }

    pub fn body(&self) -> &TaskBody {
        &self.body
    }

    /// Position in registration order. Used for deterministic tie-breaking.
    pub fn order(&self) -> usize {
        self.order
    }

    pub fn is_series(&self) -> bool {
        matches!(self.body, TaskBody::Series(_))
    }

    pub fn action(&self) -> Option<&TaskAction> {
        match &self.body {
            TaskBody::Action(action) => Some(action),
            TaskBody::Series(_) => None,
        }
    }

    /// Tasks this definition refers to directly.
    pub fn references(&self) -> impl Iterator<Item = &TaskName> {
        let members: &[Vec<TaskName>] = match &self.body {
            TaskBody::Series(stages) => stages,
            TaskBody::Action(_) => &[],
        };
        self.deps.iter().chain(members.iter().flatten())
    }
}

#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: HashMap<TaskName, TaskDef>,
    order: Vec<TaskName>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an action task. Every dependency must already be registered.
    pub fn register(
        &mut self,
        name: impl Into<TaskName>,
        deps: Vec<TaskName>,
        action: TaskAction,
    ) -> Result<(), ConfigError> {
        let spec = TaskSpec::action(name, deps, action);
        self.check_spec(&spec, |_| false)?;
        self.insert(spec);
        Ok(())
    }

    /// Register a series composite. Every stage member must already be
    /// registered.
    pub fn register_series(
        &mut self,
        name: impl Into<TaskName>,
        stages: Vec<Vec<TaskName>>,
    ) -> Result<(), ConfigError> {
        let spec = TaskSpec::series(name, stages);
        self.check_spec(&spec, |_| false)?;
        self.insert(spec);
        Ok(())
    }

    /// Register a group of tasks that may refer to each other in any order.
    ///
    /// The batch is validated as a whole; on error nothing is registered.
    /// Valid batches are inserted in dependency order, ties broken by the
    /// order of `specs`.
    pub fn register_batch(&mut self, specs: Vec<TaskSpec>) -> Result<(), ConfigError> {
        let mut batch_names: HashSet<&str> = HashSet::new();
        for spec in &specs {
            if self.tasks.contains_key(&spec.name) || !batch_names.insert(&spec.name) {
                return Err(ConfigError::DuplicateTask(spec.name.clone()));
            }
        }

        for spec in &specs {
            self.check_spec(spec, |dep| batch_names.contains(dep))?;
        }

        let ordered = order_batch(&specs)?;

        let mut by_name: HashMap<TaskName, TaskSpec> =
            specs.into_iter().map(|s| (s.name.clone(), s)).collect();
        for name in ordered {
            if let Some(spec) = by_name.remove(&name) {
                self.insert(spec);
            }
        }
        Ok(())
    }

    /// Look up a task by name.
    pub fn resolve(&self, name: &str) -> Result<&TaskDef, ConfigError> {
        self.tasks
            .get(name)
            .ok_or_else(|| ConfigError::NotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    /// Task names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// `name` plus everything it reaches through dependencies and series
    /// members.
    pub fn closure_of(&self, name: &str) -> BTreeSet<TaskName> {
        let mut seen = BTreeSet::new();
        let mut stack = vec![name.to_string()];
        while let Some(current) = stack.pop() {
            if !seen.insert(current.clone()) {
                continue;
            }
            if let Some(def) = self.tasks.get(&current) {
                stack.extend(def.references().cloned());
            }
        }
        seen
    }

    fn check_spec(
        &self,
        spec: &TaskSpec,
        in_batch: impl Fn(&str) -> bool,
    ) -> Result<(), ConfigError> {
        if spec.references().any(|dep| *dep == spec.name) {
            return Err(ConfigError::CyclicDependency {
                members: vec![spec.name.clone()],
            });
        }

        if let TaskBody::Series(stages) = &spec.body
            && (stages.is_empty() || stages.iter().any(Vec::is_empty))
        {
            return Err(ConfigError::EmptySeries(spec.name.clone()));
        }

        if self.tasks.contains_key(&spec.name) {
            return Err(ConfigError::DuplicateTask(spec.name.clone()));
        }

        for dep in spec.references() {
            if !self.tasks.contains_key(dep) && !in_batch(dep) {
                return Err(ConfigError::UnknownDependency {
                    task: spec.name.clone(),
                    dependency: dep.clone(),
                });
            }
        }
        Ok(())
    }

    fn insert(&mut self, spec: TaskSpec) {
        let order = self.order.len();
        debug!(task = %spec.name, order, "registered task");
        self.order.push(spec.name.clone());
        self.tasks.insert(
            spec.name.clone(),
            TaskDef {
                name: spec.name,
                deps: spec.deps,
                body: spec.body,
                order,
            },
        );
    }
}

/// Topologically order a batch, considering only edges inside the batch.
fn order_batch(specs: &[TaskSpec]) -> Result<Vec<TaskName>, ConfigError> {
    let position: HashMap<&str, usize> = specs
        .iter()
        .enumerate()
        .map(|(i, s)| (s.name.as_str(), i))
        .collect();

    // Edge direction: dep -> task.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
    for spec in specs {
        graph.add_node(spec.name.as_str());
    }
    for spec in specs {
        for dep in spec.references() {
            if position.contains_key(dep.as_str()) {
                graph.add_edge(dep.as_str(), spec.name.as_str(), ());
            }
        }
    }

    if let Some(members) = first_cycle(&graph, |n| position.get(n).copied().unwrap_or(usize::MAX)) {
        return Err(ConfigError::CyclicDependency { members });
    }

    let mut ordered = Vec::with_capacity(specs.len());
    let mut placed: HashSet<&str> = HashSet::new();
    while ordered.len() < specs.len() {
        let next = specs.iter().find(|s| {
            !placed.contains(s.name.as_str())
                && s.references().all(|d| {
                    !position.contains_key(d.as_str()) || placed.contains(d.as_str())
                })
        });
        match next {
            Some(spec) => {
                placed.insert(spec.name.as_str());
                ordered.push(spec.name.clone());
            }
            None => break,
        }
    }
    Ok(ordered)
}

/// Members of the first non-trivial strongly connected component, sorted
/// by `rank`. `None` if the graph is acyclic.
pub(crate) fn first_cycle<'a>(
    graph: &DiGraphMap<&'a str, ()>,
    rank: impl Fn(&str) -> usize,
) -> Option<Vec<TaskName>> {
    let mut cycles: Vec<Vec<&str>> = tarjan_scc(graph)
        .into_iter()
        .filter(|scc| scc.len() > 1 || graph.contains_edge(scc[0], scc[0]))
        .collect();

    for scc in cycles.iter_mut() {
        scc.sort_by_key(|n| rank(n));
    }
    cycles.sort_by_key(|scc| rank(scc[0]));

    cycles
        .into_iter()
        .next()
        .map(|scc| scc.into_iter().map(str::to_string).collect())
}

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use assetdag::config::{ConfigFile, RawConfigFile, TaskConfig};
use assetdag::dag::{TaskAction, TaskRegistry};
use assetdag::errors::{ConfigError, TaskError};

/// Builder for `ConfigFile` to simplify test setup.
#[derive(Default)]
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_task(mut self, name: &str, task: TaskConfig) -> Self {
        self.config.task.insert(name.to_string(), task);
        self
    }

    pub fn with_dest(mut self, dest: &str) -> Self {
        self.config.paths.dest = dest.to_string();
        self
    }

    pub fn with_watch(mut self, pattern: &str, task: &str, debounce_ms: u64) -> Self {
        self.config.watch.patterns = vec![pattern.to_string()];
        self.config.watch.task = task.to_string();
        self.config.watch.debounce_ms = debounce_ms;
        self
    }

    pub fn with_use_hash(mut self, val: bool) -> Self {
        self.config.watch.use_hash = val;
        self
    }

    pub fn with_max_concurrency(mut self, n: usize) -> Self {
        self.config.config.max_concurrency = n;
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

/// Builder for `TaskConfig`.
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    pub fn cmd(cmd: &str) -> Self {
        Self {
            task: TaskConfig {
                cmd: Some(cmd.to_string()),
                ..TaskConfig::default()
            },
        }
    }

    pub fn series(stages: &[&[&str]]) -> Self {
        Self {
            task: TaskConfig {
                series: Some(
                    stages
                        .iter()
                        .map(|s| s.iter().map(|n| n.to_string()).collect())
                        .collect(),
                ),
                ..TaskConfig::default()
            },
        }
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.task.after.push(dep.to_string());
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}

/// Names of the actions that ran, in the order they ran.
pub type ExecutionLog = Arc<Mutex<Vec<String>>>;

/// Builds a `TaskRegistry` whose actions only record that they ran.
pub struct RegistryBuilder {
    registry: TaskRegistry,
    log: ExecutionLog,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self {
            registry: TaskRegistry::new(),
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn recording(&self, name: &str, fail: bool) -> TaskAction {
        let log = Arc::clone(&self.log);
        let name = name.to_string();
        Arc::new(move || {
            log.lock().unwrap().push(name.clone());
            if fail {
                Err(TaskError::Command {
                    cmd: name.clone(),
                    code: 1,
                })
            } else {
                Ok(())
            }
        })
    }

    /// An action task that succeeds.
    pub fn task(mut self, name: &str, deps: &[&str]) -> Self {
        let action = self.recording(name, false);
        self.registry
            .register(name, to_names(deps), action)
            .expect("valid task");
        self
    }

    /// An action task that fails with a command error.
    pub fn failing(mut self, name: &str, deps: &[&str]) -> Self {
        let action = self.recording(name, true);
        self.registry
            .register(name, to_names(deps), action)
            .expect("valid task");
        self
    }

    pub fn series(mut self, name: &str, stages: &[&[&str]]) -> Self {
        self.registry
            .register_series(name, stages.iter().map(|s| to_names(s)).collect())
            .expect("valid series");
        self
    }

    /// Try to register a task, returning the registry error.
    pub fn try_task(&mut self, name: &str, deps: &[&str]) -> Result<(), ConfigError> {
        let action = self.recording(name, false);
        self.registry.register(name, to_names(deps), action)
    }

    pub fn log(&self) -> ExecutionLog {
        Arc::clone(&self.log)
    }

    pub fn build(self) -> (TaskRegistry, ExecutionLog) {
        (self.registry, self.log)
    }
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn to_names(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

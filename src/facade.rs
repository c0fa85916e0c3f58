// src/facade.rs

//! Entry points: maps a command name onto a target and runs it.
//!
//! - `clean`, `scripts`, `styles`, `images`, `assets`: that task
//! - `build`: `clean`, then `{scripts, styles, images}`, then `assets`
//! - any `[task.<name>]` from the config
//! - no command: `build`, then serve the output directory with live reload
//!   and watch stylesheets until Ctrl-C

use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use crate::config::{ConfigFile, TaskConfig};
use crate::dag::{TaskAction, TaskRegistry, TaskSpec};
use crate::engine::{BuildReport, Runtime, RuntimeEvent, RuntimeOptions, TaskName};
use crate::errors::{AssetdagError, ConfigError, TaskError};
use crate::exec::{RealExecutorBackend, shell_action};
use crate::server::{HttpDevServer, ServeOptions};
use crate::tasks::{self, ASSETS, BUILD, CLEAN, IMAGES, SCRIPTS, STYLES, TaskContext};
use crate::watch::{NotifyBackend, WatchSession};

/// What the user asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run one target and exit.
    Run(TaskName),
    /// Build, serve, watch.
    Default,
}

impl Command {
    /// The target built first.
    pub fn target(&self) -> &str {
        match self {
            Command::Run(target) => target,
            Command::Default => BUILD,
        }
    }
}

/// Register the standard tasks and the `build` composite.
pub fn register_standard_tasks(
    registry: &mut TaskRegistry,
    ctx: Arc<TaskContext>,
) -> Result<(), ConfigError> {
    let standard: [(&str, fn(&TaskContext) -> Result<(), TaskError>); 5] = [
        (CLEAN, tasks::clean::run),
        (SCRIPTS, tasks::scripts::run),
        (STYLES, tasks::styles::run),
        (IMAGES, tasks::images::run),
        (ASSETS, tasks::assets::run),
    ];

    for (name, run) in standard {
        let ctx = Arc::clone(&ctx);
        let action: TaskAction = Arc::new(move || run(&ctx));
        registry.register(name, Vec::new(), action)?;
    }

    registry.register_series(
        BUILD,
        vec![
            vec![CLEAN.to_string()],
            vec![SCRIPTS.to_string(), STYLES.to_string(), IMAGES.to_string()],
            vec![ASSETS.to_string()],
        ],
    )
}

/// Specs for `[task.<name>]` sections. Commands run from `root`.
///
/// A task with neither `cmd` nor `series` is a no-op that only groups its
/// `after` prerequisites.
pub fn user_task_specs(tasks: &BTreeMap<String, TaskConfig>, root: &Path) -> Vec<TaskSpec> {
    tasks
        .iter()
        .map(|(name, task)| match (&task.cmd, &task.series) {
            (_, Some(stages)) => TaskSpec::series(name, stages.clone()),
            (Some(cmd), None) => TaskSpec::action(name, task.after.clone(), shell_action(cmd, root)),
            (None, None) => {
                let noop: TaskAction = Arc::new(|| Ok(()));
                TaskSpec::action(name, task.after.clone(), noop)
            }
        })
        .collect()
}

/// Registry and context for one process.
#[derive(Debug)]
pub struct BuildFacade {
    context: Arc<TaskContext>,
    registry: Arc<TaskRegistry>,
}

impl BuildFacade {
    /// Build and validate the full task graph: standard tasks first, then
    /// the user's tasks as one batch. The `[watch].task` target must be
    /// one of them.
    pub fn new(context: TaskContext) -> Result<Self, ConfigError> {
        let context = Arc::new(context);
        let mut registry = TaskRegistry::new();
        register_standard_tasks(&mut registry, Arc::clone(&context))?;
        registry.register_batch(user_task_specs(context.config.tasks(), &context.root))?;
        let watch_task = &context.config.watch().task;
        registry
            .resolve(watch_task)
            .map_err(|_| ConfigError::UnknownWatchTask(watch_task.clone()))?;

        info!(tasks = registry.len(), "task registry ready");
        Ok(Self {
            context,
            registry: Arc::new(registry),
        })
    }

    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    pub fn context(&self) -> &TaskContext {
        &self.context
    }

    pub fn config(&self) -> &ConfigFile {
        &self.context.config
    }

    /// Map a CLI task argument to a [`Command`].
    pub fn resolve_command(&self, task: Option<&str>) -> Result<Command, AssetdagError> {
        match task {
            None => Ok(Command::Default),
            Some(name) if self.registry.contains(name) => Ok(Command::Run(name.to_string())),
            Some(name) => Err(AssetdagError::Usage {
                name: name.to_string(),
                available: self.registry.names().collect::<Vec<_>>().join(", "),
            }),
        }
    }

    /// Run `command` to completion and map the outcome to an exit code.
    pub async fn execute(&self, command: Command, options: RuntimeOptions) -> anyhow::Result<ExitCode> {
        let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);
        let executor = RealExecutorBackend::new(rt_tx.clone());
        let mut runtime = Runtime::new(Arc::clone(&self.registry), rt_rx, executor, options);

        let shutdown_rx = spawn_ctrl_c_handler(rt_tx);

        let report = runtime.run_target(command.target()).await?;
        println!("{report}");

        if command == Command::Default {
            if !should_serve(&report, &shutdown_rx) {
                info!("interrupted; not starting the dev server");
            } else {
                if !report.is_success() {
                    warn!("initial build failed; serving the previous output");
                }
                self.serve_and_watch(runtime, shutdown_rx).await?;
            }
        }

        Ok(exit_code(&report))
    }

    async fn serve_and_watch(
        &self,
        runtime: Runtime<RealExecutorBackend>,
        shutdown: watch::Receiver<bool>,
    ) -> anyhow::Result<()> {
        let cfg = self.config();
        let server = HttpDevServer::serve(
            self.context.dest(),
            ServeOptions::from_config(cfg.serve()),
        )
        .await?;

        let root = canonical_root(&self.context.root);
        let session = WatchSession::from_config(
            root,
            cfg,
            NotifyBackend,
            Arc::clone(&self.context.fs),
            Arc::new(server),
        )
        .context("setting up the watch session")?;

        let summary = session.run(runtime, shutdown).await;
        info!(
            runs = summary.runs,
            reloads = summary.reloads,
            degraded = summary.degraded,
            "stopped watching"
        );
        Ok(())
    }
}

/// Exit code for a finished run: 0 only on aggregate success.
pub fn exit_code(report: &BuildReport) -> ExitCode {
    if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// After an interrupted initial build (or a Ctrl-C that arrived right
/// after it) the default command exits instead of serving.
fn should_serve(report: &BuildReport, shutdown: &watch::Receiver<bool>) -> bool {
    !report.interrupted && !*shutdown.borrow()
}

/// Exit status after a second Ctrl-C.
const FORCED_EXIT_CODE: i32 = 130;

/// Ctrl-C stops the running build (pending tasks are skipped, running ones
/// drain) and ends the watch loop. A second Ctrl-C exits immediately.
fn spawn_ctrl_c_handler(rt_tx: mpsc::Sender<RuntimeEvent>) -> watch::Receiver<bool> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if relay_interrupts(tokio::signal::ctrl_c, shutdown_tx, rt_tx).await {
            warn!("second Ctrl+C; exiting without waiting for running tasks");
            std::process::exit(FORCED_EXIT_CODE);
        }
    });
    shutdown_rx
}

/// Turn the first interrupt into a graceful shutdown request. Returns
/// `true` once a second interrupt arrives.
///
/// If listening fails, the shutdown sender is kept until every receiver
/// is gone so a missing signal handler never reads as a shutdown.
async fn relay_interrupts<F, Fut>(
    mut interrupt: F,
    shutdown_tx: watch::Sender<bool>,
    rt_tx: mpsc::Sender<RuntimeEvent>,
) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<()>>,
{
    if let Err(e) = interrupt().await {
        warn!("failed to listen for Ctrl+C: {e}");
        shutdown_tx.closed().await;
        return false;
    }
    info!("Ctrl+C received; finishing running tasks (press again to quit)");
    let _ = shutdown_tx.send(true);
    let _ = rt_tx.send(RuntimeEvent::ShutdownRequested).await;

    match interrupt().await {
        Ok(()) => true,
        Err(e) => {
            warn!("failed to listen for Ctrl+C: {e}");
            shutdown_tx.closed().await;
            false
        }
    }
}

/// Watch backends report canonical paths.
fn canonical_root(root: &Path) -> PathBuf {
    root.canonicalize().unwrap_or_else(|_| root.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    fn facade(config: ConfigFile) -> Result<BuildFacade, ConfigError> {
        let ctx = TaskContext::new("/p", Arc::new(MockFileSystem::new()), Arc::new(config));
        BuildFacade::new(ctx)
    }

    fn config(toml_src: &str) -> ConfigFile {
        let raw: crate::config::RawConfigFile = toml::from_str(toml_src).unwrap();
        ConfigFile::try_from(raw).unwrap()
    }

    #[test]
    fn standard_commands_resolve() {
        let f = facade(ConfigFile::default()).unwrap();
        assert_eq!(f.resolve_command(None).unwrap(), Command::Default);
        assert_eq!(
            f.resolve_command(Some("styles")).unwrap(),
            Command::Run("styles".into())
        );
        assert_eq!(Command::Default.target(), "build");
    }

    #[test]
    fn unknown_command_lists_available_tasks() {
        let f = facade(ConfigFile::default()).unwrap();
        let err = f.resolve_command(Some("deploy")).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("unknown task 'deploy'"), "{msg}");
        assert!(msg.contains("clean, scripts, styles, images, assets, build"), "{msg}");
    }

    #[test]
    fn build_plan_follows_the_series() {
        let f = facade(ConfigFile::default()).unwrap();
        let graph = crate::dag::RunGraph::expand(f.registry(), BUILD).unwrap();
        let waves = graph.waves().unwrap();
        assert_eq!(waves[0], vec!["clean"]);
        assert_eq!(waves[1], vec!["scripts", "styles", "images"]);
        assert_eq!(waves[2], vec!["assets"]);
    }

    #[test]
    fn user_tasks_may_reference_each_other_in_any_order() {
        let f = facade(config(
            r#"
[task.release]
series = [["build"], ["upload"]]

[task.upload]
cmd = "true"
after = ["lint"]

[task.lint]
cmd = "true"
"#,
        ))
        .unwrap();
        assert!(f.registry().contains("release"));
        assert!(f.registry().contains("lint"));
    }

    #[test]
    fn user_task_cycle_is_fatal() {
        let err = facade(config(
            r#"
[task.a]
cmd = "true"
after = ["b"]

[task.b]
cmd = "true"
after = ["a"]
"#,
        ))
        .unwrap_err();
        assert!(matches!(err, ConfigError::CyclicDependency { .. }));
    }

    #[test]
    fn misspelled_watch_task_is_fatal() {
        let err = facade(config("[watch]\ntask = \"stlyes\"\n")).unwrap_err();
        assert_eq!(err, ConfigError::UnknownWatchTask("stlyes".into()));
    }

    #[test]
    fn watch_task_may_be_a_user_task() {
        let f = facade(config(
            "[watch]\ntask = \"css\"\n\n[task.css]\nseries = [[\"styles\"]]\n",
        ))
        .unwrap();
        assert!(f.registry().contains("css"));
    }

    #[test]
    fn interrupted_build_does_not_serve() {
        let (tx, rx) = watch::channel(false);
        let mut report = BuildReport {
            target: BUILD.into(),
            run_id: 1,
            results: Vec::new(),
            skipped: Vec::new(),
            interrupted: false,
            duration: std::time::Duration::ZERO,
        };
        assert!(should_serve(&report, &rx));

        report.interrupted = true;
        assert!(!should_serve(&report, &rx));

        report.interrupted = false;
        tx.send(true).unwrap();
        assert!(!should_serve(&report, &rx));
    }

    #[tokio::test]
    async fn first_interrupt_requests_shutdown_second_forces_exit() {
        let (signal_tx, signal_rx) = mpsc::unbounded_channel::<()>();
        let signal_rx = Arc::new(tokio::sync::Mutex::new(signal_rx));
        let interrupt = move || {
            let rx = Arc::clone(&signal_rx);
            async move {
                match rx.lock().await.recv().await {
                    Some(()) => Ok(()),
                    None => Err(std::io::Error::other("signal source closed")),
                }
            }
        };
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let (rt_tx, mut rt_rx) = mpsc::channel(4);
        let relay = tokio::spawn(relay_interrupts(interrupt, shutdown_tx, rt_tx));

        signal_tx.send(()).unwrap();
        shutdown_rx.changed().await.unwrap();
        assert!(*shutdown_rx.borrow());
        assert!(matches!(rt_rx.recv().await, Some(RuntimeEvent::ShutdownRequested)));
        assert!(!relay.is_finished());

        signal_tx.send(()).unwrap();
        assert!(relay.await.unwrap());
    }

    #[test]
    fn user_task_cannot_shadow_standard_task() {
        let err = facade(config("[task.styles]\ncmd = \"true\"\n")).unwrap_err();
        assert_eq!(err, ConfigError::DuplicateTask("styles".into()));
    }
}

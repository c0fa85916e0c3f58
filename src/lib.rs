// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod facade;
pub mod fs;
pub mod logging;
pub mod pipeline;
pub mod server;
pub mod tasks;
pub mod transform;
pub mod types;
pub mod watch;

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use tracing::debug;

use crate::cli::CliArgs;
use crate::config::{load_or_default, project_root};
use crate::engine::RuntimeOptions;
use crate::errors::AssetdagError;
use crate::facade::{BuildFacade, Command};
use crate::fs::RealFileSystem;
use crate::tasks::TaskContext;

/// Exit code for an unknown task name.
const USAGE_EXIT_CODE: u8 = 2;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and CLI overrides
/// - the task registry (standard tasks plus `[task.*]`)
/// - the runtime, dev server and watch loop via [`BuildFacade`]
pub async fn run(args: CliArgs) -> Result<ExitCode> {
    let config_path = args.config.as_deref().map(Path::new);
    let mut cfg = load_or_default(config_path)?;
    if let Some(port) = args.port {
        cfg.serve_mut().port = port;
    }

    let root = project_root(config_path);
    debug!(root = %root.display(), "project root");

    let options = RuntimeOptions {
        max_concurrency: args
            .jobs
            .unwrap_or_else(|| cfg.config_section().effective_concurrency())
            .max(1),
    };

    let context = TaskContext::new(root, Arc::new(RealFileSystem), Arc::new(cfg));
    let facade = BuildFacade::new(context)?;

    let command = match facade.resolve_command(args.task.as_deref()) {
        Ok(command) => command,
        Err(err @ AssetdagError::Usage { .. }) => {
            eprintln!("assetdag: {err}");
            return Ok(ExitCode::from(USAGE_EXIT_CODE));
        }
        Err(err) => return Err(err.into()),
    };

    if args.dry_run {
        print_dry_run(&facade, &command)?;
        return Ok(ExitCode::SUCCESS);
    }

    facade.execute(command, options).await
}

/// Print the dispatch waves of the target without running anything.
fn print_dry_run(facade: &BuildFacade, command: &Command) -> Result<()> {
    let target = command.target();
    let graph = dag::RunGraph::expand(facade.registry(), target)?;

    println!("assetdag dry-run: {target}");
    let mut wave_no = 0;
    for wave in graph.waves()? {
        let actions: Vec<_> = wave.into_iter().filter(|t| !graph.is_composite(t)).collect();
        if actions.is_empty() {
            continue;
        }
        wave_no += 1;
        println!("  {wave_no}. {}", actions.join(", "));
    }
    if *command == Command::Default {
        let serve = facade.config().serve();
        println!("  then serve on {}:{} and watch", serve.host, serve.port);
    }

    debug!("dry-run complete (no execution)");
    Ok(())
}

// tests/config_errors.rs

mod common;
use crate::common::Project;

use std::error::Error;
use std::sync::Arc;

use assetdag::config::{ConfigFile, load_and_validate, load_or_default, project_root};
use assetdag::errors::{AssetdagError, ConfigError};
use assetdag::facade::BuildFacade;
use assetdag::fs::mock::MockFileSystem;
use assetdag::tasks::TaskContext;
use assetdag_test_utils::builders::{ConfigFileBuilder, RegistryBuilder, TaskConfigBuilder};

type TestResult = Result<(), Box<dyn Error>>;

fn facade(config: ConfigFile) -> Result<BuildFacade, ConfigError> {
    BuildFacade::new(TaskContext::new(
        "/site",
        Arc::new(MockFileSystem::new()),
        Arc::new(config),
    ))
}

#[test]
fn config_file_round_trips_through_disk() -> TestResult {
    let project = Project::new();
    project.write(
        "Assetdag.toml",
        r#"
[paths]
dest = "public"

[watch]
patterns = ["sass/**/*.scss", "js/**/*.js"]
task = "build"
debounce_ms = 50

[task.lint]
cmd = "true"
"#,
    );

    let cfg = load_and_validate(project.path("Assetdag.toml"))?;
    assert_eq!(cfg.paths().dest, "public");
    assert_eq!(cfg.watch().task, "build");
    assert_eq!(cfg.watch().patterns.len(), 2);
    assert!(cfg.tasks().contains_key("lint"));
    assert_eq!(project_root(Some(project.path("Assetdag.toml").as_path())), project.root());
    Ok(())
}

#[test]
fn malformed_toml_is_reported() {
    let project = Project::new();
    project.write("Assetdag.toml", "[paths\ndest = 1\n");

    let err = load_and_validate(project.path("Assetdag.toml")).unwrap_err();
    assert!(matches!(err, AssetdagError::TomlError(_)), "{err}");
}

#[test]
fn explicit_missing_config_is_an_error() {
    let project = Project::new();
    let err = load_or_default(Some(project.path("nope.toml").as_path())).unwrap_err();
    assert!(matches!(err, AssetdagError::IoError(_)), "{err}");
}

#[test]
fn invalid_values_are_rejected_before_anything_runs() {
    let project = Project::new();
    project.write("Assetdag.toml", "[images]\njpeg_quality = 101\n");

    let err = load_and_validate(project.path("Assetdag.toml")).unwrap_err();
    assert!(err.to_string().contains("jpeg_quality"), "{err}");
}

#[test]
fn self_dependency_is_a_cycle() {
    let mut builder = RegistryBuilder::new();
    let err = builder.try_task("loop", &["loop"]).unwrap_err();
    assert_eq!(
        err,
        ConfigError::CyclicDependency {
            members: vec!["loop".into()]
        }
    );
}

#[test]
fn unknown_dependency_names_both_tasks() {
    let cfg = ConfigFileBuilder::new()
        .with_task("deploy", TaskConfigBuilder::cmd("true").after("upload").build())
        .build();

    let err = facade(cfg).unwrap_err();
    assert_eq!(
        err,
        ConfigError::UnknownDependency {
            task: "deploy".into(),
            dependency: "upload".into(),
        }
    );
}

#[test]
fn cycle_through_a_series_is_rejected() {
    let cfg = ConfigFileBuilder::new()
        .with_task("release", TaskConfigBuilder::series(&[&["build"], &["publish"]]).build())
        .with_task("publish", TaskConfigBuilder::cmd("true").after("release").build())
        .build();

    let err = facade(cfg).unwrap_err();
    let ConfigError::CyclicDependency { members } = err else {
        panic!("expected a cycle, got {err:?}");
    };
    assert!(members.contains(&"release".to_string()));
    assert!(members.contains(&"publish".to_string()));
}

#[test]
fn user_series_can_wrap_the_standard_build() -> TestResult {
    let cfg = ConfigFileBuilder::new()
        .with_task("lint", TaskConfigBuilder::cmd("true").build())
        .with_task(
            "release",
            TaskConfigBuilder::series(&[&["lint"], &["build"]]).build(),
        )
        .build();

    let f = facade(cfg)?;
    let graph = assetdag::dag::RunGraph::expand(f.registry(), "release")?;
    let waves = graph.waves()?;
    assert_eq!(waves[0], vec!["lint"]);
    assert_eq!(waves[1], vec!["clean"]);
    Ok(())
}

// src/config/validate.rs

use std::path::Path;

use globset::Glob;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{AssetdagError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = AssetdagError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_paths(cfg)?;
    validate_globs(cfg)?;
    validate_images(cfg)?;
    validate_watch(cfg)?;
    validate_tasks(cfg)?;
    Ok(())
}

fn invalid(msg: impl Into<String>) -> AssetdagError {
    AssetdagError::InvalidConfig(msg.into())
}

fn validate_paths(cfg: &RawConfigFile) -> Result<()> {
    if cfg.paths.dest.trim().is_empty() {
        return Err(invalid("[paths].dest must not be empty"));
    }

    ensure_bare_file_name("[scripts].bundle", &cfg.scripts.bundle)?;
    ensure_bare_file_name("[styles].bundle", &cfg.styles.bundle)?;
    ensure_bare_file_name("[styles].primary", &cfg.styles.primary)?;

    if cfg.styles.intermediate.trim().is_empty() {
        return Err(invalid("[styles].intermediate must not be empty"));
    }
    if cfg.styles.intermediate == cfg.paths.dest {
        return Err(invalid(
            "[styles].intermediate must differ from [paths].dest",
        ));
    }
    Ok(())
}

fn ensure_bare_file_name(key: &str, value: &str) -> Result<()> {
    let path = Path::new(value);
    let is_bare = !value.is_empty()
        && path.file_name().map(|n| n == path.as_os_str()).unwrap_or(false);
    if !is_bare {
        return Err(invalid(format!(
            "{key} must be a plain file name (got '{value}')"
        )));
    }
    Ok(())
}

fn validate_globs(cfg: &RawConfigFile) -> Result<()> {
    let groups: [(&str, &[String]); 5] = [
        ("[scripts].patterns", &cfg.scripts.patterns),
        ("[styles].patterns", &cfg.styles.patterns),
        ("[images].patterns", &cfg.images.patterns),
        ("[assets].patterns", &cfg.assets.patterns),
        ("[watch].patterns", &cfg.watch.patterns),
    ];

    for (key, patterns) in groups {
        for pattern in patterns {
            Glob::new(pattern)
                .map_err(|e| invalid(format!("{key}: invalid glob '{pattern}': {e}")))?;
        }
    }
    Ok(())
}

fn validate_images(cfg: &RawConfigFile) -> Result<()> {
    let q = cfg.images.jpeg_quality;
    if !(1..=100).contains(&q) {
        return Err(invalid(format!(
            "[images].jpeg_quality must be between 1 and 100 (got {q})"
        )));
    }
    Ok(())
}

fn validate_watch(cfg: &RawConfigFile) -> Result<()> {
    if cfg.watch.debounce_ms == 0 {
        return Err(invalid("[watch].debounce_ms must be >= 1 (got 0)"));
    }
    if cfg.watch.task.trim().is_empty() {
        return Err(invalid("[watch].task must name a task"));
    }
    Ok(())
}

fn validate_tasks(cfg: &RawConfigFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        if task.cmd.is_some() && task.series.is_some() {
            return Err(invalid(format!(
                "task '{name}' defines both `cmd` and `series`"
            )));
        }
        if task.series.is_some() && !task.after.is_empty() {
            return Err(invalid(format!(
                "task '{name}' combines `series` with `after`; put the prerequisites in the first stage"
            )));
        }
        if let Some(cmd) = &task.cmd
            && cmd.trim().is_empty()
        {
            return Err(invalid(format!("task '{name}' has an empty `cmd`")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> Result<ConfigFile> {
        let raw: RawConfigFile = toml::from_str(src)?;
        ConfigFile::try_from(raw)
    }

    #[test]
    fn empty_file_uses_defaults() {
        let cfg = parse("").unwrap();
        assert_eq!(cfg.paths().dest, "dist");
        assert_eq!(cfg.scripts().bundle, "all.min.js");
        assert_eq!(cfg.watch().task, "styles");
        assert_eq!(cfg.watch().debounce_ms, 200);
        assert!(cfg.tasks().is_empty());
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let cfg = parse("[styles]\nbundle = \"site.css\"\n").unwrap();
        assert_eq!(cfg.styles().bundle, "site.css");
        assert_eq!(cfg.styles().source, "sass");
    }

    #[test]
    fn rejects_bad_glob() {
        let err = parse("[watch]\npatterns = [\"sass/[\"]\n").unwrap_err();
        assert!(matches!(err, AssetdagError::InvalidConfig(_)), "{err}");
    }

    #[test]
    fn rejects_bundle_with_directory() {
        let err = parse("[scripts]\nbundle = \"out/all.js\"\n").unwrap_err();
        assert!(err.to_string().contains("[scripts].bundle"));
    }

    #[test]
    fn rejects_out_of_range_quality_and_zero_debounce() {
        assert!(parse("[images]\njpeg_quality = 0\n").is_err());
        assert!(parse("[watch]\ndebounce_ms = 0\n").is_err());
    }

    #[test]
    fn rejects_cmd_and_series_together() {
        let src = r#"
[task.release]
cmd = "echo hi"
series = [["build"]]
"#;
        let err = parse(src).unwrap_err();
        assert!(err.to_string().contains("both `cmd` and `series`"));
    }

    #[test]
    fn rejects_series_with_after() {
        let src = r#"
[task.release]
after = ["clean"]
series = [["build"]]
"#;
        assert!(parse(src).is_err());
    }
}

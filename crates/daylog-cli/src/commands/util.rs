//! Shared utilities for CLI commands.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::Datelike;

use daylog_core::{CategorySet, Period, Ruleset, find_rules_file, load_rules};

use crate::Config;

/// Extension tried when locating log files.
const LOG_EXTENSION: &str = ".log";

/// Locates a log file: the name as given, with the `.log` extension, and
/// both again under a `data/` directory. Falls back to the name as given so
/// the parser reports the read failure.
pub fn resolve_log_path(name: &str) -> PathBuf {
    let candidates = [
        name.to_string(),
        format!("{name}{LOG_EXTENSION}"),
        format!("data/{name}"),
        format!("data/{name}{LOG_EXTENSION}"),
    ];
    for candidate in &candidates {
        let path = PathBuf::from(candidate);
        if path.exists() {
            return path;
        }
    }
    PathBuf::from(name)
}

/// Parses `Category = ... = Target` collapse overrides.
pub fn parse_collapse_overrides(args: &[String]) -> Result<HashMap<String, String>> {
    let mut collapses = HashMap::new();
    for arg in args {
        let mut parts: Vec<&str> = arg.split('=').map(str::trim).collect();
        let target = parts.pop().filter(|t| !t.is_empty());
        let (Some(target), false) = (target, parts.is_empty()) else {
            bail!("unrecognized collapse rule on the command line: {arg}");
        };
        if parts.iter().any(|p| p.is_empty()) {
            bail!("unrecognized collapse rule on the command line: {arg}");
        }
        for source in parts {
            collapses.insert(source.to_string(), target.to_string());
        }
    }
    Ok(collapses)
}

/// Loads and compiles the rules file named on the command line or in the
/// configuration, with collapse overrides and ad-hoc counters applied.
pub fn load_ruleset(
    config: &Config,
    rules_arg: Option<&str>,
    collapses: &HashMap<String, String>,
    checks: &[String],
) -> Result<(Ruleset, CategorySet)> {
    let name = rules_arg.unwrap_or(&config.rules_file);
    let path = find_rules_file(name, Path::new("."))
        .with_context(|| format!("cannot locate rules file {name:?}"))?;
    let (mut ruleset, categories) =
        load_rules(&path, collapses).with_context(|| format!("failed to compile {}", path.display()))?;
    for check in checks {
        ruleset
            .add_check(check)
            .with_context(|| format!("invalid counter pattern {check:?}"))?;
    }
    Ok((ruleset, categories))
}

/// Year logs belong to when neither the file path nor the config says.
pub fn default_year(config: &Config) -> i32 {
    config.year.unwrap_or_else(|| chrono::Local::now().year())
}

/// Period from the command line; without one, nothing is excluded.
pub fn parse_period(arg: Option<&str>, year: i32) -> Result<Period> {
    match arg {
        Some(text) => Period::parse(text, year).context("invalid period"),
        None => Ok(Period::unbounded()),
    }
}

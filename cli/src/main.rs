use std::{
    env, fs,
    io::{self, Read, Write},
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context};
use clap::{ArgAction, Parser};
use console::style;
use evergreen_core::{load_rules_file, Config, Rewrite, Rewriter, RuleOutcome};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Serialize;
use serde_yaml::Value as YamlValue;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

/// Evergreen CLI entry point.
#[derive(Debug, Parser)]
#[command(
    name = "evergreen",
    about = "Swap flagged terms in HTML pages for inline suggestion widgets."
)]
struct Args {
    /// Path to config file (YAML). Defaults to evergreen.yml if present.
    #[arg(long, default_value = "evergreen.yml")]
    config: PathBuf,

    /// Extra rule files (JSON or YAML, repeatable). Applied after the config's rules.
    #[arg(long, value_name = "FILE")]
    rules: Vec<PathBuf>,

    /// Do not load the bundled word list.
    #[arg(long, action = ArgAction::SetTrue)]
    no_builtin: bool,

    /// Rewrite files in place instead of only reporting.
    #[arg(long, action = ArgAction::SetTrue)]
    write: bool,

    /// Emit a JSON report.
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,

    /// Exit non-zero when any replacement would be made.
    #[arg(long, action = ArgAction::SetTrue)]
    check: bool,

    /// Skip paths matching these globs (repeatable).
    #[arg(long, value_name = "GLOB")]
    ignore: Vec<String>,

    /// Set config overrides (repeatable as key=value). Example: --set widget.container_class=eg
    #[arg(long = "set", value_name = "KEY=VALUE")]
    sets: Vec<String>,

    /// More logging on stderr (-v info, -vv debug). EVERGREEN_LOG takes precedence.
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// HTML files or directories to rewrite, or `-` for stdin to stdout.
    #[arg(value_name = "PATH", default_value = ".", num_args = 0..)]
    paths: Vec<PathBuf>,
}

#[derive(Debug, Serialize)]
struct FileResult {
    path: String,
    replacements: usize,
    rules: Vec<RuleOutcome>,
    failures: Vec<FailureEntry>,
    written: bool,
}

#[derive(Debug, Serialize)]
struct FailureEntry {
    pattern: String,
    error: String,
}

#[derive(Debug, Serialize)]
struct OutputReport {
    files: Vec<FileResult>,
    total_replacements: usize,
    rules_loaded: usize,
    rejected_rules: Vec<String>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);
    run(args)
}

fn init_logging(verbose: u8) {
    let fallback = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_env("EVERGREEN_LOG").unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn run(args: Args) -> anyhow::Result<()> {
    let (mut cfg, config_root) = load_config(&args.config)?;
    apply_overrides(&mut cfg, &args.sets)?;
    if args.no_builtin {
        cfg.builtin_rules = false;
    }

    let mut load = cfg.load_rules(&config_root)?;
    for path in &args.rules {
        let extra = load_rules_file(path)?;
        load.rules.extend(extra.rules);
        load.rejected.extend(extra.rejected);
    }
    let mut rejected: Vec<String> = load.rejected.iter().map(|e| e.to_string()).collect();

    let rewriter = Rewriter::new(cfg, load.rules);
    rejected.extend(
        rewriter
            .invalid_rules()
            .iter()
            .map(|f| format!("{}: {}", f.pattern, f.error)),
    );
    let rules_loaded = rewriter.rules().count();
    debug!(rules_loaded, rejected = rejected.len(), "rules ready");

    if args.paths.len() == 1 && args.paths[0].as_os_str() == "-" {
        return run_stdin(&args, &rewriter, rejected);
    }

    let ignore = build_ignore_set(&args.ignore)?;
    let mut files = collect_files(&args.paths, ignore.as_ref())?;
    files.sort();

    let mut file_reports = Vec::new();
    let mut total = 0usize;

    for path in files {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let (html, rewrite) = rewriter.rewrite_html(&content);
        let replacements = rewrite.total_replacements();
        total += replacements;

        let written = args.write && replacements > 0;
        if written {
            fs::write(&path, html)
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }

        let display = pathdiff::diff_paths(&path, &config_root).unwrap_or_else(|| path.clone());
        let display = display.to_string_lossy().replace('\\', "/");
        if !args.json {
            print_human_report(&display, &rewrite, written);
        }
        file_reports.push(file_result(display, &rewrite, written));
    }

    if args.json {
        let output = OutputReport {
            files: file_reports,
            total_replacements: total,
            rules_loaded,
            rejected_rules: rejected,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        for reason in &rejected {
            println!("{} {}", style("skipped rule:").yellow(), reason);
        }
        let verb = if args.write { "made" } else { "found" };
        println!(
            "\n{} files, {} replacements {}, {} rules",
            file_reports.len(),
            total,
            verb,
            rules_loaded
        );
    }

    if args.check && total > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn run_stdin(args: &Args, rewriter: &Rewriter, rejected: Vec<String>) -> anyhow::Result<()> {
    let mut content = String::new();
    io::stdin()
        .read_to_string(&mut content)
        .context("Failed to read stdin")?;
    let (html, rewrite) = rewriter.rewrite_html(&content);
    let total = rewrite.total_replacements();

    if args.json {
        let output = OutputReport {
            files: vec![file_result("-".into(), &rewrite, false)],
            total_replacements: total,
            rules_loaded: rewriter.rules().count(),
            rejected_rules: rejected,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        let mut out = io::stdout().lock();
        out.write_all(html.as_bytes())?;
        out.flush()?;
    }

    if args.check && total > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn file_result(path: String, rewrite: &Rewrite, written: bool) -> FileResult {
    FileResult {
        path,
        replacements: rewrite.total_replacements(),
        rules: rewrite.applied().cloned().collect(),
        failures: rewrite
            .failures
            .iter()
            .map(|f| FailureEntry {
                pattern: f.pattern.clone(),
                error: f.error.to_string(),
            })
            .collect(),
        written,
    }
}

fn build_ignore_set(patterns: &[String]) -> anyhow::Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(Some(builder.build()?))
}

fn collect_files(paths: &[PathBuf], ignore: Option<&GlobSet>) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut walker = WalkDir::new(path).into_iter();
            while let Some(entry_res) = walker.next() {
                let entry = entry_res?;
                let entry_path = entry.path();
                if let Some(set) = ignore {
                    if set.is_match(entry_path) {
                        if entry.file_type().is_dir() {
                            walker.skip_current_dir();
                        }
                        continue;
                    }
                }
                if entry.file_type().is_file() && is_html(entry_path) {
                    files.push(entry_path.to_path_buf());
                }
            }
        } else if path.is_file() {
            if ignore.is_some_and(|set| set.is_match(path)) {
                continue;
            }
            files.push(path.clone());
        } else {
            warn!(path = %path.display(), "no such file or directory");
        }
    }
    Ok(files)
}

fn is_html(path: &Path) -> bool {
    match path.extension().and_then(|s| s.to_str()) {
        Some(ext) => matches!(ext.to_lowercase().as_str(), "html" | "htm"),
        None => false,
    }
}

fn load_config(path: &Path) -> anyhow::Result<(Config, PathBuf)> {
    if path.exists() {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let value: YamlValue = serde_yaml::from_str(&text)
            .with_context(|| format!("Failed to parse YAML {}", path.display()))?;
        let cfg: Config = if value.is_null() {
            Config::default()
        } else {
            serde_yaml::from_value(value)
                .with_context(|| format!("Invalid config structure in {}", path.display()))?
        };
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => env::current_dir()?,
        };
        Ok((cfg, dir))
    } else {
        Ok((Config::default(), env::current_dir()?))
    }
}

fn apply_overrides(cfg: &mut Config, sets: &[String]) -> anyhow::Result<()> {
    for kv in sets {
        let (key, val) = kv
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got {kv:?}"))?;
        let (key, val) = (key.trim(), val.trim());
        match key {
            "enabled" => cfg.enabled = parse_bool(val),
            "builtin_rules" => cfg.builtin_rules = parse_bool(val),
            "rules_file" => {
                cfg.rules_file = (!val.is_empty()).then(|| PathBuf::from(val));
            }
            "skip_classes" => {
                cfg.skip_classes = val
                    .split(',')
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .map(str::to_string)
                    .collect();
            }
            "widget.container_class" => cfg.widget.container_class = val.to_string(),
            "widget.marked_class" => cfg.widget.marked_class = val.to_string(),
            "widget.alternative_class" => cfg.widget.alternative_class = val.to_string(),
            "widget.note_attribute" => cfg.widget.note_attribute = val.to_string(),
            "widget.original_attribute" => cfg.widget.original_attribute = val.to_string(),
            _ => warn!(key, "unknown config key"),
        }
    }
    Ok(())
}

fn parse_bool(val: &str) -> bool {
    matches!(val.to_ascii_lowercase().as_str(), "true" | "1" | "yes" | "on")
}

fn print_human_report(path: &str, rewrite: &Rewrite, written: bool) {
    let total = rewrite.total_replacements();
    let suffix = if written { ", written" } else { "" };
    println!(
        "{} ({} replacements{})",
        style(path).bold(),
        total,
        suffix
    );
    if total == 0 && rewrite.failures.is_empty() {
        println!("  {}", style("clean").green());
        return;
    }
    for outcome in rewrite.applied() {
        println!(
            "  [{}] x{} → {}",
            style(&outcome.pattern).yellow(),
            outcome.replacements,
            outcome.alternative
        );
    }
    for failure in &rewrite.failures {
        println!(
            "  {} {}: {}",
            style("failed").red(),
            failure.pattern,
            failure.error
        );
    }
}

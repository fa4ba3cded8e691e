//! CLI for keymigrate.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use keymigrate::prelude::*;
use keymigrate::rules::builtin::{self, BUILTIN_NAMES, DEFAULT_FACTORY};
use std::io;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "keymigrate")]
#[command(author, version, about = "Rewrite concatenated persistence keys into key-factory calls", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rewrite key expressions in files
    Run {
        /// Built-in rule set to apply
        #[arg(short, long, default_value = "upgrade-state", conflicts_with = "config")]
        rules: String,

        /// Rule table to apply (YAML or JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Receiver of the generated calls, for built-in rule sets
        #[arg(short, long, default_value = DEFAULT_FACTORY)]
        factory: String,

        /// File extension to include when walking directories (e.g. "java")
        #[arg(short, long)]
        ext: Vec<String>,

        /// Glob pattern to exclude when walking directories
        #[arg(long)]
        exclude: Vec<String>,

        /// Preview changes without writing
        #[arg(long)]
        dry_run: bool,

        /// Print a diff of every modified file
        #[arg(long)]
        diff: bool,

        /// Files or directories to migrate
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// List built-in rule sets, or the rules of one
    Rules {
        /// Rule set to show
        name: Option<String>,

        /// Receiver of the generated calls
        #[arg(short, long, default_value = DEFAULT_FACTORY)]
        factory: String,
    },

    /// Write a built-in rule set to a YAML or JSON file for editing
    Export {
        /// Rule set to export
        name: String,

        /// Output file (.yaml, .yml or .json)
        #[arg(short, long)]
        out: PathBuf,

        /// Receiver of the generated calls
        #[arg(short, long, default_value = DEFAULT_FACTORY)]
        factory: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Run {
            rules,
            config,
            factory,
            ext,
            exclude,
            dry_run,
            diff,
            paths,
        } => {
            let rule_set = match config {
                Some(path) => RuleSetConfig::load(&path)
                    .and_then(|c| c.to_rule_set())
                    .with_context(|| format!("Failed to load rules from {}", path.display()))?,
                None => builtin::by_name(&rules, &factory)?,
            };
            cmd_run(rule_set, ext, exclude, paths, dry_run, diff)
        }
        Commands::Rules { name, factory } => cmd_rules(name, &factory),
        Commands::Export { name, out, factory } => cmd_export(&name, out, &factory),
    }
}

fn init_tracing(verbose: u8) {
    use tracing_subscriber::EnvFilter;

    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn cmd_run(
    rule_set: RuleSet,
    ext: Vec<String>,
    exclude: Vec<String>,
    paths: Vec<PathBuf>,
    dry_run: bool,
    diff: bool,
) -> Result<()> {
    let mut task = MigrationTask::new(rule_set).targets(paths);
    for e in ext {
        task = task.extension(e);
    }
    for pattern in exclude {
        task = task.exclude(pattern);
    }
    if dry_run {
        task = task.dry_run();
    }

    let report = task.run().context("Migration failed")?;

    for file in &report.files {
        println!("File: {}", file.path.display());
        println!("  Original lines: {}", file.original_lines);
        println!("  Changed lines:  {}", file.changed_lines);
    }

    if diff {
        println!("{}", report.colorized_diff());
    }

    let verb = if report.dry_run { "Would modify" } else { "Modified" };
    println!(
        "\n{} {} of {} file(s) with rule set '{}' ({} line(s) changed)",
        verb,
        report.files_modified(),
        report.files.len(),
        report.rule_set,
        report.total_changed_lines()
    );

    if !report.manual_notes.is_empty() {
        println!("\nManual follow-up required:");
        for note in &report.manual_notes {
            println!("  - {}", note);
        }
    }

    Ok(())
}

fn cmd_rules(name: Option<String>, factory: &str) -> Result<()> {
    let Some(name) = name else {
        println!("Built-in rule sets:");
        for set in builtin::all(factory)? {
            println!("  {:<14} {} ({} rules)", set.name(), set.description(), set.len());
        }
        return Ok(());
    };

    let set = builtin::by_name(&name, factory)?;
    println!("{}: {}", set.name(), set.description());
    for (index, description) in set.describe().iter().enumerate() {
        println!("  {:>3}. {}", index + 1, description);
    }

    for (producer, consumer) in set.template_conflicts("id") {
        println!(
            "  warning: output of rule {} is matched by rule {}",
            producer + 1,
            consumer + 1
        );
    }
    Ok(())
}

fn cmd_export(name: &str, out: PathBuf, factory: &str) -> Result<()> {
    if !BUILTIN_NAMES.contains(&name) {
        bail!(
            "Unknown rule set '{}'; expected one of: {}",
            name,
            BUILTIN_NAMES.join(", ")
        );
    }
    let set = builtin::by_name(name, factory)?;
    set.to_config()
        .save(&out)
        .with_context(|| format!("Failed to write {}", out.display()))?;
    println!("Wrote {} rule(s) to {}", set.len(), out.display());
    Ok(())
}

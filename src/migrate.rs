//! File-level migration: select files, rewrite them, write them back, report.

use crate::diff::{DiffSummary, colorized_diff, unified_diff};
use crate::engine::RewriteEngine;
use crate::error::{MigrateError, Result};
use crate::rules::RuleSet;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// The outcome of migrating one file.
#[derive(Debug, Clone)]
pub struct FileReport {
    pub path: PathBuf,
    pub original: String,
    pub rewritten: String,
    pub original_lines: usize,
    pub changed_lines: usize,
    pub rule_hits: Vec<usize>,
}

impl FileReport {
    /// Returns true if the content was modified.
    pub fn is_modified(&self) -> bool {
        self.original != self.rewritten
    }

    /// Total replacements made in this file.
    pub fn total_hits(&self) -> usize {
        self.rule_hits.iter().sum()
    }

    pub fn diff(&self) -> String {
        unified_diff(&self.original, &self.rewritten, &self.path)
    }

    pub fn colorized_diff(&self) -> String {
        colorized_diff(&self.original, &self.rewritten, &self.path)
    }
}

/// The outcome of a whole migration run.
#[derive(Debug)]
pub struct MigrationReport {
    pub rule_set: String,
    pub files: Vec<FileReport>,
    /// Key shapes the rule set leaves for manual follow-up.
    pub manual_notes: Vec<String>,
    pub dry_run: bool,
}

impl MigrationReport {
    /// Returns the number of files that were (or would be) modified.
    pub fn files_modified(&self) -> usize {
        self.files.iter().filter(|f| f.is_modified()).count()
    }

    pub fn total_changed_lines(&self) -> usize {
        self.files.iter().map(|f| f.changed_lines).sum()
    }

    pub fn total_original_lines(&self) -> usize {
        self.files.iter().map(|f| f.original_lines).sum()
    }

    /// Unified diff of every modified file.
    pub fn diff(&self) -> String {
        self.files
            .iter()
            .filter(|f| f.is_modified())
            .map(FileReport::diff)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Colorized diff of every modified file.
    pub fn colorized_diff(&self) -> String {
        self.files
            .iter()
            .filter(|f| f.is_modified())
            .map(FileReport::colorized_diff)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Insertions and deletions across all files.
    pub fn summary(&self) -> DiffSummary {
        let mut summary = DiffSummary::default();
        for file in &self.files {
            summary.merge(&DiffSummary::from_diff(&file.original, &file.rewritten));
        }
        summary
    }
}

/// One migration run: which files to touch and which rules to apply.
///
/// Targets may be files or directories. Directories are walked recursively
/// and filtered by extension and exclude globs; explicitly named files are
/// always processed.
pub struct MigrationTask {
    engine: RewriteEngine,
    targets: Vec<PathBuf>,
    extensions: Vec<String>,
    exclude_globs: Vec<String>,
    dry_run: bool,
}

impl MigrationTask {
    /// Creates a task that applies `rules`.
    pub fn new(rules: RuleSet) -> Self {
        Self {
            engine: RewriteEngine::new(rules),
            targets: Vec::new(),
            extensions: Vec::new(),
            exclude_globs: Vec::new(),
            dry_run: false,
        }
    }

    /// Adds a file or directory to migrate.
    pub fn target(mut self, path: impl Into<PathBuf>) -> Self {
        self.targets.push(path.into());
        self
    }

    /// Adds several files or directories.
    pub fn targets(mut self, paths: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        self.targets.extend(paths.into_iter().map(Into::into));
        self
    }

    /// Limits directory walks to files with this extension (without dot).
    pub fn extension(mut self, ext: impl Into<String>) -> Self {
        self.extensions.push(ext.into());
        self
    }

    /// Skips directory entries matching the glob, relative to the directory.
    pub fn exclude(mut self, pattern: impl Into<String>) -> Self {
        self.exclude_globs.push(pattern.into());
        self
    }

    /// Enables dry-run mode (report without writing).
    pub fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }

    pub fn rule_set(&self) -> &RuleSet {
        self.engine.rule_set()
    }

    /// Collects the files this task would process, sorted and deduplicated.
    pub fn collect_files(&self) -> Result<Vec<PathBuf>> {
        let exclude_set = build_glob_set(&self.exclude_globs)?;
        let mut files = Vec::new();

        for target in &self.targets {
            let metadata =
                fs::metadata(target).map_err(|e| MigrateError::file_access(target, e))?;
            if metadata.is_file() {
                files.push(target.clone());
                continue;
            }

            for entry in WalkDir::new(target) {
                let entry = entry.map_err(|e| walk_error(target, e))?;
                let path = entry.path();
                // follows symlinks, unlike the entry's own file type
                if !path.is_file() {
                    continue;
                }

                if !self.extensions.is_empty() {
                    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
                    if !self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)) {
                        continue;
                    }
                }

                let rel_path = path.strip_prefix(target).unwrap_or(path);
                if !self.exclude_globs.is_empty() && exclude_set.is_match(rel_path) {
                    debug!(path = %path.display(), "excluded by glob");
                    continue;
                }

                files.push(path.to_path_buf());
            }
        }

        files.sort();
        files.dedup();
        Ok(files)
    }

    /// Rewrites one file. Writes it back unless this is a dry run.
    pub fn migrate_file(&self, path: &Path) -> Result<FileReport> {
        let original = fs::read_to_string(path).map_err(|e| MigrateError::file_access(path, e))?;
        let result = self.engine.rewrite(&original);

        if result.is_modified() && !self.dry_run {
            fs::write(path, &result.text).map_err(|e| MigrateError::file_access(path, e))?;
            info!(
                path = %path.display(),
                changed_lines = result.changed_lines,
                "migrated"
            );
        } else {
            debug!(
                path = %path.display(),
                changed_lines = result.changed_lines,
                dry_run = self.dry_run,
                "not written"
            );
        }

        Ok(FileReport {
            path: path.to_path_buf(),
            original_lines: result.original_lines,
            changed_lines: result.changed_lines,
            rule_hits: result.rule_hits,
            rewritten: result.text,
            original,
        })
    }

    /// Runs the migration over every selected file.
    ///
    /// The first unreadable or unwritable file aborts the run. Files already
    /// written stay written; re-running is safe because migrated text is left
    /// unchanged by a second pass.
    pub fn run(self) -> Result<MigrationReport> {
        let files = self.collect_files()?;
        if files.is_empty() {
            return Err(MigrateError::NoFilesMatched);
        }

        let reports = files
            .iter()
            .map(|path| self.migrate_file(path))
            .collect::<Result<Vec<_>>>()?;

        let rules = self.engine.rule_set();
        Ok(MigrationReport {
            rule_set: rules.name().to_string(),
            files: reports,
            manual_notes: rules.manual_notes().to_vec(),
            dry_run: self.dry_run,
        })
    }
}

fn walk_error(target: &Path, err: walkdir::Error) -> MigrateError {
    let path = err.path().unwrap_or(target).to_path_buf();
    let source = err
        .into_io_error()
        .unwrap_or_else(|| io::Error::other("filesystem loop while walking directory"));
    MigrateError::file_access(path, source)
}

fn build_glob_set(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

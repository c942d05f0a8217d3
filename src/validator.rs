//! Consistency validation across locale files and the index manifest.
//!
//! This module audits persisted state without modifying it:
//! - every locale file contains every key of the source locale
//! - every manifest code has a locale file
//! - every locale file has a manifest entry
//!
//! All problems are collected before returning so one run reports the
//! complete picture.

use crate::config::Config;
use crate::manifest::IndexManifest;
use crate::store::{self, EntrySet};
use anyhow::{Context, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A single consistency problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// A locale file lacks a source key
    MissingKey { file: String, key: String },

    /// A manifest code has no locale file
    MissingLocaleFile { code: String },

    /// A locale file has no manifest entry
    UnlistedLocaleFile { file: String, manifest: String },

    /// A locale file could not be parsed
    MalformedLocaleFile { file: String, reason: String },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::MissingKey { file, key } => write!(f, "{}: {} not found.", file, key),
            Diagnostic::MissingLocaleFile { code } => write!(f, "{}.json not found.", code),
            Diagnostic::UnlistedLocaleFile { file, manifest } => {
                write!(f, "{} not found in {}.", file, manifest)
            }
            Diagnostic::MalformedLocaleFile { file, reason } => {
                write!(f, "{}: malformed ({})", file, reason)
            }
        }
    }
}

/// Outcome of a validation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if the report is clean (no diagnostics)
    pub fn is_success(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// Human-readable lines, one per diagnostic
    pub fn lines(&self) -> Vec<String> {
        self.diagnostics.iter().map(ToString::to_string).collect()
    }
}

/// Validator for persisted locale state.
pub struct ConsistencyValidator<'a> {
    localizations_dir: &'a Path,
    source_file: PathBuf,
    index_file: &'a Path,
}

impl<'a> ConsistencyValidator<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self {
            localizations_dir: &config.localizations_dir,
            source_file: config.source_file(),
            index_file: &config.index_file,
        }
    }

    /// Run every check and collect diagnostics.
    ///
    /// Missing or unreadable source file or manifest is a fatal error, not a
    /// diagnostic.
    pub fn validate(&self) -> Result<ValidationReport> {
        let canonical = store::load(&self.source_file)
            .with_context(|| format!("Failed to load source file {}", self.source_file.display()))?;
        let manifest = IndexManifest::load(self.index_file).context("Failed to load index manifest")?;
        let locale_files = self.locale_files()?;

        info!(
            "Validating {} locale files against {} source keys",
            locale_files.len(),
            canonical.len()
        );

        let mut report = ValidationReport::new();
        check_completeness(&canonical, &locale_files, &mut report);
        check_manifest_files(&manifest, self.localizations_dir, &mut report);
        check_files_listed(&manifest, &locale_files, &self.manifest_name(), &mut report);

        Ok(report)
    }

    fn manifest_name(&self) -> String {
        self.index_file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "index.json".to_string())
    }

    /// `*.json` files in the localizations directory, sorted by name.
    ///
    /// The manifest is excluded when it lives in the same directory.
    fn locale_files(&self) -> Result<Vec<PathBuf>> {
        let entries = std::fs::read_dir(self.localizations_dir).with_context(|| {
            format!(
                "Failed to read localizations directory {}",
                self.localizations_dir.display()
            )
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let is_json = path.extension().is_some_and(|ext| ext == "json");
            if is_json && path.is_file() && !same_file(&path, self.index_file) {
                files.push(path);
            }
        }
        files.sort();
        debug!("Found locale files: {:?}", files);
        Ok(files)
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn locale_code(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Every locale file must contain every source key.
pub fn check_completeness(canonical: &EntrySet, locale_files: &[PathBuf], report: &mut ValidationReport) {
    for path in locale_files {
        let file = file_name(path);
        let contents = match store::load(path) {
            Ok(contents) => contents,
            Err(e) => {
                report.push(Diagnostic::MalformedLocaleFile {
                    file,
                    reason: e.to_string(),
                });
                continue;
            }
        };

        for key in canonical.keys() {
            if !contents.contains_key(key) {
                report.push(Diagnostic::MissingKey {
                    file: file.clone(),
                    key: key.clone(),
                });
            }
        }
    }
}

/// Every manifest code must have a locale file.
pub fn check_manifest_files(manifest: &IndexManifest, localizations_dir: &Path, report: &mut ValidationReport) {
    for code in manifest.codes() {
        if !localizations_dir.join(format!("{}.json", code)).is_file() {
            report.push(Diagnostic::MissingLocaleFile {
                code: code.to_string(),
            });
        }
    }
}

/// Every locale file must have a manifest entry.
pub fn check_files_listed(
    manifest: &IndexManifest,
    locale_files: &[PathBuf],
    manifest_name: &str,
    report: &mut ValidationReport,
) {
    for path in locale_files {
        if !manifest.contains(&locale_code(path)) {
            report.push(Diagnostic::UnlistedLocaleFile {
                file: file_name(path),
                manifest: manifest_name.to_string(),
            });
        }
    }
}

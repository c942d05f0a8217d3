//! Change detection for the source locale file.
//!
//! A key counts as changed when a unified diff of the source file contains an
//! added line of the form `"key": value`. That covers both new keys and keys
//! whose value changed. Deleted keys are not reported; the merge step drops
//! them implicitly because it only ever emits the source's current keys.

use crate::error::ChangeDetectionError;
use regex::Regex;
use similar::TextDiff;
use std::collections::BTreeSet;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Keys added or modified since the previous revision.
pub type ChangeSet = BTreeSet<String>;

static ADDED_KEY_REGEX: OnceLock<Regex> = OnceLock::new();

/// Extract changed keys from unified diff text.
pub fn changed_keys_from_diff(diff: &str) -> ChangeSet {
    let regex = ADDED_KEY_REGEX
        .get_or_init(|| Regex::new(r#"(?m)^\+\s*"((?:[^"\\]|\\.)+)"\s*:"#).unwrap());

    regex
        .captures_iter(diff)
        .filter_map(|cap| cap.get(1).map(|m| unescape_key(m.as_str())))
        .collect()
}

/// Decode JSON escapes in a key as written in the file.
fn unescape_key(raw: &str) -> String {
    serde_json::from_str::<String>(&format!("\"{}\"", raw)).unwrap_or_else(|_| raw.to_string())
}

/// Compute the change set between two texts of the source file.
///
/// No previous text, or byte-identical texts, yields an empty set.
pub fn detect_changes(previous: Option<&str>, current: &str) -> ChangeSet {
    let Some(previous) = previous else {
        return ChangeSet::new();
    };
    if previous == current {
        return ChangeSet::new();
    }

    let diff = TextDiff::from_lines(previous, current)
        .unified_diff()
        .header("previous", "current")
        .to_string();

    changed_keys_from_diff(&diff)
}

/// Source of the previous revision of the source locale file.
pub trait RevisionSource {
    /// Keys changed in `source_file` relative to its previous revision.
    ///
    /// `source_file` is the same path the caller loaded, not a path relative
    /// to any repository root.
    ///
    /// `current_text` is the file content already loaded by the caller.
    fn changed_keys(
        &self,
        source_file: &Path,
        current_text: &str,
    ) -> impl Future<Output = Result<ChangeSet, ChangeDetectionError>> + Send;
}

/// Compares against a snapshot of the previous source text held in memory.
#[derive(Debug, Clone, Default)]
pub struct SnapshotRevisionSource {
    previous: Option<String>,
}

impl SnapshotRevisionSource {
    pub fn new(previous: Option<String>) -> Self {
        Self { previous }
    }
}

impl RevisionSource for SnapshotRevisionSource {
    async fn changed_keys(
        &self,
        _source_file: &Path,
        current_text: &str,
    ) -> Result<ChangeSet, ChangeDetectionError> {
        Ok(detect_changes(self.previous.as_deref(), current_text))
    }
}

/// Diffs the last two commits of the source file with `git`.
#[derive(Debug, Clone)]
pub struct GitRevisionSource {
    work_dir: PathBuf,
    timeout: Duration,
}

impl GitRevisionSource {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn run_git(&self, dir: &Path, args: &[&str]) -> Result<Output, ChangeDetectionError> {
        let mut command = Command::new("git");
        command.args(args).current_dir(dir).kill_on_drop(true);

        match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(result) => result.map_err(ChangeDetectionError::Spawn),
            Err(_) => Err(ChangeDetectionError::TimedOut(self.timeout)),
        }
    }

    /// Repository root, or the working directory when it cannot be resolved.
    async fn repo_root(&self) -> PathBuf {
        match self.run_git(&self.work_dir, &["rev-parse", "--show-toplevel"]).await {
            Ok(output) if output.status.success() => {
                let root = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if root.is_empty() {
                    self.work_dir.clone()
                } else {
                    PathBuf::from(root)
                }
            }
            _ => {
                warn!(
                    "Could not resolve git root, using {}",
                    self.work_dir.display()
                );
                self.work_dir.clone()
            }
        }
    }
}

impl RevisionSource for GitRevisionSource {
    async fn changed_keys(
        &self,
        source_file: &Path,
        _current_text: &str,
    ) -> Result<ChangeSet, ChangeDetectionError> {
        let root = self.repo_root().await;

        let inside = self
            .run_git(&root, &["rev-parse", "--is-inside-work-tree"])
            .await?;
        if !inside.status.success() {
            return Err(ChangeDetectionError::Failed {
                status: inside.status.to_string(),
                stderr: String::from_utf8_lossy(&inside.stderr).trim().to_string(),
            });
        }

        let parent = self
            .run_git(&root, &["rev-parse", "--verify", "--quiet", "HEAD~1"])
            .await?;
        if !parent.status.success() {
            info!("No previous revision of the source file, nothing to translate");
            return Ok(ChangeSet::new());
        }

        // Relative paths are relative to the process, like every other file the run touches.
        let file = std::fs::canonicalize(source_file).map_err(|source| {
            ChangeDetectionError::SourcePath {
                path: source_file.to_path_buf(),
                source,
            }
        })?;
        let file_arg = file.to_string_lossy().into_owned();
        info!("Getting git diff for {}", file_arg);

        let output = self
            .run_git(&root, &["diff", "HEAD~1", "HEAD", "--", file_arg.as_str()])
            .await?;
        if !output.status.success() {
            return Err(ChangeDetectionError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let diff = String::from_utf8_lossy(&output.stdout);
        if diff.trim().is_empty() {
            info!("No diff found - source file unchanged");
            return Ok(ChangeSet::new());
        }

        let keys = changed_keys_from_diff(&diff);
        debug!("Changed keys: {:?}", keys);
        Ok(keys)
    }
}

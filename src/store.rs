//! Entry store: ordered key/value locale files on disk.
//!
//! Files are JSON objects of string to string, written with two-space
//! indentation and a single trailing newline. Key order is preserved on
//! both load and save.

use crate::error::StoreError;
use indexmap::IndexMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Ordered mapping of translation key to value.
///
/// Used both for the canonical source set and for each locale's set.
pub type EntrySet = IndexMap<String, String>;

/// Load an ordered key/value file.
///
/// Returns `StoreError::NotFound` when the path does not exist so the caller
/// can decide whether absence means "empty".
pub fn load(path: &Path) -> Result<EntrySet, StoreError> {
    load_with_text(path).map(|(_, entries)| entries)
}

/// Load a key/value file together with its raw text.
pub fn load_with_text(path: &Path) -> Result<(String, EntrySet), StoreError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(StoreError::NotFound(path.to_path_buf()));
        }
        Err(e) => {
            return Err(StoreError::Io {
                path: path.to_path_buf(),
                source: e,
            })
        }
    };

    let entries = parse(&content).map_err(|source| StoreError::Malformed {
        path: path.to_path_buf(),
        source,
    })?;
    Ok((content, entries))
}

/// Load a locale file, treating a missing file as an empty set.
pub fn load_or_empty(path: &Path) -> Result<EntrySet, StoreError> {
    match load(path) {
        Err(e) if e.is_not_found() => {
            debug!("{} does not exist yet, starting empty", path.display());
            Ok(EntrySet::new())
        }
        other => other,
    }
}

/// Parse key/value text in document order.
pub fn parse(content: &str) -> Result<EntrySet, serde_json::Error> {
    serde_json::from_str(content)
}

/// Render entries exactly as `save` writes them.
pub fn render(entries: &EntrySet) -> Result<String, serde_json::Error> {
    let mut text = serde_json::to_string_pretty(entries)?;
    text.push('\n');
    Ok(text)
}

/// Write entries in their iteration order.
///
/// Parent directories are created as needed. The content goes to a temporary
/// file in the target directory which is then renamed over `path`, so a crash
/// never leaves a truncated file behind.
pub fn save(path: &Path, entries: &EntrySet) -> Result<(), StoreError> {
    let io_err = |source: std::io::Error| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).map_err(io_err)?;

    let text = render(entries).map_err(|e| io_err(e.into()))?;

    let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(io_err)?;
    tmp.write_all(text.as_bytes()).map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;

    debug!("Saved {} entries to {}", entries.len(), path.display());
    Ok(())
}

//! Index manifest: the list of locales and their display names.
//!
//! The committed form is a list of `{"code", "name"}` records. The older
//! `{"code": "name"}` map form is accepted on read and normalized to records
//! in file order.

use crate::error::ManifestError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One locale entry in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocaleRecord {
    /// Locale code, also the file stem of the locale file (e.g. "fr_FR")
    #[serde(default)]
    pub code: String,

    /// Human-readable language name used in prompts (e.g. "French")
    #[serde(default)]
    pub name: String,
}

impl LocaleRecord {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
        }
    }

    /// Records with a blank code or name cannot be translated.
    pub fn is_complete(&self) -> bool {
        !self.code.trim().is_empty() && !self.name.trim().is_empty()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ManifestForm {
    Records(Vec<LocaleRecord>),
    Map(IndexMap<String, String>),
}

/// Parsed index manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexManifest {
    records: Vec<LocaleRecord>,
}

impl IndexManifest {
    pub fn new(records: Vec<LocaleRecord>) -> Self {
        Self { records }
    }

    /// Load the manifest from disk. A missing file is an error.
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ManifestError::NotFound(path.to_path_buf()));
            }
            Err(e) => {
                return Err(ManifestError::Io {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        };

        Self::parse(&content).map_err(|source| ManifestError::Malformed {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse manifest text in either supported form.
    pub fn parse(content: &str) -> Result<Self, serde_json::Error> {
        let records = match serde_json::from_str::<ManifestForm>(content)? {
            ManifestForm::Records(records) => records,
            ManifestForm::Map(map) => map
                .into_iter()
                .map(|(code, name)| LocaleRecord { code, name })
                .collect(),
        };
        Ok(Self { records })
    }

    pub fn records(&self) -> &[LocaleRecord] {
        &self.records
    }

    pub fn get(&self, code: &str) -> Option<&LocaleRecord> {
        self.records.iter().find(|r| r.code == code)
    }

    pub fn contains(&self, code: &str) -> bool {
        self.get(code).is_some()
    }

    /// All locale codes in manifest order.
    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.code.as_str())
    }
}

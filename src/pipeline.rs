//! Pipeline driver: change detection, translation, merge and persist per locale.
//!
//! Locales are processed one after another. A locale file is written only
//! once all of its batches have finished, so an interrupted run leaves the
//! current locale untouched and earlier locales fully updated.

use crate::changes::{ChangeSet, RevisionSource};
use crate::config::Config;
use crate::manifest::{IndexManifest, LocaleRecord};
use crate::merge::merge;
use crate::provider::TranslationProvider;
use crate::store::{self, EntrySet};
use crate::translator::{BatchTranslator, TranslationStats};
use anyhow::{bail, Context, Result};
use tracing::{debug, info, warn};

/// Per-invocation switches.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Compute results without writing any locale file
    pub dry_run: bool,

    /// Only process this locale code
    pub only_locale: Option<String>,
}

/// What happened to one locale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocaleSummary {
    pub code: String,
    pub keys_translated: usize,
    pub stats: TranslationStats,
    /// Whether the merged file was written
    pub persisted: bool,
}

/// Result of one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Changed keys still present in the source
    pub changed_keys: usize,
    pub locales: Vec<LocaleSummary>,
    /// Locale codes skipped (source, skip-list, incomplete records)
    pub skipped: Vec<String>,
    pub dry_run: bool,
}

impl RunSummary {
    pub fn translated_count(&self) -> usize {
        self.locales.len()
    }
}

pub struct Pipeline<'a, P, R> {
    config: &'a Config,
    provider: &'a P,
    revisions: &'a R,
}

impl<'a, P: TranslationProvider, R: RevisionSource> Pipeline<'a, P, R> {
    pub fn new(config: &'a Config, provider: &'a P, revisions: &'a R) -> Self {
        Self {
            config,
            provider,
            revisions,
        }
    }

    pub async fn run(&self, options: &RunOptions) -> Result<RunSummary> {
        let mut summary = RunSummary {
            dry_run: options.dry_run,
            ..RunSummary::default()
        };

        let source_file = self.config.source_file();
        let (source_text, canonical) = store::load_with_text(&source_file)
            .with_context(|| format!("Failed to load source file {}", source_file.display()))?;

        let changed = self
            .revisions
            .changed_keys(&source_file, &source_text)
            .await
            .context("Failed to detect changed keys")?;
        let pending: ChangeSet = changed
            .into_iter()
            .filter(|k| canonical.contains_key(k))
            .collect();

        if pending.is_empty() {
            info!("No changed keys in {}, nothing to do", source_file.display());
            return Ok(summary);
        }
        summary.changed_keys = pending.len();
        info!("Found {} changed keys", pending.len());

        let manifest = IndexManifest::load(&self.config.index_file)
            .context("Failed to load index manifest")?;
        let records = select_locales(&manifest, options.only_locale.as_deref())?;

        for record in records {
            if !record.is_complete() {
                warn!("Skipping manifest record with blank code or name: {:?}", record);
                summary.skipped.push(record.code.clone());
                continue;
            }
            if self.config.is_skipped(&record.code) {
                debug!("Skipping {}", record.code);
                summary.skipped.push(record.code.clone());
                continue;
            }

            let locale = self
                .process_locale(record, &pending, &canonical, options.dry_run)
                .await?;
            summary.locales.push(locale);
        }

        info!(
            "Done - translated {} locale(s){}",
            summary.translated_count(),
            if options.dry_run { " (dry run)" } else { "" }
        );
        Ok(summary)
    }

    async fn process_locale(
        &self,
        record: &LocaleRecord,
        pending: &ChangeSet,
        canonical: &EntrySet,
        dry_run: bool,
    ) -> Result<LocaleSummary> {
        let target_file = self.config.locale_file(&record.code);
        let existing = store::load_or_empty(&target_file)
            .with_context(|| format!("Failed to load {}", target_file.display()))?;

        info!("Translating {} ({} keys)...", record.name, pending.len());

        let outcome = BatchTranslator::new(self.provider)
            .with_batch_size(self.config.batch_size)
            .with_batch_delay(self.config.batch_delay)
            .with_context(self.config.translation_context.clone())
            .translate(pending, &record.name, canonical, &existing)
            .await;

        let merged = merge(&existing, &outcome.entries, canonical);

        if dry_run {
            info!("Dry run: not writing {}", target_file.display());
        } else {
            store::save(&target_file, &merged)
                .with_context(|| format!("Failed to save {}", target_file.display()))?;
        }

        Ok(LocaleSummary {
            code: record.code.clone(),
            keys_translated: outcome.entries.len(),
            stats: outcome.stats,
            persisted: !dry_run,
        })
    }
}

/// Manifest records to process, narrowed to `only` when given.
fn select_locales<'m>(manifest: &'m IndexManifest, only: Option<&str>) -> Result<Vec<&'m LocaleRecord>> {
    match only {
        None => Ok(manifest.records().iter().collect()),
        Some(code) => {
            let selected: Vec<_> = manifest.records().iter().filter(|r| r.code == code).collect();
            if selected.is_empty() {
                bail!("No language with code {:?} in index manifest", code);
            }
            Ok(selected)
        }
    }
}

//! Keep per-locale translation files in sync with the source locale.
//!
//! Changed source keys are detected from a diff, translated in batches via a
//! chat completion provider, merged back in source order and persisted per
//! locale. A separate validator audits locale files against the source and
//! the index manifest.

pub mod changes;
pub mod config;
pub mod error;
pub mod manifest;
pub mod merge;
pub mod pipeline;
pub mod provider;
pub mod store;
pub mod translator;
pub mod validator;

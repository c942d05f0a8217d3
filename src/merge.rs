//! Merge engine: combines existing and freshly translated entries.
//!
//! The merged set always has exactly the source keys, in source order. Keys
//! with no translation take the source value; keys no longer in the source
//! are dropped.

use crate::store::EntrySet;

/// Overlay `translated` on `existing`, then re-key in `canonical` order.
pub fn merge(existing: &EntrySet, translated: &EntrySet, canonical: &EntrySet) -> EntrySet {
    canonical
        .iter()
        .map(|(key, source)| {
            let value = translated
                .get(key)
                .or_else(|| existing.get(key))
                .unwrap_or(source);
            (key.clone(), value.clone())
        })
        .collect()
}

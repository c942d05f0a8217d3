use crate::changes::ChangeSet;
use crate::error::DecodeError;
use crate::provider::TranslationProvider;
use crate::store::EntrySet;
use indexmap::IndexMap;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default number of keys sent to the provider in one request
pub const DEFAULT_BATCH_CAPACITY: usize = 50;

/// Counters for one locale's translation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TranslationStats {
    /// Batches sent to the provider
    pub batches: usize,

    /// Batches that fell back to source values entirely
    pub failed_batches: usize,

    /// Keys missing from an otherwise valid response, filled from source
    pub repaired_keys: usize,
}

/// Result of translating every pending key for one locale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationOutcome {
    /// Translated (or fallback) value for every pending key, in source order
    pub entries: EntrySet,
    pub stats: TranslationStats,
}

/// Split pending keys into batches of at most `capacity` keys.
///
/// Batches follow the source order. Pending keys that are not in the source
/// set have no source value and are dropped.
pub fn partition(pending: &ChangeSet, canonical: &EntrySet, capacity: usize) -> Vec<EntrySet> {
    let capacity = capacity.max(1);
    let mut batches = Vec::new();
    let mut current = EntrySet::new();

    for (key, value) in canonical.iter().filter(|(k, _)| pending.contains(*k)) {
        current.insert(key.clone(), value.clone());
        if current.len() == capacity {
            batches.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        batches.push(current);
    }

    batches
}

/// Build the prompt for one batch.
///
/// The whole source set and the locale's existing translations are included
/// so the model can keep terminology consistent.
pub fn build_translation_prompt(
    batch: &EntrySet,
    target_language: &str,
    canonical: &EntrySet,
    existing: &EntrySet,
    context: Option<&str>,
) -> String {
    let context = context.unwrap_or("These strings are user interface text for a software application.");

    format!(
        r#"You are a professional translator working on software localization. Translate the following JSON object from English to {lang}.

CONTEXT: {context}

FULL ENGLISH LOCALIZATION (all strings for reference):
{canonical}

EXISTING {lang_upper} LOCALIZATION (for consistency reference):
{existing}

IMPORTANT RULES:
1. Keep all JSON keys EXACTLY the same (do not translate keys)
2. Only translate the VALUES
3. Preserve placeholder tokens, quotes and any special formatting exactly as they appear
4. Maintain the same meaning, tone, punctuation, capitalization, structure and pluralization as the English source
5. Use terminology that is natural for the target language
6. Maintain CONSISTENCY with the existing translations shown above - use the same style, tone and terminology choices
7. For technical terms, check whether existing translations kept them in English and follow the same pattern
8. Return ONLY the translated JSON object containing exactly the keys below, no additional text or explanations
9. Ensure the output is valid JSON
10. Try to keep a similar string length to the English source where natural

STRINGS TO TRANSLATE:
{batch}"#,
        lang = target_language,
        lang_upper = target_language.to_uppercase(),
        context = context,
        canonical = to_pretty_json(canonical),
        existing = to_pretty_json(existing),
        batch = to_pretty_json(batch),
    )
}

fn to_pretty_json(entries: &EntrySet) -> String {
    // A string map always serializes
    serde_json::to_string_pretty(entries).unwrap_or_default()
}

/// Remove an optional markdown code fence around the model's answer.
pub fn strip_markdown_code_block(content: &str) -> &str {
    let content = content.trim();
    if !content.starts_with("```") {
        return content;
    }

    // Drop the opening fence line (``` or ```json)
    let body = match content.find('\n') {
        Some(idx) => &content[idx + 1..],
        None => "",
    };
    let body = body.trim_end();
    let body = body.strip_suffix("```").unwrap_or(body);
    body.trim()
}

/// Decode message content into an ordered string map.
///
/// Two stages only: strip the fence, then parse strictly.
pub fn decode_translation(content: &str) -> Result<EntrySet, DecodeError> {
    let json = strip_markdown_code_block(content);

    let object: IndexMap<String, serde_json::Value> = match serde_json::from_str(json) {
        Ok(object) => object,
        Err(e) => {
            return Err(match serde_json::from_str::<serde_json::Value>(json) {
                Ok(_) => DecodeError::NotAnObject,
                Err(_) => DecodeError::InvalidJson(e),
            })
        }
    };

    object
        .into_iter()
        .map(|(key, value)| match value {
            serde_json::Value::String(s) => Ok((key, s)),
            _ => Err(DecodeError::NonStringValue(key)),
        })
        .collect()
}

/// Restrict a decoded response to the batch's keys, filling gaps from source.
///
/// Returns the repaired batch and how many keys had to be filled.
pub fn repair_response(batch: &EntrySet, mut decoded: EntrySet) -> (EntrySet, usize) {
    let mut missing = 0;
    let repaired = batch
        .iter()
        .map(|(key, source)| match decoded.swap_remove(key) {
            Some(translated) => (key.clone(), translated),
            None => {
                missing += 1;
                (key.clone(), source.clone())
            }
        })
        .collect();

    if !decoded.is_empty() {
        debug!("Discarding {} unrequested keys from response", decoded.len());
    }

    (repaired, missing)
}

/// Log prefix naming the locale and the 1-based batch position.
fn batch_label(target_language: &str, index: usize, total: usize) -> String {
    format!("{} batch {}/{}", target_language, index + 1, total)
}

/// Sends pending keys to a provider in fixed-size batches.
///
/// Every failure is soft: a batch that cannot be translated falls back to its
/// source values so the locale stays complete.
#[derive(Debug)]
pub struct BatchTranslator<'a, P> {
    provider: &'a P,
    batch_size: usize,
    batch_delay: Duration,
    context: Option<String>,
}

impl<'a, P: TranslationProvider> BatchTranslator<'a, P> {
    pub fn new(provider: &'a P) -> Self {
        Self {
            provider,
            batch_size: DEFAULT_BATCH_CAPACITY,
            batch_delay: Duration::ZERO,
            context: None,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_batch_delay(mut self, delay: Duration) -> Self {
        self.batch_delay = delay;
        self
    }

    pub fn with_context(mut self, context: Option<String>) -> Self {
        self.context = context;
        self
    }

    /// Translate `pending` keys for one locale.
    ///
    /// The result holds exactly the pending keys that exist in `canonical`,
    /// in source order.
    pub async fn translate(
        &self,
        pending: &ChangeSet,
        target_language: &str,
        canonical: &EntrySet,
        existing: &EntrySet,
    ) -> TranslationOutcome {
        let batches = partition(pending, canonical, self.batch_size);
        let total = batches.len();
        let mut stats = TranslationStats::default();
        let mut entries = EntrySet::new();

        for (index, batch) in batches.iter().enumerate() {
            debug!(
                "{}: batch {}/{} ({} keys)",
                target_language,
                index + 1,
                total,
                batch.len()
            );

            let label = batch_label(target_language, index, total);
            let translated = self
                .translate_batch(batch, &label, target_language, canonical, existing, &mut stats)
                .await;
            entries.extend(translated);

            if !self.batch_delay.is_zero() && index + 1 < total {
                tokio::time::sleep(self.batch_delay).await;
            }
        }

        if stats.failed_batches > 0 || stats.repaired_keys > 0 {
            warn!(
                "{}: {} of {} batches fell back to source, {} keys filled from source",
                target_language, stats.failed_batches, stats.batches, stats.repaired_keys
            );
        } else if stats.batches > 0 {
            info!("{}: {} batches translated", target_language, stats.batches);
        }

        TranslationOutcome { entries, stats }
    }

    async fn translate_batch(
        &self,
        batch: &EntrySet,
        label: &str,
        target_language: &str,
        canonical: &EntrySet,
        existing: &EntrySet,
        stats: &mut TranslationStats,
    ) -> EntrySet {
        stats.batches += 1;

        let prompt = build_translation_prompt(
            batch,
            target_language,
            canonical,
            existing,
            self.context.as_deref(),
        );

        let content = match self.provider.complete(&prompt).await {
            Ok(content) => content,
            Err(e) => {
                warn!(
                    "{}: provider call failed ({}), using source values for {} keys",
                    label,
                    e,
                    batch.len()
                );
                stats.failed_batches += 1;
                return batch.clone();
            }
        };

        match decode_translation(&content) {
            Ok(decoded) => {
                let (repaired, missing) = repair_response(batch, decoded);
                if missing > 0 {
                    warn!(
                        "{}: response missing {} of {} keys, filled from source",
                        label,
                        missing,
                        batch.len()
                    );
                }
                stats.repaired_keys += missing;
                repaired
            }
            Err(e) => {
                warn!(
                    "{}: could not decode response ({}), using source values for {} keys",
                    label,
                    e,
                    batch.len()
                );
                stats.failed_batches += 1;
                batch.clone()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use proptest::prelude::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    // ==================== Helper Functions ====================

    fn entries(pairs: &[(&str, &str)]) -> EntrySet {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn keys(list: &[&str]) -> ChangeSet {
        list.iter().map(|k| k.to_string()).collect()
    }

    /// Provider that replays scripted answers and records prompts
    struct ScriptedProvider {
        answers: Mutex<VecDeque<Result<String, ProviderError>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedProvider {
        fn new(answers: Vec<Result<String, ProviderError>>) -> Self {
            Self {
                answers: Mutex::new(answers.into()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    impl TranslationProvider for ScriptedProvider {
        async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.answers
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(ProviderError::NoContent))
        }
    }

    // ==================== partition Tests ====================

    #[test]
    fn test_partition_follows_source_order() {
        let canonical = entries(&[("a", "A"), ("b", "B"), ("c", "C"), ("d", "D")]);
        let batches = partition(&keys(&["d", "b", "a"]), &canonical, 2);

        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0], entries(&[("a", "A"), ("b", "B")]));
        assert_eq!(batches[1], entries(&[("d", "D")]));
    }

    #[test]
    fn test_partition_drops_unknown_keys() {
        let canonical = entries(&[("a", "A")]);
        let batches = partition(&keys(&["a", "gone"]), &canonical, 50);

        assert_eq!(batches, vec![entries(&[("a", "A")])]);
    }

    #[test]
    fn test_partition_empty_pending() {
        let canonical = entries(&[("a", "A")]);
        assert!(partition(&ChangeSet::new(), &canonical, 50).is_empty());
    }

    #[test]
    fn test_partition_exact_multiple() {
        let canonical: EntrySet = (0..100).map(|i| (format!("k{}", i), format!("v{}", i))).collect();
        let pending: ChangeSet = canonical.keys().cloned().collect();

        let batches = partition(&pending, &canonical, 50);
        assert_eq!(batches.len(), 2);
        assert!(batches.iter().all(|b| b.len() == 50));
    }

    proptest! {
        #[test]
        fn prop_partition_counts_and_covers(n in 0usize..200, capacity in 1usize..60) {
            let canonical: EntrySet = (0..n).map(|i| (format!("key_{}", i), format!("v{}", i))).collect();
            let pending: ChangeSet = canonical.keys().cloned().collect();

            let batches = partition(&pending, &canonical, capacity);
            prop_assert_eq!(batches.len(), n.div_ceil(capacity));
            prop_assert!(batches.iter().all(|b| b.len() <= capacity));

            let mut seen = ChangeSet::new();
            let mut total = 0;
            for batch in &batches {
                for key in batch.keys() {
                    seen.insert(key.clone());
                    total += 1;
                }
            }
            prop_assert_eq!(total, pending.len());
            prop_assert_eq!(seen, pending);
        }
    }

    // ==================== Prompt Tests ====================

    #[test]
    fn test_prompt_contains_all_sections() {
        let canonical = entries(&[("a", "Hello"), ("b", "World")]);
        let existing = entries(&[("a", "Bonjour")]);
        let batch = entries(&[("b", "World")]);

        let prompt = build_translation_prompt(&batch, "French", &canonical, &existing, None);

        assert!(prompt.contains("from English to French"));
        assert!(prompt.contains("EXISTING FRENCH LOCALIZATION"));
        assert!(prompt.contains("\"Bonjour\""));
        assert!(prompt.contains("Keep all JSON keys EXACTLY the same"));
        assert!(prompt.contains("Preserve placeholder tokens"));
        assert!(prompt.ends_with("STRINGS TO TRANSLATE:\n{\n  \"b\": \"World\"\n}"));
    }

    #[test]
    fn test_prompt_uses_custom_context() {
        let batch = entries(&[("a", "Play")]);
        let prompt = build_translation_prompt(
            &batch,
            "German",
            &batch,
            &EntrySet::new(),
            Some("UI text for a music player."),
        );

        assert!(prompt.contains("CONTEXT: UI text for a music player."));
        assert!(prompt.contains("EXISTING GERMAN LOCALIZATION (for consistency reference):\n{}"));
    }

    // ==================== Decode Tests ====================

    #[test]
    fn test_strip_markdown_code_block() {
        assert_eq!(strip_markdown_code_block("```json\n{\"a\": \"b\"}\n```"), "{\"a\": \"b\"}");
        assert_eq!(strip_markdown_code_block("```\n{}\n```\n"), "{}");
        assert_eq!(strip_markdown_code_block("  {\"a\": \"b\"}  "), "{\"a\": \"b\"}");
        assert_eq!(strip_markdown_code_block("```json\n{}"), "{}");
        assert_eq!(strip_markdown_code_block("```"), "");
    }

    #[test]
    fn test_decode_translation_preserves_order() {
        let decoded = decode_translation("{\"z\": \"1\", \"a\": \"2\"}").unwrap();
        let order: Vec<&str> = decoded.keys().map(String::as_str).collect();
        assert_eq!(order, vec!["z", "a"]);
    }

    #[test]
    fn test_decode_translation_fenced() {
        let decoded = decode_translation("```json\n{\"b\": \"Monde\"}\n```").unwrap();
        assert_eq!(decoded, entries(&[("b", "Monde")]));
    }

    #[test]
    fn test_decode_translation_invalid_json() {
        assert!(matches!(
            decode_translation("Sure! Here is the translation: {"),
            Err(DecodeError::InvalidJson(_))
        ));
    }

    #[test]
    fn test_decode_translation_not_an_object() {
        assert!(matches!(
            decode_translation("[\"Monde\"]"),
            Err(DecodeError::NotAnObject)
        ));
        assert!(matches!(decode_translation("\"Monde\""), Err(DecodeError::NotAnObject)));
    }

    #[test]
    fn test_decode_translation_non_string_value() {
        match decode_translation("{\"a\": \"ok\", \"b\": 3}") {
            Err(DecodeError::NonStringValue(key)) => assert_eq!(key, "b"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    // ==================== batch_label Tests ====================

    #[test]
    fn test_batch_label_names_locale_and_position() {
        assert_eq!(batch_label("French", 0, 3), "French batch 1/3");
        assert_eq!(batch_label("French", 2, 3), "French batch 3/3");
    }

    // ==================== repair_response Tests ====================

    #[test]
    fn test_repair_response_fills_missing_and_drops_extra() {
        let batch = entries(&[("a", "Hello"), ("b", "World")]);
        let decoded = entries(&[("extra", "X"), ("b", "Monde")]);

        let (repaired, missing) = repair_response(&batch, decoded);
        assert_eq!(repaired, entries(&[("a", "Hello"), ("b", "Monde")]));
        assert_eq!(missing, 1);
    }

    // ==================== BatchTranslator Tests ====================

    #[tokio::test]
    async fn test_translate_success() {
        let provider = ScriptedProvider::new(vec![Ok("{\"b\": \"Monde\"}".to_string())]);
        let canonical = entries(&[("a", "Hello"), ("b", "World")]);
        let existing = entries(&[("a", "Bonjour")]);

        let outcome = BatchTranslator::new(&provider)
            .translate(&keys(&["b"]), "French", &canonical, &existing)
            .await;

        assert_eq!(outcome.entries, entries(&[("b", "Monde")]));
        assert_eq!(
            outcome.stats,
            TranslationStats {
                batches: 1,
                failed_batches: 0,
                repaired_keys: 0
            }
        );
    }

    #[tokio::test]
    async fn test_translate_provider_failure_falls_back_to_source() {
        let provider = ScriptedProvider::new(vec![Err(ProviderError::Timeout)]);
        let canonical = entries(&[("a", "Hello"), ("b", "World")]);

        let outcome = BatchTranslator::new(&provider)
            .translate(&keys(&["a", "b"]), "French", &canonical, &EntrySet::new())
            .await;

        assert_eq!(outcome.entries, canonical);
        assert_eq!(outcome.stats.failed_batches, 1);
    }

    #[tokio::test]
    async fn test_translate_malformed_content_falls_back() {
        let provider = ScriptedProvider::new(vec![Ok("I cannot do that.".to_string())]);
        let canonical = entries(&[("a", "Hello")]);

        let outcome = BatchTranslator::new(&provider)
            .translate(&keys(&["a"]), "French", &canonical, &EntrySet::new())
            .await;

        assert_eq!(outcome.entries, canonical);
        assert_eq!(outcome.stats.failed_batches, 1);
    }

    #[tokio::test]
    async fn test_translate_partial_response_is_repaired() {
        let provider = ScriptedProvider::new(vec![Ok("{\"a\": \"Bonjour\"}".to_string())]);
        let canonical = entries(&[("a", "Hello"), ("b", "World")]);

        let outcome = BatchTranslator::new(&provider)
            .translate(&keys(&["a", "b"]), "French", &canonical, &EntrySet::new())
            .await;

        assert_eq!(outcome.entries, entries(&[("a", "Bonjour"), ("b", "World")]));
        assert_eq!(outcome.stats.repaired_keys, 1);
        assert_eq!(outcome.stats.failed_batches, 0);
    }

    #[tokio::test]
    async fn test_translate_one_failed_batch_does_not_affect_others() {
        let provider = ScriptedProvider::new(vec![
            Ok("{\"a\": \"Un\", \"b\": \"Deux\"}".to_string()),
            Err(ProviderError::EmptyBody),
            Ok("```json\n{\"e\": \"Cinq\"}\n```".to_string()),
        ]);
        let canonical = entries(&[("a", "One"), ("b", "Two"), ("c", "Three"), ("d", "Four"), ("e", "Five")]);
        let pending: ChangeSet = canonical.keys().cloned().collect();

        let outcome = BatchTranslator::new(&provider)
            .with_batch_size(2)
            .with_batch_delay(Duration::from_millis(1))
            .translate(&pending, "French", &canonical, &EntrySet::new())
            .await;

        assert_eq!(
            outcome.entries,
            entries(&[("a", "Un"), ("b", "Deux"), ("c", "Three"), ("d", "Four"), ("e", "Cinq")])
        );
        assert_eq!(outcome.stats.batches, 3);
        assert_eq!(outcome.stats.failed_batches, 1);
        assert_eq!(provider.prompts().len(), 3);
    }

    #[tokio::test]
    async fn test_translate_no_pending_keys_makes_no_calls() {
        let provider = ScriptedProvider::new(vec![]);
        let canonical = entries(&[("a", "Hello")]);

        let outcome = BatchTranslator::new(&provider)
            .translate(&ChangeSet::new(), "French", &canonical, &EntrySet::new())
            .await;

        assert!(outcome.entries.is_empty());
        assert!(provider.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_translate_prompt_carries_context_and_existing() {
        let provider = ScriptedProvider::new(vec![Ok("{}".to_string())]);
        let canonical = entries(&[("a", "Hello")]);
        let existing = entries(&[("a", "Hallo")]);

        BatchTranslator::new(&provider)
            .with_context(Some("Music player UI.".to_string()))
            .translate(&keys(&["a"]), "German", &canonical, &existing)
            .await;

        let prompts = provider.prompts();
        assert!(prompts[0].contains("Music player UI."));
        assert!(prompts[0].contains("\"Hallo\""));
    }
}

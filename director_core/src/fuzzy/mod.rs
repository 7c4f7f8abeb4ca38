//! Fuzzy natural-language condition evaluation.
//!
//! Answers questions like "has the player discovered the leak?" by asking
//! the external model for a strict YES/NO, with two layers that keep cost
//! bounded:
//!
//! - a **cache** keyed by a SHA-256 of (input text, query text), bounded in
//!   size with oldest-insertion-first eviction;
//! - a **latch table**: once a latched query evaluates true for a session,
//!   it stays true for the life of that session and short-circuits all
//!   further evaluation.
//!
//! Any failure from the model is logged and treated as `false`; it never
//! propagates. The error-fallback `false` is cached like a genuine
//! negative, trading correctness-on-retry for cost control.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::llm::LanguageModel;

/// Default bound on cached query results.
pub const DEFAULT_CACHE_CAPACITY: usize = 512;

/// Default number of trailing input characters included in a prompt.
pub const DEFAULT_MAX_INPUT_CHARS: usize = 2000;

/// Collision-resistant key for a (input, query) or (query, session) pair.
fn pair_hash(a: &str, b: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(a.as_bytes());
    hasher.update([0x1f]);
    hasher.update(b.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Bounded boolean cache with oldest-insertion-first eviction.
///
/// Reads do not touch the eviction order; re-inserting an existing key
/// updates the value in place without refreshing its age.
#[derive(Debug, Default)]
pub struct BoundedCache {
    entries: HashMap<String, bool>,
    order: VecDeque<String>,
    capacity: usize,
}

impl BoundedCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn get(&self, key: &str) -> Option<bool> {
        self.entries.get(key).copied()
    }

    pub fn insert(&mut self, key: String, value: bool) {
        if self.entries.insert(key.clone(), value).is_some() {
            return;
        }
        self.order.push_back(key);
        while self.entries.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A cache handle that can be shared across evaluators (and therefore
/// sessions) by cloning. Sharing is opt-in; each evaluator otherwise owns
/// a private handle.
pub type SharedQueryCache = Arc<Mutex<BoundedCache>>;

/// Create a fresh shareable cache.
pub fn shared_cache(capacity: usize) -> SharedQueryCache {
    Arc::new(Mutex::new(BoundedCache::new(capacity)))
}

/// Latched query results, keyed by session id and query hash explicitly.
///
/// Storing the session id alongside the hash (rather than hashing them
/// together) keeps `clear_session` exact.
#[derive(Debug, Default)]
pub struct LatchTable {
    latched: HashMap<String, HashSet<String>>,
}

impl LatchTable {
    pub fn is_latched(&self, session_id: &str, query_hash: &str) -> bool {
        self.latched
            .get(session_id)
            .is_some_and(|set| set.contains(query_hash))
    }

    pub fn set(&mut self, session_id: &str, query_hash: String) {
        self.latched
            .entry(session_id.to_string())
            .or_default()
            .insert(query_hash);
    }

    /// Remove every latch belonging to a session, returning how many were
    /// cleared.
    pub fn clear_session(&mut self, session_id: &str) -> usize {
        self.latched
            .remove(session_id)
            .map(|set| set.len())
            .unwrap_or(0)
    }
}

/// Options for one fuzzy evaluation.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions<'a> {
    /// Once true, stay true for this session.
    pub latch: bool,
    /// Extra scene context included in the prompt.
    pub context: &'a str,
    /// Session the latch belongs to.
    pub session_id: &'a str,
}

/// Cached and latched YES/NO evaluation backed by the external model.
pub struct FuzzyQueryEvaluator {
    model: Arc<dyn LanguageModel>,
    cache: SharedQueryCache,
    latches: LatchTable,
    max_input_chars: usize,
}

impl FuzzyQueryEvaluator {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self::with_cache(model, shared_cache(DEFAULT_CACHE_CAPACITY))
    }

    /// Build an evaluator over an existing (possibly shared) cache.
    pub fn with_cache(model: Arc<dyn LanguageModel>, cache: SharedQueryCache) -> Self {
        Self {
            model,
            cache,
            latches: LatchTable::default(),
            max_input_chars: DEFAULT_MAX_INPUT_CHARS,
        }
    }

    /// Handle to this evaluator's cache, for opt-in sharing.
    pub fn cache_handle(&self) -> SharedQueryCache {
        Arc::clone(&self.cache)
    }

    /// Forget all latches for a session (used on session end).
    pub fn clear_session(&mut self, session_id: &str) -> usize {
        self.latches.clear_session(session_id)
    }

    /// Evaluate a natural-language query against input text.
    ///
    /// Checks the latch first (when `latch` is set), then the cache, and
    /// only then consults the model with a bounded prompt. The result is
    /// cached unconditionally, and latched when `latch` is set and the
    /// answer was true.
    pub async fn evaluate(
        &mut self,
        input_text: &str,
        query_text: &str,
        options: QueryOptions<'_>,
    ) -> bool {
        let latch_key = pair_hash(query_text, options.session_id);
        if options.latch && self.latches.is_latched(options.session_id, &latch_key) {
            return true;
        }

        let cache_key = pair_hash(input_text, query_text);
        if let Ok(cache) = self.cache.lock() {
            if let Some(hit) = cache.get(&cache_key) {
                debug!(query = query_text, result = hit, "fuzzy query cache hit");
                if options.latch && hit {
                    self.latches.set(options.session_id, latch_key);
                }
                return hit;
            }
        }

        let prompt = self.build_prompt(input_text, query_text, options.context);
        let result = match self.model.complete(&prompt).await {
            Ok(response) => is_yes(&response),
            Err(err) => {
                warn!(query = query_text, error = %err, "fuzzy query model call failed; answering false");
                false
            }
        };

        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(cache_key, result);
        }
        if options.latch && result {
            self.latches.set(options.session_id, latch_key);
        }
        result
    }

    fn build_prompt(&self, input_text: &str, query_text: &str, context: &str) -> String {
        let tail = trailing_chars(input_text, self.max_input_chars);
        let mut prompt = String::new();
        if !context.is_empty() {
            prompt.push_str("Scene context:\n");
            prompt.push_str(context);
            prompt.push_str("\n\n");
        }
        prompt.push_str("Transcript (most recent last):\n");
        prompt.push_str(tail);
        prompt.push_str("\n\nQuestion: ");
        prompt.push_str(query_text);
        prompt.push_str("\nAnswer strictly YES or NO.");
        prompt
    }
}

/// Last `max` characters of `text`, on a char boundary.
fn trailing_chars(text: &str, max: usize) -> &str {
    match text.char_indices().rev().nth(max.saturating_sub(1)) {
        Some((idx, _)) => &text[idx..],
        None => text,
    }
}

/// Case-insensitive "YES" prefix match; anything else, including empty or
/// malformed output, is `false`.
fn is_yes(response: &str) -> bool {
    response
        .trim_start()
        .to_ascii_uppercase()
        .starts_with("YES")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Model double that replays scripted responses and counts calls.
    struct ScriptedModel {
        responses: Mutex<VecDeque<Result<String, LlmError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedModel {
        fn new(responses: impl IntoIterator<Item = Result<String, LlmError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into_iter().collect()),
                calls: AtomicUsize::new(0),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        async fn complete(&self, _prompt: &str) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(LlmError::EmptyResponse))
        }
    }

    #[tokio::test]
    async fn test_second_call_hits_cache() {
        let model = ScriptedModel::new([Ok("YES".to_string())]);
        let mut evaluator = FuzzyQueryEvaluator::new(model.clone() as Arc<dyn LanguageModel>);

        let first = evaluator
            .evaluate("the hatch is open", "did the player open the hatch?", QueryOptions::default())
            .await;
        let second = evaluator
            .evaluate("the hatch is open", "did the player open the hatch?", QueryOptions::default())
            .await;

        assert!(first);
        assert_eq!(second, first);
        assert_eq!(model.call_count(), 1);
    }

    #[tokio::test]
    async fn test_latch_survives_different_input() {
        let model = ScriptedModel::new([Ok("yes, clearly".to_string()), Ok("NO".to_string())]);
        let mut evaluator = FuzzyQueryEvaluator::new(model.clone() as Arc<dyn LanguageModel>);
        let options = QueryOptions {
            latch: true,
            context: "",
            session_id: "session-1",
        };

        assert!(
            evaluator
                .evaluate("she said it aloud", "was the secret revealed?", options.clone())
                .await
        );

        // Different input that would answer NO: the latch short-circuits
        // before the model or the cache is consulted.
        assert!(
            evaluator
                .evaluate("unrelated chatter", "was the secret revealed?", options)
                .await
        );
        assert_eq!(model.call_count(), 1);
    }

    #[tokio::test]
    async fn test_latch_is_session_scoped() {
        let model = ScriptedModel::new([Ok("YES".to_string()), Ok("NO".to_string())]);
        let mut evaluator = FuzzyQueryEvaluator::new(model.clone() as Arc<dyn LanguageModel>);

        let one = QueryOptions {
            latch: true,
            context: "",
            session_id: "session-1",
        };
        let two = QueryOptions {
            latch: true,
            context: "",
            session_id: "session-2",
        };

        assert!(evaluator.evaluate("it happened", "done?", one).await);
        // Same query under another session id consults the model again
        // (different cache input here too, so no cache hit).
        assert!(!evaluator.evaluate("nothing yet", "done?", two).await);
        assert_eq!(model.call_count(), 2);
    }

    #[tokio::test]
    async fn test_clear_session_drops_latches_exactly() {
        let model = ScriptedModel::new([Ok("YES".to_string()), Ok("NO".to_string())]);
        let mut evaluator = FuzzyQueryEvaluator::new(model.clone() as Arc<dyn LanguageModel>);
        let options = QueryOptions {
            latch: true,
            context: "",
            session_id: "session-1",
        };

        assert!(evaluator.evaluate("it happened", "done?", options.clone()).await);
        assert_eq!(evaluator.clear_session("session-1"), 1);
        assert_eq!(evaluator.clear_session("session-1"), 0);

        // Latch is gone; a fresh input consults the model again.
        assert!(!evaluator.evaluate("nothing yet", "done?", options).await);
        assert_eq!(model.call_count(), 2);
    }

    #[tokio::test]
    async fn test_model_failure_is_false_and_cached() {
        let model = ScriptedModel::new([Err(LlmError::Transport("socket closed".to_string()))]);
        let mut evaluator = FuzzyQueryEvaluator::new(model.clone() as Arc<dyn LanguageModel>);

        assert!(
            !evaluator
                .evaluate("input", "query", QueryOptions::default())
                .await
        );
        // The fallback false was cached; no retry happens.
        assert!(
            !evaluator
                .evaluate("input", "query", QueryOptions::default())
                .await
        );
        assert_eq!(model.call_count(), 1);
    }

    #[tokio::test]
    async fn test_shared_cache_is_opt_in() {
        let model_a = ScriptedModel::new([Ok("YES".to_string())]);
        let mut a = FuzzyQueryEvaluator::new(model_a.clone() as Arc<dyn LanguageModel>);
        assert!(a.evaluate("input", "query", QueryOptions::default()).await);

        let model_b = ScriptedModel::new([Ok("NO".to_string())]);
        let mut b = FuzzyQueryEvaluator::with_cache(
            model_b.clone() as Arc<dyn LanguageModel>,
            a.cache_handle(),
        );
        // b sees a's cached answer without calling its own model.
        assert!(b.evaluate("input", "query", QueryOptions::default()).await);
        assert_eq!(model_b.call_count(), 0);
    }

    #[test]
    fn test_yes_parsing() {
        assert!(is_yes("YES"));
        assert!(is_yes("yes."));
        assert!(is_yes("  Yes, absolutely"));
        assert!(!is_yes("NO"));
        assert!(!is_yes("maybe yes"));
        assert!(!is_yes(""));
    }

    #[test]
    fn test_cache_evicts_oldest_insertion_first() {
        let mut cache = BoundedCache::new(2);
        cache.insert("a".to_string(), true);
        cache.insert("b".to_string(), false);

        // A read must not refresh "a".
        assert_eq!(cache.get("a"), Some(true));

        cache.insert("c".to_string(), true);
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), Some(false));
        assert_eq!(cache.get("c"), Some(true));
    }

    #[test]
    fn test_cache_reinsert_keeps_original_age() {
        let mut cache = BoundedCache::new(2);
        cache.insert("a".to_string(), true);
        cache.insert("b".to_string(), true);
        cache.insert("a".to_string(), false);

        cache.insert("c".to_string(), true);
        // "a" was oldest by insertion despite the later update.
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), Some(true));
    }

    #[test]
    fn test_trailing_chars_respects_boundaries() {
        assert_eq!(trailing_chars("abcdef", 3), "def");
        assert_eq!(trailing_chars("ab", 10), "ab");
        assert_eq!(trailing_chars("héllo", 4), "éllo");
    }
}

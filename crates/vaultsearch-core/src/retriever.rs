//! Engine entry points: the write path, the read path, and question answering.
//!
//! A [`Retriever`] owns no chunks. Every call takes the store explicitly, so
//! the caller decides its lifecycle (construct at startup, drop at
//! shutdown) and may share one store between an indexer and a server.
//!
//! ```text
//! index_document:  text → chunk → embed (per chunk, concurrent) → replace_document
//! search:          query → embed → similarity search → rerank
//! answer:          question → search → prompt → CompletionProvider
//! ```
//!
//! Re-indexing a document embeds every new chunk first and then swaps them
//! in with a single [`ChunkStore::replace_document`] call; a concurrent
//! search sees either the old chunks or the new ones, never neither.

use anyhow::{bail, Context, Result};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::debug;

use crate::chunk::{build_chunks, ChunkingParams};
use crate::embedding::CompletionProvider;
use crate::gateway::EmbeddingGateway;
use crate::models::{Chunk, DocumentInput, SearchResult};
use crate::search::{search, ScoringWeights};
use crate::store::ChunkStore;

/// Default number of embedding calls in flight per document.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Outcome of indexing a single document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexReport {
    /// Chunks now stored for the document.
    pub chunks: usize,
    /// Chunks whose vector came from the deterministic fallback.
    pub fallbacks: usize,
    /// Chunks of the previous version that were replaced.
    pub replaced: usize,
}

/// A generated answer and the chunks it was grounded on.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<SearchResult>,
}

#[derive(Clone)]
pub struct Retriever {
    gateway: EmbeddingGateway,
    chunking: ChunkingParams,
    weights: ScoringWeights,
    concurrency: usize,
}

impl Retriever {
    pub fn new(gateway: EmbeddingGateway) -> Self {
        Self {
            gateway,
            chunking: ChunkingParams::default(),
            weights: ScoringWeights::default(),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    pub fn with_chunking(mut self, chunking: ChunkingParams) -> Self {
        self.chunking = chunking;
        self
    }

    pub fn with_weights(mut self, weights: ScoringWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Embedding calls allowed in flight per document; clamped to at least 1.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn gateway(&self) -> &EmbeddingGateway {
        &self.gateway
    }

    pub fn model_name(&self) -> &str {
        self.gateway.model_name()
    }

    /// Chunk, embed and store `doc`, replacing any earlier version of it.
    ///
    /// A failing embedding call for one chunk falls back for that chunk only
    /// and never aborts its siblings. Fails when the store already holds
    /// vectors of a different dimension than the active model produces; the
    /// caller must clear the store and re-index everything instead.
    pub async fn index_document<S: ChunkStore + ?Sized>(
        &self,
        store: &S,
        doc: &DocumentInput,
    ) -> Result<IndexReport> {
        self.check_dimensions(store)?;

        let chunks = build_chunks(doc, &self.chunking);
        let gateway = &self.gateway;
        let embedded: Vec<(Chunk, bool)> = stream::iter(chunks)
            .map(|mut chunk| async move {
                let result = gateway.embed_detailed(&chunk.text).await;
                chunk.embedding = Some(result.vector);
                (chunk, result.fallback.is_some())
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let fallbacks = embedded.iter().filter(|(_, fell_back)| *fell_back).count();
        let chunks: Vec<Chunk> = embedded.into_iter().map(|(c, _)| c).collect();
        let count = chunks.len();

        // Re-checked after the awaits: another writer may have filled an
        // empty store in the meantime.
        self.check_dimensions(store)?;
        let replaced = store.replace_document(&doc.path, chunks)?;

        debug!(
            path = doc.path.as_str(),
            chunks = count,
            fallbacks,
            replaced,
            "indexed document"
        );
        Ok(IndexReport {
            chunks: count,
            fallbacks,
            replaced,
        })
    }

    /// Drop every chunk of `path`. Returns the number removed.
    pub fn remove_document<S: ChunkStore + ?Sized>(&self, store: &S, path: &str) -> usize {
        store.remove_document(path)
    }

    /// Embed `query` and rank stored chunks against it.
    pub async fn search<S: ChunkStore + ?Sized>(
        &self,
        store: &S,
        query: &str,
        limit: usize,
        use_reranking: bool,
    ) -> Vec<SearchResult> {
        if query.trim().is_empty() || limit == 0 || store.is_empty() {
            return Vec::new();
        }
        let query_vec = self.gateway.embed(query).await;
        search(store, &query_vec, query, limit, use_reranking, &self.weights)
    }

    /// Answer `question` from the top `context_length` chunks.
    ///
    /// An empty question yields an empty answer without calling the
    /// completion provider. A completion failure is returned as an error and
    /// not retried.
    pub async fn answer<S: ChunkStore + ?Sized>(
        &self,
        store: &S,
        completion: &dyn CompletionProvider,
        question: &str,
        context_length: usize,
        llm_model: &str,
        use_reranking: bool,
    ) -> Result<Answer> {
        let question = question.trim();
        if question.is_empty() {
            return Ok(Answer {
                text: String::new(),
                sources: Vec::new(),
            });
        }

        let sources = self
            .search(store, question, context_length, use_reranking)
            .await;
        let prompt = build_prompt(question, &sources);
        let text = completion
            .complete(&prompt, llm_model)
            .await
            .context("answer generation failed")?;

        Ok(Answer {
            text: text.trim().to_string(),
            sources,
        })
    }

    fn check_dimensions<S: ChunkStore + ?Sized>(&self, store: &S) -> Result<()> {
        match store.embedding_dims() {
            Some(stored) if stored != self.gateway.dims() => bail!(
                "store holds {}-dimensional vectors but model '{}' produces {}; a full re-index is required",
                stored,
                self.gateway.model_name(),
                self.gateway.dims()
            ),
            _ => Ok(()),
        }
    }
}

/// Prompt sent to the completion provider: instruction, numbered context
/// blocks, then the question.
pub fn build_prompt(question: &str, context: &[SearchResult]) -> String {
    let mut prompt = String::from(
        "Answer the question using only the notes below. \
         Refer to notes by their number, like [1]. \
         If the notes do not contain the answer, say so.\n\n",
    );

    if context.is_empty() {
        prompt.push_str("No notes matched this question.\n\n");
    }
    for (i, r) in context.iter().enumerate() {
        prompt.push_str(&format!("[{}] {} ({})\n{}\n\n", i + 1, r.title, r.path, r.text));
    }

    prompt.push_str(&format!("Question: {}\nAnswer:", question));
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::EmbeddingProvider;
    use crate::models::chunk_id;
    use crate::store::memory::InMemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    const DIMS: usize = 16;

    /// Hashes each lowercase word into one of `DIMS` buckets.
    struct BagOfWords;

    #[async_trait]
    impl EmbeddingProvider for BagOfWords {
        fn model_name(&self) -> &str {
            "bag-of-words"
        }
        fn dims(&self) -> usize {
            DIMS
        }
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let mut v = vec![0.0; DIMS];
            for word in text.to_lowercase().split_whitespace() {
                let bucket = word
                    .bytes()
                    .fold(7usize, |h, b| h.wrapping_mul(31).wrapping_add(b as usize));
                v[bucket % DIMS] += 1.0;
            }
            Ok(v)
        }
    }

    struct Failing;

    #[async_trait]
    impl EmbeddingProvider for Failing {
        fn model_name(&self) -> &str {
            "failing"
        }
        fn dims(&self) -> usize {
            DIMS
        }
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            bail!("connection refused")
        }
    }

    #[derive(Default)]
    struct Canned {
        prompts: Mutex<Vec<String>>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CompletionProvider for Canned {
        async fn complete(&self, prompt: &str, model_id: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(format!("  answer from {}  ", model_id))
        }
    }

    struct Broken;

    #[async_trait]
    impl CompletionProvider for Broken {
        async fn complete(&self, _prompt: &str, _model_id: &str) -> Result<String> {
            bail!("model not loaded")
        }
    }

    fn retriever(provider: Arc<dyn EmbeddingProvider>) -> Retriever {
        Retriever::new(EmbeddingGateway::new(provider))
    }

    fn doc(path: &str, text: &str) -> DocumentInput {
        DocumentInput::from_path(path, text, 1_700_000_000)
    }

    #[tokio::test]
    async fn test_index_then_search() {
        let r = retriever(Arc::new(BagOfWords));
        let store = InMemoryStore::new();
        r.index_document(&store, &doc("/fox.md", "The quick brown fox"))
            .await
            .unwrap();
        r.index_document(&store, &doc("/other.md", "Completely unrelated content"))
            .await
            .unwrap();

        let results = r.search(&store, "quick brown fox", 1, false).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].path, "/fox.md");
        assert_eq!(results[0].title, "fox");
        assert!(results[0].score >= 1.0);
    }

    #[tokio::test]
    async fn test_reindex_replaces_previous_chunks() {
        let r = retriever(Arc::new(BagOfWords))
            .with_chunking(ChunkingParams {
                max_chunk_size: 20,
                chunk_overlap: 0,
            });
        let store = InMemoryStore::new();

        let first = r
            .index_document(&store, &doc("/a.md", "# One\nalpha\n# Two\nbeta\n# Three\ngamma"))
            .await
            .unwrap();
        assert_eq!(first.chunks, 3);
        assert_eq!(first.replaced, 0);

        let second = r
            .index_document(&store, &doc("/a.md", "just one section"))
            .await
            .unwrap();
        assert_eq!(second.chunks, 1);
        assert_eq!(second.replaced, 3);

        let ids: Vec<String> = store.chunks().into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![chunk_id("/a.md", 0)]);
    }

    #[tokio::test]
    async fn test_failing_provider_still_indexes_every_chunk() {
        let r = retriever(Arc::new(Failing)).with_concurrency(2);
        let store = InMemoryStore::new();
        let report = r
            .index_document(&store, &doc("/a.md", "# A\none\n# B\ntwo\n# C\nthree"))
            .await
            .unwrap();
        assert_eq!(report.chunks, 3);
        assert_eq!(report.fallbacks, 3);
        for c in store.chunks() {
            assert_eq!(c.dims(), Some(DIMS));
        }
    }

    #[tokio::test]
    async fn test_dimension_guard_rejects_mixed_store() {
        let store = InMemoryStore::from_chunks(vec![Chunk {
            id: chunk_id("/old.md", 0),
            document_path: "/old.md".to_string(),
            title: "old".to_string(),
            text: "old".to_string(),
            embedding: Some(vec![1.0, 0.0, 0.0]),
            last_modified: 0,
        }]);
        let r = retriever(Arc::new(BagOfWords));
        let err = r
            .index_document(&store, &doc("/new.md", "new text"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("full re-index"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_document_clears_previous_chunks() {
        let r = retriever(Arc::new(BagOfWords));
        let store = InMemoryStore::new();
        r.index_document(&store, &doc("/a.md", "content")).await.unwrap();
        let report = r.index_document(&store, &doc("/a.md", "   \n ")).await.unwrap();
        assert_eq!(report.chunks, 0);
        assert_eq!(report.replaced, 1);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_remove_and_empty_query() {
        let r = retriever(Arc::new(BagOfWords));
        let store = InMemoryStore::new();
        r.index_document(&store, &doc("/a.md", "content")).await.unwrap();
        assert!(r.search(&store, "   ", 5, true).await.is_empty());
        assert_eq!(r.remove_document(&store, "/a.md"), 1);
        assert_eq!(r.remove_document(&store, "/a.md"), 0);
        assert!(r.search(&store, "content", 5, true).await.is_empty());
    }

    #[tokio::test]
    async fn test_answer_uses_context_and_model() {
        let r = retriever(Arc::new(BagOfWords));
        let store = InMemoryStore::new();
        r.index_document(&store, &doc("/rust.md", "Rust has a borrow checker"))
            .await
            .unwrap();
        r.index_document(&store, &doc("/go.md", "Go has a garbage collector"))
            .await
            .unwrap();

        let canned = Canned::default();
        let answer = r
            .answer(&store, &canned, "borrow checker", 1, "llama3", true)
            .await
            .unwrap();

        assert_eq!(answer.text, "answer from llama3");
        assert_eq!(answer.sources.len(), 1);
        assert_eq!(answer.sources[0].path, "/rust.md");
        let prompts = canned.prompts.lock().unwrap();
        assert!(prompts[0].contains("[1] rust (/rust.md)"));
        assert!(prompts[0].ends_with("Question: borrow checker\nAnswer:"));
    }

    #[tokio::test]
    async fn test_answer_empty_question_skips_provider() {
        let r = retriever(Arc::new(BagOfWords));
        let canned = Canned::default();
        let answer = r
            .answer(&InMemoryStore::new(), &canned, "  ", 3, "llama3", true)
            .await
            .unwrap();
        assert!(answer.text.is_empty());
        assert!(answer.sources.is_empty());
        assert_eq!(canned.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_answer_failure_surfaces() {
        let r = retriever(Arc::new(BagOfWords));
        let err = r
            .answer(&InMemoryStore::new(), &Broken, "anything", 3, "llama3", true)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "answer generation failed");
        assert!(format!("{:#}", err).contains("model not loaded"));
    }

    #[test]
    fn test_prompt_without_context() {
        let prompt = build_prompt("why?", &[]);
        assert!(prompt.contains("No notes matched"));
        assert!(!prompt.contains("[1]"));
    }

    /// [`BagOfWords`] that yields to the scheduler before answering, so
    /// embedding awaits interleave with other tasks.
    struct Yielding;

    #[async_trait]
    impl EmbeddingProvider for Yielding {
        fn model_name(&self) -> &str {
            "bag-of-words"
        }
        fn dims(&self) -> usize {
            DIMS
        }
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            for _ in 0..3 {
                tokio::task::yield_now().await;
            }
            BagOfWords.embed(text).await
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_reindex_never_hides_document_from_concurrent_search() {
        let r = Arc::new(retriever(Arc::new(Yielding)).with_concurrency(2));
        let store = Arc::new(InMemoryStore::new());
        let text = |v: usize| format!("# One\nalpha {v}\n# Two\nbeta {v}\n# Three\ngamma {v}");

        r.index_document(store.as_ref(), &doc("/other.md", "unrelated"))
            .await
            .unwrap();
        r.index_document(store.as_ref(), &doc("/a.md", &text(0)))
            .await
            .unwrap();

        let writer = {
            let (r, store) = (r.clone(), store.clone());
            tokio::spawn(async move {
                for v in 1..=100 {
                    r.index_document(store.as_ref(), &doc("/a.md", &text(v)))
                        .await
                        .unwrap();
                }
            })
        };

        loop {
            let results = r.search(store.as_ref(), "alpha beta gamma", 10, true).await;
            let hits = results.iter().filter(|res| res.path == "/a.md").count();
            assert_eq!(hits, 3, "document had {} chunks mid-reindex", hits);
            if writer.is_finished() {
                break;
            }
            tokio::task::yield_now().await;
        }
        writer.await.unwrap();

        assert_eq!(store.len(), 4);
        assert!(store
            .chunks()
            .iter()
            .any(|c| c.document_path == "/a.md" && c.text.ends_with("100")));
    }
}

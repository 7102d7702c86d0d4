//! Chat session: document set, index, and message history for one user.
//!
//! A [`ChatSession`] owns everything a conversation needs. Sessions share
//! nothing with each other; two users never see each other's documents or
//! IDF statistics.
//!
//! # Ask flow
//!
//! 1. Append the user [`Message`].
//! 2. Retrieve context for the query from the live corpus.
//! 3. Build a prompt: personality preamble, context, last
//!    `history_window` turns, question.
//! 4. Call the [`Generator`] with the configured timeout.
//! 5. Append the assistant reply, or an apology carrying the
//!    [`GenerationError`] if generation failed.
//!
//! `ask` never fails: history grows by exactly two messages per call.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::chunk::ChunkParams;
use crate::corpus::Corpus;
use crate::error::{ConfigError, GenerationError, IngestionError};
use crate::generation::Generator;
use crate::index::{IndexParams, SearchHit};
use crate::ingest::{build_document, ingest_bytes, TextExtractor};
use crate::mindmap::{mind_map_title, parse_mind_map, MindMap};
use crate::models::{Document, DocumentFormat, DocumentId, Message};
use crate::personality::Personality;
use crate::prompt::{analysis_prompt, chat_prompt, AnalysisKind};
use crate::retrieval::{Retrieval, RetrievalParams, RetrievalPipeline};

/// Per-session tuning, usually derived from application config.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub chunking: ChunkParams,
    pub index: IndexParams,
    pub retrieval: RetrievalParams,
    /// Prior turns included in each prompt.
    pub history_window: usize,
    pub generation_timeout: Duration,
    /// Document text budget for analyses.
    pub analysis_max_chars: usize,
    pub personality: Personality,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            chunking: ChunkParams::default(),
            index: IndexParams::default(),
            retrieval: RetrievalParams::default(),
            history_window: 6,
            generation_timeout: Duration::from_secs(30),
            analysis_max_chars: 8000,
            personality: Personality::General,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub documents: usize,
    pub chunks: usize,
    pub vocabulary: usize,
    pub messages: usize,
}

/// Serializable session state. The index is derived and never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub personality: Personality,
    pub documents: Vec<Document>,
    pub messages: Vec<Message>,
}

pub struct ChatSession {
    settings: SessionSettings,
    corpus: Corpus,
    pipeline: RetrievalPipeline,
    messages: Vec<Message>,
    personality: Personality,
    analyses: HashMap<String, String>,
}

impl ChatSession {
    pub fn new(settings: SessionSettings) -> Result<Self, ConfigError> {
        let pipeline = RetrievalPipeline::new(settings.retrieval.clone())?;
        Ok(Self {
            corpus: Corpus::new(settings.index.clone()),
            pipeline,
            messages: Vec::new(),
            personality: settings.personality,
            analyses: HashMap::new(),
            settings,
        })
    }

    /// Rebuild a session from a snapshot; the index is recomputed.
    pub fn restore(settings: SessionSettings, snapshot: SessionSnapshot) -> Result<Self, ConfigError> {
        let mut session = Self::new(settings)?;
        session.personality = snapshot.personality;
        for rejected in session.corpus.extend(snapshot.documents) {
            warn!(error = %rejected, "skipping document from snapshot");
        }
        session.messages = snapshot.messages;
        info!(
            documents = session.corpus.documents().len(),
            messages = session.messages.len(),
            "restored session"
        );
        Ok(session)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            personality: self.personality,
            documents: self.corpus.documents().to_vec(),
            messages: self.messages.clone(),
        }
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn personality(&self) -> Personality {
        self.personality
    }

    pub fn set_personality(&mut self, personality: Personality) {
        self.personality = personality;
    }

    pub fn documents(&self) -> &[Document] {
        self.corpus.documents()
    }

    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn find_document(&self, filename: &str) -> Option<&Document> {
        self.corpus.find_by_filename(filename)
    }

    /// Add an already-built document; the index is rebuilt immediately.
    pub fn add_document(&mut self, doc: Document) -> Result<DocumentId, IngestionError> {
        self.corpus.add(doc)
    }

    /// Normalize, chunk, and add extracted text.
    pub fn add_text(
        &mut self,
        filename: &str,
        format: DocumentFormat,
        raw_text: &str,
    ) -> Result<DocumentId, IngestionError> {
        if self.corpus.find_by_filename(filename).is_some() {
            return Err(IngestionError::Duplicate(filename.to_string()));
        }
        let doc = build_document(filename, format, raw_text, self.settings.chunking)?;
        self.corpus.add(doc)
    }

    /// Extract, normalize, chunk, and add an uploaded file.
    pub fn add_file(
        &mut self,
        extractor: &dyn TextExtractor,
        filename: &str,
        bytes: &[u8],
    ) -> Result<DocumentId, IngestionError> {
        if self.corpus.find_by_filename(filename).is_some() {
            return Err(IngestionError::Duplicate(filename.to_string()));
        }
        let doc = ingest_bytes(extractor, filename, bytes, self.settings.chunking)?;
        self.corpus.add(doc)
    }

    /// Remove a document; its chunks leave the index immediately.
    pub fn remove_document(&mut self, id: DocumentId) -> Option<Document> {
        self.corpus.remove(id)
    }

    pub fn search(&self, query: &str, top_k: usize) -> Vec<SearchHit> {
        self.corpus.search(query, top_k)
    }

    pub fn retrieve(&self, query: &str) -> Retrieval {
        self.pipeline.retrieve(query, &self.corpus)
    }

    /// Answer `query` from the loaded documents.
    ///
    /// Generation failures become an assistant message whose `error` field
    /// names the failure; the returned message is also the last entry in
    /// [`messages`](Self::messages).
    pub async fn ask(&mut self, query: &str, generator: &dyn Generator) -> Message {
        let prior = self.messages.len();
        self.messages.push(Message::user(query));

        let retrieval = self.retrieve(query);
        let prompt = chat_prompt(
            self.personality,
            &retrieval,
            &self.messages[..prior],
            self.settings.history_window,
            query,
        );

        let reply = match generator
            .generate(&prompt, self.settings.generation_timeout)
            .await
        {
            Ok(text) => {
                info!(
                    generator = generator.name(),
                    citations = retrieval.citations.len(),
                    "answered question"
                );
                Message::assistant(text, retrieval.citations)
            }
            Err(e) => {
                warn!(generator = generator.name(), error = %e, "generation failed");
                Message::failed(e)
            }
        };

        self.messages.push(reply.clone());
        reply
    }

    /// Run a whole-corpus analysis, caching successful results per
    /// document set, kind, and personality.
    pub async fn analyze(
        &mut self,
        kind: AnalysisKind,
        generator: &dyn Generator,
    ) -> Result<String, GenerationError> {
        let key = format!(
            "{}:{}:{}",
            self.documents_fingerprint(),
            kind.key(),
            self.personality.key()
        );
        if let Some(cached) = self.analyses.get(&key) {
            return Ok(cached.clone());
        }

        let prompt = analysis_prompt(
            self.personality,
            kind,
            self.corpus.documents(),
            self.settings.analysis_max_chars,
        );
        let text = generator
            .generate(&prompt, self.settings.generation_timeout)
            .await?;
        self.analyses.insert(key, text.clone());
        Ok(text)
    }

    /// Run the mind-map analysis and recover a tree from the reply.
    pub async fn mind_map(&mut self, generator: &dyn Generator) -> Result<MindMap, GenerationError> {
        let reply = self.analyze(AnalysisKind::MindMap, generator).await?;
        let names: Vec<&str> = self
            .corpus
            .documents()
            .iter()
            .map(|d| d.filename.as_str())
            .collect();
        let (map, source) = parse_mind_map(&reply, &mind_map_title(&names));
        info!(?source, themes = map.themes.len(), "mind map built");
        Ok(map)
    }

    pub fn clear_history(&mut self) {
        self.messages.clear();
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            documents: self.corpus.documents().len(),
            chunks: self.corpus.total_chunks(),
            vocabulary: self.corpus.index().vocabulary_size(),
            messages: self.messages.len(),
        }
    }

    /// Hash of the live document set, in insertion order.
    fn documents_fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for doc in self.corpus.documents() {
            hasher.update(doc.filename.as_bytes());
            hasher.update([0u8]);
            hasher.update(doc.content_hash.as_bytes());
        }
        format!("{:x}", hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::Prompt;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct Echo {
        calls: AtomicUsize,
        last_prompt: Mutex<Option<Prompt>>,
    }

    impl Echo {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                last_prompt: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl Generator for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        async fn generate(&self, prompt: &Prompt, _timeout: Duration) -> Result<String, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_prompt.lock().unwrap() = Some(prompt.clone());
            Ok(format!("answer #{}", self.calls.load(Ordering::SeqCst)))
        }
    }

    struct Failing(GenerationError);

    #[async_trait]
    impl Generator for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        async fn generate(&self, _prompt: &Prompt, _timeout: Duration) -> Result<String, GenerationError> {
            Err(self.0.clone())
        }
    }

    fn session() -> ChatSession {
        ChatSession::new(SessionSettings::default()).unwrap()
    }

    #[tokio::test]
    async fn test_ask_appends_two_messages_with_citations() {
        let mut s = session();
        s.add_text("a.txt", DocumentFormat::Text, "The dog ran home.").unwrap();
        s.add_text("b.txt", DocumentFormat::Text, "Birds fly south.").unwrap();

        let echo = Echo::new();
        let reply = s.ask("Where did the dog go?", &echo).await;
        assert_eq!(s.messages().len(), 2);
        assert_eq!(reply.text, "answer #1");
        assert_eq!(reply.citations.len(), 1);
        assert_eq!(reply.citations[0].filename, "a.txt");

        let prompt = echo.last_prompt.lock().unwrap().clone().unwrap();
        assert!(prompt.user.contains("The dog ran home."));
        assert!(prompt.history.is_empty());
    }

    #[tokio::test]
    async fn test_ask_timeout_becomes_message() {
        let mut s = session();
        s.add_text("a.txt", DocumentFormat::Text, "Content.").unwrap();
        let reply = s.ask("q", &Failing(GenerationError::Timeout(30))).await;
        assert_eq!(s.messages().len(), 2);
        assert_eq!(reply.error, Some(GenerationError::Timeout(30)));
        assert!(!reply.text.is_empty());
    }

    #[tokio::test]
    async fn test_history_window_in_prompt() {
        let mut s = ChatSession::new(SessionSettings {
            history_window: 2,
            ..SessionSettings::default()
        })
        .unwrap();
        let echo = Echo::new();
        s.ask("one", &echo).await;
        s.ask("two", &echo).await;
        s.ask("three", &echo).await;
        let prompt = echo.last_prompt.lock().unwrap().clone().unwrap();
        let texts: Vec<&str> = prompt.history.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["two", "answer #2"]);
    }

    #[tokio::test]
    async fn test_analysis_cached_per_document_set() {
        let mut s = session();
        s.add_text("a.txt", DocumentFormat::Text, "Quarterly revenue grew.").unwrap();
        let echo = Echo::new();
        let first = s.analyze(AnalysisKind::Summary, &echo).await.unwrap();
        let second = s.analyze(AnalysisKind::Summary, &echo).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(echo.calls.load(Ordering::SeqCst), 1);

        s.set_personality(Personality::Business);
        s.analyze(AnalysisKind::Summary, &echo).await.unwrap();
        assert_eq!(echo.calls.load(Ordering::SeqCst), 2);

        s.add_text("b.txt", DocumentFormat::Text, "Costs fell.").unwrap();
        s.analyze(AnalysisKind::Summary, &echo).await.unwrap();
        assert_eq!(echo.calls.load(Ordering::SeqCst), 3);
        assert_eq!(s.messages().len(), 0);
    }

    #[tokio::test]
    async fn test_analysis_failure_not_cached() {
        let mut s = session();
        s.add_text("a.txt", DocumentFormat::Text, "Text.").unwrap();
        let err = s
            .analyze(AnalysisKind::Themes, &Failing(GenerationError::RateLimited("429".into())))
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::RateLimited(_)));
        let echo = Echo::new();
        s.analyze(AnalysisKind::Themes, &echo).await.unwrap();
        assert_eq!(echo.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_mind_map_titled_after_documents() {
        let mut s = session();
        s.add_text("a.txt", DocumentFormat::Text, "Quarterly revenue grew.").unwrap();
        let echo = Echo::new();
        let map = s.mind_map(&echo).await.unwrap();
        assert_eq!(map.title, "Mind Map: a.txt");
        assert_eq!(map.themes[0].summary, "answer #1");

        // Served from the analysis cache.
        s.mind_map(&echo).await.unwrap();
        assert_eq!(echo.calls.load(Ordering::SeqCst), 1);

        let cached = s.mind_map(&Failing(GenerationError::Timeout(3))).await;
        assert!(cached.is_ok());
        s.add_text("b.txt", DocumentFormat::Text, "Costs fell.").unwrap();
        let err = s.mind_map(&Failing(GenerationError::Timeout(3))).await;
        assert!(matches!(err, Err(GenerationError::Timeout(3))));
    }

    #[test]
    fn test_remove_document_drops_results() {
        let mut s = session();
        let a = s.add_text("a.txt", DocumentFormat::Text, "The dog ran home.").unwrap();
        s.add_text("b.txt", DocumentFormat::Text, "Birds fly south.").unwrap();
        assert!(!s.retrieve("dog").is_empty());
        s.remove_document(a).unwrap();
        assert!(s.retrieve("dog").is_empty());
        assert_eq!(s.stats().documents, 1);
    }

    #[test]
    fn test_duplicate_filename() {
        let mut s = session();
        s.add_text("a.txt", DocumentFormat::Text, "One.").unwrap();
        assert_eq!(
            s.add_text("a.txt", DocumentFormat::Text, "Two."),
            Err(IngestionError::Duplicate("a.txt".to_string()))
        );
    }

    #[test]
    fn test_snapshot_restore_rebuilds_index() {
        let mut s = session();
        s.add_text("a.txt", DocumentFormat::Text, "Penguins live in Antarctica.").unwrap();
        s.set_personality(Personality::Student);
        let json = serde_json::to_string(&s.snapshot()).unwrap();

        let snapshot: SessionSnapshot = serde_json::from_str(&json).unwrap();
        let restored = ChatSession::restore(SessionSettings::default(), snapshot).unwrap();
        assert_eq!(restored.personality(), Personality::Student);
        assert_eq!(restored.stats().chunks, s.stats().chunks);
        assert_eq!(restored.retrieve("penguins").citations.len(), 1);
    }

    #[test]
    fn test_sessions_isolated() {
        let mut a = session();
        let b = session();
        a.add_text("a.txt", DocumentFormat::Text, "Only in session a.").unwrap();
        assert!(b.retrieve("session").is_empty());
        assert_eq!(b.stats().chunks, 0);
    }
}

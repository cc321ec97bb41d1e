use chrono::{DateTime, Local};
use thiserror::Error;

use crate::chunker::{self, ChunkingError};
use crate::embedder::TextEncoder;
use crate::vector_store::{QueryResult, VectorStore, VectorStoreError};

const DEFAULT_DISPLAY_LIMIT: usize = 50;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error(transparent)]
    Chunking(#[from] ChunkingError),
    #[error(transparent)]
    Index(#[from] VectorStoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

/// One entry in the conversation transcript. Assistant messages backed by
/// retrieval carry the chunk indices and distances they were grounded on.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Local>,
    pub sources: Option<Vec<usize>>,
    pub distances: Option<Vec<f32>>,
}

/// Per-process conversation state: the transcript plus at most one active
/// retrieval index.
///
/// Processing a new document builds a complete index first and only then
/// swaps it in, so a failed rebuild leaves the previous index untouched and
/// still queryable.
pub struct Session {
    messages: Vec<ChatMessage>,
    store: Option<VectorStore>,
    display_limit: usize,
    show_all: bool,
}

impl Session {
    pub fn new() -> Self {
        Session {
            messages: Vec::new(),
            store: None,
            display_limit: DEFAULT_DISPLAY_LIMIT,
            show_all: false,
        }
    }

    /// Chunks `text` and replaces the active index with one built over it.
    /// Returns the number of chunks indexed.
    pub fn process_text(
        &mut self,
        text: &str,
        width: usize,
        min_len: usize,
        encoder: &dyn TextEncoder,
    ) -> Result<usize, ProcessError> {
        let chunks = chunker::chunk(text, width, min_len)?;
        let store = VectorStore::build(chunks, encoder)?;
        let count = store.len();
        self.store = Some(store);
        Ok(count)
    }

    pub fn search(
        &self,
        question: &str,
        k: usize,
        encoder: &dyn TextEncoder,
    ) -> Option<Result<QueryResult, VectorStoreError>> {
        self.store
            .as_ref()
            .map(|store| store.search(question, k, encoder))
    }

    pub fn store(&self) -> Option<&VectorStore> {
        self.store.as_ref()
    }

    pub fn has_index(&self) -> bool {
        self.store.is_some()
    }

    /// Appends a message, silently dropping empty or whitespace-only content.
    pub fn push(&mut self, role: Role, content: impl Into<String>) {
        self.push_with_sources(role, content, None, None);
    }

    pub fn push_with_sources(
        &mut self,
        role: Role,
        content: impl Into<String>,
        sources: Option<Vec<usize>>,
        distances: Option<Vec<f32>>,
    ) {
        let content = content.into();
        if content.trim().is_empty() {
            return;
        }
        self.messages.push(ChatMessage {
            role,
            content,
            timestamp: Local::now(),
            sources,
            distances,
        });
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    pub fn set_show_all(&mut self, show_all: bool) {
        self.show_all = show_all;
    }

    /// The trailing window of the transcript sized by the display limit,
    /// plus how many older messages were cut off. Showing all disables the
    /// truncation.
    pub fn visible_messages(&self) -> (&[ChatMessage], usize) {
        let total = self.messages.len();
        if self.show_all || total <= self.display_limit {
            (&self.messages, 0)
        } else {
            (
                &self.messages[total - self.display_limit..],
                total - self.display_limit,
            )
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Session::new()
    }
}

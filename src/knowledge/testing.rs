//! 테스트용 가짜 프로바이더

use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

use crate::catalog::AuthorizedProfiles;
use crate::embedding::EmbeddingProvider;
use crate::llm::{ChatMessage, ChatModel};

use super::chunker::Chunk;
use super::vector::{SearchResult, VectorEntry, VectorStore};

/// 제목과 프로필로 청크 생성
pub fn chunk(title: &str, profiles: &[&str]) -> Chunk {
    Chunk {
        id: format!("{}-0", title),
        content: format!("Contenu de {}", title),
        source_filename: format!("{}.txt", title.to_lowercase().replace(' ', "_")),
        title: title.to_string(),
        description: format!("Description de {}", title),
        authorized_profiles: AuthorizedProfiles::new(profiles.iter().copied()),
        page: None,
        chunk_index: 0,
    }
}

/// 결정적 bag-of-words 임베더 (단어 해시 → 차원)
pub struct FakeEmbedder;

pub const FAKE_DIMENSION: usize = 64;

#[async_trait]
impl EmbeddingProvider for FakeEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut v = vec![0.0; FAKE_DIMENSION];
        for word in text.split(|c: char| !c.is_alphanumeric()).filter(|w| w.len() > 2) {
            let word = word.to_lowercase();
            let h = word
                .bytes()
                .fold(0usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize));
            v[h % FAKE_DIMENSION] += 1.0;
        }
        Ok(v)
    }

    fn dimension(&self) -> usize {
        FAKE_DIMENSION
    }

    fn name(&self) -> &str {
        "fake"
    }
}

/// 항상 실패하는 임베더
pub struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        anyhow::bail!("embedding service unreachable")
    }

    fn dimension(&self) -> usize {
        FAKE_DIMENSION
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// 고정 순위 결과를 돌려주고 요청된 limit을 기록하는 저장소
pub struct RecordingStore {
    ranked: Vec<SearchResult>,
    limits: Mutex<Vec<usize>>,
}

impl RecordingStore {
    pub fn new(ranked: Vec<SearchResult>) -> Self {
        Self {
            ranked,
            limits: Mutex::new(Vec::new()),
        }
    }

    pub fn requested_limits(&self) -> Vec<usize> {
        self.limits.lock().unwrap().clone()
    }
}

#[async_trait]
impl VectorStore for RecordingStore {
    async fn replace_all(&self, entries: &[VectorEntry]) -> Result<usize> {
        Ok(entries.len())
    }

    async fn search(&self, _query_embedding: &[f32], limit: usize) -> Result<Vec<SearchResult>> {
        self.limits.lock().unwrap().push(limit);
        Ok(self.ranked.iter().take(limit).cloned().collect())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.ranked.len())
    }

    async fn is_initialized(&self) -> bool {
        true
    }
}

/// 접근할 수 없는 저장소
pub struct FailingStore;

#[async_trait]
impl VectorStore for FailingStore {
    async fn replace_all(&self, _entries: &[VectorEntry]) -> Result<usize> {
        anyhow::bail!("vector store unreachable")
    }

    async fn search(&self, _query_embedding: &[f32], _limit: usize) -> Result<Vec<SearchResult>> {
        anyhow::bail!("vector store unreachable")
    }

    async fn count(&self) -> Result<usize> {
        anyhow::bail!("vector store unreachable")
    }

    async fn is_initialized(&self) -> bool {
        false
    }
}

/// 호출을 기록하는 언어 모델
pub struct RecordingChat {
    reply: Result<String, String>,
    calls: Mutex<Vec<Vec<ChatMessage>>>,
}

impl RecordingChat {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Ok(reply.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<Vec<ChatMessage>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for RecordingChat {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        self.calls.lock().unwrap().push(messages.to_vec());
        self.reply.clone().map_err(|e| anyhow::anyhow!(e))
    }

    fn name(&self) -> &str {
        "recording"
    }
}

//! Vector Store - 벡터 인덱스 트레이트 및 유틸리티
//!
//! 청크와 임베딩을 저장하고 질의 임베딩으로 유사도 검색을 수행합니다.
//! 인덱스는 수집할 때마다 통째로 다시 만들어집니다.

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;

use super::chunker::Chunk;

// ============================================================================
// Types
// ============================================================================

/// 벡터 엔트리 (저장용)
#[derive(Debug, Clone)]
pub struct VectorEntry {
    /// 메타데이터가 붙은 청크
    pub chunk: Chunk,
    /// 임베딩 벡터
    pub embedding: Vec<f32>,
}

/// 검색 결과
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// 청크
    pub chunk: Chunk,
    /// 유사도 스코어 (높을수록 유사)
    pub similarity: f32,
}

// ============================================================================
// VectorStore Trait
// ============================================================================

/// VectorStore 트레이트 (async)
///
/// 벡터 저장소의 공통 인터페이스입니다.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// 기존 컬렉션 내용을 모두 교체
    async fn replace_all(&self, entries: &[VectorEntry]) -> Result<usize>;

    /// 벡터 검색 (유사도 내림차순)
    ///
    /// 컬렉션이 초기화되지 않았으면 에러를 반환합니다.
    async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<SearchResult>>;

    /// 벡터 개수 조회
    async fn count(&self) -> Result<usize>;

    /// 컬렉션 존재 여부
    async fn is_initialized(&self) -> bool;
}

// ============================================================================
// InMemoryVectorStore
// ============================================================================

/// 메모리 벡터 저장소 (코사인 유사도, 전수 비교)
#[derive(Default)]
pub struct InMemoryVectorStore {
    entries: RwLock<Option<Vec<VectorEntry>>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn replace_all(&self, entries: &[VectorEntry]) -> Result<usize> {
        if let Some(dim) = entries.first().map(|e| e.embedding.len()) {
            if entries.iter().any(|e| e.embedding.len() != dim) {
                anyhow::bail!("Inconsistent embedding dimensions");
            }
        }

        *self.entries.write().await = Some(entries.to_vec());
        Ok(entries.len())
    }

    async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<SearchResult>> {
        let guard = self.entries.read().await;
        let entries = guard
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("Collection is not initialized"))?;

        let mut results: Vec<SearchResult> = entries
            .iter()
            .map(|e| SearchResult {
                chunk: e.chunk.clone(),
                similarity: cosine_similarity(query_embedding, &e.embedding),
            })
            .collect();

        sort_by_similarity(&mut results);
        results.truncate(limit);
        Ok(results)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.entries.read().await.as_ref().map_or(0, Vec::len))
    }

    async fn is_initialized(&self) -> bool {
        self.entries.read().await.is_some()
    }
}

// ============================================================================
// Utility Functions
// ============================================================================

/// 유사도 내림차순 정렬 (동점은 기존 순서 유지)
pub fn sort_by_similarity(results: &mut [SearchResult]) {
    results.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

/// 코사인 유사도 계산
///
/// 결과는 -1.0 ~ 1.0 범위입니다. 길이가 다르거나 영벡터면 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

// ============================================================================
// Tests
// ============================================================================

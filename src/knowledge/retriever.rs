//! 프로필 필터링 검색기
//!
//! 벡터 인덱스에서 `k * OVERFETCH_MULTIPLIER`개를 가져온 뒤,
//! 질문자의 프로필이 허용되지 않은 청크를 제거하고 앞에서 `k`개만 남깁니다.

use std::sync::Arc;

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, RagResult};

use super::vector::{SearchResult, VectorStore};

/// 필터링 여유분을 위한 과다 조회 배수
pub const OVERFETCH_MULTIPLIER: usize = 3;

/// 검색 결과 (유사도 내림차순, 허용된 청크만)
pub type RetrievalResult = Vec<SearchResult>;

/// 프로필 필터링 검색기
#[derive(Clone)]
pub struct Retriever {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl Retriever {
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { store, embedder }
    }

    /// 질의에 대해 프로필이 볼 수 있는 상위 `k`개 청크 검색
    ///
    /// 허용된 청크가 `k`개보다 적으면 있는 만큼만 반환합니다.
    /// 인덱스나 임베딩 서비스에 접근할 수 없으면 `RetrievalUnavailable`.
    pub async fn retrieve(&self, query: &str, profile: &str, k: usize) -> RagResult<RetrievalResult> {
        if k == 0 {
            // 결과는 비어 있어도 인덱스 상태는 확인
            if !self.store.is_initialized().await {
                return Err(RagError::RetrievalUnavailable(
                    "vector index is not initialized".to_string(),
                ));
            }
            return Ok(vec![]);
        }

        let query_embedding = self.embedder.embed(query).await.map_err(|e| {
            RagError::RetrievalUnavailable(format!("query embedding failed: {:#}", e))
        })?;

        let fetch = k.saturating_mul(OVERFETCH_MULTIPLIER);
        let candidates = self
            .store
            .search(&query_embedding, fetch)
            .await
            .map_err(|e| RagError::RetrievalUnavailable(format!("{:#}", e)))?;

        let candidate_count = candidates.len();
        let mut retained = filter_by_profile(candidates, profile);
        retained.truncate(k);

        tracing::debug!(
            "Retrieved {} candidates (requested {}), {} retained for profile '{}'",
            candidate_count,
            fetch,
            retained.len(),
            profile
        );

        Ok(retained)
    }

    /// 인덱스 저장소
    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }
}

/// 프로필이 허용된 청크만 남김 (순서 유지)
///
/// 정확한 문자열 비교이며 대소문자 변환이나 기본 프로필 예외가 없습니다.
pub fn filter_by_profile(results: Vec<SearchResult>, profile: &str) -> Vec<SearchResult> {
    results
        .into_iter()
        .filter(|r| r.chunk.authorized_profiles.contains(profile))
        .collect()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::testing::{chunk, FailingStore, FakeEmbedder, RecordingStore};
    use crate::knowledge::vector::InMemoryVectorStore;

    fn scored(title: &str, profiles: &[&str], similarity: f32) -> SearchResult {
        SearchResult {
            chunk: chunk(title, profiles),
            similarity,
        }
    }

    fn titles(results: &[SearchResult]) -> Vec<&str> {
        results.iter().map(|r| r.chunk.title.as_str()).collect()
    }

    fn ranked() -> Vec<SearchResult> {
        vec![
            scored("Architecture technique", &["Technique"], 0.9),
            scored("Politique RH", &["RH", "Manager"], 0.8),
            scored("Charte informatique", &["Technique", "RH", "Manager"], 0.7),
            scored("Entretien annuel", &["rh"], 0.6),
            scored("Note générale", &["General"], 0.5),
        ]
    }

    #[test]
    fn test_filter_preserves_order() {
        let filtered = filter_by_profile(ranked(), "RH");
        assert_eq!(titles(&filtered), vec!["Politique RH", "Charte informatique"]);
    }

    #[test]
    fn test_filter_is_exact_membership() {
        for profile in ["RH", "rh", "Technique", "General", "Manager", "Inconnu"] {
            let filtered = filter_by_profile(ranked(), profile);

            let all = ranked();
            let expected: Vec<&str> = all
                .iter()
                .filter(|r| r.chunk.authorized_profiles.as_slice().iter().any(|p| p == profile))
                .map(|r| r.chunk.title.as_str())
                .collect();
            assert_eq!(titles(&filtered), expected, "profile={}", profile);
        }
    }

    #[test]
    fn test_general_sees_only_general() {
        let filtered = filter_by_profile(ranked(), "General");
        assert_eq!(titles(&filtered), vec!["Note générale"]);
    }

    #[test]
    fn test_filter_is_idempotent() {
        for profile in ["RH", "Technique", "Manager"] {
            let once = filter_by_profile(ranked(), profile);
            let twice = filter_by_profile(once.clone(), profile);
            assert_eq!(titles(&once), titles(&twice));
        }
    }

    #[tokio::test]
    async fn test_overfetch_multiplier() {
        let store = Arc::new(RecordingStore::new(ranked()));
        let retriever = Retriever::new(store.clone(), Arc::new(FakeEmbedder));

        retriever.retrieve("congés", "RH", 6).await.unwrap();
        retriever.retrieve("congés", "Technique", 6).await.unwrap();

        assert_eq!(store.requested_limits(), vec![18, 18]);
    }

    #[tokio::test]
    async fn test_truncates_to_k() {
        let store = Arc::new(RecordingStore::new(ranked()));
        let retriever = Retriever::new(store, Arc::new(FakeEmbedder));

        let results = retriever.retrieve("charte", "Manager", 1).await.unwrap();
        assert_eq!(titles(&results), vec!["Politique RH"]);
    }

    #[tokio::test]
    async fn test_fewer_than_k_is_not_padded() {
        let store = Arc::new(RecordingStore::new(ranked()));
        let retriever = Retriever::new(store, Arc::new(FakeEmbedder));

        let results = retriever.retrieve("charte", "Technique", 6).await.unwrap();
        assert_eq!(titles(&results), vec!["Architecture technique", "Charte informatique"]);

        let none = retriever.retrieve("charte", "Comptabilité", 6).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_store() {
        let retriever = Retriever::new(Arc::new(FailingStore), Arc::new(FakeEmbedder));
        let result = retriever.retrieve("congés", "RH", 6).await;
        assert!(matches!(result, Err(RagError::RetrievalUnavailable(_))));
    }

    #[tokio::test]
    async fn test_zero_k_still_reports_unavailable_store() {
        let retriever = Retriever::new(Arc::new(FailingStore), Arc::new(FakeEmbedder));
        let result = retriever.retrieve("congés", "RH", 0).await;
        assert!(matches!(result, Err(RagError::RetrievalUnavailable(_))));

        let empty = Retriever::new(Arc::new(InMemoryVectorStore::new()), Arc::new(FakeEmbedder));
        let result = empty.retrieve("congés", "RH", 0).await;
        assert!(matches!(result, Err(RagError::RetrievalUnavailable(_))));
    }

    #[tokio::test]
    async fn test_zero_k_on_ready_store_is_empty() {
        let store = Arc::new(RecordingStore::new(ranked()));
        let retriever = Retriever::new(store.clone(), Arc::new(FakeEmbedder));

        let results = retriever.retrieve("congés", "RH", 0).await.unwrap();
        assert!(results.is_empty());
        assert!(store.requested_limits().is_empty());
    }

    #[tokio::test]
    async fn test_huge_k_does_not_overflow() {
        let store = Arc::new(RecordingStore::new(ranked()));
        let retriever = Retriever::new(store.clone(), Arc::new(FakeEmbedder));

        let results = retriever.retrieve("congés", "RH", usize::MAX).await.unwrap();
        assert_eq!(titles(&results), vec!["Politique RH", "Charte informatique"]);
        assert_eq!(store.requested_limits(), vec![usize::MAX]);
    }
}

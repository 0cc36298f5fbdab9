//! Knowledge 모듈 - 프로필 필터링 RAG 파이프라인
//!
//! - Chunker: 구분자 우선순위 기반 텍스트 분할
//! - VectorStore: LanceDB 벡터 인덱스 (테스트용 메모리 구현 포함)
//! - Retriever: 과다 조회 후 프로필 필터링
//! - AnswerGenerator: 컨텍스트 구성 + Mistral 답변 생성
//! - Ingestor: 카탈로그 문서 수집 및 인덱스 재구축

mod answer;
mod chunker;
mod ingest;
mod lance;
mod retriever;
mod vector;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports
pub use answer::{
    format_context, format_sources, refusal_message, AnswerGenerator, AnswerOutcome,
    AnswerRecord, SourceRef, NOT_FOUND_PHRASE, SYSTEM_PROMPT,
};
pub use chunker::{
    chunk_document, default_chunker, Chunk, ChunkConfig, Chunker, RecursiveChunker, TextSpan,
    DEFAULT_SEPARATORS,
};
pub use ingest::{placeholder_text, IngestReport, Ingestor, SkippedDocument};
pub use lance::LanceVectorStore;
pub use retriever::{filter_by_profile, RetrievalResult, Retriever, OVERFETCH_MULTIPLIER};
pub use vector::{
    cosine_similarity, sort_by_similarity, InMemoryVectorStore, SearchResult, VectorEntry,
    VectorStore,
};

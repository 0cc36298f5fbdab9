//! intrabot - 프로필 기반 접근 제어 사내 문서 챗봇
//!
//! 사내 문서를 LanceDB에 인덱싱하고, 질문자의 프로필이 열람할 수 있는
//! 문서만 근거로 Mistral 모델이 답변합니다.

pub mod catalog;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod extractor;
pub mod knowledge;
pub mod llm;
pub mod session;

// Re-exports
pub use catalog::{AuthorizedProfiles, DocumentMetadata, MetadataCatalog};
pub use config::Config;
pub use embedding::{EmbeddingProvider, MistralEmbedding};
pub use error::{RagError, RagResult};
pub use extractor::{DocumentKind, DocumentLoader, ExtractedContent};
pub use knowledge::{
    AnswerGenerator, AnswerOutcome, AnswerRecord, Chunk, ChunkConfig, Chunker, InMemoryVectorStore,
    IngestReport, Ingestor, LanceVectorStore, RecursiveChunker, Retriever, SearchResult, SourceRef,
    VectorEntry, VectorStore,
};
pub use llm::{ChatMessage, ChatModel, GenerationParams, MistralChat};
pub use session::{ChatSession, ChatTurn};

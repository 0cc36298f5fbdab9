//! 수집 파이프라인
//!
//! 카탈로그에 있는 모든 파일을 읽어 청크로 나누고 임베딩한 뒤
//! 벡터 인덱스를 통째로 교체합니다. 문서 단위 실패는 기록 후 건너뜁니다.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use crate::catalog::{DocumentMetadata, MetadataCatalog};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, RagResult};
use crate::extractor::{DocumentKind, DocumentLoader, ExtractedContent};

use super::chunker::{chunk_document, Chunk, Chunker};
use super::vector::{VectorEntry, VectorStore};

/// 건너뛴 문서
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedDocument {
    pub filename: String,
    pub reason: String,
}

/// 수집 결과
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    /// 청크가 하나 이상 나온 문서 수
    pub documents_indexed: usize,
    /// 인덱스에 기록된 청크 수
    pub chunks_indexed: usize,
    /// 생성한 예시 파일
    pub placeholders_created: Vec<String>,
    /// 건너뛴 문서
    pub skipped: Vec<SkippedDocument>,
}

/// 예시 파일 내용
pub fn placeholder_text(metadata: &DocumentMetadata) -> String {
    format!(
        "{}\n\n{}\n\nContenu d'exemple : ceci est un texte de test pour alimenter le pipeline d'indexation.",
        metadata.display_title(),
        metadata.description
    )
}

// ============================================================================
// Ingestor
// ============================================================================

/// 수집기
pub struct Ingestor {
    catalog: MetadataCatalog,
    data_dir: PathBuf,
    loader: DocumentLoader,
    chunker: Arc<dyn Chunker>,
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    synthesize_missing: bool,
}

impl Ingestor {
    pub fn new(
        catalog: MetadataCatalog,
        data_dir: impl Into<PathBuf>,
        chunker: Arc<dyn Chunker>,
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
    ) -> Self {
        Self {
            catalog,
            data_dir: data_dir.into(),
            loader: DocumentLoader::new(),
            chunker,
            embedder,
            store,
            synthesize_missing: false,
        }
    }

    /// 파일이 하나도 없을 때 카탈로그 내용으로 예시 파일 생성
    pub fn with_synthesize_missing(mut self, enabled: bool) -> Self {
        self.synthesize_missing = enabled;
        self
    }

    /// 카탈로그 전체 수집 및 인덱스 교체
    pub async fn ingest_all(&self) -> RagResult<IngestReport> {
        let mut report = IngestReport::default();
        let mut chunks: Vec<Chunk> = Vec::new();
        let mut missing: Vec<&DocumentMetadata> = Vec::new();

        tracing::info!(
            "Ingesting {} catalog entries from {:?}",
            self.catalog.len(),
            self.data_dir
        );

        for metadata in self.catalog.iter() {
            let path = self.data_dir.join(&metadata.filename);
            if !path.exists() {
                tracing::warn!("Missing file: {:?}", path);
                missing.push(metadata);
                continue;
            }
            self.process(metadata, &path, &mut chunks, &mut report).await;
        }

        if chunks.is_empty() && self.synthesize_missing && !missing.is_empty() {
            tracing::info!("No chunks produced, synthesizing {} placeholder files", missing.len());
            let mut still_missing = Vec::new();
            for metadata in missing {
                match self.synthesize(metadata).await {
                    Ok(path) => {
                        report.placeholders_created.push(metadata.filename.clone());
                        self.process(metadata, &path, &mut chunks, &mut report).await;
                    }
                    Err(reason) => still_missing.push((metadata, reason)),
                }
            }
            for (metadata, reason) in still_missing {
                report.skipped.push(SkippedDocument {
                    filename: metadata.filename.clone(),
                    reason,
                });
            }
        } else {
            for metadata in missing {
                report.skipped.push(SkippedDocument {
                    filename: metadata.filename.clone(),
                    reason: "file not found".to_string(),
                });
            }
        }

        if chunks.is_empty() {
            return Err(RagError::IngestionEmpty);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        tracing::info!("Embedding {} chunks with {}", texts.len(), self.embedder.name());

        let embeddings = self
            .embedder
            .embed_batch(&texts)
            .await
            .map_err(|e| RagError::IndexingFailed(format!("embedding failed: {:#}", e)))?;

        if embeddings.len() != chunks.len() {
            return Err(RagError::IndexingFailed(format!(
                "expected {} embeddings, got {}",
                chunks.len(),
                embeddings.len()
            )));
        }

        let entries: Vec<VectorEntry> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| VectorEntry { chunk, embedding })
            .collect();

        report.chunks_indexed = self
            .store
            .replace_all(&entries)
            .await
            .map_err(|e| RagError::IndexingFailed(format!("{:#}", e)))?;

        tracing::info!(
            "Indexed {} chunks from {} documents ({} skipped)",
            report.chunks_indexed,
            report.documents_indexed,
            report.skipped.len()
        );

        Ok(report)
    }

    /// 문서 하나를 읽어 청크 추가 (실패는 report에 기록)
    async fn process(
        &self,
        metadata: &DocumentMetadata,
        path: &Path,
        chunks: &mut Vec<Chunk>,
        report: &mut IngestReport,
    ) {
        let units = match self.loader.load(path).await {
            Ok(units) => units,
            Err(e) => {
                tracing::warn!("{}", e);
                report.skipped.push(SkippedDocument {
                    filename: metadata.filename.clone(),
                    reason: e.to_string(),
                });
                return;
            }
        };

        let document_chunks = chunk_units(self.chunker.as_ref(), metadata, &units);
        let produced = document_chunks.len();
        chunks.extend(document_chunks);

        if produced == 0 {
            tracing::warn!("No text extracted from {:?}", path);
            report.skipped.push(SkippedDocument {
                filename: metadata.filename.clone(),
                reason: "no text extracted".to_string(),
            });
        } else {
            tracing::debug!("{}: {} chunks", metadata.filename, produced);
            report.documents_indexed += 1;
        }
    }

    /// 예시 텍스트 파일 작성 (텍스트 형식만)
    async fn synthesize(&self, metadata: &DocumentMetadata) -> Result<PathBuf, String> {
        let path = self.data_dir.join(&metadata.filename);
        if DocumentKind::from_path(&path) != Some(DocumentKind::Text) {
            return Err("file not found (placeholder only for text files)".to_string());
        }

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| format!("cannot create {:?}: {}", parent, e))?;
        }
        tokio::fs::write(&path, placeholder_text(metadata))
            .await
            .map_err(|e| format!("cannot write placeholder: {}", e))?;

        tracing::info!("Placeholder created: {:?}", path);
        Ok(path)
    }
}

/// 추출 단위(PDF 페이지)별로 청크 생성
///
/// 청크는 단위 경계를 넘지 않고 `page`를 물려받으며,
/// `chunk_index`는 문서 전체에서 이어집니다.
fn chunk_units(
    chunker: &dyn Chunker,
    metadata: &DocumentMetadata,
    units: &[ExtractedContent],
) -> Vec<Chunk> {
    let mut chunks: Vec<Chunk> = Vec::new();
    for unit in units {
        let next_index = chunks.len() as u32;
        chunks.extend(chunk_document(
            chunker,
            &unit.text,
            metadata,
            unit.page,
            next_index,
        ));
    }
    chunks
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::AuthorizedProfiles;
    use crate::knowledge::chunker::{ChunkConfig, RecursiveChunker};
    use crate::knowledge::testing::{FailingEmbedder, FailingStore, FakeEmbedder};
    use crate::knowledge::vector::InMemoryVectorStore;
    use tempfile::TempDir;

    fn metadata(filename: &str, title: &str, profiles: &[&str]) -> DocumentMetadata {
        DocumentMetadata {
            filename: filename.to_string(),
            title: title.to_string(),
            description: format!("Description de {}", title),
            authorized_profiles: AuthorizedProfiles::new(profiles.iter().copied()),
        }
    }

    fn ingestor(
        dir: &TempDir,
        docs: Vec<DocumentMetadata>,
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
    ) -> Ingestor {
        let chunker = Arc::new(RecursiveChunker::new(ChunkConfig::new(100, 10)));
        Ingestor::new(
            MetadataCatalog::from_entries(docs),
            dir.path(),
            chunker,
            embedder,
            store,
        )
    }

    #[tokio::test]
    async fn test_ingest_stamps_metadata_and_replaces_index() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("conges.txt"), "Vingt-cinq jours de congés payés par an.").unwrap();
        std::fs::write(dir.path().join("archi.md"), "# Architecture\n\nMicroservices et files de messages.").unwrap();

        let store = Arc::new(InMemoryVectorStore::new());
        let report = ingestor(
            &dir,
            vec![
                metadata("conges.txt", "Politique RH", &["RH", "Manager"]),
                metadata("archi.md", "Architecture technique", &["Technique"]),
            ],
            Arc::new(FakeEmbedder),
            store.clone(),
        )
        .ingest_all()
        .await
        .unwrap();

        assert_eq!(report.documents_indexed, 2);
        assert_eq!(report.chunks_indexed, 2);
        assert!(report.skipped.is_empty());

        let results = store.search(&FakeEmbedder.embed("congés").await.unwrap(), 10).await.unwrap();
        let rh = results.iter().find(|r| r.chunk.title == "Politique RH").unwrap();
        assert_eq!(rh.chunk.source_filename, "conges.txt");
        assert_eq!(rh.chunk.authorized_profiles.as_slice(), ["RH", "Manager"]);
        assert_eq!(rh.chunk.description, "Description de Politique RH");

        // 두 번째 수집은 이전 내용을 교체
        std::fs::remove_file(dir.path().join("archi.md")).unwrap();
        let report = ingestor(
            &dir,
            vec![metadata("conges.txt", "Politique RH", &["RH"])],
            Arc::new(FakeEmbedder),
            store.clone(),
        )
        .ingest_all()
        .await
        .unwrap();
        assert_eq!(report.chunks_indexed, 1);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_per_document_failures_are_skipped() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("ok.txt"), "Contenu valide.").unwrap();
        std::fs::write(dir.path().join("legacy.doc"), "binaire").unwrap();
        std::fs::write(dir.path().join("vide.txt"), "").unwrap();

        let store = Arc::new(InMemoryVectorStore::new());
        let report = ingestor(
            &dir,
            vec![
                metadata("ok.txt", "OK", &["RH"]),
                metadata("legacy.doc", "Ancien", &["RH"]),
                metadata("vide.txt", "Vide", &["RH"]),
                metadata("absent.txt", "Absent", &["RH"]),
            ],
            Arc::new(FakeEmbedder),
            store,
        )
        .ingest_all()
        .await
        .unwrap();

        assert_eq!(report.documents_indexed, 1);
        let skipped: Vec<&str> = report.skipped.iter().map(|s| s.filename.as_str()).collect();
        assert_eq!(skipped, vec!["legacy.doc", "vide.txt", "absent.txt"]);
        assert!(report.placeholders_created.is_empty());
    }

    #[tokio::test]
    async fn test_no_chunks_is_ingestion_empty() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(InMemoryVectorStore::new());
        let result = ingestor(
            &dir,
            vec![metadata("absent.txt", "Absent", &["RH"])],
            Arc::new(FakeEmbedder),
            store.clone(),
        )
        .ingest_all()
        .await;

        assert!(matches!(result, Err(RagError::IngestionEmpty)));
        assert!(!store.is_initialized().await);
    }

    #[tokio::test]
    async fn test_synthesizes_placeholders() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(InMemoryVectorStore::new());
        let report = ingestor(
            &dir,
            vec![
                metadata("guide.txt", "Guide d'accueil", &["General"]),
                metadata("plan.pdf", "Plan", &["Manager"]),
            ],
            Arc::new(FakeEmbedder),
            store.clone(),
        )
        .with_synthesize_missing(true)
        .ingest_all()
        .await
        .unwrap();

        assert_eq!(report.placeholders_created, vec!["guide.txt"]);
        assert_eq!(report.documents_indexed, 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].filename, "plan.pdf");

        let written = std::fs::read_to_string(dir.path().join("guide.txt")).unwrap();
        assert!(written.starts_with("Guide d'accueil\n\nDescription de Guide d'accueil"));
        assert!(written.contains("Contenu d'exemple"));
    }

    #[tokio::test]
    async fn test_embedding_failure_is_indexing_failed() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("ok.txt"), "Contenu.").unwrap();

        let result = ingestor(
            &dir,
            vec![metadata("ok.txt", "OK", &["RH"])],
            Arc::new(FailingEmbedder),
            Arc::new(InMemoryVectorStore::new()),
        )
        .ingest_all()
        .await;
        assert!(matches!(result, Err(RagError::IndexingFailed(_))));
    }

    #[tokio::test]
    async fn test_store_failure_is_indexing_failed() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("ok.txt"), "Contenu.").unwrap();

        let result = ingestor(
            &dir,
            vec![metadata("ok.txt", "OK", &["RH"])],
            Arc::new(FakeEmbedder),
            Arc::new(FailingStore),
        )
        .ingest_all()
        .await;
        assert!(matches!(result, Err(RagError::IndexingFailed(_))));
    }

    #[test]
    fn test_pages_keep_boundaries_and_continue_index() {
        let chunker = RecursiveChunker::new(ChunkConfig::new(40, 5));
        let meta = metadata("guide.pdf", "Guide", &["RH", "Manager"]);
        let page_one = "Premier paragraphe de la page un.\n\nSecond paragraphe de la page un.";
        let page_two = "Page deux courte.";
        let units = vec![
            ExtractedContent { text: page_one.to_string(), page: Some(1) },
            ExtractedContent { text: String::new(), page: Some(2) },
            ExtractedContent { text: page_two.to_string(), page: Some(3) },
        ];

        let chunks = chunk_units(&chunker, &meta, &units);

        let first_page: Vec<&Chunk> = chunks.iter().filter(|c| c.page == Some(1)).collect();
        let third_page: Vec<&Chunk> = chunks.iter().filter(|c| c.page == Some(3)).collect();
        assert!(first_page.len() >= 2);
        assert_eq!(third_page.len(), 1);
        assert_eq!(first_page.len() + third_page.len(), chunks.len());

        // 페이지 경계를 넘는 청크 없음
        assert!(first_page.iter().all(|c| page_one.contains(c.content.as_str())));
        assert_eq!(third_page[0].content, page_two);

        // 문서 전체에서 연속 번호
        let indices: Vec<u32> = chunks.iter().map(|c| c.chunk_index).collect();
        let expected: Vec<u32> = (0..chunks.len() as u32).collect();
        assert_eq!(indices, expected);
        assert!(chunks.iter().all(|c| c.title == "Guide" && c.source_filename == "guide.pdf"));
    }

    #[test]
    fn test_placeholder_text_falls_back_to_filename() {
        let meta = metadata("note.txt", "", &["RH"]);
        assert!(placeholder_text(&meta).starts_with("note.txt\n\n"));
    }
}

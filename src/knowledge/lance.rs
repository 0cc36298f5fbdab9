//! LanceDB Vector Store - 영구 벡터 인덱스
//!
//! 컬렉션 이름마다 테이블 하나를 사용하며, 수집 시 테이블을 삭제 후 다시 만듭니다.
//! 허용 프로필은 JSON 배열 문자열로 저장합니다.
//! ref: https://lancedb.github.io/lancedb/

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, Int32Array, RecordBatch, RecordBatchIterator,
    StringArray,
};
use arrow_schema::{DataType, Field, Schema};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::connection::Connection;
use lancedb::query::{ExecutableQuery, QueryBase};

use crate::catalog::AuthorizedProfiles;

use super::chunker::Chunk;
use super::vector::{sort_by_similarity, SearchResult, VectorEntry, VectorStore};

// ============================================================================
// LanceVectorStore
// ============================================================================

/// LanceDB 벡터 저장소 구현
pub struct LanceVectorStore {
    db: Connection,
    table_name: String,
}

impl LanceVectorStore {
    /// LanceDB 저장소 열기
    ///
    /// # Arguments
    /// * `path` - 인덱스 디렉토리 경로
    /// * `collection` - 컬렉션(테이블) 이름
    pub async fn open(path: &Path, collection: &str) -> Result<Self> {
        if !path.exists() {
            tokio::fs::create_dir_all(path)
                .await
                .context("Failed to create LanceDB directory")?;
        }

        let path_str = path
            .to_str()
            .ok_or_else(|| anyhow::anyhow!("Invalid path encoding"))?;

        let db = lancedb::connect(path_str)
            .execute()
            .await
            .context("Failed to connect to LanceDB")?;

        Ok(Self {
            db,
            table_name: collection.to_string(),
        })
    }

    /// 벡터 테이블 스키마 생성
    fn create_schema(dimension: i32) -> Schema {
        Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("content", DataType::Utf8, false),
            Field::new("filename", DataType::Utf8, false),
            Field::new("title", DataType::Utf8, false),
            Field::new("description", DataType::Utf8, false),
            Field::new("profils_autorises", DataType::Utf8, false),
            Field::new("page", DataType::Int32, true),
            Field::new("chunk_index", DataType::Int32, false),
            Field::new(
                "embedding",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    dimension,
                ),
                false,
            ),
        ])
    }

    /// 엔트리들을 Arrow RecordBatch로 변환
    fn entries_to_batch(entries: &[VectorEntry]) -> Result<RecordBatch> {
        let dimension = entries
            .first()
            .map(|e| e.embedding.len())
            .ok_or_else(|| anyhow::anyhow!("Cannot create batch from empty entries"))?;

        if dimension == 0 || entries.iter().any(|e| e.embedding.len() != dimension) {
            anyhow::bail!("Inconsistent embedding dimensions");
        }
        let dimension = i32::try_from(dimension).context("Embedding dimension too large")?;

        let ids: Vec<&str> = entries.iter().map(|e| e.chunk.id.as_str()).collect();
        let contents: Vec<&str> = entries.iter().map(|e| e.chunk.content.as_str()).collect();
        let filenames: Vec<&str> = entries
            .iter()
            .map(|e| e.chunk.source_filename.as_str())
            .collect();
        let titles: Vec<&str> = entries.iter().map(|e| e.chunk.title.as_str()).collect();
        let descriptions: Vec<&str> = entries
            .iter()
            .map(|e| e.chunk.description.as_str())
            .collect();
        let profiles: Vec<String> = entries
            .iter()
            .map(|e| serde_json::to_string(&e.chunk.authorized_profiles))
            .collect::<std::result::Result<_, _>>()
            .context("Failed to encode authorized profiles")?;
        let pages: Vec<Option<i32>> = entries
            .iter()
            .map(|e| e.chunk.page.map(|p| p as i32))
            .collect();
        let chunk_indices: Vec<i32> = entries.iter().map(|e| e.chunk.chunk_index as i32).collect();

        // 임베딩을 FixedSizeList로 변환
        let embeddings_flat: Vec<f32> = entries
            .iter()
            .flat_map(|e| e.embedding.iter().copied())
            .collect();

        let values = Float32Array::from(embeddings_flat);
        let field = Arc::new(Field::new("item", DataType::Float32, true));
        let embeddings_list = FixedSizeListArray::try_new(
            field,
            dimension,
            Arc::new(values) as Arc<dyn Array>,
            None,
        )
        .context("Failed to create embedding array")?;

        let batch = RecordBatch::try_new(
            Arc::new(Self::create_schema(dimension)),
            vec![
                Arc::new(StringArray::from(ids)),
                Arc::new(StringArray::from(contents)),
                Arc::new(StringArray::from(filenames)),
                Arc::new(StringArray::from(titles)),
                Arc::new(StringArray::from(descriptions)),
                Arc::new(StringArray::from(profiles)),
                Arc::new(Int32Array::from(pages)),
                Arc::new(Int32Array::from(chunk_indices)),
                Arc::new(embeddings_list),
            ],
        )
        .context("Failed to create RecordBatch")?;

        Ok(batch)
    }

    /// RecordBatch 행들을 검색 결과로 변환
    fn batch_to_results(batch: &RecordBatch) -> Result<Vec<SearchResult>> {
        let ids = string_column(batch, "id")?;
        let contents = string_column(batch, "content")?;
        let filenames = string_column(batch, "filename")?;
        let titles = string_column(batch, "title")?;
        let descriptions = string_column(batch, "description")?;
        let profiles = string_column(batch, "profils_autorises")?;
        let pages = int_column(batch, "page")?;
        let chunk_indices = int_column(batch, "chunk_index")?;

        // _distance 컬럼 (LanceDB가 자동 추가)
        let distances = batch
            .column_by_name("_distance")
            .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
            .ok_or_else(|| anyhow::anyhow!("Missing _distance column"))?;

        let mut results = Vec::with_capacity(batch.num_rows());
        for i in 0..batch.num_rows() {
            let authorized_profiles: AuthorizedProfiles =
                serde_json::from_str(profiles.value(i)).context("Corrupt profils_autorises value")?;

            results.push(SearchResult {
                chunk: Chunk {
                    id: ids.value(i).to_string(),
                    content: contents.value(i).to_string(),
                    source_filename: filenames.value(i).to_string(),
                    title: titles.value(i).to_string(),
                    description: descriptions.value(i).to_string(),
                    authorized_profiles,
                    page: (!pages.is_null(i)).then(|| pages.value(i) as u32),
                    chunk_index: chunk_indices.value(i) as u32,
                },
                // 거리를 유사도로 변환 (L2 거리 -> 0~1)
                similarity: 1.0 / (1.0 + distances.value(i)),
            });
        }

        Ok(results)
    }

    /// 테이블 존재 여부 확인
    async fn table_exists(&self) -> Result<bool> {
        let names = self
            .db
            .table_names()
            .execute()
            .await
            .context("Failed to list LanceDB tables")?;
        Ok(names.contains(&self.table_name))
    }

    async fn open_table(&self) -> Result<lancedb::table::Table> {
        self.db
            .open_table(&self.table_name)
            .execute()
            .await
            .with_context(|| format!("Failed to open table '{}'", self.table_name))
    }
}

#[async_trait]
impl VectorStore for LanceVectorStore {
    async fn replace_all(&self, entries: &[VectorEntry]) -> Result<usize> {
        // 먼저 배치를 만들어 실패 시 기존 테이블을 보존
        let batch = if entries.is_empty() {
            None
        } else {
            Some(Self::entries_to_batch(entries)?)
        };

        if self.table_exists().await? {
            self.db
                .drop_table(&self.table_name)
                .await
                .context("Failed to drop previous table")?;
            tracing::debug!("Dropped previous table '{}'", self.table_name);
        }

        let Some(batch) = batch else {
            return Ok(0);
        };

        let schema = batch.schema();
        let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);
        self.db
            .create_table(&self.table_name, batches)
            .execute()
            .await
            .context("Failed to create table")?;

        tracing::info!(
            "Indexed {} chunks into table '{}'",
            entries.len(),
            self.table_name
        );
        Ok(entries.len())
    }

    async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<SearchResult>> {
        if !self.table_exists().await? {
            anyhow::bail!("Collection '{}' is not initialized", self.table_name);
        }

        let table = self.open_table().await?;

        let stream = table
            .vector_search(query_embedding.to_vec())
            .context("Failed to create vector search")?
            .limit(limit)
            .execute()
            .await
            .context("Failed to execute vector search")?;

        let batches: Vec<RecordBatch> = stream.try_collect().await?;

        let mut results = Vec::new();
        for batch in &batches {
            results.extend(Self::batch_to_results(batch)?);
        }

        sort_by_similarity(&mut results);
        Ok(results)
    }

    async fn count(&self) -> Result<usize> {
        if !self.table_exists().await? {
            return Ok(0);
        }

        let table = self.open_table().await?;
        let count = table.count_rows(None).await.context("Failed to count rows")?;
        Ok(count)
    }

    async fn is_initialized(&self) -> bool {
        self.table_exists().await.unwrap_or(false)
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| anyhow::anyhow!("Missing {} column", name))
}

fn int_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Int32Array> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<Int32Array>())
        .ok_or_else(|| anyhow::anyhow!("Missing {} column", name))
}

// ============================================================================
// Tests
// ============================================================================

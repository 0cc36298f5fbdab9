//! 문서 로더
//!
//! 확장자에 따라 형식별 추출기로 디스패치합니다.
//! - 텍스트 파일 (.txt, .md): UTF-8로 직접 읽기
//! - PDF 파일: pdf-extract로 페이지별 추출
//! - Word 파일 (.docx): zip 컨테이너의 word/document.xml 추출

pub mod docx;
pub mod pdf;

use std::path::Path;

use crate::error::{RagError, RagResult};

// ============================================================================
// Document Kind
// ============================================================================

/// 지원하는 문서 형식
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Text,
    Pdf,
    Word,
}

impl DocumentKind {
    /// 확장자로 형식 결정
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "txt" | "md" => Some(DocumentKind::Text),
            "pdf" => Some(DocumentKind::Pdf),
            "docx" => Some(DocumentKind::Word),
            _ => None,
        }
    }

    /// 파일 경로에서 형식 결정
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }
}

// ============================================================================
// Extracted Content
// ============================================================================

/// 추출된 콘텐츠 단위 (PDF는 페이지마다 하나)
#[derive(Debug, Clone)]
pub struct ExtractedContent {
    /// 추출된 텍스트
    pub text: String,
    /// PDF 페이지 번호 (1부터 시작)
    pub page: Option<u32>,
}

impl ExtractedContent {
    fn whole(text: String) -> Self {
        Self { text, page: None }
    }
}

// ============================================================================
// Document Loader
// ============================================================================

/// 문서 로더
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentLoader;

impl DocumentLoader {
    pub fn new() -> Self {
        Self
    }

    /// 파일에서 텍스트 추출
    ///
    /// 읽기 실패나 지원하지 않는 확장자는 `DocumentLoadFailed`로 반환합니다.
    pub async fn load(&self, path: &Path) -> RagResult<Vec<ExtractedContent>> {
        let load_failed = |message: String| RagError::DocumentLoadFailed {
            path: path.to_path_buf(),
            message,
        };

        let kind = DocumentKind::from_path(path).ok_or_else(|| {
            let ext = path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or_default();
            load_failed(format!("unsupported extension: '{}'", ext))
        })?;

        let result = match kind {
            DocumentKind::Text => self.extract_text(path).await,
            DocumentKind::Pdf => self.extract_pdf(path).await,
            DocumentKind::Word => self.extract_word(path).await,
        };

        result.map_err(|e| load_failed(format!("{:#}", e)))
    }

    /// 텍스트 파일에서 추출
    async fn extract_text(&self, path: &Path) -> anyhow::Result<Vec<ExtractedContent>> {
        use anyhow::Context;

        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read text file: {:?}", path))?;

        Ok(vec![ExtractedContent::whole(text)])
    }

    /// PDF 파일에서 추출
    async fn extract_pdf(&self, path: &Path) -> anyhow::Result<Vec<ExtractedContent>> {
        use anyhow::Context;

        // PDF 추출은 CPU 바운드이므로 spawn_blocking 사용
        let path = path.to_path_buf();
        let pages = tokio::task::spawn_blocking(move || pdf::extract_text_from_pdf(&path))
            .await
            .context("PDF extraction task failed")??;

        Ok(pages
            .into_iter()
            .map(|(page, text)| ExtractedContent {
                text,
                page: Some(page),
            })
            .collect())
    }

    /// Word 파일에서 추출
    async fn extract_word(&self, path: &Path) -> anyhow::Result<Vec<ExtractedContent>> {
        use anyhow::Context;

        let path = path.to_path_buf();
        let text = tokio::task::spawn_blocking(move || docx::extract_text_from_docx(&path))
            .await
            .context("DOCX extraction task failed")??;

        Ok(vec![ExtractedContent::whole(text)])
    }
}

// ============================================================================
// Tests
// ============================================================================

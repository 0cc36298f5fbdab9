//! Text Chunking Module
//!
//! 고정 크기와 오버랩으로 텍스트를 분할하고, 각 조각에 원본 문서의
//! 카탈로그 메타데이터를 그대로 복사합니다.
//!
//! 분할 지점은 구분자 우선순위(문단 → 줄 → 문장 끝 → 공백)로 찾고,
//! 윈도우 안에 구분자가 없으면 크기 경계에서 자릅니다.
//! 청크는 원문의 연속 구간이므로 오버랩 구간을 제외하고 이어 붙이면 원문이 됩니다.

use crate::catalog::{AuthorizedProfiles, DocumentMetadata};

// ============================================================================
// Chunk Configuration
// ============================================================================

/// 청킹 설정
#[derive(Debug, Clone)]
pub struct ChunkConfig {
    /// 최대 청크 크기 (문자 수)
    pub chunk_size: usize,
    /// 오버랩 크기 (문자 수)
    pub chunk_overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 2000,
            chunk_overlap: 200,
        }
    }
}

impl ChunkConfig {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
        }
    }
}

/// 기본 구분자 (우선순위 순)
pub const DEFAULT_SEPARATORS: &[&str] = &["\n\n", "\n", ". ", " "];

// ============================================================================
// Types
// ============================================================================

/// 원문 내 청크 구간 (바이트 오프셋, `start..end`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextSpan {
    pub start: usize,
    pub end: usize,
}

impl TextSpan {
    pub fn slice<'a>(&self, text: &'a str) -> &'a str {
        &text[self.start..self.end]
    }
}

/// 메타데이터가 붙은 청크
///
/// 생성 후 변경되지 않으며 인덱스에 그대로 저장됩니다.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// 청크 ID
    pub id: String,
    /// 청크 텍스트
    pub content: String,
    /// 원본 파일명
    pub source_filename: String,
    /// 문서 제목
    pub title: String,
    /// 문서 설명
    pub description: String,
    /// 허용 프로필
    pub authorized_profiles: AuthorizedProfiles,
    /// PDF 페이지 번호
    pub page: Option<u32>,
    /// 문서 내 청크 순서 (0-based)
    pub chunk_index: u32,
}

// ============================================================================
// Chunker Trait
// ============================================================================

/// 텍스트 청킹 전략 트레이트
pub trait Chunker: Send + Sync {
    /// 텍스트를 순서가 유지되는 구간 목록으로 분할
    fn split(&self, text: &str) -> Vec<TextSpan>;

    /// 청커 이름
    fn name(&self) -> &'static str;
}

// ============================================================================
// RecursiveChunker
// ============================================================================

/// 구분자 우선순위 기반 청커
pub struct RecursiveChunker {
    config: ChunkConfig,
    separators: Vec<String>,
}

impl RecursiveChunker {
    /// 설정으로 생성
    pub fn new(config: ChunkConfig) -> Self {
        Self::with_separators(config, DEFAULT_SEPARATORS)
    }

    /// 구분자를 지정하여 생성
    pub fn with_separators(config: ChunkConfig, separators: &[&str]) -> Self {
        Self {
            config,
            separators: separators
                .iter()
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string())
                .collect(),
        }
    }

    /// 기본 설정으로 생성
    pub fn with_defaults() -> Self {
        Self::new(ChunkConfig::default())
    }

    fn size(&self) -> usize {
        self.config.chunk_size.max(1)
    }

    fn overlap(&self) -> usize {
        self.config.chunk_overlap.min(self.size() - 1)
    }

    /// `start..limit` 윈도우에서 분할 지점 찾기
    ///
    /// 우선순위가 높은 구분자의 마지막 위치를 사용합니다 (구분자는 앞 청크에 포함).
    /// 분할 지점은 오버랩 구간 이후여야 합니다.
    fn find_break(&self, text: &str, start: usize, limit: usize) -> usize {
        let min_cut = advance_chars(text, start, self.overlap());
        let window = &text[start..limit];

        for sep in &self.separators {
            if let Some(pos) = window.rfind(sep.as_str()) {
                let cut = start + pos + sep.len();
                if cut > min_cut {
                    return cut;
                }
            }
        }

        limit
    }

    /// 다음 청크 시작 위치 (오버랩 적용)
    fn next_start(&self, text: &str, start: usize, end: usize) -> usize {
        let overlap = self.overlap();
        if overlap == 0 {
            return end;
        }

        let candidate = retreat_chars(text, end, overlap);
        if candidate <= start {
            return end;
        }

        // 단어 경계에서 시작
        text[candidate..end]
            .char_indices()
            .find(|(_, c)| c.is_whitespace())
            .map(|(i, c)| candidate + i + c.len_utf8())
            .filter(|&p| p < end)
            .unwrap_or(candidate)
    }
}

impl Chunker for RecursiveChunker {
    fn split(&self, text: &str) -> Vec<TextSpan> {
        if text.trim().is_empty() {
            return vec![];
        }

        let mut spans = Vec::new();
        let mut start = 0;

        loop {
            let limit = advance_chars(text, start, self.size());
            if limit >= text.len() {
                spans.push(TextSpan {
                    start,
                    end: text.len(),
                });
                break;
            }

            let end = self.find_break(text, start, limit);
            spans.push(TextSpan { start, end });
            start = self.next_start(text, start, end);
        }

        spans
    }

    fn name(&self) -> &'static str {
        "RecursiveChunker"
    }
}

// ============================================================================
// Document Chunking
// ============================================================================

/// 문서 텍스트를 청크로 분할하고 메타데이터 부여
///
/// `first_index`는 문서 내 청크 번호의 시작값입니다 (PDF 페이지가 이어질 때 사용).
pub fn chunk_document(
    chunker: &dyn Chunker,
    text: &str,
    metadata: &DocumentMetadata,
    page: Option<u32>,
    first_index: u32,
) -> Vec<Chunk> {
    chunker
        .split(text)
        .into_iter()
        .enumerate()
        .map(|(i, span)| Chunk {
            id: uuid::Uuid::new_v4().to_string(),
            content: span.slice(text).to_string(),
            source_filename: metadata.filename.clone(),
            title: metadata.display_title().to_string(),
            description: metadata.description.clone(),
            authorized_profiles: metadata.authorized_profiles.clone(),
            page,
            chunk_index: first_index + i as u32,
        })
        .collect()
}

// ============================================================================
// Helper Functions
// ============================================================================

/// `from`에서 `n`문자 뒤의 바이트 오프셋 (문자열 끝에서 멈춤)
fn advance_chars(s: &str, from: usize, n: usize) -> usize {
    s[from..]
        .char_indices()
        .nth(n)
        .map(|(i, _)| from + i)
        .unwrap_or(s.len())
}

/// `from`에서 `n`문자 앞의 바이트 오프셋 (0에서 멈춤)
fn retreat_chars(s: &str, from: usize, n: usize) -> usize {
    if n == 0 {
        return from;
    }
    s[..from]
        .char_indices()
        .rev()
        .nth(n - 1)
        .map(|(i, _)| i)
        .unwrap_or(0)
}

/// 기본 청커 생성
pub fn default_chunker() -> Box<dyn Chunker> {
    Box::new(RecursiveChunker::with_defaults())
}

// ============================================================================
// Tests
// ============================================================================

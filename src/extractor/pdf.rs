//! PDF 텍스트 추출 모듈
//!
//! pdf-extract 크레이트를 사용하여 PDF에서 페이지별 텍스트를 추출합니다.

use std::path::Path;

use anyhow::{Context, Result};

/// PDF에서 텍스트 추출
///
/// (페이지 번호, 텍스트) 목록을 반환합니다. 페이지 번호는 1부터 시작합니다.
/// 텍스트가 없는 PDF(스캔 문서 등)는 빈 목록을 반환합니다.
pub fn extract_text_from_pdf(path: &Path) -> Result<Vec<(u32, String)>> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read PDF: {:?}", path))?;

    let text = pdf_extract::extract_text_from_mem(&bytes)
        .with_context(|| format!("Failed to extract text from PDF: {:?}", path))?;

    if text.trim().is_empty() {
        tracing::warn!(
            "No text extracted from PDF: {:?}. It might be a scanned document.",
            path
        );
        return Ok(vec![]);
    }

    Ok(split_pdf_pages(&text)
        .into_iter()
        .enumerate()
        .map(|(i, page)| (i as u32 + 1, page))
        .collect())
}

/// PDF 텍스트를 페이지별로 분리 (폼피드 문자 기준)
///
/// 빈 페이지도 번호를 유지하기 위해 제거하지 않고 마지막 빈 조각만 버립니다.
fn split_pdf_pages(text: &str) -> Vec<String> {
    let mut pages: Vec<String> = text.split('\x0c').map(|s| s.trim().to_string()).collect();

    while pages.last().is_some_and(|p| p.is_empty()) {
        pages.pop();
    }

    pages
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_pdf_pages_with_formfeed() {
        let text = "Page 1 content\x0cPage 2 content\x0cPage 3 content\x0c";
        let pages = split_pdf_pages(text);
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[0], "Page 1 content");
        assert_eq!(pages[2], "Page 3 content");
    }

    #[test]
    fn test_split_pdf_pages_keeps_numbering() {
        let pages = split_pdf_pages("Intro\x0c\x0cAnnexe");
        assert_eq!(pages, vec!["Intro", "", "Annexe"]);
    }

    #[test]
    fn test_split_pdf_pages_no_separator() {
        let pages = split_pdf_pages("Just some text without page breaks");
        assert_eq!(pages.len(), 1);
    }

    #[test]
    fn test_read_missing_pdf() {
        let result = extract_text_from_pdf(Path::new("/nonexistent/file.pdf"));
        assert!(result.is_err());
    }
}

//! Word (.docx) 텍스트 추출 모듈
//!
//! .docx는 zip 컨테이너이며 본문은 `word/document.xml`에 있습니다.
//! `<w:t>` 텍스트 런을 모으고 문단 끝(`</w:p>`)을 줄바꿈으로 바꿉니다.

use std::io::Read;
use std::path::Path;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use regex::Regex;
use zip::ZipArchive;

/// 본문 XML 경로
const DOCUMENT_XML: &str = "word/document.xml";

/// .docx 파일에서 텍스트 추출
pub fn extract_text_from_docx(path: &Path) -> Result<String> {
    let file =
        std::fs::File::open(path).with_context(|| format!("Failed to open DOCX: {:?}", path))?;
    let mut archive =
        ZipArchive::new(file).with_context(|| format!("Not a valid DOCX archive: {:?}", path))?;

    let mut xml = String::new();
    archive
        .by_name(DOCUMENT_XML)
        .with_context(|| format!("Missing {} in {:?}", DOCUMENT_XML, path))?
        .read_to_string(&mut xml)
        .context("Failed to read DOCX body")?;

    let text = plaintext_from_document_xml(&xml);
    if text.trim().is_empty() {
        tracing::warn!("No text extracted from DOCX: {:?}", path);
    }

    Ok(text)
}

fn token_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)<w:t(?:\s[^>]*)?>(.*?)</w:t>|<w:tab\s*/>|<w:(?:br|cr)\s*/>|</w:p>")
            .expect("valid DOCX token regex")
    })
}

/// document.xml 본문을 일반 텍스트로 변환
pub fn plaintext_from_document_xml(xml: &str) -> String {
    let mut out = String::with_capacity(xml.len() / 4);

    for caps in token_regex().captures_iter(xml) {
        if let Some(run) = caps.get(1) {
            out.push_str(&unescape_xml(run.as_str()));
            continue;
        }
        match caps.get(0).map(|m| m.as_str()) {
            Some(tag) if tag.starts_with("<w:tab") => out.push('\t'),
            Some(_) => out.push('\n'),
            None => {}
        }
    }

    out.trim_end().to_string()
}

fn entity_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"&(?:#([0-9]+)|#[xX]([0-9a-fA-F]+)|(lt|gt|quot|apos|amp));")
            .expect("valid XML entity regex")
    })
}

/// XML 엔티티 해제 (이름 엔티티 + 10진/16진 문자 참조)
///
/// 한 번만 훑으므로 `&amp;lt;`는 `&lt;`가 됩니다. 잘못된 코드 포인트는 그대로 둡니다.
fn unescape_xml(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }

    entity_regex()
        .replace_all(s, |caps: &regex::Captures| {
            let decoded = if let Some(dec) = caps.get(1) {
                dec.as_str().parse::<u32>().ok().and_then(char::from_u32)
            } else if let Some(hex) = caps.get(2) {
                u32::from_str_radix(hex.as_str(), 16).ok().and_then(char::from_u32)
            } else {
                match caps.get(3).map(|m| m.as_str()) {
                    Some("lt") => Some('<'),
                    Some("gt") => Some('>'),
                    Some("quot") => Some('"'),
                    Some("apos") => Some('\''),
                    Some("amp") => Some('&'),
                    _ => None,
                }
            };
            decoded.map_or_else(|| caps[0].to_string(), |c| c.to_string())
        })
        .into_owned()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use tempfile::TempDir;

    const BODY: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
<w:body>
<w:p><w:r><w:t>Politique de congés</w:t></w:r></w:p>
<w:p><w:r><w:t xml:space="preserve">Les salariés disposent de </w:t></w:r><w:r><w:t>25 jours.</w:t></w:r></w:p>
<w:p><w:r><w:t>Col1</w:t><w:tab/><w:t>R&amp;D</w:t><w:br/><w:t>suite</w:t></w:r></w:p>
</w:body>
</w:document>"#;

    #[test]
    fn test_plaintext_from_document_xml() {
        let text = plaintext_from_document_xml(BODY);
        assert_eq!(
            text,
            "Politique de congés\nLes salariés disposent de 25 jours.\nCol1\tR&D\nsuite"
        );
    }

    #[test]
    fn test_table_tags_are_not_text_runs() {
        let xml = "<w:tbl><w:tr><w:tc><w:p><w:r><w:t>cell</w:t></w:r></w:p></w:tc></w:tr></w:tbl>";
        assert_eq!(plaintext_from_document_xml(xml), "cell");
    }

    #[test]
    fn test_unescape_xml() {
        assert_eq!(unescape_xml("a &lt;b&gt; &amp;amp;"), "a <b> &amp;");
        assert_eq!(unescape_xml("plain"), "plain");
    }

    #[test]
    fn test_unescape_numeric_references() {
        assert_eq!(unescape_xml("cong&#233;s"), "congés");
        assert_eq!(unescape_xml("l&#x2019;entreprise"), "l\u{2019}entreprise");
        assert_eq!(unescape_xml("&#X41;&#66;"), "AB");
        // 유효하지 않은 코드 포인트는 유지
        assert_eq!(unescape_xml("&#xD800;"), "&#xD800;");
        assert_eq!(unescape_xml("&#99999999999;"), "&#99999999999;");
    }

    #[test]
    fn test_numeric_references_in_runs() {
        let xml = "<w:p><w:r><w:t>R&#233;sum&#xE9; &amp; suite</w:t></w:r></w:p>";
        assert_eq!(plaintext_from_document_xml(xml), "Résumé & suite");
    }

    #[test]
    fn test_extract_from_archive() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("guide.docx");

        let file = std::fs::File::create(&path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        writer
            .start_file(DOCUMENT_XML, zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(BODY.as_bytes()).unwrap();
        writer.finish().unwrap();

        let text = extract_text_from_docx(&path).unwrap();
        assert!(text.starts_with("Politique de congés\n"));
    }

    #[test]
    fn test_archive_without_body() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.docx");

        let file = std::fs::File::create(&path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        writer
            .start_file("word/styles.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"<w:styles/>").unwrap();
        writer.finish().unwrap();

        let err = extract_text_from_docx(&path).unwrap_err();
        assert!(format!("{:#}", err).contains(DOCUMENT_XML));
    }
}

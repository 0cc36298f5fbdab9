//! 메타데이터 카탈로그
//!
//! 문서 파일명별 제목, 설명, 허용 프로필 목록을 정의하는 정적 JSON 파일을 읽습니다.
//!
//! ```json
//! { "documents": [
//!     { "filename": "conges.txt", "title": "Politique RH",
//!       "description": "...", "profils_autorises": ["RH", "Manager"] }
//! ] }
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{RagError, RagResult};

// ============================================================================
// AuthorizedProfiles
// ============================================================================

/// 허용 프로필 집합
///
/// 선언 순서를 유지하며 중복을 제거합니다. 멤버십은 대소문자를 구분하는 정확한 비교입니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AuthorizedProfiles(Vec<String>);

impl AuthorizedProfiles {
    /// 프로필 목록에서 생성 (공백 제거, 빈 값/중복 제거)
    pub fn new<I, S>(profiles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut result: Vec<String> = Vec::new();
        for profile in profiles {
            let profile = profile.as_ref().trim();
            if !profile.is_empty() && !result.iter().any(|p| p == profile) {
                result.push(profile.to_string());
            }
        }
        Self(result)
    }

    /// 쉼표로 구분된 문자열에서 생성
    pub fn parse(joined: &str) -> Self {
        Self::new(joined.split(','))
    }

    /// 프로필 포함 여부
    pub fn contains(&self, profile: &str) -> bool {
        self.0.iter().any(|p| p == profile)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// 표시용 문자열 ("RH, Manager")
    pub fn display(&self) -> String {
        self.0.join(", ")
    }
}

impl<'de> Deserialize<'de> for AuthorizedProfiles {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // 리스트 또는 쉼표 구분 문자열 모두 허용
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            List(Vec<String>),
            Joined(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::List(list) => AuthorizedProfiles::new(list),
            Raw::Joined(joined) => AuthorizedProfiles::parse(&joined),
        })
    }
}

// ============================================================================
// DocumentMetadata
// ============================================================================

/// 문서 메타데이터
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub filename: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "profils_autorises", default)]
    pub authorized_profiles: AuthorizedProfiles,
}

impl DocumentMetadata {
    /// 제목 (비어 있으면 파일명)
    pub fn display_title(&self) -> &str {
        if self.title.trim().is_empty() {
            &self.filename
        } else {
            &self.title
        }
    }
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    documents: Vec<DocumentMetadata>,
}

// ============================================================================
// MetadataCatalog
// ============================================================================

/// 메타데이터 카탈로그
///
/// 파일 선언 순서를 유지하며 파일명으로 조회합니다.
#[derive(Debug, Clone, Default)]
pub struct MetadataCatalog {
    entries: Vec<DocumentMetadata>,
    index: HashMap<String, usize>,
}

impl MetadataCatalog {
    /// 카탈로그 파일 로드
    pub fn load(path: &Path) -> RagResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| RagError::CatalogInvalid {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        Self::from_json(&raw).map_err(|e| match e {
            RagError::CatalogInvalid { message, .. } => RagError::CatalogInvalid {
                path: path.to_path_buf(),
                message,
            },
            other => other,
        })
    }

    /// JSON 문자열에서 생성
    pub fn from_json(raw: &str) -> RagResult<Self> {
        let file: CatalogFile =
            serde_json::from_str(raw).map_err(|e| RagError::CatalogInvalid {
                path: Default::default(),
                message: e.to_string(),
            })?;
        Ok(Self::from_entries(file.documents))
    }

    /// 엔트리 목록에서 생성
    ///
    /// 같은 파일명이 여러 번 나오면 마지막 엔트리가 앞의 엔트리를 대체합니다.
    pub fn from_entries(documents: Vec<DocumentMetadata>) -> Self {
        let mut catalog = Self::default();
        for doc in documents {
            if let Some(&i) = catalog.index.get(&doc.filename) {
                tracing::warn!("Duplicate catalog entry for {}, keeping the last one", doc.filename);
                catalog.entries[i] = doc;
            } else {
                catalog.index.insert(doc.filename.clone(), catalog.entries.len());
                catalog.entries.push(doc);
            }
        }
        catalog
    }

    /// 파일명으로 조회
    pub fn get(&self, filename: &str) -> Option<&DocumentMetadata> {
        self.index.get(filename).map(|&i| &self.entries[i])
    }

    /// 선언 순서대로 엔트리 순회
    pub fn iter(&self) -> impl Iterator<Item = &DocumentMetadata> {
        self.entries.iter()
    }

    pub fn filenames(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.filename.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 해당 프로필이 볼 수 있는 문서
    pub fn visible_to<'a>(&'a self, profile: &'a str) -> impl Iterator<Item = &'a DocumentMetadata> {
        self.entries
            .iter()
            .filter(move |e| e.authorized_profiles.contains(profile))
    }
}

// ============================================================================
// Tests
// ============================================================================

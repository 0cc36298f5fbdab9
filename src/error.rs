//! 에러 타입
//!
//! 파이프라인 경계에서 사용하는 타입 에러입니다.
//! 내부 어댑터(LanceDB, HTTP 클라이언트)는 `anyhow::Result`를 쓰고,
//! 여기서 호출자가 분기할 수 있는 종류로 변환됩니다.

use std::path::PathBuf;

use thiserror::Error;

/// IntraBot 파이프라인 에러
#[derive(Debug, Error)]
pub enum RagError {
    /// 설정 오류 (API 키 누락, 잘못된 경로/값). 시작 시 치명적.
    #[error("Configuration invalid: {0}")]
    ConfigInvalid(String),

    /// 메타데이터 카탈로그 파일을 읽거나 파싱할 수 없음
    #[error("Metadata catalog invalid ({path}): {message}")]
    CatalogInvalid { path: PathBuf, message: String },

    /// 문서를 읽을 수 없거나 지원하지 않는 형식. 수집 중에는 건너뜀.
    #[error("Failed to load document {path}: {message}")]
    DocumentLoadFailed { path: PathBuf, message: String },

    /// 벡터 인덱스에 접근할 수 없거나 초기화되지 않음
    #[error("Retrieval unavailable: {0}")]
    RetrievalUnavailable(String),

    /// 언어 모델 호출 실패 또는 잘못된 응답
    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    /// 임베딩 생성 또는 인덱스 쓰기 실패
    #[error("Indexing failed: {0}")]
    IndexingFailed(String),

    /// 모든 문서에서 청크가 하나도 생성되지 않음
    #[error("No chunks produced from any document in the catalog")]
    IngestionEmpty,

    /// 설정에 없는 프로필
    #[error("Unknown profile: {0}")]
    UnknownProfile(String),

    /// 세션에 프로필이 선택되지 않음
    #[error("No profile selected")]
    ProfileNotSelected,
}

impl RagError {
    /// 사용자에게 보여줄 조치 안내
    pub fn hint(&self) -> &'static str {
        match self {
            RagError::ConfigInvalid(_) => "Vérifiez le fichier .env et la variable MISTRAL_API_KEY.",
            RagError::CatalogInvalid { .. } => "Vérifiez le fichier de métadonnées (data/metadata.json).",
            RagError::DocumentLoadFailed { .. } => "Le document a été ignoré.",
            RagError::RetrievalUnavailable(_) => {
                "La base vectorielle est indisponible : lancez `intrabot ingest` pour réindexer."
            }
            RagError::GenerationFailed(_) => "Le modèle n'a pas répondu : réessayez dans un instant.",
            RagError::IndexingFailed(_) => "L'indexation a échoué : réessayez l'ingestion.",
            RagError::IngestionEmpty => {
                "Vérifiez que les fichiers du catalogue existent dans le dossier de données et ne sont pas vides."
            }
            RagError::UnknownProfile(_) => "Choisissez un profil parmi `intrabot profiles`.",
            RagError::ProfileNotSelected => "Sélectionnez un profil avec /profil <nom>.",
        }
    }
}

/// 파이프라인 결과 타입
pub type RagResult<T> = std::result::Result<T, RagError>;

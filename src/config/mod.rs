//! 설정 모듈
//!
//! 환경변수(및 `.env` 파일)에서 IntraBot 설정을 읽습니다.
//! 설정되지 않은 값은 기본값을 사용합니다.

use std::path::PathBuf;
use std::str::FromStr;

use serde::Serialize;

use crate::error::{RagError, RagResult};

/// API 키 환경변수
pub const API_KEY_ENV: &str = "MISTRAL_API_KEY";

/// 기본 프로필 목록
pub const DEFAULT_PROFILES: &[&str] = &["Technique", "RH", "Manager", "General"];

/// IntraBot 설정
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Mistral API 키
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// 답변 생성 모델
    pub llm_model: String,
    /// 임베딩 모델
    pub embedding_model: String,
    /// 청크 크기 (문자 수)
    pub chunk_size: usize,
    /// 청크 오버랩 (문자 수)
    pub chunk_overlap: usize,
    /// 검색 결과 개수
    pub top_k: usize,
    /// 생성 온도
    pub temperature: f32,
    /// 최대 생성 토큰
    pub max_tokens: u32,
    /// 원본 문서 디렉토리
    pub data_dir: PathBuf,
    /// 메타데이터 카탈로그 파일
    pub metadata_file: PathBuf,
    /// 벡터 인덱스 디렉토리
    pub index_dir: PathBuf,
    /// 컬렉션(테이블) 이름
    pub collection: String,
    /// 사용 가능한 프로필
    pub profiles: Vec<String>,
    /// HTTP 요청 타임아웃 (초)
    ///
    /// 질의 임베딩과 답변 생성은 재시도하지 않으므로 이 시간이 질의당 상한입니다.
    /// 수집 중 임베딩은 전송 실패 시 백오프와 함께 재시도합니다.
    pub timeout_secs: u64,
    /// 누락된 파일에 대해 예시 파일 생성
    pub synthesize_missing: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            llm_model: "open-mistral-7b".to_string(),
            embedding_model: "mistral-embed".to_string(),
            chunk_size: 2000,
            chunk_overlap: 200,
            top_k: 6,
            temperature: 0.3,
            max_tokens: 1000,
            data_dir: PathBuf::from("data/raw"),
            metadata_file: PathBuf::from("data/metadata.json"),
            index_dir: PathBuf::from("data/lance_db"),
            collection: "intrabot_docs".to_string(),
            profiles: DEFAULT_PROFILES.iter().map(|p| p.to_string()).collect(),
            timeout_secs: 60,
            synthesize_missing: false,
        }
    }
}

impl Config {
    /// 환경변수에서 설정 로드
    ///
    /// `.env` 파일이 있으면 먼저 읽습니다. 숫자 값 파싱에 실패하면 `ConfigInvalid`.
    pub fn from_env() -> RagResult<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("Loaded environment from {:?}", path);
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 임의의 조회 함수로 설정 구성
    pub fn from_lookup<F>(lookup: F) -> RagResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        config.api_key = get(API_KEY_ENV);

        if let Some(v) = get("INTRABOT_LLM_MODEL") {
            config.llm_model = v;
        }
        if let Some(v) = get("INTRABOT_EMBEDDING_MODEL") {
            config.embedding_model = v;
        }
        if let Some(v) = get("INTRABOT_CHUNK_SIZE") {
            config.chunk_size = parse_value("INTRABOT_CHUNK_SIZE", &v)?;
        }
        if let Some(v) = get("INTRABOT_CHUNK_OVERLAP") {
            config.chunk_overlap = parse_value("INTRABOT_CHUNK_OVERLAP", &v)?;
        }
        if let Some(v) = get("INTRABOT_TOP_K") {
            config.top_k = parse_value("INTRABOT_TOP_K", &v)?;
        }
        if let Some(v) = get("INTRABOT_TEMPERATURE") {
            config.temperature = parse_value("INTRABOT_TEMPERATURE", &v)?;
        }
        if let Some(v) = get("INTRABOT_MAX_TOKENS") {
            config.max_tokens = parse_value("INTRABOT_MAX_TOKENS", &v)?;
        }
        if let Some(v) = get("INTRABOT_DATA_DIR") {
            config.data_dir = PathBuf::from(v);
        }
        if let Some(v) = get("INTRABOT_METADATA_FILE") {
            config.metadata_file = PathBuf::from(v);
        }
        if let Some(v) = get("INTRABOT_INDEX_DIR") {
            config.index_dir = PathBuf::from(v);
        }
        if let Some(v) = get("INTRABOT_COLLECTION") {
            config.collection = v;
        }
        if let Some(v) = get("INTRABOT_PROFILES") {
            config.profiles = v
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(v) = get("INTRABOT_TIMEOUT_SECS") {
            config.timeout_secs = parse_value("INTRABOT_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = get("INTRABOT_SYNTHESIZE_MISSING") {
            config.synthesize_missing = parse_bool(&v);
        }

        Ok(config)
    }

    /// 설정 검증
    ///
    /// 값이 유효한지 확인하고 데이터/인덱스 디렉토리를 생성합니다.
    pub fn validate(&self) -> RagResult<()> {
        if self.chunk_size == 0 {
            return Err(RagError::ConfigInvalid("chunk size must be positive".into()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::ConfigInvalid(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.top_k == 0 {
            return Err(RagError::ConfigInvalid("top-k must be positive".into()));
        }
        if !(0.0..=1.5).contains(&self.temperature) {
            return Err(RagError::ConfigInvalid(format!(
                "temperature {} out of range [0, 1.5]",
                self.temperature
            )));
        }
        if self.profiles.is_empty() {
            return Err(RagError::ConfigInvalid("profile list is empty".into()));
        }

        for dir in [&self.data_dir, &self.index_dir] {
            if !dir.exists() {
                std::fs::create_dir_all(dir).map_err(|e| {
                    RagError::ConfigInvalid(format!("cannot create directory {:?}: {}", dir, e))
                })?;
            }
        }

        Ok(())
    }

    /// API 키 반환 (없으면 `ConfigInvalid`)
    pub fn require_api_key(&self) -> RagResult<&str> {
        self.api_key.as_deref().ok_or_else(|| {
            RagError::ConfigInvalid(format!("{} is not set (.env or environment)", API_KEY_ENV))
        })
    }

    /// API 키 존재 여부
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// 설정된 프로필인지 확인
    pub fn is_known_profile(&self, profile: &str) -> bool {
        self.profiles.iter().any(|p| p == profile)
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> RagResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| RagError::ConfigInvalid(format!("{}: invalid value '{}'", key, value)))
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use tempfile::TempDir;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(|_| None).unwrap();
        assert_eq!(config.chunk_size, 2000);
        assert_eq!(config.chunk_overlap, 200);
        assert_eq!(config.top_k, 6);
        assert_eq!(config.llm_model, "open-mistral-7b");
        assert_eq!(config.embedding_model, "mistral-embed");
        assert_eq!(config.profiles, vec!["Technique", "RH", "Manager", "General"]);
        assert!(!config.has_api_key());
        assert!(config.require_api_key().is_err());
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("MISTRAL_API_KEY", "secret"),
            ("INTRABOT_TOP_K", "4"),
            ("INTRABOT_PROFILES", "RH, Finance ,,"),
            ("INTRABOT_SYNTHESIZE_MISSING", "true"),
        ]))
        .unwrap();

        assert_eq!(config.require_api_key().unwrap(), "secret");
        assert_eq!(config.top_k, 4);
        assert_eq!(config.profiles, vec!["RH", "Finance"]);
        assert!(config.synthesize_missing);
        assert!(config.is_known_profile("Finance"));
        assert!(!config.is_known_profile("finance"));
    }

    #[test]
    fn test_invalid_number() {
        let result = Config::from_lookup(lookup_from(&[("INTRABOT_CHUNK_SIZE", "big")]));
        assert!(matches!(result, Err(RagError::ConfigInvalid(_))));
    }

    #[test]
    fn test_validate_rejects_overlap() {
        let config = Config {
            chunk_size: 100,
            chunk_overlap: 100,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(RagError::ConfigInvalid(_))));
    }

    #[test]
    fn test_validate_creates_directories() {
        let dir = TempDir::new().unwrap();
        let config = Config {
            data_dir: dir.path().join("raw"),
            index_dir: dir.path().join("index"),
            ..Config::default()
        };

        config.validate().unwrap();
        assert!(config.data_dir.is_dir());
        assert!(config.index_dir.is_dir());
    }
}

//! 대화 세션
//!
//! 사용자 한 명의 선택 프로필과 대화 기록을 보관합니다.
//! 파이프라인 자체는 상태가 없고, 세션이 매 턴 생성기를 호출합니다.

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::error::{RagError, RagResult};
use crate::knowledge::{AnswerGenerator, AnswerRecord, SourceRef};

/// 대화 기록 항목의 발화자
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Assistant,
}

/// 대화 기록 항목
#[derive(Debug, Clone, Serialize)]
pub struct ChatTurn {
    pub speaker: Speaker,
    pub content: String,
    pub timestamp: DateTime<Local>,
    /// 답변 출처 (assistant 항목만)
    pub sources: Vec<SourceRef>,
}

impl ChatTurn {
    /// 표시용 시각 (HH:MM:SS)
    pub fn time_label(&self) -> String {
        self.timestamp.format("%H:%M:%S").to_string()
    }
}

/// 대화 세션
#[derive(Debug, Clone)]
pub struct ChatSession {
    profiles: Vec<String>,
    profile: Option<String>,
    history: Vec<ChatTurn>,
}

impl ChatSession {
    /// 사용 가능한 프로필 목록으로 세션 생성
    pub fn new(profiles: Vec<String>) -> Self {
        Self {
            profiles,
            profile: None,
            history: Vec::new(),
        }
    }

    pub fn profiles(&self) -> &[String] {
        &self.profiles
    }

    pub fn profile(&self) -> Option<&str> {
        self.profile.as_deref()
    }

    pub fn history(&self) -> &[ChatTurn] {
        &self.history
    }

    /// 프로필 선택
    ///
    /// 다른 프로필로 바꾸면 대화 기록이 지워집니다.
    pub fn select_profile(&mut self, profile: &str) -> RagResult<()> {
        if !self.profiles.iter().any(|p| p == profile) {
            return Err(RagError::UnknownProfile(profile.to_string()));
        }

        if self.profile.as_deref() != Some(profile) {
            if self.profile.is_some() {
                tracing::debug!("Profile changed to '{}', clearing history", profile);
            }
            self.history.clear();
            self.profile = Some(profile.to_string());
        }
        Ok(())
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// 질문하고 답변을 기록에 추가
    ///
    /// 생성에 실패하면 질문만 남고 답변 항목은 추가되지 않습니다.
    pub async fn ask(&mut self, generator: &AnswerGenerator, query: &str) -> RagResult<AnswerRecord> {
        let profile = self.profile.clone().ok_or(RagError::ProfileNotSelected)?;

        self.history.push(ChatTurn {
            speaker: Speaker::User,
            content: query.to_string(),
            timestamp: Local::now(),
            sources: vec![],
        });

        let record = generator.generate_answer(query, &profile).await?;

        self.history.push(ChatTurn {
            speaker: Speaker::Assistant,
            content: record.answer.clone(),
            timestamp: Local::now(),
            sources: record.sources.clone(),
        });

        Ok(record)
    }
}

// ============================================================================
// Tests
// ============================================================================

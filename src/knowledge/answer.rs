//! 답변 생성기
//!
//! 검색된 청크를 컨텍스트로 묶어 언어 모델에 전달하고,
//! 출처 목록과 함께 답변 레코드를 만듭니다.
//! 허용된 청크가 없으면 모델을 호출하지 않고 고정 거절 메시지를 돌려줍니다.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;

use crate::catalog::AuthorizedProfiles;
use crate::error::{RagError, RagResult};
use crate::llm::{ChatMessage, ChatModel};

use super::retriever::Retriever;
use super::vector::SearchResult;

/// 문서에 정보가 없을 때 모델이 그대로 출력해야 하는 문구
pub const NOT_FOUND_PHRASE: &str = "Je ne trouve pas cette information dans la documentation accessible.";

/// 시스템 지시문 (`{context}` 자리에 문서 블록이 들어감)
pub const SYSTEM_PROMPT: &str = "Tu es IntraBot, un assistant intelligent pour l'intranet d'entreprise.

Ta mission est de répondre aux questions des utilisateurs en te basant UNIQUEMENT sur les documents fournis ci-dessous.

RÈGLES IMPORTANTES:
- Réponds uniquement à partir des informations présentes dans les documents fournis.
- Si une information ne figure pas dans les documents, indique clairement :
 👉 « Je ne trouve pas cette information dans la documentation accessible. »
- Cite systématiquement tes sources à la fin de chaque réponse, entre parenthèses.
- Format de citation :
 (Source : « Titre exact du document », page X le cas échéant)
- Ne fais jamais référence à un numéro de document, mais toujours au titre complet.
- Sois précis, concise et adopte un ton professionnel, clair et convivial.

DOCUMENTS DE RÉFÉRENCE:
{context}";

/// 프로필에 허용된 문서가 없을 때의 고정 답변
pub fn refusal_message(profile: &str) -> String {
    format!(
        "Désolé, je n'ai trouvé aucun document accessible pour votre profil '{}' qui réponde à votre question.",
        profile
    )
}

// ============================================================================
// Types
// ============================================================================

/// 답변에 인용된 문서
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceRef {
    pub title: String,
    pub filename: String,
    pub description: String,
    #[serde(rename = "profils")]
    pub authorized_profiles: AuthorizedProfiles,
}

/// 답변 결과 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerOutcome {
    /// 검색된 문서를 근거로 모델이 답변함
    Grounded,
    /// 프로필이 볼 수 있는 문서가 없어 거절함 (에러 아님)
    NoAuthorizedContent,
}

/// 답변 레코드
#[derive(Debug, Clone, Serialize)]
pub struct AnswerRecord {
    pub answer: String,
    pub profile: String,
    pub sources: Vec<SourceRef>,
    pub num_chunks: usize,
    pub outcome: AnswerOutcome,
}

impl AnswerRecord {
    pub fn is_grounded(&self) -> bool {
        self.outcome == AnswerOutcome::Grounded
    }
}

// ============================================================================
// AnswerGenerator
// ============================================================================

/// 답변 생성기
///
/// 호출 간 상태를 갖지 않으므로 여러 세션에서 공유할 수 있습니다.
#[derive(Clone)]
pub struct AnswerGenerator {
    retriever: Retriever,
    llm: Arc<dyn ChatModel>,
    top_k: usize,
}

impl AnswerGenerator {
    pub fn new(retriever: Retriever, llm: Arc<dyn ChatModel>, top_k: usize) -> Self {
        Self { retriever, llm, top_k }
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// 질문에 대한 답변 생성
    pub async fn generate_answer(&self, query: &str, profile: &str) -> RagResult<AnswerRecord> {
        let results = self.retriever.retrieve(query, profile, self.top_k).await?;

        if results.is_empty() {
            tracing::info!("No authorized content for profile '{}'", profile);
            return Ok(AnswerRecord {
                answer: refusal_message(profile),
                profile: profile.to_string(),
                sources: vec![],
                num_chunks: 0,
                outcome: AnswerOutcome::NoAuthorizedContent,
            });
        }

        let context = format_context(&results);
        let messages = [
            ChatMessage::system(SYSTEM_PROMPT.replace("{context}", &context)),
            ChatMessage::user(query),
        ];

        tracing::debug!(
            "Calling {} with {} chunks ({} chars of context)",
            self.llm.name(),
            results.len(),
            context.chars().count()
        );

        let answer = self
            .llm
            .complete(&messages)
            .await
            .map_err(|e| RagError::GenerationFailed(format!("{:#}", e)))?;

        Ok(AnswerRecord {
            answer,
            profile: profile.to_string(),
            sources: format_sources(&results),
            num_chunks: results.len(),
            outcome: AnswerOutcome::Grounded,
        })
    }
}

/// 청크를 `[제목]\n내용` 블록으로 이어 붙임 (검색 순서 유지)
pub fn format_context(results: &[SearchResult]) -> String {
    results
        .iter()
        .map(|r| format!("[{}]\n{}\n", r.chunk.title, r.chunk.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// 제목 기준 중복 제거한 출처 목록 (처음 나온 것 유지)
pub fn format_sources(results: &[SearchResult]) -> Vec<SourceRef> {
    let mut seen = HashSet::new();
    results
        .iter()
        .filter(|r| seen.insert(r.chunk.title.as_str()))
        .map(|r| SourceRef {
            title: r.chunk.title.clone(),
            filename: r.chunk.source_filename.clone(),
            description: r.chunk.description.clone(),
            authorized_profiles: r.chunk.authorized_profiles.clone(),
        })
        .collect()
}

// ============================================================================
// Tests
// ============================================================================

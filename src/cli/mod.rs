//! CLI 모듈
//!
//! intrabot CLI 명령어 정의 및 구현

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::catalog::MetadataCatalog;
use crate::config::Config;
use crate::embedding::{EmbeddingProvider, MistralEmbedding};
use crate::error::RagError;
use crate::knowledge::{
    AnswerGenerator, AnswerRecord, ChunkConfig, Ingestor, LanceVectorStore, RecursiveChunker,
    Retriever, SourceRef, VectorStore,
};
use crate::llm::{GenerationParams, MistralChat};
use crate::session::{ChatSession, Speaker};

/// 수집 후 확인 검색 질의
const SMOKE_QUERY: &str = "microservices";

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "intrabot")]
#[command(version, about = "프로필 기반 접근 제어 사내 문서 챗봇", long_about = None)]
pub struct Cli {
    /// 원본 문서 디렉토리 (INTRABOT_DATA_DIR)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// 메타데이터 카탈로그 파일 (INTRABOT_METADATA_FILE)
    #[arg(long, global = true)]
    pub metadata: Option<PathBuf>,

    /// 벡터 인덱스 디렉토리 (INTRABOT_INDEX_DIR)
    #[arg(long, global = true)]
    pub index_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 카탈로그의 모든 문서를 수집하여 인덱스 재구축
    Ingest {
        /// 파일이 없으면 카탈로그 내용으로 예시 파일 생성
        #[arg(long)]
        synthesize_missing: bool,
    },

    /// 질문 한 번에 답변
    Ask {
        /// 질문
        query: String,

        /// 사용자 프로필
        #[arg(short, long)]
        profile: String,

        /// JSON으로 출력
        #[arg(long)]
        json: bool,
    },

    /// 대화형 세션
    Chat {
        /// 시작 프로필
        #[arg(short, long)]
        profile: Option<String>,
    },

    /// 프로필 필터링 검색 (모델 호출 없음)
    Search {
        /// 검색 쿼리
        query: String,

        /// 사용자 프로필
        #[arg(short, long)]
        profile: String,

        /// 결과 개수 제한
        #[arg(short, long, default_value = "6")]
        limit: usize,
    },

    /// 상태 확인
    Status {
        /// 설정을 JSON으로 출력
        #[arg(long)]
        json: bool,
    },

    /// 프로필별 열람 가능 문서
    Profiles,
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    let result = dispatch(cli).await;

    if let Err(ref e) = result {
        if let Some(rag) = e.downcast_ref::<RagError>() {
            eprintln!("[!] {}", rag.hint());
        }
    }

    result
}

async fn dispatch(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Ingest { synthesize_missing } => {
            cmd_ingest(&config, synthesize_missing || config.synthesize_missing).await
        }
        Commands::Ask {
            query,
            profile,
            json,
        } => cmd_ask(&config, &query, &profile, json).await,
        Commands::Chat { profile } => cmd_chat(&config, profile).await,
        Commands::Search {
            query,
            profile,
            limit,
        } => cmd_search(&config, &query, &profile, limit).await,
        Commands::Status { json } => cmd_status(&config, json).await,
        Commands::Profiles => cmd_profiles(&config),
    }
}

/// 환경변수 설정에 CLI 경로 옵션 적용 후 검증
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::from_env()?;

    if let Some(ref dir) = cli.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(ref path) = cli.metadata {
        config.metadata_file = path.clone();
    }
    if let Some(ref dir) = cli.index_dir {
        config.index_dir = dir.clone();
    }

    config.validate()?;
    Ok(config)
}

// ============================================================================
// Pipeline Construction
// ============================================================================

fn timeout(config: &Config) -> Duration {
    Duration::from_secs(config.timeout_secs)
}

fn build_embedder(config: &Config) -> Result<Arc<dyn EmbeddingProvider>> {
    let embedder = MistralEmbedding::new(
        config.require_api_key()?,
        config.embedding_model.as_str(),
        timeout(config),
    )
    .context("임베딩 클라이언트 생성 실패")?;
    Ok(Arc::new(embedder))
}

async fn open_store(config: &Config) -> Result<Arc<dyn VectorStore>> {
    let store = LanceVectorStore::open(&config.index_dir, &config.collection)
        .await
        .map_err(|e| RagError::RetrievalUnavailable(format!("{:#}", e)))?;
    Ok(Arc::new(store))
}

async fn build_generator(config: &Config) -> Result<AnswerGenerator> {
    let embedder = build_embedder(config)?;
    let store = open_store(config).await?;

    let params = GenerationParams {
        temperature: config.temperature,
        max_tokens: config.max_tokens,
    };
    let llm = MistralChat::new(
        config.require_api_key()?,
        config.llm_model.as_str(),
        params,
        timeout(config),
    )
    .context("채팅 클라이언트 생성 실패")?;

    Ok(AnswerGenerator::new(
        Retriever::new(store, embedder),
        Arc::new(llm),
        config.top_k,
    ))
}

fn ensure_profile(config: &Config, profile: &str) -> Result<()> {
    if !config.is_known_profile(profile) {
        return Err(RagError::UnknownProfile(profile.to_string()).into());
    }
    Ok(())
}

// ============================================================================
// Command Implementations
// ============================================================================

/// 수집 명령어 (ingest)
///
/// 카탈로그의 모든 문서를 읽어 인덱스를 통째로 다시 만듭니다.
async fn cmd_ingest(config: &Config, synthesize_missing: bool) -> Result<()> {
    let catalog = MetadataCatalog::load(&config.metadata_file)?;
    println!(
        "[*] 카탈로그: {} 문서 ({})",
        catalog.len(),
        config.metadata_file.display()
    );

    let embedder = build_embedder(config)?;
    let store = open_store(config).await?;
    let chunker = Arc::new(RecursiveChunker::new(ChunkConfig::new(
        config.chunk_size,
        config.chunk_overlap,
    )));

    let ingestor = Ingestor::new(
        catalog,
        &config.data_dir,
        chunker,
        embedder.clone(),
        store.clone(),
    )
    .with_synthesize_missing(synthesize_missing);

    println!("[*] 문서 처리 및 임베딩 생성 중...");
    let report = ingestor.ingest_all().await?;

    for name in &report.placeholders_created {
        println!("[*] 예시 파일 생성: {}", name);
    }
    for skipped in &report.skipped {
        println!("[!] 건너뜀: {} ({})", skipped.filename, skipped.reason);
    }
    println!(
        "[OK] 완료: 문서 {}, 청크 {}, 건너뜀 {}",
        report.documents_indexed,
        report.chunks_indexed,
        report.skipped.len()
    );

    // 확인 검색
    match smoke_search(embedder.as_ref(), store.as_ref()).await {
        Ok(titles) => {
            println!("[*] 확인 검색 \"{}\":", SMOKE_QUERY);
            for title in titles {
                println!("    - {}", title);
            }
        }
        Err(e) => tracing::warn!("Smoke search failed: {:#}", e),
    }

    Ok(())
}

async fn smoke_search(embedder: &dyn EmbeddingProvider, store: &dyn VectorStore) -> Result<Vec<String>> {
    let embedding = embedder.embed(SMOKE_QUERY).await?;
    let results = store.search(&embedding, 2).await?;
    Ok(results.into_iter().map(|r| r.chunk.title).collect())
}

/// 질문 명령어 (ask)
async fn cmd_ask(config: &Config, query: &str, profile: &str, json: bool) -> Result<()> {
    ensure_profile(config, profile)?;
    let generator = build_generator(config).await?;

    if !json {
        println!("[*] 프로필 '{}' 으로 검색 중: \"{}\"", profile, query);
    }

    let record = generator.generate_answer(query, profile).await?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&record).context("JSON 직렬화 실패")?
        );
    } else {
        println!();
        print_record(&record);
    }

    Ok(())
}

/// 대화 명령어 (chat)
///
/// 표준 입력에서 한 줄씩 읽어 세션으로 질문합니다.
async fn cmd_chat(config: &Config, profile: Option<String>) -> Result<()> {
    let generator = build_generator(config).await?;
    let mut session = ChatSession::new(config.profiles.clone());

    println!("IntraBot v{}", env!("CARGO_PKG_VERSION"));
    print_chat_help(session.profiles());

    if let Some(ref p) = profile {
        session.select_profile(p)?;
        println!("[OK] 프로필: {}", p);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        let prompt = format!("{}> ", session.profile().unwrap_or("?"));
        stdout.write_all(prompt.as_bytes()).await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        match ChatCommand::parse(&line) {
            ChatCommand::Empty => {}
            ChatCommand::Quit => break,
            ChatCommand::Help => print_chat_help(session.profiles()),
            ChatCommand::Profile(name) => match session.select_profile(&name) {
                Ok(()) => println!("[OK] 프로필: {} (기록 초기화)", name),
                Err(e) => print_error(&e),
            },
            ChatCommand::History => {
                if session.history().is_empty() {
                    println!("[!] 대화 기록이 없습니다.");
                }
                for turn in session.history() {
                    let who = match turn.speaker {
                        Speaker::User => "Vous",
                        Speaker::Assistant => "IntraBot",
                    };
                    println!("[{}] {}: {}", turn.time_label(), who, turn.content);
                }
            }
            ChatCommand::Clear => {
                session.clear_history();
                println!("[OK] 대화 기록 삭제");
            }
            ChatCommand::Ask(query) => match session.ask(&generator, &query).await {
                Ok(record) => {
                    println!();
                    print_record(&record);
                    println!();
                }
                Err(e) => print_error(&e),
            },
        }
    }

    Ok(())
}

/// 검색 명령어 (search)
///
/// 모델을 호출하지 않고 프로필 필터링 결과만 보여줍니다.
async fn cmd_search(config: &Config, query: &str, profile: &str, limit: usize) -> Result<()> {
    ensure_profile(config, profile)?;

    let retriever = Retriever::new(open_store(config).await?, build_embedder(config)?);

    println!("[*] 검색 중: \"{}\" (프로필: {})", query, profile);
    let results = retriever.retrieve(query, profile, limit).await?;

    if results.is_empty() {
        println!("\n[!] 이 프로필로 볼 수 있는 결과가 없습니다.");
        return Ok(());
    }

    println!("\n[OK] 검색 결과 ({} 건):\n", results.len());

    for (i, result) in results.iter().enumerate() {
        let chunk = &result.chunk;
        println!("{}. [유사도: {:.4}] {}", i + 1, result.similarity, chunk.title);
        match chunk.page {
            Some(page) => println!("   파일: {} (p. {})", chunk.source_filename, page),
            None => println!("   파일: {}", chunk.source_filename),
        }
        println!("   프로필: {}", chunk.authorized_profiles.display());
        println!("   내용: {}", truncate_text(&chunk.content, 200));
        println!();
    }

    Ok(())
}

/// 상태 명령어 (status)
async fn cmd_status(config: &Config, json: bool) -> Result<()> {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(config).context("JSON 직렬화 실패")?
        );
        return Ok(());
    }

    println!("intrabot v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("[*] 모델: {} / {}", config.llm_model, config.embedding_model);
    println!(
        "[*] 데이터 디렉토리: {} ({})",
        config.data_dir.display(),
        format_bytes(directory_size(&config.data_dir))
    );

    if config.has_api_key() {
        println!("[OK] API 키: 설정됨");
    } else {
        println!("[!] API 키: 미설정");
        println!("    설정: export {}=your-key", crate::config::API_KEY_ENV);
    }

    match MetadataCatalog::load(&config.metadata_file) {
        Ok(catalog) => println!("[OK] 카탈로그: {} 문서", catalog.len()),
        Err(e) => println!("[!] {}", e),
    }

    match open_store(config).await {
        Ok(store) => {
            if !store.is_initialized().await {
                println!("[!] 벡터 인덱스 없음: intrabot ingest 를 실행하세요");
            } else {
                match store.count().await {
                    Ok(count) => println!(
                        "[OK] 벡터 인덱스 '{}': {} 청크",
                        config.collection, count
                    ),
                    Err(e) => println!("[!] 인덱스 조회 실패: {:#}", e),
                }
            }
        }
        Err(e) => println!("[!] {:#}", e),
    }

    Ok(())
}

/// 프로필 명령어 (profiles)
fn cmd_profiles(config: &Config) -> Result<()> {
    let catalog = MetadataCatalog::load(&config.metadata_file)?;

    for profile in &config.profiles {
        let titles: Vec<&str> = catalog
            .visible_to(profile)
            .map(|doc| doc.display_title())
            .collect();

        println!("[*] {} ({} 문서)", profile, titles.len());
        for title in titles {
            println!("    - {}", title);
        }
    }

    Ok(())
}

// ============================================================================
// Chat Commands
// ============================================================================

/// 대화 입력 해석 결과
#[derive(Debug, PartialEq, Eq)]
enum ChatCommand {
    Empty,
    Ask(String),
    Profile(String),
    History,
    Clear,
    Help,
    Quit,
}

impl ChatCommand {
    fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return ChatCommand::Empty;
        }
        if !line.starts_with('/') {
            return ChatCommand::Ask(line.to_string());
        }

        let (cmd, arg) = match line.split_once(char::is_whitespace) {
            Some((cmd, arg)) => (cmd, arg.trim()),
            None => (line, ""),
        };

        match cmd {
            "/profil" if !arg.is_empty() => ChatCommand::Profile(arg.to_string()),
            "/historique" => ChatCommand::History,
            "/effacer" => ChatCommand::Clear,
            "/quitter" | "/exit" => ChatCommand::Quit,
            _ => ChatCommand::Help,
        }
    }
}

fn print_chat_help(profiles: &[String]) {
    println!("[*] 프로필: {}", profiles.join(", "));
    println!("    /profil <nom>   프로필 선택 (기록 초기화)");
    println!("    /historique     대화 기록");
    println!("    /effacer        기록 삭제");
    println!("    /quitter        종료");
}

// ============================================================================
// Helper Functions
// ============================================================================

fn print_record(record: &AnswerRecord) {
    println!("{}", record.answer);

    if !record.sources.is_empty() {
        println!();
        println!("Sources ({} extraits):", record.num_chunks);
        for source in &record.sources {
            println!("  - {}", format_source(source));
        }
    }
}

fn print_error(e: &RagError) {
    println!("[!] {}", e);
    println!("    {}", e.hint());
}

/// 출처 한 줄 표시
fn format_source(source: &SourceRef) -> String {
    format!(
        "« {} » ({}) [{}]",
        source.title,
        source.filename,
        source.authorized_profiles.display()
    )
}

/// 디렉토리 바로 아래 파일 크기 합계
fn directory_size(dir: &std::path::Path) -> usize {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .filter_map(|e| e.metadata().ok())
                .filter(|m| m.is_file())
                .map(|m| m.len() as usize)
                .sum()
        })
        .unwrap_or(0)
}

/// 텍스트 자르기 (UTF-8 안전)
fn truncate_text(text: &str, max_chars: usize) -> String {
    let cleaned = text.replace('\n', " ").replace('\r', "");
    let cleaned = cleaned.trim();

    if cleaned.chars().count() <= max_chars {
        cleaned.to_string()
    } else {
        let truncated: String = cleaned.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

/// 바이트 크기 포맷팅
fn format_bytes(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

// ============================================================================
// Tests
// ============================================================================

//! Chat request handling

use crate::config::{DataPaths, DoctorConfig, LlmConfig};
use crate::knowledge::KnowledgeBase;
use crate::llm::{GenerateRequest, LlmClient, LlmError};
use crate::prompt::{ChatPromptInput, DISCLAIMER, PromptBuilder, PromptError};
use crate::store::{DEFAULT_SESSION, ResponseCache, SessionStore, cache_key};
use crate::triage::{Urgency, classify_urgency, is_potential_emergency};
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{Value, json};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Cached replies are replayed in pieces of this many characters
const REPLAY_CHUNK_CHARS: usize = 200;

const CONSENT_WORDS: &[&str] = &["yes", "y", "consent", "consent granted"];
const MAX_SESSION_ID_CHARS: usize = 128;

/// Body of `POST /chat`
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,

    #[serde(default)]
    pub session_id: Option<String>,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            session_id: None,
        }
    }

    #[cfg(test)]
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    fn session(&self) -> String {
        let id = self.session_id.as_deref().map(str::trim).unwrap_or_default();
        if id.is_empty() {
            DEFAULT_SESSION.to_string()
        } else {
            id.chars().take(MAX_SESSION_ID_CHARS).collect()
        }
    }
}

/// What the pipeline answers with
pub enum ChatReply {
    /// Immediate JSON answer (empty message, consent flow)
    Json(Value),
    /// Text chunks as they are generated; the last one is the disclaimer
    Stream(ReceiverStream<String>),
}

impl std::fmt::Debug for ChatReply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChatReply::Json(v) => f.debug_tuple("Json").field(v).finish(),
            ChatReply::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// Everything a chat turn needs
pub struct ChatService {
    llm: Arc<dyn LlmClient>,
    prompts: PromptBuilder,
    sessions: SessionStore,
    cache: ResponseCache,
    paths: DataPaths,
    llm_config: LlmConfig,
    require_consent: bool,
}

fn with_disclaimer(text: &str) -> String {
    format!("{}\n\n{}", text, DISCLAIMER)
}

/// User-facing text for a failed generation
fn llm_failure_text(err: &LlmError) -> String {
    match err.http_status() {
        Some(status) => format!("Ollama error: HTTP {}", status),
        None => format!("Error connecting to Ollama: {}", err),
    }
}

/// Split on character boundaries into pieces of at most `size` chars
fn char_chunks(text: &str, size: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(size.max(1))
        .map(|c| c.iter().collect())
        .collect()
}

impl ChatService {
    pub fn new(config: &DoctorConfig, base_dir: &Path, llm: Arc<dyn LlmClient>) -> Self {
        let paths = config.data.resolve(base_dir);
        Self {
            llm,
            prompts: PromptBuilder::new(),
            sessions: SessionStore::new(&paths.session, &config.session),
            cache: ResponseCache::new(
                &paths.cache,
                Duration::from_secs(config.data.cache_ttl_secs),
            ),
            paths,
            llm_config: config.llm.clone(),
            require_consent: config.session.require_consent,
        }
    }

    #[cfg(test)]
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Run one chat turn
    pub async fn handle(self: &Arc<Self>, request: ChatRequest) -> Result<ChatReply, PromptError> {
        let message = request.message.trim();
        if message.is_empty() {
            return Ok(ChatReply::Json(json!({
                "reply": with_disclaimer("Please enter a message.")
            })));
        }

        let session = request.session();

        if self.require_consent && !self.sessions.has_consent(&session).await {
            return Ok(ChatReply::Json(self.consent_flow(&session, message).await));
        }

        let kb = KnowledgeBase::load(&self.paths).await;
        let info = kb.gather(message);
        tracing::debug!(findings = info.len(), "knowledge lookup done");

        let urgency = if is_potential_emergency(message) {
            let triage_prompt = self.prompts.triage(message)?;
            classify_urgency(
                self.llm.as_ref(),
                &triage_prompt,
                self.llm_config.triage_temperature,
                Duration::from_secs(self.llm_config.triage_timeout),
            )
            .await
        } else {
            Urgency::routine()
        };

        // Recall before remembering, so the context names the previous question
        let context = self.sessions.recall_context(&session).await;

        if let Err(e) = self.sessions.remember_question(&session, message).await {
            tracing::warn!(error = %e, "failed to remember question");
        }
        if let Err(e) = self
            .sessions
            .log_interaction(&session, message, urgency.level.as_u8())
            .await
        {
            tracing::warn!(error = %e, "failed to write audit log");
        }

        let alert = urgency.alert();
        let prompt = self.prompts.chat(&ChatPromptInput {
            message,
            context: &context,
            urgency: alert.as_deref(),
            info: &info,
        })?;

        tracing::info!(
            session = %session,
            chars = message.chars().count(),
            level = urgency.level.as_u8(),
            findings = info.len(),
            "chat turn"
        );

        let (tx, rx) = mpsc::channel(32);
        let service = Arc::clone(self);
        tokio::spawn(async move {
            service.produce(prompt, tx).await;
        });
        Ok(ChatReply::Stream(ReceiverStream::new(rx)))
    }

    async fn consent_flow(&self, session: &str, message: &str) -> Value {
        let answer = message.to_lowercase();
        if CONSENT_WORDS.contains(&answer.as_str()) {
            if let Err(e) = self.sessions.set_consent(session, true).await {
                tracing::warn!(error = %e, "failed to record consent");
            }
            tracing::info!(session = %session, "consent granted");
            return json!({
                "answer": with_disclaimer(
                    "Consent noted. How can I help with your heart health today?"
                )
            });
        }

        json!({
            "answer": with_disclaimer(
                "Welcome! Before we start, do you consent to anonymous chat history for better context? (Yes/No) This helps me remember symptoms safely. Reply 'Yes' to proceed."
            ),
            "requires_consent": true
        })
    }

    /// Feed reply chunks into `tx`, from cache or the LLM, then the disclaimer
    async fn produce(&self, prompt: String, tx: mpsc::Sender<String>) {
        let key = cache_key(&prompt);

        if let Some(cached) = self.cache.get(&key).await {
            tracing::debug!("serving reply from cache");
            for piece in char_chunks(&cached, REPLAY_CHUNK_CHARS) {
                if tx.send(piece).await.is_err() {
                    return;
                }
            }
            let _ = tx.send(format!("\n\n{}", DISCLAIMER)).await;
            return;
        }

        let request = GenerateRequest::new(prompt, self.llm_config.temperature)
            .with_top_p(self.llm_config.top_p)
            .with_timeout(Duration::from_secs(self.llm_config.timeout));

        match self.llm.generate_stream(&request).await {
            Ok(mut stream) => {
                let mut full_text = String::new();
                let mut complete = true;
                while let Some(item) = stream.next().await {
                    match item {
                        Ok(chunk) => {
                            full_text.push_str(&chunk);
                            if tx.send(chunk).await.is_err() {
                                tracing::debug!("client went away mid-stream");
                                return;
                            }
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "generation stream failed");
                            complete = false;
                            let _ = tx.send(format!("\n\n{}", llm_failure_text(&e))).await;
                            break;
                        }
                    }
                }
                if complete && !full_text.is_empty() {
                    if let Err(e) = self.cache.set(&key, &full_text).await {
                        tracing::warn!(error = %e, "failed to cache reply");
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "generation request failed");
                let _ = tx.send(llm_failure_text(&e)).await;
            }
        }

        let _ = tx.send(format!("\n\n{}", DISCLAIMER)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::llm::{GenerateResponse, TextStream};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tempfile::TempDir;

    /// Replies with fixed chunks and records every prompt it sees
    struct ScriptedLlm {
        chunks: Vec<String>,
        triage_answer: String,
        fail_stream: Option<LlmError>,
        fail_after_chunks: Option<LlmError>,
        prompts: Mutex<Vec<String>>,
        stream_calls: AtomicU32,
    }

    impl ScriptedLlm {
        fn new(chunks: &[&str]) -> Self {
            Self {
                chunks: chunks.iter().map(|s| s.to_string()).collect(),
                triage_answer: "LEVEL 3: general".into(),
                fail_stream: None,
                fail_after_chunks: None,
                prompts: Mutex::new(Vec::new()),
                stream_calls: AtomicU32::new(0),
            }
        }

        fn last_prompt(&self) -> String {
            self.prompts.lock().unwrap().last().cloned().unwrap_or_default()
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn generate(
            &self,
            request: &GenerateRequest,
        ) -> Result<GenerateResponse, LlmError> {
            self.prompts.lock().unwrap().push(request.prompt.clone());
            Ok(GenerateResponse::new(
                self.triage_answer.clone(),
                Duration::from_millis(1),
            ))
        }

        async fn generate_stream(
            &self,
            request: &GenerateRequest,
        ) -> Result<TextStream, LlmError> {
            self.stream_calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(request.prompt.clone());
            if let Some(ref e) = self.fail_stream {
                return Err(e.clone());
            }
            let mut items: Vec<Result<String, LlmError>> =
                self.chunks.iter().cloned().map(Ok).collect();
            if let Some(ref e) = self.fail_after_chunks {
                items.push(Err(e.clone()));
            }
            Ok(Box::pin(futures::stream::iter(items)))
        }

        fn model(&self) -> &str {
            "scripted"
        }
    }

    fn service(dir: &TempDir, llm: Arc<ScriptedLlm>, require_consent: bool) -> Arc<ChatService> {
        let mut config = DoctorConfig::default();
        config.session = SessionConfig {
            require_consent,
            ..Default::default()
        };
        let paths = config.data.resolve(dir.path());
        std::fs::create_dir_all(paths.symptom_map.parent().unwrap()).unwrap();
        std::fs::write(
            &paths.symptom_map,
            r#"{"chest pain": ["angina", "myocardial infarction"]}"#,
        )
        .unwrap();
        Arc::new(ChatService::new(&config, dir.path(), llm))
    }

    async fn collect(reply: ChatReply) -> Vec<String> {
        match reply {
            ChatReply::Stream(stream) => stream.collect().await,
            ChatReply::Json(v) => panic!("expected a stream, got {}", v),
        }
    }

    #[tokio::test]
    async fn test_empty_message() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir, Arc::new(ScriptedLlm::new(&[])), true);

        match svc.handle(ChatRequest::new("   ")).await.unwrap() {
            ChatReply::Json(v) => {
                let reply = v["reply"].as_str().unwrap();
                assert!(reply.starts_with("Please enter a message."));
                assert!(reply.contains(DISCLAIMER));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_consent_gate() {
        let dir = TempDir::new().unwrap();
        let llm = Arc::new(ScriptedLlm::new(&["hi"]));
        let svc = service(&dir, llm.clone(), true);

        match svc.handle(ChatRequest::new("I have chest pain")).await.unwrap() {
            ChatReply::Json(v) => {
                assert_eq!(v["requires_consent"], true);
                assert!(v["answer"].as_str().unwrap().starts_with("Welcome!"));
            }
            other => panic!("unexpected {:?}", other),
        }

        match svc.handle(ChatRequest::new(" Yes ")).await.unwrap() {
            ChatReply::Json(v) => {
                assert!(v["answer"].as_str().unwrap().starts_with("Consent noted."));
                assert!(v.get("requires_consent").is_none());
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(svc.sessions().has_consent(DEFAULT_SESSION).await);
        assert_eq!(llm.stream_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_symptom_chat_streams_with_disclaimer() {
        let dir = TempDir::new().unwrap();
        let llm = Arc::new(ScriptedLlm::new(&["Chest pain ", "can be angina."]));
        let svc = service(&dir, llm.clone(), false);

        let chunks = collect(
            svc.handle(ChatRequest::new("mild chest pain after stairs"))
                .await
                .unwrap(),
        )
        .await;

        assert_eq!(chunks[0], "Chest pain ");
        assert_eq!(chunks[1], "can be angina.");
        assert!(chunks.last().unwrap().contains(DISCLAIMER));

        let prompt = llm.last_prompt();
        assert!(prompt.contains("Symptom matcher: 'chest pain': possible -> angina, myocardial infarction"));
        assert!(prompt.contains("User: mild chest pain after stairs"));
    }

    #[tokio::test]
    async fn test_emergency_triage_alert_in_prompt() {
        let dir = TempDir::new().unwrap();
        let mut scripted = ScriptedLlm::new(&["Call 108 now."]);
        scripted.triage_answer = "LEVEL 1: crushing chest pain. Confidence: HIGH".into();
        let llm = Arc::new(scripted);
        let svc = service(&dir, llm.clone(), false);

        collect(
            svc.handle(ChatRequest::new("crushing chest pain and cold sweat"))
                .await
                .unwrap(),
        )
        .await;

        let prompts = llm.prompts.lock().unwrap().clone();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[0].contains("Symptoms: crushing chest pain and cold sweat"));
        assert!(prompts[1].contains("URGENCY ALERT: 🚨 EMERGENCY!"));
        assert!(prompts[1].contains("Reason: LEVEL 1: crushing chest pain"));

        let logs = svc.sessions().snapshot().await.audit_logs;
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].response_level, 1);
    }

    #[tokio::test]
    async fn test_second_identical_turn_is_cached() {
        let dir = TempDir::new().unwrap();
        let long_reply = "x".repeat(450);
        let llm = Arc::new(ScriptedLlm::new(&[long_reply.as_str()]));
        let svc = service(&dir, llm.clone(), false);

        let first = collect(svc.handle(ChatRequest::new("what is a stent")).await.unwrap()).await;
        assert_eq!(first.len(), 2);

        let second = collect(svc.handle(ChatRequest::new("what is a stent")).await.unwrap()).await;
        assert_eq!(llm.stream_calls.load(Ordering::SeqCst), 1);
        // 450 chars replay as 200 + 200 + 50, then the disclaimer
        assert_eq!(second.len(), 4);
        assert_eq!(second[..3].concat(), long_reply);
    }

    #[tokio::test]
    async fn test_llm_http_error_is_reported_not_cached() {
        let dir = TempDir::new().unwrap();
        let mut scripted = ScriptedLlm::new(&[]);
        scripted.fail_stream = Some(LlmError::Server {
            status: 500,
            message: "out of memory".into(),
        });
        let llm = Arc::new(scripted);
        let svc = service(&dir, llm.clone(), false);

        let chunks = collect(svc.handle(ChatRequest::new("what is a stent")).await.unwrap()).await;
        assert_eq!(chunks[0], "Ollama error: HTTP 500");
        assert!(chunks[1].contains(DISCLAIMER));

        collect(svc.handle(ChatRequest::new("what is a stent")).await.unwrap()).await;
        assert_eq!(llm.stream_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_stream_broken_mid_reply() {
        let dir = TempDir::new().unwrap();
        let mut scripted = ScriptedLlm::new(&["Statins lower ", "LDL "]);
        scripted.fail_after_chunks = Some(LlmError::network("connection reset"));
        let llm = Arc::new(scripted);
        let svc = service(&dir, llm.clone(), false);

        let chunks = collect(svc.handle(ChatRequest::new("how do statins work")).await.unwrap()).await;
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[0], "Statins lower ");
        assert_eq!(chunks[1], "LDL ");
        assert_eq!(
            chunks[2],
            "\n\nError connecting to Ollama: network error: connection reset"
        );
        assert_eq!(chunks[3], format!("\n\n{}", DISCLAIMER));

        // the partial reply was not cached, so the model is asked again
        let again = collect(svc.handle(ChatRequest::new("how do statins work")).await.unwrap()).await;
        assert_eq!(llm.stream_calls.load(Ordering::SeqCst), 2);
        assert_eq!(again[0], "Statins lower ");
    }

    #[tokio::test]
    async fn test_gateway_timeout_reports_status() {
        let dir = TempDir::new().unwrap();
        let mut scripted = ScriptedLlm::new(&[]);
        scripted.fail_stream = Some(LlmError::Server {
            status: 504,
            message: "gateway timeout".into(),
        });
        let svc = service(&dir, Arc::new(scripted), false);

        let chunks = collect(svc.handle(ChatRequest::new("what is a stent")).await.unwrap()).await;
        assert_eq!(chunks[0], "Ollama error: HTTP 504");
    }

    #[tokio::test]
    async fn test_connection_error_text() {
        let err = LlmError::network("connection failed: refused");
        assert_eq!(
            llm_failure_text(&err),
            "Error connecting to Ollama: network error: connection failed: refused"
        );
    }

    #[tokio::test]
    async fn test_history_recalled_on_next_turn() {
        let dir = TempDir::new().unwrap();
        let llm = Arc::new(ScriptedLlm::new(&["ok"]));
        let svc = service(&dir, llm.clone(), true);

        svc.handle(ChatRequest::new("yes").with_session("s1")).await.unwrap();
        collect(svc.handle(ChatRequest::new("are statins safe").with_session("s1")).await.unwrap()).await;
        collect(svc.handle(ChatRequest::new("and aspirin").with_session("s1")).await.unwrap()).await;

        assert!(llm.last_prompt().contains("Earlier you asked: 'are statins safe'"));
    }

    #[test]
    fn test_char_chunks_respects_boundaries() {
        let pieces = char_chunks("❤️❤️❤️", 2);
        assert_eq!(pieces.concat(), "❤️❤️❤️");
        assert!(pieces.iter().all(|p| p.chars().count() <= 2));
        assert!(char_chunks("", 200).is_empty());
    }

    #[test]
    fn test_session_id_defaulting() {
        assert_eq!(ChatRequest::new("x").session(), DEFAULT_SESSION);
        assert_eq!(ChatRequest::new("x").with_session("  ").session(), DEFAULT_SESSION);
        assert_eq!(ChatRequest::new("x").with_session(" abc ").session(), "abc");
    }
}

//! Scripted in-memory `AssistantApi` for workflow tests.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use serde_json::{json, Map};
use shared::{
    domain::{AppConfig, EmbeddingSettings, LlmSettings, RagSettings},
    protocol::{
        ChatRequest, ChatResponse, IngestResponse, SummarizeRequest, SummarizeResponse,
        TextSubmission, WelcomeResponse,
    },
};
use tokio::sync::{oneshot, Notify};

use crate::{
    busy_gate::BusyGate,
    error::{ClientError, FailureBody, Operation},
    file_batch::PendingFile,
    lock_state,
    transport::AssistantApi,
};

pub(crate) enum Scripted<T> {
    Ok(T),
    Detail(u16, &'static str),
    NoDetail(u16),
    Unparseable(u16),
    Held(oneshot::Receiver<Scripted<T>>),
}

impl<T> Scripted<T> {
    async fn resolve(self, operation: Operation) -> Result<T, ClientError> {
        let settled = match self {
            Self::Held(rx) => rx.await.expect("held call released"),
            other => other,
        };
        match settled {
            Self::Ok(value) => Ok(value),
            Self::Detail(status, detail) => Err(ClientError::Server {
                operation,
                status,
                body: FailureBody::Detail(detail.to_string()),
            }),
            Self::NoDetail(status) => Err(ClientError::Server {
                operation,
                status,
                body: FailureBody::NoDetail,
            }),
            Self::Unparseable(status) => Err(ClientError::Server {
                operation,
                status,
                body: FailureBody::Unparseable,
            }),
            Self::Held(_) => panic!("held call released into another hold"),
        }
    }
}

pub(crate) fn sample_config() -> AppConfig {
    let mut llm_extra = Map::new();
    llm_extra.insert("host".into(), json!("http://localhost:11434"));
    AppConfig {
        llm: LlmSettings {
            model: "deepseek-coder:6.7b".into(),
            temperature: 0.7,
            max_tokens: 512,
            system_prompt: "You are a helpful study partner.".into(),
            extra: llm_extra,
        },
        embedding: EmbeddingSettings {
            model: "all-MiniLM-L6-v2".into(),
            extra: Map::new(),
        },
        rag: RagSettings {
            top_k: 3,
            extra: Map::new(),
        },
    }
}

#[derive(Default)]
struct Scripts {
    uploads: VecDeque<Scripted<IngestResponse>>,
    texts: VecDeque<Scripted<IngestResponse>>,
    chats: VecDeque<Scripted<ChatResponse>>,
    fetches: VecDeque<Scripted<AppConfig>>,
    saves: VecDeque<Scripted<AppConfig>>,
    summaries: VecDeque<Scripted<SummarizeResponse>>,
}

#[derive(Default)]
struct Recorded {
    gate_held: Vec<bool>,
    uploaded_batches: Vec<Vec<String>>,
    text_submissions: Vec<TextSubmission>,
    questions: Vec<String>,
    saved_configs: Vec<AppConfig>,
    summarize_requests: Vec<SummarizeRequest>,
}

#[derive(Default)]
pub(crate) struct FakeApi {
    gate: Mutex<Option<BusyGate>>,
    calls: AtomicUsize,
    started: Notify,
    scripts: Mutex<Scripts>,
    recorded: Mutex<Recorded>,
}

impl FakeApi {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Records whether `gate` is held each time a call begins.
    pub(crate) fn watch_gate(&self, gate: &BusyGate) {
        *lock_state(&self.gate) = Some(gate.clone());
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) async fn call_started(&self) {
        self.started.notified().await;
    }

    pub(crate) fn gate_was_held_on_every_call(&self) -> bool {
        let recorded = lock_state(&self.recorded);
        !recorded.gate_held.is_empty() && recorded.gate_held.iter().all(|held| *held)
    }

    pub(crate) fn script_upload(&self, step: Scripted<IngestResponse>) {
        lock_state(&self.scripts).uploads.push_back(step);
    }

    pub(crate) fn script_text(&self, step: Scripted<IngestResponse>) {
        lock_state(&self.scripts).texts.push_back(step);
    }

    pub(crate) fn script_chat(&self, step: Scripted<ChatResponse>) {
        lock_state(&self.scripts).chats.push_back(step);
    }

    pub(crate) fn script_fetch(&self, step: Scripted<AppConfig>) {
        lock_state(&self.scripts).fetches.push_back(step);
    }

    pub(crate) fn script_save(&self, step: Scripted<AppConfig>) {
        lock_state(&self.scripts).saves.push_back(step);
    }

    pub(crate) fn script_summary(&self, step: Scripted<SummarizeResponse>) {
        lock_state(&self.scripts).summaries.push_back(step);
    }

    pub(crate) fn hold_chat(&self) -> oneshot::Sender<Scripted<ChatResponse>> {
        let (tx, rx) = oneshot::channel();
        self.script_chat(Scripted::Held(rx));
        tx
    }

    pub(crate) fn hold_upload(&self) -> oneshot::Sender<Scripted<IngestResponse>> {
        let (tx, rx) = oneshot::channel();
        self.script_upload(Scripted::Held(rx));
        tx
    }

    pub(crate) fn uploaded_batches(&self) -> Vec<Vec<String>> {
        lock_state(&self.recorded).uploaded_batches.clone()
    }

    pub(crate) fn text_submissions(&self) -> Vec<TextSubmission> {
        lock_state(&self.recorded).text_submissions.clone()
    }

    pub(crate) fn questions(&self) -> Vec<String> {
        lock_state(&self.recorded).questions.clone()
    }

    pub(crate) fn saved_configs(&self) -> Vec<AppConfig> {
        lock_state(&self.recorded).saved_configs.clone()
    }

    pub(crate) fn summarize_requests(&self) -> Vec<SummarizeRequest> {
        lock_state(&self.recorded).summarize_requests.clone()
    }

    fn begin_call(&self, record: impl FnOnce(&mut Recorded)) {
        let held = lock_state(&self.gate)
            .as_ref()
            .map(BusyGate::is_busy)
            .unwrap_or(true);
        {
            let mut recorded = lock_state(&self.recorded);
            recorded.gate_held.push(held);
            record(&mut recorded);
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.started.notify_one();
    }
}

#[async_trait]
impl AssistantApi for FakeApi {
    async fn upload_documents(
        &self,
        files: &[PendingFile],
    ) -> Result<IngestResponse, ClientError> {
        self.begin_call(|recorded| {
            recorded
                .uploaded_batches
                .push(files.iter().map(|file| file.name().to_string()).collect())
        });
        let step = lock_state(&self.scripts).uploads.pop_front();
        match step {
            Some(step) => step.resolve(Operation::IngestDocuments).await,
            None => Ok(IngestResponse {
                message: format!("Successfully processed and added {} PDFs.", files.len()),
                chunks_loaded: files.len() as u64,
            }),
        }
    }

    async fn submit_text(
        &self,
        submission: &TextSubmission,
    ) -> Result<IngestResponse, ClientError> {
        self.begin_call(|recorded| recorded.text_submissions.push(submission.clone()));
        let step = lock_state(&self.scripts).texts.pop_front();
        match step {
            Some(step) => step.resolve(Operation::SubmitText).await,
            None => Ok(IngestResponse {
                message: format!(
                    "Successfully processed and added text '{}' to the database.",
                    submission.title
                ),
                chunks_loaded: 1,
            }),
        }
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ClientError> {
        self.begin_call(|recorded| recorded.questions.push(request.question.clone()));
        let step = lock_state(&self.scripts).chats.pop_front();
        match step {
            Some(step) => step.resolve(Operation::Chat).await,
            None => Ok(ChatResponse {
                answer: format!("answer to: {}", request.question),
            }),
        }
    }

    async fn fetch_config(&self) -> Result<AppConfig, ClientError> {
        self.begin_call(|_| {});
        let step = lock_state(&self.scripts).fetches.pop_front();
        match step {
            Some(step) => step.resolve(Operation::FetchConfig).await,
            None => Ok(sample_config()),
        }
    }

    async fn save_config(&self, config: &AppConfig) -> Result<AppConfig, ClientError> {
        self.begin_call(|recorded| recorded.saved_configs.push(config.clone()));
        let step = lock_state(&self.scripts).saves.pop_front();
        match step {
            Some(step) => step.resolve(Operation::SaveConfig).await,
            None => Ok(config.clone()),
        }
    }

    async fn summarize(
        &self,
        request: &SummarizeRequest,
    ) -> Result<SummarizeResponse, ClientError> {
        self.begin_call(|recorded| recorded.summarize_requests.push(request.clone()));
        let step = lock_state(&self.scripts).summaries.pop_front();
        match step {
            Some(step) => step.resolve(Operation::Summarize).await,
            None => Ok(SummarizeResponse {
                summary: "summary".into(),
            }),
        }
    }

    async fn health(&self) -> Result<WelcomeResponse, ClientError> {
        Ok(WelcomeResponse {
            message: "Welcome to the AI Study Assistant API.".into(),
        })
    }
}

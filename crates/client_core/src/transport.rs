//! HTTP contract with the assistant service.

use async_trait::async_trait;
use reqwest::{
    multipart::{Form, Part},
    Client, Response,
};
use serde::de::DeserializeOwned;
use shared::{
    domain::AppConfig,
    protocol::{
        ChatRequest, ChatResponse, IngestResponse, SummarizeRequest, SummarizeResponse,
        TextSubmission, WelcomeResponse,
    },
};
use tracing::{info, warn};
use url::Url;

use crate::{
    error::{ClientError, FailureBody, Operation},
    file_batch::PendingFile,
};

const FILES_FIELD: &str = "files";

#[async_trait]
pub trait AssistantApi: Send + Sync {
    async fn upload_documents(&self, files: &[PendingFile])
        -> Result<IngestResponse, ClientError>;
    async fn submit_text(&self, submission: &TextSubmission)
        -> Result<IngestResponse, ClientError>;
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ClientError>;
    async fn fetch_config(&self) -> Result<AppConfig, ClientError>;
    async fn save_config(&self, config: &AppConfig) -> Result<AppConfig, ClientError>;
    async fn summarize(&self, request: &SummarizeRequest)
        -> Result<SummarizeResponse, ClientError>;
    async fn health(&self) -> Result<WelcomeResponse, ClientError>;
}

pub struct HttpAssistantApi {
    http: Client,
    base_url: Url,
}

impl HttpAssistantApi {
    pub fn new(mut base_url: Url) -> Self {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self {
            http: Client::new(),
            base_url,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, operation: Operation, path: &str) -> Result<Url, ClientError> {
        self.base_url
            .join(path)
            .map_err(|source| ClientError::Endpoint { operation, source })
    }

    async fn read_json<T: DeserializeOwned>(
        operation: Operation,
        response: Response,
    ) -> Result<T, ClientError> {
        let status = response.status();
        if !status.is_success() {
            let raw = response.text().await.unwrap_or_default();
            let body = FailureBody::parse(&raw);
            warn!(
                operation = operation.as_str(),
                status = status.as_u16(),
                ?body,
                "assistant service rejected request"
            );
            return Err(ClientError::Server {
                operation,
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|source| ClientError::Transport { operation, source })?;
        serde_json::from_slice(&bytes).map_err(|source| {
            warn!(operation = operation.as_str(), %source, "undecodable response body");
            ClientError::Decode { operation, source }
        })
    }

    fn multipart_form(files: &[PendingFile]) -> Result<Form, ClientError> {
        let mut form = Form::new();
        for file in files {
            let part = Part::bytes(file.bytes().to_vec())
                .file_name(file.name().to_string())
                .mime_str(file.mime_type())
                .map_err(|source| ClientError::Transport {
                    operation: Operation::IngestDocuments,
                    source,
                })?;
            form = form.part(FILES_FIELD, part);
        }
        Ok(form)
    }
}

#[async_trait]
impl AssistantApi for HttpAssistantApi {
    async fn upload_documents(
        &self,
        files: &[PendingFile],
    ) -> Result<IngestResponse, ClientError> {
        let operation = Operation::IngestDocuments;
        let form = Self::multipart_form(files)?;
        info!(files = files.len(), "ingest: uploading document batch");
        let response = self
            .http
            .post(self.endpoint(operation, "upload_and_process")?)
            .multipart(form)
            .send()
            .await
            .map_err(|source| ClientError::Transport { operation, source })?;
        Self::read_json(operation, response).await
    }

    async fn submit_text(
        &self,
        submission: &TextSubmission,
    ) -> Result<IngestResponse, ClientError> {
        let operation = Operation::SubmitText;
        let response = self
            .http
            .post(self.endpoint(operation, "submit_text")?)
            .json(submission)
            .send()
            .await
            .map_err(|source| ClientError::Transport { operation, source })?;
        Self::read_json(operation, response).await
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ClientError> {
        let operation = Operation::Chat;
        let response = self
            .http
            .post(self.endpoint(operation, "chat")?)
            .json(request)
            .send()
            .await
            .map_err(|source| ClientError::Transport { operation, source })?;
        Self::read_json(operation, response).await
    }

    async fn fetch_config(&self) -> Result<AppConfig, ClientError> {
        let operation = Operation::FetchConfig;
        let response = self
            .http
            .get(self.endpoint(operation, "config")?)
            .send()
            .await
            .map_err(|source| ClientError::Transport { operation, source })?;
        Self::read_json(operation, response).await
    }

    async fn save_config(&self, config: &AppConfig) -> Result<AppConfig, ClientError> {
        let operation = Operation::SaveConfig;
        let response = self
            .http
            .post(self.endpoint(operation, "config")?)
            .json(config)
            .send()
            .await
            .map_err(|source| ClientError::Transport { operation, source })?;
        Self::read_json(operation, response).await
    }

    async fn summarize(
        &self,
        request: &SummarizeRequest,
    ) -> Result<SummarizeResponse, ClientError> {
        let operation = Operation::Summarize;
        let response = self
            .http
            .post(self.endpoint(operation, "summarize")?)
            .json(request)
            .send()
            .await
            .map_err(|source| ClientError::Transport { operation, source })?;
        Self::read_json(operation, response).await
    }

    async fn health(&self) -> Result<WelcomeResponse, ClientError> {
        let operation = Operation::Health;
        let response = self
            .http
            .get(self.base_url.clone())
            .send()
            .await
            .map_err(|source| ClientError::Transport { operation, source })?;
        Self::read_json(operation, response).await
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;

use anyhow::Result;
use dreamcore::prompt::{ChatMessage, PromptTemplate, Task};
use dreamcore::source::{DatasetKind, SourceOptions};
use dreamcore::{AnnotateError, AnnotationResult, Annotator};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// Chat-completion parameters sent with every request.
#[derive(Debug, Clone, Serialize)]
pub struct ModelParams {
    pub model: String,
    pub temperature: f32,
    pub top_p: f32,
    pub n: u32,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    pub presence_penalty: f32,
    pub frequency_penalty: f32,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            model: "gpt-4".into(),
            // deterministic answers; leave top_p alone
            temperature: 0.0,
            top_p: 1.0,
            n: 1,
            stream: false,
            stop: None,
            max_tokens: None,
            presence_penalty: 0.0,
            frequency_penalty: 0.0,
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    #[serde(flatten)]
    params: &'a ModelParams,
    messages: Vec<ChatMessage>,
}

/// Blocking client for `{api_base}/chat/completions`.
pub struct ChatClient {
    http: Client,
    endpoint: String,
    api_key: String,
    params: ModelParams,
    prompt: PromptTemplate,
}

impl ChatClient {
    pub fn new(api_base: &str, api_key: String, params: ModelParams, prompt: PromptTemplate, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("dream-annotator/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        let endpoint = format!("{}/chat/completions", api_base.trim_end_matches('/'));
        Ok(Self { http, endpoint, api_key, params, prompt })
    }

    #[cfg(test)]
    fn request_body(&self, text: &str) -> serde_json::Result<Value> {
        serde_json::to_value(ChatRequest { params: &self.params, messages: self.prompt.messages(text) })
    }
}

impl Annotator for ChatClient {
    fn annotate(&mut self, text: &str) -> Result<AnnotationResult, AnnotateError> {
        let body = ChatRequest { params: &self.params, messages: self.prompt.messages(text) };
        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .map_err(|e| AnnotateError::Service(format!("request failed: {e}")))?;
        let status = resp.status();
        let payload = resp
            .text()
            .map_err(|e| AnnotateError::Service(format!("reading response failed: {e}")))?;
        classify(status, &payload)
    }
}

/// Turn an HTTP status and body into an annotation result or error.
///
/// 429 is the only retryable status.
pub fn classify(status: StatusCode, body: &str) -> Result<AnnotationResult, AnnotateError> {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(AnnotateError::RateLimited(error_summary(body)));
    }
    if !status.is_success() {
        return Err(AnnotateError::Service(format!("HTTP {status}: {}", error_summary(body))));
    }
    serde_json::from_str(body).map_err(|e| AnnotateError::Service(format!("response is not JSON: {e}")))
}

fn error_summary(body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    if let Some(msg) = parsed.as_ref().and_then(|v| v.pointer("/error/message")).and_then(Value::as_str) {
        return msg.to_string();
    }
    body.chars().take(200).collect()
}

/// Loading options for `kind`, with optional column overrides.
///
/// Flying comments are skipped unless `include_comments` is set.
pub fn source_options(
    kind: DatasetKind,
    id_column: Option<&str>,
    text_column: Option<&str>,
    include_comments: bool,
) -> SourceOptions {
    let mut opts = SourceOptions::for_kind(kind);
    if let Some(col) = id_column { opts.id_column = col.to_string(); }
    if let Some(col) = text_column { opts.text_column = col.to_string(); }
    if include_comments { opts.dreams_only = false; }
    opts
}

/// `<dir>/data-<dataset>_task-<task>_responses.json`
pub fn responses_path(dir: &Path, dataset: &str, task: Task) -> PathBuf {
    dir.join(format!("data-{dataset}_task-{task}_responses.json"))
}

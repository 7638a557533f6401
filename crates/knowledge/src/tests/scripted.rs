//! Scripted completion client for tests.

use measles_core::{AppError, AppResult};
use measles_llm::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

type Script = Box<dyn Fn(&str) -> Result<String, String> + Send + Sync>;

/// Completion client whose replies are computed from the prompt.
pub(crate) struct ScriptedClient {
    script: Script,
    echo: bool,
    healthy: bool,
    calls: AtomicUsize,
    requests: Mutex<Vec<LlmRequest>>,
}

impl ScriptedClient {
    pub(crate) fn new(script: impl Fn(&str) -> Result<String, String> + Send + Sync + 'static) -> Self {
        Self {
            script: Box::new(script),
            echo: false,
            healthy: true,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Always reply with `text`.
    pub(crate) fn replying(text: &str) -> Self {
        let text = text.to_string();
        Self::new(move |_| Ok(text.clone()))
    }

    /// Always fail with a generation error.
    pub(crate) fn failing(message: &str) -> Self {
        let message = message.to_string();
        Self::new(move |_| Err(message.clone()))
    }

    /// Return `script`'s reply verbatim as an echoing backend would.
    pub(crate) fn echoing(mut self) -> Self {
        self.echo = true;
        self
    }

    pub(crate) fn unhealthy(mut self) -> Self {
        self.healthy = false;
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn last_request(&self) -> Option<LlmRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait::async_trait]
impl LlmClient for ScriptedClient {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    fn echoes_prompt(&self) -> bool {
        self.echo
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());

        let content = (self.script)(&request.prompt).map_err(AppError::Generation)?;
        Ok(LlmResponse {
            content,
            model: request.model.clone(),
            usage: LlmUsage::default(),
        })
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(self.healthy)
    }
}

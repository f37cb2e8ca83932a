//! Scripted oracle for tests.
//!
//! Replies are consumed in FIFO order. Every received request is kept so
//! tests can assert on the prompt that was sent.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{GenerateRequest, GenerateResponse, Oracle};
use crate::{Error, Result};

/// One queued reply.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    /// Return this response.
    Response(GenerateResponse),
    /// Fail with a provider error carrying this message.
    Error(String),
}

/// An [`Oracle`] that replays queued replies, optionally after a delay.
#[derive(Default)]
pub struct ScriptedOracle {
    replies: Mutex<VecDeque<ScriptedReply>>,
    requests: Mutex<Vec<GenerateRequest>>,
    delay: Option<Duration>,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep for `delay` before answering each request.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue a plain text completion.
    pub fn queue_text(&self, text: impl Into<String>) -> &Self {
        self.push(ScriptedReply::Response(GenerateResponse::text(text)))
    }

    /// Queue a full response.
    pub fn queue_response(&self, response: GenerateResponse) -> &Self {
        self.push(ScriptedReply::Response(response))
    }

    /// Queue a safety-blocked response.
    pub fn queue_blocked(&self) -> &Self {
        self.push(ScriptedReply::Response(GenerateResponse::blocked("SAFETY")))
    }

    /// Queue a transport failure.
    pub fn queue_error(&self, message: impl Into<String>) -> &Self {
        self.push(ScriptedReply::Error(message.into()))
    }

    pub fn queued_reply_count(&self) -> usize {
        self.replies.lock().map(|r| r.len()).unwrap_or(0)
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn push(&self, reply: ScriptedReply) -> &Self {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(reply);
        }
        self
    }
}

#[async_trait]
impl Oracle for ScriptedOracle {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let reply = self
            .replies
            .lock()
            .map_err(|_| Error::ProviderApi("scripted oracle poisoned".to_string()))?
            .pop_front();

        match reply {
            Some(ScriptedReply::Response(response)) => Ok(response),
            Some(ScriptedReply::Error(message)) => Err(Error::ProviderApi(message)),
            None => Err(Error::ProviderApi("no scripted reply queued".to_string())),
        }
    }
}

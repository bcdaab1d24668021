//! Mock Widget API
//!
//! An in-process [`WidgetApi`] + [`AdminApi`] for tests and offline demos.
//! It serves whatever config it was given, echoes chat messages, and can be
//! told to fail or stall any endpoint.
//!
//! A response is read when the call arrives, not when its delay ends, so a
//! stalled request still answers with the state it was asked about.
//!
//! # Usage
//!
//! ```ignore
//! use widget_core::api::mock::{Endpoint, MockApi};
//!
//! let api = MockApi::new();
//! api.set_delay(Endpoint::Chat, Duration::from_millis(200));
//! api.fail(Endpoint::Messages, 500, "boom");
//!
//! // ... drive a widget ...
//!
//! assert_eq!(api.count(Endpoint::Chat), 1);
//! ```

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::traits::{AdminApi, FormValues, WidgetApi};
use crate::error::{WidgetError, WidgetResult};
use crate::models::{
    ChatReply, ChatRequest, MessagingConfig, StarterQuestionConfig, TranscriptEntry, WidgetConfig,
};

/// Endpoints the mock can stall or fail
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// `GET widget-config`
    WidgetConfig,
    /// `GET messaging-config`
    MessagingConfig,
    /// `GET starter-questions`
    StarterQuestions,
    /// `GET messages`
    Messages,
    /// `POST chat`
    Chat,
    /// `POST form/submit`
    SubmitForm,
    /// Avatar probe
    ProbeAvatar,
    /// Any admin save
    Admin,
}

/// A recorded call
#[derive(Clone, Debug, PartialEq)]
pub enum ApiCall {
    /// `GET widget-config`
    WidgetConfig,
    /// `GET messaging-config`
    MessagingConfig,
    /// `GET starter-questions`
    StarterQuestions,
    /// `GET messages`
    Messages,
    /// `POST chat`
    Chat(ChatRequest),
    /// `POST form/submit`
    SubmitForm(FormValues),
    /// Avatar probe of a resolved URL
    ProbeAvatar(String),
    /// `POST widget-config`
    SaveWidgetConfig(WidgetConfig),
    /// `PUT messaging-config`
    SaveMessagingConfig(MessagingConfig),
    /// `PUT starter-questions`
    SaveStarterQuestions(StarterQuestionConfig),
}

impl ApiCall {
    fn endpoint(&self) -> Endpoint {
        match self {
            Self::WidgetConfig => Endpoint::WidgetConfig,
            Self::MessagingConfig => Endpoint::MessagingConfig,
            Self::StarterQuestions => Endpoint::StarterQuestions,
            Self::Messages => Endpoint::Messages,
            Self::Chat(_) => Endpoint::Chat,
            Self::SubmitForm(_) => Endpoint::SubmitForm,
            Self::ProbeAvatar(_) => Endpoint::ProbeAvatar,
            Self::SaveWidgetConfig(_) | Self::SaveMessagingConfig(_) | Self::SaveStarterQuestions(_) => {
                Endpoint::Admin
            }
        }
    }
}

#[derive(Debug, Default)]
struct MockState {
    widget_config: WidgetConfig,
    messaging_config: MessagingConfig,
    starter_questions: StarterQuestionConfig,
    transcript: Vec<TranscriptEntry>,
    chat_reply: Option<ChatReply>,
    used_faq: bool,
    failures: HashMap<Endpoint, (u16, String)>,
    delays: HashMap<Endpoint, Duration>,
    calls: Vec<ApiCall>,
}

/// Configurable in-process API
#[derive(Debug)]
pub struct MockApi {
    base: String,
    state: Mutex<MockState>,
}

impl Default for MockApi {
    fn default() -> Self {
        Self::new()
    }
}

impl MockApi {
    /// A mock with empty config that echoes chat messages
    #[must_use]
    pub fn new() -> Self {
        Self {
            base: "http://mock.invalid/".to_string(),
            state: Mutex::new(MockState::default()),
        }
    }

    /// Serve this widget config
    pub fn set_widget_config(&self, config: WidgetConfig) {
        self.state.lock().widget_config = config;
    }

    /// Serve this messaging config
    pub fn set_messaging_config(&self, config: MessagingConfig) {
        self.state.lock().messaging_config = config;
    }

    /// Serve this starter question config
    pub fn set_starter_questions(&self, config: StarterQuestionConfig) {
        self.state.lock().starter_questions = config;
    }

    /// Serve this stored transcript
    pub fn set_transcript(&self, entries: Vec<TranscriptEntry>) {
        self.state.lock().transcript = entries;
    }

    /// Always answer chat with `reply` instead of echoing
    pub fn set_chat_reply(&self, reply: impl Into<String>) {
        let reply = ChatReply {
            reply: reply.into(),
            ..Default::default()
        };
        self.state.lock().chat_reply = Some(reply);
    }

    /// Mark chat replies as FAQ-sourced
    pub fn set_used_faq(&self, used_faq: bool) {
        self.state.lock().used_faq = used_faq;
    }

    /// Make `endpoint` answer with HTTP `status` and `body`
    pub fn fail(&self, endpoint: Endpoint, status: u16, body: impl Into<String>) {
        self.state.lock().failures.insert(endpoint, (status, body.into()));
    }

    /// Stop failing `endpoint`
    pub fn recover(&self, endpoint: Endpoint) {
        self.state.lock().failures.remove(&endpoint);
    }

    /// Delay every response from `endpoint`
    pub fn set_delay(&self, endpoint: Endpoint, delay: Duration) {
        self.state.lock().delays.insert(endpoint, delay);
    }

    /// Answer `endpoint` immediately again
    pub fn clear_delay(&self, endpoint: Endpoint) {
        self.state.lock().delays.remove(&endpoint);
    }

    /// Every call made so far, in order
    #[must_use]
    pub fn calls(&self) -> Vec<ApiCall> {
        self.state.lock().calls.clone()
    }

    /// Number of calls made to `endpoint`
    #[must_use]
    pub fn count(&self, endpoint: Endpoint) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| c.endpoint() == endpoint)
            .count()
    }

    /// Record `call` and read its response, wait out any configured delay,
    /// then apply any failure
    async fn respond<T, F>(&self, call: ApiCall, read: F) -> WidgetResult<T>
    where
        T: Send,
        F: FnOnce(&MockState) -> T + Send,
    {
        let endpoint = call.endpoint();
        let (delay, response) = {
            let mut state = self.state.lock();
            state.calls.push(call);
            (state.delays.get(&endpoint).copied(), read(&*state))
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match self.state.lock().failures.get(&endpoint) {
            Some((status, body)) => Err(WidgetError::Http {
                status: *status,
                body: body.clone(),
            }),
            None => Ok(response),
        }
    }
}

#[async_trait]
impl WidgetApi for MockApi {
    fn name(&self) -> &str {
        "mock"
    }

    fn base_url(&self) -> &str {
        &self.base
    }

    async fn widget_config(&self) -> WidgetResult<WidgetConfig> {
        self.respond(ApiCall::WidgetConfig, |s| s.widget_config.clone())
            .await
    }

    async fn messaging_config(&self) -> WidgetResult<MessagingConfig> {
        self.respond(ApiCall::MessagingConfig, |s| s.messaging_config.clone())
            .await
    }

    async fn starter_questions(&self) -> WidgetResult<StarterQuestionConfig> {
        self.respond(ApiCall::StarterQuestions, |s| s.starter_questions.clone())
            .await
    }

    async fn messages(&self) -> WidgetResult<Vec<TranscriptEntry>> {
        self.respond(ApiCall::Messages, |s| s.transcript.clone())
            .await
    }

    async fn chat(&self, request: &ChatRequest) -> WidgetResult<ChatReply> {
        self.respond(ApiCall::Chat(request.clone()), |s| {
            let mut reply = s.chat_reply.clone().unwrap_or_else(|| ChatReply {
                reply: format!("You said: {}", request.message),
                ..Default::default()
            });
            reply.used_faq = s.used_faq;
            reply
        })
        .await
    }

    async fn submit_form(&self, values: &FormValues) -> WidgetResult<()> {
        self.respond(ApiCall::SubmitForm(values.clone()), |_| ()).await
    }

    async fn probe_avatar(&self, url: &str) -> WidgetResult<()> {
        self.respond(ApiCall::ProbeAvatar(url.to_string()), |_| ()).await
    }
}

#[async_trait]
impl AdminApi for MockApi {
    async fn save_widget_config(&self, config: &WidgetConfig) -> WidgetResult<()> {
        self.respond(ApiCall::SaveWidgetConfig(config.clone()), |_| ())
            .await?;
        self.set_widget_config(config.clone());
        Ok(())
    }

    async fn save_messaging_config(&self, config: &MessagingConfig) -> WidgetResult<()> {
        self.respond(ApiCall::SaveMessagingConfig(config.clone()), |_| ())
            .await?;
        self.set_messaging_config(config.clone());
        Ok(())
    }

    async fn save_starter_questions(&self, config: &StarterQuestionConfig) -> WidgetResult<()> {
        self.respond(ApiCall::SaveStarterQuestions(config.clone()), |_| ())
            .await?;
        self.set_starter_questions(config.clone());
        Ok(())
    }
}

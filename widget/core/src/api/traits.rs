//! Widget API Traits
//!
//! The widget never talks HTTP directly. Everything it needs from the server
//! goes through [`WidgetApi`], so the session core can run against the real
//! [`HttpApi`](super::HttpApi), an in-process mock, or any other transport.
//!
//! Admin saves live on a separate [`AdminApi`] trait: visitors' widgets have
//! no business writing configuration.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::WidgetResult;
use crate::models::{
    ChatReply, ChatRequest, MessagingConfig, StarterQuestionConfig, TranscriptEntry, WidgetConfig,
};

/// Values of the onboarding form, keyed by field name
pub type FormValues = BTreeMap<String, String>;

/// Visitor-facing widget API
#[async_trait]
pub trait WidgetApi: Send + Sync {
    /// Short name for logs (e.g. "http", "mock")
    fn name(&self) -> &str;

    /// API base URL, always ending in `/`
    fn base_url(&self) -> &str;

    /// `GET widget-config`
    async fn widget_config(&self) -> WidgetResult<WidgetConfig>;

    /// `GET messaging-config`
    async fn messaging_config(&self) -> WidgetResult<MessagingConfig>;

    /// `GET starter-questions`
    async fn starter_questions(&self) -> WidgetResult<StarterQuestionConfig>;

    /// `GET messages` for the current client identity
    async fn messages(&self) -> WidgetResult<Vec<TranscriptEntry>>;

    /// `POST chat`
    async fn chat(&self, request: &ChatRequest) -> WidgetResult<ChatReply>;

    /// `POST form/submit`
    async fn submit_form(&self, values: &FormValues) -> WidgetResult<()>;

    /// Check that `url` serves an image
    async fn probe_avatar(&self, url: &str) -> WidgetResult<()>;
}

/// Admin-side configuration saves
#[async_trait]
pub trait AdminApi: Send + Sync {
    /// `POST widget-config`
    async fn save_widget_config(&self, config: &WidgetConfig) -> WidgetResult<()>;

    /// `PUT messaging-config`
    async fn save_messaging_config(&self, config: &MessagingConfig) -> WidgetResult<()>;

    /// `PUT starter-questions`
    async fn save_starter_questions(&self, config: &StarterQuestionConfig) -> WidgetResult<()>;
}

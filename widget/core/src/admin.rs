//! Admin Publishing
//!
//! Saves configuration the way the admin console does, then tells every
//! widget sharing the local store to refresh by writing a fresh
//! `widget_config_version` marker.

use std::sync::Arc;

use crate::api::AdminApi;
use crate::error::WidgetResult;
use crate::models::{MessagingConfig, StarterQuestionConfig, WidgetConfig};
use crate::storage::LocalStore;

/// Saves config resources and signals open widgets
pub struct AdminClient<A: AdminApi> {
    api: Arc<A>,
    store: Arc<LocalStore>,
}

impl<A: AdminApi> AdminClient<A> {
    /// Create a publisher writing markers into `store`
    pub fn new(api: Arc<A>, store: Arc<LocalStore>) -> Self {
        Self { api, store }
    }

    /// Save widget config (`POST widget-config`)
    pub async fn save_widget_config(&self, config: &WidgetConfig) -> WidgetResult<()> {
        self.api.save_widget_config(config).await?;
        self.publish("widget-config").await
    }

    /// Save messaging config (`PUT messaging-config`)
    pub async fn save_messaging_config(&self, config: &MessagingConfig) -> WidgetResult<()> {
        self.api.save_messaging_config(config).await?;
        self.publish("messaging-config").await
    }

    /// Save starter questions (`PUT starter-questions`)
    pub async fn save_starter_questions(&self, config: &StarterQuestionConfig) -> WidgetResult<()> {
        self.api.save_starter_questions(config).await?;
        self.publish("starter-questions").await
    }

    /// Save a starter question list, dropping blank entries
    pub async fn publish_starters<I, S>(
        &self,
        enabled: bool,
        questions: I,
    ) -> WidgetResult<StarterQuestionConfig>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let config = StarterQuestionConfig {
            enabled,
            questions: questions
                .into_iter()
                .map(Into::into)
                .map(|q: String| q.trim().to_string())
                .filter(|q| !q.is_empty())
                .collect(),
        };
        self.save_starter_questions(&config).await?;
        Ok(config)
    }

    async fn publish(&self, resource: &str) -> WidgetResult<()> {
        let marker = self.store.bump_config_version().await?;
        tracing::info!(resource, marker = %marker, "Config saved, widgets notified");
        Ok(())
    }
}

//! Widget Client
//!
//! Thin wrapper around the widget core for TUI integration.
//! This client embeds the [`Widget`] directly (no network hop besides the
//! widget's own API calls) and provides a convenient interface for sending
//! events and receiving messages.
//!
//! # Architecture
//!
//! The TUI is a "thin client" - it doesn't contain any business logic.
//! All sequencing, chat, and config handling happens in the widget. The
//! TUI's job is:
//! 1. Convert terminal events to `WidgetEvent`s
//! 2. Send them to the widget
//! 3. Receive `WidgetMessage`s
//! 4. Render display state based on messages

use std::sync::Arc;

use tokio::sync::mpsc;

use widget_core::{
    LocalStore, Widget, WidgetApi, WidgetEvent, WidgetMessage, WidgetOptions, WidgetSnapshot,
};

/// Client for communicating with the embedded widget
pub struct WidgetClient<A: WidgetApi + 'static> {
    /// The embedded widget
    widget: Widget<A>,
    /// Receiver for messages from the widget
    rx: mpsc::Receiver<WidgetMessage>,
}

impl<A: WidgetApi + 'static> WidgetClient<A> {
    /// Create a client with an embedded, unmounted widget
    pub fn new(api: Arc<A>, store: Arc<LocalStore>, options: WidgetOptions) -> Self {
        let (tx, rx) = mpsc::channel(256);
        let widget = Widget::new(api, store, options, tx);
        Self { widget, rx }
    }

    /// Mount the widget (identity, initial config fetch)
    pub async fn mount(&mut self) {
        self.widget.mount().await;
    }

    /// Unmount the widget
    pub async fn unmount(&mut self) {
        self.widget.unmount().await;
    }

    /// Launcher activated
    pub async fn toggle_panel(&mut self) {
        self.widget.handle_event(WidgetEvent::TogglePanel).await;
    }

    /// Pointer over the closed launcher
    pub async fn launcher_hovered(&mut self) {
        self.widget.handle_event(WidgetEvent::LauncherHovered).await;
    }

    /// A form input changed
    pub async fn field_changed(&mut self, name: &str, value: &str) {
        self.widget
            .handle_event(WidgetEvent::field(name, value))
            .await;
    }

    /// Submit the onboarding form
    pub async fn submit_form(&mut self) {
        self.widget.handle_event(WidgetEvent::SubmitForm).await;
    }

    /// Pick a starter question
    pub async fn choose_starter(&mut self, question: String) {
        self.widget
            .handle_event(WidgetEvent::StarterChosen { question })
            .await;
    }

    /// Skip the starter questions
    pub async fn skip_starters(&mut self) {
        self.widget.handle_event(WidgetEvent::SkipStarters).await;
    }

    /// Send a chat message
    pub async fn send_message(&mut self, text: String) {
        self.widget
            .handle_event(WidgetEvent::SendMessage { text })
            .await;
    }

    /// Stop the in-flight chat request
    pub async fn cancel(&mut self) {
        self.widget.handle_event(WidgetEvent::CancelChat).await;
    }

    /// Refetch config now
    pub async fn refresh(&mut self) {
        self.widget.handle_event(WidgetEvent::RefreshConfig).await;
    }

    /// Process background results (must be called regularly)
    pub async fn poll(&mut self) -> bool {
        self.widget.poll().await
    }

    /// Receive all pending messages from the widget (non-blocking)
    pub fn recv_all(&mut self) -> Vec<WidgetMessage> {
        let mut messages = Vec::new();
        while let Ok(msg) = self.rx.try_recv() {
            messages.push(msg);
        }
        messages
    }

    /// Debug snapshot of the widget
    pub fn snapshot(&self) -> WidgetSnapshot {
        self.widget.snapshot()
    }
}

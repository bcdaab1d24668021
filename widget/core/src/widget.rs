//! Widget - The Session Core
//!
//! One [`Widget`] is one mounted chat widget. It owns:
//! - The last good server config and the refresh machinery
//! - The view sequencer position (form → starter questions → chat)
//! - The onboarding form draft and its submission
//! - The chat session (transcript + in-flight request)
//!
//! # Design Philosophy
//!
//! The widget is UI-agnostic. A surface feeds it [`WidgetEvent`]s and renders
//! the [`WidgetMessage`]s it sends back. Anything slow (HTTP calls, the poll
//! timer, storage signals) runs in background tasks that report into one
//! internal queue; the surface drains that queue by calling
//! [`Widget::poll`] every frame (or [`Widget::process_next`] when it has
//! nothing else to wait on). All state changes therefore happen on the
//! surface's task, one at a time.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::api::WidgetApi;
use crate::chat::{ChatCompletion, ChatSession, Transcript};
use crate::config::{WidgetSettings, DEFAULT_FORM_TIMEOUT, DEFAULT_POLL_INTERVAL};
use crate::error::WidgetResult;
use crate::events::WidgetEvent;
use crate::form::{self, FormDraft, SubmitState, SUBMIT_ERROR};
use crate::messages::{Appearance, SendMode, WidgetMessage};
use crate::models::TranscriptEntry;
use crate::refresh::{
    fetch_snapshot, watch_config_version, ConfigSnapshot, ConfigState, Poller, RefreshGuard,
    RefreshTrigger,
};
use crate::sequencer::{transition, Gate, View, ViewEvent};
use crate::storage::{ClientIdentity, LocalStore, OnboardingProgress};

/// Per-mount widget options
#[derive(Clone, Debug)]
pub struct WidgetOptions {
    /// Header title when the server sends no bot name
    pub title: String,
    /// Config poll interval while the panel is open
    pub poll_interval: Duration,
    /// Client-side form submission deadline
    pub form_submit_timeout: Duration,
}

impl Default for WidgetOptions {
    fn default() -> Self {
        Self {
            title: "ChatBot".to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            form_submit_timeout: DEFAULT_FORM_TIMEOUT,
        }
    }
}

impl WidgetOptions {
    /// Options from resolved settings
    #[must_use]
    pub fn from_settings(settings: &WidgetSettings) -> Self {
        Self {
            title: settings.title.clone(),
            poll_interval: settings.poll_interval,
            form_submit_timeout: settings.form_submit_timeout,
        }
    }
}

/// Results reported by background tasks
#[derive(Debug)]
enum Internal {
    Refresh(RefreshTrigger),
    RefreshDone {
        seq: u64,
        trigger: RefreshTrigger,
        snapshot: ConfigSnapshot,
    },
    Chat(ChatCompletion),
    TranscriptLoaded(WidgetResult<Vec<TranscriptEntry>>),
    FormDone(WidgetResult<()>),
}

/// Point-in-time view of a widget, for debugging and tests
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WidgetSnapshot {
    /// Mounted and accepting events
    pub mounted: bool,
    /// Persisted client identity
    pub client_id: Option<String>,
    /// Panel open
    pub panel_open: bool,
    /// Current screen (`None` until the panel is first opened)
    pub view: Option<View>,
    /// `chatbot_form_submitted` flag
    pub form_submitted: bool,
    /// `chatbot_starter_seen` flag
    pub starter_seen: bool,
    /// A chat request is in flight
    pub chat_busy: bool,
    /// Chat input accepted (transcript loaded)
    pub chat_ready: bool,
    /// Transcript length
    pub transcript_len: usize,
    /// Form submission in flight
    pub form_submitting: bool,
    /// Config poller running
    pub polling: bool,
    /// Sequence of the last applied config refresh
    pub config_seq: u64,
}

/// A mounted chat widget
pub struct Widget<A: WidgetApi> {
    /// Server API
    api: Arc<A>,
    /// Shared local store
    store: Arc<LocalStore>,
    /// Onboarding flags view over the store
    progress: OnboardingProgress,
    /// Options
    options: WidgetOptions,
    /// Client identity (set on mount)
    identity: Option<ClientIdentity>,
    /// Mounted and not yet unmounted
    mounted: bool,
    /// Last good config
    config: ConfigState,
    /// Refresh sequence numbers
    refresh: RefreshGuard,
    /// `open_by_default` already honoured
    opened_by_default: bool,
    /// Panel open
    panel_open: bool,
    /// Current screen
    view: Option<View>,
    /// Onboarding form answers
    form: FormDraft,
    /// Onboarding form submission state
    form_state: SubmitState,
    /// Transcript and in-flight request
    chat: ChatSession,
    /// Poll timer while open
    poller: Poller,
    /// Storage signal watcher
    storage_watch: Option<JoinHandle<()>>,
    /// Channel to the surface
    tx: mpsc::Sender<WidgetMessage>,
    /// Background task results
    internal_tx: mpsc::UnboundedSender<Internal>,
    internal_rx: mpsc::UnboundedReceiver<Internal>,
}

impl<A: WidgetApi + 'static> Widget<A> {
    /// Create an unmounted widget
    pub fn new(
        api: Arc<A>,
        store: Arc<LocalStore>,
        options: WidgetOptions,
        tx: mpsc::Sender<WidgetMessage>,
    ) -> Self {
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        let poller = Poller::new(options.poll_interval);
        Self {
            api,
            progress: OnboardingProgress::new(store.clone()),
            store,
            options,
            identity: None,
            mounted: false,
            config: ConfigState::default(),
            refresh: RefreshGuard::default(),
            opened_by_default: false,
            panel_open: false,
            view: None,
            form: FormDraft::default(),
            form_state: SubmitState::Idle,
            chat: ChatSession::new(String::new()),
            poller,
            storage_watch: None,
            tx,
            internal_tx,
            internal_rx,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Whether the widget is mounted
    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// Whether the panel is open
    pub fn is_panel_open(&self) -> bool {
        self.panel_open
    }

    /// Current screen
    pub fn view(&self) -> Option<View> {
        self.view
    }

    /// Conversation so far
    pub fn transcript(&self) -> &Transcript {
        self.chat.transcript()
    }

    /// Last good config
    pub fn config(&self) -> &ConfigState {
        &self.config
    }

    /// Form submission state
    pub fn form_state(&self) -> &SubmitState {
        &self.form_state
    }

    /// Debug snapshot of the widget's state
    pub fn snapshot(&self) -> WidgetSnapshot {
        WidgetSnapshot {
            mounted: self.mounted,
            client_id: self.identity.as_ref().map(|i| i.0.clone()),
            panel_open: self.panel_open,
            view: self.view,
            form_submitted: self.progress.form_submitted(),
            starter_seen: self.progress.starter_seen(),
            chat_busy: self.chat.is_busy(),
            chat_ready: self.chat.accepts_input(),
            transcript_len: self.chat.transcript().len(),
            form_submitting: self.form_state.is_submitting(),
            polling: self.poller.is_running(),
            config_seq: self.refresh.applied(),
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Mount: load identity, fetch config, start watching the store
    ///
    /// The initial config fetch completes before this returns, so the first
    /// panel open is gated on real config (or defaults, if the fetch failed).
    pub async fn mount(&mut self) {
        if self.mounted {
            return;
        }

        let identity = ClientIdentity::load_or_create(&self.store).await;
        self.chat = ChatSession::new(identity.as_str());
        tracing::info!(client_id = %identity, api = self.api.name(), "Widget mounting");
        self.send(WidgetMessage::Mounted {
            client_id: identity.0.clone(),
        })
        .await;
        self.identity = Some(identity);
        self.mounted = true;

        let tx = self.internal_tx.clone();
        self.storage_watch = Some(watch_config_version(&self.store, move || {
            tx.send(Internal::Refresh(RefreshTrigger::StorageSignal))
                .is_ok()
        }));

        self.send(WidgetMessage::PanelState { open: false }).await;

        let seq = self.refresh.issue();
        let snapshot = fetch_snapshot(&*self.api, self.config.avatar_url.as_deref()).await;
        self.apply_refresh(seq, RefreshTrigger::Initial, snapshot)
            .await;
    }

    /// Unmount: stop the poller, the watcher, and any in-flight request
    pub async fn unmount(&mut self) {
        if !self.mounted {
            return;
        }
        self.mounted = false;
        self.panel_open = false;
        self.poller.stop();
        if let Some(watch) = self.storage_watch.take() {
            watch.abort();
        }
        // Dropping the session aborts its request
        self.chat = ChatSession::new(String::new());
        self.view = None;
        self.form = FormDraft::new(self.config.widget.fields.clone());
        self.form_state = SubmitState::Idle;
        self.opened_by_default = false;
        self.send(WidgetMessage::Unmounted).await;
        tracing::info!("Widget unmounted");
    }

    // ========================================================================
    // Event Handling
    // ========================================================================

    /// Handle an event from the surface
    pub async fn handle_event(&mut self, event: WidgetEvent) {
        if !self.mounted {
            tracing::debug!(?event, "Ignoring event for unmounted widget");
            return;
        }

        match event {
            WidgetEvent::TogglePanel => {
                if self.panel_open {
                    self.close_panel().await;
                } else {
                    self.open_panel().await;
                }
            }
            WidgetEvent::OpenPanel => self.open_panel().await,
            WidgetEvent::ClosePanel => self.close_panel().await,
            WidgetEvent::LauncherHovered => {
                if !self.panel_open {
                    self.show_welcome().await;
                }
            }

            WidgetEvent::FieldChanged { name, value } => self.form.set(&name, value),
            WidgetEvent::SubmitForm => self.submit_form().await,

            WidgetEvent::StarterChosen { question } => self.choose_starter(question).await,
            WidgetEvent::SkipStarters => self.skip_starters().await,

            WidgetEvent::SendMessage { text } => self.send_chat(&text).await,
            WidgetEvent::CancelChat => {
                if let Some(entry) = self.chat.cancel() {
                    self.chat_finished(entry).await;
                }
            }

            WidgetEvent::RefreshConfig => self.start_refresh(RefreshTrigger::Manual),
        }
    }

    /// Process every background result that is ready
    ///
    /// Call this regularly (e.g. once per frame). Returns true if there was
    /// activity.
    pub async fn poll(&mut self) -> bool {
        let mut active = false;
        while let Ok(item) = self.internal_rx.try_recv() {
            self.process(item).await;
            active = true;
        }
        active
    }

    /// Wait for the next background result and process it
    ///
    /// Not cancel-safe once a result has been received; do not race it in
    /// `select!` against other work.
    pub async fn process_next(&mut self) -> bool {
        match self.internal_rx.recv().await {
            Some(item) => {
                self.process(item).await;
                true
            }
            None => false,
        }
    }

    async fn process(&mut self, item: Internal) {
        match item {
            Internal::Refresh(trigger) => self.start_refresh(trigger),
            Internal::RefreshDone {
                seq,
                trigger,
                snapshot,
            } => self.apply_refresh(seq, trigger, snapshot).await,
            Internal::Chat(completion) => {
                if let Some(entry) = self
                    .chat
                    .complete(completion, self.config.messaging.server_error())
                {
                    self.chat_finished(entry).await;
                }
            }
            Internal::TranscriptLoaded(result) => self.finish_transcript_load(result).await,
            Internal::FormDone(result) => self.finish_form(result).await,
        }
    }

    // ========================================================================
    // Panel & Views
    // ========================================================================

    async fn open_panel(&mut self) {
        if self.panel_open {
            return;
        }
        self.panel_open = true;
        self.send(WidgetMessage::PanelState { open: true }).await;

        let tx = self.internal_tx.clone();
        self.poller
            .start(move || tx.send(Internal::Refresh(RefreshTrigger::Poll)).is_ok());
        let _ = self
            .internal_tx
            .send(Internal::Refresh(RefreshTrigger::PanelOpened));

        let next = transition(self.view, ViewEvent::PanelOpened, &self.gate());
        self.enter_view(next).await;
    }

    async fn close_panel(&mut self) {
        if !self.panel_open {
            return;
        }
        self.panel_open = false;
        self.poller.stop();
        self.send(WidgetMessage::PanelState { open: false }).await;
    }

    fn gate(&self) -> Gate {
        Gate::capture(&self.progress, &self.config.widget, &self.config.starters)
    }

    async fn enter_view(&mut self, view: View) {
        let previous = self.view.replace(view);
        self.send(WidgetMessage::ViewChanged { view }).await;
        if previous == Some(view) {
            return;
        }
        tracing::debug!(from = ?previous, to = ?view, "View changed");

        match view {
            View::Form => {
                self.send(WidgetMessage::FormFields {
                    fields: self.form.fields().to_vec(),
                })
                .await;
                self.send_form_status().await;
            }
            View::StarterQuestions => {
                self.send(WidgetMessage::StarterQuestions {
                    questions: self.config.starters.visible_questions(),
                })
                .await;
            }
            View::Chat => self.enter_chat().await,
        }
    }

    async fn show_welcome(&self) {
        if let Some(text) = self.config.messaging.welcome() {
            self.send(WidgetMessage::Welcome {
                text: text.to_string(),
            })
            .await;
        }
    }

    // ========================================================================
    // Onboarding Form
    // ========================================================================

    async fn submit_form(&mut self) {
        if self.view != Some(View::Form) || self.form_state.is_submitting() {
            return;
        }

        let values = match self.form.validate() {
            Ok(values) => values,
            Err(violation) => {
                self.send(WidgetMessage::FieldInvalid {
                    field: violation.field,
                    message: violation.violation.message().to_string(),
                })
                .await;
                return;
            }
        };

        self.form_state = SubmitState::Submitting;
        self.send_form_status().await;

        let api = self.api.clone();
        let tx = self.internal_tx.clone();
        let deadline = self.options.form_submit_timeout;
        tokio::spawn(async move {
            let result = form::submit(&*api, &values, deadline).await;
            let _ = tx.send(Internal::FormDone(result));
        });
    }

    async fn finish_form(&mut self, result: WidgetResult<()>) {
        match result {
            Ok(()) => {
                if let Err(e) = self.progress.mark_form_submitted().await {
                    tracing::warn!(error = %e, "Could not persist form submission flag");
                }
                self.form_state = SubmitState::Idle;
                self.send_form_status().await;

                let next = transition(self.view, ViewEvent::FormSubmitted, &self.gate());
                self.enter_view(next).await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Form submission failed");
                self.form_state = SubmitState::Failed(SUBMIT_ERROR.to_string());
                self.send_form_status().await;
            }
        }
    }

    async fn send_form_status(&self) {
        self.send(WidgetMessage::FormStatus {
            submitting: self.form_state.is_submitting(),
            label: self.form_state.label().to_string(),
            error: self.form_state.error().map(str::to_string),
        })
        .await;
    }

    // ========================================================================
    // Starter Questions
    // ========================================================================

    async fn choose_starter(&mut self, question: String) {
        if self.view != Some(View::StarterQuestions) {
            return;
        }
        self.mark_starter_seen().await;
        self.chat.queue_after_load(question);

        let next = transition(self.view, ViewEvent::StarterChosen, &self.gate());
        self.enter_view(next).await;
    }

    async fn skip_starters(&mut self) {
        if self.view != Some(View::StarterQuestions) {
            return;
        }
        self.mark_starter_seen().await;

        let next = transition(self.view, ViewEvent::StarterSkipped, &self.gate());
        self.enter_view(next).await;
    }

    async fn mark_starter_seen(&self) {
        if let Err(e) = self.progress.mark_starter_seen().await {
            tracing::warn!(error = %e, "Could not persist starter question flag");
        }
    }

    // ========================================================================
    // Chat
    // ========================================================================

    async fn enter_chat(&mut self) {
        if self.chat.load_started() {
            return;
        }
        self.chat.begin_load();
        self.send(WidgetMessage::InputEnabled { enabled: false })
            .await;

        let api = self.api.clone();
        let tx = self.internal_tx.clone();
        tokio::spawn(async move {
            let result = api.messages().await;
            let _ = tx.send(Internal::TranscriptLoaded(result));
        });
    }

    async fn finish_transcript_load(&mut self, result: WidgetResult<Vec<TranscriptEntry>>) {
        let entries = result.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to load transcript");
            Vec::new()
        });

        let pending = self.chat.finish_load(entries);
        self.send(WidgetMessage::TranscriptReplaced {
            entries: self.chat.transcript().entries().to_vec(),
        })
        .await;
        self.send(WidgetMessage::InputEnabled { enabled: true })
            .await;

        if let Some(text) = pending {
            self.send_chat(&text).await;
        }
    }

    async fn send_chat(&mut self, text: &str) {
        if self.view != Some(View::Chat) {
            return;
        }
        if !self.chat.accepts_input() {
            tracing::debug!("Transcript still loading, ignoring send");
            return;
        }

        let tx = self.internal_tx.clone();
        let started = self.chat.send(self.api.clone(), text, move |completion| {
            let _ = tx.send(Internal::Chat(completion));
        });

        if let Some(entry) = started {
            self.send(WidgetMessage::EntryAppended { entry }).await;
            self.send(WidgetMessage::Typing { visible: true }).await;
            self.send(WidgetMessage::SendMode {
                mode: SendMode::Cancel,
            })
            .await;
        }
    }

    /// Shared tail of reply, failure, and cancel
    async fn chat_finished(&mut self, entry: TranscriptEntry) {
        self.send(WidgetMessage::Typing { visible: false }).await;
        self.send(WidgetMessage::EntryAppended { entry }).await;
        self.send(WidgetMessage::SendMode {
            mode: SendMode::Send,
        })
        .await;
    }

    // ========================================================================
    // Config Refresh
    // ========================================================================

    fn start_refresh(&mut self, trigger: RefreshTrigger) {
        let seq = self.refresh.issue();
        let api = self.api.clone();
        let tx = self.internal_tx.clone();
        let current_avatar = self.config.avatar_url.clone();
        tracing::debug!(seq, ?trigger, "Config refresh started");

        tokio::spawn(async move {
            let snapshot = fetch_snapshot(&*api, current_avatar.as_deref()).await;
            let _ = tx.send(Internal::RefreshDone {
                seq,
                trigger,
                snapshot,
            });
        });
    }

    async fn apply_refresh(&mut self, seq: u64, trigger: RefreshTrigger, snapshot: ConfigSnapshot) {
        if !self.refresh.accept(seq) {
            tracing::debug!(seq, applied = self.refresh.applied(), "Discarding stale config refresh");
            return;
        }

        let changes = self.config.apply(snapshot);
        let initial = trigger == RefreshTrigger::Initial;
        tracing::debug!(seq, ?trigger, ?changes, "Config applied");

        if changes.appearance() || initial {
            self.send(WidgetMessage::Appearance(Appearance::from_config(
                &self.config.widget,
                self.config.avatar_url.as_deref(),
                &self.options.title,
            )))
            .await;
        }

        if changes.widget {
            self.form.set_fields(self.config.widget.fields.clone());
            if self.view == Some(View::Form) {
                self.send(WidgetMessage::FormFields {
                    fields: self.form.fields().to_vec(),
                })
                .await;
            }
        }

        if changes.starters && self.view == Some(View::StarterQuestions) {
            self.send(WidgetMessage::StarterQuestions {
                questions: self.config.starters.visible_questions(),
            })
            .await;
        }

        if !self.opened_by_default && self.config.widget.open_by_default == Some(true) {
            self.opened_by_default = true;
            self.open_panel().await;
        }

        if (changes.messaging || initial) && !self.panel_open {
            self.show_welcome().await;
        }
    }

    /// Send a message to the surface
    async fn send(&self, msg: WidgetMessage) {
        if let Err(e) = self.tx.send(msg).await {
            tracing::warn!("Failed to send message to surface: {}", e);
        }
    }
}

impl<A: WidgetApi> Drop for Widget<A> {
    fn drop(&mut self) {
        if let Some(watch) = self.storage_watch.take() {
            watch.abort();
        }
    }
}

//! Chat Request Lifecycle
//!
//! [`ChatSession`] owns the conversation transcript and the single in-flight
//! chat request. Each request runs as its own tokio task; the task's
//! [`AbortHandle`] is the cancellation token, and a per-request sequence
//! number lets late results from an aborted task be recognised and dropped.
//!
//! Every exit (reply, error, cancel) goes through one cleanup step, so the
//! in-flight slot is always cleared and the send control always comes back.

use std::sync::Arc;

use tokio::task::AbortHandle;

use crate::api::WidgetApi;
use crate::error::{WidgetError, WidgetResult};
use crate::models::{ChatReply, ChatRequest, TranscriptEntry};

/// Assistant entry appended when the visitor stops a request
pub const STOPPED_TEXT: &str = "(stopped)";
/// Prefix for replies sourced from FAQ content
pub const FAQ_PREFIX: &str = "📚 ";

/// Ordered conversation entries
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    /// Replace every entry (used on chat entry)
    pub fn replace(&mut self, entries: Vec<TranscriptEntry>) {
        self.entries = entries;
    }

    /// Append one entry
    pub fn push(&mut self, entry: TranscriptEntry) {
        self.entries.push(entry);
    }

    /// All entries in order
    #[must_use]
    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    /// The newest entry
    #[must_use]
    pub fn last(&self) -> Option<&TranscriptEntry> {
        self.entries.last()
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The one chat request allowed in flight
#[derive(Debug)]
pub struct InFlightChat {
    /// Request sequence number
    pub seq: u64,
    handle: AbortHandle,
}

/// Outcome reported by a chat task
#[derive(Debug)]
pub struct ChatCompletion {
    /// Sequence number of the request
    pub seq: u64,
    /// Reply or failure
    pub result: WidgetResult<ChatReply>,
}

/// Where the transcript load stands for this mount
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum LoadState {
    #[default]
    NotLoaded,
    Loading,
    Ready,
}

/// Transcript + in-flight request state for one mount
#[derive(Debug)]
pub struct ChatSession {
    client_id: String,
    transcript: Transcript,
    in_flight: Option<InFlightChat>,
    next_seq: u64,
    load: LoadState,
    pending: Option<String>,
}

impl ChatSession {
    /// New session for `client_id`
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            transcript: Transcript::default(),
            in_flight: None,
            next_seq: 0,
            load: LoadState::NotLoaded,
            pending: None,
        }
    }

    /// Conversation so far
    #[must_use]
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Whether a request is in flight
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Whether input is accepted (transcript loaded)
    #[must_use]
    pub fn accepts_input(&self) -> bool {
        self.load == LoadState::Ready
    }

    /// Whether the transcript load has been started for this mount
    #[must_use]
    pub fn load_started(&self) -> bool {
        self.load != LoadState::NotLoaded
    }

    /// Mark the transcript load as started; input is refused until it ends
    pub fn begin_load(&mut self) {
        self.load = LoadState::Loading;
    }

    /// Queue `text` to be sent as soon as the transcript load finishes
    pub fn queue_after_load(&mut self, text: impl Into<String>) {
        self.pending = Some(text.into());
    }

    /// Finish the transcript load, replacing local entries
    ///
    /// Returns the queued message, if any, for the caller to send now.
    pub fn finish_load(&mut self, entries: Vec<TranscriptEntry>) -> Option<String> {
        self.transcript.replace(entries);
        self.load = LoadState::Ready;
        self.pending.take()
    }

    /// Start a chat request
    ///
    /// No-op (returns `None`) if `text` is blank, input is not yet accepted,
    /// or a request is already in flight. Otherwise appends the user entry,
    /// spawns the request, and returns the appended entry. `on_done` is
    /// invoked from the task with the outcome unless the task is aborted.
    pub fn send<A, F>(&mut self, api: Arc<A>, text: &str, on_done: F) -> Option<TranscriptEntry>
    where
        A: WidgetApi + ?Sized + 'static,
        F: FnOnce(ChatCompletion) + Send + 'static,
    {
        let text = text.trim();
        if text.is_empty() || self.is_busy() || !self.accepts_input() {
            return None;
        }

        let entry = TranscriptEntry::user(text);
        self.transcript.push(entry.clone());

        self.next_seq += 1;
        let seq = self.next_seq;
        let request = ChatRequest {
            message: text.to_string(),
            client_id: self.client_id.clone(),
        };

        let task = tokio::spawn(async move {
            let result = api.chat(&request).await;
            on_done(ChatCompletion { seq, result });
        });
        tracing::debug!(seq, "Chat request started");

        self.in_flight = Some(InFlightChat {
            seq,
            handle: task.abort_handle(),
        });
        Some(entry)
    }

    /// Stop the in-flight request
    ///
    /// No-op (returns `None`) if nothing is in flight. Otherwise aborts the
    /// task, appends and returns the `(stopped)` entry.
    pub fn cancel(&mut self) -> Option<TranscriptEntry> {
        let in_flight = self.finish()?;
        in_flight.handle.abort();
        tracing::debug!(seq = in_flight.seq, "Chat request cancelled");

        let entry = TranscriptEntry::assistant(STOPPED_TEXT);
        self.transcript.push(entry.clone());
        Some(entry)
    }

    /// Apply a task outcome
    ///
    /// Outcomes for anything but the current request are stale and ignored
    /// (`None`). Otherwise appends and returns the assistant entry: the
    /// reply text, `server_error` on failure when configured, or
    /// `Error: <err>`.
    pub fn complete(
        &mut self,
        completion: ChatCompletion,
        server_error: Option<&str>,
    ) -> Option<TranscriptEntry> {
        let current = self.in_flight.as_ref().map(|f| f.seq);
        if current != Some(completion.seq) {
            tracing::debug!(seq = completion.seq, ?current, "Discarding stale chat outcome");
            return None;
        }
        self.finish();

        let text = match completion.result {
            Ok(reply) => reply_text(&reply),
            Err(WidgetError::Cancelled) => STOPPED_TEXT.to_string(),
            Err(e) => {
                tracing::warn!(seq = completion.seq, error = %e, "Chat request failed");
                failure_text(&e, server_error)
            }
        };

        let entry = TranscriptEntry::assistant(text);
        self.transcript.push(entry.clone());
        Some(entry)
    }

    /// The single cleanup step shared by every exit
    fn finish(&mut self) -> Option<InFlightChat> {
        self.in_flight.take()
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        if let Some(in_flight) = self.in_flight.take() {
            in_flight.handle.abort();
        }
    }
}

/// Display text for a successful reply
#[must_use]
pub fn reply_text(reply: &ChatReply) -> String {
    if reply.used_faq {
        format!("{FAQ_PREFIX}{}", reply.reply)
    } else {
        reply.reply.clone()
    }
}

/// Display text for a failed request
#[must_use]
pub fn failure_text(error: &WidgetError, server_error: Option<&str>) -> String {
    match server_error {
        Some(msg) => msg.to_string(),
        None => format!("Error: {error}"),
    }
}

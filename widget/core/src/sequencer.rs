//! View Sequencer
//!
//! Decides which screen the panel shows: the onboarding form, the starter
//! questions, or the chat. The decision is a pure function of the current
//! view, the triggering [`ViewEvent`], and a [`Gate`] snapshot of persisted
//! flags and config, so it can be tested without any I/O.
//!
//! ```text
//!   PanelOpened ──► Form? ──FormSubmitted──► StarterQuestions? ──Chosen/Skipped──► Chat
//!                     │                            ▲   │                            ▲
//!                     └──── form not needed ───────┘   └──── starters not needed ───┘
//! ```
//!
//! Once a mount reaches [`View::Chat`] it stays there.

use serde::{Deserialize, Serialize};

use crate::models::{StarterQuestionConfig, WidgetConfig};
use crate::storage::OnboardingProgress;

/// The screen shown inside the open panel
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum View {
    /// Onboarding form
    Form,
    /// Starter question picker
    StarterQuestions,
    /// Conversation
    Chat,
}

impl View {
    /// Human-readable name
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Form => "form",
            Self::StarterQuestions => "starter questions",
            Self::Chat => "chat",
        }
    }
}

/// Something that may move the sequencer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViewEvent {
    /// The visitor opened the panel
    PanelOpened,
    /// The onboarding form was accepted by the server
    FormSubmitted,
    /// A starter question was picked
    StarterChosen,
    /// The starter screen was skipped
    StarterSkipped,
}

/// Inputs the sequencer gates on
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Gate {
    /// `chatbot_form_submitted == "true"`
    pub form_submitted: bool,
    /// `chatbot_starter_seen == "true"`
    pub starter_seen: bool,
    /// Server enabled the form
    pub form_enabled: bool,
    /// The form has at least one field
    pub has_fields: bool,
    /// Server enabled starter questions
    pub starters_enabled: bool,
    /// At least one non-blank starter question exists
    pub has_questions: bool,
}

impl Gate {
    /// Snapshot the gate from persisted flags and the last good config
    #[must_use]
    pub fn capture(
        progress: &OnboardingProgress,
        widget: &WidgetConfig,
        starters: &StarterQuestionConfig,
    ) -> Self {
        Self {
            form_submitted: progress.form_submitted(),
            starter_seen: progress.starter_seen(),
            form_enabled: widget.form_enabled,
            has_fields: !widget.fields.is_empty(),
            starters_enabled: starters.enabled,
            has_questions: !starters.visible_questions().is_empty(),
        }
    }

    fn needs_form(&self) -> bool {
        !self.form_submitted && self.form_enabled && self.has_fields
    }

    fn needs_starters(&self) -> bool {
        !self.starter_seen && self.starters_enabled && self.has_questions
    }
}

/// Compute the next view
#[must_use]
pub fn transition(current: Option<View>, event: ViewEvent, gate: &Gate) -> View {
    if current == Some(View::Chat) {
        return View::Chat;
    }

    match event {
        ViewEvent::PanelOpened => {
            if gate.needs_form() {
                View::Form
            } else {
                after_form(gate)
            }
        }
        ViewEvent::FormSubmitted => after_form(gate),
        ViewEvent::StarterChosen | ViewEvent::StarterSkipped => View::Chat,
    }
}

fn after_form(gate: &Gate) -> View {
    if gate.needs_starters() {
        View::StarterQuestions
    } else {
        View::Chat
    }
}

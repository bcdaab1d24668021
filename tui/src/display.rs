//! Display State Types
//!
//! Types that represent the current display state for the TUI.
//! These are derived from `WidgetMessage`s and used for rendering.
//!
//! # Design Philosophy
//!
//! The TUI is a "thin client" - it just renders what the widget tells it to.
//! Display state is the bridge between `WidgetMessage`s and rendering. The
//! only state kept here that the widget never sends is purely presentational:
//! which form field has focus, which starter question is highlighted, and
//! how long the form error stays visible.

use std::collections::BTreeMap;
use std::time::Duration;

use widget_core::form::{SUBMIT_ERROR_TTL, SUBMIT_LABEL};
use widget_core::{Appearance, FormField, SendMode, TranscriptEntry, View, WidgetMessage};

/// A message that disappears after a while
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimedText {
    /// Text to show
    pub text: String,
    /// Time left on screen
    pub remaining: Duration,
}

impl TimedText {
    fn new(text: String, ttl: Duration) -> Self {
        Self {
            text,
            remaining: ttl,
        }
    }
}

/// Onboarding form as rendered
#[derive(Clone, Debug)]
pub struct DisplayForm {
    /// Fields in display order
    pub fields: Vec<FormField>,
    /// What the visitor typed, by field name
    pub values: BTreeMap<String, String>,
    /// Focused field index (`fields.len()` = the submit control)
    pub focus: usize,
    /// Submission in flight
    pub submitting: bool,
    /// Submit control label
    pub label: String,
    /// Inline error after a failed submission
    pub error: Option<TimedText>,
    /// Field that blocked submission, with its message
    pub invalid: Option<(String, String)>,
}

impl Default for DisplayForm {
    fn default() -> Self {
        Self {
            fields: Vec::new(),
            values: BTreeMap::new(),
            focus: 0,
            submitting: false,
            label: SUBMIT_LABEL.to_string(),
            error: None,
            invalid: None,
        }
    }
}

impl DisplayForm {
    /// Replace the field list, keeping answers for fields that remain
    pub fn set_fields(&mut self, fields: Vec<FormField>) {
        self.values
            .retain(|name, _| fields.iter().any(|f| &f.name == name));
        self.fields = fields;
        self.focus = self.focus.min(self.fields.len());
    }

    /// The focused field, unless the submit control has focus
    pub fn focused_field(&self) -> Option<&FormField> {
        self.fields.get(self.focus)
    }

    /// Whether the submit control has focus
    pub fn submit_focused(&self) -> bool {
        self.focus >= self.fields.len()
    }

    /// Current answer for `name`
    pub fn value(&self, name: &str) -> &str {
        self.values.get(name).map_or("", String::as_str)
    }

    /// Move focus forward, wrapping past the submit control
    pub fn focus_next(&mut self) {
        self.focus = (self.focus + 1) % (self.fields.len() + 1);
    }

    /// Move focus backward, wrapping
    pub fn focus_prev(&mut self) {
        let slots = self.fields.len() + 1;
        self.focus = (self.focus + slots - 1) % slots;
    }

    /// Type into the focused field; returns the field's new `(name, value)`
    pub fn input(&mut self, c: char) -> Option<(String, String)> {
        let name = self.focused_field()?.name.clone();
        let value = self.values.entry(name.clone()).or_default();
        value.push(c);
        Some((name, value.clone()))
    }

    /// Delete from the focused field; returns the field's new `(name, value)`
    pub fn backspace(&mut self) -> Option<(String, String)> {
        let name = self.focused_field()?.name.clone();
        let value = self.values.entry(name.clone()).or_default();
        value.pop();
        Some((name, value.clone()))
    }
}

/// Starter question list as rendered
#[derive(Clone, Debug, Default)]
pub struct DisplayStarters {
    /// Questions in order
    pub questions: Vec<String>,
    /// Highlighted question
    pub cursor: usize,
}

impl DisplayStarters {
    fn set(&mut self, questions: Vec<String>) {
        self.cursor = self.cursor.min(questions.len().saturating_sub(1));
        self.questions = questions;
    }

    /// Highlight the next question
    pub fn select_next(&mut self) {
        if self.cursor + 1 < self.questions.len() {
            self.cursor += 1;
        }
    }

    /// Highlight the previous question
    pub fn select_prev(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    /// The highlighted question
    pub fn selected(&self) -> Option<&str> {
        self.questions.get(self.cursor).map(String::as_str)
    }
}

/// Complete display state
#[derive(Clone, Debug)]
pub struct DisplayState {
    /// Widget mounted
    pub mounted: bool,
    /// Persisted client identity
    pub client_id: Option<String>,
    /// Panel open
    pub panel_open: bool,
    /// Header and launcher appearance
    pub appearance: Appearance,
    /// Welcome tooltip next to the closed launcher
    pub welcome: Option<String>,
    /// Current screen
    pub view: Option<View>,
    /// Onboarding form
    pub form: DisplayForm,
    /// Starter questions
    pub starters: DisplayStarters,
    /// Conversation
    pub transcript: Vec<TranscriptEntry>,
    /// Typing indicator
    pub typing: bool,
    /// Send control mode
    pub send_mode: SendMode,
    /// Chat input accepts text
    pub input_enabled: bool,
}

impl Default for DisplayState {
    fn default() -> Self {
        Self::new()
    }
}

impl DisplayState {
    /// Create new display state
    pub fn new() -> Self {
        Self {
            mounted: false,
            client_id: None,
            panel_open: false,
            appearance: Appearance::default(),
            welcome: None,
            view: None,
            form: DisplayForm::default(),
            starters: DisplayStarters::default(),
            transcript: Vec::new(),
            typing: false,
            send_mode: SendMode::Send,
            input_enabled: false,
        }
    }

    /// Apply a message from the widget
    pub fn apply_message(&mut self, msg: WidgetMessage) {
        match msg {
            WidgetMessage::Mounted { client_id } => {
                self.mounted = true;
                self.client_id = Some(client_id);
            }
            WidgetMessage::Unmounted => {
                self.mounted = false;
                self.panel_open = false;
                self.typing = false;
            }

            WidgetMessage::PanelState { open } => {
                self.panel_open = open;
                if open {
                    self.welcome = None;
                }
            }
            WidgetMessage::Appearance(appearance) => {
                self.appearance = appearance;
            }
            WidgetMessage::Welcome { text } => {
                if !self.panel_open {
                    self.welcome = Some(text);
                }
            }
            WidgetMessage::ViewChanged { view } => {
                self.view = Some(view);
            }

            WidgetMessage::FormFields { fields } => {
                self.form.set_fields(fields);
            }
            WidgetMessage::FormStatus {
                submitting,
                label,
                error,
            } => {
                self.form.submitting = submitting;
                self.form.label = label;
                if submitting {
                    self.form.error = None;
                    self.form.invalid = None;
                } else if let Some(text) = error {
                    self.form.error = Some(TimedText::new(text, SUBMIT_ERROR_TTL));
                }
            }
            WidgetMessage::FieldInvalid { field, message } => {
                if let Some(idx) = self.form.fields.iter().position(|f| f.name == field) {
                    self.form.focus = idx;
                }
                self.form.invalid = Some((field, message));
            }

            WidgetMessage::StarterQuestions { questions } => {
                self.starters.set(questions);
            }

            WidgetMessage::TranscriptReplaced { entries } => {
                self.transcript = entries;
            }
            WidgetMessage::EntryAppended { entry } => {
                self.transcript.push(entry);
            }
            WidgetMessage::Typing { visible } => {
                self.typing = visible;
            }
            WidgetMessage::SendMode { mode } => {
                self.send_mode = mode;
            }
            WidgetMessage::InputEnabled { enabled } => {
                self.input_enabled = enabled;
            }
        }
    }

    /// Update timers (call each frame)
    pub fn update(&mut self, delta: Duration) {
        if let Some(error) = &mut self.form.error {
            error.remaining = error.remaining.saturating_sub(delta);
            if error.remaining.is_zero() {
                self.form.error = None;
            }
        }
    }

    /// One-line description of what the widget is doing
    pub fn status(&self) -> &'static str {
        if !self.mounted {
            return "Connecting...";
        }
        if !self.panel_open {
            return "Closed";
        }
        match self.view {
            Some(View::Form) if self.form.submitting => "Submitting...",
            Some(View::Chat) if !self.input_enabled => "Loading conversation...",
            Some(View::Chat) if self.typing => "Thinking...",
            _ => "Ready",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use widget_core::FieldType;

    fn with_fields() -> DisplayState {
        let mut state = DisplayState::new();
        state.apply_message(WidgetMessage::FormFields {
            fields: vec![
                FormField::new("name", "Name", FieldType::Text),
                FormField::new("email", "Email", FieldType::Email).required(),
            ],
        });
        state
    }

    #[test]
    fn test_form_error_expires() {
        let mut state = with_fields();
        state.apply_message(WidgetMessage::FormStatus {
            submitting: false,
            label: SUBMIT_LABEL.into(),
            error: Some("Error submitting form. Please try again.".into()),
        });
        assert!(state.form.error.is_some());

        state.update(Duration::from_secs(2));
        assert!(state.form.error.is_some());
        state.update(Duration::from_secs(1));
        assert!(state.form.error.is_none());
    }

    #[test]
    fn test_invalid_field_takes_focus() {
        let mut state = with_fields();
        state.apply_message(WidgetMessage::FieldInvalid {
            field: "email".into(),
            message: "Please fill out this field.".into(),
        });
        assert_eq!(state.form.focus, 1);
        assert_eq!(state.form.focused_field().map(|f| f.name.as_str()), Some("email"));
    }

    #[test]
    fn test_form_typing_and_focus_wrap() {
        let mut state = with_fields();
        assert_eq!(state.form.input('A'), Some(("name".into(), "A".into())));

        state.form.focus_next();
        state.form.focus_next();
        assert!(state.form.submit_focused());
        assert_eq!(state.form.input('x'), None);

        state.form.focus_next();
        assert_eq!(state.form.focus, 0);
        state.form.focus_prev();
        assert!(state.form.submit_focused());
    }

    #[test]
    fn test_welcome_hidden_while_open() {
        let mut state = DisplayState::new();
        state.apply_message(WidgetMessage::Welcome { text: "Hi".into() });
        assert_eq!(state.welcome.as_deref(), Some("Hi"));

        state.apply_message(WidgetMessage::PanelState { open: true });
        assert_eq!(state.welcome, None);
        state.apply_message(WidgetMessage::Welcome { text: "Hi".into() });
        assert_eq!(state.welcome, None);
    }

    #[test]
    fn test_transcript_messages() {
        let mut state = DisplayState::new();
        state.apply_message(WidgetMessage::TranscriptReplaced {
            entries: vec![TranscriptEntry::assistant("earlier")],
        });
        state.apply_message(WidgetMessage::EntryAppended {
            entry: TranscriptEntry::user("hi"),
        });
        state.apply_message(WidgetMessage::SendMode {
            mode: SendMode::Cancel,
        });

        assert_eq!(state.transcript.len(), 2);
        assert_eq!(state.send_mode, SendMode::Cancel);
    }

    #[test]
    fn test_starter_cursor_clamped() {
        let mut state = DisplayState::new();
        state.apply_message(WidgetMessage::StarterQuestions {
            questions: vec!["Q1".into(), "Q2".into()],
        });
        state.starters.select_next();
        state.starters.select_next();
        assert_eq!(state.starters.selected(), Some("Q2"));

        state.apply_message(WidgetMessage::StarterQuestions {
            questions: vec!["Only".into()],
        });
        assert_eq!(state.starters.selected(), Some("Only"));
    }
}

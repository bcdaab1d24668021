//! API Models
//!
//! Wire types for the widget API. The server owns these schemas; the widget
//! only relies on the fields below. Every field is defaulted so that a
//! partial or slightly malformed payload degrades to sensible values instead
//! of failing the whole refresh.

use serde::{Deserialize, Deserializer, Serialize};

/// Display and onboarding-form configuration (`GET widget-config`)
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WidgetConfig {
    /// Whether the onboarding form is shown before chat
    #[serde(deserialize_with = "null_as_default")]
    pub form_enabled: bool,
    /// Ordered onboarding form fields
    #[serde(deserialize_with = "null_as_default")]
    pub fields: Vec<FormField>,
    /// Accent color, e.g. `#0d6efd`
    pub primary_color: Option<String>,
    /// Bot avatar URL (absolute or relative to the API base)
    pub avatar_url: Option<String>,
    /// Bot display name
    pub bot_name: Option<String>,
    /// Launcher button icon
    pub widget_icon: Option<String>,
    /// Launcher position (`left` or `right`)
    pub widget_position: Option<String>,
    /// Chat input placeholder text
    pub input_placeholder: Option<String>,
    /// Header subheading
    pub subheading: Option<String>,
    /// Whether the "powered by" footer is visible
    pub show_branding: Option<bool>,
    /// Open the panel as soon as the widget mounts
    pub open_by_default: Option<bool>,
    /// Server-side starter question toggle (mirrors `StarterQuestionConfig`)
    pub starter_questions: Option<bool>,
}

impl WidgetConfig {
    /// Form fields sorted by their `order` key (stable for equal keys)
    #[must_use]
    pub fn ordered_fields(&self) -> Vec<FormField> {
        let mut fields = self.fields.clone();
        fields.sort_by_key(|f| f.order);
        fields
    }

    /// Whether the widget should render the onboarding form at all
    #[must_use]
    pub fn has_form(&self) -> bool {
        self.form_enabled && !self.fields.is_empty()
    }

    /// Whether the launcher sits on the left edge
    #[must_use]
    pub fn is_left(&self) -> bool {
        self.widget_position.as_deref() == Some("left")
    }
}

/// Input type for an onboarding form field
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// Single-line text
    #[default]
    Text,
    /// Email address
    Email,
    /// Numeric input
    Number,
    /// Multi-line text
    Textarea,
}

impl<'de> Deserialize<'de> for FieldType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(match raw.as_deref().map(str::to_ascii_lowercase).as_deref() {
            Some("email") => Self::Email,
            Some("number") => Self::Number,
            Some("textarea") => Self::Textarea,
            // Unknown types render as plain text inputs
            _ => Self::Text,
        })
    }
}

/// One onboarding form field
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormField {
    /// Key the value is submitted under
    pub name: String,
    /// Human label
    pub label: String,
    /// Input type
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Native `required` constraint
    pub required: bool,
    /// Placeholder text
    pub placeholder: Option<String>,
    /// Sort key
    pub order: i32,
}

impl FormField {
    /// Create a field with the given name, label, and type
    pub fn new(name: impl Into<String>, label: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            field_type,
            ..Default::default()
        }
    }

    /// Mark the field as required
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// Tooltip text when welcome is enabled without a message
pub const DEFAULT_WELCOME: &str = "Hey there, how can I help you?";

/// Behaviour configuration (`GET messaging-config`)
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessagingConfig {
    /// Show the welcome tooltip next to the closed launcher
    pub show_welcome: Option<bool>,
    /// Welcome tooltip text
    pub welcome_message: Option<String>,
    /// Text shown in place of a reply when the chat call fails
    pub server_error_message: Option<String>,
    /// Text shown when no source material matched (server-side use)
    pub no_source_message: Option<String>,
    /// Remaining server-side flags the widget does not interpret
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl MessagingConfig {
    /// Configured server error message, if non-blank
    #[must_use]
    pub fn server_error(&self) -> Option<&str> {
        self.server_error_message
            .as_deref()
            .filter(|m| !m.trim().is_empty())
    }

    /// Welcome tooltip text, if enabled
    #[must_use]
    pub fn welcome(&self) -> Option<&str> {
        if self.show_welcome != Some(true) {
            return None;
        }
        Some(
            self.welcome_message
                .as_deref()
                .filter(|m| !m.trim().is_empty())
                .unwrap_or(DEFAULT_WELCOME),
        )
    }
}

/// Starter question configuration (`GET starter-questions`)
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StarterQuestionConfig {
    /// Whether the starter screen is enabled
    #[serde(deserialize_with = "null_as_default")]
    pub enabled: bool,
    /// Ordered questions (may contain blanks)
    #[serde(deserialize_with = "null_as_default")]
    pub questions: Vec<String>,
}

impl StarterQuestionConfig {
    /// Questions with blank entries removed, trimmed
    #[must_use]
    pub fn visible_questions(&self) -> Vec<String> {
        self.questions
            .iter()
            .map(|q| q.trim())
            .filter(|q| !q.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Whether the starter screen has anything to show
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.enabled && !self.visible_questions().is_empty()
    }
}

/// Chat request body (`POST chat`)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Visitor message
    pub message: String,
    /// Client identity
    pub client_id: String,
}

/// Chat response body
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatReply {
    /// Assistant reply text
    pub reply: String,
    /// Whether the reply was sourced from FAQ content
    pub used_faq: bool,
    /// Server-side run identifier
    pub run_id: Option<String>,
}

/// Transcript author
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The visitor
    User,
    /// The bot
    Assistant,
}

/// One transcript entry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    /// Who wrote it
    pub role: Role,
    /// What was written
    pub content: String,
}

impl TranscriptEntry {
    /// A visitor entry
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// A bot entry
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Transcript response body (`GET messages`)
///
/// Entries with roles other than user/assistant (e.g. server-side system
/// prompts) are dropped during conversion.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct TranscriptResponse {
    /// Raw entries in chronological order
    pub messages: Vec<serde_json::Value>,
}

impl TranscriptResponse {
    /// Convert into displayable entries
    #[must_use]
    pub fn into_entries(self) -> Vec<TranscriptEntry> {
        self.messages
            .into_iter()
            .filter_map(|m| serde_json::from_value::<TranscriptEntry>(m).ok())
            .collect()
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

//! Widget Messages
//!
//! Messages sent from the [`Widget`](crate::Widget) to a surface. Surfaces
//! are pure renderers: they apply these messages to their display state and
//! draw it, without any business logic of their own.

use serde::{Deserialize, Serialize};

use crate::models::{FormField, TranscriptEntry, WidgetConfig};
use crate::sequencer::View;

/// Messages from the widget to a surface
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum WidgetMessage {
    // ============================================
    // Lifecycle
    // ============================================
    /// The widget finished mounting
    Mounted {
        /// Persisted client identity
        client_id: String,
    },

    /// The widget was unmounted; no further messages follow
    Unmounted,

    // ============================================
    // Launcher / Panel
    // ============================================
    /// Panel opened or closed
    PanelState {
        /// Whether the panel is open
        open: bool,
    },

    /// Header and launcher appearance changed
    Appearance(Appearance),

    /// Show the welcome tooltip next to the closed launcher
    Welcome {
        /// Tooltip text
        text: String,
    },

    /// The panel switched screens
    ViewChanged {
        /// The new screen
        view: View,
    },

    // ============================================
    // Onboarding Form
    // ============================================
    /// Form fields to render, in display order
    FormFields {
        /// Fields
        fields: Vec<FormField>,
    },

    /// Submit control state
    FormStatus {
        /// Control disabled while a submission is in flight
        submitting: bool,
        /// Control label
        label: String,
        /// Inline error after a failed submission
        error: Option<String>,
    },

    /// A field blocked submission
    FieldInvalid {
        /// Field name
        field: String,
        /// Message to show next to it
        message: String,
    },

    // ============================================
    // Starter Questions
    // ============================================
    /// Starter questions to render
    StarterQuestions {
        /// Non-blank questions in order
        questions: Vec<String>,
    },

    // ============================================
    // Chat
    // ============================================
    /// Replace the rendered transcript
    TranscriptReplaced {
        /// Entries in order
        entries: Vec<TranscriptEntry>,
    },

    /// Append one entry
    EntryAppended {
        /// The entry
        entry: TranscriptEntry,
    },

    /// Typing indicator visibility
    Typing {
        /// Whether to show it
        visible: bool,
    },

    /// What the send control does
    SendMode {
        /// Send or cancel
        mode: SendMode,
    },

    /// Whether the chat input accepts text
    InputEnabled {
        /// Accepting input
        enabled: bool,
    },
}

/// Send control mode
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SendMode {
    /// Idle: the control sends
    #[default]
    Send,
    /// Request in flight: the control cancels
    Cancel,
}

impl SendMode {
    /// Glyph for the control
    #[must_use]
    pub fn glyph(&self) -> &'static str {
        match self {
            Self::Send => "➤",
            Self::Cancel => "⏹",
        }
    }

    /// Tooltip for the control
    #[must_use]
    pub fn title(&self) -> &'static str {
        match self {
            Self::Send => "Send",
            Self::Cancel => "Stop",
        }
    }
}

/// Header and launcher appearance derived from widget config
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appearance {
    /// Header title (bot name, or the local fallback title)
    pub title: String,
    /// Header subheading
    pub subheading: Option<String>,
    /// Accent color
    pub primary_color: Option<String>,
    /// Validated avatar URL (`None` = default avatar)
    pub avatar_url: Option<String>,
    /// Launcher icon
    pub widget_icon: Option<String>,
    /// Launcher on the left edge
    pub left: bool,
    /// Chat input placeholder
    pub input_placeholder: Option<String>,
    /// Show the "powered by" footer
    pub show_branding: bool,
}

impl Appearance {
    /// Derive appearance from config, the validated avatar, and a fallback title
    #[must_use]
    pub fn from_config(config: &WidgetConfig, avatar_url: Option<&str>, fallback_title: &str) -> Self {
        let non_blank = |v: &Option<String>| v.clone().filter(|s| !s.trim().is_empty());
        Self {
            title: non_blank(&config.bot_name).unwrap_or_else(|| fallback_title.to_string()),
            subheading: non_blank(&config.subheading),
            primary_color: non_blank(&config.primary_color),
            avatar_url: avatar_url.map(str::to_string),
            widget_icon: non_blank(&config.widget_icon),
            left: config.is_left(),
            input_placeholder: non_blank(&config.input_placeholder),
            show_branding: config.show_branding.unwrap_or(false),
        }
    }
}

//! Widget Events
//!
//! Events sent from a surface to the [`Widget`](crate::Widget). They report
//! what the visitor did; the widget decides what it means and answers with
//! [`WidgetMessage`](crate::WidgetMessage)s.

use serde::{Deserialize, Serialize};

/// Events from a surface to the widget
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WidgetEvent {
    // ============================================
    // Launcher / Panel
    // ============================================
    /// Launcher clicked: open if closed, close if open
    TogglePanel,

    /// Open the panel
    OpenPanel,

    /// Close the panel
    ClosePanel,

    /// Pointer entered the closed launcher
    LauncherHovered,

    // ============================================
    // Onboarding Form
    // ============================================
    /// A form input changed
    FieldChanged {
        /// Field name
        name: String,
        /// New value
        value: String,
    },

    /// Submit control activated
    SubmitForm,

    // ============================================
    // Starter Questions
    // ============================================
    /// A starter question was picked
    StarterChosen {
        /// The question text
        question: String,
    },

    /// The starter screen was skipped
    SkipStarters,

    // ============================================
    // Chat
    // ============================================
    /// Send control activated with this input
    SendMessage {
        /// Input text (trimmed by the widget)
        text: String,
    },

    /// Stop control activated
    CancelChat,

    // ============================================
    // Maintenance
    // ============================================
    /// Refetch config now
    RefreshConfig,
}

impl WidgetEvent {
    /// Build a send event
    pub fn send(text: impl Into<String>) -> Self {
        Self::SendMessage { text: text.into() }
    }

    /// Build a field change event
    pub fn field(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::FieldChanged {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Build a starter choice event
    pub fn starter(question: impl Into<String>) -> Self {
        Self::StarterChosen {
            question: question.into(),
        }
    }
}

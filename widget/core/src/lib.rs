//! Widget Core - Headless Chatbot Widget Session
//!
//! This crate holds everything an embeddable chatbot widget does, without
//! any UI. A surface (terminal, test harness, anything else) feeds it
//! visitor actions and renders what it sends back.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         Surfaces                              │
//! │   ┌──────────────┐   ┌──────────────┐   ┌─────────────────┐   │
//! │   │ chatbot-tui  │   │ test harness │   │ admin publisher │   │
//! │   │  (ratatui)   │   │  (MockApi)   │   │  (AdminClient)  │   │
//! │   └──────┬───────┘   └──────┬───────┘   └────────┬────────┘   │
//! │          │ WidgetEvent (up) │                    │            │
//! │          │ WidgetMessage (down)                  │ version    │
//! └──────────┼──────────────────┼────────────────────┼────────────┘
//!            │                  │                    │ marker
//! ┌──────────┼──────────────────┼────────────────────┼────────────┐
//! │          ▼     WIDGET CORE  ▼                    ▼            │
//! │   ┌─────────────────────────────────┐   ┌─────────────────┐   │
//! │   │             Widget              │◄──│   LocalStore    │   │
//! │   │ ┌─────────┐ ┌──────┐ ┌────────┐ │   │ (JSON file +    │   │
//! │   │ │Sequencer│ │ Chat │ │Refresh │ │   │  change events) │   │
//! │   │ └─────────┘ └──────┘ └────────┘ │   └─────────────────┘   │
//! │   └────────────────┬────────────────┘                         │
//! │                    │ WidgetApi                                │
//! │              ┌─────┴─────┐                                    │
//! │              │  HttpApi  │──► chatbot server                  │
//! │              └───────────┘                                    │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`Widget`]: One mounted widget; owns view, chat, form, and config state
//! - [`WidgetEvent`]: Events sent from a surface to the widget
//! - [`WidgetMessage`]: Messages sent from the widget to a surface
//! - [`LocalStore`]: Shared persistent key/value store
//! - [`WidgetApi`]: Server access (reqwest-backed [`HttpApi`], or a mock)
//!
//! # Quick Start
//!
//! ```ignore
//! use widget_core::{HttpApi, LocalStore, Widget, WidgetEvent, WidgetOptions};
//! use tokio::sync::mpsc;
//!
//! let store = LocalStore::open(path).await?;
//! let identity = ClientIdentity::load_or_create(&store).await;
//! let api = Arc::new(HttpApi::new("http://localhost:8000/", identity.as_str(), timeout)?);
//!
//! let (tx, mut rx) = mpsc::channel(100);
//! let mut widget = Widget::new(api, store, WidgetOptions::default(), tx);
//! widget.mount().await;
//!
//! widget.handle_event(WidgetEvent::OpenPanel).await;
//! loop {
//!     while let Ok(msg) = rx.try_recv() {
//!         // Render message
//!     }
//!     widget.poll().await;
//! }
//! ```
//!
//! # Module Overview
//!
//! - [`admin`]: Save config and notify open widgets
//! - [`api`]: Server API trait, HTTP client, and mock
//! - [`chat`]: Transcript and the single in-flight chat request
//! - [`config`]: Settings from CLI, environment, TOML file, defaults
//! - [`form`]: Onboarding form validation and submission
//! - [`refresh`]: Config fetch, stale-result guard, poller, storage watcher
//! - [`sequencer`]: Form → starter questions → chat view transitions
//! - [`storage`]: Local store, client identity, onboarding flags
//! - [`widget`]: The [`Widget`] itself

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod admin;
pub mod api;
pub mod chat;
pub mod config;
pub mod error;
pub mod events;
pub mod form;
pub mod messages;
pub mod models;
pub mod refresh;
pub mod sequencer;
pub mod storage;
pub mod widget;

// Re-export main types for convenience
pub use admin::AdminClient;
pub use api::{AdminApi, HttpApi, WidgetApi};
pub use chat::{ChatSession, Transcript};
pub use config::{load_settings, ConfigError, ConfigOverrides, WidgetSettings};
pub use error::{WidgetError, WidgetResult};
pub use events::WidgetEvent;
pub use messages::{Appearance, SendMode, WidgetMessage};
pub use models::{
    ChatReply, FieldType, FormField, MessagingConfig, Role, StarterQuestionConfig,
    TranscriptEntry, WidgetConfig,
};
pub use sequencer::View;
pub use storage::{ClientIdentity, LocalStore, OnboardingProgress};
pub use widget::{Widget, WidgetOptions, WidgetSnapshot};

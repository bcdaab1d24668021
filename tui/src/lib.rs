//! Chatbot TUI - Terminal surface for the chatbot widget
//!
//! This crate renders the embedded [`widget_core::Widget`] in a terminal:
//! a launcher in the bottom corner, a welcome tooltip, and a panel that
//! shows the onboarding form, the starter questions, or the chat.
//!
//! # Architecture
//!
//! - **WidgetClient**: owns the widget and its message channel
//! - **DisplayState**: everything the renderer needs, derived from messages
//! - **App**: terminal event loop and drawing
//! - **Theme**: accent parsing and fixed colors

pub mod app;
pub mod display;
pub mod theme;
pub mod widget_client;

pub use app::App;
pub use widget_client::WidgetClient;

//! Widget API Integration
//!
//! Abstracted access to the chatbot server through the [`WidgetApi`] trait
//! (visitor-facing calls) and the [`AdminApi`] trait (configuration saves).
//!
//! # Available Implementations
//!
//! - **HttpApi**: reqwest client for the real server
//! - **MockApi**: in-process fake for tests and offline runs
//!
//! # Usage
//!
//! ```ignore
//! use widget_core::api::{HttpApi, WidgetApi};
//!
//! let api = HttpApi::new("https://bot.example.com/", client_id, timeout)?;
//! let config = api.widget_config().await?;
//! ```

mod http;
pub mod mock;
mod traits;

pub use http::{api_fallback_url, join_url, resolve_avatar_url, HttpApi, CLIENT_ID_HEADER};
pub use traits::{AdminApi, FormValues, WidgetApi};

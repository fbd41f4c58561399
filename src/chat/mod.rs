//! Chat client module.
//!
//! This module provides:
//! * [`ChatBackend`] — async trait implemented by all chat backends.
//! * [`OpenRouterClient`] — OpenRouter-compatible `/v1/chat/completions`
//!   client (the production backend).
//! * [`ChatMessage`] — one turn of the wire-format conversation.
//! * [`ChatError`] — error variants with user-facing display strings.

pub mod client;

pub use client::{ChatBackend, ChatError, ChatMessage, OpenRouterClient};

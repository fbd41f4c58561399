//! Companion Chat — a floating desktop chat widget with spoken replies.
//!
//! User text is forwarded to an OpenRouter-compatible chat-completions
//! endpoint; the reply is appended to the transcript and, when text-to-speech
//! is enabled, spoken aloud through a locally loaded Piper voice.
//!
//! # Modules
//!
//! * [`config`]     — `AppConfig` (TOML settings) and `AppPaths`.
//! * [`chat`]       — `ChatBackend` trait and the OpenRouter client.
//! * [`tts`]        — speech engine gateway, synthesis and audio playback.
//! * [`transcript`] — transcript entries shown in the chat view.
//! * [`controller`] — async send → reply → render → speak cycle.
//! * [`app`]        — the egui widget.

pub mod app;
pub mod chat;
pub mod config;
pub mod controller;
pub mod transcript;
pub mod tts;

//! Text-to-speech module.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                      SpeechGateway                         │
//! │                                                            │
//! │  Uninitialized ──▶ Loading ──▶ Ready                       │
//! │                        └─────▶ Failed                      │
//! │                                                            │
//! │  ┌──────────────┐   load    ┌─────────────────────┐        │
//! │  │ EngineLoader  │─────────▶│ SpeechSynthesizer    │        │
//! │  │ (PiperLoader) │          │ (PiperVoice)         │        │
//! │  └──────────────┘          └──────────┬──────────┘        │
//! │  ┌──────────────┐   open              │ samples           │
//! │  │ AudioBackend  │─────────▶ AudioSink ◀┘                  │
//! │  │ (RodioBackend)│          (playback thread)              │
//! │  └──────────────┘                                          │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! The gateway owns the two process-wide singletons (engine handle, audio
//! output) and guards initialization with an atomic compare-and-set state
//! transition, so a readiness notification and the availability poll can
//! both request initialization without ever constructing the engine twice.

pub mod engine;
pub mod gateway;
pub mod playback;

// ── Public re-exports ──────────────────────────────────────────────────────

pub use engine::{
    EngineLoader, PiperLoader, PiperVoice, SpeechSynthesizer, SynthesizedAudio, TtsError,
};
pub use gateway::{EngineState, SpeechGateway};
pub use playback::{AudioBackend, AudioSink, RodioBackend};

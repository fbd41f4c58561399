//! Speech engine gateway — readiness state machine and `speak`.
//!
//! [`SpeechGateway`] owns the two process-wide singletons: the engine handle
//! and the audio output.  The state machine is
//!
//! ```text
//! Uninitialized ──▶ Loading ──▶ Ready
//!       ▲               └─────▶ Failed
//!       │                          │  (explicit re-init only — no
//!       └── never ◀────────────────┘   automatic retry loop)
//! ```
//!
//! `Ready` and `Failed` are terminal for the session except that `speak` on
//! a non-`Ready` gateway makes exactly one initialize-and-retry attempt, and
//! any caller may explicitly invoke [`SpeechGateway::initialize`] again on
//! `Failed`.
//!
//! Initialization may be requested from two directions at once — the
//! bounded availability poll and the readiness notification in
//! [`SpeechGateway::warm_up`] — so the `Uninitialized/Failed → Loading`
//! transition is a compare-and-set on an atomic state word, not a
//! check-then-set flag.  Whichever trigger wins the CAS performs the one
//! real initialization; every other call returns immediately.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;

use crate::config::TtsConfig;
use crate::tts::engine::{EngineLoader, SpeechSynthesizer, TtsError};
use crate::tts::playback::{AudioBackend, AudioSink};

// ---------------------------------------------------------------------------
// EngineState
// ---------------------------------------------------------------------------

/// Lifecycle state of the speech engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EngineState {
    /// Nothing has been constructed yet.
    Uninitialized = 0,
    /// One caller won the init transition and is constructing the engine.
    Loading = 1,
    /// Engine and audio output both exist; `speak` is serviceable.
    Ready = 2,
    /// Engine or audio output construction failed.
    Failed = 3,
}

impl EngineState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => EngineState::Uninitialized,
            1 => EngineState::Loading,
            2 => EngineState::Ready,
            _ => EngineState::Failed,
        }
    }

    /// A short human-readable label suitable for display in the settings
    /// panel.
    pub fn label(&self) -> &'static str {
        match self {
            EngineState::Uninitialized => "not started",
            EngineState::Loading => "loading",
            EngineState::Ready => "ready",
            EngineState::Failed => "failed",
        }
    }
}

// ---------------------------------------------------------------------------
// SpeechGateway
// ---------------------------------------------------------------------------

/// Default interval between availability polls.
const POLL_INTERVAL: Duration = Duration::from_millis(100);
/// Default poll budget: 200 × 100 ms = 20 s.
const MAX_POLL_ATTEMPTS: u32 = 200;

/// Owns the speech engine and audio output singletons and gates every
/// `speak` on the readiness state machine.
///
/// Shared as `Arc<SpeechGateway>` between the controller (speak), the
/// warm-up task (initialize) and the UI (enabled flag).
pub struct SpeechGateway {
    state: AtomicU8,
    enabled: AtomicBool,
    speaker_id: u32,
    speed: f32,
    loader: Arc<dyn EngineLoader>,
    audio: Arc<dyn AudioBackend>,
    engine: Mutex<Option<Arc<dyn SpeechSynthesizer>>>,
    sink: Mutex<Option<Arc<dyn AudioSink>>>,
    poll_interval: Duration,
    max_poll_attempts: u32,
}

impl SpeechGateway {
    pub fn new(
        loader: Arc<dyn EngineLoader>,
        audio: Arc<dyn AudioBackend>,
        config: &TtsConfig,
    ) -> Self {
        Self {
            state: AtomicU8::new(EngineState::Uninitialized as u8),
            enabled: AtomicBool::new(config.enabled),
            speaker_id: config.speaker_id,
            speed: config.speed,
            loader,
            audio,
            engine: Mutex::new(None),
            sink: Mutex::new(None),
            poll_interval: POLL_INTERVAL,
            max_poll_attempts: MAX_POLL_ATTEMPTS,
        }
    }

    /// Override the availability-poll budget (tests use millisecond budgets).
    pub fn with_poll_budget(mut self, interval: Duration, max_attempts: u32) -> Self {
        self.poll_interval = interval;
        self.max_poll_attempts = max_attempts;
        self
    }

    pub fn state(&self) -> EngineState {
        EngineState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Whether replies should be spoken.  Mirrors the saved preference and
    /// is updated by the UI on save.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    // ── Initialization ───────────────────────────────────────────────────

    /// Compare-and-set into `Loading` from either restartable state.
    /// Returns `true` when this caller won the transition and must perform
    /// the real initialization.
    fn try_begin_init(&self) -> bool {
        for from in [EngineState::Uninitialized, EngineState::Failed] {
            if self
                .state
                .compare_exchange(
                    from as u8,
                    EngineState::Loading as u8,
                    Ordering::SeqCst,
                    Ordering::SeqCst,
                )
                .is_ok()
            {
                return true;
            }
        }
        false
    }

    /// Construct the engine and audio output (idempotent).
    ///
    /// Exactly one caller performs real work; everyone else returns
    /// immediately with the current outcome.  Both constructions must
    /// succeed for `Ready`: an engine that loads but cannot reach an audio
    /// output is dropped and the state becomes `Failed`.
    pub fn initialize(&self) -> Result<(), TtsError> {
        if !self.try_begin_init() {
            // Someone else owns (or already finished) the transition.
            return match self.state() {
                EngineState::Ready | EngineState::Loading => Ok(()),
                // Unreachable in practice: Failed would have won the CAS.
                _ => Err(TtsError::NotReady),
            };
        }

        log::info!("initializing TTS engine");
        let engine = match self.loader.load() {
            Ok(engine) => engine,
            Err(e) => {
                log::error!("TTS engine construction failed: {e}");
                self.state.store(EngineState::Failed as u8, Ordering::SeqCst);
                return Err(e);
            }
        };

        let sink = match self.audio.open() {
            Ok(sink) => sink,
            Err(e) => {
                log::error!("audio output construction failed: {e}");
                // Engine without a place to play is useless — drop it so a
                // later re-init starts from scratch.
                self.state.store(EngineState::Failed as u8, Ordering::SeqCst);
                return Err(e);
            }
        };

        *self.engine.lock().unwrap() = Some(engine);
        *self.sink.lock().unwrap() = Some(sink);
        self.state.store(EngineState::Ready as u8, Ordering::SeqCst);
        log::info!("TTS engine ready");
        Ok(())
    }

    /// Wait for the voice files to appear, then initialize.
    ///
    /// Polls [`EngineLoader::is_available`] every `poll_interval` up to
    /// `max_poll_attempts` times; `notify` is the readiness hook a voice
    /// installer pings to short-circuit the poll.  Both triggers funnel into
    /// the same CAS-guarded [`SpeechGateway::initialize`], so firing both
    /// cannot double-construct anything.
    ///
    /// A timeout leaves the state untouched (`Uninitialized`): a later
    /// `speak` still gets its one initialize-and-retry attempt.
    pub async fn warm_up(self: Arc<Self>, notify: Arc<Notify>) -> Result<(), TtsError> {
        let mut attempts: u32 = 0;
        while !self.loader.is_available() {
            if attempts >= self.max_poll_attempts {
                log::warn!(
                    "TTS voice did not appear within {} polls",
                    self.max_poll_attempts
                );
                return Err(TtsError::VoiceNotFound(
                    "voice files did not appear in time".into(),
                ));
            }
            tokio::select! {
                _ = notify.notified() => {
                    log::debug!("TTS readiness notification received");
                }
                _ = tokio::time::sleep(self.poll_interval) => {
                    attempts += 1;
                }
            }
        }

        let gateway = Arc::clone(&self);
        tokio::task::spawn_blocking(move || gateway.initialize())
            .await
            .map_err(|e| TtsError::EngineInit(e.to_string()))?
    }

    // ── Speak ────────────────────────────────────────────────────────────

    /// Synthesize and play `text`.
    ///
    /// No-op when speech is disabled or `text` trims to empty.  When the
    /// gateway is not `Ready`, makes exactly one initialize-and-retry
    /// attempt; a still-unready gateway is a visible error, never a silent
    /// queue.  Blocking (synthesis is CPU-bound) — callers run this under
    /// `spawn_blocking`.
    pub fn speak(&self, text: &str) -> Result<(), TtsError> {
        if !self.is_enabled() {
            return Ok(());
        }
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }

        if self.state() != EngineState::Ready {
            log::warn!("TTS engine not ready — attempting one re-initialization");
            self.initialize()?;
        }
        if self.state() != EngineState::Ready {
            return Err(TtsError::NotReady);
        }

        let engine = self
            .engine
            .lock()
            .unwrap()
            .clone()
            .ok_or(TtsError::NotReady)?;

        log::debug!("TTS: generating audio for {} chars", text.len());
        let audio = engine.synthesize(text, self.speaker_id, self.speed)?;

        if audio.samples.is_empty() {
            log::warn!("TTS returned no audio samples");
            return Err(TtsError::EmptySamples);
        }

        let sink = self
            .sink
            .lock()
            .unwrap()
            .clone()
            .ok_or(TtsError::PlaybackUnavailable)?;
        sink.play(audio.samples, audio.sample_rate)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

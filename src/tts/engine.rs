//! Speech synthesis engines and the loader seam used by the gateway.
//!
//! [`SpeechSynthesizer`] is the object-safe interface the gateway calls.
//! [`PiperVoice`] is the production implementation wrapping a `piper-rs`
//! voice.  [`EngineLoader`] abstracts "are the voice files here yet?" and
//! "build the engine" so the gateway can be unit-tested with doubles and the
//! availability poll never has to know about file layouts.
//!
//! [`MockSynthesizer`] and [`MockLoader`] (available under `#[cfg(test)]`)
//! record their calls — useful for verifying the idempotent-initialization
//! and speak-parameter contracts without any model file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use piper_rs::synth::PiperSpeechSynthesizer;
use thiserror::Error;

use crate::config::TtsConfig;

// ---------------------------------------------------------------------------
// TtsError
// ---------------------------------------------------------------------------

/// All errors that can arise from the text-to-speech subsystem.
///
/// Display strings are user-facing — the controller renders them directly
/// as an error turn in the transcript.  None of these is fatal: the user can
/// keep chatting with speech effectively disabled.
#[derive(Debug, Clone, Error)]
pub enum TtsError {
    /// Voice model files were not found (or did not appear within the
    /// availability budget).
    #[error("TTS voice not available: {0}")]
    VoiceNotFound(String),

    /// Engine construction failed.
    #[error("Error: Could not initialize TTS engine. {0}")]
    EngineInit(String),

    /// The audio output device could not be opened.
    #[error("Error: Could not initialize audio playback. {0}")]
    AudioInit(String),

    /// Synthesis failed inside the engine.
    #[error("TTS Error: {0}")]
    Synthesis(String),

    /// The engine returned an empty sample buffer.
    #[error("TTS Error: Could not generate audio samples.")]
    EmptySamples,

    /// The gateway is not `Ready` and one initialize-and-retry did not help.
    #[error("TTS engine is not ready. Please try again later or check settings.")]
    NotReady,

    /// The playback thread is gone.
    #[error("Audio playback system is not ready.")]
    PlaybackUnavailable,
}

// ---------------------------------------------------------------------------
// SynthesizedAudio
// ---------------------------------------------------------------------------

/// Output of one synthesis call: a flat mono waveform plus its sample rate.
#[derive(Debug, Clone)]
pub struct SynthesizedAudio {
    /// f32 PCM samples, mono.
    pub samples: Vec<f32>,
    /// Samples per second of `samples`.
    pub sample_rate: u32,
}

// ---------------------------------------------------------------------------
// SpeechSynthesizer trait
// ---------------------------------------------------------------------------

/// Object-safe, thread-safe interface for speech synthesis engines.
///
/// Implementations must be `Send + Sync` so they can be held behind an
/// `Arc<dyn SpeechSynthesizer>` and called from the blocking thread pool.
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text` with the given speaker identity and speed.
    ///
    /// `text` is guaranteed non-empty by the gateway.  Returns the full
    /// waveform; streaming is not part of this interface.
    fn synthesize(&self, text: &str, speaker_id: u32, speed: f32)
        -> Result<SynthesizedAudio, TtsError>;
}

// Compile-time assertion: Box<dyn SpeechSynthesizer> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn SpeechSynthesizer>) {}
};

// ---------------------------------------------------------------------------
// PiperVoice
// ---------------------------------------------------------------------------

/// Sample rate of Piper voices.  `piper-rs` does not expose the voice's
/// output rate on the synthesizer handle; 22 050 Hz is the rate all stock
/// Piper voices (including `en_US-amy-low`) ship with.
const PIPER_SAMPLE_RATE: u32 = 22_050;

/// Production synthesizer that wraps a `piper-rs` voice.
///
/// The voice is loaded once from its `.onnx.json` voice config; every
/// [`synthesize`] call runs a full (chunked, parallel) synthesis pass and
/// concatenates the chunks.
///
/// [`synthesize`]: SpeechSynthesizer::synthesize
pub struct PiperVoice {
    synth: PiperSpeechSynthesizer,
}

impl std::fmt::Debug for PiperVoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PiperVoice").finish_non_exhaustive()
    }
}

impl PiperVoice {
    /// Load a Piper voice from its `.onnx.json` voice config.
    ///
    /// # Errors
    ///
    /// - [`TtsError::VoiceNotFound`] — `config_path` does not exist.
    /// - [`TtsError::EngineInit`]  — piper-rs failed to load the voice.
    pub fn load(config_path: impl AsRef<Path>, speaker_id: u32) -> Result<Self, TtsError> {
        let path = config_path.as_ref();

        if !path.exists() {
            return Err(TtsError::VoiceNotFound(path.display().to_string()));
        }

        let model = piper_rs::from_config_path(path)
            .map_err(|e| TtsError::EngineInit(e.to_string()))?;

        // Single-speaker voices ignore the speaker id; only forward a
        // non-default selection.
        if speaker_id != 0 {
            model.set_speaker(speaker_id as i64);
        }

        let synth = PiperSpeechSynthesizer::new(model)
            .map_err(|e| TtsError::EngineInit(e.to_string()))?;

        Ok(Self { synth })
    }
}

impl SpeechSynthesizer for PiperVoice {
    fn synthesize(
        &self,
        text: &str,
        _speaker_id: u32,
        speed: f32,
    ) -> Result<SynthesizedAudio, TtsError> {
        // The speaker was bound at load time; Piper has no per-utterance
        // speed knob, so non-default speeds play at the voice's native rate.
        if (speed - 1.0).abs() > f32::EPSILON {
            log::debug!("piper voice has no speed control; synthesizing at native speed");
        }

        let chunks = self
            .synth
            .synthesize_parallel(text.to_string(), None)
            .map_err(|e| TtsError::Synthesis(e.to_string()))?;

        let mut samples: Vec<f32> = Vec::new();
        for chunk in chunks {
            let part = chunk.map_err(|e| TtsError::Synthesis(e.to_string()))?;
            samples.extend(part.into_vec());
        }

        Ok(SynthesizedAudio {
            samples,
            sample_rate: PIPER_SAMPLE_RATE,
        })
    }
}

// ---------------------------------------------------------------------------
// EngineLoader trait + PiperLoader
// ---------------------------------------------------------------------------

/// Seam between the gateway and engine construction.
///
/// `is_available` answers "could `load` plausibly succeed right now?" — the
/// gateway polls it while waiting for voice files that are installed out of
/// band.  `load` performs the (blocking, potentially slow) construction.
pub trait EngineLoader: Send + Sync {
    /// True when the voice files are present on disk.
    fn is_available(&self) -> bool;

    /// Construct the engine.  Called at most once per successful
    /// initialization; may be called again after a failed one.
    fn load(&self) -> Result<Arc<dyn SpeechSynthesizer>, TtsError>;
}

/// Production loader resolving a [`TtsConfig`] voice name against the voices
/// directory (`<voice>.onnx` + `<voice>.onnx.json`).
#[derive(Debug, Clone)]
pub struct PiperLoader {
    model_path: PathBuf,
    config_path: PathBuf,
    speaker_id: u32,
}

impl PiperLoader {
    pub fn from_config(config: &TtsConfig, voices_dir: &Path) -> Self {
        Self {
            model_path: voices_dir.join(format!("{}.onnx", config.voice)),
            config_path: voices_dir.join(format!("{}.onnx.json", config.voice)),
            speaker_id: config.speaker_id,
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }
}

impl EngineLoader for PiperLoader {
    fn is_available(&self) -> bool {
        self.model_path.exists() && self.config_path.exists()
    }

    fn load(&self) -> Result<Arc<dyn SpeechSynthesizer>, TtsError> {
        let voice = PiperVoice::load(&self.config_path, self.speaker_id)?;
        log::info!("Piper voice loaded: {}", self.config_path.display());
        Ok(Arc::new(voice))
    }
}

// ---------------------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------------------

/// A synthesizer double that records every call and returns a canned result.
#[cfg(test)]
pub struct MockSynthesizer {
    /// `(text, speaker_id, speed)` for each synthesize call.
    pub calls: std::sync::Mutex<Vec<(String, u32, f32)>>,
    response: Result<SynthesizedAudio, TtsError>,
}

#[cfg(test)]
impl MockSynthesizer {
    /// Always returns a short non-empty buffer.
    pub fn ok() -> Arc<Self> {
        Arc::new(Self {
            calls: std::sync::Mutex::new(Vec::new()),
            response: Ok(SynthesizedAudio {
                samples: vec![0.0; 256],
                sample_rate: 22_050,
            }),
        })
    }

    /// Always returns an empty sample buffer.
    pub fn empty() -> Arc<Self> {
        Arc::new(Self {
            calls: std::sync::Mutex::new(Vec::new()),
            response: Ok(SynthesizedAudio {
                samples: Vec::new(),
                sample_rate: 22_050,
            }),
        })
    }

    /// Always returns `Err(error)`.
    pub fn err(error: TtsError) -> Arc<Self> {
        Arc::new(Self {
            calls: std::sync::Mutex::new(Vec::new()),
            response: Err(error),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[cfg(test)]
impl SpeechSynthesizer for MockSynthesizer {
    fn synthesize(
        &self,
        text: &str,
        speaker_id: u32,
        speed: f32,
    ) -> Result<SynthesizedAudio, TtsError> {
        self.calls
            .lock()
            .unwrap()
            .push((text.to_string(), speaker_id, speed));
        self.response.clone()
    }
}

/// A loader double with an availability switch and a construction counter.
#[cfg(test)]
pub struct MockLoader {
    available: std::sync::atomic::AtomicBool,
    pub load_calls: std::sync::atomic::AtomicUsize,
    engine: Option<Arc<MockSynthesizer>>,
}

#[cfg(test)]
impl MockLoader {
    /// Available loader that yields `engine` on every load.
    pub fn ready(engine: Arc<MockSynthesizer>) -> Arc<Self> {
        Arc::new(Self {
            available: std::sync::atomic::AtomicBool::new(true),
            load_calls: std::sync::atomic::AtomicUsize::new(0),
            engine: Some(engine),
        })
    }

    /// Loader whose `load` always fails with `EngineInit`.
    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            available: std::sync::atomic::AtomicBool::new(true),
            load_calls: std::sync::atomic::AtomicUsize::new(0),
            engine: None,
        })
    }

    /// Loader that starts unavailable; flip with [`MockLoader::set_available`].
    pub fn unavailable(engine: Arc<MockSynthesizer>) -> Arc<Self> {
        Arc::new(Self {
            available: std::sync::atomic::AtomicBool::new(false),
            load_calls: std::sync::atomic::AtomicUsize::new(0),
            engine: Some(engine),
        })
    }

    pub fn set_available(&self, available: bool) {
        self.available
            .store(available, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn load_count(&self) -> usize {
        self.load_calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
impl EngineLoader for MockLoader {
    fn is_available(&self) -> bool {
        self.available.load(std::sync::atomic::Ordering::SeqCst)
    }

    fn load(&self) -> Result<Arc<dyn SpeechSynthesizer>, TtsError> {
        self.load_calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        match &self.engine {
            Some(engine) => Ok(Arc::clone(engine) as Arc<dyn SpeechSynthesizer>),
            None => Err(TtsError::EngineInit("mock load failure".into())),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_voice_returns_voice_not_found() {
        let result = PiperVoice::load("/nonexistent/voice.onnx.json", 0);
        assert!(
            matches!(result, Err(TtsError::VoiceNotFound(_))),
            "expected VoiceNotFound, got: {result:?}"
        );
    }

    #[test]
    fn piper_loader_resolves_both_voice_files() {
        let config = TtsConfig::default();
        let loader = PiperLoader::from_config(&config, Path::new("/voices"));
        assert_eq!(
            loader.config_path(),
            Path::new("/voices/en_US-amy-low.onnx.json")
        );
        assert!(!loader.is_available());
    }

    #[test]
    fn piper_loader_availability_tracks_files_on_disk() {
        let dir = tempfile::tempdir().expect("temp dir");
        let config = TtsConfig::default();
        let loader = PiperLoader::from_config(&config, dir.path());
        assert!(!loader.is_available());

        std::fs::write(dir.path().join("en_US-amy-low.onnx"), b"stub").unwrap();
        // Only one of the two files present — still unavailable.
        assert!(!loader.is_available());

        std::fs::write(dir.path().join("en_US-amy-low.onnx.json"), b"{}").unwrap();
        assert!(loader.is_available());
    }

    // --- Mock doubles behave per their contracts ---

    #[test]
    fn mock_synthesizer_records_calls() {
        let synth = MockSynthesizer::ok();
        let audio = synth.synthesize("Hi there!", 0, 1.0).unwrap();
        assert!(!audio.samples.is_empty());
        assert_eq!(synth.call_count(), 1);
        assert_eq!(
            synth.calls.lock().unwrap()[0],
            ("Hi there!".to_string(), 0, 1.0)
        );
    }

    #[test]
    fn mock_loader_counts_loads() {
        let loader = MockLoader::ready(MockSynthesizer::ok());
        assert!(loader.is_available());
        let _ = loader.load().unwrap();
        let _ = loader.load().unwrap();
        assert_eq!(loader.load_count(), 2);
    }

    #[test]
    fn failing_loader_returns_engine_init() {
        let loader = MockLoader::failing();
        assert!(matches!(loader.load(), Err(TtsError::EngineInit(_))));
    }

    #[test]
    fn box_dyn_synthesizer_compiles() {
        // If this test compiles, the trait is object-safe.
        let synth: Box<dyn SpeechSynthesizer> = Box::new(std::sync::Arc::try_unwrap(
            MockSynthesizer::ok(),
        )
        .map_err(|_| ())
        .unwrap());
        let _ = synth.synthesize("hi", 0, 1.0);
    }

    // --- TtsError display ---

    #[test]
    fn tts_error_display_empty_samples() {
        let e = TtsError::EmptySamples;
        assert!(e.to_string().contains("Could not generate audio samples"));
    }

    #[test]
    fn tts_error_display_not_ready() {
        let e = TtsError::NotReady;
        assert!(e.to_string().contains("not ready"));
    }
}

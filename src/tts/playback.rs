//! Audio output: a dedicated playback thread owning the rodio device.
//!
//! rodio's `OutputStream` is not `Send`, so it cannot live inside the
//! gateway (which is shared across tokio tasks).  Instead [`RodioSink`]
//! spawns a `tts-playback` thread that owns the stream for the process
//! lifetime and plays mono buffers received over a channel.  The device is
//! opened eagerly on the thread and the result reported back synchronously,
//! so the gateway's initialize step observes audio-output failure as part of
//! the `Loading → Failed` transition.
//!
//! Playback is fire-and-forget from the caller's point of view: `play`
//! queues one buffer and returns; completion is logged at debug level.

use std::sync::mpsc;
use std::thread;

use rodio::buffer::SamplesBuffer;
use rodio::{OutputStream, Sink};

use crate::tts::engine::TtsError;

// ---------------------------------------------------------------------------
// AudioSink / AudioBackend traits
// ---------------------------------------------------------------------------

/// A queue of mono playback requests.
pub trait AudioSink: Send + Sync {
    /// Queue one mono buffer for playback; returns immediately.
    fn play(&self, samples: Vec<f32>, sample_rate: u32) -> Result<(), TtsError>;
}

/// Opens the audio output device.  A seam so the gateway can be tested
/// without touching real hardware.
pub trait AudioBackend: Send + Sync {
    fn open(&self) -> Result<std::sync::Arc<dyn AudioSink>, TtsError>;
}

// ---------------------------------------------------------------------------
// RodioSink
// ---------------------------------------------------------------------------

struct PlaybackRequest {
    samples: Vec<f32>,
    sample_rate: u32,
}

/// Production audio output backed by a rodio `OutputStream` on its own
/// thread.
pub struct RodioSink {
    tx: mpsc::Sender<PlaybackRequest>,
}

impl RodioSink {
    /// Spawn the playback thread and open the default output device on it.
    ///
    /// # Errors
    ///
    /// [`TtsError::AudioInit`] when no output device can be opened — the
    /// caller treats this exactly like an engine construction failure.
    pub fn start() -> Result<Self, TtsError> {
        let (tx, rx) = mpsc::channel::<PlaybackRequest>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), String>>();

        thread::Builder::new()
            .name("tts-playback".into())
            .spawn(move || {
                // The OutputStream must stay alive for as long as anything
                // should be audible, hence the thread owns it.
                let (_stream, handle) = match OutputStream::try_default() {
                    Ok(pair) => {
                        let _ = ready_tx.send(Ok(()));
                        pair
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.to_string()));
                        return;
                    }
                };

                while let Ok(req) = rx.recv() {
                    let sink = match Sink::try_new(&handle) {
                        Ok(sink) => sink,
                        Err(e) => {
                            log::warn!("could not open playback sink: {e}");
                            continue;
                        }
                    };
                    log::debug!(
                        "TTS playback started ({} samples at {} Hz)",
                        req.samples.len(),
                        req.sample_rate
                    );
                    sink.append(SamplesBuffer::new(1, req.sample_rate, req.samples));
                    // Blocks only this thread; further requests queue up in
                    // the channel and play back to back.
                    sink.sleep_until_end();
                    log::debug!("TTS playback finished");
                }
            })
            .map_err(|e| TtsError::AudioInit(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self { tx }),
            Ok(Err(e)) => Err(TtsError::AudioInit(e)),
            Err(_) => Err(TtsError::AudioInit("playback thread exited".into())),
        }
    }
}

impl AudioSink for RodioSink {
    fn play(&self, samples: Vec<f32>, sample_rate: u32) -> Result<(), TtsError> {
        self.tx
            .send(PlaybackRequest {
                samples,
                sample_rate,
            })
            .map_err(|_| TtsError::PlaybackUnavailable)
    }
}

/// Production [`AudioBackend`] — opens a [`RodioSink`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RodioBackend;

impl AudioBackend for RodioBackend {
    fn open(&self) -> Result<std::sync::Arc<dyn AudioSink>, TtsError> {
        let sink = RodioSink::start()?;
        log::info!("audio output opened");
        Ok(std::sync::Arc::new(sink))
    }
}

// ---------------------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------------------

/// An audio sink double counting playback requests.
#[cfg(test)]
pub struct MockSink {
    pub plays: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl MockSink {
    pub fn new() -> std::sync::Arc<Self> {
        std::sync::Arc::new(Self {
            plays: std::sync::atomic::AtomicUsize::new(0),
        })
    }

    pub fn play_count(&self) -> usize {
        self.plays.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
impl AudioSink for MockSink {
    fn play(&self, _samples: Vec<f32>, _sample_rate: u32) -> Result<(), TtsError> {
        self.plays
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }
}

/// An audio backend double that either hands out a shared [`MockSink`] or
/// fails to open.
#[cfg(test)]
pub struct MockAudioBackend {
    sink: Option<std::sync::Arc<MockSink>>,
    pub open_calls: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl MockAudioBackend {
    pub fn working(sink: std::sync::Arc<MockSink>) -> std::sync::Arc<Self> {
        std::sync::Arc::new(Self {
            sink: Some(sink),
            open_calls: std::sync::atomic::AtomicUsize::new(0),
        })
    }

    pub fn failing() -> std::sync::Arc<Self> {
        std::sync::Arc::new(Self {
            sink: None,
            open_calls: std::sync::atomic::AtomicUsize::new(0),
        })
    }

    pub fn open_count(&self) -> usize {
        self.open_calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
impl AudioBackend for MockAudioBackend {
    fn open(&self) -> Result<std::sync::Arc<dyn AudioSink>, TtsError> {
        self.open_calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        match &self.sink {
            Some(sink) => Ok(std::sync::Arc::clone(sink) as std::sync::Arc<dyn AudioSink>),
            None => Err(TtsError::AudioInit("mock device failure".into())),
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
    fn mock_sink_counts_plays() {
        let sink = MockSink::new();
        sink.play(vec![0.0; 8], 22_050).unwrap();
        sink.play(vec![0.0; 8], 22_050).unwrap();
        assert_eq!(sink.play_count(), 2);
    }

    #[test]
    fn failing_backend_returns_audio_init() {
        let backend = MockAudioBackend::failing();
        assert!(matches!(backend.open(), Err(TtsError::AudioInit(_))));
        assert_eq!(backend.open_count(), 1);
    }
}

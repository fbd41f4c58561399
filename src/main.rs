//! Application entry point — Companion Chat.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (returns default on first run).
//! 3. Create [`tokio`] runtime (multi-thread, 2 workers).
//! 4. Build the chat client ([`OpenRouterClient`]) from config.
//! 5. Build the speech gateway (Piper loader + rodio output).
//! 6. Create controller channels (`command`, `event`).
//! 7. Spawn the conversation controller and the TTS warm-up task.
//! 8. Run [`eframe::run_native`] — blocks the main thread until the window
//!    is closed.

use std::sync::Arc;

use tokio::sync::{mpsc, Notify};

use companion_chat::{
    app::CompanionApp,
    chat::{ChatBackend, OpenRouterClient},
    config::{AppConfig, AppPaths},
    controller::{run_controller, ControllerCommand, ControllerEvent},
    tts::{PiperLoader, RodioBackend, SpeechGateway},
};

use eframe::egui;

// ---------------------------------------------------------------------------
// Native options builder
// ---------------------------------------------------------------------------

fn native_options(config: &AppConfig) -> eframe::NativeOptions {
    let mut vp = egui::ViewportBuilder::default()
        .with_decorations(false)
        .with_transparent(true)
        .with_inner_size([340.0, 480.0])
        .with_min_inner_size([280.0, 240.0]);

    if config.ui.always_on_top {
        vp = vp.with_always_on_top();
    }

    if let Some((x, y)) = config.ui.window_position {
        vp = vp.with_position(egui::pos2(x, y));
    }

    eframe::NativeOptions {
        viewport: vp,
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> eframe::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Companion Chat starting up");

    // 2. Configuration
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });

    // 3. Tokio runtime (2 worker threads — chat request + TTS synthesis)
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("failed to create tokio runtime");

    // 4. Chat client
    let backend: Arc<dyn ChatBackend> = Arc::new(OpenRouterClient::from_config(&config.chat));

    // 5. Speech gateway — the loader resolves the voice files under the
    //    per-user data directory; the gateway stays Uninitialized until the
    //    warm-up task (or the first speak) brings it up.
    let paths = AppPaths::new();
    let loader = Arc::new(PiperLoader::from_config(&config.tts, &paths.voices_dir));
    let gateway = Arc::new(SpeechGateway::new(loader, Arc::new(RodioBackend), &config.tts));

    // 6. Channel setup
    let (command_tx, command_rx) = mpsc::channel::<ControllerCommand>(16);
    let (event_tx, event_rx) = mpsc::channel::<ControllerEvent>(32);

    // 7a. Conversation controller
    rt.spawn(run_controller(
        backend,
        Arc::clone(&gateway),
        command_rx,
        event_tx.clone(),
    ));

    // 7b. TTS warm-up — only worth the poll when speech is on.  A failure
    //     is reported into the transcript; chat keeps working without voice.
    if config.tts.enabled {
        let gateway_warm = Arc::clone(&gateway);
        let warm_event_tx = event_tx.clone();
        let notify = Arc::new(Notify::new());
        rt.spawn(async move {
            if let Err(e) = gateway_warm.warm_up(notify).await {
                log::warn!("TTS warm-up failed: {e}");
                let _ = warm_event_tx
                    .send(ControllerEvent::ErrorTurn {
                        message: e.to_string(),
                    })
                    .await;
            }
        });
    }

    // 8. Build the egui app and run it (blocks until the window is closed)
    let app = CompanionApp::new(command_tx, event_rx, gateway, config.clone());
    let options = native_options(&config);

    eframe::run_native(
        "Companion Chat",
        options,
        Box::new(move |_cc| Ok(Box::new(app))),
    )
}

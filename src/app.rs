//! Companion chat floating widget — egui/eframe application.
//!
//! # Architecture
//!
//! [`CompanionApp`] is the top-level [`eframe::App`] that owns the UI state
//! and two channel endpoints:
//!
//! * `command_tx` — sends [`ControllerCommand`] to the conversation
//!   controller.
//! * `event_rx`   — receives [`ControllerEvent`] transcript entries back.
//!
//! The app renders a compact, always-on-top floating chat window: a
//! scrolling transcript, a single-line input with a send button, and a
//! collapsible settings panel (API key, system prompt, voice toggle).
//!
//! # Transcript colours
//!
//! | Turn | Visual |
//! |------|--------|
//! | User      | "You:" prefix — light blue |
//! | Assistant | "AI:" prefix — green |
//! | Error     | message only — orange |

use std::time::Duration;

use eframe::egui;
use tokio::sync::mpsc;

use crate::config::AppConfig;
use crate::controller::{ControllerCommand, ControllerEvent};
use crate::transcript::{Role, Transcript, TranscriptEntry};
use crate::tts::SpeechGateway;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// CompanionApp
// ---------------------------------------------------------------------------

/// eframe application — the floating companion chat widget.
pub struct CompanionApp {
    // ── Conversation state ───────────────────────────────────────────────
    /// Ordered transcript of the session.
    pub transcript: Transcript,
    /// Text currently in the input box.
    input: String,
    /// A message is in flight; the input stays editable but a spinner row
    /// shows under the transcript until the reply (or error) arrives.
    awaiting_reply: bool,

    // ── Settings panel drafts (committed on Save) ────────────────────────
    /// Whether the settings panel is expanded.
    show_settings: bool,
    api_key_draft: String,
    system_prompt_draft: String,
    tts_enabled_draft: bool,

    // ── Animation ────────────────────────────────────────────────────────
    /// Spinner animation phase (increases each frame).
    spinner_phase: f32,

    // ── Channels ─────────────────────────────────────────────────────────
    /// Send commands to the background conversation controller.
    pub command_tx: mpsc::Sender<ControllerCommand>,
    /// Receive transcript events from the controller.
    pub event_rx: mpsc::Receiver<ControllerEvent>,

    // ── Shared services ──────────────────────────────────────────────────
    /// Speech gateway (shared with the controller); the UI reads its state
    /// for the settings panel and flips the enabled flag on save.
    gateway: Arc<SpeechGateway>,

    // ── Configuration ────────────────────────────────────────────────────
    /// Application configuration; mutated and persisted when settings are
    /// saved.
    pub config: AppConfig,
}

impl CompanionApp {
    /// Create a new [`CompanionApp`].
    ///
    /// * `command_tx` — sender end of the controller command channel.
    /// * `event_rx`   — receiver end of the controller event channel.
    /// * `gateway`    — shared speech gateway.
    /// * `config`     — loaded application configuration.
    pub fn new(
        command_tx: mpsc::Sender<ControllerCommand>,
        event_rx: mpsc::Receiver<ControllerEvent>,
        gateway: Arc<SpeechGateway>,
        config: AppConfig,
    ) -> Self {
        Self {
            transcript: Transcript::new(),
            input: String::new(),
            awaiting_reply: false,
            show_settings: false,
            api_key_draft: config.chat.api_key.clone().unwrap_or_default(),
            system_prompt_draft: config.chat.system_prompt.clone(),
            tts_enabled_draft: config.tts.enabled,
            spinner_phase: 0.0,
            command_tx,
            event_rx,
            gateway,
            config,
        }
    }

    // ── Channel polling ──────────────────────────────────────────────────

    /// Drain all pending controller events (non-blocking).
    fn poll_events(&mut self) {
        while let Ok(event) = self.event_rx.try_recv() {
            match event {
                ControllerEvent::UserTurn { text } => {
                    self.transcript.push_user(text);
                }
                ControllerEvent::AssistantTurn { text } => {
                    self.transcript.push_assistant(text);
                    self.awaiting_reply = false;
                }
                ControllerEvent::ErrorTurn { message } => {
                    self.transcript.push_error(message);
                    self.awaiting_reply = false;
                }
            }
        }
    }

    // ── Actions ──────────────────────────────────────────────────────────

    /// Submit the current input box contents to the controller.
    fn send_message(&mut self) {
        let text = self.input.trim().to_string();
        if text.is_empty() {
            return;
        }
        self.input.clear();
        self.awaiting_reply = true;
        let _ = self.command_tx.try_send(ControllerCommand::Send { text });
    }

    /// Commit the settings drafts: normalize, persist, and push the new
    /// chat config to the controller.
    fn save_settings(&mut self) {
        self.config.chat.set_api_key(&self.api_key_draft);
        self.config.chat.set_system_prompt(&self.system_prompt_draft);
        self.config.tts.enabled = self.tts_enabled_draft;

        if let Err(e) = self.config.save() {
            log::error!("failed to save settings: {e}");
            self.transcript
                .push_error(format!("Could not save settings: {e}"));
        }

        self.gateway.set_enabled(self.config.tts.enabled);
        let _ = self
            .command_tx
            .try_send(ControllerCommand::UpdateChatConfig(self.config.chat.clone()));

        // Reflect the normalized values back into the drafts.
        self.api_key_draft = self.config.chat.api_key.clone().unwrap_or_default();
        self.system_prompt_draft = self.config.chat.system_prompt.clone();
        self.show_settings = false;
    }

    // ── Custom title bar ─────────────────────────────────────────────────

    /// Draw the draggable title bar with title and window controls
    /// (settings, minimise, close).
    fn draw_title_bar(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        ui.horizontal(|ui| {
            // Draggable title area
            let title_resp = ui.label(
                egui::RichText::new("Companion Chat")
                    .color(egui::Color32::from_rgb(200, 200, 200))
                    .size(13.0),
            );
            if title_resp.is_pointer_button_down_on() {
                if let Some(outer_rect) = ctx.input(|i| i.viewport().outer_rect) {
                    let delta = ctx.input(|i| i.pointer.delta());
                    ctx.send_viewport_cmd(egui::ViewportCommand::OuterPosition(
                        outer_rect.min + delta,
                    ));
                }
            }

            // Right-aligned window controls
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                // Close
                if ui
                    .add(
                        egui::Button::new(
                            egui::RichText::new("x")
                                .color(egui::Color32::from_rgb(200, 100, 100))
                                .size(12.0),
                        )
                        .frame(false),
                    )
                    .clicked()
                {
                    ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                }
                // Minimise
                if ui
                    .add(
                        egui::Button::new(
                            egui::RichText::new("-")
                                .color(egui::Color32::from_rgb(150, 150, 150))
                                .size(12.0),
                        )
                        .frame(false),
                    )
                    .clicked()
                {
                    ctx.send_viewport_cmd(egui::ViewportCommand::Minimized(true));
                }
                // Settings toggle
                if ui
                    .add(
                        egui::Button::new(
                            egui::RichText::new("=")
                                .color(egui::Color32::from_rgb(150, 150, 150))
                                .size(12.0),
                        )
                        .frame(false),
                    )
                    .clicked()
                {
                    self.show_settings = !self.show_settings;
                }
            });
        });
    }

    // ── Transcript ───────────────────────────────────────────────────────

    /// Render the scrolling transcript, pinned to the newest entry.
    fn draw_transcript(&mut self, ui: &mut egui::Ui) {
        egui::ScrollArea::vertical()
            .stick_to_bottom(true)
            .auto_shrink([false, false])
            .max_height(ui.available_height() - 32.0)
            .show(ui, |ui| {
                if self.transcript.is_empty() {
                    ui.add_space(6.0);
                    ui.centered_and_justified(|ui| {
                        ui.label(
                            egui::RichText::new("Say hello to start a conversation")
                                .color(egui::Color32::from_rgb(120, 120, 120))
                                .size(12.0),
                        );
                    });
                    return;
                }

                for entry in self.transcript.entries() {
                    draw_entry(ui, entry);
                    ui.add_space(3.0);
                }

                if self.awaiting_reply {
                    ui.label(
                        egui::RichText::new(format!("{} thinking...", self.spinner_char()))
                            .color(egui::Color32::from_rgb(68, 136, 255))
                            .size(12.0),
                    );
                }
            });
    }

    // ── Input row ────────────────────────────────────────────────────────

    /// Render the input box and send button.  Enter submits.
    fn draw_input_row(&mut self, ui: &mut egui::Ui) {
        let mut submit = false;
        ui.horizontal(|ui| {
            let response = ui.add(
                egui::TextEdit::singleline(&mut self.input)
                    .hint_text("Type a message...")
                    .desired_width(ui.available_width() - 48.0),
            );
            if response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                submit = true;
                response.request_focus();
            }
            if ui
                .add(egui::Button::new(egui::RichText::new("Send").size(11.0)))
                .clicked()
            {
                submit = true;
            }
        });
        if submit {
            self.send_message();
        }
    }

    // ── Settings panel ───────────────────────────────────────────────────

    /// Render the settings panel: API key, system prompt, voice toggle.
    fn draw_settings(&mut self, ui: &mut egui::Ui) {
        ui.add_space(4.0);
        ui.label(
            egui::RichText::new("API Key")
                .color(egui::Color32::from_rgb(180, 180, 180))
                .size(12.0),
        );
        ui.add(
            egui::TextEdit::singleline(&mut self.api_key_draft)
                .password(true)
                .desired_width(f32::INFINITY),
        );

        ui.add_space(4.0);
        ui.label(
            egui::RichText::new("System Prompt")
                .color(egui::Color32::from_rgb(180, 180, 180))
                .size(12.0),
        );
        ui.add(
            egui::TextEdit::multiline(&mut self.system_prompt_draft)
                .desired_rows(3)
                .desired_width(f32::INFINITY),
        );

        ui.add_space(4.0);
        ui.checkbox(&mut self.tts_enabled_draft, "Speak replies aloud");
        ui.label(
            egui::RichText::new(format!(
                "  voice: {} ({})",
                self.config.tts.voice,
                self.gateway.state().label()
            ))
            .color(egui::Color32::from_rgb(140, 140, 140))
            .size(11.0),
        );
        ui.label(
            egui::RichText::new(format!("  model: {}", self.config.chat.model))
                .color(egui::Color32::from_rgb(140, 140, 140))
                .size(11.0),
        );

        ui.add_space(6.0);
        ui.horizontal(|ui| {
            if ui
                .add(egui::Button::new(egui::RichText::new("Save").size(11.0)))
                .clicked()
            {
                self.save_settings();
            }
            if ui
                .add(egui::Button::new(egui::RichText::new("Cancel").size(11.0)))
                .clicked()
            {
                // Discard drafts.
                self.api_key_draft = self.config.chat.api_key.clone().unwrap_or_default();
                self.system_prompt_draft = self.config.chat.system_prompt.clone();
                self.tts_enabled_draft = self.config.tts.enabled;
                self.show_settings = false;
            }
        });
    }

    // ── Helpers ──────────────────────────────────────────────────────────

    /// A simple rotating ASCII spinner character driven by `spinner_phase`.
    fn spinner_char(&self) -> char {
        let chars = ['|', '/', '-', '\\'];
        let idx = (self.spinner_phase as usize) % chars.len();
        chars[idx]
    }
}

/// Render a single transcript entry with its role prefix and colour.
fn draw_entry(ui: &mut egui::Ui, entry: &TranscriptEntry) {
    if entry.is_error {
        ui.label(
            egui::RichText::new(entry.text.as_str())
                .color(egui::Color32::from_rgb(255, 136, 68))
                .size(12.0),
        );
        return;
    }
    let (prefix, color) = match entry.role {
        Role::User => ("You:", egui::Color32::from_rgb(120, 170, 255)),
        Role::Assistant => ("AI:", egui::Color32::from_rgb(80, 200, 120)),
    };
    ui.horizontal_wrapped(|ui| {
        ui.label(egui::RichText::new(prefix).color(color).size(12.0).strong());
        ui.label(
            egui::RichText::new(entry.text.as_str())
                .color(egui::Color32::from_rgb(210, 210, 210))
                .size(12.0),
        );
    });
}

// ---------------------------------------------------------------------------
// eframe::App impl
// ---------------------------------------------------------------------------

impl eframe::App for CompanionApp {
    /// Called every frame by eframe.  Polls the event channel, advances the
    /// spinner, then renders the widget.
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // --- Poll non-blocking channels ------------------------------------
        self.poll_events();

        // --- Advance spinner animation -------------------------------------
        self.spinner_phase += 0.08;
        if self.spinner_phase >= 4.0 {
            self.spinner_phase = 0.0;
        }

        // --- Schedule repaints ---------------------------------------------
        if self.awaiting_reply {
            // ~15 fps for the spinner while a reply is in flight
            ctx.request_repaint_after(Duration::from_millis(66));
        } else {
            // Keep polling the event channel for detached speech errors
            ctx.request_repaint_after(Duration::from_millis(200));
        }

        // --- Dark background frame -----------------------------------------
        let frame = egui::Frame::new()
            .fill(egui::Color32::from_rgba_premultiplied(30, 30, 30, 240))
            .corner_radius(egui::CornerRadius::same(8))
            .inner_margin(egui::Margin::same(8));

        egui::CentralPanel::default().frame(frame).show(ctx, |ui| {
            self.draw_title_bar(ui, ctx);
            ui.separator();

            if self.show_settings {
                self.draw_settings(ui);
                return;
            }

            self.draw_transcript(ui);
            ui.separator();
            self.draw_input_row(ui);
        });
    }

    /// Persist window position on exit (best-effort).
    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        log::info!("companion chat widget closing");
    }
}

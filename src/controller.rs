//! Conversation controller — the async loop between the UI and the backends.
//!
//! The UI pushes [`ControllerCommand`]s over one channel; the controller
//! pushes [`ControllerEvent`]s (transcript entries) back over another.  A
//! send is strictly ordered: the user turn is emitted before the chat
//! request starts, then exactly one assistant or error turn follows.
//!
//! Speaking a reply is fire-and-forget: the synthesis task is detached so a
//! slow engine never delays the next exchange, but its failure is routed
//! back here as an error turn rather than dropped.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::chat::{ChatBackend, OpenRouterClient};
use crate::config::ChatConfig;
use crate::tts::SpeechGateway;

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Requests from the UI thread.
#[derive(Debug, Clone)]
pub enum ControllerCommand {
    /// Forward one user message to the chat backend.
    Send { text: String },
    /// Settings were saved; rebuild the chat client with the new key,
    /// prompt, and model.
    UpdateChatConfig(ChatConfig),
}

/// Transcript entries for the UI thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerEvent {
    UserTurn { text: String },
    AssistantTurn { text: String },
    ErrorTurn { message: String },
}

// ---------------------------------------------------------------------------
// Controller loop
// ---------------------------------------------------------------------------

/// Run the command loop until the command channel closes.
///
/// `backend` handles chat completions; `gateway` speaks replies when
/// enabled.  Rebuilding the backend on [`ControllerCommand::UpdateChatConfig`]
/// only works for the real client, so the loop holds it as a trait object
/// and swaps it wholesale.
pub async fn run_controller(
    mut backend: Arc<dyn ChatBackend>,
    gateway: Arc<SpeechGateway>,
    mut command_rx: mpsc::Receiver<ControllerCommand>,
    event_tx: mpsc::Sender<ControllerEvent>,
) {
    while let Some(command) = command_rx.recv().await {
        match command {
            ControllerCommand::Send { text } => {
                let text = text.trim().to_string();
                if text.is_empty() {
                    continue;
                }
                handle_send(&*backend, &gateway, &text, &event_tx).await;
            }
            ControllerCommand::UpdateChatConfig(config) => {
                log::info!("chat configuration updated; rebuilding client");
                backend = Arc::new(OpenRouterClient::from_config(&config));
            }
        }
    }
    log::debug!("controller channel closed; exiting");
}

async fn handle_send(
    backend: &dyn ChatBackend,
    gateway: &Arc<SpeechGateway>,
    text: &str,
    event_tx: &mpsc::Sender<ControllerEvent>,
) {
    // The user turn appears before the (potentially slow) network call.
    let _ = event_tx
        .send(ControllerEvent::UserTurn {
            text: text.to_string(),
        })
        .await;

    match backend.reply(text).await {
        Ok(reply) => {
            let _ = event_tx
                .send(ControllerEvent::AssistantTurn {
                    text: reply.clone(),
                })
                .await;
            if gateway.is_enabled() {
                spawn_speak(Arc::clone(gateway), reply, event_tx.clone());
            }
        }
        Err(e) => {
            log::error!("chat request failed: {e}");
            let _ = event_tx
                .send(ControllerEvent::ErrorTurn {
                    message: e.to_string(),
                })
                .await;
        }
    }
}

/// Speak `reply` on a detached task.  Synthesis is CPU-bound, so the actual
/// work runs under `spawn_blocking`; any failure (including a panic in the
/// synthesis backend) comes back as an error turn.
fn spawn_speak(
    gateway: Arc<SpeechGateway>,
    reply: String,
    event_tx: mpsc::Sender<ControllerEvent>,
) {
    tokio::spawn(async move {
        let result = tokio::task::spawn_blocking(move || gateway.speak(&reply)).await;
        let message = match result {
            Ok(Ok(())) => return,
            Ok(Err(e)) => e.to_string(),
            Err(join_err) => format!("TTS Error: {join_err}"),
        };
        log::error!("speech failed: {message}");
        let _ = event_tx.send(ControllerEvent::ErrorTurn { message }).await;
    });
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

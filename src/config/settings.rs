//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.
//!
//! Absent settings never fail a load: a missing file yields
//! `AppConfig::default()`, and every section/field carries a serde default so
//! a hand-edited partial file fills in the built-ins.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

/// System prompt used when the user has never saved one.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a friendly and helpful AI companion, \
like Replika. You are here to chat, offer support, and engage in interesting conversations.";

// ---------------------------------------------------------------------------
// ChatConfig
// ---------------------------------------------------------------------------

/// Settings for the remote chat-completions API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Bearer token for the API. `None` means the feature is unconfigured —
    /// the client refuses to send anything until a key is saved.
    pub api_key: Option<String>,
    /// System prompt sent as the first turn of every request.
    pub system_prompt: String,
    /// Base URL of the API endpoint (no trailing slash).
    ///
    /// Default: `https://openrouter.ai/api`.  Tests point this at a local
    /// mock server.
    pub base_url: String,
    /// Model identifier sent with every request.
    pub model: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
            base_url: "https://openrouter.ai/api".into(),
            model: "deepseek/deepseek-chat-v3-0324:free".into(),
        }
    }
}

impl ChatConfig {
    /// Store `raw` as the API key, trimming surrounding whitespace.
    ///
    /// An empty (or whitespace-only) value clears the key entirely, so an
    /// emptied settings field reloads as "unset" rather than as an
    /// empty-string key.
    pub fn set_api_key(&mut self, raw: &str) {
        let trimmed = raw.trim();
        self.api_key = if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        };
    }

    /// Store `raw` as the system prompt, trimming surrounding whitespace.
    ///
    /// An emptied field reverts to [`DEFAULT_SYSTEM_PROMPT`].
    pub fn set_system_prompt(&mut self, raw: &str) {
        let trimmed = raw.trim();
        self.system_prompt = if trimmed.is_empty() {
            DEFAULT_SYSTEM_PROMPT.into()
        } else {
            trimmed.to_string()
        };
    }
}

// ---------------------------------------------------------------------------
// TtsConfig
// ---------------------------------------------------------------------------

/// Settings for the text-to-speech subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TtsConfig {
    /// Whether assistant replies are spoken aloud.
    pub enabled: bool,
    /// Voice name — the file stem of a Piper voice under the voices
    /// directory (`<voice>.onnx` + `<voice>.onnx.json`).
    pub voice: String,
    /// Speaker identity for multi-speaker voices.  0 selects the default
    /// speaker, which is the only speaker in single-voice models like Amy.
    pub speaker_id: u32,
    /// Playback speed multiplier; 1.0 is the voice's native speed.
    pub speed: f32,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            voice: "en_US-amy-low".into(),
            speaker_id: 0,
            speed: 1.0,
        }
    }
}

// ---------------------------------------------------------------------------
// UiConfig
// ---------------------------------------------------------------------------

/// egui widget appearance and behaviour settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Last saved widget position `(x, y)` in screen pixels.  `None` means
    /// let the OS / window manager pick a position on first launch.
    pub window_position: Option<(f32, f32)>,
    /// Keep the widget floating above all other windows.
    pub always_on_top: bool,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            window_position: None,
            always_on_top: true,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use companion_chat::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Remote chat API settings.
    pub chat: ChatConfig,
    /// Text-to-speech settings.
    pub tts: TtsConfig,
    /// UI / widget settings.
    pub ui: UiConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet
    /// (first-run scenario) so callers never need to special-case a missing
    /// file.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    /// Verify that a default `AppConfig` can be serialised to TOML and
    /// deserialised back without any data loss.
    #[test]
    fn round_trip_toml() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");

        let original = AppConfig::default();
        original.save_to(&path).expect("save");

        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(original.chat.api_key, loaded.chat.api_key);
        assert_eq!(original.chat.system_prompt, loaded.chat.system_prompt);
        assert_eq!(original.chat.base_url, loaded.chat.base_url);
        assert_eq!(original.chat.model, loaded.chat.model);

        assert_eq!(original.tts.enabled, loaded.tts.enabled);
        assert_eq!(original.tts.voice, loaded.tts.voice);
        assert_eq!(original.tts.speaker_id, loaded.tts.speaker_id);
        assert_eq!(original.tts.speed, loaded.tts.speed);

        assert_eq!(original.ui.always_on_top, loaded.ui.always_on_top);
        assert_eq!(original.ui.window_position, loaded.ui.window_position);
    }

    /// `load_from` on a non-existent path must return `Default` without error.
    #[test]
    fn load_missing_returns_default() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nonexistent.toml");

        let config = AppConfig::load_from(&path).expect("should not error");

        assert!(config.chat.api_key.is_none());
        assert_eq!(config.chat.system_prompt, DEFAULT_SYSTEM_PROMPT);
        assert!(!config.tts.enabled);
    }

    /// Verify default values.
    #[test]
    fn default_values() {
        let cfg = AppConfig::default();

        assert!(cfg.chat.api_key.is_none());
        assert_eq!(cfg.chat.system_prompt, DEFAULT_SYSTEM_PROMPT);
        assert_eq!(cfg.chat.base_url, "https://openrouter.ai/api");
        assert_eq!(cfg.chat.model, "deepseek/deepseek-chat-v3-0324:free");
        assert!(!cfg.tts.enabled);
        assert_eq!(cfg.tts.voice, "en_US-amy-low");
        assert_eq!(cfg.tts.speaker_id, 0);
        assert_eq!(cfg.tts.speed, 1.0);
        assert!(cfg.ui.always_on_top);
    }

    /// Verify that modified non-default values survive a round trip.
    #[test]
    fn round_trip_modified_values() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("modified.toml");

        let mut cfg = AppConfig::default();
        cfg.chat.api_key = Some("sk-or-test".into());
        cfg.chat.system_prompt = "Answer in haiku.".into();
        cfg.chat.model = "openai/gpt-4o-mini".into();
        cfg.tts.enabled = true;
        cfg.tts.speaker_id = 3;
        cfg.tts.speed = 1.25;
        cfg.ui.window_position = Some((100.0, 200.0));

        cfg.save_to(&path).expect("save");
        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(loaded.chat.api_key, Some("sk-or-test".into()));
        assert_eq!(loaded.chat.system_prompt, "Answer in haiku.");
        assert_eq!(loaded.chat.model, "openai/gpt-4o-mini");
        assert!(loaded.tts.enabled);
        assert_eq!(loaded.tts.speaker_id, 3);
        assert_eq!(loaded.tts.speed, 1.25);
        assert_eq!(loaded.ui.window_position, Some((100.0, 200.0)));
    }

    // --- set_api_key / set_system_prompt trimming semantics ---

    #[test]
    fn set_api_key_trims_whitespace() {
        let mut cfg = ChatConfig::default();
        cfg.set_api_key("  sk-or-abc  ");
        assert_eq!(cfg.api_key, Some("sk-or-abc".into()));
    }

    #[test]
    fn set_api_key_empty_clears_key() {
        let mut cfg = ChatConfig::default();
        cfg.set_api_key("sk-or-abc");
        cfg.set_api_key("   ");
        assert!(cfg.api_key.is_none());
    }

    /// Saving an emptied key and reloading must report "unset", not an
    /// empty-string key.
    #[test]
    fn emptied_key_reloads_as_unset() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");

        let mut cfg = AppConfig::default();
        cfg.chat.set_api_key("sk-or-abc");
        cfg.save_to(&path).expect("save");

        let mut cfg = AppConfig::load_from(&path).expect("load");
        cfg.chat.set_api_key("");
        cfg.save_to(&path).expect("save");

        let reloaded = AppConfig::load_from(&path).expect("reload");
        assert_eq!(reloaded.chat.api_key, None);
    }

    #[test]
    fn empty_system_prompt_reverts_to_default() {
        let mut cfg = ChatConfig::default();
        cfg.set_system_prompt("Be terse.");
        assert_eq!(cfg.system_prompt, "Be terse.");
        cfg.set_system_prompt("  ");
        assert_eq!(cfg.system_prompt, DEFAULT_SYSTEM_PROMPT);
    }

    /// save(load()) is idempotent: a second save/load cycle yields the same
    /// effective values.
    #[test]
    fn save_load_is_idempotent() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");

        let mut cfg = AppConfig::default();
        cfg.chat.set_api_key("sk-or-abc");
        cfg.tts.enabled = true;
        cfg.save_to(&path).expect("save");

        let first = AppConfig::load_from(&path).expect("load");
        first.save_to(&path).expect("re-save");
        let second = AppConfig::load_from(&path).expect("re-load");

        assert_eq!(first.chat.api_key, second.chat.api_key);
        assert_eq!(first.chat.system_prompt, second.chat.system_prompt);
        assert_eq!(first.tts.enabled, second.tts.enabled);
    }
}

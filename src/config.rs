//! Configuration loading with env-var overrides.
//!
//! Reads `config/default.toml` relative to the current working directory,
//! then applies `PALITRA_LOG_LEVEL` and `PALITRA_EMOTION_API_URL` env
//! overrides. Secrets (`TELEGRAM_BOT_TOKEN`, `LLM_API_KEY`) are only ever
//! sourced from the environment, never from TOML.

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::error::AppError;

/// Telegram channel configuration.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    /// Whether the Telegram channel is explicitly enabled.
    pub enabled: bool,
}

/// Comms subsystem configuration.
#[derive(Debug, Clone)]
pub struct CommsConfig {
    pub telegram: TelegramConfig,
}

/// Bot-side emotion service client configuration (`[emotion]`).
#[derive(Debug, Clone)]
pub struct EmotionConfig {
    /// Base URL of the emotion analysis service (no trailing slash).
    pub api_base_url: String,
    /// Per-request HTTP timeout in seconds.
    pub timeout_seconds: u64,
}

/// Emotion analysis service configuration (`[emotion_api]`) — only read by
/// the `palitra-emotion-api` binary.
#[derive(Debug, Clone)]
pub struct EmotionApiConfig {
    /// Socket address the service binds to.
    pub bind: String,
    /// Which backend is active (`"onnx"` or `"mock"`).
    pub backend: String,
    /// Path to the face detector ONNX model (already expanded, no `~`).
    pub detector_model: PathBuf,
    /// Path to the emotion classifier ONNX model (already expanded, no `~`).
    pub classifier_model: PathBuf,
}

/// OpenAI / OpenAI-compatible provider configuration (`[llm.openai]`).
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// Full chat completions endpoint URL.
    pub api_base_url: String,
    /// Model name passed in the request body.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Upper bound on generated tokens per recommendation.
    pub max_tokens: u32,
    /// Per-request HTTP timeout in seconds.
    pub timeout_seconds: u64,
}

/// LLM subsystem configuration.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Which provider is active (e.g. `"dummy"`, `"openai"`).
    /// Maps to `default` in `[llm]` TOML — named `default` there to signal
    /// that other provider sections can coexist without being loaded.
    pub provider: String,
    /// Config for the OpenAI / OpenAI-compatible provider.
    pub openai: OpenAiConfig,
}

/// Fully-resolved configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub bot_name: String,
    pub log_level: String,
    pub comms: CommsConfig,
    pub emotion: EmotionConfig,
    pub emotion_api: EmotionApiConfig,
    pub llm: LlmConfig,
    /// API key from `LLM_API_KEY` env var — `None` means the bot falls back
    /// to its built-in recommendation texts.
    pub llm_api_key: Option<String>,
}

impl Config {
    /// Returns `true` if the Telegram channel should be loaded.
    pub fn comms_telegram_should_load(&self) -> bool {
        self.comms.telegram.enabled
    }
}

/// Raw TOML shape — `serde` target before resolution.
#[derive(Deserialize)]
struct RawConfig {
    supervisor: RawSupervisor,
    #[serde(default)]
    comms: RawComms,
    #[serde(default)]
    emotion: RawEmotion,
    #[serde(default)]
    emotion_api: RawEmotionApi,
    #[serde(default)]
    llm: RawLlm,
}

#[derive(Deserialize)]
struct RawSupervisor {
    bot_name: String,
    log_level: String,
}

#[derive(Deserialize, Default)]
struct RawComms {
    #[serde(default)]
    telegram: RawTelegram,
}

#[derive(Deserialize)]
struct RawTelegram {
    /// Defaults to `true`: Telegram is the only user-facing channel.
    #[serde(default = "default_true")]
    enabled: bool,
}

impl Default for RawTelegram {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Deserialize)]
struct RawEmotion {
    #[serde(default = "default_emotion_api_base_url")]
    api_base_url: String,
    #[serde(default = "default_emotion_timeout_seconds")]
    timeout_seconds: u64,
}

impl Default for RawEmotion {
    fn default() -> Self {
        Self {
            api_base_url: default_emotion_api_base_url(),
            timeout_seconds: default_emotion_timeout_seconds(),
        }
    }
}

fn default_emotion_api_base_url() -> String { "http://127.0.0.1:8001".to_string() }
fn default_emotion_timeout_seconds() -> u64 { 30 }

#[derive(Deserialize)]
struct RawEmotionApi {
    #[serde(default = "default_emotion_api_bind")]
    bind: String,
    #[serde(default = "default_emotion_backend")]
    backend: String,
    #[serde(default = "default_detector_model")]
    detector_model: String,
    #[serde(default = "default_classifier_model")]
    classifier_model: String,
}

impl Default for RawEmotionApi {
    fn default() -> Self {
        Self {
            bind: default_emotion_api_bind(),
            backend: default_emotion_backend(),
            detector_model: default_detector_model(),
            classifier_model: default_classifier_model(),
        }
    }
}

fn default_emotion_api_bind() -> String { "127.0.0.1:8001".to_string() }
fn default_emotion_backend() -> String { "onnx".to_string() }
fn default_detector_model() -> String { "models/face-detector.onnx".to_string() }
fn default_classifier_model() -> String { "models/emotion-ferplus.onnx".to_string() }

#[derive(Deserialize)]
struct RawLlm {
    /// Maps to `default = "..."` in `[llm]`.
    #[serde(rename = "default", default = "default_llm_provider")]
    provider: String,
    #[serde(default)]
    openai: RawOpenAiConfig,
}

impl Default for RawLlm {
    fn default() -> Self {
        Self { provider: default_llm_provider(), openai: RawOpenAiConfig::default() }
    }
}

#[derive(Deserialize)]
struct RawOpenAiConfig {
    #[serde(default = "default_openai_api_base_url")]
    api_base_url: String,
    #[serde(default = "default_openai_model")]
    model: String,
    #[serde(default = "default_openai_temperature")]
    temperature: f32,
    #[serde(default = "default_openai_max_tokens")]
    max_tokens: u32,
    #[serde(default = "default_openai_timeout_seconds")]
    timeout_seconds: u64,
}

impl Default for RawOpenAiConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_openai_api_base_url(),
            model: default_openai_model(),
            temperature: default_openai_temperature(),
            max_tokens: default_openai_max_tokens(),
            timeout_seconds: default_openai_timeout_seconds(),
        }
    }
}

fn default_llm_provider() -> String { "openai".to_string() }
fn default_openai_api_base_url() -> String { "https://api.openai.com/v1/chat/completions".to_string() }
fn default_openai_model() -> String { "gpt-3.5-turbo".to_string() }
fn default_openai_temperature() -> f32 { 0.7 }
fn default_openai_max_tokens() -> u32 { 300 }
fn default_openai_timeout_seconds() -> u64 { 60 }

fn default_true() -> bool {
    true
}

/// Load config from `config/default.toml`, then apply env-var overrides.
pub fn load() -> Result<Config, AppError> {
    let log_level_override = env::var("PALITRA_LOG_LEVEL").ok();
    let emotion_url_override = env::var("PALITRA_EMOTION_API_URL").ok();
    load_from(
        Path::new("config/default.toml"),
        log_level_override.as_deref(),
        emotion_url_override.as_deref(),
    )
}

/// Internal loader — accepts an explicit path and optional overrides.
/// Tests pass overrides directly instead of mutating env vars.
pub fn load_from(
    path: &Path,
    log_level_override: Option<&str>,
    emotion_url_override: Option<&str>,
) -> Result<Config, AppError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;

    let parsed: RawConfig = toml::from_str(&raw)
        .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?;

    let log_level = log_level_override
        .unwrap_or(&parsed.supervisor.log_level)
        .to_string();
    let emotion_base_url = emotion_url_override
        .unwrap_or(&parsed.emotion.api_base_url)
        .trim_end_matches('/')
        .to_string();

    Ok(Config {
        bot_name: parsed.supervisor.bot_name,
        log_level,
        comms: CommsConfig {
            telegram: TelegramConfig {
                enabled: parsed.comms.telegram.enabled,
            },
        },
        emotion: EmotionConfig {
            api_base_url: emotion_base_url,
            timeout_seconds: parsed.emotion.timeout_seconds,
        },
        emotion_api: EmotionApiConfig {
            bind: parsed.emotion_api.bind,
            backend: parsed.emotion_api.backend,
            detector_model: expand_home(&parsed.emotion_api.detector_model),
            classifier_model: expand_home(&parsed.emotion_api.classifier_model),
        },
        llm: LlmConfig {
            provider: parsed.llm.provider,
            openai: OpenAiConfig {
                api_base_url: parsed.llm.openai.api_base_url,
                model: parsed.llm.openai.model,
                temperature: parsed.llm.openai.temperature,
                max_tokens: parsed.llm.openai.max_tokens,
                timeout_seconds: parsed.llm.openai.timeout_seconds,
            },
        },
        llm_api_key: env::var("LLM_API_KEY").ok(),
    })
}

/// Expand a leading `~` to the user's home directory.
/// Absolute or relative paths without `~` are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

// ── test helpers ──────────────────────────────────────────────────────────────

/// Safe `Config` for unit tests — dummy LLM, mock backend, no external calls.
#[cfg(test)]
impl Config {
    pub fn test_default() -> Self {
        Self {
            bot_name: "test".into(),
            log_level: "info".into(),
            comms: CommsConfig {
                telegram: TelegramConfig { enabled: false },
            },
            emotion: EmotionConfig {
                api_base_url: "http://localhost:0".into(),
                timeout_seconds: 1,
            },
            emotion_api: EmotionApiConfig {
                bind: "127.0.0.1:0".into(),
                backend: "mock".into(),
                detector_model: PathBuf::from("models/face-detector.onnx"),
                classifier_model: PathBuf::from("models/emotion-ferplus.onnx"),
            },
            llm: LlmConfig {
                provider: "dummy".into(),
                openai: OpenAiConfig {
                    api_base_url: "http://localhost:0/v1/chat/completions".into(),
                    model: "test-model".into(),
                    temperature: 0.0,
                    max_tokens: 16,
                    timeout_seconds: 1,
                },
            },
            llm_api_key: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MINIMAL_TOML: &str = r#"
[supervisor]
bot_name = "test-bot"
log_level = "info"
"#;

    fn write_toml(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    #[test]
    fn parse_minimal_config() {
        let f = write_toml(MINIMAL_TOML);
        let cfg = load_from(f.path(), None, None).unwrap();
        assert_eq!(cfg.bot_name, "test-bot");
        assert_eq!(cfg.log_level, "info");
        // Section defaults apply when the section is absent.
        assert!(cfg.comms.telegram.enabled);
        assert_eq!(cfg.emotion.api_base_url, "http://127.0.0.1:8001");
        assert_eq!(cfg.emotion_api.backend, "onnx");
        assert_eq!(cfg.llm.provider, "openai");
        assert_eq!(cfg.llm.openai.max_tokens, 300);
    }

    #[test]
    fn emotion_url_trailing_slash_is_stripped() {
        let f = write_toml(
            r#"
[supervisor]
bot_name = "test-bot"
log_level = "info"

[emotion]
api_base_url = "http://10.0.0.2:9000/"
"#,
        );
        let cfg = load_from(f.path(), None, None).unwrap();
        assert_eq!(cfg.emotion.api_base_url, "http://10.0.0.2:9000");
    }

    #[test]
    fn log_level_override_wins() {
        let f = write_toml(MINIMAL_TOML);
        let cfg = load_from(f.path(), Some("debug"), None).unwrap();
        assert_eq!(cfg.log_level, "debug");
    }

    #[test]
    fn emotion_url_override_wins() {
        let f = write_toml(MINIMAL_TOML);
        let cfg = load_from(f.path(), None, Some("http://elsewhere:8001")).unwrap();
        assert_eq!(cfg.emotion.api_base_url, "http://elsewhere:8001");
    }

    #[test]
    fn missing_file_errors() {
        let result = load_from(Path::new("/nonexistent/config.toml"), None, None);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("config error"));
    }

    #[test]
    fn tilde_expands_to_home() {
        let home = dirs::home_dir().expect("home dir must exist in test env");
        let expanded = expand_home("~/models/x.onnx");
        assert!(expanded.starts_with(&home));
        assert!(expanded.ends_with("models/x.onnx"));
    }

    #[test]
    fn absolute_path_unchanged() {
        assert_eq!(expand_home("/absolute/path"), PathBuf::from("/absolute/path"));
    }

    #[test]
    fn test_default_makes_no_external_calls() {
        // The helper other modules' tests rely on must stay offline.
        let cfg = Config::test_default();
        assert_eq!(cfg.llm.provider, "dummy");
        assert_eq!(cfg.emotion_api.backend, "mock");
        assert!(cfg.llm_api_key.is_none());
        assert!(!cfg.comms_telegram_should_load());
    }
}

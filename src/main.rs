//! Palitra Bot — Telegram bot process entry point.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Load config
//!   3. Init logger at configured level
//!   4. Build the emotion service client and the recommender
//!   5. Run comms channels until ctrl-c

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use palitra_bot::comms::{self, CommsState};
use palitra_bot::config::{self, Config};
use palitra_bot::emotion::client::EmotionClient;
use palitra_bot::error::AppError;
use palitra_bot::llm::{providers, LlmProvider};
use palitra_bot::logger;
use palitra_bot::therapy::Recommender;

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

#[tokio::main]
async fn run() -> Result<(), AppError> {
    // Load .env if present — ignore errors (file is optional).
    let _ = dotenvy::dotenv();

    let config = config::load()?;
    logger::init(&config.log_level)?;

    info!(
        bot_name = %config.bot_name,
        log_level = %config.log_level,
        emotion_api = %config.emotion.api_base_url,
        "config loaded"
    );

    let emotion_client = EmotionClient::new(&config.emotion)
        .map_err(|e| AppError::Comms(e.to_string()))?;

    let recommender = Recommender::new(build_provider(&config)?);
    if !recommender.has_provider() {
        warn!("LLM_API_KEY not set — recommendations use built-in texts");
    }

    let state = Arc::new(CommsState::new(emotion_client, recommender));

    let shutdown = CancellationToken::new();
    spawn_ctrl_c_handler(shutdown.clone());

    comms::start(&config, state, shutdown).join().await
}

/// Build the LLM provider, or `None` when the bot should run on built-in
/// fallback texts.
///
/// Hosted OpenAI needs a key; `"openai-compatible"` covers keyless local
/// servers and builds regardless.
fn build_provider(config: &Config) -> Result<Option<LlmProvider>, AppError> {
    if config.llm.provider == "openai" && config.llm_api_key.is_none() {
        return Ok(None);
    }
    providers::build(&config.llm, config.llm_api_key.clone())
        .map(Some)
        .map_err(|e| AppError::Config(e.to_string()))
}

fn spawn_ctrl_c_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received — shutting down");
            shutdown.cancel();
        }
    });
}

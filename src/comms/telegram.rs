//! Telegram comms channel — receives photos via the Telegram API, runs them
//! through emotion analysis + recommendation, and replies to the user.

use std::env;
use std::sync::Arc;

use teloxide::dptree;
use teloxide::payloads::SendMessageSetters;
use teloxide::prelude::*;
use teloxide::types::{ChatAction, ChatId, ParseMode};
use teloxide::utils::command::BotCommands;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::emotion::client::AnalyzeOutcome;
use crate::error::AppError;
use crate::runtime::{Component, ComponentFuture};
use crate::therapy::texts;

use super::state::CommsState;

// ── Constants ────────────────────────────────────────────────────────────────

/// Telegram has a 4096 character limit per message.
/// We chunk at 4000 to be safe.
const MAX_MESSAGE_LENGTH: usize = 4000;

// ── Commands ─────────────────────────────────────────────────────────────────

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase")]
enum Command {
    Start,
    Help,
}

// ── TelegramChannel ──────────────────────────────────────────────────────────

/// A Telegram channel instance.
pub struct TelegramChannel {
    channel_id: String,
    state: Arc<CommsState>,
}

impl TelegramChannel {
    pub fn new(channel_id: impl Into<String>, state: Arc<CommsState>) -> Self {
        Self { channel_id: channel_id.into(), state }
    }
}

impl Component for TelegramChannel {
    fn id(&self) -> &str {
        &self.channel_id
    }

    fn run(self: Box<Self>, shutdown: CancellationToken) -> ComponentFuture {
        Box::pin(run_telegram(self.channel_id, self.state, shutdown))
    }
}

// ── Dispatcher context ───────────────────────────────────────────────────────

/// Per-dispatcher context injected into handlers via dptree dependencies.
#[derive(Clone)]
struct BotContext {
    state: Arc<CommsState>,
    /// Bot token, needed to build file-download URLs.
    token: String,
    /// Plain HTTP client for file downloads from the Bot API file server.
    http: reqwest::Client,
}

// ── run_telegram ─────────────────────────────────────────────────────────────

async fn run_telegram(
    channel_id: String,
    state: Arc<CommsState>,
    shutdown: CancellationToken,
) -> Result<(), AppError> {
    let token = match env::var("TELEGRAM_BOT_TOKEN") {
        Ok(t) => t,
        Err(_) => {
            warn!(%channel_id, "TELEGRAM_BOT_TOKEN not set, telegram channel exiting");
            return Ok(());
        }
    };

    info!(%channel_id, "telegram channel starting");

    // The bot degrades without the analysis service (photos will error), so
    // an unreachable service is a warning, not a startup failure.
    match state.emotion_service_health().await {
        Ok(()) => info!(%channel_id, "emotion analysis service is available"),
        Err(e) => warn!(%channel_id, "emotion analysis service unreachable: {e}"),
    }

    let bot = Bot::new(token.clone());
    let http = reqwest::Client::builder()
        .build()
        .map_err(|e| AppError::Comms(format!("failed to build download client: {e}")))?;
    let ctx = BotContext { state, token, http };

    let handler = Update::filter_message()
        .branch(dptree::entry().filter_command::<Command>().endpoint(handle_command))
        .branch(dptree::filter(|msg: Message| msg.photo().is_some()).endpoint(handle_photo))
        .endpoint(handle_other);

    let mut dispatcher = Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![ctx])
        .build();

    tokio::select! {
        biased;

        _ = shutdown.cancelled() => {
            info!(%channel_id, "shutdown signal received — closing telegram channel");
        }
        _ = dispatcher.dispatch() => {
            warn!(%channel_id, "telegram dispatcher exited unexpectedly");
        }
    }

    Ok(())
}

// ── Handlers ─────────────────────────────────────────────────────────────────

async fn handle_command(bot: Bot, msg: Message, cmd: Command) -> ResponseResult<()> {
    let text = match cmd {
        Command::Start => texts::WELCOME,
        Command::Help => texts::HELP,
    };
    bot.send_message(msg.chat.id, text).await?;
    respond(())
}

async fn handle_photo(bot: Bot, msg: Message, ctx: BotContext) -> ResponseResult<()> {
    debug!(
        from = ?msg.from.as_ref().and_then(|u| u.username.as_ref()),
        "telegram received photo"
    );

    bot.send_chat_action(msg.chat.id, ChatAction::Typing).await?;

    let image = match download_photo(&bot, &ctx, &msg).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("photo download failed: {e}");
            bot.send_message(msg.chat.id, texts::PROCESSING_ERROR).await?;
            return respond(());
        }
    };

    match ctx.state.analyze_photo(image).await {
        Ok(AnalyzeOutcome::Detected { dominant, confidence, .. }) => {
            let recommendation = ctx.state.recommend(dominant).await;
            let reply = texts::analysis_reply(dominant, confidence, &recommendation);
            send_chunked(&bot, msg.chat.id, &reply, true).await;
        }
        Ok(AnalyzeOutcome::NoFace) => {
            send_chunked(&bot, msg.chat.id, texts::NO_FACE, true).await;
        }
        Err(e) => {
            warn!("emotion analysis failed: {e}");
            bot.send_message(msg.chat.id, texts::ANALYZE_ERROR).await?;
        }
    }

    respond(())
}

async fn handle_other(bot: Bot, msg: Message) -> ResponseResult<()> {
    bot.send_message(msg.chat.id, texts::SEND_PHOTO).await?;
    respond(())
}

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Download the largest resolution variant of the message's photo.
async fn download_photo(bot: &Bot, ctx: &BotContext, msg: &Message) -> Result<Vec<u8>, AppError> {
    // Telegram orders sizes ascending; the last one is the largest.
    let photo = msg
        .photo()
        .and_then(|sizes| sizes.last())
        .ok_or_else(|| AppError::Comms("message has no photo".into()))?;

    let file = bot
        .get_file(photo.file.id.clone())
        .await
        .map_err(|e| AppError::Comms(format!("get_file failed: {e}")))?;

    let url = format!("https://api.telegram.org/file/bot{}/{}", ctx.token, file.path);
    let response = ctx
        .http
        .get(&url)
        .send()
        .await
        .map_err(|e| AppError::Comms(format!("file download failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(AppError::Comms(format!("file download returned HTTP {status}")));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| AppError::Comms(format!("file download read failed: {e}")))?;

    Ok(bytes.to_vec())
}

/// Send `text` in chunks under the Telegram message limit.
///
/// LLM output occasionally contains markup Telegram rejects; a failed
/// Markdown send is retried as plain text so the user still gets the reply.
async fn send_chunked(bot: &Bot, chat_id: ChatId, text: &str, markdown: bool) {
    let text = if text.is_empty() { "(empty response)" } else { text };
    let chars: Vec<char> = text.chars().collect();

    for chunk in chars.chunks(MAX_MESSAGE_LENGTH) {
        let chunk: String = chunk.iter().collect();

        let sent = if markdown {
            bot.send_message(chat_id, chunk.clone())
                .parse_mode(ParseMode::Markdown)
                .await
        } else {
            bot.send_message(chat_id, chunk.clone()).await
        };

        match sent {
            Ok(_) => {}
            Err(e) if markdown => {
                warn!("markdown send failed ({e}), retrying as plain text");
                if let Err(e) = bot.send_message(chat_id, chunk).await {
                    warn!("failed to send telegram reply: {e}");
                }
            }
            Err(e) => warn!("failed to send telegram reply: {e}"),
        }
    }
}

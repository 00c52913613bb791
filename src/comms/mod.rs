//! Comms subsystem — manages the bot's external I/O channels.
//!
//! Each channel implements [`Component`] and is spawned as an independent
//! concurrent task by [`start`] via [`spawn_components`]. Channels capture
//! their shared [`Arc<CommsState>`] at construction time; the generic
//! `Component::run` signature only carries the shutdown token.
//!
//! Telegram is currently the only channel; the structure leaves room for
//! more without touching the supervisor.

mod state;
pub mod telegram;

pub use state::CommsState;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Config;
use crate::runtime::{spawn_components, Component, SubsystemHandle};

/// Spawn all configured comms channels and return a [`SubsystemHandle`].
///
/// Synchronous — returns as soon as the tasks are spawned. The caller
/// decides when (or whether) to await the handle.
pub fn start(
    config: &Config,
    state: Arc<CommsState>,
    shutdown: CancellationToken,
) -> SubsystemHandle {
    let mut components: Vec<Box<dyn Component>> = Vec::new();

    if config.comms_telegram_should_load() {
        info!("loading telegram channel");
        components.push(Box::new(telegram::TelegramChannel::new("telegram0", state)));
    }

    if components.is_empty() {
        warn!("no comms channels enabled — the bot has no way to receive messages");
    }

    spawn_components(components, shutdown)
}

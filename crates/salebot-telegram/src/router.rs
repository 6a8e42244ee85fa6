use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};
use tokio_util::sync::CancellationToken;

use salebot_core::{
    app::SaleBot,
    config::{Config, DEFAULT_TIMEOUT_MINUTES},
    messaging::{
        port::MessagingPort,
        throttled::{ThrottleConfig, ThrottledMessenger},
    },
    session::SessionStore,
    store::{timeout_minutes, PostRepository, SettingsRepository},
    sweeper::ExpirationSweeper,
};

use crate::handlers;
use crate::TelegramMessenger;

#[derive(Clone)]
pub struct AppState {
    pub app: Arc<SaleBot>,
}

/// Runs long polling until Ctrl-C, with the expiration sweeper alongside.
pub async fn run_polling<S>(cfg: Arc<Config>, store: Arc<S>) -> anyhow::Result<()>
where
    S: PostRepository + SettingsRepository + 'static,
{
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    match bot.get_me().await {
        Ok(me) => tracing::info!(username = %me.username(), "salebot started"),
        Err(e) => tracing::warn!(error = %e, "get_me failed; continuing"),
    }
    tracing::info!(
        moderation_chat = cfg.moderation_chat.0,
        approved_chat = cfg.approved_chat.0,
        admins = cfg.admins.len(),
        lang = cfg.lang.code(),
        "configuration loaded"
    );

    let messenger: Arc<dyn MessagingPort> = Arc::new(ThrottledMessenger::new(
        Arc::new(TelegramMessenger::new(bot.clone())),
        ThrottleConfig::default(),
    ));

    let app = Arc::new(SaleBot::new(
        &cfg,
        store.clone(),
        store.clone(),
        messenger,
        Arc::new(SessionStore::new()),
    ));

    let ttl = timeout_minutes(
        &*store,
        cfg.timeout_minutes.unwrap_or(DEFAULT_TIMEOUT_MINUTES),
    )
    .await;
    let sweeper = Arc::new(ExpirationSweeper::new(
        store.clone(),
        cfg.effective_sweep_interval(ttl),
        cfg.sweep_budget,
    ));
    let cancel = CancellationToken::new();
    let sweeper_task = sweeper.spawn(cancel.clone());

    let state = Arc::new(AppState { app });

    let handler = dptree::entry()
        .branch(Update::filter_callback_query().endpoint(handlers::handle_callback))
        .branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    cancel.cancel();
    if let Err(e) = sweeper_task.await {
        tracing::warn!(error = %e, "expiration sweeper task failed");
    }
    tracing::info!("salebot stopped");
    Ok(())
}

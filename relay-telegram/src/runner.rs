//! Dispatcher runner: converts teloxide messages and panel button presses into
//! [`InboundEvent`](relay_core::InboundEvent)s and hands them to the relay core.
//!
//! teloxide processes updates of one chat in order and different chats concurrently; the core
//! serializes state access itself.

use std::sync::Arc;

use anyhow::Result;
use relay_core::RelayCore;
use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, Message};
use tracing::{debug, info, instrument, warn};

use crate::adapters::{callback_to_event, TelegramMessageWrapper};

/// Runs until Ctrl-C. Calls get_me() first so a bad token fails loudly in the log.
#[instrument(skip(bot, relay))]
pub async fn run_dispatcher(bot: teloxide::Bot, relay: Arc<RelayCore>) -> Result<()> {
    match bot.get_me().await {
        Ok(me) => info!(
            username = %me.user.username.as_deref().unwrap_or("unknown"),
            "Bot identity confirmed"
        ),
        Err(e) => warn!(error = %e, "get_me failed; continuing"),
    }

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(on_message))
        .branch(Update::filter_callback_query().endpoint(on_callback_query));

    info!("Dispatcher started");
    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![relay])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
    info!("Dispatcher stopped");

    Ok(())
}

async fn on_message(msg: Message, relay: Arc<RelayCore>) -> ResponseResult<()> {
    let Some(event) = TelegramMessageWrapper(&msg).to_event() else {
        debug!(chat_id = msg.chat.id.0, "Ignored message outside private chats");
        return Ok(());
    };

    match event.text.as_deref() {
        Some(text) => info!(
            user_id = event.sender.id.0,
            chat_id = event.chat.0,
            message_content = %text,
            "Received message"
        ),
        None => info!(
            user_id = event.sender.id.0,
            chat_id = event.chat.0,
            "Received non-text message"
        ),
    }

    relay.handle_event(&event).await;
    Ok(())
}

async fn on_callback_query(
    bot: Bot,
    query: CallbackQuery,
    relay: Arc<RelayCore>,
) -> ResponseResult<()> {
    // Clears the button's loading state on the client whatever happens next.
    if let Err(e) = bot.answer_callback_query(query.id.clone()).await {
        warn!(error = %e, "answer_callback_query failed");
    }

    if let Some(event) = callback_to_event(&query) {
        info!(
            user_id = event.sender.id.0,
            data = %event.text.as_deref().unwrap_or(""),
            "Received panel button"
        );
        relay.handle_event(&event).await;
    }
    Ok(())
}

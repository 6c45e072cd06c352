//! Wraps teloxide::Bot and implements [`relay_core::Transport`].

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use relay_core::{ChatId, MenuButton, MessageRef, PhotoRef, RelayError, Result, Transport, UserId};
use teloxide::payloads::setters::*;
use teloxide::prelude::*;
use teloxide::types::{
    ChatId as TgChatId, FileId, InlineKeyboardButton, InlineKeyboardMarkup, InputFile, MessageId,
    UserId as TgUserId,
};
use tracing::debug;

/// How user messages reach the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardMode {
    /// Native forward: the operator sees the sender (unless their privacy settings hide it).
    Forward,
    /// Anonymous copy: the binding table is the only link back to the sender.
    Copy,
}

impl FromStr for ForwardMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "forward" => Ok(ForwardMode::Forward),
            "copy" => Ok(ForwardMode::Copy),
            other => Err(format!("expected forward or copy, got {}", other)),
        }
    }
}

impl fmt::Display for ForwardMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForwardMode::Forward => f.write_str("forward"),
            ForwardMode::Copy => f.write_str("copy"),
        }
    }
}

/// Buttons per keyboard row in `/panel`.
const MENU_ROW_WIDTH: usize = 2;

pub struct TelegramTransport {
    bot: teloxide::Bot,
    mode: ForwardMode,
}

impl TelegramTransport {
    pub fn new(bot: teloxide::Bot, mode: ForwardMode) -> Self {
        Self { bot, mode }
    }

    /// Returns the underlying teloxide::Bot for direct API use when needed.
    pub fn inner(&self) -> &teloxide::Bot {
        &self.bot
    }
}

fn tg_chat(chat: ChatId) -> TgChatId {
    TgChatId(chat.0)
}

fn transport_error(e: teloxide::RequestError) -> RelayError {
    RelayError::Transport(e.to_string())
}

/// Lays buttons out in rows of [`MENU_ROW_WIDTH`]; callback data is the button's command.
pub fn menu_keyboard(buttons: &[MenuButton]) -> InlineKeyboardMarkup {
    let rows: Vec<Vec<InlineKeyboardButton>> = buttons
        .chunks(MENU_ROW_WIDTH)
        .map(|row| {
            row.iter()
                .map(|b| InlineKeyboardButton::callback(b.label.clone(), b.command.clone()))
                .collect()
        })
        .collect();
    InlineKeyboardMarkup::new(rows)
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn send_notice(&self, chat: ChatId, text: &str) -> Result<MessageRef> {
        let sent = self
            .bot
            .send_message(tg_chat(chat), text.to_string())
            .await
            .map_err(transport_error)?;
        Ok(MessageRef(sent.id.0))
    }

    async fn forward_or_copy(
        &self,
        target: ChatId,
        source: ChatId,
        message: MessageRef,
    ) -> Result<MessageRef> {
        let id = match self.mode {
            ForwardMode::Forward => self
                .bot
                .forward_message(tg_chat(target), tg_chat(source), MessageId(message.0))
                .await
                .map(|sent| sent.id),
            ForwardMode::Copy => {
                self.bot
                    .copy_message(tg_chat(target), tg_chat(source), MessageId(message.0))
                    .await
            }
        }
        .map_err(transport_error)?;
        debug!(mode = %self.mode, outbound = id.0, "Relayed to operator");
        Ok(MessageRef(id.0))
    }

    async fn copy_message(
        &self,
        target: ChatId,
        source: ChatId,
        message: MessageRef,
    ) -> Result<MessageRef> {
        let id = self
            .bot
            .copy_message(tg_chat(target), tg_chat(source), MessageId(message.0))
            .await
            .map_err(transport_error)?;
        Ok(MessageRef(id.0))
    }

    async fn profile_photo(&self, user: UserId) -> Result<Option<PhotoRef>> {
        let user_id = u64::try_from(user.0)
            .map_err(|_| RelayError::Transport(format!("invalid user id {}", user)))?;
        let photos = self
            .bot
            .get_user_profile_photos(TgUserId(user_id))
            .limit(1)
            .await
            .map_err(transport_error)?;
        // Sizes are ordered small to large; take the largest of the newest photo.
        Ok(photos
            .photos
            .first()
            .and_then(|sizes| sizes.last())
            .map(|size| PhotoRef(size.file.id.to_string())))
    }

    async fn send_photo(
        &self,
        chat: ChatId,
        photo: &PhotoRef,
        caption: &str,
    ) -> Result<MessageRef> {
        let sent = self
            .bot
            .send_photo(tg_chat(chat), InputFile::file_id(FileId(photo.0.clone())))
            .caption(caption.to_string())
            .await
            .map_err(transport_error)?;
        Ok(MessageRef(sent.id.0))
    }

    async fn send_menu(
        &self,
        chat: ChatId,
        text: &str,
        buttons: &[MenuButton],
    ) -> Result<MessageRef> {
        let sent = self
            .bot
            .send_message(tg_chat(chat), text.to_string())
            .reply_markup(menu_keyboard(buttons))
            .await
            .map_err(transport_error)?;
        Ok(MessageRef(sent.id.0))
    }
}

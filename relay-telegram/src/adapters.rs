//! Adapters from Telegram (teloxide) types to relay_core types.

use chrono::Utc;
use relay_core::{ChatId, InboundEvent, MessageRef, UserId, UserIdentity};
use teloxide::types::{CallbackQuery, Message, User};

/// Wraps a teloxide User for conversion to [`UserIdentity`].
pub struct TelegramUserWrapper<'a>(pub &'a User);

impl<'a> TelegramUserWrapper<'a> {
    /// `None` when the Telegram id does not fit an `i64`.
    pub fn to_identity(&self) -> Option<UserIdentity> {
        let id = i64::try_from(self.0.id.0).ok()?;
        Some(UserIdentity {
            id: UserId(id),
            display_name: self.0.full_name(),
            handle: self.0.username.clone(),
        })
    }
}

/// Wraps a teloxide Message for conversion to [`InboundEvent`].
pub struct TelegramMessageWrapper<'a>(pub &'a Message);

impl<'a> TelegramMessageWrapper<'a> {
    /// `None` for messages the relay does not handle: no sender (channel posts) or not a
    /// private chat.
    pub fn to_event(&self) -> Option<InboundEvent> {
        if !self.0.chat.is_private() {
            return None;
        }
        let from = self.0.from.as_ref()?;
        Some(InboundEvent {
            sender: TelegramUserWrapper(from).to_identity()?,
            chat: ChatId(self.0.chat.id.0),
            message: MessageRef(self.0.id.0),
            reply_to: self.0.reply_to_message().map(|m| MessageRef(m.id.0)),
            text: self
                .0
                .text()
                .or_else(|| self.0.caption())
                .map(str::to_string),
            received_at: Utc::now(),
        })
    }
}

/// A panel button press becomes an event whose text is the button's command, sent from the
/// presser's private chat.
pub fn callback_to_event(query: &CallbackQuery) -> Option<InboundEvent> {
    let data = query.data.as_ref()?;
    let sender = TelegramUserWrapper(&query.from).to_identity()?;
    Some(InboundEvent {
        chat: ChatId::from(sender.id),
        sender,
        message: MessageRef(0),
        reply_to: None,
        text: Some(data.clone()),
        received_at: Utc::now(),
    })
}

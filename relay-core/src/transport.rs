//! Transport abstraction consumed by the relay core.
//!
//! [`Transport`] is platform-agnostic; `relay-telegram` implements it with teloxide and tests
//! substitute a recording double.

use crate::error::Result;
use crate::types::{ChatId, MenuButton, MessageRef, PhotoRef, UserId};
use async_trait::async_trait;

#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends a plain text notice and returns the new message id.
    async fn send_notice(&self, chat: ChatId, text: &str) -> Result<MessageRef>;

    /// Relays a user's message to `target` (forward or copy, per transport setting).
    async fn forward_or_copy(
        &self,
        target: ChatId,
        source: ChatId,
        message: MessageRef,
    ) -> Result<MessageRef>;

    /// Copies a message without attribution. Used for operator replies and broadcasts.
    async fn copy_message(
        &self,
        target: ChatId,
        source: ChatId,
        message: MessageRef,
    ) -> Result<MessageRef>;

    /// Current profile photo of a user, if any.
    async fn profile_photo(&self, user: UserId) -> Result<Option<PhotoRef>>;

    async fn send_photo(&self, chat: ChatId, photo: &PhotoRef, caption: &str)
        -> Result<MessageRef>;

    /// Sends `text` with a button menu attached.
    async fn send_menu(&self, chat: ChatId, text: &str, buttons: &[MenuButton])
        -> Result<MessageRef>;
}

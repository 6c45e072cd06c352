//! Core types: identifiers, user records, moderation flags and inbound events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Platform user id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub i64);

/// Platform chat id. In a private chat it equals the user id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatId(pub i64);

/// Transport-assigned message id, unique within a chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageRef(pub i32);

/// Opaque handle to a stored photo (Telegram file id).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoRef(pub String);

impl From<UserId> for ChatId {
    fn from(user: UserId) -> Self {
        ChatId(user.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for MessageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who sent an event: id, display name and optional @handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: UserId,
    pub display_name: String,
    pub handle: Option<String>,
}

impl UserIdentity {
    pub fn new(id: i64, display_name: impl Into<String>, handle: Option<&str>) -> Self {
        Self {
            id: UserId(id),
            display_name: display_name.into(),
            handle: handle.map(str::to_string),
        }
    }
}

/// Moderation state of a user. Exactly one applies at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModerationFlag {
    #[default]
    None,
    /// Nothing from this user is relayed and broadcasts skip them.
    Banned,
    /// Messages are recorded but never forwarded.
    Silenced,
}

impl ModerationFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModerationFlag::None => "none",
            ModerationFlag::Banned => "banned",
            ModerationFlag::Silenced => "silenced",
        }
    }
}

impl fmt::Display for ModerationFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModerationFlag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(ModerationFlag::None),
            "banned" => Ok(ModerationFlag::Banned),
            "silenced" => Ok(ModerationFlag::Silenced),
            other => Err(format!("unknown moderation flag: {}", other)),
        }
    }
}

/// A known end user. Created on first contact, never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    pub display_name: String,
    pub handle: Option<String>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub message_count: u64,
    pub flag: ModerationFlag,
}

impl UserRecord {
    pub fn new(identity: &UserIdentity, now: DateTime<Utc>) -> Self {
        Self {
            id: identity.id,
            display_name: identity.display_name.clone(),
            handle: identity.handle.clone(),
            first_seen: now,
            last_seen: now,
            message_count: 0,
            flag: ModerationFlag::None,
        }
    }

    /// Refreshes name, handle and last-seen from the latest identity.
    pub fn touch(&mut self, identity: &UserIdentity, now: DateTime<Utc>) {
        self.display_name = identity.display_name.clone();
        self.handle = identity.handle.clone();
        if now > self.last_seen {
            self.last_seen = now;
        }
    }

    pub fn is_banned(&self) -> bool {
        self.flag == ModerationFlag::Banned
    }
}

/// One event delivered by the transport: a message or a panel button press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub sender: UserIdentity,
    pub chat: ChatId,
    pub message: MessageRef,
    /// Set when the message replies to an earlier message in the same chat.
    pub reply_to: Option<MessageRef>,
    /// Text or caption; `None` for media without caption.
    pub text: Option<String>,
    pub received_at: DateTime<Utc>,
}

/// Inline button shown by `/panel`; pressing it replays `command` as operator text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuButton {
    pub label: String,
    pub command: String,
}

impl MenuButton {
    pub fn new(label: &str, command: &str) -> Self {
        Self {
            label: label.to_string(),
            command: command.to_string(),
        }
    }
}

/// Read-only totals for `/stats`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RelayStats {
    pub total_users: usize,
    pub banned: usize,
    pub silenced: usize,
    pub messages: u64,
    pub bindings: usize,
    pub admin_online: bool,
}

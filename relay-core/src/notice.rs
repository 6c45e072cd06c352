//! Fixed notice texts and report formatting. Plain text; no markup, so user-supplied names
//! need no escaping.

use crate::command::Command;
use crate::error::UsageError;
use crate::types::{MenuButton, ModerationFlag, RelayStats, UserId, UserIdentity, UserRecord};

pub const RECEIVED: &str = "✅ Message received. You will get a reply here.";
pub const OPERATOR_OFFLINE: &str =
    "🌙 The operator is offline right now. Your message was saved; the reply may be delayed.";
pub const NO_PROFILE_PHOTO: &str = "🖼 This user has no profile photo.";
pub const PANEL_TITLE: &str = "🛠 Admin panel";

pub const HELP: &str = "🛠 Operator commands\n\
/total - number of users\n\
/stats - relay statistics\n\
/info USER_ID - user profile (or reply to a relayed message)\n\
/dp USER_ID - user's profile photo\n\
/ban, /unban USER_ID - block or unblock a user\n\
/silence, /unsilence USER_ID - record without forwarding\n\
/broadcast TEXT - send to every user (or reply to a message)\n\
/online, /offline - availability notice for users\n\
/panel - button menu\n\n\
Reply to a relayed message to answer its sender.";

pub fn welcome(display_name: &str) -> String {
    format!(
        "👋 Welcome {}!\n\n🤖 Support bot\n📩 Send any message and the operator will answer here.",
        display_name
    )
}

pub fn usage(command: &Command, error: &UsageError) -> String {
    format!("❌ {}\nUse: {}", error, command.usage())
}

/// Sent to the operator ahead of a relayed message so the sender is known even when the
/// message arrives as a copy or with a hidden forward origin.
pub fn sender_header(user: &UserIdentity) -> String {
    format!(
        "📩 User Message\n🆔 {}\n👤 {}\n🔗 {}",
        user.id,
        user.display_name,
        user.handle
            .as_deref()
            .map(|h| format!("@{}", h))
            .unwrap_or_else(|| "-".to_string()),
    )
}

pub fn delivery_failed(user: UserId, error: &str) -> String {
    format!("⚠️ Could not deliver to {}: {}", user, error)
}

pub fn total_users(total: usize) -> String {
    format!("👥 Total users: {}", total)
}

pub fn availability(online: bool) -> &'static str {
    if online {
        "🟢 You are online. Users get no delay notice."
    } else {
        "🌙 You are offline. Users are told replies may be delayed."
    }
}

pub fn flag_set(user: UserId, flag: ModerationFlag, previous: ModerationFlag) -> String {
    let action = match flag {
        ModerationFlag::Banned => "🚫 banned",
        ModerationFlag::Silenced => "🔇 silenced",
        ModerationFlag::None => "✅ cleared",
    };
    if previous == flag {
        format!("User {} was already {}", user, flag)
    } else {
        format!("User {} {}", user, action)
    }
}

pub fn flag_cleared(user: UserId, flag: ModerationFlag, changed: bool) -> String {
    match (flag, changed) {
        (ModerationFlag::Banned, true) => format!("✅ User {} unbanned", user),
        (ModerationFlag::Silenced, true) => format!("🔊 User {} unsilenced", user),
        _ => format!("User {} was not {}", user, flag),
    }
}

pub fn profile(user: &UserRecord) -> String {
    format!(
        "👤 User profile\n🆔 {}\n👤 {}\n🔗 {}\n📅 First seen: {}\n🕒 Last seen: {}\n💬 Messages: {}\n🏷 Status: {}",
        user.id,
        user.display_name,
        user.handle
            .as_deref()
            .map(|h| format!("@{}", h))
            .unwrap_or_else(|| "-".to_string()),
        user.first_seen.format("%Y-%m-%d %H:%M UTC"),
        user.last_seen.format("%Y-%m-%d %H:%M UTC"),
        user.message_count,
        user.flag,
    )
}

pub fn stats(stats: &RelayStats) -> String {
    format!(
        "📊 Relay stats\n👥 Users: {}\n🚫 Banned: {}\n🔇 Silenced: {}\n💬 Messages: {}\n🔗 Reply links: {}\n{} Operator: {}",
        stats.total_users,
        stats.banned,
        stats.silenced,
        stats.messages,
        stats.bindings,
        if stats.admin_online { "🟢" } else { "🌙" },
        if stats.admin_online { "online" } else { "offline" },
    )
}

pub fn broadcast_report(sent: usize, failed: usize) -> String {
    if failed == 0 {
        format!("📢 Sent to {} users", sent)
    } else {
        format!("📢 Sent to {} users ({} failed)", sent, failed)
    }
}

pub fn profile_photo_caption(user: UserId) -> String {
    format!("🖼 Profile photo of {}", user)
}

pub fn profile_photo_failed(user: UserId, error: &str) -> String {
    format!("⚠️ Could not fetch the profile photo of {}: {}", user, error)
}

/// Buttons shown by `/panel`, each replaying an operator command.
pub fn panel_buttons() -> Vec<MenuButton> {
    vec![
        MenuButton::new("👥 Total", "/total"),
        MenuButton::new("📊 Stats", "/stats"),
        MenuButton::new("🟢 Online", "/online"),
        MenuButton::new("🌙 Offline", "/offline"),
        MenuButton::new("❓ Help", "/help"),
    ]
}

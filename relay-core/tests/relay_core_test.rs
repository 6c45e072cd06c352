//! Integration tests for [`relay_core::RelayCore`].
//!
//! Drives the core with synthetic events against a [`RecordingTransport`] and asserts on the
//! outbound calls and the resulting state: forwarding and bindings, reply routing, debounce,
//! ban/silence, broadcast, availability, command usage errors and snapshots.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use relay_core::{
    notice, BroadcastPayload, ChatId, InboundEvent, InboundOutcome, MessageRef, ModerationFlag,
    RelayConfig, RelayCore, RelayError, ReplyOutcome, UserId, UserIdentity,
};

use recording_transport::{RecordingTransport, Sent};

const OPERATOR: i64 = 999;

fn at(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
}

fn setup() -> (Arc<RecordingTransport>, RelayCore) {
    setup_with(RelayConfig::new(UserId(OPERATOR)))
}

fn setup_with(config: RelayConfig) -> (Arc<RecordingTransport>, RelayCore) {
    let transport = Arc::new(RecordingTransport::new());
    let core = RelayCore::new(transport.clone(), config);
    (transport, core)
}

fn user_message(user: i64, message: i32, secs: i64) -> InboundEvent {
    InboundEvent {
        sender: UserIdentity::new(user, format!("User{}", user), Some("handle")),
        chat: ChatId(user),
        message: MessageRef(message),
        reply_to: None,
        text: Some("hello".to_string()),
        received_at: at(secs),
    }
}

fn operator_message(text: Option<&str>, reply_to: Option<MessageRef>) -> InboundEvent {
    InboundEvent {
        sender: UserIdentity::new(OPERATOR, "Operator", None),
        chat: ChatId(OPERATOR),
        message: MessageRef(5000),
        reply_to,
        text: text.map(str::to_string),
        received_at: at(0),
    }
}

fn operator_chat() -> ChatId {
    ChatId(OPERATOR)
}

async fn forward(core: &RelayCore, user: i64, message: i32, secs: i64) -> MessageRef {
    match core
        .handle_inbound_user_message(&user_message(user, message, secs))
        .await
        .unwrap()
    {
        InboundOutcome::Forwarded { outbound } => outbound,
        other => panic!("expected forward, got {:?}", other),
    }
}

/// **Test: An accepted message is forwarded once, bound to its sender, and acknowledged.**
#[tokio::test]
async fn test_accepted_message_forwards_binds_and_acknowledges() {
    let (transport, core) = setup();

    let outbound = forward(&core, 1, 10, 0).await;

    assert_eq!(core.binding(outbound).await, Some(UserId(1)));
    assert_eq!(
        transport.forwards(),
        vec![Sent::Forward {
            target: operator_chat(),
            source: ChatId(1),
            message: MessageRef(10),
            outbound,
        }]
    );
    assert_eq!(transport.notices_to(ChatId(1)), vec![notice::RECEIVED.to_string()]);
    assert_eq!(core.user_profile(UserId(1)).await.unwrap().message_count, 1);
    assert_eq!(core.stats().await.bindings, 1);
}

/// **Test: A reply to a bound message reaches that user and nobody else.**
///
/// **Setup:** Users 1 and 2 each get one message forwarded.
/// **Action:** Operator replies to user 2's forwarded copy.
/// **Expected:** Exactly one copy, from the operator chat to user 2.
#[tokio::test]
async fn test_operator_reply_routes_to_bound_user_only() {
    let (transport, core) = setup();
    let _first = forward(&core, 1, 10, 0).await;
    let second = forward(&core, 2, 20, 0).await;
    transport.clear();

    core.handle_event(&operator_message(Some("thanks!"), Some(second)))
        .await;

    assert_eq!(
        transport.copies(),
        vec![Sent::Copy {
            target: ChatId(2),
            source: operator_chat(),
            message: MessageRef(5000),
        }]
    );
    assert!(transport.sent_to(ChatId(1)).is_empty());
}

#[tokio::test]
async fn test_reply_to_unknown_binding_is_ignored() {
    let (transport, core) = setup();
    forward(&core, 1, 10, 0).await;
    transport.clear();

    let outcome = core
        .handle_operator_reply(MessageRef(424242), MessageRef(5000))
        .await
        .unwrap();

    assert_eq!(outcome, ReplyOutcome::Unbound);
    assert!(transport.sent().is_empty());
}

/// **Test: Reply delivery failure is reported to the operator and keeps the binding.**
#[tokio::test]
async fn test_reply_delivery_failure_is_reported() {
    let (transport, core) = setup();
    let outbound = forward(&core, 1, 10, 0).await;
    transport.fail_chat(ChatId(1));
    transport.clear();

    let outcome = core
        .handle_operator_reply(outbound, MessageRef(5000))
        .await
        .unwrap();

    assert_eq!(outcome, ReplyOutcome::Failed { user: UserId(1) });
    let notices = transport.notices_to(operator_chat());
    assert_eq!(notices.len(), 1);
    assert!(notices[0].contains("Could not deliver to 1"));
    assert_eq!(core.binding(outbound).await, Some(UserId(1)));
}

/// **Test: Debounce drops t=1 after t=0 with a 2 s window and accepts t=3.**
#[tokio::test]
async fn test_debounce_window() {
    let (transport, core) = setup();

    forward(&core, 1, 10, 0).await;
    let second = core
        .handle_inbound_user_message(&user_message(1, 11, 1))
        .await
        .unwrap();
    assert_eq!(second, InboundOutcome::RateLimited);
    forward(&core, 1, 12, 3).await;

    assert_eq!(transport.forwards().len(), 2);
    assert_eq!(core.user_profile(UserId(1)).await.unwrap().message_count, 2);
}

#[tokio::test]
async fn test_custom_debounce_window() {
    let (_transport, core) = setup_with(
        RelayConfig::new(UserId(OPERATOR)).with_debounce(Duration::seconds(10)),
    );

    forward(&core, 1, 10, 0).await;
    let outcome = core
        .handle_inbound_user_message(&user_message(1, 11, 9))
        .await
        .unwrap();
    assert_eq!(outcome, InboundOutcome::RateLimited);
    forward(&core, 1, 12, 10).await;
}

/// **Test: A banned user's messages leave no trace until unbanned.**
///
/// **Setup:** User 1 has one forwarded message, then is banned.
/// **Action:** User 1 sends again.
/// **Expected:** Outcome Banned, no outbound calls, message count unchanged; after unban the
/// next message is forwarded.
#[tokio::test]
async fn test_banned_user_is_dropped_until_unban() {
    let (transport, core) = setup();
    forward(&core, 1, 10, 0).await;
    core.ban(UserId(1)).await.unwrap();
    transport.clear();

    let outcome = core
        .handle_inbound_user_message(&user_message(1, 11, 5))
        .await
        .unwrap();

    assert_eq!(outcome, InboundOutcome::Banned);
    assert!(transport.sent().is_empty());
    assert_eq!(core.user_profile(UserId(1)).await.unwrap().message_count, 1);

    assert!(core.unban(UserId(1)).await.unwrap());
    forward(&core, 1, 12, 6).await;
}

#[tokio::test]
async fn test_banned_user_start_gets_no_welcome() {
    let (transport, core) = setup();
    forward(&core, 1, 10, 0).await;
    core.ban(UserId(1)).await.unwrap();
    transport.clear();

    let mut start = user_message(1, 11, 10);
    start.text = Some("/start".to_string());
    core.handle_event(&start).await;

    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn test_start_welcomes_and_records_without_counting() {
    let (transport, core) = setup();
    let mut start = user_message(3, 1, 0);
    start.text = Some("/start".to_string());

    core.handle_event(&start).await;

    let notices = transport.notices_to(ChatId(3));
    assert_eq!(notices, vec![notice::welcome("User3")]);
    let record = core.user_profile(UserId(3)).await.unwrap();
    assert_eq!(record.message_count, 0);
    assert!(transport.forwards().is_empty());
}

#[tokio::test]
async fn test_silenced_user_is_recorded_but_not_forwarded() {
    let (transport, core) = setup();
    forward(&core, 1, 10, 0).await;
    core.silence(UserId(1)).await.unwrap();
    transport.clear();

    let outcome = core
        .handle_inbound_user_message(&user_message(1, 11, 5))
        .await
        .unwrap();

    assert_eq!(outcome, InboundOutcome::Silenced);
    assert!(transport.forwards().is_empty());
    assert_eq!(core.user_profile(UserId(1)).await.unwrap().message_count, 2);
}

#[tokio::test]
async fn test_offline_notice_precedes_forward_and_is_not_retroactive() {
    let (transport, core) = setup();
    core.set_admin_available(false).await;

    forward(&core, 1, 10, 0).await;
    assert_eq!(
        transport.notices_to(ChatId(1)),
        vec![
            notice::OPERATOR_OFFLINE.to_string(),
            notice::RECEIVED.to_string()
        ]
    );

    core.set_admin_available(true).await;
    transport.clear();
    forward(&core, 1, 11, 5).await;
    assert_eq!(
        transport.notices_to(ChatId(1)),
        vec![notice::RECEIVED.to_string()]
    );
}

/// **Test: A failed forward records the user but creates no binding and no acknowledgment.**
#[tokio::test]
async fn test_forward_failure_creates_no_binding() {
    let (transport, core) = setup();
    transport.fail_chat(operator_chat());

    let result = core
        .handle_inbound_user_message(&user_message(1, 10, 0))
        .await;

    assert!(matches!(result, Err(RelayError::Transport(_))));
    assert_eq!(core.stats().await.bindings, 0);
    assert_eq!(core.user_profile(UserId(1)).await.unwrap().message_count, 1);
    assert!(transport.notices_to(ChatId(1)).is_empty());
}

/// **Test: Broadcast skips banned users, continues past failures, and reports successes.**
///
/// **Setup:** 5 users; users 2 and 5 banned; user 4 blocked the bot.
/// **Action:** Text broadcast from the operator.
/// **Expected:** 3 attempts, 2 sent, 1 failed; the operator gets the count.
#[tokio::test]
async fn test_broadcast_skips_banned_and_counts_successes() {
    let (transport, core) = setup();
    for user in 1..=5 {
        forward(&core, user, 10, 0).await;
    }
    core.ban(UserId(2)).await.unwrap();
    core.ban(UserId(5)).await.unwrap();
    transport.fail_chat(ChatId(4));
    transport.clear();

    let report = core
        .broadcast(BroadcastPayload::Text("news".to_string()), UserId(OPERATOR))
        .await
        .unwrap();

    assert_eq!(report.attempted, 3);
    assert_eq!(report.sent, 2);
    assert_eq!(report.failed, 1);
    assert!(transport.sent_to(ChatId(2)).is_empty());
    assert!(transport.sent_to(ChatId(5)).is_empty());
    assert_eq!(transport.notices_to(ChatId(1)), vec!["news".to_string()]);
    assert_eq!(
        transport.notices_to(operator_chat()),
        vec![notice::broadcast_report(2, 1)]
    );
}

#[tokio::test]
async fn test_broadcast_by_non_operator_is_unauthorized() {
    let (transport, core) = setup();
    forward(&core, 1, 10, 0).await;
    transport.clear();

    let result = core
        .broadcast(BroadcastPayload::Text("spam".to_string()), UserId(1))
        .await;

    assert!(matches!(result, Err(RelayError::Unauthorized(UserId(1)))));
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn test_broadcast_command_copies_replied_payload() {
    let (transport, core) = setup();
    forward(&core, 1, 10, 0).await;
    forward(&core, 2, 10, 0).await;
    transport.clear();

    core.handle_event(&operator_message(Some("/broadcast"), Some(MessageRef(77))))
        .await;

    let copies = transport.copies();
    assert_eq!(copies.len(), 2);
    assert!(copies.contains(&Sent::Copy {
        target: ChatId(1),
        source: operator_chat(),
        message: MessageRef(77),
    }));
    assert_eq!(
        transport.notices_to(operator_chat()),
        vec![notice::broadcast_report(2, 0)]
    );
}

#[tokio::test]
async fn test_broadcast_command_without_payload_is_usage_error() {
    let (transport, core) = setup();
    forward(&core, 1, 10, 0).await;
    transport.clear();

    core.handle_event(&operator_message(Some("/broadcast"), None))
        .await;

    let notices = transport.notices_to(operator_chat());
    assert_eq!(notices.len(), 1);
    assert!(notices[0].contains("nothing to broadcast"));
    assert!(transport.sent_to(ChatId(1)).is_empty());
}

#[tokio::test]
async fn test_unban_of_unbanned_user_is_noop() {
    let (transport, core) = setup();
    forward(&core, 1, 10, 0).await;
    transport.clear();

    assert!(!core.unban(UserId(1)).await.unwrap());

    core.handle_event(&operator_message(Some("/unban 1"), None))
        .await;
    assert_eq!(
        transport.notices_to(operator_chat()),
        vec!["User 1 was not banned".to_string()]
    );
    assert_eq!(
        core.user_profile(UserId(1)).await.unwrap().flag,
        ModerationFlag::None
    );
}

#[tokio::test]
async fn test_ban_by_reply_resolves_through_binding() {
    let (transport, core) = setup();
    let outbound = forward(&core, 1, 10, 0).await;
    transport.clear();

    core.handle_event(&operator_message(Some("/ban"), Some(outbound)))
        .await;

    assert_eq!(
        core.user_profile(UserId(1)).await.unwrap().flag,
        ModerationFlag::Banned
    );
    assert_eq!(
        transport.notices_to(operator_chat()),
        vec!["User 1 🚫 banned".to_string()]
    );
}

#[tokio::test]
async fn test_silence_then_unsilence_commands() {
    let (_transport, core) = setup();
    forward(&core, 1, 10, 0).await;

    core.handle_event(&operator_message(Some("/silence 1"), None))
        .await;
    assert_eq!(
        core.user_profile(UserId(1)).await.unwrap().flag,
        ModerationFlag::Silenced
    );

    core.handle_event(&operator_message(Some("/unsilence 1"), None))
        .await;
    assert_eq!(
        core.user_profile(UserId(1)).await.unwrap().flag,
        ModerationFlag::None
    );
}

/// **Test: Unresolvable moderation targets produce a usage notice and change nothing.**
#[tokio::test]
async fn test_moderation_usage_errors() {
    let (transport, core) = setup();
    forward(&core, 1, 10, 0).await;
    transport.clear();

    let cases = [
        (operator_message(Some("/ban"), None), "no target given"),
        (operator_message(Some("/ban abc"), None), "not a user id: abc"),
        (operator_message(Some("/ban 77"), None), "unknown user 77"),
        (operator_message(Some("/ban 999"), None), "operator cannot be targeted"),
        (
            operator_message(Some("/ban"), Some(MessageRef(31337))),
            "not linked to a user",
        ),
    ];

    for (event, expected) in cases {
        transport.clear();
        core.handle_event(&event).await;
        let notices = transport.notices_to(operator_chat());
        assert_eq!(notices.len(), 1, "case {}", expected);
        assert!(notices[0].contains(expected), "{} !~ {}", notices[0], expected);
        assert!(notices[0].contains("/ban USER_ID"));
    }

    assert_eq!(
        core.user_profile(UserId(1)).await.unwrap().flag,
        ModerationFlag::None
    );
}

/// **Test: Operator-only commands from a user are ignored, not forwarded and not recorded.**
#[tokio::test]
async fn test_user_invoking_operator_command_is_ignored() {
    let (transport, core) = setup();
    let mut event = user_message(1, 10, 0);
    event.text = Some("/broadcast hi all".to_string());

    core.handle_event(&event).await;

    assert!(transport.sent().is_empty());
    assert_eq!(core.total_users().await, 0);
}

#[tokio::test]
async fn test_user_unknown_command_is_relayed() {
    let (transport, core) = setup();
    let mut event = user_message(1, 10, 0);
    event.text = Some("/order 42".to_string());

    core.handle_event(&event).await;

    assert_eq!(transport.forwards().len(), 1);
}

#[tokio::test]
async fn test_operator_plain_message_is_ignored() {
    let (transport, core) = setup();

    core.handle_event(&operator_message(Some("just typing"), None))
        .await;

    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn test_operator_unknown_command_gets_usage() {
    let (transport, core) = setup();

    core.handle_event(&operator_message(Some("/frobnicate"), None))
        .await;

    let notices = transport.notices_to(operator_chat());
    assert_eq!(notices.len(), 1);
    assert!(notices[0].contains("unknown command /frobnicate"));
}

#[tokio::test]
async fn test_queries_total_stats_and_info() {
    let (transport, core) = setup();
    let outbound = forward(&core, 1, 10, 0).await;
    forward(&core, 2, 10, 0).await;
    core.ban(UserId(2)).await.unwrap();
    transport.clear();

    core.handle_event(&operator_message(Some("/total"), None)).await;
    core.handle_event(&operator_message(Some("/stats"), None)).await;
    core.handle_event(&operator_message(Some("/info"), Some(outbound)))
        .await;

    let notices = transport.notices_to(operator_chat());
    assert_eq!(notices.len(), 3);
    assert_eq!(notices[0], notice::total_users(2));
    assert!(notices[1].contains("Banned: 1"));
    assert!(notices[1].contains("Messages: 2"));
    assert!(notices[2].contains("🆔 1"));
    assert!(notices[2].contains("@handle"));
    assert!(notices[2].contains("Messages: 1"));
}

#[tokio::test]
async fn test_dp_sends_photo_or_notice() {
    let (transport, core) = setup();
    forward(&core, 1, 10, 0).await;
    forward(&core, 2, 10, 0).await;
    transport.set_photo(UserId(1), "photo-file-id");
    transport.clear();

    core.handle_event(&operator_message(Some("/dp 1"), None)).await;
    core.handle_event(&operator_message(Some("/dp 2"), None)).await;

    let sent = transport.sent_to(operator_chat());
    assert_eq!(sent.len(), 2);
    assert!(matches!(
        &sent[0],
        Sent::Photo { photo, .. } if photo.0 == "photo-file-id"
    ));
    assert_eq!(
        sent[1],
        Sent::Notice {
            chat: operator_chat(),
            text: notice::NO_PROFILE_PHOTO.to_string()
        }
    );
}

/// **Test: A failed profile photo lookup is reported to the operator.**
#[tokio::test]
async fn test_dp_lookup_failure_is_reported() {
    let (transport, core) = setup();
    forward(&core, 1, 10, 0).await;
    transport.fail_photo_lookup(UserId(1));
    transport.clear();

    core.handle_event(&operator_message(Some("/dp 1"), None)).await;

    let notices = transport.notices_to(operator_chat());
    assert_eq!(notices.len(), 1);
    assert!(notices[0].contains("Could not fetch the profile photo of 1"));
    assert!(notices[0].contains("user not found"));
}

/// **Test: A slash-prefixed reply to a relayed message is delivered, not parsed as a command.**
///
/// **Setup:** User 1's message is forwarded.
/// **Action:** Operator replies "/etc/hosts needs editing" to the forwarded copy.
/// **Expected:** One copy to user 1, no usage notice for the operator.
#[tokio::test]
async fn test_slash_prefixed_reply_reaches_user() {
    let (transport, core) = setup();
    let outbound = forward(&core, 1, 10, 0).await;
    transport.clear();

    core.handle_event(&operator_message(
        Some("/etc/hosts needs editing"),
        Some(outbound),
    ))
    .await;

    assert_eq!(
        transport.copies(),
        vec![Sent::Copy {
            target: ChatId(1),
            source: operator_chat(),
            message: MessageRef(5000),
        }]
    );
    assert!(transport.notices_to(operator_chat()).is_empty());
}

/// **Test: Known commands sent as a reply still run; unknown ones on unbound replies get usage.**
#[tokio::test]
async fn test_commands_in_replies_still_dispatch() {
    let (transport, core) = setup();
    let outbound = forward(&core, 1, 10, 0).await;
    transport.clear();

    core.handle_event(&operator_message(Some("/ban"), Some(outbound)))
        .await;
    assert!(core.user_profile(UserId(1)).await.unwrap().is_banned());
    assert!(transport.copies().is_empty());

    transport.clear();
    core.handle_event(&operator_message(Some("/frobnicate"), Some(MessageRef(31337))))
        .await;
    let notices = transport.notices_to(operator_chat());
    assert_eq!(notices.len(), 1);
    assert!(notices[0].contains("unknown command /frobnicate"));
}

/// **Test: With the sender header enabled the operator learns who wrote each relayed message.**
///
/// **Setup:** Core configured with `with_sender_header(true)`.
/// **Action:** User 7 (@handle) sends one message.
/// **Expected:** The header notice precedes the forward in the operator chat and names id and handle.
#[tokio::test]
async fn test_sender_header_precedes_forward() {
    let (transport, core) = setup_with(
        RelayConfig::new(UserId(OPERATOR)).with_sender_header(true),
    );

    let outbound = forward(&core, 7, 70, 0).await;

    let sent = transport.sent_to(operator_chat());
    assert_eq!(sent.len(), 2);
    match &sent[0] {
        Sent::Notice { text, .. } => {
            assert!(text.contains("User Message"));
            assert!(text.contains("🆔 7"));
            assert!(text.contains("@handle"));
        }
        other => panic!("expected header notice, got {:?}", other),
    }
    assert!(matches!(&sent[1], Sent::Forward { outbound: o, .. } if *o == outbound));
    assert_eq!(core.binding(outbound).await, Some(UserId(7)));
}

#[tokio::test]
async fn test_sender_header_off_by_default() {
    let (transport, core) = setup();

    forward(&core, 7, 70, 0).await;

    assert!(transport.notices_to(operator_chat()).is_empty());
}

#[tokio::test]
async fn test_panel_and_availability_commands() {
    let (transport, core) = setup();

    core.handle_event(&operator_message(Some("/panel"), None)).await;
    core.handle_event(&operator_message(Some("/offline"), None)).await;

    let sent = transport.sent_to(operator_chat());
    assert!(matches!(
        &sent[0],
        Sent::Menu { buttons, .. } if buttons.len() == notice::panel_buttons().len()
    ));
    assert!(!core.admin_available().await);

    core.handle_event(&operator_message(Some("/online"), None)).await;
    assert!(core.admin_available().await);
}

/// **Test: Past capacity the oldest binding is evicted and replies to it are ignored.**
#[tokio::test]
async fn test_binding_capacity_evicts_oldest() {
    let (transport, core) = setup_with(
        RelayConfig::new(UserId(OPERATOR)).with_binding_capacity(2),
    );
    let first = forward(&core, 1, 10, 0).await;
    let second = forward(&core, 2, 10, 0).await;
    let third = forward(&core, 3, 10, 0).await;
    transport.clear();

    assert_eq!(
        core.handle_operator_reply(first, MessageRef(5000)).await.unwrap(),
        ReplyOutcome::Unbound
    );
    assert_eq!(
        core.handle_operator_reply(second, MessageRef(5000)).await.unwrap(),
        ReplyOutcome::Delivered { user: UserId(2) }
    );
    assert_eq!(core.binding(third).await, Some(UserId(3)));
    assert_eq!(transport.copies().len(), 1);
}

#[tokio::test]
async fn test_snapshot_restores_into_fresh_core() {
    let (_transport, core) = setup();
    let outbound = forward(&core, 1, 10, 0).await;
    core.silence(UserId(1)).await.unwrap();
    core.set_admin_available(false).await;
    let snapshot = core.snapshot().await;

    let transport = Arc::new(RecordingTransport::new());
    let restored = RelayCore::with_snapshot(
        transport.clone(),
        RelayConfig::new(UserId(OPERATOR)),
        snapshot,
    );

    assert_eq!(restored.binding(outbound).await, Some(UserId(1)));
    assert!(!restored.admin_available().await);
    assert_eq!(
        restored.user_profile(UserId(1)).await.unwrap().flag,
        ModerationFlag::Silenced
    );
    assert_eq!(
        restored
            .handle_operator_reply(outbound, MessageRef(1))
            .await
            .unwrap(),
        ReplyOutcome::Delivered { user: UserId(1) }
    );
}

#[tokio::test]
async fn test_operator_start_gets_help() {
    let (transport, core) = setup();

    core.handle_event(&operator_message(Some("/start"), None)).await;

    assert_eq!(
        transport.notices_to(operator_chat()),
        vec![notice::HELP.to_string()]
    );
    assert_eq!(core.total_users().await, 0);
}

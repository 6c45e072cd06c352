//! The relay core: forwards user messages to the operator, routes operator replies back through
//! reply bindings, and applies moderation, broadcast and availability commands.
//!
//! All state sits in one [`RelayState`] behind one mutex. Inbound user messages hold the lock
//! through the forward so a binding exists before any later event can reference it; replies
//! and broadcasts release it before delivering.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use crate::command::Command;
use crate::error::{RelayError, Result, UsageError};
use crate::notice;
use crate::state::{RelaySnapshot, RelayState};
use crate::transport::Transport;
use crate::types::{
    ChatId, InboundEvent, MessageRef, ModerationFlag, PhotoRef, RelayStats, UserId,
    UserIdentity, UserRecord,
};

pub const DEFAULT_DEBOUNCE_MS: i64 = 2_000;
pub const DEFAULT_BINDING_CAPACITY: usize = 50_000;

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub operator: UserId,
    /// Minimum gap between two accepted messages from one user.
    pub debounce: Duration,
    /// Reply bindings kept before the oldest is evicted; 0 keeps all.
    pub binding_capacity: usize,
    /// Send the operator a header naming the sender before each relayed message.
    pub sender_header: bool,
}

impl RelayConfig {
    pub fn new(operator: UserId) -> Self {
        Self {
            operator,
            debounce: Duration::milliseconds(DEFAULT_DEBOUNCE_MS),
            binding_capacity: DEFAULT_BINDING_CAPACITY,
            sender_header: false,
        }
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn with_binding_capacity(mut self, capacity: usize) -> Self {
        self.binding_capacity = capacity;
        self
    }

    pub fn with_sender_header(mut self, enabled: bool) -> Self {
        self.sender_header = enabled;
        self
    }

    pub fn operator_chat(&self) -> ChatId {
        ChatId::from(self.operator)
    }
}

/// Which step ended [`RelayCore::handle_inbound_user_message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundOutcome {
    Banned,
    RateLimited,
    Silenced,
    Forwarded { outbound: MessageRef },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyOutcome {
    /// The replied-to message has no binding; nothing was sent.
    Unbound,
    Delivered { user: UserId },
    /// Delivery failed and the operator was told.
    Failed { user: UserId },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BroadcastPayload {
    /// Copy an existing message (the one `/broadcast` replied to).
    Copy { source: ChatId, message: MessageRef },
    Text(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BroadcastReport {
    pub attempted: usize,
    pub sent: usize,
    pub failed: usize,
}

pub struct RelayCore {
    transport: Arc<dyn Transport>,
    config: RelayConfig,
    state: Mutex<RelayState>,
}

impl RelayCore {
    pub fn new(transport: Arc<dyn Transport>, config: RelayConfig) -> Self {
        let state = RelayState::new(config.binding_capacity);
        Self {
            transport,
            config,
            state: Mutex::new(state),
        }
    }

    /// Builds a core whose state is restored from a persisted snapshot.
    pub fn with_snapshot(
        transport: Arc<dyn Transport>,
        config: RelayConfig,
        snapshot: RelaySnapshot,
    ) -> Self {
        let state = RelayState::from_snapshot(snapshot, config.binding_capacity);
        Self {
            transport,
            config,
            state: Mutex::new(state),
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn is_operator(&self, id: UserId) -> bool {
        id == self.config.operator
    }

    pub async fn snapshot(&self) -> RelaySnapshot {
        self.state.lock().await.snapshot()
    }

    pub async fn restore(&self, snapshot: RelaySnapshot) {
        let restored = RelayState::from_snapshot(snapshot, self.config.binding_capacity);
        *self.state.lock().await = restored;
    }

    /// Entry point for the transport. Routes one event and never fails: errors are logged,
    /// unauthorized actors are ignored.
    #[instrument(skip(self, event), fields(user_id = event.sender.id.0, chat_id = event.chat.0, message_id = event.message.0))]
    pub async fn handle_event(&self, event: &InboundEvent) {
        match self.route(event).await {
            Ok(()) => {}
            Err(RelayError::Unauthorized(user)) => {
                debug!(user_id = user.0, "step: unauthorized actor ignored");
            }
            Err(e) => {
                error!(error = %e, "step: event failed");
            }
        }
    }

    async fn route(&self, event: &InboundEvent) -> Result<()> {
        let command = event.text.as_deref().and_then(Command::parse);

        if self.is_operator(event.sender.id) {
            if let Some(command) = command {
                // A reply like "/etc/hosts ..." to a relayed message is an answer, not a command.
                let answers_user = match (&command, event.reply_to) {
                    (Command::Unknown(_), Some(replied_to)) => {
                        self.binding(replied_to).await.is_some()
                    }
                    _ => false,
                };
                if !answers_user {
                    return self.run_command(command, event).await;
                }
                debug!("step: slash-prefixed reply treated as an answer");
            }
            if let Some(replied_to) = event.reply_to {
                self.handle_operator_reply(replied_to, event.message).await?;
                return Ok(());
            }
            debug!("step: operator message is not a reply, ignored");
            return Ok(());
        }

        match command {
            Some(Command::Start) => self.handle_start(&event.sender, event.received_at).await,
            Some(command) if command.is_operator_only() => {
                debug!(command = command.name(), "step: operator command from user");
                Err(RelayError::Unauthorized(event.sender.id))
            }
            _ => self.handle_inbound_user_message(event).await.map(|_| ()),
        }
    }

    /// Welcomes a user and records them without counting a message. Banned users get nothing.
    #[instrument(skip(self, user), fields(user_id = user.id.0))]
    pub async fn handle_start(&self, user: &UserIdentity, now: DateTime<Utc>) -> Result<()> {
        if self.is_operator(user.id) {
            self.notify_operator(notice::HELP).await;
            return Ok(());
        }

        {
            let mut state = self.state.lock().await;
            if state.is_banned(user.id) {
                info!("step: start from banned user ignored");
                return Ok(());
            }
            state.touch_user(user, now);
        }

        self.transport
            .send_notice(ChatId::from(user.id), &notice::welcome(&user.display_name))
            .await?;
        info!("step: welcome sent");
        Ok(())
    }

    /// Relays one user message to the operator.
    ///
    /// Order: ban check, debounce, record, silence check, offline notice, forward + bind,
    /// acknowledgment. Guards run before any mutation so dropped messages leave no trace.
    #[instrument(skip(self, event), fields(user_id = event.sender.id.0, message_id = event.message.0))]
    pub async fn handle_inbound_user_message(&self, event: &InboundEvent) -> Result<InboundOutcome> {
        let user = &event.sender;
        if self.is_operator(user.id) {
            return Err(RelayError::State(
                "operator messages are not relayed".to_string(),
            ));
        }

        let mut state = self.state.lock().await;

        if state.is_banned(user.id) {
            info!("step: dropped, user banned");
            return Ok(InboundOutcome::Banned);
        }

        if !state.check_rate(user.id, event.received_at, self.config.debounce) {
            info!("step: dropped, debounce window");
            return Ok(InboundOutcome::RateLimited);
        }

        let message_count = state.record_message(user, event.received_at).message_count;
        debug!(message_count, "step: user recorded");

        if state.flag(user.id) == ModerationFlag::Silenced {
            info!("step: user silenced, not forwarded");
            return Ok(InboundOutcome::Silenced);
        }

        if !state.admin_online() {
            if let Err(e) = self
                .transport
                .send_notice(event.chat, notice::OPERATOR_OFFLINE)
                .await
            {
                warn!(error = %e, "step: offline notice failed");
            }
        }

        if self.config.sender_header {
            if let Err(e) = self
                .transport
                .send_notice(self.config.operator_chat(), &notice::sender_header(user))
                .await
            {
                warn!(error = %e, "step: sender header failed");
            }
        }

        let outbound = match self
            .transport
            .forward_or_copy(self.config.operator_chat(), event.chat, event.message)
            .await
        {
            Ok(outbound) => outbound,
            Err(e) => {
                warn!(error = %e, "step: forward to operator failed");
                return Err(e);
            }
        };

        if let Some(evicted) = state.bind(outbound, user.id)? {
            debug!(evicted = evicted.0, "step: oldest reply binding evicted");
        }
        drop(state);

        info!(outbound = outbound.0, "step: forwarded to operator");

        if let Err(e) = self.transport.send_notice(event.chat, notice::RECEIVED).await {
            warn!(error = %e, "step: acknowledgment failed");
        }

        Ok(InboundOutcome::Forwarded { outbound })
    }

    /// Copies the operator's reply (`reply`, in the operator chat) to the user bound to
    /// `replied_to`. Unknown bindings are ignored; delivery failures are reported to the operator.
    #[instrument(skip(self))]
    pub async fn handle_operator_reply(
        &self,
        replied_to: MessageRef,
        reply: MessageRef,
    ) -> Result<ReplyOutcome> {
        let bound = self.state.lock().await.binding(replied_to);
        let Some(user) = bound else {
            debug!(replied_to = replied_to.0, "step: reply to unbound message ignored");
            return Ok(ReplyOutcome::Unbound);
        };

        match self
            .transport
            .copy_message(ChatId::from(user), self.config.operator_chat(), reply)
            .await
        {
            Ok(_) => {
                info!(user_id = user.0, "step: reply delivered");
                Ok(ReplyOutcome::Delivered { user })
            }
            Err(e) => {
                warn!(user_id = user.0, error = %e, "step: reply delivery failed");
                self.notify_operator(&notice::delivery_failed(user, &e.to_string()))
                    .await;
                Ok(ReplyOutcome::Failed { user })
            }
        }
    }

    /// Bans a known user. Returns the previous flag.
    pub async fn ban(&self, target: UserId) -> Result<ModerationFlag> {
        self.set_flag(target, ModerationFlag::Banned).await
    }

    /// Silences a known user. Returns the previous flag.
    pub async fn silence(&self, target: UserId) -> Result<ModerationFlag> {
        self.set_flag(target, ModerationFlag::Silenced).await
    }

    /// Lifts a ban. Returns false (and changes nothing) when the user was not banned.
    pub async fn unban(&self, target: UserId) -> Result<bool> {
        self.clear_flag(target, ModerationFlag::Banned).await
    }

    pub async fn unsilence(&self, target: UserId) -> Result<bool> {
        self.clear_flag(target, ModerationFlag::Silenced).await
    }

    async fn set_flag(&self, target: UserId, flag: ModerationFlag) -> Result<ModerationFlag> {
        let mut state = self.state.lock().await;
        self.check_target(&state, target)?;
        let previous = state.set_flag(target, flag)?;
        info!(user_id = target.0, flag = %flag, previous = %previous, "step: moderation flag set");
        Ok(previous)
    }

    async fn clear_flag(&self, target: UserId, flag: ModerationFlag) -> Result<bool> {
        let mut state = self.state.lock().await;
        self.check_target(&state, target)?;
        let changed = state.clear_flag(target, flag)?;
        info!(user_id = target.0, flag = %flag, changed, "step: moderation flag cleared");
        Ok(changed)
    }

    /// Delivers `payload` to every user who is not banned and reports the count to the
    /// requester. Failures are counted and skipped, never retried.
    #[instrument(skip(self, payload))]
    pub async fn broadcast(
        &self,
        payload: BroadcastPayload,
        requested_by: UserId,
    ) -> Result<BroadcastReport> {
        if !self.is_operator(requested_by) {
            return Err(RelayError::Unauthorized(requested_by));
        }

        let recipients = self.state.lock().await.broadcast_recipients();
        info!(recipients = recipients.len(), "step: broadcast started");

        let mut report = BroadcastReport::default();
        for user in recipients {
            // A ban issued after the recipient list was taken still applies.
            if self.state.lock().await.is_banned(user) {
                continue;
            }
            report.attempted += 1;
            let chat = ChatId::from(user);
            let result = match &payload {
                BroadcastPayload::Copy { source, message } => {
                    self.transport.copy_message(chat, *source, *message).await
                }
                BroadcastPayload::Text(text) => self.transport.send_notice(chat, text).await,
            };
            match result {
                Ok(_) => report.sent += 1,
                Err(e) => {
                    report.failed += 1;
                    debug!(user_id = user.0, error = %e, "step: broadcast delivery skipped");
                }
            }
        }

        info!(
            sent = report.sent,
            failed = report.failed,
            "step: broadcast finished"
        );
        self.notify_operator(&notice::broadcast_report(report.sent, report.failed))
            .await;
        Ok(report)
    }

    /// Only affects messages received after the call.
    pub async fn set_admin_available(&self, online: bool) {
        self.state.lock().await.set_admin_online(online);
        info!(online, "step: operator availability changed");
    }

    pub async fn admin_available(&self) -> bool {
        self.state.lock().await.admin_online()
    }

    pub async fn total_users(&self) -> usize {
        self.state.lock().await.total_users()
    }

    pub async fn user_profile(&self, id: UserId) -> Option<UserRecord> {
        self.state.lock().await.user(id).cloned()
    }

    pub async fn stats(&self) -> RelayStats {
        self.state.lock().await.stats()
    }

    pub async fn binding(&self, outbound: MessageRef) -> Option<UserId> {
        self.state.lock().await.binding(outbound)
    }

    pub async fn profile_photo(&self, target: UserId) -> Result<Option<PhotoRef>> {
        self.transport.profile_photo(target).await
    }

    /// Runs an operator command; usage errors become a corrective notice.
    async fn run_command(&self, command: Command, event: &InboundEvent) -> Result<()> {
        info!(command = command.name(), "step: operator command");
        match self.dispatch(&command, event).await {
            Err(RelayError::Usage(err)) => {
                debug!(error = %err, "step: usage error");
                self.notify_operator(&notice::usage(&command, &err)).await;
                Ok(())
            }
            other => other,
        }
    }

    async fn dispatch(&self, command: &Command, event: &InboundEvent) -> Result<()> {
        match command {
            Command::Start | Command::Help => {
                self.notify_operator(notice::HELP).await;
            }
            Command::Total => {
                let total = self.total_users().await;
                self.notify_operator(&notice::total_users(total)).await;
            }
            Command::Stats => {
                let stats = self.stats().await;
                self.notify_operator(&notice::stats(&stats)).await;
            }
            Command::Info(arg) => {
                let target = self.resolve_target(arg.as_deref(), event.reply_to).await?;
                let profile = self
                    .user_profile(target)
                    .await
                    .ok_or(UsageError::UnknownUser(target))?;
                self.notify_operator(&notice::profile(&profile)).await;
            }
            Command::Dp(arg) => {
                let target = self.resolve_target(arg.as_deref(), event.reply_to).await?;
                if let Err(e) = self.send_profile_photo(target).await {
                    warn!(user_id = target.0, error = %e, "step: profile photo failed");
                    self.notify_operator(&notice::profile_photo_failed(target, &e.to_string()))
                        .await;
                }
            }
            Command::Ban(arg) => {
                let target = self.resolve_target(arg.as_deref(), event.reply_to).await?;
                let previous = self.ban(target).await?;
                self.notify_operator(&notice::flag_set(target, ModerationFlag::Banned, previous))
                    .await;
            }
            Command::Silence(arg) => {
                let target = self.resolve_target(arg.as_deref(), event.reply_to).await?;
                let previous = self.silence(target).await?;
                self.notify_operator(&notice::flag_set(
                    target,
                    ModerationFlag::Silenced,
                    previous,
                ))
                .await;
            }
            Command::Unban(arg) => {
                let target = self.resolve_target(arg.as_deref(), event.reply_to).await?;
                let changed = self.unban(target).await?;
                self.notify_operator(&notice::flag_cleared(target, ModerationFlag::Banned, changed))
                    .await;
            }
            Command::Unsilence(arg) => {
                let target = self.resolve_target(arg.as_deref(), event.reply_to).await?;
                let changed = self.unsilence(target).await?;
                self.notify_operator(&notice::flag_cleared(
                    target,
                    ModerationFlag::Silenced,
                    changed,
                ))
                .await;
            }
            Command::Broadcast(text) => {
                let payload = match (event.reply_to, text) {
                    (Some(message), _) => BroadcastPayload::Copy {
                        source: event.chat,
                        message,
                    },
                    (None, Some(text)) => BroadcastPayload::Text(text.clone()),
                    (None, None) => return Err(UsageError::MissingPayload.into()),
                };
                self.broadcast(payload, event.sender.id).await?;
            }
            Command::Online | Command::Offline => {
                let online = matches!(command, Command::Online);
                self.set_admin_available(online).await;
                self.notify_operator(notice::availability(online)).await;
            }
            Command::Panel => {
                self.transport
                    .send_menu(
                        self.config.operator_chat(),
                        notice::PANEL_TITLE,
                        &notice::panel_buttons(),
                    )
                    .await?;
            }
            Command::Unknown(name) => {
                return Err(UsageError::UnknownCommand(name.clone()).into());
            }
        }
        Ok(())
    }

    /// Sends `target`'s current profile photo to the operator, or a notice when there is none.
    async fn send_profile_photo(&self, target: UserId) -> Result<()> {
        match self.profile_photo(target).await? {
            Some(photo) => {
                self.transport
                    .send_photo(
                        self.config.operator_chat(),
                        &photo,
                        &notice::profile_photo_caption(target),
                    )
                    .await?;
            }
            None => self.notify_operator(notice::NO_PROFILE_PHOTO).await,
        }
        Ok(())
    }

    /// Literal id argument first, then the binding of the replied-to message.
    async fn resolve_target(
        &self,
        arg: Option<&str>,
        reply_to: Option<MessageRef>,
    ) -> Result<UserId> {
        let state = self.state.lock().await;
        let target = match (arg, reply_to) {
            (Some(raw), _) => raw
                .parse::<i64>()
                .map(UserId)
                .map_err(|_| UsageError::InvalidUserId(raw.to_string()))?,
            (None, Some(replied)) => state.binding(replied).ok_or(UsageError::UnboundReply)?,
            (None, None) => return Err(UsageError::MissingTarget.into()),
        };
        self.check_target(&state, target)?;
        Ok(target)
    }

    fn check_target(&self, state: &RelayState, target: UserId) -> Result<()> {
        if self.is_operator(target) {
            return Err(UsageError::OperatorTarget.into());
        }
        if !state.contains_user(target) {
            return Err(UsageError::UnknownUser(target).into());
        }
        Ok(())
    }

    async fn notify_operator(&self, text: &str) {
        if let Err(e) = self
            .transport
            .send_notice(self.config.operator_chat(), text)
            .await
        {
            warn!(error = %e, "step: operator notice failed");
        }
    }
}

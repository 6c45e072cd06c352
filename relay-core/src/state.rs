//! In-memory relay state: users, moderation flags, reply bindings, debounce window and operator
//! availability. One instance per process, owned by [`crate::RelayCore`].

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{RelayError, Result};
use crate::types::{MessageRef, ModerationFlag, RelayStats, UserId, UserIdentity, UserRecord};

/// Outbound message id → originating user. Evicts oldest entries past `capacity` (0 = unbounded).
#[derive(Debug, Clone)]
pub struct ReplyBindings {
    map: HashMap<MessageRef, UserId>,
    order: VecDeque<MessageRef>,
    capacity: usize,
}

impl ReplyBindings {
    pub fn new(capacity: usize) -> Self {
        Self {
            map: HashMap::new(),
            order: VecDeque::new(),
            capacity,
        }
    }

    /// Inserts a binding; returns the id evicted to make room, if any.
    pub fn insert(&mut self, outbound: MessageRef, user: UserId) -> Option<MessageRef> {
        if self.map.insert(outbound, user).is_some() {
            // Same outbound id reused by the transport: keep a single queue slot.
            self.order.retain(|id| *id != outbound);
        }
        self.order.push_back(outbound);

        if self.capacity > 0 && self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.map.remove(&oldest);
                return Some(oldest);
            }
        }
        None
    }

    pub fn get(&self, outbound: MessageRef) -> Option<UserId> {
        self.map.get(&outbound).copied()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = (MessageRef, UserId)> + '_ {
        self.order
            .iter()
            .filter_map(move |id| self.map.get(id).map(|user| (*id, *user)))
    }
}

/// Serializable copy of the whole state, used by the load/save hooks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelaySnapshot {
    pub users: Vec<UserRecord>,
    /// Oldest first.
    pub bindings: Vec<(MessageRef, UserId)>,
    pub admin_online: bool,
}

impl Default for RelaySnapshot {
    fn default() -> Self {
        Self {
            users: Vec::new(),
            bindings: Vec::new(),
            admin_online: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RelayState {
    users: HashMap<UserId, UserRecord>,
    bindings: ReplyBindings,
    last_accepted: HashMap<UserId, DateTime<Utc>>,
    admin_online: bool,
}

impl RelayState {
    pub fn new(binding_capacity: usize) -> Self {
        Self {
            users: HashMap::new(),
            bindings: ReplyBindings::new(binding_capacity),
            last_accepted: HashMap::new(),
            admin_online: true,
        }
    }

    /// Rebuilds state from a snapshot. Bindings pointing at unknown users are dropped.
    pub fn from_snapshot(snapshot: RelaySnapshot, binding_capacity: usize) -> Self {
        let mut state = Self::new(binding_capacity);
        state.admin_online = snapshot.admin_online;
        for user in snapshot.users {
            state.users.insert(user.id, user);
        }
        for (outbound, user) in snapshot.bindings {
            if state.users.contains_key(&user) {
                state.bindings.insert(outbound, user);
            }
        }
        state
    }

    pub fn snapshot(&self) -> RelaySnapshot {
        let mut users: Vec<UserRecord> = self.users.values().cloned().collect();
        users.sort_by_key(|u| u.id);
        RelaySnapshot {
            users,
            bindings: self.bindings.iter().collect(),
            admin_online: self.admin_online,
        }
    }

    pub fn user(&self, id: UserId) -> Option<&UserRecord> {
        self.users.get(&id)
    }

    pub fn contains_user(&self, id: UserId) -> bool {
        self.users.contains_key(&id)
    }

    pub fn flag(&self, id: UserId) -> ModerationFlag {
        self.users.get(&id).map(|u| u.flag).unwrap_or_default()
    }

    pub fn is_banned(&self, id: UserId) -> bool {
        self.flag(id) == ModerationFlag::Banned
    }

    /// Accepts the message and records `now` when at least `window` passed since the last
    /// accepted one; otherwise leaves the window untouched and returns false.
    pub fn check_rate(&mut self, id: UserId, now: DateTime<Utc>, window: Duration) -> bool {
        if let Some(last) = self.last_accepted.get(&id) {
            if now - *last < window {
                return false;
            }
        }
        self.last_accepted.insert(id, now);
        true
    }

    /// Creates the user if needed, refreshes identity and bumps the message counter.
    pub fn record_message(&mut self, identity: &UserIdentity, now: DateTime<Utc>) -> &UserRecord {
        let record = self
            .users
            .entry(identity.id)
            .or_insert_with(|| UserRecord::new(identity, now));
        record.touch(identity, now);
        record.message_count += 1;
        record
    }

    /// Creates the user if needed and refreshes identity without counting a message.
    pub fn touch_user(&mut self, identity: &UserIdentity, now: DateTime<Utc>) -> &UserRecord {
        let record = self
            .users
            .entry(identity.id)
            .or_insert_with(|| UserRecord::new(identity, now));
        record.touch(identity, now);
        record
    }

    /// Sets the flag and returns the previous one.
    pub fn set_flag(&mut self, id: UserId, flag: ModerationFlag) -> Result<ModerationFlag> {
        let record = self
            .users
            .get_mut(&id)
            .ok_or_else(|| RelayError::State(format!("no user {}", id)))?;
        Ok(std::mem::replace(&mut record.flag, flag))
    }

    /// Clears `flag` if it is the one currently set. Returns whether anything changed.
    pub fn clear_flag(&mut self, id: UserId, flag: ModerationFlag) -> Result<bool> {
        let record = self
            .users
            .get_mut(&id)
            .ok_or_else(|| RelayError::State(format!("no user {}", id)))?;
        if record.flag == flag {
            record.flag = ModerationFlag::None;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Binds an outbound message to the user it came from. The user must exist.
    pub fn bind(&mut self, outbound: MessageRef, user: UserId) -> Result<Option<MessageRef>> {
        if !self.users.contains_key(&user) {
            return Err(RelayError::State(format!(
                "cannot bind message {} to unknown user {}",
                outbound, user
            )));
        }
        Ok(self.bindings.insert(outbound, user))
    }

    pub fn binding(&self, outbound: MessageRef) -> Option<UserId> {
        self.bindings.get(outbound)
    }

    pub fn binding_count(&self) -> usize {
        self.bindings.len()
    }

    /// Every user not banned, ordered by id.
    pub fn broadcast_recipients(&self) -> Vec<UserId> {
        let mut ids: Vec<UserId> = self
            .users
            .values()
            .filter(|u| !u.is_banned())
            .map(|u| u.id)
            .collect();
        ids.sort();
        ids
    }

    pub fn total_users(&self) -> usize {
        self.users.len()
    }

    pub fn admin_online(&self) -> bool {
        self.admin_online
    }

    pub fn set_admin_online(&mut self, online: bool) {
        self.admin_online = online;
    }

    pub fn stats(&self) -> RelayStats {
        let mut stats = RelayStats {
            total_users: self.users.len(),
            bindings: self.bindings.len(),
            admin_online: self.admin_online,
            ..RelayStats::default()
        };
        for user in self.users.values() {
            stats.messages += user.message_count;
            match user.flag {
                ModerationFlag::Banned => stats.banned += 1,
                ModerationFlag::Silenced => stats.silenced += 1,
                ModerationFlag::None => {}
            }
        }
        stats
    }
}

//! # relay-core
//!
//! Single-operator message relay: user messages are forwarded to the operator, the operator's
//! replies are routed back through [`ReplyBindings`], and ban/silence/broadcast commands act on
//! an explicit [`RelayState`]. Transport-agnostic; `relay-telegram` supplies the [`Transport`].

pub mod command;
pub mod error;
pub mod logger;
pub mod notice;
pub mod relay;
pub mod state;
pub mod transport;
pub mod types;

pub use command::Command;
pub use error::{RelayError, Result, UsageError};
pub use logger::{init_console_tracing, init_tracing};
pub use relay::{
    BroadcastPayload, BroadcastReport, InboundOutcome, RelayConfig, RelayCore, ReplyOutcome,
    DEFAULT_BINDING_CAPACITY, DEFAULT_DEBOUNCE_MS,
};
pub use state::{RelaySnapshot, RelayState, ReplyBindings};
pub use transport::Transport;
pub use types::{
    ChatId, InboundEvent, MenuButton, MessageRef, ModerationFlag, PhotoRef, RelayStats, UserId,
    UserIdentity, UserRecord,
};

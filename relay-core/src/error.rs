use crate::types::UserId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Usage error: {0}")]
    Usage(#[from] UsageError),

    #[error("Unauthorized actor: {0}")]
    Unauthorized(UserId),

    #[error("State error: {0}")]
    State(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Operator mistakes. Reported back as a short corrective notice.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UsageError {
    #[error("no target given")]
    MissingTarget,

    #[error("not a user id: {0}")]
    InvalidUserId(String),

    #[error("the replied message is not linked to a user")]
    UnboundReply,

    #[error("unknown user {0}")]
    UnknownUser(UserId),

    #[error("the operator cannot be targeted")]
    OperatorTarget,

    #[error("nothing to broadcast")]
    MissingPayload,

    #[error("unknown command /{0}")]
    UnknownCommand(String),
}

pub type Result<T> = std::result::Result<T, RelayError>;

//! Operator command surface: parsing `/name[@bot] args` into [`Command`].

/// Every command the relay understands. Target-taking variants keep the raw argument; it is
/// resolved against state at dispatch time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Total,
    Stats,
    Info(Option<String>),
    Dp(Option<String>),
    Ban(Option<String>),
    Unban(Option<String>),
    Silence(Option<String>),
    Unsilence(Option<String>),
    /// Trailing text, used when the command does not reply to a payload message.
    Broadcast(Option<String>),
    Online,
    Offline,
    Panel,
    Unknown(String),
}

impl Command {
    /// Parses command text. Returns `None` when `text` is not a command at all.
    pub fn parse(text: &str) -> Option<Command> {
        let text = text.trim();
        let rest = text.strip_prefix('/')?;

        let (head, args) = match rest.split_once(char::is_whitespace) {
            Some((head, args)) => (head, args.trim()),
            None => (rest, ""),
        };
        // "/ban@relay_bot 42" targets this bot explicitly.
        let name = head.split('@').next().unwrap_or(head).to_ascii_lowercase();
        if name.is_empty() {
            return None;
        }

        let first_arg = args.split_whitespace().next().map(str::to_string);
        let tail = (!args.is_empty()).then(|| args.to_string());

        let command = match name.as_str() {
            "start" => Command::Start,
            "help" => Command::Help,
            "total" | "users" => Command::Total,
            "stats" => Command::Stats,
            "info" | "profile" => Command::Info(first_arg),
            "dp" => Command::Dp(first_arg),
            "ban" | "block" => Command::Ban(first_arg),
            "unban" | "unblock" => Command::Unban(first_arg),
            "silence" | "mute" => Command::Silence(first_arg),
            "unsilence" | "unmute" => Command::Unsilence(first_arg),
            "broadcast" => Command::Broadcast(tail),
            "online" => Command::Online,
            "offline" => Command::Offline,
            "panel" => Command::Panel,
            _ => Command::Unknown(name),
        };
        Some(command)
    }

    /// True for everything except `/start`. Non-operators invoking these are ignored.
    pub fn is_operator_only(&self) -> bool {
        !matches!(self, Command::Start | Command::Unknown(_))
    }

    pub fn name(&self) -> &str {
        match self {
            Command::Start => "start",
            Command::Help => "help",
            Command::Total => "total",
            Command::Stats => "stats",
            Command::Info(_) => "info",
            Command::Dp(_) => "dp",
            Command::Ban(_) => "ban",
            Command::Unban(_) => "unban",
            Command::Silence(_) => "silence",
            Command::Unsilence(_) => "unsilence",
            Command::Broadcast(_) => "broadcast",
            Command::Online => "online",
            Command::Offline => "offline",
            Command::Panel => "panel",
            Command::Unknown(name) => name,
        }
    }

    pub fn usage(&self) -> &'static str {
        match self {
            Command::Info(_) => "/info USER_ID (or reply to a relayed message)",
            Command::Dp(_) => "/dp USER_ID (or reply to a relayed message)",
            Command::Ban(_) => "/ban USER_ID (or reply to a relayed message)",
            Command::Unban(_) => "/unban USER_ID (or reply to a relayed message)",
            Command::Silence(_) => "/silence USER_ID (or reply to a relayed message)",
            Command::Unsilence(_) => "/unsilence USER_ID (or reply to a relayed message)",
            Command::Broadcast(_) => "/broadcast TEXT (or reply to the message to broadcast)",
            _ => "/help",
        }
    }
}

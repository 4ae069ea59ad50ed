//! The `twitch` administrative command group.
//!
//! ```text
//! !twitch                          usage
//! !twitch channels                 disable announcements in this server
//! !twitch channels #live #general  announce in exactly these channels
//! ```

use thiserror::Error;

use crate::Result;
use crate::notifier::StreamNotifier;

pub const COMMAND_GROUP: &str = "twitch";

const USAGE: &str = "Administrative commands for twitch functions. \
Notifies when discord says you're streaming.\n\
`twitch channels [channel...]`: specify channels to notify when a member goes live, \
or use no arguments to disable.";

/// Usage errors, shown to the invoker as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("You need the Manage Server permission to use this command.")]
    MissingPermission,
    #[error("`{0}` is not a channel.")]
    InvalidChannel(String),
}

/// A parsed `twitch` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TwitchCommand {
    Help,
    Channels(Vec<String>),
}

/// Who invoked a command, and where.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub server_id: String,
    /// Whether the invoker holds the manage-server permission.
    pub can_manage_server: bool,
}

/// Parse a message. `None` when the message is not a `twitch` command.
pub fn parse(content: &str, prefix: &str) -> Option<std::result::Result<TwitchCommand, CommandError>> {
    let mut words = content.trim().strip_prefix(prefix)?.split_whitespace();
    if !words.next()?.eq_ignore_ascii_case(COMMAND_GROUP) {
        return None;
    }

    let command = match words.next() {
        Some(sub) if sub.eq_ignore_ascii_case("channels") => words
            .map(parse_channel)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map(TwitchCommand::Channels),
        _ => Ok(TwitchCommand::Help),
    };
    Some(command)
}

/// Accept a channel mention (`<#123>`) or a bare channel id.
pub fn parse_channel(arg: &str) -> std::result::Result<String, CommandError> {
    let id = arg
        .strip_prefix("<#")
        .and_then(|rest| rest.strip_suffix('>'))
        .unwrap_or(arg);

    if !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()) {
        Ok(id.to_string())
    } else {
        Err(CommandError::InvalidChannel(arg.to_string()))
    }
}

/// Run a parsed command and return the reply text.
pub async fn execute(
    notifier: &StreamNotifier,
    invocation: &Invocation,
    command: TwitchCommand,
) -> Result<String> {
    match command {
        TwitchCommand::Help => Ok(USAGE.to_string()),
        TwitchCommand::Channels(channels) => {
            if !invocation.can_manage_server {
                return Err(CommandError::MissingPermission.into());
            }
            let confirmation = notifier
                .configure_channels(&invocation.server_id, channels)
                .await?;
            Ok(confirmation.to_string())
        }
    }
}

/// Parse and run a message. `None` when the message is not a `twitch` command.
pub async fn handle_message(
    notifier: &StreamNotifier,
    invocation: &Invocation,
    content: &str,
    prefix: &str,
) -> Option<Result<String>> {
    let command = match parse(content, prefix)? {
        Ok(command) => command,
        Err(e) => return Some(Err(e.into())),
    };
    Some(execute(notifier, invocation, command).await)
}

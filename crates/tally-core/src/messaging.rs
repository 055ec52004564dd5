//! Platform-neutral inbound update model.
//!
//! Telegram-specific fields live in the Telegram adapter; the adapter decodes
//! each update into an [`Incoming`] exactly once.

use crate::domain::{ChatId, ChatKind, UserId};

/// Who sent a message and where.
#[derive(Clone, Debug, PartialEq)]
pub struct Sender {
    pub user_id: UserId,
    pub chat_id: ChatId,
    pub chat_kind: ChatKind,
    pub username: String,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Incoming {
    Command(CommandMessage),
    Text(TextMessage),
}

#[derive(Clone, Debug, PartialEq)]
pub struct CommandMessage {
    pub sender: Sender,
    /// Lowercased command name without the leading `/` or `@botname` suffix.
    pub name: String,
    /// The `@botname` suffix, if any, lowercased and without the `@`.
    pub mention: Option<String>,
    pub args: String,
}

impl CommandMessage {
    /// A bare `/cmd` is for every bot in the chat; `/cmd@name` only for `name`.
    /// With our own username unknown, mentioned commands are not ours.
    pub fn is_addressed_to(&self, own_username: Option<&str>) -> bool {
        match (&self.mention, own_username) {
            (None, _) => true,
            (Some(mention), Some(own)) => mention.eq_ignore_ascii_case(own.trim_start_matches('@')),
            (Some(_), None) => false,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TextMessage {
    pub sender: Sender,
    pub text: String,
}

impl Incoming {
    /// Decode raw message text: `/cmd@botname args` becomes a command,
    /// anything else is free text.
    pub fn from_text(sender: Sender, text: &str) -> Self {
        if text.trim_start().starts_with('/') {
            let (name, mention, args) = parse_command(text);
            return Incoming::Command(CommandMessage {
                sender,
                name,
                mention,
                args,
            });
        }
        Incoming::Text(TextMessage {
            sender,
            text: text.to_string(),
        })
    }

    pub fn sender(&self) -> &Sender {
        match self {
            Incoming::Command(c) => &c.sender,
            Incoming::Text(t) => &t.sender,
        }
    }
}

/// Split `/cmd@botname arg1 ...` into (`cmd`, `Some("botname")`, `arg1 ...`).
pub fn parse_command(text: &str) -> (String, Option<String>, String) {
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let (cmd, mention) = match first.trim_start_matches('/').split_once('@') {
        Some((cmd, bot)) => (cmd, Some(bot.to_lowercase())),
        None => (first.trim_start_matches('/'), None),
    };

    (cmd.to_lowercase(), mention, rest)
}

/// What the bot wants to send back for one inbound message.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    Reply(String),
    Silent,
}

impl Outcome {
    pub fn reply(text: impl Into<String>) -> Self {
        Outcome::Reply(text.into())
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Outcome::Reply(s) => Some(s),
            Outcome::Silent => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sender() -> Sender {
        Sender {
            user_id: UserId(1),
            chat_id: ChatId(1),
            chat_kind: ChatKind::Private,
            username: "alice".to_string(),
        }
    }

    #[test]
    fn parses_command_with_bot_suffix() {
        assert_eq!(
            parse_command("/Stats@Tally_Bot  now"),
            (
                "stats".to_string(),
                Some("tally_bot".to_string()),
                "now".to_string()
            )
        );
        assert_eq!(
            parse_command("/list"),
            ("list".to_string(), None, String::new())
        );
    }

    fn command(text: &str) -> CommandMessage {
        match Incoming::from_text(sender(), text) {
            Incoming::Command(c) => c,
            other => panic!("expected command, got {other:?}"),
        }
    }

    #[test]
    fn mentioned_commands_only_match_their_bot() {
        assert!(command("/clear").is_addressed_to(Some("tally_bot")));
        assert!(command("/clear").is_addressed_to(None));
        assert!(command("/clear@Tally_Bot").is_addressed_to(Some("tally_bot")));
        assert!(command("/clear@tally_bot").is_addressed_to(Some("@Tally_Bot")));
        assert!(!command("/clear@other_bot").is_addressed_to(Some("tally_bot")));
        assert!(!command("/clear@tally_bot").is_addressed_to(None));
    }

    #[test]
    fn decodes_commands_and_text() {
        match Incoming::from_text(sender(), "/add 12 food lunch") {
            Incoming::Command(c) => {
                assert_eq!(c.name, "add");
                assert_eq!(c.args, "12 food lunch");
            }
            other => panic!("expected command, got {other:?}"),
        }
        match Incoming::from_text(sender(), "早餐 15") {
            Incoming::Text(t) => assert_eq!(t.text, "早餐 15"),
            other => panic!("expected text, got {other:?}"),
        }
    }
}

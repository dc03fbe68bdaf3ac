//! Chat command parsing.
//!
//! A message is addressed to the bot either with a `!` prefix or by
//! mentioning its name before a colon (`archivebot: status`). Chat clients
//! append digits to disambiguate mentions, so `archivebot2:` also matches.

use std::fmt;

use regex::Regex;

use crate::archive::FeedKey;

/// A command word understood by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Track,
    Add,
    Remove,
    Status,
    /// Anything else. Ignored by the dispatcher.
    Other(String),
}

impl Command {
    pub fn from_word(word: &str) -> Self {
        match word {
            "track" => Command::Track,
            "add" => Command::Add,
            "rm" | "remove" => Command::Remove,
            "status" => Command::Status,
            other => Command::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Command::Track => "track",
            Command::Add => "add",
            Command::Remove => "remove",
            Command::Status => "status",
            Command::Other(word) => word,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed chat command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub command: Command,
    pub key: Option<FeedKey>,
}

/// Parse a raw chat message.
///
/// Returns `None` when the message is not addressed to `bot_name` or the key
/// argument is malformed.
pub fn parse(raw: &str, bot_name: Option<&str>) -> Option<Operation> {
    let message = raw.trim();

    let message = match message.strip_prefix('!') {
        Some(rest) => rest,
        None => {
            let (mention, _) = message.split_once(':')?;
            let name = mention.trim().trim_end_matches(|c: char| c.is_ascii_digit()).trim();
            if Some(name) != bot_name {
                return None;
            }
            message
        }
    };

    let body = match message.rsplit_once(':') {
        Some((_, body)) => body.trim(),
        None => message.trim(),
    };

    if !body.contains(' ') {
        return Some(Operation {
            command: Command::from_word(body),
            key: None,
        });
    }

    let re = Regex::new(r"^[0-9a-f]{64}$").ok()?;
    let mut parts = body.split(' ');
    let command = parts.next()?;
    let key = parts.next()?;
    if !re.is_match(key) {
        return None;
    }

    Some(Operation {
        command: Command::from_word(command),
        key: Some(key.parse().ok()?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "a3f0000000000000000000000000000000000000000000000000000000000001";

    fn key() -> FeedKey {
        KEY.parse().unwrap()
    }

    #[test]
    fn test_bang_prefix_ignores_name() {
        let op = parse(&format!("!add {}", KEY), Some("archivebot")).unwrap();
        assert_eq!(op.command, Command::Add);
        assert_eq!(op.key, Some(key()));

        let op = parse("  !status  ", None).unwrap();
        assert_eq!(op.command, Command::Status);
        assert_eq!(op.key, None);
    }

    #[test]
    fn test_mention_must_match_name() {
        let op = parse(&format!("archivebot: status {}", KEY), Some("archivebot")).unwrap();
        assert_eq!(op.command, Command::Status);
        assert_eq!(op.key, Some(key()));

        assert!(parse("otherbot: status", Some("archivebot")).is_none());
        assert!(parse("archivebot: status", None).is_none());
    }

    #[test]
    fn test_mention_digit_suffix_is_stripped() {
        let op = parse("archivebot2: status", Some("archivebot")).unwrap();
        assert_eq!(op.command, Command::Status);

        let op = parse(" archivebot17 :status", Some("archivebot")).unwrap();
        assert_eq!(op.command, Command::Status);
    }

    #[test]
    fn test_unaddressed_chatter() {
        assert!(parse("random chatter", Some("archivebot")).is_none());
        assert!(parse("status", Some("archivebot")).is_none());
        assert!(parse("", Some("archivebot")).is_none());
    }

    #[test]
    fn test_body_is_after_last_colon() {
        let op = parse("archivebot: note: status", Some("archivebot")).unwrap();
        assert_eq!(op.command, Command::Status);

        let op = parse(&format!("!ignored: rm {}", KEY), None).unwrap();
        assert_eq!(op.command, Command::Remove);
        assert_eq!(op.key, Some(key()));
    }

    #[test]
    fn test_key_must_be_64_lowercase_hex() {
        let bot = Some("archivebot");
        assert!(parse(&format!("!add {}", KEY.to_uppercase()), bot).is_none());
        assert!(parse(&format!("!add {}", &KEY[..63]), bot).is_none());
        assert!(parse(&format!("!add {}0", KEY), bot).is_none());
        assert!(parse("!add notakey", bot).is_none());
        // A double space leaves an empty second token.
        assert!(parse(&format!("!add  {}", KEY), bot).is_none());
    }

    #[test]
    fn test_extra_tokens_ignored() {
        let op = parse(&format!("!add {} please", KEY), None).unwrap();
        assert_eq!(op.command, Command::Add);
        assert_eq!(op.key, Some(key()));
    }

    #[test]
    fn test_unknown_command_word() {
        let op = parse("!dance", None).unwrap();
        assert_eq!(op.command, Command::Other("dance".to_string()));
        assert_eq!(op.command.to_string(), "dance");
    }
}

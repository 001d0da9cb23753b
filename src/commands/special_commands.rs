//! Special commands parser for interactive chat mode
//!
//! Special commands navigate and reshape the conversation graph instead of
//! being sent as a message:
//! - Edit or regenerate a turn (creates a new branch)
//! - Cycle between alternative branches of a turn
//! - Delete a turn and everything after it
//! - Show the branch tree, retitle, start or open chats
//!
//! Commands are prefixed with `/`. Command names are case-insensitive;
//! arguments are kept verbatim. Message numbers are 1-based positions in the
//! visible transcript.

use thiserror::Error;

/// Errors that can occur when parsing special commands
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Unknown command was entered
    #[error("Unknown command: {0}\n\nType '/help' to see available commands")]
    UnknownCommand(String),

    /// Command was given an unsupported argument
    #[error("Unsupported argument for {command}: {arg}\n\nType '/help' to see valid usage")]
    UnsupportedArgument { command: String, arg: String },

    /// Command requires an argument but none was provided
    #[error("Command {command} requires an argument\n\nUsage: {usage}")]
    MissingArgument { command: String, usage: String },
}

/// Special commands that can be executed during interactive chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecialCommand {
    /// Replace message `index` with `text`, branching at that turn
    Edit { index: usize, text: String },

    /// Ask for a new version of the last reply
    Regenerate,

    /// Show the next alternative of message `index`'s turn
    NextBranch(usize),

    /// Show the previous alternative of message `index`'s turn
    PrevBranch(usize),

    /// Delete message `index`'s turn and everything after it
    Delete(usize),

    /// Print the branch tree of the current chat
    Tree,

    /// Set the title, or generate one when no text is given
    Title(Option<String>),

    /// Start a fresh chat
    New,

    /// Switch to a stored chat by id or id prefix
    Open(String),

    /// List stored chats
    Chats,

    /// Display help information
    Help,

    /// Exit the interactive session
    Exit,

    /// Not a special command; the input is a chat message
    None,
}

/// Parse user input into a special command
///
/// # Examples
///
/// ```
/// use chatloom::commands::special_commands::{parse_special_command, SpecialCommand};
///
/// assert_eq!(parse_special_command("/next 3"), Ok(SpecialCommand::NextBranch(3)));
/// assert_eq!(parse_special_command("hello"), Ok(SpecialCommand::None));
/// assert!(parse_special_command("/next").is_err());
/// ```
pub fn parse_special_command(input: &str) -> Result<SpecialCommand, CommandError> {
    let trimmed = input.trim();
    let lower = trimmed.to_lowercase();

    // Plain input is a message, except the bare exit words
    if !trimmed.starts_with('/') {
        return Ok(match lower.as_str() {
            "exit" | "quit" => SpecialCommand::Exit,
            _ => SpecialCommand::None,
        });
    }

    let (name, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((name, rest)) => (name.to_lowercase(), rest.trim()),
        None => (lower.clone(), ""),
    };

    match name.as_str() {
        "/edit" => {
            let usage = "/edit <message number> <new text>";
            let (index, text) = match rest.split_once(char::is_whitespace) {
                Some((index, text)) if !text.trim().is_empty() => (index, text.trim()),
                _ => {
                    return Err(CommandError::MissingArgument {
                        command: "/edit".to_string(),
                        usage: usage.to_string(),
                    })
                }
            };
            Ok(SpecialCommand::Edit {
                index: parse_index("/edit", index)?,
                text: text.to_string(),
            })
        }
        "/regen" | "/regenerate" => Ok(SpecialCommand::Regenerate),
        "/next" => Ok(SpecialCommand::NextBranch(required_index("/next", rest)?)),
        "/prev" => Ok(SpecialCommand::PrevBranch(required_index("/prev", rest)?)),
        "/delete" => Ok(SpecialCommand::Delete(required_index("/delete", rest)?)),
        "/tree" => Ok(SpecialCommand::Tree),
        "/title" => Ok(SpecialCommand::Title(
            Some(rest.to_string()).filter(|title| !title.is_empty()),
        )),
        "/new" => Ok(SpecialCommand::New),
        "/open" => {
            if rest.is_empty() {
                Err(CommandError::MissingArgument {
                    command: "/open".to_string(),
                    usage: "/open <chat id>".to_string(),
                })
            } else {
                Ok(SpecialCommand::Open(rest.to_string()))
            }
        }
        "/chats" => Ok(SpecialCommand::Chats),
        "/help" | "/?" => Ok(SpecialCommand::Help),
        "/exit" | "/quit" => Ok(SpecialCommand::Exit),
        _ => Err(CommandError::UnknownCommand(trimmed.to_string())),
    }
}

fn required_index(command: &str, rest: &str) -> Result<usize, CommandError> {
    if rest.is_empty() {
        return Err(CommandError::MissingArgument {
            command: command.to_string(),
            usage: format!("{} <message number>", command),
        });
    }
    parse_index(command, rest)
}

fn parse_index(command: &str, arg: &str) -> Result<usize, CommandError> {
    match arg.parse::<usize>() {
        Ok(index) if index > 0 => Ok(index),
        _ => Err(CommandError::UnsupportedArgument {
            command: command.to_string(),
            arg: arg.to_string(),
        }),
    }
}

/// Display help information for special commands
pub fn print_help() {
    println!(
        r#"
Special Commands for Interactive Chat Mode
==========================================

BRANCHING:
  /edit <n> <text> - Rewrite message n; the old version stays as a branch
  /regen           - Ask for a new version of the last reply
  /next <n>        - Show the next alternative of message n
  /prev <n>        - Show the previous alternative of message n
  /delete <n>      - Delete message n and everything after it
  /tree            - Show the branch tree of this chat

CHATS:
  /title [text]    - Set the chat title, or generate one
  /new             - Start a new chat
  /open <id>       - Open a stored chat (full ID or 8-char prefix)
  /chats           - List stored chats

SESSION CONTROL:
  /help            - Show this help message
  /?               - Same as /help
  /exit, exit      - Exit interactive mode
  quit             - Same as exit

NOTES:
  Message numbers are shown in brackets next to each message, e.g. [3].
  Alternatives are shown as <current/total> when a turn has siblings.
"#
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_not_a_command() {
        assert_eq!(
            parse_special_command("Tell me a story"),
            Ok(SpecialCommand::None)
        );
        assert_eq!(parse_special_command("exit"), Ok(SpecialCommand::Exit));
        assert_eq!(parse_special_command("QUIT"), Ok(SpecialCommand::Exit));
    }

    #[test]
    fn test_parse_edit_keeps_text_verbatim() {
        assert_eq!(
            parse_special_command("/EDIT 2  Hello There, Friend "),
            Ok(SpecialCommand::Edit {
                index: 2,
                text: "Hello There, Friend".to_string()
            })
        );
    }

    #[test]
    fn test_parse_edit_errors() {
        assert!(matches!(
            parse_special_command("/edit 2"),
            Err(CommandError::MissingArgument { .. })
        ));
        assert!(matches!(
            parse_special_command("/edit"),
            Err(CommandError::MissingArgument { .. })
        ));
        assert!(matches!(
            parse_special_command("/edit two words"),
            Err(CommandError::UnsupportedArgument { .. })
        ));
    }

    #[test]
    fn test_parse_navigation_commands() {
        assert_eq!(
            parse_special_command("/next 1"),
            Ok(SpecialCommand::NextBranch(1))
        );
        assert_eq!(
            parse_special_command("/prev 4"),
            Ok(SpecialCommand::PrevBranch(4))
        );
        assert_eq!(
            parse_special_command("/delete 3"),
            Ok(SpecialCommand::Delete(3))
        );
        assert_eq!(parse_special_command("/regen"), Ok(SpecialCommand::Regenerate));
        assert_eq!(parse_special_command("/tree"), Ok(SpecialCommand::Tree));
    }

    #[test]
    fn test_parse_index_rejects_zero_and_garbage() {
        assert_eq!(
            parse_special_command("/next 0"),
            Err(CommandError::UnsupportedArgument {
                command: "/next".to_string(),
                arg: "0".to_string()
            })
        );
        assert!(matches!(
            parse_special_command("/delete x"),
            Err(CommandError::UnsupportedArgument { .. })
        ));
        assert!(matches!(
            parse_special_command("/prev"),
            Err(CommandError::MissingArgument { .. })
        ));
    }

    #[test]
    fn test_parse_chat_commands() {
        assert_eq!(parse_special_command("/title"), Ok(SpecialCommand::Title(None)));
        assert_eq!(
            parse_special_command("/title Night Market"),
            Ok(SpecialCommand::Title(Some("Night Market".to_string())))
        );
        assert_eq!(parse_special_command("/new"), Ok(SpecialCommand::New));
        assert_eq!(
            parse_special_command("/open AbCdEf12"),
            Ok(SpecialCommand::Open("AbCdEf12".to_string()))
        );
        assert!(parse_special_command("/open").is_err());
        assert_eq!(parse_special_command("/chats"), Ok(SpecialCommand::Chats));
        assert_eq!(parse_special_command("/?"), Ok(SpecialCommand::Help));
    }

    #[test]
    fn test_unknown_command() {
        let err = parse_special_command("/dance").unwrap_err();
        assert_eq!(err, CommandError::UnknownCommand("/dance".to_string()));
        assert!(err.to_string().contains("/help"));
    }
}

//! Input line parsing.
//!
//! Lines starting with `/` are commands; anything else is chat text.

use kqsp_core::{ConnectionError, PeerId};
use thiserror::Error;

/// Help lines, one per command.
pub const HELP: &[&str] = &[
    "/connect <peer>          connect to a peer id (K(...) wrapper accepted)",
    "/disconnect <peer>       close the link to a peer",
    "/peers                   list peer links",
    "/myid                    show your K(addr) and peer id",
    "/file <path> [password]  send a file, optionally password protected",
    "/cancel                  cancel a pending password prompt",
    "/help                    show this list",
    "/quit                    leave the chat",
];

/// A parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Open a link to a peer.
    Connect(PeerId),
    /// Close the link to a peer.
    Disconnect(PeerId),
    /// List links.
    Peers,
    /// Show the local identity.
    MyId,
    /// Send a file.
    File {
        /// Path on disk
        path: String,
        /// Optional password
        password: Option<String>,
    },
    /// Cancel a password prompt.
    Cancel,
    /// Show the command list.
    Help,
    /// Leave.
    Quit,
    /// Chat text.
    Text(String),
}

/// Input that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// A command is missing its argument.
    #[error("usage: {usage}")]
    MissingArgument {
        /// Expected form
        usage: &'static str,
    },

    /// Not a known command.
    #[error("unknown command {command}")]
    Unknown {
        /// The command word as typed
        command: String,
    },

    /// The peer argument is not a usable peer id.
    #[error(transparent)]
    InvalidPeer(#[from] ConnectionError),
}

impl Command {
    /// Parse one input line. Blank lines yield `None`.
    ///
    /// # Errors
    ///
    /// - `CommandError::Unknown` for an unrecognised `/word`
    /// - `CommandError::MissingArgument` for `/connect`, `/disconnect` or
    ///   `/file` without an argument
    /// - `CommandError::InvalidPeer` if the peer argument is empty after
    ///   unwrapping
    pub fn parse(line: &str) -> Result<Option<Self>, CommandError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        if !line.starts_with('/') {
            return Ok(Some(Self::Text(line.to_owned())));
        }

        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let command = match word {
            "/connect" => {
                if rest.is_empty() {
                    return Err(CommandError::MissingArgument { usage: "/connect <peer>" });
                }
                Self::Connect(PeerId::parse_target(rest)?)
            },
            "/disconnect" => {
                if rest.is_empty() {
                    return Err(CommandError::MissingArgument { usage: "/disconnect <peer>" });
                }
                Self::Disconnect(PeerId::parse_target(rest)?)
            },
            "/file" => {
                if rest.is_empty() {
                    return Err(CommandError::MissingArgument { usage: "/file <path> [password]" });
                }
                let (path, password) = match rest.split_once(char::is_whitespace) {
                    Some((path, password)) => (path, Some(password.trim())),
                    None => (rest, None),
                };
                Self::File {
                    path: path.to_owned(),
                    password: password.filter(|p| !p.is_empty()).map(str::to_owned),
                }
            },
            "/peers" => Self::Peers,
            "/myid" => Self::MyId,
            "/cancel" => Self::Cancel,
            "/help" => Self::Help,
            "/quit" | "/exit" => Self::Quit,
            other => return Err(CommandError::Unknown { command: other.to_owned() }),
        };
        Ok(Some(command))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_text() {
        let parsed = Command::parse("  hello there \n");
        assert_eq!(parsed, Ok(Some(Command::Text("hello there".into()))));
    }

    #[test]
    fn blank_line_is_nothing() {
        assert_eq!(Command::parse("   "), Ok(None));
    }

    #[test]
    fn connect_strips_display_wrapper() {
        assert_eq!(
            Command::parse("/connect K(kqsp-cli-1-2-3-4-abcd)"),
            Ok(Some(Command::Connect(PeerId::from("kqsp-cli-1-2-3-4-abcd"))))
        );
    }

    #[test]
    fn connect_needs_target() {
        assert!(matches!(Command::parse("/connect"), Err(CommandError::MissingArgument { .. })));
        assert!(matches!(Command::parse("/connect K()"), Err(CommandError::InvalidPeer(_))));
    }

    #[test]
    fn disconnect_takes_a_peer() {
        assert_eq!(
            Command::parse("/disconnect K(bob)"),
            Ok(Some(Command::Disconnect(PeerId::from("bob"))))
        );
        assert!(matches!(
            Command::parse("/disconnect"),
            Err(CommandError::MissingArgument { usage: "/disconnect <peer>" })
        ));
    }

    #[test]
    fn file_with_and_without_password() {
        assert_eq!(
            Command::parse("/file notes.txt"),
            Ok(Some(Command::File { path: "notes.txt".into(), password: None }))
        );
        assert_eq!(
            Command::parse("/file notes.txt open sesame"),
            Ok(Some(Command::File {
                path: "notes.txt".into(),
                password: Some("open sesame".into())
            }))
        );
    }

    #[test]
    fn unknown_command_is_reported() {
        assert_eq!(
            Command::parse("/dance now"),
            Err(CommandError::Unknown { command: "/dance".into() })
        );
    }

    #[test]
    fn simple_commands() {
        assert_eq!(Command::parse("/peers"), Ok(Some(Command::Peers)));
        assert_eq!(Command::parse("/myid"), Ok(Some(Command::MyId)));
        assert_eq!(Command::parse("/quit"), Ok(Some(Command::Quit)));
        assert_eq!(Command::parse("/cancel"), Ok(Some(Command::Cancel)));
    }
}

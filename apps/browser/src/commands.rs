//! Commands typed at the browser prompt.

use shared::domain::NodeId;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserCommand {
    Open { row: usize },
    Up,
    Jump { node_id: NodeId },
    AddAccount { name: String, remote_id: i64 },
    List,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("empty command")]
    Empty,
    #[error("unknown command '{0}', type 'help' for a list")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
}

pub const HELP: &str = "\
open N        activate row N
up            go to the nearest real parent
jump ID       jump to a loaded node by id
add NAME ID   register a new account
ls            print the current rows
quit          leave the browser";

impl BrowserCommand {
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Err(CommandError::Empty);
        };
        let args = words.collect::<Vec<_>>();

        match (verb, args.as_slice()) {
            ("open" | "o", [row]) => row
                .parse()
                .map(|row| BrowserCommand::Open { row })
                .map_err(|_| CommandError::Usage("open N")),
            ("open" | "o", _) => Err(CommandError::Usage("open N")),
            ("up" | "..", []) => Ok(BrowserCommand::Up),
            ("jump" | "j", [id]) => id
                .parse()
                .map(|id| BrowserCommand::Jump {
                    node_id: NodeId(id),
                })
                .map_err(|_| CommandError::Usage("jump ID")),
            ("jump" | "j", _) => Err(CommandError::Usage("jump ID")),
            ("add", [name, remote_id]) => remote_id
                .parse()
                .map(|remote_id| BrowserCommand::AddAccount {
                    name: name.to_string(),
                    remote_id,
                })
                .map_err(|_| CommandError::Usage("add NAME ID")),
            ("add", _) => Err(CommandError::Usage("add NAME ID")),
            ("ls", []) => Ok(BrowserCommand::List),
            ("help" | "?", []) => Ok(BrowserCommand::Help),
            ("quit" | "exit" | "q", []) => Ok(BrowserCommand::Quit),
            (other, _) => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

//! Terminal command parsing

use crate::types::{BlockId, Position};
use crate::{Error, Result};
use std::str::FromStr;

/// Help text listing every command
pub const HELP: &str = "\
commands:
  click R C   (c)  pick the cell at row R, column C (0-based)
  pick V           pick the cell holding value V
  submit      (s)  validate the completed sequence
  all         (t)  toggle the full chain listing
  details ID  (d)  toggle the details of block ID
  help        (h)  show this text
  quit        (q)  leave";

/// Action requested by the participant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserCommand {
    Click(Position),
    Pick(u32),
    Submit,
    ToggleShowAll,
    ToggleDetails(BlockId),
    Help,
    Quit,
}

fn number<T: FromStr>(arg: Option<&str>, what: &str) -> Result<T> {
    let raw = arg.ok_or_else(|| Error::invalid_command(format!("missing {}", what)))?;
    raw.parse()
        .map_err(|_| Error::invalid_command(format!("{} must be a number, got '{}'", what, raw)))
}

impl FromStr for UserCommand {
    type Err = Error;

    fn from_str(line: &str) -> Result<Self> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Err(Error::invalid_command("empty command"));
        };

        let command = match verb.to_ascii_lowercase().as_str() {
            "click" | "c" => {
                let row = number(words.next(), "row")?;
                let col = number(words.next(), "column")?;
                UserCommand::Click(Position::new(row, col))
            }
            "pick" | "p" => UserCommand::Pick(number(words.next(), "value")?),
            "submit" | "s" => UserCommand::Submit,
            "all" | "t" => UserCommand::ToggleShowAll,
            "details" | "d" => UserCommand::ToggleDetails(BlockId::new(number(words.next(), "block id")?)),
            "help" | "h" | "?" => UserCommand::Help,
            "quit" | "q" | "exit" => UserCommand::Quit,
            other => {
                return Err(Error::invalid_command(format!(
                    "unknown command '{}', type 'help'",
                    other
                )))
            }
        };

        if let Some(extra) = words.next() {
            return Err(Error::invalid_command(format!("unexpected argument '{}'", extra)));
        }
        Ok(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            "click 1 2".parse::<UserCommand>().unwrap(),
            UserCommand::Click(Position::new(1, 2))
        );
        assert_eq!(
            "  c 0 0 ".parse::<UserCommand>().unwrap(),
            UserCommand::Click(Position::new(0, 0))
        );
        assert_eq!("pick 7".parse::<UserCommand>().unwrap(), UserCommand::Pick(7));
        assert_eq!("S".parse::<UserCommand>().unwrap(), UserCommand::Submit);
        assert_eq!("all".parse::<UserCommand>().unwrap(), UserCommand::ToggleShowAll);
        assert_eq!(
            "d 12".parse::<UserCommand>().unwrap(),
            UserCommand::ToggleDetails(BlockId::new(12))
        );
        assert_eq!("q".parse::<UserCommand>().unwrap(), UserCommand::Quit);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            "".parse::<UserCommand>(),
            Err(Error::InvalidCommand { .. })
        ));
        assert!("click 1".parse::<UserCommand>().is_err());
        assert!("click a b".parse::<UserCommand>().is_err());
        assert!("pick -1".parse::<UserCommand>().is_err());
        assert!("submit now".parse::<UserCommand>().is_err());

        let err = "dance".parse::<UserCommand>().unwrap_err();
        assert!(err.to_string().contains("unknown command 'dance'"));
    }
}

use crate::session::SessionInput;
use rookery_core::{ChessMove, MatchEvent, ParseMoveError, PlayerId, PlayerIdentity, Square};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Errors that can occur during command parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("{0}")]
    InvalidMove(#[from] ParseMoveError),

    #[error("'{0}' is not a square (e.g., 'hints e2')")]
    InvalidSquare(String),

    #[error("{0} requires an argument (e.g., '{1}')")]
    MissingArgument(&'static str, &'static str),

    #[error("Unrecognized command '{0}'. Type 'help' to see available commands")]
    UnrecognizedCommand(String),
}

pub const HELP: &str = "\
Available commands:
  bot                     play the computer
  easy|medium|hard|expert pick the bot difficulty (or 'difficulty <level>')
  online [name] [skill]   find an online opponent
  e2e4 | move e2e4        make a move (add q/r/b/n to pick a promotion)
  hints <square>          show where a piece can go
  retry                   ask the bot again if it didn't move
  board                   show the board
  new                     abandon this match and start over
  help, quit";

/// Parse a command string into a session input.
///
/// `player_id` fills in the default name for `online` without one. A bare word that
/// looks like a move (`e2e4`, `e7e8q`) is a move.
pub fn parse_command(input: &str, player_id: PlayerId) -> Result<SessionInput, ParseError> {
    let trimmed = input.trim();

    // Try single-word commands first
    match trimmed {
        "bot" => return Ok(SessionInput::Event(MatchEvent::SelectLocalBot)),
        "retry" => return Ok(SessionInput::Event(MatchEvent::RetryBot)),
        "new" => return Ok(SessionInput::Event(MatchEvent::NewMatch)),
        "board" | "show" => return Ok(SessionInput::Show),
        "help" | "?" => return Ok(SessionInput::Help),
        "quit" | "exit" => return Ok(SessionInput::Quit),
        "easy" | "medium" | "hard" | "expert" => {
            return Ok(SessionInput::Event(MatchEvent::ConfirmDifficulty {
                level: trimmed.to_string(),
            }))
        }
        _ => {}
    }

    // Parse multi-word commands
    let parts: Vec<&str> = trimmed.split_ascii_whitespace().collect();
    match parts.as_slice() {
        ["online", rest @ ..] => Ok(parse_online_command(rest, player_id)),
        ["difficulty" | "level", level, ..] => {
            Ok(SessionInput::Event(MatchEvent::ConfirmDifficulty {
                level: level.to_string(),
            }))
        }
        ["difficulty" | "level"] => Err(ParseError::MissingArgument("difficulty", "difficulty easy")),
        ["move", mv, ..] => Ok(SessionInput::Event(MatchEvent::LocalMove(mv.parse()?))),
        ["move"] => Err(ParseError::MissingArgument("move", "move e2e4")),
        ["hints", square, ..] => square
            .parse::<Square>()
            .map(SessionInput::Hints)
            .map_err(|_| ParseError::InvalidSquare(square.to_string())),
        ["hints"] => Err(ParseError::MissingArgument("hints", "hints e2")),
        [single] if looks_like_move(single) => {
            Ok(SessionInput::Event(MatchEvent::LocalMove(single.parse::<ChessMove>()?)))
        }
        _ => Err(ParseError::UnrecognizedCommand(trimmed.to_string())),
    }
}

/// Parse "online [name] [skill]"
fn parse_online_command(rest: &[&str], player_id: PlayerId) -> SessionInput {
    let name = rest.first().copied().unwrap_or("");
    let skill = rest.get(1).copied().unwrap_or("");
    SessionInput::Event(MatchEvent::SelectOnline {
        identity: PlayerIdentity::from_prompt(player_id, Some(name), Some(skill)),
    })
}

fn looks_like_move(word: &str) -> bool {
    let bytes = word.as_bytes();
    (4..=5).contains(&bytes.len()) && bytes[0].is_ascii_alphabetic() && bytes[1].is_ascii_digit()
}

/// Read commands from stdin until EOF, queueing each parsed one.
///
/// Parse errors are printed and skipped. EOF queues `Quit`.
pub fn spawn_stdin_reader(
    inputs: mpsc::UnboundedSender<SessionInput>,
    player_id: PlayerId,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match parse_command(&line, player_id) {
                        Ok(input) => {
                            if inputs.send(input).is_err() {
                                return;
                            }
                        }
                        Err(e) => eprintln!("{e}"),
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    eprintln!("Error reading input: {e}");
                    break;
                }
            }
        }
        let _ = inputs.send(SessionInput::Quit);
    })
}

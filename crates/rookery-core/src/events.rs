//! Inputs to and outputs from the match state machine.
//!
//! Everything that can happen to a match (a gesture, a network message, a timer tick) is
//! a [`MatchEvent`]. Everything the match wants done in response (send a message, redraw
//! the board, update the countdown) is a [`MatchEffect`].

use crate::bot::{Countdown, RequestId};
use crate::game::{MatchMode, MatchPhase};
use crate::matchmaking::{MatchAssignment, PlayerId, PlayerIdentity};
use crate::types::{ChessMove, Color};

/// A bot service reply
#[derive(Debug, Clone, PartialEq)]
pub struct BotReply {
    /// Request this answers; `None` if the service didn't say
    pub request_id: Option<RequestId>,
    /// `None` when the service had no move to give
    pub mv: Option<ChessMove>,
    pub thinking_time_seconds: Option<f64>,
    /// Free-form note from the service ("checkmate", "Game is already over", ...)
    pub status: Option<String>,
}

impl BotReply {
    pub fn with_move(mv: ChessMove) -> Self {
        Self {
            request_id: None,
            mv: Some(mv),
            thinking_time_seconds: None,
            status: None,
        }
    }

    pub fn for_request(mut self, request_id: RequestId) -> Self {
        self.request_id = Some(request_id);
        self
    }
}

/// Everything that can happen to a match
#[derive(Debug, Clone, PartialEq)]
pub enum MatchEvent {
    /// Player picked "play the computer"
    SelectLocalBot,
    /// Player picked "play online"; `None` if they backed out of the identity prompt
    SelectOnline { identity: Option<PlayerIdentity> },
    /// Player picked a bot difficulty
    ConfirmDifficulty { level: String },
    /// Server paired us with an opponent
    MatchAssigned(MatchAssignment),
    /// Player dropped a piece
    LocalMove(ChessMove),
    /// Opponent's move relayed by the server
    RemoteMove(ChessMove),
    /// Bot service answered
    BotMove(BotReply),
    /// Ask the bot again after it answered without a move
    RetryBot,
    /// One second passed
    Tick,
    /// Connection to the server closed
    Disconnected,
    /// Abandon the current match and start over
    NewMatch,
}

impl MatchEvent {
    /// Short name for diagnostics
    pub fn name(&self) -> &'static str {
        match self {
            MatchEvent::SelectLocalBot => "select bot mode",
            MatchEvent::SelectOnline { .. } => "select online mode",
            MatchEvent::ConfirmDifficulty { .. } => "confirm difficulty",
            MatchEvent::MatchAssigned(_) => "match found",
            MatchEvent::LocalMove(_) => "local move",
            MatchEvent::RemoteMove(_) => "remote move",
            MatchEvent::BotMove(_) => "bot move",
            MatchEvent::RetryBot => "bot retry",
            MatchEvent::Tick => "tick",
            MatchEvent::Disconnected => "disconnect",
            MatchEvent::NewMatch => "new match",
        }
    }
}

/// Messages the match wants sent to the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    JoinRequest {
        player_id: PlayerId,
        identity: PlayerIdentity,
    },
    LocalMove {
        player_id: PlayerId,
        mv: ChessMove,
    },
    BotMoveRequest {
        player_id: PlayerId,
        request_id: RequestId,
        fen: String,
        difficulty: String,
    },
}

/// Side effects produced by handling an event
#[derive(Debug, Clone, PartialEq)]
pub enum MatchEffect {
    Send(Outbound),
    PhaseChanged(MatchPhase),
    MatchStarted {
        mode: MatchMode,
        local_color: Color,
        /// "White (skill) vs Black (skill)", online only
        matchup: Option<String>,
        /// Bot difficulty, bot mode only
        difficulty: Option<String>,
    },
    BoardUpdated {
        fen: String,
        last_move: Option<ChessMove>,
    },
    StatusText(String),
    Countdown(Countdown),
    CountdownCleared,
    BotMoved {
        elapsed_seconds: f64,
        budget_seconds: u32,
        thinking_time_seconds: f64,
    },
    /// The bot service answered without a move
    BotNoMove { reason: Option<String> },
}

//! Rookery - match logic for a two-player chess client
//!
//! This crate decides, at every moment of a match, whose turn it is and which incoming
//! events may act on the game:
//! - Local play against a bot running behind the server
//! - Online play against a human paired by the server
//!
//! # Architecture
//!
//! Chess rules, the bot engine, the pairing server and the board widget all live
//! elsewhere. The crate talks to the rules engine through [`RulesAdapter`] and to
//! everything else through plain values: [`MatchEvent`]s in, [`MatchEffect`]s out. The
//! caller feeds events to one [`MatchStateMachine`] in arrival order and carries out the
//! effects it returns.
//!
//! # Modules
//!
//! - [`types`]: colors, squares and moves
//! - [`rules`]: rules engine boundary and the `shakmaty` binding
//! - [`bot`]: bot request tracking and the difficulty table
//! - [`matchmaking`]: online pairing handshake
//! - [`remote`]: validating opponent moves
//! - [`events`]: event and effect vocabulary
//! - [`game`]: the match state machine

pub mod bot;
pub mod events;
pub mod game;
pub mod matchmaking;
pub mod remote;
pub mod rules;
pub mod types;

// Re-export commonly used types
pub use bot::{
    BotRequestCoordinator, Countdown, DifficultyTable, PendingBotRequest, RequestId,
    DEFAULT_BUDGET_SECONDS,
};
pub use events::{BotReply, MatchEffect, MatchEvent, Outbound};
pub use game::{MatchError, MatchMode, MatchPhase, MatchStateMachine, TurnState};
pub use matchmaking::{
    MatchAssignment, MatchmakingClient, PlayerId, PlayerIdentity, DEFAULT_SKILL,
};
pub use remote::RemoteMoveSync;
pub use rules::{GameStatus, RulesAdapter, RulesError, ShakmatyRules};
pub use types::{ChessMove, Color, ParseMoveError, ParseSquareError, Promotion, Square};

//! Match state machine.
//!
//! This module contains [`MatchStateMachine`], the single owner of everything that
//! changes during a match: lifecycle phase, mode, whose turn it is, the pending bot
//! request, and the position handle. Events are handled one at a time; each handler checks
//! that the event is valid right now before touching anything, and an event that isn't is
//! rejected with a [`MatchError`] and leaves the state exactly as it was.

use crate::bot::{BotRequestCoordinator, BotRequestRejection, DifficultyTable, PendingBotRequest};
use crate::events::{BotReply, MatchEffect, MatchEvent, Outbound};
use crate::matchmaking::{
    MatchAssignment, MatchmakingClient, MatchmakingRejection, PlayerId, PlayerIdentity,
};
use crate::remote::RemoteMoveSync;
use crate::rules::{GameStatus, RulesAdapter, ShakmatyRules};
use crate::types::{ChessMove, Color, Square};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Thinking time shown when the bot service doesn't report one
pub const DEFAULT_THINKING_TIME_SECONDS: f64 = 10.0;

/// Match lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchPhase {
    /// Nothing chosen yet
    Idle,
    /// Back at mode selection after an aborted choice
    ModeSelected,
    /// Join sent, waiting for the server to pair us
    AwaitingMatch,
    /// Bot mode chosen, waiting for a difficulty
    AwaitingDifficulty,
    Playing,
    /// Checkmate or draw
    GameOver,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchMode {
    Unselected,
    LocalBot,
    OnlineMatch,
}

/// Whose turn it is.
///
/// `local_is_to_move == (side_to_move == local color)` after every mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnState {
    pub side_to_move: Color,
    pub local_is_to_move: bool,
}

impl TurnState {
    pub fn new(side_to_move: Color, local_color: Color) -> Self {
        Self {
            side_to_move,
            local_is_to_move: side_to_move == local_color,
        }
    }

    pub fn is_consistent(&self, local_color: Color) -> bool {
        self.local_is_to_move == (self.side_to_move == local_color)
    }
}

/// Why an event was turned away
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatchError {
    #[error("illegal move {0}")]
    IllegalMove(ChessMove),

    #[error("{event} arrived out of turn")]
    OutOfTurnEvent { event: &'static str },

    #[error("stale {0} reply discarded")]
    StaleReply(&'static str),

    #[error("opponent move {0} is illegal in the local position; boards are out of sync")]
    ProtocolViolation(ChessMove),

    #[error("connection to the server was lost")]
    TransportLost,

    #[error("{event} is not valid while {phase:?}")]
    InvalidPhase {
        event: &'static str,
        phase: MatchPhase,
    },

    #[error("a bot move request is already outstanding")]
    BotRequestOutstanding,

    #[error("already joined matchmaking")]
    JoinAlreadyPending,

    #[error("difficulty must not be empty")]
    InvalidDifficulty,
}

/// The match controller.
///
/// Generic over the rules engine; [`ShakmatyRules`] is the default.
pub struct MatchStateMachine<R: RulesAdapter = ShakmatyRules> {
    rules: R,
    position: R::Position,
    phase: MatchPhase,
    mode: MatchMode,
    local_color: Color,
    turn: TurnState,
    difficulty: Option<String>,
    bot: BotRequestCoordinator,
    matchmaking: MatchmakingClient,
    remote: RemoteMoveSync,
    /// Moves applied this match, both sides, in order
    history: Vec<ChessMove>,
    /// Repetition key of every position reached this match, starting position included
    position_keys: Vec<u64>,
    transport_lost: bool,
}

impl MatchStateMachine<ShakmatyRules> {
    /// A machine backed by `shakmaty` with the stock difficulty table
    pub fn standard(player_id: PlayerId) -> Self {
        Self::new(ShakmatyRules::new(), player_id, DifficultyTable::default())
    }
}

impl<R: RulesAdapter> MatchStateMachine<R> {
    pub fn new(rules: R, player_id: PlayerId, table: DifficultyTable) -> Self {
        let position = rules.initial_position();
        let turn = TurnState::new(rules.side_to_move(&position), Color::White);
        let position_keys = vec![rules.position_key(&position)];
        Self {
            rules,
            position,
            phase: MatchPhase::Idle,
            mode: MatchMode::Unselected,
            local_color: Color::White,
            turn,
            difficulty: None,
            bot: BotRequestCoordinator::new(table),
            matchmaking: MatchmakingClient::new(player_id),
            remote: RemoteMoveSync::new(),
            history: Vec::new(),
            position_keys,
            transport_lost: false,
        }
    }

    // ==================== Queries ====================

    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    pub fn local_color(&self) -> Color {
        self.local_color
    }

    pub fn turn(&self) -> TurnState {
        self.turn
    }

    pub fn player_id(&self) -> PlayerId {
        self.matchmaking.player_id()
    }

    pub fn difficulty(&self) -> Option<&str> {
        self.difficulty.as_deref()
    }

    pub fn rules(&self) -> &R {
        &self.rules
    }

    pub fn position(&self) -> &R::Position {
        &self.position
    }

    pub fn fen(&self) -> String {
        self.rules.fen(&self.position)
    }

    pub fn history(&self) -> &[ChessMove] {
        &self.history
    }

    /// Status of the current position, always computed fresh.
    ///
    /// On top of what the rules engine reports, the third occurrence of a position is a draw.
    pub fn status(&self) -> GameStatus {
        let status = self.rules.status(&self.position);
        if status.is_over() {
            return status;
        }
        let current = self.rules.position_key(&self.position);
        let seen = self.position_keys.iter().filter(|key| **key == current).count();
        if seen >= 3 {
            GameStatus::Draw
        } else {
            status
        }
    }

    pub fn status_text(&self) -> String {
        self.status().describe(self.turn.side_to_move)
    }

    pub fn pending_bot_request(&self) -> Option<&PendingBotRequest> {
        self.bot.pending()
    }

    pub fn assignment(&self) -> Option<&MatchAssignment> {
        self.matchmaking.assignment()
    }

    pub fn identity(&self) -> Option<&PlayerIdentity> {
        self.matchmaking.identity()
    }

    /// "White (skill) vs Black (skill)" for online matches
    pub fn matchup_line(&self) -> Option<String> {
        let identity = self.matchmaking.identity()?;
        Some(self.matchmaking.assignment()?.matchup_line(identity))
    }

    pub fn is_transport_lost(&self) -> bool {
        self.transport_lost
    }

    /// Where the piece on `square` may go, offered only while it's our move
    pub fn move_hints(&self, square: Square) -> Vec<Square> {
        if self.transport_lost || self.phase != MatchPhase::Playing || !self.turn.local_is_to_move
        {
            return Vec::new();
        }
        self.rules.legal_targets(&self.position, square)
    }

    // ==================== Event handling ====================

    /// Route one event to its handler.
    ///
    /// Rejected events are logged here and returned to the caller; the machine is unchanged.
    pub fn dispatch(&mut self, event: MatchEvent) -> Result<Vec<MatchEffect>, MatchError> {
        let name = event.name();
        let result = match event {
            MatchEvent::SelectLocalBot => self.select_local_bot_mode(),
            MatchEvent::SelectOnline { identity } => self.select_online_mode(identity),
            MatchEvent::ConfirmDifficulty { level } => self.confirm_difficulty(&level),
            MatchEvent::MatchAssigned(assignment) => self.on_match_assigned(assignment),
            MatchEvent::LocalMove(mv) => self.submit_local_move(mv),
            MatchEvent::RemoteMove(mv) => self.on_remote_move_received(mv),
            MatchEvent::BotMove(reply) => self.on_bot_move_received(reply),
            MatchEvent::RetryBot => self.retry_bot_move(),
            MatchEvent::Tick => Ok(self.on_tick()),
            MatchEvent::Disconnected => Ok(self.on_disconnect()),
            MatchEvent::NewMatch => Ok(self.new_match()),
        };
        match &result {
            Err(MatchError::IllegalMove(mv)) => debug!(%mv, "illegal move rejected"),
            Err(error) => warn!(event = name, %error, phase = ?self.phase, "event discarded"),
            Ok(_) => {}
        }
        result
    }

    pub fn select_local_bot_mode(&mut self) -> Result<Vec<MatchEffect>, MatchError> {
        self.ensure_connected()?;
        self.ensure_choosing_mode("select bot mode")?;

        self.mode = MatchMode::LocalBot;
        self.local_color = Color::White;
        self.sync_turn();

        Ok(vec![
            self.enter(MatchPhase::AwaitingDifficulty),
            MatchEffect::StatusText("Select bot difficulty".to_string()),
        ])
    }

    /// Choose online play.
    ///
    /// `None` means the player backed out of the identity prompt: nothing is sent and the
    /// machine goes back to mode selection.
    pub fn select_online_mode(
        &mut self,
        identity: Option<PlayerIdentity>,
    ) -> Result<Vec<MatchEffect>, MatchError> {
        self.ensure_connected()?;
        self.ensure_choosing_mode("select online mode")?;

        let Some(identity) = identity else {
            self.mode = MatchMode::Unselected;
            return Ok(vec![self.enter(MatchPhase::ModeSelected)]);
        };

        self.matchmaking
            .join(identity.clone())
            .map_err(|_| MatchError::JoinAlreadyPending)?;
        self.mode = MatchMode::OnlineMatch;

        Ok(vec![
            MatchEffect::Send(Outbound::JoinRequest {
                player_id: self.player_id(),
                identity,
            }),
            self.enter(MatchPhase::AwaitingMatch),
            MatchEffect::StatusText("Waiting for match...".to_string()),
        ])
    }

    pub fn confirm_difficulty(&mut self, level: &str) -> Result<Vec<MatchEffect>, MatchError> {
        self.ensure_connected()?;
        if self.phase != MatchPhase::AwaitingDifficulty {
            return Err(self.invalid_phase("confirm difficulty"));
        }
        let level = level.trim();
        if level.is_empty() {
            return Err(MatchError::InvalidDifficulty);
        }

        info!(difficulty = level, "bot match started");
        self.difficulty = Some(level.to_string());
        self.sync_turn();
        debug_assert!(self.turn.local_is_to_move);

        let mut effects = vec![
            self.enter(MatchPhase::Playing),
            MatchEffect::MatchStarted {
                mode: self.mode,
                local_color: self.local_color,
                matchup: None,
                difficulty: self.difficulty.clone(),
            },
        ];
        effects.extend(self.board_effects(None));
        Ok(effects)
    }

    pub fn on_match_assigned(
        &mut self,
        assignment: MatchAssignment,
    ) -> Result<Vec<MatchEffect>, MatchError> {
        self.ensure_connected()?;
        if self.phase != MatchPhase::AwaitingMatch {
            return Err(MatchError::StaleReply("match"));
        }
        let local_color = self
            .matchmaking
            .on_match_found(assignment)
            .map_err(|rejection| match rejection {
                MatchmakingRejection::AlreadyJoined => MatchError::JoinAlreadyPending,
                MatchmakingRejection::Unexpected => MatchError::StaleReply("match"),
            })?
            .local_color;

        self.local_color = local_color;
        self.sync_turn();

        let mut effects = vec![
            self.enter(MatchPhase::Playing),
            MatchEffect::MatchStarted {
                mode: self.mode,
                local_color,
                matchup: self.matchup_line(),
                difficulty: None,
            },
        ];
        effects.extend(self.board_effects(None));
        Ok(effects)
    }

    /// Play a move for the local player.
    ///
    /// An illegal move changes nothing and comes back as [`MatchError::IllegalMove`] so
    /// the board widget can snap the piece back.
    pub fn submit_local_move(&mut self, mv: ChessMove) -> Result<Vec<MatchEffect>, MatchError> {
        self.ensure_connected()?;
        if self.phase != MatchPhase::Playing {
            return Err(self.invalid_phase("local move"));
        }
        if !self.turn.local_is_to_move {
            return Err(MatchError::OutOfTurnEvent {
                event: "local move",
            });
        }
        let applied = self
            .rules
            .resolve_move(&self.position, &mv)
            .ok_or(MatchError::IllegalMove(mv))?;
        let position = self
            .rules
            .apply(&self.position, &applied)
            .map_err(|_| MatchError::IllegalMove(mv))?;

        let mut effects = self.commit(position, applied);
        debug_assert!(!self.turn.local_is_to_move);
        if self.phase == MatchPhase::GameOver {
            return Ok(effects);
        }

        match self.mode {
            MatchMode::LocalBot => effects.extend(self.issue_bot_request()?),
            MatchMode::OnlineMatch => effects.push(MatchEffect::Send(Outbound::LocalMove {
                player_id: self.player_id(),
                mv: applied,
            })),
            MatchMode::Unselected => {}
        }
        Ok(effects)
    }

    pub fn on_remote_move_received(
        &mut self,
        mv: ChessMove,
    ) -> Result<Vec<MatchEffect>, MatchError> {
        self.ensure_connected()?;
        if self.phase != MatchPhase::Playing || self.mode != MatchMode::OnlineMatch {
            return Err(self.invalid_phase("remote move"));
        }
        if self.turn.local_is_to_move {
            return Err(MatchError::OutOfTurnEvent {
                event: "remote move",
            });
        }
        let received = self
            .remote
            .on_receive(&self.rules, &self.position, &mv)
            .ok_or(MatchError::ProtocolViolation(mv))?;

        let effects = self.commit(received.position, received.applied);
        debug_assert!(self.phase == MatchPhase::GameOver || self.turn.local_is_to_move);
        Ok(effects)
    }

    /// Accept the bot's answer to the pending request.
    ///
    /// Anything that doesn't answer the live request (a duplicate, a reply to an abandoned
    /// match) is a [`MatchError::StaleReply`]. A move that is illegal here is a
    /// [`MatchError::ProtocolViolation`] and leaves the request pending, so a correct
    /// answer to it is still accepted.
    pub fn on_bot_move_received(&mut self, reply: BotReply) -> Result<Vec<MatchEffect>, MatchError> {
        self.ensure_connected()?;
        if self.phase != MatchPhase::Playing || self.mode != MatchMode::LocalBot {
            return Err(MatchError::StaleReply("bot"));
        }
        self.bot
            .check_reply(reply.request_id)
            .map_err(|_| MatchError::StaleReply("bot"))?;

        let next = match reply.mv {
            Some(mv) => {
                let applied = self
                    .rules
                    .resolve_move(&self.position, &mv)
                    .ok_or(MatchError::ProtocolViolation(mv))?;
                let position = self
                    .rules
                    .apply(&self.position, &applied)
                    .map_err(|_| MatchError::ProtocolViolation(mv))?;
                Some((position, applied))
            }
            None => None,
        };

        let accepted = self
            .bot
            .on_reply(reply.request_id)
            .map_err(|_| MatchError::StaleReply("bot"))?;
        let mut effects = vec![MatchEffect::CountdownCleared];

        let Some((position, applied)) = next else {
            info!(status = ?reply.status, "bot answered without a move");
            effects.push(MatchEffect::BotNoMove {
                reason: reply.status,
            });
            effects.push(MatchEffect::StatusText(
                "Bot did not move; retry to ask again".to_string(),
            ));
            return Ok(effects);
        };

        effects.push(MatchEffect::BotMoved {
            elapsed_seconds: accepted.elapsed.as_secs_f64(),
            budget_seconds: accepted.budget_seconds,
            thinking_time_seconds: reply
                .thinking_time_seconds
                .unwrap_or(DEFAULT_THINKING_TIME_SECONDS),
        });
        effects.extend(self.commit(position, applied));
        debug_assert!(self.phase == MatchPhase::GameOver || self.turn.local_is_to_move);
        Ok(effects)
    }

    /// Ask the bot again after it answered without a move
    pub fn retry_bot_move(&mut self) -> Result<Vec<MatchEffect>, MatchError> {
        self.ensure_connected()?;
        if self.phase != MatchPhase::Playing || self.mode != MatchMode::LocalBot {
            return Err(self.invalid_phase("bot retry"));
        }
        if self.turn.local_is_to_move {
            return Err(MatchError::OutOfTurnEvent { event: "bot retry" });
        }
        self.issue_bot_request()
    }

    /// Advance the bot countdown by one second
    pub fn on_tick(&mut self) -> Vec<MatchEffect> {
        self.bot
            .tick()
            .map(MatchEffect::Countdown)
            .into_iter()
            .collect()
    }

    /// Freeze the match; nothing else will arrive on this connection
    pub fn on_disconnect(&mut self) -> Vec<MatchEffect> {
        if self.transport_lost {
            return Vec::new();
        }
        warn!(phase = ?self.phase, "transport lost; match frozen");
        self.transport_lost = true;
        let mut effects = Vec::new();
        if self.bot.abandon() {
            effects.push(MatchEffect::CountdownCleared);
        }
        effects.push(MatchEffect::StatusText(
            "Disconnected from server".to_string(),
        ));
        effects
    }

    /// Abandon whatever is going on and go back to `Idle`
    pub fn new_match(&mut self) -> Vec<MatchEffect> {
        let mut effects = Vec::new();
        if self.bot.abandon() {
            effects.push(MatchEffect::CountdownCleared);
        }
        self.position = self.rules.initial_position();
        self.mode = MatchMode::Unselected;
        self.local_color = Color::White;
        self.difficulty = None;
        self.matchmaking.reset();
        self.remote.reset();
        self.history.clear();
        self.position_keys = vec![self.rules.position_key(&self.position)];
        self.sync_turn();

        info!("new match");
        effects.push(self.enter(MatchPhase::Idle));
        effects.push(MatchEffect::BoardUpdated {
            fen: self.fen(),
            last_move: None,
        });
        effects
    }

    // ==================== Internals ====================

    fn ensure_connected(&self) -> Result<(), MatchError> {
        if self.transport_lost {
            Err(MatchError::TransportLost)
        } else {
            Ok(())
        }
    }

    fn ensure_choosing_mode(&self, event: &'static str) -> Result<(), MatchError> {
        match self.phase {
            MatchPhase::Idle | MatchPhase::ModeSelected => Ok(()),
            _ => Err(self.invalid_phase(event)),
        }
    }

    fn invalid_phase(&self, event: &'static str) -> MatchError {
        MatchError::InvalidPhase {
            event,
            phase: self.phase,
        }
    }

    fn enter(&mut self, phase: MatchPhase) -> MatchEffect {
        debug!(from = ?self.phase, to = ?phase, "phase change");
        self.phase = phase;
        MatchEffect::PhaseChanged(phase)
    }

    /// The only place the turn flag is written
    fn sync_turn(&mut self) {
        self.turn = TurnState::new(self.rules.side_to_move(&self.position), self.local_color);
        debug_assert!(self.turn.is_consistent(self.local_color));
    }

    /// Install a new position after a move and report what changed
    fn commit(&mut self, position: R::Position, applied: ChessMove) -> Vec<MatchEffect> {
        self.position = position;
        self.history.push(applied);
        self.position_keys.push(self.rules.position_key(&self.position));
        self.sync_turn();

        let mut effects = self.board_effects(Some(applied));
        let status = self.status();
        if status.is_over() {
            info!(?status, moves = self.history.len(), "game over");
            effects.push(self.enter(MatchPhase::GameOver));
        }
        effects
    }

    fn board_effects(&self, last_move: Option<ChessMove>) -> Vec<MatchEffect> {
        vec![
            MatchEffect::BoardUpdated {
                fen: self.fen(),
                last_move,
            },
            MatchEffect::StatusText(self.status_text()),
        ]
    }

    fn issue_bot_request(&mut self) -> Result<Vec<MatchEffect>, MatchError> {
        let difficulty = self.difficulty.clone().unwrap_or_default();
        let issued = self
            .bot
            .request(&difficulty)
            .map_err(|rejection| match rejection {
                BotRequestRejection::Outstanding => MatchError::BotRequestOutstanding,
                BotRequestRejection::Stale => MatchError::StaleReply("bot"),
            })?;
        Ok(vec![
            MatchEffect::Send(Outbound::BotMoveRequest {
                player_id: self.player_id(),
                request_id: issued.request_id,
                fen: self.fen(),
                difficulty,
            }),
            MatchEffect::Countdown(issued.countdown),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Promotion;

    fn mv(s: &str) -> ChessMove {
        s.parse().unwrap()
    }

    fn bot_game(level: &str) -> MatchStateMachine {
        let mut game = MatchStateMachine::standard(PlayerId(1));
        game.select_local_bot_mode().unwrap();
        game.confirm_difficulty(level).unwrap();
        game
    }

    fn online_game(color: Color) -> MatchStateMachine {
        let mut game = MatchStateMachine::standard(PlayerId(1));
        game.select_online_mode(Some(PlayerIdentity::new("A", 1600)))
            .unwrap();
        game.on_match_assigned(MatchAssignment {
            local_color: color,
            opponent_name: "B".to_string(),
            opponent_skill: 1500,
        })
        .unwrap();
        game
    }

    fn sent(effects: &[MatchEffect]) -> Vec<&Outbound> {
        effects
            .iter()
            .filter_map(|e| match e {
                MatchEffect::Send(out) => Some(out),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_new_machine_is_idle() {
        let game = MatchStateMachine::standard(PlayerId(1));
        assert_eq!(game.phase(), MatchPhase::Idle);
        assert_eq!(game.mode(), MatchMode::Unselected);
        assert!(game.pending_bot_request().is_none());
        assert!(game.turn().is_consistent(game.local_color()));
    }

    #[test]
    fn test_bot_mode_setup() {
        let mut game = MatchStateMachine::standard(PlayerId(1));
        let effects = game.select_local_bot_mode().unwrap();
        assert!(effects.contains(&MatchEffect::PhaseChanged(MatchPhase::AwaitingDifficulty)));
        assert_eq!(game.mode(), MatchMode::LocalBot);
        assert_eq!(game.local_color(), Color::White);

        assert_eq!(
            game.confirm_difficulty("  "),
            Err(MatchError::InvalidDifficulty)
        );
        game.confirm_difficulty("hard").unwrap();
        assert_eq!(game.phase(), MatchPhase::Playing);
        assert!(game.turn().local_is_to_move);
        assert_eq!(game.difficulty(), Some("hard"));
    }

    #[test]
    fn test_mode_selection_only_once() {
        let mut game = bot_game("easy");
        assert!(matches!(
            game.select_local_bot_mode(),
            Err(MatchError::InvalidPhase { .. })
        ));
        assert!(matches!(
            game.select_online_mode(Some(PlayerIdentity::new("A", 1600))),
            Err(MatchError::InvalidPhase { .. })
        ));
    }

    #[test]
    fn test_aborted_identity_sends_nothing() {
        let mut game = MatchStateMachine::standard(PlayerId(1));
        let effects = game.select_online_mode(None).unwrap();
        assert!(sent(&effects).is_empty());
        assert_eq!(game.phase(), MatchPhase::ModeSelected);
        assert_eq!(game.mode(), MatchMode::Unselected);

        // Mode selection is still open
        game.select_local_bot_mode().unwrap();
        assert_eq!(game.phase(), MatchPhase::AwaitingDifficulty);
    }

    #[test]
    fn test_join_request_sent() {
        let mut game = MatchStateMachine::standard(PlayerId(9));
        let effects = game
            .select_online_mode(Some(PlayerIdentity::new("A", 1600)))
            .unwrap();
        assert_eq!(
            sent(&effects),
            vec![&Outbound::JoinRequest {
                player_id: PlayerId(9),
                identity: PlayerIdentity::new("A", 1600),
            }]
        );
        assert_eq!(game.phase(), MatchPhase::AwaitingMatch);
    }

    #[test]
    fn test_local_move_in_bot_mode_requests_bot() {
        let mut game = bot_game("expert");
        let effects = game.submit_local_move(mv("e2e4")).unwrap();
        assert!(!game.turn().local_is_to_move);

        let pending = game.pending_bot_request().unwrap();
        assert_eq!(pending.budget_seconds, 20);
        match sent(&effects).as_slice() {
            [Outbound::BotMoveRequest {
                request_id,
                difficulty,
                fen,
                ..
            }] => {
                assert_eq!(*request_id, pending.request_id);
                assert_eq!(difficulty, "expert");
                assert!(fen.contains(" b "));
            }
            other => panic!("unexpected outbound: {other:?}"),
        }
    }

    #[test]
    fn test_local_move_online_is_sent() {
        let mut game = online_game(Color::White);
        let effects = game.submit_local_move(mv("g1f3")).unwrap();
        assert_eq!(
            sent(&effects),
            vec![&Outbound::LocalMove {
                player_id: PlayerId(1),
                mv: mv("g1f3"),
            }]
        );
        assert!(game.pending_bot_request().is_none());
    }

    #[test]
    fn test_illegal_local_move_changes_nothing() {
        let mut game = bot_game("easy");
        let before = game.fen();
        assert_eq!(
            game.submit_local_move(mv("e2e5")),
            Err(MatchError::IllegalMove(mv("e2e5")))
        );
        assert_eq!(game.fen(), before);
        assert!(game.turn().local_is_to_move);
        assert!(game.pending_bot_request().is_none());
    }

    #[test]
    fn test_local_move_out_of_turn() {
        let mut game = online_game(Color::Black);
        assert_eq!(
            game.submit_local_move(mv("e7e5")),
            Err(MatchError::OutOfTurnEvent {
                event: "local move"
            })
        );
    }

    #[test]
    fn test_local_move_before_playing() {
        let mut game = MatchStateMachine::standard(PlayerId(1));
        assert_eq!(
            game.submit_local_move(mv("e2e4")),
            Err(MatchError::InvalidPhase {
                event: "local move",
                phase: MatchPhase::Idle
            })
        );
    }

    #[test]
    fn test_bot_reply_with_wrong_id_is_stale() {
        let mut game = bot_game("easy");
        game.submit_local_move(mv("e2e4")).unwrap();
        let reply = BotReply::with_move(mv("e7e5")).for_request(crate::bot::RequestId::new());
        assert_eq!(
            game.on_bot_move_received(reply),
            Err(MatchError::StaleReply("bot"))
        );
        assert!(game.pending_bot_request().is_some());
        assert!(!game.turn().local_is_to_move);
    }

    #[test]
    fn test_bot_reply_without_move_then_retry() {
        let mut game = bot_game("easy");
        game.submit_local_move(mv("e2e4")).unwrap();

        let effects = game
            .on_bot_move_received(BotReply {
                request_id: None,
                mv: None,
                thinking_time_seconds: None,
                status: Some("Invalid move".to_string()),
            })
            .unwrap();
        assert!(effects.contains(&MatchEffect::BotNoMove {
            reason: Some("Invalid move".to_string())
        }));
        assert!(game.pending_bot_request().is_none());
        assert!(!game.turn().local_is_to_move);

        let effects = game.retry_bot_move().unwrap();
        assert_eq!(sent(&effects).len(), 1);
        assert_eq!(
            game.retry_bot_move(),
            Err(MatchError::BotRequestOutstanding)
        );
    }

    #[test]
    fn test_retry_on_local_turn_rejected() {
        let mut game = bot_game("easy");
        assert_eq!(
            game.retry_bot_move(),
            Err(MatchError::OutOfTurnEvent { event: "bot retry" })
        );
    }

    #[test]
    fn test_illegal_bot_move_is_protocol_violation() {
        let mut game = bot_game("easy");
        game.submit_local_move(mv("e2e4")).unwrap();
        let before = game.fen();
        let request_id = game.pending_bot_request().unwrap().request_id;
        assert_eq!(
            game.on_bot_move_received(BotReply::with_move(mv("e2e4"))),
            Err(MatchError::ProtocolViolation(mv("e2e4")))
        );
        assert_eq!(game.fen(), before);
        assert!(!game.turn().local_is_to_move);

        // The request is still live and a legal answer to it goes through
        let pending = game.pending_bot_request().unwrap();
        assert_eq!(pending.request_id, request_id);
        assert!(!pending.resolved);
        assert!(game
            .on_bot_move_received(BotReply::with_move(mv("e7e5")).for_request(request_id))
            .is_ok());
        assert!(game.pending_bot_request().is_none());
        assert!(game.turn().local_is_to_move);
    }

    #[test]
    fn test_bot_moved_reports_default_thinking_time() {
        let mut game = bot_game("medium");
        game.submit_local_move(mv("d2d4")).unwrap();
        let effects = game
            .on_bot_move_received(BotReply::with_move(mv("d7d5")))
            .unwrap();
        let moved = effects.iter().find_map(|e| match e {
            MatchEffect::BotMoved {
                budget_seconds,
                thinking_time_seconds,
                ..
            } => Some((*budget_seconds, *thinking_time_seconds)),
            _ => None,
        });
        assert_eq!(moved, Some((10, DEFAULT_THINKING_TIME_SECONDS)));
        assert_eq!(effects.first(), Some(&MatchEffect::CountdownCleared));
    }

    #[test]
    fn test_ticks_drive_countdown() {
        let mut game = bot_game("easy");
        assert!(game.on_tick().is_empty());

        game.submit_local_move(mv("e2e4")).unwrap();
        let first = game.on_tick();
        assert!(matches!(
            first.as_slice(),
            [MatchEffect::Countdown(c)] if c.remaining_seconds == 4 && c.percent_remaining == 80
        ));
    }

    #[test]
    fn test_new_match_abandons_pending_request() {
        let mut game = bot_game("easy");
        game.submit_local_move(mv("e2e4")).unwrap();
        let request_id = game.pending_bot_request().unwrap().request_id;

        let effects = game.new_match();
        assert_eq!(effects.first(), Some(&MatchEffect::CountdownCleared));
        assert_eq!(game.phase(), MatchPhase::Idle);
        assert!(game.pending_bot_request().is_none());
        assert!(game.history().is_empty());

        let late = BotReply::with_move(mv("e7e5")).for_request(request_id);
        assert_eq!(
            game.on_bot_move_received(late),
            Err(MatchError::StaleReply("bot"))
        );
    }

    #[test]
    fn test_stale_match_assignment() {
        let mut game = bot_game("easy");
        let result = game.on_match_assigned(MatchAssignment {
            local_color: Color::White,
            opponent_name: "B".to_string(),
            opponent_skill: 1500,
        });
        assert_eq!(result, Err(MatchError::StaleReply("match")));
        assert_eq!(game.mode(), MatchMode::LocalBot);
    }

    #[test]
    fn test_disconnect_freezes_match() {
        let mut game = bot_game("easy");
        game.submit_local_move(mv("e2e4")).unwrap();

        let effects = game.on_disconnect();
        assert!(effects.contains(&MatchEffect::CountdownCleared));
        assert!(game.is_transport_lost());
        assert!(game.on_disconnect().is_empty());

        assert_eq!(
            game.on_bot_move_received(BotReply::with_move(mv("e7e5"))),
            Err(MatchError::TransportLost)
        );
        game.new_match();
        assert_eq!(
            game.select_local_bot_mode(),
            Err(MatchError::TransportLost)
        );
    }

    #[test]
    fn test_move_hints_only_on_our_turn() {
        let sq = |s: &str| s.parse::<Square>().unwrap();
        let mut game = online_game(Color::Black);
        assert!(game.move_hints(sq("g8")).is_empty());

        game.on_remote_move_received(mv("e2e4")).unwrap();
        assert_eq!(game.move_hints(sq("g8")), vec![sq("f6"), sq("h6")]);
        // Opponent pieces have no hints
        assert!(game.move_hints(sq("g1")).is_empty());
    }

    #[test]
    fn test_promotion_defaults_to_queen_in_history() {
        let mut game = bot_game("easy");
        for (ours, theirs) in [
            ("h2h4", "g7g5"),
            ("h4g5", "h7h6"),
            ("g5h6", "g8f6"),
            ("h6h7", "f6g8"),
        ] {
            game.submit_local_move(mv(ours)).unwrap();
            game.on_bot_move_received(BotReply::with_move(mv(theirs)))
                .unwrap();
        }
        game.submit_local_move(mv("h7g8")).unwrap();
        assert_eq!(
            game.history().last().map(|m| m.promotion),
            Some(Some(Promotion::Queen))
        );
    }

    #[test]
    fn test_dispatch_routes_events() {
        let mut game = MatchStateMachine::standard(PlayerId(1));
        game.dispatch(MatchEvent::SelectLocalBot).unwrap();
        game.dispatch(MatchEvent::ConfirmDifficulty {
            level: "easy".to_string(),
        })
        .unwrap();
        game.dispatch(MatchEvent::LocalMove(mv("e2e4"))).unwrap();
        assert_eq!(
            game.dispatch(MatchEvent::RemoteMove(mv("e7e5"))),
            Err(MatchError::InvalidPhase {
                event: "remote move",
                phase: MatchPhase::Playing
            })
        );
        game.dispatch(MatchEvent::BotMove(BotReply::with_move(mv("e7e5"))))
            .unwrap();
        assert_eq!(game.history().len(), 2);
    }
}

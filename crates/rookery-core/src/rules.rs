//! Boundary to the chess rules engine.
//!
//! The match logic never looks at pieces. Everything it needs to know about a position
//! goes through [`RulesAdapter`], and every answer is computed against the position passed
//! in, so nothing about legality outlives the position it was asked about.
//!
//! [`ShakmatyRules`] binds the trait to the `shakmaty` crate.

use crate::types::{ChessMove, Color, Promotion, Square};
use serde::{Deserialize, Serialize};
use shakmaty::fen::Fen;
use shakmaty::uci::Uci;
use shakmaty::zobrist::{Zobrist64, ZobristHash};
use shakmaty::{CastlingMode, Chess, EnPassantMode, Position, Role};
use thiserror::Error;

/// Game status derived from a position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameStatus {
    InProgress,
    Check,
    Checkmate,
    Draw,
}

impl GameStatus {
    /// Checkmate and draw end the game
    pub const fn is_over(self) -> bool {
        matches!(self, GameStatus::Checkmate | GameStatus::Draw)
    }

    /// Status line for the presentation layer.
    ///
    /// `side_to_move` is the side that would move next; after checkmate that is the loser.
    pub fn describe(self, side_to_move: Color) -> String {
        match self {
            GameStatus::Checkmate => format!(
                "Game over. {} wins by checkmate!",
                side_to_move.opposite()
            ),
            GameStatus::Draw => "Game over. Draw!".to_string(),
            GameStatus::Check => format!("{side_to_move} to move (check)"),
            GameStatus::InProgress => format!("{side_to_move} to move"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RulesError {
    #[error("illegal move {0}")]
    IllegalMove(ChessMove),

    #[error("invalid position '{0}'")]
    InvalidPosition(String),
}

/// Call boundary to a chess rules engine.
pub trait RulesAdapter {
    /// Engine-owned board state
    type Position: Clone;

    /// Standard starting position
    fn initial_position(&self) -> Self::Position;

    /// Load a position from FEN
    fn from_fen(&self, fen: &str) -> Result<Self::Position, RulesError>;

    /// Encode a position as FEN
    fn fen(&self, position: &Self::Position) -> String;

    /// The legal form of `mv` in `position`, or `None` if it is illegal.
    ///
    /// A pawn reaching the last rank without a promotion piece promotes to a queen, so the
    /// returned move may differ from the input in its promotion field.
    fn resolve_move(&self, position: &Self::Position, mv: &ChessMove) -> Option<ChessMove>;

    /// Play a move, returning the successor position
    fn apply(&self, position: &Self::Position, mv: &ChessMove)
        -> Result<Self::Position, RulesError>;

    fn status(&self, position: &Self::Position) -> GameStatus;

    fn side_to_move(&self, position: &Self::Position) -> Color;

    /// Key that is equal for positions that count as the same for repetition: same
    /// pieces, side to move, castling rights and en passant square
    fn position_key(&self, position: &Self::Position) -> u64;

    /// Destination squares of every legal move starting on `from`
    fn legal_targets(&self, position: &Self::Position, from: Square) -> Vec<Square>;

    fn is_legal(
        &self,
        position: &Self::Position,
        from: Square,
        to: Square,
        promotion: Option<Promotion>,
    ) -> bool {
        self.resolve_move(position, &ChessMove::new(from, to, promotion))
            .is_some()
    }
}

/// Rules adapter backed by `shakmaty`
#[derive(Debug, Clone, Copy, Default)]
pub struct ShakmatyRules;

impl ShakmatyRules {
    pub fn new() -> Self {
        Self
    }

    fn to_engine_move(position: &Chess, mv: &ChessMove) -> Option<shakmaty::Move> {
        let uci = Uci::Normal {
            from: to_engine_square(mv.from)?,
            to: to_engine_square(mv.to)?,
            promotion: match mv.promotion {
                Some(p) => Some(Role::from_char(p.as_char())?),
                None => None,
            },
        };
        uci.to_move(position).ok()
    }
}

fn to_engine_square(square: Square) -> Option<shakmaty::Square> {
    square.to_string().parse().ok()
}

fn from_engine_square(square: shakmaty::Square) -> Option<Square> {
    square.to_string().parse().ok()
}

fn from_engine_color(color: shakmaty::Color) -> Color {
    match color {
        shakmaty::Color::White => Color::White,
        shakmaty::Color::Black => Color::Black,
    }
}

impl RulesAdapter for ShakmatyRules {
    type Position = Chess;

    fn initial_position(&self) -> Chess {
        Chess::default()
    }

    fn from_fen(&self, fen: &str) -> Result<Chess, RulesError> {
        let invalid = || RulesError::InvalidPosition(fen.to_string());
        Fen::from_ascii(fen.as_bytes())
            .map_err(|_| invalid())?
            .into_position(CastlingMode::Standard)
            .map_err(|_| invalid())
    }

    fn fen(&self, position: &Chess) -> String {
        Fen::from_position(position.clone(), EnPassantMode::Legal).to_string()
    }

    fn resolve_move(&self, position: &Chess, mv: &ChessMove) -> Option<ChessMove> {
        if Self::to_engine_move(position, mv).is_some() {
            return Some(*mv);
        }
        if mv.promotion.is_none() && mv.to.is_back_rank() {
            let queened = mv.with_promotion(Promotion::Queen);
            if Self::to_engine_move(position, &queened).is_some() {
                return Some(queened);
            }
        }
        None
    }

    fn apply(&self, position: &Chess, mv: &ChessMove) -> Result<Chess, RulesError> {
        let resolved = self
            .resolve_move(position, mv)
            .ok_or(RulesError::IllegalMove(*mv))?;
        let engine_move =
            Self::to_engine_move(position, &resolved).ok_or(RulesError::IllegalMove(*mv))?;
        let mut next = position.clone();
        next.play_unchecked(&engine_move);
        Ok(next)
    }

    fn status(&self, position: &Chess) -> GameStatus {
        if position.is_checkmate() {
            GameStatus::Checkmate
        } else if position.is_stalemate()
            || position.is_insufficient_material()
            || position.halfmoves() >= 100
        {
            GameStatus::Draw
        } else if position.is_check() {
            GameStatus::Check
        } else {
            GameStatus::InProgress
        }
    }

    fn side_to_move(&self, position: &Chess) -> Color {
        from_engine_color(position.turn())
    }

    fn position_key(&self, position: &Chess) -> u64 {
        position.zobrist_hash::<Zobrist64>(EnPassantMode::Legal).0
    }

    fn legal_targets(&self, position: &Chess, from: Square) -> Vec<Square> {
        let Some(origin) = to_engine_square(from) else {
            return Vec::new();
        };
        let mut targets: Vec<Square> = position
            .legal_moves()
            .iter()
            .filter(|m| m.from() == Some(origin))
            .filter_map(|m| match m.to_uci(CastlingMode::Standard) {
                Uci::Normal { to, .. } => from_engine_square(to),
                _ => None,
            })
            .collect();
        targets.sort();
        targets.dedup();
        targets
    }
}

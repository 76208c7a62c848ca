//! Moves arriving from the remote peer.

use crate::rules::{GameStatus, RulesAdapter};
use crate::types::ChessMove;
use tracing::{debug, warn};

/// Result of applying a remote move
#[derive(Debug, Clone)]
pub struct RemoteApplied<P> {
    pub position: P,
    pub applied: ChessMove,
    pub status: GameStatus,
}

/// Applies opponent moves against the local position.
///
/// The peer is trusted for nothing: every move is checked against the local rules state.
/// A move the local rules reject means the two sides disagree about the position, and
/// there is no way to reconcile that from here.
#[derive(Debug, Clone, Default)]
pub struct RemoteMoveSync {
    received: u32,
    last_applied: Option<ChessMove>,
}

impl RemoteMoveSync {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of remote moves applied this match
    pub fn received(&self) -> u32 {
        self.received
    }

    pub fn last_applied(&self) -> Option<ChessMove> {
        self.last_applied
    }

    /// Validate and apply `mv`.
    ///
    /// Returns `None` if the move is illegal in `position`; the position is untouched.
    pub fn on_receive<R: RulesAdapter>(
        &mut self,
        rules: &R,
        position: &R::Position,
        mv: &ChessMove,
    ) -> Option<RemoteApplied<R::Position>> {
        let Some(applied) = rules.resolve_move(position, mv) else {
            warn!(%mv, fen = %rules.fen(position), "remote move rejected by local rules");
            return None;
        };
        let position = rules.apply(position, &applied).ok()?;
        let status = rules.status(&position);
        self.received += 1;
        self.last_applied = Some(applied);
        debug!(%applied, ?status, "remote move applied");
        Some(RemoteApplied {
            position,
            applied,
            status,
        })
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::ShakmatyRules;

    #[test]
    fn test_legal_remote_move() {
        let rules = ShakmatyRules::new();
        let start = rules.initial_position();
        let mut sync = RemoteMoveSync::new();

        let applied = sync
            .on_receive(&rules, &start, &"d2d4".parse().unwrap())
            .unwrap();
        assert_eq!(applied.status, GameStatus::InProgress);
        assert_eq!(sync.received(), 1);
        assert_eq!(sync.last_applied(), Some("d2d4".parse().unwrap()));
    }

    #[test]
    fn test_illegal_remote_move() {
        let rules = ShakmatyRules::new();
        let start = rules.initial_position();
        let mut sync = RemoteMoveSync::new();

        assert!(sync
            .on_receive(&rules, &start, &"d2d5".parse().unwrap())
            .is_none());
        assert_eq!(sync.received(), 0);
        assert_eq!(sync.last_applied(), None);
    }
}

//! Online pairing.
//!
//! The client sends its identity once and then waits for the server to pair it. There is
//! no cancel and no re-queue: one join, one match.

use crate::types::Color;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

/// Skill rating used when the player doesn't give a usable one
pub const DEFAULT_SKILL: u32 = 1600;

/// Numeric player id carried in every outbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u32);

impl PlayerId {
    /// A random id in `0..10000`
    pub fn random() -> Self {
        Self(rand::thread_rng().gen_range(0..10_000))
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Name and skill rating sent with a join request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerIdentity {
    pub name: String,
    pub skill: u32,
}

impl PlayerIdentity {
    pub fn new(name: impl Into<String>, skill: u32) -> Self {
        Self {
            name: name.into(),
            skill,
        }
    }

    /// Build an identity from raw prompt answers.
    ///
    /// `None` for either answer means the player backed out of the prompt. A blank name
    /// becomes `Player<id>`. The skill is read from its leading digits (`"1800 elo"` is
    /// 1800); no digits, or zero, gives [`DEFAULT_SKILL`].
    pub fn from_prompt(
        player_id: PlayerId,
        name: Option<&str>,
        skill: Option<&str>,
    ) -> Option<Self> {
        let name = name?.trim();
        let skill = skill?.trim();
        let name = if name.is_empty() {
            format!("Player{player_id}")
        } else {
            name.to_string()
        };
        Some(Self {
            name,
            skill: parse_skill(skill),
        })
    }
}

fn parse_skill(input: &str) -> u32 {
    let digits = input.strip_prefix('+').unwrap_or(input);
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end]
        .parse::<u32>()
        .ok()
        .filter(|skill| *skill != 0)
        .unwrap_or(DEFAULT_SKILL)
}

/// What the server told us about our match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchAssignment {
    pub local_color: Color,
    pub opponent_name: String,
    pub opponent_skill: u32,
}

impl MatchAssignment {
    /// "White (skill) vs Black (skill)" with our own identity in our seat
    pub fn matchup_line(&self, local: &PlayerIdentity) -> String {
        let (white, black) = match self.local_color {
            Color::White => (
                (local.name.as_str(), local.skill),
                (self.opponent_name.as_str(), self.opponent_skill),
            ),
            Color::Black => (
                (self.opponent_name.as_str(), self.opponent_skill),
                (local.name.as_str(), local.skill),
            ),
        };
        format!("{} ({}) vs {} ({})", white.0, white.1, black.0, black.1)
    }
}

/// Where the client is in the pairing handshake
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchmakingState {
    Idle,
    Waiting(PlayerIdentity),
    Matched {
        identity: PlayerIdentity,
        assignment: MatchAssignment,
    },
}

/// Why a pairing step was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchmakingRejection {
    /// Already waiting or already matched
    AlreadyJoined,
    /// A match-found arrived with no join outstanding
    Unexpected,
}

#[derive(Debug, Clone)]
pub struct MatchmakingClient {
    player_id: PlayerId,
    state: MatchmakingState,
}

impl MatchmakingClient {
    pub fn new(player_id: PlayerId) -> Self {
        Self {
            player_id,
            state: MatchmakingState::Idle,
        }
    }

    pub fn player_id(&self) -> PlayerId {
        self.player_id
    }

    pub fn state(&self) -> &MatchmakingState {
        &self.state
    }

    /// Our identity once a join has been sent
    pub fn identity(&self) -> Option<&PlayerIdentity> {
        match &self.state {
            MatchmakingState::Idle => None,
            MatchmakingState::Waiting(identity) | MatchmakingState::Matched { identity, .. } => {
                Some(identity)
            }
        }
    }

    pub fn assignment(&self) -> Option<&MatchAssignment> {
        match &self.state {
            MatchmakingState::Matched { assignment, .. } => Some(assignment),
            _ => None,
        }
    }

    /// Record a join. The caller sends the request.
    pub fn join(&mut self, identity: PlayerIdentity) -> Result<(), MatchmakingRejection> {
        if self.state != MatchmakingState::Idle {
            return Err(MatchmakingRejection::AlreadyJoined);
        }
        info!(
            player_id = %self.player_id,
            name = %identity.name,
            skill = identity.skill,
            "joining matchmaking"
        );
        self.state = MatchmakingState::Waiting(identity);
        Ok(())
    }

    /// Accept the one match-found notification for our join
    pub fn on_match_found(
        &mut self,
        assignment: MatchAssignment,
    ) -> Result<&MatchAssignment, MatchmakingRejection> {
        let identity = match &self.state {
            MatchmakingState::Waiting(identity) => identity.clone(),
            _ => return Err(MatchmakingRejection::Unexpected),
        };
        info!(
            color = %assignment.local_color,
            opponent = %assignment.opponent_name,
            opponent_skill = assignment.opponent_skill,
            "match found"
        );
        self.state = MatchmakingState::Matched {
            identity,
            assignment,
        };
        self.assignment().ok_or(MatchmakingRejection::Unexpected)
    }

    /// Forget the current join or match
    pub fn reset(&mut self) {
        self.state = MatchmakingState::Idle;
    }
}

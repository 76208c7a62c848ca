//! Bot move requests.
//!
//! The bot itself runs on the far side of the connection. This module only tracks the
//! request that is in flight:
//! - `DifficultyTable`: difficulty label to thinking-time budget
//! - `BotRequestCoordinator`: issues one request at a time, drives its countdown, and
//!   accepts exactly one reply for it
//!
//! The countdown is advisory. Nothing here cancels a request when it runs out; a request
//! stays pending until its reply arrives or the match it belongs to is abandoned.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::debug;
use uuid::Uuid;

/// Budget used for any label the table doesn't know
pub const DEFAULT_BUDGET_SECONDS: u32 = 10;

/// Identifies one bot request on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Difficulty label to time budget, in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DifficultyTable {
    levels: BTreeMap<String, u32>,
    default_seconds: u32,
}

impl Default for DifficultyTable {
    fn default() -> Self {
        Self::empty()
            .with_level("easy", 5)
            .with_level("medium", 10)
            .with_level("hard", 15)
            .with_level("expert", 20)
    }
}

impl DifficultyTable {
    /// A table that knows no labels
    pub fn empty() -> Self {
        Self {
            levels: BTreeMap::new(),
            default_seconds: DEFAULT_BUDGET_SECONDS,
        }
    }

    /// Add or replace a level
    pub fn with_level(mut self, label: impl Into<String>, seconds: u32) -> Self {
        self.levels.insert(label.into(), seconds);
        self
    }

    pub fn with_default(mut self, seconds: u32) -> Self {
        self.default_seconds = seconds;
        self
    }

    /// Budget for a label; unknown labels get the default
    pub fn budget_for(&self, label: &str) -> u32 {
        self.levels
            .get(label)
            .copied()
            .unwrap_or(self.default_seconds)
    }

    /// Known labels in sorted order
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.levels.keys().map(String::as_str)
    }
}

/// An outstanding bot move request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingBotRequest {
    pub request_id: RequestId,
    pub issued_at: Instant,
    pub budget_seconds: u32,
    pub resolved: bool,
    remaining_seconds: u32,
}

impl PendingBotRequest {
    fn new(budget_seconds: u32) -> Self {
        Self {
            request_id: RequestId::new(),
            issued_at: Instant::now(),
            budget_seconds,
            resolved: false,
            remaining_seconds: budget_seconds,
        }
    }

    pub fn remaining_seconds(&self) -> u32 {
        self.remaining_seconds
    }
}

/// Countdown reading for the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Countdown {
    pub remaining_seconds: u32,
    pub percent_remaining: u8,
}

impl Countdown {
    fn new(remaining_seconds: u32, budget_seconds: u32) -> Self {
        let percent_remaining = if budget_seconds == 0 {
            0
        } else {
            (remaining_seconds * 100 / budget_seconds).min(100) as u8
        };
        Self {
            remaining_seconds,
            percent_remaining,
        }
    }
}

/// A request that was just issued
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedRequest {
    pub request_id: RequestId,
    pub budget_seconds: u32,
    pub countdown: Countdown,
}

/// A reply that was accepted for the live request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AcceptedReply {
    pub request_id: RequestId,
    pub budget_seconds: u32,
    pub elapsed: Duration,
}

/// Why a request could not be issued or a reply was turned away
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotRequestRejection {
    /// A request is already pending
    Outstanding,
    /// The reply doesn't belong to the live request
    Stale,
}

/// Tracks the single in-flight bot request.
#[derive(Debug, Clone, Default)]
pub struct BotRequestCoordinator {
    table: DifficultyTable,
    pending: Option<PendingBotRequest>,
}

impl BotRequestCoordinator {
    pub fn new(table: DifficultyTable) -> Self {
        Self {
            table,
            pending: None,
        }
    }

    pub fn table(&self) -> &DifficultyTable {
        &self.table
    }

    /// The request awaiting a reply, if any
    pub fn pending(&self) -> Option<&PendingBotRequest> {
        self.pending.as_ref().filter(|p| !p.resolved)
    }

    pub fn is_pending(&self) -> bool {
        self.pending().is_some()
    }

    /// Start a request for `difficulty`.
    ///
    /// Fails if a request is still waiting for its reply.
    pub fn request(&mut self, difficulty: &str) -> Result<IssuedRequest, BotRequestRejection> {
        if self.is_pending() {
            return Err(BotRequestRejection::Outstanding);
        }
        let budget_seconds = self.table.budget_for(difficulty);
        let pending = PendingBotRequest::new(budget_seconds);
        let issued = IssuedRequest {
            request_id: pending.request_id,
            budget_seconds,
            countdown: Countdown::new(budget_seconds, budget_seconds),
        };
        debug!(
            request_id = %issued.request_id,
            difficulty, budget_seconds, "bot request issued"
        );
        self.pending = Some(pending);
        Ok(issued)
    }

    /// Whether a reply carrying `request_id` answers the live request.
    ///
    /// A reply without an id belongs to whatever request is live. Anything that doesn't
    /// match the live, unresolved request is stale.
    pub fn check_reply(&self, request_id: Option<RequestId>) -> Result<(), BotRequestRejection> {
        let pending = self.pending().ok_or(BotRequestRejection::Stale)?;
        if request_id.is_some_and(|id| id != pending.request_id) {
            return Err(BotRequestRejection::Stale);
        }
        Ok(())
    }

    /// Accept a reply, resolving the live request. Same matching as [`Self::check_reply`].
    pub fn on_reply(
        &mut self,
        request_id: Option<RequestId>,
    ) -> Result<AcceptedReply, BotRequestRejection> {
        self.check_reply(request_id)?;
        let pending = self
            .pending
            .as_mut()
            .filter(|p| !p.resolved)
            .ok_or(BotRequestRejection::Stale)?;
        pending.resolved = true;
        pending.remaining_seconds = 0;
        Ok(AcceptedReply {
            request_id: pending.request_id,
            budget_seconds: pending.budget_seconds,
            elapsed: pending.issued_at.elapsed(),
        })
    }

    /// Advance the countdown by one second.
    ///
    /// Returns the new reading, or `None` when nothing is pending or the countdown has
    /// already reached zero.
    pub fn tick(&mut self) -> Option<Countdown> {
        let pending = self.pending.as_mut().filter(|p| !p.resolved)?;
        if pending.remaining_seconds == 0 {
            return None;
        }
        pending.remaining_seconds -= 1;
        Some(Countdown::new(
            pending.remaining_seconds,
            pending.budget_seconds,
        ))
    }

    /// Drop the pending request without resolving it.
    ///
    /// Returns whether there was one. Its reply, if it ever comes, will be stale.
    pub fn abandon(&mut self) -> bool {
        match self.pending.take() {
            Some(p) if !p.resolved => {
                debug!(request_id = %p.request_id, "bot request abandoned");
                true
            }
            _ => false,
        }
    }
}

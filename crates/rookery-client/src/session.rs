//! The session loop.
//!
//! Every producer (socket reader, stdin reader, ticker) pushes into one channel, and this
//! loop is its only consumer. It owns the match state machine outright, so events are
//! handled strictly one at a time in arrival order.

use crate::commands::HELP;
use crate::protocol::ClientMessage;
use rookery_core::{
    Color, MatchEffect, MatchError, MatchEvent, MatchMode, MatchStateMachine, RulesAdapter,
    ShakmatyRules, Square,
};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Countdown resolution
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Everything the session loop consumes
#[derive(Debug, Clone, PartialEq)]
pub enum SessionInput {
    Event(MatchEvent),
    /// Show where the piece on a square can go
    Hints(Square),
    /// Redraw the board
    Show,
    Help,
    Quit,
}

pub struct Session<R: RulesAdapter = ShakmatyRules> {
    game: MatchStateMachine<R>,
    outbound: mpsc::UnboundedSender<ClientMessage>,
}

impl<R: RulesAdapter> Session<R> {
    pub fn new(game: MatchStateMachine<R>, outbound: mpsc::UnboundedSender<ClientMessage>) -> Self {
        Self { game, outbound }
    }

    /// Consume inputs until `Quit` or until every producer is gone
    pub async fn run(mut self, mut inputs: mpsc::UnboundedReceiver<SessionInput>) {
        println!("{HELP}");
        while let Some(input) = inputs.recv().await {
            let Some(lines) = self.handle(input) else {
                break;
            };
            for line in lines {
                println!("{line}");
            }
        }
        debug!("session loop finished");
    }

    /// Handle one input and return the lines to show. `None` means quit.
    pub fn handle(&mut self, input: SessionInput) -> Option<Vec<String>> {
        let lines = match input {
            SessionInput::Quit => return None,
            SessionInput::Help => vec![HELP.to_string()],
            SessionInput::Show => vec![
                render_board(&self.game.fen(), self.game.local_color()),
                self.game.status_text(),
            ],
            SessionInput::Hints(square) => {
                let targets = self.game.move_hints(square);
                if targets.is_empty() {
                    vec![format!("No moves from {square}")]
                } else {
                    let targets: Vec<String> = targets.iter().map(Square::to_string).collect();
                    vec![format!("{square} -> {}", targets.join(" "))]
                }
            }
            SessionInput::Event(event) => self.handle_event(event),
        };
        Some(lines)
    }

    fn handle_event(&mut self, event: MatchEvent) -> Vec<String> {
        match self.game.dispatch(event) {
            Ok(effects) => effects
                .into_iter()
                .filter_map(|effect| self.carry_out(effect))
                .collect(),
            Err(error) => vec![render_error(&error)],
        }
    }

    /// Send outbound messages; turn everything else into display text
    fn carry_out(&self, effect: MatchEffect) -> Option<String> {
        match effect {
            MatchEffect::Send(outbound) => {
                if self.outbound.send(outbound.into()).is_err() {
                    warn!("Connection writer is gone; message dropped");
                }
                None
            }
            MatchEffect::PhaseChanged(_) | MatchEffect::CountdownCleared => None,
            MatchEffect::MatchStarted {
                mode: MatchMode::OnlineMatch,
                local_color,
                matchup,
                ..
            } => Some(format!(
                "Match found! You are {}. {}",
                local_color,
                matchup.unwrap_or_default()
            )),
            MatchEffect::MatchStarted { difficulty, .. } => Some(format!(
                "Playing bot ({})",
                difficulty.unwrap_or_default()
            )),
            MatchEffect::BoardUpdated { fen, last_move } => {
                let board = render_board(&fen, self.game.local_color());
                Some(match last_move {
                    Some(mv) => format!("Last move: {mv}\n{board}"),
                    None => board,
                })
            }
            MatchEffect::StatusText(text) => Some(text),
            MatchEffect::Countdown(countdown) => Some(format!(
                "Bot thinking: {} seconds left ({}%)",
                countdown.remaining_seconds, countdown.percent_remaining
            )),
            MatchEffect::BotMoved {
                elapsed_seconds,
                budget_seconds,
                thinking_time_seconds,
            } => Some(format!(
                "Bot moved in {elapsed_seconds:.2}s (Max: {budget_seconds}s, bot reports \
                 {thinking_time_seconds:.1}s)"
            )),
            MatchEffect::BotNoMove { reason } => Some(match reason {
                Some(reason) => format!("Bot returned no move: {reason}"),
                None => "Bot returned no move".to_string(),
            }),
        }
    }
}

/// Text shown for a rejected event
pub fn render_error(error: &MatchError) -> String {
    match error {
        MatchError::IllegalMove(mv) => format!("Illegal move {mv}"),
        MatchError::ProtocolViolation(_) => {
            format!("Desynchronized from opponent: {error}. Type 'new' to start over")
        }
        MatchError::TransportLost => {
            "Disconnected from server; restart the client to play again".to_string()
        }
        other => other.to_string(),
    }
}

/// ASCII board from the piece-placement field of a FEN, seen from `orientation`'s side
pub fn render_board(fen: &str, orientation: Color) -> String {
    let placement = fen.split_whitespace().next().unwrap_or_default();
    let mut ranks: Vec<(usize, Vec<char>)> = placement
        .split('/')
        .enumerate()
        .map(|(i, rank)| {
            let mut row = Vec::with_capacity(8);
            for c in rank.chars() {
                match c.to_digit(10) {
                    Some(empty) => row.extend(std::iter::repeat('.').take(empty as usize)),
                    None => row.push(c),
                }
            }
            (8usize.saturating_sub(i), row)
        })
        .collect();
    let mut files: Vec<char> = ('a'..='h').collect();

    if orientation == Color::Black {
        ranks.reverse();
        for (_, row) in ranks.iter_mut() {
            row.reverse();
        }
        files.reverse();
    }

    let spaced = |cells: &[char]| {
        cells
            .iter()
            .map(char::to_string)
            .collect::<Vec<_>>()
            .join(" ")
    };
    let mut out: Vec<String> = ranks
        .iter()
        .map(|(rank, row)| format!("{rank} {}", spaced(row.as_slice())))
        .collect();
    out.push(format!("  {}", spaced(files.as_slice())));
    out.join("\n")
}

/// Queue a `Tick` every second until the session goes away
pub fn spawn_ticker(inputs: mpsc::UnboundedSender<SessionInput>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(TICK_INTERVAL);
        // The first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            if inputs.send(SessionInput::Event(MatchEvent::Tick)).is_err() {
                break;
            }
        }
    })
}

//! WebSocket protocol messages for Rookery.

use rookery_core::{
    BotReply, ChessMove, Color, MatchAssignment, MatchEvent, Outbound, PlayerId, RequestId,
};
use serde::{Deserialize, Serialize};

/// Messages sent from client to server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Enter matchmaking
    AddPlayer {
        player_id: PlayerId,
        name: String,
        skill: u32,
    },

    /// Relay a move to the opponent
    Move {
        player_id: PlayerId,
        #[serde(rename = "move")]
        mv: ChessMove,
    },

    /// Ask the bot for a move in this position
    GetAiMove {
        player_id: PlayerId,
        request_id: RequestId,
        fen: String,
        difficulty: String,
    },
}

impl From<Outbound> for ClientMessage {
    fn from(outbound: Outbound) -> Self {
        match outbound {
            Outbound::JoinRequest {
                player_id,
                identity,
            } => ClientMessage::AddPlayer {
                player_id,
                name: identity.name,
                skill: identity.skill,
            },
            Outbound::LocalMove { player_id, mv } => ClientMessage::Move { player_id, mv },
            Outbound::BotMoveRequest {
                player_id,
                request_id,
                fen,
                difficulty,
            } => ClientMessage::GetAiMove {
                player_id,
                request_id,
                fen,
                difficulty,
            },
        }
    }
}

/// Messages sent from server to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Paired with an opponent
    StartGame {
        color: Color,
        opponent: String,
        opponent_skill: u32,
    },

    /// Opponent moved
    OpponentMove(ChessMove),

    /// Bot answered a move request
    AiMove {
        #[serde(default)]
        request_id: Option<RequestId>,
        #[serde(rename = "move", default)]
        mv: Option<ChessMove>,
        #[serde(default)]
        thinking_time: Option<f64>,
        #[serde(default)]
        status: Option<String>,
    },

    /// Error occurred
    Error { message: String },
}

impl ServerMessage {
    /// The match event this message carries, if any
    pub fn into_event(self) -> Option<MatchEvent> {
        match self {
            ServerMessage::StartGame {
                color,
                opponent,
                opponent_skill,
            } => Some(MatchEvent::MatchAssigned(MatchAssignment {
                local_color: color,
                opponent_name: opponent,
                opponent_skill,
            })),
            ServerMessage::OpponentMove(mv) => Some(MatchEvent::RemoteMove(mv)),
            ServerMessage::AiMove {
                request_id,
                mv,
                thinking_time,
                status,
            } => Some(MatchEvent::BotMove(BotReply {
                request_id,
                mv,
                thinking_time_seconds: thinking_time,
                status,
            })),
            ServerMessage::Error { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rookery_core::PlayerIdentity;
    use serde_json::json;
    use uuid::Uuid;

    fn mv(s: &str) -> ChessMove {
        s.parse().unwrap()
    }

    #[test]
    fn test_join_request_shape() {
        let msg = ClientMessage::from(Outbound::JoinRequest {
            player_id: PlayerId(1234),
            identity: PlayerIdentity::new("A", 1600),
        });
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({
                "type": "add_player",
                "payload": {"player_id": 1234, "name": "A", "skill": 1600}
            })
        );
    }

    #[test]
    fn test_move_shape() {
        let msg = ClientMessage::from(Outbound::LocalMove {
            player_id: PlayerId(7),
            mv: mv("e7e8q"),
        });
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({
                "type": "move",
                "payload": {
                    "player_id": 7,
                    "move": {"from": "e7", "to": "e8", "promotion": "q"}
                }
            })
        );
    }

    #[test]
    fn test_bot_request_shape() {
        let msg = ClientMessage::from(Outbound::BotMoveRequest {
            player_id: PlayerId(7),
            request_id: RequestId(Uuid::nil()),
            fen: "8/8/8/8/8/8/8/8 w - - 0 1".to_string(),
            difficulty: "easy".to_string(),
        });
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "get_ai_move");
        assert_eq!(
            value["payload"]["request_id"],
            "00000000-0000-0000-0000-000000000000"
        );
        assert_eq!(value["payload"]["difficulty"], "easy");
    }

    #[test]
    fn test_start_game_to_event() {
        let msg: ServerMessage = serde_json::from_value(json!({
            "type": "start_game",
            "payload": {"color": "black", "opponent": "B", "opponent_skill": 1500}
        }))
        .unwrap();
        assert_eq!(
            msg.into_event(),
            Some(MatchEvent::MatchAssigned(MatchAssignment {
                local_color: Color::Black,
                opponent_name: "B".to_string(),
                opponent_skill: 1500,
            }))
        );
    }

    #[test]
    fn test_opponent_move_to_event() {
        let msg: ServerMessage = serde_json::from_value(json!({
            "type": "opponent_move",
            "payload": {"from": "e7", "to": "e5", "promotion": null}
        }))
        .unwrap();
        assert_eq!(msg.into_event(), Some(MatchEvent::RemoteMove(mv("e7e5"))));
    }

    #[test]
    fn test_ai_move_minimal_and_full() {
        let minimal: ServerMessage = serde_json::from_value(json!({
            "type": "ai_move",
            "payload": {"move": {"from": "e7", "to": "e5"}}
        }))
        .unwrap();
        assert_eq!(
            minimal.into_event(),
            Some(MatchEvent::BotMove(BotReply::with_move(mv("e7e5"))))
        );

        let none: ServerMessage = serde_json::from_value(json!({
            "type": "ai_move",
            "payload": {
                "request_id": "00000000-0000-0000-0000-000000000000",
                "move": null,
                "thinking_time": 1.25,
                "status": "Game is already over"
            }
        }))
        .unwrap();
        assert_eq!(
            none.into_event(),
            Some(MatchEvent::BotMove(BotReply {
                request_id: Some(RequestId(Uuid::nil())),
                mv: None,
                thinking_time_seconds: Some(1.25),
                status: Some("Game is already over".to_string()),
            }))
        );
    }

    #[test]
    fn test_error_carries_no_event() {
        let msg: ServerMessage = serde_json::from_str(
            r#"{"type":"error","payload":{"message":"Invalid request"}}"#,
        )
        .unwrap();
        assert_eq!(msg.into_event(), None);
    }

    #[test]
    fn test_bad_square_rejected() {
        let result = serde_json::from_value::<ServerMessage>(json!({
            "type": "opponent_move",
            "payload": {"from": "z9", "to": "e5"}
        }));
        assert!(result.is_err());
    }
}

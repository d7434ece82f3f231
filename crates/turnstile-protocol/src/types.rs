//! Wire types: the envelope and the request/response vocabulary.
//!
//! Clients poll, so every exchange is a request answered by exactly one
//! response. The response echoes the request's `seq` in `reply_to`,
//! which is how the remote client pairs them up.

use serde::{Deserialize, Serialize};

use crate::{GameSession, JoinCode, PlayerId, SessionId, SessionStatus};

/// Clients must send this version in `Hello` or be turned away.
pub const PROTOCOL_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// SessionSummary
// ---------------------------------------------------------------------------

/// A joinable session as shown in a lobby listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: SessionId,
    pub code: JoinCode,
    pub status: SessionStatus,
    pub player_count: usize,
    pub max_players: usize,
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// Client → server intents.
///
/// `#[serde(tag = "type")]` gives internally tagged JSON such as
/// `{ "type": "EndTurn", "session_id": 4 }`, which is what a browser
/// client finds easiest to build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    // -- Connection lifecycle --
    /// Must be the first request on a connection.
    Hello { version: u32, token: Option<String> },

    /// Keep-alive. Echoed back with the server's clock.
    Heartbeat { client_time: u64 },

    /// "I'm leaving." The server closes the connection.
    Goodbye { reason: String },

    // -- Session lifecycle --
    /// Opens a new `PENDING` session and seats the caller first.
    CreateSession { name: String, token: String },

    /// Takes a seat in a pending session.
    JoinSession {
        code: JoinCode,
        name: String,
        token: String,
    },

    /// Moves a pending session to `RUNNING`.
    StartSession { session_id: SessionId },

    /// Gives up the caller's seat.
    LeaveSession { session_id: SessionId },

    /// Lists sessions still accepting players.
    ListSessions,

    // -- Turn engine --
    /// Authoritative snapshot fetch; this is what the poll loop sends.
    GetSessionByCode { code: JoinCode },

    /// "May I roll right now?"
    CheckEligibility { session_id: SessionId },

    /// Commits a movement the client already computed.
    CommitPosition {
        session_id: SessionId,
        new_position: u32,
        rolled_total: u32,
    },

    /// Passes the turn to the next player.
    EndTurn { session_id: SessionId },
}

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

/// Server → client answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Response {
    /// Answer to `Hello`: who the server thinks you are.
    Welcome { player_id: PlayerId, server_time: u64 },

    HeartbeatAck { client_time: u64, server_time: u64 },

    /// A full authoritative snapshot.
    Session { session: GameSession },

    SessionList { sessions: Vec<SessionSummary> },

    Eligibility { can_roll: bool },

    /// Result of a mutating intent. On success `session` carries the
    /// snapshot the client must adopt wholesale; on rejection `message`
    /// says why and `session` is `None`.
    Outcome {
        success: bool,
        message: Option<String>,
        session: Option<GameSession>,
    },

    /// Request could not be served. `code` follows HTTP conventions:
    /// 400 bad request, 401 unauthorized, 404 not found, 409 conflict.
    Error { code: u16, message: String },
}

// ---------------------------------------------------------------------------
// Payload / Envelope
// ---------------------------------------------------------------------------

/// Either side of an exchange.
///
/// Adjacently tagged: `{ "type": "Request", "data": { "type": "EndTurn", ... } }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Payload {
    Request(Request),
    Response(Response),
}

/// The top-level wire message.
///
/// ```text
/// ┌──────────────────────────────┐
/// │ seq: 7                       │  ← sender's counter
/// │ reply_to: Some(3)            │  ← request being answered
/// │ timestamp: 15000             │
/// │ payload: Response(Outcome)   │
/// └──────────────────────────────┘
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Per-connection, per-direction counter.
    pub seq: u64,

    /// Set on responses only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<u64>,

    /// Milliseconds since the sender started.
    pub timestamp: u64,

    pub payload: Payload,
}

impl Envelope {
    /// Builds a request envelope.
    pub fn request(seq: u64, timestamp: u64, request: Request) -> Self {
        Self {
            seq,
            reply_to: None,
            timestamp,
            payload: Payload::Request(request),
        }
    }

    /// Builds a response to the request numbered `reply_to`.
    pub fn response(seq: u64, reply_to: u64, timestamp: u64, response: Response) -> Self {
        Self {
            seq,
            reply_to: Some(reply_to),
            timestamp,
            payload: Payload::Response(response),
        }
    }
}

#[cfg(test)]
mod tests {
    //! The browser client builds these shapes by hand, so the tests pin
    //! the JSON layout rather than just round-tripping.

    use super::*;

    #[test]
    fn test_request_commit_position_json_format() {
        let msg = Request::CommitPosition {
            session_id: SessionId(4),
            new_position: 2,
            rolled_total: 7,
        };
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["type"], "CommitPosition");
        assert_eq!(json["session_id"], 4);
        assert_eq!(json["new_position"], 2);
        assert_eq!(json["rolled_total"], 7);
    }

    #[test]
    fn test_request_hello_without_token_is_null() {
        let msg = Request::Hello {
            version: PROTOCOL_VERSION,
            token: None,
        };
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["type"], "Hello");
        assert!(json["token"].is_null());
    }

    #[test]
    fn test_response_outcome_rejection_json_format() {
        let msg = Response::Outcome {
            success: false,
            message: Some("not your turn".into()),
            session: None,
        };
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["type"], "Outcome");
        assert_eq!(json["success"], false);
        assert_eq!(json["message"], "not your turn");
        assert!(json["session"].is_null());
    }

    #[test]
    fn test_payload_is_adjacently_tagged() {
        let payload = Payload::Request(Request::ListSessions);
        let json: serde_json::Value = serde_json::to_value(&payload).unwrap();

        assert_eq!(json["type"], "Request");
        assert_eq!(json["data"]["type"], "ListSessions");
    }

    #[test]
    fn test_envelope_request_omits_reply_to() {
        let env = Envelope::request(1, 0, Request::ListSessions);
        let json: serde_json::Value = serde_json::to_value(&env).unwrap();

        assert!(json.get("reply_to").is_none());
    }

    #[test]
    fn test_envelope_reply_to_defaults_when_missing() {
        let json = r#"{
            "seq": 1,
            "timestamp": 100,
            "payload": { "type": "Request", "data": { "type": "ListSessions" } }
        }"#;
        let env: Envelope = serde_json::from_str(json).unwrap();
        assert_eq!(env.reply_to, None);
    }

    #[test]
    fn test_join_code_round_trips_as_plain_string() {
        let msg = Request::GetSessionByCode {
            code: JoinCode::new("abc123"),
        };
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["code"], "ABC123");
    }

    #[test]
    fn test_decode_unknown_request_type_returns_error() {
        let unknown = r#"{"type": "BuyHotel", "square": 39}"#;
        let result: Result<Request, _> = serde_json::from_str(unknown);
        assert!(result.is_err());
    }
}

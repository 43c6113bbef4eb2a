//! Wire vocabulary for the interview WebSocket
//!
//! Every frame is a JSON object tagged by `type`. Inbound frames are decoded
//! into [`ClientMessage`] before they reach the state machine; anything that
//! does not fit the closed set becomes a [`CodecError`].

use crate::state_machine::{Feedback, Question, QuestionCategory};
use crate::summary::{CompletionReason, SessionSummary};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

// ============================================================================
// Inbound
// ============================================================================

/// Messages a client may send
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    StartInterview {
        interview_type: String,
        level: String,
        #[serde(default)]
        resume_text: Option<String>,
    },
    Response {
        response: String,
    },
}

impl ClientMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::StartInterview { .. } => "start_interview",
            ClientMessage::Response { .. } => "response",
        }
    }
}

/// Why an inbound frame was rejected
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("frame is not valid JSON: {0}")]
    InvalidJson(String),
    #[error("frame is not a JSON object")]
    NotAnObject,
    #[error("frame has no string `type` field")]
    MissingType,
    #[error("unknown message type `{0}`")]
    UnknownType(String),
    #[error("invalid `{kind}` message: {detail}")]
    InvalidFields { kind: String, detail: String },
    #[error("binary frames are not supported")]
    BinaryFrame,
}

const KNOWN_TYPES: [&str; 2] = ["start_interview", "response"];

/// Decode one text frame into a typed client message.
///
/// The frame is inspected in two passes so that an unknown `type` and a
/// known type with bad fields produce distinct diagnostics.
pub fn decode(raw: &str) -> Result<ClientMessage, CodecError> {
    let value: serde_json::Value =
        serde_json::from_str(raw).map_err(|e| CodecError::InvalidJson(e.to_string()))?;

    let object = value.as_object().ok_or(CodecError::NotAnObject)?;
    let kind = object
        .get("type")
        .and_then(serde_json::Value::as_str)
        .ok_or(CodecError::MissingType)?;

    if !KNOWN_TYPES.contains(&kind) {
        return Err(CodecError::UnknownType(kind.to_string()));
    }
    let kind = kind.to_string();

    serde_json::from_value(value).map_err(|e| CodecError::InvalidFields {
        kind,
        detail: e.to_string(),
    })
}

// ============================================================================
// Outbound
// ============================================================================

/// Machine-readable error codes carried by `error` frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    MalformedMessage,
    InvalidSetup,
    AlreadyStarted,
    UnexpectedMessage,
    CollaboratorFailure,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCode::MalformedMessage => "MalformedMessage",
            ErrorCode::InvalidSetup => "InvalidSetup",
            ErrorCode::AlreadyStarted => "AlreadyStarted",
            ErrorCode::UnexpectedMessage => "UnexpectedMessage",
            ErrorCode::CollaboratorFailure => "CollaboratorFailure",
        };
        f.write_str(name)
    }
}

/// Messages the server sends
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Question {
        question: String,
        turn: usize,
        #[serde(skip_serializing_if = "Option::is_none")]
        category: Option<QuestionCategory>,
    },
    Feedback {
        feedback: FeedbackPayload,
    },
    Summary {
        summary: SummaryPayload,
    },
    Ack,
    Error {
        code: ErrorCode,
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedbackPayload {
    pub feedback: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metrics: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryPayload {
    pub score: u8,
    pub overview: String,
    pub turns: usize,
    pub completion: CompletionReason,
    pub strengths: Vec<String>,
    pub recommendations: Vec<String>,
}

impl ServerMessage {
    pub fn question(question: &Question, turn: usize) -> Self {
        ServerMessage::Question {
            question: question.text.clone(),
            turn,
            category: question.category,
        }
    }

    pub fn feedback(feedback: &Feedback) -> Self {
        ServerMessage::Feedback {
            feedback: FeedbackPayload {
                feedback: feedback.narrative.clone(),
                metrics: feedback.metrics.clone(),
            },
        }
    }

    pub fn summary(summary: &SessionSummary) -> Self {
        ServerMessage::Summary {
            summary: SummaryPayload {
                score: summary.score,
                overview: summary.overview.clone(),
                turns: summary.turns,
                completion: summary.completion,
                strengths: summary.strengths.clone(),
                recommendations: summary.recommendations.clone(),
            },
        }
    }

    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        ServerMessage::Error {
            code,
            message: message.into(),
        }
    }

    /// Wire name of this message's `type` tag
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::Question { .. } => "question",
            ServerMessage::Feedback { .. } => "feedback",
            ServerMessage::Summary { .. } => "summary",
            ServerMessage::Ack => "ack",
            ServerMessage::Error { .. } => "error",
        }
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

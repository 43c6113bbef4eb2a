//! `OpenAI`-compatible chat completions client acting as both question
//! generator and answer scorer

use super::{
    AnswerScorer, CollaboratorError, QuestionGenerator, QuestionOutcome, QuestionRequest,
    ScoreRequest,
};
use crate::config::LlmSettings;
use crate::state_machine::{Feedback, Question, QuestionCategory};
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::OnceLock;
use std::time::Duration;

/// Metrics every scored answer carries; missing ones get `NEUTRAL_SCORE`
pub const CORE_METRICS: &[&str] = &["clarity", "technical_accuracy", "communication"];
pub const NEUTRAL_SCORE: f64 = 5.0;
/// Optional metrics kept when the model reports them; anything else is dropped
pub const EXTRA_METRICS: &[&str] = &["confidence", "pace"];

const MAX_TOKENS: u32 = 1000;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

pub struct OpenAiCollaborator {
    client: Client,
    settings: LlmSettings,
}

impl OpenAiCollaborator {
    pub fn new(settings: LlmSettings) -> Result<Self, CollaboratorError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| CollaboratorError::Unavailable(format!("HTTP client: {e}")))?;
        Ok(Self { client, settings })
    }

    /// One system + user exchange; returns the assistant text
    async fn chat(&self, system: String, user: String) -> Result<String, CollaboratorError> {
        let request = ChatRequest {
            model: self.settings.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system,
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user,
                },
            ],
            max_tokens: MAX_TOKENS,
            temperature: 0.7,
        };

        let response = self
            .client
            .post(&self.settings.endpoint)
            .header("Authorization", format!("Bearer {}", self.settings.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CollaboratorError::Unavailable(format!("Request timeout: {e}"))
                } else if e.is_connect() {
                    CollaboratorError::Unavailable(format!("Connection failed: {e}"))
                } else {
                    CollaboratorError::Unavailable(format!("Request failed: {e}"))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CollaboratorError::Unavailable(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map_or(body, |resp| resp.error.message);
            return Err(CollaboratorError::Unavailable(match status.as_u16() {
                401 | 403 => format!("Authentication failed: {message}"),
                429 => format!("Rate limit exceeded: {message}"),
                500..=599 => format!("Server error: {message}"),
                _ => format!("HTTP {status}: {message}"),
            }));
        }

        let parsed: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| CollaboratorError::InvalidReply(format!("Failed to parse response: {e}")))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| CollaboratorError::InvalidReply("No content in response".to_string()))
    }
}

#[async_trait]
impl QuestionGenerator for OpenAiCollaborator {
    async fn generate(&self, request: &QuestionRequest) -> Result<QuestionOutcome, CollaboratorError> {
        let field = request.interview_type.replace('_', " ");
        let system = format!(
            "You are an interview coach running a {field} mock interview at the {} level. \
             Ask one question at a time. Expect the STAR method for behavioral questions.",
            request.level
        );

        let mut user = String::from("Questions asked so far:\n");
        if request.history.is_empty() {
            user.push_str("(none)\n");
        }
        for (i, turn) in request.history.iter().enumerate() {
            let _ = writeln!(user, "{}. {}", i + 1, turn.question.text);
        }
        if let Some(resume) = &request.resume_context {
            let _ = write!(user, "\nCandidate resume:\n{resume}\n");
        }
        user.push_str(
            "\nReturn only JSON: {\"question\": \"...\", \"category\": \"intro\" | \"technical\" | \
             \"behavioral\", \"done\": false}. Set \"done\" to true when the interview has covered \
             enough ground.",
        );

        let reply = self.chat(system, user).await?;
        parse_question(&reply)
    }

    fn name(&self) -> &str {
        "openai"
    }
}

#[async_trait]
impl AnswerScorer for OpenAiCollaborator {
    async fn score(&self, request: &ScoreRequest) -> Result<Feedback, CollaboratorError> {
        let system = format!(
            "You grade answers in a {} interview at the {} level.",
            request.interview_type.replace('_', " "),
            request.level
        );
        let user = format!(
            "Question: {}\nResponse: {}\n\nReturn only JSON: {{\"feedback\": \"detailed feedback\", \
             \"metrics\": {{\"clarity\": 0-10, \"technical_accuracy\": 0-10, \"communication\": 0-10}}}}. \
             All metric values must be numbers.",
            request.question.text, request.answer
        );

        let reply = self.chat(system, user).await?;
        parse_feedback(&reply)
    }

    fn name(&self) -> &str {
        "openai"
    }
}

// ============================================================================
// Reply parsing
// ============================================================================

/// Strip markdown code fences around a JSON reply, and `//` or `/* */`
/// comments when the reply does not parse without that
pub fn clean_json_reply(raw: &str) -> String {
    static FENCE: OnceLock<Option<Regex>> = OnceLock::new();
    static COMMENT: OnceLock<Option<Regex>> = OnceLock::new();
    let fence = FENCE.get_or_init(|| Regex::new(r"(?m)^\s*```[a-zA-Z]*\s*$").ok());

    let mut text = raw.trim().to_string();
    if let Some(re) = fence {
        text = re.replace_all(&text, "").trim().to_string();
    }
    // Comment syntax may legitimately appear inside string values
    if serde_json::from_str::<Value>(&text).is_ok() {
        return text;
    }

    let comment = COMMENT.get_or_init(|| Regex::new(r"(?ms)(?:^|\s)//[^\n]*$|/\*.*?\*/").ok());
    if let Some(re) = comment {
        text = re.replace_all(&text, "").into_owned();
    }
    text.trim().to_string()
}

fn parse_object(raw: &str) -> Result<serde_json::Map<String, Value>, CollaboratorError> {
    let cleaned = clean_json_reply(raw);
    match serde_json::from_str::<Value>(&cleaned) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(CollaboratorError::InvalidReply(
            "expected a JSON object".to_string(),
        )),
        Err(e) => Err(CollaboratorError::InvalidReply(format!("not JSON: {e}"))),
    }
}

/// Numbers pass through, numeric strings are parsed, anything else is `None`
fn metric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn parse_feedback(raw: &str) -> Result<Feedback, CollaboratorError> {
    let object = parse_object(raw)?;
    let narrative = object
        .get("feedback")
        .and_then(Value::as_str)
        .unwrap_or("No detailed feedback available")
        .to_string();

    let reported = object.get("metrics").and_then(Value::as_object);
    let mut metrics = BTreeMap::new();
    for name in CORE_METRICS {
        let value = reported
            .and_then(|m| m.get(*name))
            .and_then(metric_value)
            .unwrap_or(NEUTRAL_SCORE);
        metrics.insert((*name).to_string(), value);
    }
    for name in EXTRA_METRICS {
        if let Some(value) = reported.and_then(|m| m.get(*name)).and_then(metric_value) {
            metrics.insert((*name).to_string(), value);
        }
    }

    Ok(Feedback::new(narrative, metrics))
}

pub fn parse_question(raw: &str) -> Result<QuestionOutcome, CollaboratorError> {
    let object = parse_object(raw)?;
    if object.get("done").and_then(Value::as_bool) == Some(true) {
        return Ok(QuestionOutcome::Exhausted);
    }
    let text = object
        .get("question")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| CollaboratorError::InvalidReply("missing question".to_string()))?;

    let mut question = Question::new(text);
    if let Some(category) = object
        .get("category")
        .cloned()
        .and_then(|c| serde_json::from_value::<QuestionCategory>(c).ok())
    {
        question = question.with_category(category);
    }
    Ok(QuestionOutcome::Question(question))
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ChatReplyMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

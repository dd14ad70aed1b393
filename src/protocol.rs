//! Wire envelopes: outbound request frames and inbound stage messages.
//!
//! Outbound: `{action, request_id, headers: {"X-Authentication": "pid:ks"}, ...payload}`
//! Inbound:  `{stage, data, request_id?}`

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{ChatEntry, Transcripts, VideoSummary};

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    GetVideos,
    AnalyzeVideos,
    AskQuestion,
    GenerateFollowupQuestions,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::GetVideos => "get_videos",
            Action::AnalyzeVideos => "analyze_videos",
            Action::AskQuestion => "ask_question",
            Action::GenerateFollowupQuestions => "generate_followup_questions",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Action-specific fields, merged into the top level of the envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    GetVideos {
        #[serde(rename = "categoryId")]
        category_id: Option<String>,
        #[serde(rename = "freeText")]
        free_text: Option<String>,
    },
    AnalyzeVideos {
        #[serde(rename = "selectedVideos")]
        selected_videos: Vec<String>,
    },
    AskQuestion {
        question: String,
        #[serde(rename = "analysisResults")]
        analysis_results: Vec<VideoSummary>,
        transcripts: Transcripts,
        chat_history: Vec<ChatEntry>,
    },
    GenerateFollowupQuestions {
        transcripts: Transcripts,
    },
}

impl Payload {
    pub fn action(&self) -> Action {
        match self {
            Payload::GetVideos { .. } => Action::GetVideos,
            Payload::AnalyzeVideos { .. } => Action::AnalyzeVideos,
            Payload::AskQuestion { .. } => Action::AskQuestion,
            Payload::GenerateFollowupQuestions { .. } => Action::GenerateFollowupQuestions,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthHeaders {
    #[serde(rename = "X-Authentication")]
    pub authentication: String,
}

/// A fully built outbound request frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    pub action: Action,
    pub request_id: String,
    pub headers: AuthHeaders,
    #[serde(flatten)]
    pub payload: Payload,
}

impl Envelope {
    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Version-4-shaped random identifier.
///
/// Built by substituting random hex digits into the
/// `xxxxxxxx-xxxx-4xxx-yxxx-xxxxxxxxxxxx` template, with `y` restricted to
/// `8..=b`. Unique enough to tell requests apart in logs; not a verified UUID.
pub fn generate_request_id() -> String {
    use rand::Rng;
    const TEMPLATE: &str = "xxxxxxxx-xxxx-4xxx-yxxx-xxxxxxxxxxxx";
    let mut rng = rand::thread_rng();
    TEMPLATE
        .chars()
        .map(|c| {
            let nibble: u32 = rng.gen_range(0..16);
            match c {
                'x' => char::from_digit(nibble, 16).unwrap_or('0'),
                'y' => char::from_digit((nibble & 0x3) | 0x8, 16).unwrap_or('8'),
                other => other,
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

/// Discriminant of an inbound message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Stage {
    Videos,
    ChunkProgress,
    CombinedSummary,
    CrossVideoInsights,
    Completed,
    FollowupQuestions,
    ChatResponse,
    Error,
    /// Any stage this client does not know; kept for logging.
    Unknown(String),
}

impl Stage {
    pub fn parse(raw: &str) -> Stage {
        match raw {
            "videos" => Stage::Videos,
            "chunk_progress" => Stage::ChunkProgress,
            "combined_summary" => Stage::CombinedSummary,
            "cross_video_insights" => Stage::CrossVideoInsights,
            "completed" => Stage::Completed,
            "followup_questions" => Stage::FollowupQuestions,
            // the ask_question handler replies with `answer`
            "chat_response" | "answer" => Stage::ChatResponse,
            "error" => Stage::Error,
            other => Stage::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Stage::Videos => "videos",
            Stage::ChunkProgress => "chunk_progress",
            Stage::CombinedSummary => "combined_summary",
            Stage::CrossVideoInsights => "cross_video_insights",
            Stage::Completed => "completed",
            Stage::FollowupQuestions => "followup_questions",
            Stage::ChatResponse => "chat_response",
            Stage::Error => "error",
            Stage::Unknown(s) => s.as_str(),
        }
    }

    /// Stages that only update progress displays.
    pub fn is_progress(&self) -> bool {
        matches!(
            self,
            Stage::ChunkProgress | Stage::CombinedSummary | Stage::CrossVideoInsights
        )
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded inbound message carrying a stage.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub stage: Stage,
    pub data: Value,
    /// Echoed by the server; not required by the client.
    pub request_id: Option<String>,
}

impl InboundMessage {
    pub fn new(stage: Stage, data: Value) -> Self {
        Self {
            stage,
            data,
            request_id: None,
        }
    }
}

/// Anything that can arrive on the socket.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Staged(InboundMessage),
    /// A JSON object with no `stage`, e.g. an API gateway timeout notice.
    Unstaged { message: Option<String> },
}

#[derive(Deserialize)]
struct RawFrame {
    stage: Option<String>,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    request_id: Option<String>,
    #[serde(default)]
    message: Option<Value>,
}

/// Decode one text frame.
///
/// # Errors
/// Returns the JSON error when the frame is not a JSON object.
pub fn decode_frame(text: &str) -> Result<Inbound, serde_json::Error> {
    let raw: RawFrame = serde_json::from_str(text)?;
    Ok(match raw.stage {
        Some(stage) => Inbound::Staged(InboundMessage {
            stage: Stage::parse(&stage),
            data: raw.data,
            request_id: raw.request_id,
        }),
        None => Inbound::Unstaged {
            message: raw.message.map(|m| match m {
                Value::String(s) => s,
                other => other.to_string(),
            }),
        },
    })
}

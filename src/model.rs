//! Payload types carried inside inbound `data` fields and echoed back in
//! follow-up requests.
//!
//! The backend is loose about shapes (some stages send an object on one path
//! and a JSON-encoded string on another), so each stage has a lenient
//! `parse_*` helper next to its typed struct.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// entry id → raw caption entries, passed back verbatim as chat context.
pub type Transcripts = BTreeMap<String, Vec<Value>>;

// ---------------------------------------------------------------------------
// Search results
// ---------------------------------------------------------------------------

/// One candidate video from a `videos` message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoEntry {
    pub entry_id: String,
    pub entry_name: String,
    pub entry_description: String,
    pub entry_reference_id: String,
    pub entry_media_type: i64,
    pub entry_media_date: i64,
    pub entry_ms_duration: i64,
    pub entry_last_played_at: i64,
    pub entry_application: String,
    pub entry_creator_id: String,
    pub entry_tags: String,
}

pub fn parse_videos(data: Value) -> Result<Vec<VideoEntry>, serde_json::Error> {
    match data {
        Value::Null => Ok(Vec::new()),
        other => serde_json::from_value(other),
    }
}

// ---------------------------------------------------------------------------
// Per-video analysis
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Section {
    pub title: String,
    pub summary: String,
    pub start_sentence: String,
    pub start_time: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Insight {
    pub text: String,
    pub start_time: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Person {
    pub name: String,
}

/// Analysis of one video, as produced by the chunk and combine passes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoSummary {
    pub entry_id: String,
    pub full_summary: String,
    pub sections: Vec<Section>,
    pub insights: Vec<Insight>,
    pub people: Vec<Person>,
    pub primary_topics: Vec<String>,
}

/// A `combined_summary` payload: structured when it parses, raw text otherwise.
#[derive(Debug, Clone, PartialEq)]
pub enum SummaryUpdate {
    Parsed(VideoSummary),
    Raw(String),
}

pub fn parse_summary(data: Value) -> SummaryUpdate {
    match data {
        Value::String(text) => match serde_json::from_str::<VideoSummary>(&text) {
            Ok(summary) => SummaryUpdate::Parsed(summary),
            Err(_) => SummaryUpdate::Raw(text),
        },
        other => match serde_json::from_value::<VideoSummary>(other.clone()) {
            Ok(summary) => SummaryUpdate::Parsed(summary),
            Err(_) => SummaryUpdate::Raw(other.to_string()),
        },
    }
}

/// A `chunk_progress` payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkProgress {
    pub video_id: String,
    /// Usually a JSON-encoded [`VideoSummary`] of the chunk.
    pub chunk_summary: Value,
    /// 1-based.
    pub chunk_index: u32,
    pub total_chunks: u32,
    pub total_videos: u32,
}

// ---------------------------------------------------------------------------
// Cross-video synthesis and completion
// ---------------------------------------------------------------------------

/// Absent and empty lists are equivalent: neither produces a labeled section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossVideoInsights {
    pub shared_insights: Vec<String>,
    pub common_themes: Vec<String>,
    pub opposing_views: Vec<String>,
    pub sentiments: Vec<String>,
}

impl CrossVideoInsights {
    /// The labeled lists in display order, skipping empty ones.
    pub fn sections(&self) -> Vec<(&'static str, &[String])> {
        [
            ("Shared Insights", self.shared_insights.as_slice()),
            ("Common Themes", self.common_themes.as_slice()),
            ("Opposing Views", self.opposing_views.as_slice()),
            ("Sentiments", self.sentiments.as_slice()),
        ]
        .into_iter()
        .filter(|(_, items)| !items.is_empty())
        .collect()
    }
}

pub fn parse_insights(data: Value) -> Result<CrossVideoInsights, serde_json::Error> {
    match data {
        Value::String(text) => serde_json::from_str(&text),
        other => serde_json::from_value(other),
    }
}

/// The terminal `completed` payload of an analysis session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletedPayload {
    pub individual_results: Vec<VideoSummary>,
    pub transcripts: Transcripts,
    /// `None` for both an explicit `null` and a missing key.
    pub cross_video_insights: Option<CrossVideoInsights>,
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

impl std::fmt::Display for Sender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Sender::User => write!(f, "user"),
            Sender::Assistant => write!(f, "assistant"),
        }
    }
}

/// One line of the chat transcript, in the `{sender, message}` wire shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEntry {
    pub sender: Sender,
    pub message: String,
}

/// Accepts `{questions: [{question}]}`, a bare array of strings, or a bare
/// array of `{question}` objects. Blank questions are dropped.
pub fn parse_followups(data: Value) -> Vec<String> {
    let data = match data {
        Value::String(text) => serde_json::from_str(&text).unwrap_or(Value::Null),
        other => other,
    };
    let items = match data {
        Value::Object(mut map) => match map.remove("questions") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        Value::Array(items) => items,
        _ => Vec::new(),
    };
    items
        .into_iter()
        .filter_map(|item| match item {
            Value::String(q) => Some(q),
            Value::Object(mut obj) => match obj.remove("question") {
                Some(Value::String(q)) => Some(q),
                _ => None,
            },
            _ => None,
        })
        .filter(|q| !q.trim().is_empty())
        .collect()
}

/// Extract the answer text from a `chat_response` / `answer` payload.
pub fn parse_chat_answer(data: Value) -> String {
    match data {
        Value::String(text) => match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(obj)) => answer_field(obj).unwrap_or(text),
            _ => text,
        },
        Value::Object(obj) => {
            let fallback = Value::Object(obj.clone()).to_string();
            answer_field(obj).unwrap_or(fallback)
        }
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn answer_field(mut obj: serde_json::Map<String, Value>) -> Option<String> {
    match obj.remove("answer") {
        Some(Value::String(answer)) => Some(answer),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// An `error` payload: the backend sends either a message or a field map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorPayload {
    Message(String),
    Fields(Vec<(String, String)>),
}

impl ErrorPayload {
    pub fn from_value(data: Value) -> Self {
        match data {
            Value::String(s) => ErrorPayload::Message(s),
            Value::Object(map) => ErrorPayload::Fields(
                map.into_iter()
                    .map(|(k, v)| {
                        let text = match v {
                            Value::String(s) => s,
                            other => other.to_string(),
                        };
                        (k, text)
                    })
                    .collect(),
            ),
            Value::Null => ErrorPayload::Message("unknown error".to_string()),
            other => ErrorPayload::Message(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // -----------------------------------------------------------------------
    // Videos
    // -----------------------------------------------------------------------

    #[test]
    fn test_parse_videos_fills_missing_fields() {
        let videos = parse_videos(json!([{"entry_id": "1_abc", "entry_name": "Kickoff"}])).unwrap();
        assert_eq!(videos.len(), 1);
        assert_eq!(videos[0].entry_id, "1_abc");
        assert_eq!(videos[0].entry_description, "");
        assert_eq!(videos[0].entry_ms_duration, 0);
    }

    #[test]
    fn test_parse_videos_null_is_empty() {
        assert!(parse_videos(Value::Null).unwrap().is_empty());
    }

    #[test]
    fn test_parse_videos_rejects_object() {
        assert!(parse_videos(json!({"entry_id": "x"})).is_err());
    }

    // -----------------------------------------------------------------------
    // Summaries
    // -----------------------------------------------------------------------

    #[test]
    fn test_parse_summary_from_object() {
        let update = parse_summary(json!({"entry_id": "v1", "full_summary": "All hands"}));
        match update {
            SummaryUpdate::Parsed(s) => {
                assert_eq!(s.entry_id, "v1");
                assert!(s.sections.is_empty());
            }
            other => panic!("expected parsed summary, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_summary_from_json_string() {
        let encoded = json!({"entry_id": "v2", "primary_topics": ["budget"]}).to_string();
        let update = parse_summary(Value::String(encoded));
        assert!(matches!(update, SummaryUpdate::Parsed(ref s) if s.primary_topics == vec!["budget"]));
    }

    #[test]
    fn test_parse_summary_plain_text_is_raw() {
        let update = parse_summary(json!("not json at all"));
        assert_eq!(update, SummaryUpdate::Raw("not json at all".into()));
    }

    #[test]
    fn test_completed_null_insights_is_none() {
        let payload: CompletedPayload = serde_json::from_value(json!({
            "individual_results": [],
            "transcripts": {},
            "cross_video_insights": null
        }))
        .unwrap();
        assert!(payload.cross_video_insights.is_none());
    }

    #[test]
    fn test_completed_missing_insights_is_none() {
        let payload: CompletedPayload =
            serde_json::from_value(json!({"individual_results": []})).unwrap();
        assert!(payload.cross_video_insights.is_none());
        assert!(payload.transcripts.is_empty());
    }

    #[test]
    fn test_insight_sections_skip_empty_lists() {
        let insights = CrossVideoInsights {
            common_themes: vec!["hiring".into()],
            sentiments: vec!["optimistic".into()],
            ..Default::default()
        };
        let labels: Vec<&str> = insights.sections().iter().map(|(l, _)| *l).collect();
        assert_eq!(labels, vec!["Common Themes", "Sentiments"]);
    }

    // -----------------------------------------------------------------------
    // Follow-ups and answers
    // -----------------------------------------------------------------------

    #[test]
    fn test_parse_followups_wrapped_shape() {
        let qs = parse_followups(json!({"questions": [{"question": "Who spoke first?"}, {"question": " "}]}));
        assert_eq!(qs, vec!["Who spoke first?"]);
    }

    #[test]
    fn test_parse_followups_bare_strings() {
        let qs = parse_followups(json!(["A?", "B?"]));
        assert_eq!(qs, vec!["A?", "B?"]);
    }

    #[test]
    fn test_parse_followups_encoded_string() {
        let encoded = json!({"questions": [{"question": "Next steps?"}]}).to_string();
        assert_eq!(parse_followups(Value::String(encoded)), vec!["Next steps?"]);
    }

    #[test]
    fn test_parse_chat_answer_shapes() {
        assert_eq!(parse_chat_answer(json!({"answer": "yes"})), "yes");
        assert_eq!(parse_chat_answer(json!("{\"answer\": \"encoded\"}")), "encoded");
        assert_eq!(parse_chat_answer(json!("plain words")), "plain words");
        assert_eq!(parse_chat_answer(Value::Null), "");
    }

    #[test]
    fn test_chat_entry_wire_shape() {
        let entry = ChatEntry {
            sender: Sender::User,
            message: "hi".into(),
        };
        assert_eq!(serde_json::to_value(&entry).unwrap(), json!({"sender": "user", "message": "hi"}));
    }

    // -----------------------------------------------------------------------
    // Errors
    // -----------------------------------------------------------------------

    #[test]
    fn test_error_payload_string() {
        assert_eq!(
            ErrorPayload::from_value(json!("Invalid Kaltura session")),
            ErrorPayload::Message("Invalid Kaltura session".into())
        );
    }

    #[test]
    fn test_error_payload_map_stringifies_values() {
        let payload = ErrorPayload::from_value(json!({"code": 401, "reason": "expired"}));
        assert_eq!(
            payload,
            ErrorPayload::Fields(vec![
                ("code".into(), "401".into()),
                ("reason".into(), "expired".into())
            ])
        );
    }

    #[test]
    fn test_error_payload_other_json_is_message() {
        assert_eq!(
            ErrorPayload::from_value(json!([1, 2])),
            ErrorPayload::Message("[1,2]".into())
        );
    }
}

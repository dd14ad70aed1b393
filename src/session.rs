//! Accumulated results of one page session.
//!
//! Mutated only by the router; read by the client when it builds
//! `ask_question` and `generate_followup_questions` payloads. Nothing is
//! evicted and nothing outlives the session.

use crate::model::{ChatEntry, CompletedPayload, Sender, Transcripts, VideoEntry, VideoSummary};

/// The context sent alongside a new chat question.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatContext {
    pub analysis_results: Vec<VideoSummary>,
    pub transcripts: Transcripts,
    pub chat_history: Vec<ChatEntry>,
}

#[derive(Debug, Default)]
pub struct SessionState {
    session_id: String,
    videos: Vec<VideoEntry>,
    analysis_results: Vec<VideoSummary>,
    transcripts: Transcripts,
    chat_history: Vec<ChatEntry>,
    followup_questions: Vec<String>,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            ..Default::default()
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn record_videos(&mut self, videos: Vec<VideoEntry>) {
        self.videos = videos;
    }

    /// Replace the analysis context with a new completion.
    ///
    /// Transcripts are merged by entry id so an earlier analysis's captions
    /// stay available when a later run covers different videos.
    pub fn record_completion(&mut self, results: Vec<VideoSummary>, transcripts: Transcripts) {
        self.analysis_results = results;
        self.transcripts.extend(transcripts);
    }

    pub fn record_completed_payload(&mut self, payload: &CompletedPayload) {
        self.record_completion(
            payload.individual_results.clone(),
            payload.transcripts.clone(),
        );
    }

    pub fn record_chat_exchange(&mut self, sender: Sender, message: impl Into<String>) {
        self.chat_history.push(ChatEntry {
            sender,
            message: message.into(),
        });
    }

    pub fn record_followups(&mut self, questions: Vec<String>) {
        self.followup_questions = questions;
    }

    pub fn build_chat_context(&self) -> ChatContext {
        ChatContext {
            analysis_results: self.analysis_results.clone(),
            transcripts: self.transcripts.clone(),
            chat_history: self.chat_history.clone(),
        }
    }

    pub fn videos(&self) -> &[VideoEntry] {
        &self.videos
    }

    pub fn analysis_results(&self) -> &[VideoSummary] {
        &self.analysis_results
    }

    pub fn transcripts(&self) -> &Transcripts {
        &self.transcripts
    }

    pub fn chat_history(&self) -> &[ChatEntry] {
        &self.chat_history
    }

    pub fn followup_questions(&self) -> &[String] {
        &self.followup_questions
    }

    /// Follow-up chip `index` (0-based), if one was offered.
    pub fn followup(&self, index: usize) -> Option<&str> {
        self.followup_questions.get(index).map(String::as_str)
    }

    pub fn has_analysis(&self) -> bool {
        !self.analysis_results.is_empty()
    }
}

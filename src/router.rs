//! Inbound stage dispatch.
//!
//! Each inbound [`Stage`] maps to one handler. Handlers update the session,
//! call the view renderer and release busy affordances. Progress stages only
//! render; `videos`, `completed` and `error` reset the visible panel set. Work that
//! needs the socket (follow-up generation after `completed`) comes back as an
//! [`Effect`] for the caller to run.

use tracing::{debug, info, warn};

use crate::correlator::{Lane, RequestCorrelator};
use crate::markup::{self, Block};
use crate::model::{
    parse_chat_answer, parse_followups, parse_insights, parse_summary, parse_videos,
    ChunkProgress, CompletedPayload, ErrorPayload, Sender,
};
use crate::protocol::{Action, InboundMessage, Stage};
use crate::session::SessionState;
use crate::view::{exclusive_reveal, InsightsView, Panel, Severity, Status, Thumbnails, ViewRenderer};

/// Where the analysis flow is. Logged on each transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnalysisPhase {
    #[default]
    Idle,
    Searching,
    VideosShown,
    Analyzing,
    Completed,
    Errored,
}

/// Where the chat flow is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChatPhase {
    #[default]
    Unavailable,
    AwaitingFollowups,
    Ready,
    AwaitingAnswer,
    Failed,
}

/// Follow-on work requested by a handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Send `generate_followup_questions` with the session transcripts.
    RequestFollowups,
}

#[derive(Debug)]
pub struct MessageRouter {
    thumbnails: Thumbnails,
    analysis: AnalysisPhase,
    chat: ChatPhase,
    selected: usize,
}

impl MessageRouter {
    pub fn new(thumbnails: Thumbnails) -> Self {
        Self {
            thumbnails,
            analysis: AnalysisPhase::default(),
            chat: ChatPhase::default(),
            selected: 0,
        }
    }

    pub fn analysis_phase(&self) -> AnalysisPhase {
        self.analysis
    }

    pub fn chat_phase(&self) -> ChatPhase {
        self.chat
    }

    pub fn selected_result(&self) -> usize {
        self.selected
    }

    fn set_analysis(&mut self, next: AnalysisPhase) {
        if self.analysis != next {
            debug!(from = ?self.analysis, to = ?next, "analysis phase");
            self.analysis = next;
        }
    }

    fn set_chat(&mut self, next: ChatPhase) {
        if self.chat != next {
            debug!(from = ?self.chat, to = ?next, "chat phase");
            self.chat = next;
        }
    }

    /// Record that a request for `action` went out.
    pub fn note_request(&mut self, action: Action) {
        match action {
            Action::GetVideos => self.set_analysis(AnalysisPhase::Searching),
            Action::AnalyzeVideos => self.set_analysis(AnalysisPhase::Analyzing),
            Action::GenerateFollowupQuestions => self.set_chat(ChatPhase::AwaitingFollowups),
            Action::AskQuestion => self.set_chat(ChatPhase::AwaitingAnswer),
        }
    }

    /// Echo a sent question into the transcript and the chat history.
    pub fn question_sent(
        &mut self,
        question: &str,
        session: &mut SessionState,
        view: &mut dyn ViewRenderer,
    ) {
        view.append_chat(Sender::User, &[Block::Paragraph(question.to_string())]);
        session.record_chat_exchange(Sender::User, question);
    }

    /// Switch the per-video results tab.
    pub fn select_result(
        &mut self,
        index: usize,
        session: &SessionState,
        view: &mut dyn ViewRenderer,
    ) -> bool {
        let results = session.analysis_results();
        if index >= results.len() {
            return false;
        }
        self.selected = index;
        view.render_results(&self.thumbnails.results_view(results, index));
        true
    }

    /// Dispatch one inbound message.
    pub fn route(
        &mut self,
        msg: InboundMessage,
        session: &mut SessionState,
        correlator: &mut RequestCorrelator,
        view: &mut dyn ViewRenderer,
    ) -> Vec<Effect> {
        debug!(stage = %msg.stage, request_id = ?msg.request_id, "inbound");
        match msg.stage {
            Stage::Videos => self.on_videos(msg, session, correlator, view),
            Stage::ChunkProgress => self.on_chunk_progress(msg, view),
            Stage::CombinedSummary => {
                view.render_combined_summary(&parse_summary(msg.data));
            }
            Stage::CrossVideoInsights => match parse_insights(msg.data) {
                Ok(insights) => view.render_cross_video_progress(&InsightsView::from(&insights)),
                Err(e) => warn!(error = %e, "malformed cross_video_insights payload"),
            },
            Stage::Completed => return self.on_completed(msg, session, correlator, view),
            Stage::FollowupQuestions => {
                let questions = parse_followups(msg.data);
                info!(count = questions.len(), "follow-up questions received");
                view.render_followups(&questions);
                session.record_followups(questions);
                self.set_chat(ChatPhase::Ready);
            }
            Stage::ChatResponse => {
                let answer = parse_chat_answer(msg.data);
                view.append_chat(Sender::Assistant, &markup::parse(&answer));
                session.record_chat_exchange(Sender::Assistant, answer);
                correlator.resolve_lane(Lane::Chat, view);
                self.set_chat(ChatPhase::Ready);
            }
            Stage::Error => self.on_error(msg, correlator, view),
            Stage::Unknown(stage) => {
                warn!(%stage, "unknown stage ignored");
            }
        }
        Vec::new()
    }

    fn on_videos(
        &mut self,
        msg: InboundMessage,
        session: &mut SessionState,
        correlator: &mut RequestCorrelator,
        view: &mut dyn ViewRenderer,
    ) {
        correlator.resolve_lane(Lane::Analysis, view);
        match parse_videos(msg.data) {
            Ok(videos) => {
                info!(count = videos.len(), "videos received");
                let cards: Vec<_> = videos.iter().map(|v| self.thumbnails.video_card(v)).collect();
                view.render_videos(&cards);
                exclusive_reveal(view, &[Panel::Videos]);
                session.record_videos(videos);
                self.set_analysis(AnalysisPhase::VideosShown);
            }
            Err(e) => {
                warn!(error = %e, "malformed videos payload");
                self.fail(
                    ErrorPayload::Message(format!("Could not read video list: {e}")),
                    view,
                );
            }
        }
    }

    fn on_chunk_progress(&mut self, msg: InboundMessage, view: &mut dyn ViewRenderer) {
        match serde_json::from_value::<ChunkProgress>(msg.data) {
            Ok(progress) => {
                debug!(
                    video_id = %progress.video_id,
                    chunk = progress.chunk_index,
                    of = progress.total_chunks,
                    "chunk progress"
                );
                view.render_chunk_progress(&progress);
            }
            Err(e) => warn!(error = %e, "malformed chunk_progress payload"),
        }
    }

    fn on_completed(
        &mut self,
        msg: InboundMessage,
        session: &mut SessionState,
        correlator: &mut RequestCorrelator,
        view: &mut dyn ViewRenderer,
    ) -> Vec<Effect> {
        correlator.resolve_lane(Lane::Analysis, view);
        let payload: CompletedPayload = match serde_json::from_value(msg.data) {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "malformed completed payload");
                self.fail(
                    ErrorPayload::Message(format!("Could not read analysis results: {e}")),
                    view,
                );
                return Vec::new();
            }
        };
        info!(
            results = payload.individual_results.len(),
            transcripts = payload.transcripts.len(),
            cross_video = payload.cross_video_insights.is_some(),
            "analysis completed"
        );

        session.record_completed_payload(&payload);
        self.selected = 0;
        view.render_results(&self.thumbnails.results_view(session.analysis_results(), 0));

        let mut visible = vec![Panel::IndividualResults];
        if let Some(insights) = &payload.cross_video_insights {
            view.render_cross_video_insights(&InsightsView::from(insights));
            visible.push(Panel::CrossVideoInsights);
        }
        visible.push(Panel::Chat);
        exclusive_reveal(view, &visible);
        view.show_status(&Status::new("Analysis complete", Severity::Success));

        self.set_analysis(AnalysisPhase::Completed);
        self.set_chat(ChatPhase::AwaitingFollowups);
        vec![Effect::RequestFollowups]
    }

    fn on_error(
        &mut self,
        msg: InboundMessage,
        correlator: &mut RequestCorrelator,
        view: &mut dyn ViewRenderer,
    ) {
        let matched = msg
            .request_id
            .as_deref()
            .and_then(|id| correlator.resolve_request(id, view));
        let chat_only = match &matched {
            Some(pending) => Lane::of(pending.action) == Lane::Chat,
            None => {
                correlator.resolve_all(view);
                false
            }
        };
        let payload = ErrorPayload::from_value(msg.data);
        warn!(error = ?payload, request_id = ?msg.request_id, "server error");

        if chat_only {
            self.set_chat(ChatPhase::Failed);
            view.render_errors(&payload);
            exclusive_reveal(view, &[Panel::Errors]);
        } else {
            self.fail(payload, view);
        }
    }

    fn fail(&mut self, payload: ErrorPayload, view: &mut dyn ViewRenderer) {
        view.render_errors(&payload);
        exclusive_reveal(view, &[Panel::Errors]);
        self.set_analysis(AnalysisPhase::Errored);
    }
}

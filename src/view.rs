//! The view renderer seam.
//!
//! The core never builds markup. It hands structured view models to a
//! [`ViewRenderer`] and toggles panels and busy states through it. Two
//! renderers ship with the crate: [`RecordingView`] (in-memory, used for
//! headless sessions and tests) and `TerminalView` in [`crate::terminal`].

use std::collections::BTreeSet;

use serde::Serialize;

use crate::markup::Block;
use crate::model::{
    ChunkProgress, CrossVideoInsights, ErrorPayload, Sender, SummaryUpdate, VideoEntry,
    VideoSummary,
};

// ---------------------------------------------------------------------------
// Status and affordances
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Progress,
    Success,
    Danger,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Status {
    pub message: String,
    pub severity: Severity,
}

impl Status {
    pub fn new(message: impl Into<String>, severity: Severity) -> Self {
        Self {
            message: message.into(),
            severity,
        }
    }
}

/// Label shown on an affordance while its request is in flight.
pub const WAITING_LABEL: &str = "Please wait…";

/// An interactive control whose busy/idle state tracks one request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Affordance {
    pub id: String,
    /// Idle label, restored when the request resolves.
    pub label: String,
}

impl Affordance {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Panels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Panel {
    Videos,
    IndividualResults,
    CrossVideoInsights,
    Errors,
    Chat,
}

impl Panel {
    pub const ALL: [Panel; 5] = [
        Panel::Videos,
        Panel::IndividualResults,
        Panel::CrossVideoInsights,
        Panel::Errors,
        Panel::Chat,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            Panel::Videos => "videos-card",
            Panel::IndividualResults => "individual-videos-analysis-results",
            Panel::CrossVideoInsights => "cross-video-insights-card",
            Panel::Errors => "errors-card",
            Panel::Chat => "chat-card",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Panel::Videos => "Videos",
            Panel::IndividualResults => "Individual Video Analysis",
            Panel::CrossVideoInsights => "Cross Video Insights",
            Panel::Errors => "Errors",
            Panel::Chat => "Chat",
        }
    }
}

// ---------------------------------------------------------------------------
// View models
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoCard {
    pub entry_id: String,
    pub name: String,
    pub description: String,
    pub reference_id: String,
    pub thumbnail_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionView {
    pub thumbnail_url: String,
    pub title: String,
    pub summary: String,
    pub start_sentence: String,
    pub start_time: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultView {
    pub entry_id: String,
    pub full_summary: String,
    pub sections: Vec<SectionView>,
    /// (text, HH:MM:SS)
    pub insights: Vec<(String, String)>,
    pub people: Vec<String>,
    pub primary_topics: Vec<String>,
}

/// Per-video results with a tab per entry id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultsView {
    pub tabs: Vec<String>,
    pub selected: usize,
    pub current: Option<ResultView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InsightsView {
    pub sections: Vec<(String, Vec<String>)>,
}

impl From<&CrossVideoInsights> for InsightsView {
    fn from(insights: &CrossVideoInsights) -> Self {
        Self {
            sections: insights
                .sections()
                .into_iter()
                .map(|(label, items)| (label.to_string(), items.to_vec()))
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// URL and time helpers
// ---------------------------------------------------------------------------

/// `HH:MM:SS`, zero-padded; hours are not wrapped.
pub fn format_time(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}

/// Builds thumbnail URLs for one partner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thumbnails {
    base: String,
    partner_id: String,
}

impl Thumbnails {
    pub fn new(base: impl Into<String>, partner_id: impl Into<String>) -> Self {
        Self {
            base: base.into().trim_end_matches('/').to_string(),
            partner_id: partner_id.into(),
        }
    }

    pub fn url(&self, entry_id: &str, time_seconds: u64) -> String {
        let pid = &self.partner_id;
        format!(
            "{base}/p/{pid}/sp/{pid}00/thumbnail/entry_id/{entry_id}/width/80/type/2/bgcolor/000000?time={time_seconds}",
            base = self.base,
        )
    }

    pub fn video_card(&self, video: &VideoEntry) -> VideoCard {
        VideoCard {
            entry_id: video.entry_id.clone(),
            name: video.entry_name.clone(),
            description: video.entry_description.clone(),
            reference_id: video.entry_reference_id.clone(),
            thumbnail_url: self.url(&video.entry_id, 0),
        }
    }

    pub fn result_view(&self, result: &VideoSummary) -> ResultView {
        ResultView {
            entry_id: result.entry_id.clone(),
            full_summary: result.full_summary.clone(),
            sections: result
                .sections
                .iter()
                .map(|s| SectionView {
                    thumbnail_url: self.url(&result.entry_id, s.start_time.max(0.0) as u64),
                    title: s.title.clone(),
                    summary: s.summary.clone(),
                    start_sentence: s.start_sentence.clone(),
                    start_time: format_time(s.start_time),
                })
                .collect(),
            insights: result
                .insights
                .iter()
                .map(|i| (i.text.clone(), format_time(i.start_time)))
                .collect(),
            people: result.people.iter().map(|p| p.name.clone()).collect(),
            primary_topics: result.primary_topics.clone(),
        }
    }

    pub fn results_view(&self, results: &[VideoSummary], selected: usize) -> ResultsView {
        let selected = selected.min(results.len().saturating_sub(1));
        ResultsView {
            tabs: results.iter().map(|r| r.entry_id.clone()).collect(),
            selected,
            current: results.get(selected).map(|r| self.result_view(r)),
        }
    }
}

// ---------------------------------------------------------------------------
// Renderer trait
// ---------------------------------------------------------------------------

/// Everything the core asks of a presentation layer.
pub trait ViewRenderer {
    fn show_status(&mut self, status: &Status);
    fn show_panel(&mut self, panel: Panel);
    fn hide_panel(&mut self, panel: Panel);
    fn set_busy(&mut self, affordance: &Affordance, busy: bool);

    fn render_videos(&mut self, videos: &[VideoCard]);
    fn render_chunk_progress(&mut self, progress: &ChunkProgress);
    fn render_combined_summary(&mut self, summary: &SummaryUpdate);
    fn render_cross_video_progress(&mut self, insights: &InsightsView);
    fn render_results(&mut self, results: &ResultsView);
    fn render_cross_video_insights(&mut self, insights: &InsightsView);
    fn render_errors(&mut self, error: &ErrorPayload);
    fn render_followups(&mut self, questions: &[String]);
    fn append_chat(&mut self, sender: Sender, blocks: &[Block]);
}

/// Hide every panel, then show exactly `visible`.
pub fn exclusive_reveal(view: &mut dyn ViewRenderer, visible: &[Panel]) {
    for panel in Panel::ALL {
        if !visible.contains(&panel) {
            view.hide_panel(panel);
        }
    }
    for panel in visible {
        view.show_panel(*panel);
    }
}

// ---------------------------------------------------------------------------
// RecordingView
// ---------------------------------------------------------------------------

/// One call made on a [`RecordingView`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ViewEvent {
    Status(Status),
    Busy { affordance: String, busy: bool },
    Videos(Vec<VideoCard>),
    ChunkProgress { video_id: String, chunk_index: u32, total_chunks: u32 },
    CombinedSummary { entry_id: Option<String> },
    CrossVideoProgress(InsightsView),
    Results(ResultsView),
    CrossVideoInsights(InsightsView),
    Errors(Vec<String>),
    Followups(Vec<String>),
    Chat { sender: Sender, blocks: Vec<Block> },
}

/// In-memory renderer that records calls and tracks visible panels and busy
/// affordances.
#[derive(Debug, Default)]
pub struct RecordingView {
    pub events: Vec<ViewEvent>,
    visible: BTreeSet<Panel>,
    busy: BTreeSet<String>,
}

impl RecordingView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn visible_panels(&self) -> Vec<Panel> {
        self.visible.iter().copied().collect()
    }

    pub fn is_visible(&self, panel: Panel) -> bool {
        self.visible.contains(&panel)
    }

    pub fn is_busy(&self, affordance_id: &str) -> bool {
        self.busy.contains(affordance_id)
    }

    pub fn busy_count(&self) -> usize {
        self.busy.len()
    }

    pub fn statuses(&self) -> Vec<&Status> {
        self.events
            .iter()
            .filter_map(|e| match e {
                ViewEvent::Status(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    pub fn last_status(&self) -> Option<&Status> {
        self.statuses().pop()
    }
}

impl ViewRenderer for RecordingView {
    fn show_status(&mut self, status: &Status) {
        self.events.push(ViewEvent::Status(status.clone()));
    }

    fn show_panel(&mut self, panel: Panel) {
        self.visible.insert(panel);
    }

    fn hide_panel(&mut self, panel: Panel) {
        self.visible.remove(&panel);
    }

    fn set_busy(&mut self, affordance: &Affordance, busy: bool) {
        if busy {
            self.busy.insert(affordance.id.clone());
        } else {
            self.busy.remove(&affordance.id);
        }
        self.events.push(ViewEvent::Busy {
            affordance: affordance.id.clone(),
            busy,
        });
    }

    fn render_videos(&mut self, videos: &[VideoCard]) {
        self.events.push(ViewEvent::Videos(videos.to_vec()));
    }

    fn render_chunk_progress(&mut self, progress: &ChunkProgress) {
        self.events.push(ViewEvent::ChunkProgress {
            video_id: progress.video_id.clone(),
            chunk_index: progress.chunk_index,
            total_chunks: progress.total_chunks,
        });
    }

    fn render_combined_summary(&mut self, summary: &SummaryUpdate) {
        let entry_id = match summary {
            SummaryUpdate::Parsed(s) => Some(s.entry_id.clone()),
            SummaryUpdate::Raw(_) => None,
        };
        self.events.push(ViewEvent::CombinedSummary { entry_id });
    }

    fn render_cross_video_progress(&mut self, insights: &InsightsView) {
        self.events.push(ViewEvent::CrossVideoProgress(insights.clone()));
    }

    fn render_results(&mut self, results: &ResultsView) {
        self.events.push(ViewEvent::Results(results.clone()));
    }

    fn render_cross_video_insights(&mut self, insights: &InsightsView) {
        self.events.push(ViewEvent::CrossVideoInsights(insights.clone()));
    }

    fn render_errors(&mut self, error: &ErrorPayload) {
        let lines = match error {
            ErrorPayload::Message(m) => vec![m.clone()],
            ErrorPayload::Fields(fields) => fields.iter().map(|(k, v)| format!("{k}: {v}")).collect(),
        };
        self.events.push(ViewEvent::Errors(lines));
    }

    fn render_followups(&mut self, questions: &[String]) {
        self.events.push(ViewEvent::Followups(questions.to_vec()));
    }

    fn append_chat(&mut self, sender: Sender, blocks: &[Block]) {
        self.events.push(ViewEvent::Chat {
            sender,
            blocks: blocks.to_vec(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Insight, Person, Section};

    // -----------------------------------------------------------------------
    // Thumbnails
    // -----------------------------------------------------------------------

    #[test]
    fn test_thumbnail_url_fully_substituted() {
        let thumbs = Thumbnails::new("https://cfvod.kaltura.com", "123");
        let url = thumbs.url("abc", 5);
        assert_eq!(
            url,
            "https://cfvod.kaltura.com/p/123/sp/12300/thumbnail/entry_id/abc/width/80/type/2/bgcolor/000000?time=5"
        );
        assert!(!url.contains('{') && !url.contains('}') && !url.contains('$'));
    }

    #[test]
    fn test_thumbnail_base_trailing_slash_trimmed() {
        let thumbs = Thumbnails::new("https://cdn.example/", "9");
        assert!(thumbs.url("e", 0).starts_with("https://cdn.example/p/9/"));
    }

    // -----------------------------------------------------------------------
    // Time formatting
    // -----------------------------------------------------------------------

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(0.0), "00:00:00");
        assert_eq!(format_time(5.0), "00:00:05");
        assert_eq!(format_time(3725.9), "01:02:05");
        assert_eq!(format_time(360_000.0), "100:00:00");
    }

    #[test]
    fn test_format_time_negative_and_nan_clamp() {
        assert_eq!(format_time(-3.0), "00:00:00");
        assert_eq!(format_time(f64::NAN), "00:00:00");
    }

    // -----------------------------------------------------------------------
    // View models
    // -----------------------------------------------------------------------

    fn sample_summary() -> VideoSummary {
        VideoSummary {
            entry_id: "1_x".into(),
            full_summary: "Quarterly review".into(),
            sections: vec![Section {
                title: "Intro".into(),
                summary: "Welcome".into(),
                start_sentence: "Hello all".into(),
                start_time: 65.0,
            }],
            insights: vec![Insight {
                text: "Revenue up".into(),
                start_time: 130.0,
            }],
            people: vec![Person { name: "Dana".into() }],
            primary_topics: vec!["finance".into()],
        }
    }

    #[test]
    fn test_result_view_formats_sections() {
        let thumbs = Thumbnails::new("https://t", "7");
        let view = thumbs.result_view(&sample_summary());
        assert_eq!(view.sections[0].start_time, "00:01:05");
        assert!(view.sections[0].thumbnail_url.ends_with("entry_id/1_x/width/80/type/2/bgcolor/000000?time=65"));
        assert_eq!(view.insights, vec![("Revenue up".to_string(), "00:02:10".to_string())]);
        assert_eq!(view.people, vec!["Dana"]);
    }

    #[test]
    fn test_results_view_selects_first_by_default() {
        let thumbs = Thumbnails::new("https://t", "7");
        let mut second = sample_summary();
        second.entry_id = "1_y".into();
        let view = thumbs.results_view(&[sample_summary(), second], 0);
        assert_eq!(view.tabs, vec!["1_x", "1_y"]);
        assert_eq!(view.current.unwrap().entry_id, "1_x");
    }

    #[test]
    fn test_results_view_clamps_selection() {
        let thumbs = Thumbnails::new("https://t", "7");
        let view = thumbs.results_view(&[sample_summary()], 9);
        assert_eq!(view.selected, 0);
        let empty = thumbs.results_view(&[], 0);
        assert!(empty.current.is_none());
    }

    // -----------------------------------------------------------------------
    // Exclusive reveal
    // -----------------------------------------------------------------------

    #[test]
    fn test_exclusive_reveal_is_idempotent() {
        let mut view = RecordingView::new();
        view.show_panel(Panel::Errors);
        view.show_panel(Panel::Videos);
        exclusive_reveal(&mut view, &[Panel::IndividualResults, Panel::Chat]);
        let first = view.visible_panels();
        exclusive_reveal(&mut view, &[Panel::IndividualResults, Panel::Chat]);
        assert_eq!(view.visible_panels(), first);
        assert_eq!(first, vec![Panel::IndividualResults, Panel::Chat]);
    }

    #[test]
    fn test_panel_ids_unique() {
        let ids: BTreeSet<&str> = Panel::ALL.iter().map(|p| p.id()).collect();
        assert_eq!(ids.len(), Panel::ALL.len());
    }
}

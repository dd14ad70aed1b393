//! Stage dispatch behaviour, driven through the public router API.

use serde_json::{json, Value};
use vidbot_client::correlator::{AffordancePolicy, Lane, RequestCorrelator};
use vidbot_client::credentials::PageParams;
use vidbot_client::markup::{self, Block};
use vidbot_client::protocol::{InboundMessage, Stage};
use vidbot_client::router::{Effect, MessageRouter};
use vidbot_client::session::SessionState;
use vidbot_client::view::{Panel, RecordingView, Thumbnails, ViewEvent};

struct Harness {
    router: MessageRouter,
    session: SessionState,
    correlator: RequestCorrelator,
    view: RecordingView,
}

impl Harness {
    fn new() -> Self {
        Self {
            router: MessageRouter::new(Thumbnails::new("https://cfvod.kaltura.com", "123")),
            session: SessionState::new(),
            correlator: RequestCorrelator::new(
                PageParams::from_query("pid=123&ks=k"),
                AffordancePolicy::PerLane,
                None,
            ),
            view: RecordingView::new(),
        }
    }

    fn route(&mut self, stage: &str, data: Value) -> Vec<Effect> {
        self.router.route(
            InboundMessage::new(Stage::parse(stage), data),
            &mut self.session,
            &mut self.correlator,
            &mut self.view,
        )
    }
}

fn completed(insights: Value) -> Value {
    json!({
        "individual_results": [
            {"entry_id": "1_a", "full_summary": "A", "sections": [{"title": "t", "start_time": 5}]},
            {"entry_id": "1_b", "full_summary": "B"}
        ],
        "transcripts": {"1_a": [{"text": "hello"}]},
        "cross_video_insights": insights
    })
}

// ---------------------------------------------------------------------------
// Unknown stages
// ---------------------------------------------------------------------------

#[test]
fn test_unknown_stage_changes_nothing() {
    let mut h = Harness::new();
    h.route("completed", completed(Value::Null));
    let panels = h.view.visible_panels();
    let events = h.view.events.len();
    let results = h.session.analysis_results().to_vec();

    let effects = h.route("transcoding", json!({"pct": 50}));
    assert!(effects.is_empty());
    assert_eq!(h.view.visible_panels(), panels);
    assert_eq!(h.view.events.len(), events);
    assert_eq!(h.session.analysis_results(), results.as_slice());
}

#[test]
fn test_unknown_stage_with_garbage_data() {
    let mut h = Harness::new();
    h.route("", json!([1, "x", null]));
    assert!(h.view.events.is_empty());
    assert!(h.view.visible_panels().is_empty());
}

// ---------------------------------------------------------------------------
// Completed: exclusive reveal
// ---------------------------------------------------------------------------

#[test]
fn test_completed_reveals_final_panels_regardless_of_prior_state() {
    for prior in [
        vec![],
        vec![Panel::Videos],
        vec![Panel::Errors, Panel::Videos],
        Panel::ALL.to_vec(),
    ] {
        let mut h = Harness::new();
        for p in prior {
            vidbot_client::view::ViewRenderer::show_panel(&mut h.view, p);
        }
        h.route("completed", completed(json!({"shared_insights": ["x"]})));
        assert_eq!(
            h.view.visible_panels(),
            vec![Panel::IndividualResults, Panel::CrossVideoInsights, Panel::Chat]
        );
    }
}

#[test]
fn test_completed_twice_is_idempotent() {
    let mut h = Harness::new();
    h.route("completed", completed(json!({})));
    let first = h.view.visible_panels();
    h.route("completed", completed(json!({})));
    assert_eq!(h.view.visible_panels(), first);
}

#[test]
fn test_completed_records_session_and_requests_followups() {
    let mut h = Harness::new();
    let effects = h.route("completed", completed(Value::Null));
    assert_eq!(effects, vec![Effect::RequestFollowups]);
    assert_eq!(h.session.analysis_results().len(), 2);
    assert!(h.session.transcripts().contains_key("1_a"));
}

#[test]
fn test_completed_selects_first_result() {
    let mut h = Harness::new();
    h.route("completed", completed(Value::Null));
    let results = h.view.events.iter().find_map(|e| match e {
        ViewEvent::Results(r) => Some(r.clone()),
        _ => None,
    });
    let results = results.unwrap();
    assert_eq!(results.tabs, vec!["1_a", "1_b"]);
    assert_eq!(results.current.unwrap().sections[0].start_time, "00:00:05");
}

#[test]
fn test_select_result_switches_tab() {
    let mut h = Harness::new();
    h.route("completed", completed(Value::Null));
    assert!(h.router.select_result(1, &h.session, &mut h.view));
    match h.view.events.last() {
        Some(ViewEvent::Results(r)) => assert_eq!(r.current.as_ref().unwrap().entry_id, "1_b"),
        other => panic!("expected results, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Cross-video insights panel
// ---------------------------------------------------------------------------

#[test]
fn test_null_insights_hide_panel() {
    let mut h = Harness::new();
    vidbot_client::view::ViewRenderer::show_panel(&mut h.view, Panel::CrossVideoInsights);
    h.route("completed", completed(Value::Null));
    assert!(!h.view.is_visible(Panel::CrossVideoInsights));
}

#[test]
fn test_missing_insights_key_hides_panel() {
    let mut h = Harness::new();
    h.route(
        "completed",
        json!({"individual_results": [], "transcripts": {}}),
    );
    assert!(!h.view.is_visible(Panel::CrossVideoInsights));
}

#[test]
fn test_empty_insights_object_shows_panel_without_sections() {
    let mut h = Harness::new();
    h.route(
        "completed",
        completed(json!({
            "shared_insights": [],
            "common_themes": [],
            "opposing_views": [],
            "sentiments": []
        })),
    );
    assert!(h.view.is_visible(Panel::CrossVideoInsights));
    let rendered = h.view.events.iter().find_map(|e| match e {
        ViewEvent::CrossVideoInsights(v) => Some(v.clone()),
        _ => None,
    });
    assert!(rendered.unwrap().sections.is_empty());
}

#[test]
fn test_partial_insights_render_only_present_sections() {
    let mut h = Harness::new();
    h.route(
        "completed",
        completed(json!({"common_themes": ["pricing"], "sentiments": ["positive"]})),
    );
    let rendered = h.view.events.iter().find_map(|e| match e {
        ViewEvent::CrossVideoInsights(v) => Some(v.clone()),
        _ => None,
    });
    let labels: Vec<String> = rendered.unwrap().sections.into_iter().map(|(l, _)| l).collect();
    assert_eq!(labels, vec!["Common Themes", "Sentiments"]);
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[test]
fn test_error_reveals_only_errors_panel() {
    let mut h = Harness::new();
    h.route("completed", completed(json!({})));
    h.route("error", json!({"detail": "boom"}));
    assert_eq!(h.view.visible_panels(), vec![Panel::Errors]);
    assert!(h
        .view
        .events
        .contains(&ViewEvent::Errors(vec!["detail: boom".into()])));
}

#[test]
fn test_progress_does_not_reopen_panels_after_error() {
    let mut h = Harness::new();
    h.route("error", json!("bad ks"));
    h.route("chunk_progress", json!({"video_id": "v", "chunk_index": 0, "total_chunks": 2}));
    assert_eq!(h.view.visible_panels(), vec![Panel::Errors]);
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

#[test]
fn test_chat_answer_blocks() {
    let mut h = Harness::new();
    h.route(
        "chat_response",
        json!({"answer": "1. First\n2. Second\n\nParagraph."}),
    );
    let blocks = h.view.events.iter().find_map(|e| match e {
        ViewEvent::Chat { blocks, .. } => Some(blocks.clone()),
        _ => None,
    });
    assert_eq!(
        blocks.unwrap(),
        vec![
            Block::OrderedList(vec!["First".into(), "Second".into()]),
            Block::Paragraph("Paragraph.".into()),
        ]
    );
}

#[test]
fn test_markup_unordered_and_mixed() {
    assert_eq!(
        markup::parse("* A\n* B"),
        vec![Block::UnorderedList(vec!["A".into(), "B".into()])]
    );
    assert_eq!(
        markup::parse("1. A\n* B"),
        vec![
            Block::OrderedList(vec!["A".into()]),
            Block::UnorderedList(vec!["B".into()]),
        ]
    );
}

#[test]
fn test_answer_alias_routes_to_chat() {
    let mut h = Harness::new();
    h.route("answer", json!("{\"answer\": \"ok\"}"));
    assert_eq!(h.session.chat_history()[0].message, "ok");
    assert!(h.correlator.pending(Lane::Chat).is_none());
}

#[test]
fn test_followups_recorded() {
    let mut h = Harness::new();
    h.route("followup_questions", json!({"questions": [{"question": "Who spoke?"}]}));
    assert_eq!(h.session.followup(0), Some("Who spoke?"));
    assert!(h
        .view
        .events
        .contains(&ViewEvent::Followups(vec!["Who spoke?".into()])));
}

// ---------------------------------------------------------------------------
// Thumbnails
// ---------------------------------------------------------------------------

#[test]
fn test_video_cards_carry_thumbnail_urls() {
    let mut h = Harness::new();
    h.route("videos", json!([{"entry_id": "abc", "entry_name": "Demo"}]));
    match h.view.events.iter().find(|e| matches!(e, ViewEvent::Videos(_))) {
        Some(ViewEvent::Videos(cards)) => assert_eq!(
            cards[0].thumbnail_url,
            "https://cfvod.kaltura.com/p/123/sp/12300/thumbnail/entry_id/abc/width/80/type/2/bgcolor/000000?time=0"
        ),
        other => panic!("expected videos, got {other:?}"),
    }
}

#[test]
fn test_thumbnail_url_has_no_template_leftovers() {
    let url = Thumbnails::new("https://cfvod.kaltura.com", "123").url("abc", 5);
    assert_eq!(
        url,
        "https://cfvod.kaltura.com/p/123/sp/12300/thumbnail/entry_id/abc/width/80/type/2/bgcolor/000000?time=5"
    );
    assert!(!url.contains("${") && !url.contains('{'));
}

// ---------------------------------------------------------------------------
// Robustness
// ---------------------------------------------------------------------------

proptest::proptest! {
    #[test]
    fn prop_route_never_panics(stage in "[a-z_]{0,24}", text in ".{0,200}") {
        let mut h = Harness::new();
        let _ = h.route(&stage, Value::String(text.clone()));
        let _ = h.route(&stage, json!({"answer": text, "questions": [text]}));
    }

    #[test]
    fn prop_unknown_stage_is_inert(stage in "x[a-z_]{0,16}", n in 0i64..1000) {
        let mut h = Harness::new();
        h.route(&stage, json!({"n": n}));
        proptest::prop_assert!(h.view.events.is_empty());
        proptest::prop_assert!(h.session.chat_history().is_empty());
    }
}

// ---------------------------------------------------------------------------
// Videos: exclusive reveal
// ---------------------------------------------------------------------------

#[test]
fn test_videos_reveals_only_videos_panel() {
    let mut h = Harness::new();
    vidbot_client::view::ViewRenderer::show_panel(&mut h.view, Panel::Errors);
    vidbot_client::view::ViewRenderer::show_panel(&mut h.view, Panel::IndividualResults);
    h.route("videos", json!([{"entry_id": "1_a"}]));
    assert_eq!(h.view.visible_panels(), vec![Panel::Videos]);
}

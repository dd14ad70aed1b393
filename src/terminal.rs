//! Colored line-oriented renderer for the `vidbot` binary.

use std::fmt::Display;
use std::io::{self, Write};

use colored::*;
use tracing::debug;

use crate::markup::Block;
use crate::model::{ChunkProgress, ErrorPayload, Sender, SummaryUpdate};
use crate::view::{
    Affordance, InsightsView, Panel, ResultsView, Severity, Status, VideoCard, ViewRenderer,
    WAITING_LABEL,
};

pub struct TerminalView<W: Write> {
    out: W,
}

impl TerminalView<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> TerminalView<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, text: impl Display) {
        if let Err(e) = writeln!(self.out, "{text}") {
            debug!(error = %e, "terminal write failed");
        }
    }

    fn heading(&mut self, title: &str) {
        self.line(format!("{}", "=".repeat(50).bright_blue()));
        self.line(title.bright_cyan().bold());
    }

    fn list(&mut self, label: &str, items: &[String]) {
        if items.is_empty() {
            return;
        }
        self.line(label.bright_yellow());
        for item in items {
            self.line(format!("  - {item}"));
        }
    }
}

impl<W: Write> ViewRenderer for TerminalView<W> {
    fn show_status(&mut self, status: &Status) {
        let text = match status.severity {
            Severity::Progress => status.message.bright_white(),
            Severity::Success => status.message.bright_green(),
            Severity::Danger => status.message.bright_red().bold(),
        };
        self.line(format!("[{}] {text}", "status".dimmed()));
    }

    fn show_panel(&mut self, panel: Panel) {
        debug!(panel = panel.id(), "show panel");
    }

    fn hide_panel(&mut self, panel: Panel) {
        debug!(panel = panel.id(), "hide panel");
    }

    fn set_busy(&mut self, affordance: &Affordance, busy: bool) {
        if busy {
            self.line(format!("{} {}", affordance.label.bright_magenta(), WAITING_LABEL.dimmed()));
        } else {
            debug!(affordance = %affordance.id, "affordance idle");
        }
    }

    fn render_videos(&mut self, videos: &[VideoCard]) {
        self.heading(Panel::Videos.title());
        if videos.is_empty() {
            self.line("no videos found".dimmed());
        }
        for video in videos {
            self.line(format!("{}  {}", video.entry_id.bright_white().bold(), video.name));
            if !video.description.is_empty() {
                self.line(format!("    {}", video.description.dimmed()));
            }
        }
    }

    fn render_chunk_progress(&mut self, progress: &ChunkProgress) {
        self.line(format!(
            "{} {} chunk {}/{}",
            "analyzing".bright_magenta(),
            progress.video_id,
            progress.chunk_index,
            progress.total_chunks
        ));
    }

    fn render_combined_summary(&mut self, summary: &SummaryUpdate) {
        match summary {
            SummaryUpdate::Parsed(s) => self.line(format!(
                "{} {}: {}",
                "summary".bright_green(),
                s.entry_id,
                s.full_summary
            )),
            SummaryUpdate::Raw(text) => self.line(format!("{} {text}", "summary".bright_green())),
        }
    }

    fn render_cross_video_progress(&mut self, insights: &InsightsView) {
        self.line("cross-video insights ready".bright_green());
        debug!(sections = insights.sections.len(), "cross-video progress");
    }

    fn render_results(&mut self, results: &ResultsView) {
        self.heading(Panel::IndividualResults.title());
        let tabs: Vec<String> = results
            .tabs
            .iter()
            .enumerate()
            .map(|(i, id)| {
                let tab = format!("{}:{id}", i + 1);
                if i == results.selected {
                    tab.reversed().to_string()
                } else {
                    tab
                }
            })
            .collect();
        self.line(tabs.join("  "));
        let Some(current) = &results.current else {
            return;
        };
        self.line(current.full_summary.as_str());
        for section in &current.sections {
            self.line(format!(
                "{} {}",
                section.start_time.bright_yellow(),
                section.title.bold()
            ));
            self.line(format!("    {}", section.summary));
        }
        if !current.insights.is_empty() {
            self.line("Insights".bright_yellow());
            for (text, at) in &current.insights {
                self.line(format!("  {} {text}", at.dimmed()));
            }
        }
        self.list("People", &current.people);
        self.list("Topics", &current.primary_topics);
    }

    fn render_cross_video_insights(&mut self, insights: &InsightsView) {
        self.heading(Panel::CrossVideoInsights.title());
        for (label, items) in &insights.sections {
            self.list(label, items);
        }
    }

    fn render_errors(&mut self, error: &ErrorPayload) {
        self.heading(Panel::Errors.title());
        match error {
            ErrorPayload::Message(m) => self.line(m.bright_red()),
            ErrorPayload::Fields(fields) => {
                for (k, v) in fields {
                    self.line(format!("{}: {v}", k.bright_red()));
                }
            }
        }
    }

    fn render_followups(&mut self, questions: &[String]) {
        if questions.is_empty() {
            return;
        }
        self.line("Suggested questions (followup <n>):".bright_yellow());
        for (i, q) in questions.iter().enumerate() {
            self.line(format!("  {}. {q}", i + 1));
        }
    }

    fn append_chat(&mut self, sender: Sender, blocks: &[Block]) {
        let who = match sender {
            Sender::User => "you".bright_white().bold(),
            Sender::Assistant => "bot".bright_cyan().bold(),
        };
        self.line(format!("{who}>"));
        for block in blocks {
            match block {
                Block::Paragraph(text) => self.line(format!("  {text}")),
                Block::OrderedList(items) => {
                    for (i, item) in items.iter().enumerate() {
                        self.line(format!("  {}. {item}", i + 1));
                    }
                }
                Block::UnorderedList(items) => {
                    for item in items {
                        self.line(format!("  • {item}"));
                    }
                }
            }
        }
    }
}

//! The session driver: ties the connection, correlator, router and view
//! together and runs the dispatch loop.

use std::time::{Duration, Instant};

use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::config::ClientConfig;
use crate::connection::{ConnectionEvent, FrameSink};
use crate::correlator::{RequestCorrelator, STATUS_CREDENTIALS_REQUIRED};
use crate::credentials::PageParams;
use crate::error::{ClientError, Result};
use crate::protocol::{decode_frame, Inbound, Payload};
use crate::router::{Effect, MessageRouter};
use crate::session::SessionState;
use crate::view::{Affordance, Severity, Status, Thumbnails, ViewRenderer};

/// How often pending requests are checked against their deadline.
const TIMEOUT_TICK: Duration = Duration::from_secs(1);

pub fn search_button() -> Affordance {
    Affordance::new("get-videos-button", "Search Videos")
}

pub fn analyze_button() -> Affordance {
    Affordance::new("analyze-videos-button", "Analyze Videos")
}

pub fn ask_button() -> Affordance {
    Affordance::new("ask-question-button", "Ask")
}

/// One user action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserCommand {
    Search {
        category_id: Option<String>,
        free_text: Option<String>,
    },
    Analyze {
        video_ids: Vec<String>,
    },
    Ask {
        question: String,
    },
    /// Ask the follow-up suggestion at `index` (0-based).
    Followup {
        index: usize,
    },
    /// Switch the per-video results tab (0-based).
    Select {
        index: usize,
    },
    Status,
}

#[derive(Debug)]
pub struct Client<V, S> {
    session: SessionState,
    correlator: RequestCorrelator,
    router: MessageRouter,
    view: V,
    sink: S,
    gave_up: bool,
}

impl<V: ViewRenderer, S: FrameSink> Client<V, S> {
    pub fn new(params: PageParams, config: &ClientConfig, view: V, sink: S) -> Self {
        let thumbnails = Thumbnails::new(
            config.thumbnail_base.as_str(),
            params.get("pid").unwrap_or_default(),
        );
        let session = SessionState::new();
        info!(session_id = %session.session_id(), "session started");
        Self {
            session,
            correlator: RequestCorrelator::new(params, config.affordances, config.request_timeout()),
            router: MessageRouter::new(thumbnails),
            view,
            sink,
            gave_up: false,
        }
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut V {
        &mut self.view
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn router(&self) -> &MessageRouter {
        &self.router
    }

    pub fn correlator(&self) -> &RequestCorrelator {
        &self.correlator
    }

    pub fn gave_up(&self) -> bool {
        self.gave_up
    }

    /// Warn up front when the page carries no credentials; every send will
    /// fail until they are supplied.
    pub fn check_credentials(&mut self) -> bool {
        match self.correlator.params().credentials() {
            Ok(creds) => {
                debug!(partner_id = %creds.partner_id, ks = %creds.masked_key(), "credentials present");
                true
            }
            Err(e) => {
                warn!(error = %e, "credentials missing");
                self.view
                    .show_status(&Status::new(STATUS_CREDENTIALS_REQUIRED, Severity::Danger));
                false
            }
        }
    }

    // -----------------------------------------------------------------------
    // Inbound
    // -----------------------------------------------------------------------

    pub fn handle_event(&mut self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Status(status) => self.view.show_status(&status),
            ConnectionEvent::Opened => info!("socket open"),
            ConnectionEvent::Frame(text) => self.handle_frame(&text),
            ConnectionEvent::Closed => debug!("socket closed"),
            ConnectionEvent::GaveUp => {
                error!("connection abandoned");
                self.gave_up = true;
            }
        }
    }

    /// Decode and route one text frame.
    pub fn handle_frame(&mut self, text: &str) {
        let msg = match decode_frame(text) {
            Ok(Inbound::Staged(msg)) => msg,
            Ok(Inbound::Unstaged { message }) => {
                info!(message = ?message, "frame without stage ignored");
                return;
            }
            Err(e) => {
                warn!(error = %e, len = text.len(), "undecodable frame dropped");
                return;
            }
        };
        let effects = self.router.route(
            msg,
            &mut self.session,
            &mut self.correlator,
            &mut self.view,
        );
        self.apply(effects);
    }

    fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::RequestFollowups => {
                    let payload = Payload::GenerateFollowupQuestions {
                        transcripts: self.session.transcripts().clone(),
                    };
                    if let Err(e) = self.send(payload, None) {
                        warn!(error = %e, "follow-up request not sent");
                    }
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Outbound
    // -----------------------------------------------------------------------

    fn send(&mut self, payload: Payload, affordance: Option<Affordance>) -> Result<String> {
        let action = payload.action();
        let request_id = self
            .correlator
            .send(payload, affordance, &self.sink, &mut self.view)?;
        self.router.note_request(action);
        Ok(request_id)
    }

    fn reject(&mut self, message: impl Into<String>) -> ClientError {
        let message = message.into();
        self.view
            .show_status(&Status::new(message.as_str(), Severity::Danger));
        ClientError::InvalidRequest(message)
    }

    /// Run one user action.
    ///
    /// # Errors
    /// Whatever the send path reports, or `InvalidRequest` for input that
    /// cannot form a request. The failure has already been shown on the view.
    pub fn handle_command(&mut self, command: UserCommand) -> Result<()> {
        debug!(?command, "user command");
        match command {
            UserCommand::Search {
                category_id,
                free_text,
            } => {
                let payload = Payload::GetVideos {
                    category_id,
                    free_text,
                };
                self.send(payload, Some(search_button()))?;
            }
            UserCommand::Analyze { video_ids } => {
                if video_ids.is_empty() {
                    return Err(self.reject("Enter at least one video id"));
                }
                let payload = Payload::AnalyzeVideos {
                    selected_videos: video_ids,
                };
                self.send(payload, Some(analyze_button()))?;
            }
            UserCommand::Ask { question } => self.ask(question)?,
            UserCommand::Followup { index } => {
                let question = match self.session.followup(index) {
                    Some(q) => q.to_string(),
                    None => return Err(self.reject(format!("No follow-up question #{}", index + 1))),
                };
                self.ask(question)?;
            }
            UserCommand::Select { index } => {
                if !self
                    .router
                    .select_result(index, &self.session, &mut self.view)
                {
                    return Err(self.reject(format!("No result #{}", index + 1)));
                }
            }
            UserCommand::Status => {
                let status = Status::new(
                    format!(
                        "connection {}; {} request(s) pending",
                        self.sink.state(),
                        self.correlator.pending_count()
                    ),
                    Severity::Progress,
                );
                self.view.show_status(&status);
            }
        }
        Ok(())
    }

    fn ask(&mut self, question: String) -> Result<()> {
        let question = question.trim().to_string();
        if question.is_empty() {
            return Err(self.reject("Enter a question"));
        }
        let context = self.session.build_chat_context();
        let payload = Payload::AskQuestion {
            question: question.clone(),
            analysis_results: context.analysis_results,
            transcripts: context.transcripts,
            chat_history: context.chat_history,
        };
        self.send(payload, Some(ask_button()))?;
        self.router
            .question_sent(&question, &mut self.session, &mut self.view);
        Ok(())
    }

    /// Release requests past their deadline.
    pub fn tick(&mut self, now: Instant) {
        self.correlator.expire_overdue(now, &mut self.view);
    }

    // -----------------------------------------------------------------------
    // Dispatch loop
    // -----------------------------------------------------------------------

    /// Process connection events and user commands until shutdown or until
    /// the command input closes. Returns the client for inspection.
    pub async fn run(
        mut self,
        mut events: mpsc::UnboundedReceiver<ConnectionEvent>,
        mut commands: mpsc::UnboundedReceiver<UserCommand>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Self {
        let mut ticker = tokio::time::interval(TIMEOUT_TICK);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut events_open = true;

        loop {
            tokio::select! {
                event = events.recv(), if events_open => match event {
                    Some(event) => self.handle_event(event),
                    None => {
                        debug!("connection events closed");
                        events_open = false;
                    }
                },
                command = commands.recv() => match command {
                    Some(command) => {
                        if let Err(e) = self.handle_command(command) {
                            debug!(error = %e, "command failed");
                        }
                    }
                    None => {
                        debug!("command input closed");
                        break;
                    }
                },
                _ = ticker.tick() => self.tick(Instant::now()),
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!(session_id = %self.session.session_id(), "session ended");
        self
    }
}

//! Outgoing request envelopes and the busy affordances they hold.
//!
//! Correlation is loose: the server echoes `request_id`, but replies are
//! matched to in-flight work by stage (see [`Lane`]). The id is used only to
//! pick the right affordance when an `error` names one.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::connection::FrameSink;
use crate::credentials::PageParams;
use crate::error::{ClientError, Result};
use crate::protocol::{generate_request_id, Action, AuthHeaders, Envelope, Payload};
use crate::view::{Affordance, Severity, Status, ViewRenderer};

pub const STATUS_CREDENTIALS_REQUIRED: &str = "pid and ks URL parameters are required!";
pub const STATUS_NOT_CONNECTED: &str = "Not connected to the server. Try again shortly.";
pub const STATUS_TIMED_OUT: &str = "Request timed out";

/// How many affordances may be busy at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AffordancePolicy {
    /// One busy affordance overall; a new send replaces the previous one.
    Single,
    /// One per [`Lane`], so chat and analysis run side by side.
    #[default]
    PerLane,
}

/// Independent request tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Lane {
    Analysis,
    Chat,
}

impl Lane {
    pub fn of(action: Action) -> Lane {
        match action {
            Action::GetVideos | Action::AnalyzeVideos => Lane::Analysis,
            Action::AskQuestion | Action::GenerateFollowupQuestions => Lane::Chat,
        }
    }
}

/// An in-flight request holding an affordance busy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pending {
    pub request_id: String,
    pub action: Action,
    pub affordance: Affordance,
    pub sent_at: Instant,
    pub deadline: Option<Instant>,
}

#[derive(Debug)]
pub struct RequestCorrelator {
    params: PageParams,
    policy: AffordancePolicy,
    timeout: Option<Duration>,
    pending: HashMap<Lane, Pending>,
}

impl RequestCorrelator {
    pub fn new(params: PageParams, policy: AffordancePolicy, timeout: Option<Duration>) -> Self {
        Self {
            params,
            policy,
            timeout,
            pending: HashMap::new(),
        }
    }

    pub fn params(&self) -> &PageParams {
        &self.params
    }

    fn slot(&self, lane: Lane) -> Lane {
        match self.policy {
            AffordancePolicy::Single => Lane::Analysis,
            AffordancePolicy::PerLane => lane,
        }
    }

    /// Build an envelope with a fresh request id.
    ///
    /// # Errors
    /// `MissingCredentials` when `pid` or `ks` is absent from the page query.
    pub fn build_envelope(&self, payload: Payload) -> Result<Envelope> {
        let credentials = self.params.credentials()?;
        Ok(Envelope {
            action: payload.action(),
            request_id: generate_request_id(),
            headers: AuthHeaders {
                authentication: credentials.auth_header(),
            },
            payload,
        })
    }

    /// Build, check and transmit one request, then mark `affordance` busy.
    ///
    /// Requests without an affordance are sent but not tracked. Returns the
    /// request id.
    ///
    /// # Errors
    /// `MissingCredentials` (nothing is written, one status is shown) or
    /// `NotConnected` (nothing is written, logged and reported).
    pub fn send(
        &mut self,
        payload: Payload,
        affordance: Option<Affordance>,
        sink: &dyn FrameSink,
        view: &mut dyn ViewRenderer,
    ) -> Result<String> {
        let action = payload.action();
        let envelope = match self.build_envelope(payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(%action, error = %e, "request rejected before send");
                view.show_status(&Status::new(STATUS_CREDENTIALS_REQUIRED, Severity::Danger));
                return Err(e);
            }
        };
        let frame = envelope.to_frame()?;

        if let Err(e) = sink.send_frame(frame) {
            warn!(%action, error = %e, "socket not open, request dropped");
            view.show_status(&Status::new(STATUS_NOT_CONNECTED, Severity::Danger));
            return Err(e);
        }
        info!(%action, request_id = %envelope.request_id, "request sent");

        if let Some(affordance) = affordance {
            let now = Instant::now();
            let pending = Pending {
                request_id: envelope.request_id.clone(),
                action,
                affordance,
                sent_at: now,
                deadline: self.timeout.map(|t| now + t),
            };
            self.hold(pending, view);
        }
        Ok(envelope.request_id)
    }

    fn hold(&mut self, pending: Pending, view: &mut dyn ViewRenderer) {
        let slot = self.slot(Lane::of(pending.action));
        if let Some(previous) = self.pending.remove(&slot) {
            debug!(request_id = %previous.request_id, "busy affordance replaced");
            view.set_busy(&previous.affordance, false);
        }
        view.set_busy(&pending.affordance, true);
        self.pending.insert(slot, pending);
    }

    /// Release the affordance waiting on `lane`.
    pub fn resolve_lane(&mut self, lane: Lane, view: &mut dyn ViewRenderer) -> Option<Pending> {
        let slot = self.slot(lane);
        let pending = self.pending.remove(&slot)?;
        view.set_busy(&pending.affordance, false);
        Some(pending)
    }

    /// Release the affordance held by `request_id`, if any.
    pub fn resolve_request(
        &mut self,
        request_id: &str,
        view: &mut dyn ViewRenderer,
    ) -> Option<Pending> {
        let slot = self
            .pending
            .iter()
            .find(|(_, p)| p.request_id == request_id)
            .map(|(slot, _)| *slot)?;
        let pending = self.pending.remove(&slot)?;
        view.set_busy(&pending.affordance, false);
        Some(pending)
    }

    pub fn resolve_all(&mut self, view: &mut dyn ViewRenderer) -> Vec<Pending> {
        let mut released: Vec<Pending> = self.pending.drain().map(|(_, p)| p).collect();
        released.sort_by_key(|p| p.sent_at);
        for p in &released {
            view.set_busy(&p.affordance, false);
        }
        released
    }

    /// Release every affordance whose deadline is at or before `now`.
    pub fn expire_overdue(&mut self, now: Instant, view: &mut dyn ViewRenderer) -> Vec<Pending> {
        let overdue: Vec<Lane> = self
            .pending
            .iter()
            .filter(|(_, p)| p.deadline.is_some_and(|d| d <= now))
            .map(|(slot, _)| *slot)
            .collect();
        let mut expired = Vec::with_capacity(overdue.len());
        for slot in overdue {
            if let Some(p) = self.pending.remove(&slot) {
                warn!(action = %p.action, request_id = %p.request_id, "request timed out");
                view.set_busy(&p.affordance, false);
                view.show_status(&Status::new(STATUS_TIMED_OUT, Severity::Danger));
                expired.push(p);
            }
        }
        expired
    }

    pub fn pending(&self, lane: Lane) -> Option<&Pending> {
        self.pending.get(&self.slot(lane))
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

/// Fail if the user gave no usable video ids.
pub fn parse_video_ids(raw: &str) -> Result<Vec<String>> {
    let ids: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(ToOwned::to_owned)
        .collect();
    if ids.is_empty() {
        return Err(ClientError::InvalidRequest(
            "at least one video id is required".into(),
        ));
    }
    Ok(ids)
}

/// Empty inputs are sent as `null`.
pub fn optional_input(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
}

//! One regeneration attempt for one asset, from prompt entry to reconciliation.
//!
//! The visible state is a small machine, `Idle -> Submitting -> Accepted | Failed`,
//! advanced only through [`transition`]. `Failed` behaves like `Idle`: the prompt and
//! overlays survive so the operator can retry as is.

use crate::backend::GenerationService;
use crate::config::Reconciliation;
use crate::listing::ListingRefresher;
use crate::models::{
    OverlayPosition, RegenerationRequest, RegenerationTarget, TextOverlay, MAX_FONT_SIZE, MIN_FONT_SIZE,
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("target filename must not be empty")]
    EmptyFilename,
    #[error("target dimensions must be positive, got {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
    #[error("prompt must not be empty")]
    EmptyPrompt,
    #[error("font size {0} is outside {}..={}", MIN_FONT_SIZE, MAX_FONT_SIZE)]
    FontSizeOutOfRange(u32),
    #[error("a submission is already in flight")]
    SubmissionInFlight,
    #[error("the request was already accepted")]
    AlreadyAccepted,
    #[error("the request can no longer be edited")]
    NotEditable,
    #[error("the workflow is closed")]
    Closed,
    #[error("cannot apply {event} while {from}")]
    IllegalTransition { from: &'static str, event: &'static str },
}

impl WorkflowError {
    /// Input problems the operator can fix, as opposed to state conflicts.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            WorkflowError::EmptyFilename
                | WorkflowError::InvalidDimensions { .. }
                | WorkflowError::EmptyPrompt
                | WorkflowError::FontSizeOutOfRange(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RegenerationOutcome {
    Idle,
    Submitting,
    Accepted { delay_ms: u64 },
    Failed { reason: String },
}

impl RegenerationOutcome {
    pub fn name(&self) -> &'static str {
        match self {
            RegenerationOutcome::Idle => "idle",
            RegenerationOutcome::Submitting => "submitting",
            RegenerationOutcome::Accepted { .. } => "accepted",
            RegenerationOutcome::Failed { .. } => "failed",
        }
    }

    pub fn is_resubmittable(&self) -> bool {
        matches!(self, RegenerationOutcome::Idle | RegenerationOutcome::Failed { .. })
    }

    /// Status line shown to the operator, if any.
    pub fn status(&self) -> Option<String> {
        match self {
            RegenerationOutcome::Idle => None,
            RegenerationOutcome::Submitting => Some("Submitting regeneration request...".to_string()),
            RegenerationOutcome::Accepted { .. } => {
                Some("Image is regenerating... wait a few seconds and reload.".to_string())
            }
            RegenerationOutcome::Failed { reason } => Some(format!("Error: {reason}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Submit,
    Accept { delay_ms: u64 },
    Reject { reason: String },
}

impl Transition {
    fn name(&self) -> &'static str {
        match self {
            Transition::Submit => "submit",
            Transition::Accept { .. } => "accept",
            Transition::Reject { .. } => "reject",
        }
    }
}

pub fn transition(current: &RegenerationOutcome, event: Transition) -> Result<RegenerationOutcome, WorkflowError> {
    use RegenerationOutcome::*;
    match (current, event) {
        (Idle | Failed { .. }, Transition::Submit) => Ok(Submitting),
        (Submitting, Transition::Submit) => Err(WorkflowError::SubmissionInFlight),
        (Accepted { .. }, Transition::Submit) => Err(WorkflowError::AlreadyAccepted),
        (Submitting, Transition::Accept { delay_ms }) => Ok(Accepted { delay_ms }),
        (Submitting, Transition::Reject { reason }) => Ok(Failed { reason }),
        (from, event) => Err(WorkflowError::IllegalTransition { from: from.name(), event: event.name() }),
    }
}

/// Snapshot handed to whatever renders the workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkflowView {
    pub target: RegenerationTarget,
    pub prompt: String,
    pub text_overlays: Vec<TextOverlay>,
    pub outcome: RegenerationOutcome,
    pub status: Option<String>,
    pub open: bool,
    pub opened_at: DateTime<Utc>,
}

struct Inner {
    target: RegenerationTarget,
    prompt: String,
    overlays: Vec<TextOverlay>,
    outcome: RegenerationOutcome,
    open: bool,
    opened_at: DateTime<Utc>,
    reconcile: Option<JoinHandle<()>>,
}

impl Inner {
    fn ensure_editable(&self) -> Result<(), WorkflowError> {
        if !self.open {
            return Err(WorkflowError::Closed);
        }
        if !self.outcome.is_resubmittable() {
            return Err(WorkflowError::NotEditable);
        }
        Ok(())
    }

    fn close(&mut self) {
        self.open = false;
        self.prompt.clear();
        self.overlays.clear();
    }
}

/// Handle to one open regeneration workflow. Clones share the same state.
#[derive(Clone)]
pub struct RegenerationWorkflow {
    inner: Arc<Mutex<Inner>>,
    service: Arc<dyn GenerationService>,
    refresher: Arc<dyn ListingRefresher>,
    reconciliation: Reconciliation,
}

impl RegenerationWorkflow {
    pub fn open(
        target: RegenerationTarget,
        service: Arc<dyn GenerationService>,
        refresher: Arc<dyn ListingRefresher>,
        reconciliation: Reconciliation,
    ) -> Result<Self, WorkflowError> {
        if target.filename.trim().is_empty() {
            return Err(WorkflowError::EmptyFilename);
        }
        if target.width == 0 || target.height == 0 {
            return Err(WorkflowError::InvalidDimensions { width: target.width, height: target.height });
        }

        info!(file = %target.filename, collection = %target.target, "🎯 Opened regeneration workflow ({}x{})", target.width, target.height);
        let inner = Inner {
            target,
            prompt: String::new(),
            overlays: Vec::new(),
            outcome: RegenerationOutcome::Idle,
            open: true,
            opened_at: Utc::now(),
            reconcile: None,
        };
        Ok(Self { inner: Arc::new(Mutex::new(inner)), service, refresher, reconciliation })
    }

    pub fn outcome(&self) -> RegenerationOutcome { self.inner.lock().outcome.clone() }

    pub fn overlays(&self) -> Vec<TextOverlay> { self.inner.lock().overlays.clone() }

    pub fn is_open(&self) -> bool { self.inner.lock().open }

    pub fn view(&self) -> WorkflowView {
        let inner = self.inner.lock();
        WorkflowView {
            target: inner.target.clone(),
            prompt: inner.prompt.clone(),
            text_overlays: inner.overlays.clone(),
            outcome: inner.outcome.clone(),
            status: inner.outcome.status(),
            open: inner.open,
            opened_at: inner.opened_at,
        }
    }

    pub fn set_prompt(&self, prompt: impl Into<String>) -> Result<(), WorkflowError> {
        let mut inner = self.inner.lock();
        inner.ensure_editable()?;
        inner.prompt = prompt.into();
        Ok(())
    }

    /// Appends an overlay. Blank text is ignored and reported as `Ok(false)`.
    pub fn add_overlay(&self, text: &str, position: OverlayPosition, font_size: u32) -> Result<bool, WorkflowError> {
        let mut inner = self.inner.lock();
        inner.ensure_editable()?;
        let text = text.trim();
        if text.is_empty() {
            return Ok(false);
        }
        if !(MIN_FONT_SIZE..=MAX_FONT_SIZE).contains(&font_size) {
            return Err(WorkflowError::FontSizeOutOfRange(font_size));
        }
        inner.overlays.push(TextOverlay { text: text.to_string(), position, font_size });
        Ok(true)
    }

    /// Removes the overlay at `index`; out of range is a no-op returning `Ok(None)`.
    pub fn remove_overlay(&self, index: usize) -> Result<Option<TextOverlay>, WorkflowError> {
        let mut inner = self.inner.lock();
        inner.ensure_editable()?;
        if index >= inner.overlays.len() {
            return Ok(None);
        }
        Ok(Some(inner.overlays.remove(index)))
    }

    /// Sends the request once. Backend failures come back as `Ok(Failed { .. })`;
    /// `Err` means nothing was sent.
    pub async fn submit(&self) -> Result<RegenerationOutcome, WorkflowError> {
        let request = {
            let mut inner = self.inner.lock();
            if !inner.open {
                return Err(WorkflowError::Closed);
            }
            let next = transition(&inner.outcome, Transition::Submit)?;
            let prompt = inner.prompt.trim();
            if prompt.is_empty() {
                return Err(WorkflowError::EmptyPrompt);
            }
            let request = RegenerationRequest {
                target: inner.target.clone(),
                prompt: prompt.to_string(),
                text_overlays: inner.overlays.clone(),
            };
            inner.outcome = next;
            request
        };

        let mut in_flight = InFlight { inner: &self.inner, armed: true };
        let submitted_at = Utc::now();
        let result = self.service.regenerate(&request).await;
        in_flight.armed = false;

        let mut inner = self.inner.lock();
        let event = match result {
            Ok(()) => Transition::Accept { delay_ms: self.reconciliation.horizon().as_millis() as u64 },
            Err(e) => {
                warn!(file = %request.target.filename, "❌ Regeneration failed: {}", e);
                Transition::Reject { reason: e.reason() }
            }
        };
        inner.outcome = transition(&inner.outcome, event)?;

        if let RegenerationOutcome::Accepted { delay_ms } = inner.outcome {
            info!(file = %request.target.filename, delay_ms, "✅ Regeneration accepted, reconciling");
            let handle = tokio::spawn(reconcile(
                Arc::clone(&self.inner),
                Arc::clone(&self.service),
                Arc::clone(&self.refresher),
                self.reconciliation,
                request.target,
                submitted_at,
            ));
            inner.reconcile = Some(handle);
        }
        Ok(inner.outcome.clone())
    }

    /// Discards the request. Refused while a submission is in flight.
    ///
    /// After acceptance this only drops the pending refresh-and-close; the backend keeps generating.
    pub fn cancel(&self) -> Result<(), WorkflowError> {
        let mut inner = self.inner.lock();
        if inner.outcome == RegenerationOutcome::Submitting {
            return Err(WorkflowError::SubmissionInFlight);
        }
        if let Some(handle) = inner.reconcile.take() {
            handle.abort();
        }
        if inner.open {
            info!(file = %inner.target.filename, "Cancelled regeneration workflow");
        }
        inner.close();
        Ok(())
    }
}

/// Resets a submission whose future was dropped before the backend answered.
struct InFlight<'a> {
    inner: &'a Mutex<Inner>,
    armed: bool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut inner = self.inner.lock();
        if inner.outcome == RegenerationOutcome::Submitting {
            inner.outcome = RegenerationOutcome::Failed { reason: "submission was interrupted".to_string() };
        }
    }
}

async fn reconcile(
    inner: Arc<Mutex<Inner>>,
    service: Arc<dyn GenerationService>,
    refresher: Arc<dyn ListingRefresher>,
    reconciliation: Reconciliation,
    target: RegenerationTarget,
    submitted_at: DateTime<Utc>,
) {
    match reconciliation {
        Reconciliation::FixedDelay { delay } => tokio::time::sleep(delay).await,
        Reconciliation::Poll { interval, timeout } => {
            let ready = tokio::time::timeout(timeout, async {
                loop {
                    tokio::time::sleep(interval).await;
                    match service.asset_ready(&target, submitted_at).await {
                        Ok(true) => break,
                        Ok(false) => {}
                        Err(e) => warn!(file = %target.filename, "⚠️ Readiness check failed: {}", e),
                    }
                }
            })
            .await
            .is_ok();
            if !ready {
                warn!(file = %target.filename, "⏱️ Asset not confirmed within {:?}, refreshing anyway", timeout);
            }
        }
    }

    refresher.refresh(target.target).await;

    let mut inner = inner.lock();
    inner.reconcile = None;
    inner.close();
    info!(file = %target.filename, "🔄 Regeneration reconciled, workflow closed");
}

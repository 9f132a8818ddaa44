pub mod report;

pub use report::{FinalReport, HttpReportSink, ReportSink, NOTES_DELIMITER};

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use mirage_core::{
    classifier, dialogue, extractor, Classification, ConversationSession, EngageRequest,
    EngagementStage, Message, ScoringConfig,
};
use mirage_observability::AppMetrics;
use mirage_storage::{ArchiveRepository, SessionStore};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument, warn};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unknown session id: {0}")]
    UnknownSession(String),
    #[error("session {0} was already reported")]
    AlreadyReported(String),
    #[error("report delivery failed")]
    Delivery(#[source] anyhow::Error),
}

#[derive(Debug, Clone, Serialize)]
pub struct EngagementOutcome {
    pub reply: String,
    pub stage: EngagementStage,
    pub scam_detected: bool,
    pub scam_confidence: f32,
    pub concluded: bool,
    pub reported: bool,
}

struct TurnSummary {
    reply: String,
    classification: Classification,
    newly_detected: bool,
    new_intel_items: usize,
}

/// Orchestrates one inbound message end to end: resolve the session,
/// classify, extract, advance the dialogue, and dispatch the final report
/// when the session has concluded.
pub struct HoneypotAgent<A, R>
where
    A: ArchiveRepository,
    R: ReportSink,
{
    store: Arc<SessionStore>,
    archive: Arc<A>,
    sink: Arc<R>,
    scoring: ScoringConfig,
    metrics: Arc<AppMetrics>,
}

impl<A, R> HoneypotAgent<A, R>
where
    A: ArchiveRepository,
    R: ReportSink,
{
    pub fn new(
        store: Arc<SessionStore>,
        archive: Arc<A>,
        sink: Arc<R>,
        scoring: ScoringConfig,
        metrics: Arc<AppMetrics>,
    ) -> Self {
        Self {
            store,
            archive,
            sink,
            scoring,
            metrics,
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    #[instrument(skip(self, request), fields(session_id = %request.session_id))]
    pub async fn handle_message(&self, request: EngageRequest) -> Result<EngagementOutcome> {
        let started = Instant::now();
        self.metrics.inc_request();

        let (handle, created) = self.store.checkout(&request.session_id);
        let mut session = handle.lock().await;

        // The turn mutates a scratch copy and commits only on success, so a
        // fault mid-turn leaves the session untouched.
        let mut scratch = session.clone();
        let summary = run_turn(&mut scratch, &request, created, &self.scoring);
        *session = scratch;

        if summary.newly_detected {
            self.metrics.inc_scam_detected();
        }
        self.metrics.add_intel_items(summary.new_intel_items);

        if session.is_concluded() && session.scam_detected && !session.reported {
            if let Err(err) = self.dispatch_locked(&mut session).await {
                warn!(session_id = %session.id, error = %err, "final report not delivered");
            }
        }

        self.metrics.observe_latency(started.elapsed());
        info!(
            session_id = %session.id,
            stage = %session.stage.as_code(),
            confidence = session.scam_confidence,
            categories = summary.classification.categories.len(),
            intel_items = session.intelligence.total_count(),
            "message handled"
        );

        Ok(EngagementOutcome {
            reply: summary.reply,
            stage: session.stage,
            scam_detected: session.scam_detected,
            scam_confidence: session.scam_confidence,
            concluded: session.is_concluded(),
            reported: session.reported,
        })
    }

    /// Operational recovery path: force delivery for a session whose
    /// automatic dispatch failed. The one-shot `reported` guard still holds.
    pub async fn manual_dispatch(&self, session_id: &str) -> Result<(), EngineError> {
        let handle = self
            .store
            .get(session_id)
            .ok_or_else(|| EngineError::UnknownSession(session_id.to_string()))?;
        let mut session = handle.lock().await;

        self.dispatch_locked(&mut session).await
    }

    pub fn snapshot(&self, session_id: &str) -> Option<ConversationSession> {
        self.store
            .get(session_id)
            .and_then(|handle| handle.try_lock().ok().map(|session| session.clone()))
    }

    async fn dispatch_locked(
        &self,
        session: &mut ConversationSession,
    ) -> Result<(), EngineError> {
        if session.reported {
            return Err(EngineError::AlreadyReported(session.id.clone()));
        }

        let report = FinalReport::from_session(session);
        if let Err(err) = self.sink.deliver(&report).await {
            self.metrics.inc_report_failure();
            return Err(EngineError::Delivery(err));
        }

        session.reported = true;
        self.metrics.inc_report_sent();
        info!(session_id = %session.id, messages = report.total_messages_exchanged, "final report delivered");

        if let Err(err) = self.archive.archive_session(session).await {
            warn!(session_id = %session.id, error = %err, "failed to archive reported session");
        }

        Ok(())
    }
}

fn run_turn(
    session: &mut ConversationSession,
    request: &EngageRequest,
    created: bool,
    scoring: &ScoringConfig,
) -> TurnSummary {
    if created {
        for inbound in request.conversation_history.iter().cloned() {
            session.append_message(Message::from(inbound));
        }
    }

    let classification = classifier::classify(&request.message.text, &session.messages, scoring);

    session.append_message(Message::from(request.message.clone()));

    let newly_detected = classification.is_scam && !session.scam_detected;
    session.observe_classification(&classification);

    let intel_before = session.intelligence.total_count();
    session
        .intelligence
        .merge(extractor::extract(&request.message.text));
    let new_intel_items = session.intelligence.total_count() - intel_before;

    let reply = dialogue::advance(session, &request.message.text);

    TurnSummary {
        reply,
        classification,
        newly_detected,
        new_intel_items,
    }
}

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use mirage_agents::{EngineError, FinalReport, HoneypotAgent, ReportSink};
use mirage_core::dialogue::{CLOSING_REPLY, DISENGAGE_REPLY, INITIAL_REPLIES};
use mirage_core::{EngageRequest, EngagementStage, InboundMessage, ScoringConfig, Sender};
use mirage_observability::AppMetrics;
use mirage_storage::{ArchiveRepository, MemoryArchive, SessionStore};
use parking_lot::Mutex;

#[derive(Default)]
struct RecordingSink {
    fail: AtomicBool,
    delivered: Mutex<Vec<FinalReport>>,
}

impl RecordingSink {
    fn delivered_count(&self) -> usize {
        self.delivered.lock().len()
    }

    fn last_report(&self) -> Option<FinalReport> {
        self.delivered.lock().last().cloned()
    }
}

impl ReportSink for RecordingSink {
    async fn deliver(&self, report: &FinalReport) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("evaluation sink unavailable");
        }
        self.delivered.lock().push(report.clone());
        Ok(())
    }
}

struct Harness {
    agent: Arc<HoneypotAgent<MemoryArchive, RecordingSink>>,
    store: Arc<SessionStore>,
    archive: Arc<MemoryArchive>,
    sink: Arc<RecordingSink>,
}

fn harness() -> Harness {
    let store = Arc::new(SessionStore::new());
    let archive = Arc::new(MemoryArchive::new());
    let sink = Arc::new(RecordingSink::default());

    let agent = Arc::new(HoneypotAgent::new(
        store.clone(),
        archive.clone(),
        sink.clone(),
        ScoringConfig::default(),
        AppMetrics::shared(),
    ));

    Harness {
        agent,
        store,
        archive,
        sink,
    }
}

fn scammer_says(session_id: &str, text: &str) -> EngageRequest {
    EngageRequest {
        session_id: session_id.to_string(),
        message: InboundMessage {
            sender: Sender::Scammer,
            text: text.to_string(),
            timestamp: None,
        },
        conversation_history: Vec::new(),
        metadata: None,
    }
}

#[tokio::test]
async fn scripted_conversation_reaches_closing_and_reports_once() {
    let harness = harness();
    let id = "case-closing";

    let first = harness
        .agent
        .handle_message(scammer_says(
            id,
            "URGENT: Your bank account will be blocked, verify immediately",
        ))
        .await
        .expect("turn 1");
    assert_eq!(first.stage, EngagementStage::Engaged);
    assert_eq!(first.reply, INITIAL_REPLIES[0]);
    assert!(first.scam_detected);

    let second = harness
        .agent
        .handle_message(scammer_says(id, "Share your account number and OTP right now"))
        .await
        .expect("turn 2");
    assert_eq!(second.stage, EngagementStage::Extraction);

    let third = harness
        .agent
        .handle_message(scammer_says(
            id,
            "Pay fraud@ybl or call 9876543210, details at http://fake-bank.example/verify",
        ))
        .await
        .expect("turn 3");
    assert_eq!(third.stage, EngagementStage::Closing);
    assert_eq!(third.reply, DISENGAGE_REPLY);
    assert!(third.concluded);
    assert!(third.reported);

    assert_eq!(harness.sink.delivered_count(), 1);
    let report = harness.sink.last_report().expect("report");
    assert_eq!(report.session_id, id);
    assert!(report.scam_detected);
    assert_eq!(report.total_messages_exchanged, 3);
    assert!(report.extracted_intelligence.upi_ids.contains("fraud@ybl"));
    assert!(report
        .extracted_intelligence
        .phone_numbers
        .contains("9876543210"));
    assert_eq!(report.extracted_intelligence.phishing_links.len(), 1);

    assert_eq!(harness.archive.archived_count().await.expect("count"), 1);

    // the session is closed and already reported; further messages only
    // produce the disengagement line
    let fourth = harness
        .agent
        .handle_message(scammer_says(id, "hello? are you there"))
        .await
        .expect("turn 4");
    assert_eq!(fourth.reply, CLOSING_REPLY);
    assert_eq!(harness.sink.delivered_count(), 1);
}

#[tokio::test]
async fn message_cap_concludes_session_without_identifiers() {
    let harness = harness();
    let id = "case-cap";

    harness
        .agent
        .handle_message(scammer_says(id, "hello, this is your bank customer care"))
        .await
        .expect("turn 1");
    harness
        .agent
        .handle_message(scammer_says(id, "we need your card details"))
        .await
        .expect("turn 2");

    let mut last_stage = EngagementStage::Extraction;
    for turn in 3..=12 {
        let outcome = harness
            .agent
            .handle_message(scammer_says(id, "are you still there, friend?"))
            .await
            .unwrap_or_else(|_| panic!("turn {turn}"));
        last_stage = outcome.stage;
    }

    assert_eq!(last_stage, EngagementStage::Closing);
    assert_eq!(harness.sink.delivered_count(), 1);

    let report = harness.sink.last_report().expect("report");
    assert!(report.scam_detected);
    assert_eq!(report.extracted_intelligence.identifier_count(), 0);
    assert!(!report.extracted_intelligence.suspicious_keywords.is_empty());
}

#[tokio::test]
async fn failed_delivery_leaves_session_eligible_for_manual_retry() {
    let harness = harness();
    let id = "case-retry";
    harness.sink.fail.store(true, Ordering::SeqCst);

    harness
        .agent
        .handle_message(scammer_says(
            id,
            "URGENT: Your bank account will be blocked, verify immediately",
        ))
        .await
        .expect("turn 1");
    harness
        .agent
        .handle_message(scammer_says(id, "Share your account number and OTP right now"))
        .await
        .expect("turn 2");
    let concluding = harness
        .agent
        .handle_message(scammer_says(
            id,
            "Pay fraud@ybl or call 9876543210, details at http://fake-bank.example/verify",
        ))
        .await
        .expect("turn 3");

    assert!(concluding.concluded);
    assert!(!concluding.reported);
    assert_eq!(harness.sink.delivered_count(), 0);

    harness.sink.fail.store(false, Ordering::SeqCst);
    harness
        .agent
        .manual_dispatch(id)
        .await
        .expect("manual retry should deliver");

    assert_eq!(harness.sink.delivered_count(), 1);
    let session = harness.agent.snapshot(id).expect("session");
    assert!(session.reported);

    let again = harness.agent.manual_dispatch(id).await;
    assert!(matches!(again, Err(EngineError::AlreadyReported(_))));
    assert_eq!(harness.sink.delivered_count(), 1);
}

#[tokio::test]
async fn concurrent_first_contact_yields_single_session() {
    let harness = harness();
    let id = "case-race";

    let left = harness
        .agent
        .handle_message(scammer_says(id, "your account is blocked"));
    let right = harness
        .agent
        .handle_message(scammer_says(id, "your account is blocked"));

    let (left, right) = tokio::join!(left, right);
    let left = left.expect("left turn");
    let right = right.expect("right turn");

    assert_eq!(harness.store.active_count(), 1);

    let session = harness.agent.snapshot(id).expect("session");
    assert_eq!(session.message_count(), 2);

    let mut stages = vec![left.stage, right.stage];
    stages.sort();
    assert_eq!(
        stages,
        vec![EngagementStage::Engaged, EngagementStage::Extraction]
    );
}

#[tokio::test]
async fn confidence_never_decreases_across_turns() {
    let harness = harness();
    let id = "case-monotonic";

    let strong = harness
        .agent
        .handle_message(scammer_says(
            id,
            "Your bank account will be blocked in 2 hours... verify immediately",
        ))
        .await
        .expect("turn 1");
    let weak = harness
        .agent
        .handle_message(scammer_says(id, "ok then"))
        .await
        .expect("turn 2");
    let medium = harness
        .agent
        .handle_message(scammer_says(id, "please confirm the refund"))
        .await
        .expect("turn 3");

    assert!(strong.scam_confidence >= 0.85);
    assert_eq!(weak.scam_confidence, strong.scam_confidence);
    assert_eq!(medium.scam_confidence, strong.scam_confidence);
}

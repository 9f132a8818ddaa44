use std::time::Duration;

use anyhow::{Context, Result};
use mirage_core::{ConversationSession, ScamIntelligence};
use reqwest::Client;
use serde::Serialize;

pub const NOTES_DELIMITER: &str = " | ";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalReport {
    pub session_id: String,
    pub scam_detected: bool,
    pub total_messages_exchanged: usize,
    pub extracted_intelligence: ScamIntelligence,
    pub agent_notes: String,
}

impl FinalReport {
    pub fn from_session(session: &ConversationSession) -> Self {
        Self {
            session_id: session.id.clone(),
            scam_detected: session.scam_detected,
            total_messages_exchanged: session.message_count(),
            extracted_intelligence: session.intelligence.clone(),
            agent_notes: session.notes.join(NOTES_DELIMITER),
        }
    }
}

pub trait ReportSink: Send + Sync {
    async fn deliver(&self, report: &FinalReport) -> Result<()>;
}

/// Delivers the final report to the external evaluation endpoint. One bounded
/// attempt per call; retries are the caller's explicit decision.
pub struct HttpReportSink {
    client: Client,
    endpoint: String,
}

impl HttpReportSink {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build report http client")?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl ReportSink for HttpReportSink {
    async fn deliver(&self, report: &FinalReport) -> Result<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(report)
            .send()
            .await
            .with_context(|| format!("report delivery to {} failed", self.endpoint))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("report sink {} returned {}", self.endpoint, status);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mirage_core::{EngagementStage, Message, Sender};

    #[test]
    fn report_serializes_with_external_field_names() {
        let mut session = ConversationSession::new("case-7");
        session.append_message(Message::new(Sender::Scammer, "pay me", None));
        session.scam_detected = true;
        session.scam_confidence = 0.9;
        session.stage = EngagementStage::Closing;
        session.intelligence.upi_ids.insert("fraud@ybl".to_string());
        session.note("Scam detected with 0.90 confidence");
        session.note("Sufficient intelligence gathered");

        let report = FinalReport::from_session(&session);
        let value = serde_json::to_value(&report).expect("serialize report");

        assert_eq!(value["sessionId"], "case-7");
        assert_eq!(value["scamDetected"], true);
        assert_eq!(value["totalMessagesExchanged"], 1);
        assert_eq!(value["extractedIntelligence"]["upiIds"][0], "fraud@ybl");
        assert_eq!(
            value["agentNotes"],
            "Scam detected with 0.90 confidence | Sufficient intelligence gathered"
        );
    }
}

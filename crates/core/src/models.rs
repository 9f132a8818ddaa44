use std::collections::BTreeSet;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::classifier::Classification;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    Scammer,
    User,
}

impl Sender {
    pub fn as_code(self) -> &'static str {
        match self {
            Self::Scammer => "scammer",
            Self::User => "user",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub sender: Sender,
    pub text: String,
    pub timestamp: String,
}

impl Message {
    pub fn new(sender: Sender, text: impl Into<String>, timestamp: Option<String>) -> Self {
        Self {
            sender,
            text: text.into(),
            timestamp: timestamp.unwrap_or_else(|| Utc::now().to_rfc3339()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    pub sender: Sender,
    pub text: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl From<InboundMessage> for Message {
    fn from(inbound: InboundMessage) -> Self {
        Message::new(inbound.sender, inbound.text, inbound.timestamp)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngageRequest {
    pub session_id: String,
    pub message: InboundMessage,
    #[serde(default)]
    pub conversation_history: Vec<InboundMessage>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScamIntelligence {
    pub bank_accounts: BTreeSet<String>,
    pub upi_ids: BTreeSet<String>,
    pub phishing_links: BTreeSet<String>,
    pub phone_numbers: BTreeSet<String>,
    pub suspicious_keywords: BTreeSet<String>,
}

impl ScamIntelligence {
    pub fn merge(&mut self, other: ScamIntelligence) {
        self.bank_accounts.extend(other.bank_accounts);
        self.upi_ids.extend(other.upi_ids);
        self.phishing_links.extend(other.phishing_links);
        self.phone_numbers.extend(other.phone_numbers);
        self.suspicious_keywords.extend(other.suspicious_keywords);
    }

    /// Distinct financial/contact/link identifiers, excluding keywords.
    /// This is the count the extraction stage exits on.
    pub fn identifier_count(&self) -> usize {
        self.bank_accounts.len()
            + self.upi_ids.len()
            + self.phishing_links.len()
            + self.phone_numbers.len()
    }

    pub fn total_count(&self) -> usize {
        self.identifier_count() + self.suspicious_keywords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total_count() == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngagementStage {
    Initial,
    Engaged,
    Extraction,
    Closing,
}

impl EngagementStage {
    pub fn as_code(self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::Engaged => "engaged",
            Self::Extraction => "extraction",
            Self::Closing => "closing",
        }
    }
}

pub const SESSION_MESSAGE_CAP: usize = 20;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSession {
    pub id: String,
    pub messages: Vec<Message>,
    pub scam_detected: bool,
    pub scam_confidence: f32,
    pub intelligence: ScamIntelligence,
    pub notes: Vec<String>,
    pub stage: EngagementStage,
    pub reported: bool,
}

impl ConversationSession {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            messages: Vec::new(),
            scam_detected: false,
            scam_confidence: 0.0,
            intelligence: ScamIntelligence::default(),
            notes: Vec::new(),
            stage: EngagementStage::Initial,
            reported: false,
        }
    }

    pub fn append_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    pub fn note(&mut self, entry: impl Into<String>) {
        self.notes.push(entry.into());
    }

    /// Stage moves forward only; a request to move backwards is ignored.
    pub fn advance_stage(&mut self, next: EngagementStage) {
        if next > self.stage {
            self.stage = next;
        }
    }

    /// Confidence is non-decreasing and `scam_detected` latches true.
    pub fn observe_classification(&mut self, classification: &Classification) {
        if classification.is_scam && classification.confidence > self.scam_confidence {
            self.scam_detected = true;
            self.scam_confidence = classification.confidence;
            self.note(format!(
                "Scam detected with {:.2} confidence",
                classification.confidence
            ));
        }
    }

    pub fn is_concluded(&self) -> bool {
        self.stage == EngagementStage::Closing || self.message_count() >= SESSION_MESSAGE_CAP
    }
}

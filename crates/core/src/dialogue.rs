use crate::models::{ConversationSession, EngagementStage};

pub const INTEL_TARGET: usize = 3;
pub const EXTRACTION_MESSAGE_CAP: usize = 12;

pub const INITIAL_REPLIES: &[&str] = &[
    "Why is my account being blocked? I haven't done anything wrong.",
    "What? I don't understand. What verification are you talking about?",
    "Is this real? How do I know you're from the bank?",
    "I'm worried. Can you explain what's happening?",
    "This seems urgent. What should I do?",
];

pub const HESITATION_REPLIES: &[&str] = &[
    "I want to help, but I'm not sure about sharing that. Is there another way?",
    "My account number? I have it somewhere... why do you need it exactly?",
    "I'm a bit nervous sharing this information. Can you verify you're really from the bank first?",
    "Should I share this over message? Isn't that unsafe?",
];

pub const PROBING_REPLIES: &[&str] = &[
    "I'm trying to understand. Can you explain more?",
    "What happens if I don't do this right away?",
    "How long do I have to fix this?",
    "Is my money safe? I'm really worried.",
];

pub const LINK_CAUTION_REPLY: &str =
    "I see a link. Is this safe to click? I've heard about fake websites.";
pub const DISENGAGE_REPLY: &str =
    "Wait, I'm going to call my bank directly to confirm this. Let me call them.";
pub const CLOSING_REPLY: &str =
    "Actually, I'm going to visit the bank branch in person. Thanks anyway.";

const UPI_STALL: &str = "My UPI ID? Let me check... but can you tell me your employee ID first?";
const ACCOUNT_STALL: &str = "I have multiple accounts. Which one are you talking about?";
const OTP_STALL: &str = "I haven't received any OTP yet. Where should I look for it?";
const FALLBACK_STALL: &str = "Okay, I'm looking for that information. What will you do with it?";

const CREDENTIAL_TERMS: &[&str] = &["upi", "account", "card", "cvv", "otp", "pin"];
const LINK_TERMS: &[&str] = &["http", "link", "click"];

/// Deterministic candidate selection: message count modulo list length.
/// Scripted tests depend on this exact rule.
pub fn select_reply<'a>(candidates: &[&'a str], message_count: usize) -> &'a str {
    candidates[message_count % candidates.len()]
}

/// Advances the session's stage for one inbound message and returns the
/// outbound reply. Transitions and notable detections land in `notes`.
pub fn advance(session: &mut ConversationSession, inbound_text: &str) -> String {
    let lower = inbound_text.to_lowercase();
    let message_count = session.message_count();

    match session.stage {
        EngagementStage::Initial => {
            session.advance_stage(EngagementStage::Engaged);
            session.note("Initial engagement - showing concern");

            let reply = if lower.contains("block") || lower.contains("suspend") {
                INITIAL_REPLIES[0]
            } else if lower.contains("verify") || lower.contains("confirm") {
                INITIAL_REPLIES[1]
            } else {
                INITIAL_REPLIES[3]
            };
            reply.to_string()
        }
        EngagementStage::Engaged => {
            if contains_any(&lower, CREDENTIAL_TERMS) {
                session.advance_stage(EngagementStage::Extraction);
                session.note("Scammer requesting sensitive info - showing hesitation");
                select_reply(HESITATION_REPLIES, message_count).to_string()
            } else if contains_any(&lower, LINK_TERMS) {
                session.note("Phishing link detected");
                LINK_CAUTION_REPLY.to_string()
            } else {
                select_reply(PROBING_REPLIES, message_count).to_string()
            }
        }
        EngagementStage::Extraction => {
            let intel_count = session.intelligence.identifier_count();
            if intel_count >= INTEL_TARGET || message_count >= EXTRACTION_MESSAGE_CAP {
                session.advance_stage(EngagementStage::Closing);
                session.note("Sufficient intelligence gathered");
                DISENGAGE_REPLY.to_string()
            } else if lower.contains("upi") {
                UPI_STALL.to_string()
            } else if lower.contains("account") {
                ACCOUNT_STALL.to_string()
            } else if lower.contains("otp") || lower.contains("code") {
                OTP_STALL.to_string()
            } else {
                FALLBACK_STALL.to_string()
            }
        }
        EngagementStage::Closing => CLOSING_REPLY.to_string(),
    }
}

fn contains_any(input: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| input.contains(needle))
}

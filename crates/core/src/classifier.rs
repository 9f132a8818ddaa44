use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::{Message, Sender};
use crate::patterns::{self, ScamCategory};

/// Scoring thresholds as data. The defaults are the calibration the system
/// ships with; the scam threshold may be overridden from configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub one_category: f32,
    pub two_categories: f32,
    pub three_plus_categories: f32,
    pub threat_financial_boost: f32,
    pub threat_financial_cap: f32,
    pub urgency_verification_boost: f32,
    pub urgency_verification_cap: f32,
    pub history_escalation_boost: f32,
    pub history_escalation_cap: f32,
    pub history_window: usize,
    pub scam_threshold: f32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            one_category: 0.50,
            two_categories: 0.70,
            three_plus_categories: 0.85,
            threat_financial_boost: 0.15,
            threat_financial_cap: 0.95,
            urgency_verification_boost: 0.10,
            urgency_verification_cap: 0.90,
            history_escalation_boost: 0.05,
            history_escalation_cap: 0.95,
            history_window: 3,
            scam_threshold: 0.50,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Classification {
    pub is_scam: bool,
    pub confidence: f32,
    pub categories: BTreeMap<ScamCategory, Vec<&'static str>>,
}

static ESCALATION_TOKENS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"urgent|immediately|now").expect("escalation regex"));

/// Pure: identical input always yields identical output. Absence of any
/// signal degrades to a zero-confidence non-scam result, never an error.
pub fn classify(text: &str, history: &[Message], config: &ScoringConfig) -> Classification {
    let lower = text.to_lowercase();
    let categories = patterns::match_categories(&lower);

    let mut confidence = match categories.len() {
        0 => 0.0,
        1 => config.one_category,
        2 => config.two_categories,
        _ => config.three_plus_categories,
    };

    if categories.contains_key(&ScamCategory::Threats)
        && categories.contains_key(&ScamCategory::Financial)
    {
        confidence = apply_boost(
            confidence,
            config.threat_financial_boost,
            config.threat_financial_cap,
        );
    }

    if categories.contains_key(&ScamCategory::Urgency)
        && categories.contains_key(&ScamCategory::Verification)
    {
        confidence = apply_boost(
            confidence,
            config.urgency_verification_boost,
            config.urgency_verification_cap,
        );
    }

    let escalating = history
        .iter()
        .rev()
        .take(config.history_window)
        .filter(|message| message.sender == Sender::Scammer)
        .any(|message| ESCALATION_TOKENS.is_match(&message.text.to_lowercase()));
    if escalating {
        confidence = apply_boost(
            confidence,
            config.history_escalation_boost,
            config.history_escalation_cap,
        );
    }

    Classification {
        is_scam: confidence >= config.scam_threshold,
        confidence,
        categories,
    }
}

fn apply_boost(confidence: f32, boost: f32, cap: f32) -> f32 {
    (confidence + boost).min(cap)
}

use std::collections::{BTreeMap, BTreeSet};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScamCategory {
    Urgency,
    Threats,
    Financial,
    Verification,
    Rewards,
    Impersonation,
}

impl ScamCategory {
    pub const ALL: [ScamCategory; 6] = [
        Self::Urgency,
        Self::Threats,
        Self::Financial,
        Self::Verification,
        Self::Rewards,
        Self::Impersonation,
    ];

    pub fn as_code(self) -> &'static str {
        match self {
            Self::Urgency => "urgency",
            Self::Threats => "threats",
            Self::Financial => "financial",
            Self::Verification => "verification",
            Self::Rewards => "rewards",
            Self::Impersonation => "impersonation",
        }
    }

    pub fn pattern_sources(self) -> &'static [&'static str] {
        match self {
            Self::Urgency => &[
                r"urgent",
                r"immediately",
                r"right now",
                r"within \d+ (hour|minute)",
                r"expire",
                r"limited time",
                r"act fast",
                r"hurry",
            ],
            Self::Threats => &[
                r"blocked",
                r"suspend",
                r"deactivate",
                r"freeze",
                r"lock",
                r"legal action",
                r"arrest",
                r"police",
                r"court",
                r"fine",
            ],
            Self::Financial => &[
                r"bank account",
                r"credit card",
                r"debit card",
                r"upi",
                r"paytm",
                r"gpay",
                r"phonepe",
                r"transaction",
                r"payment",
                r"refund",
                r"cvv",
                r"pin",
                r"otp",
                r"account number",
                r"ifsc",
            ],
            Self::Verification => &[
                r"verify",
                r"confirm",
                r"validate",
                r"update.*detail",
                r"share.*detail",
                r"provide.*information",
                r"enter.*code",
            ],
            Self::Rewards => &[
                r"won",
                r"prize",
                r"lottery",
                r"reward",
                r"cashback",
                r"free",
                r"gift",
                r"bonus",
                r"offer",
            ],
            Self::Impersonation => &[
                r"bank",
                r"government",
                r"tax department",
                r"police",
                r"customer care",
                r"support team",
                r"official",
                r"authorized",
            ],
        }
    }
}

static COMPILED: Lazy<Vec<(ScamCategory, Vec<(&'static str, Regex)>)>> = Lazy::new(|| {
    ScamCategory::ALL
        .into_iter()
        .map(|category| {
            let regexes = category
                .pattern_sources()
                .iter()
                .map(|source| {
                    let regex = Regex::new(source)
                        .unwrap_or_else(|err| panic!("invalid pattern {source:?}: {err}"));
                    (*source, regex)
                })
                .collect();
            (category, regexes)
        })
        .collect()
});

/// Pattern sources that matched `text_lower`, grouped by category. A category
/// appears at most once no matter how many of its patterns hit.
pub fn match_categories(text_lower: &str) -> BTreeMap<ScamCategory, Vec<&'static str>> {
    let mut matched = BTreeMap::new();
    for (category, regexes) in COMPILED.iter() {
        let hits: Vec<&'static str> = regexes
            .iter()
            .filter(|(_, regex)| regex.is_match(text_lower))
            .map(|(source, _)| *source)
            .collect();
        if !hits.is_empty() {
            matched.insert(*category, hits);
        }
    }
    matched
}

/// The first literal substring each matching pattern produced, lower-cased.
pub fn matched_keywords(text_lower: &str) -> BTreeSet<String> {
    let mut keywords = BTreeSet::new();
    for (_, regexes) in COMPILED.iter() {
        for (_, regex) in regexes {
            if let Some(found) = regex.find(text_lower) {
                keywords.insert(found.as_str().to_string());
            }
        }
    }
    keywords
}

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::ScamIntelligence;
use crate::patterns;

static BANK_GROUPED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{4}[-\s]?\d{4}[-\s]?\d{4,6}\b").expect("bank grouped regex"));
static BANK_BARE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{10,18}\b").expect("bank bare regex"));
static HANDLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[\w.-]+@[\w.-]+\b").expect("handle regex"));
static URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://\S+").expect("url regex"));
static PHONE_WITH_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\+?\d{1,3}[-.\s]?\d{10}").expect("phone regex"));
static PHONE_BARE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{10}\b").expect("phone bare regex"));

const UPI_PROVIDERS: &[&str] = &[
    "upi", "paytm", "gpay", "phonepe", "ybl", "okaxis", "okhdfcbank",
];

/// Pulls identifiers out of a single message. Rules apply independently, so
/// one token may land in more than one set. Values dedupe on merge.
pub fn extract(text: &str) -> ScamIntelligence {
    let mut intel = ScamIntelligence::default();

    for found in BANK_GROUPED.find_iter(text).chain(BANK_BARE.find_iter(text)) {
        intel.bank_accounts.insert(normalize_digits(found.as_str()));
    }

    for found in HANDLE.find_iter(text) {
        let handle = found.as_str();
        if let Some((_, domain)) = handle.rsplit_once('@') {
            let domain = domain.to_lowercase();
            if UPI_PROVIDERS.iter().any(|provider| domain.contains(provider)) {
                intel.upi_ids.insert(handle.to_string());
            }
        }
    }

    for found in URL.find_iter(text) {
        intel.phishing_links.insert(found.as_str().to_string());
    }

    for found in PHONE_WITH_CODE
        .find_iter(text)
        .chain(PHONE_BARE.find_iter(text))
    {
        intel.phone_numbers.insert(found.as_str().to_string());
    }

    intel.suspicious_keywords = patterns::matched_keywords(&text.to_lowercase());

    intel
}

fn normalize_digits(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

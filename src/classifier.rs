//! Category Classifier
//!
//! Assigns a spending category to a transaction description by scanning an
//! ordered keyword table. First match wins; descriptions that match nothing
//! fall back to "unknown".

/// Static keyword table — zero allocation. Order matters: earlier categories
/// take precedence when keywords overlap.
const CATEGORY_KEYWORDS: &[(&str, &[&str])] = &[
    ("food", &["zomato", "swiggy", "food", "dominos"]),
    ("study", &["book", "tuition", "exam", "school", "coaching"]),
    (
        "fashion",
        &["myntra", "ajio", "clothing", "zara", "pants", "shirt"],
    ),
    ("hostel", &["hostel", "room rent", "pg", "accommodation"]),
    ("college", &["college", "university", "fee", "semester"]),
    ("bank", &["modification charges", "atm fee", "sms charge"]),
    ("cash_withdrawal", &["aeps", "atm", "cash", "cw", "withdraw"]),
    (
        "transfer",
        &["p2p", "p2v", "upi", "to", "from", "@", "imps", "rtgs"],
    ),
];

pub const UNKNOWN_TAG: &str = "unknown";

/// Rule-based transaction tagger
pub struct RuleBasedTagClassifier;

impl RuleBasedTagClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Classify a free-text transaction description into a category tag.
    pub fn classify(&self, description: &str) -> &'static str {
        let description = description.to_lowercase();

        for &(tag, keywords) in CATEGORY_KEYWORDS {
            if keywords.iter().any(|kw| description.contains(*kw)) {
                return tag;
            }
        }

        UNKNOWN_TAG
    }
}

impl Default for RuleBasedTagClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_categories() {
        let classifier = RuleBasedTagClassifier::new();

        assert_eq!(classifier.classify("ZOMATO ORDER 12345"), "food");
        assert_eq!(classifier.classify("Semester fee payment"), "college");
        assert_eq!(classifier.classify("ATM CW 4402"), "cash_withdrawal");
        assert_eq!(classifier.classify("UPI/P2P/4429/rent"), "transfer");
    }

    #[test]
    fn test_first_match_wins() {
        // "food" precedes "transfer" in the table even though "to" also matches.
        let classifier = RuleBasedTagClassifier::new();
        assert_eq!(classifier.classify("swiggy paid to merchant"), "food");
    }

    #[test]
    fn test_unknown_fallback() {
        let classifier = RuleBasedTagClassifier::new();
        assert_eq!(classifier.classify("xyzzy 9981"), UNKNOWN_TAG);
    }
}

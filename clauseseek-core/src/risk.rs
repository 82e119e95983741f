//! Lexical risk classification of composed answers.
//!
//! A pure function over the lowercased answer text. High-risk cues are always
//! checked before medium-risk ones, so a co-occurring high keyword wins.

use crate::types::RiskLevel;

/// Cues that mark an answer as high risk.
pub const HIGH_RISK_KEYWORDS: &[&str] = &[
    "terminate immediately",
    "material breach",
    "liquidated damages",
    "penalty",
    "default",
    "forfeit",
];

/// Cues that mark an answer as medium risk. `indemn` covers indemnify,
/// indemnification and indemnity.
pub const MEDIUM_RISK_KEYWORDS: &[&str] = &[
    "notice",
    "30 days",
    "cure period",
    "renewal",
    "termination",
    "late fee",
    "indemn",
];

/// Classify `answer` as high, medium or low risk.
pub fn classify_risk(answer: &str) -> RiskLevel {
    let lowered = answer.to_lowercase();
    if HIGH_RISK_KEYWORDS.iter().any(|k| lowered.contains(k)) {
        RiskLevel::High
    } else if MEDIUM_RISK_KEYWORDS.iter().any(|k| lowered.contains(k)) {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_high_keyword() {
        assert_eq!(
            classify_risk("The tenant shall pay a PENALTY of $500."),
            RiskLevel::High
        );
    }

    #[test]
    fn test_medium_keyword() {
        assert_eq!(
            classify_risk("Landlord must give 30 days notice before termination."),
            RiskLevel::Medium
        );
        assert_eq!(
            classify_risk("The insurer will indemnify the policyholder."),
            RiskLevel::Medium
        );
    }

    #[test]
    fn test_high_wins_over_medium() {
        assert_eq!(
            classify_risk("After notice, a material breach allows termination."),
            RiskLevel::High
        );
    }

    #[test]
    fn test_low_when_no_cue() {
        assert_eq!(
            classify_risk("Tenant is not responsible for water damage."),
            RiskLevel::Low
        );
        assert_eq!(classify_risk(""), RiskLevel::Low);
    }

    #[test]
    fn test_deterministic() {
        let text = "Late fee applies after the cure period.";
        let first = classify_risk(text);
        for _ in 0..10 {
            assert_eq!(classify_risk(text), first);
        }
    }
}

//! Pattern-based classification of relayed user utterances.
//!
//! Negative phrasing always wins: "yes, no wait" is a rejection, and so is
//! any negated confirmation ("not sure", "that isn't right"). An
//! utterance that mixes a rejection with a correction ("no, use 2 ETH") is a
//! rejection too; the correction has to come back through `verify`.

use std::sync::LazyLock;

use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Utterance {
    Confirm,
    Reject,
    Acknowledge,
    Other,
}

static REJECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(no|nope|nah|not|cannot|never|wrong|incorrect|cancel|stop|abort|negative|wait|(do|does|did|is|are|was|were|can|could|would|should|wo|ai|has|have|had|need|must)n['’]?t)\b",
    )
    .expect("valid reject pattern")
});

static ACKNOWLEDGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(acknowledge[sd]?|i accept the risks?|accept the risks?|proceed anyway|continue anyway|i understand the risks?)\b",
    )
    .expect("valid acknowledge pattern")
});

static CONFIRM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(yes|yeah|yep|yup|correct|right|confirm(ed)?|affirmative|sure|go ahead|do it|execute|proceed|ok(ay)?)\b",
    )
    .expect("valid confirm pattern")
});

/// Classify a relayed utterance.
pub fn classify(text: &str) -> Utterance {
    let text = text.trim();
    if text.is_empty() {
        return Utterance::Other;
    }
    if REJECT.is_match(text) {
        Utterance::Reject
    } else if ACKNOWLEDGE.is_match(text) {
        Utterance::Acknowledge
    } else if CONFIRM.is_match(text) {
        Utterance::Confirm
    } else {
        Utterance::Other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirmations() {
        for text in ["yes", "Yes, that's correct", "yep", "go ahead", "Execute", "that's right"] {
            assert_eq!(classify(text), Utterance::Confirm, "{text}");
        }
    }

    #[test]
    fn rejections_win_over_confirmations() {
        for text in ["no", "No, that's wrong, use 2 ETH", "yes, no wait", "cancel", "stop"] {
            assert_eq!(classify(text), Utterance::Reject, "{text}");
        }
    }

    #[test]
    fn negated_confirmations_are_rejections() {
        for text in [
            "I'm not sure",
            "hmm, I'm not sure",
            "that's not right",
            "not correct",
            "not okay",
            "that isn't right",
            "I don't think so",
            "dont do it",
            "I can’t confirm that",
            "never mind",
        ] {
            assert_eq!(classify(text), Utterance::Reject, "{text}");
        }
    }

    #[test]
    fn acknowledgement_needs_explicit_wording() {
        assert_eq!(classify("I acknowledge"), Utterance::Acknowledge);
        assert_eq!(classify("proceed anyway"), Utterance::Acknowledge);
        assert_eq!(classify("I accept the risk"), Utterance::Acknowledge);
        assert_eq!(classify("yes"), Utterance::Confirm);
    }

    #[test]
    fn words_ending_in_nt_are_not_negations() {
        assert_eq!(classify("yes, the amount is right"), Utterance::Confirm);
        assert_eq!(classify("I want to confirm"), Utterance::Confirm);
    }

    #[test]
    fn unrelated_text_is_other() {
        assert_eq!(classify("what's the weather"), Utterance::Other);
        assert_eq!(classify("   "), Utterance::Other);
        assert_eq!(classify("knowledge is power"), Utterance::Other);
    }
}

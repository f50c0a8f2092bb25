//! Scanner decision mapping.

use serde::{Deserialize, Serialize};

/// Risk decision returned by a security scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanDecision {
    Allow,
    Warn,
    Block,
    Escalate,
    Offline,
}

impl ScanDecision {
    /// Map a scanner's decision label. Unknown labels escalate so a new
    /// scanner verdict can never pass silently.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_uppercase().as_str() {
            "ALLOW" | "PASS" | "SAFE" => Self::Allow,
            "WARN" | "WARNING" => Self::Warn,
            "BLOCK" | "DENY" | "REJECT" => Self::Block,
            "OFFLINE" => Self::Offline,
            _ => Self::Escalate,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Allow => "ALLOW",
            Self::Warn => "WARN",
            Self::Block => "BLOCK",
            Self::Escalate => "ESCALATE",
            Self::Offline => "OFFLINE",
        }
    }

    /// Decisions that hold the command until the user acknowledges.
    pub fn requires_acknowledgement(self) -> bool {
        matches!(self, Self::Warn | Self::Escalate | Self::Offline)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SecurityScanResult {
    pub decision: ScanDecision,
    pub reason: String,
    pub risk_score: f64,
    pub summary: String,
}

impl SecurityScanResult {
    /// Result used whenever the scanner cannot be reached.
    pub fn offline() -> Self {
        Self {
            decision: ScanDecision::Offline,
            reason: "Kairo security service is currently unavailable".to_string(),
            risk_score: 0.0,
            summary: "Unable to connect to Kairo API".to_string(),
        }
    }

    /// Vulnerability classes named in the summary, used for the
    /// `SCAN_RESULT` event.
    pub fn issues(&self) -> Vec<String> {
        if self.decision == ScanDecision::Allow || self.summary.trim().is_empty() {
            return Vec::new();
        }
        self.summary
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_labels_escalate() {
        assert_eq!(ScanDecision::from_label("allow"), ScanDecision::Allow);
        assert_eq!(ScanDecision::from_label("BLOCK"), ScanDecision::Block);
        assert_eq!(ScanDecision::from_label("needs_review"), ScanDecision::Escalate);
        assert_eq!(ScanDecision::from_label(""), ScanDecision::Escalate);
    }

    #[test]
    fn offline_requires_acknowledgement_and_never_allows() {
        let offline = SecurityScanResult::offline();
        assert_eq!(offline.decision, ScanDecision::Offline);
        assert!(offline.decision.requires_acknowledgement());
        assert!(!ScanDecision::Allow.requires_acknowledgement());
        assert!(!ScanDecision::Block.requires_acknowledgement());
    }

    #[test]
    fn issues_split_summary_for_non_allow_results() {
        let result = SecurityScanResult {
            decision: ScanDecision::Block,
            reason: "Critical".to_string(),
            risk_score: 9.5,
            summary: "CWE-841: Re-entrancy Attack; CWE-477: Dangerous Self-Destruct".to_string(),
        };
        assert_eq!(
            result.issues(),
            vec![
                "CWE-841: Re-entrancy Attack".to_string(),
                "CWE-477: Dangerous Self-Destruct".to_string()
            ]
        );
    }
}

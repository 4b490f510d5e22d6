//! Handoff and review signal extraction.
//!
//! Role outputs are free text; the only structure the orchestrator relies
//! on is a literal marker token. All detection lives behind one function
//! so the state machine never touches raw text scanning.

use serde::{Deserialize, Serialize};

/// The literal markers roles must emit. Configurable so deployments can
/// pick tokens their models reproduce reliably.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalTokens {
    #[serde(default = "default_handoff")]
    pub handoff: String,
    #[serde(default = "default_approve")]
    pub approve: String,
    #[serde(default = "default_revise")]
    pub revise: String,
}

fn default_handoff() -> String {
    "HANDOFF".to_string()
}

fn default_approve() -> String {
    "APPROVED".to_string()
}

fn default_revise() -> String {
    "REVISE".to_string()
}

impl Default for SignalTokens {
    fn default() -> Self {
        Self {
            handoff: default_handoff(),
            approve: default_approve(),
            revise: default_revise(),
        }
    }
}

/// What a role's output signalled about its turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// The turn is complete; hand off to the next role.
    Handoff,
    /// Critic accepted the draft.
    Approved,
    /// Critic wants another Writer pass.
    RevisionRequested,
    /// No recognized marker found.
    Missing,
}

/// Extract the completion signal from a role's output text.
///
/// Review tokens take priority over the plain handoff token. When both
/// review tokens appear (a critic quoting its own instructions, say), the
/// one occurring last in the text wins.
pub fn extract_signal(text: &str, tokens: &SignalTokens) -> Signal {
    let approve_pos = text.rfind(&tokens.approve);
    let revise_pos = text.rfind(&tokens.revise);

    match (approve_pos, revise_pos) {
        (Some(a), Some(r)) => {
            if a > r {
                return Signal::Approved;
            }
            return Signal::RevisionRequested;
        }
        (Some(_), None) => return Signal::Approved,
        (None, Some(_)) => return Signal::RevisionRequested,
        (None, None) => {}
    }

    if text.contains(&tokens.handoff) {
        Signal::Handoff
    } else {
        Signal::Missing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens() -> SignalTokens {
        SignalTokens::default()
    }

    #[test]
    fn test_handoff_detected() {
        let text = "Here is my research plan.\n1. Search for papers.\n\nHANDOFF";
        assert_eq!(extract_signal(text, &tokens()), Signal::Handoff);
    }

    #[test]
    fn test_missing_when_no_marker() {
        let text = "Here is my research plan with no marker at all.";
        assert_eq!(extract_signal(text, &tokens()), Signal::Missing);
    }

    #[test]
    fn test_approval_detected() {
        let text = "The draft addresses the query with solid citations. APPROVED";
        assert_eq!(extract_signal(text, &tokens()), Signal::Approved);
    }

    #[test]
    fn test_revision_detected() {
        let text = "The second section lacks citations. REVISE";
        assert_eq!(extract_signal(text, &tokens()), Signal::RevisionRequested);
    }

    #[test]
    fn test_last_review_token_wins() {
        let text = "I will answer APPROVED or REVISE. My verdict: APPROVED";
        assert_eq!(extract_signal(text, &tokens()), Signal::Approved);

        let text = "I will answer APPROVED if acceptable. Verdict: REVISE";
        assert_eq!(extract_signal(text, &tokens()), Signal::RevisionRequested);
    }

    #[test]
    fn test_review_token_beats_handoff() {
        let text = "Good work overall. HANDOFF considerations aside: APPROVED";
        assert_eq!(extract_signal(text, &tokens()), Signal::Approved);
    }

    #[test]
    fn test_custom_tokens() {
        let custom = SignalTokens {
            handoff: "<<DONE>>".to_string(),
            approve: "<<SHIP>>".to_string(),
            revise: "<<REDO>>".to_string(),
        };
        assert_eq!(extract_signal("finished. <<DONE>>", &custom), Signal::Handoff);
        assert_eq!(extract_signal("fine. <<SHIP>>", &custom), Signal::Approved);
        assert_eq!(extract_signal("HANDOFF", &custom), Signal::Missing);
    }
}

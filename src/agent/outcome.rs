use crate::bridge::Error as BridgeError;
use crate::provider::Error as ModelError;
use thiserror::Error;

/// How a turn ended when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The model answered without requesting tools.
    Done { text: String, iterations: usize },
    /// The model kept requesting tools until the per-turn cap.
    IterationCapReached { iterations: usize },
}

impl TurnOutcome {
    #[must_use]
    pub fn final_text(&self) -> Option<&str> {
        match self {
            Self::Done { text, .. } => Some(text),
            Self::IterationCapReached { .. } => None,
        }
    }
}

/// A turn that had to be aborted.
#[derive(Debug, Clone, Error)]
pub enum TurnError {
    /// The model could not be queried. The conversation and session survive.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// The bridge became unusable for this session.
    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

impl TurnError {
    /// Whether the conversation must end (as opposed to just this turn).
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Model(_) => false,
            Self::Bridge(e) => e.is_fatal(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_fatality() {
        assert!(!TurnError::Model(ModelError::Timeout(Duration::from_secs(60))).is_fatal());
        assert!(
            TurnError::Bridge(BridgeError::Connection {
                url: "http://bridge".into(),
                message: "refused".into()
            })
            .is_fatal()
        );
    }

    #[test]
    fn test_final_text() {
        let done = TurnOutcome::Done {
            text: "Port 22 is open.".into(),
            iterations: 2,
        };
        assert_eq!(done.final_text(), Some("Port 22 is open."));
        assert_eq!(
            TurnOutcome::IterationCapReached { iterations: 10 }.final_text(),
            None
        );
    }
}

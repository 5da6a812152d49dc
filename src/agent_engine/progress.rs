//! Phase transitions and screen-stall detection over a [`TaskState`].

use crate::agent_engine::state::{Action, TaskPhase, TaskState};

/// A tap whose comment mentions one of these starts the search phase.
const SEARCH_KEYWORDS: [&str; 5] = ["search", "input", "field", "box", "bar"];

/// How many of the most recent fingerprints count towards a stall.
pub const STALL_WINDOW: usize = 3;

impl TaskState {
    /// Moves the phase forward based on an executed action. Never regresses.
    pub fn advance_phase(&mut self, executed: &Action) {
        let next = match executed {
            Action::Tap { comment, .. } => {
                let comment = comment.to_lowercase();
                if SEARCH_KEYWORDS.iter().any(|k| comment.contains(k)) {
                    TaskPhase::SearchStarted
                } else {
                    self.phase
                }
            }
            Action::Type { .. } => TaskPhase::QueryEntered,
            Action::Scroll { .. } | Action::Complete { .. } => self.phase,
        };

        if next > self.phase {
            tracing::debug!(from = ?self.phase, to = ?next, "task phase advanced");
            self.phase = next;
        }
    }

    /// True when `fingerprint` is among the last [`STALL_WINDOW`] recorded ones.
    /// Must be checked before [`record_fingerprint`](Self::record_fingerprint).
    pub fn is_stalled(&self, fingerprint: &str) -> bool {
        self.screen_hash_history
            .recent(STALL_WINDOW)
            .any(|h| h == fingerprint)
    }

    pub fn record_fingerprint(&mut self, fingerprint: String) {
        self.screen_hash_history.push(fingerprint);
    }
}

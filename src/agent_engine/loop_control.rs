use crate::agent_engine::history::BoundedHistory;
use crate::agent_engine::state::Action;

/// How many of the most recent tap identities are inspected for repeats.
pub const REPETITION_WINDOW: usize = 4;

/// Outcome of vetting one action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Execute(Action),
    /// The candidate was refused; run this instead.
    Substitute(Action),
}

impl Admission {
    pub fn into_action(self) -> Action {
        match self {
            Admission::Execute(a) | Admission::Substitute(a) => a,
        }
    }
}

/// Refuses a tap once its coordinates already appear `threshold` times in
/// the last [`REPETITION_WINDOW`] admitted taps.
#[derive(Debug, Clone)]
pub struct LoopGuard {
    threshold: usize,
}

impl LoopGuard {
    pub fn new(threshold: usize) -> Self {
        Self { threshold }
    }

    /// Only taps are tracked. A refused tap is not recorded.
    pub fn admit(&self, action: Action, history: &mut BoundedHistory<String>) -> Admission {
        let Some(identity) = action.tap_identity() else {
            return Admission::Execute(action);
        };

        let repeats = history.count_recent(REPETITION_WINDOW, &identity);
        if repeats >= self.threshold {
            tracing::warn!(
                target_tap = %identity,
                repeats,
                threshold = self.threshold,
                "repetitive tap refused, scrolling instead"
            );
            return Admission::Substitute(Action::scroll_down());
        }

        history.push(identity);
        Admission::Execute(action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent_engine::state::ACTION_HISTORY_CAP;

    fn tap(x: i32, y: i32) -> Action {
        Action::Tap { x, y, comment: "t".into() }
    }

    fn history_of(ids: &[&str]) -> BoundedHistory<String> {
        let mut h = BoundedHistory::new(ACTION_HISTORY_CAP);
        for id in ids {
            h.push(id.to_string());
        }
        h
    }

    #[test]
    fn third_repeat_is_substituted_and_not_recorded() {
        let guard = LoopGuard::new(2);
        let mut history = history_of(&["TAP(50,50)", "TAP(10,10)", "TAP(50,50)"]);

        let decision = guard.admit(tap(50, 50), &mut history);
        assert_eq!(decision, Admission::Substitute(Action::scroll_down()));
        assert_eq!(history.len(), 3);

        let decision = guard.admit(tap(60, 60), &mut history);
        assert_eq!(decision, Admission::Execute(tap(60, 60)));
        assert_eq!(history.iter().last().map(String::as_str), Some("TAP(60,60)"));
    }

    #[test]
    fn repeats_outside_window_do_not_count() {
        let guard = LoopGuard::new(2);
        let mut history = history_of(&[
            "TAP(50,50)",
            "TAP(50,50)",
            "TAP(1,1)",
            "TAP(2,2)",
            "TAP(3,3)",
            "TAP(4,4)",
        ]);
        assert!(matches!(guard.admit(tap(50, 50), &mut history), Admission::Execute(_)));
    }

    #[test]
    fn non_tap_actions_bypass_the_guard() {
        let guard = LoopGuard::new(1);
        let mut history = BoundedHistory::new(ACTION_HISTORY_CAP);
        for _ in 0..5 {
            let d = guard.admit(Action::scroll_down(), &mut history);
            assert_eq!(d, Admission::Execute(Action::scroll_down()));
        }
        let typed = Action::Type { text: "melon".into() };
        assert_eq!(guard.admit(typed.clone(), &mut history), Admission::Execute(typed));
        assert!(history.is_empty());
    }

    #[test]
    fn higher_threshold_allows_more_repeats() {
        let guard = LoopGuard::new(3);
        let mut history = BoundedHistory::new(ACTION_HISTORY_CAP);
        for _ in 0..3 {
            assert!(matches!(guard.admit(tap(5, 5), &mut history), Admission::Execute(_)));
        }
        assert!(matches!(guard.admit(tap(5, 5), &mut history), Admission::Substitute(_)));
    }
}

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::agent_engine::history::BoundedHistory;

/// Number of recent tap identities kept by the loop guard.
pub const ACTION_HISTORY_CAP: usize = 10;
/// Number of recent screen fingerprints kept for stall detection.
pub const SCREEN_HASH_HISTORY_CAP: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrollDirection {
    Up,
    Down,
}

impl fmt::Display for ScrollDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScrollDirection::Up => f.write_str("up"),
            ScrollDirection::Down => f.write_str("down"),
        }
    }
}

/// One device operation. `x`/`y` are device pixels, already scaled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    Tap { x: i32, y: i32, comment: String },
    Type { text: String },
    Scroll { direction: ScrollDirection },
    Complete { message: String },
}

impl Action {
    pub fn scroll_down() -> Self {
        Action::Scroll {
            direction: ScrollDirection::Down,
        }
    }

    /// Comment-free identity used by the loop guard; `None` for non-tap actions.
    pub fn tap_identity(&self) -> Option<String> {
        match self {
            Action::Tap { x, y, .. } => Some(format!("TAP({x},{y})")),
            _ => None,
        }
    }
}

/// Renders the action in the wire mini-language, so that parsing the output
/// with a unit scale yields the same action.
impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Tap { x, y, comment } => write!(f, "TAP ({x},{y}) # {comment}"),
            Action::Type { text } => write!(f, "TYPE '{text}'"),
            Action::Scroll { direction } => write!(f, "SCROLL {direction}"),
            Action::Complete { message } => write!(f, "TASK_COMPLETE: {message}"),
        }
    }
}

/// Coarse task progress. Ordered: a phase never moves backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPhase {
    SearchPending,
    SearchStarted,
    QueryEntered,
}

/// Per-task mutable state. Created fresh for every task and dropped with it.
#[derive(Debug, Clone)]
pub struct TaskState {
    pub phase: TaskPhase,
    /// 1-based number of the step in progress; 0 before the first step.
    pub step: u32,
    pub max_steps: u32,
    pub action_history: BoundedHistory<String>,
    pub screen_hash_history: BoundedHistory<String>,
}

impl TaskState {
    pub fn new(max_steps: u32) -> Self {
        Self {
            phase: TaskPhase::SearchPending,
            step: 0,
            max_steps,
            action_history: BoundedHistory::new(ACTION_HISTORY_CAP),
            screen_hash_history: BoundedHistory::new(SCREEN_HASH_HISTORY_CAP),
        }
    }

    pub fn advance_step(&mut self) -> u32 {
        self.step += 1;
        self.step
    }

    /// Zero-based index of the current step, used to cycle fallback lists.
    pub fn step_index(&self) -> usize {
        self.step.saturating_sub(1) as usize
    }

    pub fn budget_exhausted(&self) -> bool {
        self.step >= self.max_steps
    }
}

/// How a task run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskStatus {
    Completed { message: String },
    Exhausted { steps: u32 },
    LaunchFailed,
}

impl TaskStatus {
    /// The caller-facing result string.
    pub fn summary(&self) -> String {
        match self {
            TaskStatus::Completed { message } => message.clone(),
            TaskStatus::Exhausted { steps } => {
                format!("Task stopped after {steps} steps without completion")
            }
            TaskStatus::LaunchFailed => "Failed to launch target application".into(),
        }
    }
}

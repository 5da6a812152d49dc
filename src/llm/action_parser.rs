//! Turns a free-text model reply into a typed [`Action`].
//!
//! Wire grammar, one action per line:
//!
//! ```text
//! TAP (<x>,<y>) [# <comment>]
//! TYPE '<text>' [# <comment>]      (single or double quotes)
//! SCROLL up|down [# <comment>]
//! TASK_COMPLETE[: <message>]
//! ```
//!
//! Lines are scanned in order and the first one matching any pattern wins;
//! within a line the priority is TAP, TYPE, SCROLL, TASK_COMPLETE. Blank
//! lines and lines starting with `#` or a code fence are skipped. If no line
//! matches, the same priority is tried once more against the whole reply,
//! which covers models that drop line breaks.
//!
//! Tap coordinates are rescaled here and nowhere else.

use std::sync::LazyLock;

use regex::Regex;

use crate::agent_engine::state::{Action, ScrollDirection};
use crate::perception::types::ScaleFactor;

const DEFAULT_TAP_COMMENT: &str = "scaled coordinates";
const RECOVERED_TAP_COMMENT: &str = "extracted and scaled";
pub const DEFAULT_COMPLETION_MESSAGE: &str = "Task completed successfully";

static TAP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"TAP\s*\((\d+),\s*(\d+)\)").expect("tap pattern"));
static TYPE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"TYPE\s*(?:'([^']+)'|"([^"]+)")"#).expect("type pattern")
});
static SCROLL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)scroll").expect("scroll pattern"));
static SCROLL_DIRECTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)scroll.*?\b(up|down)\b").expect("direction pattern"));
static COMPLETE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)task_complete").expect("complete pattern"));
static COMPLETE_MESSAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)task_complete:\s*(.+)").expect("message pattern"));

/// Extracts one action from `raw`, or `None` when nothing actionable is found.
pub fn parse(raw: &str, scale: ScaleFactor) -> Option<Action> {
    let raw = raw.trim();

    for line in raw.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') || line.starts_with("```") {
            continue;
        }
        if let Some(action) = match_text(line, scale, Mode::Line) {
            return Some(action);
        }
    }

    let recovered = match_text(raw, scale, Mode::Recovery);
    if let Some(action) = &recovered {
        tracing::debug!(%action, "action recovered from unsplit reply");
    }
    recovered
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mode {
    Line,
    Recovery,
}

fn match_text(text: &str, scale: ScaleFactor, mode: Mode) -> Option<Action> {
    if let Some(action) = match_tap(text, scale, mode) {
        return Some(action);
    }

    if let Some(caps) = TYPE_RE.captures(text) {
        let typed = caps.get(1).or_else(|| caps.get(2))?;
        return Some(Action::Type {
            text: typed.as_str().to_string(),
        });
    }

    if SCROLL_RE.is_match(text) {
        let direction = match SCROLL_DIRECTION_RE
            .captures(text)
            .map(|c| c[1].to_ascii_lowercase())
            .as_deref()
        {
            Some("up") => ScrollDirection::Up,
            _ => ScrollDirection::Down,
        };
        return Some(Action::Scroll { direction });
    }

    if COMPLETE_RE.is_match(text) {
        let message = COMPLETE_MESSAGE_RE
            .captures(text)
            .map(|c| c[1].trim().to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| DEFAULT_COMPLETION_MESSAGE.to_string());
        return Some(Action::Complete { message });
    }

    None
}

fn match_tap(text: &str, scale: ScaleFactor, mode: Mode) -> Option<Action> {
    let caps = TAP_RE.captures(text)?;
    // Out-of-range digits are treated as no match rather than clamped.
    let x: u32 = caps[1].parse().ok()?;
    let y: u32 = caps[2].parse().ok()?;
    let (x, y) = scale.apply(x, y);

    let comment = match mode {
        Mode::Line => text
            .split_once('#')
            .map(|(_, c)| c.trim())
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_TAP_COMMENT),
        Mode::Recovery => RECOVERED_TAP_COMMENT,
    };

    Some(Action::Tap {
        x,
        y,
        comment: comment.to_string(),
    })
}

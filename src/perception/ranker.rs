//! Heuristic action selection over a parsed UI hierarchy, used when the
//! vision model gives nothing usable.

use crate::agent_engine::state::Action;
use crate::perception::types::{RankedElement, UIElement};

const MAX_SEARCH_CANDIDATES: usize = 5;
const MIN_CLICKABLE_WIDTH: i32 = 100;
const FALLBACK_LABEL_CHARS: usize = 30;

/// Additive relevance of an element as a way into search. 0 means unrelated.
pub fn search_relevance(element: &UIElement) -> i32 {
    let resource = element.resource_id.to_lowercase();
    let combined = format!(
        "{} {} {}",
        element.text.to_lowercase(),
        element.description.to_lowercase(),
        resource
    );
    let mentions = |words: &[&str], haystack: &str| words.iter().any(|w| haystack.contains(w));

    let mut score = 0;
    if mentions(&["search", "find"], &combined) {
        score += 5;
    }
    if element.class_name.to_lowercase().contains("edittext") {
        score += 4;
    }
    if mentions(&["search", "query", "input"], &resource) {
        score += 3;
    }
    if mentions(&["search", "magnify", "glass"], &combined) {
        score += 2;
    }
    if element.width > 200 && element.height > 30 {
        score += 1;
    }
    score
}

/// Top search candidates, best first. Equal scores keep snapshot order.
pub fn rank_search_candidates(elements: &[UIElement]) -> Vec<RankedElement> {
    let mut ranked: Vec<RankedElement> = elements
        .iter()
        .filter_map(|e| {
            let relevance_score = search_relevance(e);
            (relevance_score > 0).then(|| RankedElement {
                element: e.clone(),
                relevance_score,
            })
        })
        .collect();
    ranked.sort_by(|a, b| b.relevance_score.cmp(&a.relevance_score));
    ranked.truncate(MAX_SEARCH_CANDIDATES);
    ranked
}

pub fn clickable_candidates(elements: &[UIElement]) -> Vec<&UIElement> {
    elements
        .iter()
        .filter(|e| e.clickable && e.width > MIN_CLICKABLE_WIDTH)
        .collect()
}

/// Tap on the best search candidate, if any.
pub fn search_action(elements: &[UIElement]) -> Option<Action> {
    let best = rank_search_candidates(elements).into_iter().next()?;
    tracing::debug!(
        score = best.relevance_score,
        x = best.element.center_x,
        y = best.element.center_y,
        "search candidate selected"
    );
    Some(Action::Tap {
        x: best.element.center_x,
        y: best.element.center_y,
        comment: format!("Search: {}", best.element.label()),
    })
}

/// Cycles through the clickable elements by step so every one is eventually tried.
pub fn generate_fallback_action(elements: &[UIElement], step_index: usize) -> Option<Action> {
    let candidates = clickable_candidates(elements);
    if candidates.is_empty() {
        return None;
    }
    let chosen = candidates[step_index % candidates.len()];
    let label = match chosen.label() {
        "" => "interactive element",
        l => l,
    };
    Some(Action::Tap {
        x: chosen.center_x,
        y: chosen.center_y,
        comment: label.chars().take(FALLBACK_LABEL_CHARS).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(text: &str, class_name: &str, resource_id: &str, w: i32, h: i32) -> UIElement {
        UIElement {
            center_x: 100,
            center_y: 100,
            width: w,
            height: h,
            text: text.into(),
            description: String::new(),
            resource_id: resource_id.into(),
            class_name: class_name.into(),
            clickable: true,
            scrollable: false,
        }
    }

    #[test]
    fn search_field_outranks_large_box() {
        let big = element("Offers", "android.widget.FrameLayout", "", 600, 300);
        let field = element("Search products", "android.widget.EditText", "", 20, 20);
        assert_eq!(search_relevance(&big), 1);
        assert!(search_relevance(&field) >= 9);

        let ranked = rank_search_candidates(&[big.clone(), field.clone()]);
        assert_eq!(ranked[0].element, field);
        assert_eq!(ranked[1].element, big);
    }

    #[test]
    fn full_score_is_fifteen() {
        let e = element("search", "EditText", "id/search_input", 300, 60);
        assert_eq!(search_relevance(&e), 5 + 4 + 3 + 2 + 1);
    }

    #[test]
    fn ranking_is_stable_and_capped() {
        let elements: Vec<UIElement> = (0..8)
            .map(|i| {
                let mut e = element("find", "TextView", "", 10, 10);
                e.center_x = i;
                e
            })
            .collect();
        let first = rank_search_candidates(&elements);
        let second = rank_search_candidates(&elements);
        assert_eq!(first, second);
        assert_eq!(first.len(), 5);
        let xs: Vec<i32> = first.iter().map(|r| r.element.center_x).collect();
        assert_eq!(xs, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn zero_scores_are_excluded() {
        let e = element("Home", "TextView", "", 50, 20);
        assert!(rank_search_candidates(&[e]).is_empty());
    }

    #[test]
    fn fallback_cycles_clickables() {
        let mut narrow = element("narrow", "Button", "", 80, 80);
        narrow.center_x = 1;
        let mut a = element("", "Button", "", 150, 80);
        a.description = "A very long content description for a button".into();
        a.center_x = 2;
        let mut b = element("", "Button", "", 150, 80);
        b.center_x = 3;
        let elements = vec![narrow, a, b];

        let first = generate_fallback_action(&elements, 0).unwrap();
        assert_eq!(
            first,
            Action::Tap { x: 2, y: 100, comment: "A very long content descriptio".into() }
        );
        let second = generate_fallback_action(&elements, 1).unwrap();
        assert_eq!(second, Action::Tap { x: 3, y: 100, comment: "interactive element".into() });
        assert_eq!(generate_fallback_action(&elements, 2), Some(first));
    }

    #[test]
    fn fallback_needs_wide_clickables() {
        let mut e = element("x", "Button", "", 300, 80);
        e.clickable = false;
        assert_eq!(generate_fallback_action(&[e], 0), None);
        assert_eq!(generate_fallback_action(&[], 3), None);
    }

    #[test]
    fn search_action_uses_label() {
        let mut e = element("", "EditText", "id/search_box", 300, 60);
        e.description = "Search bar".into();
        let action = search_action(&[e]).unwrap();
        assert_eq!(action, Action::Tap { x: 100, y: 100, comment: "Search: Search bar".into() });
    }
}

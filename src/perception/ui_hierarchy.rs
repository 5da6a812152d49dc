//! UIAutomator hierarchy dump parsing.
//!
//! The dump is read as an event stream, which visits nodes in document
//! (pre-)order without recursing, so arbitrarily deep layouts are safe.
//! Nodes without a usable centre or without anything to act on are dropped.

use std::sync::LazyLock;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use regex::Regex;

use crate::errors::PilotResult;
use crate::perception::types::UIElement;

static BOUNDS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(\d+),(\d+)\]").expect("bounds pattern"));

pub fn parse_hierarchy(xml: &str) -> PilotResult<Vec<UIElement>> {
    let mut reader = Reader::from_str(xml);
    let mut elements = Vec::new();
    let mut visited = 0usize;

    loop {
        match reader.read_event()? {
            Event::Start(node) | Event::Empty(node) => {
                visited += 1;
                if let Some(element) = element_from_node(&node)? {
                    elements.push(element);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    tracing::debug!(visited, kept = elements.len(), "UI hierarchy parsed");
    Ok(elements)
}

#[derive(Default)]
struct NodeAttributes {
    text: String,
    description: String,
    resource_id: String,
    class_name: String,
    bounds: String,
    clickable: bool,
    scrollable: bool,
}

fn element_from_node(node: &BytesStart<'_>) -> PilotResult<Option<UIElement>> {
    let mut attrs = NodeAttributes::default();
    for attr in node.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let value = attr.unescape_value()?;
        match attr.key.as_ref() {
            b"text" => attrs.text = value.trim().to_string(),
            b"content-desc" => attrs.description = value.trim().to_string(),
            b"resource-id" => attrs.resource_id = value.trim().to_string(),
            b"class" => attrs.class_name = value.trim().to_string(),
            b"bounds" => attrs.bounds = value.into_owned(),
            b"clickable" => attrs.clickable = value == "true",
            b"scrollable" => attrs.scrollable = value == "true",
            _ => {}
        }
    }

    let Some([left, top, right, bottom]) = parse_bounds(&attrs.bounds) else {
        return Ok(None);
    };
    let center_x = (left + right) / 2;
    let center_y = (top + bottom) / 2;

    let actionable = attrs.clickable
        || attrs.scrollable
        || !attrs.text.is_empty()
        || !attrs.description.is_empty();
    if !actionable || center_x <= 0 || center_y <= 0 {
        return Ok(None);
    }

    Ok(Some(UIElement {
        center_x,
        center_y,
        width: right - left,
        height: bottom - top,
        text: attrs.text,
        description: attrs.description,
        resource_id: attrs.resource_id,
        class_name: attrs.class_name,
        clickable: attrs.clickable,
        scrollable: attrs.scrollable,
    }))
}

/// `"[l,t][r,b]"` into `[l, t, r, b]`. Anything other than exactly two
/// corners is rejected.
fn parse_bounds(bounds: &str) -> Option<[i32; 4]> {
    let corners: Vec<(i32, i32)> = BOUNDS_RE
        .captures_iter(bounds)
        .map(|c| Some((c[1].parse().ok()?, c[2].parse().ok()?)))
        .collect::<Option<_>>()?;
    match corners.as_slice() {
        [(l, t), (r, b)] => Some([*l, *t, *r, *b]),
        _ => None,
    }
}

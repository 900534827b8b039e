//! Best-effort entity name lookup.
//!
//! Registry pages list several `itemprop="name"` spans and the third one is
//! the entity itself. On any other layout this falls back to `<title>`. It is
//! a label, not a parser: arbitrary pages will produce arbitrary names.

use super::strategies::element_text;
use crate::core::models::UNKNOWN_ENTITY;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};

static NAME_MARKER: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"span[itemprop="name"]"#).expect("static selector"));
static TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("title").expect("static selector"));

/// Zero-based position of the marker that names the entity.
const NAME_MARKER_INDEX: usize = 2;

pub fn entity_name(document: &Html) -> String {
    document
        .select(&NAME_MARKER)
        .nth(NAME_MARKER_INDEX)
        .and_then(clean_text)
        .or_else(|| document.select(&TITLE).next().and_then(clean_text))
        .unwrap_or_else(|| UNKNOWN_ENTITY.to_string())
}

fn clean_text(element: ElementRef<'_>) -> Option<String> {
    let text = element_text(element, " ");
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    (!collapsed.is_empty()).then_some(collapsed)
}

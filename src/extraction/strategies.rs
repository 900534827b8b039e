//! The five independent email-locating strategies.
//!
//! Each returns raw candidates; nothing here is validated. The caller unions
//! the outputs and filters them through [`crate::utils::email::validate`].

use crate::utils::email::harvest_candidates;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};

static ANCHOR_WITH_HREF: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("static selector"));
static ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a").expect("static selector"));

const MAILTO_PREFIX: &str = "mailto:";

/// An attribute may carry one address or a delimited list of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    Single(String),
    Multiple(Vec<String>),
}

impl AttributeValue {
    /// Splits on `,` and `;`, which sites use to pack several addresses into one attribute.
    pub fn parse(raw: &str) -> Self {
        if raw.contains([',', ';']) {
            AttributeValue::Multiple(
                raw.split([',', ';'])
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(str::to_string)
                    .collect(),
            )
        } else {
            AttributeValue::Single(raw.trim().to_string())
        }
    }

    pub fn values(&self) -> Vec<&str> {
        match self {
            AttributeValue::Single(value) => vec![value.as_str()],
            AttributeValue::Multiple(values) => values.iter().map(String::as_str).collect(),
        }
    }
}

/// Strategy 1: `mailto:` anchors, with the scheme and any query stripped.
pub fn mailto_links(document: &Html) -> Vec<String> {
    document
        .select(&ANCHOR_WITH_HREF)
        .filter_map(|anchor| anchor.value().attr("href"))
        .filter_map(|href| {
            let href = href.trim();
            let head = href.get(..MAILTO_PREFIX.len())?;
            if !head.eq_ignore_ascii_case(MAILTO_PREFIX) {
                return None;
            }
            let address = href[MAILTO_PREFIX.len()..]
                .split('?')
                .next()
                .unwrap_or("")
                .trim();
            address.contains('@').then(|| address.to_string())
        })
        .collect()
}

/// Strategy 2: visible anchor text that looks like it holds an address.
pub fn anchor_text(document: &Html) -> Vec<String> {
    let mut found = Vec::new();
    for anchor in document.select(&ANCHOR) {
        let text = element_text(anchor, "");
        let text = text.trim();
        if text.contains('@') && text.contains('.') {
            found.extend(harvest_candidates(text).map(str::to_string));
        }
    }
    found
}

/// Strategy 3: email-bearing attributes such as `data-email`.
pub fn attribute_values(document: &Html, selector: &Selector, attributes: &[String]) -> Vec<String> {
    let mut found = Vec::new();
    for element in document.select(selector) {
        for name in attributes {
            let Some(raw) = element.value().attr(name) else {
                continue;
            };
            for value in AttributeValue::parse(raw).values() {
                found.extend(harvest_candidates(value).map(str::to_string));
            }
        }
    }
    found
}

/// Strategy 4: text of elements carrying contact-related classes.
pub fn class_text(document: &Html, selector: &Selector) -> Vec<String> {
    document
        .select(selector)
        .flat_map(|element| {
            let text = element_text(element, " ");
            harvest_candidates(&text)
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Strategy 5: the whole document's text, as a catch-all.
pub fn page_text(document: &Html) -> Vec<String> {
    let text = element_text(document.root_element(), " ");
    harvest_candidates(&text).map(str::to_string).collect()
}

/// Concatenated text nodes under `element`.
pub(crate) fn element_text(element: ElementRef<'_>, separator: &str) -> String {
    element.text().collect::<Vec<_>>().join(separator)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(body: &str) -> Html {
        Html::parse_document(&format!("<html><body>{}</body></html>", body))
    }

    #[test]
    fn mailto_strips_scheme_and_query() {
        let document = doc(
            r#"<a href="mailto:a@b.com?subject=x">write</a>
               <a href="MAILTO: info@acme.ru ">caps</a>
               <a href="mailto:nobody">no at</a>
               <a href="/contact">plain</a>"#,
        );
        assert_eq!(mailto_links(&document), vec!["a@b.com", "info@acme.ru"]);
    }

    #[test]
    fn anchor_text_requires_at_and_dot() {
        let document = doc(r#"<a href="/x">sales@acme.com</a><a href="/y">@handle</a>"#);
        assert_eq!(anchor_text(&document), vec!["sales@acme.com"]);
    }

    #[test]
    fn attribute_scan_reads_single_and_multiple_values() {
        let document = doc(
            r#"<span data-email="one@acme.com"></span>
               <div data-mail="two@acme.com; three@acme.com"></div>"#,
        );
        let selector = Selector::parse("[data-email], [data-mail]").unwrap();
        let attrs = vec!["data-email".to_string(), "data-mail".to_string()];
        assert_eq!(
            attribute_values(&document, &selector, &attrs),
            vec!["one@acme.com", "two@acme.com", "three@acme.com"]
        );
    }

    #[test]
    fn attribute_value_variants() {
        assert_eq!(
            AttributeValue::parse(" a@b.com "),
            AttributeValue::Single("a@b.com".to_string())
        );
        assert_eq!(
            AttributeValue::parse("a@b.com, ,c@d.com").values(),
            vec!["a@b.com", "c@d.com"]
        );
    }

    #[test]
    fn class_scan_reads_element_text() {
        let document = doc(r#"<p class="contact-email">Mail: <b>office@firm.org</b></p>"#);
        let selector = Selector::parse(".email, .contact-email").unwrap();
        assert_eq!(class_text(&document, &selector), vec!["office@firm.org"]);
    }

    #[test]
    fn page_text_separates_adjacent_cells() {
        let document = doc("<table><tr><td>hr@corp.com</td><td>Phone</td></tr></table>");
        assert_eq!(page_text(&document), vec!["hr@corp.com"]);
    }
}

//! HTML email extraction.
//!
//! A document is run through five strategies (mailto links, anchor text,
//! email-bearing attributes, contact classes and the full page text). The
//! union of their candidates is validated, so every reported address passed
//! the strict grammar.

mod entity;
pub mod strategies;

pub use entity::entity_name;
pub use strategies::AttributeValue;

use crate::core::config::Config;
use crate::core::error::{AppError, Result};
use crate::core::models::ExtractionResult;
use crate::utils::email::validate;
use scraper::{Html, Selector};

/// Attributes that commonly carry an address.
pub const DEFAULT_EMAIL_ATTRIBUTES: [&str; 3] = ["data-email", "data-mail", "data-e-mail"];
/// Classes that commonly wrap an address.
pub const DEFAULT_EMAIL_CLASSES: [&str; 5] =
    ["email", "mail", "e-mail", "contact-email", "contact-mail"];

/// Compiled attribute and class lookups for strategies 3 and 4.
#[derive(Debug, Clone)]
pub struct ExtractionRules {
    attributes: Vec<String>,
    attribute_selector: Option<Selector>,
    class_selector: Option<Selector>,
}

impl ExtractionRules {
    /// Builds the rule set. An empty list disables the matching strategy.
    pub fn new(attributes: Vec<String>, classes: &[String]) -> Result<Self> {
        let attributes: Vec<String> = attributes
            .into_iter()
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .collect();
        let attribute_selector = compile(
            attributes
                .iter()
                .map(|a| format!("[{}]", a))
                .collect::<Vec<_>>(),
        )?;
        let class_selector = compile(
            classes
                .iter()
                .map(|c| c.trim())
                .filter(|c| !c.is_empty())
                .map(|c| format!(".{}", c))
                .collect::<Vec<_>>(),
        )?;
        Ok(Self {
            attributes,
            attribute_selector,
            class_selector,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.email_attributes.clone(), &config.email_classes)
    }

    /// Extracts the entity name and validated emails from `html`.
    pub fn extract(&self, html: &str) -> Result<ExtractionResult> {
        if html.trim().is_empty() {
            return Err(AppError::ParseFailure("document is empty".to_string()));
        }
        let document = Html::parse_document(html);

        let mut candidates = strategies::mailto_links(&document);
        candidates.extend(strategies::anchor_text(&document));
        if let Some(selector) = &self.attribute_selector {
            candidates.extend(strategies::attribute_values(
                &document,
                selector,
                &self.attributes,
            ));
        }
        if let Some(selector) = &self.class_selector {
            candidates.extend(strategies::class_text(&document, selector));
        }
        candidates.extend(strategies::page_text(&document));

        let entity_name = entity_name(&document);
        let emails = validate(&candidates);
        tracing::debug!(
            target: "extract_task",
            "[{}] {} raw candidates, {} valid emails",
            entity_name,
            candidates.len(),
            emails.len()
        );

        Ok(ExtractionResult {
            entity_name,
            emails: emails.into_iter().collect(),
        })
    }
}

impl Default for ExtractionRules {
    fn default() -> Self {
        let attributes = DEFAULT_EMAIL_ATTRIBUTES.map(String::from).to_vec();
        let classes = DEFAULT_EMAIL_CLASSES.map(String::from);
        Self::new(attributes, &classes).expect("default extraction selectors are valid")
    }
}

/// Extracts with the default attribute and class lists.
pub fn extract(html: &str) -> Result<ExtractionResult> {
    ExtractionRules::default().extract(html)
}

fn compile(parts: Vec<String>) -> Result<Option<Selector>> {
    if parts.is_empty() {
        return Ok(None);
    }
    let source = parts.join(", ");
    Selector::parse(&source)
        .map(Some)
        .map_err(|e| AppError::Config(format!("Invalid selector '{}': {:?}", source, e)))
}

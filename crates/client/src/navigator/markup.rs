//! Script extraction from fetched page markup.
//!
//! Markup inserted programmatically does not run its `<script>` tags, so
//! each one is recreated with the same attributes and text.

use scraper::{Html, Selector};

/// A `<script>` element as found in the markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    pub attributes: Vec<(String, String)>,
    pub text: String,
}

impl Script {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }
}

/// Scripts in document order.
pub fn extract_scripts(markup: &str) -> Vec<Script> {
    let fragment = Html::parse_fragment(markup);
    let selector = Selector::parse("script").expect("invalid selector");

    fragment
        .select(&selector)
        .map(|element| Script {
            attributes: element.value().attrs().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            text: element.text().collect(),
        })
        .collect()
}

use crate::parser::collapse_whitespace;
use crate::traits::Extractor;
use crate::types::{ParsedEntry, RelayError, Result, SourceSpec};
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};

/// CSS selectors describing a news listing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HtmlSelectors {
    /// One match per news entry.
    pub item: String,
    /// Anchor inside the entry. When absent the entry itself is the anchor.
    #[serde(default)]
    pub link: Option<String>,
    /// Title element inside the entry. When absent the anchor text is used.
    #[serde(default)]
    pub title: Option<String>,
}

/// Listing pages without a feed, scraped with per-source selectors.
pub struct HtmlListExtractor {
    item: Selector,
    link: Option<Selector>,
    title: Option<Selector>,
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| RelayError::Config(format!("invalid selector '{}': {}", css, e)))
}

impl HtmlListExtractor {
    pub fn new(selectors: &HtmlSelectors) -> Result<Self> {
        Ok(Self {
            item: selector(&selectors.item)?,
            link: selectors.link.as_deref().map(selector).transpose()?,
            title: selectors.title.as_deref().map(selector).transpose()?,
        })
    }

    fn entry(&self, node: ElementRef<'_>) -> Option<ParsedEntry> {
        let anchor = match &self.link {
            Some(link) => node.select(link).next()?,
            None => node,
        };
        let href = anchor.value().attr("href")?;

        let title_node = match &self.title {
            Some(title) => node.select(title).next()?,
            None => anchor,
        };
        let title = collapse_whitespace(&title_node.text().collect::<String>());
        if title.is_empty() {
            return None;
        }

        Some(ParsedEntry {
            title,
            link: href.to_string(),
        })
    }
}

impl Extractor for HtmlListExtractor {
    fn name(&self) -> &'static str {
        "html"
    }

    fn parse(&self, source: &SourceSpec, raw: &str) -> Result<Vec<ParsedEntry>> {
        let document = Html::parse_document(raw);
        let mut matched = 0;
        let mut entries = Vec::new();

        for node in document.select(&self.item) {
            matched += 1;
            if let Some(entry) = self.entry(node) {
                entries.push(entry);
            }
        }

        // A listing with no matches usually means the page layout changed
        if matched == 0 {
            return Err(RelayError::Parse(format!("no elements matched the item selector on {}", source.endpoint)));
        }

        Ok(entries)
    }
}

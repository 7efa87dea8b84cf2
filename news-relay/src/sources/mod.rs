//! Extractor adapters and the registry that picks one per source.
//!
//! Adding a source shape means writing one more [`Extractor`] and either
//! binding it to a source name or routing an endpoint pattern to it. Existing
//! adapters are never touched.

pub mod html_list;
pub mod rss_feed;

pub use html_list::{HtmlListExtractor, HtmlSelectors};
pub use rss_feed::RssFeedExtractor;

use crate::config::{AdapterKind, SourceConfig};
use crate::traits::Extractor;
use crate::types::{RelayError, Result, SourceSpec};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Endpoint substrings that mark a syndication feed.
const FEED_PATTERNS: &[&str] = &["rss", "feed", "atom", ".xml"];

pub struct ExtractorRegistry {
    bindings: HashMap<String, Arc<dyn Extractor>>,
    routes: Vec<(String, Arc<dyn Extractor>)>,
    fallback: Arc<dyn Extractor>,
}

impl ExtractorRegistry {
    pub fn new(fallback: Arc<dyn Extractor>) -> Self {
        Self {
            bindings: HashMap::new(),
            routes: Vec::new(),
            fallback,
        }
    }

    /// Registry with feed-looking endpoints routed to [`RssFeedExtractor`],
    /// which is also the fallback.
    pub fn with_default_routes() -> Self {
        let rss: Arc<dyn Extractor> = Arc::new(RssFeedExtractor);
        let mut registry = Self::new(rss.clone());
        for pattern in FEED_PATTERNS {
            registry.route(*pattern, rss.clone());
        }
        registry
    }

    /// Build the registry for the configured sources.
    pub fn from_sources(sources: &[SourceConfig]) -> Result<Self> {
        let mut registry = Self::with_default_routes();

        for source in sources {
            match (source.adapter, &source.selectors) {
                (Some(AdapterKind::Html), Some(selectors)) | (None, Some(selectors)) => {
                    let extractor = HtmlListExtractor::new(selectors)?;
                    registry.bind(&source.name, Arc::new(extractor));
                }
                (Some(AdapterKind::Html), None) => {
                    return Err(RelayError::Config(format!(
                        "source '{}' uses the html adapter but has no [sources.selectors]",
                        source.name
                    )));
                }
                (Some(AdapterKind::Rss), _) => {
                    registry.bind(&source.name, Arc::new(RssFeedExtractor));
                }
                (None, None) => {}
            }
        }

        Ok(registry)
    }

    /// Bind an extractor to one source by name. Bindings win over routes.
    pub fn bind(&mut self, source_name: &str, extractor: Arc<dyn Extractor>) {
        self.bindings.insert(source_name.to_string(), extractor);
    }

    /// Route every endpoint containing `pattern` to `extractor`.
    /// Earlier routes win.
    pub fn route(&mut self, pattern: impl Into<String>, extractor: Arc<dyn Extractor>) {
        self.routes.push((pattern.into(), extractor));
    }

    pub fn resolve(&self, source: &SourceSpec) -> &dyn Extractor {
        if let Some(extractor) = self.bindings.get(&source.name) {
            return extractor.as_ref();
        }

        let endpoint = source.endpoint.to_lowercase();
        let extractor = self
            .routes
            .iter()
            .find(|(pattern, _)| endpoint.contains(pattern.as_str()))
            .map(|(_, extractor)| extractor.as_ref())
            .unwrap_or(self.fallback.as_ref());

        debug!("Source {} resolved to the {} adapter", source.name, extractor.name());
        extractor
    }
}

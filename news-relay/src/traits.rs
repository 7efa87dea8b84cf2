use crate::types::{ChatMessage, Item, ParsedEntry, PublishError, Result, SendOptions, SourceSpec};
use async_trait::async_trait;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Trait for pulling the raw document behind a source endpoint.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Fetch the full document body for this source.
    async fn fetch(&self, source: &SourceSpec) -> Result<String>;
}

/// Trait for turning one source's document shape into candidate items.
///
/// Implementors only write [`parse`](Extractor::parse). Callers use
/// [`extract`](Extractor::extract), which never fails.
pub trait Extractor: Send + Sync {
    /// Short adapter name used in configuration, e.g. `"rss"`.
    fn name(&self) -> &'static str;

    /// Parse `raw` into entries in document order.
    fn parse(&self, source: &SourceSpec, raw: &str) -> Result<Vec<ParsedEntry>>;

    /// Parse, canonicalise and bound the candidates for one source.
    ///
    /// Malformed documents are logged and yield no items. At most `limit`
    /// items are returned, keeping the first occurrence of each url.
    fn extract(&self, source: &SourceSpec, raw: &str, limit: usize) -> Vec<Item> {
        let entries = match self.parse(source, raw) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("{} adapter could not parse {}: {}", self.name(), source.name, e);
                return Vec::new();
            }
        };

        let mut seen = HashSet::new();
        entries
            .into_iter()
            .filter_map(|entry| {
                match crate::rss_utils::url::canonicalize(&entry.link, &source.endpoint) {
                    Some(url) => Some(Item::new(entry.title, url, source.name.clone())),
                    None => {
                        debug!("Dropping entry with unusable link {:?} from {}", entry.link, source.name);
                        None
                    }
                }
            })
            .filter(|item| seen.insert(item.url.clone()))
            .take(limit)
            .collect()
    }
}

/// Outbound message delivery. Failures must stay distinguishable.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, channel: &str, text: &str, options: SendOptions) -> std::result::Result<(), PublishError>;
}

/// Inbound chat messages, drained once per scheduler tick.
#[async_trait]
pub trait Inbox: Send {
    /// Messages that arrived since the previous call. Returns right away when there are none.
    async fn receive(&mut self) -> std::result::Result<Vec<ChatMessage>, PublishError>;
}

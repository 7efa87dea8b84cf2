use crate::parser::FeedParser;
use crate::traits::Extractor;
use crate::types::{ParsedEntry, RelayError, Result, SourceSpec};
use tracing::debug;

/// RSS 0.9x/1.0/2.0, Atom and JSON Feed documents.
pub struct RssFeedExtractor;

impl Extractor for RssFeedExtractor {
    fn name(&self) -> &'static str {
        "rss"
    }

    fn parse(&self, source: &SourceSpec, raw: &str) -> Result<Vec<ParsedEntry>> {
        if !FeedParser::is_valid_feed_content(raw) {
            return Err(RelayError::Parse(format!("{} did not return a feed document", source.endpoint)));
        }

        let feed = FeedParser::parse_feed(raw)?;
        debug!(
            "Feed {} ({}) has {} entries",
            source.name,
            feed.title.as_deref().unwrap_or("untitled"),
            feed.entries.len()
        );
        Ok(feed.entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> SourceSpec {
        SourceSpec {
            name: "Mukachevo.net".to_string(),
            endpoint: "https://mukachevo.net/rss".to_string(),
        }
    }

    fn feed(n: usize) -> String {
        let items: String = (1..=n)
            .map(|i| format!("<item><title>Story {i}</title><link>https://mukachevo.net/news/{i}?utm_medium=rss</link></item>"))
            .collect();
        format!(r#"<?xml version="1.0"?><rss version="2.0"><channel><title>M</title>{items}</channel></rss>"#)
    }

    #[test]
    fn test_extract_bounds_to_top_n_in_document_order() {
        let items = RssFeedExtractor.extract(&source(), &feed(8), 3);
        let urls: Vec<&str> = items.iter().map(|i| i.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://mukachevo.net/news/1",
                "https://mukachevo.net/news/2",
                "https://mukachevo.net/news/3",
            ]
        );
        assert!(items.iter().all(|i| i.source == "Mukachevo.net"));
    }

    #[test]
    fn test_extract_keeps_first_of_duplicate_links() {
        let raw = r#"<rss version="2.0"><channel><title>M</title>
            <item><title>First</title><link>https://mukachevo.net/a#top</link></item>
            <item><title>Again</title><link>https://mukachevo.net/a</link></item>
            <item><title>Second</title><link>https://mukachevo.net/b</link></item>
        </channel></rss>"#;
        let items = RssFeedExtractor.extract(&source(), raw, 10);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "First");
        assert_eq!(items[1].title, "Second");
    }

    #[test]
    fn test_extract_json_feed() {
        let raw = r#"{
            "version": "https://jsonfeed.org/version/1.1",
            "title": "Mukachevo.net",
            "items": [
                {"id": "1", "url": "https://mukachevo.net/news/1?utm_source=json", "title": "Фестиваль на Рахівщині"}
            ]
        }"#;
        let items = RssFeedExtractor.extract(&source(), raw, 5);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Фестиваль на Рахівщині");
        assert_eq!(items[0].url, "https://mukachevo.net/news/1");
    }

    #[test]
    fn test_extract_never_fails_on_malformed_input() {
        assert!(RssFeedExtractor.extract(&source(), "", 5).is_empty());
        assert!(RssFeedExtractor.extract(&source(), "<rss><channel><item>", 5).is_empty());
        assert!(RssFeedExtractor.extract(&source(), "<html><body>503</body></html>", 5).is_empty());
    }
}

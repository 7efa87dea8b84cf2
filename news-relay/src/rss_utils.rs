//! Link utilities used to give every item a stable identity.

pub mod url {
    use url::Url;

    /// Query parameters that only carry campaign tracking.
    const TRACKING_PARAMS: &[&str] = &["fbclid", "gclid", "yclid", "mc_cid", "mc_eid"];

    fn is_tracking_param(key: &str) -> bool {
        key.starts_with("utm_") || TRACKING_PARAMS.contains(&key)
    }

    fn is_http(url: &Url) -> bool {
        matches!(url.scheme(), "http" | "https")
    }

    /// Whether a configured endpoint is an absolute http(s) url.
    pub fn is_http_url(endpoint: &str) -> bool {
        Url::parse(endpoint).is_ok_and(|url| is_http(&url))
    }

    /// Canonical form of an item link, resolved against the source endpoint.
    ///
    /// Fragments and tracking parameters are stripped. Returns `None` for
    /// empty, unparseable or non-http(s) links.
    pub fn canonicalize(link: &str, base: &str) -> Option<String> {
        let link = link.trim();
        if link.is_empty() {
            return None;
        }

        let mut parsed = match Url::parse(link) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(base).ok()?.join(link).ok()?,
            Err(_) => return None,
        };

        if !is_http(&parsed) {
            return None;
        }

        parsed.set_fragment(None);

        let total = parsed.query_pairs().count();
        let kept: Vec<(String, String)> = parsed
            .query_pairs()
            .filter(|(key, _)| !is_tracking_param(key))
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();

        if kept.is_empty() {
            parsed.set_query(None);
        } else if kept.len() != total {
            parsed.query_pairs_mut().clear().extend_pairs(kept);
        }

        Some(parsed.to_string())
    }
}

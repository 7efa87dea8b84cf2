use crate::traits::DocumentSource;
use crate::types::{FetchConfig, RelayError, Result, SourceSpec};
use async_trait::async_trait;
use backoff::{backoff::Backoff, exponential::ExponentialBackoff};
use reqwest::{Client, StatusCode};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Why a single attempt failed, and whether another attempt may help.
enum Attempt {
    Retry(String),
    GiveUp(String),
}

pub struct Fetcher {
    client: Client,
    config: FetchConfig,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()?;

        Ok(Self { client, config })
    }

    fn backoff(&self) -> ExponentialBackoff<backoff::SystemClock> {
        let delay = Duration::from_secs(self.config.retry_delay_seconds);
        ExponentialBackoff {
            current_interval: delay,
            initial_interval: delay,
            max_interval: delay * 8,
            multiplier: 2.0,
            // attempts are bounded by max_retries instead
            max_elapsed_time: None,
            ..Default::default()
        }
    }

    async fn attempt(&self, url: &str) -> std::result::Result<String, Attempt> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Attempt::Retry(e.to_string()))?;

        let status = response.status();
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(Attempt::Retry(format!("HTTP {}", status)));
        }
        if !status.is_success() {
            return Err(Attempt::GiveUp(format!("HTTP {}", status)));
        }

        let limit = self.config.max_document_size_mb * 1024 * 1024;
        if let Some(content_length) = response.content_length() {
            if content_length as usize > limit {
                return Err(Attempt::GiveUp(format!("document too large: {} bytes", content_length)));
            }
        }

        // Content-Length may be absent, so the cap also applies while reading
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| Attempt::Retry(e.to_string()))? {
            body.extend_from_slice(&chunk);
            if body.len() > limit {
                return Err(Attempt::GiveUp(format!("document too large: over {} bytes", limit)));
            }
        }

        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

#[async_trait]
impl DocumentSource for Fetcher {
    async fn fetch(&self, source: &SourceSpec) -> Result<String> {
        let start_time = Instant::now();
        debug!("Fetching {} from {}", source.name, source.endpoint);

        let mut backoff = self.backoff();
        let mut attempt = 0;

        loop {
            let reason = match self.attempt(&source.endpoint).await {
                Ok(body) => {
                    info!(
                        "Fetched {} ({} bytes in {}ms)",
                        source.name,
                        body.len(),
                        start_time.elapsed().as_millis()
                    );
                    return Ok(body);
                }
                Err(Attempt::GiveUp(reason)) => reason,
                Err(Attempt::Retry(reason)) => {
                    if attempt < self.config.max_retries {
                        if let Some(delay) = backoff.next_backoff() {
                            attempt += 1;
                            warn!("Attempt {} failed for {}: {}, retrying in {:?}", attempt, source.name, reason, delay);
                            tokio::time::sleep(delay).await;
                            continue;
                        }
                    }
                    reason
                }
            };

            return Err(RelayError::Fetch {
                source_name: source.name.clone(),
                reason,
            });
        }
    }
}

use crate::publisher::Publisher;
use crate::sources::ExtractorRegistry;
use crate::state::DedupStore;
use crate::traits::{DocumentSource, Transport};
use crate::types::{Item, PublishTask, SourceSpec};
use std::fmt;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Where a run currently is. Only used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Fetching(usize),
    Filtering,
    Publishing(usize),
}

/// Counters for one run across all sources.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub sources_total: usize,
    pub sources_failed: usize,
    pub candidates: usize,
    pub already_seen: usize,
    pub published: usize,
    pub publish_failed: usize,
    /// Sent successfully but the record could not be made durable.
    pub unrecorded: usize,
    pub interrupted: bool,
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} sources ({} failed), {} candidates, {} already seen, {} published, {} failed, {} unrecorded",
            self.sources_total,
            self.sources_failed,
            self.candidates,
            self.already_seen,
            self.published,
            self.publish_failed,
            self.unrecorded
        )
    }
}

/// Fetch → extract → novelty filter → publish → record, for every source.
///
/// Holds only read-only configuration. The dedup store and the publisher are
/// passed into each call.
pub struct Pipeline<D: DocumentSource> {
    sources: Vec<SourceSpec>,
    documents: D,
    extractors: ExtractorRegistry,
    channel: String,
    max_items_per_source: usize,
}

impl<D: DocumentSource> Pipeline<D> {
    pub fn new(
        sources: Vec<SourceSpec>,
        documents: D,
        extractors: ExtractorRegistry,
        channel: impl Into<String>,
        max_items_per_source: usize,
    ) -> Self {
        Self {
            sources,
            documents,
            extractors,
            channel: channel.into(),
            max_items_per_source,
        }
    }

    pub fn sources(&self) -> &[SourceSpec] {
        &self.sources
    }

    /// Name of the adapter that will parse `source`.
    pub fn adapter_for(&self, source: &SourceSpec) -> &'static str {
        self.extractors.resolve(source).name()
    }

    fn enter(&self, phase: RunPhase) {
        debug!("Pipeline phase: {:?}", phase);
    }

    /// Fetch and extract one source. Failures are logged and yield nothing.
    async fn candidates(&self, index: usize, source: &SourceSpec) -> Option<Vec<Item>> {
        self.enter(RunPhase::Fetching(index));

        let raw = match self.documents.fetch(source).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Skipping source {}: {}", source.name, e);
                return None;
            }
        };

        let extractor = self.extractors.resolve(source);
        Some(extractor.extract(source, &raw, self.max_items_per_source))
    }

    /// One full run. Sources go in configuration order, items in document order.
    ///
    /// Each item is recorded right after its send succeeds and before the next
    /// item starts. When `shutdown` flips, the run stops before the next
    /// source or item.
    pub async fn run<T: Transport>(
        &self,
        store: &mut DedupStore,
        publisher: &mut Publisher<T>,
        shutdown: &watch::Receiver<bool>,
    ) -> RunReport {
        let mut report = RunReport {
            sources_total: self.sources.len(),
            ..RunReport::default()
        };

        info!("Starting run over {} sources", self.sources.len());

        'sources: for (index, source) in self.sources.iter().enumerate() {
            if *shutdown.borrow() {
                report.interrupted = true;
                break;
            }

            let Some(items) = self.candidates(index, source).await else {
                report.sources_failed += 1;
                continue;
            };
            let found = items.len();
            report.candidates += found;

            self.enter(RunPhase::Filtering);
            let novel: Vec<Item> = items.into_iter().filter(|item| !store.contains(&item.url)).collect();
            report.already_seen += found - novel.len();
            debug!("{}: {} of {} items are novel", source.name, novel.len(), found);

            for (position, item) in novel.iter().enumerate() {
                if *shutdown.borrow() {
                    report.interrupted = true;
                    break 'sources;
                }

                // Another item earlier in this run may have recorded the same url
                if store.contains(&item.url) {
                    report.already_seen += 1;
                    continue;
                }

                self.enter(RunPhase::Publishing(position));
                let task = PublishTask {
                    channel: &self.channel,
                    item,
                };

                if let Err(e) = publisher.publish(task).await {
                    report.publish_failed += 1;
                    debug!("{} stays unrecorded (transient: {})", item.url, e.is_transient());
                    continue;
                }

                match store.record(&item.url) {
                    Ok(_) => report.published += 1,
                    Err(e) => {
                        report.published += 1;
                        report.unrecorded += 1;
                        error!("Published {} but could not record it: {}", item.url, e);
                    }
                }
            }
        }

        self.enter(RunPhase::Idle);
        info!("Run finished: {}", report);
        report
    }

    /// Current top items of every source, each marked novel or not.
    ///
    /// Read-only: nothing is published or recorded.
    pub async fn preview(&self, store: &DedupStore) -> Vec<(Item, bool)> {
        let mut latest = Vec::new();
        for (index, source) in self.sources.iter().enumerate() {
            if let Some(items) = self.candidates(index, source).await {
                latest.extend(items.into_iter().map(|item| {
                    let novel = !store.contains(&item.url);
                    (item, novel)
                }));
            }
        }
        latest
    }
}

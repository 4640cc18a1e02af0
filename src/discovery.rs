//! Repository discovery abstraction layer
//!
//! Remote sources push what they find into a shared bounded queue; a single
//! deduplication task drains it and republishes each distinct URL once.
//! Adding a provider means implementing [`RemoteSource`], nothing downstream
//! changes.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashSet;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::github::GitHubSource;

/// Capacity of the merge queue between sources and the deduplicator
pub const MERGE_QUEUE_CAPACITY: usize = 256;

/// A repository as seen on a remote account
///
/// `url` is the canonical clone address and the deduplication key; two
/// repositories with the same `url` are the same repository whatever their
/// `name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRepo {
    pub name: String,
    pub url: String,
}

impl RemoteRepo {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// Where a source emits what it finds
pub type RepoSink = mpsc::Sender<RemoteRepo>;

/// Trait for repository discovery from a remote provider
///
/// Implementations enumerate every listing category they know (owned,
/// watched, starred, ...) and send each repository into `sink`. Per-page
/// failures are logged and end only the affected category. Dropping `sink`
/// when done signals end-of-stream for this source.
#[async_trait]
pub trait RemoteSource: Send + Sync {
    async fn scaffold(&self, sink: RepoSink);

    /// Provider name for display/logging
    fn provider_name(&self) -> &'static str;
}

/// Aggregates multiple discovery sources into one stream
pub struct MultiSource {
    sources: Vec<Box<dyn RemoteSource>>,
}

impl MultiSource {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    /// Instantiate every source present in the configuration
    pub async fn from_config(config: &Config) -> Result<Self> {
        let mut multi = Self::new();

        if let Some(github) = &config.sources.github {
            multi.add_source(Box::new(GitHubSource::new(github).await?));
        }

        if multi.is_empty() {
            warn!("No remote sources configured");
        }

        Ok(multi)
    }

    pub fn add_source(&mut self, source: Box<dyn RemoteSource>) {
        self.sources.push(source);
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Start one producer task per source, all writing to one bounded queue.
    ///
    /// The returned receiver yields `None` once every source has finished.
    /// Nothing is ordered across sources.
    pub fn scaffold(self) -> mpsc::Receiver<RemoteRepo> {
        let (tx, rx) = mpsc::channel(MERGE_QUEUE_CAPACITY);

        for source in self.sources {
            let tx = tx.clone();
            tokio::spawn(async move {
                info!("Scaffolding {} repositories", source.provider_name());
                source.scaffold(tx).await;
                debug!("{} source finished", source.provider_name());
            });
        }

        rx
    }
}

impl Default for MultiSource {
    fn default() -> Self {
        Self::new()
    }
}

/// Seen-set for one pipeline run; first occurrence of a URL wins
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen: HashSet<String>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true the first time a URL is offered, false afterwards
    pub fn admit(&mut self, repo: &RemoteRepo) -> bool {
        if self.seen.contains(&repo.url) {
            return false;
        }
        self.seen.insert(repo.url.clone())
    }

    pub fn seen(&self) -> usize {
        self.seen.len()
    }

    /// Drain `input` and forward each distinct URL once.
    ///
    /// The seen-set lives inside the spawned task and is never shared. The
    /// output closes when the input closes; if the output receiver is dropped
    /// the task stops, which in turn closes the input for the producers.
    pub fn spawn(mut self, mut input: mpsc::Receiver<RemoteRepo>) -> mpsc::Receiver<RemoteRepo> {
        let (tx, rx) = mpsc::channel(MERGE_QUEUE_CAPACITY);

        tokio::spawn(async move {
            let mut duplicates = 0usize;
            while let Some(repo) = input.recv().await {
                if !self.admit(&repo) {
                    duplicates += 1;
                    continue;
                }
                if tx.send(repo).await.is_err() {
                    debug!("Deduplicated stream dropped, stopping");
                    return;
                }
            }
            info!(
                "Discovered {} distinct repositories ({} duplicates dropped)",
                self.seen(),
                duplicates
            );
        });

        rx
    }
}

/// Convenience wrapper over [`Deduplicator::spawn`] with a fresh seen-set
pub fn deduplicate(input: mpsc::Receiver<RemoteRepo>) -> mpsc::Receiver<RemoteRepo> {
    Deduplicator::new().spawn(input)
}

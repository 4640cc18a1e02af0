//! Sync Engine - drives the clone and fetch workflows
//!
//! Discovery workflow: sources -> merge queue -> deduplicator -> location
//! matching -> clone, one action at a time. Fetch workflow: local scan ->
//! fetch, one action at a time. Both publish a [`SyncResult`] per completed
//! action on the returned channel.

use anyhow::{anyhow, Context, Result};
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::{Config, Location};
use crate::discovery::{deduplicate, MultiSource, RemoteRepo, MERGE_QUEUE_CAPACITY};
use crate::git::{remote_urls_match, GitClient, Vcs};
use crate::matcher::LocationMatcher;
use crate::scanner::{scan_roots, LocalRepo};

/// Capacity of the result channel handed back to callers
pub const RESULT_QUEUE_CAPACITY: usize = 64;

/// Outcome of one clone or fetch action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncResult {
    /// Repository was cloned into `path`
    Cloned { url: String, path: PathBuf },
    /// `path` already existed, nothing was done
    AlreadyPresent { url: String, path: PathBuf },
    /// Repository at `path` was fetched
    Fetched { path: PathBuf },
    /// Operation failed with error
    Failed { path: PathBuf, error: String },
}

impl SyncResult {
    pub fn is_failure(&self) -> bool {
        matches!(self, SyncResult::Failed { .. })
    }

    pub fn path(&self) -> &Path {
        match self {
            SyncResult::Cloned { path, .. }
            | SyncResult::AlreadyPresent { path, .. }
            | SyncResult::Fetched { path }
            | SyncResult::Failed { path, .. } => path,
        }
    }
}

/// Performs single clone/fetch actions through a [`Vcs`]
pub struct SyncExecutor {
    vcs: Arc<dyn Vcs>,
    verify_remote: bool,
}

impl SyncExecutor {
    pub fn new(vcs: Arc<dyn Vcs>) -> Self {
        Self {
            vcs,
            verify_remote: false,
        }
    }

    /// Check an existing clone's origin before accepting it as present
    pub fn with_verify_remote(mut self, verify_remote: bool) -> Self {
        self.verify_remote = verify_remote;
        self
    }

    /// Clone `repo` into `location` unless a directory of that name exists
    pub async fn clone_repo(&self, repo: &RemoteRepo, location: &Location) -> SyncResult {
        if !is_single_component(&repo.name) {
            return SyncResult::Failed {
                path: PathBuf::from(&location.directory),
                error: format!(
                    "Refusing to clone {}: repository name {:?} is not a plain directory name",
                    repo.url, repo.name
                ),
            };
        }

        match self.try_clone(repo, location).await {
            Ok(result) => result,
            Err(e) => SyncResult::Failed {
                path: PathBuf::from(&location.directory).join(&repo.name),
                error: format!("{:#}", e),
            },
        }
    }

    async fn try_clone(&self, repo: &RemoteRepo, location: &Location) -> Result<SyncResult> {
        let dir = location.directory_path()?;
        ensure_directory(&dir).await?;

        let target = dir.join(&repo.name);
        if is_directory(&target).await {
            if self.verify_remote {
                if let Some(mismatch) = self.verify_existing(&target, &repo.url).await? {
                    return Ok(SyncResult::Failed {
                        path: target,
                        error: mismatch,
                    });
                }
            }
            info!("Repository location {} already exists", target.display());
            return Ok(SyncResult::AlreadyPresent {
                url: repo.url.clone(),
                path: target,
            });
        }

        info!("Cloning {} in {}", repo.url, target.display());

        match self.vcs.clone_repo(&repo.url, &dir, &repo.name).await {
            Ok(()) => Ok(SyncResult::Cloned {
                url: repo.url.clone(),
                path: target,
            }),
            Err(e) => Ok(SyncResult::Failed {
                path: target,
                error: format!("{:#}", e),
            }),
        }
    }

    /// Returns a description of the problem when the existing clone is not `expected`
    async fn verify_existing(&self, target: &Path, expected: &str) -> Result<Option<String>> {
        let actual = self
            .vcs
            .remote_url(target)
            .await
            .with_context(|| format!("Failed to read origin of {}", target.display()))?;

        Ok(match actual {
            Some(actual) if remote_urls_match(&actual, expected) => None,
            Some(actual) => Some(format!(
                "Existing clone points at {}, expected {}",
                actual, expected
            )),
            None => Some(format!(
                "Existing directory has no origin remote, expected {}",
                expected
            )),
        })
    }

    /// Fetch an existing local repository
    pub async fn fetch(&self, repo: &LocalRepo) -> SyncResult {
        info!("Fetching {}", repo.directory.display());

        match self.vcs.fetch(&repo.directory).await {
            Ok(()) => SyncResult::Fetched {
                path: repo.directory.clone(),
            },
            Err(e) => SyncResult::Failed {
                path: repo.directory.clone(),
                error: format!("{:#}", e),
            },
        }
    }
}

/// The clone target must stay a direct child of the location directory
fn is_single_component(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// `mkdir -p` unless the path exists; a non-directory in the way is an error
async fn ensure_directory(dir: &Path) -> Result<()> {
    match tokio::fs::metadata(dir).await {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(anyhow!(
            "Unable to create directory {} - already exists",
            dir.display()
        )),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!("Creating directory {}", dir.display());
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("Failed to create directory {}", dir.display()))
        }
        Err(e) => Err(e).with_context(|| format!("Failed to inspect {}", dir.display())),
    }
}

async fn is_directory(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.is_dir())
        .unwrap_or(false)
}

/// Results from a complete workflow run
#[derive(Debug, Clone)]
pub struct SyncSummary {
    pub total_operations: usize,
    pub cloned: usize,
    pub already_present: usize,
    pub fetched: usize,
    pub failed: usize,
    pub duration: Duration,
    pub results: Vec<SyncResult>,
}

impl SyncSummary {
    /// Drain a workflow's result stream
    pub async fn collect(mut results: mpsc::Receiver<SyncResult>) -> Self {
        let start_time = Instant::now();
        let mut collected = Vec::new();
        while let Some(result) = results.recv().await {
            collected.push(result);
        }
        Self::from_results(collected, start_time.elapsed())
    }

    pub fn from_results(results: Vec<SyncResult>, duration: Duration) -> Self {
        let mut summary = Self {
            total_operations: results.len(),
            cloned: 0,
            already_present: 0,
            fetched: 0,
            failed: 0,
            duration,
            results: Vec::new(),
        };

        for result in &results {
            match result {
                SyncResult::Cloned { .. } => summary.cloned += 1,
                SyncResult::AlreadyPresent { .. } => summary.already_present += 1,
                SyncResult::Fetched { .. } => summary.fetched += 1,
                SyncResult::Failed { .. } => summary.failed += 1,
            }
        }

        summary.results = results;
        summary
    }

    pub fn failures(&self) -> impl Iterator<Item = (&Path, &str)> {
        self.results.iter().filter_map(|result| match result {
            SyncResult::Failed { path, error } => Some((path.as_path(), error.as_str())),
            _ => None,
        })
    }
}

/// Wires configuration, sources and the executor into the two workflows
#[derive(Clone)]
pub struct SyncEngine {
    config: Arc<Config>,
    executor: Arc<SyncExecutor>,
}

impl SyncEngine {
    /// Create a sync engine backed by the `git` executable
    pub fn new(config: Config) -> Self {
        Self::with_vcs(config, Arc::new(GitClient::new()))
    }

    pub fn with_vcs(config: Config, vcs: Arc<dyn Vcs>) -> Self {
        let executor =
            SyncExecutor::new(vcs).with_verify_remote(config.clone_options.verify_remote);
        Self {
            config: Arc::new(config),
            executor: Arc::new(executor),
        }
    }

    /// Discover, deduplicate, match and clone.
    ///
    /// Clones run one at a time in arrival order; each matching location of a
    /// repository is handled, in configuration order, before the next
    /// repository. A failed clone is reported and the run continues unless
    /// `clone.fail_fast` is set, in which case the run stops after reporting
    /// it and the upstream stages shut down as their channels close.
    pub fn run_discovery_and_clone(&self, sources: MultiSource) -> mpsc::Receiver<SyncResult> {
        let (tx, rx) = mpsc::channel(RESULT_QUEUE_CAPACITY);
        let config = self.config.clone();
        let executor = self.executor.clone();

        let mut repos = deduplicate(sources.scaffold());

        tokio::spawn(async move {
            let matcher = LocationMatcher::new(&config.locations);
            let fail_fast = config.clone_options.fail_fast;

            while let Some(repo) = repos.recv().await {
                debug!("Matching {} ({})", repo.name, repo.url);

                for location in matcher.matching(&repo) {
                    let result = executor.clone_repo(&repo, location).await;
                    let failed = result.is_failure();

                    if let SyncResult::Failed { path, error } = &result {
                        error!(
                            "Clone of {} into {} failed: {}",
                            repo.url,
                            path.display(),
                            error
                        );
                    }

                    if tx.send(result).await.is_err() {
                        debug!("Result stream dropped, stopping clone workflow");
                        return;
                    }

                    if failed && fail_fast {
                        error!("Halting clone workflow after first failure");
                        return;
                    }
                }
            }

            info!("Clone workflow finished");
        });

        rx
    }

    /// Scan the configured locations for clones and fetch each one.
    ///
    /// Failures are reported per repository and never stop the pass.
    pub fn run_local_fetch(&self) -> mpsc::Receiver<SyncResult> {
        let (tx, rx) = mpsc::channel(RESULT_QUEUE_CAPACITY);
        let (repo_tx, mut repo_rx) = mpsc::channel(MERGE_QUEUE_CAPACITY);
        let roots = self.scan_roots();
        let executor = self.executor.clone();

        tokio::task::spawn_blocking(move || {
            let total = scan_roots(&roots, &mut |repo| {
                if repo_tx.blocking_send(repo).is_err() {
                    debug!("Fetch workflow gone, discarding scan result");
                }
            });
            info!("Found {} local repositories", total);
        });

        tokio::spawn(async move {
            while let Some(repo) = repo_rx.recv().await {
                let result = executor.fetch(&repo).await;

                if let SyncResult::Failed { path, error } = &result {
                    warn!("Fetch of {} failed: {}", path.display(), error);
                }

                if tx.send(result).await.is_err() {
                    debug!("Result stream dropped, stopping fetch workflow");
                    return;
                }
            }

            info!("Fetch workflow finished");
        });

        rx
    }

    /// Expanded location directories to walk, in configuration order.
    ///
    /// Repeated directories and directories nested inside another location
    /// are dropped: walking the outer root already reaches their clones.
    pub fn scan_roots(&self) -> Vec<PathBuf> {
        let mut roots: Vec<PathBuf> = Vec::new();
        for location in &self.config.locations {
            match location.directory_path() {
                Ok(dir) if !roots.contains(&dir) => roots.push(dir),
                Ok(_) => {}
                Err(e) => warn!("Skipping location {}: {:#}", location.directory, e),
            }
        }

        let nested: Vec<PathBuf> = roots
            .iter()
            .filter(|root| {
                roots
                    .iter()
                    .any(|other| other != *root && root.starts_with(other))
            })
            .cloned()
            .collect();
        for root in &nested {
            debug!("{} is inside another location, not scanning it twice", root.display());
        }

        roots.retain(|root| !nested.contains(root));
        roots
    }
}

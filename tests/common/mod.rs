/// Common test utilities and helpers for mgit tests
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use mgit::{RemoteRepo, RemoteSource, RepoSink, Vcs};

/// A source that emits a fixed list, in order
pub struct StaticSource {
    repos: Vec<RemoteRepo>,
}

impl StaticSource {
    pub fn new(repos: &[(&str, &str)]) -> Self {
        Self {
            repos: repos
                .iter()
                .map(|(name, url)| RemoteRepo::new(*name, *url))
                .collect(),
        }
    }
}

#[async_trait]
impl RemoteSource for StaticSource {
    async fn scaffold(&self, sink: RepoSink) {
        for repo in &self.repos {
            if sink.send(repo.clone()).await.is_err() {
                return;
            }
        }
    }

    fn provider_name(&self) -> &'static str {
        "static"
    }
}

/// Records every invocation; clones create the target directory
#[derive(Default)]
pub struct RecordingVcs {
    clones: Mutex<Vec<(String, PathBuf)>>,
    fetches: Mutex<Vec<PathBuf>>,
    failing_urls: Vec<String>,
    failing_dirs: Vec<PathBuf>,
}

impl RecordingVcs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_clone(mut self, url: &str) -> Self {
        self.failing_urls.push(url.to_string());
        self
    }

    pub fn failing_fetch(mut self, dir: &Path) -> Self {
        self.failing_dirs.push(dir.to_path_buf());
        self
    }

    pub fn clones(&self) -> Vec<(String, PathBuf)> {
        self.clones.lock().unwrap().clone()
    }

    pub fn fetches(&self) -> Vec<PathBuf> {
        let mut fetches = self.fetches.lock().unwrap().clone();
        fetches.sort();
        fetches
    }
}

#[async_trait]
impl Vcs for RecordingVcs {
    async fn clone_repo(&self, url: &str, parent: &Path, name: &str) -> Result<()> {
        let target = parent.join(name);
        self.clones
            .lock()
            .unwrap()
            .push((url.to_string(), target.clone()));

        if self.failing_urls.iter().any(|failing| failing == url) {
            return Err(anyhow!("Git clone failed: repository not found"));
        }
        std::fs::create_dir_all(&target)?;
        Ok(())
    }

    async fn fetch(&self, dir: &Path) -> Result<()> {
        self.fetches.lock().unwrap().push(dir.to_path_buf());

        if self.failing_dirs.iter().any(|failing| failing == dir) {
            return Err(anyhow!("Git fetch failed: could not read from remote"));
        }
        Ok(())
    }

    async fn remote_url(&self, _dir: &Path) -> Result<Option<String>> {
        Ok(None)
    }
}

/// Path as a location directory string
pub fn dir_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

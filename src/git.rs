use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command as AsyncCommand;
use tracing::debug;

/// The version-control operations the sync executor relies on
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Vcs: Send + Sync {
    /// Clone `url` into `parent/name`
    async fn clone_repo(&self, url: &str, parent: &Path, name: &str) -> Result<()>;

    /// Fetch from the default remote inside `dir`
    async fn fetch(&self, dir: &Path) -> Result<()>;

    /// URL of the `origin` remote, if one is configured
    async fn remote_url(&self, dir: &Path) -> Result<Option<String>>;
}

/// Drives the `git` executable found on `PATH`
#[derive(Debug, Clone)]
pub struct GitClient {
    program: String,
}

impl GitClient {
    pub fn new() -> Self {
        Self {
            program: "git".to_string(),
        }
    }

    /// Use a specific git binary instead of the one on `PATH`
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn run(&self, dir: &Path, args: &[&str]) -> Result<String> {
        debug!("Running {} {} in {}", self.program, args.join(" "), dir.display());

        let output = AsyncCommand::new(&self.program)
            .args(args)
            .current_dir(dir)
            .output()
            .await
            .with_context(|| format!("Failed to execute {} {}", self.program, args[0]))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("Git {} failed: {}", args[0], stderr.trim()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl Default for GitClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Vcs for GitClient {
    async fn clone_repo(&self, url: &str, parent: &Path, name: &str) -> Result<()> {
        self.run(parent, &["clone", url, name]).await?;
        Ok(())
    }

    async fn fetch(&self, dir: &Path) -> Result<()> {
        self.run(dir, &["fetch"]).await?;
        Ok(())
    }

    async fn remote_url(&self, dir: &Path) -> Result<Option<String>> {
        match self.run(dir, &["remote", "get-url", "origin"]).await {
            Ok(url) if !url.is_empty() => Ok(Some(url)),
            Ok(_) => Ok(None),
            Err(e) => {
                debug!("No origin remote in {}: {:#}", dir.display(), e);
                Ok(None)
            }
        }
    }
}

/// Compare remote URLs loosely (SSH vs HTTPS, trailing `.git`, case)
pub fn remote_urls_match(actual: &str, expected: &str) -> bool {
    let normalize = |url: &str| -> String {
        let url = url.trim().trim_end_matches('/');
        let url = match url.strip_prefix("git@") {
            Some(rest) => format!("https://{}", rest.replacen(':', "/", 1)),
            None => url
                .strip_prefix("ssh://git@")
                .map(|rest| format!("https://{}", rest))
                .unwrap_or_else(|| url.to_string()),
        };
        url.trim_end_matches(".git").to_lowercase()
    };

    normalize(actual) == normalize(expected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_remote_url_matching() {
        assert!(remote_urls_match(
            "git@github.com:user/repo.git",
            "https://github.com/user/repo"
        ));

        assert!(remote_urls_match(
            "https://github.com/user/repo.git",
            "https://github.com/User/Repo"
        ));

        assert!(remote_urls_match(
            "ssh://git@example.com/team/repo.git",
            "git@example.com:team/repo.git"
        ));

        assert!(!remote_urls_match(
            "https://github.com/user/repo1",
            "https://github.com/user/repo2"
        ));
    }

    #[tokio::test]
    async fn test_missing_program_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let client = GitClient::with_program("mgit-definitely-not-a-git-binary");

        let err = client.fetch(temp_dir.path()).await.unwrap_err();
        assert!(err.to_string().contains("Failed to execute"));
    }

    #[tokio::test]
    async fn test_remote_url_outside_repository_is_none() {
        let temp_dir = TempDir::new().unwrap();
        let client = GitClient::with_program("mgit-definitely-not-a-git-binary");

        assert_eq!(client.remote_url(temp_dir.path()).await.unwrap(), None);
    }
}

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures::future::join_all;
use octocrab::models::Repository;
use octocrab::{Octocrab, Page};
use serde::Serialize;
use std::env;
use std::process::Command;
use tracing::{debug, info, warn};

use crate::config::GitHubSourceConfig;
use crate::discovery::{RemoteRepo, RemoteSource, RepoSink};
use crate::paging::{enumerate_pages, next_page_cursor, NO_PAGE, PAGE_SIZE};

/// Listing categories and the routes that serve them
const CATEGORIES: [(&str, &str); 3] = [
    ("owned", "/user/repos"),
    ("watched", "/user/subscriptions"),
    ("starred", "/user/starred"),
];

/// GitHub account as a repository source
pub struct GitHubSource {
    client: Octocrab,
    username: String,
}

/// Where the access token came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenOrigin {
    /// `token` in the configuration file
    Config,
    /// `GITHUB_TOKEN` environment variable
    EnvironmentToken,
    /// `gh auth token`
    GitHubCLI,
}

#[derive(Serialize)]
struct PageParams {
    per_page: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    page: Option<u32>,
}

impl GitHubSource {
    /// Create an authenticated source
    pub async fn new(config: &GitHubSourceConfig) -> Result<Self> {
        let (origin, token) = resolve_token(config)?;

        info!("Using GitHub token from: {:?}", origin);

        let mut builder = Octocrab::builder().personal_token(token);
        if let Some(api_url) = &config.api_url {
            builder = builder
                .base_uri(api_url.as_str())
                .with_context(|| format!("Invalid GitHub API URL: {}", api_url))?;
        }
        let client = builder.build().context("Failed to create GitHub client")?;

        let user = client
            .current()
            .user()
            .await
            .context("Failed to get current user information. Check your authentication.")?;

        info!("Authenticated as GitHub user: {}", user.login);

        Ok(Self {
            client,
            username: user.login,
        })
    }

    async fn fetch_page(&self, route: &str, cursor: u32) -> Result<(Vec<RemoteRepo>, u32)> {
        let params = PageParams {
            per_page: PAGE_SIZE,
            page: (cursor != NO_PAGE).then_some(cursor),
        };

        let page: Page<Repository> = self
            .client
            .get(route, Some(&params))
            .await
            .with_context(|| format!("Failed to fetch {} page {}", route, cursor))?;

        let next = next_page_cursor(page.next.as_ref().and_then(|uri| uri.query()));
        let repos = page.items.iter().filter_map(to_remote_repo).collect();

        Ok((repos, next))
    }
}

#[async_trait]
impl RemoteSource for GitHubSource {
    async fn scaffold(&self, sink: RepoSink) {
        debug!("Enumerating repositories for: {}", self.username);

        let sink = &sink;
        let counts = join_all(CATEGORIES.iter().map(|&(category, route)| async move {
            let found = enumerate_pages(
                category,
                |cursor| self.fetch_page(route, cursor),
                sink,
            )
            .await;
            (category, found)
        }))
        .await;

        for (category, found) in counts {
            info!("Found {} {} repositories", found, category);
        }
    }

    fn provider_name(&self) -> &'static str {
        "GitHub"
    }
}

fn to_remote_repo(repo: &Repository) -> Option<RemoteRepo> {
    let https = repo.clone_url.as_ref().map(|url| url.to_string());
    match pick_clone_url(repo.ssh_url.as_deref(), https.as_deref()) {
        Some(url) => Some(RemoteRepo::new(repo.name.clone(), url)),
        None => {
            warn!("Repository {} has no clone URL, skipping", repo.name);
            None
        }
    }
}

/// Prefer SSH, fall back to HTTPS
fn pick_clone_url(ssh: Option<&str>, https: Option<&str>) -> Option<String> {
    ssh.or(https)
        .filter(|url| !url.is_empty())
        .map(str::to_string)
}

/// Find a token: configuration first, then `GITHUB_TOKEN`, then the GitHub CLI
pub fn resolve_token(config: &GitHubSourceConfig) -> Result<(TokenOrigin, String)> {
    if let Some(raw) = config.token.as_deref().filter(|t| !t.trim().is_empty()) {
        let token = shellexpand::env(raw)
            .context("Failed to expand configured GitHub token")?
            .trim()
            .to_string();
        if !token.is_empty() {
            return Ok((TokenOrigin::Config, token));
        }
    }

    if let Ok(token) = try_environment_token() {
        return Ok((TokenOrigin::EnvironmentToken, token));
    }

    if let Ok(token) = try_github_cli() {
        return Ok((TokenOrigin::GitHubCLI, token));
    }

    Err(anyhow!(
        "No GitHub authentication found. Please either:\n\
         1. Set sources.github.token in the configuration file\n\
         2. Set GITHUB_TOKEN environment variable\n\
         3. Install and authenticate GitHub CLI: gh auth login"
    ))
}

fn try_environment_token() -> Result<String> {
    let token = env::var("GITHUB_TOKEN").context("GITHUB_TOKEN environment variable not set")?;

    if token.trim().is_empty() {
        return Err(anyhow!("GITHUB_TOKEN is empty"));
    }

    Ok(token.trim().to_string())
}

fn try_github_cli() -> Result<String> {
    debug!("Attempting GitHub CLI authentication");

    let output = Command::new("gh")
        .args(["auth", "token"])
        .output()
        .context("Failed to run GitHub CLI")?;

    if !output.status.success() {
        return Err(anyhow!(
            "Failed to retrieve token from GitHub CLI: {}",
            String::from_utf8_lossy(&output.stderr)
        ));
    }

    let token = String::from_utf8(output.stdout)
        .context("GitHub CLI token is not valid UTF-8")?
        .trim()
        .to_string();

    if token.is_empty() {
        return Err(anyhow!("GitHub CLI returned empty token"));
    }

    Ok(token)
}

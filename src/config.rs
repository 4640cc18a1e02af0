use anyhow::{anyhow, Context, Result};
use dirs::home_dir;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Main configuration structure for mgit
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    /// Remote account sources to discover repositories from
    #[serde(default)]
    pub sources: SourcesConfig,

    /// Target locations, evaluated in order for every discovered repository
    #[serde(default)]
    pub locations: Vec<Location>,

    /// Clone workflow behaviour
    #[serde(default, rename = "clone")]
    pub clone_options: CloneConfig,
}

/// Remote sources, one entry per provider
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct SourcesConfig {
    #[serde(default)]
    pub github: Option<GitHubSourceConfig>,
}

/// GitHub account credentials
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct GitHubSourceConfig {
    /// Personal access token. Falls back to `GITHUB_TOKEN`, then `gh auth token`.
    #[serde(default)]
    pub token: Option<String>,

    /// API base URL for GitHub Enterprise installations
    #[serde(default)]
    pub api_url: Option<String>,
}

/// A local directory paired with a pattern over remote URLs
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct Location {
    /// Target directory; may contain `$VAR`, `${VAR}` or `~`
    pub directory: String,

    /// Regular expression searched (unanchored) in the repository URL
    pub repository: String,
}

/// Clone workflow settings
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct CloneConfig {
    /// Stop the whole run at the first failed clone
    #[serde(default)]
    pub fail_fast: bool,

    /// Check that an existing clone's origin matches before skipping it
    #[serde(default)]
    pub verify_remote: bool,
}

impl Location {
    pub fn new(directory: impl Into<String>, repository: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            repository: repository.into(),
        }
    }

    /// Resolve the directory template against the current environment
    pub fn directory_path(&self) -> Result<PathBuf> {
        let expanded = shellexpand::full(&self.directory)
            .with_context(|| format!("Failed to expand location directory: {}", self.directory))?;
        Ok(PathBuf::from(expanded.as_ref()))
    }
}

impl Config {
    /// Load configuration from a specific file
    ///
    /// The format follows the extension: `.yml`/`.yaml` is YAML, anything else JSON.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config = Self::parse(&content, Format::from_path(path))
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        config.validate();

        Ok(config)
    }

    fn parse(content: &str, format: Format) -> Result<Self> {
        let config: Config = match format {
            Format::Json => serde_json::from_str(content)?,
            Format::Yaml => serde_yaml::from_str(content)?,
        };
        Ok(config)
    }

    /// Resolve a user supplied config path, expanding placeholders
    pub fn resolve_path(raw: &str) -> Result<PathBuf> {
        let expanded = shellexpand::full(raw)
            .with_context(|| format!("Failed to expand config path: {}", raw))?;
        Ok(PathBuf::from(expanded.as_ref()))
    }

    /// Get the default configuration file path (`~/.mgit/config.json`)
    pub fn default_config_path() -> Result<PathBuf> {
        let home = home_dir().ok_or_else(|| anyhow!("Failed to get user home directory"))?;

        Ok(home.join(".mgit").join("config.json"))
    }

    /// Report location patterns that will never match.
    ///
    /// Invalid patterns do not fail the load; the matcher treats them as
    /// non-matching at run time.
    pub fn validate(&self) -> usize {
        let mut invalid = 0;
        for location in &self.locations {
            if let Err(e) = Regex::new(&location.repository) {
                warn!(
                    "Location {} has an invalid repository pattern '{}': {}",
                    location.directory, location.repository, e
                );
                invalid += 1;
            }
        }
        if self.locations.is_empty() {
            warn!("No locations configured, nothing will be synchronized");
        }
        invalid
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Yaml,
}

impl Format {
    fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yml") | Some("yaml") => Format::Yaml,
            _ => Format::Json,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use tempfile::TempDir;

    #[test]
    fn test_json_parsing() {
        let json_content = r#"
{
  "sources": { "github": { "token": "ghp_example" } },
  "locations": [
    { "directory": "$HOME/work", "repository": "^git@github.com:acme/" },
    { "directory": "/srv/mirror", "repository": "." }
  ]
}
"#;

        let config = Config::parse(json_content, Format::Json).expect("Failed to parse JSON");

        let github = config.sources.github.expect("github source");
        assert_eq!(github.token.as_deref(), Some("ghp_example"));
        assert!(github.api_url.is_none());
        assert_eq!(config.locations.len(), 2);
        assert_eq!(config.locations[0].directory, "$HOME/work");
        assert_eq!(config.locations[1].repository, ".");
        assert!(!config.clone_options.fail_fast);
        assert!(!config.clone_options.verify_remote);
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml_content = r#"
sources:
  github:
    api_url: "https://github.example.com/api/v3"
locations:
  - directory: "~/src"
    repository: "example"
clone:
  fail_fast: true
  verify_remote: true
"#;

        let config = Config::parse(yaml_content, Format::Yaml).expect("Failed to parse YAML");

        let github = config.sources.github.expect("github source");
        assert!(github.token.is_none());
        assert_eq!(
            github.api_url.as_deref(),
            Some("https://github.example.com/api/v3")
        );
        assert_eq!(config.locations, vec![Location::new("~/src", "example")]);
        assert!(config.clone_options.fail_fast);
        assert!(config.clone_options.verify_remote);
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(Format::from_path(Path::new("a/config.json")), Format::Json);
        assert_eq!(Format::from_path(Path::new("a/config.yml")), Format::Yaml);
        assert_eq!(Format::from_path(Path::new("a/config.yaml")), Format::Yaml);
        assert_eq!(Format::from_path(Path::new("a/config")), Format::Json);
    }

    #[test]
    fn test_config_load_from_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("config.yml");
        std::fs::write(
            &config_path,
            "locations:\n  - directory: /tmp/repos\n    repository: \"^git@\"\n",
        )
        .expect("Failed to write config");

        let config = Config::load(&config_path).expect("Failed to load config");
        assert!(config.sources.github.is_none());
        assert_eq!(config.locations.len(), 1);
    }

    #[test]
    fn test_config_load_nonexistent_file() {
        let result = Config::load(Path::new("/nonexistent/path/config.json"));
        assert!(result.is_err());
    }

    #[test]
    fn test_config_load_invalid_content() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("config.json");
        std::fs::write(&config_path, "{ \"locations\": [").expect("Failed to write config");

        let err = Config::load(&config_path).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse config file"));
    }

    #[test]
    fn test_validate_counts_invalid_patterns() {
        let config = Config {
            locations: vec![
                Location::new("/a", "^git@host:org/"),
                Location::new("/b", "(unclosed"),
                Location::new("/c", "[z-a]"),
            ],
            ..Default::default()
        };

        assert_eq!(config.validate(), 2);
    }

    #[test]
    #[serial]
    fn test_directory_path_expansion() {
        env::set_var("MGIT_TEST_ROOT", "/test/home");

        let location = Location::new("${MGIT_TEST_ROOT}/dev", ".");
        assert_eq!(
            location.directory_path().expect("Failed to expand"),
            PathBuf::from("/test/home/dev")
        );

        let bare = Location::new("$MGIT_TEST_ROOT/src", ".");
        assert_eq!(
            bare.directory_path().expect("Failed to expand"),
            PathBuf::from("/test/home/src")
        );

        env::remove_var("MGIT_TEST_ROOT");
    }

    #[test]
    #[serial]
    fn test_directory_path_unknown_variable() {
        env::remove_var("MGIT_TEST_UNSET");

        let location = Location::new("$MGIT_TEST_UNSET/dev", ".");
        assert!(location.directory_path().is_err());
    }

    #[test]
    fn test_default_config_path() {
        let default_path = Config::default_config_path().expect("Failed to get default path");
        assert!(default_path.ends_with(".mgit/config.json"));
    }
}

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::providers::circleci::LogUrlStrategy;

/// Configuration file structure for ciflakes.
///
/// Holds the project coordinates and analysis settings that rarely change
/// between runs. Configuration files are loaded from the current directory or
/// a specified path; CLI flags override any value set here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    #[serde(default)]
    pub circleci: CircleCiConfig,

    #[serde(default)]
    pub analysis: AnalysisConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CircleCiConfig {
    /// CircleCI personal API token; `CIRCLECI_TOKEN` takes precedence
    pub token: Option<String>,

    /// CircleCI API host
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// CircleCI web app host, used for job links
    #[serde(default = "default_app_url")]
    pub app_url: String,

    /// GitHub organization
    #[serde(default = "default_org")]
    pub org: String,

    /// GitHub repository
    #[serde(default = "default_repo")]
    pub repo: String,

    /// Workflow whose runs are scanned on each branch
    #[serde(default = "default_workflow")]
    pub workflow: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AnalysisConfig {
    /// Days of history scanned for failing tests
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,

    /// Days of history scanned for flaky tests
    #[serde(default = "default_flaky_lookback_days")]
    pub flaky_lookback_days: u32,

    /// Job names never analyzed
    #[serde(default = "default_ignored_jobs")]
    pub ignored_jobs: Vec<String>,

    /// Which step output of a failed job to scan
    #[serde(default)]
    pub log_url_strategy: LogUrlStrategy,

    /// Job logs downloaded at the same time
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Timeout applied to every HTTP request
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,

    /// Pretty-print JSON output
    #[serde(default = "default_pretty")]
    pub pretty: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Markdown,
    Json,
    Table,
}

impl Default for CircleCiConfig {
    fn default() -> Self {
        Self {
            token: None,
            base_url: default_base_url(),
            app_url: default_app_url(),
            org: default_org(),
            repo: default_repo(),
            workflow: default_workflow(),
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            lookback_days: default_lookback_days(),
            flaky_lookback_days: default_flaky_lookback_days(),
            ignored_jobs: default_ignored_jobs(),
            log_url_strategy: LogUrlStrategy::default(),
            concurrency: default_concurrency(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            pretty: default_pretty(),
        }
    }
}

fn default_base_url() -> String {
    "https://circleci.com".to_string()
}

fn default_app_url() -> String {
    "https://app.circleci.com".to_string()
}

fn default_org() -> String {
    "gatsbyjs".to_string()
}

fn default_repo() -> String {
    "gatsby".to_string()
}

fn default_workflow() -> String {
    "build-test".to_string()
}

fn default_lookback_days() -> u32 {
    1
}

fn default_flaky_lookback_days() -> u32 {
    30
}

fn default_ignored_jobs() -> Vec<String> {
    [
        "lint",
        "windows_unit_tests",
        "unit_tests_node14",
        "unit_tests_node16",
        "unit_tests_node18",
        "starters_publish",
        "typecheck",
        "bootstrap",
        "integration_tests_gatsby_cli",
    ]
    .into_iter()
    .map(ToString::to_string)
    .collect()
}

fn default_concurrency() -> usize {
    1
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_pretty() -> bool {
    true
}

impl Config {
    /// Load configuration from a file.
    ///
    /// Searches for configuration files in this order:
    /// 1. Specified path
    /// 2. ./ciflakes.toml
    /// 3. ./ciflakes.json
    /// 4. ./ciflakes.yaml
    /// 5. ./ciflakes.yml
    ///
    /// Returns default configuration if no file is found.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from_path(path);
        }

        Self::load_from_dir(Path::new("."))
    }

    fn load_from_dir(dir: &Path) -> Result<Self> {
        let candidates = ["ciflakes.toml", "ciflakes.json", "ciflakes.yaml", "ciflakes.yml"];

        for candidate in &candidates {
            let path = dir.join(candidate);
            if path.exists() {
                return Self::load_from_path(&path);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file path.
    fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("");

        match extension {
            "toml" => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display())),
            "json" => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display())),
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display())),
            _ => toml::from_str(&contents)
                .or_else(|_| serde_json::from_str(&contents))
                .or_else(|_| serde_yaml::from_str(&contents))
                .with_context(|| format!("Failed to parse config file: {}", path.display())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.circleci.base_url, "https://circleci.com");
        assert_eq!(config.circleci.org, "gatsbyjs");
        assert_eq!(config.circleci.workflow, "build-test");
        assert_eq!(config.analysis.lookback_days, 1);
        assert_eq!(config.analysis.flaky_lookback_days, 30);
        assert_eq!(config.analysis.ignored_jobs.len(), 9);
        assert!(config.analysis.ignored_jobs.contains(&"typecheck".to_string()));
        assert_eq!(config.analysis.log_url_strategy, LogUrlStrategy::Last);
        assert_eq!(config.output.format, OutputFormat::Markdown);
        assert!(config.output.pretty);
    }

    #[test]
    fn test_load_toml_config() {
        let mut temp_file = NamedTempFile::with_suffix(".toml").unwrap();
        let toml_content = r#"
[circleci]
org = "acme"
repo = "widgets"
base-url = "https://circleci.example.com"

[analysis]
lookback-days = 7
ignored-jobs = ["lint"]
log-url-strategy = "first"
concurrency = 4

[output]
format = "table"
"#;
        write!(temp_file, "{toml_content}").unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.circleci.org, "acme");
        assert_eq!(config.circleci.repo, "widgets");
        assert_eq!(config.circleci.base_url, "https://circleci.example.com");
        assert_eq!(config.circleci.app_url, "https://app.circleci.com");
        assert_eq!(config.analysis.lookback_days, 7);
        assert_eq!(config.analysis.ignored_jobs, vec!["lint".to_string()]);
        assert_eq!(config.analysis.log_url_strategy, LogUrlStrategy::First);
        assert_eq!(config.analysis.concurrency, 4);
        assert_eq!(config.analysis.request_timeout_secs, 60);
        assert_eq!(config.output.format, OutputFormat::Table);
    }

    #[test]
    fn test_load_json_config() {
        let mut temp_file = NamedTempFile::with_suffix(".json").unwrap();
        let json_content = r#"{
  "circleci": { "token": "json-token", "workflow": "nightly" },
  "output": { "format": "json", "pretty": false }
}"#;
        write!(temp_file, "{json_content}").unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.circleci.token, Some("json-token".to_string()));
        assert_eq!(config.circleci.workflow, "nightly");
        assert_eq!(config.output.format, OutputFormat::Json);
        assert!(!config.output.pretty);
    }

    #[test]
    fn test_load_yaml_config() {
        let mut temp_file = NamedTempFile::with_suffix(".yml").unwrap();
        let yaml_content = "analysis:\n  flaky-lookback-days: 14\n  request-timeout-secs: 5\n";
        write!(temp_file, "{yaml_content}").unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.analysis.flaky_lookback_days, 14);
        assert_eq!(config.analysis.request_timeout_secs, 5);
        assert_eq!(config.analysis.lookback_days, 1);
    }

    #[test]
    fn test_load_missing_explicit_config_fails() {
        let result = Config::load(Some(Path::new("does-not-exist.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_from_dir_finds_candidate() {
        let temp_dir = tempfile::tempdir().unwrap();
        std::fs::write(
            temp_dir.path().join("ciflakes.toml"),
            "[analysis]\nlookback-days = 3\n",
        )
        .unwrap();

        let config = Config::load_from_dir(temp_dir.path()).unwrap();
        assert_eq!(config.analysis.lookback_days, 3);
    }

    #[test]
    fn test_load_from_empty_dir_uses_defaults() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = Config::load_from_dir(temp_dir.path()).unwrap();
        assert_eq!(config.circleci.repo, "gatsby");
    }
}

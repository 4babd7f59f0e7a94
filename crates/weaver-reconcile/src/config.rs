use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use weaver_adapters::{MatchFilter, DEFAULT_CRICAPI_BASE_URL, DEFAULT_TRENDS_BASE_URL};
use weaver_storage::{HttpClientConfig, HttpFetcher};

pub const DEFAULT_SEASON_ID: &str = "ipl-2024";
pub const SEASONS_FILE: &str = "seasons.yaml";

/// Process-wide settings, read once and handed to every resolver.
///
/// A `None` API key is a valid configuration: the matching resolver goes straight to
/// its fallback without touching the network.
#[derive(Debug, Clone)]
pub struct WeaverConfig {
    pub cricapi_key: Option<String>,
    pub trends_key: Option<String>,
    pub cricapi_base_url: String,
    pub trends_base_url: String,
    pub http_timeout_secs: u64,
    pub user_agent: String,
    pub season_id: String,
    pub keyword: String,
    pub geo: String,
    pub synthetic_seed: Option<u64>,
    pub workspace_root: PathBuf,
    pub web_port: u16,
}

impl Default for WeaverConfig {
    fn default() -> Self {
        Self {
            cricapi_key: None,
            trends_key: None,
            cricapi_base_url: DEFAULT_CRICAPI_BASE_URL.to_string(),
            trends_base_url: DEFAULT_TRENDS_BASE_URL.to_string(),
            http_timeout_secs: 20,
            user_agent: "data-weaver/0.1".to_string(),
            season_id: DEFAULT_SEASON_ID.to_string(),
            keyword: "swiggy".to_string(),
            geo: "IN".to_string(),
            synthetic_seed: None,
            workspace_root: PathBuf::from("."),
            web_port: 3000,
        }
    }
}

fn non_blank_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl WeaverConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            cricapi_key: non_blank_env("CRICAPI_KEY"),
            trends_key: non_blank_env("RAPIDAPI_KEY"),
            cricapi_base_url: non_blank_env("CRICAPI_BASE_URL").unwrap_or(defaults.cricapi_base_url),
            trends_base_url: non_blank_env("TRENDS_API_URL").unwrap_or(defaults.trends_base_url),
            http_timeout_secs: non_blank_env("WEAVER_HTTP_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.http_timeout_secs),
            user_agent: non_blank_env("WEAVER_USER_AGENT").unwrap_or(defaults.user_agent),
            season_id: non_blank_env("WEAVER_SEASON").unwrap_or(defaults.season_id),
            keyword: non_blank_env("WEAVER_KEYWORD").unwrap_or(defaults.keyword),
            geo: non_blank_env("WEAVER_GEO").unwrap_or(defaults.geo),
            synthetic_seed: non_blank_env("WEAVER_SYNTHETIC_SEED").and_then(|v| v.parse().ok()),
            workspace_root: non_blank_env("WEAVER_WORKSPACE_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.workspace_root),
            web_port: non_blank_env("WEAVER_WEB_PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.web_port),
        }
    }

    pub fn http_fetcher(&self) -> Result<HttpFetcher> {
        HttpFetcher::new(HttpClientConfig {
            timeout: Duration::from_secs(self.http_timeout_secs),
            user_agent: Some(self.user_agent.clone()),
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeasonRegistry {
    pub seasons: Vec<SeasonConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SeasonConfig {
    pub season_id: String,
    pub display_name: String,
    #[serde(flatten)]
    pub filter: MatchFilter,
    /// Bundled dataset, relative to the workspace root.
    pub fallback_file: PathBuf,
}

impl SeasonConfig {
    pub fn ipl_2024() -> Self {
        Self {
            season_id: DEFAULT_SEASON_ID.to_string(),
            display_name: "IPL 2024".to_string(),
            filter: MatchFilter {
                match_type: "t20".to_string(),
                tournament_name: "Indian Premier League".to_string(),
                acronym: "IPL".to_string(),
                series_id_fragment: "ipl".to_string(),
            },
            fallback_file: PathBuf::from("data/ipl-matches.json"),
        }
    }
}

impl SeasonRegistry {
    pub fn builtin() -> Self {
        Self {
            seasons: vec![SeasonConfig::ipl_2024()],
        }
    }

    /// `seasons.yaml` under the workspace root, or the built-in registry when absent.
    pub fn load(workspace_root: &Path) -> Result<Self> {
        let path = workspace_root.join(SEASONS_FILE);
        if !path.exists() {
            return Ok(Self::builtin());
        }
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        serde_yaml::from_str(&text).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn find(&self, season_id: &str) -> Option<&SeasonConfig> {
        self.seasons.iter().find(|s| s.season_id == season_id)
    }

    pub fn season(&self, season_id: &str) -> Result<SeasonConfig> {
        self.find(season_id)
            .cloned()
            .with_context(|| format!("no season registered for {season_id}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn registry_falls_back_to_builtin_without_file() {
        let dir = tempdir().expect("tempdir");
        let registry = SeasonRegistry::load(dir.path()).unwrap();
        assert_eq!(registry.season(DEFAULT_SEASON_ID).unwrap(), SeasonConfig::ipl_2024());
        assert!(registry.season("bbl-2024").is_err());
    }

    #[test]
    fn registry_reads_flattened_vocabulary_from_yaml() {
        let dir = tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join(SEASONS_FILE),
            r#"
seasons:
  - season_id: psl-2024
    display_name: PSL 2024
    match_type: t20
    tournament_name: Pakistan Super League
    acronym: PSL
    series_id_fragment: psl
    fallback_file: data/psl-matches.json
"#,
        )
        .unwrap();
        let registry = SeasonRegistry::load(dir.path()).unwrap();
        let season = registry.season("psl-2024").unwrap();
        assert_eq!(season.filter.acronym, "PSL");
        assert_eq!(season.fallback_file, PathBuf::from("data/psl-matches.json"));
    }

    #[test]
    fn default_config_has_no_keys() {
        let config = WeaverConfig::default();
        assert!(config.cricapi_key.is_none());
        assert!(config.trends_key.is_none());
        assert_eq!(config.web_port, 3000);
    }
}

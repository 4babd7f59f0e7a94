//! Match calendar cascade: current matches, then the full schedule, then the bundled file.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};
use weaver_adapters::{qualifying_matches, CricApiAdapter, MatchApiError, MatchEndpoint};
use weaver_core::MatchRecord;
use weaver_storage::{load_historical_matches, FallbackError, HttpFetcher};

use crate::config::{SeasonConfig, WeaverConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CalendarSource {
    CurrentMatches,
    FullSchedule,
    HistoricalFallback,
}

impl CalendarSource {
    pub fn label(self) -> &'static str {
        match self {
            CalendarSource::CurrentMatches | CalendarSource::FullSchedule => "CricAPI",
            CalendarSource::HistoricalFallback => "Local JSON (Historical Data)",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchCalendar {
    pub records: Vec<MatchRecord>,
    pub source: CalendarSource,
}

#[derive(Debug, Error)]
pub enum CalendarStrategyError {
    #[error("match API key not configured")]
    MissingApiKey,
    #[error(transparent)]
    Upstream(#[from] MatchApiError),
}

/// One remote step of the calendar cascade. An error or an empty result both mean
/// "try the next step".
#[async_trait]
pub trait CalendarStrategy: Send + Sync {
    fn source(&self) -> CalendarSource;

    async fn attempt(&self, season: &SeasonConfig)
        -> Result<Vec<MatchRecord>, CalendarStrategyError>;
}

pub struct MatchApiStrategy {
    adapter: Option<CricApiAdapter>,
    endpoint: MatchEndpoint,
}

impl MatchApiStrategy {
    pub fn new(adapter: Option<CricApiAdapter>, endpoint: MatchEndpoint) -> Self {
        Self { adapter, endpoint }
    }
}

#[async_trait]
impl CalendarStrategy for MatchApiStrategy {
    fn source(&self) -> CalendarSource {
        match self.endpoint {
            MatchEndpoint::CurrentMatches => CalendarSource::CurrentMatches,
            MatchEndpoint::FullSchedule => CalendarSource::FullSchedule,
        }
    }

    async fn attempt(
        &self,
        season: &SeasonConfig,
    ) -> Result<Vec<MatchRecord>, CalendarStrategyError> {
        let adapter = self
            .adapter
            .as_ref()
            .ok_or(CalendarStrategyError::MissingApiKey)?;
        let raw = adapter.fetch_matches(self.endpoint).await?;
        let today = Utc::now().date_naive();
        let records = qualifying_matches(&raw, &season.filter, today);
        info!(
            endpoint = self.endpoint.path(),
            checked = raw.len(),
            qualifying = records.len(),
            season = %season.season_id,
            "match feed filtered"
        );
        Ok(records)
    }
}

pub struct MatchCalendarResolver {
    strategies: Vec<Box<dyn CalendarStrategy>>,
    workspace_root: PathBuf,
}

impl MatchCalendarResolver {
    pub fn new(strategies: Vec<Box<dyn CalendarStrategy>>, workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            strategies,
            workspace_root: workspace_root.into(),
        }
    }

    pub fn from_config(config: &WeaverConfig, http: &HttpFetcher) -> Self {
        let adapter = config
            .cricapi_key
            .as_ref()
            .map(|key| CricApiAdapter::new(http.clone(), config.cricapi_base_url.clone(), key.clone()));
        Self::new(
            vec![
                Box::new(MatchApiStrategy::new(adapter.clone(), MatchEndpoint::CurrentMatches)),
                Box::new(MatchApiStrategy::new(adapter, MatchEndpoint::FullSchedule)),
            ],
            config.workspace_root.clone(),
        )
    }

    /// Remote results come back newest first; the bundled file keeps its own order.
    pub async fn resolve(&self, season: &SeasonConfig) -> Result<MatchCalendar, FallbackError> {
        for strategy in &self.strategies {
            match strategy.attempt(season).await {
                Ok(mut records) if !records.is_empty() => {
                    records.sort_by(|a, b| b.date.cmp(&a.date));
                    info!(source = ?strategy.source(), count = records.len(), "match calendar resolved");
                    return Ok(MatchCalendar {
                        records,
                        source: strategy.source(),
                    });
                }
                Ok(_) => {
                    info!(source = ?strategy.source(), "no qualifying matches, advancing");
                }
                Err(CalendarStrategyError::MissingApiKey) => {
                    info!(source = ?strategy.source(), "match API key missing, skipping remote step");
                }
                Err(CalendarStrategyError::Upstream(err)) => {
                    warn!(source = ?strategy.source(), kind = err.kind(), error = %err, "match API step failed");
                }
            }
        }

        let path = self.workspace_root.join(&season.fallback_file);
        let records = load_historical_matches(&path).await?;
        info!(count = records.len(), path = %path.display(), "using bundled historical matches");
        Ok(MatchCalendar {
            records,
            source: CalendarSource::HistoricalFallback,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::tempdir;
    use weaver_storage::{FetchError, HttpClientConfig};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    enum Canned {
        Records(Vec<MatchRecord>),
        Fail,
    }

    struct CannedStrategy {
        source: CalendarSource,
        canned: Canned,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl CalendarStrategy for CannedStrategy {
        fn source(&self) -> CalendarSource {
            self.source
        }

        async fn attempt(
            &self,
            _season: &SeasonConfig,
        ) -> Result<Vec<MatchRecord>, CalendarStrategyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.canned {
                Canned::Records(r) => Ok(r.clone()),
                Canned::Fail => Err(CalendarStrategyError::Upstream(MatchApiError::Fetch(
                    FetchError::HttpStatus {
                        status: 503,
                        url: "http://upstream/currentMatches".into(),
                    },
                ))),
            }
        }
    }

    fn canned(source: CalendarSource, canned: Canned) -> (Box<dyn CalendarStrategy>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Box::new(CannedStrategy {
                source,
                canned,
                calls: calls.clone(),
            }),
            calls,
        )
    }

    fn rec(date: &str, label: &str) -> MatchRecord {
        MatchRecord {
            date: date.parse().unwrap(),
            label: label.to_string(),
            venue: "TBD".to_string(),
            match_type: "league".to_string(),
            source_id: None,
            status: None,
        }
    }

    fn workspace_root() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../..")
            .canonicalize()
            .expect("workspace root")
    }

    fn bundled() -> Vec<MatchRecord> {
        let path = workspace_root().join("data/ipl-matches.json");
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn first_non_empty_strategy_wins_and_is_sorted_newest_first() {
        let (current, current_calls) = canned(
            CalendarSource::CurrentMatches,
            Canned::Records(vec![rec("2024-03-22", "A"), rec("2024-04-01", "B"), rec("2024-03-25", "C")]),
        );
        let (full, full_calls) = canned(CalendarSource::FullSchedule, Canned::Records(vec![rec("2024-05-01", "Z")]));
        let resolver = MatchCalendarResolver::new(vec![current, full], workspace_root());

        let calendar = resolver.resolve(&SeasonConfig::ipl_2024()).await.unwrap();
        assert_eq!(calendar.source, CalendarSource::CurrentMatches);
        let labels = calendar.records.iter().map(|r| r.label.as_str()).collect::<Vec<_>>();
        assert_eq!(labels, vec!["B", "C", "A"]);
        assert_eq!(current_calls.load(Ordering::SeqCst), 1);
        assert_eq!(full_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_first_step_advances_to_full_schedule() {
        let (current, _) = canned(CalendarSource::CurrentMatches, Canned::Fail);
        let (full, full_calls) = canned(CalendarSource::FullSchedule, Canned::Records(vec![rec("2024-05-01", "Z")]));
        let resolver = MatchCalendarResolver::new(vec![current, full], workspace_root());

        let calendar = resolver.resolve(&SeasonConfig::ipl_2024()).await.unwrap();
        assert_eq!(calendar.source, CalendarSource::FullSchedule);
        assert_eq!(calendar.records, vec![rec("2024-05-01", "Z")]);
        assert_eq!(full_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_remote_steps_return_bundled_dataset_verbatim() {
        let (current, _) = canned(CalendarSource::CurrentMatches, Canned::Records(vec![]));
        let (full, _) = canned(CalendarSource::FullSchedule, Canned::Fail);
        let resolver = MatchCalendarResolver::new(vec![current, full], workspace_root());

        let calendar = resolver.resolve(&SeasonConfig::ipl_2024()).await.unwrap();
        assert_eq!(calendar.source, CalendarSource::HistoricalFallback);
        assert_eq!(calendar.records, bundled());
    }

    #[tokio::test]
    async fn missing_key_goes_straight_to_bundled_dataset() {
        let config = WeaverConfig {
            workspace_root: workspace_root(),
            ..WeaverConfig::default()
        };
        let http = HttpFetcher::new(HttpClientConfig::default()).unwrap();
        let resolver = MatchCalendarResolver::from_config(&config, &http);

        let calendar = resolver.resolve(&SeasonConfig::ipl_2024()).await.unwrap();
        assert_eq!(calendar.source, CalendarSource::HistoricalFallback);
        assert_eq!(calendar.records.len(), bundled().len());
    }

    #[tokio::test]
    async fn missing_fallback_file_is_surfaced() {
        let dir = tempdir().expect("tempdir");
        let (current, _) = canned(CalendarSource::CurrentMatches, Canned::Fail);
        let resolver = MatchCalendarResolver::new(vec![current], dir.path());

        let err = resolver.resolve(&SeasonConfig::ipl_2024()).await.unwrap_err();
        assert!(matches!(err, FallbackError::Read { .. }));
    }

    #[tokio::test]
    async fn remote_endpoints_filter_to_the_season() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/currentMatches"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"name": "Big Bash League, 3rd Match", "matchType": "t20"}],
                "status": "success"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/matches"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [
                    {"id": "q1", "name": "Qualifier 1", "series": "IPL 2024", "matchType": "t20",
                     "teams": ["KKR", "SRH"], "dateTimeGMT": "2024-05-21T14:00:00"},
                    {"id": "f", "name": "Final", "seriesId": "ipl-2024", "matchType": "t20",
                     "teams": ["KKR", "SRH"], "dateTimeGMT": "2024-05-26T14:00:00"},
                    {"id": "t", "name": "IPL exhibition", "matchType": "t10"}
                ],
                "status": "success"
            })))
            .mount(&server)
            .await;

        let config = WeaverConfig {
            cricapi_key: Some("k".into()),
            cricapi_base_url: server.uri(),
            workspace_root: workspace_root(),
            ..WeaverConfig::default()
        };
        let http = HttpFetcher::new(HttpClientConfig::default()).unwrap();
        let resolver = MatchCalendarResolver::from_config(&config, &http);

        let calendar = resolver.resolve(&SeasonConfig::ipl_2024()).await.unwrap();
        assert_eq!(calendar.source, CalendarSource::FullSchedule);
        let ids = calendar
            .records
            .iter()
            .map(|r| r.source_id.as_deref().unwrap())
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["f", "q1"]);
    }
}

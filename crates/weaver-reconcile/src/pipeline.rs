//! One dashboard load: calendar, padded window, interest series, reconciliation.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;
use weaver_core::{DailyRecord, DateWindow, Insight, MatchRecord, Statistic};
use weaver_storage::HttpFetcher;

use crate::calendar::{CalendarSource, MatchCalendarResolver};
use crate::config::{SeasonConfig, SeasonRegistry, WeaverConfig};
use crate::interest::{InterestSeriesResolver, SeriesSource};
use crate::reconciler::{match_day_set, Reconciler};

/// Days added before the first and after the last match so the window holds
/// non-match days on both ends.
pub const WINDOW_PADDING_DAYS: u64 = 5;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSnapshot {
    pub load_id: Uuid,
    pub season_id: String,
    pub season_name: String,
    pub window: DateWindow,
    pub total_matches: usize,
    pub matches: Vec<MatchRecord>,
    pub calendar_source: CalendarSource,
    pub series_source: SeriesSource,
    /// Real interest data existed but none of it overlapped the window.
    pub series_out_of_range: bool,
    pub records: Vec<DailyRecord>,
    pub statistic: Statistic,
    pub insights: Vec<Insight>,
}

/// One dashboard load. Build a fresh pipeline per load; nothing is shared between runs.
pub struct DashboardPipeline {
    config: WeaverConfig,
    season: SeasonConfig,
    calendar: MatchCalendarResolver,
    interest: InterestSeriesResolver,
    reconciler: Reconciler,
}

impl DashboardPipeline {
    pub fn new(config: WeaverConfig, http: &HttpFetcher) -> Result<Self> {
        let season = SeasonRegistry::load(&config.workspace_root)?.season(&config.season_id)?;
        let calendar = MatchCalendarResolver::from_config(&config, http);
        let interest = InterestSeriesResolver::from_config(&config, http);
        Ok(Self::from_parts(config, season, calendar, interest))
    }

    pub fn from_parts(
        config: WeaverConfig,
        season: SeasonConfig,
        calendar: MatchCalendarResolver,
        interest: InterestSeriesResolver,
    ) -> Self {
        let reconciler = Reconciler::new(season.filter.acronym.clone());
        Self {
            config,
            season,
            calendar,
            interest,
            reconciler,
        }
    }

    pub async fn run_once(mut self) -> Result<DashboardSnapshot> {
        let load_id = Uuid::new_v4();
        let span = info_span!("dashboard_load", %load_id, season = %self.season.season_id);
        async move {
            let calendar = self
                .calendar
                .resolve(&self.season)
                .await
                .context("resolving match calendar")?;
            let window = DateWindow::around(calendar.records.iter().map(|m| m.date), WINDOW_PADDING_DAYS)
                .context("match calendar is empty")?;
            let match_days = match_day_set(&calendar.records);

            let mut series = self
                .interest
                .resolve(&self.config.keyword, &self.config.geo, &window, &match_days)
                .await;
            let series_out_of_range = series.out_of_range;
            if series_out_of_range {
                warn!(
                    points = series.points.len(),
                    start = %window.start,
                    end = %window.end,
                    "real interest data misses the season window, simulating the dashboard series"
                );
                series = self.interest.simulate(
                    &window,
                    &match_days,
                    "trends: real data outside the season window",
                );
            }
            let reconciliation = self.reconciler.reconcile(&calendar.records, &series.points, &window);

            info!(
                matches = calendar.records.len(),
                days = reconciliation.records.len(),
                percent_increase = reconciliation.statistic.percent_increase,
                "dashboard reconciled"
            );

            Ok(DashboardSnapshot {
                load_id,
                season_id: self.season.season_id.clone(),
                season_name: self.season.display_name.clone(),
                window,
                total_matches: calendar.records.len(),
                matches: calendar.records,
                calendar_source: calendar.source,
                series_source: series.source,
                series_out_of_range,
                records: reconciliation.records,
                statistic: reconciliation.statistic,
                insights: reconciliation.insights,
            })
        }
        .instrument(span)
        .await
    }
}

pub async fn run_dashboard_once_from_env() -> Result<DashboardSnapshot> {
    let config = WeaverConfig::from_env();
    let http = config.http_fetcher()?;
    DashboardPipeline::new(config, &http)?.run_once().await
}

pub fn report_markdown(snapshot: &DashboardSnapshot) -> String {
    let stat = &snapshot.statistic;
    let mut lines = vec![
        format!("# {} Food Delivery Interest", snapshot.season_name),
        String::new(),
        format!("- Load ID: `{}`", snapshot.load_id),
        format!("- Window: {} to {}", snapshot.window.start, snapshot.window.end),
        format!("- Matches: {} ({})", snapshot.total_matches, snapshot.calendar_source.label()),
        format!("- Interest source: {}", snapshot.series_source.label()),
        format!("- Days compared: {} match / {} non-match", stat.match_days, stat.non_match_days),
        format!("- Avg interest on match days: {:.1}", stat.avg_match_day),
        format!("- Avg interest on other days: {:.1}", stat.avg_non_match_day),
        format!("- Correlation: {:?} ({:+.1}%)", stat.sign, stat.percent_increase),
    ];
    if snapshot.series_out_of_range {
        lines.push("- Note: real interest data did not overlap the season window".to_string());
    }
    lines.push(String::new());
    lines.push("## Insights".to_string());
    for insight in &snapshot.insights {
        lines.push(format!("- **{}**: {}", insight.title, insight.text));
    }
    lines.push(String::new());
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use weaver_storage::HttpClientConfig;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn offline_config() -> WeaverConfig {
        WeaverConfig {
            workspace_root: Path::new(env!("CARGO_MANIFEST_DIR"))
                .join("../..")
                .canonicalize()
                .expect("workspace root"),
            synthetic_seed: Some(11),
            ..WeaverConfig::default()
        }
    }

    #[tokio::test]
    async fn offline_load_uses_both_fallbacks() {
        let http = HttpFetcher::new(HttpClientConfig::default()).unwrap();
        let snapshot = DashboardPipeline::new(offline_config(), &http)
            .unwrap()
            .run_once()
            .await
            .unwrap();

        assert_eq!(snapshot.calendar_source, CalendarSource::HistoricalFallback);
        assert!(snapshot.series_source.is_fallback());
        assert!(!snapshot.series_out_of_range);
        assert_eq!(snapshot.total_matches, snapshot.matches.len());

        let first = snapshot.matches.iter().map(|m| m.date).min().unwrap();
        let last = snapshot.matches.iter().map(|m| m.date).max().unwrap();
        assert_eq!((snapshot.window.end - snapshot.window.start).num_days(), (last - first).num_days() + 10);
        assert_eq!(snapshot.records.len() as i64, (last - first).num_days() + 11);
        assert!(snapshot.records.iter().all(|r| snapshot.window.contains(r.date)));
        assert!(snapshot.statistic.match_days > 0 && snapshot.statistic.non_match_days > 0);
        assert!(snapshot.statistic.percent_increase.is_finite());
        assert_eq!(snapshot.insights.last().unwrap().title, "Business Opportunity");
    }

    #[tokio::test]
    async fn out_of_window_trends_data_is_replaced_by_simulation() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/interestOverTime"))
            .and(header("x-rapidapi-key", "trends-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "default": {"timelineData": [
                    {"time": "1735689600", "value": [61]},
                    {"time": "1735776000", "value": [64]}
                ]}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let config = WeaverConfig {
            trends_key: Some("trends-key".to_string()),
            trends_base_url: server.uri(),
            ..offline_config()
        };
        let http = HttpFetcher::new(HttpClientConfig::default()).unwrap();
        let snapshot = DashboardPipeline::new(config, &http).unwrap().run_once().await.unwrap();

        assert!(snapshot.series_out_of_range);
        assert!(snapshot.series_source.is_fallback());
        assert_eq!(
            snapshot.records.len(),
            snapshot.window.days().count()
        );
        assert!(snapshot.statistic.match_days > 0 && snapshot.statistic.non_match_days > 0);
        assert!(report_markdown(&snapshot).contains("did not overlap the season window"));
    }

    #[tokio::test]
    async fn seeded_loads_reconcile_identically() {
        let http = HttpFetcher::new(HttpClientConfig::default()).unwrap();
        let a = DashboardPipeline::new(offline_config(), &http).unwrap().run_once().await.unwrap();
        let b = DashboardPipeline::new(offline_config(), &http).unwrap().run_once().await.unwrap();
        assert_eq!(a.records, b.records);
        assert_eq!(a.statistic, b.statistic);
        assert_ne!(a.load_id, b.load_id);
    }

    #[tokio::test]
    async fn report_lists_every_insight() {
        let http = HttpFetcher::new(HttpClientConfig::default()).unwrap();
        let snapshot = DashboardPipeline::new(offline_config(), &http).unwrap().run_once().await.unwrap();
        let report = report_markdown(&snapshot);
        assert!(report.starts_with("# IPL 2024 Food Delivery Interest"));
        assert!(report.contains("Local JSON (Historical Data)"));
        for insight in &snapshot.insights {
            assert!(report.contains(&insight.title));
        }
    }
}

//! Axum proxy + dashboard surface.

use std::collections::HashSet;
use std::sync::Arc;

use askama::Template;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tracing::{info, warn};
use weaver_adapters::{MatchEndpoint, TrendsAdapter};
use weaver_core::{DateWindow, Insight};
use weaver_reconcile::{
    match_day_set, CalendarSource, CalendarStrategy, DashboardPipeline, DashboardSnapshot,
    InterestSeriesResolver, InterestStrategy, MatchApiStrategy, MatchCalendarResolver,
    SeasonConfig, SeasonRegistry, SeriesSource, TrendsStrategy, WeaverConfig, WINDOW_PADDING_DAYS,
};
use weaver_storage::HttpFetcher;

pub const CRATE_NAME: &str = "weaver-web";

/// Widest window `/api/trends/interest` will serve, inclusive.
pub const MAX_WINDOW_DAYS: i64 = 400;

/// Shared, read-only request context. Resolvers are rebuilt per request.
#[derive(Clone)]
pub struct AppState {
    pub config: WeaverConfig,
    pub http: HttpFetcher,
}

impl AppState {
    pub fn new(config: WeaverConfig) -> anyhow::Result<Self> {
        let http = config.http_fetcher()?;
        Ok(Self { config, http })
    }

    fn season(&self) -> anyhow::Result<SeasonConfig> {
        SeasonRegistry::load(&self.config.workspace_root)?.season(&self.config.season_id)
    }

    fn match_api_strategy(&self, endpoint: MatchEndpoint) -> MatchApiStrategy {
        let adapter = self.config.cricapi_key.as_ref().map(|key| {
            weaver_adapters::CricApiAdapter::new(
                self.http.clone(),
                self.config.cricapi_base_url.clone(),
                key.clone(),
            )
        });
        MatchApiStrategy::new(adapter, endpoint)
    }

    fn trends_strategy(&self) -> TrendsStrategy {
        TrendsStrategy::new(self.config.trends_key.as_ref().map(|key| {
            TrendsAdapter::new(self.http.clone(), self.config.trends_base_url.clone(), key.clone())
        }))
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct TrendsQuery {
    keyword: Option<String>,
    geo: Option<String>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
}

#[derive(Template)]
#[template(path = "dashboard.html")]
struct DashboardTemplate {
    season_name: String,
    window_text: String,
    total_matches: usize,
    avg_match_day: String,
    avg_non_match_day: String,
    correlation_text: String,
    calendar_source: String,
    series_source: String,
    series_out_of_range: bool,
    insights: Vec<Insight>,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/api/health", get(health_handler))
        .route("/api/cricket/matches", get(cricket_matches_handler))
        .route("/api/cricket/current-matches", get(current_matches_handler))
        .route("/api/trends/interest", get(trends_interest_handler))
        .route("/api/test-trends", get(test_trends_handler))
        .route("/api/dashboard", get(dashboard_handler))
        .route("/api/dashboard/chart", get(dashboard_chart_handler))
        .with_state(Arc::new(state))
}

pub async fn serve(config: WeaverConfig) -> anyhow::Result<()> {
    let port = config.web_port;
    info!(
        port,
        cricket = key_status(&config.cricapi_key),
        trends = key_status(&config.trends_key),
        "starting data weaver server"
    );
    let state = AppState::new(config)?;
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    axum::serve(listener, app(state)).await?;
    Ok(())
}

pub async fn serve_from_env() -> anyhow::Result<()> {
    serve(WeaverConfig::from_env()).await
}

fn key_status(key: &Option<String>) -> &'static str {
    if key.is_some() {
        "configured"
    } else {
        "missing"
    }
}

async fn index_handler(State(state): State<Arc<AppState>>) -> Response {
    match load_dashboard(&state).await {
        Ok(snapshot) => {
            let stat = &snapshot.statistic;
            render_html(DashboardTemplate {
                season_name: snapshot.season_name.clone(),
                window_text: format!("{} to {}", snapshot.window.start, snapshot.window.end),
                total_matches: snapshot.total_matches,
                avg_match_day: format!("{:.1}", stat.avg_match_day),
                avg_non_match_day: format!("{:.1}", stat.avg_non_match_day),
                correlation_text: format!("{:?} ({:+.1}%)", stat.sign, stat.percent_increase),
                calendar_source: snapshot.calendar_source.label().to_string(),
                series_source: snapshot.series_source.label().to_string(),
                series_out_of_range: snapshot.series_out_of_range,
                insights: snapshot.insights,
            })
        }
        Err(err) => server_error(err),
    }
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Response {
    let config = &state.config;
    let message = if config.cricapi_key.is_some() && config.trends_key.is_some() {
        "All APIs configured"
    } else {
        "Some API keys missing - using fallback data"
    };
    Json(json!({
        "status": "ok",
        "apis": {
            "cricket": key_status(&config.cricapi_key),
            "trends": key_status(&config.trends_key),
        },
        "message": message,
        "endpoints": {
            "health": "/api/health",
            "testTrends": "/api/test-trends",
            "cricketMatches": "/api/cricket/matches",
            "trendsInterest": "/api/trends/interest",
            "dashboard": "/api/dashboard",
        }
    }))
    .into_response()
}

async fn cricket_matches_handler(State(state): State<Arc<AppState>>) -> Response {
    let season = match state.season() {
        Ok(season) => season,
        Err(err) => return json_error(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    };
    let resolver = MatchCalendarResolver::from_config(&state.config, &state.http);
    match resolver.resolve(&season).await {
        Ok(calendar) => {
            let mut body = json!({
                "success": true,
                "data": calendar.records,
                "source": calendar.source.label(),
            });
            if calendar.source == CalendarSource::HistoricalFallback {
                body["note"] = json!(format!(
                    "Match API returned no qualifying matches. Using bundled {} data.",
                    season.display_name
                ));
            }
            Json(body).into_response()
        }
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "success": false,
                "error": "No matches available",
                "details": err.to_string(),
            })),
        )
            .into_response(),
    }
}

async fn current_matches_handler(State(state): State<Arc<AppState>>) -> Response {
    let season = match state.season() {
        Ok(season) => season,
        Err(err) => return json_error(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    };
    let strategy = state.match_api_strategy(MatchEndpoint::CurrentMatches);
    match strategy.attempt(&season).await {
        Ok(records) => Json(json!({
            "success": true,
            "data": records,
            "source": strategy.source().label(),
        }))
        .into_response(),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "success": false,
                "error": err.to_string(),
                "fallback": true,
            })),
        )
            .into_response(),
    }
}

async fn trends_interest_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TrendsQuery>,
) -> Response {
    let season = match state.season() {
        Ok(season) => season,
        Err(err) => return json_error(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    };
    let keyword = query.keyword.unwrap_or_else(|| state.config.keyword.clone());
    let geo = query.geo.unwrap_or_else(|| state.config.geo.clone());

    // The calendar supplies the default window and the match days the simulation boosts.
    let calendar = MatchCalendarResolver::from_config(&state.config, &state.http)
        .resolve(&season)
        .await;
    let derived = calendar.as_ref().ok().and_then(|c| {
        DateWindow::around(c.records.iter().map(|m| m.date), WINDOW_PADDING_DAYS)
    });
    let start = query.start_date.or(derived.map(|w| w.start));
    let end = query.end_date.or(derived.map(|w| w.end));
    let (Some(start), Some(end)) = (start, end) else {
        let details = match &calendar {
            Err(err) => err.to_string(),
            Ok(_) => "no date window available".to_string(),
        };
        return json_error(StatusCode::INTERNAL_SERVER_ERROR, details);
    };
    let match_days = match &calendar {
        Ok(c) => match_day_set(&c.records),
        Err(err) => {
            warn!(error = %err, "match calendar unavailable, simulating without match days");
            HashSet::new()
        }
    };

    if end < start {
        return json_error(StatusCode::BAD_REQUEST, "endDate precedes startDate".to_string());
    }
    if (end - start).num_days() + 1 > MAX_WINDOW_DAYS {
        return json_error(
            StatusCode::BAD_REQUEST,
            format!("date window exceeds {MAX_WINDOW_DAYS} days"),
        );
    }

    let window = DateWindow::new(start, end);
    let mut resolver = InterestSeriesResolver::from_config(&state.config, &state.http);
    let series = resolver.resolve(&keyword, &geo, &window, &match_days).await;

    let mut body = json!({
        "success": true,
        "data": { "timeline": series.points },
        "source": series.source.label(),
    });
    match &series.source {
        SeriesSource::Trends => {
            body["count"] = json!(series.points.len());
            if series.out_of_range {
                body["outOfRange"] = json!(true);
            }
        }
        SeriesSource::Synthetic { reason } => {
            body["fallback"] = json!(true);
            body["reason"] = json!(reason);
        }
    }
    Json(body).into_response()
}

async fn test_trends_handler(State(state): State<Arc<AppState>>) -> Response {
    let strategy = state.trends_strategy();
    match strategy.attempt(&state.config.keyword, &state.config.geo).await {
        Ok(points) => Json(json!({
            "success": true,
            "message": "Trends API working.",
            "dataPoints": points.len(),
            "sample": points.iter().take(5).collect::<Vec<_>>(),
            "source": SeriesSource::Trends.label(),
        }))
        .into_response(),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "success": false,
                "error": err.to_string(),
                "kind": err.kind(),
                "note": "Trends provider may be rate-limited. The dashboard falls back to simulated data.",
            })),
        )
            .into_response(),
    }
}

async fn dashboard_handler(State(state): State<Arc<AppState>>) -> Response {
    match load_dashboard(&state).await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(err) => json_error(StatusCode::INTERNAL_SERVER_ERROR, format!("{err:#}")),
    }
}

async fn dashboard_chart_handler(State(state): State<Arc<AppState>>) -> Response {
    match load_dashboard(&state).await {
        Ok(snapshot) => Json(chart_payload(&snapshot)).into_response(),
        Err(err) => json_error(StatusCode::INTERNAL_SERVER_ERROR, format!("{err:#}")),
    }
}

async fn load_dashboard(state: &AppState) -> anyhow::Result<DashboardSnapshot> {
    DashboardPipeline::new(state.config.clone(), &state.http)?
        .run_once()
        .await
}

/// Plotly-style traces: the daily line with match-day markers, and the two-bucket bars.
pub fn chart_payload(snapshot: &DashboardSnapshot) -> serde_json::Value {
    let x = snapshot.records.iter().map(|r| r.date.to_string()).collect::<Vec<_>>();
    let y = snapshot.records.iter().map(|r| r.interest).collect::<Vec<_>>();
    let match_points = snapshot
        .records
        .iter()
        .filter(|r| r.is_match_day)
        .collect::<Vec<_>>();
    let marker_text = match_points
        .iter()
        .map(|r| {
            snapshot
                .matches
                .iter()
                .find(|m| m.date == r.date)
                .map(|m| format!("Match: {}", m.label))
                .unwrap_or_default()
        })
        .collect::<Vec<_>>();
    let stat = &snapshot.statistic;

    json!({
        "timeline": {
            "data": [
                {
                    "type": "scatter",
                    "mode": "lines",
                    "name": "Food Delivery Interest",
                    "x": x,
                    "y": y,
                    "fill": "tozeroy",
                    "line": {"color": "#667eea", "shape": "spline"}
                },
                {
                    "type": "scatter",
                    "mode": "markers",
                    "name": format!("{} Match Days", snapshot.season_name),
                    "x": match_points.iter().map(|r| r.date.to_string()).collect::<Vec<_>>(),
                    "y": match_points.iter().map(|r| r.interest).collect::<Vec<_>>(),
                    "text": marker_text,
                    "marker": {"color": "#ff6384", "size": 12, "symbol": "star"}
                }
            ],
            "layout": {
                "title": "Food Delivery Interest Over Time",
                "xaxis": {"title": "Date"},
                "yaxis": {"title": "Search Interest"}
            }
        },
        "comparison": {
            "data": [{
                "type": "bar",
                "x": ["Match Days", "Non-Match Days"],
                "y": [stat.avg_match_day, stat.avg_non_match_day],
                "marker": {"color": ["#ff6384", "#36a2eb"]}
            }],
            "layout": {
                "title": "Average Interest: Match Days vs Non-Match Days",
                "yaxis": {"title": "Average Search Interest"}
            }
        }
    })
}

fn render_html<T: Template>(tpl: T) -> Response {
    match tpl.render() {
        Ok(html) => Html(html).into_response(),
        Err(err) => server_error(anyhow::anyhow!(err.to_string())),
    }
}

fn server_error(err: anyhow::Error) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Html(format!("Server error: {err:#}")),
    )
        .into_response()
}

fn json_error(status: StatusCode, error: String) -> Response {
    (status, Json(json!({ "success": false, "error": error }))).into_response()
}

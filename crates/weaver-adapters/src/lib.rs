//! Upstream adapters: the cricket match API and the search-interest (trends) API.
//!
//! Adapters only talk HTTP and translate wire payloads into core types. Deciding what
//! to do when an upstream fails is left to the resolvers.

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::debug;
use weaver_core::{InterestPoint, MatchRecord};
use weaver_storage::{FailureKind, FetchError, HttpFetcher};

pub const CRATE_NAME: &str = "weaver-adapters";

pub const DEFAULT_CRICAPI_BASE_URL: &str = "https://api.cricapi.com/v1";
pub const DEFAULT_TRENDS_BASE_URL: &str = "https://google-trends-api.p.rapidapi.com";

const TRENDS_XSSI_PREFIX: &str = ")]}'";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchEndpoint {
    CurrentMatches,
    FullSchedule,
}

impl MatchEndpoint {
    pub fn path(self) -> &'static str {
        match self {
            MatchEndpoint::CurrentMatches => "currentMatches",
            MatchEndpoint::FullSchedule => "matches",
        }
    }

    pub fn source_id(self) -> &'static str {
        match self {
            MatchEndpoint::CurrentMatches => "cricapi-current",
            MatchEndpoint::FullSchedule => "cricapi-matches",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CricApiResponse {
    #[serde(default)]
    pub data: Option<Vec<CricApiMatch>>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// A fixture as the match API sends it. Every field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CricApiMatch {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub match_type: Option<String>,
    #[serde(default)]
    pub series: Option<String>,
    #[serde(default)]
    pub series_id: Option<String>,
    #[serde(default)]
    pub teams: Option<Vec<String>>,
    #[serde(default)]
    pub venue: Option<String>,
    #[serde(default, rename = "dateTimeGMT")]
    pub date_time_gmt: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Season vocabulary used to pick a tournament's fixtures out of a mixed feed.
///
/// All substring checks are case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchFilter {
    pub match_type: String,
    pub tournament_name: String,
    pub acronym: String,
    pub series_id_fragment: String,
}

impl MatchFilter {
    pub fn accepts(&self, raw: &CricApiMatch) -> bool {
        if raw.match_type.as_deref() != Some(self.match_type.as_str()) {
            return false;
        }
        let name_hit = raw.name.as_deref().is_some_and(|name| {
            name.contains(&self.tournament_name) || name.contains(&self.acronym)
        });
        let series_hit = raw
            .series
            .as_deref()
            .is_some_and(|series| series.contains(&self.acronym));
        let series_id_hit = raw
            .series_id
            .as_deref()
            .is_some_and(|id| id.contains(&self.series_id_fragment));
        name_hit || series_hit || series_id_hit
    }
}

/// Resolve every optional upstream field to its documented default.
///
/// A missing or unparsable `dateTimeGMT` falls back to `today`.
pub fn to_match_record(raw: &CricApiMatch, today: NaiveDate) -> MatchRecord {
    let date = raw
        .date_time_gmt
        .as_deref()
        .and_then(|ts| ts.split('T').next())
        .and_then(|day| day.parse::<NaiveDate>().ok())
        .unwrap_or(today);
    let team = |idx: usize, default: &str| {
        raw.teams
            .as_ref()
            .and_then(|teams| teams.get(idx))
            .cloned()
            .unwrap_or_else(|| default.to_string())
    };
    MatchRecord {
        date,
        label: format!("{} vs {}", team(0, "Team 1"), team(1, "Team 2")),
        venue: raw.venue.clone().unwrap_or_else(|| "TBD".to_string()),
        match_type: "league".to_string(),
        source_id: raw.id.clone(),
        status: Some(raw.status.clone().unwrap_or_else(|| "scheduled".to_string())),
    }
}

pub fn qualifying_matches(
    raw: &[CricApiMatch],
    filter: &MatchFilter,
    today: NaiveDate,
) -> Vec<MatchRecord> {
    raw.iter()
        .filter(|m| filter.accepts(m))
        .map(|m| to_match_record(m, today))
        .collect()
}

#[derive(Debug, Error)]
pub enum MatchApiError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("malformed match payload: {0}")]
    Malformed(String),
    #[error("match API rejected the request: {0}")]
    Rejected(String),
}

impl MatchApiError {
    pub fn kind(&self) -> &'static str {
        match self {
            MatchApiError::Fetch(err) => err.kind().as_str(),
            MatchApiError::Malformed(_) => "malformed",
            MatchApiError::Rejected(_) => FailureKind::Unavailable.as_str(),
        }
    }
}

pub fn parse_match_payload(body: &[u8]) -> Result<Vec<CricApiMatch>, MatchApiError> {
    let payload: CricApiResponse =
        serde_json::from_slice(body).map_err(|e| MatchApiError::Malformed(e.to_string()))?;
    if payload.status.as_deref() == Some("failure") {
        return Err(MatchApiError::Rejected(
            payload.reason.unwrap_or_else(|| "unspecified failure".to_string()),
        ));
    }
    Ok(payload.data.unwrap_or_default())
}

#[derive(Debug, Clone)]
pub struct CricApiAdapter {
    http: HttpFetcher,
    base_url: String,
    api_key: String,
}

impl CricApiAdapter {
    pub fn new(http: HttpFetcher, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    pub async fn fetch_matches(
        &self,
        endpoint: MatchEndpoint,
    ) -> Result<Vec<CricApiMatch>, MatchApiError> {
        let url = format!("{}/{}", self.base_url, endpoint.path());
        let resp = self
            .http
            .fetch_bytes(
                endpoint.source_id(),
                &url,
                &[("apikey", self.api_key.as_str()), ("offset", "0")],
                &[],
            )
            .await?;
        let matches = parse_match_payload(&resp.body)?;
        debug!(endpoint = endpoint.path(), count = matches.len(), "match feed parsed");
        Ok(matches)
    }
}

#[derive(Debug, Error)]
pub enum TrendsError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("trends provider rate limited the request: {0}")]
    RateLimited(String),
    #[error("malformed trends payload: {0}")]
    Malformed(String),
}

impl TrendsError {
    pub fn kind(&self) -> &'static str {
        match self {
            TrendsError::Fetch(err) => err.kind().as_str(),
            TrendsError::RateLimited(_) => FailureKind::RateLimited.as_str(),
            TrendsError::Malformed(_) => "malformed",
        }
    }
}

fn looks_rate_limited(body: &str) -> bool {
    let lower = body.to_ascii_lowercase();
    lower.contains("<html") || lower.contains("<!doctype html") || body.contains("Error 429")
}

fn json_at<'a>(value: &'a JsonValue, path: &[&str]) -> Option<&'a JsonValue> {
    let mut cur = value;
    for segment in path {
        cur = cur.get(*segment)?;
    }
    Some(cur)
}

fn epoch_seconds(value: &JsonValue) -> Option<i64> {
    match value {
        JsonValue::String(s) => s.trim().parse().ok(),
        JsonValue::Number(n) => n.as_i64(),
        _ => None,
    }
}

/// Turn a trends response body into daily points (UTC day of each timestamp).
pub fn parse_trends_body(body: &str) -> Result<Vec<InterestPoint>, TrendsError> {
    if looks_rate_limited(body) {
        let preview = body.chars().take(120).collect::<String>();
        return Err(TrendsError::RateLimited(preview));
    }

    let trimmed = body.trim_start();
    let json_text = trimmed
        .strip_prefix(TRENDS_XSSI_PREFIX)
        .map(|rest| rest.trim_start_matches(',').trim_start())
        .unwrap_or(trimmed);
    let value: JsonValue = serde_json::from_str(json_text)
        .map_err(|e| TrendsError::Malformed(format!("invalid JSON: {e}")))?;

    let timeline = json_at(&value, &["default", "timelineData"])
        .and_then(JsonValue::as_array)
        .ok_or_else(|| TrendsError::Malformed("no default.timelineData array".to_string()))?;

    let mut points = Vec::with_capacity(timeline.len());
    for entry in timeline {
        let Some(date) = entry
            .get("time")
            .and_then(epoch_seconds)
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .map(|ts| ts.date_naive())
        else {
            debug!(?entry, "skipping timeline entry without a usable timestamp");
            continue;
        };
        let value = entry
            .get("value")
            .and_then(JsonValue::as_array)
            .and_then(|values| values.first())
            .and_then(JsonValue::as_f64)
            .unwrap_or(0.0)
            .max(0.0);
        points.push(InterestPoint { date, value });
    }
    Ok(points)
}

#[derive(Debug, Clone)]
pub struct TrendsAdapter {
    http: HttpFetcher,
    base_url: String,
    api_key: String,
}

impl TrendsAdapter {
    pub fn new(http: HttpFetcher, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    /// Interest over the provider's default timeframe; no date bounds are sent.
    pub async fn interest_over_time(
        &self,
        keyword: &str,
        geo: &str,
    ) -> Result<Vec<InterestPoint>, TrendsError> {
        let url = format!("{}/interestOverTime", self.base_url);
        let resp = self
            .http
            .fetch_bytes(
                "trends",
                &url,
                &[("keyword", keyword), ("geo", geo)],
                &[("x-rapidapi-key", self.api_key.as_str())],
            )
            .await?;
        parse_trends_body(&resp.text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weaver_storage::HttpClientConfig;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn ipl_filter() -> MatchFilter {
        MatchFilter {
            match_type: "t20".to_string(),
            tournament_name: "Indian Premier League".to_string(),
            acronym: "IPL".to_string(),
            series_id_fragment: "ipl".to_string(),
        }
    }

    fn raw(name: &str, series: &str, series_id: &str, match_type: &str) -> CricApiMatch {
        CricApiMatch {
            id: Some(format!("id-{name}")),
            name: Some(name.to_string()),
            match_type: Some(match_type.to_string()),
            series: Some(series.to_string()),
            series_id: Some(series_id.to_string()),
            teams: Some(vec!["Chennai Super Kings".into(), "Royal Challengers Bengaluru".into()]),
            venue: Some("MA Chidambaram Stadium, Chennai".into()),
            date_time_gmt: Some("2024-03-22T14:30:00".into()),
            status: Some("Match not started".into()),
        }
    }

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn filter_requires_format_and_season_vocabulary() {
        let filter = ipl_filter();
        assert!(filter.accepts(&raw("1st Match, Indian Premier League 2024", "", "", "t20")));
        assert!(filter.accepts(&raw("CSK vs RCB", "IPL 2024", "", "t20")));
        assert!(filter.accepts(&raw("CSK vs RCB", "", "ipl-2024-x", "t20")));
        assert!(!filter.accepts(&raw("1st Match, Indian Premier League 2024", "", "", "odi")));
        assert!(!filter.accepts(&raw("Big Bash League", "BBL", "bbl-2024", "t20")));
        // case-sensitive: "ipl" in a name is not the acronym
        assert!(!filter.accepts(&raw("ipl fan match", "", "", "t20")));
    }

    #[test]
    fn record_defaults_are_resolved_once() {
        let full = to_match_record(&raw("x", "IPL", "", "t20"), d("2030-01-01"));
        assert_eq!(full.date, d("2024-03-22"));
        assert_eq!(full.label, "Chennai Super Kings vs Royal Challengers Bengaluru");
        assert_eq!(full.match_type, "league");
        assert_eq!(full.source_id.as_deref(), Some("id-x"));

        let bare = to_match_record(&CricApiMatch::default(), d("2030-01-01"));
        assert_eq!(bare.date, d("2030-01-01"));
        assert_eq!(bare.label, "Team 1 vs Team 2");
        assert_eq!(bare.venue, "TBD");
        assert_eq!(bare.status.as_deref(), Some("scheduled"));
        assert_eq!(bare.source_id, None);
    }

    #[test]
    fn failure_payload_is_rejected() {
        let err = parse_match_payload(br#"{"status":"failure","reason":"Invalid API Key"}"#)
            .unwrap_err();
        assert!(matches!(err, MatchApiError::Rejected(ref r) if r == "Invalid API Key"));
        assert!(parse_match_payload(b"<html>").is_err());
        assert!(parse_match_payload(br#"{"data":null,"status":"success"}"#)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn trends_html_is_rate_limited() {
        let err = parse_trends_body("<!DOCTYPE html><html><title>Error 429 (Too Many Requests)</title></html>")
            .unwrap_err();
        assert!(matches!(err, TrendsError::RateLimited(_)));
        assert_eq!(err.kind(), "rate_limited");
    }

    #[test]
    fn trends_without_timeline_is_malformed() {
        let err = parse_trends_body(r#"{"default":{"averages":[]}}"#).unwrap_err();
        assert!(matches!(err, TrendsError::Malformed(_)));
        assert!(matches!(parse_trends_body("not json"), Err(TrendsError::Malformed(_))));
    }

    #[test]
    fn trends_points_use_first_value_and_utc_day() {
        let body = r#")]}',
{"default":{"timelineData":[
  {"time":"1711929600","value":[80],"formattedTime":"Apr 1, 2024"},
  {"time":"1712016000","value":[],"formattedTime":"Apr 2, 2024"},
  {"time":"bogus","value":[5]}
]}}"#;
        let points = parse_trends_body(body).unwrap();
        assert_eq!(
            points,
            vec![
                InterestPoint { date: d("2024-04-01"), value: 80.0 },
                InterestPoint { date: d("2024-04-02"), value: 0.0 },
            ]
        );
    }

    #[tokio::test]
    async fn cricapi_adapter_hits_endpoint_with_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/currentMatches"))
            .and(query_param("apikey", "k"))
            .and(query_param("offset", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{
                    "id": "m1",
                    "name": "Indian Premier League 2024, Final",
                    "matchType": "t20",
                    "teams": ["KKR", "SRH"],
                    "dateTimeGMT": "2024-05-26T14:00:00"
                }],
                "status": "success"
            })))
            .mount(&server)
            .await;

        let http = HttpFetcher::new(HttpClientConfig::default()).unwrap();
        let adapter = CricApiAdapter::new(http, server.uri(), "k");
        let matches = adapter
            .fetch_matches(MatchEndpoint::CurrentMatches)
            .await
            .unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].teams.as_deref(), Some(&["KKR".to_string(), "SRH".to_string()][..]));
    }

    #[tokio::test]
    async fn unreachable_match_api_error_omits_the_key() {
        let http = HttpFetcher::new(HttpClientConfig::default()).unwrap();
        let adapter = CricApiAdapter::new(http, "http://127.0.0.1:1", "SUPERSECRETKEY");
        let err = adapter
            .fetch_matches(MatchEndpoint::CurrentMatches)
            .await
            .unwrap_err();
        assert!(matches!(err, MatchApiError::Fetch(_)));
        assert!(!err.to_string().contains("SUPERSECRETKEY"));
    }

    #[tokio::test]
    async fn trends_adapter_sends_key_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/interestOverTime"))
            .and(query_param("keyword", "swiggy"))
            .and(query_param("geo", "IN"))
            .and(header("x-rapidapi-key", "rk"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"default":{"timelineData":[{"time":"1711929600","value":[42]}]}}"#,
            ))
            .mount(&server)
            .await;

        let http = HttpFetcher::new(HttpClientConfig::default()).unwrap();
        let adapter = TrendsAdapter::new(http, server.uri(), "rk");
        let points = adapter.interest_over_time("swiggy", "IN").await.unwrap();
        assert_eq!(points, vec![InterestPoint { date: d("2024-04-01"), value: 42.0 }]);
    }
}

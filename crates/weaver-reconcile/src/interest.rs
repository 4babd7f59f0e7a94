//! Interest series cascade: the trends provider, then the synthetic generator.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};
use weaver_adapters::{TrendsAdapter, TrendsError};
use weaver_core::{DateWindow, InterestPoint};
use weaver_storage::HttpFetcher;

use crate::config::WeaverConfig;
use crate::synthetic::SyntheticGenerator;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SeriesSource {
    Trends,
    Synthetic { reason: String },
}

impl SeriesSource {
    pub fn label(&self) -> &'static str {
        match self {
            SeriesSource::Trends => "Google Trends",
            SeriesSource::Synthetic { .. } => "Simulated (Google Trends unavailable)",
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, SeriesSource::Synthetic { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterestSeries {
    pub points: Vec<InterestPoint>,
    pub source: SeriesSource,
    /// Real data existed but none of it fell inside the requested window.
    pub out_of_range: bool,
}

#[derive(Debug, Error)]
pub enum InterestStrategyError {
    #[error("trends API key not configured")]
    MissingApiKey,
    #[error(transparent)]
    Trends(#[from] TrendsError),
}

impl InterestStrategyError {
    pub fn kind(&self) -> &'static str {
        match self {
            InterestStrategyError::MissingApiKey => "missing_key",
            InterestStrategyError::Trends(err) => err.kind(),
        }
    }
}

#[async_trait]
pub trait InterestStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn attempt(&self, keyword: &str, geo: &str)
        -> Result<Vec<InterestPoint>, InterestStrategyError>;
}

pub struct TrendsStrategy {
    adapter: Option<TrendsAdapter>,
}

impl TrendsStrategy {
    pub fn new(adapter: Option<TrendsAdapter>) -> Self {
        Self { adapter }
    }
}

#[async_trait]
impl InterestStrategy for TrendsStrategy {
    fn name(&self) -> &'static str {
        "trends"
    }

    async fn attempt(
        &self,
        keyword: &str,
        geo: &str,
    ) -> Result<Vec<InterestPoint>, InterestStrategyError> {
        let adapter = self
            .adapter
            .as_ref()
            .ok_or(InterestStrategyError::MissingApiKey)?;
        Ok(adapter.interest_over_time(keyword, geo).await?)
    }
}

pub struct InterestSeriesResolver {
    strategies: Vec<Box<dyn InterestStrategy>>,
    synthetic: SyntheticGenerator,
}

impl InterestSeriesResolver {
    pub fn new(strategies: Vec<Box<dyn InterestStrategy>>, synthetic: SyntheticGenerator) -> Self {
        Self {
            strategies,
            synthetic,
        }
    }

    pub fn from_config(config: &WeaverConfig, http: &HttpFetcher) -> Self {
        let adapter = config
            .trends_key
            .as_ref()
            .map(|key| TrendsAdapter::new(http.clone(), config.trends_base_url.clone(), key.clone()));
        Self::new(
            vec![Box::new(TrendsStrategy::new(adapter))],
            SyntheticGenerator::new(config.synthetic_seed),
        )
    }

    /// Never fails: the synthetic generator is the terminal step.
    pub async fn resolve(
        &mut self,
        keyword: &str,
        geo: &str,
        window: &DateWindow,
        match_days: &HashSet<NaiveDate>,
    ) -> InterestSeries {
        let mut reason = "no interest strategy configured".to_string();

        for strategy in &self.strategies {
            match strategy.attempt(keyword, geo).await {
                Ok(points) if points.is_empty() => {
                    info!(strategy = strategy.name(), "provider returned an empty timeline");
                    reason = format!("{}: empty timeline", strategy.name());
                }
                Ok(points) => {
                    let in_range = points
                        .iter()
                        .copied()
                        .filter(|p| window.contains(p.date))
                        .collect::<Vec<_>>();
                    if in_range.is_empty() {
                        warn!(
                            strategy = strategy.name(),
                            total = points.len(),
                            start = %window.start,
                            end = %window.end,
                            "no real data inside the window, returning the whole series"
                        );
                        return InterestSeries {
                            points,
                            source: SeriesSource::Trends,
                            out_of_range: true,
                        };
                    }
                    info!(strategy = strategy.name(), count = in_range.len(), "real interest data resolved");
                    return InterestSeries {
                        points: in_range,
                        source: SeriesSource::Trends,
                        out_of_range: false,
                    };
                }
                Err(err @ InterestStrategyError::MissingApiKey) => {
                    info!(strategy = strategy.name(), "trends API key missing, skipping remote step");
                    reason = err.to_string();
                }
                Err(err) => {
                    warn!(strategy = strategy.name(), kind = err.kind(), error = %err, "interest step failed");
                    reason = format!("{}: {}", err.kind(), err);
                }
            }
        }

        self.simulate(window, match_days, reason)
    }

    /// Terminal step of the cascade, also used when real data misses the window.
    pub fn simulate(
        &mut self,
        window: &DateWindow,
        match_days: &HashSet<NaiveDate>,
        reason: impl Into<String>,
    ) -> InterestSeries {
        let reason = reason.into();
        let points = self.synthetic.generate(window, match_days);
        info!(count = points.len(), %reason, "using simulated interest data");
        InterestSeries {
            points,
            source: SeriesSource::Synthetic { reason },
            out_of_range: false,
        }
    }
}

//! Fallback cascades for both upstream datasets plus the reconciliation stage.

pub mod calendar;
pub mod config;
pub mod interest;
pub mod pipeline;
pub mod reconciler;
pub mod synthetic;

pub use calendar::{
    CalendarSource, CalendarStrategy, CalendarStrategyError, MatchApiStrategy, MatchCalendar,
    MatchCalendarResolver,
};
pub use config::{SeasonConfig, SeasonRegistry, WeaverConfig};
pub use interest::{
    InterestSeries, InterestSeriesResolver, InterestStrategy, InterestStrategyError, SeriesSource,
    TrendsStrategy,
};
pub use pipeline::{
    report_markdown, run_dashboard_once_from_env, DashboardPipeline, DashboardSnapshot,
    WINDOW_PADDING_DAYS,
};
pub use reconciler::{match_day_set, Reconciler, Reconciliation};
pub use synthetic::{SyntheticGenerator, SyntheticProfile};

pub const CRATE_NAME: &str = "weaver-reconcile";

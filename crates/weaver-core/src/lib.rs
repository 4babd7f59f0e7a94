//! Core domain model shared by the resolvers, the reconciler and the web layer.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

pub const CRATE_NAME: &str = "weaver-core";

/// One scheduled or played fixture of a season.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRecord {
    pub date: NaiveDate,
    #[serde(alias = "match")]
    pub label: String,
    pub venue: String,
    #[serde(alias = "type")]
    pub match_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "matchId")]
    pub source_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// Raw search-interest signal for one day, real or synthetic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InterestPoint {
    pub date: NaiveDate,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyRecord {
    pub date: NaiveDate,
    pub interest: f64,
    pub is_match_day: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sign {
    Positive,
    Negative,
}

/// Match-day vs non-match-day comparison.
///
/// `percent_increase` is rounded to one decimal. When either bucket is empty or the
/// non-match-day average is zero it holds the `0.0` sentinel, so `sign` is `Negative`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistic {
    pub avg_match_day: f64,
    pub avg_non_match_day: f64,
    pub percent_increase: f64,
    pub sign: Sign,
    pub match_days: usize,
    pub non_match_days: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Insight {
    pub title: String,
    pub text: String,
}

impl Insight {
    pub fn new(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            text: text.into(),
        }
    }
}

/// Inclusive calendar range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// Every day from `start` to `end`; empty when `start > end`.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d <= end)
    }

    /// Span of the given dates widened by `pad_days` on both sides.
    pub fn around<I>(dates: I, pad_days: u64) -> Option<Self>
    where
        I: IntoIterator<Item = NaiveDate>,
    {
        let mut iter = dates.into_iter();
        let first = iter.next()?;
        let (min, max) = iter.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d)));
        Some(Self {
            start: min.checked_sub_days(Days::new(pad_days)).unwrap_or(min),
            end: max.checked_add_days(Days::new(pad_days)).unwrap_or(max),
        })
    }
}

//! Joins the interest series against the match calendar and summarizes the result.

use std::collections::HashSet;

use chrono::NaiveDate;
use serde::Serialize;
use weaver_core::{DailyRecord, DateWindow, Insight, InterestPoint, MatchRecord, Sign, Statistic};

pub const STRONG_CORRELATION_THRESHOLD: f64 = 10.0;
const UNKNOWN_MATCH_LABEL: &str = "a scheduled match";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reconciliation {
    pub records: Vec<DailyRecord>,
    pub statistic: Statistic,
    pub insights: Vec<Insight>,
}

/// Pure and deterministic: no I/O and no randomness.
#[derive(Debug, Clone)]
pub struct Reconciler {
    event_label: String,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new("IPL")
    }
}

impl Reconciler {
    pub fn new(event_label: impl Into<String>) -> Self {
        Self {
            event_label: event_label.into(),
        }
    }

    pub fn reconcile(
        &self,
        matches: &[MatchRecord],
        points: &[InterestPoint],
        window: &DateWindow,
    ) -> Reconciliation {
        let records = merge(matches, points, window);
        let statistic = statistic(&records);
        let insights = self.insights(&records, &statistic, matches);
        Reconciliation {
            records,
            statistic,
            insights,
        }
    }

    pub fn insights(
        &self,
        records: &[DailyRecord],
        statistic: &Statistic,
        matches: &[MatchRecord],
    ) -> Vec<Insight> {
        let mut insights = Vec::new();

        if statistic.percent_increase > STRONG_CORRELATION_THRESHOLD {
            insights.push(Insight::new(
                "Strong Correlation Detected",
                format!(
                    "Food delivery interest increases by {:.1}% on {} match days compared to non-match days.",
                    statistic.percent_increase, self.event_label
                ),
            ));
        }

        if let Some(peak) = peak_record(records).filter(|r| r.is_match_day) {
            let label = matches
                .iter()
                .find(|m| m.date == peak.date)
                .map(|m| m.label.as_str())
                .unwrap_or(UNKNOWN_MATCH_LABEL);
            insights.push(Insight::new(
                "Peak Interest Day",
                format!(
                    "Highest food delivery interest ({}) occurred on {} during {}.",
                    peak.interest, peak.date, label
                ),
            ));
        }

        insights.push(Insight::new(
            "Cricket & Cravings",
            "The data suggests that cricket fans are more likely to order food while watching matches, possibly to avoid missing game time.",
        ));
        insights.push(Insight::new(
            "Business Opportunity",
            "Food delivery platforms could optimize their marketing and delivery capacity around major sporting events.",
        ));

        insights
    }
}

/// Tag each in-window point with match-day membership. Gaps stay gaps.
pub fn merge(
    matches: &[MatchRecord],
    points: &[InterestPoint],
    window: &DateWindow,
) -> Vec<DailyRecord> {
    let match_days = match_day_set(matches);
    points
        .iter()
        .filter(|p| window.contains(p.date))
        .map(|p| DailyRecord {
            date: p.date,
            interest: p.value,
            is_match_day: match_days.contains(&p.date),
        })
        .collect()
}

pub fn match_day_set(matches: &[MatchRecord]) -> HashSet<NaiveDate> {
    matches.iter().map(|m| m.date).collect()
}

pub fn statistic(records: &[DailyRecord]) -> Statistic {
    let (match_days, non_match_days): (Vec<&DailyRecord>, Vec<&DailyRecord>) =
        records.iter().partition(|r| r.is_match_day);
    let avg_match_day = mean(&match_days);
    let avg_non_match_day = mean(&non_match_days);

    let percent_increase = if match_days.is_empty()
        || non_match_days.is_empty()
        || avg_non_match_day == 0.0
    {
        0.0
    } else {
        let pct = round1((avg_match_day - avg_non_match_day) / avg_non_match_day * 100.0);
        if pct.is_finite() && pct != 0.0 {
            pct
        } else {
            0.0
        }
    };

    Statistic {
        avg_match_day,
        avg_non_match_day,
        percent_increase,
        sign: if percent_increase > 0.0 {
            Sign::Positive
        } else {
            Sign::Negative
        },
        match_days: match_days.len(),
        non_match_days: non_match_days.len(),
    }
}

fn mean(records: &[&DailyRecord]) -> f64 {
    if records.is_empty() {
        return 0.0;
    }
    records.iter().map(|r| r.interest).sum::<f64>() / records.len() as f64
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// First record holding the maximum interest.
fn peak_record(records: &[DailyRecord]) -> Option<&DailyRecord> {
    records.iter().fold(None, |best: Option<&DailyRecord>, r| match best {
        Some(b) if r.interest <= b.interest => Some(b),
        _ => Some(r),
    })
}

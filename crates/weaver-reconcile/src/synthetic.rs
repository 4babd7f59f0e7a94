//! Simulated search-interest series used when no real trends data is available.

use std::collections::HashSet;

use chrono::{Datelike, NaiveDate, Weekday};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use weaver_core::{DateWindow, InterestPoint};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyntheticProfile {
    pub base: f64,
    pub base_jitter: f64,
    pub match_boost_min: f64,
    pub match_boost_spread: f64,
    pub weekend_boost_min: f64,
    pub weekend_boost_spread: f64,
}

impl Default for SyntheticProfile {
    fn default() -> Self {
        Self {
            base: 50.0,
            base_jitter: 20.0,
            match_boost_min: 15.0,
            match_boost_spread: 15.0,
            weekend_boost_min: 5.0,
            weekend_boost_spread: 5.0,
        }
    }
}

pub struct SyntheticGenerator {
    rng: ChaCha8Rng,
    profile: SyntheticProfile,
}

impl SyntheticGenerator {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Self {
            rng,
            profile: SyntheticProfile::default(),
        }
    }

    pub fn with_profile(mut self, profile: SyntheticProfile) -> Self {
        self.profile = profile;
        self
    }

    /// One point per day of `window`, rounded to whole numbers.
    ///
    /// Every day consumes the same three draws whether or not a boost applies, so for
    /// a fixed seed two runs differ only on days whose match status differs.
    pub fn generate(
        &mut self,
        window: &DateWindow,
        match_days: &HashSet<NaiveDate>,
    ) -> Vec<InterestPoint> {
        let p = self.profile;
        window
            .days()
            .map(|date| {
                let jitter = self.rng.gen::<f64>() * p.base_jitter;
                let match_boost = p.match_boost_min + self.rng.gen::<f64>() * p.match_boost_spread;
                let weekend_boost =
                    p.weekend_boost_min + self.rng.gen::<f64>() * p.weekend_boost_spread;

                let mut interest = p.base + jitter;
                if match_days.contains(&date) {
                    interest += match_boost;
                }
                if is_weekend(date) {
                    interest += weekend_boost;
                }
                InterestPoint {
                    date,
                    value: interest.round().max(0.0),
                }
            })
            .collect()
    }
}

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

use chrono::{Datelike, Local, NaiveDateTime};

use crate::resolver::ResolvedRequest;

/// Number of features every commodity model is trained on.
pub const FEATURE_COUNT: usize = 9;

/// Column order used at training time.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "market_id",
    "state_id",
    "district_id",
    "p_min",
    "p_max",
    "year",
    "month",
    "day",
    "district_encoded",
];

pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// Local wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Always reports the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

/// Assembles the raw feature row a commodity model expects.
#[derive(Debug, Clone, Copy)]
pub struct FeatureBuilder {
    state_id: i64,
}

impl FeatureBuilder {
    pub fn new(state_id: i64) -> Self {
        Self { state_id }
    }

    pub fn build(&self, req: &ResolvedRequest<'_>, now: NaiveDateTime) -> [f64; FEATURE_COUNT] {
        [
            req.district.market_id as f64,
            self.state_id as f64,
            req.district.district_id as f64,
            req.profile.default_p_min,
            req.profile.default_p_max,
            now.year() as f64,
            now.month() as f64,
            now.day() as f64,
            req.district_encoded,
        ]
    }
}

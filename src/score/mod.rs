//! Score engine.
//!
//! Turns a [`Snapshot`] plus the accumulated [`Boost`] into one
//! [`ScoreBreakdown`] per entity. Scoring is a pure function of its inputs:
//! recency is measured against the snapshot's capture time, not the wall
//! clock, so the same snapshot always scores the same.
//!
//! # Rubric
//!
//! | Dimension   | Source                                   | Range |
//! |-------------|------------------------------------------|-------|
//! | product     | static base per entity                   | -     |
//! | ai_fit      | static base per entity                   | -     |
//! | reliability | static base per entity                   | -     |
//! | ecosystem   | log-scaled stars relative to the leader  | 1-15  |
//! | momentum    | days since last push                     | 1-10  |
//!
//! For the self-entity only, every dimension is raised by the boost before
//! totaling.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::EntityConfig;
use crate::market::Snapshot;

/// Upper bound of the ecosystem sub-score.
pub const ECOSYSTEM_MAX: i64 = 15;

/// Momentum when the last push time is unknown.
pub const MOMENTUM_UNKNOWN: i64 = 1;

/// Score dimensions, in rubric order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Product,
    AiFit,
    Reliability,
    Ecosystem,
    Momentum,
}

impl Dimension {
    /// All dimensions in rubric order.
    #[must_use]
    pub fn all() -> [Dimension; 5] {
        [
            Self::Product,
            Self::AiFit,
            Self::Reliability,
            Self::Ecosystem,
            Self::Momentum,
        ]
    }

    /// Maximum points in the 100-point rubric.
    #[must_use]
    pub fn weight(&self) -> u32 {
        match self {
            Self::Product => 35,
            Self::AiFit => 25,
            Self::Reliability => 15,
            Self::Ecosystem => 15,
            Self::Momentum => 10,
        }
    }

    /// Human-readable label for reports.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Product => "Product capability",
            Self::AiFit => "AI workflow fit",
            Self::Reliability => "Reliability/release operation",
            Self::Ecosystem => "Ecosystem/community",
            Self::Momentum => "Growth momentum",
        }
    }
}

/// Additive per-dimension offsets.
///
/// Used both for a task's declared increments and for the cumulative boost
/// held in cycle state. Missing dimensions deserialize as 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Boost {
    pub product: i64,
    pub ai_fit: i64,
    pub reliability: i64,
    pub ecosystem: i64,
    pub momentum: i64,
}

impl Boost {
    #[must_use]
    pub fn get(&self, dimension: Dimension) -> i64 {
        match dimension {
            Dimension::Product => self.product,
            Dimension::AiFit => self.ai_fit,
            Dimension::Reliability => self.reliability,
            Dimension::Ecosystem => self.ecosystem,
            Dimension::Momentum => self.momentum,
        }
    }

    fn get_mut(&mut self, dimension: Dimension) -> &mut i64 {
        match dimension {
            Dimension::Product => &mut self.product,
            Dimension::AiFit => &mut self.ai_fit,
            Dimension::Reliability => &mut self.reliability,
            Dimension::Ecosystem => &mut self.ecosystem,
            Dimension::Momentum => &mut self.momentum,
        }
    }

    /// Builder-style setter.
    #[must_use]
    pub fn with(mut self, dimension: Dimension, value: i64) -> Self {
        *self.get_mut(dimension) = value;
        self
    }

    /// True when every dimension is 0.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        Dimension::all().iter().all(|d| self.get(*d) == 0)
    }

    /// Add `increments` into this boost.
    ///
    /// Negative increments are ignored so the boost never decreases.
    pub fn accumulate(&mut self, increments: &Boost) {
        for dimension in Dimension::all() {
            let slot = self.get_mut(dimension);
            *slot = slot.saturating_add(increments.get(dimension).max(0));
        }
    }
}

/// Static base values for one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaseScores {
    pub product: i64,
    pub ai_fit: i64,
    pub reliability: i64,
}

/// Sub-scores and total for one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub product: i64,
    pub ai_fit: i64,
    pub reliability: i64,
    pub ecosystem: i64,
    pub momentum: i64,
    pub total: i64,
}

impl ScoreBreakdown {
    fn new(base: BaseScores, ecosystem: i64, momentum: i64, boost: &Boost) -> Self {
        let product = base.product.saturating_add(boost.product);
        let ai_fit = base.ai_fit.saturating_add(boost.ai_fit);
        let reliability = base.reliability.saturating_add(boost.reliability);
        let ecosystem = ecosystem.saturating_add(boost.ecosystem);
        let momentum = momentum.saturating_add(boost.momentum);
        let total = [ai_fit, reliability, ecosystem, momentum]
            .into_iter()
            .fold(product, i64::saturating_add);
        Self {
            product,
            ai_fit,
            reliability,
            ecosystem,
            momentum,
            total,
        }
    }

    #[must_use]
    pub fn get(&self, dimension: Dimension) -> i64 {
        match dimension {
            Dimension::Product => self.product,
            Dimension::AiFit => self.ai_fit,
            Dimension::Reliability => self.reliability,
            Dimension::Ecosystem => self.ecosystem,
            Dimension::Momentum => self.momentum,
        }
    }
}

/// Ecosystem sub-score: log-scaled stars relative to the most-starred entity.
///
/// `round(15 * ln(stars + 1) / ln(max_stars + 1))`, half-to-even, clamped to
/// `[1, 15]`. Defined as 1 when `max_stars` is 0.
#[must_use]
pub fn ecosystem_score(stars: u64, max_stars: u64) -> i64 {
    if max_stars == 0 {
        return 1;
    }
    let ratio = ((stars as f64) + 1.0).ln() / ((max_stars as f64) + 1.0).ln();
    let scaled = (ratio * ECOSYSTEM_MAX as f64).round_ties_even() as i64;
    scaled.clamp(1, ECOSYSTEM_MAX)
}

/// Momentum sub-score: step function of whole days since the last push.
///
/// Pushes in the future (clock skew) count as 0 days.
#[must_use]
pub fn momentum_score(pushed_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> i64 {
    let Some(pushed_at) = pushed_at else {
        return MOMENTUM_UNKNOWN;
    };
    let days = (now - pushed_at).num_days().max(0);
    match days {
        0..=1 => 10,
        2..=3 => 9,
        4..=7 => 8,
        8..=14 => 6,
        15..=30 => 4,
        _ => 2,
    }
}

/// Change in the self-entity total since the previous cycle.
///
/// 0 when there is no previous total, so the first cycle never reports a
/// spurious delta.
#[must_use]
pub fn score_delta(before: Option<i64>, after: i64) -> i64 {
    before.map_or(0, |before| after - before)
}

/// Score breakdowns keyed by entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scoreboard {
    pub entries: BTreeMap<String, ScoreBreakdown>,
}

impl Scoreboard {
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ScoreBreakdown> {
        self.entries.get(key)
    }

    /// Entries ordered by descending total, ties broken by key.
    #[must_use]
    pub fn ranked(&self) -> Vec<(&str, &ScoreBreakdown)> {
        let mut ranked: Vec<_> = self
            .entries
            .iter()
            .map(|(k, v)| (k.as_str(), v))
            .collect();
        ranked.sort_by(|a, b| b.1.total.cmp(&a.1.total).then_with(|| a.0.cmp(b.0)));
        ranked
    }
}

/// Scores every configured entity against a snapshot.
#[derive(Debug, Clone)]
pub struct ScoreEngine<'a> {
    entities: &'a [EntityConfig],
    self_entity: &'a str,
}

impl<'a> ScoreEngine<'a> {
    #[must_use]
    pub fn new(entities: &'a [EntityConfig], self_entity: &'a str) -> Self {
        Self {
            entities,
            self_entity,
        }
    }

    /// Compute every entity's breakdown.
    ///
    /// Entities missing from the snapshot score as if they had no stars and
    /// no known push time.
    #[must_use]
    pub fn compute(&self, snapshot: &Snapshot, boost: &Boost) -> Scoreboard {
        let max_stars = snapshot.max_stars();
        let no_boost = Boost::default();

        let entries = self
            .entities
            .iter()
            .map(|entity| {
                let metrics = snapshot.get(&entity.key).cloned().unwrap_or_default();
                let ecosystem = ecosystem_score(metrics.stargazers_count, max_stars);
                let momentum = momentum_score(metrics.pushed_at, snapshot.updated_at);
                let applied = if entity.key == self.self_entity {
                    boost
                } else {
                    &no_boost
                };
                (
                    entity.key.clone(),
                    ScoreBreakdown::new(entity.base(), ecosystem, momentum, applied),
                )
            })
            .collect();

        Scoreboard { entries }
    }

    /// The self-entity's total in a scoreboard produced by this engine.
    #[must_use]
    pub fn self_total(&self, scores: &Scoreboard) -> i64 {
        scores.get(self.self_entity).map_or(0, |s| s.total)
    }
}

//! The domain model: immutable match facts, statistic and market taxonomies, and the
//! value objects exchanged between the rate, model and ensemble layers.

use chrono::NaiveDate;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use strum_macros::{EnumCount, EnumIter};
use thiserror::Error;

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Side {
    Home,
    Away,
}
impl Side {
    pub fn flip(&self) -> Side {
        match self {
            Side::Home => Side::Away,
            Side::Away => Side::Home,
        }
    }
}

/// A statistic whose per-match counts are modelled as Poisson-distributed.
#[derive(
    Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, EnumCount, EnumIter, Serialize, Deserialize,
)]
pub enum StatKind {
    Goals,
    Shots,
    ShotsOnTarget,
    Corners,
}
impl StatKind {
    /// Documented default rate assumed for a team with no usable history.
    pub fn default_rate(&self, venue: Side) -> f64 {
        match (self, venue) {
            (StatKind::Goals, Side::Home) => 1.5,
            (StatKind::Goals, Side::Away) => 1.2,
            (StatKind::Shots, Side::Home) => 12.5,
            (StatKind::Shots, Side::Away) => 11.0,
            (StatKind::ShotsOnTarget, Side::Home) => 4.5,
            (StatKind::ShotsOnTarget, Side::Away) => 4.0,
            (StatKind::Corners, Side::Home) => 5.5,
            (StatKind::Corners, Side::Away) => 5.0,
        }
    }

    /// Largest per-side count materialised in the score grid. Poisson mass beyond these
    /// bounds is negligible for plausible rates; the widest bound keeps 34! representable.
    pub fn grid_bound(&self) -> u8 {
        match self {
            StatKind::Goals => 8,
            StatKind::Shots => 34,
            StatKind::ShotsOnTarget => 20,
            StatKind::Corners => 20,
        }
    }

    pub fn category(&self) -> Category {
        match self {
            StatKind::Goals => Category::Goals,
            StatKind::Shots | StatKind::ShotsOnTarget => Category::Shots,
            StatKind::Corners => Category::Corners,
        }
    }
}

/// Calibration category: the granularity at which league-level dampening and
/// plausibility ceilings are maintained.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, EnumCount, EnumIter)]
pub enum Category {
    Goals,
    Shots,
    Corners,
    BothScore,
}

/// One value per calibration category. Reused for ensemble fallbacks, calibration
/// targets and plausibility ceilings, so each constant is a named, tunable field.
#[derive(Clone, Debug)]
pub struct CategoryValues {
    pub goals: f64,
    pub shots: f64,
    pub corners: f64,
    pub both_score: f64,
}
impl CategoryValues {
    pub fn get(&self, category: Category) -> f64 {
        match category {
            Category::Goals => self.goals,
            Category::Shots => self.shots,
            Category::Corners => self.corners,
            Category::BothScore => self.both_score,
        }
    }
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Score {
    pub home: u8,
    pub away: u8,
}
impl Score {
    pub fn new(home: u8, away: u8) -> Self {
        Self { home, away }
    }

    pub fn total(&self) -> u16 {
        self.home as u16 + self.away as u16
    }
}

/// An immutable historical match fact. Produced by the (out of scope) ingestion
/// subsystem; absent statistics are excluded from averages, never treated as zero.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub date: NaiveDate,
    pub league: String,
    pub home_team: String,
    pub away_team: String,
    pub home_goals: Option<u16>,
    pub away_goals: Option<u16>,
    pub home_shots: Option<u16>,
    pub away_shots: Option<u16>,
    pub home_shots_on_target: Option<u16>,
    pub away_shots_on_target: Option<u16>,
    pub home_corners: Option<u16>,
    pub away_corners: Option<u16>,
}
impl MatchRecord {
    pub fn stat(&self, stat: StatKind, side: Side) -> Option<u16> {
        match (stat, side) {
            (StatKind::Goals, Side::Home) => self.home_goals,
            (StatKind::Goals, Side::Away) => self.away_goals,
            (StatKind::Shots, Side::Home) => self.home_shots,
            (StatKind::Shots, Side::Away) => self.away_shots,
            (StatKind::ShotsOnTarget, Side::Home) => self.home_shots_on_target,
            (StatKind::ShotsOnTarget, Side::Away) => self.away_shots_on_target,
            (StatKind::Corners, Side::Home) => self.home_corners,
            (StatKind::Corners, Side::Away) => self.away_corners,
        }
    }

    /// The observed pair for a statistic, present only when both sides are known.
    pub fn stat_pair(&self, stat: StatKind) -> Option<(u16, u16)> {
        match (self.stat(stat, Side::Home), self.stat(stat, Side::Away)) {
            (Some(home), Some(away)) => Some((home, away)),
            _ => None,
        }
    }

    pub fn both_scored(&self) -> Option<bool> {
        self.stat_pair(StatKind::Goals)
            .map(|(home, away)| home > 0 && away > 0)
    }

    pub fn side_of(&self, team: &str) -> Option<Side> {
        if self.home_team == team {
            Some(Side::Home)
        } else if self.away_team == team {
            Some(Side::Away)
        } else {
            None
        }
    }
}

/// The market a caller wants probabilities for.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketType {
    /// 1X2 on goals.
    HeadToHead,
    /// Combined total strictly exceeding the line, paired with its complement.
    TotalOver(StatKind, u8),
    /// One side's total strictly exceeding the line, the other ranging freely.
    SideTotalOver(Side, StatKind, u8),
    /// Both teams to score.
    BothTeamsScore,
}
impl MarketType {
    pub fn stat(&self) -> StatKind {
        match self {
            MarketType::HeadToHead | MarketType::BothTeamsScore => StatKind::Goals,
            MarketType::TotalOver(stat, _) | MarketType::SideTotalOver(_, stat, _) => *stat,
        }
    }

    /// The calibration category, if the market's value is subject to league dampening.
    /// Head-to-head values are probabilities of a win partition and are never dampened.
    pub fn category(&self) -> Option<Category> {
        match self {
            MarketType::HeadToHead => None,
            MarketType::TotalOver(stat, _) | MarketType::SideTotalOver(_, stat, _) => {
                Some(stat.category())
            }
            MarketType::BothTeamsScore => Some(Category::BothScore),
        }
    }

    pub fn outcomes(&self) -> Vec<Outcome> {
        match self {
            MarketType::HeadToHead => vec![
                Outcome::Win(Side::Home),
                Outcome::Draw,
                Outcome::Win(Side::Away),
            ],
            MarketType::TotalOver(_, line) => {
                vec![Outcome::Over(*line), Outcome::Under(*line + 1)]
            }
            MarketType::SideTotalOver(side, _, line) => vec![
                Outcome::SideOver(*side, *line),
                Outcome::SideUnder(*side, *line + 1),
            ],
            MarketType::BothTeamsScore => vec![Outcome::BttsYes, Outcome::BttsNo],
        }
    }
}

/// An outcome within a market. `Over(n)` means strictly more than `n`; `Under(n)`
/// means strictly fewer, so `Over(n)` and `Under(n + 1)` partition a total.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Win(Side),
    Draw,
    Over(u8),
    Under(u8),
    SideOver(Side, u8),
    SideUnder(Side, u8),
    BttsYes,
    BttsNo,
}

/// Expected per-match rate for one (team, venue, statistic), with the evidence behind it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RateEstimate {
    pub lambda: f64,
    pub sample_size: usize,
    pub std_dev: f64,
}

/// League-wide baseline averages and the plausibility band that team rates are
/// clamped into. Recomputed from a bounded window and cached.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LeagueBounds {
    pub lambda_min: f64,
    pub lambda_max: f64,
    pub baseline_home: f64,
    pub baseline_away: f64,
}

/// The low-scoreline correction strength of the Dixon-Coles model.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DixonColesParams {
    pub rho: f64,
}

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, EnumCount, EnumIter, Serialize, Deserialize)]
pub enum ModelKind {
    DixonColes,
    EnhancedPoisson,
    Bayesian,
    ZeroInflatedPoisson,
}
impl ModelKind {
    pub fn category(&self) -> ModelCategory {
        match self {
            ModelKind::DixonColes => ModelCategory::Specialised,
            ModelKind::EnhancedPoisson | ModelKind::Bayesian | ModelKind::ZeroInflatedPoisson => {
                ModelCategory::Simple
            }
        }
    }
}

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum ModelCategory {
    Specialised,
    Simple,
}

#[derive(Debug, Error)]
pub enum InvalidPrediction {
    #[error("non-finite value {0}")]
    NonFiniteValue(f64),

    #[error("confidence {0} outside [0, 1]")]
    ConfidenceRange(f64),

    #[error("probability {1} for {0:?} outside [0, 1]")]
    ProbabilityRange(Outcome, f64),
}

/// One model's contribution to the ensemble. Validated at construction so the
/// combiner can rely on well-formed fields.
#[derive(Clone, Debug)]
pub struct ModelPrediction {
    pub model: ModelKind,
    pub value: f64,
    pub confidence: f64,
    pub probabilities: FxHashMap<Outcome, f64>,
    pub sample_size: usize,
}
impl ModelPrediction {
    pub fn new(
        model: ModelKind,
        value: f64,
        confidence: f64,
        probabilities: FxHashMap<Outcome, f64>,
        sample_size: usize,
    ) -> Result<Self, InvalidPrediction> {
        if !value.is_finite() {
            return Err(InvalidPrediction::NonFiniteValue(value));
        }
        if !(0.0..=1.0).contains(&confidence) {
            return Err(InvalidPrediction::ConfidenceRange(confidence));
        }
        for (&outcome, &prob) in &probabilities {
            if !(0.0..=1.0).contains(&prob) {
                return Err(InvalidPrediction::ProbabilityRange(outcome, prob));
            }
        }
        Ok(Self {
            model,
            value,
            confidence,
            probabilities,
            sample_size,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PredictionFlag {
    /// No model produced a usable prediction; the result is a documented fallback.
    NoViableModels,
}

/// The engine's final output. Every public entry point returns one of these;
/// degradation is signalled through `confidence` and `flag`, never by failing.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PredictionResult {
    pub value: f64,
    pub confidence: f64,
    pub probabilities: FxHashMap<Outcome, f64>,
    pub contributing_models: Vec<ModelKind>,
    pub flag: Option<PredictionFlag>,
}

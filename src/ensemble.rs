//! The individual rate models and the confidence-weighted combination of their
//! outputs into a single prediction.

use rustc_hash::FxHashMap;
use tinyrand::{Rand, Seeded, Wyrand};
use tracing::debug;

use crate::domain::{
    CategoryValues, DixonColesParams, InvalidPrediction, MarketType, ModelCategory, ModelKind,
    ModelPrediction, Outcome, PredictionFlag, PredictionResult, Side,
};
use crate::linear::Matrix;
use crate::market::MarketDeriver;
use crate::probs::SliceExt;
use crate::scoregrid;

/// Everything a rate model needs to produce a prediction for one fixture.
#[derive(Debug)]
pub struct ModelInputs<'a> {
    pub market: MarketType,
    pub lambda_home: f64,
    pub lambda_away: f64,
    pub baseline_home: f64,
    pub baseline_away: f64,
    pub sample_size: usize,
    pub params: DixonColesParams,
    pub deriver: &'a MarketDeriver,
}

/// The model variants, consolidated behind one selector instead of per-call-site
/// near-duplicates.
#[derive(Clone, Debug)]
pub enum RateModel {
    DixonColes,
    /// Independent Poisson with an optional, explicitly-seeded rate jitter. The seed
    /// is request-scoped: identical seeds give identical predictions, and `None`
    /// leaves the rates untouched.
    EnhancedPoisson {
        jitter_seed: Option<u64>,
        jitter_scale: f64,
    },
    /// Rates shrunk toward the league baseline under a gamma prior whose strength is
    /// `prior_weight` pseudo-observations.
    Bayesian { prior_weight: f64 },
    /// Independent Poisson with additive mass on the nil-all cell.
    ZeroInflatedPoisson { additive: f64 },
}
impl RateModel {
    pub fn kind(&self) -> ModelKind {
        match self {
            RateModel::DixonColes => ModelKind::DixonColes,
            RateModel::EnhancedPoisson { .. } => ModelKind::EnhancedPoisson,
            RateModel::Bayesian { .. } => ModelKind::Bayesian,
            RateModel::ZeroInflatedPoisson { .. } => ModelKind::ZeroInflatedPoisson,
        }
    }

    pub fn predict(&self, inputs: &ModelInputs) -> Result<ModelPrediction, InvalidPrediction> {
        let stat = inputs.market.stat();
        let scoregrid = match self {
            RateModel::DixonColes => inputs.deriver.scoregrid(
                stat,
                inputs.lambda_home,
                inputs.lambda_away,
                inputs.params.rho,
            ),
            RateModel::EnhancedPoisson {
                jitter_seed,
                jitter_scale,
            } => {
                let (lambda_home, lambda_away) = match jitter_seed {
                    None => (inputs.lambda_home, inputs.lambda_away),
                    Some(seed) => {
                        let mut rand = Wyrand::seed(*seed);
                        (
                            jitter(inputs.lambda_home, *jitter_scale, &mut rand),
                            jitter(inputs.lambda_away, *jitter_scale, &mut rand),
                        )
                    }
                };
                inputs.deriver.scoregrid(stat, lambda_home, lambda_away, 0.0)
            }
            RateModel::Bayesian { prior_weight } => {
                let observations = inputs.sample_size as f64;
                let lambda_home = shrink(
                    inputs.lambda_home,
                    inputs.baseline_home,
                    observations,
                    *prior_weight,
                );
                let lambda_away = shrink(
                    inputs.lambda_away,
                    inputs.baseline_away,
                    observations,
                    *prior_weight,
                );
                inputs.deriver.scoregrid(stat, lambda_home, lambda_away, 0.0)
            }
            RateModel::ZeroInflatedPoisson { additive } => {
                let mut scoregrid =
                    inputs
                        .deriver
                        .scoregrid(stat, inputs.lambda_home, inputs.lambda_away, 0.0);
                scoregrid::inflate_zero(*additive, &mut scoregrid);
                scoregrid
            }
        };

        let probabilities = inputs.deriver.gather(inputs.market, &scoregrid);
        let value = market_value(inputs.market, &probabilities, &scoregrid);
        ModelPrediction::new(
            self.kind(),
            value,
            confidence(inputs.sample_size),
            probabilities,
            inputs.sample_size,
        )
    }
}

/// Multiplicative perturbation in `1 ± scale`.
fn jitter(lambda: f64, scale: f64, rand: &mut impl Rand) -> f64 {
    let uniform = rand.next_u64() as f64 / u64::MAX as f64;
    lambda * (1.0 + scale * (2.0 * uniform - 1.0))
}

fn shrink(lambda: f64, baseline: f64, observations: f64, prior_weight: f64) -> f64 {
    (observations * lambda + prior_weight * baseline) / (observations + prior_weight)
}

/// Evidence-based confidence: saturating in the sample size.
fn confidence(sample_size: usize) -> f64 {
    let observations = sample_size as f64;
    (observations / (observations + 6.0)).clamp(0.1, 0.95)
}

/// The headline value of a prediction: expected total for totals markets, the
/// decisive outcome's probability otherwise.
fn market_value(
    market: MarketType,
    probabilities: &FxHashMap<Outcome, f64>,
    scoregrid: &Matrix,
) -> f64 {
    match market {
        MarketType::HeadToHead => probabilities[&Outcome::Win(Side::Home)],
        MarketType::BothTeamsScore => probabilities[&Outcome::BttsYes],
        MarketType::TotalOver(_, _) => {
            let (home, away) = scoregrid::home_away_expectations(scoregrid);
            home + away
        }
        MarketType::SideTotalOver(side, _, _) => {
            let (home, away) = scoregrid::home_away_expectations(scoregrid);
            match side {
                Side::Home => home,
                Side::Away => away,
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct EnsembleConfig {
    /// Base weight of the specialised (Dixon-Coles) category.
    pub specialised_weight: f64,
    /// Base weight of each simple variant.
    pub simple_weight: f64,
    /// Share of total weight distributed by relative confidence.
    pub dynamic_share: f64,
    /// Substituted when a model omits a probability key; biases sparse keys toward 50%.
    pub neutral_prior: f64,
    /// Confidence reported by the degenerate no-viable-models fallback.
    pub fallback_confidence: f64,
    /// Fallback values per calibration category.
    pub fallbacks: CategoryValues,
}
impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            specialised_weight: 0.4,
            simple_weight: 0.2,
            dynamic_share: 0.5,
            neutral_prior: 0.5,
            fallback_confidence: 0.2,
            fallbacks: CategoryValues {
                goals: 2.5,
                shots: 22.0,
                corners: 9.5,
                both_score: 0.5,
            },
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct EnsembleCombiner {
    pub config: EnsembleConfig,
}
impl EnsembleCombiner {
    pub fn new(config: EnsembleConfig) -> Self {
        Self { config }
    }

    /// Merges model outputs, weighting each by its category's base weight plus its
    /// share of total confidence. Weights are renormalised to unit sum. Models whose
    /// value is non-positive or non-finite are dropped; if none survive, a fixed
    /// low-confidence fallback is returned, flagged rather than raised.
    pub fn combine(&self, predictions: &[ModelPrediction], market: MarketType) -> PredictionResult {
        let viable = predictions
            .iter()
            .filter(|prediction| prediction.value.is_finite() && prediction.value > 0.0)
            .collect::<Vec<_>>();
        if viable.is_empty() {
            debug!("no viable models for {market:?}; returning fallback");
            return self.fallback(market);
        }

        let weights = self.weights(&viable);
        let mut value = 0.0;
        let mut confidence = 0.0;
        let mut keys = Vec::new();
        for prediction in &viable {
            for key in prediction.probabilities.keys() {
                if !keys.contains(key) {
                    keys.push(*key);
                }
            }
        }

        let mut probabilities =
            FxHashMap::with_capacity_and_hasher(keys.len(), Default::default());
        for key in keys {
            let mut combined = 0.0;
            for (prediction, &weight) in viable.iter().zip(weights.iter()) {
                let prob = prediction
                    .probabilities
                    .get(&key)
                    .copied()
                    .unwrap_or(self.config.neutral_prior);
                combined += weight * prob;
            }
            probabilities.insert(key, combined);
        }

        for (prediction, &weight) in viable.iter().zip(weights.iter()) {
            value += weight * prediction.value;
            confidence += weight * prediction.confidence;
        }

        PredictionResult {
            value,
            confidence,
            probabilities,
            contributing_models: viable.iter().map(|prediction| prediction.model).collect(),
            flag: None,
        }
    }

    /// Per-model weights: category base weight plus a confidence-proportional slice of
    /// `dynamic_share`, renormalised to sum to one.
    pub fn weights(&self, predictions: &[&ModelPrediction]) -> Vec<f64> {
        let confidence_sum: f64 = predictions
            .iter()
            .map(|prediction| prediction.confidence)
            .sum();
        let mut weights = predictions
            .iter()
            .map(|prediction| {
                let base = match prediction.model.category() {
                    ModelCategory::Specialised => self.config.specialised_weight,
                    ModelCategory::Simple => self.config.simple_weight,
                };
                let dynamic = if confidence_sum > 0.0 {
                    prediction.confidence / confidence_sum * self.config.dynamic_share
                } else {
                    0.0
                };
                base + dynamic
            })
            .collect::<Vec<_>>();
        weights.normalise(1.0);
        weights
    }

    fn fallback(&self, market: MarketType) -> PredictionResult {
        let outcomes = market.outcomes();
        let uniform = 1.0 / outcomes.len() as f64;
        let value = match market.category() {
            Some(category) => self.config.fallbacks.get(category),
            None => uniform,
        };
        PredictionResult {
            value,
            confidence: self.config.fallback_confidence,
            probabilities: outcomes
                .into_iter()
                .map(|outcome| (outcome, uniform))
                .collect(),
            contributing_models: vec![],
            flag: Some(PredictionFlag::NoViableModels),
        }
    }
}

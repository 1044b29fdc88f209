//! Conversion of a fitted joint-score distribution into the probabilities a market's
//! callers need. Outcome sets are normalised so each market partitions to unit mass.

use rustc_hash::FxHashMap;

use crate::domain::{MarketType, Outcome, StatKind};
use crate::linear::Matrix;
use crate::probs::SliceExt;
use crate::scoregrid;

/// The both-teams-to-score damping rule. Raw inclusion-exclusion values computed from
/// independently-fitted rates are systematically overconfident for this market; this
/// empirically-tuned correction pulls extreme values back before a hard clamp into a
/// realistic band. Deliberate, named, and applied only to BTTS.
#[derive(Clone, Debug)]
pub struct BttsDamping {
    /// Above this, the probability is dampened in logit space.
    pub logit_threshold: f64,
    /// Scale applied to the logit before converting back.
    pub logit_scale: f64,
    /// Above this (and at most `logit_threshold`), a plain multiplicative dampening.
    pub mult_threshold: f64,
    pub mult_factor: f64,
    /// Realistic band the final value is clamped into.
    pub clamp_min: f64,
    pub clamp_max: f64,
}
impl Default for BttsDamping {
    fn default() -> Self {
        Self {
            logit_threshold: 0.8,
            logit_scale: 0.6,
            mult_threshold: 0.7,
            mult_factor: 0.85,
            clamp_min: 0.15,
            clamp_max: 0.75,
        }
    }
}
impl BttsDamping {
    pub fn apply(&self, raw: f64) -> f64 {
        let damped = if raw > self.logit_threshold {
            let logit = (raw / (1.0 - raw)).ln();
            let scaled = logit * self.logit_scale;
            1.0 / (1.0 + (-scaled).exp())
        } else if raw > self.mult_threshold {
            raw * self.mult_factor
        } else {
            raw
        };
        damped.clamp(self.clamp_min, self.clamp_max)
    }
}

/// Derives market probabilities from `(λ_home, λ_away, ρ)` by summing the bounded
/// joint-score grid.
#[derive(Clone, Debug, Default)]
pub struct MarketDeriver {
    pub btts: BttsDamping,
}
impl MarketDeriver {
    pub fn new(btts: BttsDamping) -> Self {
        Self { btts }
    }

    /// The raw τ-corrected grid for a statistic.
    pub fn scoregrid(&self, stat: StatKind, lambda_home: f64, lambda_away: f64, rho: f64) -> Matrix {
        let mut scoregrid = scoregrid::allocate(stat);
        scoregrid::from_correction(lambda_home, lambda_away, rho, &mut scoregrid);
        scoregrid
    }

    pub fn derive(
        &self,
        market: MarketType,
        lambda_home: f64,
        lambda_away: f64,
        rho: f64,
    ) -> FxHashMap<Outcome, f64> {
        let scoregrid = self.scoregrid(market.stat(), lambda_home, lambda_away, rho);
        self.gather(market, &scoregrid)
    }

    /// Gathers and normalises the market's outcome set from an already-populated grid.
    pub fn gather(&self, market: MarketType, scoregrid: &Matrix) -> FxHashMap<Outcome, f64> {
        let outcomes = market.outcomes();
        let mut probs = outcomes
            .iter()
            .map(|outcome| outcome.gather(scoregrid))
            .collect::<Vec<_>>();
        probs.normalise(1.0);

        if market == MarketType::BothTeamsScore {
            let yes = self.btts.apply(probs[0]);
            probs[0] = yes;
            probs[1] = 1.0 - yes;
        }

        outcomes.into_iter().zip(probs).collect()
    }
}

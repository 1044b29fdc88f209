//! The Dixon-Coles bivariate Poisson model: an independent-Poisson base with a
//! multiplicative low-scoreline correction `τ`, parameterised by `ρ` and fitted by
//! maximum likelihood against historical scorelines.

use std::ops::RangeInclusive;

use anyhow::bail;
use tracing::{debug, warn};

use crate::domain::{DixonColesParams, Score};
use crate::factorial::{Factorial, Lookup};
use crate::opt::{univariate_descent, UnivariateDescentConfig};
use crate::poisson;

/// Correction strength assumed whenever fitting is impossible or fails.
pub const DEFAULT_RHO: f64 = -0.13;

/// Permissible range of the correction strength.
pub const RHO_BOUNDS: RangeInclusive<f64> = -0.5..=0.2;

/// Observed scores are capped here before likelihood evaluation.
const OBSERVED_CAP: u8 = 10;

/// The low-scoreline correction. Unity everywhere except the four cells where both
/// sides score at most once.
#[inline]
pub fn tau(home: u8, away: u8, lambda_home: f64, lambda_away: f64, rho: f64) -> f64 {
    match (home, away) {
        (0, 0) => 1.0 - lambda_home * lambda_away * rho,
        (0, 1) => 1.0 + lambda_home * rho,
        (1, 0) => 1.0 + lambda_away * rho,
        (1, 1) => 1.0 - rho,
        _ => 1.0,
    }
}

/// Raw (unnormalised) joint probability of a scoreline under the corrected model.
#[inline]
pub fn joint(
    home: u8,
    away: u8,
    lambda_home: f64,
    lambda_away: f64,
    rho: f64,
    factorial: &impl Factorial,
) -> f64 {
    poisson::univariate(home, lambda_home, factorial)
        * poisson::univariate(away, lambda_away, factorial)
        * tau(home, away, lambda_home, lambda_away, rho)
}

/// One historical observation: the scoreline alongside the lambdas the rate layer
/// assigns to that fixture.
#[derive(Clone, Debug)]
pub struct ScoreSample {
    pub score: Score,
    pub lambda_home: f64,
    pub lambda_away: f64,
}

#[derive(Clone, Debug)]
pub struct RhoFitConfig {
    pub default_rho: f64,
    pub bounds: RangeInclusive<f64>,
    /// Batches smaller than this are not fitted at all.
    pub min_matches: usize,
    pub init_step: f64,
    pub min_step: f64,
    pub max_steps: u64,
}
impl Default for RhoFitConfig {
    fn default() -> Self {
        Self {
            default_rho: DEFAULT_RHO,
            bounds: RHO_BOUNDS,
            min_matches: 20,
            init_step: 0.02,
            min_step: 1e-5,
            max_steps: 200,
        }
    }
}
impl RhoFitConfig {
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !self.bounds.contains(&self.default_rho) {
            bail!(
                "default rho {} lies outside the bounds {:?}",
                self.default_rho,
                self.bounds
            );
        }
        if self.init_step <= 0.0 || self.min_step <= 0.0 || self.min_step > self.init_step {
            bail!("steps must be positive with min_step <= init_step");
        }
        if self.max_steps == 0 {
            bail!("at least one fitting step must be allowed");
        }
        Ok(())
    }
}

/// Fits `ρ` by minimising the negative log-likelihood of the observed scorelines.
/// Never fails: insufficient data and non-convergence both degrade to
/// `default_rho`. Deterministic for identical inputs.
pub fn fit_rho(samples: &[ScoreSample], config: &RhoFitConfig) -> DixonColesParams {
    if samples.len() < config.min_matches {
        debug!(
            "rho fit skipped: {} samples, need {}; using default {}",
            samples.len(),
            config.min_matches,
            config.default_rho
        );
        return DixonColesParams {
            rho: config.default_rho,
        };
    }

    let factorial = Lookup::default();
    let outcome = univariate_descent(
        &UnivariateDescentConfig {
            init_value: config.default_rho,
            init_step: config.init_step,
            min_step: config.min_step,
            max_steps: config.max_steps,
            acceptable_residual: 0.0,
            bounds: config.bounds.clone(),
        },
        |rho| negative_log_likelihood(samples, rho, &factorial),
    );

    if !outcome.optimal_residual.is_finite() {
        warn!(
            "rho fit failed to converge after {} steps; using default {}",
            outcome.steps, config.default_rho
        );
        return DixonColesParams {
            rho: config.default_rho,
        };
    }

    debug!(
        "rho fitted to {} in {} steps (nll {})",
        outcome.optimal_value, outcome.steps, outcome.optimal_residual
    );
    DixonColesParams {
        rho: outcome.optimal_value,
    }
}

/// Matches whose corrected probability is non-positive are skipped rather than
/// contributing `log(0)`.
fn negative_log_likelihood(samples: &[ScoreSample], rho: f64, factorial: &impl Factorial) -> f64 {
    let mut sum = 0.0;
    let mut counted = 0usize;
    for sample in samples {
        let home = sample.score.home.min(OBSERVED_CAP);
        let away = sample.score.away.min(OBSERVED_CAP);
        let prob = joint(home, away, sample.lambda_home, sample.lambda_away, rho, factorial);
        if prob > 0.0 {
            sum -= prob.ln();
            counted += 1;
        }
    }
    if counted == 0 {
        f64::INFINITY
    } else {
        sum
    }
}

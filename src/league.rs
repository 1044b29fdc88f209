//! League-wide baselines, plausibility bounds and the relative-strength combination
//! of team rates into match lambdas.

use crate::domain::{LeagueBounds, MatchRecord, RateEstimate, Side, StatKind};

/// Guard against division by a near-zero league average.
const MIN_AVERAGE: f64 = 1e-6;

#[derive(Clone, Debug)]
pub struct LeagueConfig {
    /// Multiplier applied to the home side's lambda.
    pub venue_home: f64,
    /// Multiplier applied to the away side's lambda.
    pub venue_away: f64,
    /// Lower edge of the plausibility band, as a multiple of the league baseline.
    pub band_min: f64,
    /// Upper edge of the plausibility band, as a multiple of the league baseline.
    pub band_max: f64,
}
impl Default for LeagueConfig {
    fn default() -> Self {
        Self {
            venue_home: 1.15,
            venue_away: 0.95,
            band_min: 0.3,
            band_max: 2.5,
        }
    }
}

/// A team's offensive and defensive expected rates at the venue in question.
#[derive(Clone, Debug)]
pub struct TeamStrength {
    pub attack: RateEstimate,
    pub defense: RateEstimate,
}
impl TeamStrength {
    pub fn sample_size(&self) -> usize {
        usize::min(self.attack.sample_size, self.defense.sample_size)
    }
}

#[derive(Clone, Debug)]
pub struct LeagueContext {
    pub config: LeagueConfig,
}
impl LeagueContext {
    pub fn new(config: LeagueConfig) -> Self {
        Self { config }
    }

    /// League baselines for a statistic over the supplied window, with the derived
    /// plausibility band. An empty window degrades to the statistic's defaults.
    pub fn bounds(&self, matches: &[MatchRecord], stat: StatKind) -> LeagueBounds {
        let baseline_home = venue_mean(matches, stat, Side::Home)
            .unwrap_or_else(|| stat.default_rate(Side::Home));
        let baseline_away = venue_mean(matches, stat, Side::Away)
            .unwrap_or_else(|| stat.default_rate(Side::Away));
        let midpoint = (baseline_home + baseline_away) / 2.0;
        LeagueBounds {
            lambda_min: self.config.band_min * midpoint,
            lambda_max: self.config.band_max * midpoint,
            baseline_home,
            baseline_away,
        }
    }

    /// Standard relative-strength combination: each side's attack is scaled by the
    /// opponent's defensive weakness against the league baseline, then the venue
    /// multiplier is applied and the result clamped into the plausibility band.
    /// A defence rate counts goals scored by the opposing venue, so it is normalised
    /// by that venue's baseline: the away side's conceded mean sits on the home
    /// scale, and vice versa. The clamp is the contract that stops anomalous recent
    /// form or thin data from producing runaway lambdas.
    pub fn lambdas(
        &self,
        bounds: &LeagueBounds,
        home: &TeamStrength,
        away: &TeamStrength,
    ) -> (f64, f64) {
        let avg_home = bounds.baseline_home.max(MIN_AVERAGE);
        let avg_away = bounds.baseline_away.max(MIN_AVERAGE);

        let raw_home =
            (home.attack.lambda / avg_home) * (away.defense.lambda / avg_home) * avg_home;
        let raw_away =
            (away.attack.lambda / avg_away) * (home.defense.lambda / avg_away) * avg_away;

        let lambda_home =
            (raw_home * self.config.venue_home).clamp(bounds.lambda_min, bounds.lambda_max);
        let lambda_away =
            (raw_away * self.config.venue_away).clamp(bounds.lambda_min, bounds.lambda_max);
        (lambda_home, lambda_away)
    }

    /// Observed frequency of both teams scoring, used to calibrate the BTTS market.
    pub fn both_scored_rate(&self, matches: &[MatchRecord]) -> f64 {
        let outcomes = matches
            .iter()
            .filter_map(MatchRecord::both_scored)
            .collect::<Vec<_>>();
        if outcomes.is_empty() {
            return 0.5;
        }
        outcomes.iter().filter(|&&both| both).count() as f64 / outcomes.len() as f64
    }
}

fn venue_mean(matches: &[MatchRecord], stat: StatKind, side: Side) -> Option<f64> {
    let samples = matches
        .iter()
        .filter_map(|record| record.stat(stat, side))
        .map(f64::from)
        .collect::<Vec<_>>();
    if samples.is_empty() {
        None
    } else {
        Some(samples.iter().sum::<f64>() / samples.len() as f64)
    }
}

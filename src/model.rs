//! The prediction engine: wires match data, league context, model fitting, the
//! ensemble and calibration behind a single `predict` entry point.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::bail;
use chrono::{Local, NaiveDate};
use rustc_hash::FxHashMap;
use strum::IntoEnumIterator;
use tracing::debug;

use crate::cache::{CacheStats, SingleFlight};
use crate::calibrate::{CalibrationConfig, LeagueCalibrator};
use crate::data::{MatchFilter, MatchSource};
use crate::dixon_coles::{self, RhoFitConfig, ScoreSample};
use crate::domain::{
    DixonColesParams, LeagueBounds, MarketType, MatchRecord, Outcome, PredictionResult,
    RateEstimate, Score, Side, StatKind,
};
use crate::ensemble::{EnsembleCombiner, EnsembleConfig, ModelInputs, RateModel};
use crate::league::{LeagueConfig, LeagueContext, TeamStrength};
use crate::market::{BttsDamping, MarketDeriver};
use crate::rates::{self, Direction};

#[derive(Clone, Debug)]
pub struct Config {
    /// Window of team history feeding rate estimates, in days.
    pub lookback_days: i64,
    /// Most recent matches per team retained within the window.
    pub team_match_cap: usize,
    /// Window of league history feeding baselines and rho fits, in days.
    pub league_window_days: i64,
    /// Most recent matches per league retained within the window.
    pub league_match_cap: usize,
    /// Evaluation date; `None` means today. Pinning it makes backtests reproducible.
    pub as_of: Option<NaiveDate>,
    pub cache_ttl: Duration,
    /// Seed for the enhanced-Poisson rate jitter. Off unless explicitly supplied.
    pub jitter_seed: Option<u64>,
    pub jitter_scale: f64,
    /// Pseudo-observation count of the Bayesian model's league-baseline prior.
    pub bayes_prior_weight: f64,
    /// Additive nil-all mass of the zero-inflated model.
    pub zero_inflation: f64,
    pub league: LeagueConfig,
    pub rho_fit: RhoFitConfig,
    pub btts: BttsDamping,
    pub ensemble: EnsembleConfig,
    pub calibration: CalibrationConfig,
}
impl Default for Config {
    fn default() -> Self {
        Self {
            lookback_days: 365,
            team_match_cap: 50,
            league_window_days: 730,
            league_match_cap: 200,
            as_of: None,
            cache_ttl: Duration::from_secs(600),
            jitter_seed: None,
            jitter_scale: 0.03,
            bayes_prior_weight: 5.0,
            zero_inflation: 0.03,
            league: LeagueConfig::default(),
            rho_fit: RhoFitConfig::default(),
            btts: BttsDamping::default(),
            ensemble: EnsembleConfig::default(),
            calibration: CalibrationConfig::default(),
        }
    }
}
impl Config {
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.lookback_days <= 0 || self.league_window_days <= 0 {
            bail!("history windows must be positive");
        }
        if self.team_match_cap == 0 || self.league_match_cap == 0 {
            bail!("match caps must be positive");
        }
        if !(0.0..1.0).contains(&self.jitter_scale) {
            bail!("jitter scale must be in the range [0, 1)");
        }
        if self.bayes_prior_weight < 0.0 {
            bail!("prior weight cannot be negative");
        }
        if !(0.0..1.0).contains(&self.zero_inflation) {
            bail!("zero inflation must be in the range [0, 1)");
        }
        self.rho_fit.validate()?;
        Ok(())
    }
}

/// League aggregates derived from one scan of the league window, cached together.
#[derive(Clone, Debug)]
struct LeagueSnapshot {
    bounds: LeagueBounds,
    both_scored_rate: f64,
}

pub struct Engine<S: MatchSource> {
    config: Config,
    source: S,
    context: LeagueContext,
    deriver: MarketDeriver,
    combiner: EnsembleCombiner,
    calibrator: LeagueCalibrator,
    league_cache: SingleFlight<(String, StatKind), LeagueSnapshot>,
    rho_cache: SingleFlight<(String, StatKind), DixonColesParams>,
}

impl<S: MatchSource> Engine<S> {
    pub fn new(config: Config, source: S) -> Result<Self, anyhow::Error> {
        config.validate()?;
        Ok(Self {
            context: LeagueContext::new(config.league.clone()),
            deriver: MarketDeriver::new(config.btts.clone()),
            combiner: EnsembleCombiner::new(config.ensemble.clone()),
            calibrator: LeagueCalibrator::new(config.calibration.clone()),
            league_cache: SingleFlight::new(config.cache_ttl),
            rho_cache: SingleFlight::new(config.cache_ttl),
            config,
            source,
        })
    }

    /// Predicts one market for one fixture. Never fails: thin or absent data degrades
    /// through documented defaults and, at worst, the flagged ensemble fallback.
    pub fn predict(
        &self,
        league: &str,
        home_team: &str,
        away_team: &str,
        market: MarketType,
    ) -> PredictionResult {
        let start = Instant::now();
        let stat = market.stat();
        let snapshot = self.league_snapshot(league, stat);
        let home = self.team_strength(league, home_team, Side::Home, stat);
        let away = self.team_strength(league, away_team, Side::Away, stat);
        let (lambda_home, lambda_away) = self.context.lambdas(&snapshot.bounds, &home, &away);
        let params = self.rho(league, stat);

        let sample_size = usize::min(home.sample_size(), away.sample_size());
        let inputs = ModelInputs {
            market,
            lambda_home,
            lambda_away,
            baseline_home: snapshot.bounds.baseline_home,
            baseline_away: snapshot.bounds.baseline_away,
            sample_size,
            params: *params,
            deriver: &self.deriver,
        };
        let predictions = self
            .models()
            .iter()
            .filter_map(|model| match model.predict(&inputs) {
                Ok(prediction) => Some(prediction),
                Err(invalid) => {
                    debug!("dropping {:?}: {invalid}", model.kind());
                    None
                }
            })
            .collect::<Vec<_>>();

        let mut result = self.combiner.combine(&predictions, market);
        let observed = match market {
            MarketType::BothTeamsScore => snapshot.both_scored_rate,
            _ => snapshot.bounds.baseline_home + snapshot.bounds.baseline_away,
        };
        self.calibrator.apply(market, observed, &mut result);
        debug!(
            "predicted {market:?} for {home_team} vs {away_team} ({league}): \
             value {:.4}, confidence {:.2}, took {:.3}s",
            result.value,
            result.confidence,
            start.elapsed().as_millis() as f64 / 1_000.
        );
        result
    }

    /// Probabilities straight from supplied rates, bypassing data access. Useful for
    /// what-if inspection and testing against known parameters.
    pub fn probabilities(
        &self,
        market: MarketType,
        lambda_home: f64,
        lambda_away: f64,
        rho: f64,
    ) -> FxHashMap<Outcome, f64> {
        self.deriver.derive(market, lambda_home, lambda_away, rho)
    }

    /// Fits the low-scoreline correlation for a league's statistic from its cached
    /// window of history.
    pub fn fit_rho(&self, league: &str, stat: StatKind) -> DixonColesParams {
        *self.rho(league, stat)
    }

    /// Fits the correction from a caller-supplied batch of records, bypassing the
    /// cache and the injected source. Offline recalibration entry point; the same
    /// per-fixture rate derivation as the cached path.
    pub fn fit_rho_from(&self, stat: StatKind, matches: &[MatchRecord]) -> DixonColesParams {
        let samples = self.rho_samples(matches, stat);
        dixon_coles::fit_rho(&samples, &self.config.rho_fit)
    }

    /// Drops the league's cached aggregates, forcing a refresh on next use. Invoked
    /// by the ingestion path when new results land.
    pub fn invalidate(&self, league: &str) {
        for stat in StatKind::iter() {
            self.league_cache.invalidate(&(league.to_owned(), stat));
            self.rho_cache.invalidate(&(league.to_owned(), stat));
        }
    }

    pub fn cache_stats(&self) -> CacheStats {
        let mut stats = self.league_cache.stats();
        stats += self.rho_cache.stats();
        stats
    }

    fn models(&self) -> [RateModel; 4] {
        [
            RateModel::DixonColes,
            RateModel::EnhancedPoisson {
                jitter_seed: self.config.jitter_seed,
                jitter_scale: self.config.jitter_scale,
            },
            RateModel::Bayesian {
                prior_weight: self.config.bayes_prior_weight,
            },
            RateModel::ZeroInflatedPoisson {
                additive: self.config.zero_inflation,
            },
        ]
    }

    fn as_of(&self) -> NaiveDate {
        self.config
            .as_of
            .unwrap_or_else(|| Local::now().date_naive())
    }

    fn league_window(&self, league: &str) -> Vec<MatchRecord> {
        let since = self.as_of() - chrono::Duration::days(self.config.league_window_days);
        self.source.query(
            &MatchFilter::for_league(league)
                .since(since)
                .until(self.as_of())
                .limit(self.config.league_match_cap),
        )
    }

    fn league_snapshot(&self, league: &str, stat: StatKind) -> Arc<LeagueSnapshot> {
        self.league_cache
            .get_or_compute((league.to_owned(), stat), || {
                let window = self.league_window(league);
                LeagueSnapshot {
                    bounds: self.context.bounds(&window, stat),
                    both_scored_rate: self.context.both_scored_rate(&window),
                }
            })
    }

    fn rho(&self, league: &str, stat: StatKind) -> Arc<DixonColesParams> {
        self.rho_cache.get_or_compute((league.to_owned(), stat), || {
            let window = self.league_window(league);
            let samples = self.rho_samples(&window, stat);
            dixon_coles::fit_rho(&samples, &self.config.rho_fit)
        })
    }

    /// Pairs each match's observed scoreline with the rates the engine itself would
    /// expect for that fixture. One pass over the window accumulates every team's
    /// scored and conceded means at each venue, then `LeagueContext::lambdas`
    /// combines them with the opponent and clamps into the league band, so the fit
    /// sees the same rate derivation as `predict` without a second data access
    /// round trip.
    fn rho_samples(&self, window: &[MatchRecord], stat: StatKind) -> Vec<ScoreSample> {
        let bounds = self.context.bounds(window, stat);
        let mut totals: FxHashMap<(&str, Side), VenueTotals> = FxHashMap::default();
        for record in window {
            if let Some((home, away)) = record.stat_pair(stat) {
                let entry = totals
                    .entry((record.home_team.as_str(), Side::Home))
                    .or_default();
                entry.scored += f64::from(home);
                entry.conceded += f64::from(away);
                entry.count += 1;
                let entry = totals
                    .entry((record.away_team.as_str(), Side::Away))
                    .or_default();
                entry.scored += f64::from(away);
                entry.conceded += f64::from(home);
                entry.count += 1;
            }
        }

        window
            .iter()
            .filter_map(|record| {
                let (home, away) = record.stat_pair(stat)?;
                let home_strength =
                    venue_strength(&totals, &record.home_team, Side::Home, stat);
                let away_strength =
                    venue_strength(&totals, &record.away_team, Side::Away, stat);
                let (lambda_home, lambda_away) =
                    self.context.lambdas(&bounds, &home_strength, &away_strength);
                Some(ScoreSample {
                    score: Score::new(
                        home.min(u8::MAX as u16) as u8,
                        away.min(u8::MAX as u16) as u8,
                    ),
                    lambda_home,
                    lambda_away,
                })
            })
            .collect()
    }

    fn team_strength(&self, league: &str, team: &str, venue: Side, stat: StatKind) -> TeamStrength {
        let since = self.as_of() - chrono::Duration::days(self.config.lookback_days);
        let matches = self.source.query(
            &MatchFilter::for_league(league)
                .team(team, Some(venue))
                .since(since)
                .until(self.as_of())
                .limit(self.config.team_match_cap),
        );
        TeamStrength {
            attack: rates::estimate(&matches, team, venue, stat, Direction::Scored),
            defense: rates::estimate(&matches, team, venue, stat, Direction::Conceded),
        }
    }
}

#[derive(Default)]
struct VenueTotals {
    scored: f64,
    conceded: f64,
    count: usize,
}

fn venue_strength<'a>(
    totals: &FxHashMap<(&'a str, Side), VenueTotals>,
    team: &'a str,
    venue: Side,
    stat: StatKind,
) -> TeamStrength {
    match totals.get(&(team, venue)) {
        Some(t) if t.count > 0 => TeamStrength {
            attack: window_rate(t.scored, t.count),
            defense: window_rate(t.conceded, t.count),
        },
        _ => TeamStrength {
            attack: default_rate_estimate(stat, venue),
            defense: default_rate_estimate(stat, venue.flip()),
        },
    }
}

fn window_rate(sum: f64, count: usize) -> RateEstimate {
    RateEstimate {
        lambda: sum / count as f64,
        sample_size: count,
        std_dev: 0.0,
    }
}

fn default_rate_estimate(stat: StatKind, scoring_venue: Side) -> RateEstimate {
    RateEstimate {
        lambda: stat.default_rate(scoring_venue),
        sample_size: 0,
        std_dev: 0.0,
    }
}

#[cfg(test)]
mod tests;

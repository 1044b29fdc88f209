//! Per-team expected-rate estimation from bounded historical windows. A pure
//! aggregation: no clamping happens here — plausibility bounds are the league
//! context's contract.

use crate::domain::{MatchRecord, RateEstimate, Side, StatKind};

/// Whether the rate measures what the team produced or what it conceded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Scored,
    Conceded,
}

/// Arithmetic mean of a statistic over the team's matches at a venue. Matches where
/// the statistic is absent are excluded, never counted as zero. An empty sample
/// degrades to the statistic's documented default with `sample_size` 0; for a
/// conceded rate the default is the opposing venue's, since those are the goals
/// being counted.
pub fn estimate(
    matches: &[MatchRecord],
    team: &str,
    venue: Side,
    stat: StatKind,
    direction: Direction,
) -> RateEstimate {
    let observed_side = match direction {
        Direction::Scored => venue,
        Direction::Conceded => venue.flip(),
    };
    let samples = matches
        .iter()
        .filter(|record| record.side_of(team) == Some(venue))
        .filter_map(|record| record.stat(stat, observed_side))
        .map(f64::from)
        .collect::<Vec<_>>();

    if samples.is_empty() {
        return RateEstimate {
            lambda: stat.default_rate(observed_side),
            sample_size: 0,
            std_dev: 0.0,
        };
    }

    let sample_size = samples.len();
    let lambda = samples.iter().sum::<f64>() / sample_size as f64;
    let variance = samples
        .iter()
        .map(|sample| (sample - lambda).powi(2))
        .sum::<f64>()
        / sample_size as f64;
    RateEstimate {
        lambda,
        sample_size,
        std_dev: variance.sqrt(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_float_eq::*;
    use chrono::NaiveDate;

    fn record(day: u32, home: &str, away: &str, home_goals: Option<u16>, away_goals: Option<u16>) -> MatchRecord {
        MatchRecord {
            date: NaiveDate::from_ymd_opt(2023, 9, day).unwrap(),
            league: "EPL".into(),
            home_team: home.into(),
            away_team: away.into(),
            home_goals,
            away_goals,
            home_shots: None,
            away_shots: None,
            home_shots_on_target: None,
            away_shots_on_target: None,
            home_corners: None,
            away_corners: None,
        }
    }

    #[test]
    fn scored_mean_at_home() {
        let matches = [
            record(2, "Arsenal", "Chelsea", Some(3), Some(1)),
            record(9, "Arsenal", "Spurs", Some(1), Some(1)),
            record(16, "Spurs", "Arsenal", Some(0), Some(4)), // away match, excluded
        ];
        let estimate = estimate(&matches, "Arsenal", Side::Home, StatKind::Goals, Direction::Scored);
        assert_float_absolute_eq!(2.0, estimate.lambda);
        assert_eq!(2, estimate.sample_size);
        assert_float_absolute_eq!(1.0, estimate.std_dev);
    }

    #[test]
    fn conceded_reads_opposite_side() {
        let matches = [
            record(2, "Arsenal", "Chelsea", Some(3), Some(1)),
            record(9, "Arsenal", "Spurs", Some(1), Some(3)),
        ];
        let estimate = estimate(&matches, "Arsenal", Side::Home, StatKind::Goals, Direction::Conceded);
        assert_float_absolute_eq!(2.0, estimate.lambda);
        assert_eq!(2, estimate.sample_size);
    }

    #[test]
    fn absent_values_excluded() {
        let matches = [
            record(2, "Arsenal", "Chelsea", Some(2), Some(0)),
            record(9, "Arsenal", "Spurs", None, Some(1)),
        ];
        let estimate = estimate(&matches, "Arsenal", Side::Home, StatKind::Goals, Direction::Scored);
        assert_float_absolute_eq!(2.0, estimate.lambda);
        assert_eq!(1, estimate.sample_size);
    }

    #[test]
    fn empty_sample_degrades_to_default() {
        let estimate = estimate(&[], "Arsenal", Side::Away, StatKind::Corners, Direction::Scored);
        assert_float_absolute_eq!(5.0, estimate.lambda);
        assert_eq!(0, estimate.sample_size);
        assert_float_absolute_eq!(0.0, estimate.std_dev);
    }

    #[test]
    fn empty_conceded_sample_defaults_to_opposing_venue() {
        // goals conceded at home are scored by away sides, so the away default applies
        let estimate = estimate(&[], "Arsenal", Side::Home, StatKind::Goals, Direction::Conceded);
        assert_float_absolute_eq!(1.2, estimate.lambda);
        assert_eq!(0, estimate.sample_size);
    }
}

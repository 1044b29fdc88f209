//! League-level calibration: dampens predicted values in leagues that run hotter
//! than their long-term targets and caps them at plausibility ceilings.

use tracing::debug;

use crate::domain::{Category, CategoryValues, MarketType, PredictionResult};

#[derive(Clone, Debug)]
pub struct CalibrationConfig {
    /// Observed averages below this floor are treated as unreliable.
    pub floor: f64,
    /// Long-term cross-league target averages per category.
    pub targets: CategoryValues,
    /// Hard plausibility ceilings per category.
    pub ceilings: CategoryValues,
}
impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            floor: 0.1,
            targets: CategoryValues {
                goals: 2.7,
                shots: 24.0,
                corners: 10.0,
                both_score: 0.52,
            },
            ceilings: CategoryValues {
                goals: 5.0,
                shots: 35.0,
                corners: 15.0,
                both_score: 0.75,
            },
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct LeagueCalibrator {
    pub config: CalibrationConfig,
}
impl LeagueCalibrator {
    pub fn new(config: CalibrationConfig) -> Self {
        Self { config }
    }

    /// The dampening factor for a league whose recent observed average is
    /// `observed`. Capped at 1.0: calibration only ever pulls values down.
    pub fn factor(&self, category: Category, observed: f64) -> f64 {
        let observed = observed.max(self.config.floor);
        (self.config.targets.get(category) / observed).min(1.0)
    }

    /// Applies the league factor and ceiling to a combined prediction's value.
    /// Head-to-head markets have no calibration category and pass through untouched.
    pub fn apply(&self, market: MarketType, observed: f64, result: &mut PredictionResult) {
        let Some(category) = market.category() else {
            return;
        };
        let factor = self.factor(category, observed);
        let ceiling = self.config.ceilings.get(category);
        let calibrated = (result.value * factor).min(ceiling);
        if calibrated != result.value {
            debug!(
                "calibrated {market:?} value {} -> {calibrated} (factor {factor:.4}, ceiling {ceiling})",
                result.value
            );
        }
        result.value = calibrated;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::StatKind;
    use assert_float_eq::*;
    use rustc_hash::FxHashMap;

    fn result(value: f64) -> PredictionResult {
        PredictionResult {
            value,
            confidence: 0.6,
            probabilities: FxHashMap::default(),
            contributing_models: vec![],
            flag: None,
        }
    }

    #[test]
    fn factor_never_exceeds_one() {
        let calibrator = LeagueCalibrator::default();
        // league scoring below target would otherwise be inflated
        assert_float_absolute_eq!(1.0, calibrator.factor(Category::Goals, 2.2));
        assert_float_absolute_eq!(2.7 / 3.1, calibrator.factor(Category::Goals, 3.1), 1e-12);
    }

    #[test]
    fn floor_guards_tiny_observed_averages() {
        let calibrator = LeagueCalibrator::default();
        assert_float_absolute_eq!(1.0, calibrator.factor(Category::Goals, 0.0));
        assert_float_absolute_eq!(1.0, calibrator.factor(Category::Goals, 0.05));
    }

    #[test]
    fn dampens_hot_league() {
        let calibrator = LeagueCalibrator::default();
        let market = MarketType::TotalOver(StatKind::Goals, 2);
        let mut prediction = result(3.0);
        calibrator.apply(market, 3.1, &mut prediction);
        assert_float_absolute_eq!(3.0 * 2.7 / 3.1, prediction.value, 1e-12);
    }

    #[test]
    fn ceilings_cap_each_category() {
        let calibrator = LeagueCalibrator::default();
        let cases = [
            (MarketType::TotalOver(StatKind::Goals, 2), 7.0, 5.0),
            (MarketType::TotalOver(StatKind::Shots, 24), 40.0, 35.0),
            (MarketType::TotalOver(StatKind::Corners, 9), 20.0, 15.0),
            (MarketType::BothTeamsScore, 0.9, 0.75),
        ];
        for (market, value, ceiling) in cases {
            let mut prediction = result(value);
            // observed at target so the factor is 1.0 and only the ceiling bites
            let observed = calibrator
                .config
                .targets
                .get(market.category().unwrap());
            calibrator.apply(market, observed, &mut prediction);
            assert_float_absolute_eq!(ceiling, prediction.value, 1e-12);
        }
    }

    #[test]
    fn head_to_head_passes_through() {
        let calibrator = LeagueCalibrator::default();
        let mut prediction = result(0.48);
        calibrator.apply(MarketType::HeadToHead, 3.5, &mut prediction);
        assert_float_absolute_eq!(0.48, prediction.value, 1e-12);
    }
}

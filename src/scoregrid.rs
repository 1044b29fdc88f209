//! Population of the bounded joint-score grid and the aggregation of grid cells into
//! outcome probabilities.

use crate::dixon_coles;
use crate::domain::{Outcome, Side, StatKind};
use crate::factorial::Lookup;
use crate::linear::Matrix;
use crate::probs::SliceExt;

/// A square grid sized for the statistic's per-side bound.
pub fn allocate(stat: StatKind) -> Matrix {
    let dim = stat.grid_bound() as usize + 1;
    Matrix::allocate(dim, dim)
}

/// Fills the grid with raw τ-corrected joint probabilities. Passing `rho` of zero
/// yields the independent-Poisson base.
pub fn from_correction(lambda_home: f64, lambda_away: f64, rho: f64, scoregrid: &mut Matrix) {
    let factorial = Lookup::default();
    for home in 0..scoregrid.rows() {
        for away in 0..scoregrid.cols() {
            scoregrid[(home, away)] = dixon_coles::joint(
                home as u8,
                away as u8,
                lambda_home,
                lambda_away,
                rho,
                &factorial,
            );
        }
    }
}

/// Adds mass to the nil-all cell and renormalises: the zero-inflated variant.
pub fn inflate_zero(additive: f64, scoregrid: &mut Matrix) {
    scoregrid[(0, 0)] += additive;
    scoregrid.flatten_mut().normalise(1.0);
}

pub fn home_away_expectations(scoregrid: &Matrix) -> (f64, f64) {
    let (mut home_expectation, mut away_expectation) = (0.0, 0.0);
    for home in 0..scoregrid.rows() {
        for away in 0..scoregrid.cols() {
            let prob = scoregrid[(home, away)];
            home_expectation += home as f64 * prob;
            away_expectation += away as f64 * prob;
        }
    }
    (home_expectation, away_expectation)
}

impl Outcome {
    /// Sums the grid cells satisfying this outcome. Relative to the grid's own total
    /// mass; normalisation against the sibling outcomes is the market layer's job.
    pub fn gather(&self, scoregrid: &Matrix) -> f64 {
        match self {
            Outcome::Win(side) => Self::gather_win(side, scoregrid),
            Outcome::Draw => Self::gather_draw(scoregrid),
            Outcome::Over(line) => Self::gather_total_over(*line, scoregrid),
            Outcome::Under(line) => Self::gather_total_under(*line, scoregrid),
            Outcome::SideOver(side, line) => Self::gather_side_over(side, *line, scoregrid),
            Outcome::SideUnder(side, line) => Self::gather_side_under(side, *line, scoregrid),
            Outcome::BttsYes => Self::gather_both_score(scoregrid),
            Outcome::BttsNo => {
                scoregrid.flatten().sum() - Self::gather_both_score(scoregrid)
            }
        }
    }

    fn gather_win(side: &Side, scoregrid: &Matrix) -> f64 {
        let mut prob = 0.0;
        match side {
            Side::Home => {
                for row in 1..scoregrid.rows() {
                    for col in 0..row {
                        prob += scoregrid[(row, col)];
                    }
                }
            }
            Side::Away => {
                for col in 1..scoregrid.cols() {
                    for row in 0..col {
                        prob += scoregrid[(row, col)];
                    }
                }
            }
        }
        prob
    }

    fn gather_draw(scoregrid: &Matrix) -> f64 {
        let mut prob = 0.0;
        for index in 0..scoregrid.rows() {
            prob += scoregrid[(index, index)];
        }
        prob
    }

    fn gather_total_over(line: u8, scoregrid: &Matrix) -> f64 {
        let line = line as usize;
        let mut prob = 0.0;
        for row in 0..scoregrid.rows() {
            for col in 0..scoregrid.cols() {
                if row + col > line {
                    prob += scoregrid[(row, col)];
                }
            }
        }
        prob
    }

    fn gather_total_under(line: u8, scoregrid: &Matrix) -> f64 {
        let line = line as usize;
        let mut prob = 0.0;
        for row in 0..scoregrid.rows() {
            for col in 0..scoregrid.cols() {
                if row + col < line {
                    prob += scoregrid[(row, col)];
                }
            }
        }
        prob
    }

    fn gather_side_over(side: &Side, line: u8, scoregrid: &Matrix) -> f64 {
        let line = line as usize;
        let mut prob = 0.0;
        for row in 0..scoregrid.rows() {
            for col in 0..scoregrid.cols() {
                let count = match side {
                    Side::Home => row,
                    Side::Away => col,
                };
                if count > line {
                    prob += scoregrid[(row, col)];
                }
            }
        }
        prob
    }

    fn gather_side_under(side: &Side, line: u8, scoregrid: &Matrix) -> f64 {
        let line = line as usize;
        let mut prob = 0.0;
        for row in 0..scoregrid.rows() {
            for col in 0..scoregrid.cols() {
                let count = match side {
                    Side::Home => row,
                    Side::Away => col,
                };
                if count < line {
                    prob += scoregrid[(row, col)];
                }
            }
        }
        prob
    }

    /// Inclusion-exclusion over the grid's own mass: total − P(home blank) −
    /// P(away blank) + P(nil-all).
    fn gather_both_score(scoregrid: &Matrix) -> f64 {
        let total = scoregrid.flatten().sum();
        let home_blank = scoregrid.row_slice(0).sum();
        let mut away_blank = 0.0;
        for row in 0..scoregrid.rows() {
            away_blank += scoregrid[(row, 0)];
        }
        total - home_blank - away_blank + scoregrid[(0, 0)]
    }
}

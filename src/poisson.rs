use crate::factorial::Factorial;

/// Probability of observing `k` events under a Poisson distribution with mean `lambda`.
#[inline]
pub fn univariate(k: u8, lambda: f64, factorial: &impl Factorial) -> f64 {
    lambda.powi(k as i32) * f64::exp(-lambda) / factorial.get(k) as f64
}

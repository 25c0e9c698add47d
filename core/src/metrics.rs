use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};
use thiserror::Error;

/// Point estimate of a sample mean with the half-width of its confidence interval.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Estimate {
    pub mean: f64,
    pub margin: f64,
}

impl Estimate {
    pub fn lower(&self) -> f64 {
        self.mean - self.margin
    }

    pub fn upper(&self) -> f64 {
        self.mean + self.margin
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum EstimateError {
    #[error("need at least 2 samples for a confidence interval, got {count}")]
    TooFewSamples { count: usize },

    #[error("confidence level {0} must lie strictly between 0 and 1")]
    InvalidConfidence(f64),

    #[error("sample {index} is not a finite number ({value})")]
    NonFinite { index: usize, value: f64 },

    #[error("interval for {count} samples overflows f64 (mean {mean}, margin {margin})")]
    Overflow { count: usize, mean: f64, margin: f64 },

    #[error("t distribution unavailable: {0}")]
    Distribution(String),
}

/// Mean and two-sided confidence margin of `samples` at `confidence` (e.g. `0.90`).
///
/// The margin is the standard error of the mean times the Student's t critical value
/// with `n - 1` degrees of freedom.
pub fn estimate(samples: &[f64], confidence: f64) -> Result<Estimate, EstimateError> {
    if !(confidence > 0.0 && confidence < 1.0) {
        return Err(EstimateError::InvalidConfidence(confidence));
    }
    if samples.len() < 2 {
        return Err(EstimateError::TooFewSamples {
            count: samples.len(),
        });
    }
    if let Some((index, &value)) = samples.iter().enumerate().find(|(_, v)| !v.is_finite()) {
        return Err(EstimateError::NonFinite { index, value });
    }

    // Summing identical values can round; report them exactly.
    let first = samples[0];
    if samples.iter().all(|&v| v == first) {
        return Ok(Estimate {
            mean: first,
            margin: 0.0,
        });
    }

    let (mean, sem) = mean_and_standard_error(samples);
    let margin = sem * t_critical(confidence, samples.len() as f64 - 1.0)?;
    if !(mean.is_finite() && margin.is_finite()) {
        return Err(EstimateError::Overflow {
            count: samples.len(),
            mean,
            margin,
        });
    }
    Ok(Estimate { mean, margin })
}

/// Running (Welford) mean together with the sample standard deviation (n - 1
/// denominator) divided by sqrt(n).
fn mean_and_standard_error(samples: &[f64]) -> (f64, f64) {
    let mut mean = 0.0;
    let mut m2 = 0.0;
    for (k, &value) in samples.iter().enumerate() {
        let delta = value - mean;
        mean += delta / (k + 1) as f64;
        m2 += delta * (value - mean);
    }
    let n = samples.len() as f64;
    (mean, (m2 / (n - 1.0)).sqrt() / n.sqrt())
}

fn t_critical(confidence: f64, degrees_of_freedom: f64) -> Result<f64, EstimateError> {
    let dist = StudentsT::new(0.0, 1.0, degrees_of_freedom)
        .map_err(|err| EstimateError::Distribution(err.to_string()))?;
    Ok(dist.inverse_cdf((1.0 + confidence) / 2.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_samples_have_zero_margin() {
        let estimate = estimate(&[10.0, 10.0, 10.0], 0.90).unwrap();
        assert_eq!(estimate.mean, 10.0);
        assert_eq!(estimate.margin, 0.0);
    }

    #[test]
    fn matches_reference_interval() {
        // mean 3, sem = sqrt(2.5 / 5), t(0.95, 4) = 2.131847
        let estimate = estimate(&[1.0, 2.0, 3.0, 4.0, 5.0], 0.90).unwrap();
        assert!((estimate.mean - 3.0).abs() < 1e-12);
        assert!((estimate.margin - 1.507443).abs() < 1e-3, "{estimate:?}");
        assert!((estimate.upper() - 4.507443).abs() < 1e-3);
        assert!((estimate.lower() - 1.492557).abs() < 1e-3);
    }

    #[test]
    fn wider_confidence_gives_wider_margin() {
        let samples = [9.1, 10.4, 11.2, 9.8];
        let narrow = estimate(&samples, 0.80).unwrap();
        let wide = estimate(&samples, 0.99).unwrap();
        assert!(wide.margin > narrow.margin);
    }

    #[test]
    fn rejects_empty_and_singleton_sets() {
        assert_eq!(
            estimate(&[], 0.90),
            Err(EstimateError::TooFewSamples { count: 0 })
        );
        assert_eq!(
            estimate(&[4.2], 0.90),
            Err(EstimateError::TooFewSamples { count: 1 })
        );
    }

    #[test]
    fn overflowing_interval_is_an_error() {
        assert!(matches!(
            estimate(&[1e308, 1e308, 1e307], 0.90),
            Err(EstimateError::Overflow { count: 3, .. })
        ));
        assert!(matches!(
            estimate(&[1e200, 2e200, 3e200], 0.90),
            Err(EstimateError::Overflow { count: 3, .. })
        ));
    }

    #[test]
    fn large_finite_samples_do_not_overflow() {
        let estimate = estimate(&[1e150, 2e150, 3e150], 0.90).unwrap();
        assert!((estimate.mean / 2e150 - 1.0).abs() < 1e-12);
        assert!(estimate.margin.is_finite() && estimate.margin > 0.0);
    }

    #[test]
    fn rejects_bad_confidence_and_non_finite_samples() {
        assert_eq!(
            estimate(&[1.0, 2.0], 1.0),
            Err(EstimateError::InvalidConfidence(1.0))
        );
        assert!(matches!(
            estimate(&[1.0, f64::NAN], 0.9),
            Err(EstimateError::NonFinite { index: 1, .. })
        ));
    }
}

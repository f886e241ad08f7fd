//! Scalar Kalman filter for price smoothing.

use rulebook_core::error::IndicatorError;
use rulebook_core::traits::{Indicator, StreamingIndicator};

/// One-dimensional random-walk Kalman filter.
///
/// The hidden state is the "true" price, assumed to drift by white noise with
/// variance `process_noise`; each close is observed with variance
/// `measurement_noise`. A higher ratio of process to measurement noise makes
/// the estimate follow price more closely.
#[derive(Debug, Clone)]
pub struct KalmanFilter {
    process_noise: f64,
    measurement_noise: f64,
    estimate: Option<f64>,
    error_covariance: f64,
    gain: f64,
}

impl KalmanFilter {
    /// Error covariance assigned on the first observation.
    pub const INITIAL_COVARIANCE: f64 = 1.0;

    /// # Panics
    /// If either noise is not strictly positive.
    pub fn new(process_noise: f64, measurement_noise: f64) -> Self {
        assert!(process_noise > 0.0, "Process noise must be positive");
        assert!(measurement_noise > 0.0, "Measurement noise must be positive");
        Self {
            process_noise,
            measurement_noise,
            estimate: None,
            error_covariance: Self::INITIAL_COVARIANCE,
            gain: 0.0,
        }
    }

    pub fn try_new(process_noise: f64, measurement_noise: f64) -> Result<Self, IndicatorError> {
        let positive = |v: f64| v.is_finite() && v > 0.0;
        if !positive(process_noise) || !positive(measurement_noise) {
            return Err(IndicatorError::InvalidParameter(format!(
                "Kalman noises must be positive (q={}, r={})",
                process_noise, measurement_noise
            )));
        }
        Ok(Self::new(process_noise, measurement_noise))
    }

    /// Feed an observation and return the filtered estimate.
    pub fn filter(&mut self, observation: f64) -> f64 {
        let estimate = match self.estimate {
            None => {
                self.error_covariance = Self::INITIAL_COVARIANCE;
                self.gain = 0.0;
                observation
            }
            Some(prev) => {
                // predict
                let predicted_cov = self.error_covariance + self.process_noise;
                // correct
                self.gain = predicted_cov / (predicted_cov + self.measurement_noise);
                self.error_covariance = (1.0 - self.gain) * predicted_cov;
                prev + self.gain * (observation - prev)
            }
        };
        self.estimate = Some(estimate);
        estimate
    }

    /// Kalman gain used for the latest correction.
    pub fn gain(&self) -> f64 {
        self.gain
    }

    pub fn error_covariance(&self) -> f64 {
        self.error_covariance
    }

    fn fresh(&self) -> Self {
        Self::new(self.process_noise, self.measurement_noise)
    }
}

impl StreamingIndicator for KalmanFilter {
    type Output = f64;

    fn update(&mut self, value: f64) -> Option<f64> {
        Some(self.filter(value))
    }

    fn current(&self) -> Option<f64> {
        self.estimate
    }

    fn reset(&mut self) {
        self.estimate = None;
        self.error_covariance = Self::INITIAL_COVARIANCE;
        self.gain = 0.0;
    }

    fn is_ready(&self) -> bool {
        self.estimate.is_some()
    }

    fn period(&self) -> usize {
        1
    }

    fn name(&self) -> &str {
        "Kalman"
    }
}

impl Indicator for KalmanFilter {
    type Output = f64;

    /// Filter a whole series from a clean state. One output per input.
    fn calculate(&self, data: &[f64]) -> Vec<f64> {
        let mut filter = self.fresh();
        data.iter().map(|&z| filter.filter(z)).collect()
    }

    fn period(&self) -> usize {
        1
    }

    fn name(&self) -> &str {
        "Kalman"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_output_is_observation() {
        let mut kf = KalmanFilter::new(0.01, 0.1);
        assert!(!kf.is_ready());
        assert_eq!(kf.update(101.5), Some(101.5));
        assert!(kf.is_ready());
    }

    #[test]
    fn test_converges_on_constant() {
        let mut kf = KalmanFilter::new(0.01, 1.0);
        kf.filter(90.0);
        let mut last = 0.0;
        for _ in 0..500 {
            last = kf.filter(100.0);
        }
        assert!((last - 100.0).abs() < 1e-3, "estimate {}", last);
    }

    #[test]
    fn test_estimate_between_previous_and_observation() {
        let mut kf = KalmanFilter::new(0.05, 0.5);
        let mut prev = kf.filter(100.0);
        for &z in &[103.0, 99.0, 104.0, 97.0, 110.0] {
            let est = kf.filter(z);
            let (lo, hi) = if prev < z { (prev, z) } else { (z, prev) };
            assert!(est >= lo && est <= hi);
            assert!(kf.gain() > 0.0 && kf.gain() < 1.0);
            prev = est;
        }
    }

    #[test]
    fn test_first_correction() {
        // p = 1 + 0.5 = 1.5, k = 1.5 / 2.5 = 0.6
        let mut kf = KalmanFilter::new(0.5, 1.0);
        kf.filter(10.0);
        let est = kf.filter(20.0);
        assert!((est - 16.0).abs() < 1e-12);
        assert!((kf.error_covariance() - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_batch_matches_streaming_and_ignores_state() {
        let data = [10.0, 11.0, 10.5, 12.0, 11.5];
        let mut kf = KalmanFilter::new(0.1, 0.4);
        let streamed: Vec<f64> = data.iter().filter_map(|&z| kf.update(z)).collect();

        // kf now carries state; calculate must start clean
        assert_eq!(kf.calculate(&data), streamed);
    }

    #[test]
    fn test_reset() {
        let mut kf = KalmanFilter::new(0.1, 0.4);
        kf.filter(5.0);
        kf.filter(6.0);
        kf.reset();
        assert_eq!(kf.current(), None);
        assert_eq!(kf.filter(7.0), 7.0);
    }

    #[test]
    fn test_invalid_noise_rejected() {
        assert!(KalmanFilter::try_new(0.0, 1.0).is_err());
        assert!(KalmanFilter::try_new(0.1, f64::NAN).is_err());
        assert!(KalmanFilter::try_new(0.1, 1.0).is_ok());
    }
}

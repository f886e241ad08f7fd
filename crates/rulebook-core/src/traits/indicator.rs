//! Indicator trait definitions.

use crate::error::IndicatorError;

/// Batch indicator over a slice of values.
pub trait Indicator: Send + Sync {
    /// The output type of the indicator.
    type Output;

    /// Calculate indicator values for the given data.
    ///
    /// Returns one value per complete window, oldest first. Too little data
    /// yields an empty vector rather than an error.
    fn calculate(&self, data: &[f64]) -> Vec<Self::Output>;

    /// Minimum number of data points needed for one output.
    fn period(&self) -> usize;

    fn name(&self) -> &str;

    /// Validate that there's enough data.
    fn validate_data(&self, data: &[f64]) -> Result<(), IndicatorError> {
        if data.len() < self.period() {
            return Err(IndicatorError::InsufficientData {
                required: self.period(),
                available: data.len(),
            });
        }
        Ok(())
    }
}

/// Indicator that keeps internal state and is fed one value at a time.
///
/// This is the lifecycle contract every rule binds to: feed with
/// [`update`](StreamingIndicator::update), ask [`is_ready`](StreamingIndicator::is_ready)
/// before trusting the output, and [`reset`](StreamingIndicator::reset) to
/// start over.
pub trait StreamingIndicator: Send + Sync {
    /// The output type of the indicator.
    type Output;

    /// Feed a new value.
    ///
    /// # Returns
    /// The current indicator value, or None if not yet ready
    fn update(&mut self, value: f64) -> Option<Self::Output>;

    /// The current value without adding new data.
    fn current(&self) -> Option<Self::Output>;

    /// Drop all accumulated state.
    fn reset(&mut self);

    /// Whether enough data has been seen to produce values.
    fn is_ready(&self) -> bool;

    /// Minimum number of values required before `is_ready`.
    fn period(&self) -> usize;

    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct WindowSum {
        period: usize,
    }

    impl Indicator for WindowSum {
        type Output = f64;

        fn calculate(&self, data: &[f64]) -> Vec<f64> {
            data.windows(self.period).map(|w| w.iter().sum()).collect()
        }

        fn period(&self) -> usize {
            self.period
        }

        fn name(&self) -> &str {
            "sum"
        }
    }

    struct Counter {
        seen: usize,
        period: usize,
    }

    impl StreamingIndicator for Counter {
        type Output = usize;

        fn update(&mut self, _value: f64) -> Option<usize> {
            self.seen += 1;
            self.current()
        }

        fn current(&self) -> Option<usize> {
            self.is_ready().then_some(self.seen)
        }

        fn reset(&mut self) {
            self.seen = 0;
        }

        fn is_ready(&self) -> bool {
            self.seen >= self.period
        }

        fn period(&self) -> usize {
            self.period
        }

        fn name(&self) -> &str {
            "counter"
        }
    }

    #[test]
    fn test_indicator_validation() {
        let indicator = WindowSum { period: 5 };

        assert_eq!(
            indicator.validate_data(&[1.0, 2.0, 3.0]),
            Err(IndicatorError::InsufficientData {
                required: 5,
                available: 3
            })
        );
        assert!(indicator.validate_data(&[1.0, 2.0, 3.0, 4.0, 5.0]).is_ok());
    }

    #[test]
    fn test_indicator_calculate() {
        let indicator = WindowSum { period: 3 };
        let result = indicator.calculate(&[1.0, 2.0, 3.0, 4.0, 5.0]);

        assert_eq!(result, vec![6.0, 9.0, 12.0]);
    }

    #[test]
    fn test_streaming_lifecycle() {
        let mut counter = Counter { seen: 0, period: 2 };
        assert_eq!(counter.update(1.0), None);
        assert_eq!(counter.update(1.0), Some(2));
        assert!(counter.is_ready());

        counter.reset();
        assert!(!counter.is_ready());
        assert_eq!(counter.current(), None);
    }
}

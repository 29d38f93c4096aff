/// Default fraction of a segment left when the next one is prefetched.
pub const DEFAULT_LOW_WATER_RATIO: f64 = 0.2;

/// Errors raised while validating a [`BufferConfig`].
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The low-water ratio was outside `[0.0, 1.0]` or not finite.
    #[error("low-water ratio must be within [0.0, 1.0], got {0}")]
    InvalidLowWaterRatio(f64),
}

/// Tunables shared by every [`DoubleBuffer`] an allocator creates.
///
/// # Example
/// ```
/// use segid::BufferConfig;
///
/// let config = BufferConfig::new().with_low_water_ratio(0.5).unwrap();
/// assert_eq!(config.threshold(1000), 500);
/// assert!(BufferConfig::new().with_low_water_ratio(1.5).is_err());
/// ```
///
/// [`DoubleBuffer`]: crate::DoubleBuffer
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BufferConfig {
    low_water_ratio: f64,
}

impl BufferConfig {
    /// Creates a config with a low-water ratio of
    /// [`DEFAULT_LOW_WATER_RATIO`].
    pub const fn new() -> Self {
        Self {
            low_water_ratio: DEFAULT_LOW_WATER_RATIO,
        }
    }

    /// Sets the fraction of a segment that may remain before a background
    /// prefetch of the next segment starts.
    ///
    /// `0.0` prefetches only once a segment is fully consumed; `1.0`
    /// prefetches as soon as a segment is installed.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidLowWaterRatio`] if `ratio` is not finite
    /// or lies outside `[0.0, 1.0]`.
    pub fn with_low_water_ratio(mut self, ratio: f64) -> Result<Self, ConfigError> {
        if !ratio.is_finite() || !(0.0..=1.0).contains(&ratio) {
            return Err(ConfigError::InvalidLowWaterRatio(ratio));
        }
        self.low_water_ratio = ratio;
        Ok(self)
    }

    /// The configured low-water ratio.
    pub const fn low_water_ratio(&self) -> f64 {
        self.low_water_ratio
    }

    /// Remaining capacity at or below which a segment of `step` ids triggers
    /// a prefetch: `floor(step * ratio)`.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn threshold(&self, step: u64) -> u64 {
        (step as f64 * self.low_water_ratio).floor() as u64
    }
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self::new()
    }
}

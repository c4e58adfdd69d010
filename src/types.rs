//! Settings and output types for the compass engine

/// Tuning parameters for one [`ScalarEstimator`](crate::ScalarEstimator) channel
///
/// The defaults match a slowly slewing telescope mount: readings are already
/// smooth and the scope rotates at a few degrees per second at most during
/// calibration, well under a degree per second when tracking.
///
/// # Example
/// ```
/// use telescope_compass::{CompassSettings, EstimatorSettings};
///
/// let settings = CompassSettings {
///     azimuth_filter: EstimatorSettings {
///         measurement_error: 0.05,
///         process_variance: 0.1,
///     },
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EstimatorSettings {
    /// Expected magnitude of measurement noise
    ///
    /// Also seeds the initial estimate uncertainty. Sensor specific; chosen
    /// by comparing plots of raw and smoothed readings.
    pub measurement_error: f32,
    /// Process variance: how much the true value is expected to move
    /// between consecutive measurements
    pub process_variance: f32,
}

impl Default for EstimatorSettings {
    fn default() -> Self {
        Self {
            measurement_error: 0.01,
            process_variance: 1.0,
        }
    }
}

/// Compass engine settings
///
/// One estimator channel per output angle. Both default to the same tuning;
/// a noisier magnetometer than accelerometer (or vice versa) warrants
/// separate values.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CompassSettings {
    /// Smoothing parameters for the azimuth channel
    pub azimuth_filter: EstimatorSettings,
    /// Smoothing parameters for the altitude channel
    pub altitude_filter: EstimatorSettings,
}

/// One fused compass reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    /// Bearing of the telescope forward axis in degrees, `[0°, 360°)`,
    /// 0° = magnetic north
    pub azimuth: f32,
    /// Elevation of the telescope forward axis in degrees
    /// (0° horizontal, 90° zenith)
    pub altitude: f32,
}

//! Recursive scalar smoothing estimator
//!
//! A degenerate one-dimensional Kalman filter: no state transition, a single
//! scalar channel. One instance per smoothed quantity (azimuth, altitude,
//! optionally each raw sensor axis).

use nalgebra::Vector3;

use crate::types::EstimatorSettings;

/// Single-variable recursive smoothing estimator
///
/// Each [`update`](ScalarEstimator::update) blends the new measurement into
/// the running estimate with a gain derived from the current estimate
/// uncertainty, then inflates the uncertainty by the observed estimate
/// movement scaled by the process variance.
///
/// The filter is **not** angle-wrapping aware: a measurement sequence
/// crossing the 0°/360° boundary produces a transient jump-and-settle
/// artifact unless the caller supplies unwrapped measurements. Feeding a
/// non-finite measurement permanently corrupts the internal state, so
/// callers must check `is_finite` first (the compass engine does).
///
/// # Example
/// ```
/// use telescope_compass::ScalarEstimator;
///
/// let mut filter = ScalarEstimator::new(0.01, 0.01, 1.0);
/// let mut estimate = 0.0;
/// for _ in 0..100 {
///     estimate = filter.update(3.5);
/// }
/// assert!((estimate - 3.5).abs() < 0.01);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ScalarEstimator {
    /// Measurement uncertainty
    err_measure: f32,
    /// Current estimate uncertainty
    err_estimate: f32,
    /// Process variance
    q: f32,
    /// Latest estimate
    last_estimate: f32,
}

impl ScalarEstimator {
    /// Create an estimator from explicit parameters
    ///
    /// `est_error` seeds the initial estimate uncertainty; callers usually
    /// pass the same value as `measure_error`.
    pub fn new(measure_error: f32, est_error: f32, process_variance: f32) -> Self {
        Self {
            err_measure: measure_error,
            err_estimate: est_error,
            q: process_variance,
            last_estimate: 0.0,
        }
    }

    /// Create an estimator from a settings struct
    pub fn with_settings(settings: EstimatorSettings) -> Self {
        Self::new(
            settings.measurement_error,
            settings.measurement_error,
            settings.process_variance,
        )
    }

    /// Fold one measurement into the estimate and return the new estimate
    pub fn update(&mut self, measurement: f32) -> f32 {
        let kalman_gain = self.err_estimate / (self.err_estimate + self.err_measure);
        let current_estimate = self.last_estimate + kalman_gain * (measurement - self.last_estimate);
        self.err_estimate = (1.0 - kalman_gain) * self.err_estimate
            + (self.last_estimate - current_estimate).abs() * self.q;
        self.last_estimate = current_estimate;
        current_estimate
    }

    /// Latest estimate without folding in a new measurement
    pub fn estimate(&self) -> f32 {
        self.last_estimate
    }

    /// Re-seed the estimate, keeping the tuning parameters
    ///
    /// Used after a recalibration so the filter does not have to converge
    /// from the stale pre-calibration value.
    pub fn reset_to(&mut self, estimate: f32) {
        self.last_estimate = estimate;
        self.err_estimate = self.err_measure;
    }

    /// Change the measurement uncertainty
    pub fn set_measurement_error(&mut self, err_measure: f32) {
        self.err_measure = err_measure;
    }

    /// Change the process variance
    pub fn set_process_variance(&mut self, q: f32) {
        self.q = q;
    }
}

/// Per-axis smoothing of a raw 3-axis sensor stream
///
/// Three independent [`ScalarEstimator`]s, one per axis, tuned identically.
/// Used ahead of fusion for sensors whose raw output is too noisy (the same
/// tuning caveats as the scalar filter apply). A non-finite axis value is
/// passed through untouched so it cannot poison the filter state; the
/// downstream engine rejects the reading instead.
#[derive(Debug, Clone, Copy)]
pub struct VectorSmoother {
    x: ScalarEstimator,
    y: ScalarEstimator,
    z: ScalarEstimator,
}

impl VectorSmoother {
    /// Create a smoother with the same tuning on all three axes
    pub fn new(settings: EstimatorSettings) -> Self {
        Self {
            x: ScalarEstimator::with_settings(settings),
            y: ScalarEstimator::with_settings(settings),
            z: ScalarEstimator::with_settings(settings),
        }
    }

    /// Smooth one raw sample
    pub fn update(&mut self, raw: Vector3<f32>) -> Vector3<f32> {
        Vector3::new(
            Self::update_axis(&mut self.x, raw.x),
            Self::update_axis(&mut self.y, raw.y),
            Self::update_axis(&mut self.z, raw.z),
        )
    }

    fn update_axis(filter: &mut ScalarEstimator, value: f32) -> f32 {
        if value.is_finite() {
            filter.update(value)
        } else {
            value
        }
    }
}

//! Tilt-compensated compass engine
//!
//! Fuses a calibrated magnetometer vector with the accelerometer's gravity
//! reference into azimuth and altitude, using cross products to construct
//! the horizontal east/north reference vectors instead of explicit
//! pitch/roll trigonometry. The body frame is x forward (along the optical
//! tube, toward north at azimuth 0°), y east, z down.
//!
//! The cross-product method leaves the tilt-axis soft iron uncorrected in
//! the planar calibration case; that error scales with sin(tilt) and is
//! negligible for a mount leveled to within a few degrees. The host surfaces
//! a "not level" warning from [`mount_tilt`](crate::mount_tilt) when it is
//! not.

use log::debug;
use nalgebra::{ComplexField, RealField, Vector3};

use crate::accel::AccelCalibration;
use crate::calibration::MagCalibration;
use crate::compensation::DeviationMap;
use crate::error::{Error, Result};
use crate::estimator::ScalarEstimator;
use crate::math::{RAD_TO_DEG, Vector3Ext, norm_2pi};
use crate::types::{CompassSettings, Reading};

/// Compass engine
///
/// Owns every piece of mutable fusion state: the magnetometer and
/// accelerometer calibrations, one smoothing estimator per output angle and
/// the azimuth deviation map. Engines are independent of each other, so
/// tests (or a second sensor head) can run their own instance.
///
/// # Example
/// ```
/// use nalgebra::Vector3;
/// use telescope_compass::Compass;
///
/// let mut compass = Compass::new();
/// let magnetometer = Vector3::new(0.21, 0.05, 0.43); // gauss
/// let accelerometer = Vector3::new(0.01, 0.0, 0.99); // g
///
/// let reading = compass.update(magnetometer, accelerometer).unwrap();
/// assert!((0.0..360.0).contains(&reading.azimuth));
/// ```
#[derive(Debug, Clone)]
pub struct Compass {
    settings: CompassSettings,
    mag_calibration: MagCalibration,
    accel_calibration: AccelCalibration,
    azimuth_filter: ScalarEstimator,
    altitude_filter: ScalarEstimator,
    compensation: DeviationMap,
}

impl Compass {
    /// Create an engine with default settings and identity calibrations
    pub fn new() -> Self {
        Self::with_settings(CompassSettings::default())
    }

    /// Create an engine with explicit estimator tuning
    pub fn with_settings(settings: CompassSettings) -> Self {
        Self {
            settings,
            mag_calibration: MagCalibration::None,
            accel_calibration: AccelCalibration::default(),
            azimuth_filter: ScalarEstimator::with_settings(settings.azimuth_filter),
            altitude_filter: ScalarEstimator::with_settings(settings.altitude_filter),
            compensation: DeviationMap::default(),
        }
    }

    /// Compute one smoothed reading from raw sensor vectors
    ///
    /// `magnetometer` in gauss, `accelerometer` in g, both already rotated
    /// into the body frame by the sensor driver. A zero accelerometer vector
    /// means no usable gravity reference: azimuth falls back to the
    /// magnetometer's horizontal components alone and altitude reads 0°.
    ///
    /// Degenerate vectors (zero or NaN field, gravity parallel to the field)
    /// fail with [`Error::InvalidReading`] *before* the smoothing filters
    /// are updated, since a NaN folded into a filter would poison every
    /// later reading. The engine resumes cleanly from the next good sample.
    pub fn update(&mut self, magnetometer: Vector3<f32>, accelerometer: Vector3<f32>) -> Result<Reading> {
        let mag = self.mag_calibration.apply(magnetometer);
        let acc = self.accel_calibration.apply(accelerometer);

        let yaw = if acc == Vector3::zeros() {
            (-mag.y).atan2(mag.x)
        } else {
            // cross "down" with the field to get east, east with "down" to
            // get north parallel to the ground; no explicit pitch/roll needed
            let east = acc.cross(&mag).safe_normalize();
            if east == Vector3::zeros() {
                return Err(Error::InvalidReading);
            }
            let north = east.cross(&acc).safe_normalize();

            let forward = Vector3::new(1.0, 0.0, 0.0);
            east.dot(&forward).atan2(north.dot(&forward))
        };
        let yaw = norm_2pi(yaw);

        let altitude = if acc == Vector3::zeros() {
            0.0
        } else {
            acc.x.atan2(acc.z)
        };

        if !yaw.is_finite() || !altitude.is_finite() {
            return Err(Error::InvalidReading);
        }

        let yaw = self.azimuth_filter.update(yaw);
        let altitude = self.altitude_filter.update(altitude);

        Ok(Reading {
            azimuth: norm_2pi(yaw) * RAD_TO_DEG,
            altitude: altitude * RAD_TO_DEG,
        })
    }

    /// Apply the deviation map to a reading
    ///
    /// Identity until the compensation sweep has been completed. The
    /// corrected azimuth is not re-normalized: a deviation applied near 360°
    /// may exceed it, and the host's goto math handles the wrap.
    pub fn compensate(&mut self, reading: Reading) -> Reading {
        Reading {
            azimuth: self.compensation.compensate(reading.azimuth, reading.altitude),
            altitude: reading.altitude,
        }
    }

    /// Record one deviation-sweep sample, returning the collection countdown
    ///
    /// See [`DeviationMap::add_sample`].
    pub fn add_compensation_sample(
        &mut self,
        target_azimuth: f32,
        altitude: f32,
        measured_azimuth: f32,
    ) -> usize {
        self.compensation
            .add_sample(target_azimuth, altitude, measured_azimuth)
    }

    /// Install a fitted magnetometer calibration
    pub fn set_mag_calibration(&mut self, calibration: MagCalibration) {
        debug!("magnetometer calibration installed: {:?}", calibration);
        self.mag_calibration = calibration;
    }

    /// Current magnetometer calibration
    pub fn mag_calibration(&self) -> &MagCalibration {
        &self.mag_calibration
    }

    /// Install an accelerometer calibration
    pub fn set_accel_calibration(&mut self, calibration: AccelCalibration) {
        self.accel_calibration = calibration;
    }

    /// Current accelerometer calibration
    pub fn accel_calibration(&self) -> &AccelCalibration {
        &self.accel_calibration
    }

    /// Deviation compensation map
    pub fn compensation(&self) -> &DeviationMap {
        &self.compensation
    }

    /// Mutable deviation compensation map (host-driven rebuild or reload)
    pub fn compensation_mut(&mut self) -> &mut DeviationMap {
        &mut self.compensation
    }

    /// Engine settings
    pub fn settings(&self) -> CompassSettings {
        self.settings
    }

    /// Re-seed both smoothing filters
    ///
    /// Called after installing a new calibration so the filters do not have
    /// to converge away from estimates produced under the old one.
    pub fn reset_filters(&mut self) {
        self.azimuth_filter = ScalarEstimator::with_settings(self.settings.azimuth_filter);
        self.altitude_filter = ScalarEstimator::with_settings(self.settings.altitude_filter);
    }
}

impl Default for Compass {
    fn default() -> Self {
        Self::new()
    }
}

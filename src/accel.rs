//! Accelerometer calibration and mount levelness estimation
//!
//! The elevation angle only uses the accelerometer x (telescope forward) and
//! z (down) axes, so calibration is a two-point linear fit per axis: one
//! averaged reading with the telescope horizontal (x at 0 g, z at 1 g) and
//! one vertical (x at 1 g, z at 0 g). Gain and offset follow NXP AN7399:
//! `corrected = reading * gain + offset`.

use log::debug;
use nalgebra::Vector3;

use crate::error::{Error, Result};
use crate::math::{RAD_TO_DEG, Vector3Ext};

/// Accelerometer full-scale reference in g
const FULL_SCALE: f32 = 1.0;

/// Spread multiplier of the sensor RMS noise under which a sample cluster
/// counts as a single point
const LEVEL_NOISE_MULTIPLE: f32 = 6.0;

/// Two-point gain/offset calibration for the elevation accelerometer axes
///
/// The default is the identity calibration (unit gain, zero offset), so an
/// engine can run uncalibrated and be upgraded once the operator performs
/// the two-position procedure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccelCalibration {
    offset_x: f32,
    offset_z: f32,
    gain_x: f32,
    gain_z: f32,
}

impl Default for AccelCalibration {
    fn default() -> Self {
        Self {
            offset_x: 0.0,
            offset_z: 0.0,
            gain_x: 1.0,
            gain_z: 1.0,
        }
    }
}

impl AccelCalibration {
    /// Rebuild a calibration from persisted parameters
    pub fn from_params(offset_x: f32, gain_x: f32, offset_z: f32, gain_z: f32) -> Self {
        Self {
            offset_x,
            offset_z,
            gain_x,
            gain_z,
        }
    }

    /// Flat parameter tuple `(offset_x, gain_x, offset_z, gain_z)` for a
    /// host to display or persist
    pub fn params(&self) -> (f32, f32, f32, f32) {
        (self.offset_x, self.gain_x, self.offset_z, self.gain_z)
    }

    /// Correct one raw accelerometer sample
    ///
    /// Only x and z participate in the elevation computation; y is passed
    /// through.
    pub fn apply(&self, raw: Vector3<f32>) -> Vector3<f32> {
        Vector3::new(
            raw.x * self.gain_x + self.offset_x,
            raw.y,
            raw.z * self.gain_z + self.offset_z,
        )
    }
}

/// Capture driver for the two-position accelerometer calibration
///
/// The operator rests the telescope horizontal, the host averages a batch of
/// readings into [`record_horizontal`](AccelCalibrator::record_horizontal),
/// then repeats at vertical. [`finish`](AccelCalibrator::finish) refuses to
/// produce a calibration until both positions have been captured.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccelCalibrator {
    /// x reading at 0 g and z reading at 1 g (horizontal rest)
    horizontal: Option<(f32, f32)>,
    /// x reading at 1 g and z reading at 0 g (vertical rest)
    vertical: Option<(f32, f32)>,
}

impl AccelCalibrator {
    /// Start a fresh two-position capture
    pub fn new() -> Self {
        Self::default()
    }

    /// Record averaged readings taken with the telescope horizontal
    pub fn record_horizontal(&mut self, samples: &[Vector3<f32>]) {
        let mean = mean_vector(samples);
        self.horizontal = Some((mean.x, mean.z));
        debug!("accel cal horizontal reading acquired: x0={:.4} z1={:.4}", mean.x, mean.z);
    }

    /// Record averaged readings taken with the telescope vertical
    pub fn record_vertical(&mut self, samples: &[Vector3<f32>]) {
        let mean = mean_vector(samples);
        self.vertical = Some((mean.x, mean.z));
        debug!("accel cal vertical reading acquired: x1={:.4} z0={:.4}", mean.x, mean.z);
    }

    /// Compute the calibration from the captured rest positions
    ///
    /// Fails with [`Error::Uncalibrated`] if a position is missing, and with
    /// [`Error::DegenerateFit`] if a 1 g reading is unusably small (sensor
    /// not actually at rest in the right orientation).
    pub fn finish(&self) -> Result<AccelCalibration> {
        let (x_zero, z_one) = self.horizontal.ok_or(Error::Uncalibrated)?;
        let (x_one, z_zero) = self.vertical.ok_or(Error::Uncalibrated)?;

        if x_one.abs() < 1e-3 || z_one.abs() < 1e-3 {
            return Err(Error::DegenerateFit);
        }

        Ok(AccelCalibration {
            offset_x: -x_zero,
            offset_z: -z_zero,
            gain_x: FULL_SCALE / x_one,
            gain_z: FULL_SCALE / z_one,
        })
    }
}

/// Estimate how far the mount's rotation axis is off vertical, in degrees
///
/// Input is a batch of normalized-units accelerometer samples taken while
/// the mount rotates in azimuth. With a vertical rotation axis the readings
/// cluster around a single point, so a spread within `6 × rms_noise` of the
/// batch mean reports 0°. Otherwise the samples lie on a circle and the
/// mean angle between each sample direction and the vertical is the tilt,
/// rounded to the nearest degree.
pub fn mount_tilt(samples: &[Vector3<f32>], rms_noise: f32) -> i32 {
    if samples.is_empty() {
        return 0;
    }
    let mean = mean_vector(samples);

    let mut spread = 0.0;
    for s in samples {
        spread += (s - mean).magnitude();
    }
    spread /= samples.len() as f32;

    if spread <= LEVEL_NOISE_MULTIPLE * rms_noise {
        return 0;
    }

    let vertical = Vector3::z();
    let mut theta = 0.0;
    for s in samples {
        let direction = s.safe_normalize();
        theta += direction.dot(&vertical).clamp(-1.0, 1.0).acos();
    }
    theta /= samples.len() as f32;

    (theta * RAD_TO_DEG + 0.5) as i32
}

fn mean_vector(samples: &[Vector3<f32>]) -> Vector3<f32> {
    if samples.is_empty() {
        return Vector3::zeros();
    }
    let mut sum = Vector3::zeros();
    for s in samples {
        sum += s;
    }
    sum / samples.len() as f32
}

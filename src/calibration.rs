//! Application of fitted magnetometer calibration models
//!
//! Pure, stateless transforms over a single raw sample. Corrected data is a
//! fixed point of the pipeline: refitting a corrected sweep produces the
//! identity model (zero center, unit ratio), so applying a fresh calibration
//! on top of an old one cannot compound distortion.

use nalgebra::{Vector2, Vector3};

use crate::ellipse::EllipseModel;
use crate::ellipsoid::EllipsoidModel;

/// Applies planar (2-D) hard/soft-iron correction
///
/// Subtract the ellipse center, rotate the major axis onto x, divide x by
/// the axis ratio, rotate back. The z component is passed through: a flat
/// mount never calibrates it.
///
/// # Example
/// ```
/// use nalgebra::Vector3;
/// use telescope_compass::{EllipseModel, calibrate_planar};
///
/// let model = EllipseModel::from_params(0.1, -0.2, 1.5, 0.3).unwrap();
/// let corrected = calibrate_planar(Vector3::new(0.35, 0.1, 0.4), &model);
/// # let _ = corrected;
/// ```
pub fn calibrate_planar(raw: Vector3<f32>, model: &EllipseModel) -> Vector3<f32> {
    let (center_x, center_y) = model.center();
    let centered = Vector2::new(raw.x - center_x, raw.y - center_y);

    let rotated = model.r * centered;
    let scaled = Vector2::new(rotated.x / model.axis_ratio(), rotated.y);
    let restored = model.ri * scaled;

    Vector3::new(restored.x, restored.y, raw.z)
}

/// Applies spatial (3-D) hard/soft-iron correction
///
/// Subtract the ellipsoid center, multiply by the symmetric correction
/// matrix.
pub fn calibrate_spatial(raw: Vector3<f32>, model: &EllipsoidModel) -> Vector3<f32> {
    model.matrix() * (raw - model.center())
}

/// Magnetometer calibration capability of a compass engine
///
/// Selects the calibration dimensionality instead of duplicating fusion code
/// per hardware combination. `None` applies the identity transform, the
/// deliberate behavior for queries made before any calibration exists, so
/// the pointing loop keeps producing (uncorrected) bearings.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum MagCalibration {
    /// No model yet; readings pass through uncorrected
    #[default]
    None,
    /// Flat-mounted magnetometer, 2-D ellipse model
    Planar(EllipseModel),
    /// Full 3-D ellipsoid model
    Spatial(EllipsoidModel),
}

impl MagCalibration {
    /// Correct one raw magnetometer sample
    pub fn apply(&self, raw: Vector3<f32>) -> Vector3<f32> {
        match self {
            MagCalibration::None => raw,
            MagCalibration::Planar(model) => calibrate_planar(raw, model),
            MagCalibration::Spatial(model) => calibrate_spatial(raw, model),
        }
    }

    /// Whether a fitted model is present
    pub fn is_calibrated(&self) -> bool {
        !matches!(self, MagCalibration::None)
    }
}

//! Mathematical utilities and nalgebra extensions for the compass core

use nalgebra::Vector3;

/// Mathematical constants
pub const DEG_TO_RAD: f32 = core::f32::consts::PI / 180.0;
pub const RAD_TO_DEG: f32 = 180.0 / core::f32::consts::PI;

const TWO_PI: f32 = 2.0 * core::f32::consts::PI;

/// Normalize an angle in radians to the range `[0, 2π)`
///
/// Idempotent: applying it to an already-normalized angle is a no-op.
///
/// # Example
/// ```
/// use telescope_compass::norm_2pi;
///
/// let wrapped = norm_2pi(-core::f32::consts::FRAC_PI_2);
/// assert!((wrapped - 3.0 * core::f32::consts::FRAC_PI_2).abs() < 1e-6);
/// ```
pub fn norm_2pi(angle: f32) -> f32 {
    let wrapped = (TWO_PI + angle % TWO_PI) % TWO_PI;
    // f32 rounding can land the sum exactly on 2π for tiny negative inputs
    if wrapped >= TWO_PI { wrapped - TWO_PI } else { wrapped }
}

/// Extension trait for Vector3 operations
pub trait Vector3Ext {
    /// Calculate the magnitude of the vector
    fn magnitude(&self) -> f32;

    /// Normalize the vector, returning zero vector if magnitude is zero
    fn safe_normalize(&self) -> Vector3<f32>;

    /// Convert degrees to radians
    fn deg_to_rad(&self) -> Vector3<f32>;

    /// Convert radians to degrees
    fn rad_to_deg(&self) -> Vector3<f32>;
}

impl Vector3Ext for Vector3<f32> {
    fn magnitude(&self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    fn safe_normalize(&self) -> Vector3<f32> {
        let mag = self.magnitude();
        if mag > 0.0 {
            *self / mag
        } else {
            Vector3::zeros()
        }
    }

    fn deg_to_rad(&self) -> Vector3<f32> {
        *self * DEG_TO_RAD
    }

    fn rad_to_deg(&self) -> Vector3<f32> {
        *self * RAD_TO_DEG
    }
}

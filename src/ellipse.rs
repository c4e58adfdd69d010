//! Planar (2-D) magnetometer calibration: least-squares ellipse fitting
//!
//! A flat-mounted magnetometer swept through a full rotation traces a circle
//! in the x/y plane; hard iron shifts its center and soft iron deforms it
//! into a rotated ellipse. Fitting that ellipse yields the hard-iron offset
//! (center), the axis ratio and the axis rotation angle, from which every
//! subsequent reading is restored to a circle.
//!
//! The fit solves the general conic `ax² + bxy + cy² + dx + ey + f = 0` in
//! least squares under the ellipse constraint, as the reduced 3×3
//! eigenproblem over the quadratic coefficients. Among the candidate
//! eigenvectors only the one with positive discriminant `4ac − b²`
//! describes a real ellipse; if none does, the sweep was degenerate and the
//! fit fails rather than guessing.

use log::debug;
use nalgebra::{Matrix2, Matrix3, Vector3};

use crate::error::{Error, Result};

/// Relative threshold below which conic denominators count as singular
const SINGULAR_EPS: f64 = 1e-12;

/// Fitted planar calibration model
///
/// Holds the ellipse parameters and the derived rotation matrices used by
/// the calibration applier: `r` rotates by −φ (major axis onto x), `ri`
/// rotates back by +φ. The two are mutually inverse by construction.
///
/// The axis ratio is canonicalized to `sigma >= 1` with `phi` pointing along
/// the major axis, so persisted parameters are comparable across fits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EllipseModel {
    center_x: f32,
    center_y: f32,
    sigma: f32,
    phi: f32,
    pub(crate) r: Matrix2<f32>,
    pub(crate) ri: Matrix2<f32>,
}

impl EllipseModel {
    /// Fit an ellipse to the x/y components of a calibration sweep
    ///
    /// Input is the raw sample set collected while the mount rotates through
    /// a full circle. Fails with [`Error::DegenerateFit`] when the points do
    /// not determine a real ellipse (too few samples, collinear sweep, or
    /// coverage of only a short arc).
    pub fn fit(points: &[Vector3<f32>]) -> Result<Self> {
        if points.len() < 6 {
            return Err(Error::DegenerateFit);
        }
        if collinear(points) {
            return Err(Error::DegenerateFit);
        }

        // Scatter matrices of the quadratic [x², xy, y²] and linear [x, y, 1]
        // monomial vectors; the conic normal equations never need the full
        // N-row design matrices.
        let mut s1 = Matrix3::<f64>::zeros();
        let mut s2 = Matrix3::<f64>::zeros();
        let mut s3 = Matrix3::<f64>::zeros();
        for p in points {
            let x = p.x as f64;
            let y = p.y as f64;
            let q = Vector3::new(x * x, x * y, y * y);
            let l = Vector3::new(x, y, 1.0);
            s1 += q * q.transpose();
            s2 += q * l.transpose();
            s3 += l * l.transpose();
        }

        let s3_inv = s3.try_inverse().ok_or(Error::DegenerateFit)?;

        // Inverse of the fixed ellipse-constraint matrix [[0,0,2],[0,-1,0],[2,0,0]]
        let c1_inv = Matrix3::new(0.0, 0.0, 0.5, 0.0, -1.0, 0.0, 0.5, 0.0, 0.0);

        let reduced = c1_inv * (s1 - s2 * s3_inv * s2.transpose());

        // The ellipse solution is the eigenvector of the reduced system with
        // strictly positive discriminant. The eigenvalues can include a
        // complex pair on bad data; only near-real ones are candidates.
        let eigenvalues = reduced.complex_eigenvalues();
        let mut quadratic = None;
        for eigenvalue in eigenvalues.iter() {
            if eigenvalue.im.abs() > 1e-8 * (1.0 + eigenvalue.re.abs()) {
                continue;
            }
            let Some(v) = real_eigenvector(&reduced, eigenvalue.re) else {
                continue;
            };
            if 4.0 * v.x * v.z - v.y * v.y > SINGULAR_EPS {
                quadratic = Some(v);
                break;
            }
        }
        let v = quadratic.ok_or(Error::DegenerateFit)?;

        let linear = -(s3_inv * s2.transpose() * v);

        let a = v.x;
        let b = v.y / 2.0;
        let c = v.z;
        let d = linear.x / 2.0;
        let e = linear.y / 2.0;
        let f = linear.z;

        let denom = b * b - a * c;
        if denom.abs() < SINGULAR_EPS {
            return Err(Error::DegenerateFit);
        }

        let center_x = (c * d - b * e) / denom;
        let center_y = (a * e - b * d) / denom;

        let (mut sigma, mut phi) = if (a - c).abs() < 1e-9 * (a.abs() + c.abs()) && b.abs() < 1e-9 {
            // already a circle, only the hard-iron offset matters
            (1.0, 0.0)
        } else {
            let num = 2.0 * (a * e * e + c * d * d + f * b * b - 2.0 * b * d * e - a * c * f);
            let spread = (1.0 + 4.0 * b * b / ((a - c) * (a - c))).sqrt();
            let denom_1 = denom * ((c - a) * spread - (c + a));
            let denom_2 = denom * ((a - c) * spread - (c + a));
            let axis_a = 2.0 * (num / denom_1).sqrt();
            let axis_b = 2.0 * (num / denom_2).sqrt();
            if !axis_a.is_finite() || !axis_b.is_finite() || axis_a <= 0.0 || axis_b <= 0.0 {
                return Err(Error::DegenerateFit);
            }
            (axis_a / axis_b, 0.5 * (2.0 * b / (a - c)).atan())
        };

        // major axis onto x by convention
        if sigma < 1.0 {
            sigma = 1.0 / sigma;
            phi += core::f64::consts::FRAC_PI_2;
            if phi > core::f64::consts::FRAC_PI_2 {
                phi -= core::f64::consts::PI;
            }
        }

        let model = Self::from_params(center_x as f32, center_y as f32, sigma as f32, phi as f32)?;
        debug!(
            "ellipse fit: center=({:.4}, {:.4}) sigma={:.4} phi={:.4} rad over {} samples",
            model.center_x,
            model.center_y,
            model.sigma,
            model.phi,
            points.len()
        );
        Ok(model)
    }

    /// Rebuild a model from persisted parameters without refitting
    ///
    /// The inverse of [`params`](EllipseModel::params). Fails on a
    /// non-positive axis ratio.
    pub fn from_params(center_x: f32, center_y: f32, sigma: f32, phi: f32) -> Result<Self> {
        if !(sigma > 0.0) || !sigma.is_finite() || !phi.is_finite() {
            return Err(Error::DegenerateFit);
        }
        let (sin, cos) = phi.sin_cos();
        let (msin, mcos) = (-phi).sin_cos();
        Ok(Self {
            center_x,
            center_y,
            sigma,
            phi,
            r: Matrix2::new(cos, sin, -sin, cos),
            ri: Matrix2::new(mcos, msin, -msin, mcos),
        })
    }

    /// Flat parameter tuple `(center_x, center_y, sigma, phi)` for a host to
    /// display or persist
    pub fn params(&self) -> (f32, f32, f32, f32) {
        (self.center_x, self.center_y, self.sigma, self.phi)
    }

    /// Hard-iron offset (ellipse center)
    pub fn center(&self) -> (f32, f32) {
        (self.center_x, self.center_y)
    }

    /// Ratio between major and minor axes (>= 1)
    pub fn axis_ratio(&self) -> f32 {
        self.sigma
    }

    /// Rotation of the major axis from the x axis, radians
    pub fn rotation(&self) -> f32 {
        self.phi
    }
}

/// Whether the x/y point scatter is numerically rank 1
///
/// A sweep that never turned traces a line; the constrained conic fit would
/// still hand back a pencil-thin "ellipse" through the rounding noise, so
/// the condition is checked on the point covariance instead.
fn collinear(points: &[Vector3<f32>]) -> bool {
    let n = points.len() as f64;
    let mut mean_x = 0.0;
    let mut mean_y = 0.0;
    for p in points {
        mean_x += p.x as f64;
        mean_y += p.y as f64;
    }
    mean_x /= n;
    mean_y /= n;

    let (mut cxx, mut cxy, mut cyy) = (0.0f64, 0.0, 0.0);
    for p in points {
        let dx = p.x as f64 - mean_x;
        let dy = p.y as f64 - mean_y;
        cxx += dx * dx;
        cxy += dx * dy;
        cyy += dy * dy;
    }

    let trace = cxx + cyy;
    if trace <= 0.0 {
        return true; // all points identical
    }
    let det = cxx * cyy - cxy * cxy;
    let smallest = (trace - (trace * trace - 4.0 * det).max(0.0).sqrt()) / 2.0;
    smallest <= 1e-9 * trace
}

/// Null-space vector of `m − λI` for a (near-)real eigenvalue λ
///
/// For a rank-2 3×3 matrix the null space is spanned by the cross product of
/// any two independent rows; the largest of the three row crosses is the
/// numerically safest choice.
fn real_eigenvector(m: &Matrix3<f64>, lambda: f64) -> Option<Vector3<f64>> {
    let shifted = m - Matrix3::identity() * lambda;
    let r0 = Vector3::new(shifted[(0, 0)], shifted[(0, 1)], shifted[(0, 2)]);
    let r1 = Vector3::new(shifted[(1, 0)], shifted[(1, 1)], shifted[(1, 2)]);
    let r2 = Vector3::new(shifted[(2, 0)], shifted[(2, 1)], shifted[(2, 2)]);

    let mut best = r0.cross(&r1);
    for candidate in [r0.cross(&r2), r1.cross(&r2)] {
        if candidate.norm_squared() > best.norm_squared() {
            best = candidate;
        }
    }

    let norm = best.norm();
    if norm <= SINGULAR_EPS * (1.0 + shifted.norm()) {
        return None;
    }
    Some(best / norm)
}

//! Spatial (3-D) magnetometer calibration: least-squares ellipsoid fitting
//!
//! A magnetometer swept through all pointing directions traces a sphere;
//! hard iron offsets its center, soft iron deforms it into a rotated
//! triaxial ellipsoid. The fit recovers the center and a symmetric
//! correction matrix that maps the ellipsoid back onto a sphere.
//!
//! Eigen-solvers return eigenpairs in an implementation-defined order, which
//! silently permutes which physical axis receives which scale factor. An
//! uncorrected permutation can stretch the longest axis and shrink the
//! shortest, making the ellipsoid *more* oblate instead of spherical, the
//! classic failure mode of naive eigen-based ellipsoid fits. The
//! [`reorder_eigenpairs`] pass pins each eigenvector to its axis (largest
//! component onto the diagonal, then the remaining 2×2, then sign flips to a
//! positive diagonal) before any radius is computed. The criterion follows
//! ST design tip DT0059; it assumes the rotation is diagonally dominant,
//! which can leave a residual for near-degenerate (two similar radii)
//! ellipsoids.

use log::debug;
use nalgebra::{Cholesky, Matrix3, Matrix4, SMatrix, SVector, SymmetricEigen, Vector3};

use crate::error::{Error, Result};

/// Eigenvalues below this count as a collapsed axis
const COLLAPSED_EPS: f64 = 1e-12;

/// Fitted spatial calibration model
///
/// `matrix` is symmetric; applying `matrix * (raw - center)` maps raw
/// readings onto a sphere with radius equal to the geometric mean of the
/// fitted ellipsoid radii. Immutable once produced; recalibration builds a
/// new model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EllipsoidModel {
    matrix: Matrix3<f32>,
    center: Vector3<f32>,
}

impl EllipsoidModel {
    /// Fit an ellipsoid to a full 3-D calibration sweep
    ///
    /// The sweep must exercise both the rotation axis and the tilt axis so
    /// the samples cover the ellipsoid surface; a thin band of coverage
    /// fails with [`Error::DegenerateFit`].
    pub fn fit(points: &[Vector3<f32>]) -> Result<Self> {
        if points.len() < 9 {
            return Err(Error::DegenerateFit);
        }

        // Normal equations of the constrained quadric, accumulated per point
        // from the monomial row
        // (x²+y²−2z², x²+z²−2y², 2xy, 2xz, 2yz, 2x, 2y, 2z, 1)
        // against the squared radius.
        let mut normal = SMatrix::<f64, 9, 9>::zeros();
        let mut rhs = SVector::<f64, 9>::zeros();
        for p in points {
            let x = p.x as f64;
            let y = p.y as f64;
            let z = p.z as f64;
            let (xx, yy, zz) = (x * x, y * y, z * z);
            let row = SVector::<f64, 9>::from_column_slice(&[
                xx + yy - 2.0 * zz,
                xx + zz - 2.0 * yy,
                2.0 * x * y,
                2.0 * x * z,
                2.0 * y * z,
                2.0 * x,
                2.0 * y,
                2.0 * z,
                1.0,
            ]);
            normal += row * row.transpose();
            rhs += row * (xx + yy + zz);
        }

        let u = Cholesky::new(normal)
            .ok_or(Error::DegenerateFit)?
            .solve(&rhs);

        // Unconstrained quadric coefficients and the homogeneous 4×4 form
        let a = u[0] + u[1] - 1.0;
        let b = u[0] - 2.0 * u[1] - 1.0;
        let c = u[1] - 2.0 * u[0] - 1.0;
        let v = [a, b, c, u[2], u[3], u[4], u[5], u[6], u[7], u[8]];

        #[rustfmt::skip]
        let quadric = Matrix4::new(
            v[0], v[3], v[4], v[6],
            v[3], v[1], v[5], v[7],
            v[4], v[5], v[2], v[8],
            v[6], v[7], v[8], v[9],
        );

        let block: Matrix3<f64> = quadric.fixed_view::<3, 3>(0, 0).into_owned();
        let linear = Vector3::new(v[6], v[7], v[8]);
        let center = (-block).lu().solve(&linear).ok_or(Error::DegenerateFit)?;

        let mut translation = Matrix4::identity();
        translation[(3, 0)] = center.x;
        translation[(3, 1)] = center.y;
        translation[(3, 2)] = center.z;
        let translated = translation * quadric * translation.transpose();

        let scale = translated[(3, 3)];
        if scale.abs() < COLLAPSED_EPS {
            return Err(Error::DegenerateFit);
        }
        let centered_block: Matrix3<f64> =
            translated.fixed_view::<3, 3>(0, 0).into_owned() / -scale;

        let eigen = SymmetricEigen::new(centered_block);
        let mut values = eigen.eigenvalues;
        let mut vectors = eigen.eigenvectors;
        reorder_eigenpairs(&mut values, &mut vectors);

        let mut radii = Vector3::zeros();
        for i in 0..3 {
            if values[i].abs() < COLLAPSED_EPS {
                return Err(Error::DegenerateFit);
            }
            radii[i] = (1.0 / values[i].abs()).sqrt() * values[i].signum();
        }

        let mean_radius = (radii.x * radii.y * radii.z).cbrt();
        let gains = Matrix3::from_diagonal(&Vector3::new(
            mean_radius / radii.x,
            mean_radius / radii.y,
            mean_radius / radii.z,
        ));
        let correction = vectors * gains * vectors.transpose();

        debug!(
            "ellipsoid fit: center=({:.4}, {:.4}, {:.4}) radii=({:.4}, {:.4}, {:.4}) over {} samples",
            center.x,
            center.y,
            center.z,
            radii.x,
            radii.y,
            radii.z,
            points.len()
        );

        Ok(Self {
            matrix: correction.map(|x| x as f32),
            center: center.map(|x| x as f32),
        })
    }

    /// Rebuild a model from persisted parameters without refitting
    ///
    /// The inverse of [`params`](EllipsoidModel::params); `matrix` is
    /// row-major.
    pub fn from_params(matrix: [f32; 9], center: [f32; 3]) -> Self {
        Self {
            matrix: Matrix3::from_row_slice(&matrix),
            center: Vector3::from_column_slice(&center),
        }
    }

    /// Flat parameters (row-major matrix, center) for display or storage
    pub fn params(&self) -> ([f32; 9], [f32; 3]) {
        let mut matrix = [0.0f32; 9];
        for r in 0..3 {
            for c in 0..3 {
                matrix[r * 3 + c] = self.matrix[(r, c)];
            }
        }
        (matrix, [self.center.x, self.center.y, self.center.z])
    }

    /// Symmetric soft-iron correction matrix
    pub fn matrix(&self) -> Matrix3<f32> {
        self.matrix
    }

    /// Hard-iron offset (ellipsoid center)
    pub fn center(&self) -> Vector3<f32> {
        self.center
    }
}

/// Pin eigenpairs to their physical axes
///
/// Moves the largest-magnitude eigenvector component onto the diagonal by
/// column swaps (eigenvalues follow their columns), repeats on the remaining
/// 2×2 submatrix, then flips column signs so every diagonal entry is
/// positive. Must run before the per-axis radii are taken.
fn reorder_eigenpairs(values: &mut Vector3<f64>, vectors: &mut Matrix3<f64>) {
    let mut largest = 0.0;
    let (mut row, mut col) = (0, 0);
    for r in 0..3 {
        for c in 0..3 {
            if vectors[(r, c)].abs() > largest {
                largest = vectors[(r, c)].abs();
                row = r;
                col = c;
            }
        }
    }
    if row != col {
        vectors.swap_columns(row, col);
        values.swap_rows(row, col);
    }

    let rest: [usize; 2] = match row {
        0 => [1, 2],
        1 => [0, 2],
        _ => [0, 1],
    };
    largest = 0.0;
    let (mut row2, mut col2) = (rest[0], rest[0]);
    for &r in &rest {
        for &c in &rest {
            if vectors[(r, c)].abs() > largest {
                largest = vectors[(r, c)].abs();
                row2 = r;
                col2 = c;
            }
        }
    }
    if row2 != col2 {
        vectors.swap_columns(row2, col2);
        values.swap_rows(row2, col2);
    }

    for i in 0..3 {
        if vectors[(i, i)] < 0.0 {
            for r in 0..3 {
                vectors[(r, i)] = -vectors[(r, i)];
            }
        }
    }
}

//! Error types for calibration fitting and compass computation

use core::fmt;

/// Result type for calibration and compass operations
pub type Result<T> = core::result::Result<T, Error>;

/// Errors reported by the calibration fitters and the compass engine
///
/// Fit-stage errors are terminal for the calibration run in progress and
/// should be surfaced to the operator: they indicate a procedural problem
/// (usually an insufficient sweep) that a retry of the same data cannot fix.
/// Per-sample errors are tolerated by callers; the engine state is left
/// untouched so the pointing loop continues from the last good reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// An ellipse/ellipsoid fit could not be disambiguated or solved
    ///
    /// Raised when the conic discriminant, a scatter-matrix determinant or
    /// an eigenvalue is too close to zero, i.e. the sample sweep did not
    /// cover enough of the rotation range to pin down the model.
    DegenerateFit,
    /// A single reading produced an undefined angle
    ///
    /// Typically a NaN from the trig stage, or gravity and magnetic vectors
    /// that are parallel so no horizontal reference exists. The reading is
    /// discarded before it can reach the smoothing estimators.
    InvalidReading,
    /// A computation was requested before the required calibration exists
    Uncalibrated,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::DegenerateFit => {
                write!(f, "degenerate calibration fit (insufficient sweep coverage)")
            }
            Error::InvalidReading => write!(f, "invalid sensor reading (undefined angle)"),
            Error::Uncalibrated => write!(f, "calibration parameters not available"),
        }
    }
}

impl core::error::Error for Error {}

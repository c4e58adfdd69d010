#![no_std]

//! Telescope Compass - calibrated, tilt-compensated pointing from raw
//! magnetometer and accelerometer vectors
//!
//! This library turns noisy 3-axis magnetometer (gauss) and accelerometer
//! (g) samples from a rotating, tilting sensor head into an azimuth and
//! altitude suitable for driving an alt-azimuth telescope mount. It owns the
//! numerically delicate middle of such a system:
//!
//! - hard/soft-iron magnetometer calibration, as a 2-D ellipse fit for flat
//!   mounts or a full 3-D ellipsoid fit with eigenpair reordering
//! - the per-sample calibration transforms
//! - tilt-compensated azimuth/altitude by the vector-cross-product method,
//!   with a 2-D fallback when no gravity reference exists
//! - single-variable recursive smoothing of angles and raw axes
//! - an altitude-indexed deviation map compensating the azimuth shift from a
//!   magnetically interfering optical tube
//!
//! Hardware buses, pin handling, command parsing and persistence framing
//! belong to the host: the library consumes body-frame vectors and produces
//! angles plus flat calibration parameter tuples.
//!
//! # Quick Start
//!
//! ```rust
//! use nalgebra::Vector3;
//! use telescope_compass::{Compass, EllipsoidModel, MagCalibration, SampleSet};
//!
//! let mut compass = Compass::new();
//!
//! // Raw body-frame sensor readings
//! let magnetometer = Vector3::new(0.21, -0.05, 0.43); // gauss
//! let accelerometer = Vector3::new(0.02, 0.01, 0.99); // g
//!
//! let reading = compass.update(magnetometer, accelerometer).unwrap();
//! assert!((0.0..360.0).contains(&reading.azimuth));
//!
//! // A calibration sweep collects samples, fits once when full:
//! let mut sweep = SampleSet::new(500);
//! // ... sweep.push(sample) per sensor reading until it returns 0 ...
//! # let _ = &mut sweep;
//! if sweep.is_full() {
//!     let model = EllipsoidModel::fit(sweep.as_slice()).unwrap();
//!     compass.set_mag_calibration(MagCalibration::Spatial(model));
//! }
//! ```
//!
//! The crate is `#![no_std]` (with `alloc`) and single threaded: one
//! calibration run and one reading stream at a time, no interior mutability.

extern crate alloc;

mod accel;
mod calibration;
mod compass;
mod compensation;
mod ellipse;
mod ellipsoid;
mod error;
mod estimator;
mod math;
mod sampling;
mod types;

// Re-export all public types and functions
pub use accel::{AccelCalibration, AccelCalibrator, mount_tilt};
pub use calibration::{MagCalibration, calibrate_planar, calibrate_spatial};
pub use compass::Compass;
pub use compensation::{COMP_SAMPLES, DeviationMap, make_hash};
pub use ellipse::EllipseModel;
pub use ellipsoid::EllipsoidModel;
pub use error::{Error, Result};
pub use estimator::{ScalarEstimator, VectorSmoother};
pub use math::{DEG_TO_RAD, RAD_TO_DEG, Vector3Ext, norm_2pi};
pub use sampling::SampleSet;
pub use types::{CompassSettings, EstimatorSettings, Reading};

//! Complete synthetic calibration session: magnetometer sweep, ellipsoid
//! fit, accelerometer two-point calibration, deviation-map build, and a few
//! compensated readings. Swap the synthetic generators for real sensor
//! reads to turn this into a host-side calibration tool.

use nalgebra::{Matrix3, Vector3};
use std::f32::consts::PI;
use telescope_compass::{
    AccelCalibrator, Compass, EllipsoidModel, MagCalibration, SampleSet, mount_tilt,
};

/// Synthetic soft/hard iron of the simulated sensor head
fn distorted_field(direction: Vector3<f32>) -> Vector3<f32> {
    let soft_iron = Matrix3::new(1.1, 0.05, 0.0, 0.05, 0.9, 0.02, 0.0, 0.02, 1.05);
    let hard_iron = Vector3::new(0.12, -0.06, 0.03);
    soft_iron * (direction * 0.45) + hard_iron
}

fn main() {
    env_logger::init();

    let mut compass = Compass::new();

    // --- magnetometer sweep: rotate fully while exercising the tilt axis ---
    let mut sweep = SampleSet::new(1000);
    'collect: for i in 1..25 {
        let theta = i as f32 / 25.0 * PI;
        for j in 0..50 {
            let lambda = j as f32 / 50.0 * 2.0 * PI;
            let direction = Vector3::new(
                theta.sin() * lambda.cos(),
                theta.sin() * lambda.sin(),
                theta.cos(),
            );
            let remaining = sweep.push(distorted_field(direction));
            if remaining <= 1 {
                break 'collect;
            }
        }
    }
    println!("collected {} magnetometer samples", sweep.len());

    let model = EllipsoidModel::fit(sweep.as_slice()).expect("sweep covered too little");
    let (matrix, center) = model.params();
    println!("ellipsoid center: {:?}", center);
    println!("correction matrix: {:?}", matrix);
    compass.set_mag_calibration(MagCalibration::Spatial(model));

    // --- accelerometer two-point calibration ---
    let mut calibrator = AccelCalibrator::new();
    calibrator.record_horizontal(&[Vector3::new(0.02, 0.0, 0.98); 5]);
    calibrator.record_vertical(&[Vector3::new(1.03, 0.0, -0.01); 5]);
    let accel_calibration = calibrator.finish().expect("rest readings unusable");
    println!("accel calibration: {:?}", accel_calibration.params());
    compass.set_accel_calibration(accel_calibration);
    compass.reset_filters();

    // --- levelness check while rotating in azimuth ---
    let level_batch: Vec<_> = (0..72)
        .map(|i| {
            let az = i as f32 * 5.0f32.to_radians();
            Vector3::new(0.002 * az.cos(), 0.002 * az.sin(), 1.0)
        })
        .collect();
    println!("mount tilt: {}°", mount_tilt(&level_batch, 0.01));

    // --- deviation sweep: zenith to horizontal at a fixed 180° bearing ---
    let mut altitude = 90.0;
    while !compass.compensation().is_ready() {
        let measured = 180.0 - 0.01 * (90.0 - altitude); // simulated tube interference
        compass.add_compensation_sample(180.0, altitude, measured);
        altitude -= 0.5;
    }
    println!("deviation map ready");

    // --- normal operation ---
    for heading_deg in [30.0f32, 110.0, 250.0] {
        let heading = heading_deg.to_radians();
        let direction = Vector3::new(0.44 * heading.cos(), -0.44 * heading.sin(), 0.9);
        let magnetometer = distorted_field(direction.normalize());
        let accelerometer = Vector3::new(0.26, 0.0, 0.97);

        let mut reading = None;
        for _ in 0..40 {
            reading = compass.update(magnetometer, accelerometer).ok();
        }
        if let Some(reading) = reading {
            let compensated = compass.compensate(reading);
            println!(
                "heading {:.0}°: azimuth {:.2}° (compensated {:.2}°), altitude {:.2}°",
                heading_deg, reading.azimuth, compensated.azimuth, reading.altitude
            );
        }
    }
}

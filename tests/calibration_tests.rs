use nalgebra::{Matrix3, Rotation3, Vector3};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use telescope_compass::{
    AccelCalibrator, EllipseModel, EllipsoidModel, Error, SampleSet, calibrate_planar,
    calibrate_spatial,
};

const PI: f32 = core::f32::consts::PI;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Points on an ellipse with the given center, semi-axes and rotation
fn ellipse_sweep(
    center: (f32, f32),
    major: f32,
    minor: f32,
    phi: f32,
    count: usize,
) -> Vec<Vector3<f32>> {
    let (sin, cos) = phi.sin_cos();
    (0..count)
        .map(|i| {
            let t = i as f32 / count as f32 * 2.0 * PI;
            let u = major * t.cos();
            let v = minor * t.sin();
            Vector3::new(
                center.0 + u * cos - v * sin,
                center.1 + u * sin + v * cos,
                0.0,
            )
        })
        .collect()
}

/// Points on a rotated, offset triaxial ellipsoid
fn ellipsoid_sweep(
    radii: Vector3<f32>,
    rotation: Rotation3<f32>,
    center: Vector3<f32>,
    steps: usize,
) -> Vec<Vector3<f32>> {
    let mut points = Vec::new();
    for i in 1..steps {
        let theta = i as f32 / steps as f32 * PI;
        for j in 0..(2 * steps) {
            let lambda = j as f32 / (2 * steps) as f32 * 2.0 * PI;
            let p = Vector3::new(
                radii.x * theta.sin() * lambda.cos(),
                radii.y * theta.sin() * lambda.sin(),
                radii.z * theta.cos(),
            );
            points.push(rotation * p + center);
        }
    }
    points
}

/// Smallest and largest corrected radius over a point set
fn corrected_radius_spread(model: &EllipsoidModel, points: &[Vector3<f32>]) -> (f32, f32) {
    let mut min = f32::MAX;
    let mut max = f32::MIN;
    for &p in points {
        let radius = calibrate_spatial(p, model).norm();
        min = min.min(radius);
        max = max.max(radius);
    }
    (min, max)
}

#[test]
fn test_ellipse_recovers_known_parameters() {
    init_logging();
    let phi = 20.0f32.to_radians();
    let sweep = ellipse_sweep((5.0, -3.0), 1.7, 1.0, phi, 720);

    let model = EllipseModel::fit(&sweep).expect("fit failed on a clean ellipse");
    let (center_x, center_y, sigma, fitted_phi) = model.params();

    assert!((center_x - 5.0).abs() < 0.05, "center_x = {}", center_x);
    assert!((center_y + 3.0).abs() < 0.05, "center_y = {}", center_y);
    assert!(
        (sigma - 1.7).abs() / 1.7 < 0.01,
        "axis ratio = {}, expected 1.7",
        sigma
    );
    assert!(
        (fitted_phi - phi).abs() < 0.01,
        "phi = {}, expected {}",
        fitted_phi,
        phi
    );
}

#[test]
fn test_ellipse_fit_apply_round_trip() {
    // minor semi-axis 1: calibrated points land on the origin-centered unit circle
    let sweep = ellipse_sweep((5.0, -3.0), 1.7, 1.0, 20.0f32.to_radians(), 720);
    let model = EllipseModel::fit(&sweep).unwrap();

    for &p in &sweep {
        let corrected = calibrate_planar(p, &model);
        let radius = (corrected.x * corrected.x + corrected.y * corrected.y).sqrt();
        assert!(
            (radius - 1.0).abs() < 0.01,
            "point {:?} corrected to radius {}",
            p,
            radius
        );
    }
}

#[test]
fn test_refitting_corrected_sweep_gives_identity() {
    let sweep = ellipse_sweep((2.0, 1.5), 1.4, 1.0, -0.6, 720);
    let model = EllipseModel::fit(&sweep).unwrap();

    let corrected: Vec<_> = sweep.iter().map(|&p| calibrate_planar(p, &model)).collect();
    let refit = EllipseModel::fit(&corrected).unwrap();

    let (center_x, center_y, sigma, _) = refit.params();
    assert!(center_x.abs() < 0.01, "residual center_x = {}", center_x);
    assert!(center_y.abs() < 0.01, "residual center_y = {}", center_y);
    assert!((sigma - 1.0).abs() < 0.01, "residual axis ratio = {}", sigma);
}

#[test]
fn test_ellipse_requires_angular_coverage() {
    // a collinear sweep (mount never rotated) must be rejected outright
    let line: Vec<_> = (0..500)
        .map(|i| Vector3::new(i as f32 * 0.01, 2.0 + i as f32 * 0.005, 0.0))
        .collect();
    assert_eq!(EllipseModel::fit(&line), Err(Error::DegenerateFit));
}

#[test]
fn test_ellipsoid_corrects_all_random_rotations() {
    init_logging();
    // the same 1.0 : 1.2 : 0.8 ellipsoid under many orientations: the fit
    // must sphere every one of them, whatever eigenpair order the solver
    // happens to return
    let radii = Vector3::new(1.0, 1.2, 0.8);
    let center = Vector3::new(0.15, -0.08, 0.3);
    let mut rng = Pcg64::seed_from_u64(0x5eed);

    for trial in 0..25 {
        let rotation = Rotation3::from_euler_angles(
            rng.random_range(-PI..PI),
            rng.random_range(-PI..PI),
            rng.random_range(-PI..PI),
        );
        let sweep = ellipsoid_sweep(radii, rotation, center, 26);
        let model = EllipsoidModel::fit(&sweep).expect("fit failed");

        assert!(
            (model.center() - center).norm() < 0.01,
            "trial {}: center {:?}",
            trial,
            model.center()
        );

        let (min, max) = corrected_radius_spread(&model, &sweep);
        assert!(
            (max - min) / min < 0.01,
            "trial {}: corrected radii spread {}..{}",
            trial,
            min,
            max
        );
    }
}

#[test]
fn test_ellipsoid_matrix_is_symmetric() {
    let rotation = Rotation3::from_euler_angles(0.4, -0.7, 1.1);
    let sweep = ellipsoid_sweep(Vector3::new(1.0, 1.3, 0.7), rotation, Vector3::zeros(), 24);
    let model = EllipsoidModel::fit(&sweep).unwrap();

    let matrix = model.matrix();
    assert!(
        (matrix - matrix.transpose()).norm() < 1e-4,
        "correction matrix not symmetric: {:?}",
        matrix
    );
}

#[test]
fn test_ellipsoid_near_spherical_input() {
    // two radii nearly equal: the reordering heuristic's weak spot; the
    // correction must still not make things worse than the input spread
    let radii = Vector3::new(1.0, 1.02, 0.98);
    let mut rng = Pcg64::seed_from_u64(7);

    for _ in 0..10 {
        let rotation = Rotation3::from_euler_angles(
            rng.random_range(-PI..PI),
            rng.random_range(-PI..PI),
            rng.random_range(-PI..PI),
        );
        let sweep = ellipsoid_sweep(radii, rotation, Vector3::zeros(), 24);
        let model = EllipsoidModel::fit(&sweep).unwrap();

        let (min, max) = corrected_radius_spread(&model, &sweep);
        assert!(
            (max - min) / min < 0.02,
            "near-spherical correction widened the spread: {}..{}",
            min,
            max
        );
    }
}

#[test]
fn test_ellipsoid_near_oblate_input() {
    let radii = Vector3::new(1.0, 1.2, 1.19);
    let rotation = Rotation3::from_euler_angles(0.9, 0.3, -1.4);
    let sweep = ellipsoid_sweep(radii, rotation, Vector3::new(0.05, 0.0, -0.1), 24);
    let model = EllipsoidModel::fit(&sweep).unwrap();

    let (min, max) = corrected_radius_spread(&model, &sweep);
    assert!(
        (max - min) / min < 0.02,
        "near-oblate correction widened the spread: {}..{}",
        min,
        max
    );
}

#[test]
fn test_ellipsoid_thin_band_is_degenerate() {
    // azimuth-only sweep with the tilt axis never exercised: a flat ring
    let sweep: Vec<_> = (0..1000)
        .map(|i| {
            let t = i as f32 / 1000.0 * 2.0 * PI;
            Vector3::new(t.cos(), 1.2 * t.sin(), 0.0)
        })
        .collect();
    assert_eq!(EllipsoidModel::fit(&sweep), Err(Error::DegenerateFit));
}

#[test]
fn test_sample_set_drives_an_ellipse_fit() {
    // countdown collection into a fit, the way a host drives calibration
    let sweep = ellipse_sweep((0.5, 0.5), 1.3, 1.0, 0.2, 500);
    let mut samples = SampleSet::new(500);

    let mut remaining = usize::MAX;
    for &p in &sweep {
        remaining = samples.push(p);
    }
    assert_eq!(remaining, 1);
    assert!(samples.is_full());
    assert_eq!(samples.push(Vector3::zeros()), 0);

    let model = EllipseModel::fit(samples.as_slice()).unwrap();
    let (center_x, center_y, sigma, _) = model.params();
    assert!((center_x - 0.5).abs() < 0.02);
    assert!((center_y - 0.5).abs() < 0.02);
    assert!((sigma - 1.3).abs() < 0.02);

    // abandoned-and-restarted run reuses the buffer
    samples.clear();
    assert_eq!(samples.push(Vector3::zeros()), 500);
}

#[test]
fn test_accel_two_point_procedure_with_noisy_batches() {
    let mut rng = Pcg64::seed_from_u64(99);
    let noise = |rng: &mut Pcg64| -> f32 { rng.random_range(-0.004..0.004) };

    // true sensor: gain error 4% on x, -2% on z, offsets 0.03 / -0.01
    let horizontal: Vec<_> = (0..25)
        .map(|_| {
            Vector3::new(
                0.03 + noise(&mut rng),
                0.0,
                0.98 + noise(&mut rng),
            )
        })
        .collect();
    let vertical: Vec<_> = (0..25)
        .map(|_| {
            Vector3::new(
                1.04 + noise(&mut rng),
                0.0,
                -0.01 + noise(&mut rng),
            )
        })
        .collect();

    let mut calibrator = AccelCalibrator::new();
    calibrator.record_horizontal(&horizontal);
    calibrator.record_vertical(&vertical);
    let calibration = calibrator.finish().unwrap();

    // the 1 g rest positions calibrate close to 1 g
    let at_vertical = calibration.apply(Vector3::new(1.04, 0.0, -0.01));
    assert!((at_vertical.x - 1.0).abs() < 0.05, "x at 1 g: {}", at_vertical.x);

    let at_horizontal = calibration.apply(Vector3::new(0.03, 0.0, 0.98));
    assert!((at_horizontal.z - 1.0).abs() < 0.05, "z at 1 g: {}", at_horizontal.z);
    // and the 0 g axes near zero
    assert!(at_horizontal.x.abs() < 0.02, "x at 0 g: {}", at_horizontal.x);
}

#[test]
fn test_spatial_calibration_on_distorted_field() {
    // synthetic soft-iron distortion applied to a clean field sweep, then
    // removed again by the fitted model
    let distortion = Matrix3::new(1.1, 0.05, 0.0, 0.05, 0.9, 0.02, 0.0, 0.02, 1.05);
    let hard_iron = Vector3::new(0.2, -0.1, 0.05);

    let mut sweep = Vec::new();
    for i in 1..24 {
        let theta = i as f32 / 24.0 * PI;
        for j in 0..48 {
            let lambda = j as f32 / 48.0 * 2.0 * PI;
            let clean = Vector3::new(
                0.45 * theta.sin() * lambda.cos(),
                0.45 * theta.sin() * lambda.sin(),
                0.45 * theta.cos(),
            );
            sweep.push(distortion * clean + hard_iron);
        }
    }

    let model = EllipsoidModel::fit(&sweep).unwrap();
    let (min, max) = corrected_radius_spread(&model, &sweep);
    assert!(
        (max - min) / min < 0.01,
        "distorted field not restored to a sphere: {}..{}",
        min,
        max
    );
}

use nalgebra::Vector3;
use telescope_compass::Compass;

fn main() {
    let mut compass = Compass::new();

    for _ in 0..10 {
        // this loop should repeat each time new sensor data is available
        let magnetometer = Vector3::new(0.21, -0.05, 0.41); // replace with actual magnetometer data in gauss
        let accelerometer = Vector3::new(0.1, 0.0, 0.99); // replace with actual accelerometer data in g

        match compass.update(magnetometer, accelerometer) {
            Ok(reading) => println!(
                "Azimuth: {:.2}°, Altitude: {:.2}°",
                reading.azimuth, reading.altitude
            ),
            Err(error) => println!("Reading skipped: {}", error),
        }
    }
}

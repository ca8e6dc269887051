//! Query the phone-side orientation server once and print the derived angles.
//!
//! Usage: cargo run --example orientation
//! Set DEPTHPLANE_ORIENTATION_ADDR to reach a server other than 127.0.0.1:8080.

use depthplane::orientation::{rotation_angle, rotation_axis, x_angle, y_angle};
use depthplane::{OrientationClient, OrientationConfig};

fn main() {
    env_logger::init();

    let client = OrientationClient::new(OrientationConfig::from_env());

    let n = match client.orientation() {
        Ok(n) => n,
        Err(e) => {
            eprintln!("Orientation query to {} failed: {}", client.config().addr, e);
            std::process::exit(1);
        }
    };

    if n.is_zero() {
        println!("Orientation: no reading yet");
    } else {
        println!("Orientation:    [{:+.4}, {:+.4}, {:+.4}]", n.x, n.y, n.z);
    }
    let axis = rotation_axis(n);
    println!("Rotation axis:  [{:+.4}, {:+.4}, {:+.4}]", axis.x, axis.y, axis.z);
    println!("Rotation angle: {:.2} deg", rotation_angle(n).to_degrees());
    println!("X angle:        {:.2} deg", x_angle(n).to_degrees());
    println!("Y angle:        {:.2} deg", y_angle(n).to_degrees());

    match client.location() {
        Ok(loc) if loc.is_empty() => println!("Location:       unavailable"),
        Ok(loc) => println!("Location:       {}", loc),
        Err(e) => eprintln!("Location query failed: {}", e),
    }
}

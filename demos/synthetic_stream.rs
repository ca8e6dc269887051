//! Feed a synthetic depth camera into a sensor session and print the
//! detected floor plane.
//!
//! The scene is a floor 1.2 m below the camera that slowly rocks from side
//! to side, a back wall at 3.9 m, and 1% of pixels replaced by noise.
//!
//! Usage: cargo run --example synthetic_stream
//! Press Ctrl+C to stop.

use depthplane::{
    ColorFrame, DepthFrame, ImageSize, Overlay, OverlayProjector, PinholeMapper, PipelineConfig,
    RawFrame, SensorSession, Vec3,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::{Duration, Instant};

const SIZE: ImageSize = ImageSize::new(320, 240);
const CAMERA_HEIGHT: f64 = 1.2;
const WALL_DEPTH: f64 = 3.9;

fn main() {
    env_logger::init();

    let mapper = PinholeMapper {
        fx: 297.1,
        fy: 295.5,
        cx: 160.0,
        cy: 120.0,
        color_scale: 1.0,
    };
    let config = PipelineConfig::from_env();
    println!("RANSAC:  {:?}", config.ransac);
    println!("Stride:  {}", config.pixel_stride);
    println!("Streams: {:?}", config.streams);
    println!();

    let pipeline = depthplane::FramePipeline::new(config, Arc::new(mapper));
    let session = match SensorSession::start(pipeline) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to start session: {}", e);
            std::process::exit(1);
        }
    };
    let sink = session.sink();
    let stream = session.subscribe(4);

    // Producer: a 30 Hz "sensor" on its own thread, like a driver callback.
    let _producer = std::thread::Builder::new()
        .name("synthetic-sensor".into())
        .spawn(move || {
            let mut rng = StdRng::seed_from_u64(1);
            let start = Instant::now();
            let mut submitted = 0u64;
            let mut dropped = 0u64;
            for frame_number in 0.. {
                let roll = (start.elapsed().as_secs_f64() * 0.5).sin() * 0.2;
                let frame = synthetic_frame(frame_number, &mapper, roll, &mut rng);
                if sink.submit(frame) {
                    submitted += 1;
                } else {
                    dropped += 1;
                }
                if frame_number % 90 == 89 {
                    println!("--- sensor: {} submitted, {} dropped ---", submitted, dropped);
                }
                std::thread::sleep(Duration::from_millis(33));
            }
        })
        .expect("Failed to spawn sensor thread");

    let overlay = Overlay::new(ImageSize::new(64, 64), vec![0xFF30_C0F0; 64 * 64])
        .expect("overlay size");
    let projector = OverlayProjector::new(SIZE);

    println!("Streaming snapshots (Ctrl+C to stop)...");
    loop {
        let snapshot = match stream.recv_timeout(Duration::from_secs(2)) {
            Ok(s) => s,
            Err(depthplane::DepthPlaneError::Timeout) => {
                eprintln!("Timeout waiting for snapshots");
                continue;
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                break;
            }
        };

        let Some(plane) = &snapshot.plane else {
            println!(
                "frame={:<6} no plane ({} points)",
                snapshot.frame_number,
                snapshot.points.len()
            );
            continue;
        };
        let n = plane.normal().normalized().unwrap_or(Vec3::ZERO);
        let covered = projector
            .render(&overlay, plane, &mapper, None)
            .map(|raster| raster.iter().filter(|&&c| c != 0).count())
            .unwrap_or(0);
        println!(
            "frame={:<6} points={:<6} band={:<6} n=[{:+.3}, {:+.3}, {:+.3}] overlay_px={}",
            snapshot.frame_number,
            snapshot.points.len(),
            snapshot.band.len(),
            n.x,
            n.y,
            n.z,
            covered,
        );
    }

    session.stop();
}

/// Render the synthetic scene through the pinhole model.
fn synthetic_frame(
    frame_number: u64,
    mapper: &PinholeMapper,
    roll: f64,
    rng: &mut StdRng,
) -> RawFrame {
    let (sin_r, cos_r) = roll.sin_cos();
    let mut depth = vec![0u16; SIZE.len()];
    let mut color = vec![0u32; SIZE.len()];

    for y in 0..SIZE.height {
        for x in 0..SIZE.width {
            let i = y * SIZE.width + x;
            let dx = (x as f64 - mapper.cx) / mapper.fx;
            let dy = (mapper.cy - y as f64) / mapper.fy;
            // Drop below the camera per meter of depth, in the rolled frame.
            let down = -(dy * cos_r + dx * sin_r);

            let z = if down > CAMERA_HEIGHT / WALL_DEPTH {
                color[i] = 0xFF60_4020;
                CAMERA_HEIGHT / down
            } else {
                color[i] = 0xFFC0_C0C0;
                WALL_DEPTH
            };
            let z = if rng.gen_bool(0.01) {
                rng.gen_range(0.5..4.0)
            } else {
                z + rng.gen_range(-0.002..0.002)
            };
            depth[i] = (z * 1000.0) as u16;
        }
    }

    RawFrame {
        frame_number,
        depth: DepthFrame::new(SIZE, depth, 400, 4000).expect("depth size"),
        color: Some(ColorFrame::new(SIZE, color).expect("color size")),
    }
}

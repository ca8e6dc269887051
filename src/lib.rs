//! # depthplane - dominant-plane detection for depth+color sensors
//!
//! Turns a stream of depth+color frames into colored point clouds, fits the
//! dominant plane (floor, wall, table) with RANSAC, and projects flat overlay
//! images onto that plane in color-image space. Provides:
//! - A non-blocking frame pipeline that drops frames while busy
//! - Copy-on-read snapshots and channel subscriptions for consumers
//! - A client for the phone-side orientation server
//! - C FFI for integration with C/C++/C# hosts
//!
//! ## Quick Start
//! ```no_run
//! use depthplane::{FramePipeline, PinholeMapper, PipelineConfig, SensorSession};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let pipeline = FramePipeline::new(
//!     PipelineConfig::from_env(),
//!     Arc::new(PinholeMapper::KINECT_640X480),
//! );
//! let session = SensorSession::start(pipeline).unwrap();
//! let sink = session.sink();
//! let stream = session.subscribe(4);
//!
//! // From the sensor callback: sink.submit(frame);
//! # let _ = sink;
//! let snapshot = stream.recv_timeout(Duration::from_secs(1)).unwrap();
//! if let Some(plane) = &snapshot.plane {
//!     println!("plane normal: {:?}", plane.normal());
//! }
//! ```

pub mod error;
pub mod math;
pub mod types;
pub mod plane;
pub mod cloud;
pub mod ransac;
pub mod dilation;
pub mod sensor;
pub mod overlay;
pub mod snapshot;
pub mod pipeline;
pub mod session;
pub mod protocol;
pub mod orientation;
pub mod config;
pub mod ffi;

pub use config::{OrientationConfig, PipelineConfig};
pub use error::DepthPlaneError;
pub use math::{Matrix4, Vec3};
pub use orientation::OrientationClient;
pub use overlay::{Overlay, OverlayProjector, OverlaySample};
pub use pipeline::{FrameOutcome, FramePipeline};
pub use plane::Plane;
pub use ransac::{AnchorStrategy, PlaneEstimate, PlaneEstimator, RansacConfig};
pub use sensor::{ColorFrame, CoordinateMapper, DepthFrame, PinholeMapper, RawFrame};
pub use session::{FrameSink, SensorSession, SnapshotStream};
pub use snapshot::{FrameSnapshot, SnapshotStore};
pub use types::*;

/// Result type alias for depthplane operations.
pub type Result<T> = std::result::Result<T, DepthPlaneError>;

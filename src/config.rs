//! Pipeline and orientation-client configuration.
//!
//! Every setting has a default and may be overridden through `DEPTHPLANE_*`
//! environment variables. Values are trimmed and lower-cased before parsing;
//! unparsable values fall back to the default.

use crate::protocol;
use crate::ransac::{AnchorStrategy, RansacConfig};
use crate::types::Streams;
use std::time::Duration;

pub const ENV_RANSAC_ITERATIONS: &str = "DEPTHPLANE_RANSAC_ITERATIONS";
pub const ENV_INLIER_DISTANCE: &str = "DEPTHPLANE_INLIER_DISTANCE";
pub const ENV_BAND_DISTANCE: &str = "DEPTHPLANE_BAND_DISTANCE";
pub const ENV_MIN_INLIER_FRACTION: &str = "DEPTHPLANE_MIN_INLIER_FRACTION";
pub const ENV_SEED: &str = "DEPTHPLANE_SEED";
pub const ENV_ANCHOR: &str = "DEPTHPLANE_ANCHOR";
pub const ENV_PIXEL_STRIDE: &str = "DEPTHPLANE_PIXEL_STRIDE";
pub const ENV_COLOR: &str = "DEPTHPLANE_COLOR";
pub const ENV_ORIENTATION_ADDR: &str = "DEPTHPLANE_ORIENTATION_ADDR";
pub const ENV_ORIENTATION_TIMEOUT_MS: &str = "DEPTHPLANE_ORIENTATION_TIMEOUT_MS";

/// Settings for [`crate::pipeline::FramePipeline`].
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub ransac: RansacConfig,

    /// Sample every n-th depth pixel in both directions.
    /// Default: 1
    pub pixel_stride: usize,

    /// Sensor streams consumed. Without `COLOR`, points stay black and no
    /// color raster is published.
    /// Default: `Streams::DEPTH | Streams::COLOR`
    pub streams: Streams,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ransac: RansacConfig::default(),
            pixel_stride: 1,
            streams: Streams::default(),
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ransac(mut self, ransac: RansacConfig) -> Self {
        self.ransac = ransac;
        self
    }

    pub fn with_pixel_stride(mut self, stride: usize) -> Self {
        self.pixel_stride = stride.max(1);
        self
    }

    pub fn with_streams(mut self, streams: Streams) -> Self {
        self.streams = streams;
        self
    }

    /// Defaults overridden by the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults overridden by `lookup(name)` for each `DEPTHPLANE_*` name.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let d = RansacConfig::default();
        let anchor = match read_env_string(&lookup, ENV_ANCHOR, "random").as_str() {
            "random" => AnchorStrategy::Random,
            "lowest" => AnchorStrategy::Lowest,
            other => {
                log::warn!(
                    "Unknown {}='{}', using random (supported: random|lowest)",
                    ENV_ANCHOR,
                    other
                );
                AnchorStrategy::Random
            }
        };

        let ransac = RansacConfig {
            max_iterations: read_env_usize(&lookup, ENV_RANSAC_ITERATIONS, d.max_iterations),
            min_inlier_fraction: read_env_f64(
                &lookup,
                ENV_MIN_INLIER_FRACTION,
                d.min_inlier_fraction,
            ),
            inlier_distance: read_env_f64(&lookup, ENV_INLIER_DISTANCE, d.inlier_distance),
            band_distance: read_env_f64(&lookup, ENV_BAND_DISTANCE, d.band_distance),
            band_precision: d.band_precision,
            anchor,
            seed: read_env_u64(&lookup, ENV_SEED, d.seed),
        };

        let mut streams = Streams::DEPTH;
        if read_env_bool(&lookup, ENV_COLOR, true) {
            streams |= Streams::COLOR;
        }

        let config = Self::default()
            .with_ransac(ransac)
            .with_pixel_stride(read_env_usize(&lookup, ENV_PIXEL_STRIDE, 1))
            .with_streams(streams);
        log::debug!("Pipeline config: {:?}", config);
        config
    }
}

/// Connection parameters for [`crate::orientation::OrientationClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrientationConfig {
    /// Default: `127.0.0.1:8080`
    pub addr: String,

    /// Default: 500 ms
    pub connect_timeout: Duration,

    /// Read and write timeout per query.
    /// Default: 500 ms
    pub io_timeout: Duration,
}

impl Default for OrientationConfig {
    fn default() -> Self {
        Self {
            addr: protocol::DEFAULT_ADDR.to_string(),
            connect_timeout: Duration::from_millis(500),
            io_timeout: Duration::from_millis(500),
        }
    }
}

impl OrientationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_addr(mut self, addr: impl Into<String>) -> Self {
        self.addr = addr.into();
        self
    }

    /// Sets both the connect and the I/O timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self.io_timeout = timeout;
        self
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let d = Self::default();
        let default_ms = d.io_timeout.as_millis() as u64;
        let timeout_ms = read_env_u64(&lookup, ENV_ORIENTATION_TIMEOUT_MS, default_ms);
        Self::default()
            .with_addr(read_env_string(&lookup, ENV_ORIENTATION_ADDR, &d.addr))
            .with_timeout(Duration::from_millis(timeout_ms))
    }
}

fn read_env_bool<F>(lookup: &F, name: &str, default: bool) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .and_then(|v| {
            let v = v.trim().to_ascii_lowercase();
            match v.as_str() {
                "1" | "true" | "yes" | "on" => Some(true),
                "0" | "false" | "no" | "off" => Some(false),
                _ => None,
            }
        })
        .unwrap_or(default)
}

fn read_env_usize<F>(lookup: &F, name: &str, default: usize) -> usize
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(default)
}

fn read_env_u64<F>(lookup: &F, name: &str, default: u64) -> u64
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

fn read_env_f64<F>(lookup: &F, name: &str, default: f64) -> f64
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(default)
}

fn read_env_string<F>(lookup: &F, name: &str, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|v| v.trim().to_ascii_lowercase())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

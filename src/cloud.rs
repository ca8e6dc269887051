use crate::math::Vec3;
use crate::sensor::{CoordinateMapper, RawFrame};
use crate::types::{ColoredPoint, Rgb};
use std::sync::Arc;

/// Quantized point key for set membership.
///
/// Each coordinate is rounded to a multiple of `precision`, so points that
/// differ by less than the grid size share a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PointKey(i64, i64, i64);

impl PointKey {
    /// `None` for non-finite coordinates or a non-positive precision.
    pub fn quantize(p: Vec3, precision: f64) -> Option<PointKey> {
        if precision.is_nan() || precision <= 0.0 {
            return None;
        }
        let q = |v: f64| {
            let cell = (v / precision).round();
            if cell.is_finite() && cell.abs() < i64::MAX as f64 {
                Some(cell as i64)
            } else {
                None
            }
        };
        Some(PointKey(q(p.x)?, q(p.y)?, q(p.z)?))
    }
}

/// Builds a colored point cloud from a raw depth+color frame.
pub struct PointCloudBuilder {
    mapper: Arc<dyn CoordinateMapper>,
    stride: usize,
    attach_color: bool,
}

impl PointCloudBuilder {
    pub fn new(mapper: Arc<dyn CoordinateMapper>) -> Self {
        Self {
            mapper,
            stride: 1,
            attach_color: true,
        }
    }

    /// Sample every `stride`-th pixel in both directions.
    pub fn with_stride(mut self, stride: usize) -> Self {
        self.stride = stride.max(1);
        self
    }

    pub fn with_color(mut self, attach_color: bool) -> Self {
        self.attach_color = attach_color;
        self
    }

    pub fn mapper(&self) -> &Arc<dyn CoordinateMapper> {
        &self.mapper
    }

    /// One point per valid depth pixel.
    ///
    /// Pixels outside the frame's valid-depth bounds are skipped. Color is
    /// looked up through the mapper; points that map outside the color
    /// image, or frames without color, stay black.
    pub fn build(&self, frame: &RawFrame) -> Vec<ColoredPoint> {
        let depth = &frame.depth;
        let color = if self.attach_color {
            frame.color.as_ref()
        } else {
            None
        };
        let size = depth.size();
        let (width, height) = (size.width, size.height);
        let mut points = Vec::with_capacity(size.len() / (self.stride * self.stride));

        for y in (0..height).step_by(self.stride) {
            for x in (0..width).step_by(self.stride) {
                let Some(d) = depth.depth_at(x, y) else {
                    continue;
                };
                if !depth.is_valid(d) {
                    continue;
                }
                let position = self.mapper.depth_to_world(x, y, d);
                let color = color
                    .and_then(|c| self.mapper.world_to_color(position).and_then(|px| c.pixel(px)))
                    .map(Rgb::unpack)
                    .unwrap_or(Rgb::BLACK);
                points.push(ColoredPoint {
                    position,
                    color,
                    row: y as u32,
                });
            }
        }

        log::trace!(
            "Frame {}: {} points from {}x{} depth",
            frame.frame_number,
            points.len(),
            width,
            height
        );
        points
    }
}

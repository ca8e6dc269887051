//! Sensor-facing types: raw frames, the coordinate mapper capability, and
//! decoding of Kinect-style raw buffers.

use crate::math::Vec3;
use crate::types::{pack_argb, ImageSize, PixelCoord};
use crate::{DepthPlaneError, Result};

/// Number of low bits in a raw depth word that carry the player index.
pub const PLAYER_INDEX_BITS: u32 = 3;

/// Converts between depth-image space, world space, and color-image space.
///
/// Supplied by the sensor driver. Implementations must be callable from the
/// processing thread.
pub trait CoordinateMapper: Send + Sync {
    /// Map a depth pixel and its depth (millimeters) to a world point.
    fn depth_to_world(&self, x: usize, y: usize, depth_mm: u16) -> Vec3;

    /// Map a world point to a color-image pixel. The result may lie outside
    /// the color image; callers discard it in that case.
    fn world_to_color(&self, point: Vec3) -> Option<PixelCoord>;
}

/// One depth image with its valid-range bounds.
///
/// The pixel buffer always holds exactly `size.len()` values.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthFrame {
    size: ImageSize,
    /// Depth in millimeters, row-major. 0 = no reading.
    pixels: Vec<u16>,
    min_valid: u16,
    max_valid: u16,
}

impl DepthFrame {
    pub fn new(size: ImageSize, pixels: Vec<u16>, min_valid: u16, max_valid: u16) -> Result<Self> {
        if pixels.len() != size.len() {
            return Err(DepthPlaneError::RasterSize {
                expected: size.len(),
                actual: pixels.len(),
            });
        }
        Ok(Self {
            size,
            pixels,
            min_valid,
            max_valid,
        })
    }

    pub fn size(&self) -> ImageSize {
        self.size
    }

    pub fn pixels(&self) -> &[u16] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [u16] {
        &mut self.pixels
    }

    pub fn min_valid(&self) -> u16 {
        self.min_valid
    }

    pub fn max_valid(&self) -> u16 {
        self.max_valid
    }

    pub fn is_valid(&self, depth: u16) -> bool {
        depth != 0 && depth >= self.min_valid && depth <= self.max_valid
    }

    pub fn depth_at(&self, x: usize, y: usize) -> Option<u16> {
        if x >= self.size.width || y >= self.size.height {
            return None;
        }
        self.pixels.get(y * self.size.width + x).copied()
    }
}

/// One color image of packed `0xAARRGGBB` pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorFrame {
    size: ImageSize,
    pixels: Vec<u32>,
}

impl ColorFrame {
    pub fn new(size: ImageSize, pixels: Vec<u32>) -> Result<Self> {
        if pixels.len() != size.len() {
            return Err(DepthPlaneError::RasterSize {
                expected: size.len(),
                actual: pixels.len(),
            });
        }
        Ok(Self { size, pixels })
    }

    pub fn size(&self) -> ImageSize {
        self.size
    }

    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    pub fn pixel(&self, at: PixelCoord) -> Option<u32> {
        self.size
            .index_of(at)
            .and_then(|i| self.pixels.get(i).copied())
    }
}

/// A depth frame and the color frame captured with it.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFrame {
    pub frame_number: u64,
    pub depth: DepthFrame,
    pub color: Option<ColorFrame>,
}

impl RawFrame {
    /// Decode driver buffers captured at the same resolution.
    ///
    /// `depth` holds one raw word per pixel, `color` four bytes per pixel.
    /// Both are mirrored horizontally during decoding.
    pub fn from_raw(
        frame_number: u64,
        size: ImageSize,
        depth: &[i16],
        color: Option<&[u8]>,
        min_valid: u16,
        max_valid: u16,
    ) -> Result<Self> {
        if size.is_empty() {
            return Err(DepthPlaneError::InvalidDimensions {
                width: size.width,
                height: size.height,
            });
        }
        let depth = DepthFrame::new(
            size,
            decode_raw_depth(depth, size.width)?,
            min_valid,
            max_valid,
        )?;
        let color = match color {
            Some(bytes) if bytes.len() != size.len() * 4 => {
                return Err(DepthPlaneError::FrameMismatch(format!(
                    "{} color bytes for a {}x{} depth frame",
                    bytes.len(),
                    size.width,
                    size.height
                )));
            }
            Some(bytes) => Some(ColorFrame::new(size, decode_raw_color(bytes, size.width)?)?),
            None => None,
        };
        Ok(Self {
            frame_number,
            depth,
            color,
        })
    }
}

/// Pinhole-camera mapper with the color camera co-located with the depth
/// camera. Depth is converted to meters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PinholeMapper {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
    /// Color/depth resolution ratio.
    pub color_scale: f64,
}

impl PinholeMapper {
    /// Kinect v1 depth intrinsics at 640x480.
    pub const KINECT_640X480: PinholeMapper = PinholeMapper {
        fx: 594.21,
        fy: 591.04,
        cx: 339.5,
        cy: 242.7,
        color_scale: 1.0,
    };

    pub fn new(fx: f64, fy: f64, cx: f64, cy: f64) -> Self {
        Self {
            fx,
            fy,
            cx,
            cy,
            color_scale: 1.0,
        }
    }
}

impl CoordinateMapper for PinholeMapper {
    fn depth_to_world(&self, x: usize, y: usize, depth_mm: u16) -> Vec3 {
        let z = depth_mm as f64 / 1000.0;
        Vec3::new(
            (x as f64 - self.cx) * z / self.fx,
            (self.cy - y as f64) * z / self.fy,
            z,
        )
    }

    fn world_to_color(&self, p: Vec3) -> Option<PixelCoord> {
        if p.z <= 0.0 {
            return None;
        }
        let u = (p.x * self.fx / p.z + self.cx) * self.color_scale;
        let v = (self.cy - p.y * self.fy / p.z) * self.color_scale;
        if !u.is_finite() || !v.is_finite() {
            return None;
        }
        Some(PixelCoord::new(u.round() as i64, v.round() as i64))
    }
}

/// Decode raw depth words: strip the player-index bits and mirror each row.
pub fn decode_raw_depth(raw: &[i16], width: usize) -> Result<Vec<u16>> {
    if width == 0 || raw.len() % width != 0 {
        return Err(DepthPlaneError::InvalidDimensions {
            width,
            height: if width == 0 { 0 } else { raw.len() / width },
        });
    }
    let mut out = vec![0u16; raw.len()];
    for (row_in, row_out) in raw.chunks_exact(width).zip(out.chunks_exact_mut(width)) {
        for (x, &word) in row_in.iter().enumerate() {
            row_out[width - x - 1] = (word as u16) >> PLAYER_INDEX_BITS;
        }
    }
    Ok(out)
}

/// Decode 4-byte color pixels (`r, g, b, _`) into opaque packed pixels,
/// mirroring each row.
pub fn decode_raw_color(bytes: &[u8], width: usize) -> Result<Vec<u32>> {
    let pixel_count = bytes.len() / 4;
    if width == 0 || bytes.len() % 4 != 0 || pixel_count % width != 0 {
        return Err(DepthPlaneError::InvalidDimensions {
            width,
            height: if width == 0 { 0 } else { pixel_count / width },
        });
    }
    let mut out = vec![0u32; pixel_count];
    for (row_in, row_out) in bytes
        .chunks_exact(width * 4)
        .zip(out.chunks_exact_mut(width))
    {
        for (x, px) in row_in.chunks_exact(4).enumerate() {
            row_out[width - x - 1] = pack_argb(px[0], px[1], px[2]);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_raw_depth_shift_and_mirror() {
        // 1000mm with player index 2, 2000mm with player index 0
        let raw = [(1000 << 3 | 2) as i16, (2000 << 3) as i16];
        let depth = decode_raw_depth(&raw, 2).unwrap();
        assert_eq!(depth, vec![2000, 1000]);
    }

    #[test]
    fn test_decode_raw_depth_bad_width() {
        assert!(decode_raw_depth(&[0i16; 5], 2).is_err());
        assert!(decode_raw_depth(&[0i16; 4], 0).is_err());
    }

    #[test]
    fn test_decode_raw_color() {
        let bytes = [0x10, 0x20, 0x30, 0x00, 0xAA, 0xBB, 0xCC, 0x00];
        let px = decode_raw_color(&bytes, 2).unwrap();
        assert_eq!(px, vec![0xFFAA_BBCC, 0xFF10_2030]);
        assert!(decode_raw_color(&bytes[..6], 2).is_err());
    }

    #[test]
    fn test_depth_validity() {
        let frame = DepthFrame::new(ImageSize::new(2, 1), vec![0, 900], 800, 4000).unwrap();
        assert!(!frame.is_valid(0));
        assert!(!frame.is_valid(799));
        assert!(frame.is_valid(800));
        assert!(frame.is_valid(4000));
        assert!(!frame.is_valid(4001));
        assert_eq!(frame.depth_at(1, 0), Some(900));
        assert_eq!(frame.depth_at(2, 0), None);
    }

    #[test]
    fn test_raw_frame_decoding() {
        let size = ImageSize::new(2, 1);
        let depth = [(1000 << 3) as i16, (1500 << 3 | 1) as i16];
        let color = [1, 2, 3, 0, 4, 5, 6, 0];
        let frame = RawFrame::from_raw(7, size, &depth, Some(&color), 500, 4000).unwrap();
        assert_eq!(frame.frame_number, 7);
        assert_eq!(frame.depth.pixels(), &[1500, 1000]);
        assert_eq!(frame.color.unwrap().pixels(), &[0xFF04_0506, 0xFF01_0203]);

        let err = RawFrame::from_raw(7, size, &depth, Some(&color[..4]), 500, 4000).unwrap_err();
        assert!(matches!(err, DepthPlaneError::FrameMismatch(_)));
        assert!(RawFrame::from_raw(7, size, &depth[..1], None, 500, 4000).is_err());
    }

    #[test]
    fn test_frame_size_checked() {
        assert!(DepthFrame::new(ImageSize::new(2, 2), vec![0; 3], 0, 1).is_err());
        assert!(ColorFrame::new(ImageSize::new(2, 2), vec![0; 5]).is_err());
    }

    #[test]
    fn test_pinhole_roundtrip_to_same_pixel() {
        let mapper = PinholeMapper::KINECT_640X480;
        let world = mapper.depth_to_world(100, 400, 2500);
        assert!((world.z - 2.5).abs() < 1e-12);
        assert!(world.y < 0.0);
        assert_eq!(mapper.world_to_color(world), Some(PixelCoord::new(100, 400)));
        assert_eq!(mapper.world_to_color(Vec3::new(0.0, 0.0, -1.0)), None);
    }
}

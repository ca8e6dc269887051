//! Projection of a flat overlay image onto an estimated plane, expressed in
//! color-image pixel space.
//!
//! The overlay's pixel lattice is centered on the image center and scaled by
//! the image's largest side, rotated into the plane's orientation, then
//! perspective-divided back into pixels around an anchor pixel. The result
//! is sparse and is densified with [`crate::dilation`] before compositing.

use crate::dilation::dilate_in_place;
use crate::math::Vec3;
use crate::plane::Plane;
use crate::sensor::CoordinateMapper;
use crate::types::{pack_argb, ColoredPoint, ImageSize, PixelCoord};
use crate::{DepthPlaneError, Result};
use std::f64::consts::FRAC_PI_2;

/// Absorbs float error in `L * (x / L)` before flooring to a pixel.
const PIXEL_EPSILON: f64 = 1e-6;

/// Relative size under which a normal component pair counts as zero.
const NORMAL_EPSILON: f64 = 1e-6;

/// Overlay source image of packed `0xAARRGGBB` pixels; `0` is transparent.
#[derive(Debug, Clone, PartialEq)]
pub struct Overlay {
    size: ImageSize,
    pixels: Vec<u32>,
}

impl Overlay {
    pub fn new(size: ImageSize, pixels: Vec<u32>) -> Result<Self> {
        if size.is_empty() {
            return Err(DepthPlaneError::InvalidDimensions {
                width: size.width,
                height: size.height,
            });
        }
        if pixels.len() != size.len() {
            return Err(DepthPlaneError::RasterSize {
                expected: size.len(),
                actual: pixels.len(),
            });
        }
        Ok(Self { size, pixels })
    }

    /// Decode an RGBA byte raster. Pixels with zero alpha become transparent.
    pub fn from_rgba(width: usize, height: usize, bytes: &[u8]) -> Result<Self> {
        let size = ImageSize::new(width, height);
        if bytes.len() != size.len() * 4 {
            return Err(DepthPlaneError::RasterSize {
                expected: size.len() * 4,
                actual: bytes.len(),
            });
        }
        let pixels = bytes
            .chunks_exact(4)
            .map(|px| if px[3] == 0 { 0 } else { pack_argb(px[0], px[1], px[2]) })
            .collect();
        Self::new(size, pixels)
    }

    /// Horizontally mirrored copy, matching a mirrored sensor feed.
    pub fn mirrored(&self) -> Overlay {
        let w = self.size.width;
        let mut pixels = self.pixels.clone();
        for row in pixels.chunks_exact_mut(w) {
            row.reverse();
        }
        Overlay {
            size: self.size,
            pixels,
        }
    }

    pub fn size(&self) -> ImageSize {
        self.size
    }

    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    /// Pixel positions centered on the image center, Y up, scaled so the
    /// largest side spans 1.0. Row-major, one entry per pixel.
    pub fn lattice(&self) -> Vec<Vec3> {
        let (w, h) = (self.size.width, self.size.height);
        let (cx, cy) = ((w / 2) as f64, (h / 2) as f64);
        let scale = self.size.largest_side() as f64;
        let mut out = Vec::with_capacity(self.size.len());
        for y in 0..h {
            for x in 0..w {
                out.push(Vec3::new(
                    (x as f64 - cx) / scale,
                    (cy - y as f64) / scale,
                    0.0,
                ));
            }
        }
        out
    }
}

/// Rotation taking the overlay lattice into a plane's orientation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayRotation {
    cos_yaw: f64,
    sin_yaw: f64,
    cos_pitch: f64,
    sin_pitch: f64,
    cos_roll: f64,
    sin_roll: f64,
}

impl OverlayRotation {
    pub const IDENTITY: OverlayRotation = OverlayRotation {
        cos_yaw: 1.0,
        sin_yaw: 0.0,
        cos_pitch: 1.0,
        sin_pitch: 0.0,
        cos_roll: 1.0,
        sin_roll: 0.0,
    };

    /// Yaw from the normal's X/Z components, pitch from Y/Z, and roll from
    /// the X/Y components of a device gravity reading when one is present.
    ///
    /// A plane's normal sign is arbitrary, so each angle is taken from its
    /// component pair with the pair's larger component made positive. A pair
    /// below `NORMAL_EPSILON` of the normal's length adds no rotation, which
    /// keeps floors and side walls stable under sensor noise. The remaining
    /// discontinuity sits at normals where the two components of a pair are
    /// equal in size and opposite in sign. A zero orientation yields no roll.
    pub fn new(normal: Vec3, orientation: Option<Vec3>) -> Self {
        let mut rot = Self::IDENTITY;

        let length = normal.magnitude();
        if length > 0.0 && length.is_finite() {
            let floor = length * NORMAL_EPSILON;
            let yaw = pair_angle(normal.z, normal.x, floor);
            let pitch = pair_angle(normal.z, normal.y, floor);
            (rot.sin_yaw, rot.cos_yaw) = yaw.sin_cos();
            (rot.sin_pitch, rot.cos_pitch) = pitch.sin_cos();
        }

        if let Some(o) = orientation.filter(|o| o.x != 0.0 || o.y != 0.0) {
            let roll = o.x.atan2(o.y);
            (rot.sin_roll, rot.cos_roll) = roll.sin_cos();
        }

        rot
    }

    pub fn apply(&self, p: Vec3) -> Vec3 {
        let x = p.x * self.cos_roll - p.y * self.sin_roll;
        let y = p.x * self.sin_roll + p.y * self.cos_roll;
        let z = p.z;

        let (cx, sx) = (self.cos_pitch, self.sin_pitch);
        let (cy, sy) = (self.cos_yaw, self.sin_yaw);
        Vec3::new(
            cy * x + y * sx * sy - z * sy * cx,
            y * cx + z * sx,
            sy * x - sx * cy * y + cy * cx * z,
        )
    }
}

/// `atan2(z, other) - pi/2`, with the pair negated when its larger
/// component is negative (ties go by `z`). Zero below `floor`.
fn pair_angle(z: f64, other: f64, floor: f64) -> f64 {
    if z.hypot(other) <= floor {
        return 0.0;
    }
    let lead = if z.abs() >= other.abs() { z } else { other };
    let (z, other) = if lead < 0.0 { (-z, -other) } else { (z, other) };
    z.atan2(other) - FRAC_PI_2
}

/// A rotated overlay pixel and where it lands in the color image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlaySample {
    pub position: Vec3,
    pub pixel: PixelCoord,
    pub color: u32,
}

/// Projects overlays into a color image of fixed size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayProjector {
    target: ImageSize,
}

impl OverlayProjector {
    pub fn new(target: ImageSize) -> Self {
        Self { target }
    }

    pub fn target(&self) -> ImageSize {
        self.target
    }

    pub fn center(&self) -> PixelCoord {
        PixelCoord::new((self.target.width / 2) as i64, (self.target.height / 2) as i64)
    }

    /// Rotate the overlay into the plane orientation given by `normal` and
    /// project it around `anchor`. Transparent pixels and samples landing
    /// outside the target image are dropped.
    pub fn project(
        &self,
        overlay: &Overlay,
        normal: Vec3,
        anchor: PixelCoord,
        orientation: Option<Vec3>,
    ) -> Vec<OverlaySample> {
        let rotation = OverlayRotation::new(normal, orientation);
        let largest = overlay.size().largest_side() as f64;

        overlay
            .lattice()
            .into_iter()
            .zip(overlay.pixels().iter().copied())
            .filter(|&(_, color)| color != 0)
            .filter_map(|(p, color)| {
                let r = rotation.apply(p);
                let depth = r.z + 1.0;
                if depth <= f64::EPSILON {
                    return None;
                }
                let px = (largest * r.x / depth + PIXEL_EPSILON).floor() as i64 + anchor.x;
                let py = anchor.y - (largest * r.y / depth + PIXEL_EPSILON).floor() as i64;
                let pixel = PixelCoord::new(px, py);
                self.target.index_of(pixel)?;
                Some(OverlaySample {
                    position: r,
                    pixel,
                    color,
                })
            })
            .collect()
    }

    /// Project onto `plane`, anchored where the plane's anchor point lands
    /// in the color image (the image center when the mapper cannot place it).
    pub fn project_plane(
        &self,
        overlay: &Overlay,
        plane: &Plane,
        mapper: &dyn CoordinateMapper,
        orientation: Option<Vec3>,
    ) -> Vec<OverlaySample> {
        let anchor = mapper
            .world_to_color(plane.point())
            .unwrap_or_else(|| self.center());
        self.project(overlay, plane.normal(), anchor, orientation)
    }

    /// Sparse raster of the samples; later samples overwrite earlier ones.
    pub fn rasterize(&self, samples: &[OverlaySample]) -> Vec<u32> {
        let mut raster = vec![0u32; self.target.len()];
        for s in samples {
            if let Some(i) = self.target.index_of(s.pixel) {
                raster[i] = s.color;
            }
        }
        raster
    }

    /// Project, rasterize, and densify in one pass.
    pub fn render(
        &self,
        overlay: &Overlay,
        plane: &Plane,
        mapper: &dyn CoordinateMapper,
        orientation: Option<Vec3>,
    ) -> Result<Vec<u32>> {
        let samples = self.project_plane(overlay, plane, mapper, orientation);
        let mut raster = self.rasterize(&samples);
        dilate_in_place(&mut raster, self.target.width, self.target.height)?;
        Ok(raster)
    }

    /// Boolean mask of the color pixels covered by plane-adjacent points,
    /// densified by one dilation pass.
    pub fn band_mask(
        &self,
        band: &[ColoredPoint],
        mapper: &dyn CoordinateMapper,
    ) -> Result<Vec<bool>> {
        let mut mask = vec![false; self.target.len()];
        for p in band {
            if let Some(i) = mapper
                .world_to_color(p.position)
                .and_then(|px| self.target.index_of(px))
            {
                mask[i] = true;
            }
        }
        dilate_in_place(&mut mask, self.target.width, self.target.height)?;
        Ok(mask)
    }
}

/// Clear every raster cell not covered by `mask`.
pub fn apply_mask(raster: &mut [u32], mask: &[bool]) -> Result<()> {
    if raster.len() != mask.len() {
        return Err(DepthPlaneError::RasterSize {
            expected: raster.len(),
            actual: mask.len(),
        });
    }
    for (px, &keep) in raster.iter_mut().zip(mask) {
        if !keep {
            *px = 0;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::PinholeMapper;
    use crate::types::Rgb;

    fn numbered(width: usize, height: usize) -> Overlay {
        let pixels = (0..width * height).map(|i| 0xFF00_0000 | (i as u32 + 1)).collect();
        Overlay::new(ImageSize::new(width, height), pixels).unwrap()
    }

    #[test]
    fn test_lattice_centered_and_normalized() {
        let overlay = numbered(4, 2);
        let lattice = overlay.lattice();
        assert_eq!(lattice.len(), 8);
        assert_eq!(lattice[0], Vec3::new(-0.5, 0.25, 0.0));
        assert_eq!(lattice[7], Vec3::new(0.25, 0.0, 0.0));
    }

    #[test]
    fn test_facing_camera_preserves_lattice() {
        let overlay = numbered(6, 4);
        let projector = OverlayProjector::new(ImageSize::new(6, 4));
        let samples = projector.project(&overlay, Vec3::FORWARD, projector.center(), None);
        assert_eq!(samples.len(), 24);
        for (i, s) in samples.iter().enumerate() {
            assert_eq!(s.pixel, PixelCoord::new((i % 6) as i64, (i / 6) as i64));
            assert_eq!(s.color, overlay.pixels()[i]);
        }
    }

    #[test]
    fn test_normal_sign_does_not_matter() {
        let overlay = numbered(5, 5);
        let projector = OverlayProjector::new(ImageSize::new(40, 40));
        let n = Vec3::new(0.3, 0.8, 0.5);
        let a = projector.project(&overlay, n, projector.center(), None);
        let b = projector.project(&overlay, -n, projector.center(), None);
        assert_eq!(a, b);
    }

    #[test]
    fn test_zero_normal_is_identity() {
        let overlay = numbered(4, 4);
        let projector = OverlayProjector::new(ImageSize::new(4, 4));
        let a = projector.project(&overlay, Vec3::ZERO, projector.center(), None);
        let b = projector.project(&overlay, Vec3::FORWARD, projector.center(), None);
        assert_eq!(a, b);
        assert_eq!(OverlayRotation::new(Vec3::ZERO, None), OverlayRotation::IDENTITY);
    }

    #[test]
    fn test_upright_orientation_adds_no_roll() {
        let upright = OverlayRotation::new(Vec3::FORWARD, Some(Vec3::UP));
        let p = Vec3::new(0.2, -0.1, 0.0);
        assert!((upright.apply(p) - p).magnitude() < 1e-12);
        assert_eq!(
            OverlayRotation::new(Vec3::FORWARD, Some(Vec3::ZERO)),
            OverlayRotation::new(Vec3::FORWARD, None)
        );

        // Gravity along +X rolls the lattice a quarter turn.
        let rolled = OverlayRotation::new(Vec3::FORWARD, Some(Vec3::new(1.0, 0.0, 0.0)));
        let r = rolled.apply(Vec3::new(0.0, 0.25, 0.0));
        assert!((r - Vec3::new(-0.25, 0.0, 0.0)).magnitude() < 1e-12);
    }

    #[test]
    fn test_out_of_range_samples_discarded() {
        let overlay = numbered(10, 10);
        let projector = OverlayProjector::new(ImageSize::new(4, 4));
        let samples = projector.project(&overlay, Vec3::FORWARD, PixelCoord::new(0, 0), None);
        assert!(!samples.is_empty());
        assert!(samples.len() < 100);
        assert!(samples
            .iter()
            .all(|s| projector.target().index_of(s.pixel).is_some()));
    }

    #[test]
    fn test_transparent_pixels_skipped() {
        let bytes = [255, 0, 0, 255, 0, 255, 0, 0, 0, 0, 255, 255, 9, 9, 9, 0];
        let overlay = Overlay::from_rgba(2, 2, &bytes).unwrap();
        assert_eq!(overlay.pixels(), &[0xFFFF_0000, 0, 0xFF00_00FF, 0]);
        let projector = OverlayProjector::new(ImageSize::new(2, 2));
        let samples = projector.project(&overlay, Vec3::FORWARD, projector.center(), None);
        assert_eq!(samples.len(), 2);
    }

    #[test]
    fn test_mirrored() {
        let overlay = numbered(3, 1);
        assert_eq!(
            overlay.mirrored().pixels(),
            &[0xFF00_0003, 0xFF00_0002, 0xFF00_0001]
        );
    }

    fn assert_close(a: Vec3, b: Vec3) {
        assert!((a - b).magnitude() < 1e-9, "{:?} != {:?}", a, b);
    }

    #[test]
    fn test_yawed_plane_foreshortens_x() {
        let rot = OverlayRotation::new(Vec3::new(1.0, 0.0, 1.0), None);
        let h = std::f64::consts::FRAC_1_SQRT_2;
        // Yaw of -pi/4: lattice X tilts away into depth, Y is untouched.
        assert_close(rot.apply(Vec3::new(0.5, 0.0, 0.0)), Vec3::new(0.5 * h, 0.0, -0.5 * h));
        assert_close(rot.apply(Vec3::new(0.0, 0.25, 0.0)), Vec3::new(0.0, 0.25, 0.0));
        // The lattice's own normal lands on the plane normal.
        assert_close(rot.apply(Vec3::FORWARD), Vec3::new(h, 0.0, h));
    }

    #[test]
    fn test_floor_maps_lattice_y_into_depth() {
        let p = Vec3::new(0.3, 0.2, 0.0);
        let expected = Vec3::new(0.3, 0.0, 0.2);
        for nz in [1e-9, -1e-9, 0.0] {
            let rot = OverlayRotation::new(Vec3::new(0.0, 1.0, nz), None);
            assert_close(rot.apply(p), expected);
            let flipped = OverlayRotation::new(Vec3::new(0.0, -1.0, nz), None);
            assert_close(flipped.apply(p), expected);
        }
        // Noise in both horizontal components does not spin the overlay.
        let noisy = OverlayRotation::new(Vec3::new(-2e-9, 1.0, 1e-9), None);
        assert_close(noisy.apply(p), expected);
    }

    #[test]
    fn test_side_wall_maps_lattice_x_into_depth() {
        let p = Vec3::new(0.3, 0.2, 0.0);
        for nz in [1e-9, -1e-9] {
            let rot = OverlayRotation::new(Vec3::new(1.0, 0.0, nz), None);
            assert_close(rot.apply(p), Vec3::new(0.0, 0.2, -0.3));
        }
    }

    #[test]
    fn test_yawed_plane_exact_pixels() {
        let overlay = numbered(4, 4);
        let projector = OverlayProjector::new(ImageSize::new(64, 64));
        let anchor = PixelCoord::new(32, 32);
        let tilted = projector.project(&overlay, Vec3::new(1.0, 0.0, 1.0), anchor, None);
        let facing = projector.project(&overlay, Vec3::FORWARD, anchor, None);
        assert_eq!(tilted.len(), 16);

        // Lattice index y * 4 + x.
        assert_eq!(tilted[0].pixel, PixelCoord::new(30, 31));
        assert_eq!(tilted[3].pixel, PixelCoord::new(32, 30));
        assert_eq!(tilted[8].pixel, PixelCoord::new(30, 32));
        assert_eq!(tilted[11].pixel, PixelCoord::new(32, 32));
        // Yaw shortens the right half of the lattice along X.
        assert_eq!(facing[11].pixel, PixelCoord::new(33, 32));
        assert_eq!(facing[8].pixel, PixelCoord::new(30, 32));
    }

    #[test]
    fn test_render_fills_gap_at_plane_anchor() {
        let pixels = vec![0xFF00_0010, 0, 0xFF00_0030];
        let overlay = Overlay::new(ImageSize::new(3, 1), pixels).unwrap();
        let mapper = PinholeMapper::new(20.0, 20.0, 10.0, 10.0);
        let projector = OverlayProjector::new(ImageSize::new(64, 64));
        let plane = Plane::from_points(
            Vec3::new(0.2, -0.2, 2.0),
            Vec3::new(1.2, -0.2, 2.0),
            Vec3::new(0.2, 0.8, 2.0),
        );
        let at = |x: usize, y: usize| y * 64 + x;

        let sparse = projector.rasterize(&projector.project_plane(&overlay, &plane, &mapper, None));
        assert_eq!(sparse[at(11, 12)], 0xFF00_0010);
        assert_eq!(sparse[at(13, 12)], 0xFF00_0030);
        assert_eq!(sparse[at(12, 12)], 0);
        assert_eq!(sparse.iter().filter(|&&c| c != 0).count(), 2);

        let dense = projector.render(&overlay, &plane, &mapper, None).unwrap();
        assert_eq!(dense[at(12, 12)], 0xFF00_0020);
        assert_eq!(dense.iter().filter(|&&c| c != 0).count(), 3);
    }

    #[test]
    fn test_band_mask_and_apply() {
        let mapper = PinholeMapper::new(1.0, 1.0, 2.0, 2.0);
        let projector = OverlayProjector::new(ImageSize::new(5, 5));
        // Points landing on pixels (1,2) and (3,2); dilation fills (2,2).
        let band = [
            ColoredPoint::new(Vec3::new(-1.0, 0.0, 1.0), Rgb::BLACK),
            ColoredPoint::new(Vec3::new(1.0, 0.0, 1.0), Rgb::BLACK),
        ];
        let mask = projector.band_mask(&band, &mapper).unwrap();
        assert!(mask[11] && mask[12] && mask[13]);
        assert_eq!(mask.iter().filter(|&&m| m).count(), 3);

        let mut raster = vec![0xFF11_1111u32; 25];
        apply_mask(&mut raster, &mask).unwrap();
        assert_eq!(raster.iter().filter(|&&c| c != 0).count(), 3);
        assert!(apply_mask(&mut raster, &mask[..4]).is_err());
    }
}

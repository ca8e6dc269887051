use crate::math::Vec3;

/// 8-bit RGB color.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Pack into an opaque `0xAARRGGBB` word.
    pub fn pack(self) -> u32 {
        pack_argb(self.r, self.g, self.b)
    }

    /// Unpack the color channels of a `0xAARRGGBB` word (alpha is dropped).
    pub fn unpack(argb: u32) -> Self {
        Self {
            r: ((argb >> 16) & 0xFF) as u8,
            g: ((argb >> 8) & 0xFF) as u8,
            b: (argb & 0xFF) as u8,
        }
    }
}

/// Build an opaque `0xAARRGGBB` pixel. A packed value of `0` marks an
/// empty raster cell, so every packed color carries alpha `0xFF`.
pub fn pack_argb(r: u8, g: u8, b: u8) -> u32 {
    0xFF00_0000 | ((r as u32) << 16) | ((g as u32) << 8) | b as u32
}

/// A 3D point with the color sampled from the color stream.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ColoredPoint {
    pub position: Vec3,
    pub color: Rgb,
    /// Depth-image row the point came from. Larger rows sit lower in the view.
    pub row: u32,
}

impl ColoredPoint {
    pub fn new(position: Vec3, color: Rgb) -> Self {
        Self {
            position,
            color,
            row: 0,
        }
    }
}

/// Integer pixel coordinate in an image. May lie outside the image bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelCoord {
    pub x: i64,
    pub y: i64,
}

impl PixelCoord {
    pub const fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }
}

/// Fixed raster dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSize {
    pub width: usize,
    pub height: usize,
}

impl ImageSize {
    pub const fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    pub fn len(&self) -> usize {
        self.width * self.height
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn largest_side(&self) -> usize {
        self.width.max(self.height)
    }

    /// Row-major index of `pixel`, or `None` when it falls outside.
    pub fn index_of(&self, pixel: PixelCoord) -> Option<usize> {
        if pixel.x < 0 || pixel.y < 0 {
            return None;
        }
        let (x, y) = (pixel.x as usize, pixel.y as usize);
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(y * self.width + x)
    }
}

bitflags::bitflags! {
    /// Sensor streams consumed by the pipeline.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[repr(C)]
    pub struct Streams: u32 {
        const DEPTH = 1 << 0;
        const COLOR = 1 << 1;
    }
}

impl Default for Streams {
    fn default() -> Self {
        Streams::DEPTH | Streams::COLOR
    }
}

//! C FFI layer for depthplane.
//!
//! Exposes plane estimation, dilation and orientation queries to C/C++/C#
//! hosts through opaque handles. The generated C header is written to
//! `include/depthplane.h` by cbindgen.

use crate::config::OrientationConfig;
use crate::dilation::dilate_in_place;
use crate::error::LastError;
use crate::math::Vec3;
use crate::orientation::OrientationClient;
use crate::ransac::{PlaneEstimator, RansacConfig};
use crate::types::{ColoredPoint, Rgb};
use crate::DepthPlaneError;
use std::ffi::{c_char, c_int, CStr};

/// Last error message for C consumers.
static LAST_ERROR: LastError = LastError::new();

/// Opaque plane estimator handle for C consumers.
pub struct DpEstimator(PlaneEstimator);

/// Opaque orientation client handle for C consumers.
pub struct DpOrientationClient(OrientationClient);

/// Colored point in C-compatible layout.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct DpPoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Packed 0xAARRGGBB.
    pub color: u32,
    /// Depth-image row the point came from.
    pub row: u32,
}

/// Plane estimate in C-compatible layout.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct DpPlane {
    /// Not normalized.
    pub normal: [f64; 3],
    /// Anchor point on the plane.
    pub point: [f64; 3],
    /// `-(normal . point)`
    pub offset: f64,
    pub inliers: u64,
    pub iterations: u64,
}

impl From<&DpPoint> for ColoredPoint {
    fn from(p: &DpPoint) -> Self {
        ColoredPoint {
            position: Vec3::new(p.x, p.y, p.z),
            color: Rgb::unpack(p.color),
            row: p.row,
        }
    }
}

fn size_args(width: c_int, height: c_int) -> Option<(usize, usize)> {
    if width < 0 || height < 0 {
        LAST_ERROR.set(&DepthPlaneError::InvalidDimensions {
            width: width.max(0) as usize,
            height: height.max(0) as usize,
        });
        return None;
    }
    Some((width as usize, height as usize))
}

/// Create a plane estimator.
/// `seed`: 0 = seed from OS entropy.
/// Non-positive `max_iterations` or fractions/distances fall back to defaults.
#[no_mangle]
pub extern "C" fn dp_estimator_new(
    max_iterations: c_int,
    min_inlier_fraction: f64,
    inlier_distance: f64,
    seed: u64,
) -> *mut DpEstimator {
    let mut config = RansacConfig::default().with_seed(seed);
    if max_iterations > 0 {
        config = config.with_max_iterations(max_iterations as usize);
    }
    if min_inlier_fraction > 0.0 && min_inlier_fraction <= 1.0 {
        config = config.with_min_inlier_fraction(min_inlier_fraction);
    }
    if inlier_distance > 0.0 && inlier_distance.is_finite() {
        config = config.with_inlier_distance(inlier_distance);
    }
    Box::into_raw(Box::new(DpEstimator(PlaneEstimator::new(config))))
}

/// Free an estimator.
///
/// # Safety
/// `est` must be a pointer returned by `dp_estimator_new`, or null.
#[no_mangle]
pub unsafe extern "C" fn dp_estimator_free(est: *mut DpEstimator) {
    if !est.is_null() {
        drop(Box::from_raw(est));
    }
}

/// Estimate the dominant plane of `count` points.
/// Returns 1 and fills `out` when a plane was found, 0 when none was,
/// -1 on invalid arguments.
///
/// # Safety
/// `est` and `out` must be valid pointers, or null. `points` must point to
/// `count` `DpPoint` elements.
#[no_mangle]
pub unsafe extern "C" fn dp_estimate_plane(
    est: *mut DpEstimator,
    points: *const DpPoint,
    count: usize,
    out: *mut DpPlane,
) -> c_int {
    if est.is_null() || out.is_null() || (points.is_null() && count > 0) {
        return -1;
    }
    let est = &mut *est;
    let points: Vec<ColoredPoint> = if count == 0 {
        Vec::new()
    } else {
        std::slice::from_raw_parts(points, count)
            .iter()
            .map(ColoredPoint::from)
            .collect()
    };

    match est.0.estimate_auto(&points) {
        Some(estimate) => {
            let n = estimate.plane.normal();
            let p = estimate.plane.point();
            out.write(DpPlane {
                normal: [n.x, n.y, n.z],
                point: [p.x, p.y, p.z],
                offset: estimate.plane.offset(),
                inliers: estimate.inlier_count as u64,
                iterations: estimate.iterations as u64,
            });
            1
        }
        None => 0,
    }
}

/// Dilate a boolean mask stored one byte per cell (0 = unset).
/// Returns the number of cells filled, or -1 on error.
///
/// # Safety
/// `cells` must point to `width * height` bytes, or be null.
#[no_mangle]
pub unsafe extern "C" fn dp_dilate_mask(cells: *mut u8, width: c_int, height: c_int) -> c_int {
    let Some((w, h)) = size_args(width, height) else {
        return -1;
    };
    if cells.is_null() {
        return -1;
    }
    let cells = std::slice::from_raw_parts_mut(cells, w * h);
    let mut mask: Vec<bool> = cells.iter().map(|&c| c != 0).collect();
    match dilate_in_place(&mut mask, w, h) {
        Ok(filled) => {
            for (c, &m) in cells.iter_mut().zip(&mask) {
                if m && *c == 0 {
                    *c = 1;
                }
            }
            filled as c_int
        }
        Err(e) => {
            LAST_ERROR.set(&e);
            -1
        }
    }
}

/// Dilate a packed 0xAARRGGBB raster (0 = empty).
/// Returns the number of cells filled, or -1 on error.
///
/// # Safety
/// `cells` must point to `width * height` pixels, or be null.
#[no_mangle]
pub unsafe extern "C" fn dp_dilate_color(cells: *mut u32, width: c_int, height: c_int) -> c_int {
    let Some((w, h)) = size_args(width, height) else {
        return -1;
    };
    if cells.is_null() {
        return -1;
    }
    let cells = std::slice::from_raw_parts_mut(cells, w * h);
    match dilate_in_place(cells, w, h) {
        Ok(filled) => filled as c_int,
        Err(e) => {
            LAST_ERROR.set(&e);
            -1
        }
    }
}

/// Create an orientation client. `addr` = "host:port", or null for the
/// default `127.0.0.1:8080`. `timeout_ms` <= 0 keeps the default timeout.
///
/// # Safety
/// `addr` must be a valid null-terminated string, or null.
#[no_mangle]
pub unsafe extern "C" fn dp_orientation_open(
    addr: *const c_char,
    timeout_ms: c_int,
) -> *mut DpOrientationClient {
    let mut config = OrientationConfig::default();
    if !addr.is_null() {
        config = config.with_addr(CStr::from_ptr(addr).to_string_lossy().into_owned());
    }
    if timeout_ms > 0 {
        config = config.with_timeout(std::time::Duration::from_millis(timeout_ms as u64));
    }
    Box::into_raw(Box::new(DpOrientationClient(OrientationClient::new(config))))
}

/// Free an orientation client.
///
/// # Safety
/// `client` must be a pointer returned by `dp_orientation_open`, or null.
#[no_mangle]
pub unsafe extern "C" fn dp_orientation_close(client: *mut DpOrientationClient) {
    if !client.is_null() {
        drop(Box::from_raw(client));
    }
}

/// Query the device orientation into `out` as x, y, z (all zero when the
/// phone has no reading). Returns 0 on success, -1 on error.
///
/// # Safety
/// `client` must be a valid client pointer, or null. `out` must point to
/// 3 doubles, or be null.
#[no_mangle]
pub unsafe extern "C" fn dp_orientation_query(
    client: *const DpOrientationClient,
    out: *mut f64,
) -> c_int {
    if client.is_null() || out.is_null() {
        return -1;
    }
    let client = &*client;
    match client.0.orientation() {
        Ok(v) => {
            std::slice::from_raw_parts_mut(out, 3).copy_from_slice(&[v.x, v.y, v.z]);
            0
        }
        Err(e) => {
            LAST_ERROR.set(&e);
            -1
        }
    }
}

/// Get the last error message. Returns NULL if no error.
/// The returned pointer is valid until the next depthplane API call.
#[no_mangle]
pub extern "C" fn dp_last_error() -> *const c_char {
    LAST_ERROR.as_ptr()
}

/// Clear the last error message.
#[no_mangle]
pub extern "C" fn dp_clear_error() {
    LAST_ERROR.clear();
}

//! Single-pass morphological dilation for sparse rasters.
//!
//! An unset interior cell is switched on when one of three masks matches:
//! - up and down neighbors are set
//! - left and right neighbors are set
//! - all four diagonal neighbors are set
//!
//! The pass runs row-major and writes in place, so a cell filled earlier in
//! the pass is visible to the cells after it. Border rows and columns are
//! never written.

use crate::{DepthPlaneError, Result};

/// A raster cell the dilation filter can grow.
pub trait DilationCell: Copy {
    fn is_set(&self) -> bool;

    /// Value for a newly filled cell given its 8 neighbors in the order
    /// up-left, up, up-right, left, right, down-left, down, down-right.
    fn fill(neighbors: &[Self; 8]) -> Self;
}

impl DilationCell for bool {
    fn is_set(&self) -> bool {
        *self
    }

    fn fill(_neighbors: &[bool; 8]) -> bool {
        true
    }
}

/// Packed `0xAARRGGBB` pixels; `0` is an empty cell.
impl DilationCell for u32 {
    fn is_set(&self) -> bool {
        *self != 0
    }

    /// Channel-wise mean over the set neighbors, alpha forced opaque.
    fn fill(neighbors: &[u32; 8]) -> u32 {
        let (mut r, mut g, mut b, mut cnt) = (0u32, 0u32, 0u32, 0u32);
        for &c in neighbors.iter().filter(|c| **c != 0) {
            cnt += 1;
            r += (c >> 16) & 0xFF;
            g += (c >> 8) & 0xFF;
            b += c & 0xFF;
        }
        if cnt == 0 {
            return 0;
        }
        0xFF00_0000 | ((r / cnt) << 16) | ((g / cnt) << 8) | (b / cnt)
    }
}

/// Dilate `grid` and return it.
pub fn dilate<T: DilationCell>(mut grid: Vec<T>, width: usize, height: usize) -> Result<Vec<T>> {
    dilate_in_place(&mut grid, width, height)?;
    Ok(grid)
}

/// Dilate `grid` in place. Returns the number of cells switched on.
pub fn dilate_in_place<T: DilationCell>(
    grid: &mut [T],
    width: usize,
    height: usize,
) -> Result<usize> {
    let expected = width * height;
    if grid.len() != expected {
        return Err(DepthPlaneError::RasterSize {
            expected,
            actual: grid.len(),
        });
    }
    if width < 3 || height < 3 {
        return Ok(0);
    }

    let mut filled = 0;
    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let ind = y * width + x;
            if grid[ind].is_set() {
                continue;
            }

            let above = ind - width;
            let below = ind + width;
            let n = [
                grid[above - 1],
                grid[above],
                grid[above + 1],
                grid[ind - 1],
                grid[ind + 1],
                grid[below - 1],
                grid[below],
                grid[below + 1],
            ];
            let [up_left, up, up_right, left, right, down_left, down, down_right] = n;

            let vertical = up.is_set() && down.is_set();
            let horizontal = left.is_set() && right.is_set();
            let corners = up_left.is_set()
                && up_right.is_set()
                && down_left.is_set()
                && down_right.is_set();

            if vertical || horizontal || corners {
                grid[ind] = T::fill(&n);
                filled += 1;
            }
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask(cells: &[usize], width: usize, height: usize) -> Vec<bool> {
        let mut g = vec![false; width * height];
        for &c in cells {
            g[c] = true;
        }
        g
    }

    #[test]
    fn test_up_down_fills_center() {
        // 3x3, indices: up = 1, down = 7, center = 4
        let out = dilate(mask(&[1, 7], 3, 3), 3, 3).unwrap();
        assert!(out[4]);
    }

    #[test]
    fn test_left_only_leaves_center() {
        let out = dilate(mask(&[3], 3, 3), 3, 3).unwrap();
        assert!(!out[4]);
    }

    #[test]
    fn test_left_right_and_corners() {
        assert!(dilate(mask(&[3, 5], 3, 3), 3, 3).unwrap()[4]);
        assert!(dilate(mask(&[0, 2, 6, 8], 3, 3), 3, 3).unwrap()[4]);
        // Three corners are not enough.
        assert!(!dilate(mask(&[0, 2, 6], 3, 3), 3, 3).unwrap()[4]);
    }

    #[test]
    fn test_saturated_grid_unchanged() {
        let grid = vec![true; 5 * 4];
        assert_eq!(dilate(grid.clone(), 5, 4).unwrap(), grid);

        let colors = vec![0xFF10_2030u32; 16];
        assert_eq!(dilate(colors.clone(), 4, 4).unwrap(), colors);
    }

    #[test]
    fn test_border_never_modified() {
        // Column 0 has set cells above and below row 1, but it is a border.
        let (w, h) = (4, 3);
        let mut grid = mask(&[0, 8], w, h);
        let filled = dilate_in_place(&mut grid, w, h).unwrap();
        assert_eq!(filled, 0);
        assert!(!grid[4]);
    }

    #[test]
    fn test_in_place_propagation() {
        // 5x3: (1,1) fills from up/down. (2,1) only has a left neighbor once
        // (1,1) has been written earlier in the same pass.
        let (w, h) = (5, 3);
        let mut grid = mask(&[1, 11, 8], w, h);
        let filled = dilate_in_place(&mut grid, w, h).unwrap();
        assert!(grid[6]);
        assert!(grid[7]);
        assert_eq!(filled, 2);
    }

    #[test]
    fn test_color_average_uses_all_set_neighbors() {
        // Up and down set (qualifies), plus a set up-left corner that also
        // contributes to the average.
        let mut grid = vec![0u32; 9];
        grid[0] = 0xFF00_0030;
        grid[1] = 0xFF30_0000;
        grid[7] = 0xFF00_3000;
        let out = dilate(grid, 3, 3).unwrap();
        assert_eq!(out[4], 0xFF10_1010);
    }

    #[test]
    fn test_size_mismatch() {
        let err = dilate(vec![false; 8], 3, 3).unwrap_err();
        assert!(matches!(
            err,
            DepthPlaneError::RasterSize {
                expected: 9,
                actual: 8
            }
        ));
    }

    #[test]
    fn test_tiny_grid_is_noop() {
        let grid = vec![true, false, true, false];
        assert_eq!(dilate(grid.clone(), 2, 2).unwrap(), grid);
    }
}

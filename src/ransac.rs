//! RANSAC estimation of the dominant plane in a point cloud.
//!
//! Every hypothesis is the triangle `(anchor, p1, p2)` where `p1` and `p2`
//! are drawn without replacement by a partial Fisher-Yates shuffle over the
//! points other than the anchor. The best hypothesis is only replaced by a strictly
//! larger inlier count, so the search is anytime: capping iterations trades
//! quality for latency and never makes the result worse than a shorter run
//! with the same random stream.

use crate::cloud::PointKey;
use crate::plane::Plane;
use crate::types::ColoredPoint;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;

/// How the anchor point is chosen when the caller does not supply one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorStrategy {
    /// Uniformly random point.
    Random,
    /// The point from the lowest image row, on the assumption that the
    /// floor fills the bottom of the view.
    Lowest,
}

/// Configuration for plane RANSAC.
#[derive(Debug, Clone, PartialEq)]
pub struct RansacConfig {
    /// Hard cap on hypotheses per estimate.
    /// Default: 100
    pub max_iterations: usize,

    /// Stop early once this fraction of all points are inliers.
    /// Default: 0.2
    pub min_inlier_fraction: f64,

    /// Distance below which a point counts toward a hypothesis' score.
    /// Default: 0.01
    pub inlier_distance: f64,

    /// Looser distance collecting the plane-adjacent band used for masking.
    /// Default: 0.1
    pub band_distance: f64,

    /// Grid size used to deduplicate band points.
    /// Default: 0.001
    pub band_precision: f64,

    /// Anchor selection for `estimate_auto`.
    /// Default: `AnchorStrategy::Random`
    pub anchor: AnchorStrategy,

    /// Random seed. 0 = seed from OS entropy.
    /// Default: 0
    pub seed: u64,
}

impl Default for RansacConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            min_inlier_fraction: 0.2,
            inlier_distance: 0.01,
            band_distance: 0.1,
            band_precision: 0.001,
            anchor: AnchorStrategy::Random,
            seed: 0,
        }
    }
}

impl RansacConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_iterations(mut self, iterations: usize) -> Self {
        self.max_iterations = iterations;
        self
    }

    pub fn with_min_inlier_fraction(mut self, fraction: f64) -> Self {
        self.min_inlier_fraction = fraction;
        self
    }

    pub fn with_inlier_distance(mut self, distance: f64) -> Self {
        self.inlier_distance = distance;
        self
    }

    pub fn with_band_distance(mut self, distance: f64) -> Self {
        self.band_distance = distance;
        self
    }

    pub fn with_anchor(mut self, anchor: AnchorStrategy) -> Self {
        self.anchor = anchor;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Inlier count that ends the search early for a cloud of `total` points.
    pub fn target_inliers(&self, total: usize) -> usize {
        let target = (total as f64 * self.min_inlier_fraction).floor();
        (target.max(1.0) as usize).min(total)
    }
}

/// Result of a successful estimate.
#[derive(Debug, Clone)]
pub struct PlaneEstimate {
    pub plane: Plane,
    /// Points closer than `inlier_distance` to `plane`.
    pub inlier_count: usize,
    /// Hypotheses evaluated before stopping.
    pub iterations: usize,
    /// Deduplicated points closer than `band_distance` to `plane`.
    pub band: Vec<ColoredPoint>,
}

/// Plane RANSAC with reusable scratch buffers and its own random stream.
pub struct PlaneEstimator {
    config: RansacConfig,
    rng: StdRng,
    order: Vec<usize>,
    band: Vec<usize>,
    best_band: Vec<usize>,
}

impl PlaneEstimator {
    pub fn new(config: RansacConfig) -> Self {
        let rng = if config.seed == 0 {
            StdRng::from_entropy()
        } else {
            StdRng::seed_from_u64(config.seed)
        };
        Self {
            config,
            rng,
            order: Vec::new(),
            band: Vec::new(),
            best_band: Vec::new(),
        }
    }

    pub fn config(&self) -> &RansacConfig {
        &self.config
    }

    /// Estimate with an anchor picked by the configured `AnchorStrategy`.
    pub fn estimate_auto(&mut self, points: &[ColoredPoint]) -> Option<PlaneEstimate> {
        if points.len() < 3 {
            return None;
        }
        let anchor = match self.config.anchor {
            AnchorStrategy::Random => points[self.rng.gen_range(0..points.len())],
            AnchorStrategy::Lowest => {
                let mut lowest = points[0];
                for p in &points[1..] {
                    if p.row > lowest.row {
                        lowest = *p;
                    }
                }
                lowest
            }
        };
        self.estimate(points, &anchor)
    }

    /// Fit the dominant plane through `anchor`.
    ///
    /// Points at the anchor's position are never drawn as `p1` or `p2`.
    /// Returns `None` for fewer than three points, fewer than two points
    /// away from the anchor, or when every hypothesis was degenerate or
    /// scored zero inliers.
    pub fn estimate(
        &mut self,
        points: &[ColoredPoint],
        anchor: &ColoredPoint,
    ) -> Option<PlaneEstimate> {
        let total = points.len();
        if total < 3 {
            return None;
        }

        let target = self.config.target_inliers(total);
        self.order.clear();
        self.order.extend((0..total).filter(|&i| points[i].position != anchor.position));
        let remaining = self.order.len();
        if remaining < 2 {
            return None;
        }
        self.best_band.clear();

        let mut best: Option<Plane> = None;
        let mut best_count = 0usize;
        let mut iterations = 0usize;

        while best_count < target && iterations < self.config.max_iterations {
            iterations += 1;

            for slot in 0..2 {
                let pick = self.rng.gen_range(slot..remaining);
                self.order.swap(slot, pick);
            }
            let p1 = points[self.order[0]].position;
            let p2 = points[self.order[1]].position;
            let candidate = Plane::from_points(anchor.position, p1, p2);

            let count = self.score(&candidate, points);
            if count > best_count {
                best_count = count;
                best = Some(candidate);
                std::mem::swap(&mut self.best_band, &mut self.band);
            }
        }

        let plane = best?;
        log::trace!(
            "RANSAC: {} inliers of {} after {} iterations",
            best_count,
            total,
            iterations
        );

        Some(PlaneEstimate {
            plane,
            inlier_count: best_count,
            iterations,
            band: self.collect_band(points),
        })
    }

    /// Count inliers and gather the band indices into the scratch buffer.
    fn score(&mut self, candidate: &Plane, points: &[ColoredPoint]) -> usize {
        self.band.clear();
        if candidate.is_degenerate() {
            return 0;
        }
        let mut count = 0;
        for (i, p) in points.iter().enumerate() {
            let d = candidate.distance(p.position);
            if d < self.config.inlier_distance {
                count += 1;
            }
            if d < self.config.band_distance {
                self.band.push(i);
            }
        }
        count
    }

    fn collect_band(&self, points: &[ColoredPoint]) -> Vec<ColoredPoint> {
        let mut seen = HashSet::with_capacity(self.best_band.len());
        self.best_band
            .iter()
            .map(|&i| points[i])
            .filter(|p| match PointKey::quantize(p.position, self.config.band_precision) {
                Some(key) => seen.insert(key),
                None => false,
            })
            .collect()
    }
}

/// Count the points of `points` within `distance` of `plane`.
pub fn count_inliers(plane: &Plane, points: &[ColoredPoint], distance: f64) -> usize {
    points
        .iter()
        .filter(|p| plane.distance(p.position) < distance)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vec3;
    use crate::types::Rgb;

    fn point(x: f64, y: f64, z: f64) -> ColoredPoint {
        ColoredPoint::new(Vec3::new(x, y, z), Rgb::BLACK)
    }

    fn floor_with_outliers(on_plane: usize, outliers: usize, seed: u64) -> Vec<ColoredPoint> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut pts = Vec::with_capacity(on_plane + outliers);
        for _ in 0..on_plane {
            pts.push(point(rng.gen_range(-10.0..10.0), rng.gen_range(-10.0..10.0), 5.0));
        }
        for _ in 0..outliers {
            pts.push(point(
                rng.gen_range(-10.0..10.0),
                rng.gen_range(-10.0..10.0),
                rng.gen_range(0.0..4.5),
            ));
        }
        pts
    }

    #[test]
    fn test_too_few_points() {
        let mut est = PlaneEstimator::new(RansacConfig::default().with_seed(1));
        let pts = vec![point(0.0, 0.0, 0.0), point(1.0, 0.0, 0.0)];
        assert!(est.estimate(&pts, &pts[0]).is_none());
        assert!(est.estimate_auto(&pts).is_none());
        assert!(est.estimate_auto(&[]).is_none());
    }

    #[test]
    fn test_single_iteration_never_redraws_anchor() {
        let pts = vec![
            point(0.0, 0.0, 1.0),
            point(1.0, 0.0, 1.0),
            point(0.0, 1.0, 1.0),
        ];
        for seed in 1..=200 {
            let config = RansacConfig::default()
                .with_max_iterations(1)
                .with_seed(seed);
            let mut est = PlaneEstimator::new(config.clone());
            let result = est.estimate(&pts, &pts[0]);
            assert!(result.is_some(), "seed {} found no plane", seed);
            assert_eq!(result.unwrap().inlier_count, 3);

            let mut est = PlaneEstimator::new(config);
            assert!(est.estimate_auto(&pts).is_some(), "seed {} (auto)", seed);
        }
    }

    #[test]
    fn test_points_at_anchor_are_not_sampled() {
        let mut pts = vec![point(0.0, 0.0, 2.0); 6];
        pts.push(point(1.0, 0.0, 2.0));
        pts.push(point(0.0, 1.0, 2.0));
        for seed in 1..=50 {
            let config = RansacConfig::default()
                .with_max_iterations(1)
                .with_seed(seed);
            let mut est = PlaneEstimator::new(config);
            let result = est.estimate(&pts, &pts[0]).expect("plane");
            assert_eq!(result.inlier_count, 8);
        }

        // Only one point away from the anchor: no triangle can be formed.
        let mut est = PlaneEstimator::new(RansacConfig::default().with_seed(2));
        assert!(est.estimate(&pts[..7], &pts[0]).is_none());
    }

    #[test]
    fn test_collinear_points_yield_none() {
        let pts: Vec<_> = (0..20).map(|i| point(i as f64, i as f64, i as f64)).collect();
        let mut est = PlaneEstimator::new(RansacConfig::default().with_seed(3));
        assert!(est.estimate(&pts, &pts[0]).is_none());
    }

    #[test]
    fn test_floor_with_outliers() {
        let pts = floor_with_outliers(10_000, 50, 11);
        let config = RansacConfig::default()
            .with_inlier_distance(0.01)
            .with_min_inlier_fraction(1.0 / 5.0)
            .with_max_iterations(100)
            .with_seed(7);
        let mut est = PlaneEstimator::new(config);
        let result = est.estimate(&pts, &pts[0]).expect("plane");

        let n = result.plane.normal().normalized().unwrap();
        assert!(n.cross(Vec3::FORWARD).magnitude() < 1e-9, "normal {:?}", n);
        assert!(result.inlier_count >= 8_000, "inliers {}", result.inlier_count);
        assert!(result.iterations <= 100);
    }

    #[test]
    fn test_more_iterations_never_worse() {
        // Half the points on a plane, half scattered: enough noise that the
        // early-exit target is rarely met in the first few hypotheses.
        let pts = floor_with_outliers(300, 300, 5);
        let config = RansacConfig::default()
            .with_inlier_distance(0.05)
            .with_min_inlier_fraction(0.9)
            .with_seed(99);

        let mut previous = 0;
        for cap in [1, 2, 5, 10, 25, 60] {
            let mut est = PlaneEstimator::new(config.clone().with_max_iterations(cap));
            let count = est
                .estimate(&pts, &pts[0])
                .map(|r| r.inlier_count)
                .unwrap_or(0);
            assert!(count >= previous, "cap {} gave {} < {}", cap, count, previous);
            previous = count;
        }
    }

    #[test]
    fn test_band_is_wider_and_deduplicated() {
        let mut pts = Vec::new();
        for x in 0..10 {
            for y in 0..10 {
                pts.push(point(x as f64, y as f64, 0.0));
            }
        }
        // Near the plane but outside the tight tolerance.
        for x in 0..5 {
            pts.push(point(x as f64 + 0.5, 0.5, 0.05));
        }
        // Exact duplicates of a plane point.
        pts.push(point(3.0, 3.0, 0.0));
        pts.push(point(3.0, 3.0, 0.0));

        let config = RansacConfig::default()
            .with_min_inlier_fraction(1.0)
            .with_max_iterations(200)
            .with_seed(21);
        let mut est = PlaneEstimator::new(config);
        let result = est.estimate(&pts, &pts[0]).unwrap();

        assert_eq!(result.inlier_count, 102);
        assert_eq!(result.band.len(), 105);
        assert_eq!(count_inliers(&result.plane, &pts, 0.01), result.inlier_count);
    }

    #[test]
    fn test_lowest_anchor_strategy() {
        let mut pts = floor_with_outliers(200, 0, 8);
        for (i, p) in pts.iter_mut().enumerate() {
            p.row = i as u32;
        }
        // Lowest row is an off-plane point: the estimate must pass through it.
        pts.push(ColoredPoint {
            position: Vec3::new(0.0, 0.0, 9.0),
            color: Rgb::BLACK,
            row: 10_000,
        });
        let config = RansacConfig::default()
            .with_anchor(AnchorStrategy::Lowest)
            .with_seed(4);
        let mut est = PlaneEstimator::new(config);
        let result = est.estimate_auto(&pts).unwrap();
        assert!(result.plane.distance(Vec3::new(0.0, 0.0, 9.0)) < 1e-9);
    }

    #[test]
    fn test_target_inliers() {
        let config = RansacConfig::default();
        assert_eq!(config.target_inliers(10_050), 2_010);
        assert_eq!(config.target_inliers(3), 1);
        let strict = config.with_min_inlier_fraction(2.0);
        assert_eq!(strict.target_inliers(10), 10);
    }
}

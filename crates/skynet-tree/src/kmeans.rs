//! Seeded k-means (k-means++ initialization, Lloyd iterations).
//!
//! Identical input, `k` and seed always produce identical assignments.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[derive(Debug, Clone)]
pub struct Kmeans {
    k: usize,
    max_iter: usize,
    seed: u64,
}

impl Kmeans {
    pub fn new(k: usize) -> Self { Self { k, max_iter: 100, seed: 0 } }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Cluster index in `0..k` for every point. `k` is clamped to `1..=points.len()`.
    /// Iterates until no assignment changes or `max_iter` rounds have run.
    pub fn fit(&self, points: &[&[f32]]) -> Vec<usize> {
        let n = points.len();
        if n == 0 {
            return Vec::new();
        }
        let k = self.k.clamp(1, n);
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut centroids = init_centroids(points, k, &mut rng);
        let mut labels = vec![usize::MAX; n];

        for _ in 0..self.max_iter.max(1) {
            let mut changed = false;
            for (label, point) in labels.iter_mut().zip(points) {
                let nearest = nearest(point, &centroids);
                if *label != nearest {
                    *label = nearest;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
            update_centroids(points, &labels, &mut centroids);
        }
        labels
    }
}

fn squared_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Closest centroid; the lowest index wins ties.
fn nearest(point: &[f32], centroids: &[Vec<f32>]) -> usize {
    let mut best = 0;
    let mut best_dist = f32::INFINITY;
    for (c, centroid) in centroids.iter().enumerate() {
        let d = squared_distance(point, centroid);
        if d < best_dist {
            best = c;
            best_dist = d;
        }
    }
    best
}

fn init_centroids(points: &[&[f32]], k: usize, rng: &mut StdRng) -> Vec<Vec<f32>> {
    let n = points.len();
    let mut centroids: Vec<Vec<f32>> = Vec::with_capacity(k);
    centroids.push(points[rng.gen_range(0..n)].to_vec());

    let mut min_dist: Vec<f64> = points.iter().map(|p| f64::from(squared_distance(p, &centroids[0]))).collect();
    while centroids.len() < k {
        let total: f64 = min_dist.iter().sum();
        let chosen = if total <= 0.0 {
            rng.gen_range(0..n)
        } else {
            let threshold = rng.gen::<f64>() * total;
            let mut cumsum = 0.0;
            let mut selected = None;
            for (i, &d) in min_dist.iter().enumerate() {
                cumsum += d;
                if d > 0.0 && cumsum >= threshold {
                    selected = Some(i);
                    break;
                }
            }
            // Rounding can leave the threshold just above the final sum.
            selected.or_else(|| min_dist.iter().rposition(|&d| d > 0.0)).unwrap_or(0)
        };
        let centroid = points[chosen].to_vec();
        for (dist, p) in min_dist.iter_mut().zip(points) {
            *dist = dist.min(f64::from(squared_distance(p, &centroid)));
        }
        centroids.push(centroid);
    }
    centroids
}

/// Move each centroid to the mean of its points. Empty clusters keep their centroid.
fn update_centroids(points: &[&[f32]], labels: &[usize], centroids: &mut [Vec<f32>]) {
    let dim = centroids.first().map_or(0, Vec::len);
    let mut sums = vec![vec![0f64; dim]; centroids.len()];
    let mut counts = vec![0usize; centroids.len()];
    for (point, &label) in points.iter().zip(labels) {
        counts[label] += 1;
        for (s, &v) in sums[label].iter_mut().zip(point.iter()) {
            *s += f64::from(v);
        }
    }
    for ((centroid, sum), &count) in centroids.iter_mut().zip(&sums).zip(&counts) {
        if count == 0 {
            continue;
        }
        for (c, s) in centroid.iter_mut().zip(sum) {
            *c = (s / count as f64) as f32;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blobs() -> Vec<Vec<f32>> {
        let mut pts = Vec::new();
        for i in 0..10 {
            let jitter = i as f32 * 0.01;
            pts.push(vec![0.0 + jitter, 0.0]);
            pts.push(vec![10.0 + jitter, 10.0]);
        }
        pts
    }

    #[test]
    fn separates_well_spread_blobs() {
        let pts = blobs();
        let refs: Vec<&[f32]> = pts.iter().map(Vec::as_slice).collect();
        let labels = Kmeans::new(2).with_seed(7).fit(&refs);
        for pair in labels.chunks(2) {
            assert_ne!(pair[0], pair[1]);
        }
        assert!(labels.iter().step_by(2).all(|&l| l == labels[0]));
    }

    #[test]
    fn same_seed_same_assignments() {
        let pts = blobs();
        let refs: Vec<&[f32]> = pts.iter().map(Vec::as_slice).collect();
        let a = Kmeans::new(3).with_seed(42).fit(&refs);
        let b = Kmeans::new(3).with_seed(42).fit(&refs);
        assert_eq!(a, b);
    }

    #[test]
    fn identical_points_and_oversized_k() {
        let pts = vec![vec![1.0, 1.0]; 3];
        let refs: Vec<&[f32]> = pts.iter().map(Vec::as_slice).collect();
        let labels = Kmeans::new(10).fit(&refs);
        assert_eq!(labels.len(), 3);
        assert!(labels.iter().all(|&l| l < 3));
        assert!(Kmeans::new(2).fit(&[]).is_empty());
    }
}

//! Capacity-bounded geographic clustering
//!
//! k-means over (lat, lng) treated as a plane, seeded deterministically, then
//! a legality repair that moves overflow into the emptiest buses.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::defaults::{KMEANS_ITERATIONS, KMEANS_SEED};
use crate::error::CapacityError;
use crate::types::Coordinates;

type Planar = (f64, f64);

fn dist2(a: Planar, b: Planar) -> f64 {
    (a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)
}

/// Student index sets, one per bus
pub type Clusters = Vec<Vec<usize>>;

#[derive(Debug, Clone, Copy)]
pub struct Clusterer {
    iterations: usize,
    seed: u64,
}

impl Default for Clusterer {
    fn default() -> Self {
        Self {
            iterations: KMEANS_ITERATIONS,
            seed: KMEANS_SEED,
        }
    }
}

impl Clusterer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exactly `bus_count` clusters (some possibly empty) covering every
    /// student once, none larger than `capacity`
    pub fn cluster(
        &self,
        students: &[Coordinates],
        bus_count: usize,
        capacity: usize,
    ) -> Result<Clusters, CapacityError> {
        let n = students.len();
        if n == 0 {
            return Ok(vec![Vec::new(); bus_count]);
        }
        if n > bus_count.saturating_mul(capacity) {
            return Err(CapacityError {
                students: n,
                buses: bus_count,
                capacity,
            });
        }

        let labels = self.labels(students, bus_count);
        let mut bins: Clusters = vec![Vec::new(); bus_count];
        for (student, label) in labels.into_iter().enumerate() {
            bins[label.min(bus_count - 1)].push(student);
        }

        let mut overflow = Vec::new();
        for bin in bins.iter_mut() {
            if bin.len() > capacity {
                overflow.extend(bin.drain(capacity..));
            }
        }
        if !overflow.is_empty() {
            debug!("Repairing {} students over capacity", overflow.len());
        }

        for student in overflow {
            let target = (0..bus_count)
                .min_by_key(|&b| bins[b].len())
                .unwrap_or_default();
            // full only if every bus is full, which the capacity check rules out
            if bins[target].len() < capacity {
                bins[target].push(student);
            }
        }

        Ok(bins)
    }

    /// Cluster label per student
    pub fn labels(&self, students: &[Coordinates], k: usize) -> Vec<usize> {
        let n = students.len();
        if k <= 1 || n == 0 {
            return vec![0; n];
        }
        let k = k.min(n);
        let points: Vec<Planar> = students.iter().map(|c| (c.lat, c.lng)).collect();

        let mut centroids = self.seed_centroids(&points, k);
        let mut labels = vec![0; n];

        for _ in 0..self.iterations {
            for (label, &p) in labels.iter_mut().zip(&points) {
                *label = nearest(&centroids, p);
            }
            for (c, centroid) in centroids.iter_mut().enumerate() {
                let members: Vec<Planar> = points
                    .iter()
                    .zip(&labels)
                    .filter(|(_, label)| **label == c)
                    .map(|(&p, _)| p)
                    .collect();
                if !members.is_empty() {
                    let count = members.len() as f64;
                    *centroid = (
                        members.iter().map(|p| p.0).sum::<f64>() / count,
                        members.iter().map(|p| p.1).sum::<f64>() / count,
                    );
                }
            }
        }

        labels
    }

    /// First centroid is the first point of a fixed-seed shuffle; each next
    /// one is the point farthest from all chosen so far
    fn seed_centroids(&self, points: &[Planar], k: usize) -> Vec<Planar> {
        let mut shuffled = points.to_vec();
        shuffled.shuffle(&mut ChaCha8Rng::seed_from_u64(self.seed));

        let mut centroids = vec![shuffled[0]];
        while centroids.len() < k {
            let mut best = (0, -1.0);
            for (i, &p) in shuffled.iter().enumerate() {
                let d = centroids
                    .iter()
                    .map(|&c| dist2(p, c))
                    .fold(f64::INFINITY, f64::min);
                if d > best.1 {
                    best = (i, d);
                }
            }
            centroids.push(shuffled[best.0]);
        }
        centroids
    }
}

/// Index of the nearest centroid, lowest index on ties
fn nearest(centroids: &[Planar], p: Planar) -> usize {
    let mut best = (0, f64::INFINITY);
    for (c, &centroid) in centroids.iter().enumerate() {
        let d = dist2(p, centroid);
        if d < best.1 {
            best = (c, d);
        }
    }
    best.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(n: usize) -> Vec<Coordinates> {
        (0..n)
            .map(|i| {
                Coordinates::new(
                    24.6 + (i % 7) as f64 * 0.013,
                    46.6 + (i / 7) as f64 * 0.017,
                )
            })
            .collect()
    }

    fn assert_partition(clusters: &Clusters, n: usize, capacity: usize) {
        let mut seen: Vec<usize> = clusters.iter().flatten().copied().collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..n).collect::<Vec<_>>());
        assert!(clusters.iter().all(|c| c.len() <= capacity));
    }

    #[test]
    fn test_capacity_error() {
        let err = Clusterer::new().cluster(&grid(3), 2, 1).unwrap_err();
        assert_eq!(
            err,
            CapacityError {
                students: 3,
                buses: 2,
                capacity: 1
            }
        );
    }

    #[test]
    fn test_no_students_gives_empty_bins() {
        let clusters = Clusterer::new().cluster(&[], 3, 10).unwrap();
        assert_eq!(clusters, vec![Vec::<usize>::new(); 3]);
    }

    #[test]
    fn test_single_bus_takes_everyone() {
        let clusters = Clusterer::new().cluster(&grid(5), 1, 5).unwrap();
        assert_eq!(clusters, vec![vec![0, 1, 2, 3, 4]]);
    }

    #[test]
    fn test_two_separated_groups() {
        let students = vec![
            Coordinates::new(24.60, 46.60),
            Coordinates::new(25.60, 47.60),
            Coordinates::new(24.61, 46.61),
            Coordinates::new(25.61, 47.61),
            Coordinates::new(24.62, 46.60),
        ];

        let clusters = Clusterer::new().cluster(&students, 2, 5).unwrap();

        let mut groups: Vec<Vec<usize>> = clusters.into_iter().filter(|c| !c.is_empty()).collect();
        groups.sort();
        assert_eq!(groups, vec![vec![0, 2, 4], vec![1, 3]]);
    }

    #[test]
    fn test_partition_invariant_over_many_shapes() {
        for n in [1, 2, 5, 13, 40] {
            for buses in [1, 2, 3, 7] {
                for capacity in [1, 3, 10] {
                    let students = grid(n);
                    match Clusterer::new().cluster(&students, buses, capacity) {
                        Ok(clusters) => {
                            assert_eq!(clusters.len(), buses);
                            assert_partition(&clusters, n, capacity);
                        }
                        Err(_) => assert!(n > buses * capacity),
                    }
                }
            }
        }
    }

    #[test]
    fn test_overflow_goes_to_emptiest_bus() {
        // one tight blob of four students, two seats per bus
        let students = vec![
            Coordinates::new(24.600, 46.600),
            Coordinates::new(24.601, 46.600),
            Coordinates::new(24.600, 46.601),
            Coordinates::new(24.601, 46.601),
            Coordinates::new(26.000, 48.000),
        ];

        let clusters = Clusterer::new().cluster(&students, 3, 2).unwrap();

        assert_partition(&clusters, 5, 2);
    }

    #[test]
    fn test_clustering_is_deterministic() {
        let students = grid(23);
        let a = Clusterer::new().cluster(&students, 4, 8).unwrap();
        let b = Clusterer::new().cluster(&students, 4, 8).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_nearest_prefers_lowest_index_on_tie() {
        let centroids = [(0.0, 1.0), (0.0, -1.0)];
        assert_eq!(nearest(&centroids, (0.0, 0.0)), 0);
    }
}

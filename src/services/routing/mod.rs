//! Distance/duration matrices between the depot and every student
//!
//! Google Distance Matrix in production, scripted sources for tests. Remote
//! queries are tiled, merged in tile order, and any cell the upstream could
//! not answer is backfilled from a great-circle estimate.

pub mod departure;
mod google;
mod mock;

pub use departure::Departure;
pub use google::GoogleDistanceMatrixClient;
pub use mock::{OfflineMatrixSource, ScriptedMatrixSource};

use std::convert::Infallible;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::defaults::{MATRIX_MAX_CHUNK, SPEED_BUCKET_KMH};
use crate::error::TransportError;
use crate::services::cache::MemoCache;
use crate::services::geo::{fallback_eta_secs, haversine_rounded_m};
use crate::types::Coordinates;

/// Distance and time matrices between locations
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceTimeMatrices {
    /// Distance in meters [i][j] from location i to location j
    pub distances: Vec<Vec<u64>>,
    /// Duration in seconds [i][j] from location i to location j
    pub durations: Vec<Vec<u64>>,
    /// Number of locations
    pub size: usize,
}

impl DistanceTimeMatrices {
    pub fn zeroed(size: usize) -> Self {
        Self {
            distances: vec![vec![0; size]; size],
            durations: vec![vec![0; size]; size],
            size,
        }
    }

    /// Get distance from location i to location j in meters
    pub fn distance(&self, from: usize, to: usize) -> u64 {
        self.distances[from][to]
    }

    /// Get duration from location i to location j in seconds
    pub fn duration(&self, from: usize, to: usize) -> u64 {
        self.durations[from][to]
    }

    /// Matrices restricted to `indices`, in that order
    pub fn submatrix(&self, indices: &[usize]) -> Self {
        let slice = |m: &Vec<Vec<u64>>| -> Vec<Vec<u64>> {
            indices
                .iter()
                .map(|&i| indices.iter().map(|&j| m[i][j]).collect())
                .collect()
        };
        Self {
            distances: slice(&self.distances),
            durations: slice(&self.durations),
            size: indices.len(),
        }
    }
}

/// One answered cell of a batch query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchCell {
    pub distance_m: u64,
    /// Traffic-adjusted when the upstream provides it
    pub duration_s: u64,
}

/// Batch distance/duration query capability
#[async_trait]
pub trait DistanceMatrixSource: Send + Sync {
    /// Rows follow `origins`, columns follow `destinations`; `None` marks a
    /// cell the upstream could not answer. `Err` means the whole batch failed.
    async fn batch(
        &self,
        origins: &[Coordinates],
        destinations: &[Coordinates],
        departure: Departure,
    ) -> Result<Vec<Vec<Option<BatchCell>>>, TransportError>;

    /// Get source name for logging
    fn name(&self) -> &'static str;
}

/// Memo key: micro-degree coordinates, departure bucket, speed bucket
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MatrixKey {
    pub coords: Vec<(i64, i64)>,
    pub departure: Departure,
    pub speed_bucket_kmh: i64,
}

impl MatrixKey {
    pub fn new(points: &[Coordinates], departure: Departure, fallback_speed_kmh: f64) -> Self {
        let micro = |deg: f64| (deg * 1e6).round() as i64;
        Self {
            coords: points.iter().map(|p| (micro(p.lat), micro(p.lng))).collect(),
            departure,
            speed_bucket_kmh: ((fallback_speed_kmh / SPEED_BUCKET_KMH).round_ties_even()
                * SPEED_BUCKET_KMH) as i64,
        }
    }

    /// Points as queried upstream
    pub fn rounded_points(&self) -> Vec<Coordinates> {
        self.coords
            .iter()
            .map(|&(lat, lng)| Coordinates::new(lat as f64 / 1e6, lng as f64 / 1e6))
            .collect()
    }
}

/// Result of one matrix build
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixBuild {
    pub matrices: DistanceTimeMatrices,
    /// Directed pairs that needed the geometric estimate
    pub fallback_pairs: usize,
    pub departure: Departure,
}

pub struct MatrixProvider {
    source: Arc<dyn DistanceMatrixSource>,
    chunk: usize,
    concurrency: usize,
    cache: MemoCache<MatrixKey, Arc<MatrixBuild>>,
}

impl MatrixProvider {
    pub fn new(
        source: Arc<dyn DistanceMatrixSource>,
        chunk: usize,
        concurrency: usize,
        cache_size: usize,
    ) -> Self {
        Self {
            source,
            chunk: chunk.clamp(1, MATRIX_MAX_CHUNK),
            concurrency: concurrency.max(1),
            cache: MemoCache::new("matrix", cache_size),
        }
    }

    /// Build (or reuse) matrices for `points`; remote failures only raise
    /// the fallback count
    pub async fn build(
        &self,
        points: &[Coordinates],
        departure: Departure,
        fallback_speed_kmh: f64,
    ) -> Arc<MatrixBuild> {
        let key = MatrixKey::new(points, departure, fallback_speed_kmh);
        let result = self
            .cache
            .get_or_try_compute(key.clone(), || async {
                Ok::<_, Infallible>(Arc::new(self.compute(&key, fallback_speed_kmh).await))
            })
            .await;
        match result {
            Ok(build) => build,
            Err(never) => match never {},
        }
    }

    async fn compute(&self, key: &MatrixKey, fallback_speed_kmh: f64) -> MatrixBuild {
        let points = key.rounded_points();
        let n = points.len();
        let mut matrices = DistanceTimeMatrices::zeroed(n);

        if n > 1 {
            self.fill_remote(&points, key.departure, &mut matrices).await;
        }
        let fallback_pairs = fill_fallback(&points, fallback_speed_kmh, &mut matrices);

        info!(
            "Matrix {}x{} built via {} ({} fallback pairs)",
            n,
            n,
            self.source.name(),
            fallback_pairs
        );

        MatrixBuild {
            matrices,
            fallback_pairs,
            departure: key.departure,
        }
    }

    async fn fill_remote(
        &self,
        points: &[Coordinates],
        departure: Departure,
        matrices: &mut DistanceTimeMatrices,
    ) {
        let n = points.len();
        let chunk = self.chunk;
        let tiles: Vec<(usize, usize)> = (0..n)
            .step_by(chunk)
            .flat_map(|oi| (0..n).step_by(chunk).map(move |dj| (oi, dj)))
            .collect();
        debug!("Requesting {} matrix tiles of up to {}x{}", tiles.len(), chunk, chunk);

        let source = &self.source;
        let replies: Vec<_> = stream::iter(tiles)
            .map(|(oi, dj)| async move {
                let origins = &points[oi..(oi + chunk).min(n)];
                let destinations = &points[dj..(dj + chunk).min(n)];
                (oi, dj, source.batch(origins, destinations, departure).await)
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        for (oi, dj, reply) in replies {
            let rows = match reply {
                Ok(rows) => rows,
                Err(e) => {
                    warn!("Matrix tile ({}, {}) failed, leaving it to fallback: {}", oi, dj, e);
                    continue;
                }
            };
            for (r, row) in rows.into_iter().enumerate() {
                for (c, cell) in row.into_iter().enumerate() {
                    let (i, j) = (oi + r, dj + c);
                    if i >= n || j >= n || i == j {
                        continue;
                    }
                    if let Some(cell) = cell {
                        matrices.distances[i][j] = cell.distance_m;
                        matrices.durations[i][j] = cell.duration_s;
                    }
                }
            }
        }
    }
}

/// Backfill every direction lacking a positive distance or duration.
/// Returns the number of directed pairs touched.
fn fill_fallback(
    points: &[Coordinates],
    fallback_speed_kmh: f64,
    matrices: &mut DistanceTimeMatrices,
) -> usize {
    let n = points.len();
    let mut fallback_pairs = 0;

    for i in 0..n {
        for j in (i + 1)..n {
            let needs = |m: &DistanceTimeMatrices, a: usize, b: usize| {
                m.distances[a][b] == 0 || m.durations[a][b] == 0
            };
            let need_ij = needs(matrices, i, j);
            let need_ji = needs(matrices, j, i);
            if !(need_ij || need_ji) {
                continue;
            }

            let distance_m = haversine_rounded_m(&points[i], &points[j]);
            let eta_s = fallback_eta_secs(distance_m, fallback_speed_kmh);

            for (a, b, needed) in [(i, j, need_ij), (j, i, need_ji)] {
                if !needed {
                    continue;
                }
                if matrices.distances[a][b] == 0 {
                    matrices.distances[a][b] = distance_m;
                }
                if matrices.durations[a][b] == 0 {
                    matrices.durations[a][b] = eta_s;
                }
                fallback_pairs += 1;
            }
        }
    }

    fallback_pairs
}

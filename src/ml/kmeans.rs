// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Seeded k-means (Lloyd's algorithm) over scaled feature rows.

use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Fitted k-means model, serialized as a model artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KMeansModel {
    pub centroids: Array2<f64>,
}

impl KMeansModel {
    /// Fit `k` clusters on a samples-by-features matrix.
    ///
    /// Centroids are initialized from `k` distinct rows drawn with a
    /// seeded RNG, so the same data and seed always produce the same
    /// model. Errors if there are fewer samples than clusters.
    pub fn fit(
        data: ArrayView2<f64>,
        k: usize,
        seed: u64,
        max_iterations: usize,
    ) -> Result<Self, AppError> {
        let n = data.nrows();
        if n < k {
            return Err(AppError::BadRequest(format!(
                "cannot fit {} clusters on {} samples",
                k, n
            )));
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let mut centroids = Array2::zeros((k, data.ncols()));
        for (c, idx) in sample(&mut rng, n, k).into_iter().enumerate() {
            centroids.row_mut(c).assign(&data.row(idx));
        }

        let mut assignments = vec![usize::MAX; n];
        for _ in 0..max_iterations {
            // Assignment step
            let mut changed = false;
            for (i, row) in data.rows().into_iter().enumerate() {
                let cluster = nearest_centroid(&centroids.view(), &row);
                if assignments[i] != cluster {
                    assignments[i] = cluster;
                    changed = true;
                }
            }
            if !changed {
                break;
            }

            // Update step; an emptied cluster keeps its previous centroid
            let mut sums = Array2::<f64>::zeros((k, data.ncols()));
            let mut counts = vec![0usize; k];
            for (i, row) in data.rows().into_iter().enumerate() {
                let c = assignments[i];
                let mut sum = sums.row_mut(c);
                sum += &row;
                counts[c] += 1;
            }
            for c in 0..k {
                if counts[c] > 0 {
                    let mean = sums.index_axis(Axis(0), c).mapv(|x| x / counts[c] as f64);
                    centroids.row_mut(c).assign(&mean);
                }
            }
        }

        Ok(Self { centroids })
    }

    /// Cluster index of a single scaled feature vector.
    pub fn predict_one(&self, features: ArrayView1<f64>) -> usize {
        nearest_centroid(&self.centroids.view(), &features)
    }

    /// Cluster indices for a scaled samples-by-features matrix.
    pub fn predict(&self, data: ArrayView2<f64>) -> Vec<usize> {
        data.rows()
            .into_iter()
            .map(|row| self.predict_one(row))
            .collect()
    }
}

fn nearest_centroid(centroids: &ArrayView2<f64>, point: &ArrayView1<f64>) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (c, centroid) in centroids.rows().into_iter().enumerate() {
        let dist: f64 = centroid
            .iter()
            .zip(point.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum();
        if dist < best_dist {
            best_dist = dist;
            best = c;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::{MAX_ITERATIONS, RANDOM_SEED};
    use ndarray::{array, Array2};

    /// Four well-separated blobs of three points each.
    fn blobs() -> Array2<f64> {
        array![
            [0.0, 0.0, 0.0],
            [0.1, 0.0, 0.1],
            [0.0, 0.1, 0.0],
            [10.0, 10.0, 10.0],
            [10.1, 10.0, 10.1],
            [10.0, 10.1, 10.0],
            [-10.0, 5.0, 0.0],
            [-10.1, 5.0, 0.1],
            [-10.0, 5.1, 0.0],
            [5.0, -10.0, 5.0],
            [5.1, -10.0, 5.1],
            [5.0, -10.1, 5.0],
        ]
    }

    #[test]
    fn same_seed_gives_same_model() {
        let data = blobs();
        let a = KMeansModel::fit(data.view(), 4, RANDOM_SEED, MAX_ITERATIONS).unwrap();
        let b = KMeansModel::fit(data.view(), 4, RANDOM_SEED, MAX_ITERATIONS).unwrap();
        assert_eq!(a.centroids, b.centroids);
    }

    #[test]
    fn fixed_vector_maps_to_stable_cluster_across_runs() {
        let data = blobs();
        let probe = array![0.0, 0.0, 0.0];

        let first = KMeansModel::fit(data.view(), 4, RANDOM_SEED, MAX_ITERATIONS)
            .unwrap()
            .predict_one(probe.view());
        for _ in 0..5 {
            let again = KMeansModel::fit(data.view(), 4, RANDOM_SEED, MAX_ITERATIONS)
                .unwrap()
                .predict_one(probe.view());
            assert_eq!(first, again);
        }
    }

    #[test]
    fn separated_blobs_land_in_distinct_clusters() {
        let data = blobs();
        let model = KMeansModel::fit(data.view(), 4, RANDOM_SEED, MAX_ITERATIONS).unwrap();

        let labels = model.predict(data.view());
        // Points within a blob agree
        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[0], labels[2]);
        assert_eq!(labels[3], labels[4]);
        // Blobs differ
        let mut reps = vec![labels[0], labels[3], labels[6], labels[9]];
        reps.sort_unstable();
        reps.dedup();
        assert_eq!(reps.len(), 4);
    }

    #[test]
    fn fewer_samples_than_clusters_is_an_error() {
        let data = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        assert!(KMeansModel::fit(data.view(), 4, RANDOM_SEED, MAX_ITERATIONS).is_err());
    }

    #[test]
    fn round_trips_through_serde() {
        let data = blobs();
        let model = KMeansModel::fit(data.view(), 4, RANDOM_SEED, MAX_ITERATIONS).unwrap();

        let json = serde_json::to_string(&model).unwrap();
        let restored: KMeansModel = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.centroids, model.centroids);
    }
}

//! 聚类服务 - 业务能力层
//!
//! 训练向量 + `ClusteringSpec` → `ClusterModel`。
//! 模型记录训练文档的簇分配，同时可以把新向量分到最近的簇。

use crate::error::{AppResult, BackendError};
use crate::models::ClusteringSpec;
use crate::services::features::FeatureVector;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

/// 已训练的聚类规则
pub trait ClusterModel: Send + Sync {
    /// 训练文档的簇编号，与输入向量一一对应
    fn assignments(&self) -> &[usize];

    fn cluster_count(&self) -> usize;

    /// 把新向量分到一个簇
    fn assign(&self, vector: &FeatureVector) -> usize;
}

/// 聚类后端
pub trait ClusteringBackend: Send + Sync {
    fn cluster(
        &self,
        vectors: &[FeatureVector],
        dimension: usize,
        spec: &ClusteringSpec,
    ) -> AppResult<Box<dyn ClusterModel>>;
}

/// 默认聚类后端：k-means（k-means++ 初始化）与全局单簇
#[derive(Debug, Default)]
pub struct DefaultClusterer;

impl ClusteringBackend for DefaultClusterer {
    fn cluster(
        &self,
        vectors: &[FeatureVector],
        dimension: usize,
        spec: &ClusteringSpec,
    ) -> AppResult<Box<dyn ClusterModel>> {
        if vectors.is_empty() {
            return Err(BackendError::EmptyTrainingSet {
                backend: "clustering",
            }
            .into());
        }
        check_dimension(vectors, dimension)?;

        match spec {
            ClusteringSpec::Global => Ok(Box::new(GlobalModel {
                assignments: vec![0; vectors.len()],
            })),
            ClusteringSpec::KMeans {
                k,
                seed,
                max_iterations,
            } => {
                if *k == 0 {
                    return Err(BackendError::UnsupportedAlgorithm {
                        backend: "clustering",
                        algorithm: spec.label(),
                    }
                    .into());
                }
                let model = KMeansModel::fit(vectors, dimension, *k, *seed, *max_iterations);
                debug!(
                    "k-means 完成: k={} 实际簇数={} 文档数={}",
                    k,
                    model.cluster_count(),
                    vectors.len()
                );
                Ok(Box::new(model))
            }
        }
    }
}

fn check_dimension(vectors: &[FeatureVector], dimension: usize) -> AppResult<()> {
    for vector in vectors {
        if let Some((column, _)) = vector.entries().last() {
            if *column >= dimension {
                return Err(BackendError::DimensionMismatch {
                    expected: dimension,
                    found: column + 1,
                }
                .into());
            }
        }
    }
    Ok(())
}

struct GlobalModel {
    assignments: Vec<usize>,
}

impl ClusterModel for GlobalModel {
    fn assignments(&self) -> &[usize] {
        &self.assignments
    }

    fn cluster_count(&self) -> usize {
        1
    }

    fn assign(&self, _vector: &FeatureVector) -> usize {
        0
    }
}

/// k-means 模型
///
/// 实际簇数为 `min(k, 不同向量数)`；迭代中变空的簇保留原质心。
pub struct KMeansModel {
    centroids: Vec<Vec<f64>>,
    centroid_norms: Vec<f64>,
    assignments: Vec<usize>,
}

impl KMeansModel {
    pub fn fit(
        vectors: &[FeatureVector],
        dimension: usize,
        k: usize,
        seed: u64,
        max_iterations: usize,
    ) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let centroids = seed_centroids(vectors, dimension, k.min(vectors.len()), &mut rng);

        let mut model = Self {
            centroid_norms: norms(&centroids),
            centroids,
            assignments: Vec::new(),
        };
        model.assignments = vectors.iter().map(|v| model.assign(v)).collect();

        for iteration in 0..max_iterations {
            model.update_centroids(vectors, dimension);
            let next: Vec<usize> = vectors.iter().map(|v| model.assign(v)).collect();
            if next == model.assignments {
                debug!("k-means 在第 {} 轮收敛", iteration + 1);
                break;
            }
            model.assignments = next;
        }

        model
    }

    fn update_centroids(&mut self, vectors: &[FeatureVector], dimension: usize) {
        let k = self.centroids.len();
        let mut sums = vec![vec![0.0; dimension]; k];
        let mut sizes = vec![0usize; k];

        for (vector, cluster) in vectors.iter().zip(&self.assignments) {
            vector.add_to(&mut sums[*cluster], 1.0);
            sizes[*cluster] += 1;
        }

        for (cluster, (sum, size)) in sums.into_iter().zip(sizes).enumerate() {
            if size == 0 {
                continue;
            }
            self.centroids[cluster] = sum.into_iter().map(|s| s / size as f64).collect();
        }
        self.centroid_norms = norms(&self.centroids);
    }

    fn distance_squared(&self, vector: &FeatureVector, cluster: usize) -> f64 {
        vector.norm_squared() - 2.0 * vector.dot(&self.centroids[cluster])
            + self.centroid_norms[cluster]
    }
}

impl ClusterModel for KMeansModel {
    fn assignments(&self) -> &[usize] {
        &self.assignments
    }

    fn cluster_count(&self) -> usize {
        self.centroids.len()
    }

    fn assign(&self, vector: &FeatureVector) -> usize {
        let mut best = 0;
        let mut best_distance = f64::INFINITY;
        for cluster in 0..self.centroids.len() {
            let distance = self.distance_squared(vector, cluster);
            // 距离相同取编号小的簇
            if distance < best_distance {
                best = cluster;
                best_distance = distance;
            }
        }
        best
    }
}

fn densify(vector: &FeatureVector, dimension: usize) -> Vec<f64> {
    let mut dense = vec![0.0; dimension];
    vector.add_to(&mut dense, 1.0);
    dense
}

fn norms(centroids: &[Vec<f64>]) -> Vec<f64> {
    centroids
        .iter()
        .map(|c| c.iter().map(|x| x * x).sum())
        .collect()
}

/// k-means++ 初始化；所有剩余点都与已选质心重合时提前停止
fn seed_centroids(
    vectors: &[FeatureVector],
    dimension: usize,
    k: usize,
    rng: &mut StdRng,
) -> Vec<Vec<f64>> {
    let first = rng.gen_range(0..vectors.len());
    let mut centroids = vec![densify(&vectors[first], dimension)];

    let mut nearest: Vec<f64> = vectors
        .iter()
        .map(|v| squared_distance_to(v, &centroids[0]))
        .collect();

    while centroids.len() < k {
        let total: f64 = nearest.iter().sum();
        if total <= 0.0 {
            break;
        }

        let target = rng.gen::<f64>() * total;
        let mut cumulative = 0.0;
        let mut chosen = nearest
            .iter()
            .rposition(|d| *d > 0.0)
            .unwrap_or(vectors.len() - 1);
        for (index, d) in nearest.iter().enumerate() {
            cumulative += d;
            if cumulative >= target && *d > 0.0 {
                chosen = index;
                break;
            }
        }

        let centroid = densify(&vectors[chosen], dimension);
        for (slot, vector) in nearest.iter_mut().zip(vectors) {
            *slot = slot.min(squared_distance_to(vector, &centroid));
        }
        centroids.push(centroid);
    }

    centroids
}

fn squared_distance_to(vector: &FeatureVector, centroid: &[f64]) -> f64 {
    let centroid_norm: f64 = centroid.iter().map(|x| x * x).sum();
    (vector.norm_squared() - 2.0 * vector.dot(centroid) + centroid_norm).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(entries: &[(usize, f64)]) -> FeatureVector {
        FeatureVector::from_entries(entries.iter().copied())
    }

    fn two_blobs() -> Vec<FeatureVector> {
        vec![
            v(&[(0, 1.0)]),
            v(&[(0, 0.9), (1, 0.1)]),
            v(&[(0, 0.95)]),
            v(&[(2, 1.0)]),
            v(&[(2, 0.9), (1, 0.1)]),
            v(&[(2, 0.95)]),
        ]
    }

    fn k_means(k: usize) -> ClusteringSpec {
        ClusteringSpec::KMeans {
            k,
            seed: 10,
            max_iterations: 100,
        }
    }

    #[test]
    fn test_kmeans_separates_blobs() {
        let model = DefaultClusterer.cluster(&two_blobs(), 3, &k_means(2)).unwrap();
        let a = model.assignments();
        assert_eq!(model.cluster_count(), 2);
        assert_eq!(a[0], a[1]);
        assert_eq!(a[1], a[2]);
        assert_eq!(a[3], a[4]);
        assert_eq!(a[4], a[5]);
        assert_ne!(a[0], a[3]);

        assert_eq!(model.assign(&v(&[(0, 0.8)])), a[0]);
        assert_eq!(model.assign(&v(&[(2, 0.8)])), a[3]);
    }

    #[test]
    fn test_kmeans_is_deterministic_for_seed() {
        let first = DefaultClusterer.cluster(&two_blobs(), 3, &k_means(3)).unwrap();
        let second = DefaultClusterer.cluster(&two_blobs(), 3, &k_means(3)).unwrap();
        assert_eq!(first.assignments(), second.assignments());
    }

    #[test]
    fn test_k_larger_than_distinct_points() {
        let vectors = vec![v(&[(0, 1.0)]), v(&[(0, 1.0)]), v(&[(1, 1.0)])];
        let model = DefaultClusterer.cluster(&vectors, 2, &k_means(50)).unwrap();
        assert_eq!(model.cluster_count(), 2);
        assert_eq!(model.assignments()[0], model.assignments()[1]);
    }

    #[test]
    fn test_global_puts_everything_together() {
        let model = DefaultClusterer
            .cluster(&two_blobs(), 3, &ClusteringSpec::Global)
            .unwrap();
        assert_eq!(model.cluster_count(), 1);
        assert!(model.assignments().iter().all(|c| *c == 0));
    }

    #[test]
    fn test_invalid_input_is_rejected() {
        assert!(DefaultClusterer.cluster(&[], 3, &k_means(2)).is_err());
        assert!(matches!(
            DefaultClusterer.cluster(&two_blobs(), 2, &k_means(2)),
            Err(crate::error::AppError::Backend(BackendError::DimensionMismatch { .. }))
        ));
    }
}

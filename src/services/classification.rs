//! 分类服务 - 业务能力层
//!
//! 每个保留下来的簇训练一个 `Predictor`，输入是 (特征向量, grader1 标签)。

use crate::error::{AppResult, BackendError};
use crate::models::ClassificationSpec;
use crate::services::features::FeatureVector;
use std::collections::BTreeMap;
use tracing::debug;

/// 训练好的分类器，绑定在一个簇上
pub trait Predictor: Send + Sync {
    fn predict(&self, vector: &FeatureVector) -> String;
}

/// 分类后端
pub trait ClassificationBackend: Send + Sync {
    fn train(
        &self,
        examples: &[(&FeatureVector, &str)],
        dimension: usize,
        spec: &ClassificationSpec,
    ) -> AppResult<Box<dyn Predictor>>;
}

/// 总是返回同一个标签
pub struct ConstantPredictor {
    label: String,
}

impl ConstantPredictor {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

impl Predictor for ConstantPredictor {
    fn predict(&self, _vector: &FeatureVector) -> String {
        self.label.clone()
    }
}

/// 一对多线性 SVM（Pegasos 次梯度训练，固定样本顺序，结果确定）
pub struct LinearSvmPredictor {
    /// 按标签字典序排列
    labels: Vec<String>,
    weights: Vec<Vec<f64>>,
    biases: Vec<f64>,
}

impl LinearSvmPredictor {
    pub fn train(
        examples: &[(&FeatureVector, &str)],
        labels: Vec<String>,
        dimension: usize,
        lambda: f64,
        epochs: usize,
    ) -> Self {
        let mut weights = Vec::with_capacity(labels.len());
        let mut biases = Vec::with_capacity(labels.len());

        for label in &labels {
            let targets: Vec<f64> = examples
                .iter()
                .map(|(_, l)| if *l == label.as_str() { 1.0 } else { -1.0 })
                .collect();
            let (w, b) = pegasos(examples, &targets, dimension, lambda, epochs);
            weights.push(w);
            biases.push(b);
        }

        Self {
            labels,
            weights,
            biases,
        }
    }
}

impl Predictor for LinearSvmPredictor {
    fn predict(&self, vector: &FeatureVector) -> String {
        let mut best = 0;
        let mut best_score = f64::NEG_INFINITY;
        for (index, (w, b)) in self.weights.iter().zip(&self.biases).enumerate() {
            let score = vector.dot(w) + b;
            if score > best_score {
                best = index;
                best_score = score;
            }
        }
        self.labels[best].clone()
    }
}

/// 二分类 Pegasos
///
/// 权重表示为 `scale * v`，正则化收缩只改 `scale`；`scale` 归零时重置。
fn pegasos(
    examples: &[(&FeatureVector, &str)],
    targets: &[f64],
    dimension: usize,
    lambda: f64,
    epochs: usize,
) -> (Vec<f64>, f64) {
    let mut v = vec![0.0; dimension];
    let mut scale = 1.0;
    let mut bias = 0.0;
    let mut step = 0usize;

    for _ in 0..epochs {
        for ((vector, _), y) in examples.iter().zip(targets) {
            step += 1;
            let eta = 1.0 / (lambda * step as f64);
            let margin = y * (scale * vector.dot(&v) + bias);

            scale *= 1.0 - eta * lambda;
            if scale <= 0.0 {
                v.iter_mut().for_each(|x| *x = 0.0);
                scale = 1.0;
            }

            if margin < 1.0 {
                vector.add_to(&mut v, eta * y / scale);
                bias += eta * y;
            }
        }
    }

    let weights = v.into_iter().map(|x| x * scale).collect();
    (weights, bias)
}

/// 训练集中出现最多的标签，同频取字典序最小
fn majority_label(examples: &[(&FeatureVector, &str)]) -> Option<String> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for (_, label) in examples {
        *counts.entry(*label).or_insert(0) += 1;
    }
    let max = counts.values().copied().max()?;
    counts
        .into_iter()
        .find(|(_, count)| *count == max)
        .map(|(label, _)| label.to_string())
}

/// 默认分类后端
#[derive(Debug, Default)]
pub struct DefaultClassifier;

impl ClassificationBackend for DefaultClassifier {
    fn train(
        &self,
        examples: &[(&FeatureVector, &str)],
        dimension: usize,
        spec: &ClassificationSpec,
    ) -> AppResult<Box<dyn Predictor>> {
        let Some(majority) = majority_label(examples) else {
            return Err(BackendError::EmptyTrainingSet {
                backend: "classification",
            }
            .into());
        };

        let labels: Vec<String> = examples
            .iter()
            .map(|(_, l)| l.to_string())
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .collect();

        // 单一标签的簇不需要真正训练
        if labels.len() == 1 {
            return Ok(Box::new(ConstantPredictor::new(majority)));
        }

        match spec {
            ClassificationSpec::MajorityClass => Ok(Box::new(ConstantPredictor::new(majority))),
            ClassificationSpec::LinearSvm { lambda, epochs } => {
                if *lambda <= 0.0 || *epochs == 0 {
                    return Err(BackendError::UnsupportedAlgorithm {
                        backend: "classification",
                        algorithm: spec.label(),
                    }
                    .into());
                }
                debug!(
                    "训练线性 SVM: {} 个样本, {} 个标签",
                    examples.len(),
                    labels.len()
                );
                Ok(Box::new(LinearSvmPredictor::train(
                    examples, labels, dimension, *lambda, *epochs,
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(entries: &[(usize, f64)]) -> FeatureVector {
        FeatureVector::from_entries(entries.iter().copied())
    }

    fn svm() -> ClassificationSpec {
        ClassificationSpec::LinearSvm {
            lambda: 0.01,
            epochs: 50,
        }
    }

    #[test]
    fn test_svm_learns_separable_labels() {
        let a1 = v(&[(0, 1.0)]);
        let a2 = v(&[(0, 0.8), (2, 0.1)]);
        let b1 = v(&[(1, 1.0)]);
        let b2 = v(&[(1, 0.9), (2, 0.1)]);
        let c1 = v(&[(2, 1.0)]);
        let examples = vec![(&a1, "0"), (&b1, "1"), (&a2, "0"), (&b2, "1"), (&c1, "2")];

        let predictor = DefaultClassifier.train(&examples, 3, &svm()).unwrap();
        assert_eq!(predictor.predict(&v(&[(0, 0.9)])), "0");
        assert_eq!(predictor.predict(&v(&[(1, 0.9)])), "1");
        assert_eq!(predictor.predict(&v(&[(2, 0.9)])), "2");
    }

    #[test]
    fn test_single_label_cluster_is_constant() {
        let x = v(&[(0, 1.0)]);
        let y = v(&[(1, 1.0)]);
        let examples = vec![(&x, "2"), (&y, "2")];
        let predictor = DefaultClassifier.train(&examples, 2, &svm()).unwrap();
        assert_eq!(predictor.predict(&v(&[(1, 5.0)])), "2");
    }

    #[test]
    fn test_majority_class_breaks_ties_by_label() {
        let x = v(&[(0, 1.0)]);
        let examples = vec![(&x, "3"), (&x, "1"), (&x, "3"), (&x, "1"), (&x, "0")];
        let predictor = DefaultClassifier
            .train(&examples, 1, &ClassificationSpec::MajorityClass)
            .unwrap();
        assert_eq!(predictor.predict(&x), "1");
    }

    #[test]
    fn test_empty_training_set_fails() {
        let result = DefaultClassifier.train(&[], 1, &svm());
        assert!(matches!(
            result,
            Err(crate::error::AppError::Backend(BackendError::EmptyTrainingSet { .. }))
        ));
    }
}

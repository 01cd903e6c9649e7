//! 参数空间构建 - 编排层
//!
//! 把参数轴的笛卡尔积组织成一个有限、可重新开始、惰性枚举的配置点序列。
//!
//! 枚举顺序固定：特征集合最外层，其次聚类、分类，纯度策略最内层。
//! 所有校验都在 `build()` 中完成，执行开始后不会再出现配置错误。

use crate::error::{AppResult, ConfigError};
use crate::models::{
    ClassificationSpec, ClusteringSpec, EvaluationMode, ExperimentConfig, ExtractorSpec,
    FeatureSet, ReaderPairing, StopwordSource, SweepAxes,
};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;

/// 参数空间构建器
#[derive(Debug, Clone)]
pub struct ParameterSpaceBuilder {
    base_dir: PathBuf,
    question: String,
    mode: EvaluationMode,
    axes: SweepAxes,
    parsing: bool,
}

impl ParameterSpaceBuilder {
    /// 默认使用 5 折交叉验证和内置参数轴
    pub fn new(base_dir: impl Into<PathBuf>, question: impl Into<String>) -> Self {
        Self {
            base_dir: base_dir.into(),
            question: question.into(),
            mode: EvaluationMode::CrossValidation { folds: 5 },
            axes: SweepAxes::default(),
            parsing: false,
        }
    }

    pub fn mode(mut self, mode: EvaluationMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn axes(mut self, axes: SweepAxes) -> Self {
        self.axes = axes;
        self
    }

    pub fn feature_sets(mut self, feature_sets: Vec<FeatureSet>) -> Self {
        self.axes.feature_sets = feature_sets;
        self
    }

    pub fn clustering(mut self, clustering: Vec<ClusteringSpec>) -> Self {
        self.axes.clustering = clustering;
        self
    }

    pub fn classification(mut self, classification: Vec<ClassificationSpec>) -> Self {
        self.axes.classification = classification;
        self
    }

    pub fn only_pure_clusters(mut self, policies: Vec<bool>) -> Self {
        self.axes.only_pure_clusters = policies;
        self
    }

    /// 预处理是否开启句法分析，依存 n-gram 依赖它
    pub fn parsing(mut self, enabled: bool) -> Self {
        self.parsing = enabled;
        self
    }

    /// 校验并生成参数空间
    pub fn build(self) -> AppResult<ParameterSpace> {
        validate_axes(&self.axes, self.parsing)?;

        if let EvaluationMode::CrossValidation { folds } = self.mode {
            if folds < 2 {
                return Err(invalid("num_folds", format!("折数至少为 2，实际 {}", folds)));
            }
        }

        let readers = ReaderPairing::for_question(&self.base_dir, &self.question, self.mode);
        require_file("训练", &readers.train)?;
        if let Some(test) = &readers.test {
            require_file("测试", test)?;
        }

        let space = ParameterSpace {
            question: self.question,
            readers,
            mode: self.mode,
            axes: self.axes,
        };
        debug!("[问题 {}] 参数空间共 {} 个配置点", space.question, space.len());
        Ok(space)
    }
}

fn invalid(name: &str, reason: impl Into<String>) -> crate::error::AppError {
    ConfigError::InvalidArgument {
        name: name.to_string(),
        reason: reason.into(),
    }
    .into()
}

fn require_file(role: &'static str, path: &str) -> AppResult<()> {
    if Path::new(path).is_file() {
        Ok(())
    } else {
        Err(ConfigError::MissingFile {
            role,
            path: path.to_string(),
        }
        .into())
    }
}

fn validate_axes(axes: &SweepAxes, parsing: bool) -> AppResult<()> {
    let empty = [
        ("feature_sets", axes.feature_sets.is_empty()),
        ("clustering", axes.clustering.is_empty()),
        ("classification", axes.classification.is_empty()),
        ("only_pure_clusters", axes.only_pure_clusters.is_empty()),
    ];
    if let Some((axis, _)) = empty.iter().find(|(_, is_empty)| *is_empty) {
        return Err(ConfigError::EmptyAxis { axis: *axis }.into());
    }

    for feature_set in &axes.feature_sets {
        if feature_set.is_empty() {
            return Err(ConfigError::EmptyFeatureSet.into());
        }
        let mut kinds = HashSet::new();
        for extractor in feature_set.extractors() {
            let kind = extractor.kind_name();
            if !kinds.insert(kind) {
                return Err(ConfigError::DuplicateExtractor { kind }.into());
            }
            if !parsing && matches!(extractor, ExtractorSpec::DependencyNgram { .. }) {
                return Err(invalid(kind, "依存 n-gram 需要开启句法分析 (USE_PARSING)"));
            }
            validate_extractor(extractor)?;
        }
    }

    for clustering in &axes.clustering {
        if let ClusteringSpec::KMeans { k: 0, .. } = clustering {
            return Err(invalid("k", "聚类数必须大于 0"));
        }
    }

    for classification in &axes.classification {
        if let ClassificationSpec::LinearSvm { lambda, epochs } = classification {
            if lambda.is_nan() || *lambda <= 0.0 {
                return Err(invalid("lambda", format!("必须为正数，实际 {}", lambda)));
            }
            if *epochs == 0 {
                return Err(invalid("epochs", "训练轮数必须大于 0"));
            }
        }
    }

    Ok(())
}

fn validate_extractor(extractor: &ExtractorSpec) -> AppResult<()> {
    let kind = extractor.kind_name();
    let (top_k, range, stopwords) = match extractor {
        ExtractorSpec::TokenCount => return Ok(()),
        ExtractorSpec::WordNgram {
            top_k,
            min_n,
            max_n,
            stopwords,
            ..
        }
        | ExtractorSpec::SkipNgram {
            top_k,
            min_n,
            max_n,
            stopwords,
            ..
        } => (*top_k, Some((*min_n, *max_n)), Some(stopwords)),
        ExtractorSpec::CharacterNgram {
            top_k, min_n, max_n, ..
        } => (*top_k, Some((*min_n, *max_n)), None),
        ExtractorSpec::DependencyNgram { top_k, .. } => (*top_k, None, None),
    };

    if top_k == 0 {
        return Err(invalid(&format!("{}.top_k", kind), "必须大于 0"));
    }
    if let Some((min_n, max_n)) = range {
        if min_n == 0 {
            return Err(invalid(&format!("{}.min_n", kind), "必须大于 0"));
        }
        if min_n > max_n {
            return Err(invalid(
                &format!("{}.min_n", kind),
                format!("min_n ({}) 大于 max_n ({})", min_n, max_n),
            ));
        }
    }
    if let ExtractorSpec::SkipNgram {
        skip_size, max_n, ..
    } = extractor
    {
        if *skip_size == 0 || *max_n < 2 {
            return Err(invalid(
                &format!("{}.skip_size", kind),
                "跳跃 n-gram 需要 skip_size > 0 且 max_n >= 2",
            ));
        }
    }
    if let Some(StopwordSource::File(path)) = stopwords {
        require_file("停用词", path)?;
    }
    Ok(())
}

/// 已校验的参数空间
///
/// 不持有配置点本身，`iter()` 每次返回一个新的惰性迭代器。
#[derive(Debug, Clone)]
pub struct ParameterSpace {
    question: String,
    readers: ReaderPairing,
    mode: EvaluationMode,
    axes: SweepAxes,
}

impl ParameterSpace {
    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn readers(&self) -> &ReaderPairing {
        &self.readers
    }

    pub fn mode(&self) -> EvaluationMode {
        self.mode
    }

    pub fn axes(&self) -> &SweepAxes {
        &self.axes
    }

    pub fn len(&self) -> usize {
        self.axes.feature_sets.len()
            * self.axes.clustering.len()
            * self.axes.classification.len()
            * self.axes.only_pure_clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 第 `index` 个配置点（从 0 开始）
    pub fn get(&self, index: usize) -> Option<ExperimentConfig> {
        if index >= self.len() {
            return None;
        }
        let axes = &self.axes;

        let mut rest = index;
        let purity = rest % axes.only_pure_clusters.len();
        rest /= axes.only_pure_clusters.len();
        let classification = rest % axes.classification.len();
        rest /= axes.classification.len();
        let clustering = rest % axes.clustering.len();
        rest /= axes.clustering.len();
        let feature_set = rest;

        Some(ExperimentConfig {
            question: self.question.clone(),
            readers: self.readers.clone(),
            mode: self.mode,
            feature_set: axes.feature_sets[feature_set].clone(),
            clustering: axes.clustering[clustering].clone(),
            classification: axes.classification[classification].clone(),
            only_pure_clusters: axes.only_pure_clusters[purity],
        })
    }

    /// 惰性枚举全部配置点
    pub fn iter(&self) -> impl Iterator<Item = ExperimentConfig> + '_ {
        (0..self.len()).filter_map(move |index| self.get(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use std::fs;

    fn corpus_dir(with_test: bool) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("1_train.txt"), "s1\t1\ta\t1\t1\t1\n").unwrap();
        if with_test {
            fs::write(dir.path().join("1_test.txt"), "s2\t1\tb\t1\t1\t1\n").unwrap();
        }
        dir
    }

    fn token_count() -> FeatureSet {
        FeatureSet(vec![ExtractorSpec::TokenCount])
    }

    #[test]
    fn test_enumeration_order_and_restart() {
        let dir = corpus_dir(false);
        let space = ParameterSpaceBuilder::new(dir.path(), "1")
            .feature_sets(vec![
                token_count(),
                FeatureSet(vec![
                    ExtractorSpec::TokenCount,
                    ExtractorSpec::CharacterNgram {
                        top_k: 10,
                        min_n: 1,
                        max_n: 2,
                        lowercase: true,
                    },
                ]),
            ])
            .clustering(vec![ClusteringSpec::Global])
            .classification(vec![
                ClassificationSpec::MajorityClass,
                ClassificationSpec::LinearSvm {
                    lambda: 0.1,
                    epochs: 5,
                },
            ])
            .only_pure_clusters(vec![false, true])
            .build()
            .unwrap();

        assert_eq!(space.len(), 8);
        let points: Vec<ExperimentConfig> = space.iter().collect();
        assert_eq!(points.len(), 8);

        // 纯度最内层，特征集合最外层
        assert!(!points[0].only_pure_clusters);
        assert!(points[1].only_pure_clusters);
        assert_eq!(points[0].classification, ClassificationSpec::MajorityClass);
        assert_ne!(points[2].classification, ClassificationSpec::MajorityClass);
        assert_eq!(points[3].feature_set, token_count());
        assert_ne!(points[4].feature_set, token_count());

        // 可重新开始
        let again: Vec<ExperimentConfig> = space.iter().collect();
        assert_eq!(points, again);
        assert!(space.get(8).is_none());
    }

    #[test]
    fn test_default_axes_produce_two_points() {
        let dir = corpus_dir(false);
        let space = ParameterSpaceBuilder::new(dir.path(), "1").build().unwrap();
        assert_eq!(space.len(), 2);
        assert!(space.iter().all(|c| c.readers.test.is_none()));
    }

    #[test]
    fn test_empty_axis_is_rejected() {
        let dir = corpus_dir(false);
        let result = ParameterSpaceBuilder::new(dir.path(), "1")
            .clustering(Vec::new())
            .build();
        assert!(matches!(
            result,
            Err(AppError::Config(ConfigError::EmptyAxis { axis: "clustering" }))
        ));
    }

    #[test]
    fn test_empty_feature_set_is_rejected() {
        let dir = corpus_dir(false);
        let result = ParameterSpaceBuilder::new(dir.path(), "1")
            .feature_sets(vec![FeatureSet(Vec::new())])
            .build();
        assert!(matches!(
            result,
            Err(AppError::Config(ConfigError::EmptyFeatureSet))
        ));
    }

    #[test]
    fn test_duplicate_extractor_kind_is_rejected() {
        let dir = corpus_dir(false);
        let word = |max_n| ExtractorSpec::WordNgram {
            top_k: 10,
            min_n: 1,
            max_n,
            lowercase: true,
            stopwords: StopwordSource::Disabled,
        };
        let result = ParameterSpaceBuilder::new(dir.path(), "1")
            .feature_sets(vec![FeatureSet(vec![word(1), word(2)])])
            .build();
        assert!(matches!(
            result,
            Err(AppError::Config(ConfigError::DuplicateExtractor {
                kind: "word_ngram"
            }))
        ));

        let result = ParameterSpaceBuilder::new(dir.path(), "1")
            .feature_sets(vec![FeatureSet(vec![ExtractorSpec::TokenCount; 2])])
            .build();
        assert!(matches!(
            result,
            Err(AppError::Config(ConfigError::DuplicateExtractor {
                kind: "token_count"
            }))
        ));
    }

    #[test]
    fn test_dependency_ngrams_need_parsing() {
        let dir = corpus_dir(false);
        let set = FeatureSet(vec![ExtractorSpec::DependencyNgram {
            top_k: 10,
            lowercase: true,
        }]);

        let without = ParameterSpaceBuilder::new(dir.path(), "1")
            .feature_sets(vec![set.clone()])
            .build();
        assert!(matches!(without, Err(AppError::Config(_))));

        assert!(ParameterSpaceBuilder::new(dir.path(), "1")
            .feature_sets(vec![set])
            .parsing(true)
            .build()
            .is_ok());
    }

    #[test]
    fn test_fixed_split_requires_test_file() {
        let dir = corpus_dir(false);
        let result = ParameterSpaceBuilder::new(dir.path(), "1")
            .mode(EvaluationMode::FixedSplit)
            .build();
        assert!(matches!(
            result,
            Err(AppError::Config(ConfigError::MissingFile { role: "测试", .. }))
        ));

        let dir = corpus_dir(true);
        assert!(ParameterSpaceBuilder::new(dir.path(), "1")
            .mode(EvaluationMode::FixedSplit)
            .build()
            .is_ok());
    }

    #[test]
    fn test_invalid_arguments_are_rejected() {
        let dir = corpus_dir(false);
        let cases = vec![
            ParameterSpaceBuilder::new(dir.path(), "1").clustering(vec![ClusteringSpec::KMeans {
                k: 0,
                seed: 1,
                max_iterations: 10,
            }]),
            ParameterSpaceBuilder::new(dir.path(), "1").classification(vec![
                ClassificationSpec::LinearSvm {
                    lambda: 0.0,
                    epochs: 5,
                },
            ]),
            ParameterSpaceBuilder::new(dir.path(), "1").feature_sets(vec![FeatureSet(vec![
                ExtractorSpec::WordNgram {
                    top_k: 10,
                    min_n: 3,
                    max_n: 1,
                    lowercase: true,
                    stopwords: StopwordSource::Disabled,
                },
            ])]),
            ParameterSpaceBuilder::new(dir.path(), "1").feature_sets(vec![FeatureSet(vec![
                ExtractorSpec::CharacterNgram {
                    top_k: 0,
                    min_n: 1,
                    max_n: 2,
                    lowercase: true,
                },
            ])]),
            ParameterSpaceBuilder::new(dir.path(), "1").feature_sets(vec![FeatureSet(vec![
                ExtractorSpec::WordNgram {
                    top_k: 10,
                    min_n: 1,
                    max_n: 1,
                    lowercase: true,
                    stopwords: StopwordSource::File("/nonexistent/stopwords.txt".to_string()),
                },
            ])]),
            ParameterSpaceBuilder::new(dir.path(), "1")
                .mode(EvaluationMode::CrossValidation { folds: 1 }),
        ];

        for builder in cases {
            assert!(matches!(builder.build(), Err(AppError::Config(_))));
        }
    }

    #[test]
    fn test_missing_training_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ParameterSpaceBuilder::new(dir.path(), "9").build(),
            Err(AppError::Config(ConfigError::MissingFile { role: "训练", .. }))
        ));
    }
}

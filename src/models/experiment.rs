//! 实验配置模型
//!
//! 参数轴上的每个取值都是强类型的；一个 `ExperimentConfig` 是所有参数轴的一次具体取值，
//! 既是缓存键的来源，也是报告中的分组依据。

use serde::{Deserialize, Serialize};
use std::path::Path;

/// 预处理配置
///
/// 由驱动程序构造一次，显式传入编排器。关闭的阶段是空操作。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreprocessingConfig {
    pub language: String,
    pub use_tagger: bool,
    pub use_parsing: bool,
    pub use_spell_checking: bool,
    /// 拼写检查词表路径
    pub spelling_vocabulary: Option<String>,
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            use_tagger: false,
            use_parsing: false,
            use_spell_checking: false,
            spelling_vocabulary: None,
        }
    }
}

/// 停用词来源
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopwordSource {
    #[default]
    Disabled,
    /// 内置英文停用词表
    English,
    /// 每行一个词的停用词文件
    File(String),
}

fn default_top_k() -> usize {
    500
}

fn default_one() -> usize {
    1
}

fn default_two() -> usize {
    2
}

fn default_three() -> usize {
    3
}

fn default_true() -> bool {
    true
}

/// 单个特征抽取器及其参数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExtractorSpec {
    /// 文档词数
    TokenCount,
    /// 词 n-gram
    WordNgram {
        #[serde(default = "default_top_k")]
        top_k: usize,
        #[serde(default = "default_one")]
        min_n: usize,
        #[serde(default = "default_three")]
        max_n: usize,
        #[serde(default = "default_true")]
        lowercase: bool,
        #[serde(default)]
        stopwords: StopwordSource,
    },
    /// 跳词 n-gram
    SkipNgram {
        #[serde(default = "default_top_k")]
        top_k: usize,
        #[serde(default = "default_two")]
        min_n: usize,
        #[serde(default = "default_three")]
        max_n: usize,
        #[serde(default = "default_two")]
        skip_size: usize,
        #[serde(default = "default_true")]
        lowercase: bool,
        #[serde(default)]
        stopwords: StopwordSource,
    },
    /// 字符 n-gram
    CharacterNgram {
        #[serde(default = "default_top_k")]
        top_k: usize,
        #[serde(default = "default_one")]
        min_n: usize,
        #[serde(default = "default_three")]
        max_n: usize,
        #[serde(default = "default_true")]
        lowercase: bool,
    },
    /// 依存三元组（需要句法分析）
    DependencyNgram {
        #[serde(default = "default_top_k")]
        top_k: usize,
        #[serde(default = "default_true")]
        lowercase: bool,
    },
}

impl ExtractorSpec {
    /// 抽取器名称，用作特征名前缀
    pub fn kind_name(&self) -> &'static str {
        match self {
            ExtractorSpec::TokenCount => "token_count",
            ExtractorSpec::WordNgram { .. } => "word_ngram",
            ExtractorSpec::SkipNgram { .. } => "skip_ngram",
            ExtractorSpec::CharacterNgram { .. } => "char_ngram",
            ExtractorSpec::DependencyNgram { .. } => "dependency_ngram",
        }
    }

    pub fn label(&self) -> String {
        match self {
            ExtractorSpec::TokenCount => "token_count".to_string(),
            ExtractorSpec::WordNgram {
                top_k, min_n, max_n, ..
            } => format!("word_ngram({}-{},k={})", min_n, max_n, top_k),
            ExtractorSpec::SkipNgram {
                top_k,
                min_n,
                max_n,
                skip_size,
                ..
            } => format!(
                "skip_ngram({}-{},skip={},k={})",
                min_n, max_n, skip_size, top_k
            ),
            ExtractorSpec::CharacterNgram {
                top_k, min_n, max_n, ..
            } => format!("char_ngram({}-{},k={})", min_n, max_n, top_k),
            ExtractorSpec::DependencyNgram { top_k, .. } => {
                format!("dependency_ngram(k={})", top_k)
            }
        }
    }
}

/// 特征集合（一个参数轴取值）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureSet(pub Vec<ExtractorSpec>);

impl FeatureSet {
    pub fn extractors(&self) -> &[ExtractorSpec] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn label(&self) -> String {
        self.0
            .iter()
            .map(ExtractorSpec::label)
            .collect::<Vec<_>>()
            .join("+")
    }
}

fn default_seed() -> u64 {
    10
}

fn default_max_iterations() -> usize {
    500
}

/// 聚类算法及参数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "snake_case")]
pub enum ClusteringSpec {
    KMeans {
        k: usize,
        #[serde(default = "default_seed")]
        seed: u64,
        #[serde(default = "default_max_iterations")]
        max_iterations: usize,
    },
    /// 不聚类，所有文档归入同一个簇（全局分类器）
    Global,
}

impl ClusteringSpec {
    pub fn algorithm_name(&self) -> &'static str {
        match self {
            ClusteringSpec::KMeans { .. } => "k_means",
            ClusteringSpec::Global => "global",
        }
    }

    pub fn label(&self) -> String {
        match self {
            ClusteringSpec::KMeans { k, .. } => format!("k_means(k={})", k),
            ClusteringSpec::Global => "global".to_string(),
        }
    }
}

fn default_lambda() -> f64 {
    0.01
}

fn default_epochs() -> usize {
    20
}

/// 分类算法及参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "snake_case")]
pub enum ClassificationSpec {
    /// 一对多线性 SVM
    LinearSvm {
        #[serde(default = "default_lambda")]
        lambda: f64,
        #[serde(default = "default_epochs")]
        epochs: usize,
    },
    /// 多数类基线
    MajorityClass,
}

impl ClassificationSpec {
    pub fn algorithm_name(&self) -> &'static str {
        match self {
            ClassificationSpec::LinearSvm { .. } => "linear_svm",
            ClassificationSpec::MajorityClass => "majority_class",
        }
    }

    pub fn label(&self) -> String {
        match self {
            ClassificationSpec::LinearSvm { lambda, epochs } => {
                format!("linear_svm(lambda={},epochs={})", lambda, epochs)
            }
            ClassificationSpec::MajorityClass => "majority_class".to_string(),
        }
    }
}

/// 评测模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum EvaluationMode {
    /// 训练文件训练，测试文件预测
    FixedSplit,
    /// 只使用训练文件做 k 折交叉验证
    CrossValidation { folds: usize },
}

/// 训练 / 测试文件配对
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderPairing {
    pub train: String,
    pub test: Option<String>,
}

impl ReaderPairing {
    /// 按 `<base>/<question>_{train,test}.txt` 约定构造
    pub fn for_question(base_dir: &Path, question: &str, mode: EvaluationMode) -> Self {
        let train = base_dir.join(format!("{}_train.txt", question));
        let test = match mode {
            EvaluationMode::FixedSplit => Some(
                base_dir
                    .join(format!("{}_test.txt", question))
                    .to_string_lossy()
                    .to_string(),
            ),
            EvaluationMode::CrossValidation { .. } => None,
        };
        Self {
            train: train.to_string_lossy().to_string(),
            test,
        }
    }
}

/// 一个配置点：所有参数轴的一次具体取值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    pub question: String,
    pub readers: ReaderPairing,
    pub mode: EvaluationMode,
    pub feature_set: FeatureSet,
    pub clustering: ClusteringSpec,
    pub classification: ClassificationSpec,
    pub only_pure_clusters: bool,
}

impl ExperimentConfig {
    /// 日志 / 报告中使用的简短描述
    pub fn label(&self) -> String {
        format!(
            "{} | {} | {} | pure={}",
            self.feature_set.label(),
            self.clustering.label(),
            self.classification.label(),
            self.only_pure_clusters
        )
    }
}

fn default_feature_sets() -> Vec<FeatureSet> {
    vec![FeatureSet(vec![
        ExtractorSpec::TokenCount,
        ExtractorSpec::WordNgram {
            top_k: 5000,
            min_n: 1,
            max_n: 3,
            lowercase: true,
            stopwords: StopwordSource::English,
        },
        ExtractorSpec::SkipNgram {
            top_k: 5000,
            min_n: 2,
            max_n: 3,
            skip_size: 2,
            lowercase: true,
            stopwords: StopwordSource::Disabled,
        },
        ExtractorSpec::CharacterNgram {
            top_k: 500,
            min_n: 1,
            max_n: 3,
            lowercase: true,
        },
    ])]
}

fn default_clustering() -> Vec<ClusteringSpec> {
    vec![ClusteringSpec::KMeans {
        k: 50,
        seed: default_seed(),
        max_iterations: default_max_iterations(),
    }]
}

fn default_classification() -> Vec<ClassificationSpec> {
    vec![ClassificationSpec::LinearSvm {
        lambda: default_lambda(),
        epochs: default_epochs(),
    }]
}

fn default_only_pure() -> Vec<bool> {
    vec![false, true]
}

/// 参数轴取值集合，可从 TOML 文件加载
///
/// 缺省的参数轴使用内置取值；显式写成空列表会在构建参数空间时报错。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepAxes {
    #[serde(default = "default_feature_sets")]
    pub feature_sets: Vec<FeatureSet>,
    #[serde(default = "default_clustering")]
    pub clustering: Vec<ClusteringSpec>,
    #[serde(default = "default_classification")]
    pub classification: Vec<ClassificationSpec>,
    #[serde(default = "default_only_pure")]
    pub only_pure_clusters: Vec<bool>,
}

impl Default for SweepAxes {
    fn default() -> Self {
        Self {
            feature_sets: default_feature_sets(),
            clustering: default_clustering(),
            classification: default_classification(),
            only_pure_clusters: default_only_pure(),
        }
    }
}

impl SweepAxes {
    /// 内置参数轴；开启句法分析时每个特征集合追加依存 n-gram
    pub fn for_preprocessing(preprocessing: &PreprocessingConfig) -> Self {
        let mut axes = Self::default();
        if preprocessing.use_parsing {
            for feature_set in &mut axes.feature_sets {
                feature_set.0.push(ExtractorSpec::DependencyNgram {
                    top_k: 500,
                    lowercase: true,
                });
            }
        }
        axes
    }
}

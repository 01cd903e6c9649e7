//! 配置点实验流程 - 流程层
//!
//! 核心职责：定义"一个配置点"的完整处理流程
//!
//! 阶段一（训练侧）：
//! 1. 预处理 → 拟合特征流水线 → 抽取训练向量
//! 2. 聚类 → 纯度过滤 → 丢弃空簇
//!
//! 阶段二（分类）：
//! 1. 每个保留簇训练一个分类器
//! 2. 测试文档：预处理 → 抽取 → 分簇 → 预测
//!
//! 被分到已丢弃簇的文档得到 `Prediction::Unpredicted`。

use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::error::{AppResult, ConfigError, WorkflowError};
use crate::models::{Document, DocumentPrediction, EvaluationMode, ExperimentConfig, Prediction};
use crate::services::{Backends, FeaturePipeline, Predictor, ProcessedDocument};
use crate::workflow::folds::fold_ranges;
use crate::workflow::point_ctx::PointCtx;
use crate::workflow::purity::retain_pure_clusters;

/// 一个问题的已读入语料，所有配置点共享只读
#[derive(Debug, Clone, Default)]
pub struct Corpora {
    pub train: Vec<Document>,
    /// 固定划分模式下的测试语料
    pub test: Option<Vec<Document>>,
}

/// 预处理过的文档
struct Prepared<'a> {
    document: &'a Document,
    processed: ProcessedDocument,
}

/// 配置点实验流程
///
/// - 不持有任何跨配置点的状态
/// - 只依赖可插拔后端（services）
pub struct ExperimentFlow {
    backends: Backends,
    verbose_logging: bool,
}

impl ExperimentFlow {
    pub fn new(backends: Backends, verbose_logging: bool) -> Self {
        Self {
            backends,
            verbose_logging,
        }
    }

    /// 运行一个配置点，返回每个测试（或留出）文档的预测
    pub fn run(
        &self,
        config: &ExperimentConfig,
        corpora: &Corpora,
        ctx: &PointCtx,
    ) -> AppResult<Vec<DocumentPrediction>> {
        match config.mode {
            EvaluationMode::FixedSplit => {
                let test = corpora
                    .test
                    .as_ref()
                    .ok_or_else(|| ConfigError::MissingFile {
                        role: "测试",
                        path: config.readers.test.clone().unwrap_or_default(),
                    })?;
                let train = self.prepare(&corpora.train)?;
                let test = self.prepare(test)?;
                let train_refs: Vec<&Prepared> = train.iter().collect();
                let test_refs: Vec<&Prepared> = test.iter().collect();
                self.train_and_predict(config, &train_refs, &test_refs, ctx)
            }
            EvaluationMode::CrossValidation { folds } => {
                let ranges = fold_ranges(corpora.train.len(), folds)?;
                let prepared = self.prepare(&corpora.train)?;

                let mut predictions = Vec::with_capacity(prepared.len());
                for (fold, range) in ranges.iter().enumerate() {
                    let train: Vec<&Prepared> = prepared
                        .iter()
                        .enumerate()
                        .filter(|(i, _)| !range.contains(i))
                        .map(|(_, p)| p)
                        .collect();
                    let held_out: Vec<&Prepared> = prepared[range.clone()].iter().collect();

                    debug!(
                        "{} 第 {}/{} 折: 训练 {} 条, 留出 {} 条",
                        ctx,
                        fold + 1,
                        folds,
                        train.len(),
                        held_out.len()
                    );
                    predictions.extend(self.train_and_predict(config, &train, &held_out, ctx)?);
                }
                Ok(predictions)
            }
        }
    }

    fn prepare<'a>(&self, documents: &'a [Document]) -> AppResult<Vec<Prepared<'a>>> {
        documents
            .iter()
            .map(|document| {
                Ok(Prepared {
                    document,
                    processed: self.backends.preprocessor.process(&document.text)?,
                })
            })
            .collect()
    }

    fn train_and_predict(
        &self,
        config: &ExperimentConfig,
        train: &[&Prepared],
        test: &[&Prepared],
        ctx: &PointCtx,
    ) -> AppResult<Vec<DocumentPrediction>> {
        // ========== 阶段一: 训练侧 ==========
        let labelled: Vec<&&Prepared> = train.iter().filter(|p| p.document.has_outcome()).collect();
        if labelled.is_empty() {
            return Err(WorkflowError::NoTrainingData {
                question: ctx.question.clone(),
            }
            .into());
        }

        let processed: Vec<ProcessedDocument> =
            labelled.iter().map(|p| p.processed.clone()).collect();
        let labels: Vec<&str> = labelled.iter().map(|p| p.document.outcome.as_str()).collect();

        let mut pipeline = FeaturePipeline::from_feature_set(&config.feature_set)?;
        let vectors = pipeline.fit_transform(&processed);
        let dimension = pipeline.dimension();

        let model = self
            .backends
            .clusterer
            .cluster(&vectors, dimension, &config.clustering)?;
        let retained = retain_pure_clusters(model.assignments(), &labels, config.only_pure_clusters);

        if self.verbose_logging {
            info!(
                "{} 🧩 {} 维特征, {} 个非空簇, 纯簇 {} 个, 保留 {} 个 (丢弃 {} 条训练文档)",
                ctx,
                dimension,
                retained.stats.non_empty_clusters,
                retained.stats.pure_clusters,
                retained.stats.retained_clusters,
                retained.stats.dropped_documents
            );
        }

        // ========== 阶段二: 分类 ==========
        let mut predictors: BTreeMap<usize, Box<dyn Predictor>> = BTreeMap::new();
        for (cluster, members) in &retained.members {
            let examples: Vec<_> = members.iter().map(|i| (&vectors[*i], labels[*i])).collect();
            let predictor =
                self.backends
                    .classifier
                    .train(&examples, dimension, &config.classification)?;
            predictors.insert(*cluster, predictor);
        }

        let predictions = test
            .iter()
            .map(|p| {
                let vector = pipeline.transform(&p.processed);
                let cluster = model.assign(&vector);
                let prediction = match predictors.get(&cluster) {
                    Some(predictor) => Prediction::Predicted(predictor.predict(&vector)),
                    None => Prediction::Unpredicted,
                };
                DocumentPrediction {
                    document_id: p.document.id.clone(),
                    prediction,
                    graders: p.document.graders,
                }
            })
            .collect();

        Ok(predictions)
    }
}

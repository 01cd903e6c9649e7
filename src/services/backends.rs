//! 可插拔后端集合
//!
//! 流程层只通过 trait 对象调用预处理、聚类、分类，默认实现由这里组装。

use crate::error::AppResult;
use crate::models::PreprocessingConfig;
use crate::services::classification::{ClassificationBackend, DefaultClassifier};
use crate::services::clustering::{ClusteringBackend, DefaultClusterer};
use crate::services::preprocessing::{LinguisticPreprocessor, RuleBasedPreprocessor};
use std::sync::Arc;

/// 一次扫描使用的全部后端
#[derive(Clone)]
pub struct Backends {
    pub preprocessor: Arc<dyn LinguisticPreprocessor>,
    pub clusterer: Arc<dyn ClusteringBackend>,
    pub classifier: Arc<dyn ClassificationBackend>,
}

impl Backends {
    /// 按预处理配置组装默认后端
    ///
    /// 开启拼写检查但词表缺失或不可读时返回错误。
    pub fn with_defaults(preprocessing: &PreprocessingConfig) -> AppResult<Self> {
        Ok(Self {
            preprocessor: Arc::new(RuleBasedPreprocessor::new(preprocessing.clone())?),
            clusterer: Arc::new(DefaultClusterer),
            classifier: Arc::new(DefaultClassifier),
        })
    }
}

impl std::fmt::Debug for Backends {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backends").finish_non_exhaustive()
    }
}

use crate::models::experiment::ExperimentConfig;
use crate::models::grade::Grade;
use serde::{Deserialize, Serialize};

/// 单个文档的预测结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "label", rename_all = "snake_case")]
pub enum Prediction {
    Predicted(String),
    /// 文档被分到了因不纯而丢弃的簇，没有分类器可用
    Unpredicted,
}

impl Prediction {
    pub fn label(&self) -> Option<&str> {
        match self {
            Prediction::Predicted(label) => Some(label),
            Prediction::Unpredicted => None,
        }
    }
}

/// 测试文档的预测以及三位评分人的分数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentPrediction {
    pub document_id: String,
    pub prediction: Prediction,
    pub graders: [Grade; 3],
}

/// 一个 (问题, 配置点) 的一致性结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgreementResult {
    pub question: String,
    pub fingerprint: String,
    /// Kappa(预测, grader1)
    pub kappa_grader1: Option<f64>,
    pub kappa_grader2: Option<f64>,
    pub kappa_grader3: Option<f64>,
    /// Kappa(grader1, grader2)
    pub baseline_1_2: Option<f64>,
    pub baseline_1_3: Option<f64>,
    pub baseline_2_3: Option<f64>,
    /// 参与统计的文档数
    pub evaluated: usize,
    /// 未能预测的文档数
    pub unpredicted: usize,
}

/// 写入结果缓存的内容
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedPoint {
    pub fingerprint: String,
    pub config: ExperimentConfig,
    pub predictions: Vec<DocumentPrediction>,
    pub agreement: AgreementResult,
    pub created_at: String,
}

/// 配置点执行状态
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PointStatus {
    Completed {
        agreement: AgreementResult,
        /// 是否直接复用了缓存
        cached: bool,
    },
    Failed {
        reason: String,
    },
}

/// 扫描中一个配置点的最终结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointOutcome {
    /// 在参数空间中的序号（从 1 开始）
    pub index: usize,
    pub fingerprint: Option<String>,
    pub config: ExperimentConfig,
    #[serde(flatten)]
    pub status: PointStatus,
    pub elapsed_ms: u64,
}

impl PointOutcome {
    pub fn agreement(&self) -> Option<&AgreementResult> {
        match &self.status {
            PointStatus::Completed { agreement, .. } => Some(agreement),
            PointStatus::Failed { .. } => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, PointStatus::Failed { .. })
    }
}

//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责参数扫描和流程调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `sweep_processor` - 参数扫描处理器
//! - 管理应用生命周期（初始化、运行）
//! - 逐个问题构建参数空间
//! - 控制并发数量（Semaphore）
//! - 持有后端、结果缓存和停止标志
//! - 输出全局统计信息
//!
//! ### `question_processor` - 单个问题处理器
//! - 读取该问题的语料（只读一次）
//! - 并发执行所有配置点（Vec<ExperimentConfig>）
//! - 缓存查询与写入
//! - 输出单个问题的统计信息
//!
//! ### `parameter_space` - 参数空间
//! - 校验参数轴，惰性枚举配置点
//!
//! ### `report` - 扫描报告
//! - 按参数轴取值汇总 kappa，写 JSON
//!
//! ## 层次关系
//!
//! ```text
//! sweep_processor (处理 Vec<Question>)
//!     ↓
//! question_processor (处理 ParameterSpace)
//!     ↓
//! workflow::ExperimentFlow (处理单个 ExperimentConfig)
//!     ↓
//! services (能力层：预处理 / 特征 / 聚类 / 分类 / 一致性)
//!     ↓
//! infrastructure (基础设施：CorpusReader / ResultStore)
//! ```

pub mod parameter_space;
pub mod question_processor;
pub mod report;
pub mod sweep_processor;

// 重新导出主要类型
pub use parameter_space::{ParameterSpace, ParameterSpaceBuilder};
pub use question_processor::{process_question, PointExecutor, QuestionStats};
pub use report::{AxisSummary, SweepReport};
pub use sweep_processor::App;

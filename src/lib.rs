//! # Short Answer Grading
//!
//! 简答题自动评分实验流水线：聚类 + 分簇分类，并用 Cohen's kappa 衡量与人工评分的一致性
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有文件资源，只暴露能力
//! - `CorpusReader` - 解析评分语料，写出 grades1/2/3.json
//! - `ResultStore` - 以配置指纹为键的结果缓存
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，不关心扫描与并发
//! - `LinguisticPreprocessor` - 分词 / 词性 / 依存 / 拼写纠正
//! - `FeaturePipeline` - n-gram 等特征抽取
//! - `ClusteringBackend` / `ClassificationBackend` - 聚类与分类
//! - `AgreementEvaluator` - kappa 一致性
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个配置点"的完整处理流程
//! - `PointCtx` - 上下文封装（question + 配置点序号）
//! - `ExperimentFlow` - 流程编排（预处理 → 特征 → 聚类 → 纯度过滤 → 分类 → 预测）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/sweep_processor` - 参数扫描入口，管理资源和并发
//! - `orchestrator/question_processor` - 单个问题处理器，遍历参数空间
//! - `orchestrator/parameter_space` - 参数空间构建与校验
//! - `orchestrator/report` - 扫描报告
//!
//! ## 模块结构

pub mod config;
pub mod error;
pub mod infrastructure;
pub mod logger;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult};
pub use infrastructure::{CorpusReader, JsonResultStore, ReaderOptions, ResultStore};
pub use models::{Document, ExperimentConfig, GradedResponse, SweepAxes};
pub use orchestrator::{App, ParameterSpace, ParameterSpaceBuilder, SweepReport};
pub use services::{AgreementEvaluator, Backends};
pub use workflow::{Corpora, ExperimentFlow, PointCtx};

//! 参数扫描处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责逐个问题执行参数扫描并管理共享资源。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：写日志文件头、加载参数轴、组装后端与结果缓存
//! 2. **逐题扫描**：为每个问题构建参数空间，委托 question_processor 执行
//! 3. **并发控制**：所有问题共享一个 Semaphore，限制同时运行的配置点数
//! 4. **停止信号**：`stop_handle()` 返回的标志置位后，不再开始新的配置点
//! 5. **全局统计**：写出每个问题的报告并汇总成功 / 失败数量

use crate::config::Config;
use crate::infrastructure::result_store::{JsonResultStore, ResultStore};
use crate::models::{load_sweep_axes, EvaluationMode, SweepAxes};
use crate::orchestrator::parameter_space::ParameterSpaceBuilder;
use crate::orchestrator::question_processor::{
    load_corpora, process_question, PointExecutor, QuestionStats,
};
use crate::orchestrator::report::SweepReport;
use crate::services::Backends;
use crate::utils::logging::{
    init_log_file, log_question_complete, log_question_start, log_startup, print_final_stats,
};
use crate::workflow::ExperimentFlow;
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::info;

/// 应用主结构
pub struct App {
    config: Config,
    axes: SweepAxes,
    executor: Arc<PointExecutor>,
    semaphore: Arc<Semaphore>,
    stop: Arc<AtomicBool>,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        // 初始化日志文件
        init_log_file(&config.output_log_file)?;

        log_startup(&config);

        let axes = match &config.sweep_file {
            Some(path) => load_sweep_axes(Path::new(path))
                .await
                .with_context(|| format!("无法加载参数轴文件: {}", path))?,
            None => SweepAxes::for_preprocessing(&config.preprocessing()),
        };

        let backends =
            Backends::with_defaults(&config.preprocessing()).context("无法创建预处理后端")?;
        let store: Arc<dyn ResultStore> = Arc::new(JsonResultStore::new(&config.cache_dir));

        Ok(Self::with_backends(config, axes, backends, store))
    }

    /// 使用指定的参数轴、后端和结果缓存创建应用
    pub fn with_backends(
        config: Config,
        axes: SweepAxes,
        backends: Backends,
        store: Arc<dyn ResultStore>,
    ) -> Self {
        let flow = ExperimentFlow::new(backends, config.verbose_logging);
        let executor = PointExecutor::new(
            flow,
            store,
            config.preprocessing(),
            config.force_rerun,
        );

        Self {
            semaphore: Arc::new(Semaphore::new(config.max_concurrent_points.max(1))),
            executor: Arc::new(executor),
            stop: Arc::new(AtomicBool::new(false)),
            axes,
            config,
        }
    }

    /// 停止标志，置位后不再开始新的配置点
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    /// 评测模式
    pub fn mode(&self) -> EvaluationMode {
        if self.config.cross_validation {
            EvaluationMode::CrossValidation {
                folds: self.config.num_folds,
            }
        } else {
            EvaluationMode::FixedSplit
        }
    }

    /// 运行应用主逻辑
    ///
    /// 配置错误和语料错误会中止整个扫描；单个配置点的失败只记录在报告中。
    pub async fn run(&self) -> Result<Vec<SweepReport>> {
        let mut reports = Vec::with_capacity(self.config.questions.len());
        let mut totals = QuestionStats::default();

        for question in &self.config.questions {
            let space = ParameterSpaceBuilder::new(&self.config.base_dir, question.as_str())
                .mode(self.mode())
                .axes(self.axes.clone())
                .parsing(self.config.use_parsing)
                .build()
                .with_context(|| format!("问题 {} 的参数空间不合法", question))?;

            log_question_start(question, space.len(), space.mode());

            let corpora = load_corpora(&space, &self.config)
                .await
                .with_context(|| format!("问题 {} 的语料读取失败", question))?;

            let outcomes = process_question(
                &space,
                Arc::new(corpora),
                self.executor.clone(),
                self.semaphore.clone(),
                self.stop.clone(),
            )
            .await?;

            let report = SweepReport::build(question, space.len(), outcomes);
            report.write(Path::new(&self.config.results_dir)).await?;

            log_question_complete(question, report.completed, report.cached, space.len());
            totals.total += report.total_points;
            totals.completed += report.completed;
            totals.failed += report.failed;
            totals.skipped += report.skipped;

            reports.push(report);

            if self.stop.load(std::sync::atomic::Ordering::SeqCst) {
                info!("⏹ 已停止，剩余问题不再处理");
                break;
            }
        }

        print_final_stats(
            totals.completed,
            totals.failed,
            totals.total,
            &self.config.output_log_file,
        );

        Ok(reports)
    }
}

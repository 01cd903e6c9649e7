//! 单个问题处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块负责处理一个问题的全部配置点，是问题级别的编排器。
//!
//! ## 核心功能
//!
//! 1. **读取语料**：每个问题只读一次训练/测试文件，写出评分序列，之后所有配置点只读共享
//! 2. **并发调度**：Semaphore 限制同时运行的配置点数，CPU 密集部分放进 `spawn_blocking`
//! 3. **结果缓存**：按指纹加锁，命中缓存直接复用，`force_rerun` 时强制重算
//! 4. **失败隔离**：单个配置点失败记为 `PointStatus::Failed`，不影响其他配置点
//! 5. **停止信号**：每个配置点开始前检查停止标志

use crate::config::Config;
use crate::error::{AppError, AppResult, WorkflowError};
use crate::infrastructure::corpus_reader::{CorpusReader, ReaderOptions};
use crate::infrastructure::result_store::{fingerprint, FingerprintLocks, ResultStore};
use crate::models::{
    AgreementResult, CachedPoint, Document, ExperimentConfig, PointOutcome, PointStatus,
    PreprocessingConfig,
};
use crate::orchestrator::parameter_space::ParameterSpace;
use crate::services::AgreementEvaluator;
use crate::utils::logging::format_kappa;
use crate::workflow::{Corpora, ExperimentFlow, PointCtx};
use futures::future::join_all;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

/// 配置点统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct QuestionStats {
    pub total: usize,
    pub completed: usize,
    pub cached: usize,
    pub failed: usize,
    /// 因停止信号未执行的配置点
    pub skipped: usize,
}

impl QuestionStats {
    pub fn from_outcomes(total: usize, outcomes: &[PointOutcome]) -> Self {
        let mut stats = Self {
            total,
            skipped: total.saturating_sub(outcomes.len()),
            ..Default::default()
        };
        for outcome in outcomes {
            match &outcome.status {
                PointStatus::Completed { cached, .. } => {
                    stats.completed += 1;
                    if *cached {
                        stats.cached += 1;
                    }
                }
                PointStatus::Failed { .. } => stats.failed += 1,
            }
        }
        stats
    }
}

/// 执行单个配置点所需的共享资源
///
/// 只有结果缓存是跨配置点共享的可变状态。
pub struct PointExecutor {
    flow: Arc<ExperimentFlow>,
    evaluator: AgreementEvaluator,
    store: Arc<dyn ResultStore>,
    locks: FingerprintLocks,
    preprocessing: PreprocessingConfig,
    force_rerun: bool,
}

impl PointExecutor {
    pub fn new(
        flow: ExperimentFlow,
        store: Arc<dyn ResultStore>,
        preprocessing: PreprocessingConfig,
        force_rerun: bool,
    ) -> Self {
        Self {
            flow: Arc::new(flow),
            evaluator: AgreementEvaluator::new(),
            store,
            locks: FingerprintLocks::new(),
            preprocessing,
            force_rerun,
        }
    }

    /// 运行一个配置点，任何错误都转为失败状态
    pub async fn run_point(
        &self,
        config: ExperimentConfig,
        corpora: Arc<Corpora>,
        ctx: PointCtx,
    ) -> PointOutcome {
        let started = Instant::now();
        let mut fingerprint_value = None;

        let result = match fingerprint(&config, &self.preprocessing).await {
            Ok(fp) => {
                fingerprint_value = Some(fp.clone());
                self.execute(&fp, &config, corpora, &ctx).await
            }
            Err(e) => Err(e),
        };

        let status = match result {
            Ok((agreement, cached)) => {
                info!(
                    "{} ✓ kappa(预测, g1)={} 参与 {} 条{}",
                    ctx,
                    format_kappa(agreement.kappa_grader1),
                    agreement.evaluated,
                    if cached { " (缓存)" } else { "" }
                );
                PointStatus::Completed { agreement, cached }
            }
            Err(e) => {
                if e.is_point_recoverable() {
                    warn!("{} ⚠️ 配置点失败: {}", ctx, e);
                } else {
                    error!("{} ❌ 配置点失败: {}", ctx, e);
                }
                PointStatus::Failed {
                    reason: e.to_string(),
                }
            }
        };

        PointOutcome {
            index: ctx.index,
            fingerprint: fingerprint_value,
            config,
            status,
            elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        }
    }

    async fn execute(
        &self,
        fp: &str,
        config: &ExperimentConfig,
        corpora: Arc<Corpora>,
        ctx: &PointCtx,
    ) -> AppResult<(AgreementResult, bool)> {
        // 同一指纹的读-算-写串行
        let _guard = self.locks.lock(fp).await;

        if !self.force_rerun {
            if let Some(cached) = self.store.get(fp).await? {
                return Ok((cached.agreement, true));
            }
        }

        let flow = self.flow.clone();
        let point_config = config.clone();
        let point_ctx = ctx.clone();
        let predictions = tokio::task::spawn_blocking(move || {
            flow.run(&point_config, &corpora, &point_ctx)
        })
        .await
        .map_err(|e| WorkflowError::TaskAborted {
            reason: e.to_string(),
        })??;

        let agreement = self.evaluator.evaluate(&config.question, fp, &predictions);

        self.store
            .put(&CachedPoint {
                fingerprint: fp.to_string(),
                config: config.clone(),
                predictions,
                agreement: agreement.clone(),
                created_at: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            })
            .await?;

        Ok((agreement, false))
    }
}

/// 读取一个问题的训练（和测试）语料
///
/// 语料错误是致命的，直接向上返回。
pub async fn load_corpora(space: &ParameterSpace, config: &Config) -> AppResult<Corpora> {
    let question = space.question().to_string();
    let readers = space.readers().clone();

    let question_id = question.parse::<i64>().ok();
    if question_id.is_none() {
        warn!("[问题 {}] 问题编号不是整数，不按问题过滤", question);
    }

    let options = |split: &str| ReaderOptions {
        encoding: config.encoding,
        language: config.language.clone(),
        question_id,
        grades_dir: Path::new(&config.results_dir).join(format!("{}_{}", question, split)),
        ..Default::default()
    };

    let train = read_corpus(PathBuf::from(&readers.train), options("train")).await?;
    let test = match &readers.test {
        Some(path) => Some(read_corpus(PathBuf::from(path), options("test")).await?),
        None => None,
    };

    info!(
        "[问题 {}] 📚 训练 {} 条{}",
        question,
        train.len(),
        test.as_ref()
            .map(|t| format!(", 测试 {} 条", t.len()))
            .unwrap_or_default()
    );

    Ok(Corpora { train, test })
}

async fn read_corpus(path: PathBuf, options: ReaderOptions) -> AppResult<Vec<Document>> {
    tokio::task::spawn_blocking(move || -> AppResult<Vec<Document>> {
        let reader = CorpusReader::open(&path, &options)?;
        Ok(reader.collect())
    })
    .await
    .map_err(|e| {
        AppError::from(WorkflowError::TaskAborted {
            reason: e.to_string(),
        })
    })?
}

/// 处理单个问题的全部配置点
///
/// # 参数
/// - `space`: 已校验的参数空间
/// - `corpora`: 该问题的语料
/// - `executor`: 配置点执行器
/// - `semaphore`: 并发许可
/// - `stop`: 停止标志
///
/// # 返回
/// 按配置点序号排序的结果；停止后未开始的配置点不出现在结果中
pub async fn process_question(
    space: &ParameterSpace,
    corpora: Arc<Corpora>,
    executor: Arc<PointExecutor>,
    semaphore: Arc<Semaphore>,
    stop: Arc<AtomicBool>,
) -> AppResult<Vec<PointOutcome>> {
    let total = space.len();
    let mut handles = Vec::with_capacity(total);

    for (offset, config) in space.iter().enumerate() {
        let ctx = PointCtx::new(space.question(), offset + 1, total);

        if stop.load(Ordering::SeqCst) {
            warn!("{} ⏹ 收到停止信号，跳过剩余配置点", ctx);
            break;
        }

        let permit = semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| WorkflowError::TaskAborted {
                reason: e.to_string(),
            })?;

        // 许可等待期间可能收到停止信号
        if stop.load(Ordering::SeqCst) {
            warn!("{} ⏹ 收到停止信号，跳过剩余配置点", ctx);
            break;
        }

        let executor = executor.clone();
        let corpora = corpora.clone();
        let fallback = (ctx.index, config.clone());

        let handle = tokio::spawn(async move {
            let _permit = permit;
            executor.run_point(config, corpora, ctx).await
        });
        handles.push((fallback, handle));
    }

    let (fallbacks, handles): (Vec<_>, Vec<_>) = handles.into_iter().unzip();
    let results = join_all(handles).await;

    let mut outcomes = Vec::with_capacity(results.len());
    for ((index, config), result) in fallbacks.into_iter().zip(results) {
        match result {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => {
                error!("[问题 {}] [点 {}/{}] 任务执行失败: {}", space.question(), index, total, e);
                outcomes.push(PointOutcome {
                    index,
                    fingerprint: None,
                    config,
                    status: PointStatus::Failed {
                        reason: e.to_string(),
                    },
                    elapsed_ms: 0,
                });
            }
        }
    }

    outcomes.sort_by_key(|o| o.index);
    Ok(outcomes)
}

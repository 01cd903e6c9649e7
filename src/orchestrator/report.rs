//! 扫描报告 - 编排层
//!
//! 汇总一个问题的全部配置点结果：每个参数轴取值的平均 / 最佳 kappa、
//! 失败的配置点以及每个配置点的耗时，写成 `report_<question>.json`。

use crate::error::{AppError, AppResult};
use crate::models::PointOutcome;
use crate::orchestrator::question_processor::QuestionStats;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

/// 某个参数轴取值上的汇总（基于 kappa(预测, grader1)）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisSummary {
    pub axis: String,
    pub value: String,
    /// 该取值下的配置点数（含失败）
    pub points: usize,
    pub mean_kappa: Option<f64>,
    pub best_kappa: Option<f64>,
}

/// 最佳配置点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestPoint {
    pub index: usize,
    pub label: String,
    pub kappa: f64,
}

/// 单个问题的扫描报告
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepReport {
    pub question: String,
    pub generated_at: String,
    pub total_points: usize,
    pub completed: usize,
    pub cached: usize,
    pub failed: usize,
    pub skipped: usize,
    pub best: Option<BestPoint>,
    pub axes: Vec<AxisSummary>,
    pub points: Vec<PointOutcome>,
}

impl SweepReport {
    pub fn build(question: &str, total_points: usize, outcomes: Vec<PointOutcome>) -> Self {
        let stats = QuestionStats::from_outcomes(total_points, &outcomes);

        let best = outcomes
            .iter()
            .filter_map(|o| {
                let kappa = o.agreement()?.kappa_grader1?;
                Some(BestPoint {
                    index: o.index,
                    label: o.config.label(),
                    kappa,
                })
            })
            .fold(None, |best: Option<BestPoint>, candidate| match best {
                Some(b) if b.kappa >= candidate.kappa => Some(b),
                _ => Some(candidate),
            });

        Self {
            question: question.to_string(),
            generated_at: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            total_points,
            completed: stats.completed,
            cached: stats.cached,
            failed: stats.failed,
            skipped: stats.skipped,
            best,
            axes: summarize_axes(&outcomes),
            points: outcomes,
        }
    }

    /// 写入 `<dir>/report_<question>.json`
    pub async fn write(&self, dir: &Path) -> AppResult<PathBuf> {
        fs::create_dir_all(dir)
            .await
            .map_err(|e| AppError::file_write_failed(dir.display().to_string(), e))?;

        let path = dir.join(format!("report_{}.json", self.question));
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&path, json)
            .await
            .map_err(|e| AppError::file_write_failed(path.display().to_string(), e))?;

        info!("[问题 {}] 📝 报告已写入: {}", self.question, path.display());
        Ok(path)
    }
}

fn summarize_axes(outcomes: &[PointOutcome]) -> Vec<AxisSummary> {
    // (轴, 取值) → kappa 列表，按首次出现顺序
    let mut groups: Vec<(&'static str, String, usize, Vec<f64>)> = Vec::new();

    for outcome in outcomes {
        let kappa = outcome.agreement().and_then(|a| a.kappa_grader1);
        let keys = [
            ("feature_set", outcome.config.feature_set.label()),
            ("clustering", outcome.config.clustering.label()),
            ("classification", outcome.config.classification.label()),
            (
                "only_pure_clusters",
                outcome.config.only_pure_clusters.to_string(),
            ),
        ];

        for (axis, value) in keys {
            let index = match groups.iter().position(|g| g.0 == axis && g.1 == value) {
                Some(index) => index,
                None => {
                    groups.push((axis, value, 0, Vec::new()));
                    groups.len() - 1
                }
            };
            let group = &mut groups[index];
            group.2 += 1;
            if let Some(k) = kappa {
                group.3.push(k);
            }
        }
    }

    groups
        .into_iter()
        .map(|(axis, value, points, kappas)| AxisSummary {
            axis: axis.to_string(),
            value,
            points,
            mean_kappa: (!kappas.is_empty())
                .then(|| kappas.iter().sum::<f64>() / kappas.len() as f64),
            best_kappa: kappas.iter().copied().reduce(f64::max),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        AgreementResult, ClassificationSpec, ClusteringSpec, EvaluationMode, ExperimentConfig,
        ExtractorSpec, FeatureSet, PointStatus, ReaderPairing,
    };

    fn outcome(index: usize, only_pure: bool, kappa: Option<f64>) -> PointOutcome {
        let status = match kappa {
            Some(k) => PointStatus::Completed {
                agreement: AgreementResult {
                    question: "1".to_string(),
                    fingerprint: format!("fp{}", index),
                    kappa_grader1: Some(k),
                    kappa_grader2: None,
                    kappa_grader3: None,
                    baseline_1_2: None,
                    baseline_1_3: None,
                    baseline_2_3: None,
                    evaluated: 10,
                    unpredicted: 0,
                },
                cached: false,
            },
            None => PointStatus::Failed {
                reason: "后端错误".to_string(),
            },
        };
        PointOutcome {
            index,
            fingerprint: Some(format!("fp{}", index)),
            config: ExperimentConfig {
                question: "1".to_string(),
                readers: ReaderPairing {
                    train: "1_train.txt".to_string(),
                    test: None,
                },
                mode: EvaluationMode::CrossValidation { folds: 5 },
                feature_set: FeatureSet(vec![ExtractorSpec::TokenCount]),
                clustering: ClusteringSpec::Global,
                classification: ClassificationSpec::MajorityClass,
                only_pure_clusters: only_pure,
            },
            status,
            elapsed_ms: 5,
        }
    }

    #[test]
    fn test_axis_means_and_best() {
        let report = SweepReport::build(
            "1",
            3,
            vec![
                outcome(1, false, Some(0.2)),
                outcome(2, true, Some(0.6)),
                outcome(3, true, None),
            ],
        );

        assert_eq!(report.completed, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.best.as_ref().map(|b| b.index), Some(2));

        let pure = report
            .axes
            .iter()
            .find(|a| a.axis == "only_pure_clusters" && a.value == "true")
            .unwrap();
        assert_eq!(pure.points, 2);
        assert_eq!(pure.mean_kappa, Some(0.6));

        let global = report.axes.iter().find(|a| a.axis == "clustering").unwrap();
        assert_eq!(global.points, 3);
        assert_eq!(global.best_kappa, Some(0.6));
        assert!((global.mean_kappa.unwrap() - 0.4).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_write_report_json() {
        let dir = tempfile::tempdir().unwrap();
        let report = SweepReport::build("7", 1, vec![outcome(1, false, Some(0.5))]);
        let path = report.write(dir.path()).await.unwrap();

        assert!(path.ends_with("report_7.json"));
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["points"][0]["status"], "completed");
        assert_eq!(json["best"]["index"], 1);
    }
}

//! 一致性评估服务 - 业务能力层
//!
//! 计算预测与每位评分人之间的 Cohen's kappa，以及评分人两两之间的基线 kappa。
//!
//! ## 排除规则
//!
//! 一条记录只有在"已预测"且 grader1 不是哨兵值时才参与统计；
//! 每个两两比较再额外丢弃任一方为哨兵值的记录。
//!
//! ## 参考
//!
//! - Cohen (1960). "A coefficient of agreement for nominal scales"

use crate::models::{AgreementResult, DocumentPrediction, Grade};
use std::collections::BTreeMap;
use tracing::debug;

/// Cohen's kappa
///
/// `(p_o - p_e) / (1 - p_e)`。
///
/// # 返回
/// - 没有任何配对时返回 `None`
/// - `p_e == 1` 时：完全一致返回 `1.0`，否则 `0.0`
pub fn cohen_kappa<T: Ord>(pairs: &[(T, T)]) -> Option<f64> {
    if pairs.is_empty() {
        return None;
    }
    let n = pairs.len() as f64;

    let mut left: BTreeMap<&T, usize> = BTreeMap::new();
    let mut right: BTreeMap<&T, usize> = BTreeMap::new();
    let mut agreed = 0usize;
    for (a, b) in pairs {
        *left.entry(a).or_insert(0) += 1;
        *right.entry(b).or_insert(0) += 1;
        if a == b {
            agreed += 1;
        }
    }

    let p_o = agreed as f64 / n;
    let p_e: f64 = left
        .iter()
        .map(|(label, count)| {
            let other = right.get(label).copied().unwrap_or(0);
            (*count as f64 / n) * (other as f64 / n)
        })
        .sum();

    if (1.0 - p_e).abs() < f64::EPSILON {
        return Some(if (1.0 - p_o).abs() < f64::EPSILON {
            1.0
        } else {
            0.0
        });
    }
    Some((p_o - p_e) / (1.0 - p_e))
}

/// 一致性评估器
#[derive(Debug, Default)]
pub struct AgreementEvaluator;

impl AgreementEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// 对一个 (问题, 配置点) 的全部预测计算一致性
    pub fn evaluate(
        &self,
        question: &str,
        fingerprint: &str,
        predictions: &[DocumentPrediction],
    ) -> AgreementResult {
        let unpredicted = predictions
            .iter()
            .filter(|p| p.prediction.label().is_none())
            .count();

        let eligible: Vec<(&str, &[Grade; 3])> = predictions
            .iter()
            .filter_map(|p| {
                let label = p.prediction.label()?;
                p.graders[0].is_graded().then_some((label, &p.graders))
            })
            .collect();

        let versus_grader = |n: usize| -> Option<f64> {
            let pairs: Vec<(String, String)> = eligible
                .iter()
                .filter(|(_, g)| g[n].is_graded())
                .map(|(label, g)| (label.to_string(), g[n].label()))
                .collect();
            cohen_kappa(&pairs)
        };

        let between_graders = |a: usize, b: usize| -> Option<f64> {
            let pairs: Vec<(i32, i32)> = eligible
                .iter()
                .filter(|(_, g)| g[a].is_graded() && g[b].is_graded())
                .map(|(_, g)| (g[a].value(), g[b].value()))
                .collect();
            cohen_kappa(&pairs)
        };

        let result = AgreementResult {
            question: question.to_string(),
            fingerprint: fingerprint.to_string(),
            kappa_grader1: versus_grader(0),
            kappa_grader2: versus_grader(1),
            kappa_grader3: versus_grader(2),
            baseline_1_2: between_graders(0, 1),
            baseline_1_3: between_graders(0, 2),
            baseline_2_3: between_graders(1, 2),
            evaluated: eligible.len(),
            unpredicted,
        };

        debug!(
            "[问题 {}] kappa(预测, g1)={:?} 参与 {} 条, 未预测 {} 条",
            question, result.kappa_grader1, result.evaluated, result.unpredicted
        );

        result
    }
}

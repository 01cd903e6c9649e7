//! 日志工具模块
//!
//! 提供日志格式化和输出的辅助函数

use anyhow::{Context, Result};
use std::fs;
use tracing::info;

use crate::config::Config;
use crate::models::EvaluationMode;

/// 初始化日志文件
///
/// # 参数
/// - `log_file_path`: 日志文件路径
///
/// # 返回
/// 返回是否成功初始化
pub fn init_log_file(log_file_path: &str) -> Result<()> {
    let log_header = format!(
        "{}\n评分实验日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)
        .with_context(|| format!("无法写入日志文件: {}", log_file_path))?;
    Ok(())
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 评分实验参数扫描");
    info!("📁 语料目录: {}", config.base_dir);
    info!("📝 问题列表: {}", config.questions.join(", "));
    info!("📊 最大并发配置点: {}", config.max_concurrent_points);
    info!("🔤 语料编码: {:?}", config.encoding);
    if config.force_rerun {
        info!("♻️ 忽略缓存，强制重新计算");
    }
    info!("{}", "=".repeat(60));
}

/// 记录问题开始信息
///
/// # 参数
/// - `question`: 问题编号
/// - `points`: 配置点数量
/// - `mode`: 评测模式
pub fn log_question_start(question: &str, points: usize, mode: EvaluationMode) {
    let mode = match mode {
        EvaluationMode::FixedSplit => "固定划分".to_string(),
        EvaluationMode::CrossValidation { folds } => format!("{} 折交叉验证", folds),
    };
    info!("\n{}", "=".repeat(60));
    info!("📦 开始处理问题 {}", question);
    info!("📄 配置点: {} 个, 评测模式: {}", points, mode);
    info!("{}", "=".repeat(60));
}

/// 记录问题完成信息
pub fn log_question_complete(question: &str, completed: usize, cached: usize, total: usize) {
    info!("\n{}", "─".repeat(60));
    info!(
        "✓ 问题 {} 完成: 成功 {}/{} (其中缓存 {})",
        question, completed, total, cached
    );
    info!("{}", "─".repeat(60));
}

/// 打印最终统计信息
///
/// # 参数
/// - `success`: 成功数量
/// - `failed`: 失败数量
/// - `total`: 总数
/// - `log_file_path`: 日志文件路径
pub fn print_final_stats(success: usize, failed: usize, total: usize, log_file_path: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 成功: {}/{}", success, total);
    info!("❌ 失败: {}", failed);
    info!("{}", "=".repeat(60));
    info!("\n日志已保存至: {}", log_file_path);
}

/// 格式化可选的 kappa 值
pub fn format_kappa(kappa: Option<f64>) -> String {
    kappa.map_or_else(|| "n/a".to_string(), |k| format!("{:.4}", k))
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

//! 配置点处理上下文
//!
//! 封装"我正在处理哪个问题的第几个配置点"这一信息

use std::fmt::Display;

/// 配置点处理上下文
#[derive(Debug, Clone)]
pub struct PointCtx {
    /// 问题编号
    pub question: String,

    /// 配置点序号（从1开始）
    pub index: usize,

    /// 该问题的配置点总数（仅用于日志显示）
    pub total: usize,
}

impl PointCtx {
    pub fn new(question: impl Into<String>, index: usize, total: usize) -> Self {
        Self {
            question: question.into(),
            index,
            total,
        }
    }
}

impl Display for PointCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[问题 {}] [点 {}/{}]", self.question, self.index, self.total)
    }
}

//! 交叉验证折划分
//!
//! 按输入顺序切成 k 个连续块，前 `n % k` 个块多分一个文档。

use crate::error::{AppResult, WorkflowError};
use std::ops::Range;

/// 计算 k 折的下标区间
pub fn fold_ranges(documents: usize, folds: usize) -> AppResult<Vec<Range<usize>>> {
    if folds == 0 || documents < folds {
        return Err(WorkflowError::NotEnoughDocuments { documents, folds }.into());
    }

    let base = documents / folds;
    let extra = documents % folds;
    let mut start = 0;
    let ranges = (0..folds)
        .map(|fold| {
            let size = base + usize::from(fold < extra);
            let range = start..start + size;
            start += size;
            range
        })
        .collect();
    Ok(ranges)
}

//! 评分序列写入服务 - 业务能力层
//!
//! 只负责"写 grades1/2/3.json"能力，不关心语料解析

use crate::error::CorpusError;
use crate::models::Grade;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// 三位评分人的平行评分序列
///
/// 只收集 grader1 有效的记录，三个序列长度始终相同。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GradeLists {
    pub grader1: Vec<i32>,
    pub grader2: Vec<i32>,
    pub grader3: Vec<i32>,
}

impl GradeLists {
    /// 追加一条记录的三个分数；grader1 为哨兵值时忽略
    pub fn push(&mut self, grades: [Grade; 3]) {
        if !grades[0].is_graded() {
            return;
        }
        self.grader1.push(grades[0].value());
        self.grader2.push(grades[1].value());
        self.grader3.push(grades[2].value());
    }

    pub fn len(&self) -> usize {
        self.grader1.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grader1.is_empty()
    }
}

/// 评分序列写入服务
pub struct GradeWriter {
    output_dir: PathBuf,
}

impl GradeWriter {
    /// 创建写入到指定目录的服务
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// 写出三个 JSON 整数数组
    ///
    /// # 返回
    /// 任何一个文件写入失败都返回 `CorpusError::Persist`
    pub fn write(&self, lists: &GradeLists) -> Result<(), CorpusError> {
        fs::create_dir_all(&self.output_dir).map_err(|e| CorpusError::Persist {
            path: self.output_dir.display().to_string(),
            source: Box::new(e),
        })?;

        for (name, values) in [
            ("grades1.json", &lists.grader1),
            ("grades2.json", &lists.grader2),
            ("grades3.json", &lists.grader3),
        ] {
            let path = self.output_dir.join(name);
            let json = serde_json::to_string(values).map_err(|e| CorpusError::Persist {
                path: path.display().to_string(),
                source: Box::new(e),
            })?;
            fs::write(&path, json).map_err(|e| CorpusError::Persist {
                path: path.display().to_string(),
                source: Box::new(e),
            })?;
        }

        debug!(
            "写入评分序列: {} ({} 条)",
            self.output_dir.display(),
            lists.len()
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_skips_ungraded_grader1() {
        let mut lists = GradeLists::default();
        lists.push([Grade::new(2), Grade::new(3), Grade::new(-1)]);
        lists.push([Grade::UNGRADED, Grade::new(1), Grade::new(1)]);
        assert_eq!(lists.grader1, vec![2]);
        assert_eq!(lists.grader3, vec![-1]);
    }

    #[test]
    fn test_write_creates_three_files() {
        let dir = tempfile::tempdir().unwrap();
        let writer = GradeWriter::new(dir.path().join("q1_train"));
        let mut lists = GradeLists::default();
        lists.push([Grade::new(1), Grade::new(0), Grade::new(1)]);

        writer.write(&lists).unwrap();

        let g2 = fs::read_to_string(dir.path().join("q1_train/grades2.json")).unwrap();
        assert_eq!(g2, "[0]");
    }

    #[test]
    fn test_write_into_file_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "x").unwrap();

        let writer = GradeWriter::new(blocker.join("nested"));
        let result = writer.write(&GradeLists::default());
        assert!(matches!(result, Err(CorpusError::Persist { .. })));
    }
}

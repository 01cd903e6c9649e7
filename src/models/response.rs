use crate::models::grade::Grade;
use serde::{Deserialize, Serialize};

/// 一条学生作答记录（输入文件中的一行）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradedResponse {
    pub student_id: String,
    pub question_id: i64,
    /// 已将 U+2019 替换为 ASCII 撇号
    pub text: String,
    pub grader1: Grade,
    pub grader2: Grade,
    pub grader3: Grade,
}

impl GradedResponse {
    /// 三位评分人的分数，按评分人顺序
    pub fn grades(&self) -> [Grade; 3] {
        [self.grader1, self.grader2, self.grader3]
    }

    /// 转换为流水线使用的文档
    pub fn into_document(self, language: &str, source_uri: &str) -> Document {
        let graders = self.grades();
        Document {
            id: self.student_id,
            language: language.to_string(),
            text: self.text,
            group_id: self.question_id.to_string(),
            source_uri: source_uri.to_string(),
            outcome: self.grader1.label(),
            graders,
        }
    }
}

/// 流水线文档
///
/// `outcome` 是 grader1 的字符串形式，作为分类目标。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub language: String,
    pub text: String,
    pub group_id: String,
    pub source_uri: String,
    pub outcome: String,
    pub graders: [Grade; 3],
}

impl Document {
    /// grader1 是否有评分（没有评分的文档不参与训练）
    pub fn has_outcome(&self) -> bool {
        self.graders[0].is_graded()
    }
}

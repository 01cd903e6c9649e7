use serde::{Deserialize, Serialize};

/// 评分值
///
/// `-1` 表示该评分人没有评分（哨兵值），不参与任何一致性统计。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Grade(i32);

impl Grade {
    /// 未评分哨兵值
    pub const UNGRADED: Grade = Grade(-1);

    pub fn new(value: i32) -> Self {
        Self(value)
    }

    /// 获取原始整数值
    pub fn value(self) -> i32 {
        self.0
    }

    /// 是否为有效评分
    pub fn is_graded(self) -> bool {
        self != Self::UNGRADED
    }

    /// 作为分类标签使用的字符串形式
    pub fn label(self) -> String {
        self.0.to_string()
    }
}

impl From<i32> for Grade {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

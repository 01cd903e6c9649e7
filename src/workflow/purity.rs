//! 簇纯度过滤
//!
//! 聚类与分类之间的独立步骤：按簇分组训练文档，
//! `only_pure` 开启时只保留所有成员 grader1 标签相同的簇。
//! 没有成员的簇一律不保留。

use std::collections::BTreeMap;

/// 过滤统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurityStats {
    /// 至少有一个成员的簇
    pub non_empty_clusters: usize,
    pub pure_clusters: usize,
    pub retained_clusters: usize,
    /// 因所在簇被丢弃而不参与训练的文档
    pub dropped_documents: usize,
}

/// 保留下来的簇：簇编号 → 成员下标（升序）
#[derive(Debug, Clone, Default)]
pub struct RetainedClusters {
    pub members: BTreeMap<usize, Vec<usize>>,
    pub stats: PurityStats,
}

/// 按簇分组并应用纯度策略
///
/// `assignments` 与 `labels` 按训练文档一一对应。
pub fn retain_pure_clusters(
    assignments: &[usize],
    labels: &[&str],
    only_pure: bool,
) -> RetainedClusters {
    let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (index, cluster) in assignments.iter().enumerate() {
        groups.entry(*cluster).or_default().push(index);
    }

    let mut stats = PurityStats {
        non_empty_clusters: groups.len(),
        ..Default::default()
    };

    let members: BTreeMap<usize, Vec<usize>> = groups
        .into_iter()
        .filter(|(_, docs)| {
            let pure = docs.iter().all(|i| labels[*i] == labels[docs[0]]);
            if pure {
                stats.pure_clusters += 1;
            }
            let keep = pure || !only_pure;
            if !keep {
                stats.dropped_documents += docs.len();
            }
            keep
        })
        .collect();

    stats.retained_clusters = members.len();
    RetainedClusters { members, stats }
}

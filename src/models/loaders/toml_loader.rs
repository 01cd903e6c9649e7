use crate::error::{AppError, AppResult};
use crate::models::experiment::SweepAxes;
use std::path::Path;
use tokio::fs;

/// 从 TOML 文件加载参数轴
///
/// 文件中缺省的参数轴使用内置取值。
pub async fn load_sweep_axes(toml_file_path: &Path) -> AppResult<SweepAxes> {
    let path = toml_file_path.display().to_string();
    let content = fs::read_to_string(toml_file_path)
        .await
        .map_err(|e| AppError::file_read_failed(path.as_str(), e))?;

    let axes: SweepAxes =
        toml::from_str(&content).map_err(|e| AppError::toml_parse_failed(path.as_str(), e))?;

    tracing::info!(
        "成功加载参数轴: {} 个特征集合, {} 个聚类配置, {} 个分类配置, {} 个纯度策略",
        axes.feature_sets.len(),
        axes.clustering.len(),
        axes.classification.len(),
        axes.only_pure_clusters.len()
    );

    Ok(axes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FileError;
    use crate::models::experiment::{ClassificationSpec, ClusteringSpec, ExtractorSpec};

    #[tokio::test]
    async fn test_load_partial_sweep_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sweep.toml");
        std::fs::write(
            &path,
            r#"
only_pure_clusters = [true]
feature_sets = [
    [{ kind = "token_count" }, { kind = "word_ngram", top_k = 100, stopwords = "english" }],
]

[[clustering]]
algorithm = "k_means"
k = 8

[[classification]]
algorithm = "majority_class"

"#,
        )
        .unwrap();

        let axes = load_sweep_axes(&path).await.unwrap();
        assert_eq!(axes.only_pure_clusters, vec![true]);
        assert!(matches!(
            axes.clustering[0],
            ClusteringSpec::KMeans { k: 8, seed: 10, .. }
        ));
        assert_eq!(axes.classification, vec![ClassificationSpec::MajorityClass]);
        assert_eq!(axes.feature_sets.len(), 1);
        let extractors = axes.feature_sets[0].extractors();
        assert_eq!(extractors[0], ExtractorSpec::TokenCount);
        assert!(matches!(
            extractors[1],
            ExtractorSpec::WordNgram { top_k: 100, min_n: 1, max_n: 3, .. }
        ));
    }

    #[tokio::test]
    async fn test_missing_file_is_error() {
        let result = load_sweep_axes(Path::new("/definitely/missing/sweep.toml")).await;
        assert!(matches!(
            result,
            Err(AppError::File(FileError::ReadFailed { .. }))
        ));
    }

    #[tokio::test]
    async fn test_malformed_toml_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sweep.toml");
        std::fs::write(&path, "only_pure_clusters = [tru").unwrap();

        let result = load_sweep_axes(&path).await;
        assert!(matches!(
            result,
            Err(AppError::File(FileError::TomlParseFailed { .. }))
        ));
    }
}

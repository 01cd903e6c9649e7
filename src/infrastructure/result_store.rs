//! 结果缓存 - 基础设施层
//!
//! 以配置指纹为键的持久化存储。同一指纹的"读-算-写"由 `FingerprintLocks` 串行化，
//! 写入先落临时文件再重命名，失败的配置点不会留下半个缓存文件。

use crate::error::{AppError, AppResult, CacheError};
use crate::models::{
    CachedPoint, ExperimentConfig, ExtractorSpec, PreprocessingConfig, StopwordSource,
};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::fs;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, warn};

/// 指纹格式版本，格式变化时递增以淘汰旧缓存
const FINGERPRINT_VERSION: u32 = 1;

/// 结果存储后端
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// 读取指纹对应的缓存，不存在时返回 `None`
    async fn get(&self, fingerprint: &str) -> AppResult<Option<CachedPoint>>;

    /// 写入（或覆盖）一个配置点的结果
    async fn put(&self, point: &CachedPoint) -> AppResult<()>;
}

/// 以 `<dir>/<fingerprint>.json` 形式保存的结果存储
pub struct JsonResultStore {
    dir: PathBuf,
}

impl JsonResultStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, fingerprint: &str) -> PathBuf {
        self.dir.join(format!("{}.json", fingerprint))
    }
}

#[async_trait]
impl ResultStore for JsonResultStore {
    async fn get(&self, fingerprint: &str) -> AppResult<Option<CachedPoint>> {
        let path = self.path_for(fingerprint);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(CacheError::ReadFailed {
                    fingerprint: fingerprint.to_string(),
                    source: Box::new(e),
                }
                .into())
            }
        };

        match serde_json::from_str::<CachedPoint>(&content) {
            Ok(point) => Ok(Some(point)),
            Err(e) => {
                warn!("缓存文件 {} 已损坏，视为未命中: {}", path.display(), e);
                Ok(None)
            }
        }
    }

    async fn put(&self, point: &CachedPoint) -> AppResult<()> {
        let write_failed = |e: Box<dyn std::error::Error + Send + Sync>| -> AppError {
            CacheError::WriteFailed {
                fingerprint: point.fingerprint.clone(),
                source: e,
            }
            .into()
        };

        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| write_failed(Box::new(e)))?;

        let json = serde_json::to_string_pretty(point).map_err(|e| write_failed(Box::new(e)))?;
        let final_path = self.path_for(&point.fingerprint);
        let tmp_path = final_path.with_extension("json.tmp");

        fs::write(&tmp_path, json)
            .await
            .map_err(|e| write_failed(Box::new(e)))?;
        fs::rename(&tmp_path, &final_path)
            .await
            .map_err(|e| write_failed(Box::new(e)))?;

        debug!("写入缓存: {}", final_path.display());
        Ok(())
    }
}

/// 按指纹加锁，保证同一指纹的缓存写入串行
#[derive(Default)]
pub struct FingerprintLocks {
    inner: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl FingerprintLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取指纹对应的锁，持有期间其他同指纹任务等待
    pub async fn lock(&self, fingerprint: &str) -> OwnedMutexGuard<()> {
        let mutex = {
            let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            map.entry(fingerprint.to_string()).or_default().clone()
        };
        mutex.lock_owned().await
    }
}

#[derive(Serialize)]
struct FileIdentity {
    path: String,
    content_hash: String,
}

#[derive(Serialize)]
struct FingerprintInput<'a> {
    version: u32,
    config: &'a ExperimentConfig,
    preprocessing: &'a PreprocessingConfig,
    files: Vec<FileIdentity>,
}

/// 计算配置点指纹
///
/// 覆盖逻辑配置、预处理配置以及输入文件的内容哈希（不含时间戳）。
pub async fn fingerprint(
    config: &ExperimentConfig,
    preprocessing: &PreprocessingConfig,
) -> AppResult<String> {
    let mut files = vec![identify(Path::new(&config.readers.train)).await?];
    if let Some(test) = &config.readers.test {
        files.push(identify(Path::new(test)).await?);
    }
    for spec in config.feature_set.extractors() {
        match spec {
            ExtractorSpec::WordNgram {
                stopwords: StopwordSource::File(path),
                ..
            }
            | ExtractorSpec::SkipNgram {
                stopwords: StopwordSource::File(path),
                ..
            } => files.push(identify(Path::new(path)).await?),
            _ => {}
        }
    }
    if preprocessing.use_spell_checking {
        if let Some(vocabulary) = &preprocessing.spelling_vocabulary {
            files.push(identify(Path::new(vocabulary)).await?);
        }
    }

    let input = FingerprintInput {
        version: FINGERPRINT_VERSION,
        config,
        preprocessing,
        files,
    };
    let canonical = serde_json::to_vec(&input)?;
    Ok(blake3::hash(&canonical).to_hex().to_string())
}

async fn identify(path: &Path) -> AppResult<FileIdentity> {
    let bytes = fs::read(path)
        .await
        .map_err(|e| AppError::file_read_failed(path.display().to_string(), e))?;
    Ok(FileIdentity {
        path: path.display().to_string(),
        content_hash: blake3::hash(&bytes).to_hex().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        AgreementResult, ClassificationSpec, ClusteringSpec, EvaluationMode, FeatureSet,
        ReaderPairing,
    };

    fn sample_config(train: &Path) -> ExperimentConfig {
        ExperimentConfig {
            question: "1".to_string(),
            readers: ReaderPairing {
                train: train.display().to_string(),
                test: None,
            },
            mode: EvaluationMode::CrossValidation { folds: 5 },
            feature_set: FeatureSet(vec![ExtractorSpec::TokenCount]),
            clustering: ClusteringSpec::Global,
            classification: ClassificationSpec::MajorityClass,
            only_pure_clusters: false,
        }
    }

    fn sample_point(fingerprint: &str, config: ExperimentConfig) -> CachedPoint {
        CachedPoint {
            fingerprint: fingerprint.to_string(),
            config,
            predictions: Vec::new(),
            agreement: AgreementResult {
                question: "1".to_string(),
                fingerprint: fingerprint.to_string(),
                kappa_grader1: Some(0.5),
                kappa_grader2: None,
                kappa_grader3: None,
                baseline_1_2: None,
                baseline_1_3: None,
                baseline_2_3: None,
                evaluated: 0,
                unpredicted: 0,
            },
            created_at: "2024-01-01 00:00:00".to_string(),
        }
    }

    #[tokio::test]
    async fn test_fingerprint_tracks_file_content() {
        let dir = tempfile::tempdir().unwrap();
        let train = dir.path().join("1_train.txt");
        std::fs::write(&train, "s1\t1\ta\t1\t1\t1\n").unwrap();
        let config = sample_config(&train);
        let pre = PreprocessingConfig::default();

        let a = fingerprint(&config, &pre).await.unwrap();
        let b = fingerprint(&config, &pre).await.unwrap();
        assert_eq!(a, b);

        std::fs::write(&train, "s1\t1\tb\t1\t1\t1\n").unwrap();
        let c = fingerprint(&config, &pre).await.unwrap();
        assert_ne!(a, c);

        let mut pure = config.clone();
        pure.only_pure_clusters = true;
        assert_ne!(c, fingerprint(&pure, &pre).await.unwrap());
    }

    #[tokio::test]
    async fn test_fingerprint_tracks_stopword_file() {
        let dir = tempfile::tempdir().unwrap();
        let train = dir.path().join("1_train.txt");
        let stopwords = dir.path().join("stop.txt");
        std::fs::write(&train, "s1\t1\ta\t1\t1\t1\n").unwrap();
        std::fs::write(&stopwords, "the\n").unwrap();

        let mut config = sample_config(&train);
        config.feature_set = FeatureSet(vec![ExtractorSpec::WordNgram {
            top_k: 10,
            min_n: 1,
            max_n: 1,
            lowercase: true,
            stopwords: StopwordSource::File(stopwords.display().to_string()),
        }]);
        let pre = PreprocessingConfig::default();

        let before = fingerprint(&config, &pre).await.unwrap();
        std::fs::write(&stopwords, "the\na\n").unwrap();
        assert_ne!(before, fingerprint(&config, &pre).await.unwrap());
    }

    #[test]
    fn test_store_roundtrip_and_miss() {
        tokio_test::block_on(async {
            let dir = tempfile::tempdir().unwrap();
            let store = JsonResultStore::new(dir.path().join("cache"));
            let config = sample_config(Path::new("unused.txt"));

            assert!(store.get("abc").await.unwrap().is_none());

            store.put(&sample_point("abc", config)).await.unwrap();
            let cached = store.get("abc").await.unwrap().unwrap();
            assert_eq!(cached.agreement.kappa_grader1, Some(0.5));
            assert!(!dir.path().join("cache/abc.json.tmp").exists());
        });
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.json"), "{not json").unwrap();
        let store = JsonResultStore::new(dir.path());
        assert!(store.get("bad").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_locks_serialize_same_fingerprint() {
        let locks = Arc::new(FingerprintLocks::new());
        let guard = locks.lock("fp").await;

        let other = locks.clone();
        let waiter = tokio::spawn(async move {
            let _g = other.lock("fp").await;
        });
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        // 不同指纹互不阻塞
        let _free = locks.lock("other").await;

        drop(guard);
        waiter.await.unwrap();
    }
}

use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 语料读取错误（致命）
    #[error("语料错误: {0}")]
    Corpus(#[from] CorpusError),
    /// 配置错误（构建参数空间时致命）
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 文件操作错误
    #[error("文件错误: {0}")]
    File(#[from] FileError),
    /// 聚类 / 分类 / 预处理后端错误（单个配置点内可恢复）
    #[error("后端错误: {0}")]
    Backend(#[from] BackendError),
    /// 实验流程错误
    #[error("流程错误: {0}")]
    Workflow(#[from] WorkflowError),
    /// 结果缓存错误
    #[error("缓存错误: {0}")]
    Cache(#[from] CacheError),
}

type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// 语料读取错误
///
/// 所有变体都会中止整个读取过程，不暴露部分语料。
#[derive(Debug, Error)]
pub enum CorpusError {
    /// 输入文件无法打开
    #[error("无法打开语料文件 {path}: {source}")]
    Open { path: String, source: std::io::Error },
    /// 某一行不是合法的编码
    #[error("语料文件 {path} 第 {line} 行不是合法的 UTF-8")]
    Decode { path: String, line: usize },
    /// 字段数量不是 6
    #[error("语料文件格式错误 {path} 第 {line} 行: 期望 6 个字段, 实际 {found} 个")]
    Format {
        path: String,
        line: usize,
        found: usize,
    },
    /// 整数字段解析失败
    #[error("语料文件 {path} 第 {line} 行字段 {field} ({name}) 无法解析为整数: '{value}'")]
    InvalidInteger {
        path: String,
        line: usize,
        field: usize,
        name: &'static str,
        value: String,
    },
    /// 评分序列写出失败
    #[error("评分文件写入失败 ({path}): {source}")]
    Persist { path: String, source: BoxedSource },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 参数轴为空
    #[error("参数轴 {axis} 不能为空")]
    EmptyAxis { axis: &'static str },
    /// 特征集合为空
    #[error("特征集合至少需要一个特征抽取器")]
    EmptyFeatureSet,
    /// 同一特征集合中抽取器重复
    #[error("特征集合中抽取器 {kind} 重复")]
    DuplicateExtractor { kind: &'static str },
    /// 当前模式下缺少必需文件
    #[error("缺少{role}文件: {path}")]
    MissingFile { role: &'static str, path: String },
    /// 参数值不合法
    #[error("参数 {name} 不合法: {reason}")]
    InvalidArgument { name: String, reason: String },
    /// 不支持的字符编码
    #[error("不支持的字符编码: {name}")]
    UnsupportedEncoding { name: String },
}

/// 文件操作错误
#[derive(Debug, Error)]
pub enum FileError {
    /// 读取文件失败
    #[error("读取文件失败 ({path}): {source}")]
    ReadFailed { path: String, source: BoxedSource },
    /// 写入文件失败
    #[error("写入文件失败 ({path}): {source}")]
    WriteFailed { path: String, source: BoxedSource },
    /// TOML 解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed { path: String, source: BoxedSource },
    /// JSON 编解码失败
    #[error("JSON处理失败: {source}")]
    JsonFailed { source: BoxedSource },
}

/// 后端错误
#[derive(Debug, Error)]
pub enum BackendError {
    /// 后端不支持该算法
    #[error("{backend} 不支持算法 {algorithm}")]
    UnsupportedAlgorithm {
        backend: &'static str,
        algorithm: String,
    },
    /// 训练数据为空
    #[error("{backend} 的训练数据为空")]
    EmptyTrainingSet { backend: &'static str },
    /// 特征维度不一致
    #[error("特征维度不一致: 期望 {expected}, 实际 {found}")]
    DimensionMismatch { expected: usize, found: usize },
    /// 其他后端失败
    #[error("{backend} 执行失败: {message}")]
    Failed {
        backend: &'static str,
        message: String,
    },
}

/// 实验流程错误
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// 文档数量少于折数
    #[error("文档数量 {documents} 少于交叉验证折数 {folds}")]
    NotEnoughDocuments { documents: usize, folds: usize },
    /// 没有可用于训练的文档
    #[error("问题 {question} 没有可用于训练的已评分文档")]
    NoTrainingData { question: String },
    /// 后台任务异常退出
    #[error("配置点任务异常退出: {reason}")]
    TaskAborted { reason: String },
}

/// 结果缓存错误
#[derive(Debug, Error)]
pub enum CacheError {
    /// 缓存读取失败
    #[error("读取缓存 {fingerprint} 失败: {source}")]
    ReadFailed {
        fingerprint: String,
        source: BoxedSource,
    },
    /// 缓存写入失败
    #[error("写入缓存 {fingerprint} 失败: {source}")]
    WriteFailed {
        fingerprint: String,
        source: BoxedSource,
    },
}

// ========== 从常见错误类型转换 ==========
// anyhow 已经为所有实现了 std::error::Error 的类型提供了自动转换

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::File(FileError::JsonFailed {
            source: Box::new(err),
        })
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::File(FileError::ReadFailed {
            path: String::new(),
            source: Box::new(err),
        })
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建文件读取错误
    pub fn file_read_failed(
        path: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::File(FileError::ReadFailed {
            path: path.into(),
            source: Box::new(source),
        })
    }

    /// 创建文件写入错误
    pub fn file_write_failed(
        path: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::File(FileError::WriteFailed {
            path: path.into(),
            source: Box::new(source),
        })
    }

    /// 创建 TOML 解析错误
    pub fn toml_parse_failed(
        path: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::File(FileError::TomlParseFailed {
            path: path.into(),
            source: Box::new(source),
        })
    }

    /// 创建后端执行失败错误
    pub fn backend_failed(backend: &'static str, message: impl Into<String>) -> Self {
        AppError::Backend(BackendError::Failed {
            backend,
            message: message.into(),
        })
    }

    /// 是否属于"单个配置点失败、扫描可继续"的错误
    pub fn is_point_recoverable(&self) -> bool {
        matches!(
            self,
            AppError::Backend(_) | AppError::Workflow(_) | AppError::Cache(_)
        )
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

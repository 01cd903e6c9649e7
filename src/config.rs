use crate::infrastructure::Encoding;
use crate::models::PreprocessingConfig;
use tracing::warn;

/// 默认问题编号（不包含 13）
pub const DEFAULT_QUESTIONS: [&str; 9] = ["1", "2", "3", "4", "5", "6", "7", "8", "20"];

/// 程序配置文件
#[derive(Clone, Debug)]
pub struct Config {
    /// 语料根目录，包含 `<question>_train.txt` / `<question>_test.txt`
    pub base_dir: String,
    /// 结果目录（评分序列、报告）
    pub results_dir: String,
    /// 结果缓存目录
    pub cache_dir: String,
    /// 待实验的问题编号
    pub questions: Vec<String>,
    /// 参数轴 TOML 文件，未设置时使用内置参数轴
    pub sweep_file: Option<String>,
    /// 同时运行的配置点数量
    pub max_concurrent_points: usize,
    /// 交叉验证折数
    pub num_folds: usize,
    /// 是否只使用训练文件做交叉验证
    pub cross_validation: bool,
    /// 忽略缓存，强制重新计算
    pub force_rerun: bool,
    /// 文档语言
    pub language: String,
    /// 语料文件的字符编码
    pub encoding: Encoding,
    // --- 预处理开关 ---
    pub use_tagger: bool,
    pub use_parsing: bool,
    pub use_spell_checking: bool,
    /// 拼写检查词表（每行一个词）
    pub spelling_vocabulary: Option<String>,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 输出日志文件
    pub output_log_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_dir: "data/RFU".to_string(),
            results_dir: "target/results".to_string(),
            cache_dir: "target/cache".to_string(),
            questions: DEFAULT_QUESTIONS.iter().map(|q| q.to_string()).collect(),
            sweep_file: None,
            max_concurrent_points: 4,
            num_folds: 5,
            cross_validation: false,
            force_rerun: false,
            language: "en".to_string(),
            encoding: Encoding::Utf8,
            use_tagger: false,
            use_parsing: false,
            use_spell_checking: false,
            spelling_vocabulary: None,
            verbose_logging: false,
            output_log_file: "output.txt".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            base_dir: std::env::var("GRADING_BASE_DIR").unwrap_or(default.base_dir),
            results_dir: std::env::var("GRADING_RESULTS_DIR").unwrap_or(default.results_dir),
            cache_dir: std::env::var("GRADING_CACHE_DIR").unwrap_or(default.cache_dir),
            questions: std::env::var("GRADING_QUESTIONS").ok().map(|v| parse_list(&v)).filter(|q| !q.is_empty()).unwrap_or(default.questions),
            sweep_file: std::env::var("GRADING_SWEEP_FILE").ok().or(default.sweep_file),
            max_concurrent_points: std::env::var("MAX_CONCURRENT_POINTS").ok().and_then(|v| v.parse().ok()).filter(|n| *n > 0).unwrap_or(default.max_concurrent_points),
            num_folds: std::env::var("NUM_FOLDS").ok().and_then(|v| v.parse().ok()).filter(|n| *n > 1).unwrap_or(default.num_folds),
            cross_validation: std::env::var("CROSS_VALIDATION").ok().and_then(|v| v.parse().ok()).unwrap_or(default.cross_validation),
            force_rerun: std::env::var("FORCE_RERUN").ok().and_then(|v| v.parse().ok()).unwrap_or(default.force_rerun),
            language: std::env::var("LANGUAGE_CODE").unwrap_or(default.language),
            encoding: parse_encoding(std::env::var("CORPUS_ENCODING").ok().as_deref(), default.encoding),
            use_tagger: std::env::var("USE_TAGGER").ok().and_then(|v| v.parse().ok()).unwrap_or(default.use_tagger),
            use_parsing: std::env::var("USE_PARSING").ok().and_then(|v| v.parse().ok()).unwrap_or(default.use_parsing),
            use_spell_checking: std::env::var("USE_SPELL_CHECKING").ok().and_then(|v| v.parse().ok()).unwrap_or(default.use_spell_checking),
            spelling_vocabulary: std::env::var("SPELLING_VOCABULARY").ok().or(default.spelling_vocabulary),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(default.verbose_logging),
            output_log_file: std::env::var("OUTPUT_LOG_FILE").unwrap_or(default.output_log_file),
        }
    }

    /// 由静态开关构造一次性的预处理配置
    pub fn preprocessing(&self) -> PreprocessingConfig {
        PreprocessingConfig {
            language: self.language.clone(),
            use_tagger: self.use_tagger,
            use_parsing: self.use_parsing,
            use_spell_checking: self.use_spell_checking,
            spelling_vocabulary: self.spelling_vocabulary.clone(),
        }
    }
}

/// 解析编码名称，无法识别时沿用默认值
fn parse_encoding(value: Option<&str>, default: Encoding) -> Encoding {
    match value.map(str::parse::<Encoding>) {
        Some(Ok(encoding)) => encoding,
        Some(Err(e)) => {
            warn!("{}，使用默认编码 {:?}", e, default);
            default
        }
        None => default,
    }
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list_skips_blanks() {
        assert_eq!(parse_list(" 1, 2,,20 "), vec!["1", "2", "20"]);
    }

    #[test]
    fn test_parse_encoding_names() {
        assert_eq!(parse_encoding(Some("ISO-8859-1"), Encoding::Utf8), Encoding::Latin1);
        assert_eq!(parse_encoding(Some("utf8"), Encoding::Latin1), Encoding::Utf8);
        assert_eq!(parse_encoding(Some("ebcdic"), Encoding::Utf8), Encoding::Utf8);
        assert_eq!(parse_encoding(None, Encoding::Latin1), Encoding::Latin1);
    }

    #[test]
    fn test_default_questions_exclude_13() {
        let config = Config::default();
        assert_eq!(config.questions.len(), 9);
        assert!(!config.questions.iter().any(|q| q == "13"));
        assert_eq!(config.num_folds, 5);
    }
}

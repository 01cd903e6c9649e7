//! 语言预处理服务 - 业务能力层
//!
//! 只负责"把一段文本变成分词/词形/词性/依存/拼写纠正结果"，不关心特征与模型。
//! 各阶段由 `PreprocessingConfig` 的开关控制，关闭的阶段不产生任何输出。

use crate::error::{AppError, AppResult, ConfigError};
use crate::models::PreprocessingConfig;
use crate::services::features::ENGLISH_STOPWORDS;
use regex::Regex;
use std::collections::HashSet;
use std::fs;
use tracing::{debug, info};

/// 依存关系（下标指向 `tokens`）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub governor: usize,
    pub dependent: usize,
    pub relation: String,
}

/// 预处理后的文档
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessedDocument {
    pub tokens: Vec<String>,
    pub lemmas: Vec<String>,
    pub pos_tags: Vec<String>,
    pub dependencies: Vec<Dependency>,
    /// (词下标, 原始拼写)
    pub corrections: Vec<(usize, String)>,
}

/// 语言预处理后端
pub trait LinguisticPreprocessor: Send + Sync {
    fn process(&self, text: &str) -> AppResult<ProcessedDocument>;
}

/// 默认预处理后端：正则分词 + 规则词性 + 中心词依附 + 词表拼写纠正
pub struct RuleBasedPreprocessor {
    config: PreprocessingConfig,
    token_pattern: Regex,
    vocabulary: Option<HashSet<String>>,
}

impl RuleBasedPreprocessor {
    pub fn new(config: PreprocessingConfig) -> AppResult<Self> {
        let vocabulary = if config.use_spell_checking {
            let path = config.spelling_vocabulary.as_deref().ok_or_else(|| {
                ConfigError::InvalidArgument {
                    name: "spelling_vocabulary".to_string(),
                    reason: "开启拼写检查时必须提供词表".to_string(),
                }
            })?;
            let content =
                fs::read_to_string(path).map_err(|e| AppError::file_read_failed(path, e))?;
            let words: HashSet<String> = content
                .lines()
                .map(|l| l.trim().to_lowercase())
                .filter(|l| !l.is_empty())
                .collect();
            info!("拼写词表已加载: {} ({} 个词)", path, words.len());
            Some(words)
        } else {
            None
        };

        let token_pattern = Regex::new(r"\w+(?:'\w+)*|[^\w\s]")
            .map_err(|e| AppError::backend_failed("preprocessor", e.to_string()))?;

        Ok(Self {
            config,
            token_pattern,
            vocabulary,
        })
    }

    fn segment(&self, text: &str) -> Vec<String> {
        self.token_pattern
            .find_iter(text)
            .map(|m| m.as_str().to_string())
            .collect()
    }

    fn spell_check(&self, tokens: &mut [String]) -> Vec<(usize, String)> {
        let Some(vocabulary) = &self.vocabulary else {
            return Vec::new();
        };

        let mut corrections = Vec::new();
        for (index, token) in tokens.iter_mut().enumerate() {
            if !token.chars().all(char::is_alphabetic) {
                continue;
            }
            let lower = token.to_lowercase();
            if vocabulary.contains(&lower) {
                continue;
            }
            if let Some(fixed) = single_edit_candidates(&lower)
                .into_iter()
                .find(|c| vocabulary.contains(c))
            {
                let fixed = match_case(token, &fixed);
                debug!("拼写纠正: {} -> {}", token, fixed);
                corrections.push((index, std::mem::replace(token, fixed)));
            }
        }
        corrections
    }
}

impl LinguisticPreprocessor for RuleBasedPreprocessor {
    fn process(&self, text: &str) -> AppResult<ProcessedDocument> {
        let mut tokens = self.segment(text);

        let corrections = if self.config.use_spell_checking {
            self.spell_check(&mut tokens)
        } else {
            Vec::new()
        };

        let (lemmas, pos_tags) = if self.config.use_tagger {
            (
                tokens.iter().map(|t| t.to_lowercase()).collect(),
                tokens.iter().map(|t| coarse_tag(t).to_string()).collect(),
            )
        } else {
            (Vec::new(), Vec::new())
        };

        let dependencies = if self.config.use_parsing {
            attach_heads(&tokens)
        } else {
            Vec::new()
        };

        Ok(ProcessedDocument {
            tokens,
            lemmas,
            pos_tags,
            dependencies,
            corrections,
        })
    }
}

fn coarse_tag(token: &str) -> &'static str {
    if token.chars().all(|c| !c.is_alphanumeric()) {
        "PUNCT"
    } else if token.chars().all(|c| c.is_numeric()) {
        "NUM"
    } else {
        "WORD"
    }
}

fn is_content_word(token: &str) -> bool {
    token.chars().any(char::is_alphanumeric)
        && !ENGLISH_STOPWORDS.contains(token.to_lowercase().as_str())
}

/// 规则依存分析：每个词依附到其后最近的实词，最后一个实词为根，
/// 根之后的词依附到根。标点不参与依附。
///
/// 功能词的关系为 `func`，实词为 `mod`。
fn attach_heads(tokens: &[String]) -> Vec<Dependency> {
    let Some(root) = tokens.iter().rposition(|t| is_content_word(t)) else {
        return Vec::new();
    };

    let mut dependencies = Vec::new();
    let mut next_content = root;
    for index in (0..tokens.len()).rev() {
        let token = &tokens[index];
        if !token.chars().any(char::is_alphanumeric) {
            continue;
        }
        let content = is_content_word(token);
        if index != root {
            let governor = if index > root { root } else { next_content };
            dependencies.push(Dependency {
                governor,
                dependent: index,
                relation: if content { "mod" } else { "func" }.to_string(),
            });
        }
        if content && index < root {
            next_content = index;
        }
    }
    dependencies.reverse();
    dependencies
}

/// 让纠正后的词沿用原词的大小写形式
fn match_case(original: &str, fixed: &str) -> String {
    let mut chars = original.chars();
    let first_upper = chars.next().is_some_and(char::is_uppercase);
    if first_upper && original.chars().count() > 1 && original.chars().all(char::is_uppercase) {
        fixed.to_uppercase()
    } else if first_upper {
        let mut out = String::with_capacity(fixed.len());
        let mut fixed_chars = fixed.chars();
        if let Some(c) = fixed_chars.next() {
            out.extend(c.to_uppercase());
        }
        out.extend(fixed_chars);
        out
    } else {
        fixed.to_string()
    }
}

/// 编辑距离为 1 的候选词，按删除、换位、替换、插入的顺序生成
fn single_edit_candidates(word: &str) -> Vec<String> {
    const ALPHABET: &str = "abcdefghijklmnopqrstuvwxyz";
    let chars: Vec<char> = word.chars().collect();
    let mut out = Vec::new();

    for i in 0..chars.len() {
        let mut c = chars.clone();
        c.remove(i);
        out.push(c.into_iter().collect());
    }
    for i in 0..chars.len().saturating_sub(1) {
        let mut c = chars.clone();
        c.swap(i, i + 1);
        out.push(c.into_iter().collect());
    }
    for i in 0..chars.len() {
        for letter in ALPHABET.chars() {
            if chars[i] != letter {
                let mut c = chars.clone();
                c[i] = letter;
                out.push(c.into_iter().collect());
            }
        }
    }
    for i in 0..=chars.len() {
        for letter in ALPHABET.chars() {
            let mut c = chars.clone();
            c.insert(i, letter);
            out.push(c.into_iter().collect());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segmentation_keeps_contractions() {
        let pre = RuleBasedPreprocessor::new(PreprocessingConfig::default()).unwrap();
        let doc = pre.process("It's fine, really.").unwrap();
        assert_eq!(doc.tokens, vec!["It's", "fine", ",", "really", "."]);
        // 关闭的阶段不产生输出
        assert!(doc.lemmas.is_empty());
        assert!(doc.pos_tags.is_empty());
        assert!(doc.dependencies.is_empty());
    }

    #[test]
    fn test_tagger_produces_parallel_annotations() {
        let config = PreprocessingConfig {
            use_tagger: true,
            ..Default::default()
        };
        let pre = RuleBasedPreprocessor::new(config).unwrap();
        let doc = pre.process("Add 42 Cells!").unwrap();
        assert_eq!(doc.lemmas, vec!["add", "42", "cells", "!"]);
        assert_eq!(doc.pos_tags, vec!["WORD", "NUM", "WORD", "PUNCT"]);
    }

    #[test]
    fn test_parsing_attaches_words_to_next_content_word() {
        let config = PreprocessingConfig {
            use_parsing: true,
            ..Default::default()
        };
        let pre = RuleBasedPreprocessor::new(config).unwrap();
        // 0:The 1:membrane 2:controls 3:transport 4:. 5:too
        let doc = pre.process("The membrane controls transport. too").unwrap();

        let edges: Vec<(usize, usize, &str)> = doc
            .dependencies
            .iter()
            .map(|d| (d.dependent, d.governor, d.relation.as_str()))
            .collect();
        assert_eq!(
            edges,
            vec![
                (0, 1, "func"),
                (1, 2, "mod"),
                (2, 3, "mod"),
                (5, 3, "func"),
            ]
        );
    }

    #[test]
    fn test_parsing_without_content_words_is_empty() {
        let config = PreprocessingConfig {
            use_parsing: true,
            ..Default::default()
        };
        let pre = RuleBasedPreprocessor::new(config).unwrap();
        assert!(pre.process("it is the").unwrap().dependencies.is_empty());
    }

    #[test]
    fn test_spell_checking_uses_vocabulary() {
        let dir = tempfile::tempdir().unwrap();
        let vocab = dir.path().join("vocab.txt");
        fs::write(&vocab, "the\ncell\nwall\n").unwrap();

        let config = PreprocessingConfig {
            use_spell_checking: true,
            spelling_vocabulary: Some(vocab.display().to_string()),
            ..Default::default()
        };
        let pre = RuleBasedPreprocessor::new(config).unwrap();
        let doc = pre.process("teh cel wall").unwrap();
        assert_eq!(doc.tokens, vec!["the", "cell", "wall"]);
        assert_eq!(doc.corrections, vec![(0, "teh".to_string()), (1, "cel".to_string())]);

        // 纠正保留原词的大小写
        let doc = pre.process("Teh CEL wall").unwrap();
        assert_eq!(doc.tokens, vec!["The", "CELL", "wall"]);
    }

    #[test]
    fn test_spell_checking_requires_vocabulary() {
        let config = PreprocessingConfig {
            use_spell_checking: true,
            ..Default::default()
        };
        assert!(RuleBasedPreprocessor::new(config).is_err());
    }
}

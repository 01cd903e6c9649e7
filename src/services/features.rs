//! 特征抽取服务 - 业务能力层
//!
//! ## 职责
//!
//! - 每个 `ExtractorSpec` 对应一个 `FeatureExtractor`
//! - `FeaturePipeline` 在训练文档上拟合所有抽取器，冻结列索引与缩放系数
//! - 之后对任何文档（训练或测试）只做映射，不会再引入新的特征列
//!
//! 特征值按训练集上每列的最大值缩放到 [0, 1]。

use crate::error::{AppError, AppResult};
use crate::models::{ExtractorSpec, FeatureSet, StopwordSource};
use crate::services::preprocessing::ProcessedDocument;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use tracing::debug;

/// 内置英文停用词
pub(crate) static ENGLISH_STOPWORDS: phf::Set<&'static str> = phf::phf_set! {
    "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any",
    "are", "as", "at", "be", "because", "been", "before", "being", "below", "between",
    "both", "but", "by", "can", "could", "did", "do", "does", "doing", "down", "during",
    "each", "few", "for", "from", "further", "had", "has", "have", "having", "he", "her",
    "here", "hers", "herself", "him", "himself", "his", "how", "i", "if", "in", "into",
    "is", "it", "its", "itself", "just", "me", "more", "most", "my", "myself", "no", "nor",
    "not", "now", "of", "off", "on", "once", "only", "or", "other", "our", "ours",
    "ourselves", "out", "over", "own", "same", "she", "should", "so", "some", "such",
    "than", "that", "the", "their", "theirs", "them", "themselves", "then", "there",
    "these", "they", "this", "those", "through", "to", "too", "under", "until", "up",
    "very", "was", "we", "were", "what", "when", "where", "which", "while", "who", "whom",
    "why", "will", "with", "would", "you", "your", "yours", "yourself", "yourselves",
};

/// 稀疏特征向量，按列下标升序
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureVector {
    entries: Vec<(usize, f64)>,
}

impl FeatureVector {
    /// 由 (列, 值) 构造；重复列的值会累加，零值被丢弃
    pub fn from_entries(entries: impl IntoIterator<Item = (usize, f64)>) -> Self {
        let mut merged: BTreeMap<usize, f64> = BTreeMap::new();
        for (column, value) in entries {
            *merged.entry(column).or_insert(0.0) += value;
        }
        Self {
            entries: merged.into_iter().filter(|(_, v)| *v != 0.0).collect(),
        }
    }

    pub fn entries(&self) -> &[(usize, f64)] {
        &self.entries
    }

    /// 与稠密向量的点积
    pub fn dot(&self, dense: &[f64]) -> f64 {
        self.entries
            .iter()
            .filter_map(|(i, v)| dense.get(*i).map(|d| d * v))
            .sum()
    }

    pub fn norm_squared(&self) -> f64 {
        self.entries.iter().map(|(_, v)| v * v).sum()
    }

    /// 把自身加到稠密向量上（乘以系数）
    pub fn add_to(&self, dense: &mut [f64], factor: f64) {
        for (i, v) in &self.entries {
            if let Some(slot) = dense.get_mut(*i) {
                *slot += factor * v;
            }
        }
    }
}

/// 特征抽取器
pub trait FeatureExtractor: Send + Sync {
    fn name(&self) -> &'static str;

    /// 在训练文档上拟合（例如建立 top-K 词表）
    fn fit(&mut self, documents: &[ProcessedDocument]);

    /// 拟合后可能产生的全部特征名
    fn feature_names(&self) -> Vec<String>;

    /// 抽取一个文档的命名特征
    fn extract(&self, document: &ProcessedDocument) -> Vec<(String, f64)>;
}

/// 文档词数
pub struct TokenCountExtractor;

impl FeatureExtractor for TokenCountExtractor {
    fn name(&self) -> &'static str {
        "token_count"
    }

    fn fit(&mut self, _documents: &[ProcessedDocument]) {}

    fn feature_names(&self) -> Vec<String> {
        vec!["token_count".to_string()]
    }

    fn extract(&self, document: &ProcessedDocument) -> Vec<(String, f64)> {
        vec![("token_count".to_string(), document.tokens.len() as f64)]
    }
}

/// n-gram 单元
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NgramUnit {
    Word,
    /// 允许跳过最多 `skip` 个词，且至少跳过一个
    Skip { skip: usize },
    Character,
    Dependency,
}

/// 基于词表的 n-gram 抽取器（top-K 按训练集词频）
pub struct NgramExtractor {
    name: &'static str,
    unit: NgramUnit,
    min_n: usize,
    max_n: usize,
    top_k: usize,
    lowercase: bool,
    stopwords: HashSet<String>,
    vocabulary: HashSet<String>,
}

impl NgramExtractor {
    pub fn new(
        name: &'static str,
        unit: NgramUnit,
        (min_n, max_n): (usize, usize),
        top_k: usize,
        lowercase: bool,
        stopwords: HashSet<String>,
    ) -> Self {
        Self {
            name,
            unit,
            min_n,
            max_n,
            top_k,
            lowercase,
            stopwords,
            vocabulary: HashSet::new(),
        }
    }

    fn words(&self, document: &ProcessedDocument) -> Vec<String> {
        document
            .tokens
            .iter()
            .filter(|t| t.chars().any(char::is_alphanumeric))
            .map(|t| self.fold_case(t))
            .collect()
    }

    fn fold_case(&self, s: &str) -> String {
        if self.lowercase {
            s.to_lowercase()
        } else {
            s.to_string()
        }
    }

    fn has_stopword(&self, gram: &[&String]) -> bool {
        gram.iter().any(|w| self.stopwords.contains(w.as_str()))
    }

    fn ngrams(&self, document: &ProcessedDocument) -> Vec<String> {
        match self.unit {
            NgramUnit::Word => {
                let words = self.words(document);
                let mut out = Vec::new();
                for n in self.min_n..=self.max_n {
                    for window in words.windows(n) {
                        let gram: Vec<&String> = window.iter().collect();
                        if !self.has_stopword(&gram) {
                            out.push(join(&gram));
                        }
                    }
                }
                out
            }
            NgramUnit::Skip { skip } => {
                let words = self.words(document);
                let mut out = Vec::new();
                for n in self.min_n.max(2)..=self.max_n {
                    let mut picked = Vec::with_capacity(n);
                    for start in 0..words.len() {
                        picked.clear();
                        picked.push(start);
                        collect_skip_grams(&words, n, skip, &mut picked, &mut |indices: &[usize]| {
                            let gram: Vec<&String> = indices.iter().map(|i| &words[*i]).collect();
                            if !self.has_stopword(&gram) {
                                out.push(join(&gram));
                            }
                        });
                    }
                }
                out
            }
            NgramUnit::Character => {
                let text: Vec<char> = self.fold_case(&document.tokens.join(" ")).chars().collect();
                let mut out = Vec::new();
                for n in self.min_n..=self.max_n {
                    for window in text.windows(n) {
                        out.push(window.iter().collect());
                    }
                }
                out
            }
            NgramUnit::Dependency => document
                .dependencies
                .iter()
                .filter_map(|d| {
                    let governor = document.tokens.get(d.governor)?;
                    let dependent = document.tokens.get(d.dependent)?;
                    Some(self.fold_case(&format!("{}:{}:{}", d.relation, governor, dependent)))
                })
                .collect(),
        }
    }
}

fn join(gram: &[&String]) -> String {
    gram.iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join("_")
}

/// 递归枚举以 `picked[0]` 开头、长度为 n、总跳过数在 1..=skip 之间的下标序列
fn collect_skip_grams(
    words: &[String],
    n: usize,
    skip: usize,
    picked: &mut Vec<usize>,
    emit: &mut dyn FnMut(&[usize]),
) {
    let first = picked[0];
    let last = picked[picked.len() - 1];
    let used_skips = last - first + 1 - picked.len();

    if picked.len() == n {
        if used_skips > 0 {
            emit(picked);
        }
        return;
    }

    for next in (last + 1)..words.len() {
        let extra = next - last - 1;
        if used_skips + extra > skip {
            break;
        }
        picked.push(next);
        collect_skip_grams(words, n, skip, picked, emit);
        picked.pop();
    }
}

impl FeatureExtractor for NgramExtractor {
    fn name(&self) -> &'static str {
        self.name
    }

    fn fit(&mut self, documents: &[ProcessedDocument]) {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for document in documents {
            for gram in self.ngrams(document) {
                *counts.entry(gram).or_insert(0) += 1;
            }
        }

        let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
        // 词频降序，同频按字典序，保证结果确定
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(self.top_k);

        self.vocabulary = ranked.into_iter().map(|(gram, _)| gram).collect();
        debug!("{} 词表大小: {}", self.name, self.vocabulary.len());
    }

    fn feature_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .vocabulary
            .iter()
            .map(|g| format!("{}_{}", self.name, g))
            .collect();
        names.sort();
        names
    }

    fn extract(&self, document: &ProcessedDocument) -> Vec<(String, f64)> {
        let mut counts: HashMap<String, f64> = HashMap::new();
        for gram in self.ngrams(document) {
            if self.vocabulary.contains(&gram) {
                *counts.entry(format!("{}_{}", self.name, gram)).or_insert(0.0) += 1.0;
            }
        }
        counts.into_iter().collect()
    }
}

fn load_stopwords(source: &StopwordSource) -> AppResult<HashSet<String>> {
    match source {
        StopwordSource::Disabled => Ok(HashSet::new()),
        StopwordSource::English => Ok(ENGLISH_STOPWORDS.iter().map(|s| s.to_string()).collect()),
        StopwordSource::File(path) => {
            let content = fs::read_to_string(path).map_err(|e| AppError::file_read_failed(path, e))?;
            Ok(content
                .lines()
                .map(|l| l.trim().to_lowercase())
                .filter(|l| !l.is_empty() && !l.starts_with('#'))
                .collect())
        }
    }
}

/// 根据参数构造抽取器
pub fn build_extractor(spec: &ExtractorSpec) -> AppResult<Box<dyn FeatureExtractor>> {
    let extractor: Box<dyn FeatureExtractor> = match spec {
        ExtractorSpec::TokenCount => Box::new(TokenCountExtractor),
        ExtractorSpec::WordNgram {
            top_k,
            min_n,
            max_n,
            lowercase,
            stopwords,
        } => Box::new(NgramExtractor::new(
            spec.kind_name(),
            NgramUnit::Word,
            (*min_n, *max_n),
            *top_k,
            *lowercase,
            load_stopwords(stopwords)?,
        )),
        ExtractorSpec::SkipNgram {
            top_k,
            min_n,
            max_n,
            skip_size,
            lowercase,
            stopwords,
        } => Box::new(NgramExtractor::new(
            spec.kind_name(),
            NgramUnit::Skip { skip: *skip_size },
            (*min_n, *max_n),
            *top_k,
            *lowercase,
            load_stopwords(stopwords)?,
        )),
        ExtractorSpec::CharacterNgram {
            top_k,
            min_n,
            max_n,
            lowercase,
        } => Box::new(NgramExtractor::new(
            spec.kind_name(),
            NgramUnit::Character,
            (*min_n, *max_n),
            *top_k,
            *lowercase,
            HashSet::new(),
        )),
        ExtractorSpec::DependencyNgram { top_k, lowercase } => Box::new(NgramExtractor::new(
            spec.kind_name(),
            NgramUnit::Dependency,
            (1, 1),
            *top_k,
            *lowercase,
            HashSet::new(),
        )),
    };
    Ok(extractor)
}

/// 多个抽取器拼接而成的特征流水线
pub struct FeaturePipeline {
    extractors: Vec<Box<dyn FeatureExtractor>>,
    columns: HashMap<String, usize>,
    scale: Vec<f64>,
}

impl FeaturePipeline {
    pub fn from_feature_set(feature_set: &FeatureSet) -> AppResult<Self> {
        let extractors = feature_set
            .extractors()
            .iter()
            .map(build_extractor)
            .collect::<AppResult<Vec<_>>>()?;
        Ok(Self {
            extractors,
            columns: HashMap::new(),
            scale: Vec::new(),
        })
    }

    /// 拟合抽取器并返回训练文档的特征向量
    pub fn fit_transform(&mut self, documents: &[ProcessedDocument]) -> Vec<FeatureVector> {
        for extractor in &mut self.extractors {
            extractor.fit(documents);
        }

        // 同名特征只占一列，列号按首次出现的顺序分配
        let mut columns: HashMap<String, usize> = HashMap::new();
        for name in self.extractors.iter().flat_map(|e| e.feature_names()) {
            let next = columns.len();
            columns.entry(name).or_insert(next);
        }
        self.columns = columns;

        let raw: Vec<FeatureVector> = documents.iter().map(|d| self.raw_vector(d)).collect();

        let mut max = vec![0.0_f64; self.columns.len()];
        for vector in &raw {
            for (column, value) in vector.entries() {
                max[*column] = max[*column].max(value.abs());
            }
        }
        self.scale = max
            .into_iter()
            .map(|m| if m > 0.0 { 1.0 / m } else { 0.0 })
            .collect();

        raw.iter().map(|v| self.rescale(v)).collect()
    }

    /// 使用已冻结的列索引转换文档
    pub fn transform(&self, document: &ProcessedDocument) -> FeatureVector {
        self.rescale(&self.raw_vector(document))
    }

    pub fn dimension(&self) -> usize {
        self.columns.len()
    }

    fn raw_vector(&self, document: &ProcessedDocument) -> FeatureVector {
        FeatureVector::from_entries(
            self.extractors
                .iter()
                .flat_map(|e| e.extract(document))
                .filter_map(|(name, value)| self.columns.get(&name).map(|c| (*c, value))),
        )
    }

    fn rescale(&self, vector: &FeatureVector) -> FeatureVector {
        FeatureVector::from_entries(vector.entries().iter().map(|(column, value)| {
            let factor = self.scale.get(*column).copied().unwrap_or(0.0);
            (*column, (value * factor).min(1.0))
        }))
    }
}

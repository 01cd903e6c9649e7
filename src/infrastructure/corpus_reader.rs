//! 语料读取器 - 基础设施层
//!
//! 把一个带评分的作答文件解析为有序的记录队列。
//!
//! ## 文件格式
//!
//! ```text
//! student<sep>question<sep>text<sep>grader1<sep>grader2<sep>grader3   (可选表头)
//! s1<sep>1<sep>It is fine.<sep>2<sep>2<sep>3
//! ```
//!
//! 解析在 `open` 时一次完成：任何格式错误都会让整个读取失败，不暴露部分语料。
//! 记录队列只能被消费一次；`next()` 需要 `&mut self`，因此只有持有读取器的一方能消费。

use crate::error::{AppResult, ConfigError, CorpusError};
use crate::models::{Document, Grade, GradedResponse};
use crate::services::grade_writer::{GradeLists, GradeWriter};
use crate::utils::logging::truncate_text;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};

const FIELD_COUNT: usize = 6;

/// 输入文件的字符编码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    #[default]
    Utf8,
    Latin1,
}

impl FromStr for Encoding {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Ok(Encoding::Utf8),
            "iso-8859-1" | "latin1" | "latin-1" => Ok(Encoding::Latin1),
            _ => Err(ConfigError::UnsupportedEncoding {
                name: s.to_string(),
            }),
        }
    }
}

/// 读取器参数
#[derive(Debug, Clone)]
pub struct ReaderOptions {
    pub separator: String,
    pub encoding: Encoding,
    pub language: String,
    /// 负数表示不过滤
    pub question_id: Option<i64>,
    /// 评分序列的输出目录
    pub grades_dir: PathBuf,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            separator: "\t".to_string(),
            encoding: Encoding::Utf8,
            language: "en".to_string(),
            question_id: None,
            grades_dir: PathBuf::from("target"),
        }
    }
}

/// 语料读取器
pub struct CorpusReader {
    source_uri: String,
    language: String,
    items: VecDeque<GradedResponse>,
    total: usize,
    consumed: usize,
}

impl CorpusReader {
    /// 读取并解析整个文件，写出评分序列
    pub fn open(path: &Path, options: &ReaderOptions) -> AppResult<Self> {
        let path_str = path.display().to_string();

        let requested = match options.question_id {
            Some(id) if id < 0 => {
                warn!("问题编号 {} 不合法，使用全部文档", id);
                None
            }
            other => other,
        };

        let bytes = fs::read(path).map_err(|e| CorpusError::Open {
            path: path_str.clone(),
            source: e,
        })?;

        let header_prefix = format!("student{}", options.separator);
        let mut items = VecDeque::new();
        let mut grades = GradeLists::default();

        for (index, raw) in split_lines(&bytes).into_iter().enumerate() {
            let line_no = index + 1;
            let line = decode_line(raw, options.encoding).ok_or_else(|| CorpusError::Decode {
                path: path_str.clone(),
                line: line_no,
            })?;

            // 跳过表头
            if line.starts_with(&header_prefix) {
                continue;
            }

            let response = parse_line(&line, &options.separator, &path_str, line_no)?;

            if let Some(id) = requested {
                if response.question_id != id {
                    continue;
                }
            }

            grades.push(response.grades());
            items.push_back(response);
        }

        GradeWriter::new(&options.grades_dir).write(&grades)?;

        let total = items.len();
        info!(
            "[语料] {} 读取 {} 条记录 (有效评分 {} 条)",
            path_str,
            total,
            grades.len()
        );

        Ok(Self {
            source_uri: path_str,
            language: options.language.clone(),
            items,
            total,
            consumed: 0,
        })
    }

    /// 是否还有未消费的记录
    pub fn has_next(&self) -> bool {
        !self.items.is_empty()
    }

    /// 取出下一条记录并转换为文档
    pub fn next_document(&mut self) -> Option<Document> {
        let item = self.items.pop_front()?;
        self.consumed += 1;
        debug!(
            "[语料] {} ({}/{}): {}",
            item.student_id,
            self.consumed,
            self.total,
            truncate_text(&item.text, 40)
        );
        Some(item.into_document(&self.language, &self.source_uri))
    }

    /// (已消费, 总数)
    pub fn progress(&self) -> (usize, usize) {
        (self.consumed, self.total)
    }

    pub fn source_uri(&self) -> &str {
        &self.source_uri
    }
}

impl Iterator for CorpusReader {
    type Item = Document;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_document()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.items.len(), Some(self.items.len()))
    }
}

/// 按 `\n` 切分，去掉文件末尾换行产生的空行
fn split_lines(bytes: &[u8]) -> Vec<&[u8]> {
    let mut lines: Vec<&[u8]> = bytes.split(|b| *b == b'\n').collect();
    if lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines
}

fn decode_line(raw: &[u8], encoding: Encoding) -> Option<String> {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    match encoding {
        Encoding::Utf8 => std::str::from_utf8(raw).ok().map(str::to_string),
        Encoding::Latin1 => Some(raw.iter().map(|&b| b as char).collect()),
    }
}

fn parse_line(
    line: &str,
    separator: &str,
    path: &str,
    line_no: usize,
) -> Result<GradedResponse, CorpusError> {
    let fields: Vec<&str> = line.split(separator).collect();
    if fields.len() != FIELD_COUNT {
        return Err(CorpusError::Format {
            path: path.to_string(),
            line: line_no,
            found: fields.len(),
        });
    }

    let parse = |index: usize, name: &'static str| -> Result<i64, CorpusError> {
        fields[index]
            .parse::<i64>()
            .map_err(|_| CorpusError::InvalidInteger {
                path: path.to_string(),
                line: line_no,
                field: index + 1,
                name,
                value: fields[index].to_string(),
            })
    };
    let parse_grade = |index: usize, name: &'static str| -> Result<Grade, CorpusError> {
        let value = parse(index, name)?;
        i32::try_from(value)
            .map(Grade::new)
            .map_err(|_| CorpusError::InvalidInteger {
                path: path.to_string(),
                line: line_no,
                field: index + 1,
                name,
                value: fields[index].to_string(),
            })
    };

    Ok(GradedResponse {
        student_id: fields[0].to_string(),
        question_id: parse(1, "questionId")?,
        text: normalize_text(fields[2]),
        grader1: parse_grade(3, "grader1")?,
        grader2: parse_grade(4, "grader2")?,
        grader3: parse_grade(5, "grader3")?,
    })
}

/// 把排版用的右单引号统一为 ASCII 撇号
pub fn normalize_text(text: &str) -> String {
    text.replace('\u{2019}', "'")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_corpus(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    fn options(dir: &Path, question_id: Option<i64>) -> ReaderOptions {
        ReaderOptions {
            question_id,
            grades_dir: dir.join("grades"),
            ..Default::default()
        }
    }

    const ROWS: &str = "s1\t1\tIt is fine.\t2\t2\t3\n\
                        s2\t1\tIt\u{2019}s fine.\t2\t3\t3\n\
                        s3\t2\tNo idea\t-1\t0\t1\n";

    #[test]
    fn test_reads_all_rows_without_filter() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_corpus(dir.path(), "c.txt", ROWS);

        let reader = CorpusReader::open(&path, &options(dir.path(), None)).unwrap();
        let docs: Vec<Document> = reader.collect();

        assert_eq!(docs.len(), 3);
        assert_eq!(docs[0].id, "s1");
        assert_eq!(docs[2].outcome, "-1");
        assert_eq!(docs[2].group_id, "2");
    }

    #[test]
    fn test_filter_and_grade_side_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_corpus(dir.path(), "c.txt", ROWS);

        let mut reader = CorpusReader::open(&path, &options(dir.path(), Some(1))).unwrap();
        assert_eq!(reader.progress(), (0, 2));

        let first = reader.next_document().unwrap();
        assert_eq!(first.text, "It is fine.");
        let second = reader.next_document().unwrap();
        assert_eq!(second.text, "It's fine.");
        assert!(!reader.has_next());
        assert!(reader.next_document().is_none());

        let grades1 = fs::read_to_string(dir.path().join("grades/grades1.json")).unwrap();
        assert_eq!(grades1, "[2,2]");
        let grades2 = fs::read_to_string(dir.path().join("grades/grades2.json")).unwrap();
        assert_eq!(grades2, "[2,3]");
    }

    #[test]
    fn test_ungraded_rows_are_kept_but_not_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_corpus(dir.path(), "c.txt", ROWS);

        let reader = CorpusReader::open(&path, &options(dir.path(), Some(2))).unwrap();
        assert_eq!(reader.count(), 1);

        let grades1 = fs::read_to_string(dir.path().join("grades/grades1.json")).unwrap();
        assert_eq!(grades1, "[]");
    }

    #[test]
    fn test_negative_question_id_means_no_filter() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_corpus(dir.path(), "c.txt", ROWS);

        let reader = CorpusReader::open(&path, &options(dir.path(), Some(-1))).unwrap();
        assert_eq!(reader.count(), 3);
    }

    #[test]
    fn test_header_does_not_change_records() {
        let dir = tempfile::tempdir().unwrap();
        let plain = write_corpus(dir.path(), "plain.txt", ROWS);
        let with_header = write_corpus(
            dir.path(),
            "header.txt",
            &format!("student\tquestion\ttext\tg1\tg2\tg3\n{}", ROWS),
        );

        let a: Vec<Document> = CorpusReader::open(&plain, &options(dir.path(), None))
            .unwrap()
            .collect();
        let b: Vec<Document> = CorpusReader::open(&with_header, &options(dir.path(), None))
            .unwrap()
            .map(|mut d| {
                d.source_uri = a[0].source_uri.clone();
                d
            })
            .collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_wrong_field_count_aborts_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_corpus(dir.path(), "bad.txt", "s1\t1\tok\t1\t1\t1\ns2\t1\tbroken\t1\n");

        let err = CorpusReader::open(&path, &options(dir.path(), None))
            .err()
            .unwrap();
        match err {
            crate::error::AppError::Corpus(CorpusError::Format { line, found, .. }) => {
                assert_eq!(line, 2);
                assert_eq!(found, 4);
            }
            other => panic!("unexpected error: {other}"),
        }
        // 失败时不写评分序列
        assert!(!dir.path().join("grades/grades1.json").exists());
    }

    #[test]
    fn test_bad_integer_names_field() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_corpus(dir.path(), "bad.txt", "s1\t1\tok\ttwo\t1\t1\n");

        let err = CorpusReader::open(&path, &options(dir.path(), None))
            .err()
            .unwrap();
        assert!(matches!(
            err,
            crate::error::AppError::Corpus(CorpusError::InvalidInteger {
                field: 4,
                name: "grader1",
                ..
            })
        ));
    }

    #[test]
    fn test_missing_file_fails_at_open() {
        let dir = tempfile::tempdir().unwrap();
        let result = CorpusReader::open(&dir.path().join("nope.txt"), &options(dir.path(), None));
        assert!(matches!(
            result,
            Err(crate::error::AppError::Corpus(CorpusError::Open { .. }))
        ));
    }

    #[test]
    fn test_crlf_and_custom_separator() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_corpus(dir.path(), "c.csv", "student;q;t;a;b;c\r\ns1;4;Yes;1;1;0\r\n");
        let opts = ReaderOptions {
            separator: ";".to_string(),
            ..options(dir.path(), None)
        };

        let docs: Vec<Document> = CorpusReader::open(&path, &opts).unwrap().collect();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].graders[2], Grade::new(0));
    }

    #[test]
    fn test_normalize_only_touches_right_quote() {
        let text = "don\u{2019}t \u{2018}quote\u{201D} caf\u{e9}";
        assert_eq!(normalize_text(text), "don't \u{2018}quote\u{201D} caf\u{e9}");
    }

    #[test]
    fn test_encoding_names() {
        assert_eq!("UTF-8".parse::<Encoding>().unwrap(), Encoding::Utf8);
        assert_eq!("ISO-8859-1".parse::<Encoding>().unwrap(), Encoding::Latin1);
        assert!("EBCDIC".parse::<Encoding>().is_err());
    }
}

//! 基础设施层
//!
//! 持有文件这类外部资源，只暴露能力：语料读取与结果缓存。

pub mod corpus_reader;
pub mod result_store;

pub use corpus_reader::{CorpusReader, Encoding, ReaderOptions};
pub use result_store::{fingerprint, FingerprintLocks, JsonResultStore, ResultStore};

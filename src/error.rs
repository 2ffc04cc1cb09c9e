// error.rs - 同步引擎错误类型
//! 文件读写、元数据解析、索引存储和监控的统一错误定义

use std::io;
use std::path::PathBuf;

/// 同步引擎错误类型
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// 文件不存在或不可读
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// 元数据头无法解析
    #[error("malformed metadata in {path}: {reason}")]
    MalformedMetadata { path: PathBuf, reason: String },

    /// 写入失败（不会留下半写的文件）
    #[error("cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// 引用了不存在的文件路径或记录 id
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("query parse error: {0}")]
    QueryParse(String),

    #[error("index store error: {0}")]
    Store(#[from] tantivy::TantivyError),

    #[error("watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub type SyncResult<T> = Result<T, SyncError>;

impl SyncError {
    /// 批处理中可以记录后跳过的错误（单个文件的读取或解析失败）
    pub fn is_skippable(&self) -> bool {
        matches!(self, SyncError::Read { .. } | SyncError::MalformedMetadata { .. })
    }

    /// 文件已经从磁盘上消失
    pub fn is_missing_file(&self) -> bool {
        match self {
            SyncError::Read { source, .. } => source.kind() == io::ErrorKind::NotFound,
            SyncError::NotFound(_) => true,
            _ => false,
        }
    }

    /// 不覆盖写入时目标已存在
    pub fn is_already_exists(&self) -> bool {
        matches!(self, SyncError::Write { source, .. } if source.kind() == io::ErrorKind::AlreadyExists)
    }

    pub fn read(path: impl Into<PathBuf>, source: io::Error) -> Self {
        SyncError::Read { path: path.into(), source }
    }

    pub fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        SyncError::MalformedMetadata {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn write(path: impl Into<PathBuf>, source: io::Error) -> Self {
        SyncError::Write { path: path.into(), source }
    }
}

impl From<tantivy::query::QueryParserError> for SyncError {
    fn from(err: tantivy::query::QueryParserError) -> Self {
        SyncError::QueryParse(err.to_string())
    }
}

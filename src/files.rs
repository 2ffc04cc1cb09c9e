// files.rs - 内容文件访问层
//! 读写单个内容文件、计算校验和、遍历内容根目录。
//!
//! 对外使用相对内容根目录的路径键（以 `/` 分隔），例如 `debugging/trace.md`。

use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::debug;
use walkdir::WalkDir;

use crate::config::WalkerConfig;
use crate::error::{SyncError, SyncResult};
use crate::frontmatter::{self, PromptMeta};

/// 根目录下的文件所属分类
pub const UNCATEGORIZED: &str = "uncategorized";

/// 读取结果
#[derive(Debug, Clone)]
pub struct FileContent {
    pub meta: PromptMeta,
    /// 元数据头原文（JSON 文本）
    pub raw_meta: String,
    pub body: String,
    /// 文件完整字节的 SHA-256
    pub checksum: String,
    pub modified: DateTime<Utc>,
}

/// 内容文件访问器
pub struct FileStore {
    root: PathBuf,
    walker: WalkerConfig,
}

impl FileStore {
    /// 打开内容根目录，不存在则创建
    pub fn open(root: impl AsRef<Path>, walker: WalkerConfig) -> SyncResult<Self> {
        let root = root.as_ref();
        fs::create_dir_all(root)?;
        let root = root.canonicalize()?;
        Ok(Self { root, walker })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 读取并解析文件
    pub fn read(&self, rel: &str) -> SyncResult<FileContent> {
        let path = self.absolute(rel);
        // 与 enumerate 使用同一条规则：不跟随链接时，经过链接的路径视为不存在
        if self.crosses_symlink(rel) {
            return Err(SyncError::read(
                &path,
                io::Error::new(io::ErrorKind::NotFound, "symbolic link is not followed"),
            ));
        }
        let bytes = fs::read(&path).map_err(|e| SyncError::read(&path, e))?;
        let modified = fs::metadata(&path)
            .and_then(|m| m.modified())
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        let checksum = checksum(&bytes);
        let text = std::str::from_utf8(&bytes)
            .map_err(|_| SyncError::malformed(&path, "file is not valid UTF-8"))?;
        let parsed = frontmatter::parse(text).map_err(|reason| SyncError::malformed(&path, reason))?;
        let raw_meta = serde_json::to_string(&parsed.raw)
            .map_err(|e| SyncError::malformed(&path, e.to_string()))?;

        Ok(FileContent {
            meta: parsed.meta,
            raw_meta,
            body: parsed.body,
            checksum,
            modified,
        })
    }

    /// 写入 `<category>/<filename>`，返回相对路径
    pub fn write(
        &self,
        category: &str,
        filename: &str,
        meta: &PromptMeta,
        body: &str,
    ) -> SyncResult<String> {
        let rel = self.content_key(category, filename)?;
        self.persist(&rel, meta, body, true)?;
        Ok(rel)
    }

    /// 新建 `<category>/<filename>`；目标已存在时返回 `is_already_exists` 的写入错误，不覆盖
    pub fn create(
        &self,
        category: &str,
        filename: &str,
        meta: &PromptMeta,
        body: &str,
    ) -> SyncResult<String> {
        let rel = self.content_key(category, filename)?;
        self.persist(&rel, meta, body, false)?;
        Ok(rel)
    }

    /// 原子写入：先写同目录下的临时文件，再重命名覆盖
    pub fn write_path(&self, rel: &str, meta: &PromptMeta, body: &str) -> SyncResult<()> {
        self.persist(rel, meta, body, true)
    }

    fn content_key(&self, category: &str, filename: &str) -> SyncResult<String> {
        validate_segment(category, "category")?;
        validate_segment(filename, "filename")?;
        if !self.is_content_name(filename) {
            return Err(SyncError::InvalidInput(format!(
                "filename {filename:?} does not have a content file extension"
            )));
        }
        Ok(format!("{category}/{filename}"))
    }

    fn persist(&self, rel: &str, meta: &PromptMeta, body: &str, overwrite: bool) -> SyncResult<()> {
        let path = self.absolute(rel);
        let text = frontmatter::render(meta, body)
            .map_err(|e| SyncError::InvalidInput(format!("cannot serialize metadata: {e}")))?;

        let dir = path.parent().unwrap_or(&self.root);
        fs::create_dir_all(dir).map_err(|e| SyncError::write(&path, e))?;

        // 临时文件名以 `.` 开头，监控和遍历都会忽略它
        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| SyncError::write(&path, e))?;
        tmp.write_all(text.as_bytes())
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| SyncError::write(&path, e))?;
        if overwrite {
            tmp.persist(&path).map_err(|e| SyncError::write(&path, e.error))?;
        } else {
            // 目标已存在时失败（AlreadyExists），临时文件随之删除
            tmp.persist_noclobber(&path).map_err(|e| SyncError::write(&path, e.error))?;
        }

        debug!(path = %rel, bytes = text.len(), "文件已写入");
        Ok(())
    }

    pub fn delete(&self, rel: &str) -> SyncResult<()> {
        let path = self.absolute(rel);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(SyncError::NotFound(rel.to_string()))
            }
            Err(e) => Err(SyncError::Io(e)),
        }
    }

    /// 路径键是否指向磁盘上的内容文件，判断规则与 enumerate 一致
    pub fn exists(&self, rel: &str) -> bool {
        !self.crosses_symlink(rel) && self.absolute(rel).is_file()
    }

    /// 递归列出所有内容文件，按文件名排序，结果在多次运行之间稳定
    pub fn enumerate(&self) -> SyncResult<Vec<String>> {
        let walker = WalkDir::new(&self.root)
            .follow_links(self.walker.follow_symlinks)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !self.is_hidden_name(entry.file_name()));

        let mut paths = Vec::new();
        for entry in walker {
            let entry = entry.map_err(|e| match e.into_io_error() {
                Some(io) => SyncError::Io(io),
                None => SyncError::Io(io::Error::other("filesystem loop detected")),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(rel) = self.relative_key(entry.path()) {
                if self.is_content_file(&rel) {
                    paths.push(rel);
                }
            }
        }
        Ok(paths)
    }

    /// 把绝对路径或相对路径规范化为路径键；不在根目录下时返回 None
    pub fn relative_key(&self, path: &Path) -> Option<String> {
        let rel = if path.is_absolute() {
            match path.strip_prefix(&self.root) {
                Ok(rel) => rel.to_path_buf(),
                // 根目录经过 canonicalize，事件路径可能没有
                Err(_) => {
                    let parent = path.parent()?.canonicalize().ok()?;
                    parent.strip_prefix(&self.root).ok()?.join(path.file_name()?)
                }
            }
        } else {
            path.to_path_buf()
        };

        let mut parts = Vec::new();
        for component in rel.components() {
            match component {
                Component::Normal(part) => parts.push(part.to_str()?.to_string()),
                Component::CurDir => {}
                _ => return None,
            }
        }
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("/"))
        }
    }

    /// 路径键是否指向内容文件（扩展名匹配，且不含隐藏路径段）
    pub fn is_content_file(&self, rel: &str) -> bool {
        let mut segments = rel.split('/').peekable();
        while let Some(segment) = segments.next() {
            if self.is_hidden_name(segment.as_ref()) {
                return false;
            }
            if segments.peek().is_none() {
                return self.is_content_name(segment);
            }
        }
        false
    }

    /// 新建文件使用的扩展名
    pub fn default_extension(&self) -> &str {
        self.walker.extensions.first().map(String::as_str).unwrap_or("md")
    }

    pub fn absolute(&self, rel: &str) -> PathBuf {
        rel.split('/').fold(self.root.clone(), |path, part| path.join(part))
    }

    fn is_content_name(&self, name: &str) -> bool {
        Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                self.walker
                    .extensions
                    .iter()
                    .any(|allowed| allowed.eq_ignore_ascii_case(ext))
            })
            .unwrap_or(false)
    }

    /// 不跟随链接时，路径上任何一段是符号链接都返回 true
    fn crosses_symlink(&self, rel: &str) -> bool {
        if self.walker.follow_symlinks {
            return false;
        }
        let mut path = self.root.clone();
        rel.split('/').any(|part| {
            path.push(part);
            fs::symlink_metadata(&path).is_ok_and(|m| m.file_type().is_symlink())
        })
    }

    fn is_hidden_name(&self, name: &std::ffi::OsStr) -> bool {
        self.walker.skip_hidden && name.to_string_lossy().starts_with('.')
    }
}

/// 分类由路径相对内容根目录的位置决定：顶层目录名，根目录下则为 "uncategorized"
pub fn category_for(rel: &str) -> String {
    match rel.split_once('/') {
        Some((top, _)) => top.to_string(),
        None => UNCATEGORIZED.to_string(),
    }
}

/// 文件完整字节的 SHA-256（小写十六进制）
pub fn checksum(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// 标题转文件名: 小写，非 [a-z0-9] 连续字符替换为 `-`
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for ch in title.to_lowercase().chars() {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            slug.push(ch);
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "untitled".to_string()
    } else {
        slug.to_string()
    }
}

fn validate_segment(segment: &str, what: &str) -> SyncResult<()> {
    let valid = !segment.is_empty()
        && !segment.starts_with('.')
        && !segment.contains(['/', '\\'])
        && segment.trim() == segment;
    if valid {
        Ok(())
    } else {
        Err(SyncError::InvalidInput(format!("invalid {what}: {segment:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store(dir: &Path) -> FileStore {
        FileStore::open(dir, WalkerConfig::default()).unwrap()
    }

    fn meta(title: &str) -> PromptMeta {
        PromptMeta {
            title: Some(title.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_write_creates_category_and_reads_back() {
        let dir = tempdir().unwrap();
        let files = store(dir.path());

        let rel = files.write("debugging", "trace.md", &meta("Trace"), "Find the bug").unwrap();
        assert_eq!(rel, "debugging/trace.md");

        // 目录已存在时再次写入
        files.write("debugging", "other.md", &meta("Other"), "x").unwrap();

        let content = files.read(&rel).unwrap();
        assert_eq!(content.meta.title.as_deref(), Some("Trace"));
        assert_eq!(content.body, "Find the bug\n");
        assert_eq!(content.checksum.len(), 64);
    }

    #[test]
    fn test_write_leaves_no_temp_files() {
        let dir = tempdir().unwrap();
        let files = store(dir.path());
        files.write("a", "one.md", &meta("One"), "body").unwrap();

        let names: Vec<_> = fs::read_dir(dir.path().join("a"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["one.md"]);
    }

    #[test]
    fn test_write_rejects_bad_names() {
        let dir = tempdir().unwrap();
        let files = store(dir.path());
        assert!(matches!(
            files.write("../escape", "x.md", &meta("x"), ""),
            Err(SyncError::InvalidInput(_))
        ));
        assert!(matches!(
            files.write("a", "notes.txt", &meta("x"), ""),
            Err(SyncError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_create_never_overwrites() {
        let dir = tempdir().unwrap();
        let files = store(dir.path());

        let rel = files.create("a", "one.md", &meta("First"), "first").unwrap();
        let err = files.create("a", "one.md", &meta("Second"), "second").unwrap_err();
        assert!(err.is_already_exists());

        let content = files.read(&rel).unwrap();
        assert_eq!(content.meta.title.as_deref(), Some("First"));
        // 失败的写入不留下临时文件
        assert_eq!(fs::read_dir(dir.path().join("a")).unwrap().count(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_follow_one_rule() {
        use std::os::unix::fs::symlink;

        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("real")).unwrap();
        fs::write(root.join("real/x.md"), "x").unwrap();
        symlink(root.join("real/x.md"), root.join("link.md")).unwrap();
        symlink(root.join("real"), root.join("alias")).unwrap();

        let files = store(root);
        assert_eq!(files.enumerate().unwrap(), vec!["real/x.md"]);
        for rel in ["link.md", "alias/x.md"] {
            assert!(!files.exists(rel));
            assert!(files.read(rel).unwrap_err().is_missing_file());
        }

        let following = FileStore::open(
            root,
            WalkerConfig { follow_symlinks: true, ..WalkerConfig::default() },
        )
        .unwrap();
        assert_eq!(
            following.enumerate().unwrap(),
            vec!["alias/x.md", "link.md", "real/x.md"]
        );
        assert!(following.exists("link.md"));
        assert!(following.read("alias/x.md").is_ok());
    }

    #[test]
    fn test_read_errors() {
        let dir = tempdir().unwrap();
        let files = store(dir.path());

        let err = files.read("missing.md").unwrap_err();
        assert!(matches!(err, SyncError::Read { .. }));
        assert!(err.is_missing_file());

        fs::write(dir.path().join("bad.md"), "---\ntitle: x\n").unwrap();
        assert!(matches!(files.read("bad.md"), Err(SyncError::MalformedMetadata { .. })));
    }

    #[test]
    fn test_delete_missing_is_not_found() {
        let dir = tempdir().unwrap();
        let files = store(dir.path());
        assert!(matches!(files.delete("nope.md"), Err(SyncError::NotFound(_))));

        fs::write(dir.path().join("yes.md"), "x").unwrap();
        files.delete("yes.md").unwrap();
        assert!(!files.exists("yes.md"));
    }

    #[test]
    fn test_enumerate_filters_and_sorts() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("b")).unwrap();
        fs::create_dir_all(root.join("a/nested")).unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::write(root.join("b/z.md"), "z").unwrap();
        fs::write(root.join("a/nested/y.md"), "y").unwrap();
        fs::write(root.join("a/x.md"), "x").unwrap();
        fs::write(root.join("root.md"), "r").unwrap();
        fs::write(root.join("a/notes.txt"), "t").unwrap();
        fs::write(root.join("a/.hidden.md"), "h").unwrap();
        fs::write(root.join(".git/config.md"), "g").unwrap();

        let files = store(root);
        let paths = files.enumerate().unwrap();
        assert_eq!(paths, vec!["a/nested/y.md", "a/x.md", "b/z.md", "root.md"]);
        assert_eq!(files.enumerate().unwrap(), paths);
    }

    #[test]
    fn test_enumerate_empty_root() {
        let dir = tempdir().unwrap();
        assert!(store(dir.path()).enumerate().unwrap().is_empty());
    }

    #[test]
    fn test_relative_key() {
        let dir = tempdir().unwrap();
        let files = store(dir.path());

        let abs = files.root().join("debugging").join("x.md");
        assert_eq!(files.relative_key(&abs).as_deref(), Some("debugging/x.md"));
        assert_eq!(files.relative_key(Path::new("./a/b.md")).as_deref(), Some("a/b.md"));
        assert_eq!(files.relative_key(Path::new("../a.md")), None);
        assert_eq!(files.relative_key(Path::new("/elsewhere/a.md")), None);
    }

    #[test]
    fn test_is_content_file() {
        let dir = tempdir().unwrap();
        let files = store(dir.path());
        assert!(files.is_content_file("a/b.md"));
        assert!(files.is_content_file("B.MD"));
        assert!(!files.is_content_file("a/.tmpX12"));
        assert!(!files.is_content_file(".cache/b.md"));
        assert!(!files.is_content_file("a/b.txt"));
    }

    #[test]
    fn test_category_for() {
        assert_eq!(category_for("x.md"), "uncategorized");
        assert_eq!(category_for("debugging/x.md"), "debugging");
        assert_eq!(category_for("debugging/deep/x.md"), "debugging");
    }

    #[test]
    fn test_checksum_is_byte_exact() {
        assert_eq!(checksum(b"abc"), checksum(b"abc"));
        assert_ne!(checksum(b"abc"), checksum(b"abc\n"));
        assert_eq!(
            checksum(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Code Review: Rust!"), "code-review-rust");
        assert_eq!(slugify("  API v2  "), "api-v2");
        assert_eq!(slugify("???"), "untitled");
    }
}

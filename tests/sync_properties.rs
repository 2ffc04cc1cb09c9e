// tests/sync_properties.rs - 同步引擎的整体行为
use std::collections::HashSet;
use std::fs;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;

use prompt_sync::api::CreatePromptRequest;
use prompt_sync::config::WalkerConfig;
use prompt_sync::query::{QueryFilters, QueryOptions};
use prompt_sync::{
    FileStore, IndexOutcome, IndexStore, PromptIndex, PromptIndexBuilder, PromptRecord,
    PromptService, Reconciler, SyncError, SyncResult, Synchronizer,
};
use chrono::Utc;
use tempfile::{tempdir, TempDir};

/// 记录写入次数的索引存储
struct CountingStore {
    inner: PromptIndex,
    upserts: AtomicUsize,
    deletes: AtomicUsize,
}

impl CountingStore {
    fn new() -> Self {
        Self {
            inner: PromptIndexBuilder::new().build().unwrap(),
            upserts: AtomicUsize::new(0),
            deletes: AtomicUsize::new(0),
        }
    }

    fn upserts(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }
}

impl IndexStore for CountingStore {
    fn get_by_path(&self, file_path: &str) -> SyncResult<Option<PromptRecord>> {
        self.inner.get_by_path(file_path)
    }

    fn get_by_id(&self, id: &str) -> SyncResult<Option<PromptRecord>> {
        self.inner.get_by_id(id)
    }

    fn upsert(&self, record: &PromptRecord) -> SyncResult<()> {
        self.upserts.fetch_add(1, Ordering::SeqCst);
        self.inner.upsert(record)
    }

    fn delete(&self, file_path: &str) -> SyncResult<bool> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete(file_path)
    }

    fn file_paths(&self) -> SyncResult<HashSet<String>> {
        self.inner.file_paths()
    }

    fn query(&self, filters: &QueryFilters) -> SyncResult<Vec<PromptRecord>> {
        self.inner.query(filters)
    }

    fn search(
        &self,
        text: &str,
        filters: &QueryFilters,
        options: &QueryOptions,
    ) -> SyncResult<Vec<PromptRecord>> {
        self.inner.search(text, filters, options)
    }
}

fn setup() -> (TempDir, Arc<CountingStore>, Arc<Synchronizer>) {
    let dir = tempdir().unwrap();
    let files = Arc::new(FileStore::open(dir.path(), WalkerConfig::default()).unwrap());
    let store = Arc::new(CountingStore::new());
    let sync = Arc::new(Synchronizer::new(files, store.clone() as Arc<dyn IndexStore>));
    (dir, store, sync)
}

fn write(dir: &TempDir, rel: &str, text: &str) {
    let path = dir.path().join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, text).unwrap();
}

#[test]
fn repeated_index_writes_once() {
    let (dir, store, sync) = setup();
    write(&dir, "debugging/x.md", "---\ntitle: X\n---\nbody\n");

    assert_eq!(sync.index("debugging/x.md").unwrap(), IndexOutcome::Inserted);
    for _ in 0..5 {
        assert_eq!(sync.index("debugging/x.md").unwrap(), IndexOutcome::Unchanged);
    }
    assert_eq!(store.upserts(), 1);
}

#[test]
fn touching_without_content_change_is_a_noop() {
    let (dir, store, sync) = setup();
    write(&dir, "a.md", "same bytes");
    sync.index("a.md").unwrap();

    // 重写相同内容只会改变 mtime
    write(&dir, "a.md", "same bytes");
    assert_eq!(sync.index("a.md").unwrap(), IndexOutcome::Unchanged);
    assert_eq!(store.upserts(), 1);
}

#[test]
fn reconcile_converges_to_disk_state() {
    let (dir, _store, sync) = setup();
    let reconciler = Reconciler::new(sync.clone());

    write(&dir, "a.md", "a");
    write(&dir, "writing/b.md", "b");
    reconciler.reindex_all().unwrap();

    // 绕开同步引擎直接改动磁盘
    fs::remove_file(dir.path().join("a.md")).unwrap();
    write(&dir, "writing/b.md", "b changed");
    write(&dir, "ops/c.md", "c");
    reconciler.reindex_all().unwrap();

    let paths = sync.store().file_paths().unwrap();
    let on_disk: HashSet<String> = sync.files().enumerate().unwrap().into_iter().collect();
    assert_eq!(paths, on_disk);
    let b = sync.store().get_by_path("writing/b.md").unwrap().unwrap();
    assert_eq!(b.content, "b changed");
}

#[test]
fn category_follows_directory() {
    let (dir, _store, sync) = setup();
    write(&dir, "root.md", "r");
    write(&dir, "debugging/deep/nested.md", "n");
    Reconciler::new(sync.clone()).reindex_all().unwrap();

    let root = sync.store().get_by_path("root.md").unwrap().unwrap();
    assert_eq!(root.category, "uncategorized");
    let nested = sync.store().get_by_path("debugging/deep/nested.md").unwrap().unwrap();
    assert_eq!(nested.category, "debugging");
}

#[test]
fn failures_do_not_stop_the_batch() {
    let (dir, _store, sync) = setup();
    write(&dir, "a.md", "fine");
    write(&dir, "b.md", "---\ntags: [unclosed\n---\nbody");
    write(&dir, "c.md", "also fine");

    let report = Reconciler::new(sync.clone()).reindex_all().unwrap();
    assert_eq!(report.inserted, 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].0, "b.md");
    assert!(matches!(report.failures[0].1, SyncError::MalformedMetadata { .. }));
}

#[test]
fn concurrent_distinct_paths_all_land() {
    let (dir, store, sync) = setup();
    let n = 16;
    for i in 0..n {
        write(&dir, &format!("batch/p{i}.md"), &format!("prompt {i}"));
    }

    let handles: Vec<_> = (0..n)
        .map(|i| {
            let sync = sync.clone();
            thread::spawn(move || {
                // 每个路径被两个来源同时索引
                let path = format!("batch/p{i}.md");
                sync.index(&path).unwrap();
                sync.index(&path).unwrap();
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(sync.store().file_paths().unwrap().len(), n);
    assert_eq!(store.upserts(), n);
}

#[test]
fn same_path_racing_yields_one_record() {
    let (dir, store, sync) = setup();
    write(&dir, "race.md", "contended");

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let sync = sync.clone();
            thread::spawn(move || sync.index("race.md").unwrap())
        })
        .collect();
    let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(outcomes.iter().filter(|o| **o == IndexOutcome::Inserted).count(), 1);
    assert_eq!(store.upserts(), 1);
    assert_eq!(sync.store().file_paths().unwrap().len(), 1);
}

#[test]
fn deleted_prompt_is_not_found_by_former_id() {
    let (_dir, _store, sync) = setup();
    let service = PromptService::new(sync.clone());

    let created = service
        .create(CreatePromptRequest::new("Temporary", "body").with_category("scratch"))
        .unwrap();
    service.delete(&created.id).unwrap();

    assert!(matches!(service.get(&created.id), Err(SyncError::NotFound(_))));
    assert!(sync.store().get_by_path(&created.file_path).unwrap().is_none());
}

#[test]
fn external_delete_is_repaired_by_reconcile() {
    let (dir, _store, sync) = setup();
    let service = PromptService::new(sync.clone());
    let created = service.create(CreatePromptRequest::new("Ext", "body")).unwrap();

    fs::remove_file(dir.path().join(&created.file_path)).unwrap();
    let summary = service.reindex().unwrap();

    assert_eq!(summary.removed, 1);
    assert!(matches!(service.get(&created.id), Err(SyncError::NotFound(_))));
}

/// 第一次读取路径集合之前，模拟一个在磁盘枚举之后才完成的新建操作
struct RacingStore {
    inner: PromptIndex,
    files: Arc<FileStore>,
    raced: AtomicBool,
}

impl RacingStore {
    fn create_late_file(&self) -> SyncResult<()> {
        fs::write(self.files.root().join("late.md"), "---\ntitle: Late\n---\nbody\n")?;
        let file = self.files.read("late.md")?;
        let now = Utc::now();
        self.inner.upsert(&PromptRecord {
            id: "late-id".to_string(),
            file_path: "late.md".to_string(),
            title: "Late".to_string(),
            content: file.body,
            category: "uncategorized".to_string(),
            model: None,
            tags: Vec::new(),
            metadata: file.raw_meta,
            checksum: file.checksum,
            last_modified: file.modified,
            created_at: now,
            updated_at: now,
        })
    }
}

impl IndexStore for RacingStore {
    fn get_by_path(&self, file_path: &str) -> SyncResult<Option<PromptRecord>> {
        self.inner.get_by_path(file_path)
    }

    fn get_by_id(&self, id: &str) -> SyncResult<Option<PromptRecord>> {
        self.inner.get_by_id(id)
    }

    fn upsert(&self, record: &PromptRecord) -> SyncResult<()> {
        self.inner.upsert(record)
    }

    fn delete(&self, file_path: &str) -> SyncResult<bool> {
        self.inner.delete(file_path)
    }

    fn file_paths(&self) -> SyncResult<HashSet<String>> {
        if !self.raced.swap(true, Ordering::SeqCst) {
            self.create_late_file()?;
        }
        self.inner.file_paths()
    }

    fn query(&self, filters: &QueryFilters) -> SyncResult<Vec<PromptRecord>> {
        self.inner.query(filters)
    }

    fn search(
        &self,
        text: &str,
        filters: &QueryFilters,
        options: &QueryOptions,
    ) -> SyncResult<Vec<PromptRecord>> {
        self.inner.search(text, filters, options)
    }
}

#[test]
fn reconcile_keeps_files_created_after_enumeration() {
    let dir = tempdir().unwrap();
    let files = Arc::new(FileStore::open(dir.path(), WalkerConfig::default()).unwrap());
    let store = Arc::new(RacingStore {
        inner: PromptIndexBuilder::new().build().unwrap(),
        files: files.clone(),
        raced: AtomicBool::new(false),
    });
    let sync = Arc::new(Synchronizer::new(files.clone(), store.clone() as Arc<dyn IndexStore>));
    write(&dir, "early.md", "already here");

    let report = Reconciler::new(sync.clone()).reindex_all().unwrap();

    assert!(report.is_clean());
    assert_eq!(report.removed, 0);
    let indexed = store.inner.file_paths().unwrap();
    let on_disk: HashSet<String> = files.enumerate().unwrap().into_iter().collect();
    assert_eq!(indexed, on_disk);
    let late = store.get_by_path("late.md").unwrap().unwrap();
    assert_eq!(late.id, "late-id");
}

// tests/watcher_e2e.rs - 真实文件系统事件下的监控
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use prompt_sync::config::{WalkerConfig, WatcherConfig};
use prompt_sync::{ChangeWatcher, FileStore, IndexStore, PromptIndexBuilder, Synchronizer, WatcherState};
use tempfile::tempdir;

fn wait_until(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        thread::sleep(Duration::from_millis(50));
    }
    check()
}

fn write(root: &Path, rel: &str, text: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, text).unwrap();
}

#[test]
fn watcher_follows_create_modify_delete() {
    let dir = tempdir().unwrap();
    let files = Arc::new(FileStore::open(dir.path(), WalkerConfig::default()).unwrap());
    let store: Arc<dyn IndexStore> = Arc::new(PromptIndexBuilder::new().build().unwrap());
    let sync = Arc::new(Synchronizer::new(files.clone(), store.clone()));
    // 新建目录与注册监控之间存在竞争，目录提前建好
    fs::create_dir_all(files.root().join("debugging")).unwrap();

    let mut watcher = ChangeWatcher::new(sync, WatcherConfig::default());
    watcher.start().unwrap();
    assert_eq!(watcher.state(), WatcherState::Watching);

    let root = files.root().to_path_buf();
    let timeout = Duration::from_secs(10);

    write(&root, "debugging/x.md", "---\ntitle: First\n---\nbody\n");
    assert!(wait_until(timeout, || {
        store.get_by_path("debugging/x.md").unwrap().is_some()
    }));
    let first = store.get_by_path("debugging/x.md").unwrap().unwrap();
    assert_eq!(first.category, "debugging");

    write(&root, "debugging/x.md", "---\ntitle: Second\n---\nbody\n");
    assert!(wait_until(timeout, || {
        store
            .get_by_path("debugging/x.md")
            .unwrap()
            .is_some_and(|r| r.title == "Second")
    }));
    let second = store.get_by_path("debugging/x.md").unwrap().unwrap();
    assert_eq!(second.id, first.id);

    // 隐藏文件和其他扩展名不会进入索引
    write(&root, "debugging/.scratch.md", "hidden");
    write(&root, "debugging/notes.txt", "text");

    fs::remove_file(root.join("debugging/x.md")).unwrap();
    assert!(wait_until(timeout, || {
        store.get_by_path("debugging/x.md").unwrap().is_none()
    }));

    watcher.stop();
    assert_eq!(watcher.state(), WatcherState::Stopped);
    assert!(store.file_paths().unwrap().is_empty());
}

#[test]
fn watcher_handles_renames() {
    let dir = tempdir().unwrap();
    let files = Arc::new(FileStore::open(dir.path(), WalkerConfig::default()).unwrap());
    let store: Arc<dyn IndexStore> = Arc::new(PromptIndexBuilder::new().build().unwrap());
    let sync = Arc::new(Synchronizer::new(files.clone(), store.clone()));
    fs::create_dir_all(files.root().join("drafts")).unwrap();
    fs::create_dir_all(files.root().join("published")).unwrap();

    let mut watcher = ChangeWatcher::new(sync, WatcherConfig::default());
    watcher.start().unwrap();

    let root = files.root().to_path_buf();
    let timeout = Duration::from_secs(10);

    write(&root, "drafts/a.md", "moving prompt");
    assert!(wait_until(timeout, || store.get_by_path("drafts/a.md").unwrap().is_some()));

    fs::rename(root.join("drafts/a.md"), root.join("published/a.md")).unwrap();

    assert!(wait_until(timeout, || {
        store.get_by_path("drafts/a.md").unwrap().is_none()
            && store.get_by_path("published/a.md").unwrap().is_some()
    }));
    let moved = store.get_by_path("published/a.md").unwrap().unwrap();
    assert_eq!(moved.category, "published");

    watcher.stop();
}

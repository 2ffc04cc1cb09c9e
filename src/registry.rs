// registry.rs - 路径锁注册表
// 同一路径上的索引/删除操作互斥执行，不同路径之间互不影响

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RawMutex};
use parking_lot::lock_api::ArcMutexGuard;

/// 路径锁注册表 - 线程安全，按需创建、无人使用时回收
#[derive(Clone, Default)]
pub struct PathLocks {
    inner: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

/// 持有期间独占该路径；释放时若无其他等待者则回收条目
pub struct PathGuard {
    guard: Option<ArcMutexGuard<RawMutex, ()>>,
    key: String,
    registry: PathLocks,
}

impl PathLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取路径锁（阻塞直到同一路径上的其他操作完成）
    pub fn lock(&self, path: &str) -> PathGuard {
        let entry = {
            let mut map = self.inner.lock();
            map.entry(path.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        // 注册表锁已释放，只在单个路径上等待
        let guard = entry.lock_arc();
        PathGuard {
            guard: Some(guard),
            key: path.to_string(),
            registry: self.clone(),
        }
    }

    /// 当前登记的路径数
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for PathGuard {
    fn drop(&mut self) {
        drop(self.guard.take());

        let mut map = self.registry.inner.lock();
        if let Some(entry) = map.get(&self.key) {
            // 只剩注册表自己的引用，说明没有其他人在等
            if Arc::strong_count(entry) == 1 {
                map.remove(&self.key);
            }
        }
    }
}

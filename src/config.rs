// 配置模块 - 支持外部配置文件
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::error::{SyncError, SyncResult};

/// 配置文件路径
pub const CONFIG_FILE: &str = "./config.toml";

// ============== 配置结构体 ==============

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub paths: PathsConfig,
    pub walker: WalkerConfig,
    pub watcher: WatcherConfig,
    pub performance: PerformanceConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// 内容根目录（提示词文件所在目录）
    pub content_root: PathBuf,
    /// 索引存储目录
    pub storage_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkerConfig {
    /// 是否跳过隐藏文件
    pub skip_hidden: bool,
    /// 是否跟随符号链接
    pub follow_symlinks: bool,
    /// 内容文件扩展名
    pub extensions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// 处理文件事件的工作线程数
    pub worker_threads: usize,
    /// 待处理事件队列容量
    pub queue_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    pub index_writer_memory: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// trace, debug, info, warn, error
    pub level: String,
}

// ============== 默认配置 ==============

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            content_root: PathBuf::from("./prompts"),
            storage_path: PathBuf::from("./storage"),
        }
    }
}

impl Default for WalkerConfig {
    fn default() -> Self {
        Self {
            skip_hidden: true,
            follow_symlinks: false,
            extensions: vec!["md".to_string()],
        }
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            worker_threads: 4,
            queue_capacity: 256,
        }
    }
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            index_writer_memory: 50_000_000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ============== 配置加载 ==============

impl AppConfig {
    /// 从配置文件加载，失败则使用默认配置
    pub fn load() -> Self {
        if !Path::new(CONFIG_FILE).exists() {
            return Self::default();
        }
        Self::load_from_file(CONFIG_FILE).unwrap_or_else(|e| {
            warn!(file = CONFIG_FILE, error = %e, "无法加载配置文件，使用默认配置");
            Self::default()
        })
    }

    /// 从指定文件加载配置
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> SyncResult<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> SyncResult<Self> {
        let config: AppConfig =
            toml::from_str(content).map_err(|e| SyncError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// 生成默认配置文件
    pub fn generate_default_config<P: AsRef<Path>>(path: P) -> SyncResult<()> {
        let content = toml::to_string_pretty(&Self::default())
            .map_err(|e| SyncError::Config(e.to_string()))?;
        fs::write(path, content)?;
        Ok(())
    }

    fn validate(&self) -> SyncResult<()> {
        if self.watcher.worker_threads == 0 {
            return Err(SyncError::Config("watcher.worker_threads must be at least 1".into()));
        }
        if self.watcher.queue_capacity == 0 {
            return Err(SyncError::Config("watcher.queue_capacity must be at least 1".into()));
        }
        if self.walker.extensions.is_empty() {
            return Err(SyncError::Config("walker.extensions must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [paths]
            content_root = "/srv/prompts"

            [watcher]
            worker_threads = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.paths.content_root, PathBuf::from("/srv/prompts"));
        assert_eq!(config.paths.storage_path, PathBuf::from("./storage"));
        assert_eq!(config.watcher.worker_threads, 2);
        assert_eq!(config.watcher.queue_capacity, 256);
        assert_eq!(config.walker.extensions, vec!["md"]);
    }

    #[test]
    fn test_rejects_zero_workers() {
        let result = AppConfig::from_toml("[watcher]\nworker_threads = 0\n");
        assert!(matches!(result, Err(SyncError::Config(_))));
    }

    #[test]
    fn test_generated_config_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        AppConfig::generate_default_config(&path).unwrap();

        let loaded = AppConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded.logging.level, "info");
        assert_eq!(loaded.performance.index_writer_memory, 50_000_000);
    }
}

// main.rs
use std::io::{self, BufRead, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use prompt_sync::api::{ErrorResponse, SearchRequest};
use prompt_sync::{
    AppConfig, ChangeWatcher, FileStore, IndexStore, PromptIndexBuilder, PromptService,
    Synchronizer,
};

fn main() -> Result<()> {
    let config = AppConfig::load();

    // RUST_LOG 优先于配置文件
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .init();

    let files = Arc::new(
        FileStore::open(&config.paths.content_root, config.walker.clone())
            .context("无法打开内容目录")?,
    );
    let store: Arc<dyn IndexStore> = Arc::new(
        PromptIndexBuilder::new()
            .with_storage_path(&config.paths.storage_path)
            .with_heap_size(config.performance.index_writer_memory)
            .build()
            .context("无法打开索引")?,
    );
    let sync = Arc::new(Synchronizer::new(files.clone(), store));
    let service = PromptService::new(sync.clone());

    println!("--- 提示词库 ---");
    println!(" [后台] 正在监控: {}", files.root().display());

    // 先启动监控再对账，对账期间的变更不会漏掉
    let mut watcher = ChangeWatcher::new(sync, config.watcher.clone());
    if let Err(e) = watcher.start() {
        warn!(error = %e, "监控启动失败，只能通过 :reindex 同步");
    }

    match service.reindex() {
        Ok(summary) => println!(
            " [同步] 新增 {} / 更新 {} / 未变 {} / 移除 {} / 失败 {} ({} ms)",
            summary.inserted,
            summary.updated,
            summary.unchanged,
            summary.removed,
            summary.failed.len(),
            summary.took_ms
        ),
        Err(e) => error!(error = %e, "初始对账失败"),
    }

    println!(" [前台] 输入搜索表达式，:categories 查看分类，:reindex 重新对账，quit 退出");

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let Some(line) = lines.next() else { break };
        let input = line?;
        let input = input.trim();

        match input {
            "" => continue,
            "quit" | "exit" => break,
            ":categories" => match service.categories() {
                Ok(categories) if categories.is_empty() => println!("(空)"),
                Ok(categories) => {
                    for c in categories {
                        println!("  {:<24} {}", c.name, c.count);
                    }
                }
                Err(e) => print_error(&e),
            },
            ":reindex" => match service.reindex() {
                Ok(summary) => println!("{}", serde_json::to_string_pretty(&summary)?),
                Err(e) => print_error(&e),
            },
            expression => match service.search(&SearchRequest::new(expression)) {
                Ok(response) => {
                    println!(" 找到 {} 条 ({} ms)", response.total, response.took_ms);
                    for (i, prompt) in response.results.iter().enumerate() {
                        let model = prompt.model.as_deref().unwrap_or("-");
                        println!(
                            "  {:>2}. {} [{}] ({}) {}",
                            i + 1,
                            prompt.title,
                            prompt.category,
                            model,
                            prompt.file_path
                        );
                    }
                }
                Err(e) => print_error(&e),
            },
        }
    }

    watcher.stop();
    info!("已退出");
    Ok(())
}

fn print_error(err: &prompt_sync::SyncError) {
    let response = ErrorResponse::from(err);
    println!(" [错误] {}: {}", response.code, response.message);
}

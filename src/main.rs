//! 命令行入口：翻译一个渲染好的页面并输出最终标记

use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process;
use std::str::FromStr;
use std::sync::Arc;

use clap::Parser;

use page_translate::env::{core::LogLevel, EnvVar};
use page_translate::parsers::html::decode_markup;
use page_translate::translation::config::ConfigManager;
use page_translate::translation::storage::{
    CacheStore, FileCacheStore, FileLockService, LockService, MemoryCacheStore, MemoryLockService,
};
use page_translate::translation::{
    OpenAiCompatibleProvider, Orchestrator, PageKind, RenderRequest,
};

#[derive(Parser, Debug)]
#[command(name = "page-translate", version, about = "Translate a rendered HTML page and cache the result")]
struct Cli {
    /// HTML file to translate (stdin if omitted)
    input: Option<PathBuf>,

    /// Target language (defaults to the path prefix)
    #[arg(short, long)]
    lang: Option<String>,

    /// Request path, e.g. /de/about/
    #[arg(short, long, default_value = "/")]
    path: String,

    /// Request query string
    #[arg(short, long)]
    query: Option<String>,

    /// Configuration file (TOML or JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory for the page cache and lock files
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Neither read nor write the cache
    #[arg(long)]
    no_cache: bool,

    /// Content entity id of the page
    #[arg(long)]
    entity: Option<u64>,

    /// Treat the page as the front page
    #[arg(long, conflicts_with_all = ["entity", "search"])]
    front_page: bool,

    /// Treat the page as a search listing for this term
    #[arg(long, conflicts_with = "entity")]
    search: Option<String>,

    /// Input charset when the document does not declare one
    #[arg(long)]
    charset: Option<String>,

    /// Write the result to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Log level: trace, debug, info, warn, error
    #[arg(long)]
    log_level: Option<String>,

    /// Write an example configuration file and exit
    #[arg(long, value_name = "PATH")]
    generate_config: Option<PathBuf>,
}

fn init_logging(level: Option<&str>) {
    let level = level
        .map(str::to_string)
        .unwrap_or_else(|| LogLevel::get().unwrap_or_else(|_| "info".to_string()));
    let level = tracing::Level::from_str(&level).unwrap_or(tracing::Level::INFO);

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn read_input(input: Option<&PathBuf>) -> io::Result<Vec<u8>> {
    match input {
        Some(path) => fs::read(path),
        None => {
            let mut data = Vec::new();
            io::stdin().read_to_end(&mut data)?;
            Ok(data)
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(path) = &cli.generate_config {
        ConfigManager::generate_example_config(path)?;
        eprintln!("已生成示例配置: {}", path.display());
        return Ok(());
    }

    let manager = match &cli.config {
        Some(path) => ConfigManager::from_file(path)?,
        None => ConfigManager::new()?,
    };
    if let Some(source) = manager.source() {
        tracing::info!("使用配置文件: {}", source.display());
    }
    let mut config = manager.into_config();
    if let Some(dir) = &cli.cache_dir {
        config.cache_dir = Some(dir.display().to_string());
    }

    let data = read_input(cli.input.as_ref())?;
    let html = decode_markup(&data, cli.charset.as_deref());

    let (store, locks): (Arc<dyn CacheStore>, Arc<dyn LockService>) = match config.cache_dir() {
        Some(dir) => (
            Arc::new(FileCacheStore::new(dir.clone())),
            Arc::new(FileLockService::new(dir.join("locks"))),
        ),
        None => (
            Arc::new(MemoryCacheStore::new(config.memory_cache_size)),
            Arc::new(MemoryLockService::new()),
        ),
    };

    let provider = Arc::new(OpenAiCompatibleProvider::from_config(&config)?);
    let orchestrator = Orchestrator::builder(config, provider)
        .store(store)
        .locks(locks)
        .build();

    let mut request = RenderRequest::new(&cli.path, html);
    if let Some(query) = &cli.query {
        request = request.with_query(query);
    }
    if let Some(lang) = &cli.lang {
        request = request.with_language(lang);
    }
    if cli.no_cache {
        request = request.bypassing_cache();
    }
    request.page = match (cli.entity, &cli.search, cli.front_page) {
        (Some(id), _, _) => PageKind::Singular(id),
        (_, Some(term), _) => PageKind::Search {
            query: term.clone(),
        },
        (_, _, true) => PageKind::FrontPage,
        _ => PageKind::Unknown,
    };

    let outcome = orchestrator.handle(&request);
    tracing::info!("{}: {:?}", cli.path, outcome.outcome);

    match &cli.output {
        Some(path) => fs::write(path, outcome.html.as_bytes())?,
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(outcome.html.as_bytes())?;
            stdout.flush()?;
        }
    }

    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref());

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

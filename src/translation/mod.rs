//! 翻译模块
//!
//! 把渲染好的页面翻译成目标语言，并按 (站点, 语言, 逻辑页面) 缓存结果：
//! - **core**: 请求编排（跳过判断、路由、缓存键、单飞锁、后处理）
//! - **pipeline**: 分段、过滤、批次翻译、合并
//! - **provider**: 翻译服务接口
//! - **storage**: 页面缓存与锁
//! - **config**: 配置管理
//! - **error**: 错误处理
//!
//! # 基本用法
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use page_translate::translation::{
//!     OpenAiCompatibleProvider, Orchestrator, RenderRequest, TranslationConfig,
//! };
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = TranslationConfig::for_site("https://example.com", "en");
//! let provider = Arc::new(OpenAiCompatibleProvider::from_config(&config)?);
//! let orchestrator = Orchestrator::builder(config, provider).build();
//!
//! let html = "<!DOCTYPE html><html><body><p>Welcome</p></body></html>";
//! let outcome = orchestrator.handle(&RenderRequest::new("/de/", html));
//! println!("{}", outcome.html);
//! # Ok(())
//! # }
//! ```

/// 配置管理模块
pub mod config;

/// 请求编排核心
pub mod core;

/// 错误处理模块
pub mod error;

/// 翻译管道模块
pub mod pipeline;

/// 翻译服务接口
pub mod provider;

/// 存储模块
pub mod storage;

// 重新导出主要类型
pub use config::{ConfigManager, TranslationConfig};
pub use core::{
    ExecutionBudget, LanguageCode, Orchestrator, OrchestratorBuilder, Outcome, PageKind,
    RenderOutcome, RenderRequest, SlugResolver,
};
pub use error::{TranslationError, TranslationResult};
pub use pipeline::{merge, BatchTranslator, Plan, Segment, SegmentKind, Segmenter, TranslationMap};
pub use provider::{OpenAiCompatibleProvider, ProviderRequest, TranslationProvider};
pub use storage::{ArtifactCache, CacheStore, FileCacheStore, FileLockService, LockService, MemoryCacheStore, MemoryLockService};

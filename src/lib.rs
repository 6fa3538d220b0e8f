//! # Page Translate Library
//!
//! 把渲染好的网页翻译成多种语言：结构保持的分段与合并、批次调用语言模型、
//! 按逻辑页面缓存译文，并保证同一缓存条目同时最多一次翻译。
//!
//! ## 模块组织
//!
//! - `env` - 环境变量定义
//! - `parsers` - HTML解析、序列化、链接重写
//! - `translation` - 翻译编排、管道、缓存与锁
//! - `utils` - 时钟与URL工具

pub mod env;
pub mod parsers;
pub mod translation;
pub mod utils;

// Re-export commonly used items for convenience
pub use translation::{Orchestrator, RenderOutcome, RenderRequest, TranslationConfig, TranslationError};

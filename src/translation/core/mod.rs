//! 请求编排核心
//!
//! - `request`: 渲染请求、页面类型、执行预算
//! - `language`: 目标语言解析
//! - `route`: 路由标识、缓存键、别名服务
//! - `eligibility`: 跳过判断与缓存策略
//! - `postprocess`: 元数据注入、链接修复、工具栏适配
//! - `orchestrator`: 缓存 + 单飞锁状态机

pub mod eligibility;
pub mod language;
pub mod orchestrator;
pub mod postprocess;
pub mod request;
pub mod route;

pub use eligibility::{cache_policy, check_skip, CachePolicy, SkipReason};
pub use language::{LanguageCode, LanguageResolver};
pub use orchestrator::{Orchestrator, OrchestratorBuilder, OrchestratorStats, Outcome, RenderOutcome};
pub use postprocess::{MetadataInjector, NoopInjector, PostProcessor};
pub use request::{ExecutionBudget, PageKind, RenderRequest, RequestContext};
pub use route::{CacheKey, NoopSlugResolver, RouteIdentity, SiteIdentity, SlugResolver, StaticSlugMap};

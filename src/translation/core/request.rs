//! 渲染请求与执行预算

use std::time::{Duration, Instant};

use super::eligibility::CachePolicy;
use super::language::LanguageCode;
use super::route::{CacheKey, RouteIdentity};
use crate::translation::error::{TranslationError, TranslationResult};

/// 宿主判断出的页面类型
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PageKind {
    /// 单一内容实体（文章、页面、商品）
    Singular(u64),
    FrontPage,
    Archive,
    Search { query: String },
    #[default]
    Unknown,
}

/// 剩余执行时间
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionBudget {
    deadline: Option<Instant>,
}

impl ExecutionBudget {
    /// 不限时
    pub fn unlimited() -> Self {
        Self { deadline: None }
    }

    pub fn with_remaining(remaining: Duration) -> Self {
        Self {
            deadline: Some(Instant::now() + remaining),
        }
    }

    /// 剩余时间；不限时返回 `None`
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// 剩余时间不少于 `needed`
    pub fn ensure(&self, needed: Duration) -> TranslationResult<()> {
        match self.remaining() {
            Some(remaining) if remaining < needed => Err(TranslationError::BudgetExceeded {
                remaining_ms: remaining.as_millis() as u64,
            }),
            _ => Ok(()),
        }
    }

    /// 把一个时长收紧到剩余预算以内
    pub fn clamp(&self, duration: Duration) -> Duration {
        self.remaining()
            .map_or(duration, |remaining| duration.min(remaining))
    }
}

impl Default for ExecutionBudget {
    fn default() -> Self {
        Self::unlimited()
    }
}

/// 宿主交给编排器的一次渲染
#[derive(Debug, Clone)]
pub struct RenderRequest {
    /// 请求路径（可能带语言前缀）
    pub path: String,
    pub query: Option<String>,
    /// 完整渲染结果
    pub html: String,
    pub content_type: Option<String>,
    pub status: u16,
    pub is_admin: bool,
    /// AJAX、REST、cron 等内部请求
    pub is_internal: bool,
    pub is_feed: bool,
    pub is_attachment: bool,
    /// 已登录的特权访问者
    pub privileged_viewer: bool,
    /// 显式要求跳过缓存
    pub bypass_cache: bool,
    pub language_hint: Option<String>,
    pub page: PageKind,
    pub budget: ExecutionBudget,
}

impl RenderRequest {
    pub fn new(path: &str, html: impl Into<String>) -> Self {
        Self {
            path: path.to_string(),
            query: None,
            html: html.into(),
            content_type: Some("text/html; charset=UTF-8".to_string()),
            status: 200,
            is_admin: false,
            is_internal: false,
            is_feed: false,
            is_attachment: false,
            privileged_viewer: false,
            bypass_cache: false,
            language_hint: None,
            page: PageKind::Unknown,
            budget: ExecutionBudget::unlimited(),
        }
    }

    pub fn with_query(mut self, query: &str) -> Self {
        self.query = Some(query.trim_start_matches('?').to_string()).filter(|q| !q.is_empty());
        self
    }

    pub fn with_page(mut self, page: PageKind) -> Self {
        self.page = page;
        self
    }

    pub fn with_language(mut self, lang: &str) -> Self {
        self.language_hint = Some(lang.to_string());
        self
    }

    pub fn with_budget(mut self, budget: ExecutionBudget) -> Self {
        self.budget = budget;
        self
    }

    pub fn with_content_type(mut self, content_type: Option<&str>) -> Self {
        self.content_type = content_type.map(str::to_string);
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn privileged(mut self) -> Self {
        self.privileged_viewer = true;
        self
    }

    pub fn bypassing_cache(mut self) -> Self {
        self.bypass_cache = true;
        self
    }
}

/// 一次请求解析后的上下文
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub language: LanguageCode,
    pub source_language: LanguageCode,
    pub route: RouteIdentity,
    pub cache_key: CacheKey,
    pub policy: CachePolicy,
    pub privileged: bool,
}

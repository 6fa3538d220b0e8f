//! 跳过判断与缓存策略
//!
//! 全部是廉价检查：不解析 DOM，只看请求标记和少量字符串特征。

use std::fmt;

use super::request::{PageKind, RenderRequest};
use crate::translation::config::constants::{
    BYPASS_QUERY_PARAMS, DYNAMIC_QUERY_PARAMS, MIN_DOCUMENT_LENGTH,
};
use crate::translation::config::TranslationConfig;
use crate::utils::url::parse_query;

/// 原样返回的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AdminOrInternal,
    NotHtml,
    Incomplete,
    NotAPage,
    UnresolvedLanguage,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::AdminOrInternal => "后台或内部请求",
            Self::NotHtml => "非HTML响应",
            Self::Incomplete => "文档结构不完整",
            Self::NotAPage => "非页面响应",
            Self::UnresolvedLanguage => "无法确定目标语言",
        };
        f.write_str(text)
    }
}

/// 文档是否结构完整
pub fn is_structurally_sound(html: &str) -> bool {
    if html.len() < MIN_DOCUMENT_LENGTH {
        return false;
    }

    let lower = html.to_ascii_lowercase();
    lower.contains("<html") && lower.contains("<body") && lower.contains("</html>")
}

fn is_html_content_type(content_type: Option<&str>) -> bool {
    content_type.map_or(true, |value| {
        let mime = value.split(';').next().unwrap_or_default().trim();
        mime.eq_ignore_ascii_case("text/html") || mime.eq_ignore_ascii_case("application/xhtml+xml")
    })
}

fn looks_like_feed(html: &str) -> bool {
    let head = html.trim_start();
    let head = head.char_indices().nth(256).map_or(head, |(end, _)| &head[..end]);
    let lower = head.to_ascii_lowercase();
    if lower.contains("<rss") || lower.contains("<feed") || lower.contains("<rdf:rdf") {
        return true;
    }

    // 带 XML 声明的 XHTML 仍然是页面
    lower.starts_with("<?xml") && !lower.contains("<html") && !lower.contains("<!doctype html")
}

/// 按固定顺序做跳过检查（语言检查由编排器完成）
pub fn check_skip(request: &RenderRequest) -> Option<SkipReason> {
    if request.is_admin || request.is_internal {
        return Some(SkipReason::AdminOrInternal);
    }

    if !is_html_content_type(request.content_type.as_deref()) {
        return Some(SkipReason::NotHtml);
    }

    if !is_structurally_sound(&request.html) {
        return Some(SkipReason::Incomplete);
    }

    if request.status != 200
        || request.is_feed
        || request.is_attachment
        || looks_like_feed(&request.html)
    {
        return Some(SkipReason::NotAPage);
    }

    None
}

/// 是否读写缓存
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    pub read: bool,
    pub write: bool,
}

impl CachePolicy {
    pub const FULL: Self = Self {
        read: true,
        write: true,
    };

    pub const NONE: Self = Self {
        read: false,
        write: false,
    };

    pub fn is_bypass(&self) -> bool {
        !self.read && !self.write
    }
}

/// 查询串中是否有绕过缓存或非幂等的参数
pub fn has_bypass_params(query: Option<&str>) -> bool {
    let Some(query) = query else {
        return false;
    };

    parse_query(query).iter().any(|(key, _)| {
        let key = key.to_lowercase();
        BYPASS_QUERY_PARAMS.contains(&key.as_str()) || DYNAMIC_QUERY_PARAMS.contains(&key.as_str())
    })
}

/// 计算缓存策略
pub fn cache_policy(request: &RenderRequest, config: &TranslationConfig) -> CachePolicy {
    if request.bypass_cache || has_bypass_params(request.query.as_deref()) {
        return CachePolicy::NONE;
    }

    // 空搜索列表是逐请求内容
    if let PageKind::Search { query } = &request.page {
        if query.trim().is_empty() {
            return CachePolicy::NONE;
        }
    }

    if request.privileged_viewer && !config.store_privileged_renders {
        return CachePolicy {
            read: true,
            write: false,
        };
    }

    CachePolicy::FULL
}

//! 路由标识与缓存键
//!
//! 同一逻辑页面无论 URL 是否带语言前缀都解析为同一个 [`RouteIdentity`]。
//! 缓存键不包含任何内容版本号：路由已区分页面，过期交给有效期处理。

use std::collections::HashMap;
use std::fmt;

use super::language::{LanguageCode, LanguageResolver};
use super::request::PageKind;
use crate::translation::config::constants::{BYPASS_QUERY_PARAMS, PATH_HASH_LEN, SITE_HASH_LEN};
use crate::translation::config::TranslationConfig;
use crate::utils::url::{language_prefix, normalize_path, parse_query, strip_language_prefix};

fn short_hash(input: &str, len: usize) -> String {
    let mut hex = blake3::hash(input.as_bytes()).to_hex().to_string();
    hex.truncate(len);
    hex
}

/// 站点标识（站点地址的短哈希）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteIdentity(String);

impl SiteIdentity {
    pub fn from_url(site_url: &str) -> Self {
        let canonical = site_url.trim().trim_end_matches('/').to_lowercase();
        Self(short_hash(&canonical, SITE_HASH_LEN))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// 逻辑页面标识
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RouteIdentity {
    ByEntity(u64),
    /// 规范化路径（含查询）的哈希
    ByPath(String),
}

impl RouteIdentity {
    pub fn from_path(canonical: &str) -> Self {
        Self::ByPath(short_hash(canonical, PATH_HASH_LEN))
    }
}

impl fmt::Display for RouteIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ByEntity(id) => write!(f, "entity:{}", id),
            Self::ByPath(hash) => write!(f, "path:{}", hash),
        }
    }
}

/// 缓存键 `{prefix}:{version}:{site-hash}:{lang}:{route}`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    key: String,
    lang: String,
}

impl CacheKey {
    pub fn new(
        prefix: &str,
        version: &str,
        site: &SiteIdentity,
        lang: &LanguageCode,
        route: &RouteIdentity,
    ) -> Self {
        Self {
            key: format!("{}:{}:{}:{}:{}", prefix, version, site.as_str(), lang, route),
            lang: lang.to_string(),
        }
    }

    pub fn from_config(
        config: &TranslationConfig,
        lang: &LanguageCode,
        route: &RouteIdentity,
    ) -> Self {
        Self::new(
            &config.cache_key_prefix,
            &config.cache_key_version,
            &SiteIdentity::from_url(&config.site_url),
            lang,
            route,
        )
    }

    pub fn as_str(&self) -> &str {
        &self.key
    }

    pub fn lang(&self) -> &str {
        &self.lang
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

/// 译文别名服务（只读为主）
pub trait SlugResolver: Send + Sync {
    /// 由带语言的译文路径反查内容实体
    fn resolve_route_from_translated_path(&self, lang: &str, path: &str) -> Option<u64>;

    /// 内容实体在某语言下的译文别名
    fn translated_slug_for(&self, entity: u64, lang: &str, allow_generate: bool) -> Option<String>;
}

/// 不知道任何别名
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSlugResolver;

impl SlugResolver for NoopSlugResolver {
    fn resolve_route_from_translated_path(&self, _lang: &str, _path: &str) -> Option<u64> {
        None
    }

    fn translated_slug_for(&self, _entity: u64, _lang: &str, _allow_generate: bool) -> Option<String> {
        None
    }
}

/// 固定的别名表
#[derive(Debug, Clone, Default)]
pub struct StaticSlugMap {
    by_path: HashMap<(String, String), u64>,
    slugs: HashMap<(u64, String), String>,
}

impl StaticSlugMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记实体在某语言下的别名，同时登记反查路径
    pub fn with_slug(mut self, entity: u64, lang: &str, slug: &str) -> Self {
        let slug = slug.trim_matches('/').to_string();
        self.by_path
            .insert((lang.to_string(), normalize_path(&slug)), entity);
        self.slugs.insert((entity, lang.to_string()), slug);
        self
    }

    /// 只登记反查路径（旧别名仍能解析到实体）
    pub fn with_path(mut self, entity: u64, lang: &str, path: &str) -> Self {
        self.by_path
            .insert((lang.to_string(), normalize_path(path)), entity);
        self
    }
}

impl SlugResolver for StaticSlugMap {
    fn resolve_route_from_translated_path(&self, lang: &str, path: &str) -> Option<u64> {
        self.by_path
            .get(&(lang.to_string(), normalize_path(path)))
            .copied()
    }

    fn translated_slug_for(&self, entity: u64, lang: &str, _allow_generate: bool) -> Option<String> {
        self.slugs.get(&(entity, lang.to_string())).cloned()
    }
}

/// 规范化查询串：去掉被忽略和绕过缓存的参数，按键值排序
pub fn canonical_query(query: Option<&str>, config: &TranslationConfig) -> String {
    let mut pairs: Vec<(String, String)> = query
        .map(parse_query)
        .unwrap_or_default()
        .into_iter()
        .filter(|(key, _)| {
            let key = key.to_lowercase();
            !config.is_ignored_query_param(&key) && !BYPASS_QUERY_PARAMS.contains(&key.as_str())
        })
        .collect();
    pairs.sort();

    pairs
        .iter()
        .map(|(key, value)| {
            if value.is_empty() {
                key.clone()
            } else {
                format!("{}={}", key, value)
            }
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// 去掉语言前缀后的规范化路径
pub fn unprefixed_path(path: &str, lang: &LanguageCode, languages: &LanguageResolver) -> String {
    let normalized = normalize_path(path);
    match language_prefix(&normalized) {
        Some(prefix) if prefix == lang.as_str() || languages.is_enabled_prefix(prefix) => {
            strip_language_prefix(&normalized, prefix).to_string()
        }
        _ => normalized,
    }
}

/// 计算路由标识
///
/// 优先级：单一实体 > 别名反查 > 首页 > 搜索 > 路径哈希
pub fn resolve_route(
    page: &PageKind,
    path: &str,
    query: Option<&str>,
    lang: &LanguageCode,
    languages: &LanguageResolver,
    config: &TranslationConfig,
    slugs: &dyn SlugResolver,
) -> RouteIdentity {
    if let PageKind::Singular(id) = page {
        return RouteIdentity::ByEntity(*id);
    }

    let path = unprefixed_path(path, lang, languages);
    let query = canonical_query(query, config);

    let canonical = match page {
        PageKind::FrontPage => with_query("/", &query),
        PageKind::Search { query: term } => {
            format!("{}?s={}", path, term.trim().to_lowercase())
        }
        PageKind::Unknown => {
            if let Some(id) = slugs.resolve_route_from_translated_path(lang.as_str(), &path) {
                return RouteIdentity::ByEntity(id);
            }
            with_query(&path, &query)
        }
        _ => with_query(&path, &query),
    };

    RouteIdentity::from_path(&canonical)
}

fn with_query(path: &str, query: &str) -> String {
    if query.is_empty() {
        path.to_string()
    } else {
        format!("{}?{}", path, query)
    }
}

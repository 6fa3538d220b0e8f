//! 链接重写模块
//!
//! 翻译阶段把站内链接本地化到目标语言；后处理阶段修复别名已经变化的本地化链接。

use markup5ever_rcdom::Handle;

use crate::parsers::html::document::edit_document;
use crate::parsers::html::dom::{find_nodes, get_node_attr, set_node_attr};
use crate::translation::core::route::SlugResolver;
use crate::translation::error::TranslationResult;
use crate::utils::url::{
    has_file_extension, is_internal_link, language_prefix, normalize_path, split_href, Url,
};

/// 重写链接所需的上下文
pub struct LinkContext<'a> {
    /// 目标语言
    pub lang: &'a str,
    /// 站点源语言
    pub source_lang: &'a str,
    pub site: &'a Url,
    pub slugs: &'a dyn SlugResolver,
    /// 不做本地化的路径前缀
    pub excluded_paths: &'a [String],
    /// 已知的语言前缀，带这些前缀的链接不再处理
    pub known_languages: &'a [String],
}

/// 判断是否应该跳过重写的链接
fn should_skip_link(href: &str) -> bool {
    href.is_empty()
        || href.starts_with('#')
        || href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
}

/// 把链接拆成 (源站前缀, 站内部分)；不支持的相对形式返回 `None`
fn split_origin(href: &str) -> Option<(String, &str)> {
    if href.starts_with('/') && !href.starts_with("//") {
        return Some((String::new(), href));
    }

    let (scheme_len, rest) = if let Some(rest) = href.strip_prefix("//") {
        (0, rest)
    } else {
        let scheme_end = href.find("://")?;
        (scheme_end + 3, &href[scheme_end + 3..])
    };
    let host_end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let origin_len = if scheme_len == 0 { 2 } else { scheme_len } + host_end;

    let tail = &href[origin_len..];
    let tail = if tail.is_empty() { "/" } else { tail };
    Some((href[..origin_len].to_string(), tail))
}

fn rebuild(origin: &str, path: &str, query: Option<&str>, fragment: Option<&str>) -> String {
    let mut href = format!("{}{}", origin, path);
    if let Some(query) = query {
        href.push('?');
        href.push_str(query);
    }
    if let Some(fragment) = fragment {
        href.push('#');
        href.push_str(fragment);
    }
    href
}

fn slug_path(lang: &str, slug: &str) -> String {
    format!("/{}/{}/", lang, slug.trim_matches('/'))
}

impl LinkContext<'_> {
    fn is_excluded(&self, path: &str) -> bool {
        let normalized = normalize_path(path);
        self.excluded_paths.iter().any(|excluded| {
            let excluded = normalize_path(excluded);
            normalized == excluded || normalized.starts_with(&format!("{}/", excluded))
        })
    }

    /// 未配置语言列表时，任何两位小写字母的首段都视为语言前缀
    fn has_language_prefix(&self, path: &str) -> bool {
        language_prefix(path).map_or(false, |prefix| {
            prefix == self.lang
                || self.known_languages.is_empty()
                || self.known_languages.iter().any(|lang| lang == prefix)
        })
    }

    /// 源语言链接 → 目标语言链接
    fn localize(&self, href: &str) -> Option<String> {
        if should_skip_link(href) || !is_internal_link(href, self.site) {
            return None;
        }

        let (origin, rest) = split_origin(href)?;
        let parts = split_href(rest);
        let path = if parts.path.is_empty() { "/" } else { parts.path };

        if self.is_excluded(path) || has_file_extension(path) || self.has_language_prefix(path) {
            return None;
        }

        let translated_slug = self
            .slugs
            .resolve_route_from_translated_path(self.source_lang, path)
            .and_then(|entity| self.slugs.translated_slug_for(entity, self.lang, true));

        let localized = match translated_slug {
            Some(slug) => slug_path(self.lang, &slug),
            None => format!("/{}{}", self.lang, path),
        };

        Some(rebuild(&origin, &localized, parts.query, parts.fragment))
    }

    /// 已本地化链接 → 别名变化后的新链接
    fn repair(&self, href: &str) -> Option<String> {
        if should_skip_link(href) || !is_internal_link(href, self.site) {
            return None;
        }

        let (origin, rest) = split_origin(href)?;
        let parts = split_href(rest);
        let prefix = format!("/{}/", self.lang);
        let translated = parts.path.strip_prefix(&prefix[..prefix.len() - 1])?;
        if !translated.starts_with('/') || translated == "/" {
            return None;
        }

        let entity = self
            .slugs
            .resolve_route_from_translated_path(self.lang, translated)?;
        let slug = self.slugs.translated_slug_for(entity, self.lang, false)?;

        if normalize_path(&slug) == normalize_path(translated) {
            return None;
        }

        Some(rebuild(&origin, &slug_path(self.lang, &slug), parts.query, parts.fragment))
    }
}

/// 本地化 DOM 中的站内链接，返回改写数量
pub fn localize_links(root: &Handle, context: &LinkContext<'_>) -> usize {
    let mut rewritten = 0;

    for anchor in find_nodes(root, "a") {
        let Some(href) = get_node_attr(&anchor, "href") else {
            continue;
        };

        if let Some(localized) = context.localize(href.trim()) {
            set_node_attr(&anchor, "href", Some(localized));
            rewritten += 1;
        }
    }

    tracing::debug!("本地化 {} 个链接", rewritten);
    rewritten
}

/// 修复已缓存页面中的本地化链接；没有改动时原样返回输入
pub fn repair_links(html: &str, context: &LinkContext<'_>) -> TranslationResult<String> {
    if !html.contains(&format!("/{}/", context.lang)) {
        return Ok(html.to_string());
    }

    edit_document(html, |root| {
        let mut repaired = 0;
        for anchor in find_nodes(root, "a") {
            let Some(href) = get_node_attr(&anchor, "href") else {
                continue;
            };

            if let Some(fixed) = context.repair(href.trim()) {
                set_node_attr(&anchor, "href", Some(fixed));
                repaired += 1;
            }
        }

        if repaired > 0 {
            tracing::debug!("修复 {} 个链接", repaired);
        }
        repaired > 0
    })
}

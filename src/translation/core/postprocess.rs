//! 输出后处理
//!
//! 每次返回前都执行的幂等步骤：元数据注入 → 链接修复 → 工具栏适配。
//! 缓存中的页面从不包含特权访问者工具栏。

use std::ops::Range;
use std::sync::{Arc, OnceLock};

use regex::Regex;

use super::language::LanguageCode;
use super::route::SlugResolver;
use crate::parsers::link_rewriter::{repair_links, LinkContext};
use crate::translation::config::TranslationConfig;
use crate::translation::error::{TranslationError, TranslationResult};
use crate::utils::url::Url;

/// 元数据注入服务（hreflang、语言切换器等由宿主提供）
pub trait MetadataInjector: Send + Sync {
    fn inject(&self, html: &str, lang: &LanguageCode) -> String;
}

/// 不注入任何内容
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopInjector;

impl MetadataInjector for NoopInjector {
    fn inject(&self, html: &str, _lang: &LanguageCode) -> String {
        html.to_string()
    }
}

fn body_open_regex() -> Option<&'static Regex> {
    static BODY: OnceLock<Option<Regex>> = OnceLock::new();
    BODY.get_or_init(|| Regex::new(r"(?i)<body\b[^>]*>").ok()).as_ref()
}

fn tag_regex() -> Option<&'static Regex> {
    static TAG: OnceLock<Option<Regex>> = OnceLock::new();
    TAG.get_or_init(|| Regex::new(r"(?i)<(/?)([a-z][a-z0-9-]*)\b[^>]*?(/?)>").ok())
        .as_ref()
}

/// 查找 id 为 `id` 的元素在源文本中的范围（含起止标签）
pub fn find_element_range(html: &str, id: &str) -> Option<Range<usize>> {
    let quoted = [format!("id=\"{}\"", id), format!("id='{}'", id)];
    if !quoted.iter().any(|q| html.contains(q.as_str())) {
        return None;
    }

    let tags = tag_regex()?;
    let mut stack: Vec<String> = Vec::new();
    let mut start: Option<(usize, usize)> = None;

    for caps in tags.captures_iter(html) {
        let whole = caps.get(0)?;
        let closing = !caps[1].is_empty();
        let name = caps[2].to_ascii_lowercase();
        let self_closing = !caps[3].is_empty() || is_void(&name);

        match start {
            None => {
                if closing {
                    continue;
                }
                let tag = whole.as_str();
                if quoted.iter().any(|q| tag.contains(q.as_str())) {
                    if self_closing {
                        return Some(whole.range());
                    }
                    start = Some((whole.start(), 0));
                    stack.push(name);
                }
            }
            Some((begin, _)) => {
                if self_closing && !closing {
                    continue;
                }
                if closing {
                    if let Some(pos) = stack.iter().rposition(|open| *open == name) {
                        stack.truncate(pos);
                    }
                    if stack.is_empty() {
                        return Some(begin..whole.end());
                    }
                } else {
                    stack.push(name);
                }
            }
        }
    }

    None
}

fn is_void(name: &str) -> bool {
    matches!(
        name,
        "area" | "base" | "br" | "col" | "embed" | "hr" | "img" | "input" | "link" | "meta"
            | "source" | "track" | "wbr"
    )
}

/// 删除工具栏元素
pub fn strip_toolbar(html: &str, id: &str) -> String {
    match find_element_range(html, id) {
        Some(range) => {
            let mut stripped = String::with_capacity(html.len());
            stripped.push_str(&html[..range.start]);
            stripped.push_str(&html[range.end..]);
            stripped
        }
        None => html.to_string(),
    }
}

/// 把实时页面中的工具栏插到 `<body…>` 之后
pub fn splice_toolbar(artifact: &str, live_html: &str, id: &str) -> TranslationResult<String> {
    let Some(range) = find_element_range(live_html, id) else {
        return Ok(artifact.to_string());
    };

    let body = body_open_regex()
        .and_then(|re| re.find(artifact))
        .ok_or_else(|| TranslationError::Parse("页面中没有 body 标签".to_string()))?;

    let mut spliced = String::with_capacity(artifact.len() + range.len());
    spliced.push_str(&artifact[..body.end()]);
    spliced.push_str(&live_html[range]);
    spliced.push_str(&artifact[body.end()..]);
    Ok(spliced)
}

/// 工具栏适配：先删除，特权访问者再插入实时工具栏
pub fn adapt_toolbar(html: &str, live_html: &str, id: &str, privileged: bool) -> String {
    let stripped = strip_toolbar(html, id);
    if !privileged {
        return stripped;
    }

    splice_toolbar(&stripped, live_html, id).unwrap_or_else(|e| {
        tracing::debug!("无法插入工具栏: {}", e);
        stripped
    })
}

/// 后处理器
pub struct PostProcessor {
    injector: Arc<dyn MetadataInjector>,
    slugs: Arc<dyn SlugResolver>,
    site: Option<Url>,
    source_lang: String,
    toolbar_id: String,
    excluded_paths: Vec<String>,
    known_languages: Vec<String>,
}

impl PostProcessor {
    pub fn new(
        config: &TranslationConfig,
        injector: Arc<dyn MetadataInjector>,
        slugs: Arc<dyn SlugResolver>,
    ) -> Self {
        let site = Url::parse(&config.site_url)
            .map_err(|e| tracing::warn!("站点地址无效，跳过链接修复: {}", e))
            .ok();

        Self {
            injector,
            slugs,
            site,
            source_lang: config.default_language.clone(),
            toolbar_id: config.toolbar_element_id.clone(),
            excluded_paths: config.excluded_link_paths.clone(),
            known_languages: config.enabled_languages.clone(),
        }
    }

    pub fn toolbar_id(&self) -> &str {
        &self.toolbar_id
    }

    /// 目标语言链接上下文
    pub fn link_context<'a>(&'a self, lang: &'a LanguageCode) -> Option<LinkContext<'a>> {
        self.site.as_ref().map(|site| LinkContext {
            lang: lang.as_str(),
            source_lang: &self.source_lang,
            site,
            slugs: self.slugs.as_ref(),
            excluded_paths: &self.excluded_paths,
            known_languages: &self.known_languages,
        })
    }

    /// 只注入元数据（源语言页面）
    pub fn inject(&self, html: &str, lang: &LanguageCode) -> String {
        self.injector.inject(html, lang)
    }

    /// 完整后处理
    pub fn run(&self, html: &str, lang: &LanguageCode, live_html: &str, privileged: bool) -> String {
        let injected = self.injector.inject(html, lang);

        let repaired = match self.link_context(lang) {
            Some(context) => repair_links(&injected, &context).unwrap_or_else(|e| {
                tracing::warn!("链接修复失败，保留原样: {}", e);
                injected.clone()
            }),
            None => injected,
        };

        adapt_toolbar(&repaired, live_html, &self.toolbar_id, privileged)
    }
}
